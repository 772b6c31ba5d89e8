//! Literal scenario definitions driven by seeded fix sequences.

use crate::oracle::Oracle;
use crate::runner::{self, ScenarioOutcome};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use transect_core::{
    FilteredLocation, ItemThresholds, ItemVariant, LocomotionSample, MemoryStore, MovingState,
    NullSink, ProcessorSettings, RecordingState, TimelineItem, TimelineProcessor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    ColdStartStationary,
    Transit,
    StationaryToMoving,
    MergeVisitVisitOverlap,
    InvalidPathConsumedByVisit,
    DataGapInsertion,
}

impl ScenarioId {
    pub fn all() -> &'static [ScenarioId] {
        &[
            ScenarioId::ColdStartStationary,
            ScenarioId::Transit,
            ScenarioId::StationaryToMoving,
            ScenarioId::MergeVisitVisitOverlap,
            ScenarioId::InvalidPathConsumedByVisit,
            ScenarioId::DataGapInsertion,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            ScenarioId::ColdStartStationary => "cold-start-stationary",
            ScenarioId::Transit => "transit",
            ScenarioId::StationaryToMoving => "stationary-to-moving",
            ScenarioId::MergeVisitVisitOverlap => "merge-visit-visit-overlap",
            ScenarioId::InvalidPathConsumedByVisit => "invalid-path-consumed-by-visit",
            ScenarioId::DataGapInsertion => "data-gap-insertion",
        }
    }

    pub fn run(self, seed: u64) -> ScenarioOutcome {
        match self {
            ScenarioId::ColdStartStationary => cold_start_stationary(seed),
            ScenarioId::Transit => transit(seed),
            ScenarioId::StationaryToMoving => stationary_to_moving(seed),
            ScenarioId::MergeVisitVisitOverlap => merge_visit_visit_overlap(seed),
            ScenarioId::InvalidPathConsumedByVisit => invalid_path_consumed_by_visit(seed),
            ScenarioId::DataGapInsertion => data_gap_insertion(seed),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "cold-start-stationary" | "cold-start" => Ok(ScenarioId::ColdStartStationary),
            "transit" => Ok(ScenarioId::Transit),
            "stationary-to-moving" => Ok(ScenarioId::StationaryToMoving),
            "merge-visit-visit-overlap" | "merge-overlap" => Ok(ScenarioId::MergeVisitVisitOverlap),
            "invalid-path-consumed-by-visit" | "invalid-path" => Ok(ScenarioId::InvalidPathConsumedByVisit),
            "data-gap-insertion" | "data-gap" => Ok(ScenarioId::DataGapInsertion),
            other => Err(format!("unknown scenario '{other}'")),
        }
    }
}

const EPOCH: SystemTime = SystemTime::UNIX_EPOCH;

fn cold_start_stationary(seed: u64) -> ScenarioOutcome {
    let mut oracle = Oracle::new(seed);
    let fixes = oracle.stationary_fixes(EPOCH, 8, 0.0, 0.0, 20.0, Duration::from_secs(10));
    let (mut rec, _store) = runner::fresh_recorder(EPOCH);
    runner::replay(&mut rec, &fixes);

    let item = rec.current_item();
    let is_visit = item.map(|i| i.is_visit()).unwrap_or(false);
    let tight_radius = item
        .and_then(|i| i.radius())
        .map(|(mean, _)| mean < 5.0)
        .unwrap_or(false);

    ScenarioOutcome::new(vec![
        ("current item is a Visit", is_visit),
        ("radius.mean < 5m", tight_radius),
    ])
}

fn transit(seed: u64) -> ScenarioOutcome {
    let mut oracle = Oracle::new(seed);
    // Generous fix count: the brain needs a handful of ticks to climb out of
    // its warm-up `Uncertain` state, and only the tail after that transition
    // survives as the current item, so distance is measured on a Path long
    // enough to stay well clear of the threshold regardless of exactly when
    // that transition lands.
    let fixes = oracle.marching_fixes(EPOCH, 0, 40, 0.0, 0.0, 0.0001, 0.0, 15.0, Duration::from_secs(10));
    let (mut rec, _store) = runner::fresh_recorder(EPOCH);
    runner::replay(&mut rec, &fixes);

    let item = rec.current_item();
    let is_path = item.map(|i| i.is_path()).unwrap_or(false);
    let moved_far_enough = item.map(|i| i.distance() > 90.0).unwrap_or(false);

    ScenarioOutcome::new(vec![
        ("current item is a Path", is_path),
        ("distance travelled > 90m", moved_far_enough),
    ])
}

fn stationary_to_moving(seed: u64) -> ScenarioOutcome {
    let mut oracle = Oracle::new(seed);
    let mut fixes = oracle.stationary_fixes(EPOCH, 10, 0.0, 0.0, 15.0, Duration::from_secs(10));
    fixes.extend(oracle.marching_fixes(EPOCH, 10, 5, 0.0, 0.0, 0.0, 0.0005, 15.0, Duration::from_secs(10)));
    let (mut rec, _store) = runner::fresh_recorder(EPOCH);
    runner::replay(&mut rec, &fixes);

    let item = rec.current_item();
    let new_path = item.map(|i| i.is_path()).unwrap_or(false);

    ScenarioOutcome::new(vec![("new current item is a Path", new_path)])
}

fn sample_at(secs: u64, lat: f64, lon: f64, moving: MovingState) -> LocomotionSample {
    let date = EPOCH + Duration::from_secs(secs);
    let loc = FilteredLocation {
        timestamp: date,
        lat,
        lon,
        altitude: 0.0,
        h_accuracy: 5.0,
        v_accuracy: 5.0,
        course: -1.0,
        speed: -1.0,
    };
    LocomotionSample::new(date, Some(loc), vec![], vec![], moving, RecordingState::Recording, 0)
}

fn merge_visit_visit_overlap(_seed: u64) -> ScenarioOutcome {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(NullSink);
    let processor = TimelineProcessor::new(store.clone(), ProcessorSettings::default(), sink);

    let mut a = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
    a.add(vec![
        sample_at(0, 0.0, 0.0, MovingState::Stationary),
        sample_at(200, 0.0, 0.0, MovingState::Stationary),
    ]);
    let mut b = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
    b.add(vec![
        sample_at(150, 0.0, 0.0, MovingState::Stationary),
        sample_at(180, 0.0, 0.0, MovingState::Stationary),
    ]);
    a.next_item_id = Some(b.id);
    b.previous_item_id = Some(a.id);

    store.upsert_item(&a).expect("seed item a");
    store.upsert_item(&b).expect("seed item b");
    processor.process_items(vec![a.clone(), b.clone()]).expect("process merge window");

    let a_after = store.item(a.id).ok().flatten();
    let b_after = store.item(b.id).ok().flatten();
    let one_deleted = a_after.as_ref().map(|i| i.deleted).unwrap_or(true) != b_after.as_ref().map(|i| i.deleted).unwrap_or(true);
    let survivor_has_all_samples = a_after
        .iter()
        .chain(b_after.iter())
        .find(|i| !i.deleted)
        .map(|i| i.n() == 4)
        .unwrap_or(false);

    ScenarioOutcome::new(vec![
        ("exactly one of the overlapping visits was consumed", one_deleted),
        ("combined item carries all four samples", survivor_has_all_samples),
    ])
}

fn invalid_path_consumed_by_visit(_seed: u64) -> ScenarioOutcome {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(NullSink);
    let processor = TimelineProcessor::new(store.clone(), ProcessorSettings::default(), sink);

    let mut visit = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
    visit.add(vec![
        sample_at(0, 0.0, 0.0, MovingState::Stationary),
        sample_at(300, 0.0, 0.0, MovingState::Stationary),
    ]);
    let mut path = TimelineItem::new(ItemVariant::Path, "native", ItemThresholds::default());
    path.add(vec![
        // ~5.5m from the visit's center: comfortably inside its clamped
        // 10m-minimum containment radius.
        sample_at(100, 0.0, 0.00005, MovingState::Moving),
        sample_at(105, 0.0, 0.00005, MovingState::Moving),
    ]);
    visit.next_item_id = Some(path.id);
    path.previous_item_id = Some(visit.id);

    store.upsert_item(&visit).expect("seed visit");
    store.upsert_item(&path).expect("seed path");
    let path_was_invalid = !path.is_valid();
    processor.process_items(vec![visit.clone(), path.clone()]).expect("process merge window");

    let visit_after = store.item(visit.id).ok().flatten();
    let path_after = store.item(path.id).ok().flatten();
    let path_consumed = path_after.map(|i| i.deleted).unwrap_or(false);
    let visit_survives = visit_after.map(|i| !i.deleted).unwrap_or(false);

    ScenarioOutcome::new(vec![
        ("the path was structurally invalid before processing", path_was_invalid),
        ("the path was consumed by the visit", path_consumed),
        ("the visit survives as keeper", visit_survives),
    ])
}

fn data_gap_insertion(seed: u64) -> ScenarioOutcome {
    let mut oracle = Oracle::new(seed);
    let before = oracle.stationary_fixes(EPOCH, 3, 0.0, 0.0, 20.0, Duration::from_secs(10));
    let (mut rec, store) = runner::fresh_recorder(EPOCH);
    runner::replay(&mut rec, &before);
    let last_item_id = rec.current_item().map(|i| i.id);
    rec.stop_recording();

    let resume_at = EPOCH + Duration::from_secs(10 * 60 + 30);
    rec.start_recording(resume_at).expect("resume recording");
    let after = oracle.stationary_fixes(resume_at, 3, 0.0, 0.0, 20.0, Duration::from_secs(10));
    runner::replay(&mut rec, &after);

    let gap_item = last_item_id
        .and_then(|id| store.item(id).ok().flatten())
        .and_then(|before_item| before_item.next_item_id)
        .and_then(|id| store.item(id).ok().flatten());

    let is_data_gap = gap_item.as_ref().map(|i| i.is_data_gap()).unwrap_or(false);
    let bounded_by_off_samples = gap_item
        .as_ref()
        .map(|i| {
            i.samples().len() == 2
                && i.samples().iter().all(|s| s.recording_state == RecordingState::Off)
        })
        .unwrap_or(false);
    let gap_duration_matches = gap_item
        .as_ref()
        .and_then(|i| i.local_date_range())
        .map(|(start, end)| {
            let observed = end.duration_since(start).unwrap_or(Duration::ZERO);
            let expected = Duration::from_secs(10 * 60);
            let delta = if observed > expected { observed - expected } else { expected - observed };
            delta <= Duration::from_secs(10)
        })
        .unwrap_or(false);

    ScenarioOutcome::new(vec![
        ("a data-gap Path was spliced in on resume", is_data_gap),
        ("the gap is bounded by two off-state samples", bounded_by_off_samples),
        ("the gap duration matches the stop/start interval", gap_duration_matches),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_scenarios_pass_at_the_default_seed() {
        for scenario in ScenarioId::all() {
            let outcome = scenario.run(42);
            assert!(outcome.passed(), "{} failed: {:?}", scenario.name(), outcome.checks);
        }
    }

    #[test]
    fn scenario_names_round_trip_through_parsing() {
        for scenario in ScenarioId::all() {
            let parsed: ScenarioId = scenario.name().parse().unwrap();
            assert_eq!(parsed, *scenario);
        }
    }

    #[test]
    fn deterministic_across_runs_with_the_same_seed() {
        let first = ScenarioId::Transit.run(7);
        let second = ScenarioId::Transit.run(7);
        assert_eq!(first.checks, second.checks);
    }
}
