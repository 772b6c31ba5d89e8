//! Merge and `MergeScores`: scoring and executing the consumption of one
//! timeline item by another.
//!
//! This is the closest analogue in the crate to the teacher's Highlander +
//! Covariance-Intersection fusion in `TrackManager::fuse_track`: both boil
//! down to "consume one entity's identity and state into another's,
//! idempotently, without double-counting shared evidence." Here the
//! consumption score replaces CI's numeric fused-covariance comparison with
//! a discrete quality grade, and `doIt` replaces the teacher's
//! canonical-id rekey with edge rewiring over the doubly-linked item chain.

use crate::settings::ProcessorSettings;
use crate::timeline_item::{ItemVariant, TimelineItem};
use crate::types::ItemId;
use std::time::Duration;

/// Consumption-quality grade, highest to lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConsumptionScore {
    Impossible = 0,
    VeryLow = 1,
    Low = 2,
    Medium = 3,
    High = 4,
    Perfect = 5,
}

/// A candidate merge: `keeper` consumes `deadman`, optionally with a
/// `betweener` also being consumed (and deleted) in the same operation.
#[derive(Debug, Clone, Copy)]
pub struct MergeCandidate {
    pub keeper: ItemId,
    pub betweener: Option<ItemId>,
    pub deadman: ItemId,
    pub score: ConsumptionScore,
}

fn within_mergeable_distance(
    keeper: &TimelineItem,
    deadman: &TimelineItem,
    time_gap: Duration,
) -> bool {
    if keeper.is_nolo() || deadman.is_nolo() {
        return true;
    }

    let times_overlap = match (keeper.local_date_range(), deadman.local_date_range()) {
        (Some((a0, a1)), Some((b0, b1))) => a0 <= b1 && b0 <= a1,
        _ => false,
    };
    if times_overlap {
        return true;
    }

    if keeper.is_visit() && deadman.is_visit() {
        return true; // visit-to-visit ceiling is infinite
    }

    let floor = if keeper.is_visit() != deadman.is_visit() {
        150.0
    } else {
        0.0
    };

    let speeds: Vec<f64> = [keeper.speed(), deadman.speed()].into_iter().filter(|s| *s > 0.0).collect();
    let mean_speed = if speeds.is_empty() {
        0.0
    } else {
        speeds.iter().sum::<f64>() / speeds.len() as f64
    };
    let ceiling = (mean_speed * time_gap.as_secs_f64() * 4.0).max(floor);

    match (keeper.center(), deadman.center()) {
        (Some(a), Some(b)) => crate::brain_sample::haversine_m(a, b) <= ceiling,
        _ => false,
    }
}

fn time_gap(keeper: &TimelineItem, deadman: &TimelineItem) -> Duration {
    match (keeper.local_date_range(), deadman.local_date_range()) {
        (Some((a0, a1)), Some((b0, b1))) => {
            if a1 <= b0 {
                b0.duration_since(a1).unwrap_or(Duration::ZERO)
            } else if b1 <= a0 {
                a0.duration_since(b1).unwrap_or(Duration::ZERO)
            } else {
                Duration::ZERO
            }
        }
        _ => Duration::ZERO,
    }
}

/// `keeper.scoreForConsuming(deadman)`.
pub fn score_for_consuming(keeper: &TimelineItem, deadman: &TimelineItem) -> ConsumptionScore {
    if keeper.is_merge_locked() || deadman.is_merge_locked() || keeper.deleted {
        return ConsumptionScore::Impossible;
    }
    if keeper.samples().is_empty() {
        return ConsumptionScore::Impossible;
    }

    if keeper.is_data_gap() {
        return if deadman.is_data_gap() {
            ConsumptionScore::Perfect
        } else {
            ConsumptionScore::Impossible
        };
    }
    if deadman.is_data_gap() {
        return if deadman.is_valid() {
            ConsumptionScore::Impossible
        } else {
            ConsumptionScore::Medium
        };
    }

    if keeper.is_nolo() {
        if !deadman.is_nolo() {
            return ConsumptionScore::Impossible;
        }
        return if deadman.is_valid() {
            ConsumptionScore::Perfect
        } else {
            ConsumptionScore::Medium
        };
    }

    let gap = time_gap(keeper, deadman);
    if !within_mergeable_distance(keeper, deadman, gap) {
        return ConsumptionScore::Impossible;
    }

    match (keeper.variant, deadman.variant) {
        (ItemVariant::Visit, ItemVariant::Visit) => {
            let overlap = match (keeper.local_date_range(), deadman.local_date_range()) {
                (Some((a0, a1)), Some((b0, b1))) => a0 <= b1 && b0 <= a1,
                _ => false,
            };
            if !overlap {
                return ConsumptionScore::Impossible;
            }
            if keeper.duration() >= deadman.duration() {
                ConsumptionScore::Perfect
            } else {
                ConsumptionScore::High
            }
        }

        (ItemVariant::Visit, ItemVariant::Path) => {
            if !(keeper.is_valid() && !deadman.is_valid()) {
                return ConsumptionScore::Impossible;
            }
            let fraction_inside = fraction_of_path_inside_visit(keeper, deadman);
            if fraction_inside >= 1.0 {
                ConsumptionScore::Low
            } else {
                ConsumptionScore::VeryLow
            }
        }

        (ItemVariant::Path, ItemVariant::Visit) => {
            let keeper_is_keeper = keeper.is_worth_keeping();
            let deadman_valid = deadman.is_valid();
            match (keeper_is_keeper, deadman_valid) {
                (true, true) => ConsumptionScore::Impossible,
                (true, false) => ConsumptionScore::Medium,
                (false, false) if keeper.is_valid() => ConsumptionScore::Low,
                (false, true) if keeper.is_valid() => ConsumptionScore::VeryLow,
                _ => ConsumptionScore::VeryLow,
            }
        }

        (ItemVariant::Path, ItemVariant::Path) => {
            let keeper_type = keeper.mode_moving_activity_type().or_else(|| keeper.mode_activity_type());
            let deadman_type = deadman.mode_moving_activity_type().or_else(|| deadman.mode_activity_type());

            match (&keeper_type, &deadman_type) {
                (None, None) => ConsumptionScore::Medium,
                (Some(k), Some(d)) if k == d => ConsumptionScore::Perfect,
                (None, Some(_)) => ConsumptionScore::Impossible,
                (Some(k), _) => {
                    let classifier_score = deadman
                        .samples()
                        .iter()
                        .filter_map(|s| s.classifier_results.as_ref().and_then(|c| c.score_for(k)))
                        .fold(0.0_f64, f64::max);
                    if classifier_score >= 0.075 {
                        ConsumptionScore::Perfect
                    } else if classifier_score >= 0.05 {
                        ConsumptionScore::High
                    } else if classifier_score >= 0.025 {
                        ConsumptionScore::Medium
                    } else if classifier_score >= 0.010 {
                        ConsumptionScore::Low
                    } else {
                        ConsumptionScore::VeryLow
                    }
                }
            }
        }
    }
}

fn fraction_of_path_inside_visit(visit: &TimelineItem, path: &TimelineItem) -> f64 {
    let samples = path.samples();
    if samples.is_empty() {
        return 0.0;
    }
    let inside = samples
        .iter()
        .filter(|s| {
            s.smoothed_location
                .map(|l| visit.contains((l.lat, l.lon), 1.0))
                .unwrap_or(false)
        })
        .count();
    inside as f64 / samples.len() as f64
}

/// Executes a merge: reparents the deadman's (and betweener's) enabled
/// samples into the keeper, rewires the keeper's outward edge, and deletes
/// the consumed items. Disabled samples stay with their original
/// (disabled) parent. Returns the ids of items deleted by the operation.
pub fn execute(
    keeper: &mut TimelineItem,
    betweener: Option<&mut TimelineItem>,
    deadman: &mut TimelineItem,
) -> Result<Vec<ItemId>, crate::error::ItemError> {
    let mut deleted_ids = Vec::new();

    if let Some(betweener) = betweener {
        let moved = betweener.remove_samples(|s| !s.disabled);
        keeper.add(moved);
        betweener.delete()?;
        deleted_ids.push(betweener.id);
    }

    let moved = deadman.remove_samples(|s| !s.disabled);
    keeper.add(moved);

    keeper.next_item_id = deadman.next_item_id;
    deadman.delete()?;
    deleted_ids.push(deadman.id);

    Ok(deleted_ids)
}

/// Merge-distance ceiling check exposed for the processor's candidate
/// enumeration and edge cleansing.
pub fn within_mergeable_distance_pub(keeper: &TimelineItem, deadman: &TimelineItem) -> bool {
    within_mergeable_distance(keeper, deadman, time_gap(keeper, deadman))
}

pub fn default_processor_settings() -> ProcessorSettings {
    ProcessorSettings::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ItemThresholds;
    use crate::types::{FilteredLocation, MovingState, RecordingState};
    use std::time::SystemTime;

    fn sample_at(secs: u64, lat: f64, lon: f64, moving: MovingState) -> crate::sample::LocomotionSample {
        let date = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
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
        crate::sample::LocomotionSample::new(date, Some(loc), vec![], vec![], moving, RecordingState::Recording, 0)
    }

    #[test]
    fn overlapping_visits_score_perfect_for_longer_duration() {
        let mut a = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
        a.add(vec![sample_at(0, 0.0, 0.0, MovingState::Stationary), sample_at(200, 0.0, 0.0, MovingState::Stationary)]);
        let mut b = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
        b.add(vec![sample_at(150, 0.0, 0.0, MovingState::Stationary), sample_at(180, 0.0, 0.0, MovingState::Stationary)]);

        assert_eq!(score_for_consuming(&a, &b), ConsumptionScore::Perfect);
    }

    #[test]
    fn doit_moves_samples_and_deletes_deadman() {
        let mut keeper = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
        keeper.add(vec![sample_at(0, 0.0, 0.0, MovingState::Stationary), sample_at(200, 0.0, 0.0, MovingState::Stationary)]);
        let mut deadman = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
        deadman.add(vec![sample_at(150, 0.0, 0.0, MovingState::Stationary), sample_at(180, 0.0, 0.0, MovingState::Stationary)]);
        deadman.next_item_id = Some(ItemId::new());

        let before = keeper.n();
        let deadman_n = deadman.n();
        let expected_next = deadman.next_item_id;
        let deleted = execute(&mut keeper, None, &mut deadman).unwrap();

        assert_eq!(keeper.n(), before + deadman_n);
        assert!(deadman.deleted);
        assert_eq!(deadman.n(), 0);
        assert_eq!(deleted, vec![deadman.id]);
        assert_eq!(keeper.next_item_id, expected_next);
    }
}
