//! `TimelineProcessor`: the merge/heal/prune engine that edits
//! the persistent linked list of items under consistency invariants.
//!
//! Grounded on the teacher's `TrackManager::age_tracks` collect-then-mutate
//! discipline (snapshot ids, decide, then apply — never mutate while
//! iterating a borrowed collection) and on `GodViewAgent::tick`'s "one
//! bounded unit of work per call" shape, which is exactly what a
//! primary-lane job-queue consumer needs.

use crate::error::ProcessorError;
use crate::merge::{self, ConsumptionScore, MergeCandidate};
use crate::notifications::{Notification, NotificationSink};
use crate::sample::LocomotionSample;
use crate::settings::ProcessorSettings;
use crate::store::Store;
use crate::timeline_item::{ItemKeepness, ItemVariant, TimelineItem};
use crate::types::ItemId;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;
use transect_env::{Clock, JobKind, JobScheduler};

pub struct TimelineProcessor<S: Store> {
    store: Arc<S>,
    settings: ProcessorSettings,
    sink: Arc<dyn NotificationSink>,
}

impl<S: Store> TimelineProcessor<S> {
    pub fn new(store: Arc<S>, settings: ProcessorSettings, sink: Arc<dyn NotificationSink>) -> Self {
        Self { store, settings, sink }
    }

    /// Gathers a sliding window of up to `maximum_items_in_processing_loop`
    /// items centered on `item_id`, extending outward until two keepers
    /// are captured on each side, then processes it.
    pub fn process_from(&self, item_id: ItemId) -> Result<(), ProcessorError> {
        let Some(center) = self.store.item(item_id)? else {
            return Ok(());
        };
        let mut window = vec![center];
        let mut keepers_before = 0usize;
        let mut keepers_after = 0usize;
        let mut cursor_prev = window[0].previous_item_id;
        let mut cursor_next = window[0].next_item_id;

        while window.len() < self.settings.maximum_items_in_processing_loop
            && (keepers_before < 2 || keepers_after < 2)
        {
            let mut advanced = false;
            if keepers_before < 2 {
                if let Some(id) = cursor_prev {
                    if let Some(item) = self.store.item(id)? {
                        if item.keepness() == ItemKeepness::Keeper {
                            keepers_before += 1;
                        }
                        cursor_prev = item.previous_item_id;
                        window.insert(0, item);
                        advanced = true;
                    }
                }
            }
            if keepers_after < 2 && window.len() < self.settings.maximum_items_in_processing_loop {
                if let Some(id) = cursor_next {
                    if let Some(item) = self.store.item(id)? {
                        if item.keepness() == ItemKeepness::Keeper {
                            keepers_after += 1;
                        }
                        cursor_next = item.next_item_id;
                        window.push(item);
                        advanced = true;
                    }
                }
            }
            if !advanced {
                break;
            }
        }

        self.process_items(window)
    }

    /// Runs one pass of the merge/heal algorithm over `items`.
    pub fn process_items(&self, items: Vec<TimelineItem>) -> Result<(), ProcessorError> {
        if items.is_empty() {
            return Ok(());
        }

        let (range_start, range_end) = items
            .iter()
            .filter_map(|i| i.local_date_range())
            .fold(None, |acc, (s, e)| match acc {
                None => Some((s, e)),
                Some((as_, ae)) => Some((as_.min(s), ae.max(e))),
            })
            .unwrap_or((SystemTime::now(), SystemTime::now()));
        self.sanitise(range_start, range_end)?;

        // Reload, since sanitise may have rewritten rows.
        let mut items: Vec<TimelineItem> = items
            .iter()
            .filter_map(|i| self.store.item(i.id).ok().flatten())
            .collect();
        if items.is_empty() {
            return Ok(());
        }

        let moved = self.cleanse_edges(&mut items)?;
        if !moved.is_empty() {
            debug!(moved = moved.len(), "edge cleansing moved samples");
        }

        let mut candidates = self.enumerate_candidates(&items);

        // Self-healing: break edges of any gathered item whose merge (as a
        // deadman candidate) is invalid.
        for item in items.iter_mut() {
            if !item.is_valid() && !item.is_merge_locked() {
                item.break_edges();
                self.store.upsert_item(item)?;
            }
        }

        candidates.retain(|c| c.score != ConsumptionScore::Impossible);
        candidates.sort_by(|a, b| b.score.cmp(&a.score));

        if let Some(best) = candidates.first().copied() {
            self.execute_candidate(&mut items, best)?;
        }

        Ok(())
    }

    fn find_mut<'a>(items: &'a mut [TimelineItem], id: ItemId) -> Option<&'a mut TimelineItem> {
        items.iter_mut().find(|i| i.id == id)
    }

    fn execute_candidate(&self, items: &mut [TimelineItem], candidate: MergeCandidate) -> Result<(), ProcessorError> {
        let keeper_idx = items.iter().position(|i| i.id == candidate.keeper);
        let deadman_idx = items.iter().position(|i| i.id == candidate.deadman);
        let (Some(keeper_idx), Some(deadman_idx)) = (keeper_idx, deadman_idx) else {
            return Ok(());
        };

        // Re-verify validity just before executing, state may have shifted
        // since candidate enumeration ran.
        if !items[keeper_idx].is_valid() {
            return Ok(());
        }

        let betweener_idx = candidate.betweener.and_then(|id| items.iter().position(|i| i.id == id));

        let mut keeper = items[keeper_idx].clone();
        let mut deadman = items[deadman_idx].clone();
        let mut betweener = betweener_idx.map(|i| items[i].clone());

        let deleted = merge::execute(&mut keeper, betweener.as_mut(), &mut deadman)?;

        self.store.upsert_item(&keeper)?;
        self.sink.notify(Notification::MergedTimelineItems {
            keeper: keeper.id,
            consumed: deleted.clone(),
        });
        items[keeper_idx] = keeper;

        self.store.commit_deletion(&deadman)?;
        items[deadman_idx] = deadman;

        if let (Some(idx), Some(betweener)) = (betweener_idx, betweener) {
            self.store.commit_deletion(&betweener)?;
            items[idx] = betweener;
        }

        Ok(())
    }

    fn enumerate_candidates(&self, items: &[TimelineItem]) -> Vec<MergeCandidate> {
        let mut candidates = Vec::new();
        let has_non_impossible = |c: &[MergeCandidate]| c.iter().any(|c| c.score != ConsumptionScore::Impossible);

        for w in items {
            if w.is_merge_locked() || w.deleted {
                continue;
            }
            if let Some(next) = items.iter().find(|i| Some(i.id) == w.next_item_id) {
                self.push_pair(&mut candidates, w, next);
                self.push_pair(&mut candidates, next, w);

                if let Some(next_next) = items.iter().find(|i| Some(i.id) == next.next_item_id) {
                    if next.keepness().rank() < w.keepness().rank() && next_next.keepness().rank() > next.keepness().rank() {
                        self.push_triple(&mut candidates, w, next, next_next);
                        self.push_triple(&mut candidates, next_next, next, w);
                    }
                }
            }
            if let Some(prev) = items.iter().find(|i| Some(i.id) == w.previous_item_id) {
                self.push_pair(&mut candidates, w, prev);
                self.push_pair(&mut candidates, prev, w);
            }

            if let (Some(prev), Some(next)) = (
                items.iter().find(|i| Some(i.id) == w.previous_item_id),
                items.iter().find(|i| Some(i.id) == w.next_item_id),
            ) {
                if prev.keepness().rank() > w.keepness().rank() && next.keepness().rank() > w.keepness().rank() {
                    self.push_triple(&mut candidates, prev, w, next);
                    self.push_triple(&mut candidates, next, w, prev);
                }
            }

            if candidates.len() >= self.settings.maximum_potential_merges_in_processing_loop
                && has_non_impossible(&candidates)
            {
                break;
            }
        }
        candidates
    }

    fn push_pair(&self, out: &mut Vec<MergeCandidate>, keeper: &TimelineItem, deadman: &TimelineItem) {
        if keeper.id == deadman.id || keeper.deleted || deadman.deleted {
            return;
        }
        let score = merge::score_for_consuming(keeper, deadman);
        out.push(MergeCandidate { keeper: keeper.id, betweener: None, deadman: deadman.id, score });
    }

    fn push_triple(&self, out: &mut Vec<MergeCandidate>, keeper: &TimelineItem, betweener: &TimelineItem, deadman: &TimelineItem) {
        let distinct = keeper.id != betweener.id && betweener.id != deadman.id && keeper.id != deadman.id;
        if !distinct || keeper.deleted || betweener.deleted || deadman.deleted {
            return;
        }
        if keeper.is_merge_locked() || betweener.is_merge_locked() || deadman.is_merge_locked() {
            return;
        }
        let score = merge::score_for_consuming(keeper, deadman);
        out.push(MergeCandidate { keeper: keeper.id, betweener: Some(betweener.id), deadman: deadman.id, score });
    }

    /// `sanitiseEdges`: steals boundary samples between adjacent items for
    /// up to `edge_cleanse_max_iterations` rounds, terminating when the
    /// moved-sample set stops growing.
    fn cleanse_edges(&self, items: &mut [TimelineItem]) -> Result<Vec<crate::types::SampleId>, ProcessorError> {
        let mut moved_total = Vec::new();
        let mut last_round_size = usize::MAX;

        for _ in 0..self.settings.edge_cleanse_max_iterations {
            let mut moved_this_round = Vec::new();
            let ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();

            for id in &ids {
                let Some(idx) = items.iter().position(|i| i.id == *id) else { continue };
                let next_id = items[idx].next_item_id;
                let Some(next_idx) = next_id.and_then(|nid| items.iter().position(|i| i.id == nid)) else {
                    continue;
                };
                if let Some(sample_id) = self.try_steal_edge_sample(items, idx, next_idx) {
                    moved_this_round.push(sample_id);
                }
            }

            if moved_this_round.is_empty() || moved_this_round.len() == last_round_size {
                break;
            }
            last_round_size = moved_this_round.len();
            moved_total.extend(moved_this_round);
        }

        for item in items.iter() {
            self.store.upsert_item(item)?;
        }
        Ok(moved_total)
    }

    /// Implements one direction of `cleanseEdge` between `a` and `b` (b is
    /// a's `next`): may move `b`'s first sample to `a`, or `a`'s last
    /// sample to `b`, depending on item kinds and proximity.
    fn try_steal_edge_sample(&self, items: &mut [TimelineItem], a_idx: usize, b_idx: usize) -> Option<crate::types::SampleId> {
        let (a_is_path, b_is_path) = (items[a_idx].is_path(), items[b_idx].is_path());

        if a_is_path && b_is_path {
            let a_type = items[a_idx].mode_moving_activity_type();
            let b_type = items[b_idx].mode_moving_activity_type();
            if a_type == b_type {
                return None;
            }
            let within_time = items[a_idx]
                .local_date_range()
                .zip(items[b_idx].local_date_range())
                .map(|((_, ae), (bs, _))| bs.duration_since(ae).unwrap_or(Duration::ZERO) <= Duration::from_secs(600))
                .unwrap_or(false);
            if !within_time || !merge::within_mergeable_distance_pub(&items[a_idx], &items[b_idx]) {
                return None;
            }
            let threshold = self.settings.maximum_mode_shift_speed;
            let same_side = items[a_idx]
                .end_speed()
                .zip(items[b_idx].start_speed())
                .map(|(a, b)| (a > threshold) == (b > threshold))
                .unwrap_or(false);
            if !same_side {
                return None;
            }
            let b_first = items[b_idx].samples().first()?.clone();
            if b_first.activity_type().map(str::to_string) == a_type {
                let stolen = items[b_idx].remove_samples(|s| s.id == b_first.id);
                items[a_idx].add(stolen);
                return Some(b_first.id);
            }
            return None;
        }

        let (visit_idx, path_idx, visit_is_a) = if items[a_idx].is_visit() {
            (a_idx, b_idx, true)
        } else if items[b_idx].is_visit() {
            (b_idx, a_idx, false)
        } else {
            return None;
        };

        // The path sample adjacent to the visit, and the one just further
        // into the path (its "next-in" neighbour away from the boundary).
        let (path_edge_sample, path_next_sample) = if visit_is_a {
            (items[path_idx].samples().first()?.clone(), items[path_idx].samples().get(1).cloned())
        } else {
            let n = items[path_idx].samples().len();
            let edge = items[path_idx].samples().last()?.clone();
            let next = if n >= 2 { items[path_idx].samples().get(n - 2).cloned() } else { None };
            (edge, next)
        };
        let edge_outside = path_edge_sample
            .smoothed_location
            .map(|l| !items[visit_idx].contains((l.lat, l.lon), 1.0))
            .unwrap_or(false);
        let next_inside = path_next_sample
            .as_ref()
            .and_then(|s| s.smoothed_location)
            .map(|l| items[visit_idx].contains((l.lat, l.lon), 1.0))
            .unwrap_or(false);
        if edge_outside && next_inside {
            let stolen = items[path_idx].remove_samples(|s| s.id == path_edge_sample.id);
            items[visit_idx].add(stolen);
            return Some(path_edge_sample.id);
        }

        // Otherwise, the visit's own edge sample may have strayed outside
        // its containment radius; if it's close enough in time to the
        // path's edge sample, hand it over to the path instead.
        let visit_edge_sample = if visit_is_a {
            items[visit_idx].samples().last()?.clone()
        } else {
            items[visit_idx].samples().first()?.clone()
        };
        let visit_edge_outside = visit_edge_sample
            .smoothed_location
            .map(|l| !items[visit_idx].contains((l.lat, l.lon), 1.0))
            .unwrap_or(false);
        if visit_edge_outside {
            let gap = if path_edge_sample.date >= visit_edge_sample.date {
                path_edge_sample.date.duration_since(visit_edge_sample.date)
            } else {
                visit_edge_sample.date.duration_since(path_edge_sample.date)
            }
            .unwrap_or(Duration::MAX);
            if gap <= Duration::from_secs(120) {
                let stolen = items[visit_idx].remove_samples(|s| s.id == visit_edge_sample.id);
                items[path_idx].add(stolen);
                return Some(visit_edge_sample.id);
            }
        }
        None
    }

    /// Housekeeping pass: orphan adoption, dead-parent orphaning, and
    /// deadmen edge detachment across `[from, to]`.
    pub fn sanitise(&self, from: SystemTime, to: SystemTime) -> Result<(), ProcessorError> {
        let mut candidates = self.store.items_in_range(from, to)?;

        for orphan in self.store.orphaned_samples()? {
            if orphan.deleted {
                continue;
            }
            let host = candidates.iter_mut().find(|i| {
                i.local_date_range()
                    .map(|(s, e)| s <= orphan.date && orphan.date <= e)
                    .unwrap_or(false)
            });
            if let Some(host) = host {
                host.add(vec![orphan]);
                self.store.upsert_item(host)?;
            } else if !orphan.disabled {
                let kind = if orphan.moving_state == crate::types::MovingState::Stationary {
                    ItemVariant::Visit
                } else {
                    ItemVariant::Path
                };
                let mut new_item = TimelineItem::new(kind, "native", crate::settings::ItemThresholds::default());
                new_item.add(vec![orphan]);
                self.store.upsert_item(&new_item)?;
                self.sink.notify(Notification::NewTimelineItem { id: new_item.id });
            }
        }

        for item in candidates.iter_mut() {
            if item.deleted || item.disabled {
                item.break_edges();
                self.store.upsert_item(item)?;
            }
        }

        Ok(())
    }

    /// Safely deletes `item`: cleanses its edges, enumerates the three
    /// candidate merges around it, and executes the best even if
    /// `impossible`.
    pub fn safe_delete(&self, item_id: ItemId) -> Result<(), ProcessorError> {
        let Some(item) = self.store.item(item_id)? else { return Ok(()) };
        let mut window = Vec::new();
        if let Some(prev) = item.previous_item_id.and_then(|id| self.store.item(id).ok().flatten()) {
            window.push(prev);
        }
        window.push(item.clone());
        if let Some(next) = item.next_item_id.and_then(|id| self.store.item(id).ok().flatten()) {
            window.push(next);
        }

        self.cleanse_edges(&mut window)?;

        let mut candidates = Vec::new();
        if window.len() == 3 {
            self.push_triple(&mut candidates, &window[0], &window[1], &window[2]);
        }
        if let Some(prev) = window.iter().find(|i| Some(i.id) == item.previous_item_id) {
            self.push_pair(&mut candidates, prev, &item);
        }
        if let Some(next) = window.iter().find(|i| Some(i.id) == item.next_item_id) {
            self.push_pair(&mut candidates, next, &item);
        }

        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        if let Some(best) = candidates.first().copied() {
            self.execute_candidate(&mut window, best)?;
        }
        Ok(())
    }

    /// Heals a broken-edge item by linking it to the nearest same-source
    /// neighbour within `edge_heal_neighbour_window`, or absorbs it into a
    /// containing overlapper.
    pub fn heal_edges(&self, item_id: ItemId) -> Result<(), ProcessorError> {
        let Some(mut item) = self.store.item(item_id)? else { return Ok(()) };
        let Some((start, end)) = item.local_date_range() else { return Ok(()) };

        let window_start = start.checked_sub(self.settings.edge_heal_neighbour_window).unwrap_or(SystemTime::UNIX_EPOCH);
        let window_end = end + self.settings.edge_heal_neighbour_window;
        let candidates = self.store.items_in_range(window_start, window_end)?;

        if let Some(overlapper) = candidates.iter().find(|o| {
            o.id != item.id
                && !o.is_merge_locked()
                && o.local_date_range()
                    .map(|(os, oe)| os <= start && end <= oe)
                    .unwrap_or(false)
        }) {
            let mut overlapper = overlapper.clone();
            let moved = item.remove_samples(|_| true);
            overlapper.add(moved);
            item.delete().map_err(ProcessorError::Item)?;
            self.store.upsert_item(&overlapper)?;
            self.store.commit_deletion(&item)?;
            return Ok(());
        }

        let same_source: Vec<&TimelineItem> = candidates
            .iter()
            .filter(|c| c.id != item.id && c.source == item.source && !c.deleted && !c.disabled)
            .collect();

        if item.previous_item_id.is_none() {
            if let Some(nearest) = same_source
                .iter()
                .filter(|c| c.local_date_range().map(|(_, e)| e <= start).unwrap_or(false))
                .min_by_key(|c| c.local_date_range().map(|(_, e)| start.duration_since(e).unwrap_or(Duration::ZERO)).unwrap_or(Duration::MAX))
            {
                if nearest.next_item_id.is_none() {
                    item.previous_item_id = Some(nearest.id);
                    let mut nearest = (*nearest).clone();
                    nearest.next_item_id = Some(item.id);
                    self.store.upsert_item(&nearest)?;
                }
            }
        }
        if item.next_item_id.is_none() {
            if let Some(nearest) = same_source
                .iter()
                .filter(|c| c.local_date_range().map(|(s, _)| s >= end).unwrap_or(false))
                .min_by_key(|c| c.local_date_range().map(|(s, _)| s.duration_since(end).unwrap_or(Duration::ZERO)).unwrap_or(Duration::MAX))
            {
                if nearest.previous_item_id.is_none() {
                    item.next_item_id = Some(nearest.id);
                    let mut nearest = (*nearest).clone();
                    nearest.previous_item_id = Some(item.id);
                    self.store.upsert_item(&nearest)?;
                }
            }
        }

        self.store.upsert_item(&item)?;
        Ok(())
    }

    /// Prunes redundant stationary interior samples within a Visit,
    /// preserving `keeper_boundary` at both ends and one sample per
    /// `duration_between_pruned_samples` in the interior.
    pub fn prune_samples(&self, item_id: ItemId) -> Result<usize, ProcessorError> {
        let Some(mut item) = self.store.item(item_id)? else { return Ok(0) };
        if !item.is_visit() {
            return Ok(0);
        }
        let Some((start, end)) = item.local_date_range() else { return Ok(0) };

        let samples = item.samples().to_vec();
        let mut keep_ids = std::collections::HashSet::new();
        let mut last_kept_date: Option<SystemTime> = None;

        for s in &samples {
            let near_start = s.date.duration_since(start).unwrap_or(Duration::ZERO) < self.settings.keeper_boundary;
            let near_end = end.duration_since(s.date).unwrap_or(Duration::ZERO) < self.settings.keeper_boundary;
            let confirmed_non_stationary = s.moving_state != crate::types::MovingState::Stationary
                && s.confirmed_type.is_some();

            if near_start || near_end || confirmed_non_stationary {
                keep_ids.insert(s.id);
                last_kept_date = Some(s.date);
                continue;
            }

            let far_enough = last_kept_date
                .map(|last| s.date.duration_since(last).unwrap_or(Duration::ZERO) >= self.settings.duration_between_pruned_samples)
                .unwrap_or(true);
            if far_enough {
                keep_ids.insert(s.id);
                last_kept_date = Some(s.date);
            }
        }

        let removed = item.remove_samples(|s| !keep_ids.contains(&s.id));
        let count = removed.len();
        if count > 0 {
            self.store.upsert_item(&item)?;
        }
        Ok(count)
    }

    /// Splices a data-gap Path between `older` and `newer` when their gap
    /// exceeds `data_gap_threshold` and neither is already a data gap.
    pub fn insert_data_gap(&self, older_id: ItemId, newer_id: ItemId) -> Result<Option<ItemId>, ProcessorError> {
        let (Some(mut older), Some(mut newer)) = (self.store.item(older_id)?, self.store.item(newer_id)?) else {
            return Ok(None);
        };
        if older.is_data_gap() || newer.is_data_gap() {
            return Ok(None);
        }
        let (Some((_, older_end)), Some((newer_start, _))) = (older.local_date_range(), newer.local_date_range()) else {
            return Ok(None);
        };
        let gap = newer_start.duration_since(older_end).unwrap_or(Duration::ZERO);
        if gap <= self.settings.data_gap_threshold {
            return Ok(None);
        }

        let mut data_gap = TimelineItem::new(ItemVariant::Path, older.source.clone(), crate::settings::ItemThresholds::default());
        data_gap.add(vec![
            LocomotionSample::synthetic_off(older_end),
            LocomotionSample::synthetic_off(newer_start),
        ]);
        data_gap.previous_item_id = Some(older.id);
        data_gap.next_item_id = Some(newer.id);
        older.next_item_id = Some(data_gap.id);
        newer.previous_item_id = Some(data_gap.id);

        self.store.upsert_item(&older)?;
        self.store.upsert_item(&newer)?;
        self.store.upsert_item(&data_gap)?;
        self.sink.notify(Notification::NewTimelineItem { id: data_gap.id });
        Ok(Some(data_gap.id))
    }

    pub fn sweep_deleted(&self) -> Result<usize, ProcessorError> {
        Ok(self.store.sweep_deleted(self.settings.hard_delete_sweep_age)?)
    }
}

impl<S: Store + 'static> TimelineProcessor<S> {
    /// Puts the hard-delete sweep onto `scheduler`'s secondary lane every
    /// `interval`, driven by `clock`'s background-task spawning so it
    /// backs off under the same primary-backlog/backgrounding rules as any
    /// other secondary-lane job.
    pub fn spawn_sweep_loop<C: Clock>(
        self: &Arc<Self>,
        scheduler: &Arc<JobScheduler<C>>,
        clock: Arc<C>,
        interval: Duration,
    ) {
        let processor = Arc::clone(self);
        let scheduler = Arc::clone(scheduler);
        let task_clock = Arc::clone(&clock);
        clock.spawn("timeline-sweep", async move {
            loop {
                task_clock.sleep(interval).await;
                let processor = Arc::clone(&processor);
                let _ = scheduler.enqueue(JobKind::Secondary, move || {
                    if let Err(e) = processor.sweep_deleted() {
                        tracing::warn!(error = %e, "hard-delete sweep failed");
                    }
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::notifications::NullSink;
    use crate::settings::ItemThresholds;
    use crate::types::{FilteredLocation, MovingState, RecordingState};

    fn sample_at(secs: u64, lat: f64, lon: f64, moving: MovingState) -> LocomotionSample {
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
        LocomotionSample::new(date, Some(loc), vec![], vec![], moving, RecordingState::Recording, 0)
    }

    #[test]
    fn merge_visit_visit_overlap_combines_samples() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(NullSink);
        let processor = TimelineProcessor::new(store.clone(), ProcessorSettings::default(), sink);

        let mut a = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
        a.add(vec![sample_at(0, 0.0, 0.0, MovingState::Stationary), sample_at(200, 0.0, 0.0, MovingState::Stationary)]);
        let mut b = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
        b.add(vec![sample_at(150, 0.0, 0.0, MovingState::Stationary), sample_at(180, 0.0, 0.0, MovingState::Stationary)]);
        a.next_item_id = Some(b.id);
        b.previous_item_id = Some(a.id);

        store.upsert_item(&a).unwrap();
        store.upsert_item(&b).unwrap();

        processor.process_items(vec![a.clone(), b.clone()]).unwrap();

        let survivor_a = store.item(a.id).unwrap();
        let survivor_b = store.item(b.id).unwrap();
        let one_deleted = survivor_a.map(|i| i.deleted).unwrap_or(true) || survivor_b.map(|i| i.deleted).unwrap_or(true);
        assert!(one_deleted, "expected one of the overlapping visits to be consumed");
    }

    #[test]
    fn idempotent_on_quiesced_neighbourhood() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(NullSink);
        let processor = TimelineProcessor::new(store.clone(), ProcessorSettings::default(), sink);

        let mut a = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
        a.add(vec![sample_at(0, 0.0, 0.0, MovingState::Stationary), sample_at(200, 0.0, 0.0, MovingState::Stationary)]);
        store.upsert_item(&a).unwrap();

        processor.process_items(vec![a.clone()]).unwrap();
        let after_first = store.item(a.id).unwrap().unwrap();
        processor.process_items(vec![after_first.clone()]).unwrap();
        let after_second = store.item(a.id).unwrap().unwrap();

        assert_eq!(after_first.n(), after_second.n());
    }
}
