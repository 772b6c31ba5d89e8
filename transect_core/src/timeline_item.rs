//! `TimelineItem` hierarchy: `Visit` and `Path` modelled as a tagged
//! variant sharing linkage/sample/caching machinery, each with its own
//! validity, keepness, containment and distance rules.

use crate::brain_sample::haversine_m;
use crate::sample::LocomotionSample;
use crate::settings::ItemThresholds;
use crate::types::{ItemId, MovingState, RecordingState};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemVariant {
    Visit,
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKeepness {
    Invalid,
    Valid,
    Keeper,
}

impl ItemKeepness {
    pub fn rank(self) -> u8 {
        match self {
            ItemKeepness::Invalid => 0,
            ItemKeepness::Valid => 1,
            ItemKeepness::Keeper => 2,
        }
    }
}

/// A contiguous run of samples sharing the same activity type, used by
/// edge-cleansing's endpoint-speed comparisons.
#[derive(Debug, Clone)]
pub struct Segment {
    pub activity_type: Option<String>,
    pub start: SystemTime,
    pub end: SystemTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineItem {
    pub id: ItemId,
    pub variant: ItemVariant,
    pub deleted: bool,
    pub disabled: bool,
    pub source: String,
    pub previous_item_id: Option<ItemId>,
    pub next_item_id: Option<ItemId>,
    /// Set by the recorder while this is the item actively being built.
    pub is_current_item: bool,
    /// Set when the in-memory object's backing row has been modified
    /// externally; subsequent accessors must reload before relying on it.
    pub invalidated: bool,

    samples: Vec<LocomotionSample>,

    cached_center: RefCell<Option<(f64, f64)>>,
    cached_radius: RefCell<Option<(f64, f64)>>,

    thresholds: ItemThresholds,
}

impl TimelineItem {
    pub fn new(variant: ItemVariant, source: impl Into<String>, thresholds: ItemThresholds) -> Self {
        Self {
            id: ItemId::new(),
            variant,
            deleted: false,
            disabled: false,
            source: source.into(),
            previous_item_id: None,
            next_item_id: None,
            is_current_item: false,
            invalidated: false,
            samples: Vec::new(),
            cached_center: RefCell::new(None),
            cached_radius: RefCell::new(None),
            thresholds,
        }
    }

    pub fn is_visit(&self) -> bool {
        matches!(self.variant, ItemVariant::Visit)
    }

    pub fn is_path(&self) -> bool {
        matches!(self.variant, ItemVariant::Path)
    }

    /// A Path whose every sample has `recording_state == Off`.
    pub fn is_data_gap(&self) -> bool {
        self.is_path() && !self.samples.is_empty() && self.samples.iter().all(|s| s.recording_state == RecordingState::Off)
    }

    pub fn samples(&self) -> &[LocomotionSample] {
        &self.samples
    }

    pub fn n(&self) -> usize {
        self.samples.len()
    }

    /// Merges `new_samples` into this item's owned set, keeping date order,
    /// re-parenting each to self, and invalidating caches.
    pub fn add(&mut self, new_samples: Vec<LocomotionSample>) {
        for mut s in new_samples {
            s.timeline_item_id = Some(self.id);
            self.samples.push(s);
        }
        self.samples.sort_by_key(|s| s.date);
        self.invalidate_caches();
    }

    /// Removes samples matching `predicate`, detaching their parent id, and
    /// returns them.
    pub fn remove_samples<F: Fn(&LocomotionSample) -> bool>(&mut self, predicate: F) -> Vec<LocomotionSample> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.samples.len());
        for mut s in std::mem::take(&mut self.samples) {
            if predicate(&s) {
                s.timeline_item_id = None;
                removed.push(s);
            } else {
                kept.push(s);
            }
        }
        self.samples = kept;
        self.invalidate_caches();
        removed
    }

    pub fn invalidate_caches(&mut self) {
        *self.cached_center.borrow_mut() = None;
        *self.cached_radius.borrow_mut() = None;
    }

    /// `[first sample.date, max(last sample.date, next_start)]`.
    pub fn date_range(&self, next_start: Option<SystemTime>) -> Option<(SystemTime, SystemTime)> {
        let first = self.samples.first()?.date;
        let last = self.samples.last()?.date;
        let end = match next_start {
            Some(next) if next > last => next,
            _ => last,
        };
        Some((first, end))
    }

    pub fn local_date_range(&self) -> Option<(SystemTime, SystemTime)> {
        self.date_range(None)
    }

    pub fn duration(&self) -> Duration {
        match self.local_date_range() {
            Some((start, end)) => end.duration_since(start).unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        }
    }

    /// True if no sample carries a usable smoothed location.
    pub fn is_nolo(&self) -> bool {
        !self.samples.iter().any(|s| {
            s.smoothed_location
                .map(|l| !(l.lat == 0.0 && l.lon == 0.0) && l.h_accuracy >= 0.0)
                .unwrap_or(false)
        })
    }

    fn locations(&self) -> Vec<(f64, f64)> {
        self.samples
            .iter()
            .filter_map(|s| s.smoothed_location.map(|l| (l.lat, l.lon)))
            .collect()
    }

    pub fn center(&self) -> Option<(f64, f64)> {
        if let Some(c) = *self.cached_center.borrow() {
            return Some(c);
        }
        let locs = self.locations();
        if locs.is_empty() {
            return None;
        }
        let (sx, sy, sz) = locs.iter().fold((0.0, 0.0, 0.0), |(sx, sy, sz), (lat, lon)| {
            let lat_r = lat.to_radians();
            let lon_r = lon.to_radians();
            (
                sx + lat_r.cos() * lon_r.cos(),
                sy + lat_r.cos() * lon_r.sin(),
                sz + lat_r.sin(),
            )
        });
        let n = locs.len() as f64;
        let (x, y, z) = (sx / n, sy / n, sz / n);
        let hyp = (x * x + y * y).sqrt();
        let center = (z.atan2(hyp).to_degrees(), y.atan2(x).to_degrees());
        *self.cached_center.borrow_mut() = Some(center);
        Some(center)
    }

    /// (mean, standard-deviation) of member-to-center distances.
    pub fn radius(&self) -> Option<(f64, f64)> {
        if let Some(r) = *self.cached_radius.borrow() {
            return Some(r);
        }
        let center = self.center()?;
        let locs = self.locations();
        if locs.is_empty() {
            return None;
        }
        let distances: Vec<f64> = locs.iter().map(|l| haversine_m(*l, center)).collect();
        let mean = distances.iter().sum::<f64>() / distances.len() as f64;
        let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / distances.len() as f64;
        let result = (mean, variance.sqrt());
        *self.cached_radius.borrow_mut() = Some(result);
        Some(result)
    }

    /// `radius.mean + sd * radius.sd`, clamped to `[minRadius, maxRadius]` (Visit only).
    pub fn radius_1sd(&self) -> Option<f64> {
        let (mean, sd) = self.radius()?;
        Some((mean + sd).clamp(self.thresholds.visit_min_radius, self.thresholds.visit_max_radius))
    }

    /// Visit containment test: `radius.mean + sd*radius.sd`, clamped.
    pub fn contains(&self, loc: (f64, f64), sd: f64) -> bool {
        if !self.is_visit() {
            return false;
        }
        let center = match self.center() {
            Some(c) => c,
            None => return false,
        };
        let (mean, radius_sd) = match self.radius() {
            Some(r) => r,
            None => return false,
        };
        let bound = (mean + sd * radius_sd).clamp(self.thresholds.visit_min_radius, self.thresholds.visit_max_radius);
        haversine_m(loc, center) <= bound
    }

    /// Sum of inter-sample geodesic distances (Path only).
    pub fn distance(&self) -> f64 {
        if !self.is_path() {
            return 0.0;
        }
        let locs = self.locations();
        locs.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
    }

    /// Path speed: distance/duration, unless a single-sample path reports
    /// its own instantaneous speed.
    pub fn speed(&self) -> f64 {
        if !self.is_path() {
            return 0.0;
        }
        if self.samples.len() == 1 {
            if let Some(loc) = self.samples[0].smoothed_location {
                if loc.speed >= 0.0 {
                    return loc.speed;
                }
            }
        }
        let dur = self.duration().as_secs_f64();
        if dur > 0.0 {
            self.distance() / dur
        } else {
            0.0
        }
    }

    pub fn start_speed(&self) -> Option<f64> {
        self.samples.first().and_then(|s| s.smoothed_location).map(|l| l.speed).filter(|s| *s >= 0.0)
    }

    pub fn end_speed(&self) -> Option<f64> {
        self.samples.last().and_then(|s| s.smoothed_location).map(|l| l.speed).filter(|s| *s >= 0.0)
    }

    fn activity_type_mode<F: Fn(&LocomotionSample) -> bool>(&self, filter: F) -> Option<String> {
        use std::collections::HashMap;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for s in self.samples.iter().filter(|s| filter(s)) {
            if let Some(t) = s.activity_type() {
                *counts.entry(t).or_insert(0) += 1;
            }
        }
        counts.into_iter().max_by_key(|(_, n)| *n).map(|(t, _)| t.to_string())
    }

    /// Mode activity type restricted to samples classified `Moving`.
    pub fn mode_moving_activity_type(&self) -> Option<String> {
        self.activity_type_mode(|s| s.moving_state == MovingState::Moving)
    }

    /// Mode activity type across all samples.
    pub fn mode_activity_type(&self) -> Option<String> {
        self.activity_type_mode(|_| true)
    }

    pub fn segments(&self) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut iter = self.samples.iter();
        let Some(first) = iter.next() else { return segments };
        let mut current_type = first.activity_type().map(str::to_string);
        let mut start = first.date;
        let mut end = first.date;
        for s in iter {
            let t = s.activity_type().map(str::to_string);
            if t == current_type {
                end = s.date;
            } else {
                segments.push(Segment { activity_type: current_type, start, end });
                current_type = t;
                start = s.date;
                end = s.date;
            }
        }
        segments.push(Segment { activity_type: current_type, start, end });
        segments
    }

    /// Whether the item satisfies its kind's structural/temporal minimums.
    pub fn is_valid(&self) -> bool {
        match self.variant {
            ItemVariant::Visit => {
                self.n() >= 1 && !self.is_nolo() && self.duration() >= self.thresholds.visit_min_valid_duration
            }
            ItemVariant::Path => {
                if self.is_data_gap() {
                    self.duration() >= self.thresholds.data_gap_min_valid_duration
                } else if self.is_nolo() {
                    self.duration() >= self.thresholds.path_min_valid_duration
                } else {
                    self.n() >= self.thresholds.path_min_samples
                        && self.duration() >= self.thresholds.path_min_valid_duration
                        && self.distance() >= self.thresholds.path_min_valid_distance
                }
            }
        }
    }

    /// Whether the item is worth preserving outright during a merge.
    pub fn is_worth_keeping(&self) -> bool {
        if !self.is_valid() {
            return false;
        }
        match self.variant {
            ItemVariant::Visit => self.duration() >= self.thresholds.visit_min_keeper_duration,
            ItemVariant::Path => {
                if self.is_data_gap() {
                    self.duration() >= self.thresholds.data_gap_min_keeper_duration
                } else {
                    self.duration() >= self.thresholds.path_min_keeper_duration
                        && self.distance() >= self.thresholds.path_min_keeper_distance
                }
            }
        }
    }

    pub fn keepness(&self) -> ItemKeepness {
        if self.is_worth_keeping() {
            ItemKeepness::Keeper
        } else if self.is_valid() {
            ItemKeepness::Valid
        } else {
            ItemKeepness::Invalid
        }
    }

    /// The processor must never mutate a merge-locked item.
    pub fn is_merge_locked(&self) -> bool {
        (self.is_current_item && !self.is_worth_keeping()) || self.disabled || self.invalidated
    }

    pub fn break_edges(&mut self) {
        self.previous_item_id = None;
        self.next_item_id = None;
    }

    /// Refuses to delete a merge-locked or non-empty item.
    pub fn delete(&mut self) -> Result<(), crate::error::ItemError> {
        if self.is_merge_locked() {
            return Err(crate::error::ItemError::MergeLocked(self.id));
        }
        if !self.samples.is_empty() {
            return Err(crate::error::ItemError::NotEmpty(self.id));
        }
        self.deleted = true;
        self.break_edges();
        Ok(())
    }

    pub fn disable(&mut self) {
        self.disabled = true;
        for s in &mut self.samples {
            s.disabled = true;
        }
        self.break_edges();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FilteredLocation, RecordingState};

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
    fn visit_valid_and_keeper_thresholds() {
        let mut v = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
        v.add(vec![sample_at(0, 0.0, 0.0, MovingState::Stationary)]);
        assert!(!v.is_valid(), "single-instant visit has zero duration");

        v.add(vec![sample_at(9, 0.0, 0.0, MovingState::Stationary)]);
        assert!(v.is_valid());
        assert!(!v.is_worth_keeping());

        v.add(vec![sample_at(120, 0.0, 0.0, MovingState::Stationary)]);
        assert!(v.is_worth_keeping());
    }

    #[test]
    fn path_distance_accumulates_segment_lengths() {
        let mut p = TimelineItem::new(ItemVariant::Path, "native", ItemThresholds::default());
        p.add(vec![
            sample_at(0, 0.0, 0.0, MovingState::Moving),
            sample_at(10, 0.001, 0.0, MovingState::Moving),
        ]);
        assert!(p.distance() > 90.0);
    }

    #[test]
    fn data_gap_of_exactly_60s_is_valid_59s_is_not() {
        let mut gap = TimelineItem::new(ItemVariant::Path, "native", ItemThresholds::default());
        let mut a = sample_at(0, 0.0, 0.0, MovingState::Uncertain);
        a.recording_state = RecordingState::Off;
        a.smoothed_location = None;
        let mut b = a.clone();
        b.date = SystemTime::UNIX_EPOCH + Duration::from_secs(60);
        gap.add(vec![a.clone(), b]);
        assert!(gap.is_data_gap());
        assert!(gap.is_valid());

        let mut gap59 = TimelineItem::new(ItemVariant::Path, "native", ItemThresholds::default());
        let mut c = a.clone();
        let mut d = a.clone();
        d.date = SystemTime::UNIX_EPOCH + Duration::from_secs(59);
        c.date = SystemTime::UNIX_EPOCH;
        gap59.add(vec![c, d]);
        assert!(!gap59.is_valid());
    }

    #[test]
    fn disable_cascades_to_samples_and_breaks_edges() {
        let mut v = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
        v.next_item_id = Some(ItemId::new());
        v.add(vec![sample_at(0, 0.0, 0.0, MovingState::Stationary)]);
        v.disable();
        assert!(v.disabled);
        assert!(v.next_item_id.is_none());
        assert!(v.samples()[0].disabled);
    }
}
