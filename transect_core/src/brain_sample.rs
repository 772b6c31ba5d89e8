//! `BrainSample`: a bounded, time-ordered window of
//! filtered locations plus auxiliary signals, with cached derived values.
//!
//! The weighted-center calculation generalizes the teacher's
//! `godview_space::WorldShard` local equirectangular projection into a full
//! unit-sphere Cartesian average — the present/past windows here can span
//! distances the teacher's flat local projection was never meant to cover.

use crate::types::{
    FilteredLocation, InertialReading, MovingState, PedometerReading, RawFix,
};
use geo::{HaversineBearing, HaversineDistance, Point};
use std::time::{Duration, SystemTime};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// One of the brain's two rolling windows (`present` or `past`).
#[derive(Debug, Clone)]
pub struct BrainSample {
    filtered: Vec<FilteredLocation>,
    raws: Vec<RawFix>,
    pedometer: Vec<PedometerReading>,
    inertial: Vec<InertialReading>,

    /// Worst accuracy tolerated when weighting members for the center
    /// calculation; mirrors the brain's `worstAllowedLocationAccuracy`.
    worst_accuracy: f64,

    pub radius_bounded: f64,
    pub moving_state: MovingState,

    cached_center: Option<(f64, f64)>,
    cached_radius: Option<f64>,
}

impl BrainSample {
    pub fn new(worst_accuracy: f64) -> Self {
        Self {
            filtered: Vec::new(),
            raws: Vec::new(),
            pedometer: Vec::new(),
            inertial: Vec::new(),
            worst_accuracy,
            radius_bounded: 0.0,
            moving_state: MovingState::Uncertain,
            cached_center: None,
            cached_radius: None,
        }
    }

    pub fn n(&self) -> usize {
        self.filtered.len()
    }

    pub fn filtered(&self) -> &[FilteredLocation] {
        &self.filtered
    }

    pub fn raws(&self) -> &[RawFix] {
        &self.raws
    }

    pub fn push_raw(&mut self, raw: RawFix) {
        self.raws.push(raw);
    }

    pub fn push_pedometer(&mut self, reading: PedometerReading) {
        self.pedometer.push(reading);
    }

    pub fn push_inertial(&mut self, reading: InertialReading) {
        self.inertial.push(reading);
    }

    /// Inserts a filtered location in timestamp order, dropping it if an
    /// equal-or-older timestamp already exists.
    pub fn insert_filtered(&mut self, loc: FilteredLocation) {
        if let Some(last) = self.filtered.last() {
            if loc.timestamp <= last.timestamp {
                return;
            }
        }
        self.filtered.push(loc);
        self.invalidate_caches();
    }

    /// Removes and returns the oldest filtered location, if any.
    pub fn pop_oldest_filtered(&mut self) -> Option<FilteredLocation> {
        if self.filtered.is_empty() {
            return None;
        }
        let front = self.filtered.remove(0);
        self.invalidate_caches();
        Some(front)
    }

    pub fn invalidate_caches(&mut self) {
        self.cached_center = None;
        self.cached_radius = None;
    }

    pub fn clear(&mut self) {
        self.filtered.clear();
        self.raws.clear();
        self.pedometer.clear();
        self.inertial.clear();
        self.invalidate_caches();
    }

    pub fn age(&self, now: SystemTime) -> Duration {
        match self.filtered.last() {
            Some(last) => now.duration_since(last.timestamp).unwrap_or(Duration::ZERO),
            None => Duration::MAX,
        }
    }

    pub fn time_range(&self) -> Option<(SystemTime, SystemTime)> {
        match (self.filtered.first(), self.filtered.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        }
    }

    fn member_weight(&self, loc: &FilteredLocation) -> f64 {
        1.0 - (loc.h_accuracy / (self.worst_accuracy + 5.0))
    }

    /// Cartesian (unit-sphere) weighted average of member coordinates,
    /// projected back to (lat, lon).
    pub fn weighted_center(&mut self) -> Option<(f64, f64)> {
        if let Some(c) = self.cached_center {
            return Some(c);
        }
        if self.filtered.is_empty() {
            return None;
        }

        let weights: Vec<f64> = self.filtered.iter().map(|l| self.member_weight(l)).collect();
        let all_equal = weights.windows(2).all(|w| (w[0] - w[1]).abs() < 1e-12);
        let weights: Vec<f64> = if all_equal {
            vec![1.0; weights.len()]
        } else {
            weights
        };

        let (mut x, mut y, mut z, mut wsum) = (0.0, 0.0, 0.0, 0.0);
        for (loc, w) in self.filtered.iter().zip(weights.iter()) {
            let lat = loc.lat.to_radians();
            let lon = loc.lon.to_radians();
            x += w * lat.cos() * lon.cos();
            y += w * lat.cos() * lon.sin();
            z += w * lat.sin();
            wsum += w;
        }
        x /= wsum;
        y /= wsum;
        z /= wsum;

        let hyp = (x * x + y * y).sqrt();
        let lat = z.atan2(hyp).to_degrees();
        let lon = y.atan2(x).to_degrees();

        let center = (lat, lon);
        self.cached_center = Some(center);
        Some(center)
    }

    /// Mean + unweighted standard deviation of member-to-center distances.
    pub fn radius(&mut self) -> Option<f64> {
        if let Some(r) = self.cached_radius {
            return Some(r);
        }
        let center = self.weighted_center()?;
        let center_pt = Point::new(center.1, center.0);

        let distances: Vec<f64> = self
            .filtered
            .iter()
            .map(|loc| {
                let p = Point::new(loc.lon, loc.lat);
                p.haversine_distance(&center_pt)
            })
            .collect();

        if distances.is_empty() {
            return None;
        }
        let mean = distances.iter().sum::<f64>() / distances.len() as f64;
        let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>()
            / distances.len() as f64;
        let radius = mean + variance.sqrt();
        self.cached_radius = Some(radius);
        Some(radius)
    }

    /// Circular mean of consecutive bearings; `-1.0` sentinel if there are
    /// fewer than two members.
    pub fn course(&self) -> f64 {
        if self.filtered.len() < 2 {
            return -1.0;
        }
        let (mut sin_sum, mut cos_sum) = (0.0, 0.0);
        for pair in self.filtered.windows(2) {
            let a = Point::new(pair[0].lon, pair[0].lat);
            let b = Point::new(pair[1].lon, pair[1].lat);
            let bearing = a.haversine_bearing(b).to_radians();
            sin_sum += bearing.sin();
            cos_sum += bearing.cos();
        }
        sin_sum.atan2(cos_sum).to_degrees().rem_euclid(360.0)
    }

    /// Mean of valid raw speeds, else filtered distance/duration, else
    /// `-1.0`.
    pub fn speed(&self) -> f64 {
        let raw_speeds: Vec<f64> = self.raws.iter().filter(|r| r.has_speed()).map(|r| r.speed).collect();
        if !raw_speeds.is_empty() {
            return raw_speeds.iter().sum::<f64>() / raw_speeds.len() as f64;
        }
        if self.filtered.len() >= 2 {
            let first = self.filtered.first().unwrap();
            let last = self.filtered.last().unwrap();
            let dist = Point::new(first.lon, first.lat).haversine_distance(&Point::new(last.lon, last.lat));
            let dur = last
                .timestamp
                .duration_since(first.timestamp)
                .unwrap_or(Duration::ZERO)
                .as_secs_f64();
            if dur > 0.0 {
                return dist / dur;
            }
        }
        -1.0
    }

    /// Step frequency (Hz) derived from pedometer readings that straddle
    /// the sample's date (its last filtered timestamp).
    pub fn step_hz(&self) -> Option<f64> {
        let date = self.filtered.last()?.timestamp;
        let straddling: Vec<&PedometerReading> = self
            .pedometer
            .iter()
            .filter(|p| p.start <= date && p.end >= date)
            .collect();
        if straddling.is_empty() {
            return None;
        }
        let total_steps: u32 = straddling.iter().map(|p| p.steps).sum();
        let total_secs: f64 = straddling
            .iter()
            .map(|p| p.end.duration_since(p.start).unwrap_or(Duration::ZERO).as_secs_f64())
            .sum();
        if total_secs <= 0.0 {
            return None;
        }
        Some(total_steps as f64 / total_secs)
    }
}

/// Great-circle distance in metres between two (lat, lon) points.
pub fn haversine_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    Point::new(a.1, a.0).haversine_distance(&Point::new(b.1, b.0))
}

#[allow(dead_code)]
fn unit_sphere_radius() -> f64 {
    EARTH_RADIUS_M
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fl(t: u64, lat: f64, lon: f64, acc: f64) -> FilteredLocation {
        FilteredLocation {
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(t),
            lat,
            lon,
            altitude: 0.0,
            h_accuracy: acc,
            v_accuracy: acc,
            course: -1.0,
            speed: -1.0,
        }
    }

    #[test]
    fn weighted_center_of_identical_points_is_that_point() {
        let mut s = BrainSample::new(300.0);
        for i in 0..5 {
            s.insert_filtered(fl(i, 10.0, 20.0, 5.0));
        }
        let (lat, lon) = s.weighted_center().unwrap();
        assert!((lat - 10.0).abs() < 1e-6);
        assert!((lon - 20.0).abs() < 1e-6);
    }

    #[test]
    fn radius_grows_with_spread() {
        let mut s = BrainSample::new(300.0);
        s.insert_filtered(fl(0, 0.0, 0.0, 5.0));
        s.insert_filtered(fl(1, 0.001, 0.0, 5.0));
        let r = s.radius().unwrap();
        assert!(r > 0.0);
    }

    #[test]
    fn insert_drops_equal_or_older_timestamps() {
        let mut s = BrainSample::new(300.0);
        s.insert_filtered(fl(5, 0.0, 0.0, 5.0));
        s.insert_filtered(fl(5, 1.0, 1.0, 5.0));
        s.insert_filtered(fl(4, 2.0, 2.0, 5.0));
        assert_eq!(s.n(), 1);
    }

    #[test]
    fn course_sentinel_with_fewer_than_two_members() {
        let mut s = BrainSample::new(300.0);
        assert_eq!(s.course(), -1.0);
        s.insert_filtered(fl(0, 0.0, 0.0, 5.0));
        assert_eq!(s.course(), -1.0);
    }

    #[test]
    fn speed_falls_back_to_distance_over_duration() {
        let mut s = BrainSample::new(300.0);
        s.insert_filtered(fl(0, 0.0, 0.0, 5.0));
        s.insert_filtered(fl(10, 0.001, 0.0, 5.0));
        assert!(s.speed() > 0.0);
    }
}
