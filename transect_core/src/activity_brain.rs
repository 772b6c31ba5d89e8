//! `ActivityBrain`: the dual-window decision engine that turns
//! a stream of raw fixes into a moving/stationary classification.
//!
//! Structurally this plays the role the teacher's `TrackManager` plays for
//! packet association: a bounded pipeline run once per ingest/update tick
//! that gates new evidence against existing state before committing a
//! decision — here "gate against the past window" stands in for the
//! teacher's Mahalanobis association gate.

use crate::brain_sample::{haversine_m, BrainSample};
use crate::error::BrainError;
use crate::kalman::KalmanFilter;
use crate::settings::BrainSettings;
use crate::types::{FilteredLocation, InertialReading, MovingState, PedometerReading, RawFix};
use std::time::{Duration, SystemTime};

pub struct ActivityBrain {
    settings: BrainSettings,
    present: BrainSample,
    past: BrainSample,
    past_frozen: bool,
    stationary_period_start: Option<SystemTime>,
    coord_lat: KalmanFilter,
    coord_lon: KalmanFilter,
    altitude: KalmanFilter,
    last_accepted_timestamp: Option<SystemTime>,
    /// When true, `maximumSampleAge` rejection is suppressed (replaying
    /// historical fixes rather than live ingestion).
    pub process_historical: bool,
}

impl ActivityBrain {
    pub fn new(settings: BrainSettings) -> Self {
        Self {
            present: BrainSample::new(settings.worst_allowed_location_accuracy),
            past: BrainSample::new(settings.worst_allowed_location_accuracy),
            past_frozen: false,
            stationary_period_start: None,
            coord_lat: KalmanFilter::new(settings.coordinate_process_noise),
            coord_lon: KalmanFilter::new(settings.coordinate_process_noise),
            altitude: KalmanFilter::new(settings.altitude_process_noise),
            last_accepted_timestamp: None,
            process_historical: false,
            settings,
        }
    }

    pub fn present(&self) -> &BrainSample {
        &self.present
    }

    pub fn past(&self) -> &BrainSample {
        &self.past
    }

    pub fn past_frozen(&self) -> bool {
        self.past_frozen
    }

    pub fn stationary_period_start(&self) -> Option<SystemTime> {
        self.stationary_period_start
    }

    pub fn moving_state(&self) -> MovingState {
        self.present.moving_state
    }

    /// Ingests one raw fix, optionally discounted by a trust factor in
    /// `[0, 1]`. A `trust_factor` of `None` behaves identically to `Some(1.0)`
    /// downstream consumers must not distinguish between the two encodings.
    pub fn add(&mut self, raw: RawFix, trust_factor: Option<f64>) {
        if let Some(last) = self.last_accepted_timestamp {
            if raw.timestamp <= last {
                return;
            }
        }
        if raw.h_accuracy < 0.0 {
            return;
        }
        if raw.lat == 0.0 && raw.lon == 0.0 {
            return;
        }

        self.present.push_raw(raw);

        let trust = trust_factor.unwrap_or(1.0);
        let (mut h_acc, mut v_acc) = (raw.h_accuracy, raw.v_accuracy);
        if trust < 1.0 {
            let inflation = 200.0 * (1.0 - trust);
            h_acc += inflation;
            v_acc += inflation;
        }

        let t = timestamp_secs(raw.timestamp);
        self.coord_lat.update(t, h_acc);
        self.coord_lon.update(t, h_acc);
        self.altitude.update(t, v_acc);

        let last_lat = self
            .present
            .filtered()
            .last()
            .map(|l| l.lat)
            .unwrap_or(raw.lat);
        let last_lon = self
            .present
            .filtered()
            .last()
            .map(|l| l.lon)
            .unwrap_or(raw.lon);
        let last_alt = self
            .present
            .filtered()
            .last()
            .map(|l| l.altitude)
            .unwrap_or(raw.altitude);

        let filtered = FilteredLocation {
            timestamp: raw.timestamp,
            lat: self.coord_lat.predict(last_lat, raw.lat),
            lon: self.coord_lon.predict(last_lon, raw.lon),
            altitude: self.altitude.predict(last_alt, raw.altitude),
            h_accuracy: self.coord_lat.accuracy().max(self.coord_lon.accuracy()),
            v_accuracy: raw.v_accuracy,
            course: raw.course,
            speed: raw.speed,
        };

        self.last_accepted_timestamp = Some(raw.timestamp);

        if !self.process_historical {
            let age = SystemTime::now()
                .duration_since(filtered.timestamp)
                .unwrap_or(Duration::ZERO);
            if age > self.settings.maximum_sample_age {
                return;
            }
        }
        if filtered.lat == 0.0 && filtered.lon == 0.0 {
            return;
        }

        self.present.insert_filtered(filtered);
    }

    pub fn add_pedometer(&mut self, reading: PedometerReading) {
        self.present.push_pedometer(reading);
    }

    pub fn add_inertial(&mut self, reading: InertialReading) {
        self.present.push_inertial(reading);
    }

    /// Required-N for the present window.
    fn required_n(&self) -> u32 {
        let accuracy = self.coord_lat.accuracy().max(self.coord_lon.accuracy());
        let kalman_n = if accuracy <= 0.0 {
            30.0
        } else {
            accuracy * 0.8
        };

        let kmh = {
            let speed = self.present.speed();
            if speed < 0.0 {
                -1.0
            } else {
                speed * 3.6
            }
        };
        let speed_n = if kmh < 0.0 {
            self.settings.max_speed_req
        } else {
            (self.settings.max_speed_req - kmh * (self.settings.max_speed_req / self.settings.speed_req_kmh))
                .clamp(0.0, self.settings.max_speed_req)
        };

        let raw = (kalman_n + speed_n) as i64;
        raw.clamp(
            self.settings.minimum_required_n as i64,
            self.settings.maximum_required_n as i64,
        ) as u32
    }

    fn dynamic_minimum_confidence_n(&self, wakeup: bool) -> u32 {
        if wakeup {
            self.settings.minimum_confidence_n_wakeup
        } else {
            self.settings.minimum_confidence_n
        }
    }

    fn trim_present_sample(&mut self, now: SystemTime, wakeup: bool) {
        let required_n = if wakeup {
            self.settings.minimum_required_n_wakeup.max(self.required_n())
        } else {
            self.required_n()
        };
        loop {
            let n = self.present.n();
            if n == 0 {
                break;
            }
            let over_required = n as u32 > required_n;
            let stale = !self.process_historical && self.present.age(now) > Duration::from_secs(60);
            let over_past = !self.past_frozen && n > self.past.n() + 4;

            if !(over_required || stale || over_past) {
                break;
            }

            if let Some(oldest) = self.present.pop_oldest_filtered() {
                if !self.past_frozen {
                    self.past.insert_filtered(oldest);
                }
            } else {
                break;
            }
        }
    }

    fn trim_past_sample(&mut self) {
        if self.past_frozen {
            return;
        }
        let cap = (self.present.n() * 2).max(2);
        while self.past.n() > cap {
            self.past.pop_oldest_filtered();
        }
    }

    fn update_moving(&mut self, wakeup: bool) {
        let n = self.present.n();
        if n == 0 {
            self.present.moving_state = MovingState::Uncertain;
            return;
        }
        if self.present.filtered().last().unwrap().h_accuracy > self.settings.worst_allowed_location_accuracy {
            self.present.moving_state = MovingState::Uncertain;
            return;
        }

        let latest = *self.present.filtered().last().unwrap();
        let past_center = self.past.weighted_center();

        if let Some(center) = past_center {
            let dist = haversine_m((latest.lat, latest.lon), center);
            if dist <= self.present.radius_bounded {
                self.present.moving_state = MovingState::Stationary;
                if self.stationary_period_start.is_none() {
                    self.stationary_period_start = Some(latest.timestamp);
                }
                return;
            }
        }

        let confidence_n = self.dynamic_minimum_confidence_n(wakeup);
        if n as u32 >= confidence_n {
            self.present.moving_state = MovingState::Moving;
        } else {
            self.present.moving_state = MovingState::Uncertain;
        }
    }

    /// Runs one update cycle: trim present, recompute, trim
    /// past, bound past's radius, decide moving state, maybe unfreeze.
    pub fn update(&mut self, now: SystemTime, wakeup: bool) -> Result<(), BrainError> {
        self.trim_present_sample(now, wakeup);
        self.present.invalidate_caches();
        let _ = self.present.weighted_center();
        let _ = self.present.radius();

        if !self.past_frozen {
            self.trim_past_sample();
            self.past.invalidate_caches();
            let _ = self.past.weighted_center();
            let _ = self.past.radius();
        }

        let present_accuracy = self
            .present
            .filtered()
            .last()
            .map(|l| l.h_accuracy)
            .unwrap_or(0.0);
        let past_radius = self.past.radius().unwrap_or(0.0);
        let mut radius_bounded = present_accuracy.max(past_radius);
        if !self.past_frozen {
            radius_bounded = radius_bounded.min(self.settings.worst_allowed_past_sample_radius);
        }
        self.past.radius_bounded = radius_bounded;

        self.update_moving(wakeup);

        if self.past_frozen && self.present.n() as u32 >= self.dynamic_minimum_confidence_n(wakeup) {
            self.past_frozen = false;
        }

        if self.present.n() == 0 {
            return Err(BrainError::EmptyPresentSample);
        }
        Ok(())
    }

    /// Flushes the present window and re-inflates both Kalman filters to
    /// the worst-allowed accuracy, used when the
    /// recorder enters sleep mode.
    pub fn freeze(&mut self) {
        self.past_frozen = true;
        self.stationary_period_start = None;
        self.present.clear();
        let worst = self.settings.worst_allowed_location_accuracy;
        self.coord_lat.reset_variance_to(worst);
        self.coord_lon.reset_variance_to(worst);
        self.altitude.reset_variance_to(worst);
    }
}

fn timestamp_secs(t: SystemTime) -> f64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix_at(secs: u64, lat: f64, lon: f64, h_acc: f64) -> RawFix {
        RawFix {
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            lat,
            lon,
            altitude: 0.0,
            h_accuracy: h_acc,
            v_accuracy: h_acc,
            speed: -1.0,
            course: -1.0,
        }
    }

    #[test]
    fn stationary_cluster_settles_to_stationary() {
        let mut brain = ActivityBrain::new(BrainSettings::default());
        brain.process_historical = true;
        for i in 0..8u64 {
            brain.add(fix_at(i * 10, 0.0, 0.0, 20.0), None);
            brain
                .update(SystemTime::UNIX_EPOCH + Duration::from_secs(i * 10), false)
                .unwrap();
        }
        assert_eq!(brain.moving_state(), MovingState::Stationary);
    }

    #[test]
    fn out_of_order_fix_is_dropped() {
        let mut brain = ActivityBrain::new(BrainSettings::default());
        brain.process_historical = true;
        brain.add(fix_at(10, 0.0, 0.0, 10.0), None);
        assert_eq!(brain.present().n(), 1);
        brain.add(fix_at(10, 1.0, 1.0, 10.0), None);
        assert_eq!(brain.present().n(), 1, "equal timestamp must be dropped");
    }

    #[test]
    fn unusable_coords_are_rejected() {
        let mut brain = ActivityBrain::new(BrainSettings::default());
        brain.add(fix_at(0, 0.0, 0.0, -5.0), None);
        assert_eq!(brain.present().n(), 0);
    }

    #[test]
    fn speed_req_kmh_boundary_yields_zero_extra_n() {
        let settings = BrainSettings::default();
        let brain = ActivityBrain::new(settings);
        let speed_n = (settings.max_speed_req
            - settings.speed_req_kmh * (settings.max_speed_req / settings.speed_req_kmh))
            .clamp(0.0, settings.max_speed_req);
        assert_eq!(speed_n, 0.0);
        let _ = brain;
    }
}
