//! `TimelineRecorder`: the state machine driving sample
//! production, sleep-mode management, and current-item creation.
//!
//! Structurally this plays the role the teacher's `GodViewAgent::tick`
//! plays for its engines: a single synchronous entry point, called once per
//! timer tick or sensor callback, that advances the brain and then performs
//! one bounded unit of timeline work before returning: each timer tick or
//! sensor callback runs to completion before another starts.

use crate::activity_brain::ActivityBrain;
use crate::notifications::{Notification, NotificationSink};
use crate::sample::LocomotionSample;
use crate::settings::{ItemThresholds, RecorderSettings};
use crate::store::Store;
use crate::timeline_item::{ItemVariant, TimelineItem};
use crate::types::{
    InertialReading, MotionActivityReport, MovingState, PedometerReading, RawFix, RecordingState,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Off,
    Recording,
    Sleeping,
    DeepSleeping,
    Wakeup,
    Standby,
}

pub struct TimelineRecorder<S: Store> {
    state: RecorderState,
    brain: ActivityBrain,
    settings: RecorderSettings,
    thresholds: ItemThresholds,
    store: Arc<S>,
    sink: Arc<dyn NotificationSink>,
    current_item: Option<TimelineItem>,
    last_sample_at: Option<SystemTime>,
    sleep_wake_at: Option<SystemTime>,
    source: String,
    recent_motion_activity: Vec<MotionActivityReport>,
    last_moving_state: Option<MovingState>,
}

impl<S: Store> TimelineRecorder<S> {
    pub fn new(
        brain_settings: crate::settings::BrainSettings,
        settings: RecorderSettings,
        thresholds: ItemThresholds,
        store: Arc<S>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            state: RecorderState::Off,
            brain: ActivityBrain::new(brain_settings),
            settings,
            thresholds,
            store,
            sink,
            current_item: None,
            last_sample_at: None,
            sleep_wake_at: None,
            source: "native".to_string(),
            recent_motion_activity: Vec::new(),
            last_moving_state: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn current_item(&self) -> Option<&TimelineItem> {
        self.current_item.as_ref()
    }

    pub fn brain(&self) -> &ActivityBrain {
        &self.brain
    }

    /// Skips the brain's warm-up confidence requirement, for replaying a
    /// batch of fixes known in advance rather than arriving live.
    pub fn set_process_historical(&mut self, value: bool) {
        self.brain.process_historical = value;
    }

    fn sample_period(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.settings.samples_per_minute as f64)
    }

    fn recording_state_for(state: RecorderState) -> RecordingState {
        match state {
            RecorderState::Recording => RecordingState::Recording,
            RecorderState::Sleeping => RecordingState::Sleeping,
            RecorderState::DeepSleeping => RecordingState::DeepSleeping,
            RecorderState::Wakeup => RecordingState::Wakeup,
            RecorderState::Off | RecorderState::Standby => RecordingState::Off,
        }
    }

    /// Moves to `new_state`, notifying `RecordingStateChanged` if it
    /// differs from the current one.
    fn set_state(&mut self, new_state: RecorderState) {
        if new_state == self.state {
            return;
        }
        let from = Self::recording_state_for(self.state);
        let to = Self::recording_state_for(new_state);
        self.state = new_state;
        if from != to {
            self.sink.notify(Notification::RecordingStateChanged { from, to });
        }
    }

    // ---- Inbound signals ----

    pub fn add_raw_fix(&mut self, fix: RawFix) {
        self.brain.add(fix, None);
    }

    pub fn add_raw_fix_trusted(&mut self, fix: RawFix, trust_factor: f64) {
        self.brain.add(fix, Some(trust_factor));
    }

    pub fn add_pedometer(&mut self, reading: PedometerReading) {
        self.brain.add_pedometer(reading);
    }

    pub fn add_inertial(&mut self, reading: InertialReading) {
        self.brain.add_inertial(reading);
    }

    pub fn add_motion_activity(&mut self, report: MotionActivityReport) {
        self.recent_motion_activity.push(report);
    }

    // ---- Control ----

    pub fn start_recording(&mut self, now: SystemTime) -> Result<(), crate::error::StoreError> {
        self.maybe_insert_sleep_gap(now)?;
        self.set_state(RecorderState::Recording);
        Ok(())
    }

    pub fn stop_recording(&mut self) {
        self.set_state(RecorderState::Off);
    }

    pub fn start_standby(&mut self) {
        self.set_state(RecorderState::Standby);
    }

    pub fn request_deep_sleep(&mut self, until: SystemTime, now: SystemTime) {
        let out = until.duration_since(now).unwrap_or(Duration::ZERO);
        if out >= Duration::from_secs(15 * 60) {
            self.set_state(RecorderState::DeepSleeping);
            self.sleep_wake_at = Some(until);
        }
    }

    fn maybe_insert_sleep_gap(&mut self, now: SystemTime) -> Result<(), crate::error::StoreError> {
        let Some(last) = &self.current_item else { return Ok(()) };
        if last.is_data_gap() {
            return Ok(());
        }
        let Some((_, last_end)) = last.local_date_range() else { return Ok(()) };
        let age = now.duration_since(last_end).unwrap_or(Duration::ZERO);
        if age <= self.settings.sleep_cycle_duration {
            return Ok(());
        }

        let mut gap = TimelineItem::new(ItemVariant::Path, self.source.clone(), self.thresholds);
        gap.previous_item_id = Some(last.id);
        gap.add(vec![
            LocomotionSample::synthetic_off(last_end),
            LocomotionSample::synthetic_off(now),
        ]);
        self.store.upsert_item(&gap)?;
        self.sink.notify(Notification::NewTimelineItem { id: gap.id });

        if let Some(prev) = &mut self.current_item {
            prev.next_item_id = Some(gap.id);
            self.store.upsert_item(prev)?;
        }
        self.current_item = Some(gap);
        Ok(())
    }

    /// Advances the brain and, if a sample is due, materialises it and runs
    /// the item-building/state-transition logic.
    pub fn tick(&mut self, now: SystemTime) -> Result<Option<LocomotionSample>, crate::error::StoreError> {
        if matches!(self.state, RecorderState::Off | RecorderState::Standby) {
            return Ok(None);
        }

        let wakeup = matches!(self.state, RecorderState::Wakeup);
        let _ = self.brain.update(now, wakeup);

        let moving_state = self.brain.moving_state();
        if self.last_moving_state.map(|s| s != moving_state).unwrap_or(true) {
            if let Some(from) = self.last_moving_state {
                self.sink.notify(Notification::MovingStateChanged { from, to: moving_state });
            }
            self.last_moving_state = Some(moving_state);
        }

        let due = match self.last_sample_at {
            Some(last) => now.duration_since(last).unwrap_or(Duration::ZERO) >= self.sample_period(),
            None => true,
        };
        if !due {
            return Ok(None);
        }
        self.last_sample_at = Some(now);

        let recording_state = Self::recording_state_for(self.state);

        let present = self.brain.present();
        let smoothed = present.filtered().last().copied();
        let sample = LocomotionSample::new(
            now,
            smoothed,
            present.raws().to_vec(),
            present.filtered().to_vec(),
            self.brain.moving_state(),
            recording_state,
            0,
        );
        self.store.upsert_sample(&sample)?;
        self.sink.notify(Notification::LocomotionSampleUpdated);

        self.build_item(sample.clone())?;
        self.transition(now)?;

        Ok(Some(sample))
    }

    fn build_item(&mut self, sample: LocomotionSample) -> Result<(), crate::error::StoreError> {
        let is_moving = matches!(sample.moving_state, MovingState::Moving);
        let is_stationary = matches!(sample.moving_state, MovingState::Stationary);

        let should_append = match &self.current_item {
            None => false,
            Some(current) if current.is_data_gap() => false,
            Some(current) => {
                if current.is_visit() {
                    is_stationary
                } else {
                    // Path
                    if is_moving {
                        let same_type = current
                            .mode_moving_activity_type()
                            .as_deref()
                            == sample.activity_type();
                        let both_fast = current
                            .end_speed()
                            .zip(sample.smoothed_location.map(|l| l.speed))
                            .map(|(a, b)| a > self.thresholds_mode_shift() && b > self.thresholds_mode_shift())
                            .unwrap_or(false);
                        same_type || both_fast
                    } else {
                        false
                    }
                }
            }
        };

        if should_append {
            let invoke_pruning = self
                .current_item
                .as_ref()
                .map(|c| c.is_visit() && matches!(sample.recording_state, RecordingState::Sleeping | RecordingState::DeepSleeping))
                .unwrap_or(false);
            if let Some(current) = &mut self.current_item {
                current.add(vec![sample]);
                self.store.upsert_item(current)?;
                self.sink.notify(Notification::UpdatedTimelineItem { id: current.id });
            }
            if invoke_pruning {
                debug!("sleep-state append triggers pruning request");
            }
            return Ok(());
        }

        let new_kind = if is_moving { ItemVariant::Path } else { ItemVariant::Visit };
        let mut new_item = TimelineItem::new(new_kind, self.source.clone(), self.thresholds);
        if let Some(prev) = &mut self.current_item {
            new_item.previous_item_id = Some(prev.id);
            prev.next_item_id = Some(new_item.id);
            self.store.upsert_item(prev)?;
        }
        new_item.add(vec![sample]);
        new_item.is_current_item = true;
        if let Some(prev) = self.current_item.take() {
            let mut prev = prev;
            prev.is_current_item = false;
            self.store.upsert_item(&prev)?;
        }
        self.store.upsert_item(&new_item)?;
        self.sink.notify(Notification::NewTimelineItem { id: new_item.id });
        self.sink.notify(Notification::CurrentItemChanged { id: Some(new_item.id) });
        self.current_item = Some(new_item);
        Ok(())
    }

    fn thresholds_mode_shift(&self) -> f64 {
        2.0 / 3.6 // maximumModeShiftSpeed, ≈2 km/h in m/s
    }

    fn transition(&mut self, now: SystemTime) -> Result<(), crate::error::StoreError> {
        match self.state {
            RecorderState::Recording => {
                let stationary = matches!(self.brain.moving_state(), MovingState::Stationary);
                let long_enough = self
                    .brain
                    .stationary_period_start()
                    .map(|start| now.duration_since(start).unwrap_or(Duration::ZERO) >= self.settings.sleep_after_stationary_duration)
                    .unwrap_or(false);
                let current_is_keeper_visit = self
                    .current_item
                    .as_ref()
                    .map(|c| c.is_visit() && c.is_worth_keeping())
                    .unwrap_or(false);
                if stationary && long_enough && current_is_keeper_visit {
                    self.sink.notify(Notification::WillStartSleepMode);
                    self.brain.freeze();
                    self.set_state(RecorderState::Sleeping);
                    self.sleep_wake_at = Some(now + self.settings.sleep_cycle_duration);
                    self.sink.notify(Notification::DidStartSleepMode);
                    self.sink.notify(Notification::WentFromRecordingToSleepMode);
                }
            }
            RecorderState::Sleeping => {
                if self
                    .sleep_wake_at
                    .map(|wake| now >= wake)
                    .unwrap_or(false)
                {
                    self.set_state(RecorderState::Wakeup);
                }
            }
            RecorderState::Wakeup => {
                let has_data = self.brain.present().n() > 0;
                match self.brain.moving_state() {
                    MovingState::Stationary => {
                        self.sleep_wake_at = Some(now + self.settings.sleep_cycle_duration);
                        self.set_state(RecorderState::Sleeping);
                    }
                    MovingState::Uncertain if !has_data && self.settings.ignore_no_location_data_during_wakeups => {
                        self.sleep_wake_at = Some(now + self.settings.sleep_cycle_duration);
                        self.set_state(RecorderState::Sleeping);
                    }
                    MovingState::Moving => {
                        self.set_state(RecorderState::Recording);
                        self.sink.notify(Notification::WentFromSleepModeToRecording);
                    }
                    MovingState::Uncertain => {
                        // stay in wakeup, keep collecting
                    }
                }
            }
            RecorderState::DeepSleeping => {
                if self.sleep_wake_at.map(|wake| now >= wake).unwrap_or(false) {
                    self.set_state(RecorderState::Wakeup);
                }
            }
            RecorderState::Off | RecorderState::Standby => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::notifications::NullSink;
    use crate::settings::BrainSettings;

    fn fix(secs: u64, lat: f64, lon: f64, h_acc: f64) -> RawFix {
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

    fn new_recorder() -> TimelineRecorder<MemoryStore> {
        TimelineRecorder::new(
            BrainSettings::default(),
            RecorderSettings::default(),
            ItemThresholds::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(NullSink),
        )
    }

    #[test]
    fn cold_start_stationary_creates_visit() {
        let mut rec = new_recorder();
        rec.start_recording(SystemTime::UNIX_EPOCH).unwrap();
        rec.brain.process_historical = true;
        for i in 0..8u64 {
            let t = SystemTime::UNIX_EPOCH + Duration::from_secs(i * 10);
            rec.add_raw_fix(fix(i * 10, 0.0, 0.0, 20.0));
            rec.tick(t).unwrap();
        }
        let item = rec.current_item().expect("expected a current item");
        assert!(item.is_visit());
        assert!(item.radius().map(|(mean, _)| mean < 5.0).unwrap_or(false));
    }
}
