//! Shared value types: raw/filtered signals, ids, and small enums used
//! throughout the engine.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Identifier for a persisted [`crate::timeline_item::TimelineItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a persisted [`crate::sample::LocomotionSample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleId(pub Uuid);

impl SampleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SampleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single unsmoothed positional measurement.
///
/// `hAccuracy < 0` means the fix is unusable; `speed`/`course` use negative
/// sentinels when unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    pub timestamp: SystemTime,
    pub lat: f64,
    pub lon: f64,
    pub altitude: f64,
    pub h_accuracy: f64,
    pub v_accuracy: f64,
    /// Negative sentinel (< 0) when unavailable.
    pub speed: f64,
    /// Negative sentinel (< 0) when unavailable.
    pub course: f64,
}

impl RawFix {
    pub fn has_speed(&self) -> bool {
        self.speed >= 0.0
    }

    pub fn has_course(&self) -> bool {
        self.course >= 0.0
    }

    pub fn is_usable(&self) -> bool {
        self.h_accuracy >= 0.0 && !(self.lat == 0.0 && self.lon == 0.0)
    }
}

/// A fix after Kalman smoothing. Same shape as [`RawFix`], but
/// `h_accuracy` is the filter's posterior standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilteredLocation {
    pub timestamp: SystemTime,
    pub lat: f64,
    pub lon: f64,
    pub altitude: f64,
    pub h_accuracy: f64,
    pub v_accuracy: f64,
    pub course: f64,
    pub speed: f64,
}

/// One pedometer report covering a time span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PedometerReading {
    pub start: SystemTime,
    pub end: SystemTime,
    pub steps: u32,
    pub cadence: Option<f64>,
}

/// One inertial (device-motion frame) reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InertialReading {
    pub timestamp: SystemTime,
    pub user_accel_x: f64,
    pub user_accel_y: f64,
    pub user_accel_z: f64,
}

/// Motion-activity classifier class, as reported by `addMotionActivity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionActivityType {
    Stationary,
    Automotive,
    Walking,
    Running,
    Cycling,
    Unknown,
}

/// Confidence level attached to a [`MotionActivityType`] report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MotionActivityConfidence {
    Low,
    Medium,
    High,
}

impl MotionActivityConfidence {
    pub fn initial_weight(self) -> f64 {
        match self {
            MotionActivityConfidence::Low => 0.33,
            MotionActivityConfidence::Medium => 0.66,
            MotionActivityConfidence::High => 1.00,
        }
    }
}

/// A single motion-activity report, decaying linearly to zero over 30 s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionActivityReport {
    pub timestamp: SystemTime,
    pub class: MotionActivityType,
    pub confidence: MotionActivityConfidence,
}

const MOTION_ACTIVITY_DECAY: Duration = Duration::from_secs(30);
const STATIONARY_BIAS: f64 = -0.01;

impl MotionActivityReport {
    /// Weight of this report at `now`, decayed linearly to 0 over 30 s and
    /// biased slightly against `stationary` so genuine motion wins ties.
    pub fn weight_at(&self, now: SystemTime) -> f64 {
        let age = now
            .duration_since(self.timestamp)
            .unwrap_or(Duration::ZERO);
        if age >= MOTION_ACTIVITY_DECAY {
            return 0.0;
        }
        let remaining = (MOTION_ACTIVITY_DECAY - age).as_secs_f64() / MOTION_ACTIVITY_DECAY.as_secs_f64();
        let mut w = self.confidence.initial_weight() * remaining;
        if matches!(self.class, MotionActivityType::Stationary) {
            w += STATIONARY_BIAS;
        }
        w.max(0.0)
    }
}

/// Real-time moving/stationary classification produced by the brain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovingState {
    Moving,
    Stationary,
    Uncertain,
}

/// Recorder state at the time a sample was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    Off,
    Recording,
    Sleeping,
    DeepSleeping,
    Wakeup,
    Standby,
}
