//! transect_core — locomotion sensor fusion and timeline construction engine.
//!
//! Turns a stream of raw location fixes, pedometer readings and inertial
//! samples into a linked-list timeline of `Visit`/`Path` items: per-axis
//! Kalman filtering and a dual-window moving/stationary brain feed a
//! recorder state machine that materialises `LocomotionSample`s and builds
//! items, while a separate processor merges, heals and prunes that timeline
//! under a discrete consumption-scoring scheme.

pub mod activity_brain;
pub mod brain_sample;
pub mod error;
pub mod kalman;
pub mod memory_store;
pub mod merge;
pub mod notifications;
pub mod processor;
pub mod recorder;
pub mod sample;
pub mod settings;
pub mod sled_store;
pub mod store;
pub mod timeline_item;
pub mod types;

pub use activity_brain::ActivityBrain;
pub use error::{BrainError, ItemError, ProcessorError, StoreError};
pub use kalman::KalmanFilter;
pub use memory_store::MemoryStore;
pub use merge::{score_for_consuming, ConsumptionScore, MergeCandidate};
pub use notifications::{Notification, NotificationSink, NullSink, RecordingSink};
pub use processor::TimelineProcessor;
pub use recorder::{RecorderState, TimelineRecorder};
pub use sample::{ClassifierResults, LocomotionSample};
pub use settings::{BrainSettings, ItemThresholds, ProcessorSettings, RecorderSettings};
pub use sled_store::SledStore;
pub use store::{ChangeSet, Store};
pub use timeline_item::{ItemKeepness, ItemVariant, Segment, TimelineItem};
pub use types::{
    FilteredLocation, InertialReading, ItemId, MotionActivityConfidence,
    MotionActivityReport, MotionActivityType, MovingState, PedometerReading, RawFix,
    RecordingState, SampleId,
};
