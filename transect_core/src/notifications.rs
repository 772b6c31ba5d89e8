//! Outbound notifications: semantics are contractual, transport is not.
//! Timers and delegate callbacks map to a channel/event-bus abstraction
//! delivering typed messages to the primary job queue; cross-process
//! delivery is fire-and-forget and may be dropped.

use crate::types::{ItemId, MovingState, RecordingState};

#[derive(Debug, Clone)]
pub enum Notification {
    LocomotionSampleUpdated,
    RecordingStateChanged { from: RecordingState, to: RecordingState },
    MovingStateChanged { from: MovingState, to: MovingState },
    WillStartSleepMode,
    DidStartSleepMode,
    WentFromRecordingToSleepMode,
    WentFromSleepModeToRecording,
    NewTimelineItem { id: ItemId },
    UpdatedTimelineItem { id: ItemId },
    MergedTimelineItems { keeper: ItemId, consumed: Vec<ItemId> },
    CurrentItemChanged { id: Option<ItemId> },
}

/// Sink for [`Notification`]s. A no-op sink is provided for tests; production
/// callers plug in a channel/event-bus of their choosing.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: Notification) {}
}

/// Collects notifications in-memory; used by tests and the scenario harness
/// to assert on emitted events.
#[derive(Default)]
pub struct RecordingSink {
    pub events: std::sync::Mutex<Vec<Notification>>,
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.events.lock().unwrap().push(notification);
    }
}
