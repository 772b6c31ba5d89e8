//! `LocomotionSample`: an immutable snapshot materialised once by
//! the recorder and subsequently owned by exactly one timeline item.

use crate::types::{FilteredLocation, ItemId, MovingState, RawFix, RecordingState, SampleId};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Per-instant classifier output, opaque to the engine beyond its score
/// lookup (the classifier itself is an external collaborator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierResults {
    pub scores: Vec<(String, f64)>,
}

impl ClassifierResults {
    pub fn score_for(&self, activity_type: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|(name, _)| name == activity_type)
            .map(|(_, score)| *score)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocomotionSample {
    pub id: SampleId,
    pub date: SystemTime,
    pub smoothed_location: Option<FilteredLocation>,
    pub raw_locations: Vec<RawFix>,
    pub filtered_locations: Vec<FilteredLocation>,
    pub moving_state: MovingState,
    pub recording_state: RecordingState,
    pub step_hz: Option<f64>,
    pub course_variance: Option<f64>,
    pub xy_acceleration: Option<f64>,
    pub z_acceleration: Option<f64>,
    pub classifier_results: Option<ClassifierResults>,
    pub confirmed_type: Option<String>,
    pub classified_type: Option<String>,
    /// Local timezone offset from GMT, in seconds.
    pub seconds_from_gmt: i32,

    /// Owning item; `None` until adopted (or after deletion, orphaning).
    pub timeline_item_id: Option<ItemId>,
    pub deleted: bool,
    pub disabled: bool,
}

impl LocomotionSample {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        date: SystemTime,
        smoothed_location: Option<FilteredLocation>,
        raw_locations: Vec<RawFix>,
        filtered_locations: Vec<FilteredLocation>,
        moving_state: MovingState,
        recording_state: RecordingState,
        seconds_from_gmt: i32,
    ) -> Self {
        Self {
            id: SampleId::new(),
            date,
            smoothed_location,
            raw_locations,
            filtered_locations,
            moving_state,
            recording_state,
            step_hz: None,
            course_variance: None,
            xy_acceleration: None,
            z_acceleration: None,
            classifier_results: None,
            confirmed_type: None,
            classified_type: None,
            seconds_from_gmt,
            timeline_item_id: None,
            deleted: false,
            disabled: false,
        }
    }

    /// A synthetic edge sample marking the boundary of a data gap, used by
    /// a recorder sleep gap or processor data-gap insertion.
    pub fn synthetic_off(date: SystemTime) -> Self {
        Self::new(
            date,
            None,
            Vec::new(),
            Vec::new(),
            MovingState::Uncertain,
            RecordingState::Off,
            0,
        )
    }

    pub fn activity_type(&self) -> Option<&str> {
        self.confirmed_type
            .as_deref()
            .or(self.classified_type.as_deref())
    }
}
