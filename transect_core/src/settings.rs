//! Tunable constants recognised by the brain, recorder, and processor.
//!
//! These mirror the teacher's `TrackingConfig`/`AgentConfig` shape: a plain
//! `Default`-implementing struct per engine, no external config-file crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings recognised by [`crate::activity_brain::ActivityBrain`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrainSettings {
    pub worst_allowed_location_accuracy: f64,
    pub worst_allowed_past_sample_radius: f64,
    pub maximum_sample_age: Duration,
    pub minimum_required_n: u32,
    pub minimum_required_n_wakeup: u32,
    pub maximum_required_n: u32,
    pub minimum_confidence_n: u32,
    pub minimum_confidence_n_wakeup: u32,
    pub max_speed_req: f64,
    pub speed_req_kmh: f64,
    pub speed_sample_n: u32,
    pub coordinate_process_noise: f64,
    pub altitude_process_noise: f64,
}

impl Default for BrainSettings {
    fn default() -> Self {
        Self {
            worst_allowed_location_accuracy: 300.0,
            worst_allowed_past_sample_radius: 65.0,
            maximum_sample_age: Duration::from_secs(60),
            minimum_required_n: 5,
            minimum_required_n_wakeup: 8,
            maximum_required_n: 60,
            minimum_confidence_n: 5,
            minimum_confidence_n_wakeup: 7,
            max_speed_req: 7.0,
            speed_req_kmh: 6.0,
            speed_sample_n: 4,
            coordinate_process_noise: 4.0,
            altitude_process_noise: 3.0,
        }
    }
}

/// Settings recognised by [`crate::recorder::TimelineRecorder`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecorderSettings {
    pub samples_per_minute: u32,
    pub sleep_after_stationary_duration: Duration,
    pub sleep_cycle_duration: Duration,
    pub use_low_power_sleep_mode_while_stationary: bool,
    pub ignore_no_location_data_during_wakeups: bool,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            samples_per_minute: 10,
            sleep_after_stationary_duration: Duration::from_secs(180),
            sleep_cycle_duration: Duration::from_secs(60),
            use_low_power_sleep_mode_while_stationary: true,
            ignore_no_location_data_during_wakeups: true,
        }
    }
}

/// Settings recognised by [`crate::processor::TimelineProcessor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessorSettings {
    pub maximum_items_in_processing_loop: usize,
    pub maximum_potential_merges_in_processing_loop: usize,
    pub keeper_boundary: Duration,
    pub duration_between_pruned_samples: Duration,
    pub data_gap_threshold: Duration,
    pub hard_delete_sweep_age: Duration,
    pub maximum_mode_shift_speed: f64,
    pub edge_cleanse_max_iterations: u32,
    pub edge_heal_neighbour_window: Duration,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            maximum_items_in_processing_loop: 21,
            maximum_potential_merges_in_processing_loop: 10,
            keeper_boundary: Duration::from_secs(30 * 60),
            duration_between_pruned_samples: Duration::from_secs(2 * 60),
            data_gap_threshold: Duration::from_secs(5 * 60),
            hard_delete_sweep_age: Duration::from_secs(60 * 60),
            maximum_mode_shift_speed: 2.0 / 3.6,
            edge_cleanse_max_iterations: 30,
            edge_heal_neighbour_window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Duration-based validity/keepness thresholds, factored out
/// of the timeline item module so they can be tuned independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemThresholds {
    pub visit_min_valid_duration: Duration,
    pub visit_min_keeper_duration: Duration,
    pub visit_min_radius: f64,
    pub visit_max_radius: f64,
    pub path_min_samples: usize,
    pub path_min_valid_duration: Duration,
    pub path_min_valid_distance: f64,
    pub path_min_keeper_duration: Duration,
    pub path_min_keeper_distance: f64,
    pub data_gap_min_valid_duration: Duration,
    pub data_gap_min_keeper_duration: Duration,
}

impl Default for ItemThresholds {
    fn default() -> Self {
        Self {
            visit_min_valid_duration: Duration::from_secs(10),
            visit_min_keeper_duration: Duration::from_secs(120),
            visit_min_radius: 10.0,
            visit_max_radius: 150.0,
            path_min_samples: 2,
            path_min_valid_duration: Duration::from_secs(10),
            path_min_valid_distance: 10.0,
            path_min_keeper_duration: Duration::from_secs(60),
            path_min_keeper_distance: 20.0,
            data_gap_min_valid_duration: Duration::from_secs(60),
            data_gap_min_keeper_duration: Duration::from_secs(24 * 60 * 60),
        }
    }
}
