//! Shared replay/assertion plumbing used by every scenario.

use std::sync::Arc;
use std::time::SystemTime;
use transect_core::{
    BrainSettings, ItemThresholds, MemoryStore, NullSink, RawFix, RecorderSettings,
    TimelineRecorder,
};

/// Named pass/fail checks produced by a scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub checks: Vec<(&'static str, bool)>,
}

impl ScenarioOutcome {
    pub fn new(checks: Vec<(&'static str, bool)>) -> Self {
        Self { checks }
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|(_, ok)| *ok)
    }
}

/// Builds a fresh recorder over a (separately handed-back) in-memory store
/// and starts recording at `start`.
pub fn fresh_recorder(start: SystemTime) -> (TimelineRecorder<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let mut rec = TimelineRecorder::new(
        BrainSettings::default(),
        RecorderSettings::default(),
        ItemThresholds::default(),
        store.clone(),
        Arc::new(NullSink),
    );
    rec.set_process_historical(true);
    rec.start_recording(start).expect("start recording");
    (rec, store)
}

/// Feeds `fixes` through `rec`, ticking once per fix at its own timestamp.
pub fn replay(rec: &mut TimelineRecorder<MemoryStore>, fixes: &[RawFix]) {
    for fix in fixes {
        rec.add_raw_fix(*fix);
        rec.tick(fix.timestamp).expect("tick");
    }
}
