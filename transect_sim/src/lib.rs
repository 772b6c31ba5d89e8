//! Scenario-replay harness for the locomotion engine.
//!
//! Feeds seeded, reproducible fix sequences through a real
//! `TimelineRecorder`/`TimelineProcessor` pair and checks the resulting
//! timeline against the handful of literal behavioural scenarios the
//! engine is expected to satisfy: cold start, transit, mode transition,
//! overlapping-visit merge, invalid-path consumption, and data-gap
//! insertion.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                      │
//! │  ┌────────┐      ┌──────────────────┐      ┌─────────┐ │
//! │  │ Oracle │ ───► │ TimelineRecorder │ ───► │ checks  │ │
//! │  └────────┘      │ / TimelineProcessor      └─────────┘ │
//! │   seeded fixes   └──────────────────┘                   │
//! └────────────────────────────────────────────────────────┘
//! ```

mod oracle;
pub mod runner;
pub mod scenarios;

pub use oracle::Oracle;
pub use runner::ScenarioOutcome;
pub use scenarios::ScenarioId;
