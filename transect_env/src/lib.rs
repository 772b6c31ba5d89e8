//! Environment abstraction layer for transect.
//!
//! This crate provides the "Sans-IO" abstraction allowing the core engines
//! (`transect_core`) to run against both a **production** clock (tokio) and a
//! **deterministic simulation** clock, and it hosts the background job
//! scheduler that drives the primary/secondary processing lanes.
//!
//! # Core concept
//!
//! All timing and background-task spawning goes through the [`Clock`] trait.
//! Production code uses [`TokioClock`]; `transect_sim` supplies a seeded
//! virtual clock implementing the same trait, so the recorder and processor
//! run unmodified under deterministic scenario replay.

mod clock;
mod error;
mod jobs;
mod tokio_clock;

pub use clock::Clock;
pub use error::EnvError;
pub use jobs::{AppState, JobKind, JobScheduler};
pub use tokio_clock::TokioClock;
