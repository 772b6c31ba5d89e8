//! Error taxonomy for the timeline engine.
//!
//! Most ingestion-time problems are reject-and-log (handled by returning
//! `Ok(())` from the caller after a `tracing::debug!`, never surfaced as an
//! `Err`). These types cover the remaining categories: rollback-and-retry on
//! write, invalidated objects, and fatal data corruption.

use crate::types::{ItemId, SampleId};
use thiserror::Error;

/// Errors raised by the activity brain and Kalman layer.
#[derive(Debug, Error, PartialEq)]
pub enum BrainError {
    /// The present sample window is empty after an update cycle; this
    /// should not happen while recording is active and indicates caller
    /// misuse (e.g. calling `update()` before any `add()`).
    #[error("present sample window is empty")]
    EmptyPresentSample,
}

/// Errors raised while mutating a [`crate::timeline_item::TimelineItem`].
#[derive(Debug, Error, PartialEq)]
pub enum ItemError {
    #[error("item {0} is merge-locked and cannot be mutated")]
    MergeLocked(ItemId),
    #[error("item {0} still owns samples and cannot be deleted")]
    NotEmpty(ItemId),
    #[error("item {0} is disabled")]
    Disabled(ItemId),
}

/// Errors raised by [`crate::processor::TimelineProcessor`].
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Item(#[from] ItemError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// An in-memory object's backing row was externally modified; the
    /// object must be reloaded before it can participate further.
    #[error("item {0} is invalidated")]
    Invalidated(ItemId),
}

/// Errors raised by a [`crate::store::Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A write violated the linked-list invariant (cycle, or a reference to
    /// a missing item). This is rollback-and-retry: the
    /// writer breaks the offending edges and requeues, it never aborts.
    #[error("linked-list constraint violated on item {0}")]
    ConstraintViolation(ItemId),

    /// A required row key was missing during materialisation. This
    /// indicates data corruption and should abort the enclosing job.
    #[error("fatal: missing required row for item {0:?}")]
    MissingItem(ItemId),

    #[error("fatal: missing required row for sample {0:?}")]
    MissingSample(SampleId),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
