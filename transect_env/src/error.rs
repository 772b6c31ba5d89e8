//! Error types for the transect environment layer.

use thiserror::Error;

/// Errors that can occur in the environment/scheduling layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A background job queue has been shut down and can no longer accept work.
    #[error("job queue closed: {0}")]
    QueueClosed(String),

    /// A scheduled job panicked or otherwise failed to complete.
    #[error("job failed: {0}")]
    JobFailed(String),

    /// The clock/context could not complete the requested operation.
    #[error("context error: {0}")]
    ContextError(String),
}
