//! Lifecycle error types.

use std::time::Duration;

use thiserror::Error;
use wakegate_compute::ComputeError;

/// Errors from the instance API calls the controller makes.
///
/// These are logged and surfaced through outcomes; they never change
/// what a player is told.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{operation} failed for {instance}: {source}")]
    Api {
        operation: &'static str,
        instance: String,
        #[source]
        source: ComputeError,
    },

    #[error("{operation} for {instance} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        instance: String,
        after: Duration,
    },
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
