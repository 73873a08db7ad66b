//! The instance-management API seam.

use std::future::Future;
use std::pin::Pin;

use crate::error::ComputeResult;
use crate::types::{InstanceRef, InstanceStatus};

/// Boxed future returned by [`InstanceApi`] calls.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = ComputeResult<T>> + Send + 'a>>;

/// Start/stop/status for the single instance a controller governs.
/// Injected for testability.
///
/// `start` and `stop` resolve only once the underlying long-running
/// operation has completed (or failed). Callers bound them with their own
/// timeout.
pub trait InstanceApi: Send + Sync {
    /// The instance this client is bound to.
    fn instance(&self) -> &InstanceRef;

    /// Current power status.
    fn status(&self) -> ApiFuture<'_, InstanceStatus>;

    /// Start the instance and wait for the operation to finish.
    fn start(&self) -> ApiFuture<'_, ()>;

    /// Stop the instance and wait for the operation to finish.
    fn stop(&self) -> ApiFuture<'_, ()>;
}
