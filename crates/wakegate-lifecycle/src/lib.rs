//! wakegate-lifecycle — on-demand start and idle shutdown for one instance.
//!
//! The [`LifecycleController`] consumes three inbound events (connection
//! attempt, join, disconnect) and drives the instance through the
//! [`InstanceApi`](wakegate_compute::InstanceApi):
//!
//! - An attempt against an unreachable backend starts the instance, subject
//!   to the startup throttle, and the player is told to retry.
//! - After a successful start a no-join timer stops the instance again if
//!   nobody arrives.
//! - When the last player leaves an idle timer stops the instance.
//!
//! Timers are generation-tagged tasks: re-arming or cancelling a timer
//! makes any earlier firing a no-op.

pub mod controller;
pub mod error;
pub mod state;

pub use controller::{
    ConnectDecision, LifecycleController, LifecycleSnapshot, StartOutcome, StopOutcome,
};
pub use error::{LifecycleError, LifecycleResult};
pub use state::{LifecycleState, Phase, StateSnapshot, TimerKind};
