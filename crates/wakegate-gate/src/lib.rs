//! wakegate-gate — decides whether a pending connection may proceed.
//!
//! A [`ConnectionGate`] runs its [`ConnectGuard`]s from highest to lowest
//! priority and stops at the first denial. The allow-list guard outranks the
//! lifecycle guard, so a player who may not connect never causes a probe or
//! an instance start.

pub mod gate;
pub mod guard;

pub use gate::ConnectionGate;
pub use guard::{
    ALLOW_LIST_PRIORITY, ConnectAttempt, ConnectGuard, GuardFuture, LIFECYCLE_PRIORITY, Verdict,
};
