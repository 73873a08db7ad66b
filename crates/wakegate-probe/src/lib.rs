//! wakegate-probe — reachability checks for the managed backend.
//!
//! The lifecycle controller asks a [`Prober`] whether the backend accepts
//! connections before deciding to start its instance. [`TcpProber`] is the
//! production implementation; tests substitute scripted probers.

pub mod prober;

pub use prober::{DEFAULT_PROBE_TIMEOUT, ProbeFuture, Prober, TcpProber, tcp_probe};
