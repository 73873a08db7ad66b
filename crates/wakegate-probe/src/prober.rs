//! Reachability probe logic.
//!
//! A probe answers "does anything accept TCP connections at this address"
//! within a fixed timeout. It is a heuristic for deciding whether a start
//! call is warranted, not an authoritative view of instance power state.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

/// Default probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Boxed future returned by [`Prober::is_reachable`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Answers reachable/unreachable for a network address. Injected for
/// testability.
///
/// Implementations must be side-effect free, complete within a bounded
/// time and report every failure (including timeouts) as `false`.
pub trait Prober: Send + Sync {
    fn is_reachable<'a>(&'a self, address: &'a str) -> ProbeFuture<'a>;
}

/// Probes by opening (and immediately dropping) a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl Prober for TcpProber {
    fn is_reachable<'a>(&'a self, address: &'a str) -> ProbeFuture<'a> {
        Box::pin(tcp_probe(address, self.timeout))
    }
}

/// Attempt a TCP connection to `address`, giving up after `timeout`.
pub async fn tcp_probe(address: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!(error = %e, %address, "reachability probe connection failed");
            false
        }
        Err(_) => {
            debug!(%address, timeout_ms = timeout.as_millis() as u64, "reachability probe timed out");
            false
        }
    }
}
