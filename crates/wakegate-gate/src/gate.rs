//! Ordered evaluation of connection guards.

use std::sync::Arc;

use tracing::{debug, info};
use wakegate_lifecycle::LifecycleController;

use crate::guard::{ConnectAttempt, ConnectGuard, Verdict};

/// Front door for proxy events.
///
/// Attempts go through every guard in priority order; joins and
/// disconnects go straight to the lifecycle controller.
#[derive(Clone)]
pub struct ConnectionGate {
    guards: Vec<Arc<dyn ConnectGuard>>,
    lifecycle: LifecycleController,
}

impl ConnectionGate {
    /// A gate whose only guard is the lifecycle controller.
    pub fn new(lifecycle: LifecycleController) -> Self {
        Self {
            guards: vec![Arc::new(lifecycle.clone())],
            lifecycle,
        }
    }

    /// Register another guard. Guards with equal priority keep
    /// registration order.
    pub fn with_guard(mut self, guard: Arc<dyn ConnectGuard>) -> Self {
        self.guards.push(guard);
        self.guards.sort_by_key(|g| std::cmp::Reverse(g.priority()));
        self
    }

    /// `(name, priority)` of each guard, in evaluation order.
    pub fn guards(&self) -> Vec<(&'static str, i32)> {
        self.guards.iter().map(|g| (g.name(), g.priority())).collect()
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub async fn on_connection_attempt(&self, attempt: &ConnectAttempt) -> Verdict {
        for guard in &self.guards {
            let verdict = guard.check(attempt).await;
            if let Verdict::Deny(message) = &verdict {
                info!(
                    player = %attempt.player,
                    server = %attempt.server,
                    guard = guard.name(),
                    %message,
                    "connection denied"
                );
                return verdict;
            }
        }
        debug!(player = %attempt.player, server = %attempt.server, "connection allowed");
        Verdict::Allow
    }

    pub async fn on_join(&self, player: &str, server: &str) {
        self.lifecycle.on_join(player, server).await;
    }

    pub async fn on_disconnect(&self, player: &str, server: &str) {
        self.lifecycle.on_disconnect(player, server).await;
    }
}
