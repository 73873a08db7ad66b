//! The guard seam and the two production guards.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wakegate_access::AllowList;
use wakegate_lifecycle::{ConnectDecision, LifecycleController};

pub const ALLOW_LIST_PRIORITY: i32 = 100;
pub const LIFECYCLE_PRIORITY: i32 = 0;

/// A player trying to reach a backend server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectAttempt {
    pub player: String,
    pub uuid: String,
    pub server: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Terminate the pending connection with this message.
    Deny(String),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Verdict::Allow => None,
            Verdict::Deny(message) => Some(message),
        }
    }
}

impl From<ConnectDecision> for Verdict {
    fn from(decision: ConnectDecision) -> Self {
        match decision {
            ConnectDecision::Allow => Verdict::Allow,
            ConnectDecision::Deny { message } => Verdict::Deny(message),
        }
    }
}

pub type GuardFuture<'a> = Pin<Box<dyn Future<Output = Verdict> + Send + 'a>>;

/// One consumer of connection attempts. Higher priority runs first.
pub trait ConnectGuard: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32;

    fn check<'a>(&'a self, attempt: &'a ConnectAttempt) -> GuardFuture<'a>;
}

impl ConnectGuard for AllowList {
    fn name(&self) -> &'static str {
        "allow-list"
    }

    fn priority(&self) -> i32 {
        ALLOW_LIST_PRIORITY
    }

    fn check<'a>(&'a self, attempt: &'a ConnectAttempt) -> GuardFuture<'a> {
        Box::pin(async move {
            if self.is_allowed(&attempt.uuid) {
                debug!(player = %attempt.player, uuid = %attempt.uuid, "allowing listed player");
                Verdict::Allow
            } else {
                info!(player = %attempt.player, uuid = %attempt.uuid, "blocking player not on allow-list");
                Verdict::Deny(self.kick_message().to_string())
            }
        })
    }
}

impl ConnectGuard for LifecycleController {
    fn name(&self) -> &'static str {
        "lifecycle"
    }

    fn priority(&self) -> i32 {
        LIFECYCLE_PRIORITY
    }

    fn check<'a>(&'a self, attempt: &'a ConnectAttempt) -> GuardFuture<'a> {
        Box::pin(async move {
            self.on_connection_attempt(&attempt.player, &attempt.server)
                .await
                .into()
        })
    }
}
