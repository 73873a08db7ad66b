//! Lifecycle controller: starts the managed instance when players show up
//! and stops it when nobody uses it.
//!
//! All decisions are taken under the single state lock; the lock is never
//! held across a probe or an instance API call. Anything observed before
//! such a call is re-validated after the lock is reacquired.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use wakegate_compute::{ApiFuture, InstanceApi, InstanceStatus};
use wakegate_config::ControllerConfig;
use wakegate_probe::Prober;

use crate::error::{LifecycleError, LifecycleResult};
use crate::state::{LifecycleState, StateSnapshot, TimerKind, TimerSlot};

/// Upper bound on a status query.
const STATUS_TIMEOUT: Duration = Duration::from_secs(15);

/// What to do with a pending connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ConnectDecision {
    Allow,
    Deny { message: String },
}

impl ConnectDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ConnectDecision::Allow)
    }
}

/// Result of a start attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The start call was issued and completes in the background.
    Issued,
    /// A previous start happened inside the throttle window.
    Throttled,
    /// Another start is already outstanding.
    InFlight,
    /// The instance is not stopped; no start needed.
    NotStopped(InstanceStatus),
    /// The status query failed.
    Failed,
}

/// Result of a stop attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// The instance is not running; nothing to stop.
    NotRunning(InstanceStatus),
    /// Players are attributed to the instance.
    PlayersOnline,
    /// A start or another stop is outstanding.
    Busy,
    Failed,
}

/// Serializable view of a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSnapshot {
    pub server: String,
    pub instance: String,
    #[serde(flatten)]
    pub state: StateSnapshot,
}

/// Which in-flight flag a [`ClaimGuard`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Start,
    Stop,
}

impl Claim {
    fn clear(self, state: &mut LifecycleState) {
        match self {
            Claim::Start => state.start_in_flight = false,
            Claim::Stop => state.stop_in_flight = false,
        }
    }
}

/// Holds `start_in_flight` or `stop_in_flight` until released under the
/// lock. If the holder is dropped first (cancelled or panicked), the flag
/// is cleared from `Drop`.
struct ClaimGuard {
    controller: Option<LifecycleController>,
    claim: Claim,
}

impl ClaimGuard {
    fn new(controller: &LifecycleController, claim: Claim) -> Self {
        Self {
            controller: Some(controller.clone()),
            claim,
        }
    }

    fn release(mut self, state: &mut LifecycleState) {
        self.claim.clear(state);
        self.controller = None;
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let Some(controller) = self.controller.take() else {
            return;
        };
        let claim = self.claim;
        warn!(?claim, "in-flight operation abandoned, releasing claim");

        if let Ok(mut state) = controller.inner.state.try_lock() {
            claim.clear(&mut state);
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                claim.clear(&mut *controller.inner.state.lock().await);
            });
        }
    }
}

struct Inner {
    config: ControllerConfig,
    api: Arc<dyn InstanceApi>,
    prober: Arc<dyn Prober>,
    state: Mutex<LifecycleState>,
}

/// Governs the power state of exactly one instance.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LifecycleController {
    inner: Arc<Inner>,
}

impl LifecycleController {
    pub fn new(
        config: ControllerConfig,
        api: Arc<dyn InstanceApi>,
        prober: Arc<dyn Prober>,
    ) -> Self {
        info!(
            server = %config.server_address,
            instance = %api.instance(),
            idle_timeout_secs = config.idle_timeout.as_secs(),
            startup_threshold_secs = config.startup_threshold.as_secs(),
            no_join_timeout_secs = config.no_join_timeout.as_secs(),
            "lifecycle controller initialized"
        );
        Self {
            inner: Arc::new(Inner {
                config,
                api,
                prober,
                state: Mutex::new(LifecycleState::new(Instant::now())),
            }),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Whether `server` is the backend this controller governs.
    pub fn manages(&self, server: &str) -> bool {
        server == self.inner.config.server_address
    }

    // ── Inbound events ─────────────────────────────────────────────

    /// A player is trying to connect to `server`.
    ///
    /// Allows the connection when the backend is reachable. Otherwise a
    /// start is attempted and the player is always denied with the
    /// starting message, whether or not a start call was actually issued.
    pub async fn on_connection_attempt(&self, player: &str, server: &str) -> ConnectDecision {
        if !self.manages(server) {
            return ConnectDecision::Allow;
        }

        let config = &self.inner.config;
        if self.inner.prober.is_reachable(&config.backend_addr).await {
            debug!(%player, %server, "backend reachable, allowing connection");
            return ConnectDecision::Allow;
        }

        info!(%player, %server, backend = %config.backend_addr, "backend unreachable, attempting to start instance");
        let outcome = self.try_start().await;
        debug!(%player, ?outcome, "start attempt finished, denying connection");

        ConnectDecision::Deny {
            message: config.starting_message.clone(),
        }
    }

    /// A player finished connecting to `server`.
    pub async fn on_join(&self, player: &str, server: &str) {
        if !self.manages(server) {
            return;
        }

        let mut state = self.inner.state.lock().await;
        let player_count = state.record_join(Instant::now());

        if state.cancel_timer(TimerKind::Safety) {
            info!(%player, player_count, "cancelled no-join shutdown, player joined");
        }
        if state.cancel_timer(TimerKind::Idle) {
            info!(%player, player_count, "cancelled scheduled idle shutdown due to player join");
        }

        debug!(%player, player_count, "player connected to managed server");
    }

    /// A player left `server`.
    pub async fn on_disconnect(&self, player: &str, server: &str) {
        if !self.manages(server) {
            return;
        }

        let mut state = self.inner.state.lock().await;
        let player_count = state.record_disconnect(Instant::now());
        debug!(%player, player_count, "player disconnected from managed server");

        if player_count == 0 {
            self.arm_timer(&mut state, TimerKind::Idle);
        }
    }

    // ── Start ──────────────────────────────────────────────────────

    /// Start the instance unless throttled, already in flight, or not
    /// stopped.
    ///
    /// The duplicate-start check is committed before this returns; the
    /// start call itself continues in the background.
    pub async fn try_start(&self) -> StartOutcome {
        let config = &self.inner.config;
        let (join_epoch, claim) = {
            let mut state = self.inner.state.lock().await;
            if state.start_in_flight {
                debug!("start already in flight, skipping start request");
                return StartOutcome::InFlight;
            }
            if state.is_throttled(Instant::now(), config.startup_threshold) {
                info!(
                    threshold_secs = config.startup_threshold.as_secs(),
                    "within startup threshold, skipping start request"
                );
                return StartOutcome::Throttled;
            }
            state.start_in_flight = true;
            (state.join_epoch, ClaimGuard::new(self, Claim::Start))
        };

        let status = match self.query_status().await {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "failed to query instance status before start");
                claim.release(&mut *self.inner.state.lock().await);
                return StartOutcome::Failed;
            }
        };

        if status != InstanceStatus::Stopped {
            info!(instance = %self.inner.api.instance(), %status, "instance is not stopped, skipping start");
            claim.release(&mut *self.inner.state.lock().await);
            return StartOutcome::NotStopped(status);
        }

        let this = self.clone();
        tokio::spawn(async move {
            this.complete_start(join_epoch, claim).await;
        });
        StartOutcome::Issued
    }

    async fn complete_start(&self, join_epoch: u64, claim: ClaimGuard) {
        let config = &self.inner.config;
        let instance = self.inner.api.instance().to_string();

        info!(%instance, "starting instance");
        let result = self
            .bounded("start", config.operation_timeout, self.inner.api.start())
            .await;

        let mut state = self.inner.state.lock().await;
        claim.release(&mut state);

        match result {
            Ok(()) => {
                state.last_start_requested_at = Some(Instant::now());
                if state.join_epoch != join_epoch || state.player_count > 0 {
                    info!(%instance, player_count = state.player_count, "instance started, player already joined");
                } else {
                    state.is_starting = true;
                    self.arm_timer(&mut state, TimerKind::Safety);
                    info!(%instance, "successfully started instance");
                }
            }
            Err(e) => {
                // Left as if never attempted so the next connection can retry.
                error!(%instance, operation = "start", error = %e, "failed to start instance");
            }
        }
    }

    // ── Timers ─────────────────────────────────────────────────────

    /// Arm a timer of `kind`, cancelling any outstanding one of that kind.
    fn arm_timer(&self, state: &mut LifecycleState, kind: TimerKind) {
        state.cancel_timer(kind);

        let generation = state.next_generation();
        let delay = match kind {
            TimerKind::Idle => self.inner.config.idle_timeout,
            TimerKind::Safety => self.inner.config.no_join_timeout,
        };

        let this = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match kind {
                TimerKind::Idle => this.idle_timer_fire(generation).await,
                TimerKind::Safety => this.safety_timer_fire(generation).await,
            }
        });
        *state.slot_mut(kind) = Some(TimerSlot { generation, handle });

        info!(
            server = %self.inner.config.server_address,
            timer = kind.as_str(),
            timeout_secs = delay.as_secs(),
            "scheduled server shutdown"
        );
    }

    async fn idle_timer_fire(&self, generation: u64) {
        {
            let mut state = self.inner.state.lock().await;
            if !state.claim_timer(TimerKind::Idle, generation) {
                debug!(generation, "stale idle timer fired, ignoring");
                return;
            }
            if state.player_count > 0 {
                info!(player_count = state.player_count, "players online, cancelling idle shutdown");
                return;
            }
        }

        info!(
            timeout_secs = self.inner.config.idle_timeout.as_secs(),
            "idle timeout reached, shutting down instance"
        );
        self.try_stop("idle").await;
    }

    async fn safety_timer_fire(&self, generation: u64) {
        {
            let mut state = self.inner.state.lock().await;
            if !state.claim_timer(TimerKind::Safety, generation) {
                debug!(generation, "stale no-join timer fired, ignoring");
                return;
            }
            if state.player_count > 0 || !state.is_starting {
                debug!(player_count = state.player_count, "player joined since start, no-join shutdown skipped");
                return;
            }
            state.is_starting = false;
        }

        warn!(
            timeout_secs = self.inner.config.no_join_timeout.as_secs(),
            "nobody joined after start, shutting down instance"
        );
        self.try_stop("no-join").await;
    }

    // ── Stop ───────────────────────────────────────────────────────

    /// Stop the instance if it is running and nobody is on it.
    ///
    /// Failures are logged and not retried; the next idle or no-join
    /// cycle is the retry path.
    pub async fn try_stop(&self, reason: &'static str) -> StopOutcome {
        let claim = {
            let mut state = self.inner.state.lock().await;
            if state.player_count > 0 {
                return StopOutcome::PlayersOnline;
            }
            if state.start_in_flight || state.stop_in_flight {
                info!(reason, "start or stop already in flight, skipping stop");
                return StopOutcome::Busy;
            }
            state.stop_in_flight = true;
            ClaimGuard::new(self, Claim::Stop)
        };

        let outcome = self.stop_instance(reason).await;
        claim.release(&mut *self.inner.state.lock().await);
        outcome
    }

    async fn stop_instance(&self, reason: &'static str) -> StopOutcome {
        let instance = self.inner.api.instance().to_string();

        let status = match self.query_status().await {
            Ok(status) => status,
            Err(e) => {
                error!(%instance, reason, error = %e, "failed to query instance status before stop");
                return StopOutcome::Failed;
            }
        };
        info!(%instance, %status, "current instance status before stop");

        if status != InstanceStatus::Running {
            info!(%instance, %status, "instance is not running, skipping stop");
            return StopOutcome::NotRunning(status);
        }

        // A player may have joined while the status query was outstanding.
        let player_count = self.inner.state.lock().await.player_count;
        if player_count > 0 {
            info!(%instance, player_count, "players joined during shutdown check, keeping instance");
            return StopOutcome::PlayersOnline;
        }

        info!(%instance, reason, "stopping instance");
        match self
            .bounded("stop", self.inner.config.operation_timeout, self.inner.api.stop())
            .await
        {
            Ok(()) => {
                info!(%instance, reason, "successfully stopped instance");
                StopOutcome::Stopped
            }
            Err(e) => {
                error!(%instance, reason, operation = "stop", error = %e, "failed to stop instance");
                StopOutcome::Failed
            }
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    async fn query_status(&self) -> LifecycleResult<InstanceStatus> {
        self.bounded("status", STATUS_TIMEOUT, self.inner.api.status())
            .await
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        limit: Duration,
        call: ApiFuture<'_, T>,
    ) -> LifecycleResult<T> {
        match tokio::time::timeout(limit, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(LifecycleError::Api {
                operation,
                instance: self.inner.api.instance().to_string(),
                source,
            }),
            Err(_) => Err(LifecycleError::Timeout {
                operation,
                instance: self.inner.api.instance().to_string(),
                after: limit,
            }),
        }
    }

    /// Current state for status reporting.
    pub async fn snapshot(&self) -> LifecycleSnapshot {
        let state = self.inner.state.lock().await;
        LifecycleSnapshot {
            server: self.inner.config.server_address.clone(),
            instance: self.inner.api.instance().to_string(),
            state: state.snapshot(Instant::now()),
        }
    }

    /// Cancel all outstanding timers. Used on daemon shutdown.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.lock().await;
        let idle = state.cancel_timer(TimerKind::Idle);
        let safety = state.cancel_timer(TimerKind::Safety);
        info!(idle, safety, "lifecycle timers cancelled");
    }
}
