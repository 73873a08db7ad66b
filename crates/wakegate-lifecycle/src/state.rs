//! Lifecycle state for one managed instance.
//!
//! Every field is read and written only while the controller holds the
//! state lock. Nothing here performs I/O.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Conceptual controller phase, derived from the stored fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No players, nothing starting, no shutdown pending.
    Idle,
    /// A start was issued (or is in flight) and nobody has joined yet.
    AwaitingJoin,
    /// At least one player is on the managed server.
    Active,
    /// The last player left; the idle timer is armed.
    Draining,
}

/// Which timer a slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Idle,
    Safety,
}

impl TimerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::Idle => "idle",
            TimerKind::Safety => "no-join",
        }
    }
}

/// An armed timer. The generation identifies this arming so a firing
/// task can tell whether it is still the current one.
#[derive(Debug)]
pub(crate) struct TimerSlot {
    pub generation: u64,
    pub handle: JoinHandle<()>,
}

impl TimerSlot {
    pub fn cancel(self) {
        self.handle.abort();
    }
}

/// The authoritative in-memory record for one managed instance.
#[derive(Debug)]
pub struct LifecycleState {
    pub(crate) player_count: u32,
    pub(crate) last_activity_at: Instant,
    pub(crate) last_start_requested_at: Option<Instant>,
    pub(crate) idle_timer: Option<TimerSlot>,
    pub(crate) safety_timer: Option<TimerSlot>,
    pub(crate) is_starting: bool,
    /// A start decision has been committed and the call has not returned.
    pub(crate) start_in_flight: bool,
    pub(crate) stop_in_flight: bool,
    /// Bumped on every join; lets a completing start see joins that
    /// happened while it was outstanding.
    pub(crate) join_epoch: u64,
    next_generation: u64,
}

impl LifecycleState {
    pub fn new(now: Instant) -> Self {
        Self {
            player_count: 0,
            last_activity_at: now,
            last_start_requested_at: None,
            idle_timer: None,
            safety_timer: None,
            is_starting: false,
            start_in_flight: false,
            stop_in_flight: false,
            join_epoch: 0,
            next_generation: 0,
        }
    }

    pub fn player_count(&self) -> u32 {
        self.player_count
    }

    pub fn is_starting(&self) -> bool {
        self.is_starting
    }

    pub fn phase(&self) -> Phase {
        if self.player_count > 0 {
            Phase::Active
        } else if self.is_starting || self.start_in_flight {
            Phase::AwaitingJoin
        } else if self.idle_timer.is_some() {
            Phase::Draining
        } else {
            Phase::Idle
        }
    }

    /// Whether a start at `now` falls inside the throttle window.
    pub fn is_throttled(&self, now: Instant, threshold: Duration) -> bool {
        match self.last_start_requested_at {
            Some(last) => now.saturating_duration_since(last) < threshold,
            None => false,
        }
    }

    pub(crate) fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    pub(crate) fn slot(&self, kind: TimerKind) -> &Option<TimerSlot> {
        match kind {
            TimerKind::Idle => &self.idle_timer,
            TimerKind::Safety => &self.safety_timer,
        }
    }

    pub(crate) fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<TimerSlot> {
        match kind {
            TimerKind::Idle => &mut self.idle_timer,
            TimerKind::Safety => &mut self.safety_timer,
        }
    }

    /// Cancel and clear a timer. Returns whether one was armed.
    pub(crate) fn cancel_timer(&mut self, kind: TimerKind) -> bool {
        match self.slot_mut(kind).take() {
            Some(slot) => {
                slot.cancel();
                true
            }
            None => false,
        }
    }

    /// If `generation` is the armed timer of `kind`, clear the slot
    /// (without aborting the caller's own task) and return true.
    pub(crate) fn claim_timer(&mut self, kind: TimerKind, generation: u64) -> bool {
        let current = self.slot(kind).as_ref().map(|slot| slot.generation);
        if current != Some(generation) {
            return false;
        }
        // Dropping the handle detaches; the firing task keeps running.
        self.slot_mut(kind).take();
        true
    }

    /// Record a join. Returns the new player count.
    pub(crate) fn record_join(&mut self, now: Instant) -> u32 {
        self.player_count += 1;
        self.last_activity_at = now;
        self.join_epoch += 1;
        self.is_starting = false;
        self.player_count
    }

    /// Record a disconnect, clamping at zero. Returns the new player count.
    pub(crate) fn record_disconnect(&mut self, now: Instant) -> u32 {
        self.player_count = self.player_count.saturating_sub(1);
        self.last_activity_at = now;
        self.player_count
    }

    pub fn snapshot(&self, now: Instant) -> StateSnapshot {
        StateSnapshot {
            phase: self.phase(),
            player_count: self.player_count,
            is_starting: self.is_starting,
            start_in_flight: self.start_in_flight,
            stop_in_flight: self.stop_in_flight,
            idle_timer_armed: self.idle_timer.is_some(),
            safety_timer_armed: self.safety_timer.is_some(),
            secs_since_activity: now.saturating_duration_since(self.last_activity_at).as_secs(),
            secs_since_start_request: self
                .last_start_requested_at
                .map(|t| now.saturating_duration_since(t).as_secs()),
        }
    }
}

/// Point-in-time view of the state, safe to hand out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub phase: Phase,
    pub player_count: u32,
    pub is_starting: bool,
    pub start_in_flight: bool,
    pub stop_in_flight: bool,
    pub idle_timer_armed: bool,
    pub safety_timer_armed: bool,
    pub secs_since_activity: u64,
    pub secs_since_start_request: Option<u64>,
}
