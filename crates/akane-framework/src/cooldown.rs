//! Per-user command cooldowns.
//!
//! Each user record carries a map from handler name to the Unix-millisecond
//! time of its last successful execution. [`CooldownTracker`] reads and writes
//! that map; it holds no state of its own.
//!
//! [`CooldownGate`] closes the window between checking a cooldown and
//! recording it: while a `(sender, handler)` pair is executing, a second
//! dispatch for the same pair is treated as blocked.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use akane_core::CooldownMap;
use parking_lot::Mutex;

// ============================================================================
// Clock
// ============================================================================

/// Source of the current time in Unix milliseconds.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> u64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        akane_core::unix_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// CooldownTracker
// ============================================================================

/// Result of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownStatus {
    pub can_use: bool,
    /// Whole seconds until the handler may run again, rounded up.
    pub remaining_secs: u64,
}

impl CooldownStatus {
    pub const READY: Self = Self {
        can_use: true,
        remaining_secs: 0,
    };

    pub fn blocked(remaining_secs: u64) -> Self {
        Self {
            can_use: false,
            remaining_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CooldownTracker;

impl CooldownTracker {
    /// Checks whether `name` is off cooldown at `now_millis`.
    ///
    /// A zero window or a missing entry is always ready. A last-used time in
    /// the future counts as zero elapsed.
    pub fn check(
        cooldowns: &CooldownMap,
        name: &str,
        window_secs: u64,
        now_millis: u64,
    ) -> CooldownStatus {
        if window_secs == 0 {
            return CooldownStatus::READY;
        }
        let Some(&last) = cooldowns.get(name) else {
            return CooldownStatus::READY;
        };

        let window = window_secs.saturating_mul(1000);
        let elapsed = now_millis.saturating_sub(last);
        if elapsed >= window {
            CooldownStatus::READY
        } else {
            CooldownStatus::blocked((window - elapsed).div_ceil(1000))
        }
    }

    /// Records a successful execution of `name` at `now_millis`.
    pub fn record(cooldowns: &mut CooldownMap, name: &str, now_millis: u64) {
        cooldowns.insert(name.to_string(), now_millis);
    }
}

// ============================================================================
// CooldownGate
// ============================================================================

type SlotSet = Arc<Mutex<HashSet<(String, String)>>>;

/// Tracks `(sender, handler)` pairs with an execution in flight.
#[derive(Debug, Clone, Default)]
pub struct CooldownGate {
    in_flight: SlotSet,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `(sender, name)`. Returns `None` if it is already
    /// held by another dispatch.
    pub fn try_acquire(&self, sender: &str, name: &str) -> Option<GateSlot> {
        let key = (sender.to_string(), name.to_string());
        let mut set = self.in_flight.lock();
        if !set.insert(key.clone()) {
            return None;
        }
        Some(GateSlot {
            in_flight: Arc::clone(&self.in_flight),
            key,
        })
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}

/// A held gate slot; released on drop.
#[derive(Debug)]
pub struct GateSlot {
    in_flight: SlotSet,
    key: (String, String),
}

impl Drop for GateSlot {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}
