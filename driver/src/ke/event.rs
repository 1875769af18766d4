//! Kernel Event (KEVENT)
//!
//! Signaling primitive used by the request queue to park consumers until
//! work arrives. Two flavors, matching NT semantics:
//!
//! - **Notification (manual reset)**: stays signaled until explicitly
//!   reset; satisfies every waiter.
//! - **Synchronization (auto reset)**: satisfies exactly one waiter per
//!   signal and resets itself.
//!
//! Waiting is a bounded spin against the global tick source (see
//! [`crate::ke::timer`]); the embedding kernel is free to interpose a real
//! scheduler wait, but the driver only depends on these polling semantics.

use core::sync::atomic::{AtomicBool, Ordering};

use super::timer;

/// Event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    /// Manual reset; wakes all waiters and stays signaled.
    Notification = 0,
    /// Auto reset; wakes one waiter per signal.
    Synchronization = 1,
}

/// Outcome of a timed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The event was signaled (and consumed, for synchronization events).
    Signaled,
    /// The deadline passed before the event was signaled.
    Timeout,
}

/// Kernel event.
///
/// Equivalent to NT's KEVENT.
pub struct KEvent {
    signaled: AtomicBool,
    event_type: EventType,
}

impl KEvent {
    /// Create a new event in the given initial state.
    pub const fn new(event_type: EventType, initial_state: bool) -> Self {
        Self {
            signaled: AtomicBool::new(initial_state),
            event_type,
        }
    }

    /// Event type.
    #[inline]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Whether the event is currently signaled.
    #[inline]
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    /// Signal the event. Returns the previous signal state.
    pub fn set(&self) -> bool {
        self.signaled.swap(true, Ordering::AcqRel)
    }

    /// Reset the event to the not-signaled state.
    pub fn reset(&self) {
        self.signaled.store(false, Ordering::Release);
    }

    /// Try to satisfy a wait without blocking.
    ///
    /// For synchronization events a successful poll consumes the signal.
    pub fn poll(&self) -> bool {
        match self.event_type {
            EventType::Notification => self.signaled.load(Ordering::Acquire),
            EventType::Synchronization => self
                .signaled
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok(),
        }
    }

    /// Wait until the event is signaled or the absolute millisecond
    /// deadline (see [`timer::current_millis`]) passes.
    pub fn wait_until(&self, deadline: u64) -> WaitStatus {
        loop {
            if self.poll() {
                return WaitStatus::Signaled;
            }
            if timer::current_millis() >= deadline {
                return WaitStatus::Timeout;
            }
            core::hint::spin_loop();
        }
    }

    /// Wait for the event with a relative timeout in milliseconds.
    pub fn wait_timeout(&self, millis: u32) -> WaitStatus {
        self.wait_until(timer::deadline_for(millis))
    }
}
