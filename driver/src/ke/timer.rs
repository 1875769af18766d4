//! Kernel Tick Source
//!
//! A single monotonic millisecond tick counter that backs every timed wait
//! in the driver. The embedding kernel advances it from its clock interrupt
//! by calling [`tick`]; timed waits compare against [`current_millis`].
//!
//! The counter never goes backwards and never wraps in practice (a u64 of
//! milliseconds outlives any machine).

use core::sync::atomic::{AtomicU64, Ordering};

/// Timeout value representing an infinite wait.
pub const TIMEOUT_INFINITE: u32 = u32::MAX;

/// Global millisecond tick counter.
static TICK_COUNT: AtomicU64 = AtomicU64::new(0);

/// Advance the tick counter by one millisecond.
///
/// Called by the embedding kernel's clock interrupt handler.
#[inline]
pub fn tick() {
    TICK_COUNT.fetch_add(1, Ordering::Release);
}

/// Advance the tick counter by `millis` milliseconds at once.
#[inline]
pub fn advance(millis: u64) {
    TICK_COUNT.fetch_add(millis, Ordering::Release);
}

/// Current monotonic time in milliseconds.
#[inline]
pub fn current_millis() -> u64 {
    TICK_COUNT.load(Ordering::Acquire)
}

/// Absolute deadline for a relative timeout, saturating for
/// [`TIMEOUT_INFINITE`].
#[inline]
pub fn deadline_for(millis: u32) -> u64 {
    if millis == TIMEOUT_INFINITE {
        u64::MAX
    } else {
        current_millis().saturating_add(millis as u64)
    }
}
