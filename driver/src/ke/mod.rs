//! Kernel Executive Primitives (ke)
//!
//! The small slice of the kernel executive the bridge driver depends on:
//!
//! - **Spinlocks**: short-critical-section mutual exclusion
//! - **Events**: notification/synchronization signaling with timed waits
//! - **Tick source**: the monotonic clock behind every timeout

pub mod event;
pub mod spinlock;
pub mod timer;

pub use event::{EventType, KEvent, WaitStatus};
pub use spinlock::{SpinLock, SpinLockGuard};
pub use timer::TIMEOUT_INFINITE;
