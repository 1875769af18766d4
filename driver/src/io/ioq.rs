//! Request Queue (IOQ)
//!
//! The hand-off point between request dispatch and the user-mode file
//! system. Requests that cannot complete synchronously are posted here,
//! checked out by user-mode workers over the transact surface, and
//! completed by the matching response, by cancellation, or by queue stop.
//!
//! One spinlock guards the whole queue: both collections and the stopped
//! flag change together under it, and membership in a collection under that
//! lock is the sole arbiter of whether a request can still be completed by
//! the queue. A request is in at most one collection at a time:
//!
//! ```text
//!   posted ──> Pending ──> (checked out) ──> Processing ──> completed
//!                 │                              │
//!                 └────── cancel / stop ─────────┘
//! ```
//!
//! # Usage
//! ```ignore
//! let ioq = Ioq::new();
//! ioq.post_irp(&irp);
//! if let Some(irp) = ioq.next_pending_irp(timeout) {
//!     ioq.start_processing_irp(&irp);
//!     // ... hand to user mode; response returns via end_processing_irp
//! }
//! ```

use core::sync::atomic::{AtomicU64, Ordering};

use alloc::collections::VecDeque;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use crate::io::complete;
use crate::io::csq::IoqList;
use crate::io::irp::{Irp, IrpHint};
use crate::ke::{timer, EventType, KEvent, SpinLock, WaitStatus};
use crate::ntstatus::STATUS_CANCELLED;

/// Queue statistics. Monotonic counters, updated with relaxed atomics.
#[derive(Debug, Default)]
pub struct IoqStats {
    /// Requests accepted by post_irp
    pub posted: AtomicU64,
    /// Requests handed to a consumer by next_pending_irp
    pub claimed: AtomicU64,
    /// Requests retired through end_processing_irp
    pub retired: AtomicU64,
    /// Requests completed by cancellation or stop drain
    pub canceled: AtomicU64,
}

/// Snapshot of [`IoqStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoqStatsSnapshot {
    pub posted: u64,
    pub claimed: u64,
    pub retired: u64,
    pub canceled: u64,
}

/// Queue state guarded by the single spinlock.
struct IoqInner {
    /// Stop latch; never clears once set
    stopped: bool,
    /// Requests awaiting hand-off, strict FIFO
    pending: VecDeque<Arc<Irp>>,
    /// Requests checked out to user mode
    processing: VecDeque<Arc<Irp>>,
}

/// Request queue.
pub struct Ioq {
    inner: SpinLock<IoqInner>,
    /// Signaled on post and on stop; auto reset, one consumer per signal
    pending_event: KEvent,
    /// Back-reference handed to each inserted request's cancel state
    self_weak: Weak<Ioq>,
    stats: IoqStats,
}

impl Ioq {
    /// Create a new empty, running queue.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|self_weak| Self {
            inner: SpinLock::new(IoqInner {
                stopped: false,
                pending: VecDeque::new(),
                processing: VecDeque::new(),
            }),
            pending_event: KEvent::new(EventType::Synchronization, false),
            self_weak: self_weak.clone(),
            stats: IoqStats::default(),
        })
    }

    /// Whether the queue has been stopped.
    pub fn stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    /// Stop the queue and fail every queued request.
    ///
    /// Irreversible and idempotent. Both collections are drained under the
    /// lock; each drained request is completed with `STATUS_CANCELLED`
    /// outside it. Waiting consumers are woken and observe the stop.
    pub fn stop(&self) {
        let drained: Vec<Arc<Irp>> = {
            let mut inner = self.inner.lock();
            inner.stopped = true;
            let mut drained: Vec<Arc<Irp>> =
                Vec::with_capacity(inner.pending.len() + inner.processing.len());
            drained.extend(inner.pending.drain(..));
            drained.extend(inner.processing.drain(..));
            drained
        };

        self.pending_event.set();

        for irp in drained {
            irp.cancel_state().detach_queue();
            self.stats.canceled.fetch_add(1, Ordering::Relaxed);
            complete::complete_request(&irp, STATUS_CANCELLED);
        }
    }

    /// Post a request into the pending collection.
    ///
    /// Returns false without side effects when the queue is stopped; the
    /// caller still owns the request and must complete it.
    pub fn post_irp(&self, irp: &Arc<Irp>) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.stopped {
                return false;
            }
            irp.cancel_state().attach_queue(self.self_weak.clone());
            inner.pending.push_back(irp.clone());
        }

        self.stats.posted.fetch_add(1, Ordering::Relaxed);
        self.pending_event.set();

        // Cancellation that raced the insert found the request in no
        // collection; honor it now that the request is findable.
        if irp.cancel_state().is_canceled() {
            self.cancel_irp(irp);
        }
        true
    }

    /// Remove and return the oldest pending request, waiting up to `millis`
    /// milliseconds for one to arrive.
    ///
    /// Returns `None` on timeout or once the queue stops. A timeout of 0
    /// polls without blocking; [`timer::TIMEOUT_INFINITE`] waits forever.
    /// Each request is delivered to exactly one consumer; the returned
    /// request belongs to no collection until
    /// [`Ioq::start_processing_irp`] claims it.
    pub fn next_pending_irp(&self, millis: u32) -> Option<Arc<Irp>> {
        let deadline = timer::deadline_for(millis);

        loop {
            if let Some(result) = self.try_next_pending() {
                return result;
            }
            if self.pending_event.wait_until(deadline) == WaitStatus::Timeout {
                // Close the race where a post signaled between our last
                // check and the deadline.
                return self.try_next_pending().unwrap_or(None);
            }
        }
    }

    /// One locked attempt to pop the pending head. `Some(None)` means the
    /// queue stopped, `Some(Some(..))` a delivery, `None` try again.
    fn try_next_pending(&self) -> Option<Option<Arc<Irp>>> {
        let mut inner = self.inner.lock();
        if inner.stopped {
            drop(inner);
            // Cascade the wake so every parked consumer observes the stop.
            self.pending_event.set();
            return Some(None);
        }
        match inner.pending.pop_front() {
            Some(irp) => {
                let more = !inner.pending.is_empty();
                drop(inner);
                irp.cancel_state().detach_queue();
                self.stats.claimed.fetch_add(1, Ordering::Relaxed);
                if more {
                    self.pending_event.set();
                }
                Some(Some(irp))
            }
            None => None,
        }
    }

    /// Move a checked-out request into the processing collection.
    ///
    /// Returns false without side effects when the queue is stopped; the
    /// caller still owns the request. Cancellation requested while the
    /// request was checked out takes effect here.
    pub fn start_processing_irp(&self, irp: &Arc<Irp>) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.stopped {
                return false;
            }
            irp.cancel_state().attach_queue(self.self_weak.clone());
            inner.processing.push_back(irp.clone());
        }

        if irp.cancel_state().is_canceled() {
            self.cancel_irp(irp);
        }
        true
    }

    /// Remove and return the processing-collection request matching `hint`.
    ///
    /// The hint is only ever compared, never dereferenced. A miss (request
    /// already canceled, queue stopped, or hint stale) is a normal no-op
    /// returning `None`.
    pub fn end_processing_irp(&self, hint: IrpHint) -> Option<Arc<Irp>> {
        let irp = {
            let mut inner = self.inner.lock();
            let pos = inner.processing.iter().position(|irp| irp.hint() == hint)?;
            inner.processing.remove(pos)?
        };
        irp.cancel_state().detach_queue();
        self.stats.retired.fetch_add(1, Ordering::Relaxed);
        Some(irp)
    }

    /// Cancellation path: if the queue still holds the request in either
    /// collection, remove it and complete it with `STATUS_CANCELLED`.
    ///
    /// Not finding the request is a normal no-op: it was already claimed,
    /// retired, or drained, and whoever holds it completes it.
    pub fn cancel_irp(&self, irp: &Arc<Irp>) {
        let removed = {
            let mut inner = self.inner.lock();
            Self::remove_from(&mut inner.pending, irp)
                || Self::remove_from(&mut inner.processing, irp)
        };

        if removed {
            irp.cancel_state().detach_queue();
            self.stats.canceled.fetch_add(1, Ordering::Relaxed);
            complete::complete_request(irp, STATUS_CANCELLED);
        }
    }

    /// Peek the request after `cursor` in one collection, head for `None`.
    /// Used by the cancellation-safe queue views.
    pub(crate) fn list_peek_next(
        &self,
        list: IoqList,
        cursor: Option<IrpHint>,
    ) -> Option<Arc<Irp>> {
        let inner = self.inner.lock();
        let deque = match list {
            IoqList::Pending => &inner.pending,
            IoqList::Processing => &inner.processing,
        };
        match cursor {
            None => deque.front().cloned(),
            Some(hint) => {
                let pos = deque.iter().position(|irp| irp.hint() == hint)?;
                deque.get(pos + 1).cloned()
            }
        }
    }

    /// Remove a specific request from one collection. Used by the
    /// cancellation-safe queue views.
    pub(crate) fn list_remove(&self, list: IoqList, irp: &Arc<Irp>) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            let deque = match list {
                IoqList::Pending => &mut inner.pending,
                IoqList::Processing => &mut inner.processing,
            };
            Self::remove_from(deque, irp)
        };
        if removed {
            irp.cancel_state().detach_queue();
        }
        removed
    }

    fn remove_from(list: &mut VecDeque<Arc<Irp>>, irp: &Arc<Irp>) -> bool {
        match list.iter().position(|held| Arc::ptr_eq(held, irp)) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Point-in-time statistics snapshot.
    pub fn stats(&self) -> IoqStatsSnapshot {
        IoqStatsSnapshot {
            posted: self.stats.posted.load(Ordering::Relaxed),
            claimed: self.stats.claimed.load(Ordering::Relaxed),
            retired: self.stats.retired.load(Ordering::Relaxed),
            canceled: self.stats.canceled.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    pub(crate) fn queue_lengths(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.pending.len(), inner.processing.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::irp::{IrpMajorFunction, IrpParameters};
    use crate::ke::TIMEOUT_INFINITE;
    use crate::ntstatus::STATUS_SUCCESS;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    fn make_irp() -> Arc<Irp> {
        Irp::new(IrpMajorFunction::Read, IrpParameters::None)
    }

    #[test]
    fn test_fifo_order() {
        let ioq = Ioq::new();
        let irps: Vec<_> = (0..8).map(|_| make_irp()).collect();
        for irp in &irps {
            assert!(ioq.post_irp(irp));
        }
        for irp in &irps {
            let claimed = ioq.next_pending_irp(0).unwrap();
            assert_eq!(claimed.hint(), irp.hint());
        }
        assert!(ioq.next_pending_irp(0).is_none());
    }

    #[test]
    fn test_zero_timeout_polls_without_blocking() {
        let ioq = Ioq::new();
        assert!(ioq.next_pending_irp(0).is_none());
    }

    #[test]
    fn test_stop_drains_and_denies_post() {
        let ioq = Ioq::new();
        let pending = make_irp();
        let processing = make_irp();
        assert!(ioq.post_irp(&pending));
        assert!(ioq.post_irp(&processing));
        let claimed = ioq.next_pending_irp(0).unwrap();
        assert!(ioq.start_processing_irp(&claimed));

        ioq.stop();
        assert!(ioq.stopped());
        assert_eq!(ioq.queue_lengths(), (0, 0));

        for irp in [&pending, &claimed] {
            assert!(irp.is_completed());
            assert_eq!(irp.io_status().status, STATUS_CANCELLED);
        }

        let late = make_irp();
        assert!(!ioq.post_irp(&late));
        assert!(!late.is_completed());
        assert!(!ioq.start_processing_irp(&late));
        assert!(ioq.next_pending_irp(0).is_none());

        // Idempotent; the drained requests stay completed exactly once.
        ioq.stop();
        assert_eq!(ioq.stats().canceled, 2);
    }

    #[test]
    fn test_end_processing_miss_is_noop() {
        let ioq = Ioq::new();
        let irp = make_irp();
        assert!(ioq.post_irp(&irp));
        // Never started processing; the hint matches nothing there.
        assert!(ioq.end_processing_irp(irp.hint()).is_none());
        assert!(ioq.end_processing_irp(IrpHint(u64::MAX)).is_none());
        assert_eq!(ioq.queue_lengths(), (1, 0));
    }

    #[test]
    fn test_processing_round_trip() {
        let ioq = Ioq::new();
        let irp = make_irp();
        assert!(ioq.post_irp(&irp));
        let claimed = ioq.next_pending_irp(0).unwrap();
        assert!(ioq.start_processing_irp(&claimed));
        assert_eq!(ioq.queue_lengths(), (0, 1));

        let retired = ioq.end_processing_irp(claimed.hint()).unwrap();
        assert!(Arc::ptr_eq(&retired, &claimed));
        assert_eq!(ioq.queue_lengths(), (0, 0));
        // A second retire with the same hint finds nothing.
        assert!(ioq.end_processing_irp(claimed.hint()).is_none());
    }

    #[test]
    fn test_retire_head_leaves_rest_pending() {
        let ioq = Ioq::new();
        let a = make_irp();
        let b = make_irp();
        let c = make_irp();
        for irp in [&a, &b, &c] {
            assert!(ioq.post_irp(irp));
        }

        let claimed = ioq.next_pending_irp(0).unwrap();
        assert_eq!(claimed.hint(), a.hint());
        assert!(ioq.start_processing_irp(&claimed));
        let retired = ioq.end_processing_irp(a.hint()).unwrap();
        assert!(Arc::ptr_eq(&retired, &a));
        assert!(ioq.end_processing_irp(a.hint()).is_none());

        // B and C still await hand-off, in order.
        assert_eq!(ioq.queue_lengths(), (2, 0));
        assert_eq!(ioq.next_pending_irp(0).unwrap().hint(), b.hint());
        assert_eq!(ioq.next_pending_irp(0).unwrap().hint(), c.hint());
    }

    #[test]
    fn test_cancel_pending_request() {
        let ioq = Ioq::new();
        let irp = make_irp();
        assert!(ioq.post_irp(&irp));
        irp.cancel_state().set_canceled();
        ioq.cancel_irp(&irp);
        assert!(irp.is_completed());
        assert_eq!(irp.io_status().status, STATUS_CANCELLED);
        assert!(ioq.next_pending_irp(0).is_none());
    }

    #[test]
    fn test_cancel_while_checked_out_lands_at_start_processing() {
        let ioq = Ioq::new();
        let irp = make_irp();
        assert!(ioq.post_irp(&irp));
        let claimed = ioq.next_pending_irp(0).unwrap();

        // Checked out: cancellation finds it in no collection.
        claimed.cancel_state().set_canceled();
        ioq.cancel_irp(&claimed);
        assert!(!claimed.is_completed());

        // The deferred cancel takes effect when the queue sees it again.
        assert!(ioq.start_processing_irp(&claimed));
        assert!(claimed.is_completed());
        assert_eq!(claimed.io_status().status, STATUS_CANCELLED);
        assert_eq!(ioq.queue_lengths(), (0, 0));
    }

    #[test]
    fn test_cancel_vs_response_single_completion() {
        for _ in 0..100 {
            let ioq = Ioq::new();
            let irp = make_irp();
            assert!(ioq.post_irp(&irp));
            let claimed = ioq.next_pending_irp(0).unwrap();
            assert!(ioq.start_processing_irp(&claimed));

            let canceler = {
                let ioq = ioq.clone();
                let irp = claimed.clone();
                thread::spawn(move || {
                    irp.cancel_state().set_canceled();
                    ioq.cancel_irp(&irp);
                })
            };
            let responder = {
                let ioq = ioq.clone();
                let hint = claimed.hint();
                thread::spawn(move || {
                    if let Some(irp) = ioq.end_processing_irp(hint) {
                        complete::complete_request(&irp, STATUS_SUCCESS);
                    }
                })
            };
            canceler.join().unwrap();
            responder.join().unwrap();

            assert!(claimed.is_completed());
            let status = claimed.io_status().status;
            assert!(status == STATUS_SUCCESS || status == STATUS_CANCELLED);
            assert_eq!(ioq.queue_lengths(), (0, 0));
        }
    }

    #[test]
    fn test_multi_consumer_single_delivery() {
        let ioq = Ioq::new();
        let total = 64usize;
        let stop_flag = Arc::new(AtomicBool::new(false));

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let ioq = ioq.clone();
            let stop_flag = stop_flag.clone();
            consumers.push(thread::spawn(move || {
                let mut seen = Vec::new();
                loop {
                    match ioq.next_pending_irp(0) {
                        Some(irp) => seen.push(irp.hint()),
                        None if stop_flag.load(Ordering::Acquire) => break,
                        None => thread::yield_now(),
                    }
                }
                seen
            }));
        }

        let mut posted = HashSet::new();
        for _ in 0..total {
            let irp = make_irp();
            posted.insert(irp.hint());
            assert!(ioq.post_irp(&irp));
        }

        // Let the consumers drain, then release them.
        while ioq.queue_lengths().0 != 0 {
            thread::yield_now();
        }
        stop_flag.store(true, Ordering::Release);

        let mut delivered = Vec::new();
        for consumer in consumers {
            delivered.extend(consumer.join().unwrap());
        }
        assert_eq!(delivered.len(), total);
        let unique: HashSet<_> = delivered.iter().copied().collect();
        assert_eq!(unique, posted);
    }

    #[test]
    fn test_waiter_wakes_on_post() {
        let ioq = Ioq::new();
        let waiter = {
            let ioq = ioq.clone();
            thread::spawn(move || ioq.next_pending_irp(TIMEOUT_INFINITE))
        };
        let irp = make_irp();
        assert!(ioq.post_irp(&irp));
        let claimed = waiter.join().unwrap().unwrap();
        assert_eq!(claimed.hint(), irp.hint());
    }

    #[test]
    fn test_waiter_wakes_on_stop() {
        let ioq = Ioq::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let ioq = ioq.clone();
                thread::spawn(move || ioq.next_pending_irp(TIMEOUT_INFINITE))
            })
            .collect();
        ioq.stop();
        for waiter in waiters {
            assert!(waiter.join().unwrap().is_none());
        }
    }

    #[test]
    fn test_timed_wait_expires() {
        let ioq = Ioq::new();
        let ticker_done = Arc::new(AtomicBool::new(false));
        let ticker = {
            let done = ticker_done.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    timer::tick();
                    thread::yield_now();
                }
            })
        };
        assert!(ioq.next_pending_irp(50).is_none());
        ticker_done.store(true, Ordering::Release);
        ticker.join().unwrap();
    }

    #[test]
    fn test_stats_track_lifecycle() {
        let ioq = Ioq::new();
        let irp = make_irp();
        assert!(ioq.post_irp(&irp));
        let claimed = ioq.next_pending_irp(0).unwrap();
        assert!(ioq.start_processing_irp(&claimed));
        let retired = ioq.end_processing_irp(claimed.hint()).unwrap();
        complete::complete_request(&retired, STATUS_SUCCESS);

        let stats = ioq.stats();
        assert_eq!(stats.posted, 1);
        assert_eq!(stats.claimed, 1);
        assert_eq!(stats.retired, 1);
        assert_eq!(stats.canceled, 0);
    }
}
