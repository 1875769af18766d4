//! Cancellation-Safe Queue Adapter (IO_CSQ)
//!
//! Per-collection view over the request queue, equivalent to NT's IO_CSQ
//! pattern: insert/remove/peek primitives that stay safe against racing
//! cancellation because every primitive runs under the queue's one lock,
//! and cancellation itself goes through [`io_csq_cancel_irp`].
//!
//! Both collections share the queue's lock. The adapter adds no state of
//! its own; it names which collection a caller is walking.

use alloc::sync::Arc;

use crate::io::complete;
use crate::io::ioq::Ioq;
use crate::io::irp::{Irp, IrpHint};
use crate::ntstatus::STATUS_CANCELLED;

/// Which queue collection a CSQ view covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoqList {
    /// Requests awaiting hand-off to user mode
    Pending,
    /// Requests checked out to user mode
    Processing,
}

/// Cancellation-safe view of one queue collection.
pub struct IoqCsq {
    ioq: Arc<Ioq>,
    list: IoqList,
}

impl IoqCsq {
    pub fn new(ioq: Arc<Ioq>, list: IoqList) -> Self {
        Self { ioq, list }
    }

    /// Peek the request after `cursor` (or the head for `None`) without
    /// removing it. A stale cursor that no longer matches yields `None`.
    pub fn peek_next(&self, cursor: Option<IrpHint>) -> Option<Arc<Irp>> {
        self.ioq.list_peek_next(self.list, cursor)
    }

    /// Remove a specific request from the collection. False if the request
    /// was not there (already claimed, retired, or drained).
    pub fn remove(&self, irp: &Arc<Irp>) -> bool {
        self.ioq.list_remove(self.list, irp)
    }

    /// Complete a request this view removed on behalf of cancellation.
    pub fn complete_canceled(&self, irp: &Arc<Irp>) {
        complete::complete_request(irp, STATUS_CANCELLED);
    }
}

/// External cancellation entry point.
///
/// Marks the request canceled, then finds the queue that currently holds
/// it (snapshotted from the request's own cancel state, before any queue
/// lock is taken) and asks it to remove and complete the request. If no
/// queue holds it, the flag alone records the cancellation; the queue
/// honors it the next time it sees the request.
pub fn io_csq_cancel_irp(irp: &Arc<Irp>) {
    irp.cancel_state().set_canceled();

    let owner = irp.cancel_state().owner_queue();
    if let Some(ioq) = owner.and_then(|weak| weak.upgrade()) {
        ioq.cancel_irp(irp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::irp::{IrpMajorFunction, IrpParameters};
    use crate::ntstatus::STATUS_SUCCESS;
    use std::thread;

    fn make_irp() -> Arc<Irp> {
        Irp::new(IrpMajorFunction::Read, IrpParameters::None)
    }

    #[test]
    fn test_peek_walks_in_order() {
        let ioq = Ioq::new();
        let csq = IoqCsq::new(ioq.clone(), IoqList::Pending);
        let a = make_irp();
        let b = make_irp();
        assert!(ioq.post_irp(&a));
        assert!(ioq.post_irp(&b));

        let head = csq.peek_next(None).unwrap();
        assert_eq!(head.hint(), a.hint());
        let second = csq.peek_next(Some(head.hint())).unwrap();
        assert_eq!(second.hint(), b.hint());
        assert!(csq.peek_next(Some(second.hint())).is_none());
        // Stale cursor: request no longer in the collection.
        assert!(csq.peek_next(Some(IrpHint(u64::MAX))).is_none());
    }

    #[test]
    fn test_remove_and_complete_canceled() {
        let ioq = Ioq::new();
        let csq = IoqCsq::new(ioq.clone(), IoqList::Pending);
        let irp = make_irp();
        assert!(ioq.post_irp(&irp));

        assert!(csq.remove(&irp));
        assert!(!csq.remove(&irp));
        csq.complete_canceled(&irp);
        assert_eq!(irp.io_status().status, STATUS_CANCELLED);
        assert!(ioq.next_pending_irp(0).is_none());
    }

    #[test]
    fn test_cancel_entry_completes_pending_request() {
        let ioq = Ioq::new();
        let irp = make_irp();
        assert!(ioq.post_irp(&irp));

        io_csq_cancel_irp(&irp);
        assert!(irp.is_completed());
        assert_eq!(irp.io_status().status, STATUS_CANCELLED);
        assert!(ioq.next_pending_irp(0).is_none());
    }

    #[test]
    fn test_cancel_entry_without_owner_sets_flag_only() {
        let irp = make_irp();
        io_csq_cancel_irp(&irp);
        assert!(irp.cancel_state().is_canceled());
        assert!(!irp.is_completed());
    }

    #[test]
    fn test_cancel_races_retirement_cleanly() {
        for _ in 0..100 {
            let ioq = Ioq::new();
            let irp = make_irp();
            assert!(ioq.post_irp(&irp));
            let claimed = ioq.next_pending_irp(0).unwrap();
            assert!(ioq.start_processing_irp(&claimed));

            let canceler = {
                let irp = claimed.clone();
                thread::spawn(move || io_csq_cancel_irp(&irp))
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
        }
    }
}
