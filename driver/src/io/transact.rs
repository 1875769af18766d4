//! Transact Surface
//!
//! The downstream interface the user-mode file system drives: each transact
//! call delivers zero or more responses for previously checked-out requests,
//! then retrieves the next pending request. Requests and responses are
//! correlated by the opaque hint; a response whose hint no longer matches a
//! checked-out request (canceled or stopped in the meantime) is dropped.

use alloc::sync::Arc;

use crate::io::complete;
use crate::io::device::DeviceObject;
use crate::io::irp::{Irp, IrpHint, IrpMajorFunction, IrpParameters};
use crate::ntstatus::STATUS_ACCESS_DENIED;

/// A checked-out request as described to user mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactReq {
    pub hint: IrpHint,
    pub major_function: IrpMajorFunction,
    pub minor_function: u8,
    pub parameters: IrpParameters,
}

impl TransactReq {
    fn describe(irp: &Arc<Irp>) -> Self {
        Self {
            hint: irp.hint(),
            major_function: irp.major_function(),
            minor_function: irp.minor_function(),
            parameters: irp.parameters(),
        }
    }
}

/// A user-mode response to a checked-out request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactRsp {
    /// Echo of the request's hint, unmodified
    pub hint: IrpHint,
    pub status: i32,
    pub information: usize,
}

/// One transact exchange against a volume device's queue.
///
/// Consumes every response first, then waits up to `millis` milliseconds
/// for the next pending request and checks it out. Returns `None` when no
/// request arrived in time, when the queue has stopped, or when the device
/// has no queue.
pub fn ioq_transact(
    device: &Arc<DeviceObject>,
    responses: &[TransactRsp],
    millis: u32,
) -> Option<TransactReq> {
    let ioq = device.ioq()?;

    for rsp in responses {
        match ioq.end_processing_irp(rsp.hint) {
            Some(irp) => complete::dispatch_processed_irp(&irp, rsp),
            // Already canceled, drained, or a stale echo; nothing to do.
            None => log::trace!("transact response for unknown hint {:#x}", rsp.hint.0),
        }
    }

    let irp = ioq.next_pending_irp(millis)?;
    if !ioq.start_processing_irp(&irp) {
        // The queue stopped between claim and check-out; the request is
        // ours to fail.
        complete::complete_request(&irp, STATUS_ACCESS_DENIED);
        return None;
    }
    Some(TransactReq::describe(&irp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::device::{io_create_fsvrt_device, VolumeParams};
    use crate::io::irp::IrpParameters;
    use crate::ntstatus::{STATUS_CANCELLED, STATUS_SUCCESS};
    use alloc::vec::Vec;

    fn make_volume() -> Arc<DeviceObject> {
        io_create_fsvrt_device("\\Device\\Volume{tx}", Vec::new(), VolumeParams::default())
    }

    #[test]
    fn test_round_trip() {
        let volume = make_volume();
        let ioq = volume.ioq().unwrap();
        let irp = Irp::new(
            IrpMajorFunction::Read,
            IrpParameters::ReadWrite {
                length: 4096,
                key: 0,
                byte_offset: 0x1000,
            },
        );
        assert!(ioq.post_irp(&irp));

        let req = ioq_transact(&volume, &[], 0).unwrap();
        assert_eq!(req.hint, irp.hint());
        assert_eq!(req.major_function, IrpMajorFunction::Read);
        assert_eq!(
            req.parameters,
            IrpParameters::ReadWrite {
                length: 4096,
                key: 0,
                byte_offset: 0x1000,
            }
        );

        let rsp = TransactRsp {
            hint: req.hint,
            status: STATUS_SUCCESS,
            information: 4096,
        };
        assert!(ioq_transact(&volume, &[rsp], 0).is_none());
        assert!(irp.is_completed());
        assert_eq!(irp.io_status().status, STATUS_SUCCESS);
        assert_eq!(irp.io_status().information, 4096);
    }

    #[test]
    fn test_stale_hint_response_is_dropped() {
        let volume = make_volume();
        let rsp = TransactRsp {
            hint: IrpHint(u64::MAX),
            status: STATUS_SUCCESS,
            information: 0,
        };
        assert!(ioq_transact(&volume, &[rsp], 0).is_none());
    }

    #[test]
    fn test_response_after_cancel_is_dropped() {
        let volume = make_volume();
        let ioq = volume.ioq().unwrap();
        let irp = Irp::new(IrpMajorFunction::Write, IrpParameters::None);
        assert!(ioq.post_irp(&irp));
        let req = ioq_transact(&volume, &[], 0).unwrap();

        irp.cancel_state().set_canceled();
        ioq.cancel_irp(&irp);
        assert_eq!(irp.io_status().status, STATUS_CANCELLED);

        // The late echo must not disturb the completed request.
        let rsp = TransactRsp {
            hint: req.hint,
            status: STATUS_SUCCESS,
            information: 1,
        };
        assert!(ioq_transact(&volume, &[rsp], 0).is_none());
        assert_eq!(irp.io_status().status, STATUS_CANCELLED);
    }

    #[test]
    fn test_transact_after_stop_yields_nothing() {
        let volume = make_volume();
        volume.ioq().unwrap().stop();
        assert!(ioq_transact(&volume, &[], 0).is_none());
    }
}
