//! Dispatch Harness
//!
//! Every request enters the driver through [`fsp_dispatch`], which routes by
//! the device's role tag and runs the handler inside the dispatch harness:
//! a guarded-region enter/exit pair plus exit bookkeeping that runs exactly
//! once on every exit path, including unwinds.
//!
//! A handler returns [`IoRequestResult`]: either the final status for
//! synchronous completion, or `Pending` to post the request to the device's
//! queue for user mode. A pending request whose queue refuses it (stopped)
//! is completed with the denial status instead.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use alloc::sync::Arc;

use crate::io::complete;
use crate::io::device::{DeviceKind, DeviceObject};
use crate::io::irp::{irp_major_function_name, Irp};
use crate::ntstatus::{
    nt_status_name, STATUS_ACCESS_DENIED, STATUS_DEVICE_NOT_READY,
    STATUS_INVALID_DEVICE_REQUEST, STATUS_PENDING, STATUS_SUCCESS,
};

/// Handler verdict for a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoRequestResult {
    /// Complete the request now with this status block.
    Complete { status: i32, information: usize },
    /// Post the request to the device's queue for user mode.
    Pending,
}

/// Count of dispatches currently inside the guarded region.
static DISPATCH_DEPTH: AtomicU32 = AtomicU32::new(0);

/// Number of requests currently inside the dispatch harness.
pub fn in_flight() -> u32 {
    DISPATCH_DEPTH.load(Ordering::Acquire)
}

/// Exit bookkeeping for one dispatch. Entering increments the guarded
/// region depth; dropping logs the outcome and decrements it, on normal
/// returns and unwinds alike.
struct DispatchGuard<'a> {
    irp: &'a Arc<Irp>,
    status: Cell<Option<i32>>,
}

impl<'a> DispatchGuard<'a> {
    fn enter(irp: &'a Arc<Irp>) -> Self {
        DISPATCH_DEPTH.fetch_add(1, Ordering::AcqRel);
        Self {
            irp,
            status: Cell::new(None),
        }
    }

    fn set_status(&self, status: i32) {
        self.status.set(Some(status));
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        match self.status.get() {
            Some(status) => log::trace!(
                "{} irp {:#x} = {}",
                irp_major_function_name(self.irp.major_function()),
                self.irp.hint().0,
                nt_status_name(status)
            ),
            None => log::warn!(
                "{} irp {:#x} left dispatch by unwind",
                irp_major_function_name(self.irp.major_function()),
                self.irp.hint().0
            ),
        }
        DISPATCH_DEPTH.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Run one request through the dispatch harness.
///
/// Returns `STATUS_PENDING` if the request was queued for user mode, the
/// completion status otherwise. By return, the request is either completed
/// or owned by the queue.
pub fn dispatch_irp<F>(device: &Arc<DeviceObject>, irp: &Arc<Irp>, handler: F) -> i32
where
    F: FnOnce(&Arc<DeviceObject>, &Arc<Irp>) -> IoRequestResult,
{
    let guard = DispatchGuard::enter(irp);

    let status = match handler(device, irp) {
        IoRequestResult::Complete {
            status,
            information,
        } => {
            complete::complete_request_with_information(irp, status, information);
            status
        }
        IoRequestResult::Pending => match device.ioq() {
            Some(ioq) if ioq.post_irp(irp) => STATUS_PENDING,
            _ => {
                complete::complete_request(irp, STATUS_ACCESS_DENIED);
                STATUS_ACCESS_DENIED
            }
        },
    };

    guard.set_status(status);
    status
}

/// Top-level dispatch: route by device role.
pub fn fsp_dispatch(device: &Arc<DeviceObject>, irp: &Arc<Irp>) -> i32 {
    match device.kind() {
        DeviceKind::Fsctl => dispatch_irp(device, irp, fsctl_handler),
        DeviceKind::Fsvrt => dispatch_irp(device, irp, fsvrt_handler),
        DeviceKind::Fsvol => dispatch_irp(device, irp, fsvol_handler),
    }
}

/// Control device: only the open/close surface completes here; volume
/// management runs over the control-code surface in [`crate::io::driver`].
fn fsctl_handler(_device: &Arc<DeviceObject>, irp: &Arc<Irp>) -> IoRequestResult {
    use crate::io::irp::IrpMajorFunction::*;
    match irp.major_function() {
        Create | Cleanup | Close => IoRequestResult::Complete {
            status: STATUS_SUCCESS,
            information: 0,
        },
        _ => IoRequestResult::Complete {
            status: STATUS_INVALID_DEVICE_REQUEST,
            information: 0,
        },
    }
}

/// Virtual volume device: same open/close surface as the control devices.
fn fsvrt_handler(device: &Arc<DeviceObject>, irp: &Arc<Irp>) -> IoRequestResult {
    fsctl_handler(device, irp)
}

/// Mounted volume device: forward every supported file operation to user
/// mode through the queue.
fn fsvol_handler(device: &Arc<DeviceObject>, irp: &Arc<Irp>) -> IoRequestResult {
    if device.is_deleted() {
        return IoRequestResult::Complete {
            status: STATUS_DEVICE_NOT_READY,
            information: 0,
        };
    }
    if complete::has_completion_routine(irp.major_function()) {
        IoRequestResult::Pending
    } else {
        IoRequestResult::Complete {
            status: STATUS_INVALID_DEVICE_REQUEST,
            information: 0,
        }
    }
}
