//! Request Completion
//!
//! Terminal transition of the request lifecycle. Completion happens exactly
//! once per request no matter how many paths race toward it (response,
//! cancellation, queue stop); the atomic completion claim here backstops the
//! queue's collection-membership arbitration.
//!
//! Also home of the completion dispatch table: responses coming back from
//! user mode are routed to a per-operation completion routine indexed by the
//! original request's major function.

use alloc::sync::Arc;

use crate::io::irp::{irp_major_function_name, IoStatusBlock, Irp, IRP_MJ_MAXIMUM_FUNCTION};
use crate::io::transact::TransactRsp;
use crate::ntstatus::nt_status_name;

/// Complete a request with a status and no information value.
pub fn complete_request(irp: &Arc<Irp>, status: i32) {
    complete_request_with_information(irp, status, 0);
}

/// Complete a request with a status and information value.
///
/// Records the status block, signals the request's completion event, and
/// clears any cancellation registration. A second completion attempt is
/// ignored with a warning.
pub fn complete_request_with_information(irp: &Arc<Irp>, status: i32, information: usize) {
    if !irp.try_claim_completion() {
        log::warn!(
            "double completion attempt: irp {:#x} {}",
            irp.hint().0,
            irp_major_function_name(irp.major_function())
        );
        return;
    }

    irp.cancel_state().detach_queue();
    irp.store_io_status(IoStatusBlock {
        status,
        information,
    });

    log::trace!(
        "complete irp {:#x} {} = {}[{}]",
        irp.hint().0,
        irp_major_function_name(irp.major_function()),
        nt_status_name(status),
        information
    );
}

type CompletionFn = fn(&Arc<Irp>, &TransactRsp);

/// Generic completion: the response status and information go straight into
/// the request's status block.
fn complete_generic(irp: &Arc<Irp>, rsp: &TransactRsp) {
    complete_request_with_information(irp, rsp.status, rsp.information);
}

/// Create completion. The information value carries the open disposition
/// reported by user mode.
fn complete_create(irp: &Arc<Irp>, rsp: &TransactRsp) {
    complete_request_with_information(irp, rsp.status, rsp.information);
}

/// Read/write completion. The information value carries bytes transferred.
fn complete_transfer(irp: &Arc<Irp>, rsp: &TransactRsp) {
    complete_request_with_information(irp, rsp.status, rsp.information);
}

/// Completion dispatch table, indexed by major function code.
///
/// Entries exist for every operation the mounted-volume surface forwards to
/// user mode; everything else is never posted and has no routine.
static COMPLETION_TABLE: [Option<CompletionFn>; IRP_MJ_MAXIMUM_FUNCTION] = [
    Some(complete_create),  // 0  IRP_MJ_CREATE
    None,                   // 1  IRP_MJ_CREATE_NAMED_PIPE
    Some(complete_generic), // 2  IRP_MJ_CLOSE
    Some(complete_transfer),// 3  IRP_MJ_READ
    Some(complete_transfer),// 4  IRP_MJ_WRITE
    Some(complete_generic), // 5  IRP_MJ_QUERY_INFORMATION
    Some(complete_generic), // 6  IRP_MJ_SET_INFORMATION
    Some(complete_generic), // 7  IRP_MJ_QUERY_EA
    Some(complete_generic), // 8  IRP_MJ_SET_EA
    Some(complete_generic), // 9  IRP_MJ_FLUSH_BUFFERS
    Some(complete_generic), // 10 IRP_MJ_QUERY_VOLUME_INFORMATION
    Some(complete_generic), // 11 IRP_MJ_SET_VOLUME_INFORMATION
    Some(complete_generic), // 12 IRP_MJ_DIRECTORY_CONTROL
    Some(complete_generic), // 13 IRP_MJ_FILE_SYSTEM_CONTROL
    Some(complete_generic), // 14 IRP_MJ_DEVICE_CONTROL
    None,                   // 15 IRP_MJ_INTERNAL_DEVICE_CONTROL
    Some(complete_generic), // 16 IRP_MJ_SHUTDOWN
    Some(complete_generic), // 17 IRP_MJ_LOCK_CONTROL
    Some(complete_generic), // 18 IRP_MJ_CLEANUP
    None,                   // 19 IRP_MJ_CREATE_MAILSLOT
    Some(complete_generic), // 20 IRP_MJ_QUERY_SECURITY
    Some(complete_generic), // 21 IRP_MJ_SET_SECURITY
    None,                   // 22 IRP_MJ_POWER
    None,                   // 23 IRP_MJ_SYSTEM_CONTROL
    None,                   // 24 IRP_MJ_DEVICE_CHANGE
    None,                   // 25 IRP_MJ_QUERY_QUOTA
    None,                   // 26 IRP_MJ_SET_QUOTA
    None,                   // 27 IRP_MJ_PNP
];

/// Whether a completion routine is registered for this major function,
/// i.e. whether the operation may be forwarded to user mode at all.
pub fn has_completion_routine(major: crate::io::irp::IrpMajorFunction) -> bool {
    COMPLETION_TABLE[major as usize].is_some()
}

/// Route a user-mode response to the completion routine for the original
/// request's operation.
///
/// Panics if no routine is registered for the request's major function;
/// such a request could never have been posted, so this indicates a
/// dispatch-table configuration error.
pub fn dispatch_processed_irp(irp: &Arc<Irp>, rsp: &TransactRsp) {
    let index = irp.major_function() as usize;
    match COMPLETION_TABLE[index] {
        Some(completion) => completion(irp, rsp),
        None => panic!(
            "no completion routine for {}",
            irp_major_function_name(irp.major_function())
        ),
    }
}
