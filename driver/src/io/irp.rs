//! I/O Request Packet (IRP)
//!
//! Every file-system call the bridge handles is represented by an `Irp`.
//! The I/O manager owns the packet for its whole lifetime; the request
//! queue only ever holds non-owning membership references (`Arc` clones),
//! and a packet is linked into at most one queue collection at a time.
//!
//! # Request Lifecycle
//! 1. Created by the I/O manager for an incoming file-system call
//! 2. Dispatched; either completed synchronously or posted to the queue
//! 3. Checked out by a user-mode worker over the transact surface
//! 4. Completed by the matching response, by cancellation, or by queue stop
//!
//! A packet carries the correlation hint echoed by user mode, its
//! cancellation state, and the status block the completion path fills in.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use alloc::sync::{Arc, Weak};

use crate::ke::{EventType, KEvent, SpinLock};

use super::ioq::Ioq;

/// Number of major function codes (size of dispatch tables).
pub const IRP_MJ_MAXIMUM_FUNCTION: usize = 28;

/// Major function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IrpMajorFunction {
    Create = 0,
    CreateNamedPipe = 1,
    Close = 2,
    Read = 3,
    Write = 4,
    QueryInformation = 5,
    SetInformation = 6,
    QueryEa = 7,
    SetEa = 8,
    FlushBuffers = 9,
    QueryVolumeInformation = 10,
    SetVolumeInformation = 11,
    DirectoryControl = 12,
    FileSystemControl = 13,
    DeviceControl = 14,
    InternalDeviceControl = 15,
    Shutdown = 16,
    LockControl = 17,
    Cleanup = 18,
    CreateMailslot = 19,
    QuerySecurity = 20,
    SetSecurity = 21,
    Power = 22,
    SystemControl = 23,
    DeviceChange = 24,
    QueryQuota = 25,
    SetQuota = 26,
    Pnp = 27,
}

/// Symbolic name of a major function, for dispatch exit logging.
pub fn irp_major_function_name(major: IrpMajorFunction) -> &'static str {
    match major {
        IrpMajorFunction::Create => "IRP_MJ_CREATE",
        IrpMajorFunction::CreateNamedPipe => "IRP_MJ_CREATE_NAMED_PIPE",
        IrpMajorFunction::Close => "IRP_MJ_CLOSE",
        IrpMajorFunction::Read => "IRP_MJ_READ",
        IrpMajorFunction::Write => "IRP_MJ_WRITE",
        IrpMajorFunction::QueryInformation => "IRP_MJ_QUERY_INFORMATION",
        IrpMajorFunction::SetInformation => "IRP_MJ_SET_INFORMATION",
        IrpMajorFunction::QueryEa => "IRP_MJ_QUERY_EA",
        IrpMajorFunction::SetEa => "IRP_MJ_SET_EA",
        IrpMajorFunction::FlushBuffers => "IRP_MJ_FLUSH_BUFFERS",
        IrpMajorFunction::QueryVolumeInformation => "IRP_MJ_QUERY_VOLUME_INFORMATION",
        IrpMajorFunction::SetVolumeInformation => "IRP_MJ_SET_VOLUME_INFORMATION",
        IrpMajorFunction::DirectoryControl => "IRP_MJ_DIRECTORY_CONTROL",
        IrpMajorFunction::FileSystemControl => "IRP_MJ_FILE_SYSTEM_CONTROL",
        IrpMajorFunction::DeviceControl => "IRP_MJ_DEVICE_CONTROL",
        IrpMajorFunction::InternalDeviceControl => "IRP_MJ_INTERNAL_DEVICE_CONTROL",
        IrpMajorFunction::Shutdown => "IRP_MJ_SHUTDOWN",
        IrpMajorFunction::LockControl => "IRP_MJ_LOCK_CONTROL",
        IrpMajorFunction::Cleanup => "IRP_MJ_CLEANUP",
        IrpMajorFunction::CreateMailslot => "IRP_MJ_CREATE_MAILSLOT",
        IrpMajorFunction::QuerySecurity => "IRP_MJ_QUERY_SECURITY",
        IrpMajorFunction::SetSecurity => "IRP_MJ_SET_SECURITY",
        IrpMajorFunction::Power => "IRP_MJ_POWER",
        IrpMajorFunction::SystemControl => "IRP_MJ_SYSTEM_CONTROL",
        IrpMajorFunction::DeviceChange => "IRP_MJ_DEVICE_CHANGE",
        IrpMajorFunction::QueryQuota => "IRP_MJ_QUERY_QUOTA",
        IrpMajorFunction::SetQuota => "IRP_MJ_SET_QUOTA",
        IrpMajorFunction::Pnp => "IRP_MJ_PNP",
    }
}

/// Requestor mode of the originating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestorMode {
    KernelMode = 0,
    UserMode = 1,
}

/// Result of an I/O operation: status code plus an operation-defined
/// information value (bytes transferred, handle, etc).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoStatusBlock {
    pub status: i32,
    pub information: usize,
}

impl IoStatusBlock {
    pub const fn new() -> Self {
        Self {
            status: 0,
            information: 0,
        }
    }
}

impl Default for IoStatusBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-operation parameters, the slice of the NT stack-location parameter
/// union the bridge forwards to user mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrpParameters {
    None,
    Create {
        options: u32,
        file_attributes: u16,
        share_access: u16,
    },
    ReadWrite {
        length: u32,
        key: u32,
        byte_offset: u64,
    },
    QuerySetInformation {
        length: u32,
        information_class: u32,
    },
    DirectoryControl {
        length: u32,
        information_class: u32,
    },
    DeviceControl {
        control_code: u32,
        input_length: u32,
        output_length: u32,
    },
    Security {
        security_information: u32,
        length: u32,
    },
}

/// Opaque correlation identity for a checked-out request.
///
/// The hint is a unique sequence number, not the packet's address, so a
/// recycled allocation can never alias a stale hint onto a live request.
/// User mode must echo it unmodified; the queue only ever compares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IrpHint(pub u64);

/// Source of unique request hints. Starts at 1; zero is never a valid hint.
static NEXT_IRP_HINT: AtomicU64 = AtomicU64::new(1);

/// Cancellation state carried by every request.
///
/// The canceled flag records that cancellation was requested; the owner
/// slot records which queue (if any) currently holds the request, so the
/// cancellation path can find and remove it. The slot is set while the
/// queue lock is held on insertion and cleared on removal; collection
/// membership under that lock, not this slot, is the arbiter of whether
/// the request can still be completed by cancellation.
pub struct CancelState {
    canceled: AtomicBool,
    owner: SpinLock<Option<Weak<Ioq>>>,
}

impl CancelState {
    const fn new() -> Self {
        Self {
            canceled: AtomicBool::new(false),
            owner: SpinLock::new(None),
        }
    }

    /// Whether cancellation has been requested.
    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Mark the request canceled. Returns the previous state.
    pub fn set_canceled(&self) -> bool {
        self.canceled.swap(true, Ordering::AcqRel)
    }

    /// Record the queue that now holds the request.
    pub fn attach_queue(&self, queue: Weak<Ioq>) {
        *self.owner.lock() = Some(queue);
    }

    /// Clear the owner slot; called when the request leaves a collection.
    pub fn detach_queue(&self) {
        *self.owner.lock() = None;
    }

    /// Snapshot the owning queue, if any.
    pub fn owner_queue(&self) -> Option<Weak<Ioq>> {
        self.owner.lock().clone()
    }
}

/// I/O Request Packet.
pub struct Irp {
    /// Correlation hint (unique sequence number).
    hint: IrpHint,
    /// Operation kind.
    major_function: IrpMajorFunction,
    /// Minor function code (operation-specific).
    minor_function: u8,
    /// Operation parameters.
    parameters: IrpParameters,
    /// Requestor mode of the originating call.
    requestor_mode: RequestorMode,
    /// Completion result; written exactly once by the completion path.
    io_status: SpinLock<IoStatusBlock>,
    /// Completion latch; completion may happen exactly once.
    completed: AtomicBool,
    /// Signaled when the request completes (notification semantics).
    completion_event: KEvent,
    /// Cancellation state.
    cancel: CancelState,
}

impl Irp {
    /// Allocate a new request for the given operation.
    pub fn new(major_function: IrpMajorFunction, parameters: IrpParameters) -> Arc<Self> {
        Self::with_mode(major_function, parameters, RequestorMode::UserMode)
    }

    /// Allocate a new request with an explicit requestor mode.
    pub fn with_mode(
        major_function: IrpMajorFunction,
        parameters: IrpParameters,
        requestor_mode: RequestorMode,
    ) -> Arc<Self> {
        Arc::new(Self {
            hint: IrpHint(NEXT_IRP_HINT.fetch_add(1, Ordering::Relaxed)),
            major_function,
            minor_function: 0,
            parameters,
            requestor_mode,
            io_status: SpinLock::new(IoStatusBlock::new()),
            completed: AtomicBool::new(false),
            completion_event: KEvent::new(EventType::Notification, false),
            cancel: CancelState::new(),
        })
    }

    /// Correlation hint for this request.
    #[inline]
    pub fn hint(&self) -> IrpHint {
        self.hint
    }

    #[inline]
    pub fn major_function(&self) -> IrpMajorFunction {
        self.major_function
    }

    #[inline]
    pub fn minor_function(&self) -> u8 {
        self.minor_function
    }

    #[inline]
    pub fn parameters(&self) -> IrpParameters {
        self.parameters
    }

    #[inline]
    pub fn requestor_mode(&self) -> RequestorMode {
        self.requestor_mode
    }

    /// Cancellation state.
    #[inline]
    pub fn cancel_state(&self) -> &CancelState {
        &self.cancel
    }

    /// Whether the request has been completed.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Claim the right to complete the request. Only the first caller
    /// succeeds; see [`crate::io::complete::complete_request`].
    pub(crate) fn try_claim_completion(&self) -> bool {
        self.completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record the completion result. Only called by the completion path
    /// after a successful claim.
    pub(crate) fn store_io_status(&self, status: IoStatusBlock) {
        *self.io_status.lock() = status;
        self.completion_event.set();
    }

    /// The completion result. Meaningful once [`Irp::is_completed`].
    pub fn io_status(&self) -> IoStatusBlock {
        *self.io_status.lock()
    }

    /// Event signaled when the request completes.
    pub fn completion_event(&self) -> &KEvent {
        &self.completion_event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_are_unique_and_nonzero() {
        let a = Irp::new(IrpMajorFunction::Create, IrpParameters::None);
        let b = Irp::new(IrpMajorFunction::Create, IrpParameters::None);
        assert_ne!(a.hint(), b.hint());
        assert_ne!(a.hint().0, 0);
        assert_ne!(b.hint().0, 0);
    }

    #[test]
    fn test_completion_claim_is_exclusive() {
        let irp = Irp::new(IrpMajorFunction::Read, IrpParameters::None);
        assert!(!irp.is_completed());
        assert!(irp.try_claim_completion());
        assert!(!irp.try_claim_completion());
        assert!(irp.is_completed());
    }

    #[test]
    fn test_cancel_state() {
        let irp = Irp::new(IrpMajorFunction::Write, IrpParameters::None);
        assert!(!irp.cancel_state().is_canceled());
        assert!(!irp.cancel_state().set_canceled());
        assert!(irp.cancel_state().set_canceled());
        assert!(irp.cancel_state().owner_queue().is_none());
    }

    #[test]
    fn test_major_function_names() {
        assert_eq!(
            irp_major_function_name(IrpMajorFunction::DirectoryControl),
            "IRP_MJ_DIRECTORY_CONTROL"
        );
        assert_eq!(
            irp_major_function_name(IrpMajorFunction::QuerySecurity),
            "IRP_MJ_QUERY_SECURITY"
        );
    }
}
