//! NTSTATUS Codes
//!
//! Status codes used across the driver. Only the codes the bridge actually
//! returns are defined here; the full NTSTATUS space belongs to the
//! embedding kernel.
//!
//! Severity is encoded in the top two bits: `00` success, `01`
//! informational, `10` warning, `11` error.

/// Operation completed successfully.
pub const STATUS_SUCCESS: i32 = 0;

/// Operation was accepted and will complete later.
pub const STATUS_PENDING: i32 = 0x0000_0103;

/// Wait returned because the timeout elapsed.
pub const STATUS_TIMEOUT: i32 = 0x0000_0102;

/// The request was denied. Returned when a request is failed because the
/// volume's queue has been stopped and can no longer accept work.
pub const STATUS_ACCESS_DENIED: i32 = 0xC000_0022u32 as i32;

/// The request was canceled before it produced a result. Also the failure
/// used when a stopping queue drains its outstanding requests.
pub const STATUS_CANCELLED: i32 = 0xC000_0120u32 as i32;

/// A parameter did not pass validation.
pub const STATUS_INVALID_PARAMETER: i32 = 0xC000_000Du32 as i32;

/// The control code is not supported by the target device.
pub const STATUS_INVALID_DEVICE_REQUEST: i32 = 0xC000_0010u32 as i32;

/// The device is no longer available (volume deleted or driver unloading).
pub const STATUS_DEVICE_NOT_READY: i32 = 0xC000_00A3u32 as i32;

/// Required resources could not be allocated.
pub const STATUS_INSUFFICIENT_RESOURCES: i32 = 0xC000_009Au32 as i32;

/// The caller asked for a non-blocking acquire that would have blocked.
pub const STATUS_CANT_WAIT: i32 = 0xC000_00D8u32 as i32;

/// A volume with the requested name already exists.
pub const STATUS_OBJECT_NAME_COLLISION: i32 = 0xC000_0035u32 as i32;

/// No volume with the requested name exists.
pub const STATUS_OBJECT_NAME_NOT_FOUND: i32 = 0xC000_0034u32 as i32;

/// The volume is read only and the operation would write.
pub const STATUS_MEDIA_WRITE_PROTECTED: i32 = 0xC000_00A2u32 as i32;

/// Returns true for success and informational codes.
#[inline]
pub const fn nt_success(status: i32) -> bool {
    status >= 0
}

/// Returns true for error codes (severity 11).
#[inline]
pub const fn nt_error(status: i32) -> bool {
    (status as u32) >> 30 == 3
}

/// Symbolic name for a status code, for dispatch exit logging.
pub fn nt_status_name(status: i32) -> &'static str {
    match status {
        STATUS_SUCCESS => "STATUS_SUCCESS",
        STATUS_PENDING => "STATUS_PENDING",
        STATUS_TIMEOUT => "STATUS_TIMEOUT",
        STATUS_ACCESS_DENIED => "STATUS_ACCESS_DENIED",
        STATUS_CANCELLED => "STATUS_CANCELLED",
        STATUS_INVALID_PARAMETER => "STATUS_INVALID_PARAMETER",
        STATUS_INVALID_DEVICE_REQUEST => "STATUS_INVALID_DEVICE_REQUEST",
        STATUS_DEVICE_NOT_READY => "STATUS_DEVICE_NOT_READY",
        STATUS_INSUFFICIENT_RESOURCES => "STATUS_INSUFFICIENT_RESOURCES",
        STATUS_CANT_WAIT => "STATUS_CANT_WAIT",
        STATUS_OBJECT_NAME_COLLISION => "STATUS_OBJECT_NAME_COLLISION",
        STATUS_OBJECT_NAME_NOT_FOUND => "STATUS_OBJECT_NAME_NOT_FOUND",
        STATUS_MEDIA_WRITE_PROTECTED => "STATUS_MEDIA_WRITE_PROTECTED",
        _ => "STATUS_UNKNOWN",
    }
}
