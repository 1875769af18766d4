//! Fast-Path Accelerators
//!
//! Synchronous shortcuts the cache and memory managers take around the
//! normal dispatch path: resource acquisition for section creation,
//! modified-page writing and cache flushing, plus the pre-flight check
//! deciding whether a fast read/write may bypass dispatch at all.
//!
//! Every entry consults the volume's stop state first; once the queue has
//! stopped nothing may start down a fast path.

use spin::{RwLockReadGuard, RwLockWriteGuard};

use crate::io::device::{DeviceObject, VolumeFlags};
use crate::io::irp::IrpMajorFunction;
use crate::ntstatus::{STATUS_CANT_WAIT, STATUS_DEVICE_NOT_READY};

/// Held file-system resource; releases on drop.
pub enum FastIoResource<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
}

fn volume_usable(device: &DeviceObject) -> bool {
    if device.is_deleted() {
        return false;
    }
    match device.ioq() {
        Some(ioq) => !ioq.stopped(),
        None => false,
    }
}

/// Acquire the file-system resource exclusively ahead of section creation.
///
/// `None` when the device is not a usable mounted volume.
pub fn acquire_for_nt_create_section(device: &DeviceObject) -> Option<FastIoResource<'_>> {
    if !volume_usable(device) {
        return None;
    }
    let resource = device.resource()?;
    Some(FastIoResource::Exclusive(resource.write()))
}

/// Acquire the file-system resource for the modified-page writer.
///
/// The writer cannot block, so this only ever try-acquires; contention
/// reports `STATUS_CANT_WAIT` and the writer retries later.
pub fn acquire_for_mod_write(device: &DeviceObject) -> Result<FastIoResource<'_>, i32> {
    if !volume_usable(device) {
        return Err(STATUS_DEVICE_NOT_READY);
    }
    let resource = device.resource().ok_or(STATUS_DEVICE_NOT_READY)?;
    match resource.try_read() {
        Some(guard) => Ok(FastIoResource::Shared(guard)),
        None => Err(STATUS_CANT_WAIT),
    }
}

/// Acquire the file-system resource shared ahead of a cache flush.
pub fn acquire_for_cc_flush(device: &DeviceObject) -> Option<FastIoResource<'_>> {
    if !volume_usable(device) {
        return None;
    }
    let resource = device.resource()?;
    Some(FastIoResource::Shared(resource.read()))
}

/// Whether a fast read/write may bypass the dispatch path.
///
/// Fast I/O is never possible on a stopped or deleted volume, for
/// operations other than read/write, or for writes on a read-only volume.
pub fn fast_io_check_if_possible(
    device: &DeviceObject,
    operation: IrpMajorFunction,
    _byte_offset: u64,
    _length: u32,
) -> bool {
    if !volume_usable(device) {
        return false;
    }
    match operation {
        IrpMajorFunction::Read => true,
        IrpMajorFunction::Write => {
            let read_only = device
                .volume_params()
                .map(|params| params.flags.contains(VolumeFlags::READ_ONLY))
                .unwrap_or(true);
            !read_only
        }
        _ => false,
    }
}

/// Release an acquired file-system resource.
///
/// Explicit counterpart to the acquire entries; dropping the guard is
/// equivalent.
pub fn release_resource(resource: FastIoResource<'_>) {
    drop(resource);
}
