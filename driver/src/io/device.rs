//! Device Objects and Roles
//!
//! The bridge operates three device roles:
//!
//! - **fsctl**: the control devices (disk and net flavor) user-mode file
//!   systems open to create volumes and run the transact loop
//! - **fsvrt**: a virtual volume device; owns the request queue and the
//!   captured volume parameters
//! - **fsvol**: the mounted file-system volume device; routes file I/O and
//!   back-references its fsvrt
//!
//! The role is a typed extension variant, so dispatch selects behavior with
//! an exhaustive `match` rather than a tag byte.

use core::sync::atomic::{AtomicBool, Ordering};

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use bitflags::bitflags;
use spin::RwLock;

use crate::io::ioq::Ioq;

bitflags! {
    /// Volume behavior flags captured at volume creation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VolumeFlags: u32 {
        const CASE_SENSITIVE = 1 << 0;
        const READ_ONLY      = 1 << 1;
    }
}

/// Volume creation parameters supplied by the user-mode file system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeParams {
    pub sector_size: u16,
    pub sectors_per_allocation_unit: u16,
    pub volume_serial_number: u32,
    pub flags: VolumeFlags,
    /// Transact wait granularity in milliseconds
    pub transact_timeout: u32,
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            sector_size: 512,
            sectors_per_allocation_unit: 1,
            volume_serial_number: 0,
            flags: VolumeFlags::empty(),
            transact_timeout: 1000,
        }
    }
}

/// Control device flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlavor {
    Disk,
    Net,
}

/// Device role tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Fsctl,
    Fsvrt,
    Fsvol,
}

/// Role-specific device state.
pub enum DeviceExtension {
    /// Control device
    Fsctl { flavor: ControlFlavor },
    /// Virtual volume device; owns the request queue
    Fsvrt {
        ioq: Arc<Ioq>,
        security_descriptor: Vec<u8>,
        volume_params: VolumeParams,
    },
    /// Mounted file-system volume device
    Fsvol {
        /// The virtual volume this file system is mounted on
        fsvrt: Arc<DeviceObject>,
        /// Cached from the fsvrt so file I/O skips the indirection
        ioq: Arc<Ioq>,
        /// File-system resource taken by the fast-path accelerators
        resource: RwLock<()>,
    },
}

/// A device object: name plus role extension.
pub struct DeviceObject {
    name: String,
    deleted: AtomicBool,
    extension: DeviceExtension,
}

impl DeviceObject {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn extension(&self) -> &DeviceExtension {
        &self.extension
    }

    /// Role tag of this device.
    pub fn kind(&self) -> DeviceKind {
        match self.extension {
            DeviceExtension::Fsctl { .. } => DeviceKind::Fsctl,
            DeviceExtension::Fsvrt { .. } => DeviceKind::Fsvrt,
            DeviceExtension::Fsvol { .. } => DeviceKind::Fsvol,
        }
    }

    /// The request queue serving this device, if its role has one.
    pub fn ioq(&self) -> Option<&Arc<Ioq>> {
        match &self.extension {
            DeviceExtension::Fsctl { .. } => None,
            DeviceExtension::Fsvrt { ioq, .. } => Some(ioq),
            DeviceExtension::Fsvol { ioq, .. } => Some(ioq),
        }
    }

    /// Volume parameters, for volume-role devices.
    pub fn volume_params(&self) -> Option<&VolumeParams> {
        match &self.extension {
            DeviceExtension::Fsvrt { volume_params, .. } => Some(volume_params),
            DeviceExtension::Fsvol { fsvrt, .. } => fsvrt.volume_params(),
            DeviceExtension::Fsctl { .. } => None,
        }
    }

    /// Captured security descriptor bytes, for the fsvrt role.
    pub fn security_descriptor(&self) -> Option<&[u8]> {
        match &self.extension {
            DeviceExtension::Fsvrt {
                security_descriptor,
                ..
            } => Some(security_descriptor),
            _ => None,
        }
    }

    /// File-system resource, for the fsvol role.
    pub(crate) fn resource(&self) -> Option<&RwLock<()>> {
        match &self.extension {
            DeviceExtension::Fsvol { resource, .. } => Some(resource),
            _ => None,
        }
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }
}

/// Create a control device.
pub fn io_create_control_device(name: &str, flavor: ControlFlavor) -> Arc<DeviceObject> {
    log::debug!("create fsctl device {} ({:?})", name, flavor);
    Arc::new(DeviceObject {
        name: String::from(name),
        deleted: AtomicBool::new(false),
        extension: DeviceExtension::Fsctl { flavor },
    })
}

/// Create a virtual volume device with a fresh, running request queue.
pub fn io_create_fsvrt_device(
    name: &str,
    security_descriptor: Vec<u8>,
    volume_params: VolumeParams,
) -> Arc<DeviceObject> {
    log::debug!("create fsvrt device {}", name);
    Arc::new(DeviceObject {
        name: String::from(name),
        deleted: AtomicBool::new(false),
        extension: DeviceExtension::Fsvrt {
            ioq: Ioq::new(),
            security_descriptor,
            volume_params,
        },
    })
}

/// Create the mounted volume device for a virtual volume.
///
/// Returns `None` if the target is not an fsvrt device or was deleted.
pub fn io_create_fsvol_device(name: &str, fsvrt: &Arc<DeviceObject>) -> Option<Arc<DeviceObject>> {
    if fsvrt.is_deleted() {
        return None;
    }
    let ioq = match fsvrt.extension() {
        DeviceExtension::Fsvrt { ioq, .. } => ioq.clone(),
        _ => return None,
    };
    log::debug!("create fsvol device {} on {}", name, fsvrt.name());
    Some(Arc::new(DeviceObject {
        name: String::from(name),
        deleted: AtomicBool::new(false),
        extension: DeviceExtension::Fsvol {
            fsvrt: fsvrt.clone(),
            ioq,
            resource: RwLock::new(()),
        },
    }))
}

/// Mark a device deleted. Deleting a virtual volume device stops its
/// queue, draining and failing every outstanding request; deleting a
/// mounted volume device leaves the queue to its owning fsvrt.
pub fn io_delete_device(device: &Arc<DeviceObject>) {
    if device.deleted.swap(true, Ordering::AcqRel) {
        return;
    }
    log::debug!("delete device {}", device.name());
    if let DeviceExtension::Fsvrt { ioq, .. } = device.extension() {
        ioq.stop();
    }
}
