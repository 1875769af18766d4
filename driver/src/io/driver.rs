//! Driver Registry and Volume Management
//!
//! Process-wide driver state: the two control devices (disk and net
//! flavor) and the table of live virtual volumes, built once at driver
//! entry and torn down in reverse at unload. The registry is an explicit
//! object; nothing in the driver reaches for device globals.
//!
//! The control devices expose the volume-management surface: create a
//! volume (fresh queue, GUID device name, captured security descriptor),
//! delete it, mount it as a file-system volume, and run the transact
//! exchange against it.

use core::sync::atomic::{AtomicBool, Ordering};

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Once;

use crate::io::device::{
    io_create_control_device, io_create_fsvol_device, io_create_fsvrt_device, io_delete_device,
    ControlFlavor, DeviceKind, DeviceObject, VolumeParams,
};
use crate::io::transact::{ioq_transact, TransactReq, TransactRsp};
use crate::ke::SpinLock;
use crate::ntstatus::{
    STATUS_DEVICE_NOT_READY, STATUS_INVALID_DEVICE_REQUEST, STATUS_OBJECT_NAME_COLLISION,
    STATUS_OBJECT_NAME_NOT_FOUND,
};
use crate::rtl::Uuid;

const FSCTL_DISK_DEVICE_NAME: &str = "\\Device\\FsProxy.Disk";
const FSCTL_NET_DEVICE_NAME: &str = "\\Device\\FsProxy.Net";

/// A registered volume: the virtual volume device and, once mounted, its
/// file-system volume device.
struct VolumeEntry {
    fsvrt: Arc<DeviceObject>,
    fsvol: Option<Arc<DeviceObject>>,
}

/// Process-wide driver state.
pub struct DriverRegistry {
    fsctl_disk: Arc<DeviceObject>,
    fsctl_net: Arc<DeviceObject>,
    volumes: SpinLock<BTreeMap<String, VolumeEntry>>,
    unloaded: AtomicBool,
}

static DRIVER: Once<DriverRegistry> = Once::new();

/// Build the process-wide registry. Idempotent; later calls return the
/// registry built by the first.
pub fn driver_entry() -> &'static DriverRegistry {
    DRIVER.call_once(|| {
        log::info!("driver entry");
        DriverRegistry::new()
    })
}

/// The registry, if driver entry has run.
pub fn driver_registry() -> Option<&'static DriverRegistry> {
    DRIVER.get()
}

impl DriverRegistry {
    fn new() -> Self {
        Self {
            fsctl_disk: io_create_control_device(FSCTL_DISK_DEVICE_NAME, ControlFlavor::Disk),
            fsctl_net: io_create_control_device(FSCTL_NET_DEVICE_NAME, ControlFlavor::Net),
            volumes: SpinLock::new(BTreeMap::new()),
            unloaded: AtomicBool::new(false),
        }
    }

    /// The control device of the given flavor.
    pub fn fsctl_device(&self, flavor: ControlFlavor) -> &Arc<DeviceObject> {
        match flavor {
            ControlFlavor::Disk => &self.fsctl_disk,
            ControlFlavor::Net => &self.fsctl_net,
        }
    }

    /// Number of registered volumes.
    pub fn volume_count(&self) -> usize {
        self.volumes.lock().len()
    }

    /// Create a new virtual volume with a fresh queue and a generated
    /// GUID device name.
    pub fn create_volume(
        &self,
        security_descriptor: Vec<u8>,
        volume_params: VolumeParams,
    ) -> Result<Arc<DeviceObject>, i32> {
        if self.unloaded.load(Ordering::Acquire) {
            return Err(STATUS_DEVICE_NOT_READY);
        }

        let name = format!("\\Device\\Volume{}", Uuid::new_v4().braced());
        let fsvrt = io_create_fsvrt_device(&name, security_descriptor, volume_params);

        let mut volumes = self.volumes.lock();
        if volumes.contains_key(&name) {
            return Err(STATUS_OBJECT_NAME_COLLISION);
        }
        volumes.insert(
            name,
            VolumeEntry {
                fsvrt: fsvrt.clone(),
                fsvol: None,
            },
        );
        Ok(fsvrt)
    }

    /// Look up a virtual volume device by name.
    pub fn lookup_volume(&self, name: &str) -> Option<Arc<DeviceObject>> {
        self.volumes
            .lock()
            .get(name)
            .map(|entry| entry.fsvrt.clone())
    }

    /// Delete a volume: stop its queue (draining and failing everything
    /// outstanding) and unregister it.
    pub fn delete_volume(&self, name: &str) -> Result<(), i32> {
        let entry = self
            .volumes
            .lock()
            .remove(name)
            .ok_or(STATUS_OBJECT_NAME_NOT_FOUND)?;
        if let Some(fsvol) = &entry.fsvol {
            io_delete_device(fsvol);
        }
        io_delete_device(&entry.fsvrt);
        Ok(())
    }

    /// Mount a volume: create its file-system volume device.
    pub fn mount_volume(&self, name: &str) -> Result<Arc<DeviceObject>, i32> {
        let mut volumes = self.volumes.lock();
        let entry = volumes.get_mut(name).ok_or(STATUS_OBJECT_NAME_NOT_FOUND)?;
        if entry.fsvol.is_some() {
            return Err(STATUS_OBJECT_NAME_COLLISION);
        }
        let fsvol_name = format!("{}.Fs", name);
        let fsvol = io_create_fsvol_device(&fsvol_name, &entry.fsvrt)
            .ok_or(STATUS_DEVICE_NOT_READY)?;
        entry.fsvol = Some(fsvol.clone());
        Ok(fsvol)
    }

    /// Unmount a volume: retire its file-system volume device, leaving
    /// the virtual volume (and its queue) in place for a later mount.
    pub fn unmount_volume(&self, name: &str) -> Result<(), i32> {
        let mut volumes = self.volumes.lock();
        let entry = volumes.get_mut(name).ok_or(STATUS_OBJECT_NAME_NOT_FOUND)?;
        let fsvol = entry.fsvol.take().ok_or(STATUS_OBJECT_NAME_NOT_FOUND)?;
        io_delete_device(&fsvol);
        Ok(())
    }

    /// Tear the driver down: stop every volume queue, drop the volumes,
    /// then retire the control devices. Create is refused afterwards.
    pub fn unload(&self) {
        if self.unloaded.swap(true, Ordering::AcqRel) {
            log::warn!("driver unload requested twice");
            return;
        }
        log::info!("driver unload");

        let drained = core::mem::take(&mut *self.volumes.lock());
        for entry in drained.values() {
            if let Some(fsvol) = &entry.fsvol {
                io_delete_device(fsvol);
            }
            io_delete_device(&entry.fsvrt);
        }

        io_delete_device(&self.fsctl_disk);
        io_delete_device(&self.fsctl_net);
    }
}

/// Typed control request against a control device.
pub enum FsctlRequest<'a> {
    CreateVolume {
        security_descriptor: Vec<u8>,
        volume_params: VolumeParams,
    },
    DeleteVolume {
        name: &'a str,
    },
    MountVolume {
        name: &'a str,
    },
    UnmountVolume {
        name: &'a str,
    },
    Transact {
        name: &'a str,
        responses: &'a [TransactRsp],
        millis: u32,
    },
}

/// Control request outcome.
pub enum FsctlResponse {
    VolumeCreated(Arc<DeviceObject>),
    VolumeDeleted,
    Mounted(Arc<DeviceObject>),
    Unmounted,
    Transact(Option<TransactReq>),
}

/// The control-code surface: validate the target device, then perform the
/// volume-management operation.
pub fn fsctl_control(
    registry: &DriverRegistry,
    device: &Arc<DeviceObject>,
    request: FsctlRequest<'_>,
) -> Result<FsctlResponse, i32> {
    if device.kind() != DeviceKind::Fsctl || device.is_deleted() {
        return Err(STATUS_INVALID_DEVICE_REQUEST);
    }

    match request {
        FsctlRequest::CreateVolume {
            security_descriptor,
            volume_params,
        } => registry
            .create_volume(security_descriptor, volume_params)
            .map(FsctlResponse::VolumeCreated),
        FsctlRequest::DeleteVolume { name } => registry
            .delete_volume(name)
            .map(|_| FsctlResponse::VolumeDeleted),
        FsctlRequest::MountVolume { name } => {
            registry.mount_volume(name).map(FsctlResponse::Mounted)
        }
        FsctlRequest::UnmountVolume { name } => registry
            .unmount_volume(name)
            .map(|_| FsctlResponse::Unmounted),
        FsctlRequest::Transact {
            name,
            responses,
            millis,
        } => {
            let fsvrt = registry
                .lookup_volume(name)
                .ok_or(STATUS_OBJECT_NAME_NOT_FOUND)?;
            Ok(FsctlResponse::Transact(ioq_transact(
                &fsvrt, responses, millis,
            )))
        }
    }
}
