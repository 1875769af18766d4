//! I/O Subsystem
//!
//! The driver proper: request packets, the request queue that hands them
//! to user mode, cancellation-safe queue views, device roles, the dispatch
//! harness, completion, the transact surface, fast-path accelerators, and
//! the process-wide driver registry.

pub mod complete;
pub mod csq;
pub mod device;
pub mod dispatch;
pub mod driver;
pub mod fastio;
pub mod ioq;
pub mod irp;
pub mod transact;

pub use csq::{io_csq_cancel_irp, IoqCsq, IoqList};
pub use device::{
    io_create_control_device, io_create_fsvol_device, io_create_fsvrt_device, io_delete_device,
    ControlFlavor, DeviceExtension, DeviceKind, DeviceObject, VolumeFlags, VolumeParams,
};
pub use dispatch::{dispatch_irp, fsp_dispatch, IoRequestResult};
pub use driver::{driver_entry, driver_registry, DriverRegistry, FsctlRequest, FsctlResponse};
pub use ioq::{Ioq, IoqStatsSnapshot};
pub use irp::{Irp, IrpHint, IrpMajorFunction, IrpParameters};
pub use transact::{ioq_transact, TransactReq, TransactRsp};
