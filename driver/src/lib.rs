//! User-Mode File System Bridge
//!
//! Kernel-resident plumbing that lets a user-mode process implement a file
//! system: file I/O arriving at a mounted volume is packaged as a request,
//! parked in a per-volume queue, checked out by the user-mode file system
//! over a transact exchange, and completed by its response. Cancellation,
//! volume teardown, and driver unload all resolve races against that
//! hand-off so every request completes exactly once.
//!
//! The crate is freestanding (`no_std` + `alloc`); tests run hosted.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod io;
pub mod ke;
pub mod ntstatus;
pub mod rtl;
