//! Runtime Library Helpers (RTL)
//!
//! Volume GUID generation: a Lehmer linear congruential generator feeding
//! RFC 4122 version-4 UUIDs, formatted in braced Windows GUID form for
//! device names.

use core::sync::atomic::{AtomicU32, Ordering};

use alloc::format;
use alloc::string::String;

/// Lehmer LCG constants (D.H. Lehmer, 1948)
const MULTIPLIER: u32 = 0x8000_0000 - 19; // 2^31 - 19
const INCREMENT: u32 = 0x8000_0000 - 61; // 2^31 - 61
const MODULUS: u32 = 0x8000_0000 - 1; // 2^31 - 1

/// Global seed for the kernel random source.
static RANDOM_SEED: AtomicU32 = AtomicU32::new(0x6789_ABCD);

/// One Lehmer step on an explicit seed.
#[inline]
pub fn rtl_uniform(seed: &mut u32) -> u32 {
    *seed = ((MULTIPLIER as u64 * *seed as u64 + INCREMENT as u64) % MODULUS as u64) as u32;
    *seed
}

/// Draw from the global random source.
pub fn kernel_random() -> u32 {
    let mut seed = RANDOM_SEED.load(Ordering::Relaxed);
    let value = rtl_uniform(&mut seed);
    RANDOM_SEED.store(seed, Ordering::Relaxed);
    value
}

/// UUID/GUID (128 bits), Windows GUID field layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct Uuid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Uuid {
    /// Generate a version-4 (random) UUID.
    pub fn new_v4() -> Self {
        let mut bytes = [0u8; 16];
        for chunk in bytes.chunks_mut(4) {
            chunk.copy_from_slice(&kernel_random().to_le_bytes()[..chunk.len()]);
        }
        // Version 4, RFC 4122 variant
        bytes[6] = (bytes[6] & 0x0F) | 0x40;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;
        Self {
            data1: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_be_bytes([bytes[4], bytes[5]]),
            data3: u16::from_be_bytes([bytes[6], bytes[7]]),
            data4: [
                bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14],
                bytes[15],
            ],
        }
    }

    /// Braced Windows GUID form, e.g.
    /// `{6F9619FF-8B86-D011-B42D-00C04FC964FF}`.
    pub fn braced(&self) -> String {
        format!(
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}
