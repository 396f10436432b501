//! Table-driven cyclic checksums used to fingerprint pixel content.
//!
//! Two independently parameterised engines are combined in
//! [`FingerprintHasher`] so every byte sequence maps to a
//! `(primary, secondary)` pair. A false match requires both checksums to
//! collide at once.

use serde::{Deserialize, Serialize};

use crate::FrameHashError;

/// Width and truncated generator polynomial of one checksum engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrcParams {
    /// Remainder width in bits, `8..=32`.
    pub bits: u32,
    /// Generator polynomial without its implicit top bit.
    pub poly: u32,
}

impl CrcParams {
    pub const PRIMARY: CrcParams = CrcParams { bits: 24, poly: 0x5D_6DCB };
    pub const SECONDARY: CrcParams = CrcParams { bits: 24, poly: 0x86_4CFB };

    pub fn validate(&self) -> Result<(), FrameHashError> {
        if !(8..=32).contains(&self.bits) {
            return Err(FrameHashError::Config(format!(
                "checksum width {} outside 8..=32",
                self.bits
            )));
        }
        if self.poly & !mask(self.bits) != 0 {
            return Err(FrameHashError::Config(format!(
                "polynomial {:#x} wider than {} bits",
                self.poly, self.bits
            )));
        }
        Ok(())
    }
}

fn mask(bits: u32) -> u32 {
    u32::MAX >> (32 - bits)
}

/// MSB-first CRC with a precomputed 256-entry table.
#[derive(Clone)]
pub struct CrcCalculator {
    params: CrcParams,
    mask: u32,
    table: [u32; 256],
    remainder: u32,
}

impl CrcCalculator {
    pub fn new(params: CrcParams) -> Result<Self, FrameHashError> {
        params.validate()?;
        let mask = mask(params.bits);
        let high_bit = 1u32 << (params.bits - 1);
        let mut table = [0u32; 256];
        for (value, slot) in table.iter_mut().enumerate() {
            let mut remainder = 0u32;
            for bit in (0..8).rev() {
                if (value >> bit) & 1 != 0 {
                    remainder ^= high_bit;
                }
                remainder = if remainder & high_bit != 0 {
                    (remainder << 1) ^ params.poly
                } else {
                    remainder << 1
                };
            }
            *slot = remainder & mask;
        }
        Ok(Self {
            params,
            mask,
            table,
            remainder: 0,
        })
    }

    pub fn params(&self) -> CrcParams {
        self.params
    }

    /// Clear the running remainder.
    pub fn reset(&mut self) {
        self.remainder = 0;
    }

    /// Fold `data` into the running remainder.
    pub fn absorb(&mut self, data: &[u8]) {
        self.remainder = self.fold(self.remainder, data);
    }

    /// Current remainder masked to the configured width.
    pub fn extract(&self) -> u32 {
        self.remainder & self.mask
    }

    /// Checksum of `data` from a zero remainder without touching the
    /// running state, so a shared engine can be used from many threads.
    pub fn checksum(&self, data: &[u8]) -> u32 {
        self.fold(0, data) & self.mask
    }

    fn fold(&self, mut remainder: u32, data: &[u8]) -> u32 {
        let shift = self.params.bits - 8;
        for &byte in data {
            let index = ((remainder >> shift) as u8) ^ byte;
            remainder = ((remainder << 8) ^ self.table[index as usize]) & self.mask;
        }
        remainder
    }
}

/// Content fingerprint: two independent checksums of the same bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub primary: u32,
    pub secondary: u32,
}

/// Pair of checksum engines producing [`Fingerprint`]s.
#[derive(Clone)]
pub struct FingerprintHasher {
    primary: CrcCalculator,
    secondary: CrcCalculator,
}

impl FingerprintHasher {
    pub fn new(primary: CrcParams, secondary: CrcParams) -> Result<Self, FrameHashError> {
        Ok(Self {
            primary: CrcCalculator::new(primary)?,
            secondary: CrcCalculator::new(secondary)?,
        })
    }

    pub fn primary_params(&self) -> CrcParams {
        self.primary.params()
    }

    /// Fingerprint raw sample bytes (the base level).
    pub fn hash_bytes(&self, data: &[u8]) -> Fingerprint {
        Fingerprint {
            primary: self.primary.checksum(data),
            secondary: self.secondary.checksum(data),
        }
    }

    /// Fingerprint of a parent block from its children, in raster order.
    ///
    /// Primaries feed the primary engine and secondaries the secondary one;
    /// each child value is serialised as four little-endian bytes.
    pub fn combine(&self, children: &[Fingerprint]) -> Fingerprint {
        debug_assert!(children.len() == 2 || children.len() == 4);
        let mut primary = [0u8; 16];
        let mut secondary = [0u8; 16];
        for (i, child) in children.iter().enumerate() {
            primary[i * 4..i * 4 + 4].copy_from_slice(&child.primary.to_le_bytes());
            secondary[i * 4..i * 4 + 4].copy_from_slice(&child.secondary.to_le_bytes());
        }
        let len = children.len() * 4;
        Fingerprint {
            primary: self.primary.checksum(&primary[..len]),
            secondary: self.secondary.checksum(&secondary[..len]),
        }
    }
}
