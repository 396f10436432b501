use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crc::{CrcParams, FingerprintHasher};
use crate::size_class::SizeTable;
use crate::FrameHashError;

/// Runtime configuration for fingerprinting and the duplicate index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    /// Low bits of the primary fingerprint that select a bucket. Larger
    /// values mean more, smaller buckets.
    pub index_bits: u32,
    /// Engine producing the primary fingerprint.
    pub primary: CrcParams,
    /// Engine producing the secondary fingerprint.
    pub secondary: CrcParams,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            index_bits: 16,
            primary: CrcParams::PRIMARY,
            secondary: CrcParams::SECONDARY,
        }
    }
}

impl HashConfig {
    /// Read a JSON configuration; missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FrameHashError> {
        let data = std::fs::read(path)?;
        let config: HashConfig = serde_json::from_slice(&data)
            .map_err(|e| FrameHashError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FrameHashError> {
        self.primary.validate()?;
        self.secondary.validate()?;
        if self.primary == self.secondary {
            return Err(FrameHashError::Config(
                "primary and secondary checksums must differ".into(),
            ));
        }
        // Packed bucket addresses put the size index above the hash bits.
        let max_bits = self.primary.bits.min(32 - SizeTable::standard().index_bits());
        if self.index_bits == 0 || self.index_bits > max_bits {
            return Err(FrameHashError::Config(format!(
                "index_bits {} outside 1..={}",
                self.index_bits, max_bits
            )));
        }
        Ok(())
    }

    pub fn hasher(&self) -> Result<FingerprintHasher, FrameHashError> {
        FingerprintHasher::new(self.primary, self.secondary)
    }
}
