//! zstd compression with a normalized effort level.

use crate::error::{Result, SingularityError};

/// Lowest zstd level the normalized scale maps onto.
pub const MIN_ZSTD_LEVEL: i32 = 1;
/// Highest zstd level the normalized scale maps onto.
pub const MAX_ZSTD_LEVEL: i32 = 19;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Codec {
    level: f64,
    zstd_level: i32,
}

impl Codec {
    /// Build a codec from a level in `[0.0, 1.0]`.
    pub fn new(level: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&level) {
            return Err(SingularityError::Config(format!(
                "compression level must be within [0.0, 1.0], got {}",
                level
            )));
        }

        let span = (MAX_ZSTD_LEVEL - MIN_ZSTD_LEVEL) as f64;
        let zstd_level = MIN_ZSTD_LEVEL + (level * span).round() as i32;

        Ok(Self { level, zstd_level })
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn zstd_level(&self) -> i32 {
        self.zstd_level
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.zstd_level)
            .map_err(|e| SingularityError::Codec(format!("compression failed: {}", e)))
    }

    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data)
            .map_err(|e| SingularityError::Codec(format!("decompression failed: {}", e)))
    }
}
