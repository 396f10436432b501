use crate::config::HashConfig;
use crate::crc::{Fingerprint, FingerprintHasher};
use crate::plane::Frame;
use crate::sampler::CellSampler;
use crate::size_class::{SizeClass, SizeTable};
use crate::FrameHashError;

/// Fingerprints single blocks without building the whole-frame pyramid.
///
/// The combination order is the same as [`crate::pyramid`], so a block hashed
/// here is bit-identical to the bulk value at the same position.
#[derive(Clone)]
pub struct BlockHasher {
    hasher: FingerprintHasher,
    sizes: SizeTable,
}

impl BlockHasher {
    pub fn new(config: &HashConfig) -> Result<Self, FrameHashError> {
        config.validate()?;
        Ok(Self {
            hasher: config.hasher()?,
            sizes: SizeTable::standard(),
        })
    }

    pub(crate) fn from_parts(hasher: FingerprintHasher, sizes: SizeTable) -> Self {
        Self { hasher, sizes }
    }

    /// Fingerprint of a `width`x`height` block, rejecting unsupported shapes.
    pub fn hash_dims(
        &self,
        frame: &Frame<'_>,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<Fingerprint, FrameHashError> {
        let class = self.sizes.resolve(width, height)?;
        self.hash(frame, x, y, class)
    }

    /// Fingerprint of the `class` block whose top-left luma sample is `(x, y)`.
    pub fn hash(
        &self,
        frame: &Frame<'_>,
        x: usize,
        y: usize,
        class: SizeClass,
    ) -> Result<Fingerprint, FrameHashError> {
        let (width, height) = class.dims();
        if x + width > frame.width() || y + height > frame.height() {
            return Err(FrameHashError::OutOfBounds {
                x: x + width - 1,
                y: y + height - 1,
                width: frame.width(),
                height: frame.height(),
            });
        }
        let sampler = CellSampler::for_frame(frame);

        let (mut cols, mut rows) = (width / 2, height / 2);
        let mut grid = Vec::with_capacity(cols * rows);
        for cy in 0..rows {
            for cx in 0..cols {
                let (fingerprint, _) = sampler.hash_cell(&self.hasher, frame, x + 2 * cx, y + 2 * cy)?;
                grid.push(fingerprint);
            }
        }

        while cols >= 2 && rows >= 2 {
            let mut next = Vec::with_capacity(cols * rows / 4);
            for ny in 0..rows / 2 {
                for nx in 0..cols / 2 {
                    let top = 2 * ny * cols + 2 * nx;
                    let bottom = top + cols;
                    next.push(self.hasher.combine(&[
                        grid[top],
                        grid[top + 1],
                        grid[bottom],
                        grid[bottom + 1],
                    ]));
                }
            }
            grid = next;
            cols /= 2;
            rows /= 2;
        }

        match (cols, rows) {
            (1, 1) => Ok(grid[0]),
            // left/right or top/bottom: both are stored in order
            (2, 1) | (1, 2) => Ok(self.hasher.combine(&grid[..2])),
            _ => Err(FrameHashError::UnsupportedBlockSize { width, height }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane::{BitDepths, ChromaFormat, FrameBuffer};

    fn ramp(width: usize, height: usize) -> FrameBuffer {
        let mut buf = FrameBuffer::filled(width, height, ChromaFormat::Cf400, BitDepths::EIGHT, 0);
        for y in 0..height {
            for x in 0..width {
                buf.set(0, x, y, ((x * 7 + y * 13) % 251) as u16);
            }
        }
        buf
    }

    #[test]
    fn rejects_unsupported_dims() {
        let buf = ramp(16, 16);
        let frame = buf.view().unwrap();
        let hasher = BlockHasher::new(&HashConfig::default()).unwrap();
        assert!(matches!(
            hasher.hash_dims(&frame, 0, 0, 16, 8),
            Err(FrameHashError::UnsupportedBlockSize { width: 16, height: 8 })
        ));
        assert!(hasher.hash_dims(&frame, 0, 0, 8, 4).is_ok());
    }

    #[test]
    fn rejects_blocks_leaving_frame() {
        let buf = ramp(16, 16);
        let frame = buf.view().unwrap();
        let hasher = BlockHasher::new(&HashConfig::default()).unwrap();
        assert!(hasher.hash(&frame, 8, 8, SizeClass::B8x8).is_ok());
        assert!(matches!(
            hasher.hash(&frame, 9, 8, SizeClass::B8x8),
            Err(FrameHashError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn rectangles_differ_from_their_halves() {
        let buf = ramp(16, 16);
        let frame = buf.view().unwrap();
        let hasher = BlockHasher::new(&HashConfig::default()).unwrap();
        let wide = hasher.hash(&frame, 0, 0, SizeClass::B8x4).unwrap();
        let left = hasher.hash(&frame, 0, 0, SizeClass::B4x4).unwrap();
        let right = hasher.hash(&frame, 4, 0, SizeClass::B4x4).unwrap();
        let combiner = HashConfig::default().hasher().unwrap();
        assert_eq!(wide, combiner.combine(&[left, right]));
        let tall = hasher.hash(&frame, 0, 0, SizeClass::B4x8).unwrap();
        let bottom = hasher.hash(&frame, 0, 4, SizeClass::B4x4).unwrap();
        assert_eq!(tall, combiner.combine(&[left, bottom]));
    }
}
