//! Base level sampling: the 2x2 pixel cell every larger fingerprint is
//! derived from.

use crate::crc::{Fingerprint, FingerprintHasher};
use crate::plane::{ChromaFormat, Frame, PlaneView};
use crate::FrameHashError;

/// Largest cell: 2x2 samples of three components.
pub const MAX_CELL_BYTES: usize = 12;

/// Normalised bytes of one 2x2 cell in raster order, components interleaved
/// per sample (luma, then the two chroma planes when included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBytes {
    bytes: [u8; MAX_CELL_BYTES],
    components: usize,
}

impl CellBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..4 * self.components]
    }

    fn at(&self, row: usize, col: usize, component: usize) -> u8 {
        self.bytes[(row * 2 + col) * self.components + component]
    }

    /// Both samples of each row are equal, for every included component.
    pub fn row_uniform(&self) -> bool {
        (0..self.components)
            .all(|c| (0..2).all(|row| self.at(row, 0, c) == self.at(row, 1, c)))
    }

    /// Both samples of each column are equal, for every included component.
    pub fn col_uniform(&self) -> bool {
        (0..self.components)
            .all(|c| (0..2).all(|col| self.at(0, col, c) == self.at(1, col, c)))
    }
}

/// Extracts 8-bit normalised 2x2 cells from a frame.
#[derive(Debug, Clone, Copy)]
pub struct CellSampler {
    include_chroma: bool,
    luma_shift: u32,
    chroma_shift: u32,
}

impl CellSampler {
    /// Sampler that includes chroma exactly when the layout is 4:4:4.
    pub fn for_frame(frame: &Frame<'_>) -> Self {
        let depths = frame.bit_depths();
        Self {
            include_chroma: frame.format() == ChromaFormat::Cf444,
            luma_shift: depths.luma - 8,
            chroma_shift: depths.chroma - 8,
        }
    }

    /// Sampler with explicit chroma inclusion; only 4:4:4 frames may include it.
    pub fn new(frame: &Frame<'_>, include_chroma: bool) -> Result<Self, FrameHashError> {
        if include_chroma && frame.format() != ChromaFormat::Cf444 {
            return Err(FrameHashError::InvalidChromaInclusion(frame.format()));
        }
        let mut sampler = Self::for_frame(frame);
        sampler.include_chroma = include_chroma;
        Ok(sampler)
    }

    pub fn includes_chroma(&self) -> bool {
        self.include_chroma
    }

    /// Bytes of the cell whose top-left luma sample is `(x, y)`.
    pub fn sample(&self, frame: &Frame<'_>, x: usize, y: usize) -> Result<CellBytes, FrameHashError> {
        let components = if self.include_chroma { 3 } else { 1 };
        let chroma = match (self.include_chroma, frame.chroma()) {
            (false, _) => None,
            (true, Some(planes)) => Some(planes),
            (true, None) => return Err(FrameHashError::InvalidChromaInclusion(frame.format())),
        };
        let mut bytes = [0u8; MAX_CELL_BYTES];
        let mut i = 0;
        for dy in 0..2 {
            for dx in 0..2 {
                bytes[i] = (frame.luma().get(x + dx, y + dy)? >> self.luma_shift) as u8;
                i += 1;
                if let Some(planes) = chroma {
                    for plane in planes {
                        bytes[i] = (plane.get(x + dx, y + dy)? >> self.chroma_shift) as u8;
                        i += 1;
                    }
                }
            }
        }
        Ok(CellBytes { bytes, components })
    }

    /// Base fingerprint and uniformity of the cell at `(x, y)`.
    pub fn hash_cell(
        &self,
        hasher: &FingerprintHasher,
        frame: &Frame<'_>,
        x: usize,
        y: usize,
    ) -> Result<(Fingerprint, CellBytes), FrameHashError> {
        let cell = self.sample(frame, x, y)?;
        Ok((hasher.hash_bytes(cell.as_slice()), cell))
    }
}

/// Every row of the `width`x`height` block at `(x, y)` holds a single value.
pub fn is_horizontal_perfect(
    plane: &PlaneView<'_>,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> Result<bool, FrameHashError> {
    for row in y..y + height {
        let samples = plane.row(x, row, width)?;
        if samples.iter().any(|&s| s != samples[0]) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Every column of the `width`x`height` block at `(x, y)` holds a single value.
pub fn is_vertical_perfect(
    plane: &PlaneView<'_>,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> Result<bool, FrameHashError> {
    let first = plane.row(x, y, width)?;
    for row in y + 1..y + height {
        if plane.row(x, row, width)? != first {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane::{BitDepths, FrameBuffer};

    #[test]
    fn luma_cell_layout_and_flags() {
        let mut buf = FrameBuffer::filled(4, 4, ChromaFormat::Cf400, BitDepths::EIGHT, 0);
        buf.set(0, 1, 1, 10);
        buf.set(0, 2, 1, 10);
        buf.set(0, 1, 2, 20);
        buf.set(0, 2, 2, 20);
        let frame = buf.view().unwrap();
        let sampler = CellSampler::for_frame(&frame);
        let cell = sampler.sample(&frame, 1, 1).unwrap();
        assert_eq!(cell.as_slice(), &[10, 10, 20, 20]);
        assert!(cell.row_uniform());
        assert!(!cell.col_uniform());
    }

    #[test]
    fn high_bit_depth_truncates() {
        let mut buf = FrameBuffer::filled(2, 2, ChromaFormat::Cf400, BitDepths::uniform(10), 0);
        buf.set(0, 0, 0, 0x3FF);
        buf.set(0, 1, 0, 0x3FC);
        buf.set(0, 0, 1, 0x003);
        let frame = buf.view().unwrap();
        let cell = CellSampler::for_frame(&frame).sample(&frame, 0, 0).unwrap();
        assert_eq!(cell.as_slice(), &[0xFF, 0xFF, 0x00, 0x00]);
        assert!(cell.row_uniform());
        assert!(!cell.col_uniform());
    }

    #[test]
    fn full_chroma_is_interleaved() {
        let mut buf = FrameBuffer::filled(2, 2, ChromaFormat::Cf444, BitDepths::EIGHT, 0);
        for (i, (x, y)) in [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
            buf.set(0, x, y, i as u16);
            buf.set(1, x, y, 10 + i as u16);
            buf.set(2, x, y, 20 + i as u16);
        }
        let frame = buf.view().unwrap();
        let sampler = CellSampler::for_frame(&frame);
        assert!(sampler.includes_chroma());
        let cell = sampler.sample(&frame, 0, 0).unwrap();
        assert_eq!(cell.as_slice(), &[0, 10, 20, 1, 11, 21, 2, 12, 22, 3, 13, 23]);
    }

    #[test]
    fn chroma_difference_breaks_uniformity() {
        let mut buf = FrameBuffer::filled(2, 2, ChromaFormat::Cf444, BitDepths::EIGHT, 5);
        buf.set(2, 1, 0, 6);
        let frame = buf.view().unwrap();
        let cell = CellSampler::for_frame(&frame).sample(&frame, 0, 0).unwrap();
        assert!(!cell.row_uniform());
        assert!(!cell.col_uniform());
        let luma_only = CellSampler::new(&frame, false).unwrap().sample(&frame, 0, 0).unwrap();
        assert!(luma_only.row_uniform() && luma_only.col_uniform());
    }

    #[test]
    fn subsampled_chroma_is_excluded() {
        let buf = FrameBuffer::filled(4, 4, ChromaFormat::Cf420, BitDepths::EIGHT, 1);
        let frame = buf.view().unwrap();
        assert!(!CellSampler::for_frame(&frame).includes_chroma());
        assert!(matches!(
            CellSampler::new(&frame, true),
            Err(FrameHashError::InvalidChromaInclusion(ChromaFormat::Cf420))
        ));
    }

    #[test]
    fn cell_past_edge_is_rejected() {
        let buf = FrameBuffer::filled(4, 4, ChromaFormat::Cf400, BitDepths::EIGHT, 1);
        let frame = buf.view().unwrap();
        let sampler = CellSampler::for_frame(&frame);
        assert!(sampler.sample(&frame, 2, 2).is_ok());
        assert!(matches!(
            sampler.sample(&frame, 3, 0),
            Err(FrameHashError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn perfect_luma_checks() {
        let mut buf = FrameBuffer::filled(4, 4, ChromaFormat::Cf400, BitDepths::EIGHT, 0);
        for x in 0..4 {
            buf.set(0, x, 1, 3);
        }
        let frame = buf.view().unwrap();
        assert!(is_horizontal_perfect(frame.luma(), 0, 0, 4, 4).unwrap());
        assert!(!is_vertical_perfect(frame.luma(), 0, 0, 4, 4).unwrap());
        assert!(is_vertical_perfect(frame.luma(), 0, 2, 4, 2).unwrap());
        assert!(is_horizontal_perfect(frame.luma(), 1, 1, 4, 1).is_err());
    }
}
