//! Whole-frame fingerprint pyramid.
//!
//! Level `n + 1` is derived from level `n` alone: a parent fingerprint is the
//! checksum of its children's fingerprints, and its uniformity flags are the
//! conjunction of the children's flags. Every level stores one entry per luma
//! position, laid out with the frame width as stride; only positions where the
//! block fits inside the frame are meaningful.

use tracing::{debug, trace};

use crate::crc::{Fingerprint, FingerprintHasher};
use crate::error::try_alloc;
use crate::plane::Frame;
use crate::sampler::CellSampler;
use crate::size_class::SizeClass;
use crate::FrameHashError;

/// Fingerprint and uniformity of the block anchored at one position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelEntry {
    pub fingerprint: Fingerprint,
    /// Every row of the block holds a single value.
    pub row_uniform: bool,
    /// Every column of the block holds a single value.
    pub col_uniform: bool,
    /// The position may be inserted into the duplicate index.
    pub eligible: bool,
}

/// One block size worth of fingerprints over the whole frame.
#[derive(Debug, Clone)]
pub struct HashLevel {
    block_width: usize,
    block_height: usize,
    frame_width: usize,
    frame_height: usize,
    entries: Vec<LevelEntry>,
}

impl HashLevel {
    fn alloc(
        block_width: usize,
        block_height: usize,
        frame_width: usize,
        frame_height: usize,
    ) -> Result<Self, FrameHashError> {
        let fits = block_width <= frame_width && block_height <= frame_height;
        let len = if fits { frame_width * frame_height } else { 0 };
        Ok(Self {
            block_width,
            block_height,
            frame_width,
            frame_height,
            entries: try_alloc("pyramid level", len)?,
        })
    }

    pub fn block_dims(&self) -> (usize, usize) {
        (self.block_width, self.block_height)
    }

    /// Number of valid anchor columns and rows.
    pub fn span(&self) -> (usize, usize) {
        if self.entries.is_empty() {
            return (0, 0);
        }
        (
            self.frame_width + 1 - self.block_width,
            self.frame_height + 1 - self.block_height,
        )
    }

    /// Entry of the block anchored at `(x, y)`, `None` when it would leave the frame.
    pub fn get(&self, x: usize, y: usize) -> Option<&LevelEntry> {
        let (xs, ys) = self.span();
        if x >= xs || y >= ys {
            return None;
        }
        self.entries.get(y * self.frame_width + x)
    }

    /// Valid anchors in raster order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &LevelEntry)> + '_ {
        let (xs, ys) = self.span();
        (0..ys).flat_map(move |y| {
            (0..xs).map(move |x| (x, y, &self.entries[y * self.frame_width + x]))
        })
    }

    /// 2x2 cell level sampled directly from the frame.
    pub fn base(
        frame: &Frame<'_>,
        sampler: &CellSampler,
        hasher: &FingerprintHasher,
    ) -> Result<Self, FrameHashError> {
        let mut level = Self::alloc(2, 2, frame.width(), frame.height())?;
        let (xs, ys) = level.span();
        fill_rows(&mut level.entries, frame.width(), ys, |y, row| {
            for (x, slot) in row.iter_mut().take(xs).enumerate() {
                let (fingerprint, cell) = sampler.hash_cell(hasher, frame, x, y)?;
                *slot = LevelEntry {
                    fingerprint,
                    row_uniform: cell.row_uniform(),
                    col_uniform: cell.col_uniform(),
                    eligible: false,
                };
            }
            Ok(())
        })?;
        trace!(positions = xs * ys, "sampled base level");
        Ok(level)
    }

    /// Derive the next coarser level.
    pub fn derive(&self, doubling: Doubling, hasher: &FingerprintHasher) -> Result<Self, FrameHashError> {
        let layout = Layout::new(doubling, self.block_width, self.block_height);
        let mut level = Self::alloc(layout.width, layout.height, self.frame_width, self.frame_height)?;
        let (xs, ys) = level.span();
        let stride = self.frame_width;
        let src = &self.entries;
        fill_rows(&mut level.entries, stride, ys, |y, row| {
            let mut children = [Fingerprint::default(); 4];
            for (x, slot) in row.iter_mut().take(xs).enumerate() {
                let at = |(dx, dy): (usize, usize)| &src[(y + dy) * stride + x + dx];
                for (child, &offset) in children.iter_mut().zip(&layout.children) {
                    *child = at(offset).fingerprint;
                }
                let row_uniform = layout.row_probes.iter().all(|&o| at(o).row_uniform);
                let col_uniform = layout.col_probes.iter().all(|&o| at(o).col_uniform);
                let aligned = x % layout.width == 0 && y % layout.height == 0;
                *slot = LevelEntry {
                    fingerprint: hasher.combine(&children[..layout.children.len()]),
                    row_uniform,
                    col_uniform,
                    eligible: !(row_uniform && col_uniform) || aligned,
                };
            }
            Ok(())
        })?;
        trace!(
            width = layout.width,
            height = layout.height,
            positions = xs * ys,
            "derived level"
        );
        Ok(level)
    }
}

/// How a parent block is assembled from children of the previous level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Doubling {
    /// Both dimensions double: four quadrant children.
    Quad,
    /// Width doubles: left and right children.
    Horizontal,
    /// Height doubles: top and bottom children.
    Vertical,
}

/// Child offsets for one doubling. The probe lists add the child straddling
/// the seam so a constant row (column) must stay constant across it.
struct Layout {
    width: usize,
    height: usize,
    children: Vec<(usize, usize)>,
    row_probes: Vec<(usize, usize)>,
    col_probes: Vec<(usize, usize)>,
}

impl Layout {
    fn new(doubling: Doubling, child_width: usize, child_height: usize) -> Self {
        let (hw, hh) = (child_width, child_height);
        let (qw, qh) = (hw / 2, hh / 2);
        match doubling {
            Doubling::Quad => Self {
                width: hw * 2,
                height: hh * 2,
                children: vec![(0, 0), (hw, 0), (0, hh), (hw, hh)],
                row_probes: vec![(0, 0), (qw, 0), (hw, 0), (0, hh), (qw, hh), (hw, hh)],
                col_probes: vec![(0, 0), (hw, 0), (0, qh), (hw, qh), (0, hh), (hw, hh)],
            },
            Doubling::Horizontal => Self {
                width: hw * 2,
                height: hh,
                children: vec![(0, 0), (hw, 0)],
                row_probes: vec![(0, 0), (qw, 0), (hw, 0)],
                col_probes: vec![(0, 0), (hw, 0)],
            },
            Doubling::Vertical => Self {
                width: hw,
                height: hh * 2,
                children: vec![(0, 0), (0, hh)],
                row_probes: vec![(0, 0), (0, hh)],
                col_probes: vec![(0, 0), (0, qh), (0, hh)],
            },
        }
    }
}

/// Run `fill` over the first `rows` rows of a level, row-parallel when the
/// `parallel` feature is enabled. Each row only reads the previous level.
fn fill_rows<F>(
    entries: &mut [LevelEntry],
    stride: usize,
    rows: usize,
    fill: F,
) -> Result<(), FrameHashError>
where
    F: Fn(usize, &mut [LevelEntry]) -> Result<(), FrameHashError> + Sync + Send,
{
    if rows == 0 || stride == 0 {
        return Ok(());
    }
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        entries
            .par_chunks_mut(stride)
            .take(rows)
            .enumerate()
            .try_for_each(|(y, row)| fill(y, row))
    }
    #[cfg(not(feature = "parallel"))]
    {
        entries
            .chunks_mut(stride)
            .take(rows)
            .enumerate()
            .try_for_each(|(y, row)| fill(y, row))
    }
}

/// Build the levels needed for `wanted` and hand each wanted one to `visit`,
/// finest first. Intermediate levels are dropped as soon as their children
/// have been derived.
pub fn walk_levels<F>(
    frame: &Frame<'_>,
    sampler: &CellSampler,
    hasher: &FingerprintHasher,
    wanted: &[SizeClass],
    mut visit: F,
) -> Result<(), FrameHashError>
where
    F: FnMut(SizeClass, &HashLevel) -> Result<(), FrameHashError>,
{
    let needed = |class: SizeClass| {
        wanted.iter().any(|&w| {
            let mut cur = Some(w);
            while let Some(c) = cur {
                if c == class {
                    return true;
                }
                cur = c.parent_source();
            }
            false
        })
    };
    if !SizeClass::ALL.iter().any(|&c| needed(c)) {
        return Ok(());
    }
    debug!(
        width = frame.width(),
        height = frame.height(),
        chroma = sampler.includes_chroma(),
        "building fingerprint pyramid"
    );

    let base = HashLevel::base(frame, sampler, hasher)?;
    let mut current = base.derive(Doubling::Quad, hasher)?;
    drop(base);
    let mut class = SizeClass::B4x4;
    loop {
        if wanted.contains(&class) {
            visit(class, &current)?;
        }
        if class == SizeClass::B4x4 {
            for (rect, doubling) in [
                (SizeClass::B8x4, Doubling::Horizontal),
                (SizeClass::B4x8, Doubling::Vertical),
            ] {
                if wanted.contains(&rect) {
                    let level = current.derive(doubling, hasher)?;
                    visit(rect, &level)?;
                }
            }
        }
        let next = match class {
            SizeClass::B4x4 => SizeClass::B8x8,
            SizeClass::B8x8 => SizeClass::B16x16,
            SizeClass::B16x16 => SizeClass::B32x32,
            SizeClass::B32x32 => SizeClass::B64x64,
            _ => break,
        };
        if !needed(next) {
            break;
        }
        current = current.derive(Doubling::Quad, hasher)?;
        class = next;
    }
    Ok(())
}

/// All requested levels of one frame, kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct HashPyramid {
    levels: Vec<(SizeClass, HashLevel)>,
}

impl HashPyramid {
    pub fn build(
        frame: &Frame<'_>,
        sampler: &CellSampler,
        hasher: &FingerprintHasher,
        wanted: &[SizeClass],
    ) -> Result<Self, FrameHashError> {
        let mut levels = Vec::new();
        walk_levels(frame, sampler, hasher, wanted, |class, level| {
            levels.push((class, level.clone()));
            Ok(())
        })?;
        Ok(Self { levels })
    }

    pub fn level(&self, class: SizeClass) -> Option<&HashLevel> {
        self.levels
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, level)| level)
    }

    pub fn get(&self, class: SizeClass, x: usize, y: usize) -> Option<&LevelEntry> {
        self.level(class)?.get(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::CrcParams;
    use crate::plane::{BitDepths, ChromaFormat, FrameBuffer};

    fn hasher() -> FingerprintHasher {
        FingerprintHasher::new(CrcParams::PRIMARY, CrcParams::SECONDARY).unwrap()
    }

    fn pyramid(buf: &FrameBuffer, wanted: &[SizeClass]) -> HashPyramid {
        let frame = buf.view().unwrap();
        let sampler = CellSampler::for_frame(&frame);
        HashPyramid::build(&frame, &sampler, &hasher(), wanted).unwrap()
    }

    #[test]
    fn four_by_four_combines_quadrant_cells() {
        let mut buf = FrameBuffer::filled(4, 4, ChromaFormat::Cf400, BitDepths::EIGHT, 0);
        for y in 0..4 {
            for x in 0..4 {
                buf.set(0, x, y, (y * 4 + x) as u16);
            }
        }
        let frame = buf.view().unwrap();
        let sampler = CellSampler::for_frame(&frame);
        let h = hasher();
        let base = HashLevel::base(&frame, &sampler, &h).unwrap();
        let cells: Vec<Fingerprint> = [(0, 0), (2, 0), (0, 2), (2, 2)]
            .iter()
            .map(|&(x, y)| base.get(x, y).unwrap().fingerprint)
            .collect();
        let level = base.derive(Doubling::Quad, &h).unwrap();
        assert_eq!(level.span(), (1, 1));
        assert_eq!(level.get(0, 0).unwrap().fingerprint, h.combine(&cells));
        assert!(level.get(1, 0).is_none());
    }

    #[test]
    fn uniform_flags_follow_content() {
        // Horizontal stripes: every row constant, columns vary.
        let mut buf = FrameBuffer::filled(8, 8, ChromaFormat::Cf400, BitDepths::EIGHT, 0);
        for y in 0..8 {
            for x in 0..8 {
                buf.set(0, x, y, y as u16);
            }
        }
        let p = pyramid(&buf, &[SizeClass::B4x4, SizeClass::B8x8]);
        let e = p.get(SizeClass::B4x4, 1, 1).unwrap();
        assert!(e.row_uniform);
        assert!(!e.col_uniform);
        assert!(e.eligible);
        let e = p.get(SizeClass::B8x8, 0, 0).unwrap();
        assert!(e.row_uniform && !e.col_uniform);
    }

    #[test]
    fn seam_breaks_row_uniformity() {
        // Left half 1, right half 2: each 2x2 quadrant cell of the 4x4 block
        // at (0, 0) is row-uniform, the block is not.
        let mut buf = FrameBuffer::filled(4, 4, ChromaFormat::Cf400, BitDepths::EIGHT, 1);
        for y in 0..4 {
            buf.set(0, 2, y, 2);
            buf.set(0, 3, y, 2);
        }
        let p = pyramid(&buf, &[SizeClass::B4x4]);
        let e = p.get(SizeClass::B4x4, 0, 0).unwrap();
        assert!(!e.row_uniform);
        assert!(e.col_uniform);
        assert!(e.eligible);
    }

    #[test]
    fn constant_blocks_only_eligible_on_grid() {
        let buf = FrameBuffer::filled(16, 16, ChromaFormat::Cf400, BitDepths::EIGHT, 7);
        let p = pyramid(&buf, &[SizeClass::B8x4]);
        let level = p.level(SizeClass::B8x4).unwrap();
        assert_eq!(level.span(), (9, 13));
        let eligible: Vec<(usize, usize)> = level
            .iter()
            .filter(|(_, _, e)| e.eligible)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(
            eligible,
            vec![(0, 0), (8, 0), (0, 4), (8, 4), (0, 8), (8, 8), (0, 12), (8, 12)]
        );
    }

    #[test]
    fn small_frames_yield_empty_levels() {
        let buf = FrameBuffer::filled(6, 6, ChromaFormat::Cf400, BitDepths::EIGHT, 0);
        let p = pyramid(&buf, &SizeClass::ALL);
        assert_eq!(p.level(SizeClass::B4x4).unwrap().span(), (3, 3));
        assert_eq!(p.level(SizeClass::B8x8).unwrap().span(), (0, 0));
        assert_eq!(p.level(SizeClass::B64x64).unwrap().iter().count(), 0);
    }

    #[test]
    fn walk_skips_unneeded_levels() {
        let buf = FrameBuffer::filled(16, 16, ChromaFormat::Cf400, BitDepths::EIGHT, 0);
        let p = pyramid(&buf, &[SizeClass::B16x16]);
        assert!(p.level(SizeClass::B16x16).is_some());
        assert!(p.level(SizeClass::B8x8).is_none());
        assert!(p.level(SizeClass::B4x8).is_none());
        assert!(pyramid(&buf, &[]).level(SizeClass::B4x4).is_none());
    }
}
