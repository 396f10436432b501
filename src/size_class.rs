use crate::FrameHashError;

/// Block shapes that carry fingerprints in the duplicate index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SizeClass {
    B4x4,
    B8x4,
    B4x8,
    B8x8,
    B16x16,
    B32x32,
    B64x64,
}

impl SizeClass {
    /// Every size class, finest first, in the order the pyramid derives them.
    pub const ALL: [SizeClass; 7] = [
        SizeClass::B4x4,
        SizeClass::B8x4,
        SizeClass::B4x8,
        SizeClass::B8x8,
        SizeClass::B16x16,
        SizeClass::B32x32,
        SizeClass::B64x64,
    ];

    pub fn width(self) -> usize {
        self.dims().0
    }

    pub fn height(self) -> usize {
        self.dims().1
    }

    /// `(width, height)` in luma samples.
    pub fn dims(self) -> (usize, usize) {
        match self {
            SizeClass::B4x4 => (4, 4),
            SizeClass::B8x4 => (8, 4),
            SizeClass::B4x8 => (4, 8),
            SizeClass::B8x8 => (8, 8),
            SizeClass::B16x16 => (16, 16),
            SizeClass::B32x32 => (32, 32),
            SizeClass::B64x64 => (64, 64),
        }
    }

    /// Size class this one is derived from, `None` for 4x4 (built from 2x2 cells).
    pub fn parent_source(self) -> Option<SizeClass> {
        match self {
            SizeClass::B4x4 => None,
            SizeClass::B8x4 | SizeClass::B4x8 | SizeClass::B8x8 => Some(SizeClass::B4x4),
            SizeClass::B16x16 => Some(SizeClass::B8x8),
            SizeClass::B32x32 => Some(SizeClass::B16x16),
            SizeClass::B64x64 => Some(SizeClass::B32x32),
        }
    }
}

impl std::fmt::Display for SizeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (w, h) = self.dims();
        write!(f, "{w}x{h}")
    }
}

const MAX_DIM: usize = 64;

/// Immutable mapping between block dimensions, size classes and the small
/// integer each class occupies in a packed bucket address.
#[derive(Debug, Clone)]
pub struct SizeTable {
    by_dims: [[Option<SizeClass>; MAX_DIM + 1]; MAX_DIM + 1],
}

impl SizeTable {
    /// The standard assignment: 8x8, 16x16, 32x32, 64x64, 4x4, 4x8, 8x4 map
    /// to 0..=6.
    pub fn standard() -> Self {
        let mut by_dims = [[None; MAX_DIM + 1]; MAX_DIM + 1];
        for class in SizeClass::ALL {
            let (w, h) = class.dims();
            by_dims[w][h] = Some(class);
        }
        Self { by_dims }
    }

    /// Resolve a `width`x`height` request, failing on any unsupported shape.
    pub fn resolve(&self, width: usize, height: usize) -> Result<SizeClass, FrameHashError> {
        self.by_dims
            .get(width)
            .and_then(|row| row.get(height))
            .copied()
            .flatten()
            .ok_or(FrameHashError::UnsupportedBlockSize { width, height })
    }

    pub fn index_of(&self, class: SizeClass) -> u32 {
        match class {
            SizeClass::B8x8 => 0,
            SizeClass::B16x16 => 1,
            SizeClass::B32x32 => 2,
            SizeClass::B64x64 => 3,
            SizeClass::B4x4 => 4,
            SizeClass::B4x8 => 5,
            SizeClass::B8x4 => 6,
        }
    }

    /// Bits needed to hold any index returned by [`SizeTable::index_of`].
    pub fn index_bits(&self) -> u32 {
        3
    }
}

impl Default for SizeTable {
    fn default() -> Self {
        Self::standard()
    }
}
