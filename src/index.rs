//! Frame-scoped duplicate index.
//!
//! Blocks are bucketed by size class and the low `index_bits` of their
//! primary fingerprint; each bucket keeps the anchor position and the full
//! secondary fingerprint of its blocks in insertion order. The index is built
//! once per frame and then only read, so it may be shared between threads
//! after construction.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::block_hasher::BlockHasher;
use crate::config::HashConfig;
use crate::crc::{Fingerprint, FingerprintHasher};
use crate::plane::Frame;
use crate::pyramid::{walk_levels, HashLevel};
use crate::sampler::CellSampler;
use crate::size_class::{SizeClass, SizeTable};
use crate::stats::IndexStats;
use crate::FrameHashError;

/// Top-left luma coordinate of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// One indexed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub position: Position,
    pub secondary: u32,
}

/// Bucket address: size class plus truncated primary fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub size: SizeClass,
    pub hash: u32,
}

impl BucketKey {
    /// Flat table address `(size index << index_bits) | hash`.
    pub fn packed(&self, sizes: &SizeTable, index_bits: u32) -> u32 {
        (sizes.index_of(self.size) << index_bits) | self.hash
    }
}

/// Buckets of one size class waiting to be committed.
struct StagedLevel {
    size: SizeClass,
    buckets: HashMap<BucketKey, Vec<IndexEntry>>,
    entries: usize,
}

pub struct DuplicateIndex {
    hasher: FingerprintHasher,
    sizes: SizeTable,
    index_bits: u32,
    buckets: HashMap<BucketKey, Vec<IndexEntry>>,
    built: Vec<SizeClass>,
}

impl DuplicateIndex {
    pub fn new(config: &HashConfig) -> Result<Self, FrameHashError> {
        config.validate()?;
        Ok(Self {
            hasher: config.hasher()?,
            sizes: SizeTable::standard(),
            index_bits: config.index_bits,
            buckets: HashMap::new(),
            built: Vec::new(),
        })
    }

    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }

    pub fn sizes(&self) -> &SizeTable {
        &self.sizes
    }

    /// On-demand hasher using the same checksum engines as this index.
    pub fn block_hasher(&self) -> BlockHasher {
        BlockHasher::from_parts(self.hasher.clone(), self.sizes.clone())
    }

    /// Bucket holding blocks of `size` with fingerprint `fingerprint`.
    pub fn key(&self, size: SizeClass, fingerprint: Fingerprint) -> BucketKey {
        let mask = u32::MAX >> (32 - self.index_bits);
        BucketKey {
            size,
            hash: fingerprint.primary & mask,
        }
    }

    /// Index every eligible block of `size`. Rebuilding a size replaces its
    /// previous entries. Returns the number of inserted entries.
    pub fn build(&mut self, frame: &Frame<'_>, size: SizeClass) -> Result<usize, FrameHashError> {
        self.build_sizes(frame, &[size])
    }

    /// Index a `width`x`height` size class, rejecting unsupported shapes.
    pub fn build_dims(
        &mut self,
        frame: &Frame<'_>,
        width: usize,
        height: usize,
    ) -> Result<usize, FrameHashError> {
        let size = self.sizes.resolve(width, height)?;
        self.build(frame, size)
    }

    /// Index every supported size class from a single pyramid pass.
    pub fn build_all(&mut self, frame: &Frame<'_>) -> Result<usize, FrameHashError> {
        self.build_sizes(frame, &SizeClass::ALL)
    }

    /// Index several size classes from one pyramid pass. Either every
    /// requested size is replaced or, on error, the index is left as it was.
    pub fn build_sizes(&mut self, frame: &Frame<'_>, sizes: &[SizeClass]) -> Result<usize, FrameHashError> {
        let sampler = CellSampler::for_frame(frame);
        let hasher = self.hasher.clone();
        self.build_from(|visit| walk_levels(frame, &sampler, &hasher, sizes, visit))
    }

    /// Stage every level `walk` hands to its visitor and commit them only
    /// once the whole walk has succeeded.
    fn build_from<W>(&mut self, walk: W) -> Result<usize, FrameHashError>
    where
        W: FnOnce(&mut dyn FnMut(SizeClass, &HashLevel) -> Result<(), FrameHashError>) -> Result<(), FrameHashError>,
    {
        let mut staged = Vec::new();
        walk(&mut |size: SizeClass, level: &HashLevel| -> Result<(), FrameHashError> {
            staged.push(self.stage_level(size, level)?);
            Ok(())
        })?;
        Ok(staged.into_iter().map(|level| self.commit(level)).sum())
    }

    /// Insert the eligible positions of a precomputed level.
    pub fn insert_level(&mut self, size: SizeClass, level: &HashLevel) -> Result<usize, FrameHashError> {
        let staged = self.stage_level(size, level)?;
        Ok(self.commit(staged))
    }

    fn stage_level(&self, size: SizeClass, level: &HashLevel) -> Result<StagedLevel, FrameHashError> {
        if level.block_dims() != size.dims() {
            let (width, height) = level.block_dims();
            return Err(FrameHashError::UnsupportedBlockSize { width, height });
        }
        let mut buckets: HashMap<BucketKey, Vec<IndexEntry>> = HashMap::new();
        let mut entries = 0;
        for (x, y, entry) in level.iter() {
            if !entry.eligible {
                continue;
            }
            buckets
                .entry(self.key(size, entry.fingerprint))
                .or_default()
                .push(IndexEntry {
                    position: Position::new(x, y),
                    secondary: entry.fingerprint.secondary,
                });
            entries += 1;
        }
        Ok(StagedLevel {
            size,
            buckets,
            entries,
        })
    }

    fn commit(&mut self, staged: StagedLevel) -> usize {
        let size = staged.size;
        if self.is_built(size) {
            debug!(%size, "replacing previously indexed size class");
            self.buckets.retain(|key, _| key.size != size);
            self.built.retain(|&s| s != size);
        }
        self.buckets.extend(staged.buckets);
        self.built.push(size);
        info!(%size, entries = staged.entries, "indexed size class");
        staged.entries
    }

    /// Number of entries in `key`'s bucket; zero for buckets never populated.
    pub fn count(&self, key: &BucketKey) -> usize {
        self.buckets.get(key).map_or(0, Vec::len)
    }

    /// Entries of `key`'s bucket in insertion order.
    pub fn entries(&self, key: &BucketKey) -> &[IndexEntry] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a block of `size` with exactly this fingerprint pair was indexed.
    pub fn has_exact_match(&self, size: SizeClass, fingerprint: Fingerprint) -> bool {
        self.matches(size, fingerprint).next().is_some()
    }

    /// Positions of indexed blocks whose fingerprint pair equals `fingerprint`.
    pub fn matches(&self, size: SizeClass, fingerprint: Fingerprint) -> impl Iterator<Item = Position> + '_ {
        self.entries(&self.key(size, fingerprint))
            .iter()
            .filter(move |e| e.secondary == fingerprint.secondary)
            .map(|e| e.position)
    }

    pub fn is_built(&self, size: SizeClass) -> bool {
        self.built.contains(&size)
    }

    /// Any size class has been indexed since the last [`DuplicateIndex::clear`].
    pub fn is_populated(&self) -> bool {
        !self.built.is_empty()
    }

    /// Total number of entries across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drop every entry, ready for the next frame.
    pub fn clear(&mut self) {
        debug!(buckets = self.buckets.len(), "clearing duplicate index");
        self.buckets.clear();
        self.built.clear();
    }

    /// Bucket and duplicate statistics for one size class.
    pub fn stats(&self, size: SizeClass) -> IndexStats {
        IndexStats::collect(
            size,
            self.buckets
                .iter()
                .filter(|(key, _)| key.size == size)
                .map(|(_, entries)| entries.as_slice()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::CrcParams;
    use crate::plane::{BitDepths, ChromaFormat, FrameBuffer};

    fn flat(width: usize, height: usize, value: u16) -> FrameBuffer {
        FrameBuffer::filled(width, height, ChromaFormat::Cf400, BitDepths::EIGHT, value)
    }

    #[test]
    fn unbuilt_index_behaves_empty() {
        let index = DuplicateIndex::new(&HashConfig::default()).unwrap();
        let key = BucketKey { size: SizeClass::B8x8, hash: 42 };
        assert_eq!(index.count(&key), 0);
        assert!(index.entries(&key).is_empty());
        assert!(!index.has_exact_match(SizeClass::B8x8, Fingerprint::default()));
        assert!(!index.is_populated());
    }

    #[test]
    fn key_truncates_primary() {
        let config = HashConfig { index_bits: 8, ..HashConfig::default() };
        let index = DuplicateIndex::new(&config).unwrap();
        let fp = Fingerprint { primary: 0xABCDEF, secondary: 1 };
        let key = index.key(SizeClass::B16x16, fp);
        assert_eq!(key.hash, 0xEF);
        assert_eq!(key.packed(index.sizes(), index.index_bits()), (1 << 8) | 0xEF);
    }

    #[test]
    fn widest_keys_keep_size_classes_apart() {
        let config = HashConfig {
            index_bits: 29,
            primary: CrcParams { bits: 32, poly: 0x04C1_1DB7 },
            ..HashConfig::default()
        };
        let index = DuplicateIndex::new(&config).unwrap();
        let fp = Fingerprint { primary: u32::MAX, secondary: 5 };
        let packed: Vec<u32> = SizeClass::ALL
            .iter()
            .map(|&s| index.key(s, fp).packed(index.sizes(), index.index_bits()))
            .collect();
        for (i, a) in packed.iter().enumerate() {
            assert!(packed[i + 1..].iter().all(|b| b != a));
        }
        let too_wide = HashConfig { index_bits: 30, ..config };
        assert!(DuplicateIndex::new(&too_wide).is_err());
    }

    #[test]
    fn flat_frame_indexes_grid_tiles_only() {
        let buf = flat(8, 8, 100);
        let frame = buf.view().unwrap();
        let mut index = DuplicateIndex::new(&HashConfig::default()).unwrap();
        assert_eq!(index.build(&frame, SizeClass::B4x4).unwrap(), 4);
        assert_eq!(index.build(&frame, SizeClass::B8x4).unwrap(), 2);
        assert_eq!(index.build(&frame, SizeClass::B4x8).unwrap(), 2);
        let stats = index.stats(SizeClass::B4x4);
        assert_eq!(stats.entries, 4);
        assert_eq!(stats.buckets, 1);
        assert_eq!(stats.duplicated_entries, 4);
    }

    #[test]
    fn rebuild_replaces_entries() {
        let buf = flat(16, 16, 3);
        let frame = buf.view().unwrap();
        let mut index = DuplicateIndex::new(&HashConfig::default()).unwrap();
        index.build(&frame, SizeClass::B8x8).unwrap();
        index.build(&frame, SizeClass::B8x8).unwrap();
        assert_eq!(index.len(), 4);
        index.clear();
        assert!(index.is_empty());
        assert!(!index.is_built(SizeClass::B8x8));
    }

    #[test]
    fn failed_build_keeps_previous_frame() {
        let first = flat(16, 16, 3);
        let mut second = flat(16, 16, 0);
        for y in 0..16 {
            for x in 0..16 {
                second.set(0, x, y, ((x * 7 + y * 13) % 251) as u16);
            }
        }
        let mut index = DuplicateIndex::new(&HashConfig::default()).unwrap();
        index.build_all(&first.view().unwrap()).unwrap();
        let stats: Vec<IndexStats> = SizeClass::ALL.iter().map(|&s| index.stats(s)).collect();
        let len = index.len();

        // The walk fails after the finer levels have been handed over.
        let frame = second.view().unwrap();
        let sampler = CellSampler::for_frame(&frame);
        let hasher = index.hasher.clone();
        let result = index.build_from(|visit| {
            walk_levels(&frame, &sampler, &hasher, &SizeClass::ALL, |size, level| {
                if size == SizeClass::B16x16 {
                    return Err(FrameHashError::AllocationFailure {
                        what: "pyramid level",
                        requested: 256,
                    });
                }
                visit(size, level)
            })
        });
        assert!(matches!(result, Err(FrameHashError::AllocationFailure { .. })));

        assert_eq!(index.len(), len);
        let after: Vec<IndexStats> = SizeClass::ALL.iter().map(|&s| index.stats(s)).collect();
        assert_eq!(after, stats);
        let old = index.block_hasher().hash(&first.view().unwrap(), 4, 4, SizeClass::B4x4).unwrap();
        assert!(index.has_exact_match(SizeClass::B4x4, old));
        let new = index.block_hasher().hash(&frame, 1, 1, SizeClass::B4x4).unwrap();
        assert!(!index.has_exact_match(SizeClass::B4x4, new));
    }

    #[test]
    fn build_dims_rejects_unsupported() {
        let buf = flat(32, 32, 0);
        let frame = buf.view().unwrap();
        let mut index = DuplicateIndex::new(&HashConfig::default()).unwrap();
        assert!(matches!(
            index.build_dims(&frame, 32, 16),
            Err(FrameHashError::UnsupportedBlockSize { width: 32, height: 16 })
        ));
        assert_eq!(index.build_dims(&frame, 32, 32).unwrap(), 1);
    }

    #[test]
    fn entries_keep_raster_order() {
        let buf = flat(16, 8, 9);
        let frame = buf.view().unwrap();
        let mut index = DuplicateIndex::new(&HashConfig::default()).unwrap();
        index.build(&frame, SizeClass::B4x4).unwrap();
        let fp = index.block_hasher().hash(&frame, 0, 0, SizeClass::B4x4).unwrap();
        let positions: Vec<Position> = index.matches(SizeClass::B4x4, fp).collect();
        let expected: Vec<Position> = [(0, 0), (4, 0), (8, 0), (12, 0), (0, 4), (4, 4), (8, 4), (12, 4)]
            .into_iter()
            .map(|(x, y)| Position::new(x, y))
            .collect();
        assert_eq!(positions, expected);
    }
}
