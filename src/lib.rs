//! Hash-based duplicate block search for a single video frame.
//!
//! Every luma position gets a `(primary, secondary)` checksum pair for each
//! supported block size. Fingerprints are built bottom-up: 2x2 sample cells
//! are checksummed directly and each larger block checksums the fingerprints
//! of its children. A [`DuplicateIndex`] buckets the blocks of a frame so a
//! search can find identical content elsewhere in the same frame in O(1)
//! average time, and a [`BlockHasher`] fingerprints single candidate blocks
//! with bit-identical results.
//!
//! ```
//! use framehash::{BitDepths, ChromaFormat, DuplicateIndex, FrameBuffer, HashConfig, SizeClass};
//!
//! let buf = FrameBuffer::filled(8, 8, ChromaFormat::Cf400, BitDepths::EIGHT, 100);
//! let frame = buf.view()?;
//! let mut index = DuplicateIndex::new(&HashConfig::default())?;
//! index.build(&frame, SizeClass::B4x4)?;
//! let fp = index.block_hasher().hash(&frame, 4, 4, SizeClass::B4x4)?;
//! assert!(index.has_exact_match(SizeClass::B4x4, fp));
//! # Ok::<(), framehash::FrameHashError>(())
//! ```

pub mod block_hasher;
pub mod config;
pub mod crc;
pub mod error;
pub mod index;
pub mod io_utils;
pub mod logging;
pub mod plane;
pub mod pyramid;
pub mod sampler;
pub mod size_class;
pub mod stats;

pub use block_hasher::BlockHasher;
pub use config::HashConfig;
pub use crc::{CrcCalculator, CrcParams, Fingerprint, FingerprintHasher};
pub use error::FrameHashError;
pub use index::{BucketKey, DuplicateIndex, IndexEntry, Position};
pub use plane::{BitDepths, ChromaFormat, Frame, FrameBuffer, PlaneView};
pub use pyramid::{walk_levels, Doubling, HashLevel, HashPyramid, LevelEntry};
pub use sampler::{is_horizontal_perfect, is_vertical_perfect, CellBytes, CellSampler};
pub use size_class::{SizeClass, SizeTable};
pub use stats::IndexStats;
