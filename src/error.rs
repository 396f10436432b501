use thiserror::Error;

use crate::plane::ChromaFormat;

#[derive(Error, Debug)]
pub enum FrameHashError {
    /// Block shape outside the supported set of size classes.
    #[error("unsupported block size {width}x{height}")]
    UnsupportedBlockSize { width: usize, height: usize },

    /// Chroma samples were requested for a layout that is not 4:4:4.
    #[error("chroma inclusion requested for {0:?} layout")]
    InvalidChromaInclusion(ChromaFormat),

    /// A frame-sized table or sample buffer could not be reserved.
    #[error("allocation of {requested} {what} entries failed")]
    AllocationFailure { what: &'static str, requested: usize },

    /// Pixel access outside a plane view.
    #[error("sample ({x}, {y}) outside {width}x{height} plane")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    /// Plane geometry or bit depth inconsistent with the frame description.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Propagated I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reserve room for `len` default values, reporting failure instead of aborting.
pub(crate) fn try_alloc<T: Clone + Default>(
    what: &'static str,
    len: usize,
) -> Result<Vec<T>, FrameHashError> {
    let mut out = Vec::new();
    out.try_reserve_exact(len)
        .map_err(|_| FrameHashError::AllocationFailure { what, requested: len })?;
    out.resize(len, T::default());
    Ok(out)
}
