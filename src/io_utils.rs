use std::fmt;
use std::io;
use std::path::Path;

use crate::plane::{BitDepths, ChromaFormat, FrameBuffer};
use crate::FrameHashError;

#[derive(Debug)]
pub struct CliError {
    pub msg: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.msg.fmt(f)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Format a user friendly I/O error message with suggestions.
pub fn format_io_error(operation: &str, path: &Path, err: &io::Error) -> String {
    use io::ErrorKind::*;
    let suggestion = match err.kind() {
        NotFound => "Check that the file exists and the path is correct.",
        PermissionDenied => "Check permissions or run as a different user.",
        UnexpectedEof => "File appears truncated or corrupted.",
        WriteZero => "Disk may be full. Free up space and try again.",
        _ => "Check permissions or free up disk space.",
    };
    format!(
        "Error {} '{}': {}. {}",
        operation,
        path.display(),
        err,
        suggestion
    )
}

/// Convert an I/O error into a CLI error with context.
pub fn io_cli_error(operation: &str, path: &Path, err: io::Error) -> CliError {
    CliError {
        msg: format_io_error(operation, path, &err),
        source: Some(Box::new(err)),
    }
}

/// Convert a library error into a CLI error with a hint.
pub fn framehash_cli_error(context: &str, err: FrameHashError) -> CliError {
    CliError {
        msg: format!("{}: {}", context, cli_hint(&err)),
        source: Some(Box::new(err)),
    }
}

/// Return an actionable hint for an error variant.
pub fn cli_hint(err: &FrameHashError) -> String {
    use FrameHashError::*;
    match err {
        UnsupportedBlockSize { width, height } => format!(
            "block size {width}x{height} is not supported. Use 4x4, 8x4, 4x8, 8x8, 16x16, 32x32 or 64x64."
        ),
        InvalidChromaInclusion(format) => {
            format!("chroma can only be hashed for 4:4:4 input, not {format:?}.")
        }
        AllocationFailure { what, requested } => {
            format!("could not allocate {requested} {what} entries. Try a smaller frame.")
        }
        OutOfBounds { x, y, width, height } => {
            format!("sample ({x}, {y}) lies outside the {width}x{height} frame.")
        }
        InvalidFrame(msg) => format!("{msg}. Check --width, --height, --chroma and --bit-depth."),
        Config(msg) => format!("{msg}. Invalid configuration."),
        Io(io) => format!("{io}"),
    }
}

/// Layout of a raw planar frame file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: usize,
    pub height: usize,
    pub format: ChromaFormat,
    pub bit_depth: u32,
}

impl FrameGeometry {
    fn bytes_per_sample(&self) -> usize {
        if self.bit_depth > 8 {
            2
        } else {
            1
        }
    }

    /// Expected file size of one frame.
    pub fn frame_bytes(&self) -> Result<usize, FrameHashError> {
        let (cw, ch) = self.format.chroma_dims(self.width, self.height);
        let chroma = if self.format.has_chroma() {
            cw.checked_mul(ch).and_then(|n| n.checked_mul(2))
        } else {
            Some(0)
        };
        self.width
            .checked_mul(self.height)
            .zip(chroma)
            .and_then(|(luma, chroma)| luma.checked_add(chroma))
            .and_then(|n| n.checked_mul(self.bytes_per_sample()))
            .ok_or_else(|| {
                FrameHashError::InvalidFrame(format!(
                    "{}x{} frame is too large",
                    self.width, self.height
                ))
            })
    }
}

/// Decode a raw planar frame: luma then both chroma planes, one byte per
/// sample at 8 bits, two little-endian bytes above.
pub fn decode_raw_frame(data: &[u8], geometry: FrameGeometry) -> Result<FrameBuffer, FrameHashError> {
    let expected = geometry.frame_bytes()?;
    if data.len() < expected {
        return Err(FrameHashError::InvalidFrame(format!(
            "input holds {} bytes, one {}x{} {:?} frame needs {}",
            data.len(),
            geometry.width,
            geometry.height,
            geometry.format,
            expected
        )));
    }
    let samples: Vec<u16> = match geometry.bytes_per_sample() {
        1 => data[..expected].iter().map(|&b| b as u16).collect(),
        _ => data[..expected]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    };
    let luma_len = geometry.width * geometry.height;
    let mut planes = vec![samples[..luma_len].to_vec()];
    if geometry.format.has_chroma() {
        let (cw, ch) = geometry.format.chroma_dims(geometry.width, geometry.height);
        let chroma_len = cw * ch;
        planes.push(samples[luma_len..luma_len + chroma_len].to_vec());
        planes.push(samples[luma_len + chroma_len..].to_vec());
    }
    FrameBuffer::from_planes(
        geometry.width,
        geometry.height,
        geometry.format,
        BitDepths::uniform(geometry.bit_depth),
        planes,
    )
}

/// Read and decode the first frame of a raw planar file.
pub fn load_raw_frame(path: &Path, geometry: FrameGeometry) -> Result<FrameBuffer, CliError> {
    let data = std::fs::read(path).map_err(|e| io_cli_error("reading input frame", path, e))?;
    decode_raw_frame(&data, geometry).map_err(|e| framehash_cli_error("decoding input frame", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_8bit_420() {
        let geometry = FrameGeometry {
            width: 4,
            height: 2,
            format: ChromaFormat::Cf420,
            bit_depth: 8,
        };
        assert_eq!(geometry.frame_bytes().unwrap(), 8 + 2 + 2);
        let data: Vec<u8> = (0..12).collect();
        let frame = decode_raw_frame(&data, geometry).unwrap();
        assert_eq!(frame.plane(0), &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(frame.plane(1), &[8, 9]);
        assert_eq!(frame.plane(2), &[10, 11]);
    }

    #[test]
    fn decodes_10bit_little_endian() {
        let geometry = FrameGeometry {
            width: 2,
            height: 1,
            format: ChromaFormat::Cf400,
            bit_depth: 10,
        };
        let frame = decode_raw_frame(&[0xFF, 0x03, 0x01, 0x02], geometry).unwrap();
        assert_eq!(frame.plane(0), &[0x3FF, 0x201]);
    }

    #[test]
    fn samples_beyond_bit_depth_are_rejected() {
        let geometry = FrameGeometry {
            width: 2,
            height: 1,
            format: ChromaFormat::Cf400,
            bit_depth: 10,
        };
        // 0x7FF would alias 0x3FF once reduced to 8 bits.
        let err = decode_raw_frame(&[0xFF, 0x03, 0xFF, 0x07], geometry).unwrap_err();
        assert!(matches!(err, FrameHashError::InvalidFrame(_)));
        assert!(cli_hint(&err).contains("--bit-depth"));
    }

    #[test]
    fn oversized_geometry_is_an_error() {
        let geometry = FrameGeometry {
            width: usize::MAX,
            height: 3,
            format: ChromaFormat::Cf420,
            bit_depth: 10,
        };
        assert!(matches!(
            geometry.frame_bytes(),
            Err(FrameHashError::InvalidFrame(_))
        ));
        assert!(decode_raw_frame(&[0; 16], geometry).is_err());
    }

    #[test]
    fn short_input_is_reported() {
        let geometry = FrameGeometry {
            width: 4,
            height: 4,
            format: ChromaFormat::Cf444,
            bit_depth: 8,
        };
        let err = decode_raw_frame(&[0; 20], geometry).unwrap_err();
        assert!(cli_hint(&err).contains("--width"));
    }
}
