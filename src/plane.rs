//! Read-only pixel planes and the frame description the hashing core consumes.
//!
//! All sample access goes through [`PlaneView`], which validates coordinates
//! against the plane bounds instead of trusting caller offset arithmetic.

use crate::FrameHashError;

/// Chroma sub-sampling layout of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaFormat {
    /// Luma only.
    Cf400,
    Cf420,
    Cf422,
    /// Full resolution chroma, the only layout whose chroma is fingerprinted.
    Cf444,
}

impl ChromaFormat {
    /// Horizontal and vertical chroma shift relative to luma.
    pub fn chroma_shift(self) -> (u32, u32) {
        match self {
            ChromaFormat::Cf400 | ChromaFormat::Cf444 => (0, 0),
            ChromaFormat::Cf420 => (1, 1),
            ChromaFormat::Cf422 => (1, 0),
        }
    }

    pub fn has_chroma(self) -> bool {
        self != ChromaFormat::Cf400
    }

    /// Chroma plane dimensions for a luma plane of `width`x`height`.
    pub fn chroma_dims(self, width: usize, height: usize) -> (usize, usize) {
        let (sx, sy) = self.chroma_shift();
        (width.div_ceil(1 << sx), height.div_ceil(1 << sy))
    }
}

impl std::str::FromStr for ChromaFormat {
    type Err = FrameHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "400" => Ok(ChromaFormat::Cf400),
            "420" => Ok(ChromaFormat::Cf420),
            "422" => Ok(ChromaFormat::Cf422),
            "444" => Ok(ChromaFormat::Cf444),
            other => Err(FrameHashError::InvalidFrame(format!(
                "unknown chroma format '{other}'"
            ))),
        }
    }
}

/// Sample bit depth per channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitDepths {
    pub luma: u32,
    pub chroma: u32,
}

impl BitDepths {
    pub const EIGHT: BitDepths = BitDepths { luma: 8, chroma: 8 };

    pub fn uniform(bits: u32) -> Self {
        Self { luma: bits, chroma: bits }
    }

    fn validate(&self) -> Result<(), FrameHashError> {
        for bits in [self.luma, self.chroma] {
            if !(8..=16).contains(&bits) {
                return Err(FrameHashError::InvalidFrame(format!(
                    "bit depth {bits} outside 8..=16"
                )));
            }
        }
        Ok(())
    }
}

/// Bounds-checked 2-D window over a flat sample buffer.
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a> {
    samples: &'a [u16],
    offset: usize,
    stride: usize,
    width: usize,
    height: usize,
}

impl<'a> PlaneView<'a> {
    pub fn new(
        samples: &'a [u16],
        stride: usize,
        width: usize,
        height: usize,
    ) -> Result<Self, FrameHashError> {
        Self::with_offset(samples, 0, stride, width, height)
    }

    /// View starting `offset` samples into the buffer, e.g. a cropped region
    /// of a padded picture.
    pub fn with_offset(
        samples: &'a [u16],
        offset: usize,
        stride: usize,
        width: usize,
        height: usize,
    ) -> Result<Self, FrameHashError> {
        if width > stride {
            return Err(FrameHashError::InvalidFrame(format!(
                "plane width {width} exceeds stride {stride}"
            )));
        }
        let needed = match height.checked_sub(1) {
            None => Some(offset),
            Some(last) => last
                .checked_mul(stride)
                .and_then(|n| n.checked_add(width))
                .and_then(|n| n.checked_add(offset)),
        };
        let Some(needed) = needed else {
            return Err(FrameHashError::InvalidFrame(format!(
                "plane of {width}x{height} with stride {stride} overflows the address space"
            )));
        };
        if needed > samples.len() {
            return Err(FrameHashError::InvalidFrame(format!(
                "plane needs {needed} samples, buffer holds {}",
                samples.len()
            )));
        }
        Ok(Self {
            samples,
            offset,
            stride,
            width,
            height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Result<u16, FrameHashError> {
        if x >= self.width || y >= self.height {
            return Err(self.out_of_bounds(x, y));
        }
        Ok(self.samples[self.offset + y * self.stride + x])
    }

    /// `len` samples of row `y` starting at column `x`.
    pub fn row(&self, x: usize, y: usize, len: usize) -> Result<&'a [u16], FrameHashError> {
        if y >= self.height || x + len > self.width {
            return Err(self.out_of_bounds(x + len.saturating_sub(1), y));
        }
        let start = self.offset + y * self.stride + x;
        Ok(&self.samples[start..start + len])
    }

    fn out_of_bounds(&self, x: usize, y: usize) -> FrameHashError {
        FrameHashError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        }
    }
}

/// One picture as seen by the hashing core.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    luma: PlaneView<'a>,
    chroma: Option<[PlaneView<'a>; 2]>,
    format: ChromaFormat,
    bit_depths: BitDepths,
}

impl<'a> Frame<'a> {
    pub fn new(
        luma: PlaneView<'a>,
        chroma: Option<[PlaneView<'a>; 2]>,
        format: ChromaFormat,
        bit_depths: BitDepths,
    ) -> Result<Self, FrameHashError> {
        bit_depths.validate()?;
        match (&chroma, format.has_chroma()) {
            (None, false) => {}
            (Some(planes), true) => {
                let expected = format.chroma_dims(luma.width(), luma.height());
                for plane in planes {
                    if (plane.width(), plane.height()) != expected {
                        return Err(FrameHashError::InvalidFrame(format!(
                            "chroma plane {}x{} does not match {:?} layout (expected {}x{})",
                            plane.width(),
                            plane.height(),
                            format,
                            expected.0,
                            expected.1
                        )));
                    }
                }
            }
            (None, true) => {
                return Err(FrameHashError::InvalidFrame(format!(
                    "{format:?} layout requires chroma planes"
                )))
            }
            (Some(_), false) => {
                return Err(FrameHashError::InvalidFrame(
                    "luma-only layout given chroma planes".into(),
                ))
            }
        }
        Ok(Self {
            luma,
            chroma,
            format,
            bit_depths,
        })
    }

    pub fn width(&self) -> usize {
        self.luma.width()
    }

    pub fn height(&self) -> usize {
        self.luma.height()
    }

    pub fn format(&self) -> ChromaFormat {
        self.format
    }

    pub fn bit_depths(&self) -> BitDepths {
        self.bit_depths
    }

    pub fn luma(&self) -> &PlaneView<'a> {
        &self.luma
    }

    pub fn chroma(&self) -> Option<&[PlaneView<'a>; 2]> {
        self.chroma.as_ref()
    }
}

/// Owned planar picture, the backing store behind a [`Frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    format: ChromaFormat,
    bit_depths: BitDepths,
    planes: Vec<Vec<u16>>,
}

impl FrameBuffer {
    /// Picture with every sample of every plane set to `value`.
    pub fn filled(
        width: usize,
        height: usize,
        format: ChromaFormat,
        bit_depths: BitDepths,
        value: u16,
    ) -> Self {
        let (cw, ch) = format.chroma_dims(width, height);
        let mut planes = vec![vec![value; width * height]];
        if format.has_chroma() {
            planes.push(vec![value; cw * ch]);
            planes.push(vec![value; cw * ch]);
        }
        Self {
            width,
            height,
            format,
            bit_depths,
            planes,
        }
    }

    /// Take ownership of tightly packed planes (luma first).
    pub fn from_planes(
        width: usize,
        height: usize,
        format: ChromaFormat,
        bit_depths: BitDepths,
        planes: Vec<Vec<u16>>,
    ) -> Result<Self, FrameHashError> {
        let buffer = Self {
            width,
            height,
            format,
            bit_depths,
            planes,
        };
        let expected = if format.has_chroma() { 3 } else { 1 };
        if buffer.planes.len() != expected {
            return Err(FrameHashError::InvalidFrame(format!(
                "{format:?} layout needs {expected} planes, got {}",
                buffer.planes.len()
            )));
        }
        buffer.view()?;
        for (component, plane) in buffer.planes.iter().enumerate() {
            let bits = if component == 0 { bit_depths.luma } else { bit_depths.chroma };
            let max = ((1u32 << bits) - 1) as u16;
            if let Some(&sample) = plane.iter().find(|&&s| s > max) {
                return Err(FrameHashError::InvalidFrame(format!(
                    "sample value {sample} exceeds the {bits}-bit range of plane {component}"
                )));
            }
        }
        Ok(buffer)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Dimensions of plane `component` (0 = luma).
    pub fn plane_dims(&self, component: usize) -> (usize, usize) {
        if component == 0 {
            (self.width, self.height)
        } else {
            self.format.chroma_dims(self.width, self.height)
        }
    }

    pub fn plane(&self, component: usize) -> &[u16] {
        &self.planes[component]
    }

    pub fn plane_mut(&mut self, component: usize) -> &mut [u16] {
        &mut self.planes[component]
    }

    /// Write one sample; out-of-range coordinates are a caller bug and panic.
    pub fn set(&mut self, component: usize, x: usize, y: usize, value: u16) {
        let (w, h) = self.plane_dims(component);
        assert!(x < w && y < h, "sample ({x}, {y}) outside {w}x{h} plane");
        self.planes[component][y * w + x] = value;
    }

    /// Read one sample; panics like [`FrameBuffer::set`] when out of range.
    pub fn get(&self, component: usize, x: usize, y: usize) -> u16 {
        let (w, h) = self.plane_dims(component);
        assert!(x < w && y < h, "sample ({x}, {y}) outside {w}x{h} plane");
        self.planes[component][y * w + x]
    }

    /// Copy a `width`x`height` luma-resolution rectangle of every plane
    /// from `src` to `dst`.
    pub fn copy_block(&mut self, src: (usize, usize), dst: (usize, usize), width: usize, height: usize) {
        for component in 0..self.planes.len() {
            let (sx, sy) = if component == 0 { (0, 0) } else { self.format.chroma_shift() };
            for y in 0..(height >> sy) {
                for x in 0..(width >> sx) {
                    let v = self.get(component, (src.0 >> sx) + x, (src.1 >> sy) + y);
                    self.set(component, (dst.0 >> sx) + x, (dst.1 >> sy) + y, v);
                }
            }
        }
    }

    pub fn view(&self) -> Result<Frame<'_>, FrameHashError> {
        let luma = PlaneView::new(&self.planes[0], self.width, self.width, self.height)?;
        let chroma = if self.format.has_chroma() {
            let (cw, ch) = self.format.chroma_dims(self.width, self.height);
            Some([
                PlaneView::new(&self.planes[1], cw, cw, ch)?,
                PlaneView::new(&self.planes[2], cw, cw, ch)?,
            ])
        } else {
            None
        };
        Frame::new(luma, chroma, self.format, self.bit_depths)
    }
}
