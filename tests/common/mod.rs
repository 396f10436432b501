#![allow(dead_code)]

use framehash::{BitDepths, ChromaFormat, FrameBuffer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Frame whose every plane is filled with uniformly random samples.
pub fn random_frame(
    width: usize,
    height: usize,
    format: ChromaFormat,
    bit_depth: u32,
    seed: u64,
) -> FrameBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buf = FrameBuffer::filled(width, height, format, BitDepths::uniform(bit_depth), 0);
    let max = (1u32 << bit_depth) - 1;
    let planes = if format.has_chroma() { 3 } else { 1 };
    for component in 0..planes {
        for sample in buf.plane_mut(component) {
            *sample = rng.gen_range(0..=max) as u16;
        }
    }
    buf
}

pub fn flat_luma(width: usize, height: usize, value: u16) -> FrameBuffer {
    FrameBuffer::filled(width, height, ChromaFormat::Cf400, BitDepths::EIGHT, value)
}
