use framehash::{
    BitDepths, BlockHasher, CellSampler, ChromaFormat, FrameBuffer, HashConfig, HashPyramid,
    SizeClass,
};
use honggfuzz::fuzz;

// First two bytes pick the frame size, the rest fill the luma plane.
fn check(data: &[u8]) {
    if data.len() < 2 {
        return;
    }
    let width = 4 + (data[0] as usize % 45);
    let height = 4 + (data[1] as usize % 45);
    let mut buf = FrameBuffer::filled(width, height, ChromaFormat::Cf400, BitDepths::EIGHT, 0);
    for (sample, &b) in buf.plane_mut(0).iter_mut().zip(&data[2..]) {
        *sample = b as u16;
    }
    let Ok(frame) = buf.view() else { return };
    let config = HashConfig::default();
    let Ok(hasher) = config.hasher() else { return };
    let Ok(single) = BlockHasher::new(&config) else { return };
    let sampler = CellSampler::for_frame(&frame);
    let Ok(pyramid) = HashPyramid::build(&frame, &sampler, &hasher, &SizeClass::ALL) else {
        return;
    };
    for size in SizeClass::ALL {
        let Some(level) = pyramid.level(size) else { continue };
        for (x, y, entry) in level.iter() {
            let direct = single.hash(&frame, x, y, size).ok();
            assert_eq!(Some(entry.fingerprint), direct, "{size} at ({x}, {y})");
        }
    }
}

fn main() {
    loop {
        fuzz!(|data: &[u8]| {
            check(data);
        });
    }
}
