use framehash::io_utils::{decode_raw_frame, FrameGeometry};
use framehash::{ChromaFormat, DuplicateIndex, HashConfig};
use honggfuzz::fuzz;

const FORMATS: [ChromaFormat; 4] = [
    ChromaFormat::Cf400,
    ChromaFormat::Cf420,
    ChromaFormat::Cf422,
    ChromaFormat::Cf444,
];

fn main() {
    loop {
        fuzz!(|data: &[u8]| {
            if data.len() < 3 {
                return;
            }
            let geometry = FrameGeometry {
                width: 1 + data[0] as usize % 40,
                height: 1 + data[1] as usize % 40,
                format: FORMATS[data[2] as usize % 4],
                bit_depth: if data[2] & 0x80 != 0 { 10 } else { 8 },
            };
            if let Ok(buf) = decode_raw_frame(&data[3..], geometry) {
                if let (Ok(frame), Ok(mut index)) =
                    (buf.view(), DuplicateIndex::new(&HashConfig::default()))
                {
                    let _ = index.build_all(&frame);
                }
            }
        });
    }
}
