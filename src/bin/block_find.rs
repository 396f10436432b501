use std::path::PathBuf;

use clap::Parser;
use framehash::io_utils::{framehash_cli_error, load_raw_frame, FrameGeometry};
use framehash::logging::init_tracing;
use framehash::{is_horizontal_perfect, is_vertical_perfect, ChromaFormat, DuplicateIndex, HashConfig};

#[derive(Parser)]
#[command(about = "Fingerprint one block of a raw frame and list identical blocks in the same frame")]
struct Args {
    /// Raw planar frame (luma, then chroma planes)
    input: PathBuf,
    #[arg(long)]
    width: usize,
    #[arg(long)]
    height: usize,
    #[arg(long, default_value_t = 8)]
    bit_depth: u32,
    #[arg(long, default_value = "420")]
    chroma: ChromaFormat,
    /// Block anchor column
    #[arg(long)]
    x: usize,
    /// Block anchor row
    #[arg(long)]
    y: usize,
    #[arg(long, default_value_t = 8)]
    block_width: usize,
    #[arg(long, default_value_t = 8)]
    block_height: usize,
    /// Optional JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            HashConfig::load(path).map_err(|e| framehash_cli_error("loading config", e))?
        }
        None => HashConfig::default(),
    };
    let geometry = FrameGeometry {
        width: args.width,
        height: args.height,
        format: args.chroma,
        bit_depth: args.bit_depth,
    };
    let buffer = load_raw_frame(&args.input, geometry)?;
    let frame = buffer
        .view()
        .map_err(|e| framehash_cli_error("decoding input frame", e))?;

    let mut index =
        DuplicateIndex::new(&config).map_err(|e| framehash_cli_error("creating index", e))?;
    let size = index
        .sizes()
        .resolve(args.block_width, args.block_height)
        .map_err(|e| framehash_cli_error("selecting block size", e))?;
    let fingerprint = index
        .block_hasher()
        .hash(&frame, args.x, args.y, size)
        .map_err(|e| framehash_cli_error("hashing block", e))?;
    index
        .build(&frame, size)
        .map_err(|e| framehash_cli_error("building index", e))?;

    let key = index.key(size, fingerprint);
    println!(
        "block {size} at ({}, {}): primary {:06x} secondary {:06x} bucket {:#x} ({} entries)",
        args.x,
        args.y,
        fingerprint.primary,
        fingerprint.secondary,
        key.packed(index.sizes(), index.index_bits()),
        index.count(&key)
    );
    let (w, h) = size.dims();
    let horizontal = is_horizontal_perfect(frame.luma(), args.x, args.y, w, h)?;
    let vertical = is_vertical_perfect(frame.luma(), args.x, args.y, w, h)?;
    if horizontal || vertical {
        println!("luma rows constant: {horizontal}, columns constant: {vertical}");
    }

    let matches: Vec<_> = index
        .matches(size, fingerprint)
        .filter(|p| (p.x, p.y) != (args.x, args.y))
        .collect();
    for p in &matches {
        println!("match ({}, {})", p.x, p.y);
    }
    println!("Total matches: {}", matches.len());

    Ok(())
}
