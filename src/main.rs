use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use framehash::io_utils::{framehash_cli_error, io_cli_error, load_raw_frame, FrameGeometry};
use framehash::logging::init_tracing;
use framehash::{ChromaFormat, DuplicateIndex, HashConfig, IndexStats, SizeClass};

#[derive(Parser)]
#[command(about = "Build the duplicate block index of one raw frame and report bucket statistics")]
struct Args {
    /// Raw planar frame (luma, then chroma planes)
    input: PathBuf,
    /// Luma width in samples
    #[arg(long)]
    width: usize,
    /// Luma height in samples
    #[arg(long)]
    height: usize,
    /// Sample bit depth; above 8 samples are 16-bit little-endian
    #[arg(long, default_value_t = 8)]
    bit_depth: u32,
    /// Chroma layout: 400, 420, 422 or 444
    #[arg(long, default_value = "420")]
    chroma: ChromaFormat,
    /// Optional JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Optional JSON output path for per-size statistics
    #[arg(long)]
    json: Option<PathBuf>,
    /// Optional CSV output path for per-size statistics
    #[arg(long)]
    csv: Option<PathBuf>,
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
    index
        .build_all(&frame)
        .map_err(|e| framehash_cli_error("building index", e))?;

    let stats: Vec<IndexStats> = SizeClass::ALL.iter().map(|&s| index.stats(s)).collect();
    for s in &stats {
        s.report();
        println!(
            "{:>6}: {} entries, {} buckets, largest {}, mean {:.2}, duplicated {}",
            s.size,
            s.entries,
            s.buckets,
            s.largest_bucket,
            s.mean_bucket(),
            s.duplicated_entries
        );
    }

    if let Some(path) = &args.csv {
        let f = File::create(path).map_err(|e| io_cli_error("creating csv", path, e))?;
        let mut wtr = csv::Writer::from_writer(f);
        for s in &stats {
            wtr.serialize(s)?;
        }
        wtr.flush()?;
    }
    if let Some(path) = &args.json {
        let mut f = File::create(path).map_err(|e| io_cli_error("creating json", path, e))?;
        serde_json::to_writer_pretty(&mut f, &stats)?;
        f.write_all(b"\n")?;
    }

    Ok(())
}
