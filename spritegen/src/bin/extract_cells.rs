use std::ops::Range;
use std::path::PathBuf;

use spritegen::inspect::{extract_cells, CellFormat};
use spritegen::SpriteError;
use structopt::StructOpt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, StructOpt, Clone)]
#[structopt(name = "extract-cells", about = "Crop every cue of a thumbnail track out of its sheet")]
struct Opt {
    // WebVTT thumbnail track
    #[structopt(short = "t", long)]
    track: PathBuf,

    // Directory holding the sheets the track points at; default the track's directory
    #[structopt(short = "s", long)]
    sheet_dir: Option<PathBuf>,

    // Where the cropped cells go
    #[structopt(short = "o", long)]
    out_dir: PathBuf,

    // Write jpg at this quality instead of png
    #[structopt(short = "q", long)]
    jpeg_quality: Option<u8>,

    // Start writing cells at cue_min
    #[structopt(long, default_value = "0")]
    cue_min: usize,

    // Stop before cue_max
    #[structopt(long)]
    cue_max: Option<usize>,
}

// Debugging aid: eyeball that every cue's rectangle lands on the right frame.
// Not threaded; sheets are loaded once per run of adjacent cues.
fn main() -> Result<(), SpriteError> {
    let opt = Opt::from_args();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spritegen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::debug!("opt: {opt:?}");

    let range = Range {
        start: opt.cue_min,
        end: opt.cue_max.unwrap_or(usize::MAX),
    };
    let sheet_dir = match opt.sheet_dir {
        Some(ref d) => d.clone(),
        None => opt
            .track
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let format = match opt.jpeg_quality {
        Some(quality) => CellFormat::Jpeg { quality },
        None => CellFormat::Png,
    };
    let n = extract_cells(&opt.track, sheet_dir, &opt.out_dir, range, format)?;
    tracing::info!("extracted {n} cells into {}", opt.out_dir.display());
    Ok(())
}
