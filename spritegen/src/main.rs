use std::path::PathBuf;
use std::time::Instant;

use structopt::StructOpt;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spritegen::data::{SheetOut, TrackOut};
use spritegen::layout::Layout;
use spritegen::pipeline::load_pipeline;
use spritegen::source::DirSource;
use spritegen::strategy::RunStrategy;
use spritegen::SpriteError;

// Reference grid: 3 columns x 4 rows, one frame every 5 seconds
const DEFAULT_COLUMNS: u32 = 3;
const DEFAULT_ROWS: u32 = 4;
const DEFAULT_INTERVAL_SECONDS: f64 = 5.0;
const DEFAULT_TRACK_NAME: &str = "previews.vtt";

#[derive(Debug, StructOpt, Clone)]
#[structopt(name = "spritegen", about = "Scrub-preview sprite sheet + WebVTT generator")]
struct Opt {
    // Directory of extracted frames, named <anything>_<index>.png
    #[structopt(short = "i", long)]
    src: PathBuf,

    // Directory the sprite sheets are written to
    #[structopt(short = "o", long)]
    out_dir: PathBuf,

    // Cue track path, "-" for stdout; default <out-dir>/previews.vtt
    #[structopt(long)]
    vtt: Option<String>,

    // JSON layout file; excludes the individual layout flags below
    #[structopt(short = "l", long)]
    layout: Option<PathBuf>,

    // Grid columns (default 3)
    #[structopt(long)]
    columns: Option<u32>,

    // Grid rows (default 4)
    #[structopt(long)]
    rows: Option<u32>,

    // Seconds of video per extracted frame (default 5)
    #[structopt(long)]
    interval: Option<f64>,

    // Start of the first cue relative to the first frame's nominal time (default -interval)
    #[structopt(long, allow_hyphen_values = true)]
    first_frame_offset: Option<f64>,

    // Only write sheets, skip the cue track
    #[structopt(long)]
    no_vtt: bool,

    // Rescale frames to this height before compositing
    #[structopt(long)]
    scale_height: Option<u32>,

    // Assemble batches on the calling thread only
    #[structopt(long)]
    disable_parallel: bool,

    // if 0, use num-cpu threads (default: 4), else specify number of compositing workers
    #[structopt(long = "num-threads", default_value = "4")]
    num_threads: u32,

    // Display diagnostic info
    #[structopt(short, long)]
    debug: bool,

    // Display Timing info
    #[structopt(long)]
    timing: bool,
}

fn main() -> Result<(), SpriteError> {
    let opt = Opt::from_args();
    init_tracing(opt.debug);
    debug!("Opts: {:?}", opt);

    let st = Instant::now();
    let layout = get_layout(&opt)?;
    let strategy = get_run_strategy(&opt)?;
    let mut pipeline = load_pipeline(strategy, layout)?;
    let source = DirSource::scan(&opt.src)?.with_scale_height(opt.scale_height)?;
    info!("{} frames staged in {}", source.len(), opt.src.display());
    log_timing(&opt, st, "Scan frames and load layout");

    let sheets = SheetOut::Dir(opt.out_dir.clone());
    let track = match opt.vtt {
        Some(ref v) => TrackOut::from_str(v.clone()),
        None => TrackOut::File(opt.out_dir.join(DEFAULT_TRACK_NAME)),
    };

    // Do the main thing...
    let st = Instant::now();
    let summary = pipeline.run(source.into_frames(), &sheets, &track)?;
    log_timing(&opt, st, "Sprite generation");
    info!(
        "wrote {} sheets and {} cues",
        summary.sheets.len(),
        summary.cue_count()
    );
    Ok(())
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "spritegen=debug" } else { "spritegen=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// Log based on whether we are recording timing the time since the last
// starting point
fn log_timing(opt: &Opt, st: Instant, msg: &str) {
    if opt.timing {
        let took = Instant::now().duration_since(st);
        info!("{msg} took: {}ms", took.as_millis());
    }
}

fn get_layout(opt: &Opt) -> Result<Layout, SpriteError> {
    if let Some(ref file) = opt.layout {
        let flags_given = opt.columns.is_some()
            || opt.rows.is_some()
            || opt.interval.is_some()
            || opt.first_frame_offset.is_some()
            || opt.no_vtt;
        if flags_given {
            return Err(SpriteError::Configuration(String::from(
                "--layout cannot be combined with --columns/--rows/--interval/--first-frame-offset/--no-vtt",
            )));
        }
        return Layout::from_json_file(file);
    }
    let layout = Layout::new(
        opt.columns.unwrap_or(DEFAULT_COLUMNS),
        opt.rows.unwrap_or(DEFAULT_ROWS),
        opt.interval.unwrap_or(DEFAULT_INTERVAL_SECONDS),
        !opt.no_vtt,
    )?;
    match opt.first_frame_offset {
        Some(offset) => layout.with_first_frame_offset(offset),
        None => Ok(layout),
    }
}

fn get_run_strategy(opt: &Opt) -> Result<RunStrategy, SpriteError> {
    if opt.disable_parallel {
        return Ok(RunStrategy::Sequential);
    }
    let num_workers = if opt.num_threads == 0 {
        num_cpus::get()
    } else {
        opt.num_threads as usize
    };
    RunStrategy::new_parallel(num_workers)
}
