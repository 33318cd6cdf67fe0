use std::io::stdout;

use tracing::{debug, info};

use crate::data::{FrameRecord, SheetOut, TrackOut};
use crate::layout::{Layout, TimestampMode};
use crate::sheet::{SheetInfo, SpriteAssembler};
use crate::strategy::RunStrategy;
use crate::util::{ensure_dir, write_text_atomic};
use crate::vtt::CueTrack;
use crate::SpriteError;

mod par;
mod seq;

// What a finished run produced
#[derive(Debug, Default)]
pub struct RunSummary {
    pub frames: usize,
    pub sheets: Vec<SheetInfo>,
    // only built when the layout asks for a cue track
    pub track: Option<CueTrack>,
}

impl RunSummary {
    pub fn cue_count(&self) -> usize {
        self.track.as_ref().map(|t| t.len()).unwrap_or(0)
    }
}

// Enum dispatch over the execution strategies; there is exactly one dispatch
// per run so the match costs nothing worth measuring.
pub enum PipelineProxy {
    Sequential(seq::SeqPipeline),
    Parallel(par::ParPipeline),
}

impl PipelineProxy {
    // Batches `frames`, writes one sheet per batch to `sheets` and, when a cue
    // track is being built, writes it once to `track` after the last batch.
    pub fn run<I>(
        &mut self,
        frames: I,
        sheets: &SheetOut,
        track: &TrackOut,
    ) -> Result<RunSummary, SpriteError>
    where
        I: IntoIterator<Item = Result<FrameRecord, SpriteError>>,
    {
        if let SheetOut::Dir(dir) = sheets {
            ensure_dir(dir)?;
        }
        let frames = in_sequence(frames.into_iter());
        let summary = match self {
            PipelineProxy::Sequential(p) => p.run_batches(frames, sheets)?,
            PipelineProxy::Parallel(p) => p.run_batches(frames, sheets)?,
        };
        info!(
            "{} frames -> {} sheets, {} cues",
            summary.frames,
            summary.sheets.len(),
            summary.cue_count()
        );
        if let Some(ref cues) = summary.track {
            write_track(cues, track)?;
        }
        Ok(summary)
    }
}

pub fn load_pipeline(strategy: RunStrategy, layout: Layout) -> Result<PipelineProxy, SpriteError> {
    let assembler = SpriteAssembler::new(layout);
    let res = match strategy {
        RunStrategy::Sequential => PipelineProxy::Sequential(seq::SeqPipeline { assembler }),
        RunStrategy::ParallelBatches { num_workers } => {
            PipelineProxy::Parallel(par::ParPipeline {
                assembler,
                num_workers,
            })
        }
    };
    Ok(res)
}

pub(crate) fn new_track(layout: &Layout) -> Option<CueTrack> {
    match layout.mode() {
        TimestampMode::RunningClock => Some(CueTrack::new()),
        TimestampMode::NameOnly => None,
    }
}

// Passes frames through, failing on the first one whose index does not
// strictly increase.
fn in_sequence<I>(frames: I) -> impl Iterator<Item = Result<FrameRecord, SpriteError>>
where
    I: Iterator<Item = Result<FrameRecord, SpriteError>>,
{
    let mut prev: Option<u64> = None;
    frames.map(move |fr| {
        let fr = fr?;
        match prev {
            Some(p) if fr.sequence_index <= p => Err(SpriteError::OutOfOrder {
                prev: p,
                next: fr.sequence_index,
            }),
            _ => {
                prev = Some(fr.sequence_index);
                Ok(fr)
            }
        }
    })
}

fn write_track(track: &CueTrack, out: &TrackOut) -> Result<(), SpriteError> {
    match out {
        TrackOut::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                ensure_dir(parent)?;
            }
            info!("Writing cue track: {}", path.display());
            write_text_atomic(path, &track.render())
        }
        TrackOut::Stdout => track.write_to(stdout().lock()),
        TrackOut::Null => {
            debug!("discarding cue track of {} cues", track.len());
            Ok(())
        }
    }
}
