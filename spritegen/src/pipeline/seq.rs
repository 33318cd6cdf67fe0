use tracing::debug;

use crate::batch::BatchExt;
use crate::clock::CueClock;
use crate::data::{FrameRecord, SheetOut};
use crate::pipeline::{new_track, RunSummary};
use crate::sheet::SpriteAssembler;
use crate::SpriteError;

// Reference implementation
//
// Pull a batch -> compose -> write the sheet -> append cues, all inline on the
// calling thread. The clock is handed from one batch to the next.
pub struct SeqPipeline {
    pub assembler: SpriteAssembler,
}

impl SeqPipeline {
    pub(crate) fn run_batches<I>(
        &self,
        frames: I,
        sheets: &SheetOut,
    ) -> Result<RunSummary, SpriteError>
    where
        I: Iterator<Item = Result<FrameRecord, SpriteError>>,
    {
        let layout = *self.assembler.layout();
        let mut summary = RunSummary {
            track: new_track(&layout),
            ..Default::default()
        };
        let mut clock: Option<CueClock> = None;

        for (batch_idx, batch) in frames.batches(layout.capacity())?.enumerate() {
            let batch: Vec<FrameRecord> = batch.into_iter().collect::<Result<_, _>>()?;
            if summary.track.is_some() && clock.is_none() {
                clock = batch.first().map(|fr| CueClock::start(&layout, fr.sequence_index));
            }
            debug!("assembling batch {batch_idx} ({} frames)", batch.len());
            let done = self.assembler.assemble(batch_idx, &batch, clock, sheets)?;
            clock = done.clock;
            summary.frames += done.info.frames;
            if let Some(track) = summary.track.as_mut() {
                track.append(done.cues);
            }
            summary.sheets.push(done.info);
        }
        Ok(summary)
    }
}
