use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use std::thread::{scope, ScopedJoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::batch::BatchExt;
use crate::clock::CueClock;
use crate::data::{FrameRecord, SheetOut};
use crate::pipeline::{new_track, RunSummary};
use crate::sheet::{AssembledBatch, SpriteAssembler};
use crate::SpriteError;

type Job = (usize, Vec<FrameRecord>, Option<CueClock>);
type Done = (usize, Result<AssembledBatch, SpriteError>);

// Batches fan out to N compositing workers
//
// The calling thread reads and batches frames and stamps each batch with the
// clock it starts at (it knows how many frames went before). Workers compose
// and write sheets in whatever order they finish. A single writer thread
// stashes early arrivals and appends cues strictly in batch order.
//
// Encoding PNGs dominates, so the reader is never the bottleneck; the job queue
// is bounded to keep decoded frames from piling up in memory.
//
// The first failing batch (in sequence order) wins: it flips `running`, the
// reader stops dispatching, idle workers drop whatever is still queued. A
// reader failure only closes the queue; batches already dispatched precede it
// and still run to completion.
pub struct ParPipeline {
    pub assembler: SpriteAssembler,
    pub num_workers: u16,
}

impl ParPipeline {
    pub(crate) fn run_batches<I>(
        &self,
        frames: I,
        sheets: &SheetOut,
    ) -> Result<RunSummary, SpriteError>
    where
        I: Iterator<Item = Result<FrameRecord, SpriteError>>,
    {
        let layout = *self.assembler.layout();
        let num_workers = self.num_workers.max(1) as usize;
        let assembler = &self.assembler;
        let running = AtomicBool::new(true);
        let running = &running;

        let (writer_answer, reader_answer, worker_answers) = scope(|s| {
            let (job_snd, job_rcv): (Sender<Job>, Receiver<Job>) =
                crossbeam_channel::bounded(num_workers * 2);
            let (done_snd, done_rcv): (Sender<Done>, Receiver<Done>) =
                crossbeam_channel::unbounded();

            let mut worker_vec = Vec::with_capacity(num_workers);
            for _ in 0..num_workers {
                let job_rcv = job_rcv.clone();
                let done_snd = done_snd.clone();
                let fut: ScopedJoinHandle<()> = s.spawn(move || {
                    while let Ok((batch_idx, batch, clock)) = job_rcv.recv() {
                        if !running.load(SeqCst) {
                            // cancelled; drain without working
                            continue;
                        }
                        let res = assembler.assemble(batch_idx, &batch, clock, sheets);
                        if let Err(ref e) = res {
                            warn!("batch {batch_idx} failed, cancelling run: {e}");
                            running.store(false, SeqCst);
                        }
                        if done_snd.send((batch_idx, res)).is_err() {
                            // writer already gave up
                            running.store(false, SeqCst);
                        }
                    }
                });
                worker_vec.push(fut);
            }
            // only the workers hold these now
            drop(job_rcv);
            drop(done_snd);

            // writer thread
            let writer = s.spawn(move || -> Result<RunSummary, SpriteError> {
                let mut summary = RunSummary {
                    track: new_track(&layout),
                    ..Default::default()
                };
                let mut stash = BTreeMap::new();
                let mut next_batch = 0usize;

                while let Ok((batch_idx, res)) = done_rcv.recv() {
                    stash.insert(batch_idx, res);
                    while let Some(res) = stash.remove(&next_batch) {
                        let done = match res {
                            Ok(done) => done,
                            Err(e) => {
                                running.store(false, SeqCst);
                                return Err(e);
                            }
                        };
                        summary.frames += done.info.frames;
                        if let Some(track) = summary.track.as_mut() {
                            track.append(done.cues);
                        }
                        summary.sheets.push(done.info);
                        next_batch += 1;
                    }
                }
                // every worker is gone; anything left means a gap in the sequence
                match stash.into_values().find_map(|r| r.err()) {
                    Some(e) => Err(e),
                    None if running.load(SeqCst) => Ok(summary),
                    None => Err(SpriteError::Cancelled),
                }
            });

            // reader, on the calling thread
            let reader = (|| -> Result<(), SpriteError> {
                let mut clock: Option<CueClock> = None;
                let wants_cues = new_track(&layout).is_some();
                for (batch_idx, batch) in frames.batches(layout.capacity())?.enumerate() {
                    let batch: Vec<FrameRecord> = batch.into_iter().collect::<Result<_, _>>()?;
                    if !running.load(SeqCst) {
                        return Err(SpriteError::Cancelled);
                    }
                    if wants_cues && clock.is_none() {
                        clock = batch.first().map(|fr| CueClock::start(&layout, fr.sequence_index));
                    }
                    let starts_at = clock;
                    clock = clock.map(|c| c.skip(batch.len()));
                    debug!("dispatching batch {batch_idx} ({} frames)", batch.len());
                    job_snd
                        .send((batch_idx, batch, starts_at))
                        .map_err(|_| SpriteError::CrossBeamErr)?;
                }
                Ok(())
            })();
            if let Err(ref e) = reader {
                warn!("reader stopped: {e}");
            }
            // closing the queue lets the workers, then the writer, wind down
            drop(job_snd);

            let worker_answers: Vec<_> = worker_vec.into_iter().map(|j| j.join()).collect();
            let writer_answer = writer.join();
            (writer_answer, reader, worker_answers)
        });

        if worker_answers.iter().any(|a| a.is_err()) {
            return Err(SpriteError::ThreadErr);
        }
        let summary = writer_answer.map_err(|_| SpriteError::ThreadErr)?;
        match (summary, reader_answer) {
            // errors from dispatched batches precede anything the reader hit later
            (Err(SpriteError::Cancelled), Err(e)) => Err(e),
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(summary), Ok(())) => Ok(summary),
        }
    }
}
