use image::imageops::replace;
use image::RgbaImage;
use tracing::{debug, info};

use crate::clock::CueClock;
use crate::data::{Dim, FrameRecord, SheetOut};
use crate::layout::Layout;
use crate::util::write_png_atomic;
use crate::vtt::Cue;
use crate::SpriteError;

// "<seconds>.png", whole seconds printed bare, fractions without trailing zeros
pub fn sheet_name(timestamp_ms: u64) -> String {
    let secs = timestamp_ms / 1000;
    let millis = timestamp_ms % 1000;
    if millis == 0 {
        format!("{secs}.png")
    } else {
        let frac = format!("{millis:03}");
        format!("{secs}.{}.png", frac.trim_end_matches('0'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub batch: usize,
    pub name: String,
    pub frames: usize,
    pub dim: Dim,
    pub first_sequence_index: u64,
    pub last_sequence_index: u64,
}

// Everything one batch contributes to the run
#[derive(Debug)]
pub struct AssembledBatch {
    pub info: SheetInfo,
    pub cues: Vec<Cue>,
    // running clock after this batch; None when no cue track is being built
    pub clock: Option<CueClock>,
}

// Composites one batch of frames into a grid sheet and derives its cues
#[derive(Debug, Clone, Copy)]
pub struct SpriteAssembler {
    layout: Layout,
}

impl SpriteAssembler {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    // Validate the batch and draw it. Nothing touches storage here, so a bad
    // frame can never produce a half-written sheet.
    pub fn compose(&self, batch: usize, frames: &[FrameRecord]) -> Result<RgbaImage, SpriteError> {
        let first = frames.first().ok_or(SpriteError::EmptyBatch { batch })?;
        let capacity = self.layout.capacity();
        if frames.len() > capacity {
            return Err(SpriteError::BatchOverflow {
                batch,
                len: frames.len(),
                capacity,
            });
        }
        let frame_dim = first.dim();
        if frame_dim.calc_area() == 0 {
            return Err(SpriteError::config(format!(
                "frame {} in batch {batch} has no pixels",
                first.sequence_index
            )));
        }
        if let Some(bad) = frames.iter().find(|fr| fr.dim() != frame_dim) {
            let Dim { width, height } = bad.dim();
            return Err(SpriteError::DimensionMismatch {
                batch,
                sequence_index: bad.sequence_index,
                width,
                height,
                expected_width: frame_dim.width,
                expected_height: frame_dim.height,
            });
        }

        let sheet_dim = self.layout.sheet_dim(frame_dim);
        // zeroed RGBA, so unused cells stay transparent
        let mut sheet = RgbaImage::new(sheet_dim.width, sheet_dim.height);
        for (k, fr) in frames.iter().enumerate() {
            let cell = self.layout.cell_viewport(k, frame_dim);
            replace(&mut sheet, &fr.image, cell.ul.x as i64, cell.ul.y as i64);
        }
        Ok(sheet)
    }

    // Cues for a batch whose sheet is `name`, starting at `clock`
    pub fn cues(
        &self,
        name: &str,
        frames: &[FrameRecord],
        mut clock: CueClock,
    ) -> (Vec<Cue>, CueClock) {
        let cues = frames
            .iter()
            .enumerate()
            .map(|(k, fr)| {
                let cue = Cue {
                    span: clock.tick(),
                    sheet: name.to_string(),
                    rect: self.layout.cell_viewport(k, fr.dim()),
                };
                debug!("cue {} -> {}", fr.sequence_index, cue.fragment());
                cue
            })
            .collect();
        (cues, clock)
    }

    pub fn assemble(
        &self,
        batch: usize,
        frames: &[FrameRecord],
        clock: Option<CueClock>,
        out: &SheetOut,
    ) -> Result<AssembledBatch, SpriteError> {
        let sheet = self.compose(batch, frames)?;
        // compose guarantees at least one frame
        let (first, last) = match (frames.first(), frames.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Err(SpriteError::EmptyBatch { batch }),
        };
        let name = sheet_name(last.capture_ms(self.layout.frame_interval_ms()));

        match out {
            SheetOut::Dir(dir) => {
                info!("Writing sprite: {name}");
                write_png_atomic(dir, &name, &sheet)?;
            }
            SheetOut::Null => {}
        }

        let (cues, clock) = match clock {
            Some(clock) => {
                let (cues, clock) = self.cues(&name, frames, clock);
                (cues, Some(clock))
            }
            None => (Vec::new(), None),
        };

        Ok(AssembledBatch {
            info: SheetInfo {
                batch,
                name,
                frames: frames.len(),
                dim: Dim {
                    width: sheet.width(),
                    height: sheet.height(),
                },
                first_sequence_index: first.sequence_index,
                last_sequence_index: last.sequence_index,
            },
            cues,
            clock,
        })
    }
}
