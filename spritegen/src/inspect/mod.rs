use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::crop_imm;
use image::{DynamicImage, RgbaImage};
use tracing::debug;

use crate::data::{Dim, Pos, Viewport};
use crate::util::ensure_dir;
use crate::vtt::CueTrack;
use crate::SpriteError;

#[derive(Debug, Clone, Copy)]
pub enum CellFormat {
    Png,
    Jpeg { quality: u8 },
}

// Crop every cue's rectangle back out of its sheet, one image per cue named by
// cue position. Lets a human eyeball that cells and times line up.
pub fn extract_cells<AP1, AP2, AP3>(
    track_fn: AP1,
    sheet_dir: AP2,
    out_dir: AP3,
    cues: Range<usize>,
    format: CellFormat,
) -> Result<usize, SpriteError>
where
    AP1: AsRef<Path>,
    AP2: AsRef<Path>,
    AP3: AsRef<Path>,
{
    let text = std::fs::read_to_string(track_fn)?;
    let track = CueTrack::parse(&text)?;
    let out_dir = out_dir.as_ref();
    ensure_dir(out_dir)?;

    // cues of one sheet are adjacent, so a single loaded sheet is enough
    let mut loaded: Option<(String, RgbaImage)> = None;
    let mut written = 0;
    for (idx, cue) in track.cues().iter().enumerate() {
        if !cues.contains(&idx) {
            continue;
        }
        if loaded.as_ref().map_or(true, |(name, _)| *name != cue.sheet) {
            let path = sheet_dir.as_ref().join(&cue.sheet);
            let img = image::open(&path)
                .map_err(|source| SpriteError::FrameDecode {
                    path: path.display().to_string(),
                    source,
                })?
                .into_rgba8();
            loaded = Some((cue.sheet.clone(), img));
        }
        let Some((_, sheet)) = loaded.as_ref() else {
            continue;
        };
        let bounds = Viewport {
            ul: Pos { x: 0, y: 0 },
            dim: Dim {
                width: sheet.width(),
                height: sheet.height(),
            },
        };
        if !bounds.contains(&cue.rect) {
            return Err(SpriteError::config(format!(
                "cue {idx} points outside {} ({}x{})",
                cue.sheet,
                sheet.width(),
                sheet.height()
            )));
        }
        let Viewport { ul, dim } = cue.rect;
        let cell = crop_imm(sheet, ul.x, ul.y, dim.width, dim.height).to_image();
        let out = write_cell(out_dir, idx, &cell, format)?;
        debug!("cue {idx} -> {}", out.display());
        written += 1;
    }
    Ok(written)
}

fn write_cell(
    out_dir: &Path,
    idx: usize,
    cell: &RgbaImage,
    format: CellFormat,
) -> Result<PathBuf, SpriteError> {
    match format {
        CellFormat::Png => {
            let path = out_dir.join(format!("{idx:05}.png"));
            cell.save(&path)?;
            Ok(path)
        }
        CellFormat::Jpeg { quality } => {
            let path = out_dir.join(format!("{idx:05}.jpg"));
            // jpeg has no alpha channel
            let rgb = DynamicImage::ImageRgba8(cell.clone()).into_rgb8();
            let mut out_file = BufWriter::new(File::create(&path)?);
            let encoder = JpegEncoder::new_with_quality(&mut out_file, quality);
            rgb.write_with_encoder(encoder)?;
            out_file.flush()?;
            Ok(path)
        }
    }
}
