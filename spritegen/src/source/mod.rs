use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::imageops::{resize, FilterType};
use tracing::debug;

use crate::data::FrameRecord;
use crate::SpriteError;

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

// Trailing digits of the file stem: "preview_00007.png" -> 7
pub fn parse_sequence_index<AP: AsRef<Path>>(path: AP) -> Option<u64> {
    let stem = path.as_ref().file_stem()?.to_str()?;
    let digits_at = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    stem[digits_at..].parse().ok()
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

// Extracted frames staged as numbered image files in one directory.
//
// Enumeration happens up front (cheap), decoding happens one frame at a time
// as the pipeline pulls.
#[derive(Debug, Clone)]
pub struct DirSource {
    entries: Vec<(u64, PathBuf)>,
    scale_height: Option<u32>,
}

impl DirSource {
    pub fn scan<AP: AsRef<Path>>(dir: AP) -> Result<Self, SpriteError> {
        let dir = dir.as_ref();
        let mut by_index = BTreeMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !is_frame_file(&path) {
                continue;
            }
            let idx = parse_sequence_index(&path).ok_or_else(|| {
                SpriteError::config(format!(
                    "frame file {} has no numeric sequence suffix",
                    path.display()
                ))
            })?;
            if let Some(prev) = by_index.insert(idx, path.clone()) {
                return Err(SpriteError::config(format!(
                    "frame files {} and {} share sequence index {idx}",
                    prev.display(),
                    path.display()
                )));
            }
        }
        debug!("found {} frames in {}", by_index.len(), dir.display());
        Ok(Self {
            entries: by_index.into_iter().collect(),
            scale_height: None,
        })
    }

    // Rescale every frame to this height, keeping the aspect ratio
    pub fn with_scale_height(mut self, height: Option<u32>) -> Result<Self, SpriteError> {
        if height == Some(0) {
            return Err(SpriteError::config("scale height must be positive"));
        }
        self.scale_height = height;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_frames(self) -> impl Iterator<Item = Result<FrameRecord, SpriteError>> {
        let scale_height = self.scale_height;
        self.entries
            .into_iter()
            .map(move |(idx, path)| load_frame(&path, idx, scale_height))
    }
}

pub fn load_frame(
    path: &Path,
    sequence_index: u64,
    scale_height: Option<u32>,
) -> Result<FrameRecord, SpriteError> {
    let image = image::open(path)
        .map_err(|source| SpriteError::FrameDecode {
            path: path.display().to_string(),
            source,
        })?
        .into_rgba8();
    let image = match scale_height {
        Some(h) if h != image.height() => {
            let w = (image.width() as u64 * h as u64 + image.height() as u64 / 2)
                / image.height() as u64;
            resize(&image, (w as u32).max(1), h, FilterType::Triangle)
        }
        _ => image,
    };
    Ok(FrameRecord::new(image, sequence_index))
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn stage(dir: &Path, name: &str, w: u32, h: u32) {
        RgbaImage::from_pixel(w, h, Rgba([9, 9, 9, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn sequence_suffixes() {
        assert_eq!(parse_sequence_index("output_x240_00007.png"), Some(7));
        assert_eq!(parse_sequence_index("scaled/preview-00012.png"), Some(12));
        assert_eq!(parse_sequence_index("42.jpg"), Some(42));
        assert_eq!(parse_sequence_index("cover.png"), None);
        assert_eq!(parse_sequence_index("x_7a.png"), None);
    }

    #[test]
    fn scan_sorts_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for i in [10, 2, 1, 11] {
            stage(dir.path(), &format!("output_x240_{i}.png"), 4, 2);
        }
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();
        let src = DirSource::scan(dir.path()).unwrap();
        assert_eq!(src.len(), 4);
        let idx: Vec<u64> = src
            .into_frames()
            .map(|f| f.unwrap().sequence_index)
            .collect();
        assert_eq!(idx, vec![1, 2, 10, 11]);
    }

    #[test]
    fn scan_rejects_unnumbered_and_duplicate_frames() {
        let dir = tempfile::tempdir().unwrap();
        stage(dir.path(), "poster.png", 2, 2);
        assert!(matches!(
            DirSource::scan(dir.path()),
            Err(SpriteError::Configuration(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        stage(dir.path(), "a_3.png", 2, 2);
        stage(dir.path(), "b_003.png", 2, 2);
        assert!(matches!(
            DirSource::scan(dir.path()),
            Err(SpriteError::Configuration(_))
        ));
    }

    #[test]
    fn rescales_to_height() {
        let dir = tempfile::tempdir().unwrap();
        stage(dir.path(), "f_1.png", 64, 36);
        let src = DirSource::scan(dir.path())
            .unwrap()
            .with_scale_height(Some(18))
            .unwrap();
        let fr = src.into_frames().next().unwrap().unwrap();
        assert_eq!(fr.image.dimensions(), (32, 18));
    }

    #[test]
    fn undecodable_frame_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f_1.png"), b"not a png").unwrap();
        let err = DirSource::scan(dir.path())
            .unwrap()
            .into_frames()
            .next()
            .unwrap()
            .unwrap_err();
        match err {
            SpriteError::FrameDecode { path, .. } => assert!(path.ends_with("f_1.png")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
