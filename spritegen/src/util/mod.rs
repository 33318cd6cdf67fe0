use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::RgbaImage;
use ulid::Ulid;

use crate::SpriteError;

// Encode next to the destination, then rename over it. A failed encode leaves
// neither a truncated target nor the temp file behind.
pub(crate) fn write_png_atomic(
    dir: &Path,
    name: &str,
    image: &RgbaImage,
) -> Result<PathBuf, SpriteError> {
    let target = dir.join(name);
    let tmp = dir.join(format!(".{name}.{}.tmp", Ulid::new()));
    match encode_png(&tmp, image) {
        Ok(()) => {
            if let Err(e) = std::fs::rename(&tmp, &target) {
                let _ = std::fs::remove_file(&tmp);
                return Err(SpriteError::IoErr(e));
            }
            Ok(target)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            Err(e)
        }
    }
}

fn encode_png(path: &Path, image: &RgbaImage) -> Result<(), SpriteError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    image.write_with_encoder(PngEncoder::new(&mut writer))?;
    let file = writer.into_inner().map_err(|e| SpriteError::IoErr(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}

// Same dance for text output (the cue track)
pub(crate) fn write_text_atomic(target: &Path, text: &str) -> Result<(), SpriteError> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = target
        .file_name()
        .ok_or_else(|| SpriteError::config(format!("{} is not a file path", target.display())))?;
    let tmp = dir.join(format!(".{}.{}.tmp", name.to_string_lossy(), Ulid::new()));
    let res = (|| -> Result<(), SpriteError> {
        let mut f = File::create(&tmp)?;
        f.write_all(text.as_bytes())?;
        f.sync_all()?;
        std::fs::rename(&tmp, target)?;
        Ok(())
    })();
    if res.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    res
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<(), SpriteError> {
    match std::fs::metadata(dir) {
        Ok(md) if md.is_dir() => Ok(()),
        Ok(_) => Err(SpriteError::config(format!(
            "{} exists and is not a directory",
            dir.display()
        ))),
        Err(_) => {
            std::fs::create_dir_all(dir)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Rgba;

    #[test]
    fn png_lands_without_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let path = write_png_atomic(dir.path(), "10.png", &img).unwrap();
        assert_eq!(path, dir.path().join("10.png"));
        let back = image::open(&path).unwrap().into_rgba8();
        assert_eq!(back, img);
        let names: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let img = RgbaImage::new(1, 1);
        assert!(matches!(
            write_png_atomic(&missing, "5.png", &img),
            Err(SpriteError::IoErr(_))
        ));
        assert!(!missing.join("5.png").exists());
    }

    #[test]
    fn text_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("previews.vtt");
        std::fs::write(&target, "old").unwrap();
        write_text_atomic(&target, "WEBVTT\n\n").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "WEBVTT\n\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn ensure_dir_creates_and_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        let file = dir.path().join("f");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(ensure_dir(&file), Err(SpriteError::Configuration(_))));
    }
}
