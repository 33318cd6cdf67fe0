use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use crate::data::{Dim, Pos, Viewport};
use crate::SpriteError;

// Upper bound on a single grid axis; a 64x64 sheet of thumbnails is already absurd
const MAX_GRID_AXIS: u32 = 64;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutJson {
    pub columns: u32,
    pub rows: u32,
    pub frame_interval_seconds: f64,
    pub emit_cue_track: bool,
    // defaults to one interval before the first frame
    #[serde(default)]
    pub first_frame_offset_seconds: Option<f64>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimestampMode {
    // gapless clock across the whole run, one cue per frame
    RunningClock,
    // timestamps only name the sheets
    NameOnly,
}

// Validated grid shape and timing shared by every batch of a run
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Layout {
    columns: u32,
    rows: u32,
    frame_interval_ms: u64,
    first_frame_offset_ms: i64,
    emit_cue_track: bool,
}

pub(crate) fn seconds_to_ms(field: &str, secs: f64) -> Result<i64, SpriteError> {
    if !secs.is_finite() {
        return Err(SpriteError::config(format!("{field} must be a finite number")));
    }
    let ms = (secs * 1000.0).round();
    if ms.abs() > i64::MAX as f64 / 2.0 {
        return Err(SpriteError::config(format!("{field} is out of range")));
    }
    Ok(ms as i64)
}

impl Layout {
    pub fn new(
        columns: u32,
        rows: u32,
        frame_interval_seconds: f64,
        emit_cue_track: bool,
    ) -> Result<Self, SpriteError> {
        if columns == 0 || rows == 0 {
            return Err(SpriteError::config(format!(
                "grid must be at least 1x1, got {columns}x{rows}"
            )));
        }
        if columns > MAX_GRID_AXIS || rows > MAX_GRID_AXIS {
            return Err(SpriteError::config(format!(
                "grid {columns}x{rows} exceeds {MAX_GRID_AXIS} cells per axis"
            )));
        }
        let interval = seconds_to_ms("frame interval", frame_interval_seconds)?;
        if interval <= 0 {
            return Err(SpriteError::config(format!(
                "frame interval must be at least 1ms, got {frame_interval_seconds}s"
            )));
        }
        Ok(Self {
            columns,
            rows,
            frame_interval_ms: interval as u64,
            first_frame_offset_ms: -interval,
            emit_cue_track,
        })
    }

    pub fn with_first_frame_offset(mut self, offset_seconds: f64) -> Result<Self, SpriteError> {
        self.first_frame_offset_ms = seconds_to_ms("first frame offset", offset_seconds)?;
        Ok(self)
    }

    pub fn from_json_file<AP>(file_name: AP) -> Result<Self, SpriteError>
    where
        AP: AsRef<Path>,
    {
        let fh = std::fs::File::open(file_name)?;
        Self::from_json_rdr(fh)
    }

    pub fn from_json_rdr(rdr: impl Read) -> Result<Self, SpriteError> {
        let buf_rdr = BufReader::with_capacity(16384, rdr);
        let json: LayoutJson = serde_json::from_reader(buf_rdr)?;
        json.try_into()
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn capacity(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    pub fn frame_interval_ms(&self) -> u64 {
        self.frame_interval_ms
    }

    pub fn first_frame_offset_ms(&self) -> i64 {
        self.first_frame_offset_ms
    }

    pub fn mode(&self) -> TimestampMode {
        if self.emit_cue_track {
            TimestampMode::RunningClock
        } else {
            TimestampMode::NameOnly
        }
    }

    pub fn sheet_dim(&self, frame: Dim) -> Dim {
        frame.times(self.columns, self.rows)
    }

    // Row-major cell of the k-th frame in a batch
    pub fn cell(&self, k: usize) -> Pos {
        let k = k as u32;
        Pos {
            x: k % self.columns,
            y: k / self.columns,
        }
    }

    // Pixel rectangle of the k-th frame within its sheet
    pub fn cell_viewport(&self, k: usize, frame: Dim) -> Viewport {
        let cell = self.cell(k);
        Viewport {
            ul: Pos {
                x: cell.x * frame.width,
                y: cell.y * frame.height,
            },
            dim: frame,
        }
    }
}

impl TryFrom<LayoutJson> for Layout {
    type Error = SpriteError;

    fn try_from(json: LayoutJson) -> Result<Self, SpriteError> {
        let layout = Layout::new(
            json.columns,
            json.rows,
            json.frame_interval_seconds,
            json.emit_cue_track,
        )?;
        match json.first_frame_offset_seconds {
            Some(offset) => layout.with_first_frame_offset(offset),
            None => Ok(layout),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reference_layout() {
        let l = Layout::new(3, 4, 5.0, true).unwrap();
        assert_eq!(l.capacity(), 12);
        assert_eq!(l.frame_interval_ms(), 5000);
        assert_eq!(l.first_frame_offset_ms(), -5000);
        assert_eq!(l.mode(), TimestampMode::RunningClock);
        let frame = Dim {
            width: 426,
            height: 240,
        };
        assert_eq!(
            l.sheet_dim(frame),
            Dim {
                width: 1278,
                height: 960
            }
        );
    }

    #[test]
    fn cells_are_row_major_and_disjoint() {
        let l = Layout::new(3, 4, 5.0, true).unwrap();
        let frame = Dim {
            width: 16,
            height: 9,
        };
        let sheet = Viewport {
            ul: Pos { x: 0, y: 0 },
            dim: l.sheet_dim(frame),
        };
        let cells: Vec<Viewport> = (0..l.capacity()).map(|k| l.cell_viewport(k, frame)).collect();
        for (k, c) in cells.iter().enumerate() {
            assert_eq!(l.cell(k), Pos { x: k as u32 % 3, y: k as u32 / 3 });
            assert!(sheet.contains(c));
            for other in cells.iter().skip(k + 1) {
                assert!(!c.overlaps(other));
            }
        }
        assert_eq!(cells[4].ul, Pos { x: 16, y: 9 });
        assert_eq!(cells[11].ul, Pos { x: 32, y: 27 });
    }

    #[test]
    fn rejects_bad_config() {
        assert!(matches!(
            Layout::new(0, 4, 5.0, true),
            Err(SpriteError::Configuration(_))
        ));
        assert!(matches!(
            Layout::new(3, 0, 5.0, true),
            Err(SpriteError::Configuration(_))
        ));
        assert!(Layout::new(3, 4, 0.0, true).is_err());
        assert!(Layout::new(3, 4, -5.0, true).is_err());
        assert!(Layout::new(3, 4, f64::NAN, true).is_err());
        assert!(Layout::new(3, 4, 0.0001, true).is_err());
    }

    #[test]
    fn parse_json() {
        let json = r#"{"columns": 5, "rows": 2, "frame_interval_seconds": 2.5, "emit_cue_track": false}"#;
        let l = Layout::from_json_rdr(json.as_bytes()).unwrap();
        assert_eq!(l.capacity(), 10);
        assert_eq!(l.frame_interval_ms(), 2500);
        assert_eq!(l.first_frame_offset_ms(), -2500);
        assert_eq!(l.mode(), TimestampMode::NameOnly);

        let json = r#"{"columns": 3, "rows": 4, "frame_interval_seconds": 5,
            "emit_cue_track": true, "first_frame_offset_seconds": 0}"#;
        let l = Layout::from_json_rdr(json.as_bytes()).unwrap();
        assert_eq!(l.first_frame_offset_ms(), 0);

        let json = r#"{"columns": 3, "rows": 4, "frame_interval_seconds": 5}"#;
        assert!(matches!(
            Layout::from_json_rdr(json.as_bytes()),
            Err(SpriteError::JsonErr(_))
        ));
    }
}
