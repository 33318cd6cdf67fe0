use std::path::PathBuf;

use image::RgbaImage;
use serde::Deserialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub struct Dim {
    pub width: u32,
    pub height: u32,
}

impl Dim {
    pub const fn calc_area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    // Scale both axes by a whole number of cells
    pub const fn times(&self, columns: u32, rows: u32) -> Dim {
        Dim {
            width: self.width * columns,
            height: self.height * rows,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub struct Pos {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub struct Viewport {
    // upper left
    pub ul: Pos,
    // height/width
    pub dim: Dim,
}

impl Viewport {
    // right and bottom edges, widened so untrusted rects cannot wrap
    fn far_edges(&self) -> (u64, u64) {
        (
            self.ul.x as u64 + self.dim.width as u64,
            self.ul.y as u64 + self.dim.height as u64,
        )
    }

    pub fn contains(&self, other: &Viewport) -> bool {
        let (right, bottom) = self.far_edges();
        let (o_right, o_bottom) = other.far_edges();
        other.ul.x >= self.ul.x && other.ul.y >= self.ul.y && o_right <= right && o_bottom <= bottom
    }

    pub fn overlaps(&self, other: &Viewport) -> bool {
        let (right, bottom) = self.far_edges();
        let (o_right, o_bottom) = other.far_edges();
        (self.ul.x as u64) < o_right
            && (other.ul.x as u64) < right
            && (self.ul.y as u64) < o_bottom
            && (other.ul.y as u64) < bottom
    }
}

// One decoded preview frame and its position in the extracted sequence
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub image: RgbaImage,
    pub sequence_index: u64,
}

impl FrameRecord {
    pub fn new(image: RgbaImage, sequence_index: u64) -> Self {
        Self {
            image,
            sequence_index,
        }
    }

    pub fn dim(&self) -> Dim {
        let (width, height) = self.image.dimensions();
        Dim { width, height }
    }

    // Nominal capture time, in milliseconds
    pub fn capture_ms(&self, frame_interval_ms: u64) -> u64 {
        self.sequence_index * frame_interval_ms
    }
}

// Where finished sprite sheets go
#[derive(Debug, Clone)]
pub enum SheetOut {
    Dir(PathBuf),
    Null,
}

// Where the cue track goes once the run completes
#[derive(Debug, Clone)]
pub enum TrackOut {
    File(PathBuf),
    Stdout,
    Null,
}

impl TrackOut {
    pub fn from_str(uri: String) -> Self {
        if uri == "-" {
            TrackOut::Stdout
        } else {
            TrackOut::File(PathBuf::from(uri))
        }
    }
}
