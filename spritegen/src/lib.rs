use thiserror::Error;

pub const MAX_WORKERS: usize = 512;

pub mod batch;
pub mod clock;
pub mod data;
pub mod inspect;
pub mod layout;
pub mod pipeline;
pub mod sheet;
pub mod source;
pub mod strategy;
pub mod vtt;
mod util;

// One erring to rule them all...
#[derive(Error, Debug)]
pub enum SpriteError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Batch {batch} is empty")]
    EmptyBatch { batch: usize },
    #[error("Batch {batch} holds {len} frames but the grid only has {capacity} cells")]
    BatchOverflow {
        batch: usize,
        len: usize,
        capacity: usize,
    },
    #[error(
        "Frame {sequence_index} in batch {batch} is {width}x{height}, expected {expected_width}x{expected_height}"
    )]
    DimensionMismatch {
        batch: usize,
        sequence_index: u64,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("Frame {next} follows frame {prev}; sequence indices must be strictly ascending")]
    OutOfOrder { prev: u64, next: u64 },
    #[error("Could not decode frame {path}")]
    FrameDecode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Malformed cue track at line {line}: {reason}")]
    MalformedTrack { line: usize, reason: String },
    #[error("Unexpected IO error")]
    IoErr(#[from] std::io::Error),
    #[error("Image error")]
    ImageErr(#[from] image::ImageError),
    #[error("Unexpected Json error")]
    JsonErr(#[from] serde_json::Error),
    #[error("Too Many Threads")]
    TooManyThreads(usize),
    #[error("Generic threading error")]
    ThreadErr,
    #[error("Crossbeam error")]
    CrossBeamErr,
    #[error("Run cancelled")]
    Cancelled,
}

impl SpriteError {
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        SpriteError::Configuration(msg.into())
    }
}
