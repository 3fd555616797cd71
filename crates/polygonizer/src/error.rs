use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolygonizerError {
    #[error("Pixel buffer too short: expected at least {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Unsupported image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Empty data: no jobs were submitted")]
    EmptyBatch,

    #[error("Job {index} failed: {message}")]
    Worker { index: usize, message: String },

    #[error("Job {index} panicked inside its worker")]
    WorkerPanicked { index: usize },

    #[error("Worker pool channel closed unexpectedly")]
    PoolClosed,

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Invalid setting: {0}")]
    Setting(#[from] polygonizer_common::SettingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PolygonizerError>;
