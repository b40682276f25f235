use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported raster: {channels} channels (expected 1, 2, 3 or 4)")]
    UnsupportedRaster { channels: u8 },

    #[error("Raster buffer holds {actual} bytes, expected {expected} for {width}x{height}x{channels}")]
    RasterSize {
        width: u32,
        height: u32,
        channels: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Classifier error: {0}")]
    Classifier(String),
}

pub type Result<T> = std::result::Result<T, Error>;
