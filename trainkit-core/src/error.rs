//! Error types for the trainkit-core crate.

use thiserror::Error;

/// Top-level error type for trainkit operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("number of accelerators specified={requested}, more than accelerators available={available}")]
    DeviceCount { requested: usize, available: usize },

    #[error("device '{0}' is listed more than once")]
    DuplicateDevice(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Run directory error: {0}")]
    RunDir(String),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("Settings error: {0}")]
    Settings(#[from] Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    pub fn run_dir(msg: impl Into<String>) -> Self {
        Self::RunDir(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_count_message_reports_both_numbers() {
        let err = Error::DeviceCount {
            requested: 4,
            available: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("specified=4"));
        assert!(msg.contains("available=2"));
    }

    #[test]
    fn test_io_error_converts() {
        fn fails() -> Result<()> {
            std::fs::read("/definitely/not/here")?;
            Ok(())
        }
        assert!(matches!(fails(), Err(Error::Io(_))));
    }
}
