// src/error.rs
//
// Error kinds of a run. Each one is terminal to the run that raised it;
// a field that fails to parse is not an error (it is stored as missing).

use std::time::Duration;
use thiserror::Error;

/// Invalid run inputs. Raised before any connection is attempted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("no serial port selected")]
    MissingPort,
    #[error("number of readings must be a whole number, got {0:?}")]
    InvalidReadingCount(String),
    #[error("number of readings must be positive, got {0}")]
    ReadingCountOutOfRange(i64),
    #[error("number of readings must be at most {max}, got {0}", max = u32::MAX)]
    ReadingCountTooLarge(String),
    #[error("stabilization time must be a number of seconds, got {0:?}")]
    InvalidDelay(String),
    #[error("stabilization time must be a finite non-negative number, got {0}")]
    DelayOutOfRange(f64),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("sample index {got} out of sequence, expected {expected}")]
    OutOfSequence { expected: u32, got: u32 },
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("calibration marker not seen after {lines} lines in {waited:?}")]
    BannerTimeout { waited: Duration, lines: usize },

    #[error("serial I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("acquisition worker stopped unexpectedly")]
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connectivity,
    Unexpected,
}

impl AcquisitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AcquisitionError::Config(_) => ErrorKind::Configuration,
            AcquisitionError::Open { .. } | AcquisitionError::BannerTimeout { .. } => {
                ErrorKind::Connectivity
            }
            AcquisitionError::Io(_)
            | AcquisitionError::Store(_)
            | AcquisitionError::Disconnected => ErrorKind::Unexpected,
        }
    }

    /// Text for the status line.
    pub fn status_message(&self) -> String {
        match self.kind() {
            ErrorKind::Configuration => format!("Error: Invalid input. {}", self),
            ErrorKind::Connectivity => "Error: Serial connection failed.".to_string(),
            ErrorKind::Unexpected => format!("Error: {}", self),
        }
    }
}
