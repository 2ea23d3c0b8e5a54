use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("calibration needs at least {required} point pairs, got {found}")]
    InsufficientCalibrationPoints { found: usize, required: usize },

    #[error("degenerate calibration: {0}")]
    DegenerateCalibration(&'static str),

    #[error("invalid detection #{index}: {reason}")]
    InvalidDetection { index: usize, reason: &'static str },

    #[error("unknown track id {0}")]
    UnknownTrackId(u64),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
