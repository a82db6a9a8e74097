//! Error types.
//!
//! Two layers:
//!
//! - typed core errors (`ScalingError`, `FitError`) returned by the numerical
//!   engines, so callers can match on the failure and pick a fallback
//! - `AppError`, the process-level error carrying an exit code, used by the
//!   binary and the I/O glue
//!
//! Exit codes:
//! - `2`: invalid input or I/O failure
//! - `3`: no foreground voxels / not enough data to fit
//! - `4`: numeric degeneracy

use thiserror::Error;

/// Failures of the Statistics Engine and the Remap Deriver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScalingError {
    /// No voxel carried a foreground label (label > 0).
    #[error("no foreground voxels: every voxel is labelled background")]
    EmptyForeground,

    /// The foreground intensity range has zero width (`max == min`).
    #[error("degenerate foreground range: min == max == {value}")]
    DegenerateRange { value: f64 },

    /// Volume and label grid do not have the same shape.
    #[error("volume shape {volume:?} does not match label shape {labels:?}")]
    ShapeMismatch { volume: [usize; 3], labels: [usize; 3] },

    /// The requested output range is empty, inverted or non-finite.
    #[error("invalid target range [{low}, {high}]")]
    InvalidTargetRange { low: f64, high: f64 },

    /// Threshold count or histogram size outside the supported range.
    #[error("invalid segmentation: {thresholds} threshold(s) over {bins} histogram bins")]
    InvalidSegmentation { thresholds: usize, bins: usize },

    /// More thresholds than `u8` labels can distinguish.
    #[error("{thresholds} thresholds exceed the 255 available foreground labels")]
    TooManyClasses { thresholds: usize },
}

/// Failures of the Fit Engine for a single dataset.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Fewer observations than free parameters.
    #[error("underdetermined fit: {observations} observation(s) for {parameters} parameters")]
    Underdetermined { observations: usize, parameters: usize },

    /// An observation contains a non-finite signal, timing or flip angle.
    #[error("observation {index} contains a non-finite value")]
    InvalidObservation { index: usize },

    /// Lower bound above upper bound, or a non-finite lower bound.
    #[error("invalid parameter bounds")]
    InvalidBounds,
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<ScalingError> for AppError {
    fn from(err: ScalingError) -> Self {
        let exit_code = match err {
            ScalingError::EmptyForeground => 3,
            ScalingError::DegenerateRange { .. } => 4,
            ScalingError::ShapeMismatch { .. }
            | ScalingError::InvalidTargetRange { .. }
            | ScalingError::InvalidSegmentation { .. }
            | ScalingError::TooManyClasses { .. } => 2,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match err {
            FitError::Underdetermined { .. } => 3,
            FitError::InvalidObservation { .. } | FitError::InvalidBounds => 2,
        };
        AppError::new(exit_code, err.to_string())
    }
}
