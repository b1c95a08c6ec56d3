//! Error taxonomy for the suitability engine and its collaborators.

use crate::raster::Unit;

/// Everything that can fail a single criterion's pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SuitabilityError {
    /// A cell inside the analysis region holds NaN.
    #[error("invalid input: cell ({row}, {col}) is not a number")]
    InvalidInput { row: usize, col: usize },

    /// A breakpoint table cannot partition the value domain.
    #[error("malformed rule: {0}")]
    MalformedRule(String),

    /// The source raster has no valid cell inside the analysis region.
    #[error("raster has no cells inside the analysis region")]
    EmptyRaster,

    /// The layer's unit does not match the unit the rule table was written for.
    #[error("unit mismatch: rule expects {expected}, raster is {found}")]
    UnitMismatch { expected: Unit, found: Unit },

    /// A classified cell carries a value outside the ordinal class set.
    #[error("class value {value} is outside the suitability scale 1..=4")]
    ClassOutOfRange { value: u8 },

    /// Raster data does not agree with its declared shape or with a sibling raster.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("region not found: {0}")]
    RegionNotFound(String),

    #[error("data source unavailable: {0}")]
    Unavailable(String),

    #[error("export quota exceeded: {pixels} pixels requested, limit is {max_pixels}")]
    QuotaExceeded { pixels: u64, max_pixels: u64 },

    #[error("invalid export destination: {0}")]
    InvalidDestination(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SuitabilityError {
    /// Whether the caller may reasonably retry the failed call with backoff.
    ///
    /// Classification errors point at a config or logic defect and are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SuitabilityError::Unavailable(_) | SuitabilityError::QuotaExceeded { .. }
        )
    }

    /// Errors raised by an external collaborator rather than the local core.
    pub fn is_collaborator_error(&self) -> bool {
        matches!(
            self,
            SuitabilityError::DatasetNotFound(_)
                | SuitabilityError::RegionNotFound(_)
                | SuitabilityError::Unavailable(_)
                | SuitabilityError::QuotaExceeded { .. }
                | SuitabilityError::InvalidDestination(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SuitabilityError>;
