//! Error types for ROI search and peak grouping.

use thiserror::Error;

/// Errors raised by the ROI boundary search.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoiError {
    /// Propagated from the spectrum/peak model.
    #[error(transparent)]
    Core(#[from] gammaroi_core::Error),

    /// Boundary search only applies to Gaussian-defined peaks.
    #[error("ROI search is not defined for data-defined peaks")]
    DataDefinedPeak,

    /// The peak's width cannot anchor a search.
    #[error("peak sigma must be positive and finite, got {0}")]
    InvalidSigma(f64),
}

/// Result alias for ROI operations.
pub type Result<T> = std::result::Result<T, RoiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_is_transparent() {
        let core = gammaroi_core::Error::InsufficientData {
            channels: 64,
            required: 128,
        };
        let err = RoiError::from(core.clone());
        assert_eq!(err.to_string(), core.to_string());
        assert_eq!(err, RoiError::Core(core));
    }
}
