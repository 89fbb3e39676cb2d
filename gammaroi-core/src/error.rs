//! Error types for gammaroi-core.

use thiserror::Error;

/// Result type alias for gammaroi operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for spectrum, continuum and peak operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The caller violated an operation's contract.
    ///
    /// Wrong-length continuum parameters, polynomial operations on a
    /// `NoOffset`/`External` continuum, Gaussian operations on a
    /// data-defined peak.
    #[error("usage error: {0}")]
    Usage(String),

    /// The spectrum does not have enough channels for the operation.
    #[error("insufficient data: spectrum has {channels} channels, at least {required} required")]
    InsufficientData { channels: usize, required: usize },

    /// Spectrum construction was given inconsistent input.
    #[error("invalid spectrum: {0}")]
    InvalidSpectrum(String),
}

impl Error {
    pub(crate) fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::InsufficientData {
            channels: 64,
            required: 128,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data: spectrum has 64 channels, at least 128 required"
        );
        assert_eq!(
            Error::usage("bad order").to_string(),
            "usage error: bad order"
        );
    }
}
