//! gammaroi-algorithms: ROI boundary search and peak grouping.
//!
//! This crate provides:
//! - **ROI search** - four-phase statistical walk outward from a peak
//! - **Spectroscopic extent** - usable channel range of a spectrum
//! - **Peak sets** - causal connectivity and joint-fit grouping
//!
#![warn(missing_docs)]

mod error;
mod extent;
pub mod peak_set;
mod roi;

pub use error::{Result, RoiError};
pub use extent::spectroscopic_extent;
pub use peak_set::{
    causally_connected, causally_disconnected, group_causally_connected, share_continuum,
};
pub use roi::{
    find_roi_limit, find_roi_range, find_roi_ranges, prepare_roi, RoiPrepConfig,
    RoiSearchConfig, SearchDirection, DEFAULT_ANCHOR_LIMIT_NSIGMA, DEFAULT_AVERAGE_WINDOW,
    DEFAULT_EXTENT_GUARD_FRACTION, DEFAULT_GAUSSIAN_MIN_COUNTS, DEFAULT_HIGH_RES_MIN_CHANNELS,
    DEFAULT_MAX_NSIGMA, DEFAULT_MIN_NSIGMA, DEFAULT_POISSON_LOWER_QUANTILE,
    DEFAULT_POISSON_UPPER_QUANTILE, DEFAULT_REFINE_BAND_NSIGMA, DEFAULT_SAFETY_MARGIN,
    DEFAULT_SKEW_BAND_START_NSIGMA, DEFAULT_SKEW_CLAMP_NSIGMA, DEFAULT_SKEW_TEST_NSIGMA,
    DEFAULT_SLOPE_FIT_CHANNELS, DEFAULT_START_NSIGMA, MIN_ROI_CHANNELS,
};

// Re-export the model types the search operates on
pub use gammaroi_core::{Continuum, Peak, Spectrum};
