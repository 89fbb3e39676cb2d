//! gammaroi-core: Peak-shape and continuum types for gamma-ray spectroscopy.
//!
//! This crate provides the binned spectrum, the background continuum model,
//! the Gaussian (plus optional low-energy tail) peak model, and the counting
//! statistics the ROI search builds on.
//!

pub mod continuum;
pub mod error;
pub mod peak;
pub mod skew;
pub mod source;
pub mod spectrum;
pub mod stats;

pub use continuum::{
    linear_continuum_from_sidebands, offset_eqn_integral, Continuum, OffsetType,
    SidebandEstimate,
};
pub use error::{Error, Result};
pub use peak::{CoefficientType, Peak, PeakShape, FWHM_PER_SIGMA};
pub use skew::{exgauss_tail_integral, landau_cdf, landau_integral, SkewType};
pub use source::{SourceKind, SourceMatch};
pub use spectrum::Spectrum;
pub use stats::{
    is_statistically_greater_or_equal, normal_cdf, normal_interval, poisson_cdf,
    poisson_quantile, LineFit, RegionStats,
};
