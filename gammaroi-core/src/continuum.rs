//! Background continuum beneath one or more peaks.
//!
//! A continuum is either a polynomial in `(E - reference_energy)` whose value
//! is a count density (counts per unit energy), or an external spectrum whose
//! channel contents are used directly. Peaks that share a fit region hold the
//! same continuum through an `Arc`.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::missing_errors_doc
)]

use std::sync::Arc;

use log::debug;

use crate::error::{Error, Result};
use crate::spectrum::Spectrum;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Functional form of the continuum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OffsetType {
    /// No continuum.
    #[default]
    NoOffset,
    Constant,
    Linear,
    Quadratic,
    Cubic,
    /// Counts taken from an external background spectrum.
    External,
}

impl OffsetType {
    /// Number of polynomial coefficients implied by this type.
    #[must_use]
    pub fn num_parameters(self) -> usize {
        match self {
            Self::NoOffset | Self::External => 0,
            Self::Constant => 1,
            Self::Linear => 2,
            Self::Quadratic => 3,
            Self::Cubic => 4,
        }
    }

    /// True for the polynomial forms.
    #[must_use]
    pub fn is_polynomial(self) -> bool {
        self.num_parameters() > 0
    }
}

/// Background model under a peak or group of peaks.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Continuum {
    offset_type: OffsetType,
    lower_energy: f64,
    upper_energy: f64,
    reference_energy: f64,
    values: Vec<f64>,
    uncertainties: Vec<f64>,
    fit_for_value: Vec<bool>,
    external: Option<Arc<Spectrum>>,
}

impl Continuum {
    /// Creates an empty (`NoOffset`) continuum with no energy range.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a continuum of the given type with zeroed coefficients.
    #[must_use]
    pub fn with_type(offset_type: OffsetType) -> Self {
        let mut continuum = Self::new();
        continuum.set_type(offset_type);
        continuum
    }

    /// Functional form.
    #[must_use]
    pub fn offset_type(&self) -> OffsetType {
        self.offset_type
    }

    /// True for polynomial forms.
    #[must_use]
    pub fn is_polynomial(&self) -> bool {
        self.offset_type.is_polynomial()
    }

    /// Changes the functional form.
    ///
    /// Coefficient, uncertainty and fit-flag arrays are resized to the new
    /// order; retained coefficients keep their values. Switching to a
    /// polynomial drops any external spectrum.
    pub fn set_type(&mut self, offset_type: OffsetType) {
        let n = offset_type.num_parameters();
        self.values.resize(n, 0.0);
        self.uncertainties.resize(n, 0.0);
        self.fit_for_value.resize(n, true);
        if offset_type != OffsetType::External {
            self.external = None;
        }
        self.offset_type = offset_type;
    }

    /// Lower bound of the fit region.
    #[must_use]
    pub fn lower_energy(&self) -> f64 {
        self.lower_energy
    }

    /// Upper bound of the fit region.
    #[must_use]
    pub fn upper_energy(&self) -> f64 {
        self.upper_energy
    }

    /// Energy the polynomial is expanded about.
    #[must_use]
    pub fn reference_energy(&self) -> f64 {
        self.reference_energy
    }

    pub fn set_reference_energy(&mut self, reference: f64) {
        self.reference_energy = reference;
    }

    /// Sets the fit region; reversed bounds are swapped.
    pub fn set_range(&mut self, lower: f64, upper: f64) {
        let (lower, upper) = if lower <= upper { (lower, upper) } else { (upper, lower) };
        self.lower_energy = lower;
        self.upper_energy = upper;
    }

    /// True once a non-empty fit region has been assigned.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn energy_range_defined(&self) -> bool {
        self.lower_energy != self.upper_energy
    }

    /// Polynomial coefficients, constant term first.
    #[must_use]
    pub fn parameters(&self) -> &[f64] {
        &self.values
    }

    /// Coefficient uncertainties.
    #[must_use]
    pub fn uncertainties(&self) -> &[f64] {
        &self.uncertainties
    }

    /// Per-coefficient fit flags (`false` means held fixed).
    #[must_use]
    pub fn fit_flags(&self) -> &[bool] {
        &self.fit_for_value
    }

    fn require_polynomial(&self, operation: &str) -> Result<()> {
        if self.is_polynomial() {
            Ok(())
        } else {
            Err(Error::usage(format!(
                "{operation} requires a polynomial continuum, not {:?}",
                self.offset_type
            )))
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.values.len() {
            Ok(())
        } else {
            Err(Error::usage(format!(
                "coefficient {index} out of range for {:?} continuum",
                self.offset_type
            )))
        }
    }

    /// Sets all polynomial coefficients.
    ///
    /// `uncertainties` may be empty (all zero) or match `values` in length.
    /// Fails if the continuum is not polynomial or a length differs from the
    /// order implied by the type.
    pub fn set_parameters(
        &mut self,
        reference_energy: f64,
        values: &[f64],
        uncertainties: &[f64],
    ) -> Result<()> {
        self.require_polynomial("set_parameters")?;
        let n = self.offset_type.num_parameters();
        if values.len() != n || (!uncertainties.is_empty() && uncertainties.len() != n) {
            return Err(Error::usage(format!(
                "{:?} continuum takes {n} parameters, got {} values and {} uncertainties",
                self.offset_type,
                values.len(),
                uncertainties.len()
            )));
        }
        self.reference_energy = reference_energy;
        self.values.copy_from_slice(values);
        if uncertainties.is_empty() {
            self.uncertainties.fill(0.0);
        } else {
            self.uncertainties.copy_from_slice(uncertainties);
        }
        Ok(())
    }

    /// Sets a single coefficient and its uncertainty.
    pub fn set_parameter(&mut self, index: usize, value: f64, uncertainty: f64) -> Result<()> {
        self.require_polynomial("set_parameter")?;
        self.check_index(index)?;
        self.values[index] = value;
        self.uncertainties[index] = uncertainty;
        Ok(())
    }

    /// Whether coefficient `index` is free in the fit.
    #[must_use]
    pub fn fit_for_parameter(&self, index: usize) -> bool {
        self.fit_for_value.get(index).copied().unwrap_or(false)
    }

    pub fn set_fit_for_parameter(&mut self, index: usize, fit: bool) -> Result<()> {
        self.require_polynomial("set_fit_for_parameter")?;
        self.check_index(index)?;
        self.fit_for_value[index] = fit;
        Ok(())
    }

    /// Uses `spectrum` as the background and switches the type to `External`.
    pub fn set_external_continuum(&mut self, spectrum: Arc<Spectrum>) {
        self.set_type(OffsetType::External);
        self.external = Some(spectrum);
    }

    /// External background spectrum, if any.
    #[must_use]
    pub fn external_continuum(&self) -> Option<&Arc<Spectrum>> {
        self.external.as_ref()
    }

    /// Continuum count density at energy `x`.
    #[must_use]
    pub fn evaluate(&self, x: f64) -> f64 {
        match self.offset_type {
            OffsetType::NoOffset => 0.0,
            OffsetType::External => self.external.as_ref().map_or(0.0, |ext| {
                let channel = ext.find_channel(x);
                ext.count(channel) / ext.channel_width(channel)
            }),
            _ => {
                let dx = x - self.reference_energy;
                self.values.iter().rev().fold(0.0, |acc, &c| acc * dx + c)
            }
        }
    }

    /// Continuum counts between energies `x0` and `x1`.
    ///
    /// Polynomial integrals are clamped at zero; external continua sum the
    /// external spectrum with fractional edge channels. Integrating outside the
    /// fit region is allowed.
    #[must_use]
    pub fn evaluate_integral(&self, x0: f64, x1: f64) -> f64 {
        match self.offset_type {
            OffsetType::NoOffset => 0.0,
            OffsetType::External => self
                .external
                .as_ref()
                .map_or(0.0, |ext| ext.integral(x0, x1)),
            _ => offset_eqn_integral(&self.values, x0, x1, self.reference_energy).max(0.0),
        }
    }

    /// Replaces this continuum with a linear one estimated from sidebands
    /// around `x0` and `x1`.
    ///
    /// The reference energy becomes `x0` and the fit region `[x0, x1]`.
    /// Uncertainties are Poisson estimates of each sideband's density.
    pub fn estimate_linear_from_sidebands(
        &mut self,
        data: &Spectrum,
        x0: f64,
        x1: f64,
        n_sideband_channels: usize,
    ) {
        let estimate = linear_continuum_from_sidebands(data, x0, x0, x1, n_sideband_channels);
        self.set_type(OffsetType::Linear);
        self.reference_energy = x0;
        self.set_range(x0, x1);
        self.values.copy_from_slice(&[estimate.intercept, estimate.slope]);
        self.uncertainties
            .copy_from_slice(&[estimate.intercept_uncertainty, estimate.slope_uncertainty]);
    }
}

/// Integral of `sum_k coefs[k] * (x - reference)^k` from `x0` to `x1`.
#[must_use]
pub fn offset_eqn_integral(coefs: &[f64], x0: f64, x1: f64, reference: f64) -> f64 {
    let d0 = x0 - reference;
    let d1 = x1 - reference;
    coefs
        .iter()
        .enumerate()
        .map(|(k, &c)| {
            let power = (k + 1) as i32;
            c / f64::from(power) * (d1.powi(power) - d0.powi(power))
        })
        .sum()
}

/// Linear continuum estimated from two sidebands.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SidebandEstimate {
    /// Density at the reference energy.
    pub intercept: f64,
    /// Change in density per unit energy.
    pub slope: f64,
    pub intercept_uncertainty: f64,
    pub slope_uncertainty: f64,
}

/// Average density over the `2n+1` channels centered on the channel holding
/// `energy`, with its Poisson uncertainty. Returns `(position, density, error)`.
fn sideband_point(data: &Spectrum, energy: f64, n: usize) -> (f64, f64, f64) {
    let channel = data.find_channel(energy);
    let first = channel.saturating_sub(n);
    let last = (channel + n).min(data.num_channels() - 1);
    let lower = data.channel_lower(first);
    let upper = data.channel_upper(last);
    let width = upper - lower;
    let sum = data.sum_channels(first, last);
    (0.5 * (lower + upper), sum / width, sum.max(0.0).sqrt() / width)
}

/// Linear continuum through sideband averages at `x0` and `x1`.
///
/// The line is expressed relative to `reference`. When the two sideband
/// positions nearly coincide the window is widened by one channel and the
/// solve retried; if still degenerate the line is zero.
#[must_use]
pub fn linear_continuum_from_sidebands(
    data: &Spectrum,
    reference: f64,
    x0: f64,
    x1: f64,
    n_sideband_channels: usize,
) -> SidebandEstimate {
    for n in [n_sideband_channels, n_sideband_channels + 1] {
        let (p0, y0, e0) = sideband_point(data, x0, n);
        let (p1, y1, e1) = sideband_point(data, x1, n);
        let det = p1 - p0;
        let scale = p0.abs().max(p1.abs()).max(1.0);
        if !det.is_finite() || det.abs() <= 1e-9 * scale {
            debug!("sideband positions coincide at {p0:.3} with {n} channels each side");
            continue;
        }

        let d0 = p0 - reference;
        let d1 = p1 - reference;
        let slope = (y1 - y0) / det;
        let intercept = (y0 * d1 - y1 * d0) / det;
        if !slope.is_finite() || !intercept.is_finite() {
            continue;
        }
        return SidebandEstimate {
            intercept,
            slope,
            intercept_uncertainty: (e0 * d1).hypot(e1 * d0) / det.abs(),
            slope_uncertainty: e0.hypot(e1) / det.abs(),
        };
    }

    debug!("degenerate sidebands around {x0:.3}..{x1:.3}; continuum set to zero");
    SidebandEstimate::default()
}
