//! Peak shape: a Gaussian, optionally with a low-energy tail, sitting on a
//! shared continuum.
#![allow(clippy::missing_errors_doc)]

use std::sync::Arc;

use crate::continuum::Continuum;
use crate::error::{Error, Result};
use crate::skew::SkewType;
use crate::source::SourceMatch;
use crate::spectrum::Spectrum;
use crate::stats::normal_interval;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ratio of FWHM to sigma for a Gaussian, `2 sqrt(2 ln 2)`.
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949;

/// Half-width, in sigma, of the provisional ROI used before a real one exists.
const PROVISIONAL_HALF_WIDTH_NSIGMA: f64 = 4.0;

/// Fit coefficients of a peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoefficientType {
    Mean,
    Sigma,
    /// Area of the Gaussian component, in counts.
    GaussAmplitude,
    SkewPar0,
    SkewPar1,
    SkewPar2,
}

impl CoefficientType {
    /// All coefficients, in storage order.
    pub const ALL: [Self; 6] = [
        Self::Mean,
        Self::Sigma,
        Self::GaussAmplitude,
        Self::SkewPar0,
        Self::SkewPar1,
        Self::SkewPar2,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Skew slot for the `SkewPar*` coefficients.
    #[must_use]
    pub fn skew_slot(self) -> Option<usize> {
        match self {
            Self::SkewPar0 => Some(0),
            Self::SkewPar1 => Some(1),
            Self::SkewPar2 => Some(2),
            _ => None,
        }
    }
}

/// How a peak's extent and area are defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PeakShape {
    /// Gaussian (plus optional skew) with mean, sigma and amplitude.
    #[default]
    GaussianDefined,
    /// No shape parameters; bounded by the continuum's energy range and
    /// measured directly from data.
    DataDefined,
}

/// A spectral peak.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Peak {
    shape: PeakShape,
    skew_type: SkewType,
    coefficients: [f64; 6],
    uncertainties: [f64; 6],
    fit_for: [bool; 6],
    continuum: Arc<Continuum>,
    candidate_sources: Vec<SourceMatch>,
}

impl Default for Peak {
    fn default() -> Self {
        Self {
            shape: PeakShape::GaussianDefined,
            skew_type: SkewType::NoSkew,
            coefficients: [0.0; 6],
            uncertainties: [0.0; 6],
            fit_for: [true, true, true, false, false, false],
            continuum: Arc::new(Continuum::new()),
            candidate_sources: Vec::new(),
        }
    }
}

impl Peak {
    /// Creates a Gaussian peak with its own empty continuum.
    ///
    /// `amplitude` is the Gaussian area in counts.
    #[must_use]
    pub fn new(mean: f64, sigma: f64, amplitude: f64) -> Self {
        let mut peak = Self::default();
        peak.coefficients[CoefficientType::Mean.index()] = mean;
        peak.coefficients[CoefficientType::Sigma.index()] = sigma;
        peak.coefficients[CoefficientType::GaussAmplitude.index()] = amplitude;
        peak
    }

    /// Creates a data-defined peak spanning `[lower, upper]`.
    ///
    /// Its area starts at zero. Store the measured area with
    /// `peak.set_peak_area(peak.data_area(&data))` once a continuum is set,
    /// so [`Peak::peak_area`] reports it.
    #[must_use]
    pub fn data_defined(lower: f64, upper: f64) -> Self {
        let mut continuum = Continuum::new();
        continuum.set_range(lower, upper);
        let mut peak = Self {
            shape: PeakShape::DataDefined,
            fit_for: [false; 6],
            continuum: Arc::new(continuum),
            ..Self::default()
        };
        peak.coefficients[CoefficientType::Mean.index()] = 0.5 * (lower + upper);
        peak
    }

    #[must_use]
    pub fn shape(&self) -> PeakShape {
        self.shape
    }

    #[must_use]
    pub fn is_gaussian_defined(&self) -> bool {
        self.shape == PeakShape::GaussianDefined
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        self.coefficient(CoefficientType::Mean)
    }

    #[must_use]
    pub fn sigma(&self) -> f64 {
        self.coefficient(CoefficientType::Sigma)
    }

    #[must_use]
    pub fn amplitude(&self) -> f64 {
        self.coefficient(CoefficientType::GaussAmplitude)
    }

    pub fn set_mean(&mut self, mean: f64) {
        self.set_coefficient(CoefficientType::Mean, mean);
    }

    pub fn set_sigma(&mut self, sigma: f64) {
        self.set_coefficient(CoefficientType::Sigma, sigma);
    }

    pub fn set_amplitude(&mut self, amplitude: f64) {
        self.set_coefficient(CoefficientType::GaussAmplitude, amplitude);
    }

    /// Full width at half maximum of the Gaussian component.
    #[must_use]
    pub fn fwhm(&self) -> f64 {
        FWHM_PER_SIGMA * self.sigma()
    }

    #[must_use]
    pub fn coefficient(&self, coef: CoefficientType) -> f64 {
        self.coefficients[coef.index()]
    }

    pub fn set_coefficient(&mut self, coef: CoefficientType, value: f64) {
        self.coefficients[coef.index()] = value;
    }

    #[must_use]
    pub fn uncertainty(&self, coef: CoefficientType) -> f64 {
        self.uncertainties[coef.index()]
    }

    pub fn set_uncertainty(&mut self, coef: CoefficientType, value: f64) {
        self.uncertainties[coef.index()] = value;
    }

    /// Whether the optimizer may vary `coef`.
    #[must_use]
    pub fn fit_for(&self, coef: CoefficientType) -> bool {
        self.fit_for[coef.index()]
    }

    pub fn set_fit_for(&mut self, coef: CoefficientType, fit: bool) {
        self.fit_for[coef.index()] = fit;
    }

    #[must_use]
    pub fn skew_type(&self) -> SkewType {
        self.skew_type
    }

    /// Switches the tail family.
    ///
    /// Skew slots unused by the new family are zeroed and fixed; used slots
    /// become free in the fit.
    pub fn set_skew_type(&mut self, skew_type: SkewType) {
        self.skew_type = skew_type;
        for coef in [
            CoefficientType::SkewPar0,
            CoefficientType::SkewPar1,
            CoefficientType::SkewPar2,
        ] {
            let used = coef
                .skew_slot()
                .and_then(|slot| skew_type.parameter_name(slot))
                .is_some();
            if !used {
                self.coefficients[coef.index()] = 0.0;
                self.uncertainties[coef.index()] = 0.0;
            }
            self.fit_for[coef.index()] = used;
        }
    }

    /// Current values of the three skew slots.
    #[must_use]
    pub fn skew_parameters(&self) -> [f64; 3] {
        [
            self.coefficient(CoefficientType::SkewPar0),
            self.coefficient(CoefficientType::SkewPar1),
            self.coefficient(CoefficientType::SkewPar2),
        ]
    }

    /// Sets skew slot `slot`; fails if the current family does not use it.
    pub fn set_skew_parameter(&mut self, slot: usize, value: f64) -> Result<()> {
        if self.skew_type.parameter_name(slot).is_none() {
            return Err(Error::usage(format!(
                "skew slot {slot} is not used by {:?}",
                self.skew_type
            )));
        }
        self.coefficients[CoefficientType::SkewPar0.index() + slot] = value;
        Ok(())
    }

    fn require_gaussian(&self, operation: &str) -> Result<()> {
        if self.is_gaussian_defined() {
            Ok(())
        } else {
            Err(Error::usage(format!(
                "{operation} is not defined for data-defined peaks"
            )))
        }
    }

    /// Lower edge of the peak's ROI.
    ///
    /// The continuum's range when defined, otherwise a provisional
    /// `mean - 4 sigma`, widened by the skew tail's extent.
    #[must_use]
    pub fn lower_x(&self) -> f64 {
        if self.continuum.energy_range_defined() || !self.is_gaussian_defined() {
            return self.continuum.lower_energy();
        }
        let tail = self
            .skew_type
            .low_side_extent(self.sigma(), &self.skew_parameters());
        self.mean() - PROVISIONAL_HALF_WIDTH_NSIGMA * self.sigma() - tail
    }

    /// Upper edge of the peak's ROI; see [`Peak::lower_x`].
    #[must_use]
    pub fn upper_x(&self) -> f64 {
        if self.continuum.energy_range_defined() || !self.is_gaussian_defined() {
            return self.continuum.upper_energy();
        }
        self.mean() + PROVISIONAL_HALF_WIDTH_NSIGMA * self.sigma()
    }

    /// Gaussian density (counts per unit energy) at `x`, without tail.
    #[must_use]
    pub fn gauss_density(&self, x: f64) -> f64 {
        let sigma = self.sigma();
        if sigma <= 0.0 {
            return 0.0;
        }
        let z = (x - self.mean()) / sigma;
        self.amplitude() / (sigma * (2.0 * std::f64::consts::PI).sqrt()) * (-0.5 * z * z).exp()
    }

    /// Tail counts between `x0` and `x1`; zero for unskewed peaks.
    #[must_use]
    pub fn skew_integral(&self, x0: f64, x1: f64) -> f64 {
        self.skew_type
            .integral(x0, x1, self.mean(), self.sigma(), &self.skew_parameters())
    }

    /// Peak counts (Gaussian plus tail) between `x0` and `x1`.
    ///
    /// A zero sigma or amplitude gives a zero Gaussian contribution.
    /// Data-defined peaks have no Gaussian and yield a usage error.
    pub fn gauss_integral(&self, x0: f64, x1: f64) -> Result<f64> {
        self.require_gaussian("gauss_integral")?;
        let sigma = self.sigma();
        let amplitude = self.amplitude();
        let gauss = if sigma > 0.0 && amplitude != 0.0 {
            let z0 = (x0 - self.mean()) / sigma;
            let z1 = (x1 - self.mean()) / sigma;
            amplitude * normal_interval(z0, z1)
        } else {
            0.0
        };
        Ok(gauss + self.skew_integral(x0, x1))
    }

    /// Total peak area.
    ///
    /// Gaussian amplitude plus the tail integral over the ROI; the stored
    /// amplitude for data-defined peaks.
    #[must_use]
    pub fn peak_area(&self) -> f64 {
        if !self.is_gaussian_defined() {
            return self.amplitude();
        }
        self.amplitude() + self.skew_integral(self.lower_x(), self.upper_x())
    }

    /// Uncertainty of [`Peak::peak_area`], scaled from the amplitude's.
    #[must_use]
    pub fn peak_area_uncert(&self) -> f64 {
        let amplitude = self.amplitude();
        let unc = self.uncertainty(CoefficientType::GaussAmplitude);
        if amplitude > 0.0 {
            unc * self.peak_area() / amplitude
        } else {
            unc
        }
    }

    /// Sets the total area, keeping the current tail-to-total ratio.
    ///
    /// The tail is rescaled through its amplitude slot; its shape parameters
    /// are left alone.
    pub fn set_peak_area(&mut self, total: f64) {
        let tail = if self.is_gaussian_defined() {
            self.skew_integral(self.lower_x(), self.upper_x())
        } else {
            0.0
        };
        let current = self.amplitude() + tail;
        if tail <= 0.0 || current <= 0.0 {
            self.set_amplitude(total);
            return;
        }
        let tail_fraction = tail / current;
        let new_tail = total * tail_fraction;
        self.set_amplitude(total - new_tail);
        let scale = new_tail / tail;
        self.coefficients[CoefficientType::SkewPar0.index()] *= scale;
    }

    /// Sets the area uncertainty, stored on the amplitude.
    pub fn set_peak_area_uncert(&mut self, uncert: f64) {
        let area = self.peak_area();
        let unc = if area > 0.0 {
            uncert * self.amplitude() / area
        } else {
            uncert
        };
        self.set_uncertainty(CoefficientType::GaussAmplitude, unc);
    }

    /// Data counts above the continuum within the peak's ROI.
    #[must_use]
    pub fn data_area(&self, data: &Spectrum) -> f64 {
        let (lower, upper) = (self.lower_x(), self.upper_x());
        data.integral(lower, upper) - self.continuum.evaluate_integral(lower, upper)
    }

    /// The continuum, possibly shared with other peaks.
    #[must_use]
    pub fn continuum(&self) -> &Arc<Continuum> {
        &self.continuum
    }

    /// Mutable continuum; clones it first if other peaks share it.
    pub fn continuum_mut(&mut self) -> &mut Continuum {
        Arc::make_mut(&mut self.continuum)
    }

    /// Points this peak at `continuum`.
    pub fn set_continuum(&mut self, continuum: Arc<Continuum>) {
        self.continuum = continuum;
    }

    /// Gives this peak a private copy of its continuum.
    pub fn make_continuum_unique(&mut self) {
        if Arc::strong_count(&self.continuum) > 1 {
            self.continuum = Arc::new(Continuum::clone(&self.continuum));
        }
    }

    /// True when both peaks reference the same continuum instance.
    #[must_use]
    pub fn shares_continuum_with(&self, other: &Peak) -> bool {
        Arc::ptr_eq(&self.continuum, &other.continuum)
    }

    pub fn add_candidate_source(&mut self, source: SourceMatch) {
        self.candidate_sources.push(source);
    }

    #[must_use]
    pub fn candidate_sources(&self) -> &[SourceMatch] {
        &self.candidate_sources
    }

    /// Candidate with the largest weight.
    #[must_use]
    pub fn best_candidate_source(&self) -> Option<&SourceMatch> {
        self.candidate_sources
            .iter()
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
    }

    pub fn clear_candidate_sources(&mut self) {
        self.candidate_sources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuum::OffsetType;
    use crate::source::SourceKind;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn landau_peak() -> Peak {
        let mut peak = Peak::new(661.0, 1.2, 10_000.0);
        peak.set_skew_type(SkewType::LandauSkew);
        peak.set_skew_parameter(0, 800.0).unwrap();
        peak.set_skew_parameter(1, 1.0).unwrap();
        peak.set_skew_parameter(2, 0.8).unwrap();
        peak
    }

    #[test]
    fn test_gauss_integral_symmetric_and_complete() {
        let peak = Peak::new(661.0, 3.0, 5000.0);
        for k in [0.5, 1.0, 2.0, 3.5] {
            let below = peak.gauss_integral(661.0 - k * 3.0, 661.0).unwrap();
            let above = peak.gauss_integral(661.0, 661.0 + k * 3.0).unwrap();
            assert_relative_eq!(below, above, max_relative = 1e-12);
        }
        let full = peak.gauss_integral(631.0, 691.0).unwrap();
        assert!(full >= 0.999_99 * 5000.0);
        assert!(full <= 5000.0 + 1e-9);
        assert_abs_diff_eq!(
            peak.gauss_integral(658.0, 664.0).unwrap(),
            5000.0 * 0.682_689_492,
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_gauss_integral_degenerate() {
        assert_abs_diff_eq!(Peak::new(100.0, 0.0, 500.0).gauss_integral(90.0, 110.0).unwrap(), 0.0);
        assert_abs_diff_eq!(Peak::new(100.0, 2.0, 0.0).gauss_integral(90.0, 110.0).unwrap(), 0.0);
    }

    #[test]
    fn test_data_defined_has_no_gaussian() {
        let peak = Peak::data_defined(100.0, 120.0);
        assert!(matches!(peak.gauss_integral(100.0, 120.0), Err(Error::Usage(_))));
        assert_relative_eq!(peak.lower_x(), 100.0);
        assert_relative_eq!(peak.upper_x(), 120.0);
        assert_relative_eq!(peak.mean(), 110.0);
    }

    #[test]
    fn test_data_area() {
        let data = Spectrum::uniform(0.0, 1.0, vec![10.0; 200]).unwrap();
        let mut peak = Peak::data_defined(100.0, 120.0);
        let continuum = peak.continuum_mut();
        continuum.set_type(OffsetType::Constant);
        continuum.set_parameters(100.0, &[4.0], &[]).unwrap();
        assert_relative_eq!(peak.data_area(&data), 200.0 - 80.0);
    }

    #[test]
    fn test_provisional_range() {
        let peak = Peak::new(500.0, 2.0, 100.0);
        assert_relative_eq!(peak.lower_x(), 492.0);
        assert_relative_eq!(peak.upper_x(), 508.0);

        let skewed = landau_peak();
        let symmetric_lower = skewed.mean() - 4.0 * skewed.sigma();
        assert!(skewed.lower_x() < symmetric_lower);
        assert_relative_eq!(skewed.upper_x(), 661.0 + 4.8);

        let mut ranged = peak.clone();
        ranged.continuum_mut().set_range(480.0, 515.0);
        assert_relative_eq!(ranged.lower_x(), 480.0);
        assert_relative_eq!(ranged.upper_x(), 515.0);
    }

    #[test]
    fn test_peak_area_with_skew() {
        let peak = landau_peak();
        let tail = peak.skew_integral(peak.lower_x(), peak.upper_x());
        assert!(tail > 0.0 && tail <= 800.0);
        assert_relative_eq!(peak.peak_area(), 10_000.0 + tail);
    }

    #[test]
    fn test_set_peak_area_keeps_ratio() {
        let mut peak = landau_peak();
        let before_ratio = peak.amplitude() / peak.peak_area();
        peak.set_peak_area(5000.0);
        assert_relative_eq!(peak.peak_area(), 5000.0, max_relative = 1e-9);
        assert_relative_eq!(peak.amplitude() / peak.peak_area(), before_ratio, max_relative = 1e-9);

        let mut plain = Peak::new(100.0, 1.0, 10.0);
        plain.set_peak_area(250.0);
        assert_relative_eq!(plain.amplitude(), 250.0);
        assert_relative_eq!(plain.peak_area(), 250.0);
    }

    #[test]
    fn test_area_uncertainty_round_trip() {
        let mut peak = landau_peak();
        peak.set_peak_area_uncert(120.0);
        assert_relative_eq!(peak.peak_area_uncert(), 120.0, max_relative = 1e-12);
        assert!(peak.uncertainty(CoefficientType::GaussAmplitude) < 120.0);
    }

    #[test]
    fn test_skew_slots() {
        let mut peak = Peak::new(100.0, 1.0, 10.0);
        assert!(peak.set_skew_parameter(0, 1.0).is_err());
        peak.set_skew_type(SkewType::ExGaussSkew);
        assert!(peak.fit_for(CoefficientType::SkewPar1));
        assert!(!peak.fit_for(CoefficientType::SkewPar2));
        assert!(peak.set_skew_parameter(1, 3.0).is_ok());
        assert!(peak.set_skew_parameter(2, 3.0).is_err());

        peak.set_skew_type(SkewType::NoSkew);
        assert_abs_diff_eq!(peak.coefficient(CoefficientType::SkewPar1), 0.0);
        assert_abs_diff_eq!(peak.skew_integral(0.0, 200.0), 0.0);
    }

    #[test]
    fn test_exgauss_peak_area() {
        let mut peak = Peak::new(300.0, 1.5, 2000.0);
        peak.set_skew_type(SkewType::ExGaussSkew);
        peak.set_skew_parameter(0, 200.0).unwrap();
        peak.set_skew_parameter(1, 2.0).unwrap();
        // Provisional ROI is widened so nearly all of the tail is inside.
        assert!(peak.peak_area() > 2000.0 + 0.95 * 200.0);
        let total = peak.gauss_integral(0.0, 600.0).unwrap();
        assert_relative_eq!(total, 2200.0, max_relative = 1e-9);
    }

    #[test]
    fn test_continuum_clone_on_write() {
        let mut a = Peak::new(100.0, 1.0, 10.0);
        let mut b = Peak::new(104.0, 1.0, 10.0);
        let shared = Arc::new(Continuum::with_type(OffsetType::Linear));
        a.set_continuum(Arc::clone(&shared));
        b.set_continuum(Arc::clone(&shared));
        assert!(a.shares_continuum_with(&b));

        a.continuum_mut().set_range(90.0, 115.0);
        assert!(!a.shares_continuum_with(&b));
        assert!(!b.continuum().energy_range_defined());

        b.make_continuum_unique();
        assert!(!Arc::ptr_eq(b.continuum(), &shared));
        assert_eq!(**b.continuum(), *shared);
    }

    #[test]
    fn test_best_candidate_source() {
        let mut peak = Peak::new(661.0, 1.0, 10.0);
        assert!(peak.best_candidate_source().is_none());
        peak.add_candidate_source(SourceMatch::new(SourceKind::Xray, "Pb", 0.1));
        peak.add_candidate_source(SourceMatch::new(SourceKind::Nuclide, "Cs137", 0.8));
        peak.add_candidate_source(SourceMatch::new(SourceKind::Reaction, "H(n,g)", 0.3));
        assert_eq!(peak.best_candidate_source().unwrap().name, "Cs137");
        assert_eq!(peak.candidate_sources().len(), 3);
        peak.clear_candidate_sources();
        assert!(peak.candidate_sources().is_empty());
    }
}
