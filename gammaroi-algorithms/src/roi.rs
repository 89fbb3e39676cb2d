//! ROI boundary search.
//!
//! Each boundary is found by walking outward from the peak in four phases:
//!
//! 1. **Anchor**: track the lowest short moving-average background, taking
//!    every channel at or below it as the new reference, and walk on while
//!    channels stay under the upper control limit. On low-resolution spectra
//!    the limit follows a rising slope fitted past the reference. A channel
//!    above the limit marks a new feature; the anchor stops short of it.
//! 2. **Refine**: from the anchor, extend while each channel stays inside a
//!    control band around the cumulative background average.
//! 3. **Skew clamp**: boundaries past `7.05 sigma` are pulled back to it,
//!    on the low side only when no excess tail is seen beyond `3.5 sigma`.
//! 4. **Floor**: never closer than `1.75 sigma` to the mean.
#![allow(clippy::cast_precision_loss, clippy::missing_errors_doc)]

use gammaroi_core::stats::{LineFit, RegionStats};
use gammaroi_core::{poisson_quantile, Error as CoreError, Peak, Spectrum};
use log::{debug, trace};
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoiError};
use crate::extent::spectroscopic_extent;

/// Fewest channels a spectrum needs for boundary search.
pub const MIN_ROI_CHANNELS: usize = 128;
/// Distance from the mean, in sigma, where the walk starts.
pub const DEFAULT_START_NSIGMA: f64 = 1.5;
/// Farthest a boundary may lie from the mean, in sigma.
pub const DEFAULT_MAX_NSIGMA: f64 = 7.5;
/// Closest a boundary may lie to the mean, in sigma.
pub const DEFAULT_MIN_NSIGMA: f64 = 1.75;
/// Boundary clamp applied when no tail feature is seen, in sigma.
pub const DEFAULT_SKEW_CLAMP_NSIGMA: f64 = 7.05;
/// Inner edge of the band compared against the region past the clamp.
pub const DEFAULT_SKEW_BAND_START_NSIGMA: f64 = 3.5;
/// Upper control limit multiplier for the anchor search.
pub const DEFAULT_ANCHOR_LIMIT_NSIGMA: f64 = 3.0;
/// Control band half-width multiplier for refinement.
pub const DEFAULT_REFINE_BAND_NSIGMA: f64 = 2.8;
/// Significance of the low-side tail comparison.
pub const DEFAULT_SKEW_TEST_NSIGMA: f64 = 3.0;
/// Background level (counts per channel) from which Gaussian control limits
/// replace Poisson quantiles.
pub const DEFAULT_GAUSSIAN_MIN_COUNTS: f64 = 20.0;
/// Lower Poisson quantile of the refinement band.
pub const DEFAULT_POISSON_LOWER_QUANTILE: f64 = 0.01;
/// Upper Poisson quantile of both control limits.
pub const DEFAULT_POISSON_UPPER_QUANTILE: f64 = 0.99;
/// Channels in the moving background window.
pub const DEFAULT_AVERAGE_WINDOW: usize = 3;
/// Channels kept between a detected feature and the anchor.
pub const DEFAULT_SAFETY_MARGIN: usize = 3;
/// Points, the reference channel included, in the local slope fit.
pub const DEFAULT_SLOPE_FIT_CHANNELS: usize = 5;
/// Fraction of the channel range within which the spectroscopic extent
/// bounds a low-side search.
pub const DEFAULT_EXTENT_GUARD_FRACTION: f64 = 0.04;
/// Channel count from which a spectrum is treated as high resolution.
pub const DEFAULT_HIGH_RES_MIN_CHANNELS: usize = 4096;

/// Which boundary of the ROI to search for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SearchDirection {
    /// Toward lower energy.
    Lower,
    /// Toward higher energy.
    Higher,
}

impl SearchDirection {
    fn sign(self) -> f64 {
        match self {
            Self::Lower => -1.0,
            Self::Higher => 1.0,
        }
    }
}

/// Tuning of the ROI boundary search.
///
/// Every threshold of the four phases; each phase keeps its own
/// multiplier.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoiSearchConfig {
    /// Start of the walk, in sigma from the mean.
    pub start_nsigma: f64,
    /// Hard cap on the boundary, in sigma from the mean.
    pub max_nsigma: f64,
    /// Minimum boundary distance, in sigma from the mean.
    pub min_nsigma: f64,
    /// Phase C clamp, in sigma from the mean.
    pub skew_clamp_nsigma: f64,
    /// Inner edge of the Phase C comparison band, in sigma.
    pub skew_band_start_nsigma: f64,
    /// Phase A upper control limit multiplier.
    pub anchor_limit_nsigma: f64,
    /// Phase B control band multiplier.
    pub refine_band_nsigma: f64,
    /// Phase C statistical test significance.
    pub skew_test_nsigma: f64,
    /// Gaussian/Poisson regime switch, counts per channel.
    pub gaussian_min_counts: f64,
    /// Lower Poisson quantile of the Phase B band.
    pub poisson_lower_quantile: f64,
    /// Upper Poisson quantile of the Phase A limit and Phase B band.
    pub poisson_upper_quantile: f64,
    /// Moving-average window, channels.
    pub average_window: usize,
    /// Channels kept short of a detected feature.
    pub safety_margin: usize,
    /// Points in the low-resolution slope fit; below 2 disables it.
    pub slope_fit_channels: usize,
    /// Fraction of the channel range guarded by the spectroscopic extent.
    pub extent_guard_fraction: f64,
    /// Channel count at which two-channel confirmation kicks in.
    pub high_res_min_channels: usize,
    /// Known `(lower, upper)` spectroscopic extent in channels; estimated
    /// from the data with [`crate::spectroscopic_extent`] when unset.
    pub spectroscopic_extent: Option<(usize, usize)>,
}

impl Default for RoiSearchConfig {
    fn default() -> Self {
        Self {
            start_nsigma: DEFAULT_START_NSIGMA,
            max_nsigma: DEFAULT_MAX_NSIGMA,
            min_nsigma: DEFAULT_MIN_NSIGMA,
            skew_clamp_nsigma: DEFAULT_SKEW_CLAMP_NSIGMA,
            skew_band_start_nsigma: DEFAULT_SKEW_BAND_START_NSIGMA,
            anchor_limit_nsigma: DEFAULT_ANCHOR_LIMIT_NSIGMA,
            refine_band_nsigma: DEFAULT_REFINE_BAND_NSIGMA,
            skew_test_nsigma: DEFAULT_SKEW_TEST_NSIGMA,
            gaussian_min_counts: DEFAULT_GAUSSIAN_MIN_COUNTS,
            poisson_lower_quantile: DEFAULT_POISSON_LOWER_QUANTILE,
            poisson_upper_quantile: DEFAULT_POISSON_UPPER_QUANTILE,
            average_window: DEFAULT_AVERAGE_WINDOW,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            slope_fit_channels: DEFAULT_SLOPE_FIT_CHANNELS,
            extent_guard_fraction: DEFAULT_EXTENT_GUARD_FRACTION,
            high_res_min_channels: DEFAULT_HIGH_RES_MIN_CHANNELS,
            spectroscopic_extent: None,
        }
    }
}

impl RoiSearchConfig {
    /// Set the boundary cap (in sigma).
    #[must_use]
    pub fn with_max_nsigma(mut self, nsigma: f64) -> Self {
        self.max_nsigma = nsigma;
        self
    }

    /// Set the minimum boundary distance (in sigma).
    #[must_use]
    pub fn with_min_nsigma(mut self, nsigma: f64) -> Self {
        self.min_nsigma = nsigma;
        self
    }

    /// Set the Phase C clamp (in sigma).
    #[must_use]
    pub fn with_skew_clamp_nsigma(mut self, nsigma: f64) -> Self {
        self.skew_clamp_nsigma = nsigma;
        self
    }

    /// Set the Gaussian/Poisson regime switch.
    #[must_use]
    pub fn with_gaussian_min_counts(mut self, counts: f64) -> Self {
        self.gaussian_min_counts = counts;
        self
    }

    /// Set the channel count treated as high resolution.
    #[must_use]
    pub fn with_high_res_min_channels(mut self, channels: usize) -> Self {
        self.high_res_min_channels = channels;
        self
    }

    /// Set the number of points in the low-resolution slope fit.
    #[must_use]
    pub fn with_slope_fit_channels(mut self, channels: usize) -> Self {
        self.slope_fit_channels = channels;
        self
    }

    /// Set the fraction of the spectrum guarded by the spectroscopic extent.
    #[must_use]
    pub fn with_extent_guard_fraction(mut self, fraction: f64) -> Self {
        self.extent_guard_fraction = fraction;
        self
    }

    /// Use a known spectroscopic extent, e.g. from the hardware threshold,
    /// instead of estimating it.
    #[must_use]
    pub fn with_spectroscopic_extent(mut self, lower: usize, upper: usize) -> Self {
        self.spectroscopic_extent = Some((lower, upper));
        self
    }
}

/// Options for [`prepare_roi`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoiPrepConfig {
    /// Boundary search tuning.
    pub search: RoiSearchConfig,
    /// Channels on each side of a boundary averaged for the continuum seed.
    pub sideband_channels: usize,
    /// Seed a linear continuum from the sidebands; otherwise only the range
    /// is set.
    pub seed_continuum: bool,
}

impl Default for RoiPrepConfig {
    fn default() -> Self {
        Self {
            search: RoiSearchConfig::default(),
            sideband_channels: 2,
            seed_continuum: true,
        }
    }
}

impl RoiPrepConfig {
    /// Set the boundary search tuning.
    #[must_use]
    pub fn with_search(mut self, search: RoiSearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Set the sideband half-width in channels.
    #[must_use]
    pub fn with_sideband_channels(mut self, channels: usize) -> Self {
        self.sideband_channels = channels;
        self
    }

    /// Enable or disable continuum seeding.
    #[must_use]
    pub fn with_seed_continuum(mut self, seed: bool) -> Self {
        self.seed_continuum = seed;
        self
    }
}

/// One directional walk over a spectrum.
struct Walker<'a> {
    data: &'a Spectrum,
    config: &'a RoiSearchConfig,
    direction: SearchDirection,
    high_res: bool,
}

impl Walker<'_> {
    fn count(&self, channel: usize) -> f64 {
        self.data.count(channel)
    }

    /// `n` channels outward, if inside the spectrum.
    fn outward(&self, channel: usize, n: usize) -> Option<usize> {
        match self.direction {
            SearchDirection::Lower => channel.checked_sub(n),
            SearchDirection::Higher => Some(channel + n).filter(|&c| c < self.data.num_channels()),
        }
    }

    /// `n` channels back toward the peak, if inside the spectrum.
    fn inward(&self, channel: usize, n: usize) -> Option<usize> {
        match self.direction {
            SearchDirection::Lower => Some(channel + n).filter(|&c| c < self.data.num_channels()),
            SearchDirection::Higher => channel.checked_sub(n),
        }
    }

    /// True when `a` lies strictly farther out than `b`.
    fn is_beyond(&self, a: usize, b: usize) -> bool {
        match self.direction {
            SearchDirection::Lower => a < b,
            SearchDirection::Higher => a > b,
        }
    }

    fn outermost(&self, a: usize, b: usize) -> usize {
        if self.is_beyond(a, b) {
            a
        } else {
            b
        }
    }

    fn channel_at_nsigma(&self, peak: &Peak, nsigma: f64) -> usize {
        self.data
            .find_channel(peak.mean() + self.direction.sign() * nsigma * peak.sigma())
    }

    /// Background window ending at `channel`, extending toward the peak.
    fn trailing_window(&self, channel: usize) -> RegionStats {
        let span = self.config.average_window.max(1) - 1;
        let inner = match self.direction {
            SearchDirection::Lower => (channel + span).min(self.data.num_channels() - 1),
            SearchDirection::Higher => channel.saturating_sub(span),
        };
        RegionStats::from_channels(self.data, channel, inner)
    }

    /// Applies `test` to `channel`, and for high-resolution spectra also to
    /// the next channel out.
    fn confirmed(&self, channel: usize, test: impl Fn(f64) -> bool) -> bool {
        if !test(self.count(channel)) {
            return false;
        }
        !self.high_res || self.outward(channel, 1).is_none_or(|next| test(self.count(next)))
    }

    fn is_gaussian_regime(&self, mean: f64) -> bool {
        mean >= self.config.gaussian_min_counts
    }

    /// Poisson mean used for low-count limits.
    fn poisson_mean(&self, mean: f64) -> f64 {
        // Empty windows still admit about one count per window.
        mean.max(1.0 / self.config.average_window.max(1) as f64)
    }

    fn upper_control_limit(&self, mean: f64, uncertainty: f64) -> f64 {
        if self.is_gaussian_regime(mean) {
            mean + self.config.anchor_limit_nsigma * (mean + uncertainty * uncertainty).sqrt()
        } else {
            poisson_quantile(self.config.poisson_upper_quantile, self.poisson_mean(mean)) as f64
        }
    }

    fn control_band(&self, mean: f64, uncertainty: f64) -> (f64, f64) {
        if self.is_gaussian_regime(mean) {
            let half = self.config.refine_band_nsigma * (mean + uncertainty * uncertainty).sqrt();
            (mean - half, mean + half)
        } else {
            let mean = self.poisson_mean(mean);
            (
                poisson_quantile(self.config.poisson_lower_quantile, mean) as f64,
                poisson_quantile(self.config.poisson_upper_quantile, mean) as f64,
            )
        }
    }

    /// Background expected `steps` channels past the reference: the best
    /// window, raised along a rising fitted slope on low-resolution spectra.
    fn expected_background(&self, best: &RegionStats, slope_fit: &LineFit, steps: usize) -> f64 {
        if self.high_res {
            return best.mean;
        }
        let slope = slope_fit.solve().map_or(0.0, |(_, slope)| slope.max(0.0));
        (best.mean + slope * steps as f64).max(0.0)
    }

    /// Phase A: the last channel consistent with the background, kept a
    /// safety margin short of any new feature.
    fn find_anchor(&self, start: usize, cap: usize, guard: Option<usize>) -> usize {
        let mut best = self.trailing_window(start);
        let mut reference = start;
        let mut slope_fit = LineFit::default();
        slope_fit.push(0.0, self.count(start));
        let mut channel = start;

        while let Some(next) = self.outward(channel, 1) {
            if self.is_beyond(next, cap) || guard.is_some_and(|g| self.is_beyond(next, g)) {
                break;
            }
            channel = next;

            if self.confirmed(channel, |c| c <= best.mean) {
                reference = channel;
                slope_fit.clear();
                slope_fit.push(0.0, self.count(channel));
                let window = self.trailing_window(channel);
                if window.mean < best.mean {
                    best = window;
                }
                continue;
            }

            let steps = channel.abs_diff(reference);
            let expected = self.expected_background(&best, &slope_fit, steps);
            let limit = self.upper_control_limit(expected, best.uncertainty);
            if self.confirmed(channel, |c| c > limit) {
                trace!(
                    "feature at channel {channel}: {:.1} counts above limit {limit:.1}",
                    self.count(channel)
                );
                return self
                    .inward(channel, self.config.safety_margin)
                    .map_or(start, |c| self.outermost(c, start));
            }
            if slope_fit.len() < self.config.slope_fit_channels {
                slope_fit.push(steps as f64, self.count(channel));
            }
        }
        channel
    }

    /// Phase B: extend from the anchor while the background stays in band.
    fn refine(&self, anchor: usize, cap: usize, guard: Option<usize>) -> usize {
        let window = self.trailing_window(anchor);
        let mut sum = window.mean * window.channels as f64;
        let mut channels = window.channels;
        let mut boundary = anchor;

        while let Some(next) = self.outward(boundary, 1) {
            if self.is_beyond(next, cap) || guard.is_some_and(|g| self.is_beyond(next, g)) {
                break;
            }
            let running = RegionStats::from_sum(sum, channels);
            let (low, high) = self.control_band(running.mean, running.uncertainty);
            if self.confirmed(next, |c| c < low || c > high) {
                trace!(
                    "channel {next}: {:.1} counts outside band [{low:.1}, {high:.1}]",
                    self.count(next)
                );
                break;
            }
            sum += self.count(next);
            channels += 1;
            boundary = next;
        }
        boundary
    }

    /// Phase C: pull a wide boundary back to the skew clamp unless the low
    /// side shows a tail.
    fn clamp_to_skew_limit(&self, peak: &Peak, boundary: usize) -> usize {
        let clamp = self.channel_at_nsigma(peak, self.config.skew_clamp_nsigma);
        if !self.is_beyond(boundary, clamp) {
            return boundary;
        }
        match self.direction {
            SearchDirection::Higher => clamp,
            SearchDirection::Lower => {
                let band_start = self.channel_at_nsigma(peak, self.config.skew_band_start_nsigma);
                let near = RegionStats::from_channels(self.data, clamp, band_start);
                // boundary < clamp here, so clamp - 1 cannot underflow.
                let far = RegionStats::from_channels(self.data, boundary, clamp - 1);
                if near.is_statistically_greater_or_equal(&far, self.config.skew_test_nsigma) {
                    clamp
                } else {
                    debug!(
                        "low-side tail: {:.1} +- {:.1} inside vs {:.1} +- {:.1} past clamp",
                        near.mean, near.uncertainty, far.mean, far.uncertainty
                    );
                    boundary
                }
            }
        }
    }
}

/// Finds the ROI boundary channel of `peak` in `direction`.
///
/// If the peak's continuum already has an energy range, the channel holding
/// that range's edge is returned directly.
///
/// # Errors
/// [`RoiError::DataDefinedPeak`] for data-defined peaks,
/// [`RoiError::InvalidSigma`] for a non-positive width and an
/// insufficient-data error for spectra under 128 channels.
pub fn find_roi_limit(
    peak: &Peak,
    data: &Spectrum,
    direction: SearchDirection,
    config: &RoiSearchConfig,
) -> Result<usize> {
    if !peak.is_gaussian_defined() {
        return Err(RoiError::DataDefinedPeak);
    }
    let num_channels = data.num_channels();
    if num_channels < MIN_ROI_CHANNELS {
        return Err(CoreError::InsufficientData {
            channels: num_channels,
            required: MIN_ROI_CHANNELS,
        }
        .into());
    }

    let continuum = peak.continuum();
    if continuum.energy_range_defined() {
        let edge = match direction {
            SearchDirection::Lower => continuum.lower_energy(),
            SearchDirection::Higher => continuum.upper_energy(),
        };
        return Ok(data.find_channel(edge));
    }

    let sigma = peak.sigma();
    if !(sigma > 0.0 && sigma.is_finite()) {
        return Err(RoiError::InvalidSigma(sigma));
    }

    let walker = Walker {
        data,
        config,
        direction,
        high_res: num_channels >= config.high_res_min_channels,
    };

    let start = walker.channel_at_nsigma(peak, config.start_nsigma);
    let cap = walker.channel_at_nsigma(peak, config.max_nsigma);
    let floor = walker.channel_at_nsigma(peak, config.min_nsigma);
    let guard = match direction {
        SearchDirection::Lower => {
            let (extent_lower, _) = config
                .spectroscopic_extent
                .unwrap_or_else(|| spectroscopic_extent(data));
            (extent_lower as f64 <= config.extent_guard_fraction * num_channels as f64)
                .then_some(extent_lower)
        }
        SearchDirection::Higher => None,
    };

    let anchor = walker.find_anchor(start, cap, guard);
    let refined = walker.refine(anchor, cap, guard);
    let clamped = walker.clamp_to_skew_limit(peak, refined);
    let boundary = walker.outermost(clamped, floor);

    debug!(
        "{direction:?} ROI limit for peak at {:.3}: anchor {anchor}, refined {refined}, \
         clamped {clamped}, final {boundary}",
        peak.mean()
    );
    Ok(boundary)
}

/// Energy range `(lower, upper)` of the peak's ROI.
///
/// A range already set on the continuum is returned unchanged; otherwise the
/// bounds are the outer edges of the two boundary channels.
pub fn find_roi_range(
    peak: &Peak,
    data: &Spectrum,
    config: &RoiSearchConfig,
) -> Result<(f64, f64)> {
    let lower = find_roi_limit(peak, data, SearchDirection::Lower, config)?;
    let upper = find_roi_limit(peak, data, SearchDirection::Higher, config)?;
    let continuum = peak.continuum();
    if continuum.energy_range_defined() {
        return Ok((continuum.lower_energy(), continuum.upper_energy()));
    }
    Ok((data.channel_lower(lower), data.channel_upper(upper)))
}

/// [`find_roi_range`] for many independent peaks, in parallel.
///
/// Results are in input order.
#[must_use]
pub fn find_roi_ranges(
    peaks: &[Peak],
    data: &Spectrum,
    config: &RoiSearchConfig,
) -> Vec<Result<(f64, f64)>> {
    peaks
        .par_iter()
        .map(|peak| find_roi_range(peak, data, config))
        .collect()
}

/// Searches the ROI, stores it on the peak's own continuum and optionally
/// seeds a linear continuum from the boundary sidebands.
///
/// A continuum shared with other peaks is copied first. A continuum that
/// already has a range is left as it is.
pub fn prepare_roi(
    peak: &mut Peak,
    data: &Spectrum,
    config: &RoiPrepConfig,
) -> Result<(f64, f64)> {
    let (lower, upper) = find_roi_range(peak, data, &config.search)?;
    if peak.continuum().energy_range_defined() {
        return Ok((lower, upper));
    }
    let continuum = peak.continuum_mut();
    if config.seed_continuum {
        continuum.estimate_linear_from_sidebands(data, lower, upper, config.sideband_channels);
    } else {
        continuum.set_range(lower, upper);
    }
    debug!("prepared ROI [{lower:.3}, {upper:.3}] for peak at {:.3}", peak.mean());
    Ok((lower, upper))
}
