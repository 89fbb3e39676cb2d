//! Counting statistics used by the ROI search and continuum estimation.
#![allow(clippy::cast_precision_loss)]

use crate::spectrum::Spectrum;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Standard normal cumulative distribution function.
#[must_use]
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * libm::erfc(-z / std::f64::consts::SQRT_2)
}

/// Probability that a standard normal variable lies in `(z0, z1)`.
///
/// Evaluated from the nearer tail so far-tail intervals keep full relative
/// precision.
#[must_use]
pub fn normal_interval(z0: f64, z1: f64) -> f64 {
    use std::f64::consts::SQRT_2;
    if z0 >= 0.0 {
        0.5 * (libm::erfc(z0 / SQRT_2) - libm::erfc(z1 / SQRT_2))
    } else if z1 <= 0.0 {
        0.5 * (libm::erfc(-z1 / SQRT_2) - libm::erfc(-z0 / SQRT_2))
    } else {
        1.0 - 0.5 * libm::erfc(z1 / SQRT_2) - 0.5 * libm::erfc(-z0 / SQRT_2)
    }
}

/// Natural log of `n!`.
fn ln_factorial(n: u64) -> f64 {
    libm::lgamma(n as f64 + 1.0)
}

/// Probability that a Poisson variable with the given mean is at most `k`.
#[must_use]
pub fn poisson_cdf(k: u64, mean: f64) -> f64 {
    if mean <= 0.0 {
        return 1.0;
    }
    let ln_mean = mean.ln();
    let mut sum = 0.0;
    for i in 0..=k {
        sum += (i as f64 * ln_mean - mean - ln_factorial(i)).exp();
    }
    sum.min(1.0)
}

/// Smallest `k` with `P(X <= k) >= p` for `X ~ Poisson(mean)`.
///
/// A non-positive mean always yields zero. The walk is bounded well past the
/// distribution's bulk so that `p` values at or above one terminate.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn poisson_quantile(p: f64, mean: f64) -> u64 {
    if mean <= 0.0 || p <= 0.0 {
        return 0;
    }
    let limit = (mean + 40.0 * mean.sqrt() + 100.0).ceil() as u64;
    let ln_mean = mean.ln();
    let mut cumulative = 0.0;
    for k in 0..=limit {
        cumulative += (k as f64 * ln_mean - mean - ln_factorial(k)).exp();
        if cumulative >= p {
            return k;
        }
    }
    limit
}

/// Average content per channel of a contiguous channel range, with its
/// Poisson-propagated uncertainty.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionStats {
    /// Mean counts per channel.
    pub mean: f64,
    /// Uncertainty of `mean` (`sqrt(sum) / channels`).
    pub uncertainty: f64,
    /// Number of channels summed.
    pub channels: usize,
}

impl RegionStats {
    /// Builds the statistics from a summed content over `channels` channels.
    #[must_use]
    pub fn from_sum(sum: f64, channels: usize) -> Self {
        if channels == 0 {
            return Self {
                mean: 0.0,
                uncertainty: 0.0,
                channels: 0,
            };
        }
        let n = channels as f64;
        Self {
            mean: sum / n,
            uncertainty: sum.max(0.0).sqrt() / n,
            channels,
        }
    }

    /// Statistics of channels `first..=last` (order-insensitive).
    #[must_use]
    pub fn from_channels(data: &Spectrum, first: usize, last: usize) -> Self {
        let (lo, hi) = if first <= last { (first, last) } else { (last, first) };
        let hi = hi.min(data.num_channels() - 1);
        let lo = lo.min(hi);
        Self::from_sum(data.sum_channels(lo, hi), hi - lo + 1)
    }

    /// Statistics of every channel touched by the energy range `(lower, upper)`.
    #[must_use]
    pub fn from_energy_range(data: &Spectrum, lower: f64, upper: f64) -> Self {
        Self::from_channels(data, data.find_channel(lower), data.find_channel(upper))
    }

    /// Returns true unless `other`'s mean lies more than `n_sigma` combined
    /// uncertainties below this region's mean.
    #[must_use]
    pub fn is_statistically_greater_or_equal(&self, other: &Self, n_sigma: f64) -> bool {
        let combined = self.uncertainty.hypot(other.uncertainty);
        other.mean >= self.mean - n_sigma * combined
    }
}

/// Tests whether the average content of `region2` is statistically at least
/// that of `region1`.
///
/// Each region is an energy range `(lower, upper)`. Averages are per channel,
/// uncertainties are Poisson-propagated and combined in quadrature. Returns
/// true iff region2's average is not more than `n_sigma` combined
/// uncertainties below region1's.
#[must_use]
pub fn is_statistically_greater_or_equal(
    region1: (f64, f64),
    region2: (f64, f64),
    data: &Spectrum,
    n_sigma: f64,
) -> bool {
    let first = RegionStats::from_energy_range(data, region1.0, region1.1);
    let second = RegionStats::from_energy_range(data, region2.0, region2.1);
    first.is_statistically_greater_or_equal(&second, n_sigma)
}

/// Running unweighted least-squares line fit.
///
/// Points are accumulated as sums, so a fit can grow one point at a time
/// without storing the points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineFit {
    points: usize,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_xy: f64,
}

impl LineFit {
    /// Adds one `(x, y)` point.
    pub fn push(&mut self, x: f64, y: f64) {
        self.points += 1;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_xy += x * y;
    }

    /// Number of points accumulated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points
    }

    /// True before any point is added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points == 0
    }

    /// Drops every point.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns `(intercept, slope)`, or `None` with fewer than two points or
    /// when all `x` coincide.
    #[must_use]
    pub fn solve(&self) -> Option<(f64, f64)> {
        if self.points < 2 {
            return None;
        }
        let n = self.points as f64;
        let sxx = self.sum_xx - self.sum_x * self.sum_x / n;
        if sxx <= f64::EPSILON * n {
            return None;
        }
        let sxy = self.sum_xy - self.sum_x * self.sum_y / n;
        let slope = sxy / sxx;
        Some(((self.sum_y - slope * self.sum_x) / n, slope))
    }
}

/// Unweighted least-squares line through `(x, y)` points.
///
/// Returns `(intercept, slope)`, or `None` when fewer than two points are
/// given or all `x` coincide.
#[must_use]
pub fn fit_line(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let mut fit = LineFit::default();
    for &(x, y) in points {
        fit.push(x, y);
    }
    fit.solve()
}
