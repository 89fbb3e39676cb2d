//! Low-energy tail shapes added on top of a Gaussian peak.
//!
//! Two families are available, selected per peak by [`SkewType`]:
//!
//! - **Landau**: a Landau-distributed tail extending toward lower energy with
//!   its own amplitude, mode and scale. The Landau CDF has no closed form and
//!   is evaluated with a piecewise rational/asymptotic approximation.
//! - **ExGauss**: an exponential tail convolved with the peak Gaussian, whose
//!   integral is closed-form in terms of `erfc`.
//!
//! Skew parameters are stored as three generic slots; [`SkewType`] fixes their
//! meaning.

use crate::stats::normal_cdf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tail family attached to a Gaussian peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SkewType {
    /// Pure Gaussian.
    #[default]
    NoSkew,
    /// Landau tail: `[amplitude, mode, scale]`.
    LandauSkew,
    /// Exponential tail convolved with the Gaussian: `[amplitude, tail length]`.
    ExGaussSkew,
}

/// Parameter names per skew type; unused slots are `None`.
const SKEW_PARAMETER_NAMES: [[Option<&str>; 3]; 3] = [
    [None, None, None],
    [Some("LandauAmplitude"), Some("LandauMode"), Some("LandauSigma")],
    [Some("ExGaussAmplitude"), Some("ExGaussTailLength"), None],
];

impl SkewType {
    fn index(self) -> usize {
        match self {
            Self::NoSkew => 0,
            Self::LandauSkew => 1,
            Self::ExGaussSkew => 2,
        }
    }

    /// Number of skew parameters this family uses.
    #[must_use]
    pub fn num_parameters(self) -> usize {
        SKEW_PARAMETER_NAMES[self.index()]
            .iter()
            .filter(|name| name.is_some())
            .count()
    }

    /// Name of skew parameter slot `slot`, if this family uses it.
    #[must_use]
    pub fn parameter_name(self, slot: usize) -> Option<&'static str> {
        SKEW_PARAMETER_NAMES[self.index()].get(slot).copied().flatten()
    }

    /// Integral of the tail between `x0` and `x1`.
    ///
    /// `pars` are the three skew slots of the peak.
    #[must_use]
    pub fn integral(self, x0: f64, x1: f64, mean: f64, sigma: f64, pars: &[f64; 3]) -> f64 {
        match self {
            Self::NoSkew => 0.0,
            Self::LandauSkew => landau_integral(x0, x1, mean, pars[0], pars[1], pars[2]),
            Self::ExGaussSkew => exgauss_tail_integral(x0, x1, mean, sigma, pars[0], pars[1]),
        }
    }

    /// Distance below the mean over which the tail carries most of its area.
    ///
    /// Used for provisional ROI bounds before a real ROI is determined.
    #[must_use]
    pub fn low_side_extent(self, sigma: f64, pars: &[f64; 3]) -> f64 {
        match self {
            Self::NoSkew => 0.0,
            Self::LandauSkew => (pars[1] + 10.0 * pars[2].abs()).max(0.0),
            Self::ExGaussSkew => 3.0 * pars[1].max(0.0) + sigma,
        }
    }
}

// Rational coefficients for the central Landau CDF regions.
const P1: [f64; 5] = [
    0.251_409_149_1,
    -0.062_505_804_44,
    0.014_583_812_30,
    -0.002_108_817_737,
    0.000_741_124_729_0,
];
const Q1: [f64; 5] = [
    1.0,
    -0.005_571_175_625,
    0.062_253_102_36,
    -0.003_137_378_427,
    0.001_931_496_439,
];
const P2: [f64; 4] = [0.286_832_858_4, 0.356_436_323_1, 0.152_351_869_5, 0.022_513_048_83];
const Q2: [f64; 4] = [1.0, 0.619_113_613_7, 0.172_072_144_8, 0.022_785_947_71];
const P3: [f64; 4] = [0.286_832_906_6, 0.300_382_843_6, 0.099_509_519_41, 0.008_733_827_185];
const Q3: [f64; 4] = [1.0, 0.423_719_050_2, 0.109_563_151_2, 0.008_693_851_567];
const P4: [f64; 4] = [1.000_351_630, 4.503_592_498, 10.858_838_80, 7.536_052_269];
const Q4: [f64; 4] = [1.0, 5.539_969_678, 19.335_811_11, 27.213_215_08];
const P5: [f64; 4] = [1.000_006_517, 49.094_141_11, 85.055_447_53, 153.215_345_5];
const Q5: [f64; 4] = [1.0, 50.099_288_81, 139.981_910_4, 420.000_290_9];
const P6: [f64; 4] = [1.000_000_983, 132.986_845_6, 916.214_924_4, -960.505_427_4];
const Q6: [f64; 4] = [1.0, 133.988_784_3, 1055.990_413, 553.222_461_9];
// Asymptotic expansions for the far tails.
const A1: [f64; 3] = [-0.458_333_333_3, 0.667_534_722_2, -1.641_741_416];
const A2: [f64; 3] = [1.0, -0.422_784_335_1, -2.043_403_138];

fn rational4(p: &[f64; 4], q: &[f64; 4], t: f64) -> f64 {
    (p[0] + (p[1] + (p[2] + p[3] * t) * t) * t) / (q[0] + (q[1] + (q[2] + q[3] * t) * t) * t)
}

/// Cumulative Landau distribution with location `mode` and scale `scale`.
///
/// Piecewise approximation over the standardized variable
/// `v = (x - mode) / scale`: asymptotic forms for `v < -5.5` and `v >= 300`,
/// rational functions in `v` or `1/v` in between. Adjacent regions agree to
/// better than 1e-7 at their joins.
#[must_use]
pub fn landau_cdf(x: f64, mode: f64, scale: f64) -> f64 {
    let v = (x - mode) / scale;
    if v.is_nan() {
        return 0.0;
    }

    if v < -5.5 {
        let u = (v + 1.0).exp();
        if u <= 0.0 {
            return 0.0;
        }
        0.398_942_280_3 * (-1.0 / u).exp() * u.sqrt() * (1.0 + (A1[0] + (A1[1] + A1[2] * u) * u) * u)
    } else if v < -1.0 {
        let u = (-v - 1.0).exp();
        let num = P1[0] + (P1[1] + (P1[2] + (P1[3] + P1[4] * v) * v) * v) * v;
        let den = Q1[0] + (Q1[1] + (Q1[2] + (Q1[3] + Q1[4] * v) * v) * v) * v;
        ((-u).exp() / u.sqrt()) * num / den
    } else if v < 1.0 {
        rational4(&P2, &Q2, v)
    } else if v < 4.0 {
        rational4(&P3, &Q3, v)
    } else if v < 12.0 {
        rational4(&P4, &Q4, 1.0 / v)
    } else if v < 50.0 {
        rational4(&P5, &Q5, 1.0 / v)
    } else if v < 300.0 {
        rational4(&P6, &Q6, 1.0 / v)
    } else {
        let u = 1.0 / (v - v * v.ln() / (v + 1.0));
        1.0 - (A2[0] + (A2[1] + A2[2] * u) * u) * u
    }
}

/// Area of a Landau tail between energies `x0` and `x1`.
///
/// The tail is mirrored about the peak mean so it extends toward lower
/// energy: `amplitude * (F(mean - x0) - F(mean - x1))`. Returns zero for a
/// non-positive amplitude or scale.
#[must_use]
pub fn landau_integral(x0: f64, x1: f64, mean: f64, amplitude: f64, mode: f64, scale: f64) -> f64 {
    if amplitude <= 0.0 || scale <= 0.0 {
        return 0.0;
    }
    amplitude * (landau_cdf(mean - x0, mode, scale) - landau_cdf(mean - x1, mode, scale))
}

/// Beyond this argument `erfc` is replaced by its scaled asymptotic series.
const ERFC_ASYMPTOTIC_START: f64 = 5.0;

/// `exp(x^2) * erfc(x)` for large positive `x`.
fn erfcx_asymptotic(x: f64) -> f64 {
    let inv2 = 1.0 / (x * x);
    (1.0 - 0.5 * inv2 + 0.75 * inv2 * inv2 - 1.875 * inv2 * inv2 * inv2)
        / (x * std::f64::consts::PI.sqrt())
}

/// CDF of a Gaussian minus an exponential variate (tail toward low energy).
///
/// `F(x) = Phi(u) + exp(lambda (x - mean) + lambda^2 sigma^2 / 2) * Q(u + lambda sigma)`
/// with `u = (x - mean) / sigma`, `lambda = 1 / tail_length`.
#[must_use]
pub fn exgauss_tail_cdf(x: f64, mean: f64, sigma: f64, tail_length: f64) -> f64 {
    let u = (x - mean) / sigma;
    if tail_length <= 0.0 {
        return normal_cdf(u);
    }
    let ls = sigma / tail_length;
    let b = (u + ls) / std::f64::consts::SQRT_2;
    let tail = if b > ERFC_ASYMPTOTIC_START {
        // exp(a) erfc(b) == exp(-u^2 / 2) erfcx(b)
        0.5 * (-0.5 * u * u).exp() * erfcx_asymptotic(b)
    } else {
        let a = ls * u + 0.5 * ls * ls;
        0.5 * a.exp() * libm::erfc(b)
    };
    (normal_cdf(u) + tail).clamp(0.0, 1.0)
}

/// Area of an exponential low-energy tail between `x0` and `x1`.
///
/// The whole tail integrates to `amplitude`. Returns zero for a non-positive
/// amplitude or sigma.
#[must_use]
pub fn exgauss_tail_integral(
    x0: f64,
    x1: f64,
    mean: f64,
    sigma: f64,
    amplitude: f64,
    tail_length: f64,
) -> f64 {
    if amplitude <= 0.0 || sigma <= 0.0 {
        return 0.0;
    }
    amplitude
        * (exgauss_tail_cdf(x1, mean, sigma, tail_length)
            - exgauss_tail_cdf(x0, mean, sigma, tail_length))
}
