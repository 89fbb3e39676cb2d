//! Binned gamma-ray spectrum.
//!
//! A `Spectrum` stores channel edges and channel contents in two parallel
//! vectors. Binning may be non-uniform; energies must be strictly increasing.
//! Once built a spectrum is never mutated, so it can be shared freely across
//! threads (typically behind an `Arc`).

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Histogram of counts versus energy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spectrum {
    /// Channel edges, `num_channels() + 1` entries.
    edges: Vec<f64>,
    /// Counts per channel.
    counts: Vec<f64>,
}

impl Spectrum {
    /// Creates a spectrum from channel edges and channel contents.
    ///
    /// `edges` holds the lower edge of every channel followed by the upper
    /// edge of the last channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpectrum`] if the lengths disagree, there are no
    /// channels, the edges are not strictly increasing and finite, or a count
    /// is negative or non-finite.
    pub fn new(edges: Vec<f64>, counts: Vec<f64>) -> Result<Self> {
        if counts.is_empty() {
            return Err(Error::InvalidSpectrum("spectrum has no channels".into()));
        }
        if edges.len() != counts.len() + 1 {
            return Err(Error::InvalidSpectrum(format!(
                "{} channel edges given for {} channels",
                edges.len(),
                counts.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidSpectrum(
                "channel energies must be finite and strictly increasing".into(),
            ));
        }
        if let Some(bad) = counts.iter().position(|c| !c.is_finite() || *c < 0.0) {
            return Err(Error::InvalidSpectrum(format!(
                "channel {bad} has invalid content {}",
                counts[bad]
            )));
        }
        Ok(Self { edges, counts })
    }

    /// Creates a spectrum with equal-width channels starting at `start`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Spectrum::new`]; a non-positive `width` yields
    /// non-increasing edges.
    #[allow(clippy::cast_precision_loss)]
    pub fn uniform(start: f64, width: f64, counts: Vec<f64>) -> Result<Self> {
        let edges = (0..=counts.len())
            .map(|i| start + width * i as f64)
            .collect();
        Self::new(edges, counts)
    }

    /// Number of channels.
    #[must_use]
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.counts.len()
    }

    /// Channel contents.
    #[must_use]
    #[inline]
    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    /// Channel edges (`num_channels() + 1` values).
    #[must_use]
    #[inline]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Content of `channel`.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= num_channels()`.
    #[must_use]
    #[inline]
    pub fn count(&self, channel: usize) -> f64 {
        self.counts[channel]
    }

    /// Lower energy edge of `channel`.
    #[must_use]
    #[inline]
    pub fn channel_lower(&self, channel: usize) -> f64 {
        self.edges[channel]
    }

    /// Upper energy edge of `channel`.
    #[must_use]
    #[inline]
    pub fn channel_upper(&self, channel: usize) -> f64 {
        self.edges[channel + 1]
    }

    /// Center energy of `channel`.
    #[must_use]
    #[inline]
    pub fn channel_center(&self, channel: usize) -> f64 {
        0.5 * (self.edges[channel] + self.edges[channel + 1])
    }

    /// Energy width of `channel`.
    #[must_use]
    #[inline]
    pub fn channel_width(&self, channel: usize) -> f64 {
        self.edges[channel + 1] - self.edges[channel]
    }

    /// Lowest energy covered by the spectrum.
    #[must_use]
    pub fn lower_energy(&self) -> f64 {
        self.edges[0]
    }

    /// Highest energy covered by the spectrum.
    #[must_use]
    pub fn upper_energy(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Channel containing `energy`, clamped to the first/last channel when
    /// the energy lies outside the spectrum.
    #[must_use]
    pub fn find_channel(&self, energy: f64) -> usize {
        let last = self.num_channels() - 1;
        if energy.is_nan() || energy < self.edges[0] {
            return 0;
        }
        if energy >= self.edges[last + 1] {
            return last;
        }
        // First edge strictly greater than `energy` bounds the channel above.
        self.edges.partition_point(|&e| e <= energy).saturating_sub(1).min(last)
    }

    /// Sum of channel contents from `first` to `last`, inclusive.
    ///
    /// The order of the arguments does not matter; indices past the end are
    /// clamped to the last channel.
    #[must_use]
    pub fn sum_channels(&self, first: usize, last: usize) -> f64 {
        let (lo, hi) = if first <= last { (first, last) } else { (last, first) };
        let hi = hi.min(self.num_channels() - 1);
        if lo > hi {
            return 0.0;
        }
        self.counts[lo..=hi].iter().sum()
    }

    /// Sum of all channel contents.
    #[must_use]
    pub fn total_counts(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// Counts between energies `x0` and `x1`.
    ///
    /// Channels only partially covered contribute in proportion to the
    /// overlapped fraction of their width. The range is clamped to the
    /// spectrum; reversed bounds are swapped.
    #[must_use]
    pub fn integral(&self, x0: f64, x1: f64) -> f64 {
        let (x0, x1) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let x0 = x0.max(self.lower_energy());
        let x1 = x1.min(self.upper_energy());
        if x1 <= x0 {
            return 0.0;
        }

        let first = self.find_channel(x0);
        let last = self.find_channel(x1);
        if first == last {
            return self.counts[first] * (x1 - x0) / self.channel_width(first);
        }

        let head = self.counts[first] * (self.channel_upper(first) - x0) / self.channel_width(first);
        let tail = self.counts[last] * (x1 - self.channel_lower(last)) / self.channel_width(last);
        let body: f64 = self.counts[first + 1..last].iter().sum();
        head + body + tail
    }
}
