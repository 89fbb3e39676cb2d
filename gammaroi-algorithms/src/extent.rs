//! Usable channel range of a spectrum.

use gammaroi_core::Spectrum;

/// Largest fraction of the channel range treated as a threshold ramp.
const MAX_RAMP_FRACTION: usize = 25;

/// First and last channels holding spectroscopic data.
///
/// Leading and trailing empty channels are excluded, as is the steep rise at
/// the low end produced by a hardware threshold: channels are skipped while
/// the next channel more than doubles, for at most 4% of the spectrum. An
/// empty spectrum spans every channel.
#[must_use]
pub fn spectroscopic_extent(data: &Spectrum) -> (usize, usize) {
    let counts = data.counts();
    let last_channel = counts.len().saturating_sub(1);
    let Some(first) = counts.iter().position(|&c| c > 0.0) else {
        return (0, last_channel);
    };
    let upper = counts.iter().rposition(|&c| c > 0.0).unwrap_or(last_channel);

    let max_ramp = (counts.len() / MAX_RAMP_FRACTION).max(1);
    let mut lower = first;
    while lower < upper && lower - first < max_ramp && counts[lower + 1] > 2.0 * counts[lower] {
        lower += 1;
    }
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(counts: Vec<f64>) -> Spectrum {
        Spectrum::uniform(0.0, 1.0, counts).unwrap()
    }

    #[test]
    fn test_extent_skips_empty_channels() {
        let mut counts = vec![50.0; 200];
        counts[..5].fill(0.0);
        counts[190..].fill(0.0);
        assert_eq!(spectroscopic_extent(&spectrum(counts)), (5, 189));
    }

    #[test]
    fn test_extent_skips_threshold_ramp() {
        let mut counts = vec![100.0; 200];
        counts[..10].fill(0.0);
        counts[10..14].copy_from_slice(&[1.0, 3.0, 9.0, 27.0]);
        counts[14] = 81.0;
        assert_eq!(spectroscopic_extent(&spectrum(counts)), (14, 199));
    }

    #[test]
    fn test_extent_ramp_is_bounded() {
        // Doubles forever; only 4% of 200 channels may be skipped.
        let counts: Vec<f64> = (0..200).map(|i| 2.5f64.powi(i)).collect();
        assert_eq!(spectroscopic_extent(&spectrum(counts)), (8, 199));
    }

    #[test]
    fn test_extent_of_empty_spectrum() {
        assert_eq!(spectroscopic_extent(&spectrum(vec![0.0; 130])), (0, 129));
    }
}
