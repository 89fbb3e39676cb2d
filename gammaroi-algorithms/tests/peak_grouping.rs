#![allow(clippy::cast_precision_loss)]
use approx::assert_relative_eq;
use gammaroi_algorithms::{
    causally_connected, group_causally_connected, prepare_roi, share_continuum, Peak,
    RoiPrepConfig, Spectrum,
};
use gammaroi_core::OffsetType;

fn synthetic_spectrum(channels: usize, background: f64, peaks: &[(f64, f64, f64)]) -> Spectrum {
    let shapes: Vec<Peak> = peaks
        .iter()
        .map(|&(mean, sigma, amplitude)| Peak::new(mean, sigma, amplitude))
        .collect();
    let counts = (0..channels)
        .map(|i| {
            let lo = i as f64;
            background
                + shapes
                    .iter()
                    .map(|p| p.gauss_integral(lo, lo + 1.0).unwrap())
                    .sum::<f64>()
        })
        .collect();
    Spectrum::uniform(0.0, 1.0, counts).unwrap()
}

const LINES: [(f64, f64, f64); 3] = [
    (661.0, 3.0, 5000.0),
    (690.0, 3.0, 8000.0),
    (1332.0, 4.0, 6000.0),
];

fn prepared_peaks(data: &Spectrum) -> Vec<Peak> {
    LINES
        .iter()
        .map(|&(mean, sigma, amplitude)| {
            let mut peak = Peak::new(mean, sigma, amplitude);
            prepare_roi(&mut peak, data, &RoiPrepConfig::default()).unwrap();
            peak
        })
        .collect()
}

#[test]
fn test_prepared_ranges() {
    let data = synthetic_spectrum(2048, 60.0, &LINES);
    let peaks = prepared_peaks(&data);

    let ranges: Vec<(f64, f64)> = peaks.iter().map(|p| (p.lower_x(), p.upper_x())).collect();
    assert_eq!(ranges, vec![(639.0, 682.0), (668.0, 712.0), (1303.0, 1361.0)]);

    for peak in &peaks {
        let continuum = peak.continuum();
        assert_eq!(continuum.offset_type(), OffsetType::Linear);
        assert_relative_eq!(continuum.reference_energy(), peak.lower_x());
    }
    // Clear low sidebands sit on the flat 60 counts/keV background; the
    // 690 keV line's low sideband still holds the 661 keV line's tail.
    assert_relative_eq!(peaks[0].continuum().parameters()[0], 60.0, epsilon = 1.0);
    assert_relative_eq!(peaks[2].continuum().parameters()[0], 60.0, epsilon = 0.5);
    assert!(peaks[1].continuum().parameters()[0] > 65.0);
}

#[test]
fn test_roi_overlap_connects_neighbours() {
    let data = synthetic_spectrum(2048, 60.0, &LINES);
    let peaks = prepared_peaks(&data);

    // 661 + 3*3 = 670 < 690 - 3*3 = 681, but the ROIs overlap.
    assert!(!causally_connected(&peaks[0], &peaks[1], 3.0, false));
    assert!(causally_connected(&peaks[0], &peaks[1], 3.0, true));
    assert!(!causally_connected(&peaks[1], &peaks[2], 3.0, true));

    for a in &peaks {
        for b in &peaks {
            assert_eq!(
                causally_connected(a, b, 3.0, false),
                causally_connected(b, a, 3.0, false)
            );
        }
    }

    assert_eq!(
        group_causally_connected(&peaks, 3.0, true),
        vec![vec![0, 1], vec![2]]
    );
    assert_eq!(
        group_causally_connected(&peaks, 3.0, false),
        vec![vec![0], vec![1], vec![2]]
    );
}

#[test]
fn test_group_shares_one_continuum() {
    let data = synthetic_spectrum(2048, 60.0, &LINES);
    let mut peaks = prepared_peaks(&data);

    let (low, high) = peaks.split_at_mut(1);
    share_continuum(&mut [&mut low[0], &mut high[0]]);

    assert!(peaks[0].shares_continuum_with(&peaks[1]));
    assert!(!peaks[0].shares_continuum_with(&peaks[2]));
    assert_relative_eq!(peaks[1].lower_x(), 639.0);
    assert_relative_eq!(peaks[0].upper_x(), 712.0);
}
