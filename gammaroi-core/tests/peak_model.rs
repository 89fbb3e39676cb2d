use std::sync::Arc;

use approx::assert_relative_eq;
use gammaroi_core::{
    CoefficientType, Continuum, OffsetType, Peak, SkewType, SourceKind, SourceMatch, Spectrum,
};

fn tailed_peak() -> Peak {
    let mut peak = Peak::new(661.0, 3.0, 5000.0);
    peak.set_skew_type(SkewType::ExGaussSkew);
    peak.set_skew_parameter(0, 500.0).unwrap();
    peak.set_skew_parameter(1, 5.0).unwrap();
    peak.continuum_mut().set_range(600.0, 700.0);
    peak
}

#[test]
fn test_skewed_area_apportioning() {
    let mut peak = tailed_peak();
    let tail = peak.skew_integral(600.0, 700.0);
    assert_relative_eq!(tail, 500.0, max_relative = 1e-3);
    assert_relative_eq!(peak.peak_area(), 5000.0 + tail);

    peak.set_peak_area(2.0 * peak.peak_area());
    assert_relative_eq!(peak.amplitude(), 10_000.0, max_relative = 1e-12);
    assert_relative_eq!(peak.skew_integral(600.0, 700.0), 2.0 * tail, max_relative = 1e-12);
    // Shape parameter untouched.
    assert_relative_eq!(peak.coefficient(CoefficientType::SkewPar1), 5.0);
}

#[test]
fn test_switching_skew_family_resets_slots() {
    let mut peak = tailed_peak();
    peak.set_skew_type(SkewType::NoSkew);
    assert_eq!(peak.skew_parameters(), [0.0; 3]);
    assert!(!peak.fit_for(CoefficientType::SkewPar0));
    assert!(peak.set_skew_parameter(0, 1.0).is_err());
    assert_relative_eq!(peak.peak_area(), 5000.0);
}

#[test]
fn test_gaussian_symmetry_and_coverage() {
    let peak = Peak::new(661.0, 3.0, 5000.0);
    for k in [0.5, 1.0, 2.5, 4.0] {
        let below = peak.gauss_integral(661.0 - k * 3.0, 661.0).unwrap();
        let above = peak.gauss_integral(661.0, 661.0 + k * 3.0).unwrap();
        assert_relative_eq!(below, above, max_relative = 1e-12);
    }
    let full = peak.gauss_integral(631.0, 691.0).unwrap();
    assert!(full >= 0.999_99 * 5000.0);
}

#[test]
fn test_data_defined_area_against_continuum() {
    let mut counts = vec![20.0; 256];
    counts[100..110].iter_mut().for_each(|c| *c += 30.0);
    let data = Spectrum::uniform(0.0, 1.0, counts).unwrap();

    let mut peak = Peak::data_defined(95.0, 115.0);
    peak.continuum_mut().set_type(OffsetType::Constant);
    peak.continuum_mut().set_parameters(95.0, &[20.0], &[]).unwrap();
    assert_relative_eq!(peak.data_area(&data), 300.0, epsilon = 1e-9);
    assert!(peak.gauss_integral(95.0, 115.0).is_err());

    assert_relative_eq!(peak.peak_area(), 0.0);
    peak.set_peak_area(peak.data_area(&data));
    assert_relative_eq!(peak.peak_area(), 300.0, epsilon = 1e-9);
}

#[test]
fn test_shared_continuum_copy_on_write() {
    let mut shared = Continuum::with_type(OffsetType::Linear);
    shared.set_range(600.0, 720.0);
    let shared = Arc::new(shared);

    let mut a = Peak::new(661.0, 3.0, 5000.0);
    let mut b = Peak::new(690.0, 3.0, 8000.0);
    a.set_continuum(Arc::clone(&shared));
    b.set_continuum(Arc::clone(&shared));
    assert!(a.shares_continuum_with(&b));

    a.continuum_mut().set_parameter(0, 42.0, 1.0).unwrap();
    assert!(!a.shares_continuum_with(&b));
    assert_relative_eq!(b.continuum().parameters()[0], 0.0);
    assert_relative_eq!(a.continuum().parameters()[0], 42.0);

    b.make_continuum_unique();
    assert!(!Arc::ptr_eq(b.continuum(), &shared));
    assert_eq!(**b.continuum(), *shared);
}

#[test]
fn test_candidate_sources() {
    let mut peak = Peak::new(661.0, 3.0, 5000.0);
    assert!(peak.best_candidate_source().is_none());
    peak.add_candidate_source(SourceMatch::new(SourceKind::Xray, "Pb", 0.1));
    peak.add_candidate_source(SourceMatch::new(SourceKind::Nuclide, "Cs137", 0.95));
    assert_eq!(peak.best_candidate_source().map(|s| s.name.as_str()), Some("Cs137"));
}

#[cfg(feature = "serde")]
mod serde_roundtrip {
    use super::*;

    #[test]
    fn test_peak_json_roundtrip() {
        let mut peak = tailed_peak();
        peak.add_candidate_source(
            SourceMatch::new(SourceKind::Nuclide, "Cs137", 0.5).with_transition("661.657 keV"),
        );
        let json = serde_json::to_string(&peak).unwrap();
        let back: Peak = serde_json::from_str(&json).unwrap();
        assert_eq!(back, peak);
    }
}
