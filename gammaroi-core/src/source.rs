//! Candidate physical sources attributed to a peak.
//!
//! These are advisory annotations; nothing in the shape or ROI math reads them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Category of a candidate source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SourceKind {
    /// Gamma line of a radionuclide.
    Nuclide,
    /// Fluorescence x-ray of an element.
    Xray,
    /// Nuclear reaction gamma, e.g. neutron capture.
    Reaction,
}

/// One candidate explanation for a peak.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceMatch {
    pub kind: SourceKind,
    /// Nuclide, element or reaction name (e.g. `"Cs137"`, `"Pb"`).
    pub name: String,
    /// Relative plausibility; larger is better.
    pub weight: f64,
    /// Transition or line label, when known.
    pub transition: Option<String>,
}

impl SourceMatch {
    #[must_use]
    pub fn new(kind: SourceKind, name: impl Into<String>, weight: f64) -> Self {
        Self {
            kind,
            name: name.into(),
            weight,
            transition: None,
        }
    }

    /// Sets the transition label.
    #[must_use]
    pub fn with_transition(mut self, transition: impl Into<String>) -> Self {
        self.transition = Some(transition.into());
        self
    }
}
