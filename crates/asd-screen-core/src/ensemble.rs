//! Ensemble decision over per-modality probabilities.
//!
//! The verdict is the unweighted arithmetic mean of whatever probabilities
//! are available, thresholded at 0.5 with the boundary on the autistic side.

use crate::domain::{confidence_of, EnsembleVerdict, Label};

/// Merges the face and eye probabilities into a single verdict.
///
/// Absent modalities are skipped. With nothing left the `Unknown`
/// sentinel is returned.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn decide(face_probability: Option<f32>, eye_probability: Option<f32>) -> EnsembleVerdict {
    let available: Vec<f32> = [face_probability, eye_probability]
        .into_iter()
        .flatten()
        .collect();
    if available.is_empty() {
        return EnsembleVerdict::UNKNOWN;
    }

    let mean = available.iter().sum::<f32>() / available.len() as f32;

    EnsembleVerdict {
        label: Label::from_probability(mean),
        confidence: confidence_of(mean),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_mean_at_boundary_is_autistic() {
        let v = decide(Some(0.7), Some(0.3));
        assert_eq!(v.label, Label::Autistic);
        assert!(approx(v.confidence, 0.5));
    }

    #[test]
    fn test_face_only() {
        let v = decide(Some(0.2), None);
        assert_eq!(v.label, Label::NonAutistic);
        assert!(approx(v.confidence, 0.8));
    }

    #[test]
    fn test_eye_only() {
        let v = decide(None, Some(0.9));
        assert_eq!(v.label, Label::Autistic);
        assert!(approx(v.confidence, 0.9));
    }

    #[test]
    fn test_nothing_available() {
        assert_eq!(decide(None, None), EnsembleVerdict::UNKNOWN);
        assert_eq!(decide(None, None).confidence, 0.0);
    }

    #[test]
    fn test_single_probability_at_boundary() {
        assert_eq!(decide(Some(0.5), None).label, Label::Autistic);
    }

    #[test]
    fn test_mean_not_max() {
        let v = decide(Some(0.9), Some(0.0));
        assert_eq!(v.label, Label::NonAutistic);
        assert!(approx(v.confidence, 0.55));
    }

    #[test]
    fn test_confidence_range() {
        let steps = [0.0, 0.05, 0.3, 0.49, 0.5, 0.51, 0.8, 1.0];
        for &f in &steps {
            for e in steps.iter().map(|&e| Some(e)).chain(std::iter::once(None)) {
                let v = decide(Some(f), e);
                assert!(
                    (0.5..=1.0).contains(&v.confidence),
                    "face={f} eye={e:?} gave {}",
                    v.confidence
                );
            }
        }
    }
}
