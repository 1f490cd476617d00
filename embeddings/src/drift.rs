//! Era centroids and the drift score between them.
//!
//! A centroid is the dimension-wise mean of an era's embeddings; drift is
//! `1 - cosine(previous, current)`, so it sits in `[0, 2]` and grows as the
//! two eras' average meaning diverges.
//!
//! [`drift`] reports 0.0 when either side has no centroid. That value is
//! indistinguishable from "no shift at all", so callers that care about the
//! difference use [`try_drift`].

use tracing::warn;

use crate::Embedding;
use crate::similarity::{Embedded, cosine_similarity};

/// Mean embedding of `items`, or `None` when there is nothing to average.
pub fn centroid<T: Embedded>(items: &[T]) -> Option<Embedding> {
    let first = items.first()?;
    let dim = first.embedding().len();
    if dim == 0 {
        return None;
    }

    let n = items.len() as f32;
    let mut result = vec![0.0f32; dim];

    for item in items {
        let embedding = item.embedding();
        if embedding.len() != dim {
            warn!(
                "Cannot compute centroid: item {} has {} dimensions, expected {dim}",
                item.id(),
                embedding.len()
            );
            return None;
        }
        for (acc, val) in result.iter_mut().zip(embedding) {
            *acc += val / n;
        }
    }

    Some(result)
}

/// Drift between two centroids, `None` if either is missing or they differ in dimension.
pub fn try_drift(previous: Option<&[f32]>, current: Option<&[f32]>) -> Option<f32> {
    let (previous, current) = (previous?, current?);
    match cosine_similarity(previous, current) {
        Ok(sim) => Some((1.0 - sim).clamp(0.0, 2.0)),
        Err(e) => {
            warn!("Error computing centroid shift: {e}");
            None
        }
    }
}

/// Drift between two centroids, with absent data reported as 0.0.
pub fn drift(previous: Option<&[f32]>, current: Option<&[f32]>) -> f32 {
    try_drift(previous, current).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::tests::{Item, item};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_centroid_is_dimension_wise_mean() {
        let items = vec![item("a", &[1.0, 0.0, 4.0]), item("b", &[3.0, 2.0, 0.0])];
        assert_eq!(centroid(&items), Some(vec![2.0, 1.0, 2.0]));
    }

    #[test]
    fn test_centroid_of_nothing() {
        let items: Vec<Item> = Vec::new();
        assert_eq!(centroid(&items), None);
    }

    #[test]
    fn test_centroid_rejects_mixed_dimensions() {
        let items = vec![item("a", &[1.0, 0.0]), item("b", &[1.0, 0.0, 0.0])];
        assert_eq!(centroid(&items), None);
    }

    #[test]
    fn test_drift_against_self_is_zero() {
        let c = vec![0.3, -1.2, 0.7, 2.5];
        assert!(drift(Some(&c[..]), Some(&c[..])).abs() < 1e-6);
    }

    #[test]
    fn test_drift_grows_with_dissimilarity() {
        let base = [1.0, 0.0];
        let near = [0.9, 0.1];
        let orthogonal = [0.0, 1.0];
        let opposite = [-1.0, 0.0];

        let d_near = drift(Some(&base[..]), Some(&near[..]));
        let d_orth = drift(Some(&base[..]), Some(&orthogonal[..]));
        let d_opp = drift(Some(&base[..]), Some(&opposite[..]));

        assert!(d_near < d_orth);
        assert!((d_orth - 1.0).abs() < 1e-6);
        assert!((d_opp - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_centroid_reads_as_no_drift() {
        let c = [1.0, 0.0];
        assert_eq!(drift(None, Some(&c[..])), 0.0);
        assert_eq!(drift(Some(&c[..]), None), 0.0);
        assert_eq!(drift(None, None), 0.0);
        assert_eq!(try_drift(None, Some(&c[..])), None);
    }

    #[test]
    fn test_mismatched_centroids_have_no_drift_value() {
        assert_eq!(try_drift(Some(&[1.0, 0.0][..]), Some(&[1.0, 0.0, 0.0][..])), None);
        assert_eq!(drift(Some(&[1.0, 0.0][..]), Some(&[1.0, 0.0, 0.0][..])), 0.0);
    }
}
