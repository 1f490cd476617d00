//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EmbeddingError, Result};

/// Anything that carries an id, a text and its embedding.
pub trait Embedded {
    fn id(&self) -> &str;
    fn text(&self) -> &str;
    fn embedding(&self) -> &[f32];
}

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical vectors
/// - 0.0 means orthogonal vectors (or a zero vector on either side)
/// - -1.0 means opposite vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// One ranked example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    /// ID of the matched item.
    pub id: String,

    /// The example text.
    pub text: String,

    /// Raw cosine similarity to the query.
    pub score: f32,
}

/// Rank `items` against `query` and return at most `top_n` of them.
///
/// Ordering is by descending score; equal scores keep their input order.
/// Degenerate input (no items, an empty query, or an embedding whose
/// dimension differs from the query) yields an empty result rather than an
/// error.
pub fn top_similar<T: Embedded>(query: &[f32], items: &[T], top_n: usize) -> Vec<ScoredItem> {
    if items.is_empty() {
        warn!("No items provided for similarity search");
        return Vec::new();
    }

    if query.is_empty() {
        warn!("Empty query embedding provided");
        return Vec::new();
    }

    let mut scores: Vec<(usize, f32)> = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        match cosine_similarity(query, item.embedding()) {
            Ok(score) => scores.push((position, score)),
            Err(e) => {
                warn!("Similarity search aborted on item {}: {e}", item.id());
                return Vec::new();
            }
        }
    }

    // Stable sort, so ties stay in input order
    scores.sort_by_key(|(_, score)| Reverse(OrderedFloat(*score)));

    scores
        .into_iter()
        .take(top_n.min(items.len()))
        .map(|(position, score)| {
            let item = &items[position];
            ScoredItem {
                id: item.id().to_string(),
                text: item.text().to_string(),
                score,
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) struct Item {
        pub id: &'static str,
        pub embedding: Vec<f32>,
    }

    impl Embedded for Item {
        fn id(&self) -> &str {
            self.id
        }

        fn text(&self) -> &str {
            self.id
        }

        fn embedding(&self) -> &[f32] {
            &self.embedding
        }
    }

    pub(crate) fn item(id: &'static str, embedding: &[f32]) -> Item {
        Item {
            id,
            embedding: embedding.to_vec(),
        }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).unwrap();
        assert!((sim - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]).unwrap();
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let sim = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_top_similar_orders_by_score() {
        let items = vec![
            item("b", &[0.0, 1.0, 0.0]),
            item("a", &[1.0, 0.0, 0.0]),
            item("c", &[0.7, 0.7, 0.0]),
        ];

        let results = top_similar(&[1.0, 0.0, 0.0], &items, 2);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_top_similar_ties_keep_input_order() {
        let items = vec![
            item("first", &[2.0, 0.0]),
            item("worse", &[0.0, 1.0]),
            item("second", &[1.0, 0.0]),
            item("third", &[3.0, 0.0]),
        ];

        let results = top_similar(&[1.0, 0.0], &items, 10);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third", "worse"]);
    }

    #[test]
    fn test_top_similar_clamps_to_item_count() {
        let items = vec![item("a", &[1.0, 0.0]), item("b", &[-1.0, 0.0])];
        let results = top_similar(&[1.0, 0.0], &items, 50);

        assert_eq!(results.len(), 2);
        assert!((results[1].score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_top_similar_degenerate_inputs() {
        let items = vec![item("a", &[1.0, 0.0])];
        let none: Vec<Item> = Vec::new();

        assert!(top_similar(&[1.0, 0.0], &none, 3).is_empty());
        assert!(top_similar(&[], &items, 3).is_empty());
        assert!(top_similar(&[1.0, 0.0, 0.0], &items, 3).is_empty());
        assert!(top_similar(&[1.0, 0.0], &items, 0).is_empty());
    }
}
