use super::{StoreError, VectorItem, VectorStore};

/// A search hit: similarity score and the item it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ScoredItem<'a> {
    pub score: f32,
    pub item: &'a VectorItem,
}

/// Cosine similarity of two equal-length vectors.
///
/// Returns 0.0 when either vector has zero norm or the result is not finite,
/// so a stray NaN can never outrank a real score.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32;
    if score.is_finite() { score } else { 0.0 }
}

impl VectorStore {
    /// Rank every item by cosine similarity to `query_vector` and return the
    /// best `top_k`, highest score first.
    ///
    /// Full linear scan. Equal scores keep insertion order. An empty index
    /// yields an empty result; a query whose length differs from the index
    /// dimensionality is an error.
    pub fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredItem<'_>>, StoreError> {
        let Some(expected) = self.dimensions else {
            return Ok(Vec::new());
        };
        if query_vector.len() != expected {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: query_vector.len(),
            });
        }

        let mut scored: Vec<ScoredItem<'_>> = self
            .items
            .iter()
            .map(|item| ScoredItem {
                score: cosine_similarity(query_vector, &item.embedding),
                item,
            })
            .collect();

        // `sort_by` is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}
