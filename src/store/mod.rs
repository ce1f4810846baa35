//! In-memory vector index over embedded error records.
//!
//! Built once during ingestion, then shared read-only (typically behind an
//! `Arc`) by every query. There is no update or delete path.
use thiserror::Error;
use tracing::debug;

pub mod models;
pub mod search;

pub use models::{Metadata, VectorItem};
pub use search::{ScoredItem, cosine_similarity};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("embedding dimension mismatch: index holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding has a non-finite value at position {position}")]
    NonFiniteEmbedding { position: usize },
}

/// Ordered collection of [`VectorItem`]s. Insertion order is preserved and
/// acts as the tie-break for equal similarity scores.
#[derive(Debug, Default)]
pub struct VectorStore {
    pub(crate) items: Vec<VectorItem>,
    dimensions: Option<usize>,
}

impl VectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. The first item fixes the dimensionality of the index;
    /// later items must match it. NaN or infinite components are rejected.
    pub fn add(&mut self, item: VectorItem) -> Result<(), StoreError> {
        if let Some(position) = item.embedding.iter().position(|v| !v.is_finite()) {
            return Err(StoreError::NonFiniteEmbedding { position });
        }
        let actual = item.embedding.len();
        match self.dimensions {
            Some(expected) if expected != actual => {
                return Err(StoreError::DimensionMismatch { expected, actual });
            }
            Some(_) => {}
            None => {
                debug!("Vector index dimensionality set to {actual}");
                self.dimensions = Some(actual);
            }
        }
        self.items.push(item);
        Ok(())
    }

    /// All items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[VectorItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Embedding length shared by every item, `None` while empty.
    #[must_use]
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}
