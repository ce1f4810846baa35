use std::collections::BTreeMap;

use serde_json::Value;

/// Primitive-valued metadata attached to an indexed item.
pub type Metadata = BTreeMap<String, Value>;

pub const META_ERROR_CODE: &str = "error_code";
pub const META_SHEET: &str = "sheet";
pub const META_ORIGIN_FIELD: &str = "origin_field";
pub const META_OWNER: &str = "owner";

#[derive(Debug, Clone, PartialEq)]
pub struct VectorItem {
    /// Serialized record; embedded at ingestion and shown at answer time.
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

impl VectorItem {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            embedding,
            metadata,
        }
    }

    /// String metadata value, or `None` when absent or not a string.
    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// The stored error code, empty if missing.
    #[must_use]
    pub fn error_code(&self) -> &str {
        self.meta_str(META_ERROR_CODE).unwrap_or_default()
    }
}
