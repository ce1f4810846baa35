//! Startup ingestion: records → serialized text → embeddings → [`VectorStore`].
//!
//! Runs once, single-threaded, before any query is served.
pub mod csv_loader;

use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::embedder::Embedder;
use crate::record::ErrorRecord;
use crate::store::models::{META_ERROR_CODE, META_ORIGIN_FIELD, META_OWNER, META_SHEET};
use crate::store::{Metadata, VectorItem, VectorStore};

/// Embed every record and collect them into a new index.
///
/// Aborts on the first embedding failure.
pub fn build_store<E: Embedder + ?Sized>(
    records: &[ErrorRecord],
    embedder: &E,
) -> Result<VectorStore> {
    let total = records.len();
    info!("Indexing {total} records (embeddings)...");

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );

    let mut store = VectorStore::new();
    for (i, rec) in records.iter().enumerate() {
        let n = i + 1;
        let text = rec.as_text();
        let embedding = embedder.embed(&text).with_context(|| {
            format!("embedding failed on record {n} (code={})", rec.error_code)
        })?;

        store
            .add(VectorItem::new(text, embedding, record_metadata(rec)))
            .with_context(|| format!("cannot index record {n} (code={})", rec.error_code))?;

        pb.inc(1);
        if n % 10 == 0 || n == total {
            info!("  indexed {n}/{total}");
        }
    }
    pb.finish_and_clear();

    info!("Indexing complete");
    Ok(store)
}

/// Load the CSV at `csv_path` and build the index from it.
pub fn load_and_build<E: Embedder + ?Sized>(csv_path: &Path, embedder: &E) -> Result<VectorStore> {
    let records = csv_loader::load_error_records(csv_path)
        .with_context(|| format!("failed to load records from {}", csv_path.display()))?;
    build_store(&records, embedder)
}

fn record_metadata(rec: &ErrorRecord) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert(META_ERROR_CODE.to_string(), rec.error_code.clone().into());
    meta.insert(META_SHEET.to_string(), rec.sheet.clone().into());
    meta.insert(META_ORIGIN_FIELD.to_string(), rec.origin_field.clone().into());
    meta.insert(META_OWNER.to_string(), rec.owner.clone().into());
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::EmbedderError;
    use crate::embedder::mock::MockEmbedder;

    struct FailOnSecond(std::sync::atomic::AtomicUsize);

    impl Embedder for FailOnSecond {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedderError> {
            let n = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 1 {
                return Err(EmbedderError::Api {
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn records() -> Vec<ErrorRecord> {
        vec![
            ErrorRecord {
                error_code: "E1".into(),
                sheet: "Hire".into(),
                title: "First".into(),
                origin_field: "Field A".into(),
                owner: "HR".into(),
                ..Default::default()
            },
            ErrorRecord {
                error_code: "E2".into(),
                title: "Second".into(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_build_store_populates_items() {
        let embedder = MockEmbedder::new(32);
        let store = build_store(&records(), &embedder).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.dimensions(), Some(32));

        let first = &store.items()[0];
        assert_eq!(first.text, records()[0].as_text());
        assert_eq!(first.embedding, embedder.embed(&first.text).unwrap());
        assert_eq!(first.error_code(), "E1");
        assert_eq!(first.meta_str(META_SHEET), Some("Hire"));
        assert_eq!(first.meta_str(META_ORIGIN_FIELD), Some("Field A"));
        assert_eq!(first.meta_str(META_OWNER), Some("HR"));
        assert_eq!(store.items()[1].meta_str(META_OWNER), Some(""));
    }

    #[test]
    fn test_build_store_empty() {
        let store = build_store(&[], &MockEmbedder::default()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_build_store_reports_failing_record() {
        let embedder = FailOnSecond(std::sync::atomic::AtomicUsize::new(0));
        let err = build_store(&records(), &embedder).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("record 2"), "got: {msg}");
        assert!(msg.contains("code=E2"), "got: {msg}");
    }
}
