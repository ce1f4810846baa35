//! Retrieval pipeline: question in, formatted answer (or refusal) out.
//!
//! Decision order, first match wins:
//! 1. an error code such as `E5` in the question that matches a stored record
//! 2. semantic search, top-1 only
//! 3. refusal when the index is empty
//! 4. confidence gate on the top-1 score (accept / weak accept / refuse)
//!
//! The pipeline holds no state between calls.
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::embedder::{Embedder, EmbedderError};
use crate::record::{LABEL_NON_TECHNICAL, LABEL_ORIGIN_FIELD, LABEL_OWNER, LABEL_TITLE};
use crate::store::{StoreError, VectorItem, VectorStore};

/// Returned whenever no sufficiently relevant record exists.
pub const REFUSAL_MESSAGE: &str = "I can only help with Hire Sync validation errors from the internal checklist.\n\
Please paste the exact error message or provide the error ID (e.g., E5).";

pub const DEFAULT_HIGH_THRESHOLD: f32 = 0.60;
pub const DEFAULT_LOW_THRESHOLD: f32 = 0.45;
pub const DEFAULT_TOP_K: usize = 3;

const MISSING: &str = "N/A";

static ERROR_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(E\d+)\b").unwrap());

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to embed question: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("vector search failed: {0}")]
    Store(#[from] StoreError),
}

/// Score cutoffs for the semantic path. `high: None` disables gating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub high: Option<f32>,
    pub low: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: Some(DEFAULT_HIGH_THRESHOLD),
            low: DEFAULT_LOW_THRESHOLD,
        }
    }
}

impl Thresholds {
    #[must_use]
    pub fn new(high: Option<f32>, low: f32) -> Self {
        Self { high, low }
    }

    /// Classify a top-1 score; `None` means refuse.
    #[must_use]
    pub fn gate(&self, score: f32) -> Option<Confidence> {
        let Some(high) = self.high else {
            return Some(Confidence::Ungated);
        };
        if score >= high {
            Some(Confidence::High)
        } else if score >= self.low {
            Some(Confidence::Weak)
        } else {
            None
        }
    }
}

/// How a matched answer was reached. Internal only, never shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    ExactCode,
    High,
    Weak,
    Ungated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalReason {
    EmptyIndex,
    LowConfidence,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Matched {
        text: String,
        confidence: Confidence,
        /// `None` on the exact-code path.
        score: Option<f32>,
    },
    Refused {
        reason: RefusalReason,
        score: Option<f32>,
    },
}

impl Answer {
    /// The user-facing string.
    #[must_use]
    pub fn render(&self) -> &str {
        match self {
            Answer::Matched { text, .. } => text,
            Answer::Refused { .. } => REFUSAL_MESSAGE,
        }
    }

    #[must_use]
    pub fn is_refusal(&self) -> bool {
        matches!(self, Answer::Refused { .. })
    }
}

pub struct RetrievalPipeline<'a, E: Embedder + ?Sized> {
    store: &'a VectorStore,
    embedder: &'a E,
    thresholds: Thresholds,
    top_k: usize,
}

impl<'a, E: Embedder + ?Sized> RetrievalPipeline<'a, E> {
    pub fn new(store: &'a VectorStore, embedder: &'a E) -> Self {
        Self {
            store,
            embedder,
            thresholds: Thresholds::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Candidates fetched from the index. Only the first is used; values
    /// below one are raised to one.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Run the decision policy and report how the answer was reached.
    pub fn resolve(&self, question: &str) -> Result<Answer, PipelineError> {
        if let Some(code) = find_error_code(question) {
            if let Some(item) = lookup_exact(self.store, &code) {
                debug!("Exact error code match: {code}");
                return Ok(Answer::Matched {
                    text: format_hr_answer(&item.text),
                    confidence: Confidence::ExactCode,
                    score: None,
                });
            }
            debug!("Error code {code} not in index, falling back to semantic search");
        }

        let query_vector = self.embedder.embed(question)?;
        let results = self.store.search(&query_vector, self.top_k)?;

        let Some(best) = results.first() else {
            debug!("Index is empty, refusing");
            return Ok(Answer::Refused {
                reason: RefusalReason::EmptyIndex,
                score: None,
            });
        };

        match self.thresholds.gate(best.score) {
            Some(confidence) => {
                debug!(
                    "Semantic match {} (score {:.3}, {confidence:?})",
                    best.item.error_code(),
                    best.score
                );
                Ok(Answer::Matched {
                    text: format_hr_answer(&best.item.text),
                    confidence,
                    score: Some(best.score),
                })
            }
            None => {
                debug!("Best score {:.3} below threshold, refusing", best.score);
                Ok(Answer::Refused {
                    reason: RefusalReason::LowConfidence,
                    score: Some(best.score),
                })
            }
        }
    }

    /// Answer a question with the formatted record or [`REFUSAL_MESSAGE`].
    pub fn answer(&self, question: &str) -> Result<String, PipelineError> {
        Ok(self.resolve(question)?.render().to_string())
    }
}

/// One-call form of [`RetrievalPipeline::answer`] with the default low
/// threshold and top-k.
pub fn answer<E: Embedder + ?Sized>(
    question: &str,
    store: &VectorStore,
    embedder: &E,
    high_threshold: Option<f32>,
) -> Result<String, PipelineError> {
    RetrievalPipeline::new(store, embedder)
        .with_thresholds(Thresholds::new(high_threshold, DEFAULT_LOW_THRESHOLD))
        .answer(question)
}

/// First `E<digits>` token in the question, uppercased.
#[must_use]
pub fn find_error_code(question: &str) -> Option<String> {
    ERROR_CODE_RE
        .captures(question)
        .map(|caps| caps[1].to_uppercase())
}

/// First item whose stored error code equals `code`, ignoring case.
#[must_use]
pub fn lookup_exact<'s>(store: &'s VectorStore, code: &str) -> Option<&'s VectorItem> {
    let code = code.to_uppercase();
    store
        .items()
        .iter()
        .find(|item| item.error_code().to_uppercase() == code)
}

/// Project a serialized record onto the four-line answer layout.
///
/// Lines are split on their first colon; labels that are absent render as
/// `N/A`.
#[must_use]
pub fn format_hr_answer(item_text: &str) -> String {
    let fields: HashMap<&str, &str> = item_text
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect();
    let get = |label: &str| fields.get(label).copied().unwrap_or(MISSING);

    format!(
        "Meaning: {}\nNon-technical explanation: {}\nWhere to correct: {}\nOwner: {}\n",
        get(LABEL_TITLE),
        get(LABEL_NON_TECHNICAL),
        get(LABEL_ORIGIN_FIELD),
        get(LABEL_OWNER),
    )
}
