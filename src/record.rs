//! Error record model.
//!
//! An `ErrorRecord` is one catalog entry. Its serialized text form (`as_text`)
//! is the unit that gets embedded, stored in the index, and later projected
//! into the user-facing answer.

pub const LABEL_ERROR_CODE: &str = "Error code";
pub const LABEL_CATEGORY: &str = "Category";
pub const LABEL_TITLE: &str = "Title";
pub const LABEL_NON_TECHNICAL: &str = "Non-technical explanation";
pub const LABEL_ORIGIN_FIELD: &str = "Origin field";
pub const LABEL_OWNER: &str = "Owner / Responsible";
pub const LABEL_ACTION: &str = "Recommended action";

/// Maximum number of characters taken from the explanation when it has to
/// stand in for a missing title.
pub const TITLE_FALLBACK_CHARS: usize = 120;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorRecord {
    pub error_code: String,
    pub sheet: String,
    pub title: String,
    pub non_technical: String,
    pub origin_field: String,
    pub owner: String,
    pub action: String,
}

impl ErrorRecord {
    /// Serialize into `Label: value` lines, in fixed order, skipping empty fields.
    #[must_use]
    pub fn as_text(&self) -> String {
        let parts = [
            (LABEL_ERROR_CODE, &self.error_code),
            (LABEL_CATEGORY, &self.sheet),
            (LABEL_TITLE, &self.title),
            (LABEL_NON_TECHNICAL, &self.non_technical),
            (LABEL_ORIGIN_FIELD, &self.origin_field),
            (LABEL_OWNER, &self.owner),
            (LABEL_ACTION, &self.action),
        ];

        parts
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(label, value)| format!("{label}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Pick a title for a record built from tabular data.
///
/// Prefers the explicit error message; otherwise the first
/// [`TITLE_FALLBACK_CHARS`] characters of the explanation; otherwise empty.
#[must_use]
pub fn derive_title(error_message: &str, explanation: &str) -> String {
    if !error_message.is_empty() {
        return error_message.to_string();
    }
    explanation.chars().take(TITLE_FALLBACK_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> ErrorRecord {
        ErrorRecord {
            error_code: "E5".to_string(),
            sheet: "Hire".to_string(),
            title: "Missing employee ID".to_string(),
            non_technical: "The employee has no ID yet".to_string(),
            origin_field: "HR system field X".to_string(),
            owner: "HR Ops".to_string(),
            action: "Fill in the ID".to_string(),
        }
    }

    #[test]
    fn test_as_text_field_order() {
        let text = full_record().as_text();
        let labels: Vec<&str> = text
            .lines()
            .map(|l| l.split_once(':').unwrap().0)
            .collect();
        assert_eq!(
            labels,
            vec![
                LABEL_ERROR_CODE,
                LABEL_CATEGORY,
                LABEL_TITLE,
                LABEL_NON_TECHNICAL,
                LABEL_ORIGIN_FIELD,
                LABEL_OWNER,
                LABEL_ACTION,
            ]
        );
    }

    #[test]
    fn test_as_text_only_code() {
        let rec = ErrorRecord {
            error_code: "E7".to_string(),
            ..Default::default()
        };
        assert_eq!(rec.as_text(), "Error code: E7");
    }

    #[test]
    fn test_as_text_skips_empty_fields() {
        let mut rec = full_record();
        rec.sheet.clear();
        rec.action.clear();
        let text = rec.as_text();
        assert!(!text.contains("Category"));
        assert!(!text.contains("Recommended action"));
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn test_as_text_empty_record() {
        assert_eq!(ErrorRecord::default().as_text(), "");
    }

    #[test]
    fn test_as_text_deterministic() {
        let rec = full_record();
        assert_eq!(rec.as_text(), rec.clone().as_text());
    }

    #[test]
    fn test_derive_title_prefers_message() {
        assert_eq!(derive_title("Bad date", "long text"), "Bad date");
    }

    #[test]
    fn test_derive_title_truncates_explanation() {
        let explanation = "é".repeat(200);
        let title = derive_title("", &explanation);
        assert_eq!(title.chars().count(), TITLE_FALLBACK_CHARS);
    }

    #[test]
    fn test_derive_title_empty() {
        assert_eq!(derive_title("", ""), "");
    }
}
