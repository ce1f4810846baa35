//! CSV export of the error checklist → [`ErrorRecord`]s.
//!
//! The export is Latin-1 encoded. Header names are matched after trimming,
//! missing columns read as empty, and the spreadsheet null marker `nan` is
//! treated as an empty cell.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::record::{ErrorRecord, derive_title};

pub const COL_ID: &str = "ID";
pub const COL_FLOW: &str = "Integration Flow";
pub const COL_VALIDATION: &str = "Hire Sync Validation";
pub const COL_MESSAGE: &str = "Error Message Notification";
pub const COL_WHERE: &str = "Where to do the correction";
pub const COL_WHO: &str = "Who should do the correction";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("CSV file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Load every non-blank row of the CSV at `path`.
pub fn load_error_records(path: &Path) -> Result<Vec<ErrorRecord>, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let records = parse_records(&decode_latin1(&bytes))?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Parse CSV text (header row first) into records.
pub fn parse_records(data: &str) -> Result<Vec<ErrorRecord>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data.as_bytes());

    let columns: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_string(), i))
        .collect();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        if row.iter().all(|cell| clean(cell).is_empty()) {
            debug!("Skipping blank row {}", line + 2);
            continue;
        }

        let get = |name: &str| {
            columns
                .get(name)
                .and_then(|&i| row.get(i))
                .map(clean)
                .unwrap_or_default()
                .to_string()
        };

        let non_technical = get(COL_VALIDATION);
        let title = derive_title(&get(COL_MESSAGE), &non_technical);

        records.push(ErrorRecord {
            error_code: get(COL_ID),
            sheet: get(COL_FLOW),
            title,
            non_technical,
            origin_field: get(COL_WHERE),
            owner: get(COL_WHO),
            action: String::new(),
        });
    }

    Ok(records)
}

/// Latin-1 maps every byte to the code point of the same value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn clean(cell: &str) -> &str {
    let cell = cell.trim();
    if cell.eq_ignore_ascii_case("nan") {
        ""
    } else {
        cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str = "ID, Integration Flow ,Hire Sync Validation,Error Message Notification,Where to do the correction,Who should do the correction\n";

    #[test]
    fn test_parse_basic_row() {
        let data = format!(
            "{HEADER}E5,Hire,Employee has no ID,Missing employee ID,HR system field X,HR Ops\n"
        );
        let records = parse_records(&data).unwrap();
        assert_eq!(
            records,
            vec![ErrorRecord {
                error_code: "E5".into(),
                sheet: "Hire".into(),
                title: "Missing employee ID".into(),
                non_technical: "Employee has no ID".into(),
                origin_field: "HR system field X".into(),
                owner: "HR Ops".into(),
                action: String::new(),
            }]
        );
    }

    #[test]
    fn test_title_falls_back_to_validation() {
        let long = "x".repeat(300);
        let data = format!("{HEADER}E6,Hire,{long},,Field,Owner\n");
        let records = parse_records(&data).unwrap();
        assert_eq!(records[0].title.len(), 120);
        assert_eq!(records[0].non_technical.len(), 300);
    }

    #[test]
    fn test_nan_and_blank_rows() {
        let data = format!("{HEADER},,,,,\nnan,NaN,,,,\nE7,nan,Text,Msg,Where,Who\n");
        let records = parse_records(&data).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error_code, "E7");
        assert_eq!(records[0].sheet, "");
    }

    #[test]
    fn test_missing_columns_read_empty() {
        let data = "ID,Error Message Notification\nE8,Bad date\n";
        let records = parse_records(data).unwrap();
        assert_eq!(records[0].title, "Bad date");
        assert_eq!(records[0].owner, "");
        assert_eq!(records[0].as_text(), "Error code: E8\nTitle: Bad date");
    }

    #[test]
    fn test_short_rows_tolerated() {
        let data = format!("{HEADER}E9,Hire\n");
        let records = parse_records(&data).unwrap();
        assert_eq!(records[0].sheet, "Hire");
        assert_eq!(records[0].title, "");
    }

    #[test]
    fn test_quoted_multiline_cell() {
        let data = format!("{HEADER}E10,Hire,\"Line one\nline two\",,Where,Who\n");
        let records = parse_records(&data).unwrap();
        assert_eq!(records[0].non_technical, "Line one\nline two");
    }

    #[test]
    fn test_load_latin1_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("errors.csv");
        let mut bytes = HEADER.as_bytes().to_vec();
        bytes.extend_from_slice(b"E11,Hire,Caf\xe9 closed,,Where,Who\n");
        fs::write(&path, bytes).unwrap();

        let records = load_error_records(&path).unwrap();
        assert_eq!(records[0].non_technical, "Café closed");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_error_records(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }
}
