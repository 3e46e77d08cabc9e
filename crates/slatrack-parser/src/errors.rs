use std::path::PathBuf;

use thiserror::Error;

/// Everything that makes an input request log unusable. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input is missing the header row")]
    MissingHeader,

    #[error("input is missing required columns: {}", missing.join(", "))]
    MissingColumns { missing: Vec<&'static str> },

    #[error("line {line_index}: input is not valid UTF-8")]
    InvalidEncoding { line_index: usize },

    #[error("CSV error: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("line {line_index}: column '{column}' has unparsable date '{value}'")]
    InvalidDate {
        line_index: usize,
        column: &'static str,
        value: String,
    },

    #[error("line {line_index}: column '{column}' has unparsable number '{value}'")]
    InvalidNumber {
        line_index: usize,
        column: &'static str,
        value: String,
    },

    #[error("line {line_index}: required column '{column}' is empty")]
    MissingValue {
        line_index: usize,
        column: &'static str,
    },

    #[error("line {line_index}: request_id '{request_id}' already appeared on line {first_line}")]
    DuplicateRequestId {
        line_index: usize,
        first_line: usize,
        request_id: String,
    },
}
