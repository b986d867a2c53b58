//! Output types for sqlre commands
//!
//! Every command result is JSON-first; the text formatter renders the same
//! structures for humans.

use serde::Serialize;

use crate::core::{GroupId, GroupPolicy};

/// Result of `sqlre regexp`
#[derive(Debug, Clone, Serialize)]
pub struct RegexpResult {
    pub pattern: String,
    pub subject: String,
    /// Which engine compiled the pattern (regex or fancy-regex)
    pub engine: String,
    pub matched: bool,
}

/// Result of `sqlre instr`
#[derive(Debug, Clone, Serialize)]
pub struct InstrResult {
    pub pattern: String,
    pub subject: String,
    /// Whether positions count bytes instead of characters
    pub blob: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurrence: Option<usize>,
    /// 1-based position of the match, 0 when nothing matched
    pub position: usize,
}

/// Result of `sqlre substr`
#[derive(Debug, Clone, Serialize)]
pub struct SubstrResult {
    pub pattern: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurrence: Option<usize>,
    /// Matched text, empty when nothing matched
    pub value: String,
}

/// Result of `sqlre replace`
#[derive(Debug, Clone, Serialize)]
pub struct ReplaceResult {
    pub pattern: String,
    pub replacement: String,
    pub original: String,
    pub result: String,
    pub replacements_made: usize,
}

/// One row of `REGEXP_TABLE`
#[derive(Debug, Clone, Serialize)]
pub struct TableRow {
    pub rowid: i64,
    pub group_id: GroupId,
    /// Group text, null when the group did not participate
    pub value: Option<String>,
    pub match_order: usize,
}

/// Result of `sqlre table`
#[derive(Debug, Clone, Serialize)]
pub struct TableResult {
    pub pattern: String,
    /// Length of the subject in bytes
    pub subject_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub policy: GroupPolicy,
    pub row_count: usize,
    pub rows: Vec<TableRow>,
}

/// Result of `sqlre escape`
#[derive(Debug, Clone, Serialize)]
pub struct EscapeResult {
    pub input: String,
    pub literal: String,
    pub truncated: bool,
}

/// Structured error output
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Always true
    pub error: bool,
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Byte offset in the pattern (compile errors only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: true,
            code: code.into(),
            message: message.into(),
            position: None,
        }
    }

    pub fn with_position(mut self, position: Option<usize>) -> Self {
        self.position = position;
        self
    }
}

/// Error codes not produced by the core error type
pub mod error_codes {
    pub const COMMAND_ERROR: &str = "COMMAND_ERROR";
    pub const FILE_NOT_FOUND: &str = "FILE_NOT_FOUND";
    pub const INVALID_CONFIG: &str = "INVALID_CONFIG";
    pub const QUERY_ERROR: &str = "QUERY_ERROR";
}
