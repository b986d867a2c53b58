//! Error types shared by the cache, the match engine and the enumerator
//!
//! "No match" is never represented here: it is a normal negative result.

use thiserror::Error;

use super::report;

/// A pattern that could not be compiled by either engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CompileError {
    /// Engine message describing the failure
    pub message: String,
    /// Byte offset into the pattern where compilation failed
    pub offset: usize,
}

/// Engine failure while running a compiled pattern
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("backtracking limit exceeded")]
    Backtrack,

    #[error("subject is not valid UTF-8 after byte {valid_up_to}")]
    InvalidUtf8 { valid_up_to: usize },

    #[error("{0}")]
    Engine(String),
}

/// Failure during a substitution pass
///
/// The three excerpts are already rendered as SQL literals.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "{}",
    report::substitute_message(.subject, .pattern, .replacement, .offset, .message)
)]
pub struct SubstituteError {
    /// Character offset in the subject where the failure occurred
    pub offset: usize,
    /// Engine message
    pub message: String,
    pub subject: String,
    pub pattern: String,
    pub replacement: String,
}

/// Errors surfaced by core operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{}", report::compile_message(.pattern, .source))]
    Compile {
        /// SQL-literal rendering of the pattern
        pattern: String,
        #[source]
        source: CompileError,
    },

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Substitute(#[from] SubstituteError),

    #[error("no such group {group} in REGEXP pattern {pattern}")]
    NoSuchGroup { group: String, pattern: String },

    #[error("out of memory")]
    Allocation,
}

impl Error {
    /// Wrap a compile failure with a rendering of the offending pattern
    pub fn compile(pattern: &[u8], source: CompileError) -> Self {
        Error::Compile {
            pattern: report::escape_sql_literal(Some(pattern)),
            source,
        }
    }

    /// Byte offset of a compile failure, if this is one
    pub fn compile_offset(&self) -> Option<usize> {
        match self {
            Error::Compile { source, .. } => Some(source.offset),
            _ => None,
        }
    }

    /// Stable code used in structured output
    pub fn code(&self) -> &'static str {
        match self {
            Error::Compile { .. } => "INVALID_PATTERN",
            Error::Match(_) => "MATCH_ERROR",
            Error::Substitute(_) => "SUBSTITUTE_ERROR",
            Error::NoSuchGroup { .. } => "NO_SUCH_GROUP",
            Error::Allocation => "NO_MEMORY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_message() {
        let err = Error::compile(
            b"ab(",
            CompileError {
                message: "missing closing parenthesis".to_string(),
                offset: 2,
            },
        );
        assert_eq!(
            err.to_string(),
            "Cannot compile REGEXP pattern 'ab(' at offset 2 (missing closing parenthesis)"
        );
        assert_eq!(err.compile_offset(), Some(2));
        assert_eq!(err.code(), "INVALID_PATTERN");
    }

    #[test]
    fn test_substitute_error_message() {
        let err = SubstituteError {
            offset: 3,
            message: "unknown substring".to_string(),
            subject: "'banana'".to_string(),
            pattern: "'a'".to_string(),
            replacement: "'$9'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot execute REGEXP_REPLACE('banana', 'a', '$9') at character 3 (unknown substring)"
        );
    }
}
