//! Core regex machinery
//!
//! The pattern cache, the single-match and substitution operations, the
//! match enumerator and diagnostic rendering. Everything here works on an
//! explicit [`PatternCache`] owned by the caller.

pub mod cache;
pub mod engine;
pub mod enumerate;
pub mod error;
pub mod matching;
pub mod replace;
pub mod report;

// Re-export commonly used types
pub use cache::{CacheStats, PatternCache, DEFAULT_CAPACITY};
pub use engine::{CompiledPattern, EngineType, MatchSpans};
pub use enumerate::{GroupId, GroupPolicy, MatchEnumerator, MatchRow, ScanState};
pub use error::{CompileError, Error, MatchError, SubstituteError};
pub use matching::{extract, locate, test, MatchOptions, Subject};
pub use replace::{substitute, SubstituteOptions, Substitution};
pub use report::escape_sql_literal;
