//! Diagnostic rendering for engine failures
//!
//! Failures are reported as a caller-formatted prefix followed by the
//! engine message in parentheses. Pattern, subject and replacement text is
//! embedded as SQL literals so binary data and quotes cannot break the
//! message.

use std::fmt::{Display, Write as _};

use super::error::CompileError;

/// Display budget for a single escaped literal, in bytes
pub const LITERAL_BUDGET: usize = 256;

/// Smallest budget that can hold a quoted piece plus the ellipsis
const MIN_BUDGET: usize = 6;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Run {
    Ascii,
    Hex,
}

/// Render bytes as an SQL literal within [`LITERAL_BUDGET`]
///
/// `None` renders as `NULL`.
pub fn escape_sql_literal(input: Option<&[u8]>) -> String {
    escape_sql_literal_within(input, LITERAL_BUDGET)
}

/// Render bytes as an SQL literal, truncating past `budget`
///
/// Printable ASCII (0x20..=0x7E) is quoted with embedded quotes doubled,
/// every other byte goes into an `x'..'` run, and runs are joined with
/// `||`. When the next piece would not fit, the render stops and `'...`
/// is appended.
///
/// ```
/// use sqlre::core::report::escape_sql_literal_within;
///
/// assert_eq!(escape_sql_literal_within(Some("1é2".as_bytes()), 22), "'1'||x'c3a9'||'2'");
/// assert_eq!(escape_sql_literal_within(Some(b"1\x002"), 22), "'1'||x'00'||'2'");
/// assert_eq!(escape_sql_literal_within(None, 22), "NULL");
/// ```
pub fn escape_sql_literal_within(input: Option<&[u8]>, budget: usize) -> String {
    let Some(bytes) = input else {
        return "NULL".to_string();
    };
    if bytes.is_empty() {
        return "''".to_string();
    }
    if budget < MIN_BUDGET {
        return "''...".to_string();
    }

    let mut out = String::with_capacity(budget.min(bytes.len() * 2 + 2));
    let mut previous: Option<Run> = None;
    let mut piece = String::with_capacity(8);
    let mut truncated = false;

    for &byte in bytes {
        let run = if (0x20..=0x7E).contains(&byte) {
            Run::Ascii
        } else {
            Run::Hex
        };

        piece.clear();
        if previous != Some(run) {
            if previous.is_some() {
                piece.push_str("'||");
            }
            piece.push_str(match run {
                Run::Ascii => "'",
                Run::Hex => "x'",
            });
        }
        previous = Some(run);

        match run {
            Run::Ascii => {
                if byte == b'\'' {
                    piece.push('\'');
                }
                piece.push(char::from(byte));
            }
            Run::Hex => {
                let _ = write!(piece, "{:02x}", byte);
            }
        }

        if out.len() + piece.len() + 5 > budget {
            truncated = true;
            break;
        }
        out.push_str(&piece);
    }

    out.push_str(if truncated { "'..." } else { "'" });
    out
}

/// Prefix an engine message with a caller-formatted description
pub fn prefixed(prefix: impl Display, engine_message: &str) -> String {
    format!("{} ({})", prefix, engine_message)
}

/// Message for a pattern that failed to compile
///
/// `pattern` is the already-escaped literal.
pub fn compile_message(pattern: &str, error: &CompileError) -> String {
    prefixed(
        format_args!(
            "Cannot compile REGEXP pattern {} at offset {}",
            pattern, error.offset
        ),
        &error.message,
    )
}

/// Message for a failed substitution; literals are already escaped
pub fn substitute_message(
    subject: &str,
    pattern: &str,
    replacement: &str,
    offset: impl Display,
    message: &str,
) -> String {
    prefixed(
        format_args!(
            "Cannot execute REGEXP_REPLACE({}, {}, {}) at character {}",
            subject, pattern, replacement, offset
        ),
        message,
    )
}
