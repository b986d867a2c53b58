//! Regex engine selection and compilation
//!
//! Automatically chooses between `regex` (fast, linear time) and
//! `fancy-regex` (full features, backtracking) based on pattern analysis.
//! Patterns arrive as raw bytes from the host; subjects are matched as bytes
//! by the linear engine and as UTF-8 text by the backtracking one.

use std::sync::LazyLock;

use super::error::{CompileError, MatchError};

static BACKREFERENCE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\\[1-9]").expect("BUG: backreference detection pattern is invalid")
});

/// Engine types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineType {
    /// Standard regex crate (linear time guaranteed)
    Regex,
    /// Fancy-regex (supports lookahead, lookbehind, backreferences)
    FancyRegex,
}

impl std::fmt::Display for EngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineType::Regex => write!(f, "regex"),
            EngineType::FancyRegex => write!(f, "fancy-regex"),
        }
    }
}

/// Features detected in a pattern that require fancy-regex
#[derive(Debug, Default)]
pub struct FancyFeatures {
    pub lookahead: bool,
    pub lookbehind: bool,
    pub backreference: bool,
    pub atomic_group: bool,
}

impl FancyFeatures {
    /// Returns true if any fancy feature is detected
    pub fn needs_fancy(&self) -> bool {
        self.lookahead || self.lookbehind || self.backreference || self.atomic_group
    }
}

/// Detect which engine features are used in a pattern
pub fn detect_fancy_features(pattern: &str) -> FancyFeatures {
    FancyFeatures {
        lookahead: pattern.contains("(?=") || pattern.contains("(?!"),
        lookbehind: pattern.contains("(?<=") || pattern.contains("(?<!"),
        backreference: BACKREFERENCE_RE.is_match(pattern),
        atomic_group: pattern.contains("(?>"),
    }
}

/// Select the appropriate engine for a pattern
pub fn select_engine(pattern: &str) -> EngineType {
    if detect_fancy_features(pattern).needs_fancy() {
        EngineType::FancyRegex
    } else {
        EngineType::Regex
    }
}

/// Byte spans of every group of one match, indexed by group number
///
/// Group 0 is always present; other groups are `None` when they did not
/// participate in the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpans {
    spans: Vec<Option<(usize, usize)>>,
}

impl MatchSpans {
    /// Start and end of the whole match
    pub fn whole(&self) -> (usize, usize) {
        self.get(0).unwrap_or_default()
    }

    pub fn get(&self, group: usize) -> Option<(usize, usize)> {
        self.spans.get(group).copied().flatten()
    }

    /// Number of groups, including group 0
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// A compiled pattern backed by either engine
///
/// Cloning yields an independent handle with the same matching behaviour;
/// engine state is released when the last owner drops it.
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    Regex(regex::bytes::Regex),
    FancyRegex(fancy_regex::Regex),
}

impl CompiledPattern {
    /// Compile pattern bytes with automatic engine selection
    pub fn compile(pattern: &[u8]) -> Result<Self, CompileError> {
        let text = std::str::from_utf8(pattern).map_err(|e| CompileError {
            message: "pattern is not valid UTF-8".to_string(),
            offset: e.valid_up_to(),
        })?;

        match select_engine(text) {
            EngineType::Regex => match regex::bytes::Regex::new(text) {
                Ok(re) => Ok(CompiledPattern::Regex(re)),
                Err(regex_err) => {
                    // Fall back to fancy-regex if standard regex fails
                    fancy_regex::Regex::new(text)
                        .map(CompiledPattern::FancyRegex)
                        .map_err(|fancy_err| compile_failure(text, &regex_err, &fancy_err))
                }
            },
            EngineType::FancyRegex => Self::with_engine(text, EngineType::FancyRegex),
        }
    }

    /// Compile with a specific engine
    pub fn with_engine(pattern: &str, engine: EngineType) -> Result<Self, CompileError> {
        match engine {
            EngineType::Regex => regex::bytes::Regex::new(pattern)
                .map(CompiledPattern::Regex)
                .map_err(|e| CompileError {
                    message: e.to_string(),
                    offset: syntax_offset(pattern).unwrap_or(0),
                }),
            EngineType::FancyRegex => fancy_regex::Regex::new(pattern)
                .map(CompiledPattern::FancyRegex)
                .map_err(|e| CompileError {
                    offset: fancy_offset(&e)
                        .or_else(|| syntax_offset(pattern))
                        .unwrap_or(0),
                    message: e.to_string(),
                }),
        }
    }

    /// Source text of the pattern
    pub fn as_str(&self) -> &str {
        match self {
            CompiledPattern::Regex(re) => re.as_str(),
            CompiledPattern::FancyRegex(re) => re.as_str(),
        }
    }

    /// Get the engine type
    pub fn engine_type(&self) -> EngineType {
        match self {
            CompiledPattern::Regex(_) => EngineType::Regex,
            CompiledPattern::FancyRegex(_) => EngineType::FancyRegex,
        }
    }

    /// Number of groups, including the implicit group 0
    pub fn group_count(&self) -> usize {
        match self {
            CompiledPattern::Regex(re) => re.captures_len(),
            CompiledPattern::FancyRegex(re) => re.captures_len(),
        }
    }

    /// Name of a capture group, if it has one
    pub fn group_name(&self, group: usize) -> Option<&str> {
        match self {
            CompiledPattern::Regex(re) => re.capture_names().nth(group).flatten(),
            CompiledPattern::FancyRegex(re) => re.capture_names().nth(group).flatten(),
        }
    }

    /// Index of a named capture group
    pub fn group_index(&self, name: &str) -> Option<usize> {
        match self {
            CompiledPattern::Regex(re) => re.capture_names().position(|n| n == Some(name)),
            CompiledPattern::FancyRegex(re) => re.capture_names().position(|n| n == Some(name)),
        }
    }

    /// Attempt a single match starting at byte offset `start`
    pub fn match_at(&self, subject: &[u8], start: usize) -> Result<Option<MatchSpans>, MatchError> {
        if start > subject.len() {
            return Ok(None);
        }
        match self {
            CompiledPattern::Regex(re) => {
                let mut locations = re.capture_locations();
                if re.captures_read_at(&mut locations, subject, start).is_none() {
                    return Ok(None);
                }
                let spans = (0..locations.len()).map(|i| locations.get(i)).collect();
                Ok(Some(MatchSpans { spans }))
            }
            CompiledPattern::FancyRegex(re) => {
                let text = std::str::from_utf8(subject).map_err(|e| MatchError::InvalidUtf8 {
                    valid_up_to: e.valid_up_to(),
                })?;
                let mut start = start;
                while !text.is_char_boundary(start) {
                    start += 1;
                }
                let captures = re
                    .captures_from_pos(text, start)
                    .map_err(runtime_failure)?;
                Ok(captures.map(|caps| MatchSpans {
                    spans: (0..caps.len())
                        .map(|i| caps.get(i).map(|m| (m.start(), m.end())))
                        .collect(),
                }))
            }
        }
    }

    /// Check if the pattern matches anywhere in the subject
    pub fn is_match(&self, subject: &[u8]) -> Result<bool, MatchError> {
        match self {
            CompiledPattern::Regex(re) => Ok(re.is_match(subject)),
            CompiledPattern::FancyRegex(_) => Ok(self.match_at(subject, 0)?.is_some()),
        }
    }
}

/// Anchored retry that only accepts a non-empty match
///
/// Used after an empty match at some offset: the next match may start at
/// the same offset only if it consumes something. The retry backtracks
/// into the pattern until it finds such a path, so `a??` at "a" yields
/// "a". It runs on the subject from the offset onward; assertions that
/// look behind the offset see the start of the text.
#[derive(Debug, Clone)]
pub struct NonEmptyRetry {
    // None when the wrapped pattern does not compile; no retry is made
    re: Option<fancy_regex::Regex>,
}

impl NonEmptyRetry {
    pub fn for_pattern(compiled: &CompiledPattern) -> Self {
        let wrapped = format!(r"\A(?:{})(?<=[\s\S])", compiled.as_str());
        Self {
            re: fancy_regex::Regex::new(&wrapped).ok(),
        }
    }

    /// Attempt a non-empty match starting exactly at `start`
    ///
    /// Subjects that are not valid UTF-8 from `start` on are never retried.
    pub fn match_at(&self, subject: &[u8], start: usize) -> Result<Option<MatchSpans>, MatchError> {
        let Some(re) = &self.re else {
            return Ok(None);
        };
        let Some(Ok(tail)) = subject.get(start..).map(std::str::from_utf8) else {
            return Ok(None);
        };
        let captures = re.captures(tail).map_err(runtime_failure)?;
        Ok(captures.map(|caps| MatchSpans {
            spans: (0..caps.len())
                .map(|i| caps.get(i).map(|m| (start + m.start(), start + m.end())))
                .collect(),
        }))
    }
}

fn runtime_failure(e: fancy_regex::Error) -> MatchError {
    match e {
        fancy_regex::Error::RuntimeError(fancy_regex::RuntimeError::BacktrackLimitExceeded) => {
            MatchError::Backtrack
        }
        other => MatchError::Engine(other.to_string()),
    }
}

/// Build the error for a pattern neither engine accepts
///
/// The position comes from the regex-syntax parser when it can locate the
/// problem, then from fancy-regex's own parser.
fn compile_failure(
    pattern: &str,
    regex_err: &regex::Error,
    fancy_err: &fancy_regex::Error,
) -> CompileError {
    match syntax_offset(pattern) {
        Some(offset) => CompileError {
            message: syntax_message(pattern).unwrap_or_else(|| regex_err.to_string()),
            offset,
        },
        None => CompileError {
            message: fancy_err.to_string(),
            offset: fancy_offset(fancy_err).unwrap_or(0),
        },
    }
}

fn syntax_offset(pattern: &str) -> Option<usize> {
    match regex_syntax::Parser::new().parse(pattern) {
        Ok(_) => None,
        Err(regex_syntax::Error::Parse(e)) => Some(e.span().start.offset),
        Err(regex_syntax::Error::Translate(e)) => Some(e.span().start.offset),
        Err(_) => None,
    }
}

/// Short message for a syntax error, without the pattern excerpt
fn syntax_message(pattern: &str) -> Option<String> {
    match regex_syntax::Parser::new().parse(pattern) {
        Ok(_) => None,
        Err(regex_syntax::Error::Parse(e)) => Some(e.kind().to_string()),
        Err(regex_syntax::Error::Translate(e)) => Some(e.kind().to_string()),
        Err(_) => None,
    }
}

fn fancy_offset(err: &fancy_regex::Error) -> Option<usize> {
    match err {
        fancy_regex::Error::ParseError(position, _) => Some(*position),
        _ => None,
    }
}

/// Byte length of the UTF-8 sequence starting with `lead`, at least 1
pub(crate) fn utf8_width(lead: u8) -> usize {
    match lead {
        0xF0..=0xF7 => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_pattern_uses_regex() {
        assert_eq!(select_engine(r"\d+"), EngineType::Regex);
    }

    #[test]
    fn test_lookahead_uses_fancy() {
        assert_eq!(select_engine(r"foo(?=bar)"), EngineType::FancyRegex);
        assert!(detect_fancy_features(r"foo(?=bar)").lookahead);
    }

    #[test]
    fn test_lookbehind_uses_fancy() {
        assert_eq!(select_engine(r"(?<=foo)bar"), EngineType::FancyRegex);
        assert!(detect_fancy_features(r"(?<=foo)bar").lookbehind);
    }

    #[test]
    fn test_backreference_uses_fancy() {
        assert_eq!(select_engine(r"(\w+)\s+\1"), EngineType::FancyRegex);
        assert!(detect_fancy_features(r"(\w+)\s+\1").backreference);
    }

    #[test]
    fn test_compile_simple() {
        let re = CompiledPattern::compile(br"\d+").unwrap();
        assert_eq!(re.engine_type(), EngineType::Regex);
        assert!(re.is_match(b"123").unwrap());
    }

    #[test]
    fn test_compile_fancy() {
        let re = CompiledPattern::compile(br"foo(?=bar)").unwrap();
        assert_eq!(re.engine_type(), EngineType::FancyRegex);
        assert!(re.is_match(b"foobar").unwrap());
        assert!(!re.is_match(b"foobaz").unwrap());
    }

    #[test]
    fn test_with_engine_forces_fancy() {
        let re = CompiledPattern::with_engine(r"\d+", EngineType::FancyRegex).unwrap();
        assert_eq!(re.engine_type(), EngineType::FancyRegex);
        assert!(re.is_match(b"a1").unwrap());
    }

    #[test]
    fn test_unclosed_group_offset() {
        let pattern = b"ab(cd";
        let err = CompiledPattern::compile(pattern).unwrap_err();
        assert!(err.offset < pattern.len());
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn test_unopened_group_offset() {
        let pattern = b"abc)";
        let err = CompiledPattern::compile(pattern).unwrap_err();
        assert!(err.offset < pattern.len());
    }

    #[test]
    fn test_invalid_utf8_pattern() {
        let err = CompiledPattern::compile(b"ab\xffc").unwrap_err();
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn test_match_at_reports_group_spans() {
        let re = CompiledPattern::compile(br"(\d)(x)?").unwrap();
        let spans = re.match_at(b"ab12", 0).unwrap().unwrap();
        assert_eq!(spans.whole(), (2, 3));
        assert_eq!(spans.get(1), Some((2, 3)));
        assert_eq!(spans.get(2), None);
        assert_eq!(spans.len(), 3);

        let next = re.match_at(b"ab12", 3).unwrap().unwrap();
        assert_eq!(next.whole(), (3, 4));
        assert!(re.match_at(b"ab12", 5).unwrap().is_none());
    }

    #[test]
    fn test_fancy_match_on_invalid_utf8_subject() {
        let re = CompiledPattern::compile(br"a(?=b)").unwrap();
        let err = re.match_at(b"\xffab", 0).unwrap_err();
        assert_eq!(err, MatchError::InvalidUtf8 { valid_up_to: 0 });
    }

    #[test]
    fn test_fancy_start_inside_character_snaps_forward() {
        let re = CompiledPattern::compile(b"(?=a)a").unwrap();
        let spans = re.match_at("\u{e9}a".as_bytes(), 1).unwrap().unwrap();
        assert_eq!(spans.whole(), (2, 3));
    }

    #[test]
    fn test_non_empty_retry_backtracks_past_empty_path() {
        let re = CompiledPattern::compile(b"a??").unwrap();
        assert_eq!(re.match_at(b"a", 0).unwrap().unwrap().whole(), (0, 0));

        let retry = NonEmptyRetry::for_pattern(&re);
        assert_eq!(retry.match_at(b"a", 0).unwrap().unwrap().whole(), (0, 1));
        assert!(retry.match_at(b"a", 1).unwrap().is_none());
    }

    #[test]
    fn test_non_empty_retry_is_anchored() {
        let re = CompiledPattern::compile(b"x*").unwrap();
        let retry = NonEmptyRetry::for_pattern(&re);
        assert!(retry.match_at(b"axx", 0).unwrap().is_none());
        let spans = retry.match_at(b"axx", 1).unwrap().unwrap();
        assert_eq!(spans.whole(), (1, 3));
    }

    #[test]
    fn test_non_empty_retry_keeps_groups() {
        let re = CompiledPattern::compile(br"(?P<k>b)?|(b)").unwrap();
        let retry = NonEmptyRetry::for_pattern(&re);
        let spans = retry.match_at(b"ab", 1).unwrap().unwrap();
        assert_eq!(spans.len(), 3);
        assert_eq!(spans.whole(), (1, 2));
        assert_eq!(spans.get(1), Some((1, 2)));
    }

    #[test]
    fn test_group_names() {
        let re = CompiledPattern::compile(br"(?P<year>\d{4})-(\d{2})").unwrap();
        assert_eq!(re.group_count(), 3);
        assert_eq!(re.group_name(1), Some("year"));
        assert_eq!(re.group_name(2), None);
        assert_eq!(re.group_index("year"), Some(1));
        assert_eq!(re.group_index("month"), None);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = CompiledPattern::compile(b"a+").unwrap();
        let copy = original.clone();
        drop(original);
        assert!(copy.is_match(b"caat").unwrap());
    }
}
