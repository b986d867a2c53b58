//! Single-match operations: test, locate and extract
//!
//! Each operation resolves its pattern through the session cache and runs
//! one match attempt (or walks forward to the requested occurrence).

use super::cache::PatternCache;
use super::engine::{utf8_width, CompiledPattern, MatchSpans, NonEmptyRetry};
use super::error::{Error, MatchError};

/// The text being searched, tagged with how positions are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject<'a> {
    /// UTF-8 text; positions count characters
    Text(&'a str),
    /// Untyped binary data; positions count bytes
    Blob(&'a [u8]),
}

impl<'a> Subject<'a> {
    pub fn bytes(&self) -> &'a [u8] {
        match self {
            Subject::Text(text) => text.as_bytes(),
            Subject::Blob(bytes) => bytes,
        }
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, Subject::Blob(_))
    }

    /// Number of positions (characters or bytes) before byte offset `byte`
    pub fn positions_before(&self, byte: usize) -> usize {
        let bytes = self.bytes();
        let byte = byte.min(bytes.len());
        match self {
            Subject::Blob(_) => byte,
            Subject::Text(_) => char_count(&bytes[..byte]),
        }
    }

    /// Byte offset of the 1-based position `position`
    ///
    /// Returns `None` when the position lies past the end of the subject.
    pub fn byte_offset(&self, position: usize) -> Option<usize> {
        let skip = position.saturating_sub(1);
        match self {
            Subject::Blob(bytes) => (skip <= bytes.len()).then_some(skip),
            Subject::Text(text) => {
                if skip == 0 {
                    return Some(0);
                }
                match text.char_indices().nth(skip) {
                    Some((offset, _)) => Some(offset),
                    None if text.chars().count() == skip => Some(text.len()),
                    None => None,
                }
            }
        }
    }
}

/// Count characters in UTF-8 bytes by skipping continuation bytes
///
/// Invalid sequences are counted leniently, one position per lead byte.
pub fn char_count(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| (b & 0xC0) != 0x80).count()
}

/// Optional arguments shared by the single-match operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// 1-based position where searching starts (characters for text)
    pub start: Option<usize>,
    /// 1-based index of the match to report
    pub occurrence: Option<usize>,
}

impl MatchOptions {
    pub fn with_start(mut self, start: usize) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_occurrence(mut self, occurrence: usize) -> Self {
        self.occurrence = Some(occurrence);
        self
    }
}

/// Forward-only match position over one subject
///
/// Matches never overlap. An empty match may follow a non-empty one at the
/// same offset. After an empty match, the next match at that offset must
/// be non-empty; failing that, the scan moves one character forward.
#[derive(Debug, Clone, Default)]
pub struct MatchScanner {
    position: usize,
    /// Offset of the previous match, when it was empty
    empty_at: Option<usize>,
    retry: Option<NonEmptyRetry>,
    done: bool,
}

impl MatchScanner {
    /// Start scanning at byte offset `position`
    pub fn starting_at(position: usize) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Byte offset where the next attempt will start
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Find the next match, or `None` once the subject is consumed
    pub fn next_match(
        &mut self,
        compiled: &CompiledPattern,
        subject: &[u8],
    ) -> Result<Option<MatchSpans>, MatchError> {
        if self.done {
            return Ok(None);
        }
        if let Some(at) = self.empty_at.take() {
            let retry = self
                .retry
                .get_or_insert_with(|| NonEmptyRetry::for_pattern(compiled));
            if let Some(spans) = retry.match_at(subject, at)? {
                self.position = spans.whole().1;
                return Ok(Some(spans));
            }
            self.position = match subject.get(at) {
                Some(&lead) => at + utf8_width(lead),
                None => subject.len() + 1,
            };
        }
        if self.position > subject.len() {
            self.done = true;
            return Ok(None);
        }
        let Some(spans) = compiled.match_at(subject, self.position)? else {
            self.done = true;
            return Ok(None);
        };
        let (start, end) = spans.whole();
        if start == end {
            self.empty_at = Some(end);
        }
        self.position = end;
        Ok(Some(spans))
    }
}

/// Borrowing iterator over successive matches
pub struct Matches<'r, 's> {
    compiled: &'r CompiledPattern,
    subject: &'s [u8],
    scanner: MatchScanner,
}

impl<'r, 's> Matches<'r, 's> {
    pub fn new(compiled: &'r CompiledPattern, subject: &'s [u8], start: usize) -> Self {
        Self {
            compiled,
            subject,
            scanner: MatchScanner::starting_at(start),
        }
    }
}

impl Iterator for Matches<'_, '_> {
    type Item = Result<MatchSpans, MatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scanner
            .next_match(self.compiled, self.subject)
            .transpose()
    }
}

/// Resolve a pattern, attaching the pattern literal to compile failures
pub fn resolve<'c>(cache: &'c mut PatternCache, pattern: &[u8]) -> Result<&'c CompiledPattern, Error> {
    cache.resolve(pattern).map_err(|e| Error::compile(pattern, e))
}

/// Locate the requested occurrence, honouring the start position
fn find(
    compiled: &CompiledPattern,
    subject: Subject<'_>,
    options: &MatchOptions,
) -> Result<Option<MatchSpans>, Error> {
    let Some(start) = subject.byte_offset(options.start.unwrap_or(1)) else {
        return Ok(None);
    };
    let occurrence = options.occurrence.unwrap_or(1).max(1);
    let found = Matches::new(compiled, subject.bytes(), start)
        .nth(occurrence - 1)
        .transpose()?;
    Ok(found)
}

/// Whether `pattern` matches anywhere in `subject`
pub fn test(cache: &mut PatternCache, pattern: &[u8], subject: Subject<'_>) -> Result<bool, Error> {
    let compiled = resolve(cache, pattern)?;
    Ok(compiled.is_match(subject.bytes())?)
}

/// 1-based position of the match start, or 0 when nothing matches
///
/// Positions count characters for text and bytes for blobs.
pub fn locate(
    cache: &mut PatternCache,
    pattern: &[u8],
    subject: Subject<'_>,
    options: &MatchOptions,
) -> Result<usize, Error> {
    let compiled = resolve(cache, pattern)?;
    Ok(match find(compiled, subject, options)? {
        Some(spans) => subject.positions_before(spans.whole().0) + 1,
        None => 0,
    })
}

/// The whole matched text, or an empty slice when nothing matches
pub fn extract<'s>(
    cache: &mut PatternCache,
    pattern: &[u8],
    subject: Subject<'s>,
    options: &MatchOptions,
) -> Result<&'s [u8], Error> {
    let compiled = resolve(cache, pattern)?;
    let bytes = subject.bytes();
    Ok(match find(compiled, subject, options)? {
        Some(spans) => {
            let (start, end) = spans.whole();
            &bytes[start..end]
        }
        None => &[],
    })
}
