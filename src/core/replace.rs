//! Global substitution with an extended replacement syntax
//!
//! Substitution runs in two passes over the same matches. The probe pass
//! expands every replacement into a length counter and surfaces any
//! failure; the fill pass writes into a buffer reserved at exactly that
//! length. A substitution that selects no match returns the subject as is.
//!
//! Replacement syntax:
//!
//! | Form | Meaning |
//! |---|---|
//! | `$n`, `${n}`, `\n` (one digit) | group `n` |
//! | `$name`, `${name}` | named group |
//! | `$$` | literal `$` |
//! | `${g:-text}` | group `g`, or `text` when it did not participate |
//! | `${g:+set:unset}` | `set` when group `g` participated, otherwise `unset` |
//! | `\a \e \f \n \r \t \xhh` | control and hex escapes |
//! | `\U \L \E \u \l` | upper/lower case until `\E`, or for the next character |
//!
//! Any other escaped punctuation is taken literally.

use std::borrow::Cow;

use super::cache::PatternCache;
use super::engine::{CompiledPattern, MatchSpans};
use super::error::{Error, SubstituteError};
use super::matching::{resolve, MatchScanner, Subject};
use super::report::escape_sql_literal;

/// Optional arguments for [`substitute`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstituteOptions {
    /// 1-based position where matching starts (characters for text)
    pub start: Option<usize>,
    /// Replace only this 1-based occurrence instead of every match
    pub occurrence: Option<usize>,
    /// Expand groups that did not participate as empty text instead of failing
    pub unset_empty: bool,
}

impl SubstituteOptions {
    pub fn with_start(mut self, start: usize) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_occurrence(mut self, occurrence: usize) -> Self {
        self.occurrence = Some(occurrence);
        self
    }

    pub fn with_unset_empty(mut self, unset_empty: bool) -> Self {
        self.unset_empty = unset_empty;
        self
    }
}

/// Outcome of a substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution<'s> {
    /// Resulting bytes; borrowed from the subject when nothing was replaced
    pub output: Cow<'s, [u8]>,
    /// Number of matches replaced
    pub replacements: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GroupRef {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Case {
    Upper,
    Lower,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(Vec<u8>),
    Group(GroupRef),
    Default {
        group: GroupRef,
        fallback: Vec<Piece>,
    },
    Conditional {
        group: GroupRef,
        set: Vec<Piece>,
        unset: Vec<Piece>,
    },
    /// `\U`/`\L`; `None` is `\E`
    CaseMode(Option<Case>),
    /// `\u`/`\l`
    CaseNext(Case),
}

/// A parsed replacement string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pieces: Vec<Piece>,
}

/// Syntax error in a replacement string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    pub message: &'static str,
    /// Byte offset in the replacement string
    pub offset: usize,
}

const BAD_ESCAPE: &str = "bad escape sequence in replacement string";
const BAD_REPLACEMENT: &str = "invalid replacement string";
const MISSING_BRACE: &str = "expected closing curly bracket in replacement string";
const UNKNOWN_GROUP: &str = "unknown substring";
const UNSET_GROUP: &str = "requested value is not set";

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn error(&self, message: &'static str) -> TemplateError {
        TemplateError {
            message,
            offset: self.pos,
        }
    }

    /// Parse pieces until one of `stops` or the end of input
    ///
    /// Returns the stop byte that ended the sequence; running out of input
    /// while stops are expected is an error.
    fn sequence(&mut self, stops: &[u8]) -> Result<(Vec<Piece>, Option<u8>), TemplateError> {
        let mut pieces = Vec::new();
        let mut literal = Vec::new();

        loop {
            let Some(byte) = self.peek() else {
                if !stops.is_empty() {
                    return Err(self.error(MISSING_BRACE));
                }
                flush(&mut pieces, &mut literal);
                return Ok((pieces, None));
            };
            if stops.contains(&byte) {
                self.pos += 1;
                flush(&mut pieces, &mut literal);
                return Ok((pieces, Some(byte)));
            }
            match byte {
                b'$' => {
                    self.pos += 1;
                    if self.peek() == Some(b'$') {
                        self.pos += 1;
                        literal.push(b'$');
                    } else {
                        flush(&mut pieces, &mut literal);
                        pieces.push(self.dollar()?);
                    }
                }
                b'\\' => {
                    self.pos += 1;
                    match self.escape()? {
                        Escaped::Byte(b) => literal.push(b),
                        Escaped::Piece(piece) => {
                            flush(&mut pieces, &mut literal);
                            pieces.push(piece);
                        }
                    }
                }
                _ => {
                    self.pos += 1;
                    literal.push(byte);
                }
            }
        }
    }

    /// Parse what follows a `$`
    fn dollar(&mut self) -> Result<Piece, TemplateError> {
        if self.peek() == Some(b'{') {
            self.pos += 1;
            let group = self.group_ref()?;
            return match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    Ok(Piece::Group(group))
                }
                Some(b':') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'-') => {
                            self.pos += 1;
                            let (fallback, _) = self.sequence(b"}")?;
                            Ok(Piece::Default { group, fallback })
                        }
                        Some(b'+') => {
                            self.pos += 1;
                            let (set, stop) = self.sequence(b":}")?;
                            let unset = if stop == Some(b':') {
                                self.sequence(b"}")?.0
                            } else {
                                Vec::new()
                            };
                            Ok(Piece::Conditional { group, set, unset })
                        }
                        _ => Err(self.error(BAD_REPLACEMENT)),
                    }
                }
                None => Err(self.error(MISSING_BRACE)),
                Some(_) => Err(self.error(BAD_REPLACEMENT)),
            };
        }
        Ok(Piece::Group(self.group_ref()?))
    }

    fn group_ref(&mut self) -> Result<GroupRef, TemplateError> {
        let start = self.pos;
        match self.peek() {
            Some(b) if b.is_ascii_digit() => {
                while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits = std::str::from_utf8(&self.input[start..self.pos])
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok());
                match digits {
                    Some(index) => Ok(GroupRef::Index(index)),
                    None => Err(TemplateError {
                        message: BAD_REPLACEMENT,
                        offset: start,
                    }),
                }
            }
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                while self
                    .peek()
                    .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
                {
                    self.pos += 1;
                }
                let name = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
                Ok(GroupRef::Name(name))
            }
            _ => Err(self.error(BAD_REPLACEMENT)),
        }
    }

    /// Parse what follows a backslash
    fn escape(&mut self) -> Result<Escaped, TemplateError> {
        let Some(byte) = self.peek() else {
            return Err(self.error(BAD_ESCAPE));
        };
        self.pos += 1;
        let escaped = match byte {
            b'a' => Escaped::Byte(0x07),
            b'e' => Escaped::Byte(0x1b),
            b'f' => Escaped::Byte(0x0c),
            b'n' => Escaped::Byte(b'\n'),
            b'r' => Escaped::Byte(b'\r'),
            b't' => Escaped::Byte(b'\t'),
            b'U' => Escaped::Piece(Piece::CaseMode(Some(Case::Upper))),
            b'L' => Escaped::Piece(Piece::CaseMode(Some(Case::Lower))),
            b'E' => Escaped::Piece(Piece::CaseMode(None)),
            b'u' => Escaped::Piece(Piece::CaseNext(Case::Upper)),
            b'l' => Escaped::Piece(Piece::CaseNext(Case::Lower)),
            b'x' => {
                let hex = self
                    .input
                    .get(self.pos..self.pos + 2)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| self.error(BAD_ESCAPE))?;
                self.pos += 2;
                Escaped::Byte(hex)
            }
            b'0'..=b'9' => Escaped::Piece(Piece::Group(GroupRef::Index(usize::from(byte - b'0')))),
            b if b.is_ascii_alphanumeric() => {
                self.pos -= 1;
                return Err(self.error(BAD_ESCAPE));
            }
            other => Escaped::Byte(other),
        };
        Ok(escaped)
    }
}

enum Escaped {
    Byte(u8),
    Piece(Piece),
}

fn flush(pieces: &mut Vec<Piece>, literal: &mut Vec<u8>) {
    if !literal.is_empty() {
        pieces.push(Piece::Literal(std::mem::take(literal)));
    }
}

impl Template {
    /// Parse a replacement string
    pub fn parse(replacement: &[u8]) -> Result<Self, TemplateError> {
        let mut parser = Parser {
            input: replacement,
            pos: 0,
        };
        let (pieces, _) = parser.sequence(&[])?;
        Ok(Self { pieces })
    }

    /// True when the template never refers to a group
    pub fn is_literal(&self) -> bool {
        self.pieces.iter().all(|p| matches!(p, Piece::Literal(_)))
    }
}

/// Destination of expanded replacement bytes
trait Sink {
    fn push(&mut self, bytes: &[u8]);
}

/// Counts bytes without storing them
#[derive(Default)]
struct Probe(usize);

impl Sink for Probe {
    fn push(&mut self, bytes: &[u8]) {
        self.0 += bytes.len();
    }
}

impl Sink for Vec<u8> {
    fn push(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Expansion context for one match
struct Expansion<'a> {
    compiled: &'a CompiledPattern,
    subject: &'a [u8],
    spans: &'a MatchSpans,
    unset_empty: bool,
    mode: Option<Case>,
    next: Option<Case>,
}

impl<'a> Expansion<'a> {
    fn index(&self, group: &GroupRef) -> Result<usize, &'static str> {
        let index = match group {
            GroupRef::Index(index) => Some(*index).filter(|&i| i < self.compiled.group_count()),
            GroupRef::Name(name) => self.compiled.group_index(name),
        };
        index.ok_or(UNKNOWN_GROUP)
    }

    fn group_text(&self, group: &GroupRef) -> Result<Option<&'a [u8]>, &'static str> {
        let index = self.index(group)?;
        let subject = self.subject;
        Ok(self.spans.get(index).map(|(start, end)| &subject[start..end]))
    }

    fn expand(&mut self, pieces: &[Piece], sink: &mut impl Sink) -> Result<(), &'static str> {
        for piece in pieces {
            match piece {
                Piece::Literal(bytes) => self.emit(bytes, sink),
                Piece::Group(group) => match self.group_text(group)? {
                    Some(text) => self.emit(text, sink),
                    None if self.unset_empty => {}
                    None => return Err(UNSET_GROUP),
                },
                Piece::Default { group, fallback } => match self.group_text(group)? {
                    Some(text) => self.emit(text, sink),
                    None => self.expand(fallback, sink)?,
                },
                Piece::Conditional { group, set, unset } => {
                    if self.group_text(group)?.is_some() {
                        self.expand(set, sink)?;
                    } else {
                        self.expand(unset, sink)?;
                    }
                }
                Piece::CaseMode(mode) => {
                    self.mode = *mode;
                    self.next = None;
                }
                Piece::CaseNext(case) => self.next = Some(*case),
            }
        }
        Ok(())
    }

    /// Write bytes, applying any active case forcing
    fn emit(&mut self, bytes: &[u8], sink: &mut impl Sink) {
        if bytes.is_empty() {
            return;
        }
        if self.mode.is_none() && self.next.is_none() {
            sink.push(bytes);
            return;
        }
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                let mut out = String::with_capacity(text.len());
                for c in text.chars() {
                    match self.next.take().or(self.mode) {
                        Some(Case::Upper) => out.extend(c.to_uppercase()),
                        Some(Case::Lower) => out.extend(c.to_lowercase()),
                        None => out.push(c),
                    }
                }
                sink.push(out.as_bytes());
            }
            Err(_) => {
                let out: Vec<u8> = bytes
                    .iter()
                    .map(|b| match self.next.take().or(self.mode) {
                        Some(Case::Upper) => b.to_ascii_uppercase(),
                        Some(Case::Lower) => b.to_ascii_lowercase(),
                        None => *b,
                    })
                    .collect();
                sink.push(&out);
            }
        }
    }
}

/// Replace matches of `pattern` in `subject`
///
/// Every match is replaced unless `options.occurrence` selects one.
pub fn substitute<'s>(
    cache: &mut PatternCache,
    pattern: &[u8],
    subject: Subject<'s>,
    replacement: &[u8],
    options: &SubstituteOptions,
) -> Result<Substitution<'s>, Error> {
    let compiled = resolve(cache, pattern)?;
    let bytes = subject.bytes();
    let fail = |offset: usize, message: String| {
        Error::Substitute(SubstituteError {
            offset: subject.positions_before(offset),
            message,
            subject: escape_sql_literal(Some(bytes)),
            pattern: escape_sql_literal(Some(pattern)),
            replacement: escape_sql_literal(Some(replacement)),
        })
    };

    let Some(start) = subject.byte_offset(options.start.unwrap_or(1)) else {
        return Ok(unchanged(bytes));
    };
    let template = Template::parse(replacement);

    // Probe pass
    let mut probe = Probe::default();
    let mut kept = 0;
    let replacements = run(
        compiled,
        bytes,
        start,
        options,
        |spans, scan_from| {
            let template = template.as_ref().map_err(|e| (spans.whole().0, e.message))?;
            let (match_start, match_end) = spans.whole();
            kept += match_start - scan_from;
            let mut expansion = Expansion {
                compiled,
                subject: bytes,
                spans,
                unset_empty: options.unset_empty,
                mode: None,
                next: None,
            };
            expansion
                .expand(&template.pieces, &mut probe)
                .map_err(|message| (match_start, message))?;
            Ok(match_end)
        },
    )
    .map_err(|(offset, message)| fail(offset, message))?;

    let Some(tail_from) = replacements.last_end else {
        return Ok(unchanged(bytes));
    };
    let length = start + kept + probe.0 + (bytes.len() - tail_from);

    // Fill pass
    let mut output: Vec<u8> = Vec::new();
    output
        .try_reserve_exact(length)
        .map_err(|_| Error::Allocation)?;
    output.extend_from_slice(&bytes[..start]);
    run(compiled, bytes, start, options, |spans, scan_from| {
        let template = template.as_ref().map_err(|e| (spans.whole().0, e.message))?;
        let (match_start, match_end) = spans.whole();
        output.extend_from_slice(&bytes[scan_from..match_start]);
        let mut expansion = Expansion {
            compiled,
            subject: bytes,
            spans,
            unset_empty: options.unset_empty,
            mode: None,
            next: None,
        };
        expansion
            .expand(&template.pieces, &mut output)
            .map_err(|message| (match_start, message))?;
        Ok(match_end)
    })
    .map_err(|(offset, message)| fail(offset, message))?;
    output.extend_from_slice(&bytes[tail_from..]);
    debug_assert_eq!(output.len(), length);

    Ok(Substitution {
        output: Cow::Owned(output),
        replacements: replacements.count,
    })
}

fn unchanged(bytes: &[u8]) -> Substitution<'_> {
    Substitution {
        output: Cow::Borrowed(bytes),
        replacements: 0,
    }
}

struct RunSummary {
    count: usize,
    /// End of the last replaced match
    last_end: Option<usize>,
}

/// Walk the selected matches, handing each to `replace`
///
/// `replace` receives the spans and the offset where unreplaced text
/// begins, and returns the new unreplaced offset.
fn run<F>(
    compiled: &CompiledPattern,
    subject: &[u8],
    start: usize,
    options: &SubstituteOptions,
    mut replace: F,
) -> Result<RunSummary, (usize, String)>
where
    F: FnMut(&MatchSpans, usize) -> Result<usize, (usize, &'static str)>,
{
    let mut scanner = MatchScanner::starting_at(start);
    let mut summary = RunSummary {
        count: 0,
        last_end: None,
    };
    let mut scan_from = start;
    let mut seen = 0;

    loop {
        let position = scanner.position();
        let Some(spans) = scanner
            .next_match(compiled, subject)
            .map_err(|e| (position.min(subject.len()), e.to_string()))?
        else {
            break;
        };
        seen += 1;
        if let Some(wanted) = options.occurrence {
            if seen < wanted.max(1) {
                continue;
            }
        }
        scan_from = replace(&spans, scan_from).map_err(|(at, m)| (at, m.to_string()))?;
        summary.count += 1;
        summary.last_end = Some(scan_from);
        if options.occurrence.is_some() {
            break;
        }
    }
    Ok(summary)
}
