//! Lazy enumeration of matches as rows
//!
//! A [`MatchEnumerator`] is a cursor: `start_scan` starts a scan and positions
//! it on the first row, `advance` moves forward, and the scan ends in
//! [`ScanState::Exhausted`]. Rows are produced one match at a time.
//!
//! The scan runs on its own clone of the compiled pattern, so evictions
//! from the shared cache during a long scan do not affect it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::cache::PatternCache;
use super::engine::{CompiledPattern, MatchSpans};
use super::error::Error;
use super::matching::{resolve, MatchScanner};
use super::report::escape_sql_literal;

/// Which groups to emit when no group filter is bound
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPolicy {
    /// One row per match, for group 0
    #[default]
    WholeMatch,
    /// One row per group (including group 0) for every match
    AllGroups,
}

/// Identifies a capture group by number or by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GroupId {
    Index(usize),
    Name(String),
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupId::Index(index) => write!(f, "{}", index),
            GroupId::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Cursor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Unopened,
    Filtering,
    Iterating,
    Exhausted,
}

/// One emitted row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRow {
    pub rowid: i64,
    pub group_id: GroupId,
    /// Group text, `None` when the group did not participate
    pub value: Option<Vec<u8>>,
    /// 1-based index of the match this row belongs to
    pub match_order: usize,
    pub subject: Arc<[u8]>,
    pub pattern: Arc<[u8]>,
}

#[derive(Debug)]
struct Scan {
    subject: Arc<[u8]>,
    pattern: Arc<[u8]>,
    compiled: CompiledPattern,
    /// Resolved filter: group index and the id echoed in rows
    filter: Option<(usize, GroupId)>,
    scanner: MatchScanner,
    match_order: usize,
    rowid: i64,
    pending: VecDeque<MatchRow>,
}

impl Scan {
    fn push_rows(&mut self, spans: &MatchSpans, policy: GroupPolicy) {
        self.match_order += 1;
        let groups: Vec<(usize, GroupId)> = match (&self.filter, policy) {
            (Some(filter), _) => vec![filter.clone()],
            (None, GroupPolicy::WholeMatch) => vec![(0, GroupId::Index(0))],
            (None, GroupPolicy::AllGroups) => (0..self.compiled.group_count())
                .map(|i| {
                    let id = match self.compiled.group_name(i) {
                        Some(name) => GroupId::Name(name.to_string()),
                        None => GroupId::Index(i),
                    };
                    (i, id)
                })
                .collect(),
        };
        for (index, group_id) in groups {
            self.rowid += 1;
            let value = spans
                .get(index)
                .map(|(start, end)| self.subject[start..end].to_vec());
            self.pending.push_back(MatchRow {
                rowid: self.rowid,
                group_id,
                value,
                match_order: self.match_order,
                subject: Arc::clone(&self.subject),
                pattern: Arc::clone(&self.pattern),
            });
        }
    }
}

/// Cursor producing one row per (match, group)
#[derive(Debug)]
pub struct MatchEnumerator {
    policy: GroupPolicy,
    state: ScanState,
    scan: Option<Scan>,
    current: Option<MatchRow>,
    /// Error raised while prefetching for the iterator, reported next
    deferred: Option<Error>,
}

impl Default for MatchEnumerator {
    fn default() -> Self {
        Self::new(GroupPolicy::default())
    }
}

impl MatchEnumerator {
    pub fn new(policy: GroupPolicy) -> Self {
        Self {
            policy,
            state: ScanState::Unopened,
            scan: None,
            current: None,
            deferred: None,
        }
    }

    /// Start a scan, positioning the cursor on the first row
    ///
    /// `None` for subject or pattern stands for SQL NULL and produces an
    /// empty scan. Compile failures and unknown group filters are reported
    /// here rather than per row.
    pub fn start_scan(
        &mut self,
        cache: &mut PatternCache,
        subject: Option<&[u8]>,
        pattern: Option<&[u8]>,
        group: Option<GroupId>,
    ) -> Result<(), Error> {
        self.reset();
        self.state = ScanState::Filtering;

        let (Some(subject), Some(pattern)) = (subject, pattern) else {
            self.state = ScanState::Exhausted;
            return Ok(());
        };

        let started = self.start(cache, subject, pattern, group);
        match started {
            Ok(scan) => {
                debug!(
                    groups = scan.compiled.group_count(),
                    policy = ?self.policy,
                    "match scan started"
                );
                self.scan = Some(scan);
                self.state = ScanState::Iterating;
                self.advance()
            }
            Err(e) => {
                self.state = ScanState::Exhausted;
                Err(e)
            }
        }
    }

    fn start(
        &self,
        cache: &mut PatternCache,
        subject: &[u8],
        pattern: &[u8],
        group: Option<GroupId>,
    ) -> Result<Scan, Error> {
        let compiled = resolve(cache, pattern)?.clone();
        let filter = match group {
            None => None,
            Some(id) => {
                let index = match &id {
                    GroupId::Index(index) => Some(*index).filter(|&i| i < compiled.group_count()),
                    GroupId::Name(name) => compiled.group_index(name),
                };
                let Some(index) = index else {
                    return Err(Error::NoSuchGroup {
                        group: id.to_string(),
                        pattern: escape_sql_literal(Some(pattern)),
                    });
                };
                Some((index, id))
            }
        };
        Ok(Scan {
            subject: Arc::from(subject),
            pattern: Arc::from(pattern),
            compiled,
            filter,
            scanner: MatchScanner::starting_at(0),
            match_order: 0,
            rowid: 0,
            pending: VecDeque::new(),
        })
    }

    /// Move to the next row
    pub fn advance(&mut self) -> Result<(), Error> {
        self.current = None;
        let Some(scan) = self.scan.as_mut() else {
            self.state = ScanState::Exhausted;
            return Ok(());
        };

        if scan.pending.is_empty() {
            let found = scan.scanner.next_match(&scan.compiled, &scan.subject);
            match found {
                Ok(Some(spans)) => scan.push_rows(&spans, self.policy),
                Ok(None) => {}
                Err(e) => {
                    self.finish();
                    return Err(e.into());
                }
            }
        }

        match scan.pending.pop_front() {
            Some(row) => self.current = Some(row),
            None => self.finish(),
        }
        Ok(())
    }

    fn finish(&mut self) {
        if let Some(scan) = self.scan.take() {
            debug!(rows = scan.rowid, matches = scan.match_order, "match scan exhausted");
        }
        self.state = ScanState::Exhausted;
    }

    /// Release everything held by the current scan
    pub fn reset(&mut self) {
        self.scan = None;
        self.current = None;
        self.deferred = None;
        self.state = ScanState::Unopened;
    }

    pub fn eof(&self) -> bool {
        self.current.is_none()
    }

    pub fn current(&self) -> Option<&MatchRow> {
        self.current.as_ref()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn policy(&self) -> GroupPolicy {
        self.policy
    }
}

impl Iterator for MatchEnumerator {
    type Item = Result<MatchRow, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.deferred.take() {
            return Some(Err(e));
        }
        let row = self.current.take()?;
        if let Err(e) = self.advance() {
            self.deferred = Some(e);
        }
        Some(Ok(row))
    }
}
