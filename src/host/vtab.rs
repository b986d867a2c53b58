//! The `REGEXP_TABLE` table-valued function
//!
//! Planning mirrors a virtual-table `best_index` callback: subject and
//! pattern are mandatory equality arguments and the group filter is
//! optional. The cursor wraps a [`MatchEnumerator`] and only holds the
//! cache lock while a scan is being started.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::{HostError, Session, Value, TABLE_NAME};
use crate::core::{GroupId, GroupPolicy, MatchEnumerator, PatternCache};

pub const COLUMN_GROUP_ID: usize = 0;
pub const COLUMN_VALUE: usize = 1;
pub const COLUMN_MATCH_ORDER: usize = 2;
pub const COLUMN_SUBJECT: usize = 3;
pub const COLUMN_PATTERN: usize = 4;

/// Declared schema; the last two columns are the hidden arguments
pub const SCHEMA: &str = "CREATE TABLE REGEXP_TABLE(\
group_id ANY, value TEXT, match_order INT, \
subject TEXT HIDDEN, pattern TEXT HIDDEN)";

/// Names of the declared columns, in order
pub const COLUMNS: [&str; 5] = ["group_id", "value", "match_order", "subject", "pattern"];

/// `idx_num` when a group filter is bound as the third argument
pub const IDX_GROUP_FILTER: i32 = 1;

const ESTIMATED_COST: f64 = 10.0;
const ESTIMATED_ROWS: i64 = 10;

/// Operator of a WHERE-clause constraint offered to the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    Eq,
    Other,
}

/// A constraint offered to [`RegexpTable::best_index`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConstraint {
    pub column: usize,
    pub op: ConstraintOp,
    pub usable: bool,
}

impl IndexConstraint {
    pub fn eq(column: usize) -> Self {
        Self {
            column,
            op: ConstraintOp::Eq,
            usable: true,
        }
    }

    pub fn unusable(mut self) -> Self {
        self.usable = false;
        self
    }
}

/// Result of planning
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPlan {
    /// For each offered constraint, its 1-based position in the filter
    /// arguments, if consumed
    pub argv_index: Vec<Option<usize>>,
    /// Whether the host may skip re-checking each consumed constraint
    pub omit: Vec<bool>,
    pub idx_num: i32,
    pub estimated_cost: f64,
    pub estimated_rows: i64,
}

/// The module instance bound to a session
#[derive(Debug, Clone)]
pub struct RegexpTable {
    cache: Arc<Mutex<PatternCache>>,
    policy: GroupPolicy,
}

impl RegexpTable {
    pub fn connect(session: &Session) -> Self {
        Self {
            cache: session.shared_cache(),
            policy: session.group_policy(),
        }
    }

    pub fn name(&self) -> &'static str {
        TABLE_NAME
    }

    pub fn schema(&self) -> &'static str {
        SCHEMA
    }

    /// Choose how constraints map onto filter arguments
    ///
    /// Subject and pattern must be bound: an unusable constraint on either
    /// asks the host for another plan, and a missing one is an error.
    pub fn best_index(&self, constraints: &[IndexConstraint]) -> Result<IndexPlan, HostError> {
        // Constraint index for subject, pattern and group, in that order
        let mut slots: [Option<usize>; 3] = [None; 3];
        let mut unusable = [false; 3];

        for (i, constraint) in constraints.iter().enumerate() {
            let slot = match constraint.column {
                COLUMN_SUBJECT => 0,
                COLUMN_PATTERN => 1,
                COLUMN_GROUP_ID => 2,
                _ => continue,
            };
            if constraint.op != ConstraintOp::Eq {
                continue;
            }
            if constraint.usable {
                slots[slot] = Some(i);
            } else {
                unusable[slot] = true;
            }
        }

        // Arguments are numbered from 0 in the message
        for slot in 0..2 {
            if slots[slot].is_none() {
                if unusable[slot] {
                    return Err(HostError::Constraint);
                }
                return Err(HostError::Error(format!(
                    "Argument #{} of \"{}()\" missing",
                    slot, TABLE_NAME
                )));
            }
        }

        let mut plan = IndexPlan {
            argv_index: vec![None; constraints.len()],
            omit: vec![false; constraints.len()],
            idx_num: 0,
            estimated_cost: ESTIMATED_COST,
            estimated_rows: ESTIMATED_ROWS,
        };
        let mut argv = 0;
        for (slot, constraint) in slots.iter().enumerate() {
            let Some(i) = *constraint else { continue };
            argv += 1;
            plan.argv_index[i] = Some(argv);
            plan.omit[i] = true;
            if slot == 2 {
                plan.idx_num = IDX_GROUP_FILTER;
            }
        }
        debug!(idx_num = plan.idx_num, args = argv, "planned {}", TABLE_NAME);
        Ok(plan)
    }

    pub fn open(&self) -> RegexpCursor {
        RegexpCursor {
            cache: Arc::clone(&self.cache),
            rows: MatchEnumerator::new(self.policy),
        }
    }
}

/// A cursor over one table-valued function invocation
#[derive(Debug)]
pub struct RegexpCursor {
    cache: Arc<Mutex<PatternCache>>,
    rows: MatchEnumerator,
}

impl RegexpCursor {
    /// Start a scan with arguments laid out by [`RegexpTable::best_index`]
    pub fn filter(&mut self, idx_num: i32, args: &[Value]) -> Result<(), HostError> {
        let expected = if idx_num == IDX_GROUP_FILTER { 3 } else { 2 };
        if args.len() < expected {
            return Err(HostError::Misuse("REGEXP_TABLE() filter called with too few arguments"));
        }
        let subject = args[0].bytes();
        let pattern = args[1].bytes();

        let group = if idx_num == IDX_GROUP_FILTER {
            match group_filter(&args[2])? {
                Some(group) => Some(group),
                None => {
                    // `group_id = NULL` is never true
                    self.rows.reset();
                    let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
                    return Ok(self.rows.start_scan(&mut cache, None, None, None)?);
                }
            }
        } else {
            None
        };

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        self.rows
            .start_scan(&mut cache, subject.as_deref(), pattern.as_deref(), group)?;
        Ok(())
    }

    pub fn next(&mut self) -> Result<(), HostError> {
        Ok(self.rows.advance()?)
    }

    pub fn eof(&self) -> bool {
        self.rows.eof()
    }

    /// Value of column `column` for the current row
    pub fn column(&self, column: usize) -> Result<Value, HostError> {
        let row = self
            .rows
            .current()
            .ok_or(HostError::Misuse("REGEXP_TABLE() cursor is not on a row"))?;
        Ok(match column {
            COLUMN_GROUP_ID => match &row.group_id {
                GroupId::Index(index) => Value::Integer(i64::try_from(*index).unwrap_or(i64::MAX)),
                GroupId::Name(name) => Value::Text(name.clone()),
            },
            COLUMN_VALUE => match &row.value {
                Some(bytes) => Value::from_bytes(bytes.clone()),
                None => Value::Null,
            },
            COLUMN_MATCH_ORDER => Value::Integer(i64::try_from(row.match_order).unwrap_or(i64::MAX)),
            COLUMN_SUBJECT => Value::from_bytes(row.subject.to_vec()),
            COLUMN_PATTERN => Value::from_bytes(row.pattern.to_vec()),
            _ => return Err(HostError::Misuse("REGEXP_TABLE() column index out of range")),
        })
    }

    /// Rowid of the current row; 0 before the first row
    pub fn rowid(&self) -> i64 {
        self.rows.current().map_or(0, |row| row.rowid)
    }

    /// Release the scan
    pub fn close(mut self) {
        self.rows.reset();
    }
}

/// Interpret a bound `group_id` value
///
/// Integers and digit-only text select by number, other text by name.
fn group_filter(value: &Value) -> Result<Option<GroupId>, HostError> {
    let invalid = || HostError::Error(format!("{}() group_id must be a number or a name", TABLE_NAME));
    match value {
        Value::Null => Ok(None),
        Value::Integer(i) => usize::try_from(*i).map(|i| Some(GroupId::Index(i))).map_err(|_| invalid()),
        Value::Real(r) if r.fract() == 0.0 && *r >= 0.0 => Ok(Some(GroupId::Index(*r as usize))),
        Value::Text(text) => Ok(Some(match text.parse::<usize>() {
            Ok(index) => GroupId::Index(index),
            Err(_) => GroupId::Name(text.clone()),
        })),
        _ => Err(invalid()),
    }
}
