//! Adapter between the core and a SQL host
//!
//! A [`Session`] is what a host registers once per connection: it owns the
//! pattern cache shared by the scalar functions and the `REGEXP_TABLE`
//! virtual table. Arguments and results use the dynamically typed
//! [`Value`], and failures are reported as [`HostError`] whose text is the
//! message handed to the host's error channel.

pub mod vtab;

use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::trace;

use crate::config::Config;
use crate::core::{self, GroupPolicy, MatchOptions, PatternCache, Subject, SubstituteOptions};

pub use vtab::{IndexConstraint, IndexPlan, RegexpCursor, RegexpTable};

/// A dynamically typed SQL value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Bytes of the value as the host would hand them to a text function
    pub fn bytes(&self) -> Option<Cow<'_, [u8]>> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(Cow::Owned(i.to_string().into_bytes())),
            Value::Real(r) => Some(Cow::Owned(real_text(*r).into_bytes())),
            Value::Text(text) => Some(Cow::Borrowed(text.as_bytes())),
            Value::Blob(bytes) => Some(Cow::Borrowed(bytes)),
        }
    }

    /// Text when the bytes are UTF-8, otherwise a blob
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Value::Text(text),
            Err(e) => Value::Blob(e.into_bytes()),
        }
    }
}

/// Render a real the way SQL converts it to text
///
/// Fifteen significant digits, always with a decimal point, switching to
/// exponent notation below 1e-4 and from 1e15: `1.0`, `0.1`, `1.0e+20`.
pub fn real_text(r: f64) -> String {
    if r.is_nan() {
        return "NaN".to_string();
    }
    if r.is_infinite() {
        return if r < 0.0 { "-Inf" } else { "Inf" }.to_string();
    }
    let scientific = format!("{:.14e}", r);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..15).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.unsigned_abs());
    }
    let decimals = usize::try_from(14 - exponent).unwrap_or(0);
    trim_fraction(&format!("{:.*}", decimals, r))
}

/// Drop trailing fraction zeros, keeping at least one digit after the point
fn trim_fraction(digits: &str) -> String {
    match digits.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            let fraction = if fraction.is_empty() { "0" } else { fraction };
            format!("{}.{}", whole, fraction)
        }
        None => format!("{}.0", digits),
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

/// Errors reported through the host's error-result channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("{0}")]
    Error(String),

    #[error("out of memory")]
    NoMemory,

    #[error("wrong number of arguments to function {0}()")]
    Arity(String),

    #[error("no such function: {0}")]
    NoSuchFunction(String),

    #[error("constraint failed")]
    Constraint,

    #[error("{0}")]
    Misuse(&'static str),
}

impl From<core::Error> for HostError {
    fn from(e: core::Error) -> Self {
        match e {
            // Diagnostics are not rendered for allocation failures
            core::Error::Allocation => HostError::NoMemory,
            other => HostError::Error(other.to_string()),
        }
    }
}

/// A registered scalar function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
}

/// Scalar functions exposed by a session
pub const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "REGEXP",
        min_args: 2,
        max_args: 2,
    },
    FunctionSpec {
        name: "REGEXP_INSTR",
        min_args: 2,
        max_args: 4,
    },
    FunctionSpec {
        name: "REGEXP_SUBSTR",
        min_args: 2,
        max_args: 4,
    },
    FunctionSpec {
        name: "REGEXP_REPLACE",
        min_args: 3,
        max_args: 5,
    },
];

/// Name of the table-valued function
pub const TABLE_NAME: &str = "REGEXP_TABLE";

/// Per-connection registration state
#[derive(Debug, Clone)]
pub struct Session {
    cache: Arc<Mutex<PatternCache>>,
    group_policy: GroupPolicy,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Self {
            cache: Arc::new(Mutex::new(PatternCache::new(config.cache_capacity))),
            group_policy: config.group_policy,
        }
    }

    /// Lock the shared cache
    ///
    /// A poisoned lock is recovered: the cache has no intermediate states
    /// visible across a panic.
    pub fn cache(&self) -> MutexGuard<'_, PatternCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn group_policy(&self) -> GroupPolicy {
        self.group_policy
    }

    /// Look up a scalar function by name, ignoring case
    pub fn function(name: &str) -> Option<&'static FunctionSpec> {
        FUNCTIONS.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Call a scalar function by name
    ///
    /// Any NULL argument yields NULL.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, HostError> {
        let spec = Self::function(name).ok_or_else(|| HostError::NoSuchFunction(name.to_string()))?;
        if args.len() < spec.min_args || args.len() > spec.max_args {
            return Err(HostError::Arity(spec.name.to_string()));
        }
        if args.iter().any(Value::is_null) {
            return Ok(Value::Null);
        }
        trace!(function = spec.name, args = args.len(), "scalar call");

        match spec.name {
            "REGEXP" => self.regexp(&args[0], &args[1]),
            "REGEXP_INSTR" => {
                let options = match_options(spec.name, &args[2..])?;
                self.regexp_instr(&args[0], &args[1], &options)
            }
            "REGEXP_SUBSTR" => {
                let options = match_options(spec.name, &args[2..])?;
                self.regexp_substr(&args[0], &args[1], &options)
            }
            _ => {
                let positional = match_options(spec.name, &args[3..])?;
                let options = SubstituteOptions {
                    start: positional.start,
                    occurrence: positional.occurrence,
                    unset_empty: false,
                };
                self.regexp_replace(&args[0], &args[1], &args[2], &options)
            }
        }
    }

    /// `REGEXP(pattern, subject)`
    pub fn regexp(&self, pattern: &Value, subject: &Value) -> Result<Value, HostError> {
        let (Some(pattern), Some(subject)) = (pattern.bytes(), SubjectArg::new(subject)) else {
            return Ok(Value::Null);
        };
        let matched = core::test(&mut self.cache(), &pattern, subject.subject())?;
        Ok(Value::Integer(i64::from(matched)))
    }

    /// `REGEXP_INSTR(subject, pattern[, start[, occurrence]])`
    pub fn regexp_instr(
        &self,
        subject: &Value,
        pattern: &Value,
        options: &MatchOptions,
    ) -> Result<Value, HostError> {
        let (Some(subject), Some(pattern)) = (SubjectArg::new(subject), pattern.bytes()) else {
            return Ok(Value::Null);
        };
        let position = core::locate(&mut self.cache(), &pattern, subject.subject(), options)?;
        Ok(Value::Integer(i64::try_from(position).unwrap_or(i64::MAX)))
    }

    /// `REGEXP_SUBSTR(subject, pattern[, start[, occurrence]])`
    pub fn regexp_substr(
        &self,
        subject: &Value,
        pattern: &Value,
        options: &MatchOptions,
    ) -> Result<Value, HostError> {
        let (Some(subject), Some(pattern)) = (SubjectArg::new(subject), pattern.bytes()) else {
            return Ok(Value::Null);
        };
        let found = core::extract(&mut self.cache(), &pattern, subject.subject(), options)?;
        Ok(subject.result(found.to_vec()))
    }

    /// `REGEXP_REPLACE(subject, pattern, replacement[, start[, occurrence]])`
    pub fn regexp_replace(
        &self,
        subject: &Value,
        pattern: &Value,
        replacement: &Value,
        options: &SubstituteOptions,
    ) -> Result<Value, HostError> {
        let (Some(subject), Some(pattern), Some(replacement)) =
            (SubjectArg::new(subject), pattern.bytes(), replacement.bytes())
        else {
            return Ok(Value::Null);
        };
        let substitution = core::substitute(
            &mut self.cache(),
            &pattern,
            subject.subject(),
            &replacement,
            options,
        )?;
        Ok(subject.result(substitution.output.into_owned()))
    }

    /// The `REGEXP_TABLE` module bound to this session's cache
    pub fn table(&self) -> RegexpTable {
        RegexpTable::connect(self)
    }

    pub(crate) fn shared_cache(&self) -> Arc<Mutex<PatternCache>> {
        Arc::clone(&self.cache)
    }
}

/// A subject argument and how its positions are counted
enum SubjectArg<'a> {
    Text(Cow<'a, str>),
    Blob(&'a [u8]),
}

impl<'a> SubjectArg<'a> {
    fn new(value: &'a Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Integer(i) => Some(SubjectArg::Text(Cow::Owned(i.to_string()))),
            Value::Real(r) => Some(SubjectArg::Text(Cow::Owned(real_text(*r)))),
            Value::Text(text) => Some(SubjectArg::Text(Cow::Borrowed(text))),
            Value::Blob(bytes) => Some(SubjectArg::Blob(bytes)),
        }
    }

    fn subject(&self) -> Subject<'_> {
        match self {
            SubjectArg::Text(text) => Subject::Text(text),
            SubjectArg::Blob(bytes) => Subject::Blob(bytes),
        }
    }

    fn result(&self, bytes: Vec<u8>) -> Value {
        match self {
            SubjectArg::Text(_) => Value::from_bytes(bytes),
            SubjectArg::Blob(_) => Value::Blob(bytes),
        }
    }
}

/// Read optional trailing `start` and `occurrence` arguments
fn match_options(function: &str, args: &[Value]) -> Result<MatchOptions, HostError> {
    let mut options = MatchOptions::default();
    for (i, arg) in args.iter().enumerate() {
        let position = positive_integer(arg).ok_or_else(|| {
            HostError::Error(format!(
                "{}() argument {} must be a positive integer",
                function,
                i + 3 + usize::from(function == "REGEXP_REPLACE")
            ))
        })?;
        if i == 0 {
            options.start = Some(position);
        } else {
            options.occurrence = Some(position);
        }
    }
    Ok(options)
}

fn positive_integer(value: &Value) -> Option<usize> {
    let n = match value {
        Value::Integer(i) => *i,
        Value::Real(r) if r.fract() == 0.0 => *r as i64,
        Value::Text(text) => text.trim().parse().ok()?,
        _ => return None,
    };
    usize::try_from(n).ok().filter(|&n| n >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::from(s)
    }

    #[test]
    fn test_regexp() {
        let session = Session::default();
        assert_eq!(
            session.call("regexp", &[text(r"\d"), text("a1")]).unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            session.call("REGEXP", &[text(r"\d"), text("ab")]).unwrap(),
            Value::Integer(0)
        );
    }

    #[test]
    fn test_real_text() {
        assert_eq!(real_text(1.0), "1.0");
        assert_eq!(real_text(-2.5), "-2.5");
        assert_eq!(real_text(0.1), "0.1");
        assert_eq!(real_text(123.456), "123.456");
        assert_eq!(real_text(0.0), "0.0");
        assert_eq!(real_text(1e20), "1.0e+20");
        assert_eq!(real_text(1.5e-7), "1.5e-07");
        assert_eq!(real_text(f64::INFINITY), "Inf");
    }

    #[test]
    fn test_real_subject_keeps_fraction() {
        let session = Session::default();
        assert_eq!(
            session.call("REGEXP_SUBSTR", &[Value::Real(1.0), text(r"\.\d")]).unwrap(),
            text(".0")
        );
        assert_eq!(Value::Real(3.0).bytes().as_deref(), Some(&b"3.0"[..]));
    }

    #[test]
    fn test_null_arguments() {
        let session = Session::default();
        for f in FUNCTIONS {
            let mut args = vec![text("a"); f.min_args];
            args[1] = Value::Null;
            assert_eq!(session.call(f.name, &args).unwrap(), Value::Null, "{}", f.name);
        }
    }

    #[test]
    fn test_arity() {
        let session = Session::default();
        let err = session.call("REGEXP", &[text("a")]).unwrap_err();
        assert_eq!(err, HostError::Arity("REGEXP".to_string()));
        assert!(matches!(
            session.call("REGEXP_LIKE", &[]),
            Err(HostError::NoSuchFunction(_))
        ));
    }

    #[test]
    fn test_instr_with_options() {
        let session = Session::default();
        let args = [text("a1b2"), text(r"\d"), Value::Integer(1), Value::Integer(2)];
        assert_eq!(session.call("REGEXP_INSTR", &args).unwrap(), Value::Integer(4));

        let bad = [text("a1b2"), text(r"\d"), Value::Integer(0)];
        assert_eq!(
            session.call("REGEXP_INSTR", &bad).unwrap_err().to_string(),
            "REGEXP_INSTR() argument 3 must be a positive integer"
        );
    }

    #[test]
    fn test_instr_blob_counts_bytes() {
        let session = Session::default();
        let subject = Value::Blob("\u{e9}x".as_bytes().to_vec());
        assert_eq!(
            session.call("REGEXP_INSTR", &[subject, text("x")]).unwrap(),
            Value::Integer(3)
        );
    }

    #[test]
    fn test_integer_subject_uses_text_rendering() {
        let session = Session::default();
        assert_eq!(
            session
                .call("REGEXP_SUBSTR", &[Value::Integer(12345), text("3.")])
                .unwrap(),
            text("34")
        );
    }

    #[test]
    fn test_replace_error_text() {
        let session = Session::default();
        let err = session
            .call("REGEXP_REPLACE", &[text("abc"), text("b"), text("$7")])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot execute REGEXP_REPLACE('abc', 'b', '$7') at character 1 (unknown substring)"
        );

        let bad = session
            .call("REGEXP_REPLACE", &[text("a"), text("a"), text("b"), text("x")])
            .unwrap_err();
        assert_eq!(
            bad.to_string(),
            "REGEXP_REPLACE() argument 4 must be a positive integer"
        );
    }

    #[test]
    fn test_cache_is_shared_between_clones() {
        let session = Session::default();
        let other = session.clone();
        session.call("REGEXP", &[text("q+"), text("qq")]).unwrap();
        other.call("REGEXP", &[text("q+"), text("q")]).unwrap();
        let stats = session.cache().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_allocation_error_maps_to_no_memory() {
        assert_eq!(HostError::from(core::Error::Allocation), HostError::NoMemory);
    }
}
