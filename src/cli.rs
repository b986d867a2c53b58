//! CLI interface using clap
//!
//! Each subcommand evaluates one SQL function against a fresh session.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use sqlre::config::{ConfigError, LogLevel};
use sqlre::core::matching::resolve;
use sqlre::core::report::escape_sql_literal;
use sqlre::core::{self, GroupId, MatchOptions, Subject, SubstituteOptions};
use sqlre::host::vtab::{
    IndexConstraint, COLUMN_GROUP_ID, COLUMN_MATCH_ORDER, COLUMN_PATTERN, COLUMN_SUBJECT,
    COLUMN_VALUE,
};
use sqlre::host::{HostError, RegexpCursor, Session, Value};
use sqlre::output::json::format_json;
use sqlre::output::text::{
    format_escape_result, format_instr_result, format_regexp_result, format_replace_result,
    format_substr_result, format_table_result,
};
use sqlre::output::{
    error_codes, ErrorResponse, EscapeResult, InstrResult, RegexpResult, ReplaceResult,
    SubstrResult, TableResult, TableRow,
};

#[derive(Parser)]
#[command(name = "sqlre")]
#[command(author, version, about = "Regular-expression SQL functions from the command line", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Number of compiled patterns kept in the session cache
    #[arg(long, global = true)]
    pub cache_size: Option<NonZeroUsize>,

    /// Emit every capture group in table scans without a group filter
    #[arg(long, global = true)]
    pub all_groups: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON output (default)
    Json,
    /// Human-readable text
    Text,
}

#[derive(Subcommand)]
pub enum Commands {
    /// REGEXP(pattern, subject): whether the pattern matches
    Regexp {
        pattern: String,
        subject: String,
    },

    /// REGEXP_INSTR: 1-based position of a match, 0 when none
    Instr {
        subject: String,
        pattern: String,

        /// Position to start searching from
        #[arg(long)]
        start: Option<NonZeroUsize>,

        /// Which match to report
        #[arg(long)]
        occurrence: Option<NonZeroUsize>,

        /// Treat the subject as a blob (positions count bytes)
        #[arg(long)]
        blob: bool,
    },

    /// REGEXP_SUBSTR: the matched text, empty when none
    Substr {
        subject: String,
        pattern: String,

        #[arg(long)]
        start: Option<NonZeroUsize>,

        #[arg(long)]
        occurrence: Option<NonZeroUsize>,
    },

    /// REGEXP_REPLACE: substitute matches using the extended replacement syntax
    Replace {
        subject: String,
        pattern: String,
        replacement: String,

        #[arg(long)]
        start: Option<NonZeroUsize>,

        /// Replace only this match instead of every match
        #[arg(long)]
        occurrence: Option<NonZeroUsize>,
    },

    /// REGEXP_TABLE: one row per match (SUBJECT PATTERN, or PATTERN with --file)
    Table {
        #[arg(required = true, num_args = 1..=2)]
        args: Vec<String>,

        /// Restrict rows to one capture group (number or name)
        #[arg(long, short = 'g')]
        group: Option<String>,

        /// Read the subject from a file
        #[arg(long, short = 'F')]
        file: Option<PathBuf>,
    },

    /// Render text as a SQL string literal
    Escape { text: String },
}

/// Parse CLI arguments
pub fn parse() -> Cli {
    Cli::parse()
}

fn position(n: Option<NonZeroUsize>) -> Option<usize> {
    n.map(NonZeroUsize::get)
}

/// Handle the regexp command
pub fn handle_regexp(
    session: &Session,
    pattern: &str,
    subject: &str,
    format: OutputFormat,
) -> Result<String> {
    let mut cache = session.cache();
    let engine = resolve(&mut cache, pattern.as_bytes())?.engine_type();
    let matched = core::test(&mut cache, pattern.as_bytes(), Subject::Text(subject))?;

    let result = RegexpResult {
        pattern: pattern.to_string(),
        subject: subject.to_string(),
        engine: engine.to_string(),
        matched,
    };
    Ok(match format {
        OutputFormat::Json => format_json(&result),
        OutputFormat::Text => format_regexp_result(&result),
    })
}

/// Handle the instr command
pub fn handle_instr(
    session: &Session,
    subject: &str,
    pattern: &str,
    start: Option<NonZeroUsize>,
    occurrence: Option<NonZeroUsize>,
    blob: bool,
    format: OutputFormat,
) -> Result<String> {
    let options = MatchOptions {
        start: position(start),
        occurrence: position(occurrence),
    };
    let target = if blob {
        Subject::Blob(subject.as_bytes())
    } else {
        Subject::Text(subject)
    };
    let at = core::locate(&mut session.cache(), pattern.as_bytes(), target, &options)?;

    let result = InstrResult {
        pattern: pattern.to_string(),
        subject: subject.to_string(),
        blob,
        start: options.start,
        occurrence: options.occurrence,
        position: at,
    };
    Ok(match format {
        OutputFormat::Json => format_json(&result),
        OutputFormat::Text => format_instr_result(&result),
    })
}

/// Handle the substr command
pub fn handle_substr(
    session: &Session,
    subject: &str,
    pattern: &str,
    start: Option<NonZeroUsize>,
    occurrence: Option<NonZeroUsize>,
    format: OutputFormat,
) -> Result<String> {
    let options = MatchOptions {
        start: position(start),
        occurrence: position(occurrence),
    };
    let found = core::extract(
        &mut session.cache(),
        pattern.as_bytes(),
        Subject::Text(subject),
        &options,
    )?;

    let result = SubstrResult {
        pattern: pattern.to_string(),
        subject: subject.to_string(),
        start: options.start,
        occurrence: options.occurrence,
        value: String::from_utf8_lossy(found).into_owned(),
    };
    Ok(match format {
        OutputFormat::Json => format_json(&result),
        OutputFormat::Text => format_substr_result(&result),
    })
}

/// Handle the replace command
pub fn handle_replace(
    session: &Session,
    subject: &str,
    pattern: &str,
    replacement: &str,
    start: Option<NonZeroUsize>,
    occurrence: Option<NonZeroUsize>,
    format: OutputFormat,
) -> Result<String> {
    let options = SubstituteOptions {
        start: position(start),
        occurrence: position(occurrence),
        unset_empty: false,
    };
    let substitution = core::substitute(
        &mut session.cache(),
        pattern.as_bytes(),
        Subject::Text(subject),
        replacement.as_bytes(),
        &options,
    )?;

    let result = ReplaceResult {
        pattern: pattern.to_string(),
        replacement: replacement.to_string(),
        original: subject.to_string(),
        result: String::from_utf8_lossy(&substitution.output).into_owned(),
        replacements_made: substitution.replacements,
    };
    Ok(match format {
        OutputFormat::Json => format_json(&result),
        OutputFormat::Text => format_replace_result(&result),
    })
}

/// Handle the table command
///
/// Runs the scan through the virtual-table surface: plan, open, filter,
/// then read columns until end of file.
pub fn handle_table(
    session: &Session,
    args: &[String],
    group: Option<&str>,
    file: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let (subject, pattern) = match (file, args) {
        (Some(path), [pattern]) => {
            let subject = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            (subject, pattern.clone())
        }
        (None, [subject, pattern]) => (subject.clone(), pattern.clone()),
        (Some(_), _) => bail!("table takes only PATTERN when --file is given"),
        (None, _) => bail!("table takes SUBJECT and PATTERN"),
    };

    let table = session.table();
    let mut constraints = vec![
        IndexConstraint::eq(COLUMN_SUBJECT),
        IndexConstraint::eq(COLUMN_PATTERN),
    ];
    let mut values = vec![Value::from(subject.as_str()), Value::from(pattern.as_str())];
    if let Some(group) = group {
        constraints.push(IndexConstraint::eq(COLUMN_GROUP_ID));
        values.push(Value::from(group));
    }
    let plan = table.best_index(&constraints)?;

    let mut argv = vec![Value::Null; values.len()];
    for (slot, value) in plan.argv_index.iter().zip(values) {
        if let Some(i) = slot {
            argv[i - 1] = value;
        }
    }

    let mut cursor = table.open();
    cursor.filter(plan.idx_num, &argv)?;
    let mut rows = Vec::new();
    while !cursor.eof() {
        rows.push(table_row(&cursor)?);
        cursor.next()?;
    }
    cursor.close();

    let result = TableResult {
        pattern,
        subject_length: subject.len(),
        group: group.map(str::to_string),
        policy: session.group_policy(),
        row_count: rows.len(),
        rows,
    };
    Ok(match format {
        OutputFormat::Json => format_json(&result),
        OutputFormat::Text => format_table_result(&result),
    })
}

fn table_row(cursor: &RegexpCursor) -> Result<TableRow, HostError> {
    let group_id = match cursor.column(COLUMN_GROUP_ID)? {
        Value::Integer(i) => GroupId::Index(usize::try_from(i).unwrap_or_default()),
        other => GroupId::Name(text_of(other).unwrap_or_default()),
    };
    let match_order = match cursor.column(COLUMN_MATCH_ORDER)? {
        Value::Integer(i) => usize::try_from(i).unwrap_or_default(),
        _ => 0,
    };
    Ok(TableRow {
        rowid: cursor.rowid(),
        group_id,
        value: text_of(cursor.column(COLUMN_VALUE)?),
        match_order,
    })
}

fn text_of(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(text) => Some(text),
        other => other
            .bytes()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// Handle the escape command
pub fn handle_escape(text: &str, format: OutputFormat) -> Result<String> {
    let literal = escape_sql_literal(Some(text.as_bytes()));
    let result = EscapeResult {
        input: text.to_string(),
        // Complete literals always end with a closing quote
        truncated: !literal.ends_with('\''),
        literal,
    };
    Ok(match format {
        OutputFormat::Json => format_json(&result),
        OutputFormat::Text => format_escape_result(&result),
    })
}

/// Map a command failure to its structured form
pub fn error_response(e: &anyhow::Error) -> ErrorResponse {
    if let Some(err) = e.downcast_ref::<core::Error>() {
        return ErrorResponse::new(err.code(), err.to_string()).with_position(err.compile_offset());
    }
    if let Some(err) = e.downcast_ref::<HostError>() {
        let code = match err {
            HostError::NoMemory => "NO_MEMORY",
            HostError::Constraint => "CONSTRAINT",
            _ => error_codes::QUERY_ERROR,
        };
        return ErrorResponse::new(code, err.to_string());
    }
    if let Some(err) = e.downcast_ref::<ConfigError>() {
        return ErrorResponse::new(error_codes::INVALID_CONFIG, err.to_string());
    }
    if e.downcast_ref::<std::io::Error>().is_some() {
        return ErrorResponse::new(error_codes::FILE_NOT_FOUND, format!("{:#}", e));
    }
    ErrorResponse::new(error_codes::COMMAND_ERROR, format!("{:#}", e))
}
