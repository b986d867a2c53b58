//! sqlre - regular-expression SQL functions from the command line
//!
//! Evaluates REGEXP, REGEXP_INSTR, REGEXP_SUBSTR, REGEXP_REPLACE and
//! REGEXP_TABLE the way a host database would.

mod cli;

use std::process::ExitCode;

use anyhow::Result;
use cli::{Cli, Commands};
use sqlre::config::Config;
use sqlre::host::Session;
use sqlre::logging::init_logging;

fn main() -> ExitCode {
    let args = cli::parse();

    // If no command, show help
    let Some(command) = args.command.as_ref() else {
        eprintln!("sqlre: regular-expression SQL functions");
        eprintln!();
        eprintln!("Usage: sqlre <COMMAND>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  regexp   REGEXP(pattern, subject)");
        eprintln!("  instr    REGEXP_INSTR(subject, pattern[, start[, occurrence]])");
        eprintln!("  substr   REGEXP_SUBSTR(subject, pattern[, start[, occurrence]])");
        eprintln!("  replace  REGEXP_REPLACE(subject, pattern, replacement[, start[, occurrence]])");
        eprintln!("  table    Rows of REGEXP_TABLE(subject, pattern)");
        eprintln!("  escape   Render text as a SQL string literal");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  -f, --format <FORMAT>  Output format [json|text] (default: json)");
        eprintln!("  --cache-size <N>       Compiled patterns kept per session");
        eprintln!("  --all-groups           Emit every group in table scans");
        eprintln!("  -h, --help             Print help");
        eprintln!("  -V, --version          Print version");
        return ExitCode::SUCCESS;
    };

    match run(&args, command) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let error = cli::error_response(&e);
            let error_json = serde_json::to_string(&error)
                .unwrap_or_else(|_| format!(r#"{{"error":true,"message":"{}"}}"#, e));
            eprintln!("{}", error_json);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli, command: &Commands) -> Result<String> {
    let config = Config::from_env()?.apply_overrides(
        args.cache_size.map(|n| n.get()),
        args.all_groups,
        args.log_level,
    );
    init_logging(&config);
    tracing::debug!(?config, "session configured");

    let session = Session::new(&config);
    let format = args.format;

    match command {
        Commands::Regexp { pattern, subject } => {
            cli::handle_regexp(&session, pattern, subject, format)
        }

        Commands::Instr {
            subject,
            pattern,
            start,
            occurrence,
            blob,
        } => cli::handle_instr(
            &session,
            subject,
            pattern,
            *start,
            *occurrence,
            *blob,
            format,
        ),

        Commands::Substr {
            subject,
            pattern,
            start,
            occurrence,
        } => cli::handle_substr(&session, subject, pattern, *start, *occurrence, format),

        Commands::Replace {
            subject,
            pattern,
            replacement,
            start,
            occurrence,
        } => cli::handle_replace(
            &session,
            subject,
            pattern,
            replacement,
            *start,
            *occurrence,
            format,
        ),

        Commands::Table { args, group, file } => {
            cli::handle_table(&session, args, group.as_deref(), file.as_deref(), format)
        }

        Commands::Escape { text } => cli::handle_escape(text, format),
    }
}
