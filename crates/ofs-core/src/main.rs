//! Open File Search - query client
//!
//! `ofs <COMMAND> <ARG>` opens a session on a `/proc`-backed search
//! instance, runs one query, prints the records, and closes the session.

#[cfg(not(target_os = "linux"))]
compile_error!("the ofs client searches /proc and only builds on Linux");

use clap::Parser;
use ofs_common::error::{format_error_human, format_structured_human};
use ofs_common::{CommandKind, Error, OutputFormat, Query, ResultRecord, StructuredError};
use ofs_core::config::{load_config, ConfigError, EngineConfig};
use ofs_core::exit_codes::ExitCode;
use ofs_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use ofs_core::{OpenFileSearch, QuerySummary};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;

/// Find open files by process, user, file owner or path
#[derive(Parser, Debug)]
#[command(name = "ofs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Query command: OFS_PID, OFS_UID, OFS_OWNER or OFS_NAME
    command: String,

    /// Query argument: a pid, a uid, or a path for OFS_NAME
    argument: String,

    /// Output format
    #[arg(long, short = 'f', default_value = "human")]
    format: OutputFormat,

    /// Config file (overrides OFS_CONFIG and the default locations)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Proc filesystem root
    #[arg(long)]
    proc_root: Option<PathBuf>,

    /// Read at most this many records (default: buffer capacity)
    #[arg(long)]
    max: Option<usize>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,

    /// Log format on stderr
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version land here too
            let code = if err.use_stderr() {
                ExitCode::ArgsError.as_i32()
            } else {
                0
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let cli_level = if cli.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.verbose {
            0 => None,
            1 => Some(LogLevel::Info),
            2 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    init_logging(&LogConfig::from_env(cli_level, cli.log_format));

    let exit_code = run(&cli);
    tracing::debug!(exit_code = %exit_code, "done");
    std::process::exit(exit_code.as_i32());
}

fn run(cli: &Cli) -> ExitCode {
    let config = match load_config(cli.config.as_deref())
        .and_then(|loaded| apply_overrides(cli, loaded.config))
    {
        Ok(config) => config,
        Err(err) => return report_config_error(cli, &err),
    };

    let query = match parse_query(&cli.command, &cli.argument) {
        Ok(query) => query,
        Err(err) => return report_error(cli, &err),
    };

    // SAFETY: geteuid has no preconditions and cannot fail
    if unsafe { libc::geteuid() } != 0 {
        tracing::warn!("not running as root, only processes readable by this user are searched");
    }

    let search = OpenFileSearch::from_config(&config);
    let session = match search.open() {
        Ok(session) => session,
        Err(err) => return report_error(cli, &err),
    };

    let summary = match session.submit(&query) {
        Ok(summary) => summary,
        Err(err) => return report_error(cli, &err),
    };
    let records = match session.read(cli.max.unwrap_or(config.capacity)) {
        Ok(records) => records,
        Err(err) => return report_error(cli, &err),
    };
    session.close();

    if let Err(err) = print_results(cli.format, &summary, &records) {
        // Broken pipe and friends
        tracing::debug!(error = %err, "failed to write results");
        return ExitCode::IoError;
    }

    ExitCode::from_outcome(summary.records, summary.truncated)
}

/// Apply command-line overrides and check the result again.
fn apply_overrides(cli: &Cli, mut config: EngineConfig) -> Result<EngineConfig, ConfigError> {
    if let Some(root) = &cli.proc_root {
        config.proc_root = root.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Turn the command name and its argument into a query.
fn parse_query(command: &str, argument: &str) -> Result<Query, Error> {
    let kind: CommandKind = command.parse()?;
    let id = || {
        argument.trim().parse::<u32>().map_err(|_| {
            Error::InvalidArgument(format!("{kind} expects a numeric id, got {argument:?}"))
        })
    };
    let query = match kind {
        CommandKind::Pid => Query::ByPid(id()?),
        CommandKind::Uid => Query::ByUid(id()?),
        CommandKind::Owner => Query::ByOwner(id()?),
        CommandKind::Name => Query::name(argument.as_bytes()),
    };
    query.validate()?;
    Ok(query)
}

fn print_results(
    format: OutputFormat,
    summary: &QuerySummary,
    records: &[ResultRecord],
) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    match format {
        OutputFormat::Human => {
            writeln!(out, "{}: {} results", summary.query, records.len())?;
            for (index, record) in records.iter().enumerate() {
                writeln!(out, "  {index:3}: {}", record.name_lossy())?;
                writeln!(
                    out,
                    "       pid: {}, uid: {}, owner: {}, permissions: {:o}, fsize: {}, inode_no: {}",
                    record.pid,
                    record.uid,
                    record.owner,
                    record.permissions,
                    record.fsize,
                    record.inode_no
                )?;
            }
            if summary.truncated {
                writeln!(out, "(truncated: more open files may match)")?;
            }
        }
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "summary": summary,
                "records": records,
            });
            serde_json::to_writer_pretty(&mut out, &doc)?;
            writeln!(out)?;
        }
        OutputFormat::Jsonl => {
            for record in records {
                serde_json::to_writer(&mut out, record)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()
}

fn report_error(cli: &Cli, err: &Error) -> ExitCode {
    let code = ExitCode::from_error(err);
    tracing::debug!(error = %err, exit_code = %code, "query failed");
    match cli.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            eprintln!("{}", StructuredError::from(err).to_json());
        }
        OutputFormat::Human => {
            eprintln!("{}", format_error_human(err, use_color(cli)));
        }
    }
    code
}

fn report_config_error(cli: &Cli, err: &ConfigError) -> ExitCode {
    tracing::debug!(error = %err, "configuration rejected");
    let structured = StructuredError::from(err);
    match cli.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            eprintln!("{}", structured.to_json());
        }
        OutputFormat::Human => {
            eprintln!(
                "{}",
                format_structured_human(err.headline(), &structured, use_color(cli))
            );
        }
    }
    ExitCode::ConfigError
}

fn use_color(cli: &Cli) -> bool {
    !cli.no_color && std::io::stderr().is_terminal()
}
