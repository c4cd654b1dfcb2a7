//! mqlc
//!
//! Command-line front end for the MetricsQL compiler.
//!
//! # Usage
//!
//! ```bash
//! mqlc --help
//! mqlc compile 'sum(rate(http_requests_total[5m])) by (job)'
//! mqlc compile --end 2024-01-01T00:00:00Z --format json 'up{job="api"}'
//! mqlc validate 'rate(metric)'
//! mqlc schema
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use mql::{CompileOptions, CompiledQuery, QueryCompiler};

/// mqlc - compile MetricsQL queries to parameterized SQL
#[derive(Parser)]
#[command(name = "mqlc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, env = "MQL_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query and print the SQL with its parameters
    Compile {
        /// The MetricsQL query
        query: String,

        /// Fixed window end (RFC 3339); defaults to the latest sample
        #[arg(long, value_parser = parse_end_time)]
        end: Option<DateTime<Utc>>,

        /// Compile a recovered tree instead of rejecting syntax errors
        #[arg(long)]
        lenient: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Check a query and print every error, one per line
    Validate {
        /// The MetricsQL query
        query: String,
    },
    /// Print the tables the generated SQL reads
    Schema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn parse_end_time(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|end| end.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn render_text(compiled: &CompiledQuery) -> String {
    let mut out = format!("-- {}\n{};\n", compiled.kind, compiled.sql());
    for (i, param) in compiled.fragment.params().iter().enumerate() {
        out.push_str(&format!("-- ?{} = {param}\n", i + 1));
    }
    if compiled.requires_regex {
        out.push_str("-- requires the regexp and regex_replace SQL functions\n");
    }
    out
}

fn compile(query: &str, end: Option<DateTime<Utc>>, lenient: bool, format: Format) -> Result<String> {
    let mut options = CompileOptions::from_env().context("invalid MQL_* configuration")?;
    if lenient {
        options = options.with_strict(false);
    }
    if let Some(end) = end {
        options = options.with_end_time(end);
    }

    let compiled = QueryCompiler::new(options).compile(query)?;
    tracing::info!(kind = %compiled.kind, params = compiled.fragment.params().len(), "Query compiled");

    match format {
        Format::Text => Ok(render_text(&compiled)),
        Format::Json => Ok(serde_json::to_string_pretty(&compiled)?),
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Compile {
            query,
            end,
            lenient,
            format,
        } => {
            print!("{}", compile(&query, end, lenient, format)?);
        }
        Commands::Validate { query } => {
            let errors = mql::validate_with_errors(&query);
            if !errors.is_empty() {
                for error in &errors {
                    eprintln!("{error}");
                }
                std::process::exit(1);
            }
            println!("ok");
        }
        Commands::Schema => {
            for table in mql::schema::TABLES {
                println!("{table}");
            }
        }
    }

    Ok(())
}
