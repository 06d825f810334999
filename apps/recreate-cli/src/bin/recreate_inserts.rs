//! # recreate-inserts
//!
//! Dumps every row of a source SQLite database into a timestamped INSERT
//! script, and optionally applies it to a target.
//!
//! ```text
//! recreate-inserts --exclude-tables audit_log,sessions --with-report --execute
//! ```

use chrono::Utc;
use clap::Parser;
use std::process::ExitCode;

use recreate_cli::{finish, init_logging, CommonArgs};
use recreate_db::{Engine, TracingObserver};

#[derive(Parser)]
#[command(name = "recreate-inserts")]
#[command(about = "Generate a data recreation script from a SQLite database")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Comma-separated tables to skip (schema_migrations and
    /// sqlite_sequence are always skipped)
    #[arg(long, value_delimiter = ',')]
    exclude_tables: Option<Vec<String>>,

    /// Also write data_report_<timestamp>.json
    #[arg(long)]
    with_report: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.common.verbosity);

    let result = match cli.common.resolve() {
        Ok(mut options) => {
            if let Some(exclude) = cli.exclude_tables {
                options.exclude_tables =
                    Some(exclude.into_iter().map(|t| t.trim().to_string()).collect());
            }
            options.with_report = cli.with_report;
            Engine::new(TracingObserver::handle())
                .recreate_inserts(&options, Utc::now())
                .await
        }
        Err(e) => Err(e),
    };
    finish(result)
}
