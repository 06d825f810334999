//! # recreate-schemas
//!
//! Captures the schema of a source SQLite database into a timestamped
//! script, and optionally applies it to a target.
//!
//! ```text
//! recreate-schemas --source-db data/app.db --target-db data/prod.db --backup --execute
//! ```

use chrono::Utc;
use clap::Parser;
use std::process::ExitCode;

use recreate_cli::{finish, init_logging, CommonArgs};
use recreate_db::{Engine, TracingObserver};

#[derive(Parser)]
#[command(name = "recreate-schemas")]
#[command(about = "Generate a schema recreation script from a SQLite database")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.common.verbosity);

    let result = match cli.common.resolve() {
        Ok(options) => {
            Engine::new(TracingObserver::handle())
                .recreate_schemas(&options, Utc::now())
                .await
        }
        Err(e) => Err(e),
    };
    finish(result)
}
