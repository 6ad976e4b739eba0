//! pgcrud - user/item CRUD service over PostgreSQL
//!
//! Entry point for the `pgcrud` binary:
//! - `serve`: startup lifecycle plus the HTTP API
//! - `check-config`: resolve DB_* settings and print them redacted
//! - `ping`: one connectivity probe
//! - `migrate`: connect with retry, then create the schema

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "pgcrud",
    author,
    version,
    about = "User/item CRUD service over PostgreSQL",
    long_about = "Serve a small user/item API over PostgreSQL. Connection settings come from \
                  DB_* environment variables (a .env file in the working directory is loaded \
                  first); connect over TCP, a unix socket, or a managed connector socket."
)]
struct Cli {
    /// Enable debug logging (unless RUST_LOG is set)
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (requires the `telemetry` feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Resolve the database configuration and print a redacted summary
    CheckConfig,
    /// Check that the database answers a trivial query
    Ping,
    /// Connect (with retry) and create tables and indexes if missing
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real environment variables win either way.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_setup::init(&TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    })
    .ok();

    let result = match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await,
        Commands::CheckConfig => commands::run_check_config(),
        Commands::Ping => commands::run_ping().await,
        Commands::Migrate => commands::run_migrate().await,
    };

    tracing_setup::shutdown_otel();
    result
}
