//! Operational database commands: `ping` and `migrate`

use anyhow::{bail, Context, Result};

use pgcrud_server::{EnvSource, Lifecycle, ReadinessState};

fn lifecycle() -> Result<Lifecycle> {
    Lifecycle::from_source(&EnvSource).context("Invalid database configuration")
}

/// One probe, no retry. Nonzero exit when the database does not answer.
pub async fn run_ping() -> Result<()> {
    let lifecycle = lifecycle()?;
    let reachable = lifecycle.verify_connectivity().await;
    lifecycle.shutdown().await;

    if !reachable {
        bail!("database unreachable");
    }
    println!("database reachable");
    Ok(())
}

/// Connect with the configured retry policy, then create the schema.
pub async fn run_migrate() -> Result<()> {
    let lifecycle = lifecycle()?;
    let state = lifecycle.startup().await;
    lifecycle.shutdown().await;

    match state {
        ReadinessState::Ready => {
            println!("schema up to date");
            Ok(())
        }
        other => bail!("schema not materialized (instance {})", other),
    }
}
