//! `check-config`: resolve DB_* settings without touching the network

use anyhow::{Context, Result};

use pgcrud_server::{resolve_config, resolve_retry_policy, EnvSource};

/// Print the resolved configuration. The password is never shown.
pub fn run_check_config() -> Result<()> {
    let config = resolve_config(&EnvSource).context("Invalid database configuration")?;
    let policy = resolve_retry_policy(&EnvSource).context("Invalid retry configuration")?;

    println!("database        {}", config.database);
    println!("user            {}", config.user);
    println!("password        {:?}", config.password);
    println!("target          {} ({})", config.target, config.target.kind());
    println!("ssl mode        {:?}", config.ssl_mode);
    println!(
        "pool            max {} connections, acquire timeout {:?}",
        config.pool.max_connections, config.pool.acquire_timeout
    );
    println!(
        "timeouts        statement {:?}, lock {:?}",
        config.statement_timeout, config.lock_timeout
    );
    println!("echo            {}", config.echo);
    println!(
        "startup retry   {} attempts, backoff {:?}..{:?} (worst case {:?})",
        policy.max_attempts,
        policy.initial_backoff,
        policy.max_backoff,
        policy.total_delay()
    );
    if policy.recheck_interval.is_zero() {
        println!("recovery        disabled");
    } else {
        println!("recovery        every {:?}", policy.recheck_interval);
    }

    Ok(())
}
