//! HTTP server command
//!
//! Resolves the database configuration, then hands the lifecycle to the
//! server. Startup retries run in the background once the listener is up.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;

use pgcrud_server::http::{run_server, ServerConfig};
use pgcrud_server::{EnvSource, Lifecycle};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', env = "PGCRUD_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Override only the port of --bind (platforms inject PORT)
    #[arg(long, short = 'p', env = "PORT")]
    pub port: Option<u16>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,
}

impl ServeArgs {
    fn bind_addr(&self) -> SocketAddr {
        let mut addr = self.bind;
        if let Some(port) = self.port {
            addr.set_port(port);
        }
        addr
    }
}

/// Run the HTTP server until Ctrl+C or SIGTERM
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let lifecycle =
        Lifecycle::from_source(&EnvSource).context("Invalid database configuration")?;

    let config = ServerConfig {
        bind_addr: args.bind_addr(),
        cors_permissive: args.cors_permissive,
    };

    tracing::info!(
        bind = %config.bind_addr,
        max_attempts = lifecycle.policy().max_attempts,
        "starting pgcrud server"
    );

    run_server(lifecycle, config).await.context("Server error")?;

    Ok(())
}
