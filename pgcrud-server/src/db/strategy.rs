//! Connection strategies
//!
//! One strategy per way of reaching Postgres. [`strategy_for`] is the only
//! place that picks one.

use std::fmt;
use std::path::PathBuf;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::config::ConnectTarget;

/// Routes connect options to a physical endpoint.
pub trait ConnectStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Point `base` (credentials and settings already applied) at the endpoint.
    fn route(&self, base: PgConnectOptions) -> PgConnectOptions;

    /// Whether the pool may keep idle connections around.
    fn retains_idle_connections(&self) -> bool {
        true
    }
}

/// Plain TCP dial with the configured SSL mode.
#[derive(Debug, Clone)]
pub struct DirectTcp {
    pub host: String,
    pub port: u16,
    pub ssl_mode: PgSslMode,
}

impl ConnectStrategy for DirectTcp {
    fn name(&self) -> &'static str {
        "direct-tcp"
    }

    fn route(&self, base: PgConnectOptions) -> PgConnectOptions {
        base.host(&self.host).port(self.port).ssl_mode(self.ssl_mode)
    }
}

/// Local unix socket directory. Local sockets are not wrapped in TLS.
#[derive(Debug, Clone)]
pub struct UnixSocket {
    pub dir: PathBuf,
    pub port: u16,
}

impl ConnectStrategy for UnixSocket {
    fn name(&self) -> &'static str {
        "unix-socket"
    }

    fn route(&self, base: PgConnectOptions) -> PgConnectOptions {
        base.socket(&self.dir)
            .port(self.port)
            .ssl_mode(PgSslMode::Disable)
    }
}

/// Managed-database connector (Cloud SQL Auth Proxy layout).
///
/// The connector encrypts and may rotate its sockets at any time, so the
/// pool must not keep connections idle: every checkout dials through the
/// connector again.
#[derive(Debug, Clone)]
pub struct ManagedConnector {
    pub socket_dir: PathBuf,
}

impl ConnectStrategy for ManagedConnector {
    fn name(&self) -> &'static str {
        "managed-connector"
    }

    fn route(&self, base: PgConnectOptions) -> PgConnectOptions {
        base.socket(&self.socket_dir).ssl_mode(PgSslMode::Disable)
    }

    fn retains_idle_connections(&self) -> bool {
        false
    }
}

/// Pick the strategy for a configured target.
pub fn strategy_for(target: &ConnectTarget, ssl_mode: PgSslMode) -> Box<dyn ConnectStrategy> {
    match target {
        ConnectTarget::Tcp { host, port } => Box::new(DirectTcp {
            host: host.clone(),
            port: *port,
            ssl_mode,
        }),
        ConnectTarget::UnixSocket { dir, port } => Box::new(UnixSocket {
            dir: dir.clone(),
            port: *port,
        }),
        ConnectTarget::Connector {
            instance,
            socket_root,
        } => Box::new(ManagedConnector {
            socket_dir: socket_root.join(instance.as_str()),
        }),
    }
}
