//! Connection configuration
//!
//! Resolves a [`ConnectionConfig`] and a [`RetryPolicy`] from a key-value
//! [`ConfigSource`]. Non-secret tunables have defaults; credentials and the
//! connection target never do. Every missing required key is reported in a
//! single [`ConfigError::Missing`].

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgSslMode;
use thiserror::Error;

use crate::lifecycle::RetryPolicy;

/// Environment keys read by [`resolve_config`] and [`resolve_retry_policy`].
pub mod keys {
    pub const USER: &str = "DB_USER";
    pub const PASSWORD: &str = "DB_PASSWORD";
    pub const NAME: &str = "DB_NAME";
    pub const HOST: &str = "DB_HOST";
    pub const PORT: &str = "DB_PORT";
    pub const SOCKET_DIR: &str = "DB_SOCKET_DIR";
    pub const INSTANCE: &str = "DB_INSTANCE_CONNECTION_NAME";
    pub const CONNECTOR_SOCKET_ROOT: &str = "DB_CONNECTOR_SOCKET_ROOT";
    pub const SSL: &str = "DB_SSL";
    pub const POOL_MAX: &str = "DB_POOL_MAX";
    pub const ACQUIRE_TIMEOUT_SECS: &str = "DB_ACQUIRE_TIMEOUT_SECS";
    pub const STATEMENT_TIMEOUT_MS: &str = "DB_STATEMENT_TIMEOUT_MS";
    pub const LOCK_TIMEOUT_MS: &str = "DB_LOCK_TIMEOUT_MS";
    pub const ECHO: &str = "DB_ECHO";
    pub const CONNECT_ATTEMPTS: &str = "DB_CONNECT_ATTEMPTS";
    pub const CONNECT_BACKOFF_MS: &str = "DB_CONNECT_BACKOFF_MS";
    pub const CONNECT_BACKOFF_MAX_MS: &str = "DB_CONNECT_BACKOFF_MAX_MS";
    pub const RECHECK_INTERVAL_SECS: &str = "DB_RECHECK_INTERVAL_SECS";

    /// Reported when none of the target keys is set.
    pub const TARGET: &str = "DB_HOST | DB_SOCKET_DIR | DB_INSTANCE_CONNECTION_NAME";
}

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_CONNECTOR_SOCKET_ROOT: &str = "/cloudsql";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000;

/// Configuration error. Never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .keys.join(", "))]
    Missing { keys: Vec<&'static str> },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("conflicting connection targets {}: set exactly one", .keys.join(", "))]
    ConflictingTargets { keys: Vec<&'static str> },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// A key-value configuration source.
pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<&str, &str> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).map(|v| (*v).to_owned())
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Database password. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Managed instance identifier, `project:region:instance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceName(String);

impl InstanceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for InstanceName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(format!("'{}' is not of the form project:region:instance", s));
        }
        Ok(Self(s.to_owned()))
    }
}

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where physical connections go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// Direct TCP dial.
    Tcp { host: String, port: u16 },
    /// Local unix socket directory.
    UnixSocket { dir: PathBuf, port: u16 },
    /// Managed-database connector exposing `<socket_root>/<instance>`.
    Connector {
        instance: InstanceName,
        socket_root: PathBuf,
    },
}

impl ConnectTarget {
    /// Short strategy label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tcp { .. } => "tcp",
            Self::UnixSocket { .. } => "unix-socket",
            Self::Connector { .. } => "connector",
        }
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            Self::UnixSocket { dir, port } => write!(f, "unix://{} (port {})", dir.display(), port),
            Self::Connector {
                instance,
                socket_root,
            } => write!(f, "connector://{} via {}", instance, socket_root.display()),
        }
    }
}

/// Pool sizing and checkout limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

/// Fully resolved connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub user: String,
    pub password: Password,
    pub database: String,
    pub target: ConnectTarget,
    pub ssl_mode: PgSslMode,
    pub pool: PoolSettings,
    /// Server-side ceiling for a single statement.
    pub statement_timeout: Duration,
    pub lock_timeout: Duration,
    /// Keep sqlx statement logging on.
    pub echo: bool,
}

/// Resolve a [`ConnectionConfig`] from `source`.
///
/// # Errors
///
/// - [`ConfigError::Missing`] listing every absent (or blank) required key
/// - [`ConfigError::ConflictingTargets`] when more than one target key is set
/// - [`ConfigError::Invalid`] for values that do not parse
pub fn resolve_config<S: ConfigSource + ?Sized>(
    source: &S,
) -> Result<ConnectionConfig, ConfigError> {
    let reader = Reader { source };
    let mut missing = Vec::new();

    let user = reader.required(keys::USER, &mut missing);
    let password = reader.required(keys::PASSWORD, &mut missing);
    let database = reader.required(keys::NAME, &mut missing);
    let target = resolve_target(&reader, &mut missing)?;

    let (Some(user), Some(password), Some(database), Some(target)) =
        (user, password, database, target)
    else {
        return Err(ConfigError::Missing { keys: missing });
    };

    let ssl_mode = match reader.value(keys::SSL) {
        Some(raw) => raw
            .parse::<PgSslMode>()
            .map_err(|_| ConfigError::invalid(keys::SSL, format!("unknown ssl mode '{}'", raw)))?,
        None => PgSslMode::Prefer,
    };

    let max_connections = reader.parse_or(keys::POOL_MAX, DEFAULT_MAX_CONNECTIONS)?;
    if max_connections == 0 {
        return Err(ConfigError::invalid(keys::POOL_MAX, "must be at least 1"));
    }

    Ok(ConnectionConfig {
        user,
        password: Password::new(password),
        database,
        target,
        ssl_mode,
        pool: PoolSettings {
            max_connections,
            acquire_timeout: Duration::from_secs(
                reader.parse_or(keys::ACQUIRE_TIMEOUT_SECS, DEFAULT_ACQUIRE_TIMEOUT_SECS)?,
            ),
        },
        statement_timeout: Duration::from_millis(
            reader.parse_or(keys::STATEMENT_TIMEOUT_MS, DEFAULT_STATEMENT_TIMEOUT_MS)?,
        ),
        lock_timeout: Duration::from_millis(
            reader.parse_or(keys::LOCK_TIMEOUT_MS, DEFAULT_LOCK_TIMEOUT_MS)?,
        ),
        echo: reader.flag(keys::ECHO, false)?,
    })
}

/// Resolve the startup [`RetryPolicy`] from `source`. Every key is optional.
pub fn resolve_retry_policy<S: ConfigSource + ?Sized>(
    source: &S,
) -> Result<RetryPolicy, ConfigError> {
    let reader = Reader { source };
    let defaults = RetryPolicy::default();

    let max_attempts = reader.parse_or(keys::CONNECT_ATTEMPTS, defaults.max_attempts)?;
    if max_attempts == 0 {
        return Err(ConfigError::invalid(keys::CONNECT_ATTEMPTS, "must be at least 1"));
    }

    let initial_backoff = Duration::from_millis(reader.parse_or(
        keys::CONNECT_BACKOFF_MS,
        defaults.initial_backoff.as_millis() as u64,
    )?);
    let max_backoff = Duration::from_millis(reader.parse_or(
        keys::CONNECT_BACKOFF_MAX_MS,
        defaults.max_backoff.as_millis() as u64,
    )?);
    if max_backoff < initial_backoff {
        return Err(ConfigError::invalid(
            keys::CONNECT_BACKOFF_MAX_MS,
            format!("must not be below {}", keys::CONNECT_BACKOFF_MS),
        ));
    }

    Ok(RetryPolicy {
        max_attempts,
        initial_backoff,
        max_backoff,
        recheck_interval: Duration::from_secs(reader.parse_or(
            keys::RECHECK_INTERVAL_SECS,
            defaults.recheck_interval.as_secs(),
        )?),
    })
}

fn resolve_target<S: ConfigSource + ?Sized>(
    reader: &Reader<'_, S>,
    missing: &mut Vec<&'static str>,
) -> Result<Option<ConnectTarget>, ConfigError> {
    let host = reader.value(keys::HOST);
    let socket_dir = reader.value(keys::SOCKET_DIR);
    let instance = reader.value(keys::INSTANCE);

    let set: Vec<&'static str> = [
        (keys::HOST, host.is_some()),
        (keys::SOCKET_DIR, socket_dir.is_some()),
        (keys::INSTANCE, instance.is_some()),
    ]
    .into_iter()
    .filter_map(|(key, present)| present.then_some(key))
    .collect();

    if set.len() > 1 {
        return Err(ConfigError::ConflictingTargets { keys: set });
    }

    let port = reader.parse_or(keys::PORT, DEFAULT_PORT)?;

    let target = if let Some(host) = host {
        ConnectTarget::Tcp { host, port }
    } else if let Some(dir) = socket_dir {
        ConnectTarget::UnixSocket {
            dir: PathBuf::from(dir),
            port,
        }
    } else if let Some(instance) = instance {
        let instance = instance
            .parse::<InstanceName>()
            .map_err(|reason| ConfigError::invalid(keys::INSTANCE, reason))?;
        let socket_root = reader
            .value(keys::CONNECTOR_SOCKET_ROOT)
            .unwrap_or_else(|| DEFAULT_CONNECTOR_SOCKET_ROOT.to_owned());
        ConnectTarget::Connector {
            instance,
            socket_root: PathBuf::from(socket_root),
        }
    } else {
        missing.push(keys::TARGET);
        return Ok(None);
    };

    Ok(Some(target))
}

struct Reader<'a, S: ?Sized> {
    source: &'a S,
}

impl<S: ConfigSource + ?Sized> Reader<'_, S> {
    /// Non-blank value for `key`.
    fn value(&self, key: &str) -> Option<String> {
        self.source
            .get(key)
            .filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &'static str, missing: &mut Vec<&'static str>) -> Option<String> {
        let value = self.value(key);
        if value.is_none() {
            missing.push(key);
        }
        value
    }

    fn parse_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.value(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(key, format!("'{}': {}", raw, e))),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.value(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(ConfigError::invalid(key, format!("'{}' is not a boolean", other))),
            },
        }
    }
}
