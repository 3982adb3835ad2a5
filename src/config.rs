//! # Configuration
//!
//! Settings for the vote receiver, grouped by concern: the listener, the RSA
//! key directory, the failure-log throttle and logging output.
//!
//! ## Sources
//! - A TOML file (`from_file`); missing sections take their defaults
//! - `VOTIFIER_*` environment variables over the defaults (`from_env`)
//! - Code, via `default_with_overrides`
//!
//! `validate()` lists every problem at once; `validate_strict()` turns that
//! list into a single `ConfigError`. Durations are written as milliseconds.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Port used by Votifier-compatible server lists
pub const DEFAULT_PORT: u16 = 8192;

/// Default throttle window
pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_millis(2000);

/// Default number of error lines per throttle window
pub const DEFAULT_THROTTLE_MAX_ERRORS: u64 = 5;

/// Upper bound past which `max_connections` is reported as a likely typo
const MAX_CONNECTIONS_CEILING: usize = 100_000;

/// Complete receiver configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct VotifierConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub keys: KeyConfig,

    #[serde(default)]
    pub throttle: ThrottleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VotifierConfig {
    /// Read and parse a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ProtocolError::ConfigError(format!("invalid TOML: {e}")))
    }

    /// Defaults overridden by any `VOTIFIER_*` variable that is set.
    ///
    /// A variable that is set but does not parse is an error, not a silent fallback.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(address) = env_value::<String>("VOTIFIER_SERVER_ADDRESS")? {
            config.server.address = address;
        }
        if let Some(max) = env_value("VOTIFIER_MAX_CONNECTIONS")? {
            config.server.max_connections = max;
        }
        if let Some(millis) = env_value("VOTIFIER_CONNECTION_TIMEOUT_MS")? {
            config.server.connection_timeout = Duration::from_millis(millis);
        }
        if let Some(dir) = env_value::<PathBuf>("VOTIFIER_KEY_DIRECTORY")? {
            config.keys.directory = dir;
        }
        if let Some(level) = env_value::<Level>("VOTIFIER_LOG_LEVEL")? {
            config.logging.log_level = level;
        }

        Ok(config)
    }

    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// The default configuration rendered as TOML, as a starting point for operators
    pub fn example_config() -> Result<String> {
        Self::default().to_toml()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml()?).map_err(|e| {
            ProtocolError::ConfigError(format!("cannot write {}: {e}", path.display()))
        })
    }

    fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("cannot encode config: {e}")))
    }

    /// Every problem found, in section order. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        self.server
            .validate()
            .into_iter()
            .chain(self.keys.validate())
            .chain(self.throttle.validate())
            .chain(self.logging.validate())
            .collect()
    }

    pub fn validate_strict(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            return Ok(());
        }
        Err(ProtocolError::ConfigError(format!(
            "invalid configuration: {}",
            problems.join("; ")
        )))
    }
}

fn env_value<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ProtocolError::ConfigError(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}

/// Listener settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. "0.0.0.0:8192"
    pub address: String,

    /// Connections served at once; extra connections are dropped on accept
    pub max_connections: usize,

    /// Time a client has to deliver its vote after the greeting
    #[serde(with = "millis")]
    pub connection_timeout: Duration,

    /// Time shutdown waits for in-flight connections
    #[serde(with = "millis")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{DEFAULT_PORT}"),
            max_connections: 1000,
            connection_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.address.is_empty() {
            problems.push("server.address is empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            problems.push(format!(
                "server.address '{}' is not a socket address (e.g. 0.0.0.0:{DEFAULT_PORT})",
                self.address
            ));
        }

        match self.max_connections {
            0 => problems.push("server.max_connections must be at least 1".to_string()),
            n if n > MAX_CONNECTIONS_CEILING => problems.push(format!(
                "server.max_connections {n} exceeds {MAX_CONNECTIONS_CEILING}"
            )),
            _ => {}
        }

        if self.connection_timeout < Duration::from_millis(100) {
            problems.push("server.connection_timeout is below 100ms".to_string());
        } else if self.connection_timeout > Duration::from_secs(300) {
            problems.push("server.connection_timeout is above 300s".to_string());
        }

        if self.shutdown_timeout < Duration::from_secs(1) {
            problems.push("server.shutdown_timeout is below 1s".to_string());
        } else if self.shutdown_timeout > Duration::from_secs(60) {
            problems.push("server.shutdown_timeout is above 60s".to_string());
        }

        problems
    }
}

/// Where the RSA key pair lives
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyConfig {
    /// Directory holding `private.pem` and `public.pem`
    pub directory: PathBuf,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("rsa"),
        }
    }
}

impl KeyConfig {
    pub fn validate(&self) -> Vec<String> {
        if self.directory.as_os_str().is_empty() {
            return vec!["keys.directory is empty".to_string()];
        }
        // A missing directory is fine: keys are generated into it on first start
        if self.directory.exists() && !self.directory.is_dir() {
            return vec![format!(
                "keys.directory {} exists but is not a directory",
                self.directory.display()
            )];
        }
        Vec::new()
    }
}

/// Failure-log throttle settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThrottleConfig {
    #[serde(with = "millis")]
    pub window: Duration,

    /// Error lines written per window before the rest are suppressed
    pub max_errors: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_THROTTLE_WINDOW,
            max_errors: DEFAULT_THROTTLE_MAX_ERRORS,
        }
    }
}

impl ThrottleConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.window.is_zero() {
            problems.push("throttle.window must be non-zero".to_string());
        } else if self.window > Duration::from_secs(3600) {
            problems.push("throttle.window is above 1h".to_string());
        }

        if self.max_errors == 0 {
            problems.push("throttle.max_errors must be at least 1".to_string());
        }

        problems
    }
}

/// Where log lines go and how they look
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default level; `RUST_LOG` overrides it when set
    #[serde(with = "level")]
    pub log_level: Level,

    pub log_to_console: bool,

    pub log_to_file: bool,

    /// Appended to when `log_to_file` is set
    pub log_file_path: Option<PathBuf>,

    /// One JSON object per line instead of the human-readable format
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if !self.log_to_console && !self.log_to_file {
            problems.push("logging has no output: set log_to_console or log_to_file".to_string());
        }

        if self.log_to_file {
            match self.log_file_path.as_deref().map(Path::parent) {
                None => {
                    problems.push("logging.log_to_file is set without log_file_path".to_string())
                }
                Some(Some(dir)) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
                    problems.push(format!("logging directory {} does not exist", dir.display()))
                }
                Some(_) => {}
            }
        }

        problems
    }
}

/// `Duration` as whole milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// `tracing::Level` as a lowercase name ("info", "debug", ...)
mod level {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(value: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| D::Error::custom(format!("unknown log level '{name}'")))
    }
}
