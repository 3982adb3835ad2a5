//! Structured logging setup.
//!
//! `RUST_LOG` takes precedence over the configured level when set.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global `tracing` subscriber described by `config`.
///
/// Calling this when a subscriber is already installed leaves the existing
/// one in place.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy();

    let installed = tracing_subscriber::registry()
        .with(output_layers(config)?)
        .with(filter)
        .try_init();

    if let Err(e) = installed {
        debug!(error = %e, "Logging already initialised");
    }

    Ok(())
}

/// One formatting layer per enabled output
fn output_layers(config: &LoggingConfig) -> Result<Vec<OutputLayer>> {
    let mut layers = Vec::new();

    if config.log_to_console {
        let console = fmt::layer().with_target(false);
        layers.push(if config.json_format {
            console.json().boxed()
        } else {
            console.boxed()
        });
    }

    if config.log_to_file {
        let path = config.log_file_path.as_ref().ok_or_else(|| {
            ProtocolError::ConfigError("log_to_file is set without log_file_path".to_string())
        })?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                ProtocolError::ConfigError(format!("cannot open log file {}: {e}", path.display()))
            })?;

        let to_file = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file));
        layers.push(if config.json_format {
            to_file.json().boxed()
        } else {
            to_file.boxed()
        });
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(log_to_console: bool, log_to_file: bool) -> LoggingConfig {
        LoggingConfig {
            log_to_console,
            log_to_file,
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn test_console_disabled_installs_no_console_layer() {
        assert!(output_layers(&config(false, false)).unwrap().is_empty());
        assert_eq!(output_layers(&config(true, false)).unwrap().len(), 1);
    }

    #[test]
    fn test_console_and_file_both_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votifier.log");
        let mut cfg = config(true, true);
        cfg.log_file_path = Some(path.clone());
        cfg.json_format = true;

        assert_eq!(output_layers(&cfg).unwrap().len(), 2);
        assert!(path.exists());
    }

    #[test]
    fn test_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(false, true);
        cfg.log_file_path = Some(dir.path().join("only.log"));

        assert_eq!(output_layers(&cfg).unwrap().len(), 1);
    }

    #[test]
    fn test_file_without_path_is_config_error() {
        let err = output_layers(&config(false, true)).err().unwrap();
        assert!(matches!(err, ProtocolError::ConfigError(_)));
    }
}
