/*!
 * Logging and tracing initialization
 */

use std::fs::File;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};

/// Level the link logs at for a given configuration
pub fn effective_level(config: &LinkConfig) -> Level {
    if config.debug {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Filter for our own crates at `level`, unless `RUST_LOG` says otherwise
fn link_filter(level: Level) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("dp2={level},dp2_connect={level}")))
        .map_err(|e| LinkError::Config(format!("Failed to create log filter: {}", e)))
}

/// Install the global subscriber: compact text on stderr, or JSON lines into
/// `log_file` when one is configured
pub fn init_logging(config: &LinkConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(link_filter(effective_level(config))?);

    let installed = match &config.log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                LinkError::Config(format!("Failed to create log file {}: {}", path.display(), e))
            })?;
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
        }
        None => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| LinkError::Config(format!("Logging already initialized: {}", e)))
}

/// Route events into the test harness output; later calls are no-ops
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("dp2=debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_debug_overrides_log_level() {
        let config = LinkConfig {
            log_level: LogLevel::Error,
            debug: true,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::DEBUG);
    }

    #[test]
    fn test_log_level_used_without_debug() {
        let config = LinkConfig {
            log_level: LogLevel::Warn,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::WARN);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), Level::ERROR);
        assert_eq!(LogLevel::Warn.to_tracing_level(), Level::WARN);
        assert_eq!(LogLevel::Info.to_tracing_level(), Level::INFO);
        assert_eq!(LogLevel::Debug.to_tracing_level(), Level::DEBUG);
        assert_eq!(LogLevel::Trace.to_tracing_level(), Level::TRACE);
    }

    #[test]
    fn test_second_install_is_config_error() {
        init_test_logging();
        assert!(matches!(
            init_logging(&LinkConfig::default()),
            Err(LinkError::Config(_))
        ));
    }
}
