/*!
 * Configuration for the pipeline link
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LinkError, Result};

/// Name of the file the local service writes its administrator key to
pub const HALT_KEY_FILE: &str = "dp2key.txt";

/// Name of the file holding the id of the last submitted job
pub const LAST_ID_FILE: &str = "lastid";

/// Link configuration
///
/// Loaded once at startup and handed to the link by value; nothing mutates it
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Service host including scheme
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Path of the web service below the host
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Seconds to wait for a locally started service to come up
    #[serde(default = "default_ws_timeup")]
    pub ws_timeup: u64,

    /// Command line that starts the service on Unix-like systems
    #[serde(default = "default_exec_line_nix")]
    pub exec_line_nix: String,

    /// Command line that starts the service on Windows
    #[serde(default = "default_exec_line_win")]
    pub exec_line_win: String,

    #[serde(default)]
    pub client_key: String,

    #[serde(default)]
    pub client_secret: String,

    /// Upper bound for every single remote call
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Shorthand for `log_level = "debug"`
    #[serde(default)]
    pub debug: bool,

    /// Start the service locally when it is not reachable
    #[serde(default)]
    pub starting: bool,

    /// Interval between two polls of a running job
    #[serde(default = "default_message_poll_millis")]
    pub message_poll_millis: u64,

    /// Interval between two liveness checks while a local service starts
    #[serde(default = "default_startup_poll_millis")]
    pub startup_poll_millis: u64,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Where the local service leaves its halt key (None = temp dir)
    #[serde(default)]
    pub halt_key_file: Option<PathBuf>,

    /// Where `run` records the job it submitted (None = config dir)
    #[serde(default)]
    pub last_id_file: Option<PathBuf>,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
            ws_timeup: default_ws_timeup(),
            exec_line_nix: default_exec_line_nix(),
            exec_line_win: default_exec_line_win(),
            client_key: String::new(),
            client_secret: String::new(),
            timeout_seconds: default_timeout_seconds(),
            debug: false,
            starting: false,
            message_poll_millis: default_message_poll_millis(),
            startup_poll_millis: default_startup_poll_millis(),
            log_level: LogLevel::default(),
            log_file: None,
            halt_key_file: None,
            last_id_file: None,
        }
    }
}

// Default value functions for serde
fn default_host() -> String {
    "http://localhost".to_string()
}

fn default_port() -> u16 {
    8181
}

fn default_ws_path() -> String {
    "ws".to_string()
}

fn default_ws_timeup() -> u64 {
    25
}

fn default_exec_line_nix() -> String {
    "../bin/pipeline2".to_string()
}

fn default_exec_line_win() -> String {
    "..\\bin\\pipeline2.bat".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_message_poll_millis() -> u64 {
    500
}

fn default_startup_poll_millis() -> u64 {
    1000
}

impl LinkConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: LinkConfig = toml::from_str(contents)
            .map_err(|e| LinkError::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| LinkError::Config(format!("Cannot serialize configuration: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the link cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(LinkError::Config("port must be greater than 0".to_string()));
        }
        if self.timeout_seconds == 0 {
            return Err(LinkError::Config(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.message_poll_millis == 0 || self.startup_poll_millis == 0 {
            return Err(LinkError::Config(
                "poll intervals must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Service root URL, e.g. `http://localhost:8181/ws/`
    pub fn url(&self) -> String {
        format!(
            "{}:{}/{}/",
            self.host.trim_end_matches('/'),
            self.port,
            self.ws_path.trim_matches('/')
        )
    }

    /// Command line that starts the service on this platform
    pub fn exec_line(&self) -> &str {
        if cfg!(windows) {
            &self.exec_line_win
        } else {
            &self.exec_line_nix
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn message_poll_interval(&self) -> Duration {
        Duration::from_millis(self.message_poll_millis)
    }

    pub fn startup_poll_interval(&self) -> Duration {
        Duration::from_millis(self.startup_poll_millis)
    }

    pub fn startup_deadline(&self) -> Duration {
        Duration::from_secs(self.ws_timeup)
    }

    pub fn halt_key_path(&self) -> PathBuf {
        self.halt_key_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(HALT_KEY_FILE))
    }

    pub fn last_id_path(&self) -> PathBuf {
        self.last_id_file.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|dir| dir.join("dp2").join(LAST_ID_FILE))
                .unwrap_or_else(|| std::env::temp_dir().join("dp2-lastid"))
        })
    }

    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dp2").join("config.toml"))
    }
}

/// Read the administrator key left behind by a local service
pub fn load_halt_key(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        LinkError::Config(format!(
            "Cannot read halt key from {}: {}",
            path.display(),
            e
        ))
    })?;

    let key = contents.trim();
    if key.is_empty() {
        return Err(LinkError::Config(format!(
            "Halt key file {} is empty",
            path.display()
        )));
    }
    Ok(key.to_string())
}

/// Remember the id of the job just submitted
pub fn store_last_id(path: &Path, id: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, id.trim())?;
    Ok(())
}

/// Id of the last submitted job
pub fn load_last_id(path: &Path) -> Result<String> {
    let id = std::fs::read_to_string(path)
        .map_err(|e| LinkError::Config(format!("No last job id in {}: {}", path.display(), e)))?;

    let id = id.trim();
    if id.is_empty() {
        return Err(LinkError::Config(format!(
            "Last job id file {} is empty",
            path.display()
        )));
    }
    Ok(id.to_string())
}
