//! Zylisp configuration
//!
//! Session settings are layered once at startup and read-only afterwards.
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. User-level (~/.config/zylisp/config.toml)
//! 3. Default values
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::repl::{Codec, TransportKind};

/// Default timeout for one remote evaluation
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UserConfig {
    /// REPL settings
    #[serde(default)]
    pub repl: ReplConfig,
}

/// `[repl]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplConfig {
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// History file path; `~/.zylisp_history` when unset
    #[serde(default)]
    pub history_file: Option<PathBuf>,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Remote evaluation timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Colour error messages
    #[serde(default = "default_colors")]
    pub colors: bool,
}

fn default_prompt() -> String {
    "> ".to_string()
}

fn default_history_size() -> usize {
    1000
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_colors() -> bool {
    true
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            history_file: None,
            history_size: default_history_size(),
            timeout_secs: default_timeout_secs(),
            colors: default_colors(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown mode '{0}' (expected local, server or client)")]
    UnknownMode(String),

    #[error("unknown transport '{0}' (expected in-process, unix or tcp)")]
    UnknownTransport(String),

    #[error("unknown codec '{0}' (expected json or msgpack)")]
    UnknownCodec(String),

    #[error("{0} mode requires --addr")]
    MissingAddress(Mode),

    #[error("timeout must be at least one second")]
    InvalidTimeout,
}

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Local,
    Server,
    Client,
}

impl Mode {
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "local" => Ok(Mode::Local),
            "server" => Ok(Mode::Server),
            "client" => Ok(Mode::Client),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Server => "server",
            Mode::Client => "client",
        }
    }

    pub fn is_interactive(self) -> bool {
        !matches!(self, Mode::Server)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Values given on the command line; `None` defers to the config file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub mode: Option<String>,
    pub transport: Option<String>,
    pub addr: Option<String>,
    pub codec: Option<String>,
    pub prompt: Option<String>,
    pub timeout_secs: Option<u64>,
    pub history_file: Option<PathBuf>,
    pub no_banner: bool,
    pub verbose: bool,
}

/// Immutable per-run settings
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub mode: Mode,
    pub transport: TransportKind,
    pub addr: Option<String>,
    pub codec: Codec,
    pub prompt: String,
    pub timeout: Duration,
    pub history_file: Option<PathBuf>,
    pub history_size: usize,
    pub banner: bool,
    pub colors: bool,
    pub verbose: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let repl = ReplConfig::default();
        Self {
            mode: Mode::Local,
            transport: TransportKind::InProcess,
            addr: None,
            codec: Codec::Json,
            prompt: repl.prompt,
            timeout: Duration::from_secs(repl.timeout_secs),
            history_file: default_history_file(),
            history_size: repl.history_size,
            banner: true,
            colors: repl.colors,
            verbose: false,
        }
    }
}

impl SessionConfig {
    /// Layer the command line over the user configuration and validate
    pub fn resolve(
        cli: &CliOverrides,
        user: &UserConfig,
    ) -> Result<Self, ConfigError> {
        let mode = cli.mode.as_deref().map(Mode::from_name).transpose()?.unwrap_or_default();
        let transport = match cli.transport.as_deref() {
            Some(name) => TransportKind::from_name(name)
                .ok_or_else(|| ConfigError::UnknownTransport(name.to_string()))?,
            None => TransportKind::default(),
        };
        let codec = match cli.codec.as_deref() {
            Some(name) => {
                Codec::from_name(name).ok_or_else(|| ConfigError::UnknownCodec(name.to_string()))?
            }
            None => Codec::default(),
        };

        let timeout_secs = cli.timeout_secs.unwrap_or(user.repl.timeout_secs);
        let history_file = cli
            .history_file
            .clone()
            .or_else(|| user.repl.history_file.clone())
            .or_else(default_history_file);

        let config = Self {
            mode,
            transport,
            addr: cli.addr.clone().filter(|addr| !addr.trim().is_empty()),
            codec,
            prompt: cli.prompt.clone().unwrap_or_else(|| user.repl.prompt.clone()),
            timeout: Duration::from_secs(timeout_secs),
            history_file,
            history_size: user.repl.history_size,
            banner: !cli.no_banner,
            colors: user.repl.colors,
            verbose: cli.verbose,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode != Mode::Local && self.addr.is_none() {
            return Err(ConfigError::MissingAddress(self.mode));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config.is_empty() {
            return Some(PathBuf::from(xdg_config).join("zylisp"));
        }
    }
    dirs::home_dir().map(|home| home.join(".config").join("zylisp"))
}

/// Get the user config file path (~/.config/zylisp/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// `~/.zylisp_history`
pub fn default_history_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".zylisp_history"))
}

/// Load user-level configuration.
/// Returns the default config if there is no config file.
pub fn load_user_config() -> Result<UserConfig, ConfigError> {
    match get_config_path() {
        Some(path) => load_config_file(&path),
        None => Ok(UserConfig::default()),
    }
}

/// Load a config file; a missing file yields the defaults
pub fn load_config_file(path: &Path) -> Result<UserConfig, ConfigError> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
