//! Layered runtime settings: built-in defaults, then an optional
//! `atforge.toml`, then `ATFORGE_*` environment variables.
//!
//! Nesting uses a double underscore, e.g. `ATFORGE_SERIAL__PORT=/dev/ttyUSB0`
//! or `ATFORGE_AGENT__MAX_ATTEMPTS=5`.

use std::path::Path;
use std::path::PathBuf;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub serial: SerialSettings,
    #[serde(default)]
    pub adb: AdbSettings,
    #[serde(default)]
    pub executor: ExecutorSettings,
    #[serde(default)]
    pub agent: AgentSettings,
}

/// Where the document store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Serial device path, e.g. `/dev/ttyUSB2`. Empty means unset.
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baudrate")]
    pub baudrate: u32,

    /// Per-read timeout while draining a response.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Settle delay between write and first read.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdbSettings {
    /// Target device serial. Empty means pick the first ready device.
    #[serde(default)]
    pub device: String,

    #[serde(default = "default_adb_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSettings {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Whether compile advice and config proposals may call the agent runner.
    #[serde(default)]
    pub use_llm: bool,

    /// Validation retry budget for config proposals.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("at_agent")
}

fn default_baudrate() -> u32 {
    115_200
}

fn default_read_timeout_ms() -> u64 {
    1200
}

fn default_settle_ms() -> u64 {
    200
}

fn default_adb_timeout_secs() -> u64 {
    15
}

fn default_max_steps() -> usize {
    15
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baudrate: default_baudrate(),
            read_timeout_ms: default_read_timeout_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for AdbSettings {
    fn default() -> Self {
        Self {
            device: String::new(),
            timeout_secs: default_adb_timeout_secs(),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            use_llm: false,
            max_attempts: default_max_attempts(),
        }
    }
}

impl Settings {
    /// Load with the standard layering. `config_file` overrides the default
    /// `./atforge.toml` lookup; a missing default file is fine, a missing
    /// explicit file is not.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        let defaults = Self::default();
        let defaults_json = serde_json::to_string(&defaults).map_err(|source| {
            crate::error::AtForgeError::Serialize {
                what: "default settings".to_string(),
                source,
            }
        })?;
        builder = builder.add_source(File::from_str(&defaults_json, config::FileFormat::Json));

        match config_file {
            Some(path) => {
                builder = builder.add_source(File::from(path));
            }
            None => {
                let default_path = PathBuf::from("atforge.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("ATFORGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}
