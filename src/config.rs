use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The IR config file. Namely rubyir.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RubyIrConfig {
    pub inline: InlineConfig,
    pub log: LogConfig,
}

impl RubyIrConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

/// Settings of the inliner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InlineConfig {
    /// Whether calls are inlined at all.
    pub enabled: bool,
    /// Whether parameters may be bound to call site operands at compile time.
    pub static_arg_mapping: bool,
    /// Callees with more live instructions are not inlined.
    pub max_callee_instructions: usize,
    /// Prefix for the names of inlined callee locals.
    pub variable_prefix: String,
}

impl Default for InlineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            static_arg_mapping: true,
            max_callee_instructions: 64,
            variable_prefix: "i".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// An `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}
