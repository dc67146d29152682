//! Core error types for the cpu client

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the cpu client
#[derive(Error, Debug)]
pub enum CpuError {
    /// Bind specification error
    #[error("Bind error: {0}")]
    Bind(#[from] BindError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors produced while compiling a bind specification
///
/// Every variant carries the index of the offending entry so users can find
/// it in a long `CPU_NAMESPACE` string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// An entry between two colons (or at either end) was empty
    #[error("bind: element {index} is zero length")]
    EmptyEntry { index: usize },

    /// The part before `=` was empty, e.g. `=/usr`
    #[error("bind: element {index}({entry:?}): local is 0 length")]
    EmptyLocal { index: usize, entry: String },

    /// The part after `=` was empty, e.g. `/usr=`
    #[error("bind: element {index}({entry:?}): remote is 0 length")]
    EmptyRemote { index: usize, entry: String },
}

impl BindError {
    /// Index of the entry that failed validation
    pub fn index(&self) -> usize {
        match self {
            BindError::EmptyEntry { index }
            | BindError::EmptyLocal { index, .. }
            | BindError::EmptyRemote { index, .. } => *index,
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Port does not fit in 16 bits
    #[error("Invalid port {0:?}: must be a number between 1 and 65535")]
    InvalidPort(String),
}
