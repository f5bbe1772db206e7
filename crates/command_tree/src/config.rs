//! TOML engine configuration.
//!
//! ```toml
//! [parsing]
//! literal_case = "insensitive"
//! ambiguity = "reject"
//!
//! [execution]
//! coordinator = "deferred"
//! synchronous_parsing = true
//! pool_size = 4
//! ```
//!
//! Every section and key is optional.

use std::{
    fs,
    path::{Path, PathBuf},
};

use command_tree_contract::{AmbiguityPolicy, LiteralCase};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label used in errors for configuration that did not come from a file.
pub const INLINE_SOURCE: &str = "<inline>";

/// Failure to read, parse, or apply engine configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {}: {message}", .path.display())]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying I/O error.
        message: String,
    },
    /// The TOML was malformed or contained unknown keys.
    #[error("failed to parse {}: {message}", .path.display())]
    Parse {
        /// Config path, [`INLINE_SOURCE`] for strings.
        path: PathBuf,
        /// Underlying deserializer error.
        message: String,
    },
    /// The configured executor could not be created.
    #[error("failed to start command executor: {message}")]
    Executor {
        /// Underlying error.
        message: String,
    },
}

/// Literal and sibling policies of the command tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParsingConfig {
    /// Literal matching policy.
    pub literal_case: LiteralCase,
    /// Sibling non-literal policy.
    pub ambiguity: AmbiguityPolicy,
}

/// Built-in coordinator selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoordinatorKind {
    /// Parse and run on the calling thread.
    #[default]
    Immediate,
    /// Run on a thread pool.
    Deferred,
}

/// Where commands are parsed and executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Coordinator strategy.
    pub coordinator: CoordinatorKind,
    /// Keep parsing on the calling thread when deferring execution.
    pub synchronous_parsing: bool,
    /// Worker count of the deferred pool; the number of CPUs when absent.
    pub pool_size: Option<usize>,
}

/// Engine configuration root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Tree policies.
    pub parsing: ParsingConfig,
    /// Coordinator settings.
    pub execution: ExecutionConfig,
}

impl EngineConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Self::parse(raw, Path::new(INLINE_SOURCE))
    }

    /// Reads and parses the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and [`ConfigError::Parse`] when
    /// its content is invalid; both name the path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let body = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::parse(&body, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}
