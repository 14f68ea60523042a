//! Error taxonomy for the component compiler and the runtime registry.
//!
//! Structural problems (missing sources, unknown components, unwritable cache)
//! are surfaced as errors. Sub-language failures inside filters and template
//! render failures are recoverable and normally end up as [`Diagnostic`]s.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while compiling component sources.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Component file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Failed to write cache file: {}", path.display())]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Filter '{filter}' failed on <{kind}> section: {message}")]
    Filter {
        filter: String,
        kind: String,
        message: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize cache map {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CompileError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        CompileError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Errors raised by the runtime [`ComponentManager`](crate::ComponentManager).
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("Trying to include unregistered component: {0}")]
    Unregistered(String),

    #[error("Component '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("No compiler has been set on the component manager")]
    NoCompiler,

    #[error("Component source has no sections: {}", .0.display())]
    EmptySource(PathBuf),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Invalid or unreadable compiler configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unknown section handler '{handler}' for <{kind}>")]
    UnknownHandler { kind: String, handler: String },

    #[error("Unknown filter '{filter}' for <{kind}>")]
    UnknownFilter { kind: String, filter: String },
}

/// A filter could not transform its input.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FilterError {
    pub message: String,
}

impl FilterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A template engine failed part way through rendering an instance.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to read template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Template engine error in {}: {message}", path.display())]
    Engine { path: PathBuf, message: String },
}

/// A recovered failure reported on the observability side channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub file: PathBuf,
    pub section: Option<String>,
}

pub const DIAG_MISSING_SRC: &str = "SFC-W-SRC";
pub const DIAG_FILTER_FAILED: &str = "SFC-W-FILTER";
pub const DIAG_RENDER_FAILED: &str = "SFC-W-RENDER";

impl Diagnostic {
    pub fn new(code: &str, message: impl Into<String>, file: &Path, section: Option<&str>) -> Self {
        Diagnostic {
            code: code.to_string(),
            message: message.into(),
            file: file.to_path_buf(),
            section: section.map(str::to_string),
        }
    }
}
