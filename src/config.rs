//! Compiler configuration.
//!
//! Loaded from TOML; every field has a default so an empty file yields the
//! standard template/style/script pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::filter::{FailurePolicy, FILTER_SCRIPT_SCOPE, FILTER_STYLE_SCOPE, FILTER_TEMPLATE_SCOPE};

pub const DEFAULT_CACHE_DIR: &str = ".sfc-cache";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub cache_dir: PathBuf,
    /// Treat any existing cache entry as valid regardless of mtimes.
    pub ignore_cache_time: bool,
    pub on_filter_error: FailurePolicy,
    pub sections: BTreeMap<String, SectionConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
    /// `template`, `style`, `script` or `raw` (the default).
    pub handler: Option<String>,
    /// Artifact extension for `raw` sections; defaults to the kind name.
    pub extension: Option<String>,
    pub pre: Vec<String>,
    pub post: Vec<String>,
}

impl SectionConfig {
    fn builtin(handler: &str, post: &[&str]) -> Self {
        SectionConfig {
            handler: Some(handler.to_string()),
            extension: None,
            pre: Vec::new(),
            post: post.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn default_sections() -> BTreeMap<String, SectionConfig> {
    let mut sections = BTreeMap::new();
    sections.insert(
        "template".to_string(),
        SectionConfig::builtin("template", &[FILTER_TEMPLATE_SCOPE]),
    );
    sections.insert(
        "style".to_string(),
        SectionConfig::builtin("style", &[FILTER_STYLE_SCOPE]),
    );
    sections.insert(
        "script".to_string(),
        SectionConfig::builtin("script", &[FILTER_SCRIPT_SCOPE]),
    );
    sections
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            ignore_cache_time: false,
            on_filter_error: FailurePolicy::Continue,
            sections: default_sections(),
        }
    }
}

impl CompilerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CompilerConfig::from_toml_str("").unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.sections.len(), 3);
    }

    #[test]
    fn test_config_overrides() {
        let config = CompilerConfig::from_toml_str(
            r#"
            cache_dir = "build/components"
            ignore_cache_time = true
            on_filter_error = "propagate"

            [sections.script]
            handler = "script"
            "#,
        )
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("build/components"));
        assert!(config.ignore_cache_time);
        assert_eq!(config.on_filter_error, FailurePolicy::Propagate);
        assert_eq!(config.sections.len(), 1);
        assert!(config.sections["script"].post.is_empty());
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        assert!(CompilerConfig::from_toml_str(r#"on_filter_error = "explode""#).is_err());
    }
}
