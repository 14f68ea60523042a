//! Section kinds and their handlers.
//!
//! A [`SectionHandler`] couples a [`SectionKind`] (naming, artifact file name,
//! core transform) with the pre- and post-filter pipelines configured for it.

use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::config::{CompilerConfig, SectionConfig};
use crate::error::{CompileError, ConfigError, Diagnostic, FilterError};
use crate::filter::{FailurePolicy, FilterPipeline, FilterRegistry};
use crate::section::Section;

lazy_static! {
    static ref UNSAFE_FILE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
}

/// First eight hex digits of the SHA-256 of `source`.
pub fn source_hash(source: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}

/// Stem shared by every artifact of a component: its id made file-safe,
/// plus a hash of the owning source so equal ids from different bases
/// never share files.
pub fn artifact_stem(section: &Section) -> String {
    format!(
        "{}-{}",
        UNSAFE_FILE_CHARS.replace_all(&section.owner.id, "_"),
        source_hash(&section.owner.source_path)
    )
}

fn safe_extension(ext: &str) -> String {
    UNSAFE_FILE_CHARS.replace_all(ext.trim_start_matches('.'), "_").to_string()
}

pub trait SectionKind {
    fn kind_name(&self) -> &str;

    /// File name (inside the cache dir) of the compiled artifact.
    fn artifact_file_name(&self, section: &Section) -> String;

    fn transform(&self, section: Section) -> Result<Section, FilterError> {
        Ok(section)
    }
}

pub struct TemplateKind;

impl SectionKind for TemplateKind {
    fn kind_name(&self) -> &str {
        "template"
    }

    fn artifact_file_name(&self, section: &Section) -> String {
        let ext = match section.lang() {
            Some(lang) => match lang.as_str() {
                "smarty" => "tpl".to_string(),
                "blade" => "blade.php".to_string(),
                other => safe_extension(other),
            },
            None => "html".to_string(),
        };
        format!("{}.{}", artifact_stem(section), ext)
    }
}

pub struct StyleKind;

impl SectionKind for StyleKind {
    fn kind_name(&self) -> &str {
        "style"
    }

    fn artifact_file_name(&self, section: &Section) -> String {
        format!("{}.css", artifact_stem(section))
    }
}

pub struct ScriptKind;

impl SectionKind for ScriptKind {
    fn kind_name(&self) -> &str {
        "script"
    }

    fn artifact_file_name(&self, section: &Section) -> String {
        format!("{}.js", artifact_stem(section))
    }
}

/// Pass-through kind for caller-defined sections.
pub struct RawKind {
    pub name: String,
    pub extension: String,
}

impl SectionKind for RawKind {
    fn kind_name(&self) -> &str {
        &self.name
    }

    fn artifact_file_name(&self, section: &Section) -> String {
        format!("{}.{}", artifact_stem(section), safe_extension(&self.extension))
    }
}

pub struct SectionHandler {
    kind: Box<dyn SectionKind>,
    pub pre_filters: FilterPipeline,
    pub post_filters: FilterPipeline,
}

impl SectionHandler {
    pub fn new(kind: Box<dyn SectionKind>) -> Self {
        SectionHandler {
            kind,
            pre_filters: FilterPipeline::new(),
            post_filters: FilterPipeline::new(),
        }
    }

    pub fn kind_name(&self) -> &str {
        self.kind.kind_name()
    }

    pub fn artifact_file_name(&self, section: &Section) -> String {
        self.kind.artifact_file_name(section)
    }

    /// Pre-filters, core transform, post-filters.
    pub fn process(
        &self,
        section: Section,
        policy: FailurePolicy,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Section, CompileError> {
        let section = self.pre_filters.run(section, policy, diagnostics)?;

        let before = section.clone();
        let outcome = self.kind.transform(section).map(|s| s.content);
        let section = match policy.resolve(self.kind_name(), &before, outcome, diagnostics)? {
            Some(content) => Section { content, ..before },
            None => before,
        };

        self.post_filters.run(section, policy, diagnostics)
    }
}

impl fmt::Debug for SectionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionHandler")
            .field("kind", &self.kind_name())
            .field("pre_filters", &self.pre_filters)
            .field("post_filters", &self.post_filters)
            .finish()
    }
}

/// Section kind → handler.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, SectionHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under its own kind name.
    pub fn register(&mut self, handler: SectionHandler) -> &mut Self {
        let kind = handler.kind_name().to_string();
        self.insert(&kind, handler)
    }

    /// Register `handler` for sections tagged `kind`.
    pub fn insert(&mut self, kind: &str, handler: SectionHandler) -> &mut Self {
        self.handlers.insert(kind.to_string(), handler);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&SectionHandler> {
        self.handlers.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Build handlers for every configured section kind.
    pub fn from_config(config: &CompilerConfig, filters: &FilterRegistry) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (kind, section) in &config.sections {
            registry.insert(kind, build_handler(kind, section, filters)?);
        }
        Ok(registry)
    }
}

fn build_handler(
    kind: &str,
    config: &SectionConfig,
    filters: &FilterRegistry,
) -> Result<SectionHandler, ConfigError> {
    let section_kind: Box<dyn SectionKind> = match config.handler.as_deref().unwrap_or("raw") {
        "template" => Box::new(TemplateKind),
        "style" => Box::new(StyleKind),
        "script" => Box::new(ScriptKind),
        "raw" => Box::new(RawKind {
            name: kind.to_string(),
            extension: config.extension.clone().unwrap_or_else(|| kind.to_string()),
        }),
        other => {
            return Err(ConfigError::UnknownHandler {
                kind: kind.to_string(),
                handler: other.to_string(),
            })
        }
    };

    if section_kind.kind_name() != kind {
        tracing::debug!(
            "Section <{}> handled as '{}' artifacts",
            kind,
            section_kind.kind_name()
        );
    }

    let mut handler = SectionHandler {
        kind: section_kind,
        pre_filters: FilterPipeline::new(),
        post_filters: FilterPipeline::new(),
    };

    for (names, pipeline) in [
        (&config.pre, &mut handler.pre_filters),
        (&config.post, &mut handler.post_filters),
    ] {
        for name in names {
            let filter = filters.create(name).ok_or_else(|| ConfigError::UnknownFilter {
                kind: kind.to_string(),
                filter: name.clone(),
            })?;
            pipeline.push(filter);
        }
    }

    Ok(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ComponentIdentity;
    use std::path::Path;

    fn section(kind: &str, source: &str) -> Section {
        let owner = ComponentIdentity::new(Path::new(source), Path::new("/c"));
        Section::new(kind, "", owner)
    }

    fn stem(source: &str, id: &str) -> String {
        format!("{}-{}", id, source_hash(Path::new(source)))
    }

    #[test]
    fn test_template_artifact_names_follow_lang() {
        let s = section("template", "/c/card.vue");
        let stem = stem("/c/card.vue", "card");
        assert_eq!(TemplateKind.artifact_file_name(&s), format!("{}.html", stem));
        assert_eq!(
            TemplateKind.artifact_file_name(&s.clone().with_attr("lang", "Smarty")),
            format!("{}.tpl", stem)
        );
        assert_eq!(
            TemplateKind.artifact_file_name(&s.clone().with_attr("lang", "blade")),
            format!("{}.blade.php", stem)
        );
        assert_eq!(
            TemplateKind.artifact_file_name(&s.with_attr("lang", "twig")),
            format!("{}.twig", stem)
        );
    }

    #[test]
    fn test_nested_components_use_id_stem() {
        let s = section("style", "/c/forms/button.vue");
        let stem = stem("/c/forms/button.vue", "forms.button");
        assert_eq!(StyleKind.artifact_file_name(&s), format!("{}.css", stem));
        assert_eq!(ScriptKind.artifact_file_name(&s), format!("{}.js", stem));
    }

    #[test]
    fn test_equal_ids_from_different_sources_get_distinct_stems() {
        let a = Section::new("template", "", ComponentIdentity::new(Path::new("/a/button.vue"), Path::new("/a")));
        let b = Section::new("template", "", ComponentIdentity::new(Path::new("/b/button.vue"), Path::new("/b")));
        assert_eq!(a.owner.id, b.owner.id);
        assert_ne!(artifact_stem(&a), artifact_stem(&b));
        assert_eq!(source_hash(Path::new("/a/button.vue")).len(), 8);
    }

    #[test]
    fn test_default_config_registers_standard_kinds() {
        let registry =
            HandlerRegistry::from_config(&CompilerConfig::default(), &FilterRegistry::builtin()).unwrap();
        let kinds: Vec<&str> = registry.kinds().collect();
        assert_eq!(kinds, vec!["script", "style", "template"]);
        assert_eq!(
            registry.get("style").unwrap().post_filters.names(),
            vec!["style-scope"]
        );
    }

    #[test]
    fn test_registry_debug_lists_filters() {
        let registry =
            HandlerRegistry::from_config(&CompilerConfig::default(), &FilterRegistry::builtin()).unwrap();
        let debug = format!("{:?}", registry);
        assert!(debug.contains("\"style-scope\""));
        assert!(debug.contains("SectionHandler"));
    }

    #[test]
    fn test_unknown_filter_is_rejected() {
        let config = CompilerConfig::from_toml_str(
            r#"
            [sections.style]
            handler = "style"
            post = ["minify"]
            "#,
        )
        .unwrap();
        let err = HandlerRegistry::from_config(&config, &FilterRegistry::builtin()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFilter { ref filter, .. } if filter == "minify"));
    }

    #[test]
    fn test_raw_kind_uses_configured_extension() {
        let config = CompilerConfig::from_toml_str(
            r#"
            [sections.docs]
            extension = "md"
            "#,
        )
        .unwrap();
        let registry = HandlerRegistry::from_config(&config, &FilterRegistry::builtin()).unwrap();
        let handler = registry.get("docs").unwrap();
        assert_eq!(
            handler.artifact_file_name(&section("docs", "/c/card.vue")),
            format!("{}.md", stem("/c/card.vue", "card"))
        );
    }
}
