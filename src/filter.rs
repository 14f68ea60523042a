//! Content filters and the per-kind pipeline that runs them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CompileError, Diagnostic, FilterError, DIAG_FILTER_FAILED};
use crate::scope::ScriptScope;
use crate::section::Section;
use crate::style::{Grass, LightningCss, PreprocessFilter, StyleScope};
use crate::template::TemplateScope;

/// A pure content transform over one section.
pub trait Filter {
    fn name(&self) -> &str;

    /// Whether this filter applies to `section`. Unconditional by default.
    fn matches(&self, _section: &Section) -> bool {
        true
    }

    /// Produce the new content for `section`.
    fn apply(&self, section: &Section) -> Result<String, FilterError>;
}

/// What to do when a filter fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep the content from before the failing filter and carry on.
    #[default]
    Continue,
    /// Abort the compile of the file.
    Propagate,
}

impl FailurePolicy {
    /// Resolve a filter outcome into the content the pipeline continues with.
    pub fn resolve(
        self,
        filter: &str,
        section: &Section,
        outcome: Result<String, FilterError>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Option<String>, CompileError> {
        match outcome {
            Ok(content) => Ok(Some(content)),
            Err(err) => match self {
                FailurePolicy::Continue => {
                    tracing::warn!(
                        "Filter '{}' failed on <{}> of {}: {}",
                        filter,
                        section.kind,
                        section.owner.id,
                        err
                    );
                    diagnostics.push(Diagnostic::new(
                        DIAG_FILTER_FAILED,
                        format!("{}: {}", filter, err),
                        &section.owner.source_path,
                        Some(&section.kind),
                    ));
                    Ok(None)
                }
                FailurePolicy::Propagate => Err(CompileError::Filter {
                    filter: filter.to_string(),
                    kind: section.kind.clone(),
                    message: err.message,
                }),
            },
        }
    }
}

/// An ordered list of filters.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run every matching filter in registration order.
    pub fn run(
        &self,
        mut section: Section,
        policy: FailurePolicy,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Section, CompileError> {
        for filter in &self.filters {
            if !filter.matches(&section) {
                continue;
            }
            let outcome = filter.apply(&section);
            if let Some(content) = policy.resolve(filter.name(), &section, outcome, diagnostics)? {
                section.content = content;
            }
        }
        Ok(section)
    }
}

impl fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILTER REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

pub type FilterFactory = Box<dyn Fn() -> Box<dyn Filter>>;

pub const FILTER_SCSS: &str = "scss";
pub const FILTER_STYLE_SCOPE: &str = "style-scope";
pub const FILTER_SCRIPT_SCOPE: &str = "script-scope";
pub const FILTER_TEMPLATE_SCOPE: &str = "template-scope";

/// Filter tag → factory, built once by explicit registration.
pub struct FilterRegistry {
    factories: BTreeMap<String, FilterFactory>,
}

impl FilterRegistry {
    pub fn empty() -> Self {
        FilterRegistry {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in scoping and preprocessing filters.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(FILTER_SCSS, || Box::new(PreprocessFilter::new(Grass)));
        registry.register(FILTER_STYLE_SCOPE, || Box::new(StyleScope::new(LightningCss, Grass)));
        registry.register(FILTER_SCRIPT_SCOPE, || Box::new(ScriptScope));
        registry.register(FILTER_TEMPLATE_SCOPE, || Box::new(TemplateScope));
        registry
    }

    pub fn register<F>(&mut self, tag: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Filter> + 'static,
    {
        self.factories.insert(tag.to_string(), Box::new(factory));
        self
    }

    pub fn create(&self, tag: &str) -> Option<Box<dyn Filter>> {
        self.factories.get(tag).map(|factory| factory())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ComponentIdentity;
    use std::path::Path;

    struct Append(&'static str);

    impl Filter for Append {
        fn name(&self) -> &str {
            "append"
        }

        fn apply(&self, section: &Section) -> Result<String, FilterError> {
            Ok(format!("{}{}", section.content, self.0))
        }
    }

    struct Broken;

    impl Filter for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn apply(&self, _section: &Section) -> Result<String, FilterError> {
            Err(FilterError::new("syntax error"))
        }
    }

    struct OnlyLang(&'static str);

    impl Filter for OnlyLang {
        fn name(&self) -> &str {
            "only-lang"
        }

        fn matches(&self, section: &Section) -> bool {
            section.lang().as_deref() == Some(self.0)
        }

        fn apply(&self, _section: &Section) -> Result<String, FilterError> {
            Ok("replaced".to_string())
        }
    }

    fn section(content: &str) -> Section {
        let owner = ComponentIdentity::new(Path::new("/c/button.vue"), Path::new("/c"));
        Section::new("style", content, owner)
    }

    #[test]
    fn test_filters_run_in_registration_order() {
        let mut pipeline = FilterPipeline::new();
        pipeline.push(Box::new(Append("a")));
        pipeline.push(Box::new(Append("b")));

        let mut diags = Vec::new();
        let out = pipeline.run(section("x"), FailurePolicy::Continue, &mut diags).unwrap();
        assert_eq!(out.content, "xab");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_failed_filter_keeps_prior_content_and_continues() {
        let mut pipeline = FilterPipeline::new();
        pipeline.push(Box::new(Append("a")));
        pipeline.push(Box::new(Broken));
        pipeline.push(Box::new(Append("c")));

        let mut diags = Vec::new();
        let out = pipeline.run(section("x"), FailurePolicy::Continue, &mut diags).unwrap();
        assert_eq!(out.content, "xac");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, DIAG_FILTER_FAILED);
        assert_eq!(diags[0].section.as_deref(), Some("style"));
    }

    #[test]
    fn test_propagate_policy_aborts() {
        let mut pipeline = FilterPipeline::new();
        pipeline.push(Box::new(Broken));

        let mut diags = Vec::new();
        let err = pipeline
            .run(section("x"), FailurePolicy::Propagate, &mut diags)
            .unwrap_err();
        assert!(matches!(err, CompileError::Filter { ref filter, .. } if filter == "broken"));
    }

    #[test]
    fn test_non_matching_filter_is_skipped() {
        let mut pipeline = FilterPipeline::new();
        pipeline.push(Box::new(OnlyLang("scss")));

        let mut diags = Vec::new();
        let plain = pipeline.run(section("x"), FailurePolicy::Continue, &mut diags).unwrap();
        assert_eq!(plain.content, "x");

        let scss = pipeline
            .run(section("x").with_attr("lang", "SCSS"), FailurePolicy::Continue, &mut diags)
            .unwrap();
        assert_eq!(scss.content, "replaced");
    }

    #[test]
    fn test_builtin_registry() {
        let registry = FilterRegistry::builtin();
        for tag in [FILTER_SCSS, FILTER_STYLE_SCOPE, FILTER_SCRIPT_SCOPE, FILTER_TEMPLATE_SCOPE] {
            let filter = registry.create(tag).unwrap();
            assert_eq!(filter.name(), tag);
        }
        assert!(registry.create("minify").is_none());
    }
}
