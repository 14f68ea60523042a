//! Style preprocessing and scoping.
//!
//! Preprocessors are opaque `compile(text) -> text` collaborators. SCSS
//! sections go through grass, plain CSS through lightningcss with nesting
//! lowered. Either one turns the scoped wrapper `.component-x { ... }` into
//! flat, scoped selectors.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Features, Targets};

use crate::error::FilterError;
use crate::filter::{Filter, FILTER_SCSS, FILTER_STYLE_SCOPE};
use crate::section::Section;

/// Compiles stylesheet source into plain CSS.
pub trait StylePreprocessor {
    fn compile(&self, source: &str) -> Result<String, FilterError>;
}

/// lightningcss-backed preprocessor. Always lowers nested rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightningCss;

impl StylePreprocessor for LightningCss {
    fn compile(&self, source: &str) -> Result<String, FilterError> {
        let stylesheet = StyleSheet::parse(source, ParserOptions::default())
            .map_err(|e| FilterError::new(e.to_string()))?;
        let result = stylesheet
            .to_css(PrinterOptions {
                targets: Targets {
                    browsers: None,
                    include: Features::Nesting,
                    exclude: Features::empty(),
                },
                ..PrinterOptions::default()
            })
            .map_err(|e| FilterError::new(e.to_string()))?;
        Ok(result.code)
    }
}

/// grass-backed SCSS compiler: variables, mixins and nesting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grass;

impl StylePreprocessor for Grass {
    fn compile(&self, source: &str) -> Result<String, FilterError> {
        grass::from_string(source.to_string(), &grass::Options::default())
            .map_err(|e| FilterError::new(e.to_string()))
    }
}

fn is_scss(section: &Section) -> bool {
    matches!(section.lang().as_deref(), Some("scss") | Some("sass"))
}

/// Runs the preprocessor over `lang="scss"` / `lang="sass"` sections.
pub struct PreprocessFilter<P> {
    preprocessor: P,
}

impl<P: StylePreprocessor> PreprocessFilter<P> {
    pub fn new(preprocessor: P) -> Self {
        Self { preprocessor }
    }
}

impl<P: StylePreprocessor> Filter for PreprocessFilter<P> {
    fn name(&self) -> &str {
        FILTER_SCSS
    }

    fn matches(&self, section: &Section) -> bool {
        is_scss(section)
    }

    fn apply(&self, section: &Section) -> Result<String, FilterError> {
        self.preprocessor.compile(&section.content)
    }
}

/// Confines a stylesheet to its component's generated class. The wrapped
/// stylesheet is compiled by `scss` for SCSS sections and by `css` otherwise.
pub struct StyleScope<C, S> {
    css: C,
    scss: S,
}

impl<C: StylePreprocessor, S: StylePreprocessor> StyleScope<C, S> {
    pub fn new(css: C, scss: S) -> Self {
        Self { css, scss }
    }
}

/// Wrap `content` in the component's scoping rule.
pub fn scope_wrap(content: &str, name: &str) -> String {
    format!(".component-{} {{{}}}", name, content)
}

impl<C: StylePreprocessor, S: StylePreprocessor> Filter for StyleScope<C, S> {
    fn name(&self) -> &str {
        FILTER_STYLE_SCOPE
    }

    fn apply(&self, section: &Section) -> Result<String, FilterError> {
        let wrapped = scope_wrap(&section.content, &section.owner.name);
        if is_scss(section) {
            self.scss.compile(&wrapped)
        } else {
            self.css.compile(&wrapped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ComponentIdentity;
    use std::path::Path;

    fn style(name: &str, content: &str) -> Section {
        let owner = ComponentIdentity::new(&Path::new("/c").join(format!("{}.vue", name)), Path::new("/c"));
        Section::new("style", content, owner)
    }

    fn squash(css: &str) -> String {
        css.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_style_scope_wraps_in_component_class() {
        let filter = StyleScope::new(LightningCss, Grass);
        let out = filter.apply(&style("button", "color: red;")).unwrap();
        assert_eq!(squash(&out), ".component-button { color: red; }");
    }

    #[test]
    fn test_nested_rules_are_scoped() {
        let filter = StyleScope::new(LightningCss, Grass);
        let out = filter.apply(&style("card", "& .title { font-weight: bold; }")).unwrap();
        assert!(out.contains(".component-card .title"));
    }

    #[test]
    fn test_invalid_css_is_a_filter_error() {
        let filter = StyleScope::new(LightningCss, Grass);
        assert!(filter.apply(&style("card", "color: red; } } {")).is_err());
    }

    #[test]
    fn test_preprocess_matches_only_scss_and_sass() {
        let filter = PreprocessFilter::new(Grass);
        assert!(filter.matches(&style("a", "").with_attr("lang", "scss")));
        assert!(filter.matches(&style("a", "").with_attr("lang", "Sass")));
        assert!(!filter.matches(&style("a", "").with_attr("lang", "less")));
        assert!(!filter.matches(&style("a", "")));
    }

    #[test]
    fn test_scss_variables_and_nesting_are_scoped() {
        let filter = StyleScope::new(LightningCss, Grass);
        let section = style("button", "$c: red; color: $c; .x { color: blue; }").with_attr("lang", "scss");
        let out = filter.apply(&section).unwrap();
        assert_eq!(
            squash(&out),
            ".component-button { color: red; } .component-button .x { color: blue; }"
        );
    }

    #[test]
    fn test_preprocess_compiles_scss() {
        let filter = PreprocessFilter::new(Grass);
        let section = style("a", "$w: 2px; .a { .b { width: $w; } }").with_attr("lang", "scss");
        assert_eq!(squash(&filter.apply(&section).unwrap()), ".a .b { width: 2px; }");
    }

    #[test]
    fn test_plain_css_does_not_go_through_scss() {
        let filter = StyleScope::new(LightningCss, Grass);
        assert!(filter.apply(&style("a", "$c: red; color: $c;")).is_err());
    }

    #[test]
    fn test_scope_wrap() {
        assert_eq!(scope_wrap("a{}", "nav"), ".component-nav {a{}}");
    }
}
