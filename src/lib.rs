//! # Single-File Component Compiler
//!
//! A component source holds a template, a style and a script side by side:
//!
//! ```text
//! <template class="card">...</template>
//! <style lang="scss">...</style>
//! <script singleton>...</script>
//! ```
//!
//! Compilation splits it into sections, runs each section through its
//! handler's filter pipeline and writes one artifact per section into a
//! cache directory. Styles are scoped under `.component-<name>`, scripts are
//! wrapped into the `scriptScope` dispatch table, and templates are wrapped
//! into a root element carrying the component classes.
//!
//! ## Invariants
//!
//! 1. **Section identity**: a source yields at most one section per tag name.
//!    The first occurrence wins.
//!
//! 2. **Cache validity**: cached artifacts are reused only while every
//!    dependency (the source plus all `src` files) exists and is not newer
//!    than the last build, and every recorded artifact still exists.
//!
//! 3. **Instance identity**: the `n`-th inclusion of component `name` on a
//!    page renders with id `name-n`, counting from zero.
//!
//! 4. **Filter failures**: a failing filter keeps its input content under
//!    [`FailurePolicy::Continue`] and records a [`Diagnostic`]; under
//!    [`FailurePolicy::Propagate`] it fails the component.

mod cache;
mod compiler;
mod component;
mod config;
mod discovery;
mod error;
mod filter;
mod handler;
mod identity;
mod manager;
mod parse;
mod render;
mod scope;
mod section;
mod style;
mod template;

pub use cache::{ArtifactMap, CacheEntry, CacheMap, CacheStore, ComponentEntry, ComponentMap, CACHE_MAP_FILE, COMPONENT_MAP_FILE};
pub use compiler::{BatchReport, CompileOptions, CompiledComponent, ComponentCompiler};
pub use component::{Component, ComponentInstance, Resources, TEMPLATE_RESOURCE};
pub use config::{CompilerConfig, SectionConfig, DEFAULT_CACHE_DIR};
pub use discovery::{default_type_map, discover, TypeMap};
pub use error::{
    CompileError, ComponentError, ConfigError, Diagnostic, FilterError, RenderError, DIAG_FILTER_FAILED,
    DIAG_MISSING_SRC, DIAG_RENDER_FAILED,
};
pub use filter::{
    FailurePolicy, Filter, FilterPipeline, FilterRegistry, FILTER_SCRIPT_SCOPE, FILTER_SCSS, FILTER_STYLE_SCOPE,
    FILTER_TEMPLATE_SCOPE,
};
pub use handler::{artifact_stem, source_hash, HandlerRegistry, RawKind, ScriptKind, SectionHandler, SectionKind, StyleKind, TemplateKind};
pub use identity::ComponentIdentity;
pub use manager::{ComponentManager, Registration, ResourceQuery};
pub use parse::{parse_sections, parse_sections_str, resolve_src, ParsedSource};
pub use render::{RawEngine, RenderEngines, TemplateEngine, TeraEngine};
pub use scope::{
    check_script_syntax, included_components, included_components_script, wrap_script, DispatchTable, Invocation,
    ScriptScope, SCOPE_RUNTIME,
};
pub use section::{AttrValue, Section};
pub use style::{scope_wrap, Grass, LightningCss, PreprocessFilter, StylePreprocessor, StyleScope};
pub use template::{id_statement, parse_selector, ContainerSelector, RootAttr, RootElement, TemplateScope};
