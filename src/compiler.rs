//! Component compiler: parse → pipeline → cache, per source file.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cache::{ArtifactMap, CacheStore, ComponentMap};
use crate::config::CompilerConfig;
use crate::error::{CompileError, Diagnostic};
use crate::filter::{FailurePolicy, FilterRegistry};
use crate::handler::HandlerRegistry;
use crate::identity::ComponentIdentity;
use crate::parse::parse_sections;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub ignore_cache_time: bool,
    pub failure_policy: FailurePolicy,
}

/// Compiled (or cached) artifacts of one component.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledComponent {
    pub identity: ComponentIdentity,
    pub artifacts: ArtifactMap,
    /// False when the artifacts came from the cache.
    pub rebuilt: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of a batch. Failures are isolated per file.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub compiled: Vec<CompiledComponent>,
    /// Sources that parsed to no sections at all.
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, CompileError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.compiled.iter().flat_map(|c| c.diagnostics.iter())
    }
}

pub struct ComponentCompiler {
    store: CacheStore,
    handlers: HandlerRegistry,
    options: CompileOptions,
}

impl ComponentCompiler {
    pub fn new(cache_dir: &Path, handlers: HandlerRegistry) -> Result<Self, CompileError> {
        Ok(ComponentCompiler {
            store: CacheStore::open(cache_dir)?,
            handlers,
            options: CompileOptions::default(),
        })
    }

    /// Build a compiler with the handlers and options described by `config`.
    pub fn from_config(config: &CompilerConfig, filters: &FilterRegistry) -> Result<Self, CompileError> {
        let handlers = HandlerRegistry::from_config(config, filters)?;
        Ok(Self::new(&config.cache_dir, handlers)?.with_options(CompileOptions {
            ignore_cache_time: config.ignore_cache_time,
            failure_policy: config.on_filter_error,
        }))
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    pub fn cache_dir(&self) -> &Path {
        self.store.cache_dir()
    }

    pub fn component_map(&self) -> &ComponentMap {
        self.store.component_map()
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn clear_cache(&mut self) -> Result<(), CompileError> {
        self.store.clear()
    }

    /// Compile a single source; its base directory is the file's parent.
    pub fn compile(&mut self, path: &Path) -> Result<Option<CompiledComponent>, CompileError> {
        let snapshot = self.store.snapshot();
        let result = self.compile_file(path, None);
        self.store.persist(&snapshot)?;
        result
    }

    /// Compile every path, continuing past per-file failures. The maps are
    /// persisted once at the end, and only if they changed.
    pub fn compile_batch<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        base: Option<&Path>,
    ) -> Result<BatchReport, CompileError> {
        let snapshot = self.store.snapshot();
        let mut report = BatchReport::default();

        for path in paths {
            let path = path.as_ref();
            match self.compile_file(path, base) {
                Ok(Some(compiled)) => report.compiled.push(compiled),
                Ok(None) => report.skipped.push(path.to_path_buf()),
                Err(e) => {
                    tracing::warn!("Failed to compile component {}: {}", path.display(), e);
                    report.failures.push((path.to_path_buf(), e));
                }
            }
        }

        if self.store.persist(&snapshot)? {
            tracing::debug!("Persisted cache maps to {}", self.store.cache_dir().display());
        }
        Ok(report)
    }

    /// Compile every file under `dir` whose extension is `extension`, using
    /// `dir` as the base for component ids.
    pub fn compile_dir(&mut self, dir: &Path, extension: &str) -> Result<BatchReport, CompileError> {
        let base = fs::canonicalize(dir).map_err(|e| CompileError::io(dir, e))?;
        let mut files: Vec<PathBuf> = WalkDir::new(&base)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == extension))
            .map(|e| e.into_path())
            .collect();
        files.sort();
        self.compile_batch(&files, Some(&base))
    }

    fn compile_file(
        &mut self,
        path: &Path,
        base: Option<&Path>,
    ) -> Result<Option<CompiledComponent>, CompileError> {
        if !path.is_file() {
            return Err(CompileError::SourceNotFound(path.to_path_buf()));
        }
        let source = fs::canonicalize(path).map_err(|e| CompileError::io(path, e))?;
        let base = match base {
            Some(b) => fs::canonicalize(b).unwrap_or_else(|_| b.to_path_buf()),
            None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let identity = ComponentIdentity::new(&source, &base);

        if self.store.validate(&identity.id, &source, self.options.ignore_cache_time) {
            tracing::debug!("Cache hit for component '{}'", identity.id);
            let artifacts = self.store.artifacts(&identity.id).cloned().unwrap_or_default();
            return Ok(Some(CompiledComponent {
                identity,
                artifacts,
                rebuilt: false,
                diagnostics: Vec::new(),
            }));
        }

        tracing::info!("Compiling component '{}' from {}", identity.id, source.display());
        let result = self.rebuild(&source, identity);
        if result.is_err() {
            self.store.forget(&source);
        }
        result
    }

    fn rebuild(
        &mut self,
        source: &Path,
        identity: ComponentIdentity,
    ) -> Result<Option<CompiledComponent>, CompileError> {
        self.store.begin(source);

        let parsed = parse_sections(source, &identity)?;
        for external in &parsed.external_files {
            self.store.add_dependency(source, external);
        }

        if parsed.is_empty() {
            tracing::debug!("No sections in {}; nothing to compile", source.display());
            self.store.forget(source);
            return Ok(None);
        }

        let mut diagnostics = parsed.diagnostics;
        let mut artifacts = ArtifactMap::new();

        for section in parsed.sections {
            let Some(handler) = self.handlers.get(&section.kind) else {
                tracing::debug!("No handler for <{}> in {}", section.kind, identity.id);
                continue;
            };

            let kind = section.kind.clone();
            let file_name = handler.artifact_file_name(&section);
            let section = handler.process(section, self.options.failure_policy, &mut diagnostics)?;
            let artifact = self.store.write_artifact(source, &file_name, &section.content)?;
            artifacts.insert(kind, artifact);
        }

        self.store.record_component(&identity.id, source, artifacts.clone());

        Ok(Some(CompiledComponent {
            identity,
            artifacts,
            rebuilt: true,
            diagnostics,
        }))
    }
}
