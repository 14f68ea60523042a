//! Runtime component registry.
//!
//! Holds the registered components, the set of components included on the
//! current page and every instance rendered so far.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::compiler::{BatchReport, ComponentCompiler};
use crate::component::{Component, ComponentInstance, Resources};
use crate::discovery::{discover, TypeMap};
use crate::error::{CompileError, ComponentError, Diagnostic, DIAG_RENDER_FAILED};
use crate::render::RenderEngines;
use crate::scope::included_components_script;

/// What a name can be registered with.
#[derive(Debug, Clone)]
pub enum Registration {
    Component(Component),
    Resources(Resources),
    Source { path: PathBuf, base: Option<PathBuf> },
}

impl From<Component> for Registration {
    fn from(component: Component) -> Self {
        Registration::Component(component)
    }
}

impl From<Resources> for Registration {
    fn from(resources: Resources) -> Self {
        Registration::Resources(resources)
    }
}

impl From<PathBuf> for Registration {
    fn from(path: PathBuf) -> Self {
        Registration::Source { path, base: None }
    }
}

impl From<&Path> for Registration {
    fn from(path: &Path) -> Self {
        Registration::Source {
            path: path.to_path_buf(),
            base: None,
        }
    }
}

/// Projection options for [`ComponentManager::resources`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceQuery {
    /// Expand array values (recursively) into their elements.
    pub flatten: bool,
    /// Keep null, `false` and empty values.
    pub keep_empty: bool,
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

fn flatten_into(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        other => out.push(other),
    }
}

fn project<'a>(components: impl Iterator<Item = &'a Component>, key: &str, query: ResourceQuery) -> Vec<Value> {
    let mut values = Vec::new();
    for component in components {
        let value = component.get(key).cloned().unwrap_or(Value::Null);
        if query.flatten {
            flatten_into(value, &mut values);
        } else {
            values.push(value);
        }
    }
    if !query.keep_empty {
        values.retain(|v| !is_empty_value(v));
    }
    values
}

#[derive(Default)]
pub struct ComponentManager {
    compiler: Option<ComponentCompiler>,
    engines: RenderEngines,
    components: BTreeMap<String, Component>,
    included: Vec<Component>,
    instances: BTreeMap<String, Vec<ComponentInstance>>,
    diagnostics: Vec<Diagnostic>,
}

impl ComponentManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compiler(compiler: ComponentCompiler) -> Self {
        ComponentManager {
            compiler: Some(compiler),
            ..Self::default()
        }
    }

    pub fn compiler(&self) -> Option<&ComponentCompiler> {
        self.compiler.as_ref()
    }

    pub fn engines_mut(&mut self) -> &mut RenderEngines {
        &mut self.engines
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn all(&self) -> &BTreeMap<String, Component> {
        &self.components
    }

    /// Components included at least once, in order of first inclusion.
    pub fn included(&self) -> &[Component] {
        &self.included
    }

    pub fn instances(&self) -> &BTreeMap<String, Vec<ComponentInstance>> {
        &self.instances
    }

    /// Render failures recovered so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Compile sources without registering them.
    pub fn compile<P: AsRef<Path>>(&mut self, paths: &[P], base: Option<&Path>) -> Result<BatchReport, ComponentError> {
        let compiler = self.compiler.as_mut().ok_or(ComponentError::NoCompiler)?;
        Ok(compiler.compile_batch(paths, base)?)
    }

    /// Register `name`. An existing name is never overwritten.
    ///
    /// `name` is only the registry key. Compiled components keep the name of
    /// their source file, which is what their script, style and root class
    /// are scoped under, so instances and `scriptScope.included` use it too.
    pub fn register(&mut self, name: &str, registration: impl Into<Registration>) -> Result<(), ComponentError> {
        if self.components.contains_key(name) {
            return Err(ComponentError::AlreadyRegistered(name.to_string()));
        }

        let component = match registration.into() {
            Registration::Component(component) => component,
            Registration::Resources(resources) => Component::with_resources(name, resources),
            Registration::Source { path, base } => self.compile_source(name, &path, base.as_deref())?,
        };

        tracing::debug!("Registered component '{}'", name);
        self.components.insert(name.to_string(), component);
        Ok(())
    }

    fn compile_source(&mut self, name: &str, path: &Path, base: Option<&Path>) -> Result<Component, ComponentError> {
        if !path.exists() {
            return Err(CompileError::SourceNotFound(path.to_path_buf()).into());
        }

        let report = self.compile(&[path], base)?;
        if let Some((_, err)) = report.failures.into_iter().next() {
            return Err(err.into());
        }

        let mut compiled = report.compiled;
        if compiled.is_empty() {
            return Err(ComponentError::EmptySource(path.to_path_buf()));
        }
        let position = compiled
            .iter()
            .position(|c| c.identity.name == name || c.identity.id == name)
            .unwrap_or(0);
        let chosen = compiled.swap_remove(position);
        Ok(Component::from_artifacts(&chosen.identity.name, &chosen.artifacts))
    }

    /// Compile a batch and register every result under its component id.
    /// Ids that are already registered are left alone.
    pub fn register_sources<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        base: Option<&Path>,
    ) -> Result<BatchReport, ComponentError> {
        let report = self.compile(paths, base)?;

        for compiled in &report.compiled {
            let id = &compiled.identity.id;
            if self.components.contains_key(id) {
                tracing::warn!("Component '{}' is already registered; skipping {}", id, compiled.identity.source_path.display());
                continue;
            }
            self.components.insert(
                id.clone(),
                Component::from_artifacts(&compiled.identity.name, &compiled.artifacts),
            );
        }

        Ok(report)
    }

    /// Discover pre-split components under `locations`, optionally
    /// registering them.
    pub fn find(&mut self, locations: &[PathBuf], type_map: &TypeMap, register: bool) -> BTreeMap<String, Resources> {
        let found = discover(locations, type_map);
        if register {
            for (id, resources) in &found {
                if let Err(e) = self.register(id, resources.clone()) {
                    tracing::debug!("Skipping discovered component: {}", e);
                }
            }
        }
        found
    }

    /// Render a new instance of the registered component `name`.
    pub fn include(&mut self, name: &str, data: Map<String, Value>) -> Result<String, ComponentError> {
        let component = self
            .components
            .get(name)
            .cloned()
            .ok_or_else(|| ComponentError::Unregistered(name.to_string()))?;
        Ok(self.render_instance(component, data))
    }

    /// Render a new instance of an ad-hoc component, keyed by its name.
    pub fn include_component(&mut self, component: &Component, data: Map<String, Value>) -> String {
        self.render_instance(component.clone(), data)
    }

    fn render_instance(&mut self, component: Component, data: Map<String, Value>) -> String {
        let name = component.name().to_string();
        if !self.included.iter().any(|c| c.name() == name) {
            self.included.push(component.clone());
        }

        let instances = self.instances.entry(name).or_default();
        let instance = component.instantiate(instances.len());

        let output = match instance.component().template_path() {
            Some(template) => {
                let mut context = data;
                context.insert("component".to_string(), instance.context_value());

                let mut out = String::new();
                if let Err(e) = self.engines.render(&template, &Value::Object(context), &mut out) {
                    tracing::warn!("Failed to render component '{}': {}", instance.id(), e);
                    self.diagnostics.push(Diagnostic::new(
                        DIAG_RENDER_FAILED,
                        e.to_string(),
                        &template,
                        Some(instance.id()),
                    ));
                }
                out.trim_start().to_string()
            }
            None => String::new(),
        };

        instances.push(instance);
        output
    }

    pub fn resources(&self, key: &str, query: ResourceQuery) -> Vec<Value> {
        project(self.components.values(), key, query)
    }

    pub fn included_resources(&self, key: &str, query: ResourceQuery) -> Vec<Value> {
        project(self.included.iter(), key, query)
    }

    /// `scriptScope.included` for everything rendered so far.
    pub fn included_components_script(&self) -> String {
        included_components_script(self)
    }
}
