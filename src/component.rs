use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::cache::ArtifactMap;

/// Resource bag: artifact paths plus arbitrary configuration.
pub type Resources = BTreeMap<String, Value>;

pub const TEMPLATE_RESOURCE: &str = "template";

/// A registered component. Never rendered directly; inclusions render
/// [`ComponentInstance`]s made from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    name: String,
    resources: Resources,
}

impl Component {
    pub fn new(name: &str) -> Self {
        Self::with_resources(name, Resources::new())
    }

    pub fn with_resources(name: &str, resources: Resources) -> Self {
        Component {
            name: name.to_string(),
            resources,
        }
    }

    /// Wrap compiled artifacts: one resource per section kind.
    pub fn from_artifacts(name: &str, artifacts: &ArtifactMap) -> Self {
        let resources = artifacts
            .iter()
            .map(|(kind, path)| (kind.clone(), Value::String(path.to_string_lossy().into_owned())))
            .collect();
        Self::with_resources(name, resources)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.resources.get(key)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.get(key).unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.resources.insert(key.to_string(), value.into());
    }

    pub fn template_path(&self) -> Option<PathBuf> {
        self.get(TEMPLATE_RESOURCE)
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Stamp out the `index`-th instance. Resources are copied by value.
    pub fn instantiate(&self, index: usize) -> ComponentInstance {
        ComponentInstance {
            id: format!("{}-{}", self.name, index),
            index,
            component: self.clone(),
        }
    }
}

/// One inclusion of a component on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInstance {
    id: String,
    index: usize,
    component: Component,
}

impl ComponentInstance {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.component.get(key)
    }

    /// Instance-local override; never touches the registered component.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.component.set(key, value);
    }

    /// The `component` binding handed to template engines.
    pub fn context_value(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "index": self.index,
            "name": self.component.name(),
            "resources": self.component.resources(),
        })
    }
}
