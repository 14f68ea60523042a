//! Script isolation and the client-side dispatch contract.
//!
//! Every component script is wrapped in a function registered in the global
//! `scriptScope` table:
//!
//! ```text
//! scriptScope = { scripts: {name: fn}, included: {name: [id..]},
//!                 singleton: {name: bool}, executed: {name: bool} }
//! ```
//!
//! `included` is emitted per page render by [`included_components_script`];
//! the static [`SCOPE_RUNTIME`] walks it at load time and calls each script
//! once per instance, or once in total for singletons.

use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::FilterError;
use crate::filter::{Filter, FILTER_SCRIPT_SCOPE};
use crate::manager::ComponentManager;
use crate::section::Section;

/// Dispatch runtime shipped with every page that includes components.
pub const SCOPE_RUNTIME: &str = include_str!("../assets/script-scope.js");

const TABLE_PREAMBLE: &str = "var scriptScope = window.scriptScope = window.scriptScope || {
    scripts: {},
    included: {},
    singleton: {},
    executed: {}
};
";

/// Check `code` parses as a classic script.
pub fn check_script_syntax(code: &str) -> Result<(), FilterError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(false);
    let ret = Parser::new(&allocator, code, source_type).parse();

    match ret.errors.first() {
        Some(error) => Err(FilterError::new(format!("Invalid script syntax: {}", error))),
        None => Ok(()),
    }
}

fn js_string(value: &str) -> Result<String, FilterError> {
    serde_json::to_string(value).map_err(|e| FilterError::new(e.to_string()))
}

/// Wrap a component script into its isolation function.
pub fn wrap_script(content: &str, name: &str, singleton: bool) -> Result<String, FilterError> {
    let key = js_string(name)?;
    Ok(format!(
        "{preamble}
scriptScope.singleton[{key}] = {singleton};
scriptScope.executed[{key}] = false;
scriptScope.scripts[{key}] = function (name, id, selector) {{
    (function (window, document, name, id, selector) {{
{content}
    }}).call(this, window, document, name, id, selector);
}};
",
        preamble = TABLE_PREAMBLE,
        key = key,
        singleton = singleton,
        content = content,
    ))
}

/// Isolates a component script and registers it for dispatch.
pub struct ScriptScope;

impl Filter for ScriptScope {
    fn name(&self) -> &str {
        FILTER_SCRIPT_SCOPE
    }

    fn apply(&self, section: &Section) -> Result<String, FilterError> {
        let wrapped = wrap_script(&section.content, &section.owner.name, section.flag("singleton"))?;
        check_script_syntax(&wrapped)?;
        Ok(wrapped)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INCLUDED COMPONENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// `name -> [instance id]` for every instance rendered by `manager`.
pub fn included_components(manager: &ComponentManager) -> BTreeMap<String, Vec<String>> {
    manager
        .instances()
        .iter()
        .map(|(name, instances)| {
            (
                name.clone(),
                instances.iter().map(|i| i.id().to_string()).collect(),
            )
        })
        .collect()
}

/// Script publishing the rendered instances to the dispatch runtime.
pub fn included_components_script(manager: &ComponentManager) -> String {
    let included = included_components(manager);
    let json = serde_json::to_string(&included).unwrap_or_else(|_| "{}".to_string());
    format!("{}\nscriptScope.included = {};\n", TABLE_PREAMBLE, json)
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPATCH MODEL
// ═══════════════════════════════════════════════════════════════════════════════

/// One script call the runtime performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub name: String,
    pub id: String,
    pub selector: String,
}

/// Server-side mirror of the client dispatch table. [`DispatchTable::invocations`]
/// follows the same rules as [`SCOPE_RUNTIME`].
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    pub scripts: BTreeSet<String>,
    pub included: BTreeMap<String, Vec<String>>,
    pub singleton: BTreeMap<String, bool>,
}

impl DispatchTable {
    pub fn register(&mut self, name: &str, singleton: bool) {
        self.scripts.insert(name.to_string());
        self.singleton.insert(name.to_string(), singleton);
    }

    pub fn include(&mut self, name: &str, id: &str) {
        self.included
            .entry(name.to_string())
            .or_default()
            .push(id.to_string());
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        let mut executed: BTreeSet<&str> = BTreeSet::new();
        let mut calls = Vec::new();

        for (name, ids) in &self.included {
            for id in ids {
                let singleton = self.singleton.get(name).copied().unwrap_or(false);
                if singleton && executed.contains(name.as_str()) {
                    continue;
                }
                if !self.scripts.contains(name) {
                    continue;
                }
                executed.insert(name);
                calls.push(Invocation {
                    name: name.clone(),
                    id: id.clone(),
                    selector: format!("component-{}", name),
                });
            }
        }

        calls
    }
}
