//! Rendering of template artifacts.
//!
//! Rendering is owned by whichever engine is registered for the artifact's
//! extension. Engines write into a caller-owned buffer so output produced
//! before a failure survives it.

use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context, Tera};

use crate::error::RenderError;

pub trait TemplateEngine {
    fn render(&self, path: &Path, context: &Value, out: &mut String) -> Result<(), RenderError>;
}

fn read_template(path: &Path) -> Result<String, RenderError> {
    fs::read_to_string(path).map_err(|source| RenderError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Emits the artifact unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawEngine;

impl TemplateEngine for RawEngine {
    fn render(&self, path: &Path, _context: &Value, out: &mut String) -> Result<(), RenderError> {
        out.push_str(&read_template(path)?);
        Ok(())
    }
}

/// Renders `.tera` artifacts. Autoescaping is off since the artifact is
/// already markup.
#[derive(Debug, Default, Clone, Copy)]
pub struct TeraEngine;

impl TemplateEngine for TeraEngine {
    fn render(&self, path: &Path, context: &Value, out: &mut String) -> Result<(), RenderError> {
        let source = read_template(path)?;
        let engine_error = |e: tera::Error| RenderError::Engine {
            path: path.to_path_buf(),
            message: format_tera_error(&e),
        };

        let name = path.to_string_lossy();
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_template(&name, &source).map_err(engine_error)?;
        let context = Context::from_value(context.clone()).map_err(engine_error)?;

        let mut buffer = Vec::new();
        let result = tera.render_to(&name, &context, &mut buffer);
        out.push_str(&String::from_utf8_lossy(&buffer));
        result.map_err(engine_error)
    }
}

/// Flatten a tera error chain into one line.
fn format_tera_error(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Extension → engine, with [`RawEngine`] as the fallback.
pub struct RenderEngines {
    engines: BTreeMap<String, Box<dyn TemplateEngine>>,
    fallback: Box<dyn TemplateEngine>,
}

impl Default for RenderEngines {
    fn default() -> Self {
        let mut engines = RenderEngines {
            engines: BTreeMap::new(),
            fallback: Box::new(RawEngine),
        };
        engines.register("tera", Box::new(TeraEngine));
        engines
    }
}

impl RenderEngines {
    pub fn register(&mut self, extension: &str, engine: Box<dyn TemplateEngine>) {
        self.engines.insert(extension.to_ascii_lowercase(), engine);
    }

    pub fn for_path(&self, path: &Path) -> &dyn TemplateEngine {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.engines.get(&e.to_ascii_lowercase()))
            .map(|e| e.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    pub fn render(&self, path: &Path, context: &Value, out: &mut String) -> Result<(), RenderError> {
        self.for_path(path).render(path, context, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_raw_engine_passes_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("card.html");
        fs::write(&path, "<div>{{ untouched }}</div>").unwrap();

        let mut out = String::new();
        RenderEngines::default().render(&path, &json!({}), &mut out).unwrap();
        assert_eq!(out, "<div>{{ untouched }}</div>");
    }

    #[test]
    fn test_tera_engine_sees_component_binding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("card.tera");
        fs::write(&path, r#"<div id="{{ component.id }}">{{ title }}</div>"#).unwrap();

        let mut out = String::new();
        let ctx = json!({ "title": "Hello & bye", "component": { "id": "card-0" } });
        RenderEngines::default().render(&path, &ctx, &mut out).unwrap();
        assert_eq!(out, r#"<div id="card-0">Hello & bye</div>"#);
    }

    #[test]
    fn test_tera_failure_is_an_engine_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.tera");
        fs::write(&path, "{{ missing.value }}").unwrap();

        let mut out = String::new();
        let err = RenderEngines::default().render(&path, &json!({}), &mut out).unwrap_err();
        assert!(matches!(err, RenderError::Engine { .. }));
    }

    #[test]
    fn test_missing_template_is_a_read_error() {
        let mut out = String::new();
        let err = RawEngine
            .render(Path::new("/definitely/not/here.html"), &json!({}), &mut out)
            .unwrap_err();
        assert!(matches!(err, RenderError::Read { .. }));
    }
}
