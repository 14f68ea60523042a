//! Section extraction for single-file components.
//!
//! A component source is parsed leniently as an HTML fragment. Every top-level
//! element becomes a [`Section`] keyed by its tag name; content comes either
//! from the element's inner markup or from the file its `src` attribute names.

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::{local_name, namespace_url, ns, parse_fragment, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tendril::TendrilSink;

use crate::error::{CompileError, Diagnostic, DIAG_MISSING_SRC};
use crate::identity::ComponentIdentity;
use crate::section::{AttrValue, Section};

/// Result of parsing one composite source file.
#[derive(Debug, Clone, Default)]
pub struct ParsedSource {
    /// Sections in source order, one per kind.
    pub sections: Vec<Section>,
    /// External files referenced through `src`, in discovery order.
    pub external_files: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedSource {
    pub fn get(&self, kind: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKUP PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse `html` as a body-context fragment. Recoverable markup errors are
/// collected by html5ever and never fail the parse.
fn parse_markup(html: &str, file_path: &Path) -> Result<RcDom, CompileError> {
    let context = QualName::new(None, ns!(html), local_name!("body"));
    let dom = parse_fragment(RcDom::default(), Default::default(), context, vec![])
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| CompileError::io(file_path, e))?;

    tracing::debug!(errors = ?dom.errors, "Parsed markup of {}", file_path.display());

    Ok(dom)
}

/// The fragment root: html5ever wraps fragment children in a single `<html>`.
fn fragment_root(dom: &RcDom) -> Option<Handle> {
    dom.document.children.borrow().first().cloned()
}

/// Serialize the children of `node`. `<template>` keeps its children in a
/// separate contents fragment; raw-text parents (`script`, `style`) are
/// written without escaping.
fn inner_html(node: &Handle, name: &QualName) -> Result<String, std::io::Error> {
    let target = match &node.data {
        NodeData::Element {
            template_contents, ..
        } => template_contents
            .borrow()
            .clone()
            .unwrap_or_else(|| node.clone()),
        _ => node.clone(),
    };

    let handle: SerializableHandle = target.into();
    let mut out = Vec::new();
    serialize(
        &mut out,
        &handle,
        SerializeOpts {
            traversal_scope: TraversalScope::ChildrenOnly(Some(name.clone())),
            ..Default::default()
        },
    )?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTERNAL CONTENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolve a `src` reference: as given first, then relative to the source
/// file's directory.
pub fn resolve_src(src: &str, source_path: &Path) -> Option<PathBuf> {
    let direct = PathBuf::from(src);
    let candidates = [
        Some(direct.clone()),
        source_path.parent().map(|dir| dir.join(&direct)),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|p| p.is_file())
        .map(|p| fs::canonicalize(&p).unwrap_or(p))
}

// ═══════════════════════════════════════════════════════════════════════════════
// SECTION EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Extract the sections of `path`, owned by `owner`.
pub fn parse_sections(path: &Path, owner: &ComponentIdentity) -> Result<ParsedSource, CompileError> {
    if !path.is_file() {
        return Err(CompileError::SourceNotFound(path.to_path_buf()));
    }
    let source = fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
    parse_sections_str(&source, path, owner)
}

/// Extract sections from already loaded source text. `path` anchors relative
/// `src` references.
pub fn parse_sections_str(
    source: &str,
    path: &Path,
    owner: &ComponentIdentity,
) -> Result<ParsedSource, CompileError> {
    let dom = parse_markup(source, path)?;
    let mut parsed = ParsedSource::default();

    let Some(root) = fragment_root(&dom) else {
        return Ok(parsed);
    };

    for child in root.children.borrow().iter() {
        let NodeData::Element { name, attrs, .. } = &child.data else {
            continue;
        };

        let kind = name.local.to_string();
        if parsed.get(&kind).is_some() {
            tracing::debug!(
                "Ignoring duplicate <{}> section in {}",
                kind,
                path.display()
            );
            continue;
        }

        let attributes: BTreeMap<String, AttrValue> = attrs
            .borrow()
            .iter()
            .map(|attr| (attr.name.local.to_string(), AttrValue::from_raw(&attr.value)))
            .collect();

        let mut section = Section {
            kind: kind.clone(),
            external_path: None,
            content: String::new(),
            attributes,
            owner: owner.clone(),
        };

        match section.attr("src").map(str::to_string) {
            Some(src) => match resolve_src(&src, path) {
                Some(resolved) => {
                    section.content =
                        fs::read_to_string(&resolved).map_err(|e| CompileError::io(&resolved, e))?;
                    parsed.external_files.push(resolved.clone());
                    section.external_path = Some(resolved);
                }
                None => {
                    tracing::warn!(
                        "<{}> in {} references missing file '{}'; section left empty",
                        kind,
                        path.display(),
                        src
                    );
                    parsed.diagnostics.push(Diagnostic::new(
                        DIAG_MISSING_SRC,
                        format!("src file '{}' not found", src),
                        path,
                        Some(&kind),
                    ));
                }
            },
            None => {
                section.content = inner_html(child, name).map_err(|e| CompileError::io(path, e))?;
            }
        }

        parsed.sections.push(section);
    }

    Ok(parsed)
}
