//! Template root synthesis.
//!
//! The `container` attribute holds a shorthand selector such as
//! `section#main.card.wide[data-role=panel][hidden]`. It is turned into the
//! component's root element, which always carries the `component` and
//! `component-<name>` classes and wraps the section content verbatim.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::error::FilterError;
use crate::filter::{Filter, FILTER_TEMPLATE_SCOPE};
use crate::section::Section;

lazy_static! {
    /// Expression printing the runtime component id, per template language.
    static ref ID_STATEMENTS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("twig", "{{ component.getId() }}");
        m.insert("blade", "{{ $component->getId() }}");
        m.insert("blade.php", "{{ $component->getId() }}");
        m.insert("tpl", "{$component->getId()}");
        m.insert("smarty", "{$component->getId()}");
        m.insert("jade", "<?= $component->getId(); ?>");
        m.insert("pug", "<?= $component->getId(); ?>");
        m.insert("phug", "<?= $component->getId(); ?>");
        m.insert("php", "<?= $component->getId(); ?>");
        m.insert("tera", "{{ component.id }}");
        m
    };
}

/// Id-printing expression for a template language token, if supported.
pub fn id_statement(lang: &str) -> Option<&'static str> {
    ID_STATEMENTS.get(lang.to_ascii_lowercase().as_str()).copied()
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELECTOR GRAMMAR
// ═══════════════════════════════════════════════════════════════════════════════

/// Attribute value on the synthesized root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootAttr {
    /// Escaped on output.
    Text(String),
    /// Engine expression, emitted as-is.
    Raw(String),
    /// Boolean attribute, emitted without a value.
    Flag,
}

/// A parsed container selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSelector {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, Option<String>)>,
}

/// Byte offsets where a `#`, `.` or `[` segment begins. Characters inside a
/// `[...]` segment never start a new one.
fn segment_starts(selector: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut in_brackets = false;
    for (i, c) in selector.char_indices() {
        match c {
            '[' if !in_brackets => {
                in_brackets = true;
                starts.push(i);
            }
            ']' if in_brackets => in_brackets = false,
            '#' | '.' if !in_brackets => starts.push(i),
            _ => {}
        }
    }
    starts
}

/// Parse `tag#id.class1.class2[attr=val][flag]`.
///
/// Each segment runs from its trigger character up to the next segment start
/// (the minimum of the following trigger positions) or the end of the string.
pub fn parse_selector(selector: &str) -> ContainerSelector {
    let selector = selector.trim();
    let starts = segment_starts(selector);
    let first = starts.first().copied().unwrap_or(selector.len());

    let tag = match &selector[..first] {
        "" => "div".to_string(),
        prefix => prefix.to_string(),
    };

    let mut parsed = ContainerSelector {
        tag,
        ..Default::default()
    };

    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(selector.len());
        let body = &selector[start + 1..end];

        match &selector[start..start + 1] {
            "#" => {
                if parsed.id.is_none() && !body.is_empty() {
                    parsed.id = Some(body.to_string());
                }
            }
            "." => {
                if !body.is_empty() {
                    parsed.classes.push(body.to_string());
                }
            }
            _ => {
                let inner = body.split(']').next().unwrap_or_default();
                let (name, value) = match inner.split_once('=') {
                    Some((name, value)) => {
                        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                        (name.trim(), Some(value.to_string()))
                    }
                    None => (inner.trim(), None),
                };
                if !name.is_empty() {
                    parsed.attributes.push((name.to_string(), value));
                }
            }
        }
    }

    parsed
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROOT ELEMENT
// ═══════════════════════════════════════════════════════════════════════════════

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

/// Synthesized component root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootElement {
    pub tag: String,
    pub attributes: Vec<(String, RootAttr)>,
}

impl RootElement {
    fn set(&mut self, name: &str, value: RootAttr) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RootAttr> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn classes(&self) -> Vec<&str> {
        match self.get("class") {
            Some(RootAttr::Text(classes)) => classes.split_whitespace().collect(),
            _ => Vec::new(),
        }
    }

    /// Build the root for `section` from its `container`, `id` and `lang`.
    pub fn for_section(section: &Section) -> Self {
        let selector = parse_selector(section.attr("container").unwrap_or("div"));

        let mut root = RootElement {
            tag: selector.tag,
            attributes: Vec::new(),
        };

        let mut classes: Vec<String> = Vec::new();
        for (name, value) in selector.attributes {
            match (name.as_str(), value) {
                ("class", Some(value)) => {
                    classes.extend(value.split_whitespace().map(str::to_string))
                }
                (_, Some(value)) => root.set(&name, RootAttr::Text(value)),
                (_, None) => root.set(&name, RootAttr::Flag),
            }
        }
        classes.extend(selector.classes);

        for required in ["component".to_string(), section.owner.scope_class()] {
            if !classes.contains(&required) {
                classes.push(required);
            }
        }
        root.set("class", RootAttr::Text(classes.join(" ")));

        let explicit_id = section.attr("id").map(str::to_string).or(selector.id);
        match explicit_id {
            Some(id) => root.set("id", RootAttr::Text(id)),
            None => {
                if let Some(statement) = section.lang().as_deref().and_then(id_statement) {
                    root.set("id", RootAttr::Raw(statement.to_string()));
                }
            }
        }

        root
    }

    pub fn open_tag(&self) -> String {
        let mut out = format!("<{}", self.tag);
        for (name, value) in &self.attributes {
            match value {
                RootAttr::Text(v) => out.push_str(&format!(" {}=\"{}\"", name, escape_attr(v))),
                RootAttr::Raw(v) => out.push_str(&format!(" {}=\"{}\"", name, v)),
                RootAttr::Flag => out.push_str(&format!(" {}", name)),
            }
        }
        out.push('>');
        out
    }

    /// Serialize the root with `content` as its child fragment.
    pub fn wrap(&self, content: &str) -> String {
        format!("{}{}</{}>", self.open_tag(), content, self.tag)
    }
}

/// Synthesizes the component root around the template content.
pub struct TemplateScope;

impl Filter for TemplateScope {
    fn name(&self) -> &str {
        FILTER_TEMPLATE_SCOPE
    }

    fn apply(&self, section: &Section) -> Result<String, FilterError> {
        let selector = section.attr("container").unwrap_or("div").trim();
        if selector.contains(['<', '>']) {
            return Err(FilterError::new(format!("invalid container selector '{}'", selector)));
        }
        Ok(RootElement::for_section(section).wrap(&section.content))
    }
}
