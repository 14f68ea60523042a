use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::identity::ComponentIdentity;

/// Value of a section attribute. A present-but-empty attribute is a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Flag(bool),
    Text(String),
}

impl AttrValue {
    pub fn from_raw(value: &str) -> Self {
        if value.is_empty() {
            AttrValue::Flag(true)
        } else {
            AttrValue::Text(value.to_string())
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Flag(_) => None,
        }
    }

    /// Truthiness used for flag-style attributes like `singleton`.
    pub fn is_truthy(&self) -> bool {
        match self {
            AttrValue::Flag(b) => *b,
            AttrValue::Text(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "" | "0" | "false"),
        }
    }
}

/// One named sub-part of a composite source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub kind: String,
    pub external_path: Option<PathBuf>,
    pub content: String,
    pub attributes: BTreeMap<String, AttrValue>,
    pub owner: ComponentIdentity,
}

impl Section {
    pub fn new(kind: &str, content: impl Into<String>, owner: ComponentIdentity) -> Self {
        Section {
            kind: kind.to_string(),
            external_path: None,
            content: content.into(),
            attributes: BTreeMap::new(),
            owner,
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), AttrValue::from_raw(value));
        self
    }

    /// Text value of an attribute; flags yield `None`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttrValue::as_text)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.attributes.get(name).map(AttrValue::is_truthy).unwrap_or(false)
    }

    /// Lowercased `lang` attribute.
    pub fn lang(&self) -> Option<String> {
        self.attr("lang").map(|l| l.trim().to_ascii_lowercase())
    }
}
