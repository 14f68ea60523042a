use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Canonical identity of a component derived from its source file.
///
/// `id` is the directory relative to `base_path` with separators replaced by
/// `.`, joined with `name`. For `base/forms/button.vue` that is
/// `forms.button`; for a file directly under `base` it is just the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentIdentity {
    pub name: String,
    pub id: String,
    pub source_path: PathBuf,
    pub base_path: PathBuf,
    /// Relative directory, `/`-separated, empty at top level.
    pub directory: String,
    /// `base/directory/name`, the stem sibling resource files share.
    pub partial_stem: PathBuf,
}

impl ComponentIdentity {
    /// Derive the identity of `source` relative to `base`.
    ///
    /// Pure: never touches the filesystem. A source that does not live under
    /// `base` is treated as top-level.
    pub fn new(source: &Path, base: &Path) -> Self {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match file_name.find('.') {
            Some(pos) => file_name[..pos].to_string(),
            None => file_name.clone(),
        };

        let segments: Vec<String> = source
            .strip_prefix(base)
            .ok()
            .and_then(|rel| rel.parent())
            .map(|dir| {
                dir.components()
                    .filter_map(|c| match c {
                        Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let id = if segments.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", segments.join("."), name)
        };

        let mut partial_stem = base.to_path_buf();
        for segment in &segments {
            partial_stem.push(segment);
        }
        partial_stem.push(&name);

        ComponentIdentity {
            name,
            id,
            source_path: source.to_path_buf(),
            base_path: base.to_path_buf(),
            directory: segments.join("/"),
            partial_stem,
        }
    }

    /// Scoping class applied to the component's markup and styles.
    pub fn scope_class(&self) -> String {
        format!("component-{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_identity() {
        let info = ComponentIdentity::new(Path::new("/app/components/button.vue"), Path::new("/app/components"));
        assert_eq!(info.name, "button");
        assert_eq!(info.id, "button");
        assert_eq!(info.directory, "");
        assert_eq!(info.partial_stem, PathBuf::from("/app/components/button"));
    }

    #[test]
    fn test_nested_identity_joins_with_dots() {
        let info = ComponentIdentity::new(
            Path::new("/app/components/forms/inputs/text.blade.php"),
            Path::new("/app/components"),
        );
        assert_eq!(info.name, "text");
        assert_eq!(info.id, "forms.inputs.text");
        assert_eq!(info.directory, "forms/inputs");
        assert_eq!(info.partial_stem, PathBuf::from("/app/components/forms/inputs/text"));
    }

    #[test]
    fn test_identity_is_deterministic() {
        let a = ComponentIdentity::new(Path::new("/x/a/b/card.vue"), Path::new("/x"));
        let b = ComponentIdentity::new(Path::new("/x/a/b/card.vue"), Path::new("/x"));
        assert_eq!(a, b);
        assert_eq!(a.id, "a.b.card");
    }

    #[test]
    fn test_source_outside_base_is_top_level() {
        let info = ComponentIdentity::new(Path::new("/elsewhere/modal.vue"), Path::new("/app"));
        assert_eq!(info.id, "modal");
        assert_eq!(info.scope_class(), "component-modal");
    }
}
