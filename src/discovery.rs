//! Discovery of pre-split components.
//!
//! Scans directories for files sharing a partial stem (`card.html`,
//! `card.css`, `card.js`) and assembles a resource bag per component id.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::component::Resources;
use crate::identity::ComponentIdentity;

/// Resource key → candidate extensions, tried in order.
pub type TypeMap = BTreeMap<String, Vec<String>>;

pub fn default_type_map() -> TypeMap {
    let mut map = TypeMap::new();
    map.insert("template".to_string(), vec!["html".to_string(), "php".to_string()]);
    map.insert("styles".to_string(), vec!["css".to_string()]);
    map.insert("scripts".to_string(), vec!["js".to_string()]);
    map
}

/// Recursively find all files under `dir`.
fn find_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn assemble_resources(identity: &ComponentIdentity, type_map: &TypeMap) -> Resources {
    let mut resources = Resources::new();
    for (key, extensions) in type_map {
        let found = extensions.iter().find_map(|ext| {
            let mut candidate = identity.partial_stem.clone().into_os_string();
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            candidate.is_file().then_some(candidate)
        });
        if let Some(path) = found {
            resources.insert(key.clone(), Value::String(path.to_string_lossy().into_owned()));
        }
    }
    resources
}

/// Discover components under each location. A location that is a file is
/// its own base. The first location to claim an id wins.
pub fn discover(locations: &[PathBuf], type_map: &TypeMap) -> BTreeMap<String, Resources> {
    let mut components = BTreeMap::new();

    for location in locations {
        let (base, files) = if location.is_dir() {
            (location.clone(), find_files(location))
        } else if location.is_file() {
            let base = location.parent().map(Path::to_path_buf).unwrap_or_default();
            (base, vec![location.clone()])
        } else {
            tracing::warn!("Component location {} does not exist", location.display());
            continue;
        };

        for file in files {
            let identity = ComponentIdentity::new(&file, &base);
            if components.contains_key(&identity.id) {
                continue;
            }
            let resources = assemble_resources(&identity, type_map);
            if !resources.is_empty() {
                components.insert(identity.id, resources);
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_groups_by_partial_stem() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("forms")).unwrap();
        fs::write(dir.path().join("card.html"), "").unwrap();
        fs::write(dir.path().join("card.css"), "").unwrap();
        fs::write(dir.path().join("forms/input.php"), "").unwrap();
        fs::write(dir.path().join("forms/input.js"), "").unwrap();

        let found = discover(&[dir.path().to_path_buf()], &default_type_map());
        assert_eq!(found.len(), 2);

        let card = &found["card"];
        assert!(card["template"].as_str().unwrap().ends_with("card.html"));
        assert!(card["styles"].as_str().unwrap().ends_with("card.css"));
        assert!(!card.contains_key("scripts"));

        let input = &found["forms.input"];
        assert!(input["template"].as_str().unwrap().ends_with("input.php"));
        assert!(input["scripts"].as_str().unwrap().ends_with("input.js"));
    }

    #[test]
    fn test_missing_location_is_skipped() {
        let found = discover(&[PathBuf::from("/no/such/dir")], &default_type_map());
        assert!(found.is_empty());
    }
}
