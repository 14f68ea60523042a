//! Persistent compile cache.
//!
//! Two JSON maps live in the cache directory next to the artifacts:
//! `_component-map.json` (component id → owning source + section kind →
//! artifact path) and
//! `_cache-map.json` (source path → dependencies + last build time). They
//! are loaded when the store opens and written back by [`CacheStore::persist`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::error::CompileError;

pub const COMPONENT_MAP_FILE: &str = "_component-map.json";
pub const CACHE_MAP_FILE: &str = "_cache-map.json";

/// Section kind → artifact path.
pub type ArtifactMap = BTreeMap<String, PathBuf>;
pub type ComponentMap = BTreeMap<String, ComponentEntry>;
pub type CacheMap = BTreeMap<String, CacheEntry>;

/// Artifacts of one component id and the source they were built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentEntry {
    pub source_path: PathBuf,
    pub artifacts: ArtifactMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub source_path: PathBuf,
    /// The source itself plus every external section file.
    pub dependencies: BTreeSet<PathBuf>,
    pub last_build: SystemTime,
}

impl CacheEntry {
    fn fresh(source: &Path) -> Self {
        CacheEntry {
            source_path: source.to_path_buf(),
            dependencies: BTreeSet::from([source.to_path_buf()]),
            last_build: SystemTime::UNIX_EPOCH,
        }
    }

    /// True iff every dependency exists and is not newer than the last build.
    pub fn is_current(&self) -> bool {
        self.dependencies.iter().all(|dep| match modified(dep) {
            Some(mtime) => mtime <= self.last_build,
            None => false,
        })
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn key(source: &Path) -> String {
    source.to_string_lossy().into_owned()
}

/// Map contents at the start of a batch, used to skip redundant writes.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    component_map: ComponentMap,
    cache_map: CacheMap,
}

pub struct CacheStore {
    cache_dir: PathBuf,
    component_map: ComponentMap,
    cache_map: CacheMap,
}

impl CacheStore {
    /// Open (creating if needed) the cache directory and load both maps.
    pub fn open(cache_dir: &Path) -> Result<Self, CompileError> {
        if !cache_dir.exists() {
            fs::create_dir_all(cache_dir).map_err(|e| CompileError::io(cache_dir, e))?;
        }
        let cache_dir = fs::canonicalize(cache_dir).map_err(|e| CompileError::io(cache_dir, e))?;

        let component_map = load_map(&cache_dir.join(COMPONENT_MAP_FILE));
        let cache_map = load_map(&cache_dir.join(CACHE_MAP_FILE));

        Ok(CacheStore {
            cache_dir,
            component_map,
            cache_map,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn component_map(&self) -> &ComponentMap {
        &self.component_map
    }

    pub fn cache_map(&self) -> &CacheMap {
        &self.cache_map
    }

    pub fn artifacts(&self, id: &str) -> Option<&ArtifactMap> {
        self.component_map.get(id).map(|c| &c.artifacts)
    }

    pub fn entry(&self, source: &Path) -> Option<&CacheEntry> {
        self.cache_map.get(&key(source))
    }

    /// Whether the cached artifacts of `id` built from `source` can be reused.
    /// Artifacts recorded for `id` by a different source never are.
    pub fn validate(&self, id: &str, source: &Path, ignore_cache_time: bool) -> bool {
        let Some(component) = self.component_map.get(id) else {
            return false;
        };
        if component.source_path != source {
            return false;
        }
        let artifacts = &component.artifacts;
        let Some(entry) = self.cache_map.get(&key(source)) else {
            return false;
        };
        if artifacts.values().any(|p| !p.is_file()) {
            return false;
        }
        ignore_cache_time || entry.is_current()
    }

    /// Reset the entry for `source` ahead of a rebuild.
    pub fn begin(&mut self, source: &Path) {
        self.cache_map.insert(key(source), CacheEntry::fresh(source));
    }

    pub fn add_dependency(&mut self, source: &Path, dependency: &Path) {
        self.cache_map
            .entry(key(source))
            .or_insert_with(|| CacheEntry::fresh(source))
            .dependencies
            .insert(dependency.to_path_buf());
    }

    /// Drop any entry for `source`.
    pub fn forget(&mut self, source: &Path) {
        self.cache_map.remove(&key(source));
    }

    /// Write one artifact and advance the build time of `source`'s entry to
    /// the artifact's modification time.
    pub fn write_artifact(
        &mut self,
        source: &Path,
        file_name: &str,
        content: &str,
    ) -> Result<PathBuf, CompileError> {
        let path = self.cache_dir.join(file_name);
        fs::write(&path, content).map_err(|e| CompileError::CacheWrite {
            path: path.clone(),
            source: e,
        })?;

        let mtime = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| CompileError::CacheWrite {
                path: path.clone(),
                source: e,
            })?;
        self.cache_map
            .entry(key(source))
            .or_insert_with(|| CacheEntry::fresh(source))
            .last_build = mtime;

        tracing::debug!("Wrote artifact {}", path.display());
        Ok(path)
    }

    pub fn record_component(&mut self, id: &str, source: &Path, artifacts: ArtifactMap) {
        self.component_map.insert(
            id.to_string(),
            ComponentEntry {
                source_path: source.to_path_buf(),
                artifacts,
            },
        );
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            component_map: self.component_map.clone(),
            cache_map: self.cache_map.clone(),
        }
    }

    /// Write whichever map differs from `since`. Returns whether anything was written.
    pub fn persist(&self, since: &CacheSnapshot) -> Result<bool, CompileError> {
        let mut written = false;
        if self.cache_map != since.cache_map {
            save_map(&self.cache_dir.join(CACHE_MAP_FILE), &self.cache_map)?;
            written = true;
        }
        if self.component_map != since.component_map {
            save_map(&self.cache_dir.join(COMPONENT_MAP_FILE), &self.component_map)?;
            written = true;
        }
        Ok(written)
    }

    /// Empty both maps and delete everything inside the cache directory.
    pub fn clear(&mut self) -> Result<(), CompileError> {
        self.component_map.clear();
        self.cache_map.clear();

        for entry in WalkDir::new(&self.cache_dir).min_depth(1).contents_first(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.cache_dir.clone());
                CompileError::io(&path, e.into())
            })?;
            let path = entry.path();
            let result = if entry.file_type().is_dir() {
                fs::remove_dir(path)
            } else {
                fs::remove_file(path)
            };
            result.map_err(|e| CompileError::io(path, e))?;
        }

        tracing::info!("Cleared component cache {}", self.cache_dir.display());
        Ok(())
    }
}

fn load_map<T: Default + serde::de::DeserializeOwned>(path: &Path) -> T {
    let data = match fs::read_to_string(path) {
        Ok(d) => d,
        Err(_) => return T::default(),
    };

    match serde_json::from_str(&data) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!("Discarding corrupt cache map {}: {}", path.display(), e);
            fs::remove_file(path).ok();
            T::default()
        }
    }
}

fn save_map<T: Serialize>(path: &Path, map: &T) -> Result<(), CompileError> {
    let data = serde_json::to_string_pretty(map).map_err(|source| CompileError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, data).map_err(|source| CompileError::CacheWrite {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch_future(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs)).unwrap();
    }

    #[test]
    fn test_validate_requires_both_maps() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.vue");
        fs::write(&source, "<template></template>").unwrap();
        let mut store = CacheStore::open(&dir.path().join("cache")).unwrap();

        assert!(!store.validate("a", &source, false));

        store.begin(&source);
        let artifact = store.write_artifact(&source, "a.html", "<div></div>").unwrap();
        assert!(!store.validate("a", &source, false));

        store.record_component("a", &source, ArtifactMap::from([("template".to_string(), artifact)]));
        assert!(store.validate("a", &source, false));
    }

    #[test]
    fn test_artifacts_of_another_source_are_not_reused() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a/button.vue");
        let b = dir.path().join("b/button.vue");
        fs::create_dir_all(a.parent().unwrap()).unwrap();
        fs::create_dir_all(b.parent().unwrap()).unwrap();
        fs::write(&a, "").unwrap();
        fs::write(&b, "").unwrap();

        let mut store = CacheStore::open(&dir.path().join("cache")).unwrap();
        for (i, source) in [&a, &b].into_iter().enumerate() {
            store.begin(source);
            let artifact = store.write_artifact(source, &format!("button-{}.html", i), "").unwrap();
            store.record_component("button", source, ArtifactMap::from([("template".to_string(), artifact)]));
        }

        assert!(store.validate("button", &b, false));
        assert!(!store.validate("button", &a, false));
        assert!(!store.validate("button", &a, true));
    }

    #[test]
    fn test_newer_dependency_invalidates_unless_ignored() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.vue");
        let external = dir.path().join("a.css");
        fs::write(&source, "").unwrap();
        fs::write(&external, "").unwrap();

        let mut store = CacheStore::open(&dir.path().join("cache")).unwrap();
        store.begin(&source);
        store.add_dependency(&source, &external);
        let artifact = store.write_artifact(&source, "a.css", "").unwrap();
        store.record_component("a", &source, ArtifactMap::from([("style".to_string(), artifact)]));
        assert!(store.validate("a", &source, false));

        touch_future(&external, 60);
        assert!(!store.validate("a", &source, false));
        assert!(store.validate("a", &source, true));
    }

    #[test]
    fn test_missing_artifact_invalidates() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.vue");
        fs::write(&source, "").unwrap();

        let mut store = CacheStore::open(&dir.path().join("cache")).unwrap();
        store.begin(&source);
        let artifact = store.write_artifact(&source, "a.js", "").unwrap();
        store.record_component("a", &source, ArtifactMap::from([("script".to_string(), artifact.clone())]));
        assert!(store.validate("a", &source, true));

        fs::remove_file(&artifact).unwrap();
        assert!(!store.validate("a", &source, true));
    }

    #[test]
    fn test_persist_only_when_changed_and_reload() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("cache");
        let source = dir.path().join("a.vue");
        fs::write(&source, "").unwrap();

        let mut store = CacheStore::open(&cache_dir).unwrap();
        let snapshot = store.snapshot();
        assert!(!store.persist(&snapshot).unwrap());
        assert!(!cache_dir.join(CACHE_MAP_FILE).exists());

        store.begin(&source);
        let artifact = store.write_artifact(&source, "a.js", "x").unwrap();
        store.record_component("a", &source, ArtifactMap::from([("script".to_string(), artifact)]));
        assert!(store.persist(&snapshot).unwrap());

        let reopened = CacheStore::open(&cache_dir).unwrap();
        assert_eq!(reopened.component_map(), store.component_map());
        assert_eq!(reopened.cache_map(), store.cache_map());
    }

    #[test]
    fn test_corrupt_map_is_discarded() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("cache");
        fs::create_dir_all(&cache_dir).unwrap();
        fs::write(cache_dir.join(CACHE_MAP_FILE), "{not json").unwrap();

        let store = CacheStore::open(&cache_dir).unwrap();
        assert!(store.cache_map().is_empty());
        assert!(!cache_dir.join(CACHE_MAP_FILE).exists());
    }

    #[test]
    fn test_clear_removes_everything() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("cache");
        let source = dir.path().join("a.vue");
        fs::write(&source, "").unwrap();

        let mut store = CacheStore::open(&cache_dir).unwrap();
        store.begin(&source);
        store.write_artifact(&source, "a.js", "x").unwrap();
        fs::create_dir_all(cache_dir.join("nested")).unwrap();
        fs::write(cache_dir.join("nested/old.css"), "").unwrap();

        store.clear().unwrap();
        assert!(store.cache_map().is_empty());
        assert_eq!(fs::read_dir(&cache_dir).unwrap().count(), 0);
    }
}
