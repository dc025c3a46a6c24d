//! File datastore backend: one file per key on disk, mirroring the
//! key's slash-separated segments as a directory path (spec.md §4.2,
//! §6.3). Generalizes the teacher's per-tier backend constructors
//! (`LocalSSDCache::new(path)` in `aerolithdb-storage/src/backends.rs`)
//! from a fixed `sled` tree to a plain directory tree, since the spec
//! requires a human-inspectable on-disk format rather than an embedded
//! KV engine.

use crate::backend::{Backend, BackendResult};
use crate::pattern::glob_match;
use crate::query::{filter_records, Query};
use crate::record::{Metadata, Record, Value};
use crate::stats::{BackendHealth, DatastoreStats};
use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// On-disk encoding for record files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    fn extensions(&self) -> &'static [&'static str] {
        match self {
            FileFormat::Json => &["json"],
            FileFormat::Yaml => &["yaml", "yml"],
        }
    }

    fn write_extension(&self) -> &'static str {
        self.extensions()[0]
    }
}

/// Expands a leading `~` or `~/...` to the user's home directory
/// (spec.md §4.2 "`base_path` supports `~` expansion"); any other path
/// is returned unchanged. Pure aside from the `HOME`/`USERPROFILE`
/// environment lookup, so the substitution itself is independently
/// testable.
fn expand_tilde(path: PathBuf) -> PathBuf {
    let Some(path_str) = path.to_str() else {
        return path;
    };
    let Some(rest) = path_str.strip_prefix('~') else {
        return path;
    };
    let Some(home) = home_dir() else {
        return path;
    };
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    if rest.is_empty() {
        home
    } else {
        home.join(rest)
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var_os("USERPROFILE").map(PathBuf::from)
    }
    #[cfg(not(windows))]
    {
        std::env::var_os("HOME").map(PathBuf::from)
    }
}

/// A datastore backed by one file per key on the local filesystem.
/// Key `a/b/c` maps to `<base>/a/b/c.<format>`; forward slashes are
/// translated to the OS separator on the way in and reversed on readback
/// (spec.md §4.2 "On-disk layout").
pub struct FileBackend {
    name: String,
    root: PathBuf,
    format: FileFormat,
    backup_enabled: bool,
}

impl FileBackend {
    pub async fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        format: FileFormat,
        backup_enabled: bool,
    ) -> anyhow::Result<Self> {
        let root = expand_tilde(root.into());
        fs::create_dir_all(&root).await?;
        Ok(Self {
            name: name.into(),
            root,
            format,
            backup_enabled,
        })
    }

    fn path_for_key(&self, key: &str) -> anyhow::Result<PathBuf> {
        if key.is_empty() {
            bail!("key must not be empty");
        }
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == ".." || segment == "." {
                bail!("invalid key segment in '{key}'");
            }
            path.push(segment);
        }
        path.set_extension(self.format.write_extension());
        Ok(path)
    }

    /// Reverses `path_for_key`: strips the root prefix and extension,
    /// rejoining path components with `/` regardless of the host OS
    /// separator (spec.md §6.3).
    fn key_for_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let without_ext = relative.with_extension("");
        let mut segments = Vec::new();
        for component in without_ext.components() {
            segments.push(component.as_os_str().to_str()?.to_string());
        }
        if segments.is_empty() {
            return None;
        }
        Some(segments.join("/"))
    }

    async fn read_record_file(&self, path: &Path) -> anyhow::Result<Option<Record>> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let record: Record = match self.format {
            FileFormat::Json => serde_json::from_str(&contents)?,
            FileFormat::Yaml => serde_yaml::from_str(&contents)?,
        };
        Ok(Some(record))
    }

    /// Writes `<name>.backup.YYYYMMDD-HHMMSS` alongside `path`, same
    /// contents as the file currently on disk (spec.md §6.3).
    async fn write_backup(&self, path: &Path) -> anyhow::Result<()> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("record");
        let backup = path.with_file_name(format!("{file_name}.backup.{stamp}"));
        fs::copy(path, &backup).await?;
        Ok(())
    }

    async fn write_record_file(&self, path: &Path, record: &Record) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let serialized = match self.format {
            FileFormat::Json => serde_json::to_string_pretty(record)?,
            FileFormat::Yaml => serde_yaml::to_string(record)?,
        };
        fs::write(path, serialized).await?;
        Ok(())
    }

    /// Recursively walks `dir` (or the whole store root if `dir` is
    /// `None`), returning every record file path whose extension matches
    /// the configured format.
    async fn walk(&self, dir: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let start = match dir {
            Some(d) => d.to_path_buf(),
            None => self.root.clone(),
        };
        if !fs::try_exists(&start).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut stack = vec![start];
        let mut files = Vec::new();
        while let Some(current) = stack.pop() {
            let mut entries = fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                    if self.format.extensions().contains(&ext) {
                        files.push(path);
                    }
                }
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl Backend for FileBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn store(&self, key: &str, value: Value, metadata: Metadata) -> BackendResult<Record> {
        let path = self.path_for_key(key)?;
        let now = Utc::now();
        let created_at = match self.read_record_file(&path).await? {
            Some(existing) => existing.created_at.or(Some(now)),
            None => Some(now),
        };

        if self.backup_enabled {
            self.write_backup(&path).await?;
        }

        let record = Record {
            key: key.to_string(),
            value,
            metadata,
            created_at,
            updated_at: Some(now),
        };

        self.write_record_file(&path, &record).await?;
        Ok(record)
    }

    async fn retrieve(&self, key: &str) -> BackendResult<Option<Record>> {
        let path = self.path_for_key(key)?;
        self.read_record_file(&path).await
    }

    async fn delete(&self, key: &str) -> BackendResult<bool> {
        let path = self.path_for_key(key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(false);
        }
        if self.backup_enabled {
            self.write_backup(&path).await?;
        }
        fs::remove_file(&path).await?;
        Ok(true)
    }

    async fn list(&self, glob: &str) -> BackendResult<Vec<Record>> {
        let files = self.walk(None).await?;
        let mut records = Vec::new();
        for path in files {
            let key = match self.key_for_path(&path) {
                Some(k) => k,
                None => continue,
            };
            if !glob_match(glob, &key) {
                continue;
            }
            if let Some(record) = self.read_record_file(&path).await? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn query(&self, query: &Query) -> BackendResult<Vec<Record>> {
        let dir = match &query.collection {
            Some(collection) if !collection.is_empty() => Some(self.root.join(collection)),
            _ => None,
        };
        let files = self.walk(dir.as_deref()).await?;
        let mut records = Vec::new();
        for path in files {
            if let Some(record) = self.read_record_file(&path).await? {
                records.push(record);
            }
        }
        Ok(filter_records(query, records))
    }

    async fn health(&self) -> BackendResult<BackendHealth> {
        if fs::try_exists(&self.root).await.unwrap_or(false) {
            Ok(BackendHealth::ok())
        } else {
            Ok(BackendHealth::error(format!(
                "base path {} does not exist",
                self.root.display()
            )))
        }
    }

    async fn stats(&self) -> BackendResult<DatastoreStats> {
        let files = self.walk(None).await?;
        let mut bytes_stored = 0u64;
        let mut collections: HashMap<String, u64> = HashMap::new();
        for path in &files {
            if let Ok(meta) = fs::metadata(path).await {
                bytes_stored += meta.len();
            }
            if let Ok(relative) = path.strip_prefix(&self.root) {
                if let Some(top) = relative.components().next() {
                    if let Some(name) = top.as_os_str().to_str() {
                        *collections.entry(name.to_string()).or_insert(0) += 1;
                    }
                }
            }
        }
        Ok(DatastoreStats {
            record_count: files.len() as u64,
            bytes_stored,
            collections,
            latency: HashMap::new(),
            last_updated: Some(Utc::now()),
        })
    }

    async fn shutdown(&self) -> BackendResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn backend() -> (FileBackend, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new("test", dir.path(), FileFormat::Json, true)
            .await
            .unwrap();
        (backend, dir)
    }

    #[test]
    fn bare_tilde_expands_to_home() {
        if let Some(home) = home_dir() {
            assert_eq!(expand_tilde(PathBuf::from("~")), home);
        }
    }

    #[test]
    fn tilde_slash_expands_and_joins_the_remainder() {
        if let Some(home) = home_dir() {
            assert_eq!(expand_tilde(PathBuf::from("~/data/db")), home.join("data/db"));
        }
    }

    #[test]
    fn non_tilde_path_is_unchanged() {
        assert_eq!(expand_tilde(PathBuf::from("/var/lib/portunix")), PathBuf::from("/var/lib/portunix"));
        assert_eq!(expand_tilde(PathBuf::from("relative/path")), PathBuf::from("relative/path"));
    }

    #[test]
    fn embedded_tilde_is_not_expanded() {
        assert_eq!(expand_tilde(PathBuf::from("/foo/~bar")), PathBuf::from("/foo/~bar"));
    }

    #[tokio::test]
    async fn store_then_retrieve_round_trips() {
        let (backend, _dir) = backend().await;
        let mut metadata = Metadata::new();
        metadata.insert("tag".to_string(), json!("x"));
        backend
            .store("a/b", Value::Text("hello".into()), metadata.clone())
            .await
            .unwrap();

        let fetched = backend.retrieve("a/b").await.unwrap().unwrap();
        assert_eq!(fetched.value, Value::Text("hello".into()));
        assert_eq!(fetched.metadata.get("tag"), Some(&json!("x")));
        assert!(fetched.created_at.is_some());
    }

    #[tokio::test]
    async fn nested_key_maps_to_nested_path() {
        let (backend, dir) = backend().await;
        backend
            .store("a/b/c", Value::Text("v".into()), Metadata::new())
            .await
            .unwrap();
        assert!(dir.path().join("a").join("b").join("c.json").exists());
    }

    #[tokio::test]
    async fn created_at_preserved_across_updates() {
        let (backend, _dir) = backend().await;
        backend
            .store("k1", Value::Text("v1".into()), Metadata::new())
            .await
            .unwrap();
        let first = backend.retrieve("k1").await.unwrap().unwrap();

        backend
            .store("k1", Value::Text("v2".into()), Metadata::new())
            .await
            .unwrap();
        let second = backend.retrieve("k1").await.unwrap().unwrap();

        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let (backend, _dir) = backend().await;
        backend
            .store("k1", Value::Text("v".into()), Metadata::new())
            .await
            .unwrap();
        assert!(backend.delete("k1").await.unwrap());
        assert!(backend.retrieve("k1").await.unwrap().is_none());
        assert!(!backend.delete("k1").await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_by_glob() {
        let (backend, _dir) = backend().await;
        backend
            .store("users/1", Value::Text("a".into()), Metadata::new())
            .await
            .unwrap();
        backend
            .store("orders/1", Value::Text("b".into()), Metadata::new())
            .await
            .unwrap();

        let users = backend.list("users/*").await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].key, "users/1");
    }

    #[tokio::test]
    async fn glob_list_matches_seed_scenario() {
        let (backend, _dir) = backend().await;
        backend
            .store("a/b", Value::Text("1".into()), Metadata::new())
            .await
            .unwrap();
        backend
            .store("a/c", Value::Text("2".into()), Metadata::new())
            .await
            .unwrap();
        backend
            .store("x/y", Value::Text("3".into()), Metadata::new())
            .await
            .unwrap();

        let mut keys: Vec<String> = backend
            .list("a/*")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["a/b".to_string(), "a/c".to_string()]);
    }

    #[tokio::test]
    async fn backup_created_on_overwrite_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new("test", dir.path(), FileFormat::Json, true)
            .await
            .unwrap();
        backend
            .store("k1", Value::Text("v1".into()), Metadata::new())
            .await
            .unwrap();
        backend
            .store("k1", Value::Text("v2".into()), Metadata::new())
            .await
            .unwrap();

        let mut saw_backup = false;
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            if entry.path().to_string_lossy().contains(".backup.") {
                saw_backup = true;
            }
        }
        assert!(saw_backup);
    }

    #[tokio::test]
    async fn no_backup_when_disabled_and_key_is_new() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new("test", dir.path(), FileFormat::Json, false)
            .await
            .unwrap();
        backend
            .store("k1", Value::Text("v1".into()), Metadata::new())
            .await
            .unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn rejects_path_traversal_segments() {
        let (backend, _dir) = backend().await;
        let err = backend
            .store("../escape", Value::Text("v".into()), Metadata::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid key segment"));
    }

    #[tokio::test]
    async fn stats_counts_records_and_collections() {
        let (backend, _dir) = backend().await;
        backend
            .store("users/1", Value::Text("a".into()), Metadata::new())
            .await
            .unwrap();
        backend
            .store("users/2", Value::Text("b".into()), Metadata::new())
            .await
            .unwrap();
        backend
            .store("orders/1", Value::Text("c".into()), Metadata::new())
            .await
            .unwrap();

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.record_count, 3);
        assert_eq!(stats.collections.get("users"), Some(&2));
        assert_eq!(stats.collections.get("orders"), Some(&1));
    }
}
