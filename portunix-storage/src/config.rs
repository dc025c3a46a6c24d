//! Storage manager configuration, following the aggregation shape of the
//! teacher's `aerolithdb-core/src/config.rs`: one top-level struct with a
//! `Default` impl giving a working zero-config start, and a `validate()`
//! pass the manager runs before wiring up backends (spec.md §6.2
//! `ValidateConfig`).

use crate::route::Route;
use portunix_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A configured file datastore (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDatastoreConfig {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub format: FileFormatConfig,
    #[serde(default = "default_backup_on_overwrite")]
    pub backup_on_overwrite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormatConfig {
    #[default]
    Json,
    Yaml,
}

fn default_backup_on_overwrite() -> bool {
    true
}

/// A configured remote plugin datastore (spec.md §4.3), resolved at
/// `Initialize` time into an RPC adapter by `portunix-plugin`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginDatastoreConfig {
    pub name: String,
    pub plugin: String,
    /// Forwarded verbatim as the plugin's `Initialize(ctx, settings)`
    /// settings block (spec.md §4.1 "Initialization").
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageManagerConfig {
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub file_datastores: Vec<FileDatastoreConfig>,
    #[serde(default)]
    pub plugin_datastores: Vec<PluginDatastoreConfig>,
}

impl StorageManagerConfig {
    /// Reads `path` and parses it as JSON; if the file does not exist,
    /// writes out and returns [`Self::default`] (teacher:
    /// `aerolithdb-core/src/config.rs`'s `AerolithsConfig::load`).
    pub async fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| ConfigError::Load(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let default = Self::default();
                default.save(path).await?;
                Ok(default)
            }
            Err(e) => Err(ConfigError::Load(e.to_string())),
        }
    }

    /// Serializes this config as pretty-printed JSON to `path`.
    pub async fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Load(e.to_string()))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Validates cross-references and uniqueness constraints before the
    /// manager attempts to construct any backend, per spec.md §6.2.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_datastores = std::collections::HashSet::new();
        for d in &self.file_datastores {
            if d.name.is_empty() {
                return Err(ConfigError::EmptyField { field: "file_datastores[].name" });
            }
            if !seen_datastores.insert(d.name.clone()) {
                return Err(ConfigError::Duplicate {
                    kind: "datastore",
                    name: d.name.clone(),
                });
            }
        }
        for d in &self.plugin_datastores {
            if d.name.is_empty() {
                return Err(ConfigError::EmptyField { field: "plugin_datastores[].name" });
            }
            if !seen_datastores.insert(d.name.clone()) {
                return Err(ConfigError::Duplicate {
                    kind: "datastore",
                    name: d.name.clone(),
                });
            }
        }

        let mut seen_routes = std::collections::HashSet::new();
        for r in &self.routes {
            if r.name.is_empty() {
                return Err(ConfigError::EmptyField { field: "routes[].name" });
            }
            if r.pattern.is_empty() {
                return Err(ConfigError::EmptyField { field: "routes[].pattern" });
            }
            if !seen_routes.insert(r.name.clone()) {
                return Err(ConfigError::Duplicate {
                    kind: "route",
                    name: r.name.clone(),
                });
            }
            if !seen_datastores.contains(&r.datastore) {
                return Err(ConfigError::DanglingReference {
                    kind: "route",
                    name: r.name.clone(),
                    target_kind: "datastore",
                    target: r.datastore.clone(),
                });
            }
        }

        Ok(())
    }
}
