//! Self-update orchestration (spec.md §4.7): discovery, download+verify,
//! extraction, and apply, wired into the `NewX(config) -> Result<X,
//! ConfigError>` + `Initialize`/`Close` contract every Core service
//! exposes (spec.md §6.1). The engine runs to completion per invocation
//! rather than as a long-lived service (spec.md §4 "Lifecycles"), so both
//! lifecycle hooks are no-ops.

use crate::archive::{self, ExtractedBinaries};
use crate::apply::{self, ApplyTarget};
use crate::download;
use crate::error::{Result, UpdateError};
use crate::registry::{Release, ReleaseRegistryClient};
use async_trait::async_trait;
use portunix_core::lifecycle::CoreService;
use portunix_core::ConfigError;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Registry base URL, e.g. `https://api.github.com/repos/portunix/portunix`.
    pub registry_base_url: String,
    pub os: String,
    pub arch: String,
    /// Name of the primary (mandatory) binary inside the archive.
    pub primary_binary_name: String,
    /// Names of optional helper binaries also shipped in the archive.
    pub helper_binary_names: Vec<String>,
}

impl UpdaterConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.registry_base_url.trim().is_empty() {
            return Err(ConfigError::EmptyField { field: "registry_base_url" });
        }
        if self.os.trim().is_empty() {
            return Err(ConfigError::EmptyField { field: "os" });
        }
        if self.arch.trim().is_empty() {
            return Err(ConfigError::EmptyField { field: "arch" });
        }
        if self.primary_binary_name.trim().is_empty() {
            return Err(ConfigError::EmptyField { field: "primary_binary_name" });
        }
        Ok(())
    }
}

pub struct DownloadedUpdate {
    pub release: Release,
    staging_dir: tempfile::TempDir,
    extracted: ExtractedBinaries,
}

pub struct SelfUpdater {
    config: UpdaterConfig,
    http: reqwest::Client,
    registry: ReleaseRegistryClient,
}

impl SelfUpdater {
    pub fn new(config: UpdaterConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let registry = ReleaseRegistryClient::new(config.registry_base_url.clone())
            .map_err(|e| ConfigError::InvalidValue {
                field: "registry_base_url",
                reason: e.to_string(),
            })?;
        Ok(Self {
            http: reqwest::Client::new(),
            registry,
            config,
        })
    }

    /// `version = None` asks the registry for the latest release
    /// (falling back to the most recent in the list); `Some(tag)` asks
    /// for that exact tag (spec.md §4.7 "Discovery").
    pub async fn check_for_update(&self, version: Option<&str>) -> Result<Release> {
        match version {
            Some(tag) => self.registry.by_tag(tag).await,
            None => self.registry.latest().await,
        }
    }

    /// Downloads the release's archive and checksum, verifies them
    /// against each other, and extracts the primary and any present
    /// helper binaries into a fresh staging directory.
    pub async fn download_update(&self, release: Release) -> Result<DownloadedUpdate> {
        let binary_asset = release.find_binary_asset(&self.config.os, &self.config.arch)?.clone();
        let checksum_asset = release.find_checksum_asset(&binary_asset)?.clone();

        let staging_dir = tempfile::tempdir()?;
        let archive_path = download::download_and_verify(
            &self.http,
            &binary_asset.browser_download_url,
            &checksum_asset.browser_download_url,
            staging_dir.path(),
            &binary_asset.name,
        )
        .await?;

        let helper_refs: Vec<&str> = self.config.helper_binary_names.iter().map(String::as_str).collect();
        let extracted = archive::extract(
            &archive_path,
            staging_dir.path(),
            &self.config.primary_binary_name,
            &helper_refs,
        )?;

        Ok(DownloadedUpdate {
            release,
            staging_dir,
            extracted,
        })
    }

    /// Applies a downloaded update: `primary_target` is the path to the
    /// currently-running binary; `helper_targets` maps each helper
    /// binary's name to its live installed path.
    pub async fn apply_update(
        &self,
        downloaded: &DownloadedUpdate,
        primary_target: &Path,
        helper_targets: &[(String, PathBuf)],
    ) -> Result<()> {
        let mut targets = vec![ApplyTarget {
            target: primary_target.to_path_buf(),
            new_binary: downloaded.extracted.primary.clone(),
        }];
        for (name, live_path) in helper_targets {
            if let Some(new_binary) = downloaded.extracted.helpers.get(name) {
                targets.push(ApplyTarget {
                    target: live_path.clone(),
                    new_binary: new_binary.clone(),
                });
            }
        }
        apply::apply_all(&targets).await
    }

    /// Reverses the last apply for a single binary (spec.md §4.7
    /// "Rollback").
    pub async fn restore_backup(&self, path: &Path) -> Result<()> {
        apply::restore_backup(path).await
    }
}

#[async_trait]
impl CoreService for SelfUpdater {
    type Error = UpdateError;

    /// The updater has no standing resources to acquire; everything runs
    /// to completion within each `check_for_update`/`download_update`/
    /// `apply_update` call.
    async fn initialize(&self, _cancel: CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
