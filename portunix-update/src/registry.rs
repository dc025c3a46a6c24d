//! Release registry client (spec.md §4.7 "Discovery", §6.6): GitHub
//! Releases semantics over plain HTTPS JSON, grounded in the teacher's
//! `aerolithdb-cli/src/client.rs` `Client::builder()...timeout(...).build()`
//! construction and per-request `get`/`debug!` logging style.

use crate::error::{Result, UpdateError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Release {
    pub tag_name: String,
    pub published_at: chrono::DateTime<chrono::Utc>,
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Binary asset for `os`/`arch`: `portunix-<os>-<arch>.{zip|tar.gz}`
    /// (spec.md §6.6).
    pub fn find_binary_asset(&self, os: &str, arch: &str) -> Result<&ReleaseAsset> {
        let extensions: &[&str] = if os == "windows" { &["zip"] } else { &["tar.gz"] };
        self.assets
            .iter()
            .find(|asset| {
                extensions
                    .iter()
                    .any(|ext| asset.name == format!("portunix-{os}-{arch}.{ext}"))
            })
            .ok_or_else(|| UpdateError::MissingAsset {
                tag: self.tag_name.clone(),
                kind: "binary",
                pattern: format!("portunix-{os}-{arch}.{{zip,tar.gz}}"),
            })
    }

    /// Checksum asset deriving from the same stem as `binary_asset`
    /// (spec.md §6.6: "the implementation derives both from the tag").
    pub fn find_checksum_asset(&self, binary_asset: &ReleaseAsset) -> Result<&ReleaseAsset> {
        self.assets
            .iter()
            .find(|asset| asset.name.starts_with(&binary_asset.name) && asset.name != binary_asset.name)
            .ok_or_else(|| UpdateError::MissingAsset {
                tag: self.tag_name.clone(),
                kind: "checksum",
                pattern: format!("{}.sha256", binary_asset.name),
            })
    }
}

/// Talks to a GitHub-Releases-shaped HTTPS endpoint. `base_url` is the
/// repository API root, e.g. `https://api.github.com/repos/portunix/portunix`.
#[derive(Debug, Clone)]
pub struct ReleaseRegistryClient {
    http: reqwest::Client,
    base_url: String,
}

impl ReleaseRegistryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent("portunix-update/0.1.0")
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// `/releases/latest`; on `404`, falls back to `/releases` and picks
    /// the first entry (spec.md §4.7 "Discovery").
    pub async fn latest(&self) -> Result<Release> {
        let url = format!("{}/releases/latest", self.base_url);
        debug!(%url, "fetching latest release");
        let response = self.http.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return self.most_recent_from_list().await;
        }
        let release = response.error_for_status()?.json::<Release>().await?;
        Ok(release)
    }

    async fn most_recent_from_list(&self) -> Result<Release> {
        let url = format!("{}/releases", self.base_url);
        debug!(%url, "falling back to release list");
        let releases: Vec<Release> = self.http.get(&url).send().await?.error_for_status()?.json().await?;
        releases
            .into_iter()
            .next()
            .ok_or_else(|| UpdateError::NotFound("registry returned no releases".to_string()))
    }

    /// `/releases/tags/<tag>` (spec.md §4.7 "Discovery").
    pub async fn by_tag(&self, tag: &str) -> Result<Release> {
        let url = format!("{}/releases/tags/{tag}", self.base_url);
        debug!(%url, "fetching release by tag");
        let response = self.http.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(UpdateError::NotFound(format!("no release tagged {tag}")));
        }
        let release = response.error_for_status()?.json::<Release>().await?;
        Ok(release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(assets: Vec<(&str, &str)>) -> Release {
        Release {
            tag_name: "v1.2.3".to_string(),
            published_at: chrono::Utc::now(),
            assets: assets
                .into_iter()
                .map(|(name, url)| ReleaseAsset {
                    name: name.to_string(),
                    browser_download_url: url.to_string(),
                    size: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn finds_the_linux_tar_gz_binary_asset() {
        let release = release(vec![
            ("portunix-linux-amd64.tar.gz", "https://example.com/a"),
            ("portunix-linux-amd64.tar.gz.sha256", "https://example.com/b"),
        ]);
        let asset = release.find_binary_asset("linux", "amd64").unwrap();
        assert_eq!(asset.name, "portunix-linux-amd64.tar.gz");
    }

    #[test]
    fn finds_the_windows_zip_binary_asset() {
        let release = release(vec![("portunix-windows-amd64.zip", "https://example.com/a")]);
        let asset = release.find_binary_asset("windows", "amd64").unwrap();
        assert_eq!(asset.name, "portunix-windows-amd64.zip");
    }

    #[test]
    fn missing_binary_asset_is_reported() {
        let release = release(vec![("portunix-macos-amd64.tar.gz", "https://example.com/a")]);
        let err = release.find_binary_asset("linux", "amd64").unwrap_err();
        assert!(matches!(err, UpdateError::MissingAsset { kind: "binary", .. }));
    }

    #[test]
    fn finds_the_checksum_asset_sharing_the_binary_stem() {
        let release = release(vec![
            ("portunix-linux-amd64.tar.gz", "https://example.com/a"),
            ("portunix-linux-amd64.tar.gz.sha256", "https://example.com/b"),
        ]);
        let binary = release.find_binary_asset("linux", "amd64").unwrap();
        let checksum = release.find_checksum_asset(binary).unwrap();
        assert_eq!(checksum.name, "portunix-linux-amd64.tar.gz.sha256");
    }
}
