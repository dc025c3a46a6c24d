//! Archive download (spec.md §4.7 "Download"): streamed to a temp file
//! under a 5-minute ceiling, then checksum-verified.

use crate::checksum;
use crate::error::Result;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Streams `url` into a new temp file under `dir`, named after the
/// trailing path segment of `url` (the archive's basename). Returns the
/// path on success; on any failure the partial file is removed.
pub async fn download_to(http: &reqwest::Client, url: &str, dir: &Path, file_name: &str) -> Result<PathBuf> {
    let dest = dir.join(file_name);
    info!(%url, ?dest, "downloading release asset");

    let result = tokio::time::timeout(DOWNLOAD_TIMEOUT, stream_download(http, url, &dest)).await;
    match result {
        Ok(Ok(())) => Ok(dest),
        Ok(Err(e)) => {
            let _ = tokio::fs::remove_file(&dest).await;
            Err(e)
        }
        Err(_) => {
            let _ = tokio::fs::remove_file(&dest).await;
            Err(anyhow::anyhow!("download of {url} exceeded the 5-minute ceiling").into())
        }
    }
}

async fn stream_download(http: &reqwest::Client, url: &str, dest: &Path) -> Result<()> {
    let response = http.get(url).send().await?.error_for_status()?;
    let mut stream = response.bytes_stream();
    let mut file = tokio::fs::File::create(dest).await?;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

/// Fetches a small text asset (the checksum file) entirely into memory.
pub async fn fetch_text(http: &reqwest::Client, url: &str) -> Result<String> {
    debug!(%url, "fetching checksum asset");
    let text = http.get(url).send().await?.error_for_status()?.text().await?;
    Ok(text)
}

/// Downloads the archive, fetches its checksum asset, and verifies them
/// against each other. Leaves no residual temp file on checksum failure
/// (spec.md §8 seed scenario: "returns `ChecksumMismatch` and leaves no
/// residual temp files").
pub async fn download_and_verify(
    http: &reqwest::Client,
    archive_url: &str,
    checksum_url: &str,
    dir: &Path,
    archive_name: &str,
) -> Result<PathBuf> {
    let archive_path = download_to(http, archive_url, dir, archive_name).await?;
    let checksum_text = fetch_text(http, checksum_url).await?;
    if let Err(e) = checksum::verify(&archive_path, &checksum_text).await {
        let _ = tokio::fs::remove_file(&archive_path).await;
        return Err(e);
    }
    Ok(archive_path)
}
