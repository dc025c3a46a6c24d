//! Checksum parsing and verification (spec.md §4.7 "Download": "the line
//! containing the archive's basename is matched"). Kept as pure,
//! independently-testable functions per spec.md §9's "small line-oriented
//! parsers" guidance, same approach used for `VBoxManage`/`virsh` output.

use crate::error::{Result, UpdateError};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Finds the hex digest on the line of `checksum_text` that names
/// `basename` (the common `sha256sum`-style `<hex>  <filename>` format,
/// one entry per line; also tolerates a bare single-hash file with no
/// filename column).
pub fn find_expected_digest(checksum_text: &str, basename: &str) -> Option<String> {
    for line in checksum_text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.contains(basename) {
            let hex = line.split_whitespace().next()?;
            return Some(hex.to_lowercase());
        }
    }
    // A checksum file containing only the digest, no filename column.
    let mut lines = checksum_text.lines().filter(|l| !l.trim().is_empty());
    match (lines.next(), lines.next()) {
        (Some(only), None) => only.split_whitespace().next().map(str::to_lowercase),
        _ => None,
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Verifies `archive_path`'s digest against the entry in `checksum_text`
/// for its basename. Mismatch or missing entry is fatal (spec.md §4.7,
/// §8 seed scenario).
pub async fn verify(archive_path: &Path, checksum_text: &str) -> Result<()> {
    let basename = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let expected = find_expected_digest(checksum_text, &basename).ok_or_else(|| UpdateError::ChecksumMismatch {
        file: basename.clone(),
        expected: "<no matching entry>".to_string(),
        actual: "n/a".to_string(),
    })?;

    let bytes = tokio::fs::read(archive_path).await?;
    let actual = sha256_hex(&bytes);
    if actual != expected {
        return Err(UpdateError::ChecksumMismatch {
            file: basename,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_digest_on_the_line_naming_the_basename() {
        let text = "deadbeef  portunix-linux-amd64.tar.gz\ncafef00d  other-file.tar.gz\n";
        let digest = find_expected_digest(text, "portunix-linux-amd64.tar.gz").unwrap();
        assert_eq!(digest, "deadbeef");
    }

    #[test]
    fn falls_back_to_a_bare_single_digest_file() {
        let text = "DEADBEEF\n";
        let digest = find_expected_digest(text, "anything.tar.gz").unwrap();
        assert_eq!(digest, "deadbeef");
    }

    #[test]
    fn reports_none_when_no_line_matches_and_more_than_one_entry_exists() {
        let text = "deadbeef  unrelated-one.tar.gz\ncafef00d  unrelated-two.tar.gz\n";
        assert!(find_expected_digest(text, "portunix-linux-amd64.tar.gz").is_none());
    }

    #[tokio::test]
    async fn verify_succeeds_when_the_digest_matches() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("portunix-linux-amd64.tar.gz");
        tokio::fs::write(&archive_path, b"archive-bytes").await.unwrap();
        let digest = sha256_hex(b"archive-bytes");
        let checksum_text = format!("{digest}  portunix-linux-amd64.tar.gz\n");

        verify(&archive_path, &checksum_text).await.unwrap();
    }

    #[tokio::test]
    async fn verify_fails_on_a_digest_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("portunix-linux-amd64.tar.gz");
        tokio::fs::write(&archive_path, b"archive-bytes").await.unwrap();
        let checksum_text = "0000000000000000000000000000000000000000000000000000000000000000  portunix-linux-amd64.tar.gz\n";

        let err = verify(&archive_path, checksum_text).await.unwrap_err();
        assert!(matches!(err, UpdateError::ChecksumMismatch { .. }));
    }
}
