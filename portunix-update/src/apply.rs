//! Applying an update (spec.md §4.7 "Apply", "Platform atomicity",
//! "Rollback"): stage, backup, atomically replace, and roll back on any
//! per-binary failure.

use crate::error::{Result, UpdateError};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One binary to place: `new_binary` (extracted, already executable)
/// replaces the live file at `target`.
pub struct ApplyTarget {
    pub target: PathBuf,
    pub new_binary: PathBuf,
}

fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".backup");
    PathBuf::from(name)
}

/// Applies every target. On any per-binary failure, every backup already
/// taken this call is restored and removed before returning the error
/// (spec.md §8 seed scenario 6). On full success, all backups are
/// removed, leaving only the new binaries in place.
pub async fn apply_all(targets: &[ApplyTarget]) -> Result<()> {
    let mut backed_up: Vec<&ApplyTarget> = Vec::new();

    for target in targets {
        if let Err(e) = apply_one(target, &mut backed_up).await {
            warn!(target = %target.target.display(), error = %e, "update failed, rolling back");
            rollback(&backed_up).await;
            return Err(e);
        }
    }

    for target in &backed_up {
        let _ = tokio::fs::remove_file(backup_path(&target.target)).await;
    }
    info!(count = targets.len(), "update applied");
    Ok(())
}

async fn apply_one<'a>(target: &'a ApplyTarget, backed_up: &mut Vec<&'a ApplyTarget>) -> Result<()> {
    if tokio::fs::try_exists(&target.target).await? {
        tokio::fs::copy(&target.target, backup_path(&target.target)).await?;
        backed_up.push(target);
    }
    replace_atomic(&target.target, &target.new_binary)
        .await
        .map_err(|e| UpdateError::ApplyFailed {
            binary: target.target.display().to_string(),
            cause: e.to_string(),
        })
}

async fn rollback(backed_up: &[&ApplyTarget]) {
    for target in backed_up {
        let backup = backup_path(&target.target);
        if let Err(e) = restore_backup(&target.target).await {
            warn!(target = %target.target.display(), error = %e, "failed to restore backup during rollback");
            continue;
        }
        let _ = tokio::fs::remove_file(&backup).await;
    }
}

/// Public rollback entry point (spec.md §4.7 "Rollback"): restores
/// `target`'s `.backup` sibling over the live file.
pub async fn restore_backup(target: &Path) -> Result<()> {
    let backup = backup_path(target);
    restore_atomic(target, &backup).await
}

#[cfg(unix)]
async fn replace_atomic(target: &Path, new_binary: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let dir = target.parent().ok_or_else(|| anyhow::anyhow!("target has no parent directory"))?;
    let bytes = tokio::fs::read(new_binary).await?;
    let temp = tempfile::NamedTempFile::new_in(dir)?;
    tokio::fs::write(temp.path(), &bytes).await?;
    let mut perms = std::fs::metadata(temp.path())?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(temp.path(), perms)?;
    tokio::fs::rename(temp.path(), target).await?;
    // `temp`'s path was just renamed away; dropping it is a harmless no-op.
    Ok(())
}

#[cfg(unix)]
async fn restore_atomic(target: &Path, backup: &Path) -> Result<()> {
    if tokio::fs::try_exists(backup).await? {
        tokio::fs::copy(backup, target).await?;
    }
    Ok(())
}

#[cfg(windows)]
async fn replace_atomic(target: &Path, new_binary: &Path) -> anyhow::Result<()> {
    let new_path = with_suffix(target, "new");
    let old_path = with_suffix(target, "old");

    tokio::fs::copy(new_binary, &new_path).await?;

    if tokio::fs::try_exists(target).await? {
        if let Err(e) = tokio::fs::rename(target, &old_path).await {
            let _ = tokio::fs::remove_file(&new_path).await;
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                let script = write_powershell_fallback(target, new_binary)?;
                return Err(UpdateError::NeedsElevation {
                    path: target.display().to_string(),
                    script_path: script.display().to_string(),
                }
                .into());
            }
            return Err(e.into());
        }
    }

    if let Err(e) = tokio::fs::rename(&new_path, target).await {
        if tokio::fs::try_exists(&old_path).await.unwrap_or(false) {
            let _ = tokio::fs::rename(&old_path, target).await;
        }
        return Err(e.into());
    }
    let _ = tokio::fs::remove_file(&old_path).await;
    Ok(())
}

#[cfg(windows)]
async fn restore_atomic(target: &Path, backup: &Path) -> Result<()> {
    if tokio::fs::try_exists(backup).await? {
        tokio::fs::copy(backup, target).await?;
    }
    Ok(())
}

#[cfg(windows)]
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(windows)]
fn write_powershell_fallback(target: &Path, new_binary: &Path) -> std::io::Result<PathBuf> {
    let script_path = with_suffix(target, "update.ps1");
    let script = format!(
        "Copy-Item -Force '{}' '{}'\n",
        new_binary.display(),
        target.display()
    );
    std::fs::write(&script_path, script)?;
    Ok(script_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_apply_replaces_bytes_and_leaves_no_backups() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("portunix");
        tokio::fs::write(&target, b"old").await.unwrap();
        let new_binary = dir.path().join("new-portunix");
        tokio::fs::write(&new_binary, b"new").await.unwrap();

        apply_all(&[ApplyTarget {
            target: target.clone(),
            new_binary,
        }])
        .await
        .unwrap();

        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"new");
        assert!(!backup_path(&target).exists());
    }

    #[tokio::test]
    async fn first_time_install_with_no_live_binary_creates_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("portunix");
        let new_binary = dir.path().join("new-portunix");
        tokio::fs::write(&new_binary, b"new").await.unwrap();

        apply_all(&[ApplyTarget {
            target: target.clone(),
            new_binary,
        }])
        .await
        .unwrap();

        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"new");
        assert!(!backup_path(&target).exists());
    }

    #[tokio::test]
    async fn a_failure_on_the_second_binary_rolls_back_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let primary_target = dir.path().join("portunix");
        tokio::fs::write(&primary_target, b"original-primary").await.unwrap();
        let primary_new = dir.path().join("new-portunix");
        tokio::fs::write(&primary_new, b"updated-primary").await.unwrap();

        let helper_target = dir.path().join("ptx-container");
        tokio::fs::write(&helper_target, b"original-helper").await.unwrap();
        // Point at a nonexistent source so the copy step fails deterministically.
        let helper_new = dir.path().join("does-not-exist");

        let err = apply_all(&[
            ApplyTarget {
                target: primary_target.clone(),
                new_binary: primary_new,
            },
            ApplyTarget {
                target: helper_target.clone(),
                new_binary: helper_new,
            },
        ])
        .await
        .unwrap_err();

        assert!(matches!(err, UpdateError::ApplyFailed { .. }));
        assert_eq!(tokio::fs::read(&primary_target).await.unwrap(), b"original-primary");
        assert_eq!(tokio::fs::read(&helper_target).await.unwrap(), b"original-helper");
        assert!(!backup_path(&primary_target).exists());
        assert!(!backup_path(&helper_target).exists());
    }

    #[tokio::test]
    async fn restore_backup_is_a_no_op_when_no_backup_exists() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("portunix");
        tokio::fs::write(&target, b"current").await.unwrap();

        restore_backup(&target).await.unwrap();
        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"current");
    }
}
