//! Shared helper for shelling out to the backend CLI tools (`VBoxManage`,
//! `virsh`). Kept tiny and adapter-agnostic; the parsing itself lives in
//! each adapter as pure functions per spec.md §9 "External tool output
//! parsing".

use crate::error::VirtError;
use tokio::process::Command;

pub struct CommandOutput {
    pub status_ok: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `tool arg1 arg2 ...`, returning combined output regardless of
/// exit status — callers decide what a failing exit code means (VBox and
/// virsh both report errors in stdout/stderr text as often as via status).
pub async fn run(tool: &'static str, args: &[&str]) -> Result<CommandOutput, VirtError> {
    let output = Command::new(tool)
        .args(args)
        .output()
        .await
        .map_err(|e| VirtError::Io {
            tool,
            cause: e.to_string(),
        })?;
    Ok(CommandOutput {
        status_ok: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// A bare availability probe: does invoking `tool --version` (or
/// equivalent) succeed at all? Used by `Provider::is_available` so a
/// missing binary and a present-but-broken one are both reported as
/// unavailable rather than panicking on spawn failure.
pub async fn probe_version(tool: &'static str, version_arg: &str) -> Option<String> {
    let output = Command::new(tool).arg(version_arg).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    text.lines().next().map(|l| l.trim().to_string())
}
