//! VirtualBox adapter (spec.md §4.5 "VirtualBox adapter"), driving
//! `VBoxManage`. Output parsing is implemented as pure functions per
//! spec.md §9's "External tool output parsing" recommendation, each
//! taking text and returning a structured value or a well-typed error —
//! no regexes, explicit column/key recognition.

use crate::error::{Result, VirtError};
use crate::process::{probe_version, run};
use crate::provider::Provider;
use crate::types::{Diagnostics, StopOptions, VmDescriptor, VmSpec, VmState};
use async_trait::async_trait;
use std::collections::HashMap;

const TOOL: &str = "VBoxManage";

pub struct VBoxAdapter;

impl VBoxAdapter {
    pub fn new() -> Self {
        Self
    }

    async fn showvminfo(&self, name: &str) -> Result<HashMap<String, String>> {
        let out = run(TOOL, &["showvminfo", name, "--machinereadable"]).await?;
        if contains_access_denied(&out.stdout) || contains_access_denied(&out.stderr) {
            return Err(VirtError::Permission {
                detail: "Access denied".to_string(),
                hint: access_denied_hint(),
            });
        }
        if !out.status_ok {
            return Err(VirtError::NotFound(name.to_string()));
        }
        Ok(parse_machine_readable(&out.stdout))
    }
}

impl Default for VBoxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// `VBoxManage`'s `--machinereadable` output: one `key=value` pair per
/// line, values optionally double-quoted.
pub fn parse_machine_readable(text: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        fields.insert(key.trim().to_string(), value);
    }
    fields
}

/// `VBoxManage list vms` prints `"name" {uuid}` per registered VM.
pub fn parse_vm_names(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line.strip_prefix('"')?;
            let end = rest.find('"')?;
            Some(rest[..end].to_string())
        })
        .collect()
}

/// `VBoxManage guestproperty get` prints `Value: <v>` when set, or
/// `No value set!` when the guest hasn't reported one (e.g. no Guest
/// Additions, or the VM isn't running).
pub fn parse_guestproperty_value(text: &str) -> Option<String> {
    let line = text.trim();
    line.strip_prefix("Value:").map(|v| v.trim().to_string())
}

pub fn contains_access_denied(text: &str) -> bool {
    text.contains("E_ACCESSDENIED") || text.contains("0x80070005")
}

fn access_denied_hint() -> String {
    "reinstall VirtualBox, run as administrator, or check DCOM permissions".to_string()
}

pub fn vmstate_from_vbox(raw: &str) -> VmState {
    match raw {
        "running" => VmState::Running,
        "poweroff" | "aborted-saved" => VmState::Stopped,
        "saved" | "paused" => VmState::Suspended,
        "stopping" => VmState::Stopping,
        "aborted" | "gurumeditation" => VmState::Error,
        _ => VmState::Unknown,
    }
}

fn descriptor_from_fields(name: &str, fields: &HashMap<String, String>) -> VmDescriptor {
    let state = fields
        .get("VMState")
        .map(|s| vmstate_from_vbox(s))
        .unwrap_or(VmState::Unknown);
    VmDescriptor {
        name: name.to_string(),
        state,
        ram_mb: fields.get("memory").and_then(|v| v.parse().ok()),
        cpus: fields.get("cpus").and_then(|v| v.parse().ok()),
        disk_size_mb: None,
        ip: None,
        backend: "virtualbox".to_string(),
        error_detail: None,
    }
}

#[async_trait]
impl Provider for VBoxAdapter {
    fn name(&self) -> &'static str {
        "virtualbox"
    }

    async fn get_version(&self) -> Result<Option<String>> {
        Ok(probe_version(TOOL, "--version").await)
    }

    async fn is_available(&self) -> bool {
        probe_version(TOOL, "--version").await.is_some()
    }

    async fn get_diagnostic_info(&self) -> Result<Diagnostics> {
        let version = self.get_version().await?;
        Ok(Diagnostics {
            provider: self.name().to_string(),
            platform: std::env::consts::OS.to_string(),
            tool_path: None,
            tool_version: version,
            conflicts: Vec::new(),
            remediation: Vec::new(),
        })
    }

    async fn create(&self, spec: &VmSpec) -> Result<VmDescriptor> {
        run(
            TOOL,
            &["createvm", "--name", &spec.name, "--register"],
        )
        .await?;
        if let Some(ram) = spec.ram_mb {
            run(
                TOOL,
                &["modifyvm", &spec.name, "--memory", &ram.to_string()],
            )
            .await?;
        }
        self.get_info(&spec.name).await
    }

    async fn start(&self, name: &str) -> Result<()> {
        if let Ok(VmState::Running) = self.get_state(name).await {
            return Ok(());
        }
        run(TOOL, &["startvm", name, "--type", "headless"]).await?;
        Ok(())
    }

    async fn stop(&self, name: &str, opts: StopOptions) -> Result<()> {
        if !opts.force && matches!(self.get_state(name).await, Ok(VmState::Stopped)) {
            return Ok(());
        }
        let arg = if opts.force { "poweroff" } else { "acpipowerbutton" };
        run(TOOL, &["controlvm", name, arg]).await?;
        Ok(())
    }

    async fn suspend(&self, name: &str) -> Result<()> {
        run(TOOL, &["controlvm", name, "savestate"]).await?;
        Ok(())
    }

    async fn resume(&self, name: &str) -> Result<()> {
        run(TOOL, &["startvm", name, "--type", "headless"]).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        run(TOOL, &["unregistervm", name, "--delete"]).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<VmDescriptor>> {
        let out = run(TOOL, &["list", "vms"]).await?;
        let names = parse_vm_names(&out.stdout);
        let mut descriptors = Vec::with_capacity(names.len());
        for name in names {
            match self.showvminfo(&name).await {
                Ok(fields) => descriptors.push(descriptor_from_fields(&name, &fields)),
                Err(VirtError::Permission { detail, .. }) => {
                    descriptors.push(VmDescriptor::error(&name, self.name(), detail))
                }
                Err(e) => descriptors.push(VmDescriptor::error(&name, self.name(), e.to_string())),
            }
        }
        Ok(descriptors)
    }

    async fn get_info(&self, name: &str) -> Result<VmDescriptor> {
        let fields = self.showvminfo(name).await?;
        Ok(descriptor_from_fields(name, &fields))
    }

    async fn get_state(&self, name: &str) -> Result<VmState> {
        match self.showvminfo(name).await {
            Ok(fields) => Ok(fields
                .get("VMState")
                .map(|s| vmstate_from_vbox(s))
                .unwrap_or(VmState::Unknown)),
            Err(VirtError::NotFound(_)) => Ok(VmState::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn get_ip(&self, name: &str) -> Result<Option<String>> {
        let out = run(
            TOOL,
            &["guestproperty", "get", name, "/VirtualBox/GuestInfo/Net/0/V4/IP"],
        )
        .await?;
        Ok(parse_guestproperty_value(&out.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registered_vm_names() {
        let output = "\"vm1\" {11111111-1111-1111-1111-111111111111}\n\"vm2\" {22222222-2222-2222-2222-222222222222}\n";
        assert_eq!(parse_vm_names(output), vec!["vm1".to_string(), "vm2".to_string()]);
    }

    #[test]
    fn parses_machine_readable_key_value_pairs() {
        let output = "name=\"vm1\"\nVMState=\"running\"\nmemory=2048\ncpus=2\n";
        let fields = parse_machine_readable(output);
        assert_eq!(fields.get("name"), Some(&"vm1".to_string()));
        assert_eq!(fields.get("VMState"), Some(&"running".to_string()));
        assert_eq!(fields.get("memory"), Some(&"2048".to_string()));
    }

    #[test]
    fn vbox_state_mapping_covers_common_states() {
        assert_eq!(vmstate_from_vbox("running"), VmState::Running);
        assert_eq!(vmstate_from_vbox("poweroff"), VmState::Stopped);
        assert_eq!(vmstate_from_vbox("saved"), VmState::Suspended);
        assert_eq!(vmstate_from_vbox("paused"), VmState::Suspended);
        assert_eq!(vmstate_from_vbox("aborted"), VmState::Error);
        assert_eq!(vmstate_from_vbox("something-else"), VmState::Unknown);
    }

    #[test]
    fn detects_access_denied_markers() {
        assert!(contains_access_denied("VBOX_E_ACCESSDENIED: failed"));
        assert!(contains_access_denied("error 0x80070005 occurred"));
        assert!(!contains_access_denied("VBoxManage: error: Could not find VM"));
    }

    #[test]
    fn parses_guestproperty_value_when_set() {
        assert_eq!(
            parse_guestproperty_value("Value: 192.168.56.10\n"),
            Some("192.168.56.10".to_string())
        );
    }

    #[test]
    fn parses_guestproperty_absence_as_none() {
        assert_eq!(parse_guestproperty_value("No value set!\n"), None);
    }

    #[test]
    fn descriptor_from_fields_maps_running_state_and_resources() {
        let mut fields = HashMap::new();
        fields.insert("VMState".to_string(), "running".to_string());
        fields.insert("memory".to_string(), "4096".to_string());
        fields.insert("cpus".to_string(), "4".to_string());
        let descriptor = descriptor_from_fields("vm1", &fields);
        assert_eq!(descriptor.state, VmState::Running);
        assert_eq!(descriptor.ram_mb, Some(4096));
        assert_eq!(descriptor.cpus, Some(4));
    }
}
