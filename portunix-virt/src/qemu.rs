//! QEMU/libvirt adapter (spec.md §4.5 "QEMU/libvirt adapter"), driving
//! `virsh`. Like [`crate::vbox`], all parsing is pure functions over
//! captured text.

use crate::error::{Result, VirtError};
use crate::process::{probe_version, run};
use crate::provider::Provider;
use crate::types::{Diagnostics, StopOptions, VmDescriptor, VmSpec, VmState};
use async_trait::async_trait;

const TOOL: &str = "virsh";

pub struct QemuAdapter;

impl QemuAdapter {
    pub fn new() -> Self {
        Self
    }

    fn permission_error(text: &str) -> Option<VirtError> {
        if text.contains("Permission denied") || text.contains("polkit") {
            Some(VirtError::Permission {
                detail: "libvirt denied the request".to_string(),
                hint: "add the current user to the libvirt group".to_string(),
            })
        } else {
            None
        }
    }
}

impl Default for QemuAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// One row of `virsh list --all`: `Id  Name  State`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirshListEntry {
    pub name: String,
    pub state: VmState,
}

/// `virsh` state column → [`VmState`] (spec.md §4.5 translation table).
pub fn vmstate_from_virsh(raw: &str) -> VmState {
    match raw {
        "running" => VmState::Running,
        "shut off" | "shutoff" => VmState::Stopped,
        "paused" | "pmsuspended" => VmState::Suspended,
        "in shutdown" => VmState::Stopping,
        "idle" | "crashed" | "dying" => VmState::Error,
        _ => VmState::Unknown,
    }
}

/// Parses `virsh list --all` output. The state column may itself contain
/// a space (`shut off`, `in shutdown`, `pmsuspended`), so the name is the
/// second column and everything after it is the state.
pub fn parse_virsh_list(text: &str) -> Vec<VirshListEntry> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("Id ") || trimmed.chars().all(|c| c == '-' || c.is_whitespace()) {
            continue;
        }
        let mut columns = trimmed.split_whitespace();
        let Some(id) = columns.next() else { continue };
        if id.parse::<i64>().is_err() && id != "-" {
            continue;
        }
        let rest: Vec<&str> = columns.collect();
        if rest.is_empty() {
            continue;
        }
        let name = rest[0].to_string();
        let state_raw = rest[1..].join(" ");
        entries.push(VirshListEntry {
            name,
            state: vmstate_from_virsh(&state_raw),
        });
    }
    entries
}

/// `virsh dominfo`: `Key:     value` pairs, colon-delimited with padded
/// whitespace.
pub fn parse_dominfo(text: &str) -> std::collections::HashMap<String, String> {
    let mut fields = std::collections::HashMap::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        fields.insert(key.trim().to_string(), value.trim().to_string());
    }
    fields
}

/// `virsh domifaddr` table: `Name  MAC  Protocol  Address`. Returns the
/// first IPv4 address with its CIDR suffix stripped.
pub fn parse_domifaddr_first_ipv4(text: &str) -> Option<String> {
    for line in text.lines() {
        let columns: Vec<&str> = line.split_whitespace().collect();
        let Some(address) = columns.last() else { continue };
        if !address.contains('.') {
            continue;
        }
        let ip = address.split('/').next().unwrap_or(address);
        if ip.parse::<std::net::Ipv4Addr>().is_ok() {
            return Some(ip.to_string());
        }
    }
    None
}

#[async_trait]
impl Provider for QemuAdapter {
    fn name(&self) -> &'static str {
        "qemu"
    }

    async fn get_version(&self) -> Result<Option<String>> {
        Ok(probe_version(TOOL, "--version").await)
    }

    async fn is_available(&self) -> bool {
        probe_version(TOOL, "--version").await.is_some()
    }

    async fn get_diagnostic_info(&self) -> Result<Diagnostics> {
        let version = self.get_version().await?;
        let kvm_loaded = tokio::fs::metadata("/dev/kvm").await.is_ok();
        Ok(Diagnostics {
            provider: self.name().to_string(),
            platform: std::env::consts::OS.to_string(),
            tool_path: None,
            tool_version: version,
            conflicts: Vec::new(),
            remediation: if kvm_loaded {
                Vec::new()
            } else {
                vec!["KVM kernel modules do not appear to be loaded".to_string()]
            },
        })
    }

    async fn create(&self, _spec: &VmSpec) -> Result<VmDescriptor> {
        // libvirt domain definitions require an XML descriptor this
        // adapter doesn't generate; callers define domains out of band
        // and operate on them by name.
        Err(self.unsupported("Create"))
    }

    async fn start(&self, name: &str) -> Result<()> {
        if let Ok(VmState::Running) = self.get_state(name).await {
            return Ok(());
        }
        let out = run(TOOL, &["start", name]).await?;
        if let Some(err) = Self::permission_error(&out.stderr) {
            return Err(err);
        }
        Ok(())
    }

    async fn stop(&self, name: &str, opts: StopOptions) -> Result<()> {
        if !opts.force && matches!(self.get_state(name).await, Ok(VmState::Stopped)) {
            return Ok(());
        }
        let args: &[&str] = if opts.force {
            &["destroy", name]
        } else {
            &["shutdown", name]
        };
        run(TOOL, args).await?;
        Ok(())
    }

    async fn suspend(&self, name: &str) -> Result<()> {
        run(TOOL, &["suspend", name]).await?;
        Ok(())
    }

    async fn resume(&self, name: &str) -> Result<()> {
        run(TOOL, &["resume", name]).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        run(TOOL, &["undefine", name, "--remove-all-storage"]).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<VmDescriptor>> {
        let out = run(TOOL, &["list", "--all"]).await?;
        if let Some(err) = Self::permission_error(&out.stderr) {
            return Err(err);
        }
        Ok(parse_virsh_list(&out.stdout)
            .into_iter()
            .map(|entry| VmDescriptor {
                name: entry.name,
                state: entry.state,
                ram_mb: None,
                cpus: None,
                disk_size_mb: None,
                ip: None,
                backend: self.name().to_string(),
                error_detail: None,
            })
            .collect())
    }

    async fn get_info(&self, name: &str) -> Result<VmDescriptor> {
        let out = run(TOOL, &["dominfo", name]).await?;
        if let Some(err) = Self::permission_error(&out.stderr) {
            return Err(err);
        }
        if !out.status_ok {
            return Err(VirtError::NotFound(name.to_string()));
        }
        let fields = parse_dominfo(&out.stdout);
        let state = fields
            .get("State")
            .map(|s| vmstate_from_virsh(s))
            .unwrap_or(VmState::Unknown);
        Ok(VmDescriptor {
            name: name.to_string(),
            state,
            ram_mb: fields
                .get("Used memory")
                .and_then(|v| v.split_whitespace().next())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|kb| kb / 1024),
            cpus: fields.get("CPU(s)").and_then(|v| v.parse().ok()),
            disk_size_mb: None,
            ip: None,
            backend: self.name().to_string(),
            error_detail: None,
        })
    }

    async fn get_state(&self, name: &str) -> Result<VmState> {
        let out = run(TOOL, &["domstate", name]).await?;
        if !out.status_ok {
            return Ok(VmState::NotFound);
        }
        Ok(vmstate_from_virsh(out.stdout.trim()))
    }

    async fn get_ip(&self, name: &str) -> Result<Option<String>> {
        for source in ["agent", "lease", "arp"] {
            let out = run(TOOL, &["domifaddr", name, "--source", source]).await?;
            if let Some(ip) = parse_domifaddr_first_ipv4(&out.stdout) {
                return Ok(Some(ip));
            }
        }
        Ok(None)
    }
}
