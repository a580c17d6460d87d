//! Read-only status queries against the process table and launchd.

use std::process::{Command, Output, Stdio};

use crate::config::PanelConfig;
use crate::error::ProbeError;

/// Capability answering the two independent status questions.
///
/// Implementations must be side-effect free; the poller may call the two
/// methods in either order.
pub trait StatusProbe: Send {
    /// A process whose command line identifies the daemon exists.
    fn is_daemon_running(&self) -> Result<bool, ProbeError>;

    /// launchd currently has the daemon's job loaded.
    fn is_daemon_registered(&self) -> Result<bool, ProbeError>;
}

/// Queries `ps` and `launchctl list`.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    ps: String,
    launchctl: String,
    signature: String,
    label: String,
}

impl SystemProbe {
    pub fn new(cfg: &PanelConfig) -> Self {
        Self {
            ps: cfg.programs.ps.clone(),
            launchctl: cfg.programs.launchctl.clone(),
            signature: cfg.process_signature.clone(),
            label: cfg.daemon_label.clone(),
        }
    }
}

impl StatusProbe for SystemProbe {
    fn is_daemon_running(&self) -> Result<bool, ProbeError> {
        let (pid, output) = run_tool(&self.ps, &["-axww", "-o", "pid=,command="])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(process_table_matches(&stdout, &self.signature, pid))
    }

    fn is_daemon_registered(&self) -> Result<bool, ProbeError> {
        let (_, output) = run_tool(&self.launchctl, &["list"])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(launchctl_list_contains(&stdout, &self.label))
    }
}

/// Run `tool` to completion, returning its pid alongside the output.
fn run_tool(tool: &str, args: &[&str]) -> Result<(u32, Output), ProbeError> {
    let program = which::which(tool).map_err(|_| ProbeError::ToolMissing {
        tool: tool.to_string(),
    })?;

    let child = Command::new(&program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProbeError::Spawn {
            tool: tool.to_string(),
            source,
        })?;
    let pid = child.id();
    let output = child.wait_with_output().map_err(|source| ProbeError::Spawn {
        tool: tool.to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(ProbeError::Failed {
            tool: tool.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok((pid, output))
}

/// Does any `pid command...` row mention `signature`?
///
/// The row of the listing process itself (`self_pid`) and any `grep` rows
/// never count.
pub fn process_table_matches(table: &str, signature: &str, self_pid: u32) -> bool {
    if signature.is_empty() {
        return false;
    }
    table.lines().any(|line| {
        let line = line.trim_start();
        let Some((pid, command)) = line.split_once(char::is_whitespace) else {
            return false;
        };
        if pid.parse::<u32>().ok() == Some(self_pid) {
            return false;
        }
        let is_grep = command
            .split_whitespace()
            .next()
            .is_some_and(|prog| prog.rsplit('/').next() == Some("grep"));
        !is_grep && command.contains(signature)
    })
}

/// Does a `launchctl list` listing (`PID\tStatus\tLabel`) carry `label`?
///
/// Only an exact match on the label column counts.
pub fn launchctl_list_contains(listing: &str, label: &str) -> bool {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().nth(2))
        .any(|col| col == label)
}
