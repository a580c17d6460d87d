//! Start/stop requests, delegated to launchd (launchctl)
//!
//! Both requests are fire-and-forget: success means launchd accepted the
//! request, not that the daemon changed state. The poller observes the
//! outcome.

use std::process::Command;

use crate::config::PanelConfig;
use crate::error::ControlError;

/// Capability to ask the service supervisor to start or stop the daemon.
pub trait DaemonLauncher: Send {
    fn start_daemon(&self) -> Result<(), ControlError>;
    fn stop_daemon(&self) -> Result<(), ControlError>;
}

#[derive(Debug, Clone)]
pub struct LaunchctlLauncher {
    launchctl: String,
    label: String,
}

impl LaunchctlLauncher {
    pub fn new(cfg: &PanelConfig) -> Self {
        Self {
            launchctl: cfg.programs.launchctl.clone(),
            label: cfg.daemon_label.clone(),
        }
    }

    fn request(&self, action: &'static str) -> Result<(), ControlError> {
        log::info!("launchctl {action} {}", self.label);
        let output = Command::new(&self.launchctl)
            .args([action, self.label.as_str()])
            .output()
            .map_err(|e| ControlError::Launcher {
                action,
                detail: format!("failed to execute {}: {e}", self.launchctl),
            })?;

        if !output.status.success() {
            return Err(ControlError::Launcher {
                action,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl DaemonLauncher for LaunchctlLauncher {
    fn start_daemon(&self) -> Result<(), ControlError> {
        self.request("start")
    }

    fn stop_daemon(&self) -> Result<(), ControlError> {
        self.request("stop")
    }
}
