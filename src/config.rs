use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Trusted install location of the privileged helper.
pub const CANONICAL_HELPER_PATH: &str =
    "/Library/PreferencePanes/CodeShelf.prefPane/Contents/MacOS/HelperTool";

/// launchd descriptor of the daemon. Owned by root.
pub const LAUNCH_DESCRIPTOR_PATH: &str = "/Library/LaunchDaemons/com.gadgetworks.codeshelf.plist";

pub const DAEMON_LABEL: &str = "com.gadgetworks.codeshelf";

/// Key launchd reads to decide whether to start the job at load.
pub const RUN_AT_LOAD_KEY: &str = "RunAtLoad";

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_ps() -> String {
    "ps".to_string()
}

fn default_launchctl() -> String {
    "launchctl".to_string()
}

fn default_osascript() -> String {
    "osascript".to_string()
}

/// Controller configuration (TOML on disk).
///
/// Every path, identifier and program name the controller uses lives here
/// so tests can point the probes and actions at fakes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// launchd label of the daemon job
    pub daemon_label: String,
    /// Substring identifying the daemon's command line in the process table
    pub process_signature: String,
    pub launch_descriptor: PathBuf,
    pub helper_path: PathBuf,
    #[serde(default = "default_run_at_load_key")]
    pub run_at_load_key: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub programs: Programs,
}

fn default_run_at_load_key() -> String {
    RUN_AT_LOAD_KEY.to_string()
}

/// External programs the controller shells out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Programs {
    #[serde(default = "default_ps")]
    pub ps: String,
    #[serde(default = "default_launchctl")]
    pub launchctl: String,
    #[serde(default = "default_osascript")]
    pub osascript: String,
}

impl Default for Programs {
    fn default() -> Self {
        Self {
            ps: default_ps(),
            launchctl: default_launchctl(),
            osascript: default_osascript(),
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            daemon_label: DAEMON_LABEL.into(),
            process_signature: "CodeShelf.app".into(),
            launch_descriptor: LAUNCH_DESCRIPTOR_PATH.into(),
            helper_path: CANONICAL_HELPER_PATH.into(),
            run_at_load_key: default_run_at_load_key(),
            poll_interval_ms: default_poll_interval_ms(),
            programs: Programs::default(),
        }
    }
}

impl PanelConfig {
    pub fn poll_interval(&self) -> Duration {
        // A zero interval would spin the poller.
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    /// `~/Library/Application Support/codeshelf/panel.toml` on macOS.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(dir.join("codeshelf").join("panel.toml"))
    }

    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing default file is created with default values. An explicitly
    /// named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = Self::default_path()?;
                if !p.exists() {
                    Self::write_default(&p)?;
                }
                p
            }
        };

        let cfg_str = fs::read_to_string(&cfg_path)
            .with_context(|| format!("Failed to read config file {}", cfg_path.display()))?;
        let cfg: PanelConfig = toml::from_str(&cfg_str)
            .with_context(|| format!("Failed to parse config {}", cfg_path.display()))?;
        log::debug!("Using config from: {}", cfg_path.display());
        Ok(cfg)
    }

    fn write_default(path: &Path) -> Result<()> {
        log::info!(
            "Config not found at {}, creating default configuration",
            path.display()
        );
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let default_toml = toml::to_string_pretty(&PanelConfig::default())
            .context("Failed to serialize default config")?;
        fs::write(path, default_toml).context("Failed to write config file")?;
        Ok(())
    }
}

/// What the privileged helper trusts. Compiled in; the helper never reads a
/// user-writable file to obtain these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperSettings {
    pub canonical_path: PathBuf,
    pub launch_descriptor: PathBuf,
    pub run_at_load_key: String,
}

impl Default for HelperSettings {
    fn default() -> Self {
        Self {
            canonical_path: CANONICAL_HELPER_PATH.into(),
            launch_descriptor: LAUNCH_DESCRIPTOR_PATH.into(),
            run_at_load_key: RUN_AT_LOAD_KEY.into(),
        }
    }
}
