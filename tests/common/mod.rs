#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use codeshelf_panel::PanelConfig;
use codeshelf_panel::ProbeError;
use codeshelf_panel::probe::StatusProbe;
use plist::{Dictionary, Value};

pub const CANONICAL: &str = "/Library/PreferencePanes/CodeShelf.prefPane/Contents/MacOS/HelperTool";

/// Write a launchd descriptor with the given `RunAtLoad` value.
pub fn write_descriptor(dir: &Path, run_at_load: bool) -> PathBuf {
    let mut dict = Dictionary::new();
    dict.insert("Label".into(), Value::String("com.gadgetworks.codeshelf".into()));
    dict.insert(
        "ProgramArguments".into(),
        Value::Array(vec![
            Value::String("/Applications/CodeShelf.app/Contents/MacOS/JavaAppLauncher".into()),
            Value::String("-Xmx1g".into()),
        ]),
    );
    dict.insert("RunAtLoad".into(), Value::Boolean(run_at_load));
    dict.insert("KeepAlive".into(), Value::Boolean(false));
    let path = dir.join("com.gadgetworks.codeshelf.plist");
    Value::Dictionary(dict).to_file_xml(&path).unwrap();
    path
}

pub fn config_for(descriptor: &Path) -> PanelConfig {
    PanelConfig {
        launch_descriptor: descriptor.to_path_buf(),
        poll_interval_ms: 100,
        ..PanelConfig::default()
    }
}

/// Canned probe answers; `None` means the query fails.
#[derive(Clone, Default)]
pub struct FakeProbe {
    pub running: Arc<FakeAnswer>,
    pub registered: Arc<FakeAnswer>,
}

#[derive(Default)]
pub struct FakeAnswer {
    value: AtomicBool,
    failing: AtomicBool,
    pub calls: AtomicU64,
}

impl FakeAnswer {
    pub fn set(&self, v: Option<bool>) {
        match v {
            Some(v) => {
                self.value.store(v, Ordering::SeqCst);
                self.failing.store(false, Ordering::SeqCst);
            }
            None => self.failing.store(true, Ordering::SeqCst),
        }
    }

    fn answer(&self, tool: &str) -> Result<bool, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(ProbeError::ToolMissing { tool: tool.into() })
        } else {
            Ok(self.value.load(Ordering::SeqCst))
        }
    }
}

impl FakeProbe {
    pub fn new(running: Option<bool>, registered: Option<bool>) -> Self {
        let probe = Self::default();
        probe.running.set(running);
        probe.registered.set(registered);
        probe
    }
}

impl StatusProbe for FakeProbe {
    fn is_daemon_running(&self) -> Result<bool, ProbeError> {
        self.running.answer("ps")
    }

    fn is_daemon_registered(&self) -> Result<bool, ProbeError> {
        self.registered.answer("launchctl")
    }
}
