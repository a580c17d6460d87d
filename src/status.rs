//! Derived daemon state as shown by the panel.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::ProbeError;

/// Answer of a single status query. `Unknown` is never collapsed into
/// `Known(false)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    Known(bool),
    Unknown,
}

impl Probe {
    pub fn is_true(self) -> bool {
        self == Probe::Known(true)
    }

    pub fn is_false(self) -> bool {
        self == Probe::Known(false)
    }

    pub fn is_known(self) -> bool {
        matches!(self, Probe::Known(_))
    }
}

impl From<Result<bool, ProbeError>> for Probe {
    fn from(res: Result<bool, ProbeError>) -> Self {
        match res {
            Ok(v) => Probe::Known(v),
            Err(_) => Probe::Unknown,
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Known(true) => f.write_str("yes"),
            Probe::Known(false) => f.write_str("no"),
            Probe::Unknown => f.write_str("unknown"),
        }
    }
}

/// The two orthogonal facts about the daemon, taken in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DaemonStatus {
    /// A matching process exists
    pub running: Probe,
    /// The launch descriptor is loaded in launchd
    pub registered: Probe,
}

impl DaemonStatus {
    pub const UNKNOWN: DaemonStatus = DaemonStatus {
        running: Probe::Unknown,
        registered: Probe::Unknown,
    };
}

/// Everything one poll tick observed. Published whole; never patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSnapshot {
    /// Tick number, starting at 1 for the first poll
    pub seq: u64,
    pub taken_at: DateTime<Utc>,
    pub status: DaemonStatus,
    /// `RunAtLoad` as currently persisted
    pub auto_start: Probe,
}

impl PanelSnapshot {
    pub fn affordances(&self) -> Affordances {
        Affordances::from_snapshot(self)
    }

    /// True when the visible part of two snapshots is identical.
    pub fn same_view(&self, other: &PanelSnapshot) -> bool {
        self.status == other.status && self.auto_start == other.auto_start
    }
}

impl fmt::Display for PanelSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let server = match self.status.running {
            Probe::Known(true) => "running",
            Probe::Known(false) => "stopped",
            Probe::Unknown => "unknown",
        };
        write!(
            f,
            "server: {server}  registered: {}  start at boot: {}",
            self.status.registered, self.auto_start
        )
    }
}

/// Which controls the UI should enable for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordances {
    pub can_start: bool,
    pub can_stop: bool,
    pub can_toggle_auto_start: bool,
    /// Checkbox state; `None` renders as indeterminate
    pub auto_start_checked: Option<bool>,
}

impl Affordances {
    pub fn from_snapshot(snapshot: &PanelSnapshot) -> Self {
        let auto_start_checked = match snapshot.auto_start {
            Probe::Known(v) => Some(v),
            Probe::Unknown => None,
        };
        Self {
            can_start: snapshot.status.running.is_false(),
            can_stop: snapshot.status.running.is_true(),
            can_toggle_auto_start: snapshot.auto_start.is_known(),
            auto_start_checked,
        }
    }
}
