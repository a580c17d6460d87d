//! CodeShelf control panel
//!
//! Two cooperating pieces:
//! - the controller, which polls the process table, launchd and the launch
//!   descriptor to show whether the daemon is running, registered and set to
//!   start at boot, and forwards user actions;
//! - the privileged helper (`HelperTool`), which alone rewrites the launch
//!   descriptor, and only after proving it runs from its installed location.

pub mod authorization;
pub mod autostart;
pub mod config;
pub mod control;
pub mod controller;
pub mod error;
pub mod helper;
pub mod logging;
pub mod panel;
pub mod poller;
pub mod probe;
pub mod signals;
pub mod status;

pub use config::{HelperSettings, PanelConfig};
pub use controller::{Controller, PanelAction};
pub use error::{AuthorizationError, AutoStartError, ControlError, HelperError, ProbeError};
pub use status::{Affordances, DaemonStatus, PanelSnapshot, Probe};
