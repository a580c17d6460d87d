//! User-requested transitions.
//!
//! Every action only issues a request. None of them report the resulting
//! daemon state; that is re-derived by the next poll.

use std::path::PathBuf;

use crate::authorization::Authorizer;
use crate::control::DaemonLauncher;
use crate::error::{AuthorizationError, ControlError};
use crate::helper::TOGGLE_AUTO_START;
use crate::status::{DaemonStatus, Probe};

/// What a user can ask the panel to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    ToggleServer,
    ToggleAutoStart,
    Quit,
}

/// Request actually issued for a server action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRequest {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoStartRequest {
    /// The helper ran under elevated rights and exited cleanly
    Submitted,
    /// Authorization was refused; nothing happened
    Denied,
}

pub struct Controller {
    launcher: Box<dyn DaemonLauncher>,
    authorizer: Box<dyn Authorizer>,
    helper_path: PathBuf,
}

impl Controller {
    pub fn new(
        launcher: Box<dyn DaemonLauncher>,
        authorizer: Box<dyn Authorizer>,
        helper_path: PathBuf,
    ) -> Self {
        Self {
            launcher,
            authorizer,
            helper_path,
        }
    }

    /// Stop a running daemon or start a stopped one.
    pub fn toggle_server(&self, status: &DaemonStatus) -> Result<ServerRequest, ControlError> {
        match status.running {
            Probe::Unknown => Err(ControlError::StatusUnknown("toggle the server")),
            Probe::Known(true) => self.stop(status),
            Probe::Known(false) => self.start(status),
        }
    }

    pub fn start(&self, status: &DaemonStatus) -> Result<ServerRequest, ControlError> {
        match status.running {
            Probe::Unknown => Err(ControlError::StatusUnknown("start the server")),
            Probe::Known(true) => Err(ControlError::AlreadyInState("running")),
            Probe::Known(false) => {
                self.launcher.start_daemon()?;
                Ok(ServerRequest::Start)
            }
        }
    }

    pub fn stop(&self, status: &DaemonStatus) -> Result<ServerRequest, ControlError> {
        match status.running {
            Probe::Unknown => Err(ControlError::StatusUnknown("stop the server")),
            Probe::Known(false) => Err(ControlError::AlreadyInState("stopped")),
            Probe::Known(true) => {
                self.launcher.stop_daemon()?;
                Ok(ServerRequest::Stop)
            }
        }
    }

    /// Run the helper's toggle under elevated rights.
    ///
    /// A refused authorization is not an error.
    pub fn toggle_auto_start(&self) -> Result<AutoStartRequest, ControlError> {
        match self
            .authorizer
            .run_privileged(&self.helper_path, TOGGLE_AUTO_START)
        {
            Ok(()) => Ok(AutoStartRequest::Submitted),
            Err(AuthorizationError::Denied) => {
                log::info!("authorization denied; auto-start left unchanged");
                Ok(AutoStartRequest::Denied)
            }
            Err(e) => Err(e.into()),
        }
    }
}
