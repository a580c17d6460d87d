//! The privileged helper: prove identity, elevate, toggle `RunAtLoad`.
//!
//! Order is fixed. Identity is checked before anything else; elevation is
//! attempted only for a recognised operation and only after the identity
//! check passed; a failed elevation ends the run before any file is opened.

use std::path::PathBuf;

use nix::unistd::{Uid, setuid};

use crate::autostart;
use crate::config::HelperSettings;
use crate::error::HelperError;

/// Operation argument that toggles auto-start.
pub const TOGGLE_AUTO_START: &str = "toggle";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ToggleAutoStart,
    /// Anything else, including no argument. Never mutates.
    Unrecognized(Option<String>),
}

impl Operation {
    pub fn parse(arg: Option<&str>) -> Self {
        match arg {
            Some(TOGGLE_AUTO_START) => Operation::ToggleAutoStart,
            other => Operation::Unrecognized(other.map(str::to_string)),
        }
    }
}

/// One run of the helper, validated once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperInvocation {
    /// Where the running binary actually lives; `None` if unresolvable
    pub self_path: Option<PathBuf>,
    pub canonical_path: PathBuf,
    pub operation: Operation,
}

impl HelperInvocation {
    pub fn new(self_path: Option<PathBuf>, settings: &HelperSettings, arg: Option<&str>) -> Self {
        Self {
            self_path,
            canonical_path: settings.canonical_path.clone(),
            operation: Operation::parse(arg),
        }
    }

    /// Succeeds only when the resolved self path lies at the canonical path.
    pub fn verify_identity(&self) -> Result<(), HelperError> {
        let resolved = self.self_path.as_ref().ok_or(HelperError::SelfPathUnresolved)?;
        let trusted = !self.canonical_path.as_os_str().is_empty()
            && resolved.is_absolute()
            && resolved.starts_with(&self.canonical_path);
        if trusted {
            Ok(())
        } else {
            Err(HelperError::IdentityMismatch {
                resolved: resolved.clone(),
                expected: self.canonical_path.clone(),
            })
        }
    }
}

/// Resolve the running executable through the OS, not `argv[0]`.
///
/// Symlinks are resolved so a link at the trusted location pointing
/// elsewhere does not pass.
pub fn resolve_self_path() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    std::fs::canonicalize(exe)
}

/// Privilege elevation step. Failure must end the run.
pub trait Elevator {
    fn elevate(&self) -> Result<(), HelperError>;
}

/// `setuid(0)`; works when the binary was started with root rights.
#[derive(Debug, Default, Clone, Copy)]
pub struct SetuidRoot;

impl Elevator for SetuidRoot {
    fn elevate(&self) -> Result<(), HelperError> {
        setuid(Uid::from_raw(0)).map_err(HelperError::ElevationFailure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperOutcome {
    /// `RunAtLoad` now holds this value
    Toggled { run_at_load: bool },
    NoOp,
}

pub fn run(
    invocation: &HelperInvocation,
    settings: &HelperSettings,
    elevator: &dyn Elevator,
) -> Result<HelperOutcome, HelperError> {
    invocation.verify_identity()?;

    match &invocation.operation {
        Operation::Unrecognized(arg) => {
            log::info!("no operation requested ({arg:?}); nothing to do");
            Ok(HelperOutcome::NoOp)
        }
        Operation::ToggleAutoStart => {
            elevator.elevate()?;
            let run_at_load = autostart::toggle_run_at_load(
                &settings.launch_descriptor,
                &settings.run_at_load_key,
            )?;
            Ok(HelperOutcome::Toggled { run_at_load })
        }
    }
}

/// Exit status for a finished run: 0 on success or no-op.
pub fn exit_code(result: &Result<HelperOutcome, HelperError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.exit_code(),
    }
}
