//! Error taxonomy for the panel and its privileged helper.
//!
//! Helper-side failures ([`HelperError`]) always end the helper process
//! without touching the launch descriptor. Controller-side failures are
//! either degraded into an unknown status ([`ProbeError`]) or reported back
//! from a user action ([`ControlError`], [`AuthorizationError`]).

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the privileged helper. Every variant is fatal for the run.
#[derive(Error, Debug)]
pub enum HelperError {
    #[error("could not resolve the helper's own executable path")]
    SelfPathUnresolved,

    #[error("helper is running from {resolved}, expected {expected}")]
    IdentityMismatch { resolved: PathBuf, expected: PathBuf },

    #[error("failed to assume superuser identity: {0}")]
    ElevationFailure(#[source] nix::Error),

    #[error(transparent)]
    ConfigIo(#[from] AutoStartError),
}

impl HelperError {
    /// Process exit code reported for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            HelperError::SelfPathUnresolved | HelperError::IdentityMismatch { .. } => 2,
            HelperError::ElevationFailure(_) => 3,
            HelperError::ConfigIo(_) => 4,
        }
    }
}

/// Reading or rewriting the `RunAtLoad` flag in the launch descriptor.
#[derive(Error, Debug)]
pub enum AutoStartError {
    #[error("failed to read launch descriptor {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse launch descriptor {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },

    #[error("launch descriptor {0} is not a dictionary")]
    NotADictionary(PathBuf),

    #[error("key {key} in {path} is not a boolean")]
    NotABoolean { path: PathBuf, key: String },

    #[error("failed to serialize launch descriptor {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },

    #[error("failed to write launch descriptor {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A status query that could not be answered.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{tool} not found on PATH")]
    ToolMissing { tool: String },

    #[error("failed to execute {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Failures of user-requested transitions.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("daemon status is unknown; refusing to {0}")]
    StatusUnknown(&'static str),

    #[error("start-at-boot state is unknown; refusing to change it")]
    AutoStartUnknown,

    #[error("daemon is already {0}")]
    AlreadyInState(&'static str),

    #[error("launchd request `{action}` failed: {detail}")]
    Launcher { action: &'static str, detail: String },

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
}

/// Outcome of asking the OS to run the helper with elevated rights.
#[derive(Error, Debug)]
pub enum AuthorizationError {
    /// User cancelled or failed to authenticate. Not an error for the UI.
    #[error("authorization was denied")]
    Denied,

    #[error("failed to launch authorization prompt: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("helper failed: {0}")]
    HelperFailed(String),
}
