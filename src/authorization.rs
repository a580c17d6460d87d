//! Running the privileged helper through the macOS authorization prompt.

use std::path::Path;
use std::process::Command;

use crate::error::AuthorizationError;

/// Capability to run the helper with elevated rights.
///
/// `Ok` only says the helper ran and exited successfully; whether the change
/// took effect is for the next poll to tell.
pub trait Authorizer: Send {
    fn run_privileged(&self, helper: &Path, arg: &str) -> Result<(), AuthorizationError>;
}

/// Elevates via `osascript ... with administrator privileges`.
#[derive(Debug, Clone)]
pub struct OsascriptAuthorizer {
    osascript: String,
}

impl OsascriptAuthorizer {
    pub fn new(osascript: impl Into<String>) -> Self {
        Self {
            osascript: osascript.into(),
        }
    }
}

impl Authorizer for OsascriptAuthorizer {
    fn run_privileged(&self, helper: &Path, arg: &str) -> Result<(), AuthorizationError> {
        let applescript = applescript_for(helper, arg);
        log::debug!("requesting authorization to run {}", helper.display());

        let output = Command::new(&self.osascript)
            .arg("-e")
            .arg(&applescript)
            .output()
            .map_err(AuthorizationError::Spawn)?;

        if output.status.success() {
            return Ok(());
        }
        Err(classify_failure(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// AppleScript running `helper arg` as root.
pub fn applescript_for(helper: &Path, arg: &str) -> String {
    let command = format!(
        "{} {}",
        shell_quote(&helper.to_string_lossy()),
        shell_quote(arg)
    );
    format!(
        r#"do shell script "{}" with administrator privileges"#,
        applescript_escape(&command)
    )
}

/// Map a failed osascript run onto the authorization taxonomy.
pub fn classify_failure(stdout: &str, stderr: &str) -> AuthorizationError {
    let cancelled = |s: &str| s.contains("User canceled") || s.contains("(-128)");
    if cancelled(stderr) || cancelled(stdout) {
        AuthorizationError::Denied
    } else if stderr.trim().is_empty() {
        AuthorizationError::HelperFailed(stdout.trim().to_string())
    } else {
        AuthorizationError::HelperFailed(stderr.trim().to_string())
    }
}
