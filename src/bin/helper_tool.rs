//! `HelperTool`: the only code path allowed to rewrite the daemon's launch
//! descriptor. Started with root rights by the authorization prompt.
//!
//! Usage: `HelperTool toggle`. Any other argument, or none, exits 0 without
//! touching anything.

use codeshelf_panel::HelperSettings;
use codeshelf_panel::helper::{self, HelperInvocation, HelperOutcome, SetuidRoot};

fn main() {
    codeshelf_panel::logging::init();

    let settings = HelperSettings::default();
    let self_path = match helper::resolve_self_path() {
        Ok(path) => Some(path),
        Err(e) => {
            log::error!("cannot resolve own executable: {e}");
            None
        }
    };
    let arg = std::env::args().nth(1);
    let invocation = HelperInvocation::new(self_path, &settings, arg.as_deref());

    let result = helper::run(&invocation, &settings, &SetuidRoot);
    match &result {
        Ok(HelperOutcome::Toggled { run_at_load }) => {
            println!("{} = {run_at_load}", settings.run_at_load_key);
        }
        Ok(HelperOutcome::NoOp) => {}
        // Printed rather than logged so it survives any RUST_LOG filter.
        Err(e) => eprintln!("HelperTool: {e}"),
    }
    std::process::exit(helper::exit_code(&result));
}
