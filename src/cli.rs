use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "CodeShelf daemon control panel")]
pub struct Args {
    /// Path to configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub sub: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Poll continuously (default). Commands on stdin: s = start/stop, a = toggle start at boot, q = quit
    Watch,
    /// Print daemon status once (Exit 0 = running, 1 = stopped, 2 = unknown)
    Status,
    /// Ask launchd to start the daemon
    Start,
    /// Ask launchd to stop the daemon
    Stop,
    /// Stop the daemon if it is running, start it otherwise
    ToggleServer,
    /// Flip start-at-boot through the privileged helper
    ToggleAutoStart,
}
