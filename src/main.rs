mod cli;

use std::io::BufRead;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Sender, unbounded};
use log::error;

use codeshelf_panel::authorization::OsascriptAuthorizer;
use codeshelf_panel::control::LaunchctlLauncher;
use codeshelf_panel::controller::{AutoStartRequest, Controller, PanelAction, ServerRequest};
use codeshelf_panel::panel::{Panel, PanelView};
use codeshelf_panel::poller::{Poller, StatusSource};
use codeshelf_panel::probe::SystemProbe;
use codeshelf_panel::signals::{check_signals, install_signal_handlers};
use codeshelf_panel::{
    Affordances, ControlError, DaemonStatus, PanelConfig, PanelSnapshot, Probe,
};

fn main() {
    codeshelf_panel::logging::init();

    if let Err(e) = real_main() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let args = cli::Args::parse();
    let cfg = PanelConfig::load(args.config.as_deref())?;

    match args.sub.unwrap_or(cli::Cmd::Watch) {
        cli::Cmd::Watch => run_watch(&cfg),
        cli::Cmd::Status => handle_status(&cfg),
        cli::Cmd::Start => handle_server(&cfg, "start", |ctl, s| ctl.start(s)),
        cli::Cmd::Stop => handle_server(&cfg, "stop", |ctl, s| ctl.stop(s)),
        cli::Cmd::ToggleServer => handle_server(&cfg, "toggle", |ctl, s| ctl.toggle_server(s)),
        cli::Cmd::ToggleAutoStart => handle_toggle_auto_start(&cfg),
    }
}

fn controller(cfg: &PanelConfig) -> Controller {
    Controller::new(
        Box::new(LaunchctlLauncher::new(cfg)),
        Box::new(OsascriptAuthorizer::new(cfg.programs.osascript.clone())),
        cfg.helper_path.clone(),
    )
}

fn sample_once(cfg: &PanelConfig) -> PanelSnapshot {
    StatusSource::new(Box::new(SystemProbe::new(cfg)), cfg).sample()
}

/// Handle status command - exit 0 running, 1 stopped, 2 unknown
fn handle_status(cfg: &PanelConfig) -> Result<()> {
    let snapshot = sample_once(cfg);
    println!("{snapshot}");
    std::process::exit(match snapshot.status.running {
        Probe::Known(true) => 0,
        Probe::Known(false) => 1,
        Probe::Unknown => 2,
    });
}

fn handle_server(
    cfg: &PanelConfig,
    what: &str,
    act: impl FnOnce(&Controller, &DaemonStatus) -> Result<ServerRequest, ControlError>,
) -> Result<()> {
    let snapshot = sample_once(cfg);
    let req = act(&controller(cfg), &snapshot.status)
        .with_context(|| format!("Failed to {what} the daemon"))?;
    println!("{req:?} requested; run `status` to see the outcome");
    Ok(())
}

fn handle_toggle_auto_start(cfg: &PanelConfig) -> Result<()> {
    match controller(cfg)
        .toggle_auto_start()
        .context("Failed to toggle start at boot")?
    {
        AutoStartRequest::Submitted => {
            let after = sample_once(cfg);
            println!("start at boot: {}", after.auto_start);
        }
        AutoStartRequest::Denied => println!("authorization cancelled; nothing changed"),
    }
    Ok(())
}

fn run_watch(cfg: &PanelConfig) -> Result<()> {
    install_signal_handlers()?;

    let source = StatusSource::new(Box::new(SystemProbe::new(cfg)), cfg);
    let poller =
        Poller::spawn(source, cfg.poll_interval()).context("Failed to start status poller")?;

    let (action_tx, action_rx) = unbounded();
    spawn_stdin_reader(action_tx).context("Failed to start input reader")?;

    let panel = Panel::new(controller(cfg), poller, TerminalView);
    panel.run(action_rx, || check_signals().is_some());
    Ok(())
}

fn spawn_stdin_reader(tx: Sender<PanelAction>) -> std::io::Result<()> {
    thread::Builder::new()
        .name("stdin-actions".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let action = match line.trim() {
                    "s" => PanelAction::ToggleServer,
                    "a" => PanelAction::ToggleAutoStart,
                    "q" => PanelAction::Quit,
                    "" => continue,
                    other => {
                        eprintln!("unknown command {other:?} (s, a or q)");
                        continue;
                    }
                };
                if tx.send(action).is_err() {
                    break;
                }
            }
        })?;
    Ok(())
}

struct TerminalView;

impl PanelView for TerminalView {
    fn show(&mut self, snapshot: &PanelSnapshot, affordances: Affordances) {
        let server_button = match (affordances.can_start, affordances.can_stop) {
            (true, _) => "[s] start",
            (_, true) => "[s] stop",
            _ => "[s] (disabled)",
        };
        let boot_box = match affordances.auto_start_checked {
            Some(true) => "[x]",
            Some(false) => "[ ]",
            None => "[?]",
        };
        let boot_hint = if affordances.can_toggle_auto_start {
            "[a] toggle"
        } else {
            "[a] (disabled)"
        };
        println!(
            "{} {snapshot}\n    {server_button}   {boot_box} start at boot {boot_hint}",
            snapshot.taken_at.format("%H:%M:%S")
        );
    }

    fn notice(&mut self, message: &str) {
        println!("    -> {message}");
    }
}
