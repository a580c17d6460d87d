//! The panel's event loop: apply snapshots to a view, dispatch actions.

use std::time::Duration;

use crossbeam_channel::{Receiver, never, select, tick};

use crate::controller::{AutoStartRequest, Controller, PanelAction};
use crate::error::ControlError;
use crate::poller::Poller;
use crate::status::{Affordances, DaemonStatus, PanelSnapshot};

/// Rendering side of the panel.
pub trait PanelView {
    /// Show a freshly polled snapshot with the controls it allows.
    fn show(&mut self, snapshot: &PanelSnapshot, affordances: Affordances);

    /// Report the result of a user action.
    fn notice(&mut self, message: &str);
}

pub struct Panel<V: PanelView> {
    controller: Controller,
    poller: Poller,
    view: V,
    latest: Option<PanelSnapshot>,
}

impl<V: PanelView> Panel<V> {
    pub fn new(controller: Controller, poller: Poller, view: V) -> Self {
        Self {
            controller,
            poller,
            view,
            latest: None,
        }
    }

    /// Status as of the last applied snapshot; unknown before the first.
    pub fn status(&self) -> DaemonStatus {
        self.latest
            .as_ref()
            .map_or(DaemonStatus::UNKNOWN, |s| s.status)
    }

    /// Run until `Quit`, the poller stops, or `should_stop` returns true.
    ///
    /// A closed action channel does not end the loop.
    pub fn run(mut self, actions: Receiver<PanelAction>, should_stop: impl Fn() -> bool) -> V {
        let stop_tick = tick(Duration::from_millis(200));
        let snapshots = self.poller.snapshots().clone();
        let mut actions = Some(actions);

        loop {
            let action_rx = actions.clone().unwrap_or_else(never);
            select! {
                recv(snapshots) -> snap => match snap {
                    Ok(snap) => self.apply(snap),
                    Err(_) => break,
                },
                recv(action_rx) -> action => match action {
                    Ok(PanelAction::Quit) => break,
                    Ok(action) => self.dispatch(action),
                    Err(_) => actions = None,
                },
                recv(stop_tick) -> _ => {
                    if should_stop() {
                        log::info!("stop requested");
                        break;
                    }
                }
            }
        }

        self.poller.shutdown();
        self.view
    }

    /// The checkbox is live only once a snapshot has read the descriptor.
    fn auto_start_known(&self) -> bool {
        self.latest
            .as_ref()
            .is_some_and(|s| s.affordances().can_toggle_auto_start)
    }

    fn apply(&mut self, snapshot: PanelSnapshot) {
        let changed = self
            .latest
            .as_ref()
            .is_none_or(|prev| !prev.same_view(&snapshot));
        if changed {
            log::info!("{snapshot}");
            self.view.show(&snapshot, snapshot.affordances());
        }
        self.latest = Some(snapshot);
    }

    fn dispatch(&mut self, action: PanelAction) {
        let message = match action {
            PanelAction::ToggleServer => match self.controller.toggle_server(&self.status()) {
                Ok(req) => format!("{req:?} requested"),
                Err(e) => failure(&e),
            },
            PanelAction::ToggleAutoStart if !self.auto_start_known() => {
                failure(&ControlError::AutoStartUnknown)
            }
            PanelAction::ToggleAutoStart => match self.controller.toggle_auto_start() {
                Ok(AutoStartRequest::Submitted) => "start-at-boot change submitted".to_string(),
                Ok(AutoStartRequest::Denied) => "authorization cancelled".to_string(),
                Err(e) => failure(&e),
            },
            PanelAction::Quit => return,
        };
        self.view.notice(&message);
        self.poller.refresh();
    }
}

fn failure(e: &ControlError) -> String {
    log::warn!("{e}");
    e.to_string()
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::authorization::Authorizer;
    use crate::config::PanelConfig;
    use crate::control::DaemonLauncher;
    use crate::error::{AuthorizationError, ProbeError};
    use crate::poller::StatusSource;
    use crate::probe::StatusProbe;
    use crate::status::Probe;

    struct Stopped;

    impl StatusProbe for Stopped {
        fn is_daemon_running(&self) -> Result<bool, ProbeError> {
            Ok(false)
        }
        fn is_daemon_registered(&self) -> Result<bool, ProbeError> {
            Ok(true)
        }
    }

    struct NoLauncher;

    impl DaemonLauncher for NoLauncher {
        fn start_daemon(&self) -> Result<(), ControlError> {
            Ok(())
        }
        fn stop_daemon(&self) -> Result<(), ControlError> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CountingAuthorizer(Arc<AtomicU32>);

    impl Authorizer for CountingAuthorizer {
        fn run_privileged(&self, _: &Path, _: &str) -> Result<(), AuthorizationError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Notes(Vec<String>);

    impl PanelView for Notes {
        fn show(&mut self, _: &PanelSnapshot, _: Affordances) {}
        fn notice(&mut self, message: &str) {
            self.0.push(message.to_string());
        }
    }

    fn panel(descriptor: &Path, auth: &CountingAuthorizer) -> Panel<Notes> {
        let cfg = PanelConfig {
            launch_descriptor: descriptor.to_path_buf(),
            ..PanelConfig::default()
        };
        let source = StatusSource::new(Box::new(Stopped), &cfg);
        let poller = Poller::spawn(source, Duration::from_secs(3600)).unwrap();
        let controller = Controller::new(
            Box::new(NoLauncher),
            Box::new(auth.clone()),
            "/opt/HelperTool".into(),
        );
        Panel::new(controller, poller, Notes::default())
    }

    #[test]
    fn auto_start_toggle_waits_for_first_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let auth = CountingAuthorizer::default();
        let mut panel = panel(&dir.path().join("daemon.plist"), &auth);

        assert_eq!(panel.status(), DaemonStatus::UNKNOWN);
        panel.dispatch(PanelAction::ToggleAutoStart);
        assert_eq!(auth.0.load(Ordering::SeqCst), 0);
        assert!(panel.view.0[0].contains("unknown"));
    }

    #[test]
    fn unreadable_descriptor_blocks_auto_start_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let auth = CountingAuthorizer::default();
        let mut panel = panel(&dir.path().join("missing.plist"), &auth);

        let snap = panel.poller.snapshots().recv().unwrap();
        assert_eq!(snap.auto_start, Probe::Unknown);
        panel.apply(snap);
        panel.dispatch(PanelAction::ToggleAutoStart);
        assert_eq!(auth.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn readable_descriptor_reaches_the_authorizer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.plist");
        let mut dict = plist::Dictionary::new();
        dict.insert("RunAtLoad".into(), plist::Value::Boolean(false));
        plist::Value::Dictionary(dict).to_file_xml(&path).unwrap();
        let auth = CountingAuthorizer::default();
        let mut panel = panel(&path, &auth);

        let snap = panel.poller.snapshots().recv().unwrap();
        panel.apply(snap);
        panel.dispatch(PanelAction::ToggleAutoStart);
        assert_eq!(auth.0.load(Ordering::SeqCst), 1);
        assert_eq!(panel.view.0, ["start-at-boot change submitted"]);
    }
}
