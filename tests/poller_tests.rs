//! Poll ticks and the panel loop, driven by canned probes.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use codeshelf_panel::authorization::Authorizer;
use codeshelf_panel::control::DaemonLauncher;
use codeshelf_panel::controller::{Controller, PanelAction};
use codeshelf_panel::error::{AuthorizationError, ControlError};
use codeshelf_panel::panel::{Panel, PanelView};
use codeshelf_panel::poller::{Poller, StatusSource};
use codeshelf_panel::probe::StatusProbe;
use codeshelf_panel::{Affordances, DaemonStatus, PanelSnapshot, Probe, ProbeError};
use common::{FakeProbe, config_for, write_descriptor};
use crossbeam_channel::{Receiver, Sender, unbounded};

const WAIT: Duration = Duration::from_secs(5);

fn source(probe: impl StatusProbe + 'static, descriptor: &std::path::Path) -> StatusSource {
    StatusSource::new(Box::new(probe), &config_for(descriptor))
}

#[test]
fn probes_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_descriptor(dir.path(), false);

    let snap = source(FakeProbe::new(Some(true), Some(false)), &path).sample();
    assert_eq!(
        snap.status,
        DaemonStatus {
            running: Probe::Known(true),
            registered: Probe::Known(false),
        }
    );

    let snap = source(FakeProbe::new(Some(false), Some(true)), &path).sample();
    assert_eq!(
        snap.status,
        DaemonStatus {
            running: Probe::Known(false),
            registered: Probe::Known(true),
        }
    );
}

#[test]
fn failed_process_probe_is_unknown_and_disables_server_controls() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_descriptor(dir.path(), true);

    let snap = source(FakeProbe::new(None, Some(true)), &path).sample();
    assert_eq!(snap.status.running, Probe::Unknown);
    assert_eq!(snap.status.registered, Probe::Known(true));
    assert_eq!(snap.auto_start, Probe::Known(true));

    let aff = snap.affordances();
    assert!(!aff.can_start);
    assert!(!aff.can_stop);
}

#[test]
fn unreadable_descriptor_is_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let snap = source(
        FakeProbe::new(Some(false), Some(false)),
        &dir.path().join("missing.plist"),
    )
    .sample();
    assert_eq!(snap.auto_start, Probe::Unknown);
    assert!(!snap.affordances().can_toggle_auto_start);
}

#[test]
fn descriptor_is_reread_every_tick() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_descriptor(dir.path(), false);
    let mut src = source(FakeProbe::new(Some(false), Some(true)), &path);

    assert_eq!(src.sample().auto_start, Probe::Known(false));
    write_descriptor(dir.path(), true);
    assert_eq!(src.sample().auto_start, Probe::Known(true));
}

/// Answers from a shared "world" that flips between ticks. Both answers of
/// one tick always agree, so a torn snapshot shows up as a mismatch.
struct FlippingProbe {
    world: Arc<Mutex<bool>>,
}

impl StatusProbe for FlippingProbe {
    fn is_daemon_running(&self) -> Result<bool, ProbeError> {
        let mut w = self.world.lock().unwrap();
        *w = !*w;
        Ok(*w)
    }

    fn is_daemon_registered(&self) -> Result<bool, ProbeError> {
        Ok(*self.world.lock().unwrap())
    }
}

#[test]
fn published_snapshots_are_never_torn() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_descriptor(dir.path(), false);
    let probe = FlippingProbe {
        world: Arc::new(Mutex::new(false)),
    };
    let poller = Poller::spawn(source(probe, &path), Duration::from_millis(10)).unwrap();

    let mut last_seq = 0;
    for _ in 0..20 {
        let snap = poller.snapshots().recv_timeout(WAIT).unwrap();
        assert_eq!(snap.status.running, snap.status.registered);
        assert!(snap.seq > last_seq);
        last_seq = snap.seq;
    }
    poller.shutdown();
}

#[test]
fn refresh_triggers_an_extra_tick() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_descriptor(dir.path(), false);
    let probe = FakeProbe::new(Some(false), Some(false));
    let poller = Poller::spawn(source(probe.clone(), &path), Duration::from_secs(3600)).unwrap();

    let first = poller.snapshots().recv_timeout(WAIT).unwrap();
    assert_eq!(first.seq, 1);

    probe.running.set(Some(true));
    poller.refresh();
    let second = poller.snapshots().recv_timeout(WAIT).unwrap();
    assert_eq!(second.seq, 2);
    assert_eq!(second.status.running, Probe::Known(true));
    poller.shutdown();
}

/// Each running-state answer is handed in by the test, so a tick can be held
/// open while commands queue up behind it.
struct GatedProbe(Receiver<bool>);

impl StatusProbe for GatedProbe {
    fn is_daemon_running(&self) -> Result<bool, ProbeError> {
        self.0.recv().map_err(|_| ProbeError::ToolMissing { tool: "ps".into() })
    }

    fn is_daemon_registered(&self) -> Result<bool, ProbeError> {
        Ok(true)
    }
}

#[test]
fn refresh_during_a_tick_is_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_descriptor(dir.path(), false);
    let (answer_tx, answer_rx) = unbounded();
    let poller =
        Poller::spawn(source(GatedProbe(answer_rx), &path), Duration::from_secs(3600)).unwrap();

    answer_tx.send(false).unwrap();
    let first = poller.snapshots().recv_timeout(WAIT).unwrap();
    assert_eq!(first.status.running, Probe::Known(false));

    // The second refresh is queued before the tick it follows can finish.
    poller.refresh();
    poller.refresh();
    answer_tx.send(false).unwrap();
    answer_tx.send(true).unwrap();

    let next = poller.snapshots().recv_timeout(WAIT).unwrap();
    assert_eq!(next.status.running, Probe::Known(true));
    assert_eq!(next.seq, 3);
    poller.shutdown();
}

#[test]
fn shutdown_stops_probing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_descriptor(dir.path(), false);
    let probe = FakeProbe::new(Some(false), Some(false));
    let poller = Poller::spawn(source(probe.clone(), &path), Duration::from_millis(10)).unwrap();
    poller.snapshots().recv_timeout(WAIT).unwrap();
    poller.shutdown();

    let calls = probe.running.calls.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(probe.running.calls.load(Ordering::SeqCst), calls);
}

#[derive(Clone, Default)]
struct Requests(Arc<Mutex<Vec<&'static str>>>);

struct FakeLauncher(Requests);

impl DaemonLauncher for FakeLauncher {
    fn start_daemon(&self) -> Result<(), ControlError> {
        self.0.0.lock().unwrap().push("start");
        Ok(())
    }

    fn stop_daemon(&self) -> Result<(), ControlError> {
        self.0.0.lock().unwrap().push("stop");
        Ok(())
    }
}

struct DenyingAuthorizer;

impl Authorizer for DenyingAuthorizer {
    fn run_privileged(&self, _: &std::path::Path, _: &str) -> Result<(), AuthorizationError> {
        Err(AuthorizationError::Denied)
    }
}

#[derive(Clone, Default)]
struct CountingAuthorizer(Arc<AtomicU32>);

impl Authorizer for CountingAuthorizer {
    fn run_privileged(&self, _: &std::path::Path, _: &str) -> Result<(), AuthorizationError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

enum Seen {
    Shown(PanelSnapshot, Affordances),
    Notice(String),
}

struct ChannelView(Sender<Seen>);

impl PanelView for ChannelView {
    fn show(&mut self, snapshot: &PanelSnapshot, affordances: Affordances) {
        self.0.send(Seen::Shown(snapshot.clone(), affordances)).ok();
    }

    fn notice(&mut self, message: &str) {
        self.0.send(Seen::Notice(message.to_string())).ok();
    }
}

#[test]
fn panel_applies_snapshots_and_dispatches_actions() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_descriptor(dir.path(), false);
    let probe = FakeProbe::new(Some(true), Some(true));
    let requests = Requests::default();

    let controller = Controller::new(
        Box::new(FakeLauncher(requests.clone())),
        Box::new(DenyingAuthorizer),
        "/opt/HelperTool".into(),
    );
    let poller = Poller::spawn(source(probe.clone(), &path), Duration::from_secs(3600)).unwrap();
    let (seen_tx, seen_rx) = unbounded();
    let (action_tx, action_rx) = unbounded();
    let panel = Panel::new(controller, poller, ChannelView(seen_tx));
    let runner = thread::spawn(move || panel.run(action_rx, || false));

    match seen_rx.recv_timeout(WAIT).unwrap() {
        Seen::Shown(snap, aff) => {
            assert_eq!(snap.status.running, Probe::Known(true));
            assert!(aff.can_stop);
            assert_eq!(aff.auto_start_checked, Some(false));
        }
        Seen::Notice(n) => panic!("unexpected notice {n}"),
    }

    // The stop request does not change state by itself; the refresh that
    // follows it observes whatever the probe now reports.
    probe.running.set(Some(false));
    action_tx.send(PanelAction::ToggleServer).unwrap();
    match seen_rx.recv_timeout(WAIT).unwrap() {
        Seen::Notice(n) => assert!(n.contains("Stop")),
        Seen::Shown(..) => panic!("expected a notice first"),
    }
    match seen_rx.recv_timeout(WAIT).unwrap() {
        Seen::Shown(snap, aff) => {
            assert_eq!(snap.status.running, Probe::Known(false));
            assert!(aff.can_start);
        }
        Seen::Notice(n) => panic!("unexpected notice {n}"),
    }
    assert_eq!(*requests.0.lock().unwrap(), ["stop"]);

    action_tx.send(PanelAction::ToggleAutoStart).unwrap();
    match seen_rx.recv_timeout(WAIT).unwrap() {
        Seen::Notice(n) => assert!(n.contains("cancelled")),
        Seen::Shown(..) => panic!("expected a notice"),
    }

    action_tx.send(PanelAction::Quit).unwrap();
    runner.join().unwrap();
}

#[test]
fn unreadable_descriptor_never_prompts_for_auto_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.plist");
    let auth = CountingAuthorizer::default();

    let controller = Controller::new(
        Box::new(FakeLauncher(Requests::default())),
        Box::new(auth.clone()),
        "/opt/HelperTool".into(),
    );
    let probe = FakeProbe::new(Some(false), Some(true));
    let poller = Poller::spawn(source(probe, &path), Duration::from_secs(3600)).unwrap();
    let (seen_tx, seen_rx) = unbounded();
    let (action_tx, action_rx) = unbounded();
    let panel = Panel::new(controller, poller, ChannelView(seen_tx));
    let runner = thread::spawn(move || panel.run(action_rx, || false));

    match seen_rx.recv_timeout(WAIT).unwrap() {
        Seen::Shown(_, aff) => {
            assert!(!aff.can_toggle_auto_start);
            assert_eq!(aff.auto_start_checked, None);
        }
        Seen::Notice(n) => panic!("unexpected notice {n}"),
    }

    action_tx.send(PanelAction::ToggleAutoStart).unwrap();
    match seen_rx.recv_timeout(WAIT).unwrap() {
        Seen::Notice(n) => assert!(n.contains("unknown")),
        Seen::Shown(..) => panic!("expected a notice"),
    }
    assert_eq!(auth.0.load(Ordering::SeqCst), 0);

    action_tx.send(PanelAction::Quit).unwrap();
    runner.join().unwrap();
}
