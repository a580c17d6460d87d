use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select, tick};

use crate::autostart;
use crate::config::PanelConfig;
use crate::probe::StatusProbe;
use crate::status::{DaemonStatus, PanelSnapshot, Probe};

/// Snapshot queue size. A slow UI blocks the poller instead of growing it.
const BUS_BOUND: usize = 8;

/// Everything a tick reads, bundled so it can move to the poll thread.
pub struct StatusSource {
    probe: Box<dyn StatusProbe>,
    launch_descriptor: PathBuf,
    run_at_load_key: String,
    seq: u64,
}

impl StatusSource {
    pub fn new(probe: Box<dyn StatusProbe>, cfg: &PanelConfig) -> Self {
        Self {
            probe,
            launch_descriptor: cfg.launch_descriptor.clone(),
            run_at_load_key: cfg.run_at_load_key.clone(),
            seq: 0,
        }
    }

    /// Take one complete snapshot. Nothing is carried over from earlier
    /// ticks except the sequence number.
    pub fn sample(&mut self) -> PanelSnapshot {
        let running = self
            .probe
            .is_daemon_running()
            .inspect_err(|e| log::warn!("process probe failed: {e}"));
        let registered = self
            .probe
            .is_daemon_registered()
            .inspect_err(|e| log::warn!("registration probe failed: {e}"));
        let auto_start =
            match autostart::read_run_at_load(&self.launch_descriptor, &self.run_at_load_key) {
                Ok(v) => Probe::Known(v),
                Err(e) => {
                    log::warn!("{e}");
                    Probe::Unknown
                }
            };

        self.seq += 1;
        let snapshot = PanelSnapshot {
            seq: self.seq,
            taken_at: chrono::Utc::now(),
            status: DaemonStatus {
                running: running.into(),
                registered: registered.into(),
            },
            auto_start,
        };
        log::debug!("tick {}: {snapshot}", snapshot.seq);
        snapshot
    }
}

enum PollerCmd {
    Refresh,
    Shutdown,
}

/// Background thread sampling a [`StatusSource`] on a fixed interval.
///
/// Each snapshot crosses the channel as one value, so a receiver never sees
/// the two probe answers from different ticks.
pub struct Poller {
    snapshots: Receiver<PanelSnapshot>,
    cmd_tx: Sender<PollerCmd>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling. The first snapshot is taken immediately.
    pub fn spawn(source: StatusSource, interval: Duration) -> std::io::Result<Self> {
        let (snap_tx, snapshots) = bounded(BUS_BOUND);
        let (cmd_tx, cmd_rx) = bounded(BUS_BOUND);
        let handle = thread::Builder::new()
            .name("status-poller".into())
            .spawn(move || poll_loop(source, interval, snap_tx, cmd_rx))?;
        Ok(Self {
            snapshots,
            cmd_tx,
            handle: Some(handle),
        })
    }

    pub fn snapshots(&self) -> &Receiver<PanelSnapshot> {
        &self.snapshots
    }

    /// Ask for an extra tick now instead of waiting for the timer.
    pub fn refresh(&self) {
        self.cmd_tx.try_send(PollerCmd::Refresh).ok();
    }

    /// Stop the thread. A tick in progress finishes but is not delivered.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.cmd_tx.send(PollerCmd::Shutdown).ok();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("status poller panicked");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

fn poll_loop(
    mut source: StatusSource,
    interval: Duration,
    snap_tx: Sender<PanelSnapshot>,
    cmd_rx: Receiver<PollerCmd>,
) {
    let ticker = tick(interval);
    let mut pending = Some(source.sample());

    loop {
        if let Some(snapshot) = pending.take() {
            // Deliver, unless told to stop while the receiver is behind.
            select! {
                send(snap_tx, snapshot) -> res => {
                    if res.is_err() {
                        break;
                    }
                }
                recv(cmd_rx) -> cmd => match cmd {
                    Ok(PollerCmd::Refresh) => pending = Some(source.sample()),
                    Ok(PollerCmd::Shutdown) | Err(_) => break,
                },
            }
            continue;
        }

        select! {
            recv(ticker) -> _ => pending = Some(source.sample()),
            recv(cmd_rx) -> cmd => match cmd {
                Ok(PollerCmd::Refresh) => pending = Some(source.sample()),
                Ok(PollerCmd::Shutdown) | Err(_) => break,
            },
        }

        // Commands that arrived during the probes: a shutdown wins over
        // delivery, a refresh replaces the snapshot just taken.
        match cmd_rx.try_recv() {
            Ok(PollerCmd::Shutdown) => break,
            Ok(PollerCmd::Refresh) => pending = Some(source.sample()),
            Err(_) => {}
        }
    }
    log::debug!("status poller stopped");
}
