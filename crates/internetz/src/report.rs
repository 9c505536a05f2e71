use crossbeam::channel::{select, Receiver};
use internetz_core::{
    CancelToken, Cancellation, CheckEvent, FailedEvent, OutcomeKind, ProbeEvent, ProbeId,
    StartupFailure,
};
use itertools::Itertools;
use std::time::Duration;
use tracing::{error, info, warn};

/// A change in whether a layer is reachable.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Transition {
    /// The first outcome seen for a probe.
    Initial { up: bool },
    Up,
    Down,
}

/// Per-probe counts for the shutdown summary.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Summary {
    pub probe: ProbeId,
    pub ok: u64,
    pub down: u64,
    pub error: u64,
    /// The number of `up -> down` and `down -> up` changes.
    pub transitions: u64,
    pub failed: bool,
    pub mean_latency: Option<Duration>,
}

#[derive(Debug, Default)]
struct ProbeStats {
    up: Option<bool>,
    ok: u64,
    down: u64,
    error: u64,
    transitions: u64,
    failed: bool,
    latency: Duration,
}

impl ProbeStats {
    fn observe(&mut self, kind: OutcomeKind) -> Option<Transition> {
        match kind {
            OutcomeKind::Ok => self.ok += 1,
            OutcomeKind::Down => self.down += 1,
            OutcomeKind::Error => self.error += 1,
        }
        let up = kind == OutcomeKind::Ok;
        match self.up.replace(up) {
            None => Some(Transition::Initial { up }),
            Some(prev) if prev == up => None,
            Some(_) => {
                self.transitions += 1;
                Some(if up { Transition::Up } else { Transition::Down })
            }
        }
    }

    fn summary(&self, probe: &ProbeId) -> Summary {
        Summary {
            probe: probe.clone(),
            ok: self.ok,
            down: self.down,
            error: self.error,
            transitions: self.transitions,
            failed: self.failed,
            mean_latency: u32::try_from(self.ok)
                .ok()
                .and_then(|ok| self.latency.checked_div(ok)),
        }
    }
}

/// Consumes probe events and reports on the state of each layer.
#[derive(Debug)]
pub struct Reporter {
    policy: StartupFailure,
    cancellation: Cancellation,
    probes: Vec<(ProbeId, ProbeStats)>,
}

impl Reporter {
    pub const fn new(policy: StartupFailure, cancellation: Cancellation) -> Self {
        Self {
            policy,
            cancellation,
            probes: Vec::new(),
        }
    }

    /// Track a probe; the summary lists probes in the order they were registered.
    pub fn register(&mut self, probe: ProbeId) {
        if !self.probes.iter().any(|(id, _)| *id == probe) {
            self.probes.push((probe, ProbeStats::default()));
        }
    }

    /// Consume events until cancelled or every sender has gone.
    pub fn run(&mut self, events: &Receiver<ProbeEvent>, token: &CancelToken) {
        loop {
            select! {
                recv(events) -> event => match event {
                    Ok(event) => self.record(event),
                    Err(_) => break,
                },
                recv(token.receiver()) -> _ => break,
            }
        }
    }

    /// Record the events still queued after the probes have stopped.
    pub fn drain(&mut self, events: impl IntoIterator<Item = ProbeEvent>) {
        for event in events {
            self.record(event);
        }
    }

    pub fn record(&mut self, event: ProbeEvent) {
        match event {
            ProbeEvent::Checked(event) => self.record_check(&event),
            ProbeEvent::Failed(event) => self.record_failure(&event),
        }
    }

    fn record_check(&mut self, event: &CheckEvent) {
        let kind = event.outcome.kind();
        let stats = self.stats_mut(&event.probe);
        if let Some(latency) = event.outcome.latency() {
            stats.latency += latency;
        }
        match stats.observe(kind) {
            Some(Transition::Initial { up: true }) => {
                info!(probe = %event.probe, "layer up");
            }
            Some(Transition::Initial { up: false }) => {
                warn!(probe = %event.probe, outcome = %kind, "layer down");
            }
            Some(Transition::Up) => {
                warn!(probe = %event.probe, tick = event.tick, "layer down -> up");
            }
            Some(Transition::Down) => {
                warn!(probe = %event.probe, tick = event.tick, outcome = %kind, "layer up -> down");
            }
            None => {}
        }
    }

    fn record_failure(&mut self, event: &FailedEvent) {
        self.stats_mut(&event.probe).failed = true;
        match self.policy {
            StartupFailure::Isolate => {
                warn!(probe = %event.probe, error = %event.error, "probe stopped, others continue");
                if self.probes.iter().all(|(_, stats)| stats.failed) {
                    warn!("no probes running, waiting for a shutdown signal");
                }
            }
            StartupFailure::Shutdown => {
                error!(probe = %event.probe, error = %event.error, "probe failed to start, shutting down");
                self.cancellation.cancel();
            }
        }
    }

    fn stats_mut(&mut self, probe: &ProbeId) -> &mut ProbeStats {
        let index = match self.probes.iter().position(|(id, _)| id == probe) {
            Some(index) => index,
            None => {
                self.probes.push((probe.clone(), ProbeStats::default()));
                self.probes.len() - 1
            }
        };
        &mut self.probes[index].1
    }

    pub fn summary(&self) -> Vec<Summary> {
        self.probes
            .iter()
            .map(|(probe, stats)| stats.summary(probe))
            .collect()
    }

    pub fn log_summary(&self) {
        for summary in self.summary() {
            if summary.failed {
                info!(probe = %summary.probe, "summary: failed to start");
            } else {
                info!(
                    probe = %summary.probe,
                    ok = summary.ok,
                    down = summary.down,
                    error = summary.error,
                    transitions = summary.transitions,
                    mean_latency = ?summary.mean_latency,
                    "summary"
                );
            }
        }
        let failed = self
            .probes
            .iter()
            .filter(|(_, stats)| stats.failed)
            .map(|(probe, _)| probe)
            .join(", ");
        if !failed.is_empty() {
            warn!(%failed, "probes which failed to start");
        }
    }
}
