use crate::cancel::{CancelToken, Cancellation};
use crate::config::LoopConfig;
use crate::error::{Error, Result};
use crate::outcome::{ProbeEvent, ProbeId};
use crate::probe::ProbeBuilder;
use crate::runner::{panic_message, ProbeLoop};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Runs each probe loop on its own thread.
///
/// Every loop shares one [`Cancellation`] and reports to one event channel,
/// whose receiving end is available from [`Supervisor::events`].
///
/// # Example
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// use internetz_core::{IcmpConfig, IcmpProbeBuilder, LoopConfig, Supervisor};
///
/// let mut supervisor = Supervisor::new(LoopConfig::default());
/// supervisor.spawn(IcmpProbeBuilder::new(IcmpConfig::default()))?;
/// for event in supervisor.events().iter().take(3) {
///     println!("{:?}", event);
/// }
/// supervisor.shutdown();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Supervisor {
    config: LoopConfig,
    cancellation: Cancellation,
    token: CancelToken,
    sender: Sender<ProbeEvent>,
    receiver: Receiver<ProbeEvent>,
    handles: Vec<(ProbeId, JoinHandle<()>)>,
}

impl Supervisor {
    #[must_use]
    pub fn new(config: LoopConfig) -> Self {
        let (cancellation, token) = Cancellation::new();
        let (sender, receiver) = unbounded();
        Self {
            config,
            cancellation,
            token,
            sender,
            receiver,
            handles: Vec::new(),
        }
    }

    /// Start a probe loop on a new thread named `probe-<name>`.
    pub fn spawn<B: ProbeBuilder>(&mut self, builder: B) -> Result<ProbeId> {
        let id = builder.id();
        let probe_loop = ProbeLoop::new(
            builder,
            self.config,
            self.token.clone(),
            self.sender.clone(),
        );
        let handle = thread::Builder::new()
            .name(format!("probe-{}", id.name))
            .spawn(move || probe_loop.run())
            .map_err(|err| Error::Other(err.to_string()))?;
        debug!(probe = %id, "spawned probe thread");
        self.handles.push((id.clone(), handle));
        Ok(id)
    }

    /// The events of every probe, in tick order per probe.
    #[must_use]
    pub const fn events(&self) -> &Receiver<ProbeEvent> {
        &self.receiver
    }

    /// A handle which cancels every probe loop.
    #[must_use]
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    /// Observes the cancellation shared by every probe loop.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel every loop and wait for them all to exit.
    ///
    /// Returns the probes whose thread panicked outside the loop's own
    /// isolation, which should never happen.
    pub fn shutdown(self) -> Vec<ProbeId> {
        self.cancellation.cancel();
        drop(self.sender);
        let mut panicked = Vec::new();
        for (id, handle) in self.handles {
            match handle.join() {
                Ok(()) => debug!(probe = %id, "joined probe thread"),
                Err(payload) => {
                    error!(probe = %id, panic = %panic_message(payload.as_ref()), "probe thread panicked");
                    panicked.push(id);
                }
            }
        }
        info!("all probes stopped");
        panicked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{Outcome, OutcomeKind};
    use crate::probe::Probe;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    struct Fixed {
        name: &'static str,
        outcome: fn() -> Outcome,
    }

    struct FixedProbe(fn() -> Outcome);

    impl Probe for FixedProbe {
        fn check(&mut self, _deadline: Instant) -> Result<Outcome> {
            Ok((self.0)())
        }
    }

    impl ProbeBuilder for Fixed {
        type Probe = FixedProbe;

        fn id(&self) -> ProbeId {
            ProbeId::new(self.name, "127.0.0.1")
        }

        fn build(self) -> Result<FixedProbe> {
            if self.name == "broken" {
                Err(Error::Other(String::from("cannot build")))
            } else {
                Ok(FixedProbe(self.outcome))
            }
        }
    }

    fn fast() -> LoopConfig {
        LoopConfig {
            period: Duration::from_millis(10),
            timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_events_are_ordered_per_probe() -> anyhow::Result<()> {
        let mut supervisor = Supervisor::new(fast());
        supervisor.spawn(Fixed {
            name: "up",
            outcome: || Outcome::Ok(Duration::from_millis(1)),
        })?;
        supervisor.spawn(Fixed {
            name: "down",
            outcome: || Outcome::Down(crate::outcome::DownReason::Timeout),
        })?;
        assert_eq!(2, supervisor.len());

        let mut ticks: HashMap<String, Vec<(u64, OutcomeKind)>> = HashMap::new();
        for event in supervisor.events().iter().take(10) {
            let ProbeEvent::Checked(event) = event else {
                panic!("unexpected start failure");
            };
            ticks
                .entry(event.probe.name)
                .or_default()
                .push((event.tick, event.outcome.kind()));
        }
        assert!(supervisor.shutdown().is_empty());

        for (name, seen) in ticks {
            let expected_kind = if name == "up" {
                OutcomeKind::Ok
            } else {
                OutcomeKind::Down
            };
            assert!(seen.iter().all(|(_, kind)| *kind == expected_kind));
            let numbers = seen.iter().map(|(tick, _)| *tick).collect::<Vec<_>>();
            let expected = (1..=numbers.len() as u64).collect::<Vec<_>>();
            assert_eq!(expected, numbers);
        }
        Ok(())
    }

    #[test]
    fn test_start_failure_does_not_affect_others() -> anyhow::Result<()> {
        let mut supervisor = Supervisor::new(fast());
        let broken = supervisor.spawn(Fixed {
            name: "broken",
            outcome: || Outcome::Ok(Duration::ZERO),
        })?;
        supervisor.spawn(Fixed {
            name: "up",
            outcome: || Outcome::Ok(Duration::ZERO),
        })?;
        let mut failed = None;
        let mut checked = 0;
        for event in supervisor.events().iter() {
            match event {
                ProbeEvent::Failed(event) => failed = Some(event.probe),
                ProbeEvent::Checked(event) => {
                    assert_eq!("up", event.probe.name);
                    checked += 1;
                }
            }
            if failed.is_some() && checked >= 3 {
                break;
            }
        }
        assert_eq!(Some(broken), failed);
        assert!(supervisor.shutdown().is_empty());
        Ok(())
    }

    #[test]
    fn test_shutdown_joins_promptly() -> anyhow::Result<()> {
        let mut supervisor = Supervisor::new(LoopConfig {
            period: Duration::from_secs(60),
            timeout: Duration::from_secs(5),
        });
        supervisor.spawn(Fixed {
            name: "idle",
            outcome: || Outcome::Ok(Duration::ZERO),
        })?;
        let events = supervisor.events().clone();
        let start = Instant::now();
        assert!(supervisor.shutdown().is_empty());
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(events.try_recv().is_err());
        Ok(())
    }

    #[test]
    fn test_cancellation_handle_stops_loops() -> anyhow::Result<()> {
        let mut supervisor = Supervisor::new(fast());
        supervisor.spawn(Fixed {
            name: "up",
            outcome: || Outcome::Ok(Duration::ZERO),
        })?;
        let cancellation = supervisor.cancellation();
        let events = supervisor.events().clone();
        events.recv()?;
        cancellation.cancel();
        assert!(supervisor.shutdown().is_empty());
        Ok(())
    }
}
