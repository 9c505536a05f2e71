use crate::cancel::CancelToken;
use crate::config::LoopConfig;
use crate::error::{Error, Result};
use crate::outcome::{CheckEvent, FailedEvent, Outcome, ProbeEvent};
use crate::probe::{Probe, ProbeBuilder};
use crate::ticker::Ticker;
use crossbeam::channel::{at, select, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Instant, SystemTime};
use tracing::{debug, error, info, info_span};

/// Drives one probe: builds it, then checks it once per tick until cancelled.
#[derive(Debug)]
pub struct ProbeLoop<B> {
    builder: B,
    config: LoopConfig,
    cancel: CancelToken,
    events: Sender<ProbeEvent>,
}

impl<B: ProbeBuilder> ProbeLoop<B> {
    #[must_use]
    pub const fn new(
        builder: B,
        config: LoopConfig,
        cancel: CancelToken,
        events: Sender<ProbeEvent>,
    ) -> Self {
        Self {
            builder,
            config,
            cancel,
            events,
        }
    }

    /// Run the loop on the current thread.
    ///
    /// Returns when cancelled, when the observer has gone away, or straight
    /// away if the probe cannot be built. The probe (and with it any socket it
    /// owns) is dropped before returning.
    pub fn run(self) {
        let Self {
            builder,
            config,
            cancel,
            events,
        } = self;
        let id = builder.id();
        let span = info_span!("probe", probe = %id.name, target = %id.target);
        let _guard = span.enter();

        let mut probe = match guarded(move || builder.build()) {
            Ok(probe) => probe,
            Err(err) => {
                error!(error = %err, "probe failed to start; no further checks will run");
                if events
                    .send(ProbeEvent::Failed(FailedEvent {
                        probe: id,
                        error: err,
                    }))
                    .is_err()
                {
                    debug!("event channel closed");
                }
                return;
            }
        };
        debug!(period = ?config.period, timeout = ?config.timeout, "probe started");

        let mut ticker = Ticker::new(config.period, Instant::now());
        loop {
            select! {
                recv(cancel.receiver()) -> _ => break,
                recv(at(ticker.next_deadline())) -> _ => {}
            }
            if cancel.is_cancelled() {
                break;
            }
            let tick = ticker.advance();
            let deadline = Instant::now() + config.timeout;
            let outcome = match guarded(|| probe.check(deadline)) {
                Ok(outcome) => outcome,
                Err(err) => Outcome::Error(err),
            };
            if cancel.is_cancelled() {
                debug!(tick, "cancelled during check, outcome discarded");
                break;
            }
            match &outcome {
                Outcome::Ok(latency) => info!(tick, ?latency, "ok"),
                Outcome::Down(reason) => info!(tick, %reason, "down"),
                Outcome::Error(err) => error!(tick, error = %err, "error"),
            }
            let event = CheckEvent {
                probe: id.clone(),
                tick,
                outcome,
                at: SystemTime::now(),
            };
            if events.send(ProbeEvent::Checked(event)).is_err() {
                debug!("event channel closed");
                break;
            }
        }
        drop(probe);
        info!("probe stopped");
    }
}

/// Run `f`, turning a panic into [`Error::Panicked`].
fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(payload.as_ref()))))
}

/// The message carried by a panic payload, if it has one.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| (*msg).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("unknown panic"))
}
