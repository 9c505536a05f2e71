use crate::error::Result;
use crate::outcome::{Outcome, ProbeId};
use std::time::Instant;

/// A periodic check of one network layer.
///
/// A probe is built once, on its own thread, and then checked once per tick.
/// Any state it needs between ticks (an open socket, a resolver) lives in
/// the probe and is dropped with it when the loop ends.
#[cfg_attr(test, mockall::automock)]
pub trait Probe {
    /// Perform a single check, which must complete by `deadline`.
    ///
    /// A check which sees no response by the deadline returns
    /// [`Outcome::Down`]. An `Err` is reported as [`Outcome::Error`] and does
    /// not stop the loop.
    fn check(&mut self, deadline: Instant) -> Result<Outcome>;
}

/// Builds a [`Probe`] on the thread that will run it.
pub trait ProbeBuilder: Send + 'static {
    type Probe: Probe;

    /// The identity reported with every event of the probe.
    fn id(&self) -> ProbeId;

    /// Construct the probe.
    ///
    /// Failure here is terminal for the probe.
    fn build(self) -> Result<Self::Probe>;
}
