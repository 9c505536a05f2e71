use crate::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{Duration, SystemTime};

/// The result of a single check.
#[derive(Debug)]
pub enum Outcome {
    /// The layer responded, after the given latency.
    Ok(Duration),
    /// The layer did not respond.
    Down(DownReason),
    /// Something unexpected happened.
    Error(Error),
}

impl Outcome {
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::Ok(_) => OutcomeKind::Ok,
            Self::Down(_) => OutcomeKind::Down,
            Self::Error(_) => OutcomeKind::Error,
        }
    }

    #[must_use]
    pub const fn latency(&self) -> Option<Duration> {
        match self {
            Self::Ok(latency) => Some(*latency),
            _ => None,
        }
    }
}

/// The kind of an [`Outcome`], without its detail.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OutcomeKind {
    Ok,
    Down,
    Error,
}

impl Display for OutcomeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Down => write!(f, "down"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Why a layer was considered down.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DownReason {
    /// No response before the check deadline.
    Timeout,
    /// The host or network is unreachable.
    Unreachable,
    /// The peer actively refused.
    Refused,
    /// No resolver could be contacted.
    NoConnection,
    /// The server answered with a status other than `200 OK`.
    Status(u16),
}

impl Display for DownReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::Refused => write!(f, "refused"),
            Self::NoConnection => write!(f, "no connection"),
            Self::Status(status) => write!(f, "status {status}"),
        }
    }
}

/// Identifies a probe: its layer name and what it targets.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ProbeId {
    pub name: String,
    pub target: String,
}

impl ProbeId {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }
}

impl Display for ProbeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.target)
    }
}

/// An event emitted by a probe loop.
#[derive(Debug)]
pub enum ProbeEvent {
    /// A tick completed.
    Checked(CheckEvent),
    /// The probe could not be built; no ticks will follow.
    Failed(FailedEvent),
}

impl ProbeEvent {
    #[must_use]
    pub const fn probe(&self) -> &ProbeId {
        match self {
            Self::Checked(event) => &event.probe,
            Self::Failed(event) => &event.probe,
        }
    }
}

/// The outcome of one tick.
#[derive(Debug)]
pub struct CheckEvent {
    pub probe: ProbeId,
    /// The tick number, starting at 1.
    pub tick: u64,
    pub outcome: Outcome,
    /// When the check completed.
    pub at: SystemTime,
}

/// A probe which failed to start.
#[derive(Debug)]
pub struct FailedEvent {
    pub probe: ProbeId,
    pub error: Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&Outcome::Ok(Duration::from_millis(50)), OutcomeKind::Ok, Some(Duration::from_millis(50)))]
    #[test_case(&Outcome::Down(DownReason::Timeout), OutcomeKind::Down, None)]
    #[test_case(&Outcome::Error(Error::MissingAddr), OutcomeKind::Error, None)]
    fn test_outcome(outcome: &Outcome, kind: OutcomeKind, latency: Option<Duration>) {
        assert_eq!(kind, outcome.kind());
        assert_eq!(latency, outcome.latency());
    }

    #[test_case(DownReason::Timeout, "timeout")]
    #[test_case(DownReason::NoConnection, "no connection")]
    #[test_case(DownReason::Status(503), "status 503")]
    fn test_down_reason_display(reason: DownReason, expected: &str) {
        assert_eq!(expected, reason.to_string());
    }

    #[test]
    fn test_probe_id_display() {
        assert_eq!("icmp (1.1.1.1)", ProbeId::new("icmp", "1.1.1.1").to_string());
    }
}
