//! The `TCP` handshake probe.

use crate::config::TcpConfig;
use crate::error::{Error, ErrorKind, IoError, Result};
use crate::net::socket::{Socket, SocketError};
use crate::net::SocketImpl;
use crate::outcome::{DownReason, Outcome, ProbeId};
use crate::probe::{Probe, ProbeBuilder};
use std::io;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::instrument;

/// Builds a [`TcpProbe`].
#[derive(Debug)]
pub struct TcpProbeBuilder<S = SocketImpl> {
    config: TcpConfig,
    _socket: PhantomData<fn() -> S>,
}

impl<S> TcpProbeBuilder<S> {
    #[must_use]
    pub const fn new(config: TcpConfig) -> Self {
        Self {
            config,
            _socket: PhantomData,
        }
    }
}

impl<S: Socket + 'static> ProbeBuilder for TcpProbeBuilder<S> {
    type Probe = TcpProbe<S>;

    fn id(&self) -> ProbeId {
        ProbeId::new("tcp", self.config.target.to_string())
    }

    fn build(self) -> Result<TcpProbe<S>> {
        Ok(TcpProbe {
            target: self.config.target,
            _socket: PhantomData,
        })
    }
}

/// Opens (and immediately closes) a fresh connection per check.
#[derive(Debug)]
pub struct TcpProbe<S> {
    target: SocketAddr,
    _socket: PhantomData<fn() -> S>,
}

impl<S: Socket> Probe for TcpProbe<S> {
    #[instrument(skip(self), level = "debug")]
    fn check(&mut self, deadline: Instant) -> Result<Outcome> {
        let mut socket = match self.target {
            SocketAddr::V4(_) => S::new_stream_socket_ipv4(),
            SocketAddr::V6(_) => S::new_stream_socket_ipv6(),
        }?;
        let start = Instant::now();
        match socket.connect(self.target) {
            Ok(()) => return Ok(Outcome::Ok(start.elapsed())),
            Err(err) => match err.kind() {
                ErrorKind::InProgress => {}
                ErrorKind::Std(io::ErrorKind::ConnectionRefused) => {
                    return Ok(Outcome::Down(DownReason::Refused));
                }
                kind if kind.is_unreachable() => {
                    return Ok(Outcome::Down(DownReason::Unreachable));
                }
                _ => return Err(Error::IoError(err)),
            },
        }
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Outcome::Down(DownReason::Timeout));
            }
            if socket.is_writable(remaining)? {
                break;
            }
        }
        let latency = start.elapsed();
        match socket.take_error()? {
            None => Ok(Outcome::Ok(latency)),
            Some(SocketError::ConnectionRefused) => Ok(Outcome::Down(DownReason::Refused)),
            Some(SocketError::HostUnreachable | SocketError::NetUnreachable) => {
                Ok(Outcome::Down(DownReason::Unreachable))
            }
            Some(SocketError::Other(err)) => Err(Error::IoError(IoError::Connect(err, self.target))),
        }
    }
}
