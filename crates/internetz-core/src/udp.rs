//! The `UDP` send probe.
//!
//! `UDP` has no handshake, so `Ok` only means the datagram left the host. The
//! socket is connected, which lets the kernel report an `ICMP` port or host
//! unreachable from a previous datagram as an error on the next send.

use crate::config::UdpConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::net::socket::Socket;
use crate::net::SocketImpl;
use crate::outcome::{DownReason, Outcome, ProbeId};
use crate::probe::{Probe, ProbeBuilder};
use std::io;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, instrument};

/// Builds a [`UdpProbe`].
#[derive(Debug)]
pub struct UdpProbeBuilder<S = SocketImpl> {
    config: UdpConfig,
    _socket: PhantomData<fn() -> S>,
}

impl<S> UdpProbeBuilder<S> {
    #[must_use]
    pub const fn new(config: UdpConfig) -> Self {
        Self {
            config,
            _socket: PhantomData,
        }
    }
}

impl<S: Socket + 'static> ProbeBuilder for UdpProbeBuilder<S> {
    type Probe = UdpProbe<S>;

    fn id(&self) -> ProbeId {
        ProbeId::new("udp", self.config.target.to_string())
    }

    fn build(self) -> Result<UdpProbe<S>> {
        let mut socket = match self.config.target {
            SocketAddr::V4(_) => S::new_udp_dgram_socket_ipv4(),
            SocketAddr::V6(_) => S::new_udp_dgram_socket_ipv6(),
        }?;
        socket.connect(self.config.target)?;
        debug!(local = ?socket.local_addr().ok().flatten(), "udp socket connected");
        Ok(UdpProbe {
            socket,
            payload: self.config.payload,
        })
    }
}

/// Sends one datagram per check on a connected socket.
#[derive(Debug)]
pub struct UdpProbe<S> {
    socket: S,
    payload: Vec<u8>,
}

impl<S: Socket> Probe for UdpProbe<S> {
    #[instrument(skip_all, level = "debug")]
    fn check(&mut self, _deadline: Instant) -> Result<Outcome> {
        let start = Instant::now();
        match self.socket.send(&self.payload) {
            Ok(()) => Ok(Outcome::Ok(start.elapsed())),
            Err(err) => match err.kind() {
                ErrorKind::Std(io::ErrorKind::ConnectionRefused) => {
                    Ok(Outcome::Down(DownReason::Refused))
                }
                kind if kind.is_unreachable() => Ok(Outcome::Down(DownReason::Unreachable)),
                _ => Err(Error::SendFailed(err)),
            },
        }
    }
}
