//! The `ICMP` echo probe.
//!
//! The socket is negotiated once, when the probe is built (see
//! [`SocketStrategy`]), and every check is a single [`EchoTransaction`] on it.

use crate::config::{IcmpConfig, MAX_PACKET_SIZE};
use crate::error::Result;
use crate::net::socket::Socket;
use crate::net::SocketImpl;
use crate::outcome::{Outcome, ProbeId};
use crate::probe::{Probe, ProbeBuilder};
use internetz_privilege::{Capabilities, NetRaw, PrivilegeManager};
use std::marker::PhantomData;
use std::net::Ipv4Addr;
use std::time::Instant;
use tracing::info;

mod endpoint;
mod strategy;
mod transaction;

pub use endpoint::{IcmpEndpoint, IcmpMode, Received};
pub use strategy::SocketStrategy;
pub use transaction::{EchoRequest, EchoTransaction};

/// The echo identifier: the low 16 bits of the process id.
#[must_use]
pub fn echo_identifier() -> u16 {
    std::process::id() as u16
}

/// Builds an [`IcmpProbe`].
#[derive(Debug)]
pub struct IcmpProbeBuilder<S = SocketImpl, C = NetRaw> {
    config: IcmpConfig,
    strategy: SocketStrategy<C>,
    identifier: u16,
    _socket: PhantomData<fn() -> S>,
}

impl IcmpProbeBuilder {
    #[must_use]
    pub fn new(config: IcmpConfig) -> Self {
        Self::with_privilege(config, PrivilegeManager::system())
    }
}

impl<S, C: Capabilities> IcmpProbeBuilder<S, C> {
    #[must_use]
    pub fn with_privilege(config: IcmpConfig, privilege: PrivilegeManager<C>) -> Self {
        Self {
            config,
            strategy: SocketStrategy::new(privilege),
            identifier: echo_identifier(),
            _socket: PhantomData,
        }
    }
}

impl<S, C> ProbeBuilder for IcmpProbeBuilder<S, C>
where
    S: Socket + 'static,
    C: Capabilities + Send + 'static,
{
    type Probe = IcmpProbe<S>;

    fn id(&self) -> ProbeId {
        ProbeId::new("icmp", self.config.target.to_string())
    }

    fn build(self) -> Result<IcmpProbe<S>> {
        let endpoint = self.strategy.negotiate::<S>()?;
        info!(mode = %endpoint.mode(), identifier = self.identifier, "icmp probe ready");
        Ok(IcmpProbe {
            endpoint,
            target: self.config.target,
            identifier: self.identifier,
            sequence: 0,
            payload: self.config.payload,
            buf: vec![0; MAX_PACKET_SIZE],
        })
    }
}

/// Sends one echo request per check and waits for its reply.
#[derive(Debug)]
pub struct IcmpProbe<S> {
    endpoint: IcmpEndpoint<S>,
    target: Ipv4Addr,
    identifier: u16,
    sequence: u16,
    payload: Vec<u8>,
    buf: Vec<u8>,
}

impl<S: Socket> IcmpProbe<S> {
    #[must_use]
    pub const fn mode(&self) -> IcmpMode {
        self.endpoint.mode()
    }
}

impl<S: Socket> Probe for IcmpProbe<S> {
    fn check(&mut self, deadline: Instant) -> Result<Outcome> {
        self.sequence = self.sequence.wrapping_add(1);
        let request = EchoRequest {
            target: self.target,
            identifier: self.identifier,
            sequence: self.sequence,
            payload: &self.payload,
        };
        EchoTransaction::new(&mut self.endpoint, request, &mut self.buf).execute(deadline)
    }
}
