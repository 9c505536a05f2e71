use crate::error::{Error, Result};
use crate::icmp::endpoint::IcmpEndpoint;
use crate::net::socket::Socket;
use internetz_privilege::{Capabilities, NetRaw, PrivilegeManager};
use tracing::{debug, error, info, instrument};

/// Chooses how to open the `ICMP` socket.
///
/// An unprivileged datagram socket is preferred. Only if the kernel refuses
/// one (for instance the process is outside `net.ipv4.ping_group_range`) is
/// `CAP_NET_RAW` raised, for exactly as long as it takes to open a raw socket.
#[derive(Debug, Clone, Default)]
pub struct SocketStrategy<C = NetRaw> {
    privilege: PrivilegeManager<C>,
}

impl<C: Capabilities> SocketStrategy<C> {
    #[must_use]
    pub const fn new(privilege: PrivilegeManager<C>) -> Self {
        Self { privilege }
    }

    /// Open an `ICMP` endpoint.
    ///
    /// Fails with [`Error::RawSocket`] when neither kind of socket can be opened.
    #[instrument(skip(self), level = "debug")]
    pub fn negotiate<S: Socket>(&self) -> Result<IcmpEndpoint<S>> {
        match S::new_icmp_dgram_socket_ipv4() {
            Ok(socket) => {
                info!("using unprivileged icmp datagram socket");
                return Ok(IcmpEndpoint::Datagram(socket));
            }
            Err(err) => debug!(error = %err, "unprivileged icmp socket unavailable"),
        }
        let grant = self.privilege.acquire();
        if !grant.is_acquired() {
            debug!("CAP_NET_RAW not effective, attempting raw socket anyway");
        }
        let raw = S::new_icmp_raw_socket_ipv4();
        if let Err(err) = grant.release() {
            error!(error = %err, "failed to release CAP_NET_RAW after opening raw icmp socket");
        }
        match raw {
            Ok(socket) => {
                info!("using privileged raw icmp socket");
                Ok(IcmpEndpoint::Raw(socket))
            }
            Err(err) => Err(Error::RawSocket(err)),
        }
    }
}
