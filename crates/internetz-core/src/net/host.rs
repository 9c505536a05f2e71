use crate::error::Result;
use crate::net::platform::{InterfaceAddr, Platform};
use std::net::{IpAddr, Ipv4Addr};
use tracing::debug;

/// The address used to find the default route's local address.
pub const ROUTE_PROBE_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));

/// The port used to find the default route's local address.
pub const ROUTE_PROBE_PORT: u16 = 53;

/// The host's externally relevant addresses.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HostAddrs {
    /// Addresses of non-loopback, non-container interfaces.
    pub interfaces: Vec<InterfaceAddr>,
    /// The local address of the default route, if there is one.
    pub default_route: Option<IpAddr>,
}

impl HostAddrs {
    /// Discover the host's addresses.
    ///
    /// A host without a default route is a legitimate (and interesting)
    /// state during an outage, so failing to find one is not an error.
    pub fn discover<P: Platform>() -> Result<Self> {
        let interfaces = P::interface_addrs()?
            .into_iter()
            .filter(InterfaceAddr::is_external)
            .collect();
        let default_route = match P::discover_local_addr(ROUTE_PROBE_ADDR, ROUTE_PROBE_PORT) {
            Ok(addr) => Some(addr),
            Err(err) => {
                debug!(error = %err, "no default route");
                None
            }
        };
        Ok(Self {
            interfaces,
            default_route,
        })
    }
}
