use internetz_core::{HostAddrs, Platform};
use tracing::{info, warn};

/// Log the host's interface addresses and the local address of its default route.
pub fn log_host_addrs<P: Platform>() -> Option<HostAddrs> {
    match HostAddrs::discover::<P>() {
        Ok(addrs) => {
            if addrs.interfaces.is_empty() {
                warn!("no external interface addresses");
            }
            for interface in &addrs.interfaces {
                info!(interface = %interface.name, addr = %interface.addr, "interface address");
            }
            match addrs.default_route {
                Some(addr) => info!(%addr, "default route local address"),
                None => warn!("no default route"),
            }
            Some(addrs)
        }
        Err(err) => {
            warn!(error = %err, "failed to discover host addresses");
            None
        }
    }
}
