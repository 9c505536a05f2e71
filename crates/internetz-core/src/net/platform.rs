use crate::error::Result;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::*;

/// Platform specific operations.
///
/// Address discovery used to describe the host's network at startup.
#[cfg_attr(test, mockall::automock)]
pub trait Platform {
    /// All IPv4 addresses assigned to local interfaces.
    fn interface_addrs() -> Result<Vec<InterfaceAddr>>;

    /// Discover a local `IpAddr` which can route to the target address.
    ///
    /// No packets are sent.
    fn discover_local_addr(target_addr: IpAddr, port: u16) -> Result<IpAddr>;
}

/// An address assigned to a named interface.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InterfaceAddr {
    pub name: String,
    pub addr: IpAddr,
}

impl InterfaceAddr {
    #[must_use]
    pub const fn new(name: String, addr: IpAddr) -> Self {
        Self { name, addr }
    }

    /// Loopback and virtual ethernet (container) interfaces say nothing about
    /// the host's route to the outside world.
    #[must_use]
    pub fn is_external(&self) -> bool {
        !self.addr.is_loopback() && self.name != "lo" && !self.name.starts_with("veth")
    }
}

impl Display for InterfaceAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use test_case::test_case;

    #[test_case("eth0", Ipv4Addr::new(192, 168, 1, 21), true; "ethernet")]
    #[test_case("wlp2s0", Ipv4Addr::new(10, 0, 0, 7), true; "wireless")]
    #[test_case("lo", Ipv4Addr::LOCALHOST, false; "loopback")]
    #[test_case("veth1a2b3c", Ipv4Addr::new(172, 17, 0, 1), false; "virtual ethernet")]
    fn test_is_external(name: &str, addr: Ipv4Addr, expected: bool) {
        let ia = InterfaceAddr::new(name.to_string(), IpAddr::V4(addr));
        assert_eq!(expected, ia.is_external());
    }

    #[test]
    fn test_display() {
        let ia = InterfaceAddr::new(String::from("eth0"), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!("eth0: 10.0.0.2", ia.to_string());
    }
}
