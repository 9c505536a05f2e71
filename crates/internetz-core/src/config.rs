use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default values for configuration.
pub mod defaults {
    use crate::config::{ResolverSpec, StartupFailure};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    /// The default value for `period`.
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

    /// The default value for `timeout`.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// The default value for `startup-failure`.
    pub const DEFAULT_STARTUP_FAILURE: StartupFailure = StartupFailure::Isolate;

    /// The default value for `icmp-target`.
    pub const DEFAULT_ICMP_TARGET: Ipv4Addr = Ipv4Addr::new(1, 1, 1, 1);

    /// The default `ICMP` echo payload.
    pub const DEFAULT_ICMP_PAYLOAD: &[u8] = b"internetz-probe";

    /// The default value for `tcp-target`.
    pub const DEFAULT_TCP_TARGET: SocketAddr =
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 80);

    /// The default value for `udp-target`.
    pub const DEFAULT_UDP_TARGET: SocketAddr =
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 53);

    /// The default `UDP` payload.
    pub const DEFAULT_UDP_PAYLOAD: &[u8] = b"internetz-probe";

    /// The default value for `http-url`.
    pub const DEFAULT_HTTP_URL: &str = "http://172.217.169.68/robots.txt";

    /// The default value for `dns-hostname`.
    pub const DEFAULT_DNS_HOSTNAME: &str = "www.google.com";

    /// The default value for `dns-resolvers`.
    pub fn default_resolvers() -> Vec<ResolverSpec> {
        vec![
            ResolverSpec::System,
            ResolverSpec::named("cloudflare", IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))),
            ResolverSpec::named("google", IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))),
        ]
    }
}

/// The smallest supported `period`.
pub const MIN_PERIOD: Duration = Duration::from_millis(100);

/// The size of the buffer used to receive `ICMP` replies.
pub const MAX_PACKET_SIZE: usize = 1500;

/// What to do when a probe fails to start.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StartupFailure {
    /// Log the failure and leave that probe stopped; the others keep running.
    Isolate,
    /// Shut the daemon down.
    Shutdown,
}

impl Display for StartupFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Isolate => write!(f, "isolate"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Scheduling shared by every probe loop.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LoopConfig {
    /// The interval between ticks.
    pub period: Duration,
    /// The bound on a single check.
    pub timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            period: defaults::DEFAULT_PERIOD,
            timeout: defaults::DEFAULT_TIMEOUT,
        }
    }
}

/// `ICMP` echo probe configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IcmpConfig {
    pub target: Ipv4Addr,
    pub payload: Vec<u8>,
}

impl Default for IcmpConfig {
    fn default() -> Self {
        Self {
            target: defaults::DEFAULT_ICMP_TARGET,
            payload: defaults::DEFAULT_ICMP_PAYLOAD.to_vec(),
        }
    }
}

/// `TCP` handshake probe configuration.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TcpConfig {
    pub target: SocketAddr,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            target: defaults::DEFAULT_TCP_TARGET,
        }
    }
}

/// `UDP` send probe configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UdpConfig {
    pub target: SocketAddr,
    pub payload: Vec<u8>,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            target: defaults::DEFAULT_UDP_TARGET,
            payload: defaults::DEFAULT_UDP_PAYLOAD.to_vec(),
        }
    }
}

/// A recursive resolver to exercise.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResolverSpec {
    /// The resolvers configured for the host (`/etc/resolv.conf`).
    System,
    /// A named resolver at a fixed address.
    Named { name: String, addr: IpAddr },
}

impl ResolverSpec {
    #[must_use]
    pub fn named(name: &str, addr: IpAddr) -> Self {
        Self::Named {
            name: name.to_string(),
            addr,
        }
    }

    /// The label used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::System => "system",
            Self::Named { name, .. } => name,
        }
    }
}

impl Display for ResolverSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Named { name, addr } => write!(f, "{name}={addr}"),
        }
    }
}

/// `DNS` resolution probe configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DnsConfig {
    pub hostname: String,
    pub resolvers: Vec<ResolverSpec>,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            hostname: defaults::DEFAULT_DNS_HOSTNAME.to_string(),
            resolvers: defaults::default_resolvers(),
        }
    }
}

/// `HTTP` round-trip probe configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HttpConfig {
    /// The URL requested with `HEAD`.
    pub url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            url: defaults::DEFAULT_HTTP_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&ResolverSpec::System, "system", "system")]
    #[test_case(&ResolverSpec::named("cloudflare", IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))), "cloudflare", "cloudflare=1.1.1.1")]
    fn test_resolver_spec(spec: &ResolverSpec, name: &str, display: &str) {
        assert_eq!(name, spec.name());
        assert_eq!(display, spec.to_string());
    }

    #[test]
    fn test_defaults() {
        let config = LoopConfig::default();
        assert_eq!(Duration::from_secs(1), config.period);
        assert_eq!(Duration::from_secs(5), config.timeout);
        assert_eq!(3, DnsConfig::default().resolvers.len());
        assert_eq!(Ipv4Addr::new(1, 1, 1, 1), IcmpConfig::default().target);
    }
}
