//! The recursive `DNS` resolution probe.
//!
//! One probe is run per configured resolver so that a failing resolver can
//! be told apart from a failing network.

use crate::config::ResolverSpec;
use crate::error::{Error, Result};
use crate::outcome::{DownReason, Outcome, ProbeId};
use crate::probe::{Probe, ProbeBuilder};
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::error::ProtoErrorKind;
use hickory_resolver::system_conf::read_system_conf;
use hickory_resolver::Resolver;
use std::net::IpAddr;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

const DNS_PORT: u16 = 53;

/// Resolves a hostname to its addresses.
#[cfg_attr(test, mockall::automock)]
pub trait Lookup {
    fn resolve(&self, hostname: &str) -> std::result::Result<Vec<IpAddr>, ResolveError>;
}

impl Lookup for Resolver {
    fn resolve(&self, hostname: &str) -> std::result::Result<Vec<IpAddr>, ResolveError> {
        Ok(self.lookup_ip(hostname)?.iter().collect())
    }
}

/// Builds a [`DnsProbe`] for one resolver.
#[derive(Debug, Clone)]
pub struct DnsProbeBuilder {
    hostname: String,
    resolver: ResolverSpec,
    timeout: Duration,
}

impl DnsProbeBuilder {
    #[must_use]
    pub const fn new(hostname: String, resolver: ResolverSpec, timeout: Duration) -> Self {
        Self {
            hostname,
            resolver,
            timeout,
        }
    }

    fn resolver_config(&self) -> Result<(ResolverConfig, ResolverOpts)> {
        match &self.resolver {
            ResolverSpec::System => read_system_conf()
                .map_err(|err| Error::BadConfig(format!("system resolver config: {err}"))),
            ResolverSpec::Named { addr, .. } => Ok((
                ResolverConfig::from_parts(
                    None,
                    vec![],
                    NameServerConfigGroup::from_ips_clear(&[*addr], DNS_PORT, true),
                ),
                ResolverOpts::default(),
            )),
        }
    }
}

impl ProbeBuilder for DnsProbeBuilder {
    type Probe = DnsProbe;

    fn id(&self) -> ProbeId {
        ProbeId::new(format!("dns-{}", self.resolver.name()), &self.hostname)
    }

    fn build(self) -> Result<DnsProbe> {
        let (config, mut options) = self.resolver_config()?;
        options.timeout = self.timeout;
        options.attempts = 1;
        options.cache_size = 0;
        options.use_hosts_file = false;
        debug!(resolver = %self.resolver, servers = config.name_servers().len(), "creating resolver");
        let resolver = Resolver::new(config, options)
            .map_err(|err| Error::Other(format!("failed to create resolver: {err}")))?;
        DnsProbe::new(resolver, self.hostname)
    }
}

/// The reply to one lookup request.
struct Reply {
    seq: u64,
    latency: Duration,
    result: std::result::Result<Vec<IpAddr>, ResolveError>,
}

/// Looks up a hostname once per check, bypassing any cache.
///
/// Lookups run on a dedicated thread so that a check returns by its
/// deadline even when the resolver does not. A reply arriving after its
/// check has timed out is discarded.
#[derive(Debug)]
pub struct DnsProbe {
    seq: u64,
    requests: Sender<u64>,
    replies: Receiver<Reply>,
}

impl DnsProbe {
    /// Start the lookup thread, which stops when the probe is dropped.
    pub fn new<L: Lookup + Send + 'static>(lookup: L, hostname: String) -> Result<Self> {
        let (requests, request_rx) = unbounded();
        let (reply_tx, replies) = unbounded();
        thread::Builder::new()
            .name(String::from("dns-lookup"))
            .spawn(move || lookup_worker(&lookup, &hostname, &request_rx, &reply_tx))
            .map_err(|err| Error::Other(err.to_string()))?;
        Ok(Self {
            seq: 0,
            requests,
            replies,
        })
    }
}

impl Probe for DnsProbe {
    #[instrument(skip_all, level = "debug")]
    fn check(&mut self, deadline: Instant) -> Result<Outcome> {
        self.seq += 1;
        self.requests
            .send(self.seq)
            .map_err(|_| Error::Other(String::from("dns lookup thread stopped")))?;
        loop {
            match self.replies.recv_deadline(deadline) {
                Ok(reply) if reply.seq == self.seq => {
                    return match reply.result {
                        Ok(addrs) => {
                            debug!(?addrs, "resolved");
                            Ok(Outcome::Ok(reply.latency))
                        }
                        Err(err) => classify(err),
                    };
                }
                Ok(reply) => debug!(seq = reply.seq, "discarding late lookup"),
                Err(RecvTimeoutError::Timeout) => return Ok(Outcome::Down(DownReason::Timeout)),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Other(String::from("dns lookup thread stopped")));
                }
            }
        }
    }
}

fn lookup_worker<L: Lookup>(
    lookup: &L,
    hostname: &str,
    requests: &Receiver<u64>,
    replies: &Sender<Reply>,
) {
    for seq in requests {
        let start = Instant::now();
        let result = lookup.resolve(hostname);
        let reply = Reply {
            seq,
            latency: start.elapsed(),
            result,
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
    debug!("dns lookup thread stopped");
}

/// Timeouts and unreachable resolvers are `Down`; anything else is an error.
fn classify(err: ResolveError) -> Result<Outcome> {
    let reason = match err.kind() {
        ResolveErrorKind::Timeout => Some(DownReason::Timeout),
        ResolveErrorKind::NoConnections => Some(DownReason::NoConnection),
        ResolveErrorKind::Proto(proto) if matches!(proto.kind(), ProtoErrorKind::Timeout) => {
            Some(DownReason::Timeout)
        }
        _ => None,
    };
    reason.map_or_else(|| Err(Error::DnsLookup(err)), |reason| Ok(Outcome::Down(reason)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_resolver::proto::error::ProtoError;
    use mockall::predicate;
    use std::net::Ipv4Addr;
    use test_case::test_case;

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[test]
    fn test_id() {
        let builder = DnsProbeBuilder::new(
            String::from("www.google.com"),
            ResolverSpec::named("cloudflare", IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))),
            Duration::from_secs(5),
        );
        assert_eq!(
            ProbeId::new("dns-cloudflare", "www.google.com"),
            builder.id()
        );
    }

    #[test]
    fn test_named_resolver_config() -> anyhow::Result<()> {
        let builder = DnsProbeBuilder::new(
            String::from("www.google.com"),
            ResolverSpec::named("google", IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))),
            Duration::from_secs(5),
        );
        let (config, _) = builder.resolver_config()?;
        let servers = config
            .name_servers()
            .iter()
            .map(|ns| ns.socket_addr)
            .collect::<Vec<_>>();
        assert!(!servers.is_empty());
        assert!(servers
            .iter()
            .all(|addr| addr.ip() == IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)) && addr.port() == 53));
        Ok(())
    }

    #[test]
    fn test_resolved() -> anyhow::Result<()> {
        let mut lookup = MockLookup::new();
        lookup
            .expect_resolve()
            .with(predicate::eq("www.google.com"))
            .times(2)
            .returning(|_| Ok(vec![IpAddr::V4(Ipv4Addr::new(142, 250, 180, 4))]));
        let mut probe = DnsProbe::new(lookup, String::from("www.google.com"))?;
        assert!(matches!(probe.check(deadline())?, Outcome::Ok(_)));
        assert!(matches!(probe.check(deadline())?, Outcome::Ok(_)));
        Ok(())
    }

    #[test_case(|| ResolveErrorKind::Timeout.into(), DownReason::Timeout; "timeout")]
    #[test_case(|| ResolveErrorKind::NoConnections.into(), DownReason::NoConnection; "no connections")]
    #[test_case(|| ProtoError::from(ProtoErrorKind::Timeout).into(), DownReason::Timeout; "protocol timeout")]
    fn test_lookup_down(error: fn() -> ResolveError, reason: DownReason) -> anyhow::Result<()> {
        let mut lookup = MockLookup::new();
        lookup.expect_resolve().returning(move |_| Err(error()));
        let mut probe = DnsProbe::new(lookup, String::from("www.google.com"))?;
        let outcome = probe.check(deadline())?;
        assert!(matches!(outcome, Outcome::Down(r) if r == reason));
        Ok(())
    }

    #[test]
    fn test_lookup_bounded_by_deadline() -> anyhow::Result<()> {
        let mut lookup = MockLookup::new();
        lookup.expect_resolve().times(2).returning(|_| {
            thread::sleep(Duration::from_millis(200));
            Ok(vec![IpAddr::V4(Ipv4Addr::new(142, 250, 180, 4))])
        });
        let mut probe = DnsProbe::new(lookup, String::from("www.google.com"))?;
        let start = Instant::now();
        let outcome = probe.check(start + Duration::from_millis(20))?;
        assert!(matches!(outcome, Outcome::Down(DownReason::Timeout)));
        assert!(start.elapsed() < Duration::from_millis(150));
        let outcome = probe.check(deadline())?;
        assert!(matches!(outcome, Outcome::Ok(latency) if latency >= Duration::from_millis(200)));
        Ok(())
    }

    #[test]
    fn test_lookup_error() -> anyhow::Result<()> {

        let mut lookup = MockLookup::new();
        lookup
            .expect_resolve()
            .returning(|_| Err(ResolveErrorKind::Message("servfail").into()));
        let mut probe = DnsProbe::new(lookup, String::from("www.google.com"))?;
        let err = probe.check(deadline()).unwrap_err();
        assert!(matches!(err, Error::DnsLookup(_)));
        assert!(err.to_string().starts_with("dns lookup failed"));
        Ok(())
    }
}
