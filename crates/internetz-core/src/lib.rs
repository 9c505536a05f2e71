//! internetz - periodic connectivity probes.
//!
//! This crate provides the probes run by the `internetz` daemon, each of which
//! exercises one layer of the network stack and reports, once per tick,
//! whether that layer is currently reachable:
//!
//! - [`IcmpProbe`] sends `ICMP` echo requests, over an unprivileged datagram
//!   socket where the host allows one and a raw socket (opened with a brief
//!   elevation of `CAP_NET_RAW`) otherwise
//! - [`TcpProbe`] completes a `TCP` handshake
//! - [`UdpProbe`] sends a `UDP` datagram
//! - [`DnsProbe`] performs a recursive `DNS` lookup against one resolver
//! - [`HttpProbe`] expects `200 OK` in reply to a `HEAD` request
//!
//! Every probe reports the same tri-state [`Outcome`]: `Ok` with a latency,
//! `Down` when the layer did not answer, or `Error` when something unexpected
//! happened.
//!
//! # Example
//!
//! The following runs the `ICMP` and `TCP` probes with the default
//! configuration and prints the first ten outcomes:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use internetz_core::{
//!     IcmpConfig, IcmpProbeBuilder, LoopConfig, ProbeEvent, SocketImpl, Supervisor, TcpConfig,
//!     TcpProbeBuilder,
//! };
//!
//! let mut supervisor = Supervisor::new(LoopConfig::default());
//! supervisor.spawn(IcmpProbeBuilder::new(IcmpConfig::default()))?;
//! supervisor.spawn(TcpProbeBuilder::<SocketImpl>::new(TcpConfig::default()))?;
//! for event in supervisor.events().iter().take(10) {
//!     if let ProbeEvent::Checked(check) = event {
//!         println!("{} #{}: {}", check.probe, check.tick, check.outcome.kind());
//!     }
//! }
//! supervisor.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! # See Also
//!
//! - [`Supervisor`] - Run many probes concurrently.
//! - [`ProbeLoop`] - Run a single probe on the current thread.
#![deny(unsafe_code)]

mod cancel;
mod config;
mod dns;
mod error;
mod http;
mod icmp;
mod net;
mod outcome;
mod probe;
mod runner;
mod supervisor;
mod tcp;
mod ticker;
mod udp;

pub use cancel::{CancelToken, Cancellation};
pub use config::{
    defaults, DnsConfig, HttpConfig, IcmpConfig, LoopConfig, ResolverSpec, StartupFailure, TcpConfig,
    UdpConfig, MAX_PACKET_SIZE, MIN_PERIOD,
};
pub use dns::{DnsProbe, DnsProbeBuilder, Lookup};
pub use error::{Error, ErrorKind, IoError, IoOperation, IoResult, Result};
pub use http::{HttpClient, HttpProbe, HttpProbeBuilder, RequestError};
pub use icmp::{
    echo_identifier, EchoRequest, EchoTransaction, IcmpEndpoint, IcmpMode, IcmpProbe,
    IcmpProbeBuilder, Received, SocketStrategy,
};
pub use net::host::HostAddrs;
pub use net::platform::{InterfaceAddr, Platform};
pub use net::socket::{Socket, SocketError};
pub use net::{PlatformImpl, SocketImpl};
pub use outcome::{
    CheckEvent, DownReason, FailedEvent, Outcome, OutcomeKind, ProbeEvent, ProbeId,
};
pub use probe::{Probe, ProbeBuilder};
pub use runner::ProbeLoop;
pub use supervisor::Supervisor;
pub use tcp::{TcpProbe, TcpProbeBuilder};
pub use ticker::Ticker;
pub use udp::{UdpProbe, UdpProbeBuilder};
