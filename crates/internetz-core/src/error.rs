use internetz_packet::icmpv4::IcmpType;
use std::fmt::{Display, Formatter};
use std::io;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

/// A probe error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A probe error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid packet size: {0}")]
    InvalidPacketSize(usize),
    #[error("couldn't make raw icmp socket: {0}")]
    RawSocket(IoError),
    #[error("couldn't send request: {0}")]
    SendFailed(IoError),
    #[error("couldn't receive reply: {0}")]
    RecvFailed(IoError),
    #[error("couldn't parse reply: {0}")]
    ParseFailed(#[from] internetz_packet::error::Error),
    #[error("unexpected IP protocol: {0}")]
    UnexpectedProtocol(u8),
    #[error("unexpected ICMP type: {0:?} (code {1})")]
    UnexpectedIcmpType(IcmpType, u8),
    #[error("reply from unexpected peer: expected {expected}, actual {actual}")]
    UnexpectedPeer { expected: IpAddr, actual: IpAddr },
    #[error("reply identifier mismatch: expected {expected}, actual {actual}")]
    IdentifierMismatch { expected: u16, actual: u16 },
    #[error("missing address from socket call")]
    MissingAddr,
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
    #[error("dns lookup failed: {0}")]
    DnsLookup(#[from] hickory_resolver::error::ResolveError),
    #[error("http request failed: {0}")]
    Http(String),
    #[error("invalid config: {0}")]
    BadConfig(String),
    #[error("probe panicked: {0}")]
    Panicked(String),
    #[error("privilege error: {0}")]
    PrivilegeError(#[from] internetz_privilege::Error),
    #[error("probe error: {0}")]
    Other(String),
}

/// Custom IO error result.
pub type IoResult<T> = std::result::Result<T, IoError>;

/// Custom IO error.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Connect error for {1}: {0}")]
    Connect(io::Error, SocketAddr),
    #[error("Sendto error for {1}: {0}")]
    SendTo(io::Error, SocketAddr),
    #[error("Failed to {1}: {0}")]
    Other(io::Error, IoOperation),
}

impl IoError {
    /// Get the custom error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect(e, _) | Self::SendTo(e, _) | Self::Other(e, _) => ErrorKind::from(e),
        }
    }
}

/// Custom error kind.
///
/// This includes additional error kinds that are not part of the standard [`io::ErrorKind`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    InProgress,
    HostUnreachable,
    NetUnreachable,
    Std(io::ErrorKind),
}

impl ErrorKind {
    /// Does this kind mean the destination cannot be reached from here?
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::HostUnreachable | Self::NetUnreachable)
    }
}

/// Io operation.
#[derive(Debug)]
pub enum IoOperation {
    NewSocket,
    SetNonBlocking,
    Select,
    RecvFrom,
    Send,
    LocalAddr,
    TakeError,
}

impl Display for IoOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewSocket => write!(f, "create new socket"),
            Self::SetNonBlocking => write!(f, "set non-blocking"),
            Self::Select => write!(f, "select"),
            Self::RecvFrom => write!(f, "recv from"),
            Self::Send => write!(f, "send"),
            Self::LocalAddr => write!(f, "local addr"),
            Self::TakeError => write!(f, "take error"),
        }
    }
}
