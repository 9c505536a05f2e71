use crate::error::{Error, Result};
use crate::net::socket::Socket;
use internetz_packet::ipv4::Ipv4Packet;
use internetz_packet::IpProtocol;
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// How an [`IcmpEndpoint`] was opened.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IcmpMode {
    /// An unprivileged `ICMP` datagram ("ping") socket.
    Datagram,
    /// A raw `ICMP` socket, opened with `CAP_NET_RAW`.
    Raw,
}

impl Display for IcmpMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Datagram => write!(f, "datagram"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

/// An open `ICMP` socket and the addressing it requires.
///
/// The two kinds differ in what a read returns:
///
/// - a datagram socket yields the bare `ICMP` message, the kernel owns the
///   echo identifier and only delivers replies addressed to this socket
/// - a raw socket yields the whole `IPv4` datagram, including any header
///   options, and sees every `ICMP` message delivered to the host
#[derive(Debug)]
pub enum IcmpEndpoint<S> {
    Datagram(S),
    Raw(S),
}

/// A received message, located within the read buffer.
#[derive(Debug, Eq, PartialEq)]
pub struct Received<'a> {
    pub source: IpAddr,
    pub icmp: &'a [u8],
}

impl<S: Socket> IcmpEndpoint<S> {
    #[must_use]
    pub const fn mode(&self) -> IcmpMode {
        match self {
            Self::Datagram(_) => IcmpMode::Datagram,
            Self::Raw(_) => IcmpMode::Raw,
        }
    }

    pub fn socket_mut(&mut self) -> &mut S {
        match self {
            Self::Datagram(socket) | Self::Raw(socket) => socket,
        }
    }

    /// The address to send an echo request for `target` to.
    ///
    /// Neither kind of socket has ports, the port is always zero.
    #[must_use]
    pub const fn destination(&self, target: Ipv4Addr) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(target), 0)
    }

    /// Locate the `ICMP` message, and who sent it, in a read of `buf`.
    pub fn decode<'a>(&self, buf: &'a [u8], from: Option<SocketAddr>) -> Result<Received<'a>> {
        match self {
            Self::Datagram(_) => Ok(Received {
                source: from.ok_or(Error::MissingAddr)?.ip(),
                icmp: buf,
            }),
            Self::Raw(_) => {
                let ipv4 = Ipv4Packet::new_view(buf)?;
                if ipv4.get_protocol() != IpProtocol::Icmp {
                    return Err(Error::UnexpectedProtocol(ipv4.get_protocol().id()));
                }
                let header_len = usize::from(ipv4.get_header_length()) * 4;
                Ok(Received {
                    source: IpAddr::V4(ipv4.get_source()),
                    icmp: &buf[header_len..],
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::socket::MockSocket;
    use hex_literal::hex;
    use internetz_packet::error::Error as PacketError;
    use std::str::FromStr;

    #[test]
    fn test_decode_datagram() -> anyhow::Result<()> {
        let endpoint = IcmpEndpoint::Datagram(MockSocket::new());
        let buf = hex!("00 00 fb 23 04 d2 00 0a");
        let from = SocketAddr::from_str("1.1.1.1:0")?;
        let received = endpoint.decode(&buf, Some(from))?;
        assert_eq!(IpAddr::from_str("1.1.1.1")?, received.source);
        assert_eq!(&buf, received.icmp);
        Ok(())
    }

    #[test]
    fn test_decode_datagram_missing_addr() {
        let endpoint = IcmpEndpoint::Datagram(MockSocket::new());
        let buf = hex!("00 00 fb 23 04 d2 00 0a");
        let err = endpoint.decode(&buf, None).unwrap_err();
        assert!(matches!(err, Error::MissingAddr));
    }

    #[test]
    fn test_decode_raw() -> anyhow::Result<()> {
        let endpoint = IcmpEndpoint::Raw(MockSocket::new());
        let buf = hex!(
            "
            45 00 00 1c a2 71 00 00 38 01 9a ee 01 01 01 01
            c0 a8 01 15 00 00 fb 23 04 d2 00 0a
            "
        );
        let received = endpoint.decode(&buf, SocketAddr::from_str("1.1.1.1:0").ok())?;
        assert_eq!(IpAddr::from_str("1.1.1.1")?, received.source);
        assert_eq!(&hex!("00 00 fb 23 04 d2 00 0a"), received.icmp);
        Ok(())
    }

    #[test]
    fn test_decode_raw_with_options() -> anyhow::Result<()> {
        let endpoint = IcmpEndpoint::Raw(MockSocket::new());
        let buf = hex!(
            "
            46 00 00 20 a2 71 00 00 38 01 00 00 08 08 08 08
            c0 a8 01 15 01 01 01 00 00 00 fb 23 04 d2 00 0a
            "
        );
        let received = endpoint.decode(&buf, None)?;
        assert_eq!(IpAddr::from_str("8.8.8.8")?, received.source);
        assert_eq!(&hex!("00 00 fb 23 04 d2 00 0a"), received.icmp);
        Ok(())
    }

    #[test]
    fn test_decode_raw_truncated() {
        let endpoint = IcmpEndpoint::Raw(MockSocket::new());
        let buf = hex!("45 00 00 1c a2 71 00 00");
        let err = endpoint.decode(&buf, None).unwrap_err();
        assert!(matches!(
            err,
            Error::ParseFailed(PacketError::InsufficientPacketBuffer(_, 20, 8))
        ));
    }

    #[test]
    fn test_decode_raw_not_icmp() {
        let endpoint = IcmpEndpoint::Raw(MockSocket::new());
        let buf = hex!(
            "
            45 00 00 1c a2 71 00 00 38 11 00 00 01 01 01 01
            c0 a8 01 15 00 35 d4 31 00 08 00 00
            "
        );
        let err = endpoint.decode(&buf, None).unwrap_err();
        assert!(matches!(err, Error::UnexpectedProtocol(17)));
        assert_eq!("unexpected IP protocol: 17", err.to_string());
    }

    #[test]
    fn test_mode_and_destination() {
        let endpoint = IcmpEndpoint::Raw(MockSocket::new());
        assert_eq!(IcmpMode::Raw, endpoint.mode());
        assert_eq!(
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 0),
            endpoint.destination(Ipv4Addr::new(1, 1, 1, 1))
        );
        assert_eq!("datagram", IcmpMode::Datagram.to_string());
    }
}
