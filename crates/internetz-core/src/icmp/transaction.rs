use crate::error::{Error, Result};
use crate::icmp::endpoint::{IcmpEndpoint, IcmpMode};
use crate::net::socket::Socket;
use crate::outcome::{DownReason, Outcome};
use internetz_packet::checksum::icmp_ipv4_checksum;
use internetz_packet::icmpv4::echo_reply::EchoReplyPacket;
use internetz_packet::icmpv4::echo_request::EchoRequestPacket;
use internetz_packet::icmpv4::{IcmpCode, IcmpPacket, IcmpType};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;
use tracing::{debug, instrument};

/// An `ICMP` echo request.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EchoRequest<'a> {
    pub target: Ipv4Addr,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: &'a [u8],
}

impl EchoRequest<'_> {
    /// Write the request into `buf`, returning the encoded bytes.
    pub fn encode<'b>(&self, buf: &'b mut [u8]) -> Result<&'b [u8]> {
        let len = EchoRequestPacket::minimum_packet_size() + self.payload.len();
        let Some(buf) = buf.get_mut(..len) else {
            return Err(Error::InvalidPacketSize(len));
        };
        let mut packet =
            EchoRequestPacket::new(&mut *buf).map_err(|_| Error::InvalidPacketSize(len))?;
        packet.set_icmp_type(IcmpType::EchoRequest);
        packet.set_icmp_code(IcmpCode(0));
        packet.set_identifier(self.identifier);
        packet.set_sequence(self.sequence);
        packet.set_payload(self.payload);
        packet.set_checksum(icmp_ipv4_checksum(packet.packet()));
        Ok(buf)
    }
}

/// What a received message means for the request in flight.
#[derive(Debug, Eq, PartialEq)]
enum Reply {
    /// The reply to the request in flight.
    Matched,
    /// A late reply to an earlier request from this probe.
    Stale(u16),
    /// One of our own requests, seen by a raw socket (on loopback).
    Outbound,
}

/// One echo request and the wait for its reply.
///
/// ```text
/// Idle -> Sent -> Received (Ok or Error)
///              -> Timed out (Down)
///      -> Send failed (Error, or Down if unreachable)
/// ```
pub struct EchoTransaction<'a, S> {
    endpoint: &'a mut IcmpEndpoint<S>,
    request: EchoRequest<'a>,
    buf: &'a mut [u8],
}

impl<'a, S: Socket> EchoTransaction<'a, S> {
    pub fn new(
        endpoint: &'a mut IcmpEndpoint<S>,
        request: EchoRequest<'a>,
        buf: &'a mut [u8],
    ) -> Self {
        Self {
            endpoint,
            request,
            buf,
        }
    }

    /// Send the request and wait until `deadline` for its reply.
    #[instrument(skip_all, fields(sequence = self.request.sequence), level = "debug")]
    pub fn execute(mut self, deadline: Instant) -> Result<Outcome> {
        match self.send()? {
            Some(sent_at) => self.await_reply(sent_at, deadline),
            None => Ok(Outcome::Down(DownReason::Unreachable)),
        }
    }

    /// Returns the send instant, or `None` if the target is unreachable.
    fn send(&mut self) -> Result<Option<Instant>> {
        let dest = self.endpoint.destination(self.request.target);
        let packet = self.request.encode(&mut *self.buf)?;
        let sent_at = Instant::now();
        match self.endpoint.socket_mut().send_to(packet, dest) {
            Ok(()) => Ok(Some(sent_at)),
            Err(err) if err.kind().is_unreachable() => {
                debug!(error = %err, "echo request not sent");
                Ok(None)
            }
            Err(err) => Err(Error::SendFailed(err)),
        }
    }

    fn await_reply(&mut self, sent_at: Instant, deadline: Instant) -> Result<Outcome> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Outcome::Down(DownReason::Timeout));
            }
            let socket = self.endpoint.socket_mut();
            if !socket.is_readable(remaining).map_err(Error::RecvFailed)? {
                continue;
            }
            let (len, from) = socket.recv_from(&mut *self.buf).map_err(Error::RecvFailed)?;
            let received_at = Instant::now();
            match self.classify(&self.buf[..len], from)? {
                Reply::Matched => {
                    return Ok(Outcome::Ok(received_at.saturating_duration_since(sent_at)));
                }
                Reply::Stale(sequence) => debug!(sequence, "discarding stale echo reply"),
                Reply::Outbound => debug!("discarding own echo request"),
            }
        }
    }

    fn classify(&self, buf: &[u8], from: Option<SocketAddr>) -> Result<Reply> {
        let received = self.endpoint.decode(buf, from)?;
        let icmp = IcmpPacket::new_view(received.icmp)?;
        icmp.verify_checksum()?;
        let icmp_type = icmp.get_icmp_type();
        if self.endpoint.mode() == IcmpMode::Raw
            && icmp_type == IcmpType::EchoRequest
            && EchoRequestPacket::new_view(received.icmp)?.get_identifier()
                == self.request.identifier
        {
            return Ok(Reply::Outbound);
        }
        if icmp_type != IcmpType::EchoReply {
            return Err(Error::UnexpectedIcmpType(
                icmp_type,
                icmp.get_icmp_code().0,
            ));
        }
        let expected = IpAddr::V4(self.request.target);
        if received.source != expected {
            return Err(Error::UnexpectedPeer {
                expected,
                actual: received.source,
            });
        }
        let reply = EchoReplyPacket::new_view(received.icmp)?;
        if self.endpoint.mode() == IcmpMode::Raw
            && reply.get_identifier() != self.request.identifier
        {
            return Err(Error::IdentifierMismatch {
                expected: self.request.identifier,
                actual: reply.get_identifier(),
            });
        }
        if reply.get_sequence() == self.request.sequence {
            Ok(Reply::Matched)
        } else {
            Ok(Reply::Stale(reply.get_sequence()))
        }
    }
}
