use crate::error::IoResult as Result;
use std::net::SocketAddr;
use std::time::Duration;

#[cfg_attr(test, mockall::automock)]
pub trait Socket
where
    Self: Sized,
{
    /// Create an unprivileged IPv4 `ICMP` datagram ("ping") socket.
    fn new_icmp_dgram_socket_ipv4() -> Result<Self>;
    /// Create a raw IPv4 `ICMP` socket.
    ///
    /// Requires `CAP_NET_RAW` to be effective.
    fn new_icmp_raw_socket_ipv4() -> Result<Self>;
    /// Create a IPv4/TCP socket for the handshake probe.
    fn new_stream_socket_ipv4() -> Result<Self>;
    /// Create a IPv6/TCP socket for the handshake probe.
    fn new_stream_socket_ipv6() -> Result<Self>;
    /// Create (non-raw) IPv4/UDP socket.
    fn new_udp_dgram_socket_ipv4() -> Result<Self>;
    /// Create (non-raw) IPv6/UDP socket.
    fn new_udp_dgram_socket_ipv6() -> Result<Self>;
    fn connect(&mut self, address: SocketAddr) -> Result<()>;
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> Result<()>;
    /// Send on a connected socket.
    fn send(&mut self, buf: &[u8]) -> Result<()>;
    /// Returns true if the socket becomes readable before the timeout, false otherwise.
    fn is_readable(&mut self, timeout: Duration) -> Result<bool>;
    /// Returns true if the socket becomes writable before the timeout, false otherwise.
    fn is_writable(&mut self, timeout: Duration) -> Result<bool>;
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, Option<SocketAddr>)>;
    fn local_addr(&mut self) -> Result<Option<SocketAddr>>;
    fn take_error(&mut self) -> Result<Option<SocketError>>;
}

/// A socket error returned by `Socket::take_error`.
#[derive(Debug)]
pub enum SocketError {
    ConnectionRefused,
    HostUnreachable,
    NetUnreachable,
    Other(std::io::Error),
}

#[cfg(test)]
pub mod tests {
    use std::sync::Mutex;

    /// Serialises tests which set expectations on the static `MockSocket` constructors.
    pub static MTX: Mutex<()> = Mutex::new(());

    #[macro_export]
    macro_rules! mocket_recv_from {
        ($packet: expr, $addr: expr) => {
            move |buf: &mut [u8]| -> IoResult<(usize, Option<SocketAddr>)> {
                buf[..$packet.len()].copy_from_slice(&$packet);
                Ok(($packet.len(), Some($addr)))
            }
        };
    }
}
