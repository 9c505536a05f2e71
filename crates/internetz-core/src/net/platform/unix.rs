use crate::error::Result;
use crate::net::platform::{InterfaceAddr, Platform};
use std::net::IpAddr;

pub struct PlatformImpl;

impl Platform for PlatformImpl {
    fn interface_addrs() -> Result<Vec<InterfaceAddr>> {
        address::interface_addrs()
    }
    fn discover_local_addr(target_addr: IpAddr, port: u16) -> Result<IpAddr> {
        address::discover_local_addr(target_addr, port)
    }
}

mod address {
    use crate::error::{Error, IoError, IoOperation, Result};
    use crate::net::platform::InterfaceAddr;
    use crate::net::socket::Socket;
    use crate::net::SocketImpl;
    use nix::sys::socket::{AddressFamily, SockaddrLike};
    use std::net::{IpAddr, SocketAddr};
    use tracing::instrument;

    #[instrument(ret, level = "trace")]
    pub fn interface_addrs() -> Result<Vec<InterfaceAddr>> {
        Ok(nix::ifaddrs::getifaddrs()
            .map_err(|err| IoError::Other(std::io::Error::from(err), IoOperation::LocalAddr))?
            .filter_map(|ia| {
                ia.address.and_then(|addr| match addr.family() {
                    Some(AddressFamily::Inet) => addr.as_sockaddr_in().map(|sock_addr| {
                        InterfaceAddr::new(ia.interface_name.clone(), IpAddr::V4(sock_addr.ip()))
                    }),
                    _ => None,
                })
            })
            .collect())
    }

    // Note that no packets are transmitted by this method.
    #[instrument(ret, level = "trace")]
    pub fn discover_local_addr(target_addr: IpAddr, port: u16) -> Result<IpAddr> {
        let mut socket = match target_addr {
            IpAddr::V4(_) => SocketImpl::new_udp_dgram_socket_ipv4(),
            IpAddr::V6(_) => SocketImpl::new_udp_dgram_socket_ipv6(),
        }?;
        socket.connect(SocketAddr::new(target_addr, port))?;
        Ok(socket.local_addr()?.ok_or(Error::MissingAddr)?.ip())
    }
}

mod socket {
    use crate::error::IoResult;
    use crate::error::{ErrorKind, IoError, IoOperation};
    use crate::net::socket::{Socket, SocketError};
    use itertools::Itertools;
    use nix::{
        sys::select::FdSet,
        sys::time::{TimeVal, TimeValLike},
        Error,
    };
    use socket2::{Domain, Protocol, SockAddr, Type};
    use std::io;
    use std::net::SocketAddr;
    use std::os::fd::AsFd;
    use std::time::Duration;
    use tracing::instrument;

    /// A network socket.
    pub struct SocketImpl {
        inner: socket2::Socket,
    }

    impl SocketImpl {
        fn new(domain: Domain, ty: Type, protocol: Protocol) -> IoResult<Self> {
            Ok(Self {
                inner: socket2::Socket::new(domain, ty, Some(protocol))
                    .map_err(|err| IoError::Other(err, IoOperation::NewSocket))?,
            })
        }

        fn set_nonblocking(&self, nonblocking: bool) -> IoResult<()> {
            self.inner
                .set_nonblocking(nonblocking)
                .map_err(|err| IoError::Other(err, IoOperation::SetNonBlocking))
        }

        fn select(&self, timeout: Duration, write: bool) -> IoResult<bool> {
            let mut fds = FdSet::new();
            fds.insert(self.inner.as_fd());
            let (read, writ) = if write {
                (None, Some(&mut fds))
            } else {
                (Some(&mut fds), None)
            };
            let ready = nix::sys::select::select(
                None,
                read,
                writ,
                None,
                Some(&mut TimeVal::milliseconds(
                    i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX),
                )),
            );
            match ready {
                Ok(ready) => Ok(ready == 1),
                Err(Error::EINTR) => Ok(false),
                Err(err) => Err(IoError::Other(io::Error::from(err), IoOperation::Select)),
            }
        }
    }

    impl Socket for SocketImpl {
        #[instrument(level = "trace")]
        fn new_icmp_dgram_socket_ipv4() -> IoResult<Self> {
            let socket = Self::new(Domain::IPV4, Type::DGRAM, Protocol::ICMPV4)?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(level = "trace")]
        fn new_icmp_raw_socket_ipv4() -> IoResult<Self> {
            let socket = Self::new(Domain::IPV4, Type::RAW, Protocol::ICMPV4)?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(level = "trace")]
        fn new_stream_socket_ipv4() -> IoResult<Self> {
            let socket = Self::new(Domain::IPV4, Type::STREAM, Protocol::TCP)?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(level = "trace")]
        fn new_stream_socket_ipv6() -> IoResult<Self> {
            let socket = Self::new(Domain::IPV6, Type::STREAM, Protocol::TCP)?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(level = "trace")]
        fn new_udp_dgram_socket_ipv4() -> IoResult<Self> {
            let socket = Self::new(Domain::IPV4, Type::DGRAM, Protocol::UDP)?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(level = "trace")]
        fn new_udp_dgram_socket_ipv6() -> IoResult<Self> {
            let socket = Self::new(Domain::IPV6, Type::DGRAM, Protocol::UDP)?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(skip(self), level = "trace")]
        fn connect(&mut self, address: SocketAddr) -> IoResult<()> {
            tracing::trace!(?address);
            self.inner
                .connect(&SockAddr::from(address))
                .map_err(|err| IoError::Connect(err, address))
        }
        #[instrument(skip(self, buf), level = "trace")]
        fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> IoResult<()> {
            tracing::trace!(buf = format!("{:02x?}", buf.iter().format(" ")), ?addr);
            self.inner
                .send_to(buf, &SockAddr::from(addr))
                .map_err(|err| IoError::SendTo(err, addr))?;
            Ok(())
        }
        #[instrument(skip(self, buf), level = "trace")]
        fn send(&mut self, buf: &[u8]) -> IoResult<()> {
            tracing::trace!(buf = format!("{:02x?}", buf.iter().format(" ")));
            self.inner
                .send(buf)
                .map_err(|err| IoError::Other(err, IoOperation::Send))?;
            Ok(())
        }
        #[instrument(skip(self), level = "trace")]
        fn is_readable(&mut self, timeout: Duration) -> IoResult<bool> {
            self.select(timeout, false)
        }
        #[instrument(skip(self), level = "trace")]
        fn is_writable(&mut self, timeout: Duration) -> IoResult<bool> {
            self.select(timeout, true)
        }
        #[instrument(skip(self, buf), level = "trace")]
        fn recv_from(&mut self, buf: &mut [u8]) -> IoResult<(usize, Option<SocketAddr>)> {
            let (bytes_read, addr) = self
                .inner
                .recv_from_into_buf(buf)
                .map_err(|err| IoError::Other(err, IoOperation::RecvFrom))?;
            tracing::trace!(
                buf = format!("{:02x?}", buf[..bytes_read].iter().format(" ")),
                bytes_read,
                ?addr
            );
            Ok((bytes_read, addr))
        }
        #[instrument(skip(self), level = "trace")]
        fn local_addr(&mut self) -> IoResult<Option<SocketAddr>> {
            Ok(self
                .inner
                .local_addr()
                .map_err(|err| IoError::Other(err, IoOperation::LocalAddr))?
                .as_socket())
        }
        #[instrument(skip(self), ret, level = "trace")]
        fn take_error(&mut self) -> IoResult<Option<SocketError>> {
            self.inner
                .take_error()
                .map(|err| {
                    err.map(|e| match e.raw_os_error().map(Error::from_raw) {
                        Some(Error::ECONNREFUSED) => SocketError::ConnectionRefused,
                        Some(Error::EHOSTUNREACH) => SocketError::HostUnreachable,
                        Some(Error::ENETUNREACH) => SocketError::NetUnreachable,
                        _ => SocketError::Other(e),
                    })
                })
                .map_err(|err| IoError::Other(err, IoOperation::TakeError))
        }
    }

    impl From<&io::Error> for ErrorKind {
        fn from(value: &io::Error) -> Self {
            match value.raw_os_error().map(Error::from_raw) {
                Some(Error::EINPROGRESS) => Self::InProgress,
                Some(Error::EHOSTUNREACH) => Self::HostUnreachable,
                Some(Error::ENETUNREACH) => Self::NetUnreachable,
                _ => Self::Std(value.kind()),
            }
        }
    }

    // only used for unit tests
    impl From<ErrorKind> for io::Error {
        fn from(value: ErrorKind) -> Self {
            match value {
                ErrorKind::InProgress => Self::from(Error::EINPROGRESS),
                ErrorKind::HostUnreachable => Self::from(Error::EHOSTUNREACH),
                ErrorKind::NetUnreachable => Self::from(Error::ENETUNREACH),
                ErrorKind::Std(kind) => Self::from(kind),
            }
        }
    }

    /// An extension trait to allow `recv_from` method which writes to a `&mut [u8]`.
    ///
    /// This is required for `socket2::Socket` which [does not currently provide] this method.
    ///
    /// [does not currently provide]: https://github.com/rust-lang/socket2/issues/223
    trait RecvFrom {
        fn recv_from_into_buf(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)>;
    }

    impl RecvFrom for socket2::Socket {
        // Safety: the `recv` implementation promises not to write uninitialised
        // bytes to the `buf`fer, so this casting is safe.
        #![allow(unsafe_code)]
        fn recv_from_into_buf(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)> {
            let buf = unsafe {
                &mut *(std::ptr::from_mut::<[u8]>(buf) as *mut [std::mem::MaybeUninit<u8>])
            };
            self.recv_from(buf)
                .map(|(size, addr)| (size, addr.as_socket()))
        }
    }

}

pub use socket::SocketImpl;
