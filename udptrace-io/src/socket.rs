//! UDP socket wrapper for trace capture and replay
//!
//! Thin cross-platform abstraction over socket2 with the options the
//! recorder and player need.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Socket configuration errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,
}

impl SocketError {
    /// True when a receive failed only because the read timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SocketError::Io(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        )
    }
}

/// UDP endpoint
///
/// Wraps a blocking UDP socket. Capture sockets are bound and given a read
/// timeout so a waiting receive wakes up periodically; replay sockets stay
/// unbound and only send.
pub struct UdpEndpoint {
    inner: Socket,
}

impl UdpEndpoint {
    /// Bind a capture socket to the given local address
    pub fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;

        Ok(UdpEndpoint { inner: socket })
    }

    /// Create an unbound socket for sending
    pub fn unbound(ipv6: bool) -> Result<Self, SocketError> {
        let domain = if ipv6 { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

        Ok(UdpEndpoint { inner: socket })
    }

    /// Bound on how long a blocking receive waits; `None` blocks forever
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), SocketError> {
        self.inner.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Set the receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        self.inner.set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Get the receive buffer size
    pub fn recv_buffer_size(&self) -> Result<usize, SocketError> {
        Ok(self.inner.recv_buffer_size()?)
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.inner
            .local_addr()?
            .as_socket()
            .ok_or(SocketError::InvalidAddress)
    }

    /// Send a datagram to the given address
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        Ok(self.inner.send_to(buf, &target.into())?)
    }

    /// Receive a datagram
    ///
    /// Returns the number of bytes received and the source address. A
    /// datagram larger than `buf` is truncated by the OS; that is a property
    /// of the platform primitive, not an error.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError> {
        // socket2 recv_from takes MaybeUninit; reinterpret the initialized
        // buffer, which is sound because u8 has no invalid bit patterns.
        use std::mem::MaybeUninit;
        let uninit_buf = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len())
        };

        let (n, addr) = self.inner.recv_from(uninit_buf)?;
        Ok((n, addr.as_socket().ok_or(SocketError::InvalidAddress)?))
    }
}
