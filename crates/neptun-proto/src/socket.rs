use std::io;
use std::net::{SocketAddr, UdpSocket};

/// What the engine needs from a datagram endpoint. `recv_from` must not
/// block: `Ok(None)` means no datagram is waiting.
pub trait Socket {
    fn recv_from(&mut self, buffer: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;
    fn send_to(&mut self, payload: &[u8], addr: SocketAddr) -> io::Result<usize>;
}

/// A bound, non-blocking UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Socket for UdpTransport {
    fn recv_from(&mut self, buffer: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buffer) {
            Ok((len, sender)) => Ok(Some((len, sender))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn send_to(&mut self, payload: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(payload, addr)
    }
}
