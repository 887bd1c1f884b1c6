//! In-memory datagram fabric for driving the engine in tests and local
//! experiments: per-address queues, a packet-drop switch, MTU truncation and
//! per-address traffic counters.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;

use crate::socket::Socket;

const REASONABLE_MTU: usize = 1400;

/// Traffic counters for one address.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub num_sent_packets: u64,
    pub num_read_packets: u64,
    pub num_sent_bytes: u64,
    pub num_read_bytes: u64,
}

#[derive(Debug)]
struct PendingPacket {
    sender: SocketAddr,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct Inner {
    mtu: usize,
    should_drop_packets: bool,
    queues: HashMap<SocketAddr, VecDeque<PendingPacket>>,
    stats: HashMap<SocketAddr, Stats>,
}

/// All endpoints of one fake network share the same state; the engine is
/// single-threaded, so plain `Rc<RefCell<..>>` sharing is enough.
#[derive(Debug, Clone)]
pub struct FakeNetwork {
    inner: Rc<RefCell<Inner>>,
}

impl Default for FakeNetwork {
    fn default() -> Self {
        Self::new(REASONABLE_MTU)
    }
}

impl FakeNetwork {
    pub fn new(mtu: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                mtu,
                ..Inner::default()
            })),
        }
    }

    /// Binds an endpoint at `addr`.
    pub fn endpoint(&self, addr: SocketAddr) -> FakeSocket {
        FakeSocket {
            addr,
            inner: Rc::clone(&self.inner),
        }
    }

    /// When enabled, sent packets vanish while still counting as sent, which
    /// is exactly what a UDP socket would report.
    pub fn drop_packets(&self, should_drop_packets: bool) {
        self.inner.borrow_mut().should_drop_packets = should_drop_packets;
    }

    pub fn stats(&self, addr: SocketAddr) -> Stats {
        self.inner
            .borrow()
            .stats
            .get(&addr)
            .copied()
            .unwrap_or_default()
    }

    pub fn clear_stats(&self) {
        self.inner.borrow_mut().stats.clear();
    }
}

/// One bound endpoint of a [`FakeNetwork`].
#[derive(Debug)]
pub struct FakeSocket {
    addr: SocketAddr,
    inner: Rc<RefCell<Inner>>,
}

impl Socket for FakeSocket {
    fn recv_from(&mut self, buffer: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let mut inner = self.inner.borrow_mut();
        let Some(packet) = inner
            .queues
            .get_mut(&self.addr)
            .and_then(|queue| queue.pop_front())
        else {
            return Ok(None);
        };
        let stats = inner.stats.entry(self.addr).or_default();
        stats.num_read_packets += 1;
        stats.num_read_bytes += packet.payload.len() as u64;

        // Data that can't fit in the buffer is dropped, like a real socket.
        let len = packet.payload.len().min(buffer.len());
        buffer[..len].copy_from_slice(&packet.payload[..len]);
        Ok(Some((len, packet.sender)))
    }

    fn send_to(&mut self, payload: &[u8], addr: SocketAddr) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        let stats = inner.stats.entry(self.addr).or_default();
        stats.num_sent_packets += 1;
        stats.num_sent_bytes += payload.len() as u64;

        if inner.should_drop_packets {
            // The packet is gone, but the sender can't tell.
            return Ok(payload.len());
        }

        let mtu = inner.mtu;
        let truncated = &payload[..payload.len().min(mtu)];
        inner
            .queues
            .entry(addr)
            .or_default()
            .push_back(PendingPacket {
                sender: self.addr,
                payload: truncated.to_vec(),
            });
        Ok(payload.len())
    }
}
