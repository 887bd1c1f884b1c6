use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use log::{debug, warn};
use neptun_binary::io::ByteReader;
use neptun_binary::traits::Readable;

use crate::connection::ConnectionManagerConfig;
use crate::error::NeptunError;
use crate::messages::PacketHeader;
use crate::metrics::NeptunMetrics;
use crate::packet_delivery::{DeliveryStatuses, PacketDeliveryStatus};
use crate::peer::Peer;
use crate::socket::Socket;
use crate::{READ_MTU, WRITE_MTU};

/// The engine: one bound datagram endpoint, one reusable network buffer, and
/// a per-peer protocol pipeline. Single-threaded and non-blocking; the
/// application drives it by calling [`tick`](Neptun::tick) from its event
/// loop. One tick reads at most one datagram and writes at most one datagram
/// per connected peer.
pub struct Neptun<S: Socket> {
    socket: S,
    network_buffer: Vec<u8>,
    packet_timeout: Duration,
    connection_manager_config: ConnectionManagerConfig,
    peers: HashMap<SocketAddr, Peer>,
    metrics: NeptunMetrics,
}

impl<S: Socket> Neptun<S> {
    pub fn new(
        socket: S,
        connection_manager_config: ConnectionManagerConfig,
        packet_timeout: Duration,
    ) -> Self {
        Self {
            socket,
            network_buffer: vec![0; READ_MTU],
            packet_timeout,
            connection_manager_config,
            peers: HashMap::new(),
            metrics: NeptunMetrics::default(),
        }
    }

    /// Runs one cycle: resolve timeouts, read at most one datagram, write to
    /// every peer whose turn it is. The callbacks fire inline, on the
    /// ticking thread, for every newly delivered message.
    pub fn tick<R, U>(&mut self, now: Instant, mut on_reliable: R, mut on_unreliable: U)
    where
        R: FnMut(&[u8]),
        U: FnMut(&[u8]),
    {
        for peer in self.peers.values_mut() {
            let statuses = peer.packet_delivery_manager.drop_old_packets(now);
            Self::process_delivery_statuses(&mut self.metrics, peer, &statuses);
        }
        self.read(now, &mut on_reliable, &mut on_unreliable);
        self.write(now);
    }

    /// Starts the handshake towards `addr`.
    pub fn connect(&mut self, addr: SocketAddr, now: Instant) {
        let peer = Self::find_or_create_peer(
            &mut self.peers,
            self.connection_manager_config,
            self.packet_timeout,
            addr,
            now,
        );
        peer.connection_manager.connect();
    }

    pub fn is_connected(&self, addr: SocketAddr) -> bool {
        self.peers
            .get(&addr)
            .is_some_and(|peer| peer.connection_manager.is_peer_connected())
    }

    /// Queues a reliable message produced by `write_to_buffer` into the
    /// stream's buffer. Must not be called before `is_connected(addr)`.
    pub fn send_reliable_to<F: FnOnce(&mut [u8]) -> usize>(
        &mut self,
        addr: SocketAddr,
        write_to_buffer: F,
        now: Instant,
    ) {
        if !self.is_connected(addr) {
            warn!("send_reliable_to called for unconnected peer {addr}");
            return;
        }
        let peer = Self::find_or_create_peer(
            &mut self.peers,
            self.connection_manager_config,
            self.packet_timeout,
            addr,
            now,
        );
        peer.reliable_stream.send(write_to_buffer);
    }

    /// Queues a best-effort message. Must not be called before
    /// `is_connected(addr)`.
    pub fn send_unreliable_to<F: FnOnce(&mut [u8]) -> usize>(
        &mut self,
        addr: SocketAddr,
        write_to_buffer: F,
        now: Instant,
    ) {
        if !self.is_connected(addr) {
            warn!("send_unreliable_to called for unconnected peer {addr}");
            return;
        }
        let peer = Self::find_or_create_peer(
            &mut self.peers,
            self.connection_manager_config,
            self.packet_timeout,
            addr,
            now,
        );
        peer.unreliable_stream.send(write_to_buffer);
    }

    pub fn metrics(&self) -> &NeptunMetrics {
        &self.metrics
    }

    fn find_or_create_peer(
        peers: &mut HashMap<SocketAddr, Peer>,
        config: ConnectionManagerConfig,
        packet_timeout: Duration,
        addr: SocketAddr,
        now: Instant,
    ) -> &mut Peer {
        peers
            .entry(addr)
            .or_insert_with(|| Peer::new(now, config, packet_timeout))
    }

    fn read<R, U>(&mut self, now: Instant, on_reliable: &mut R, on_unreliable: &mut U)
    where
        R: FnMut(&[u8]),
        U: FnMut(&[u8]),
    {
        let (len, sender) = match self.socket.recv_from(&mut self.network_buffer) {
            Ok(Some(packet_info)) => packet_info,
            Ok(None) => return,
            Err(e) => {
                warn!("failed to read from the socket: {e}");
                return;
            }
        };
        if len < PacketHeader::SERIALIZED_SIZE {
            warn!("discarding runt datagram ({len} bytes) from {sender}");
            return;
        }
        let peer = Self::find_or_create_peer(
            &mut self.peers,
            self.connection_manager_config,
            self.packet_timeout,
            sender,
            now,
        );
        let mut buffer = &self.network_buffer[..len];

        // Packet delivery stage. Ack information counts even when the packet
        // itself is a duplicate.
        let (read_count, statuses, packet_id) =
            peer.packet_delivery_manager.process_read(buffer);
        Self::process_delivery_statuses(&mut self.metrics, peer, &statuses);
        if read_count == 0 {
            return;
        }
        buffer = &buffer[read_count..];

        // Connection stage.
        match peer.connection_manager.read(buffer) {
            Ok(count) => buffer = &buffer[count..],
            Err(NeptunError::LetsConnectRejected) => {
                warn!("connection rejected by peer {sender}");
                return;
            }
            Err(e) => {
                warn!("malformed packet from peer {sender}: {e}");
                return;
            }
        }

        // Stream messages are not accepted until the handshake has
        // established the peer's limits.
        let Some(peer_limit) = peer.connection_manager.peer_limit() else {
            return;
        };
        let rate = Self::reconcile_send_rate(
            peer_limit.max_read_packet_rate,
            self.connection_manager_config.limit.max_send_packet_rate,
        );
        peer.update_send_rate(rate);

        // Reliable stage.
        match peer.reliable_stream.read(packet_id, buffer, &mut *on_reliable) {
            Ok(count) => buffer = &buffer[count..],
            Err(e) => {
                warn!("malformed packet from peer {sender}: {e}");
                return;
            }
        }

        // Unreliable stage.
        if let Err(e) = peer.unreliable_stream.read(buffer, &mut *on_unreliable) {
            warn!("malformed packet from peer {sender}: {e}");
        }
    }

    fn write(&mut self, now: Instant) {
        let Neptun {
            socket,
            network_buffer,
            connection_manager_config,
            peers,
            ..
        } = self;
        for (addr, peer) in peers.iter_mut() {
            let mut max_send_packet_size = WRITE_MTU;
            if connection_manager_config.limit.max_send_packet_size != 0 {
                max_send_packet_size =
                    max_send_packet_size.min(connection_manager_config.limit.max_send_packet_size);
            }
            if let Some(peer_limit) = peer.connection_manager.peer_limit() {
                if peer_limit.max_read_packet_size != 0 {
                    max_send_packet_size = max_send_packet_size.min(peer_limit.max_read_packet_size);
                }
            }
            // The header must always fit, whatever the peer negotiated.
            let cap = (max_send_packet_size as usize).max(PacketHeader::SERIALIZED_SIZE);

            // Handshake traffic is not rate limited: until both sides have
            // seen the negotiated limits in effect there is no rate to obey.
            let ticked = peer.send_packet_ticker.tick(now);
            if ticked || !peer.connection_manager.is_fully_connected() {
                Self::write_to_peer(socket, &mut network_buffer[..cap], now, *addr, peer);
            }
        }
    }

    fn write_to_peer(
        socket: &mut S,
        buffer: &mut [u8],
        now: Instant,
        addr: SocketAddr,
        peer: &mut Peer,
    ) {
        // Packet delivery stage.
        let packet_header_count = peer.packet_delivery_manager.write(buffer, now);
        if packet_header_count == 0 {
            return;
        }
        let Ok(packet_header) = PacketHeader::read(&mut ByteReader::new(buffer)) else {
            return;
        };
        let mut offset = packet_header_count;

        // Connection stage.
        offset += peer
            .connection_manager
            .write(packet_header.id, &mut buffer[offset..]);
        // Reliable stage.
        offset += peer
            .reliable_stream
            .write(packet_header.id, &mut buffer[offset..]);
        // Unreliable stage.
        offset += peer.unreliable_stream.write(&mut buffer[offset..]);

        let payload = &buffer[..offset];
        match socket.send_to(payload, addr) {
            Ok(sent_count) => debug_assert_eq!(sent_count, payload.len()),
            Err(e) => warn!("failed to send {} bytes to {addr}: {e}", payload.len()),
        }
    }

    fn reconcile_send_rate(peer_max_read_packet_rate: u8, self_max_send_packet_rate: u8) -> u8 {
        // 0 means "no limit from my side": take the other side's value; if
        // both sides say 0, rate limiting is off entirely.
        if peer_max_read_packet_rate == 0 {
            self_max_send_packet_rate
        } else if self_max_send_packet_rate == 0 {
            peer_max_read_packet_rate
        } else {
            peer_max_read_packet_rate.min(self_max_send_packet_rate)
        }
    }

    fn process_delivery_statuses(
        metrics: &mut NeptunMetrics,
        peer: &mut Peer,
        statuses: &DeliveryStatuses,
    ) {
        statuses.for_each(|packet_id, status| {
            peer.connection_manager
                .on_packet_status_delivery(packet_id, status);
            peer.reliable_stream
                .on_packet_delivery_status(packet_id, status);
            match status {
                PacketDeliveryStatus::Ack => metrics.inc_packet_acks(),
                PacketDeliveryStatus::Drop => {
                    debug!("packet {packet_id} dropped");
                    metrics.inc_packet_drops()
                }
            }
        });
    }
}
