use std::time::{Duration, Instant};

use crate::connection::{ConnectionManager, ConnectionManagerConfig};
use crate::packet_delivery::PacketDeliveryManager;
use crate::reliable::ReliableStream;
use crate::ticker::Ticker;
use crate::unreliable::UnreliableStream;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Per-peer protocol state, composed in a fixed pipeline on both the read
/// and the write path: packet delivery -> connection -> reliable ->
/// unreliable.
#[derive(Debug)]
pub struct Peer {
    pub send_packet_ticker: Ticker,
    pub packet_delivery_manager: PacketDeliveryManager,
    pub connection_manager: ConnectionManager,
    pub reliable_stream: ReliableStream,
    pub unreliable_stream: UnreliableStream,
}

impl Peer {
    pub fn new(now: Instant, config: ConnectionManagerConfig, packet_timeout: Duration) -> Self {
        Self {
            send_packet_ticker: Ticker::new(now, Duration::ZERO),
            packet_delivery_manager: PacketDeliveryManager::new(0, packet_timeout),
            connection_manager: ConnectionManager::new(config),
            reliable_stream: ReliableStream::default(),
            unreliable_stream: UnreliableStream::default(),
        }
    }

    /// Applies a negotiated send rate; 0 disables rate limiting.
    pub fn update_send_rate(&mut self, rate: u8) {
        if rate == 0 {
            self.send_packet_ticker.clear_tick_interval();
        } else {
            let tick_interval = Duration::from_nanos(NANOS_PER_SECOND / rate as u64);
            self.send_packet_ticker.set_tick_interval(tick_interval);
        }
    }
}
