//! Reliability and flow control over unreliable datagram transport.
//!
//! A [`Neptun`] instance owns one bound datagram endpoint and a per-peer
//! protocol pipeline: packet delivery tracking (ACK/DROP inference over a
//! 32-wide sliding window), a connection handshake that negotiates
//! per-direction bandwidth limits, an in-order exactly-once reliable stream,
//! and a best-effort unreliable stream. Each tick multiplexes all four into
//! at most one outgoing datagram per peer and demultiplexes at most one
//! incoming datagram.

pub mod connection;
pub mod fake_network;
pub mod flip_buffer;
pub mod format;
pub mod messages;
pub mod metrics;
pub mod neptun;
pub mod packet_delivery;
pub mod peer;
pub mod reliable;
pub mod socket;
pub mod ticker;
pub mod unreliable;

mod error;

pub use connection::{BandwidthLimit, ConnectionManager, ConnectionManagerConfig};
pub use error::NeptunError;
pub use metrics::NeptunMetrics;
pub use neptun::Neptun;
pub use packet_delivery::{DeliveryStatuses, PacketDeliveryManager, PacketDeliveryStatus};
pub use reliable::ReliableStream;
pub use socket::{Socket, UdpTransport};
pub use unreliable::UnreliableStream;

/// Identifier of an outbound datagram, unique per peer direction.
pub type PacketId = u32;
/// Position of a reliable message within its per-direction stream.
pub type SequenceNumber = u32;

/// Receive buffer size: a little above any packet we would ever emit, so a
/// receiver tolerates slightly larger inbound packets than it sends.
pub const READ_MTU: usize = 1600;
/// Hard cap on the size of an emitted datagram.
pub const WRITE_MTU: u16 = 1400;
