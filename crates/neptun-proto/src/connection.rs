use std::collections::VecDeque;

use neptun_binary::error::BinaryError;
use neptun_binary::io::{ByteReader, ByteWriter};
use neptun_binary::traits::{Readable, Writable};

use crate::PacketId;
use crate::error::NeptunError;
use crate::messages::{self, LetsConnect, MessageHeader, RejectLetsConnect, Segment};
use crate::packet_delivery::PacketDeliveryStatus;

/// Per-direction packet budget a peer is willing to honor. Rates are
/// packets per second, sizes are bytes per packet. A rate of zero in the
/// LOCAL configuration means "no limit from my side" when reconciling with a
/// peer; offers arriving on the wire must have every field non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BandwidthLimit {
    pub max_send_packet_rate: u8,
    pub max_read_packet_rate: u8,
    pub max_send_packet_size: u16,
    pub max_read_packet_size: u16,
}

impl BandwidthLimit {
    fn is_valid(&self) -> bool {
        self.max_send_packet_rate > 0
            && self.max_read_packet_rate > 0
            && self.max_send_packet_size > 0
            && self.max_read_packet_size > 0
    }
}

impl From<LetsConnect> for BandwidthLimit {
    fn from(message: LetsConnect) -> Self {
        Self {
            max_send_packet_rate: message.max_send_packet_rate,
            max_read_packet_rate: message.max_read_packet_rate,
            max_send_packet_size: message.max_send_packet_size,
            max_read_packet_size: message.max_read_packet_size,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ConnectionManagerConfig {
    /// How many extra handshake packets to send beyond the first. Redundancy
    /// guards the handshake against single-packet loss without waiting for
    /// round-trip feedback.
    pub num_redundant_packets: usize,
    pub limit: BandwidthLimit,
}

/// Establishes the connection and negotiates bandwidth limits.
///
/// The initiating peer offers its `BandwidthLimit` in a LetsConnect message;
/// the accepting peer records it and responds with its own LetsConnect (or a
/// RejectLetsConnect). Handshake messages ride regular packets, so delivery
/// feedback arrives through the same ACK/DROP feed as everything else: a
/// dropped offer is simply re-armed. Other streams stay gated until the
/// handshake has established the peer's limits.
#[derive(Debug)]
pub struct ConnectionManager {
    num_redundant_packets: usize,
    self_limit: BandwidthLimit,
    in_flight_lets_connect: VecDeque<PacketId>,
    lets_connects_to_send: usize,
    send_reject: bool,
    is_initiator: bool,
    is_peer_acked: bool,
    peer_limit: Option<BandwidthLimit>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionManagerConfig) -> Self {
        Self {
            num_redundant_packets: config.num_redundant_packets,
            self_limit: config.limit,
            in_flight_lets_connect: VecDeque::new(),
            lets_connects_to_send: 0,
            send_reject: false,
            is_initiator: false,
            is_peer_acked: false,
            peer_limit: None,
        }
    }

    /// The next `write()` calls will carry a LetsConnect offer.
    pub fn connect(&mut self) {
        self.lets_connects_to_send = self.num_redundant_packets + 1;
        self.is_initiator = true;
    }

    pub fn on_packet_status_delivery(&mut self, packet_id: PacketId, status: PacketDeliveryStatus) {
        if self.in_flight_lets_connect.front() != Some(&packet_id) {
            return;
        }
        self.in_flight_lets_connect.pop_front();
        match status {
            PacketDeliveryStatus::Ack => {
                // The peer has seen our half of the handshake.
                self.is_peer_acked = true;
            }
            PacketDeliveryStatus::Drop => {
                if self.peer_limit.is_none() {
                    self.lets_connects_to_send += 1;
                }
            }
        }
    }

    /// Consumes a CONNECTION segment from the front of `buffer`, if one is
    /// there. A CONNECTION segment carries exactly one message.
    pub fn read(&mut self, buffer: &[u8]) -> Result<usize, NeptunError> {
        let mut reader = ByteReader::new(buffer);
        if reader.remaining() < Segment::SERIALIZED_SIZE {
            return Ok(0);
        }
        let segment = Segment::read(&mut reader)?;
        if segment.manager_type != messages::CONNECTION_MANAGER {
            return Ok(0);
        }
        if segment.message_count != 1 {
            return Err(NeptunError::MalformedPacket(BinaryError::InvalidData(
                format!("connection segment with {} messages", segment.message_count),
            )));
        }

        let message_header = MessageHeader::read(&mut reader)?;
        match message_header.message_type {
            LetsConnect::ID => {
                let lets_connect = LetsConnect::read(&mut reader)?;
                self.process_lets_connect(lets_connect);
                Ok(reader.position())
            }
            RejectLetsConnect::ID => {
                // Terminal: stop offering, the peer has said no.
                self.lets_connects_to_send = 0;
                Err(NeptunError::LetsConnectRejected)
            }
            unknown => Err(NeptunError::MalformedPacket(BinaryError::InvalidData(
                format!("unknown connection message type {unknown}"),
            ))),
        }
    }

    /// Emits one pending handshake message, if any. Returns the bytes
    /// written; 0 leaves the send counter untouched (including when the
    /// buffer can't hold the handshake).
    pub fn write(&mut self, packet_id: PacketId, buffer: &mut [u8]) -> usize {
        if self.lets_connects_to_send == 0 {
            return 0;
        }
        let mut writer = ByteWriter::new(buffer);
        let segment = Segment {
            manager_type: messages::CONNECTION_MANAGER,
            message_count: 1,
        };
        let written = if self.send_reject {
            segment.write(&mut writer).and_then(|()| {
                MessageHeader {
                    message_type: RejectLetsConnect::ID,
                }
                .write(&mut writer)
            })
        } else {
            let offer = LetsConnect {
                max_send_packet_rate: self.self_limit.max_send_packet_rate,
                max_read_packet_rate: self.self_limit.max_read_packet_rate,
                max_send_packet_size: self.self_limit.max_send_packet_size,
                max_read_packet_size: self.self_limit.max_read_packet_size,
            };
            segment
                .write(&mut writer)
                .and_then(|()| {
                    MessageHeader {
                        message_type: LetsConnect::ID,
                    }
                    .write(&mut writer)
                })
                .and_then(|()| offer.write(&mut writer))
        };
        if written.is_err() {
            return 0;
        }
        self.in_flight_lets_connect.push_back(packet_id);
        self.lets_connects_to_send -= 1;
        writer.position()
    }

    pub fn peer_limit(&self) -> Option<BandwidthLimit> {
        self.peer_limit
    }

    /// The peer's limits are known, so its stream messages may be accepted.
    pub fn is_peer_connected(&self) -> bool {
        self.peer_limit.is_some()
    }

    /// Both sides know the negotiated limits are in effect: the peer's
    /// limits are known AND the peer has ACKed our half of the handshake.
    pub fn is_fully_connected(&self) -> bool {
        self.is_peer_connected() && self.is_peer_acked
    }

    fn process_lets_connect(&mut self, lets_connect: LetsConnect) {
        let limit = BandwidthLimit::from(lets_connect);
        if !limit.is_valid() {
            // Keep the peer unconnected and answer every future handshake
            // packet with a rejection.
            self.send_reject = true;
            self.lets_connects_to_send = self.num_redundant_packets + 1;
            return;
        }
        self.send_reject = false;
        if self.is_initiator {
            if self.peer_limit.is_some() {
                // Only the first response counts; the protocol requires
                // redundant copies to be identical.
                return;
            }
            self.in_flight_lets_connect.clear();
            self.peer_limit = Some(limit);
        } else {
            // This is a request: schedule our response.
            self.lets_connects_to_send = self.num_redundant_packets;
            self.peer_limit = Some(limit);
        }
    }
}
