use std::collections::VecDeque;
use std::time::{Duration, Instant};

use neptun_binary::io::{ByteReader, ByteWriter};
use neptun_binary::traits::{Readable, Writable};

use crate::PacketId;
use crate::messages::PacketHeader;

pub const DEFAULT_PACKET_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketDeliveryStatus {
    Ack,
    Drop,
}

/// Delivery verdicts produced by one call into the manager, in ascending
/// packet-id order. Each outbound id resolves to exactly one status over its
/// lifetime.
#[derive(Debug, Default)]
pub struct DeliveryStatuses {
    statuses: Vec<(PacketId, PacketDeliveryStatus)>,
}

impl DeliveryStatuses {
    pub fn add_ack(&mut self, packet_id: PacketId) {
        self.statuses.push((packet_id, PacketDeliveryStatus::Ack));
    }

    pub fn add_drop(&mut self, packet_id: PacketId) {
        self.statuses.push((packet_id, PacketDeliveryStatus::Drop));
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn for_each<F: FnMut(PacketId, PacketDeliveryStatus)>(&self, mut f: F) {
        for &(packet_id, status) in &self.statuses {
            f(packet_id, status);
        }
    }

    pub fn as_slice(&self) -> &[(PacketId, PacketDeliveryStatus)] {
        &self.statuses
    }
}

#[derive(Clone, Copy, Debug)]
struct InFlightPacket {
    id: PacketId,
    dispatched_at: Instant,
}

/// Assigns outbound packet ids and infers ACK/DROP for in-flight ids from
/// the ack window carried by incoming packet headers. In-flight ids are FIFO,
/// so the front always holds the smallest unresolved id.
#[derive(Debug)]
pub struct PacketDeliveryManager {
    packet_timeout: Duration,
    next_outgoing_packet_id: PacketId,
    next_expected_packet_id: PacketId,
    pending_acks: VecDeque<PacketId>,
    in_flight_packets: VecDeque<InFlightPacket>,
}

impl PacketDeliveryManager {
    pub fn new(next_expected_packet_id: PacketId, packet_timeout: Duration) -> Self {
        Self {
            packet_timeout,
            next_outgoing_packet_id: 0,
            next_expected_packet_id,
            pending_acks: VecDeque::new(),
            in_flight_packets: VecDeque::new(),
        }
    }

    /// Serializes the next packet header, acknowledging as many pending peer
    /// ids as fit the 32-wide window. Returns the bytes written; 0 means the
    /// buffer cannot even hold a header and nothing was consumed.
    pub fn write(&mut self, buffer: &mut [u8], now: Instant) -> usize {
        let (ack_sequence_number, ack_bitmask, ack_count) = self.peek_pending_acks();
        let header = PacketHeader {
            id: self.next_outgoing_packet_id,
            ack_sequence_number,
            ack_bitmask,
        };
        let mut writer = ByteWriter::new(buffer);
        if header.write(&mut writer).is_err() {
            return 0;
        }
        self.pending_acks.drain(..ack_count);
        self.in_flight_packets.push_back(InFlightPacket {
            id: header.id,
            dispatched_at: now,
        });
        self.next_outgoing_packet_id += 1;
        writer.position()
    }

    /// Parses one packet header. The returned byte count is 0 when the packet
    /// is a duplicate or older than anything we still expect; its body must
    /// not be processed, but the ack information has already been honored.
    pub fn process_read(&mut self, buffer: &[u8]) -> (usize, DeliveryStatuses, PacketId) {
        let mut reader = ByteReader::new(buffer);
        let Ok(header) = PacketHeader::read(&mut reader) else {
            return (0, DeliveryStatuses::default(), 0);
        };
        let statuses = self.process_acks(header.ack_sequence_number, header.ack_bitmask);
        let consumed = self.process_packet_header(&header);
        (consumed, statuses, header.id)
    }

    /// Times out stale in-flight ids, converting each to a DROP exactly once.
    pub fn drop_old_packets(&mut self, now: Instant) -> DeliveryStatuses {
        let mut statuses = DeliveryStatuses::default();
        while let Some(&front) = self.in_flight_packets.front() {
            if front.dispatched_at + self.packet_timeout <= now {
                statuses.add_drop(front.id);
                self.in_flight_packets.pop_front();
            } else {
                break;
            }
        }
        statuses
    }

    fn peek_pending_acks(&self) -> (u32, u32, usize) {
        let Some(&base) = self.pending_acks.front() else {
            return (0, 0, 0);
        };
        let mut bitmask = 0u32;
        let mut count = 0;
        for &pending_id in &self.pending_acks {
            debug_assert!(pending_id >= base);
            let bit_position = pending_id - base;
            if bit_position >= 32 {
                // Doesn't fit the window; acknowledged by a future packet.
                break;
            }
            bitmask |= 1 << bit_position;
            count += 1;
        }
        (base, bitmask, count)
    }

    fn process_acks(&mut self, ack_sequence_number: u32, ack_bitmask: u32) -> DeliveryStatuses {
        let mut statuses = DeliveryStatuses::default();
        if ack_bitmask == 0 {
            // Bits above the most significant set bit are unknown, not
            // dropped, so an empty bitmask tells us nothing.
            return statuses;
        }
        let msb = 31 - ack_bitmask.leading_zeros();
        let highest_acked_id = ack_sequence_number + msb;
        while let Some(&front) = self.in_flight_packets.front() {
            if front.id > highest_acked_id {
                // No information yet about the remaining in-flight packets.
                break;
            }
            if front.id < ack_sequence_number {
                // Beyond the window's left edge: definitively unacknowledged.
                statuses.add_drop(front.id);
            } else {
                let delta = front.id - ack_sequence_number;
                if ack_bitmask & (1 << delta) != 0 {
                    statuses.add_ack(front.id);
                } else {
                    statuses.add_drop(front.id);
                }
            }
            self.in_flight_packets.pop_front();
        }
        statuses
    }

    fn process_packet_header(&mut self, header: &PacketHeader) -> usize {
        if header.id < self.next_expected_packet_id {
            // Duplicate or too old; if it was a duplicate we already
            // processed the body.
            return 0;
        }
        // Skipped ids in [next_expected, id) count as dropped by our peer;
        // they fall out of the 32-wide ack window naturally.
        self.pending_acks.push_back(header.id);
        self.next_expected_packet_id = header.id + 1;
        PacketHeader::SERIALIZED_SIZE
    }
}
