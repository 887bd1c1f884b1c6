use std::collections::VecDeque;

use log::trace;
use neptun_binary::io::{ByteReader, ByteWriter};
use neptun_binary::traits::{Readable, Writable};

use crate::error::NeptunError;
use crate::flip_buffer::{BufferRange, FlipBuffer};
use crate::messages::{self, ReliableMessage, Segment};
use crate::packet_delivery::PacketDeliveryStatus;
use crate::{PacketId, SequenceNumber};

const DEFAULT_BUFFER_CAPACITY: usize = 3200;

#[derive(Clone, Copy, Debug)]
struct PendingMessage {
    range: BufferRange,
    sequence_number: SequenceNumber,
}

#[derive(Clone, Copy, Debug)]
struct InFlightMessage {
    packet_id: PacketId,
    message: PendingMessage,
}

/// In-order, exactly-once message stream retransmitting over the ACK/DROP
/// feed.
///
/// Outbound messages live in the flip-buffer from `send` until the packet
/// that carried them is ACKed; a DROP re-enqueues them as pending with their
/// original sequence numbers, so `pending` and `in_flight` ranges stay
/// monotone over the buffer and ACK-side reclamation can consume from the
/// front.
#[derive(Debug)]
pub struct ReliableStream {
    buffer: FlipBuffer,
    pending_messages: VecDeque<PendingMessage>,
    in_flight_messages: VecDeque<InFlightMessage>,
    next_outgoing_sequence_number: SequenceNumber,
    next_expected_sequence_number: SequenceNumber,
}

impl Default for ReliableStream {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl ReliableStream {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            buffer: FlipBuffer::new(buffer_capacity),
            pending_messages: VecDeque::new(),
            in_flight_messages: VecDeque::new(),
            next_outgoing_sequence_number: 0,
            next_expected_sequence_number: 0,
        }
    }

    /// Hands the free tail of the flip-buffer to `write_to_buffer`; a
    /// non-zero return enqueues that span as the next outgoing message. A
    /// zero return means "couldn't fit, try again later".
    pub fn send<F: FnOnce(&mut [u8]) -> usize>(&mut self, write_to_buffer: F) {
        self.flip();
        let free = self.buffer.remaining_mut();
        let free_len = free.len();
        let used = write_to_buffer(free);
        debug_assert!(used <= free_len);
        let used = used.min(free_len);
        if used > 0 {
            let begin = self.buffer.end_index();
            self.pending_messages.push_back(PendingMessage {
                range: BufferRange {
                    begin,
                    end: begin + used,
                },
                sequence_number: self.next_outgoing_sequence_number,
            });
            self.next_outgoing_sequence_number += 1;
            self.buffer.advance(used);
        }
    }

    /// Packs as many leading pending messages as fit into `buffer`, moving
    /// them in-flight under `packet_id`. Returns the bytes written; 0 means
    /// no segment was emitted at all.
    pub fn write(&mut self, packet_id: PacketId, buffer: &mut [u8]) -> usize {
        let mut total_size = Segment::SERIALIZED_SIZE;
        let mut message_count = 0usize;
        for message in &self.pending_messages {
            let message_size = ReliableMessage::serialized_size(message.range.len());
            if total_size + message_size > buffer.len() || message_count == u8::MAX as usize {
                break;
            }
            total_size += message_size;
            message_count += 1;
        }
        if message_count == 0 {
            return 0;
        }

        let mut writer = ByteWriter::new(buffer);
        let segment = Segment {
            manager_type: messages::RELIABLE_STREAM,
            message_count: message_count as u8,
        };
        if segment.write(&mut writer).is_err() {
            return 0;
        }
        for _ in 0..message_count {
            let Some(&message) = self.pending_messages.front() else {
                break;
            };
            let payload = self.buffer.span(message.range);
            if ReliableMessage::write(&mut writer, message.sequence_number, payload).is_err() {
                // Unreachable: every counted message was budgeted above.
                break;
            }
            self.pending_messages.pop_front();
            self.in_flight_messages.push_back(InFlightMessage { packet_id, message });
        }
        debug_assert_eq!(writer.position(), total_size);
        writer.position()
    }

    /// Parses a RELIABLE segment from the front of `buffer`, if one is
    /// there, delivering each message exactly once and in sequence order.
    /// Duplicates and out-of-order messages are discarded; the peer
    /// retransmits under its own drop logic.
    pub fn read<F: FnMut(&[u8])>(
        &mut self,
        packet_id: PacketId,
        buffer: &[u8],
        mut on_reliable: F,
    ) -> Result<usize, NeptunError> {
        let mut reader = ByteReader::new(buffer);
        if reader.remaining() < Segment::SERIALIZED_SIZE {
            return Ok(0);
        }
        let segment = Segment::read(&mut reader)?;
        if segment.manager_type != messages::RELIABLE_STREAM {
            // The segment belongs to another manager; nothing for us here.
            return Ok(0);
        }
        for _ in 0..segment.message_count {
            let message = ReliableMessage::read(&mut reader)?;
            if message.sequence_number == self.next_expected_sequence_number {
                self.next_expected_sequence_number += 1;
                on_reliable(message.payload);
            } else {
                trace!(
                    "discarding reliable message {} from packet {} (expecting {})",
                    message.sequence_number, packet_id, self.next_expected_sequence_number
                );
            }
        }
        Ok(reader.position())
    }

    pub fn on_packet_delivery_status(&mut self, packet_id: PacketId, status: PacketDeliveryStatus) {
        match status {
            PacketDeliveryStatus::Ack => {
                while let Some(&front) = self.in_flight_messages.front() {
                    if front.packet_id != packet_id {
                        break;
                    }
                    debug_assert_eq!(front.message.range.begin, self.buffer.begin_index());
                    self.buffer.consume(front.message.range.len());
                    self.in_flight_messages.pop_front();
                }
                debug_assert!(
                    self.in_flight_messages
                        .front()
                        .is_none_or(|message| message.packet_id > packet_id)
                );
            }
            PacketDeliveryStatus::Drop => {
                debug_assert!(
                    self.in_flight_messages
                        .front()
                        .is_none_or(|message| message.packet_id >= packet_id)
                );
                if self
                    .in_flight_messages
                    .front()
                    .is_none_or(|message| message.packet_id != packet_id)
                {
                    // The dropped packet carried none of our messages.
                    return;
                }
                // Re-enqueue everything currently in flight, not just the
                // dropped packet's run: this keeps the byte ranges across
                // pending and in-flight monotone, which ACK-side `consume`
                // relies on. The cost is retransmitting messages whose
                // packets are still undecided; the receiver discards the
                // duplicates by sequence number.
                while let Some(message) = self.in_flight_messages.pop_back() {
                    self.pending_messages.push_front(message.message);
                }
            }
        }
    }

    fn flip(&mut self) {
        let shift = self.buffer.flip();
        if shift > 0 {
            for message in &mut self.in_flight_messages {
                message.message.range.shift(shift);
            }
            for message in &mut self.pending_messages {
                message.range.shift(shift);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKET_ID: PacketId = 13;

    fn send_bytes(stream: &mut ReliableStream, payload: &[u8]) {
        stream.send(|buffer| {
            buffer[..payload.len()].copy_from_slice(payload);
            payload.len()
        });
    }

    fn read_into_vec(
        stream: &mut ReliableStream,
        packet_id: PacketId,
        buffer: &[u8],
    ) -> (usize, Vec<Vec<u8>>) {
        let mut received = Vec::new();
        let count = stream
            .read(packet_id, buffer, |payload| received.push(payload.to_vec()))
            .unwrap();
        (count, received)
    }

    #[test]
    fn buffer_is_empty_after_write_if_no_messages() {
        let mut buffer = [0u8; 1600];
        let mut stream = ReliableStream::default();
        assert_eq!(stream.write(PACKET_ID, &mut buffer), 0);
    }

    #[test]
    fn writer_returning_zero_enqueues_nothing() {
        let mut stream = ReliableStream::default();
        // Pretend the message is too big to fit right now.
        stream.send(|_buffer| 0);
        let mut buffer = [0u8; 1600];
        assert_eq!(stream.write(PACKET_ID, &mut buffer), 0);
    }

    #[test]
    fn nothing_to_read_from_buffer_without_reliable_segment() {
        let buffer = [0u8; 1600];
        let mut stream = ReliableStream::default();
        let (count, received) = read_into_vec(&mut stream, PACKET_ID, &buffer);
        assert_eq!(count, 0);
        assert!(received.is_empty());
    }

    #[test]
    fn sent_message_is_written_to_packet() {
        let mut stream = ReliableStream::default();
        send_bytes(&mut stream, b"foo is test for bar");

        let mut buffer = [0u8; 1600];
        let byte_count = stream.write(PACKET_ID, &mut buffer);
        assert!(byte_count > 0);

        let mut reader = ByteReader::new(&buffer[..byte_count]);
        let segment = Segment::read(&mut reader).unwrap();
        assert_eq!(segment.manager_type, messages::RELIABLE_STREAM);
        assert_eq!(segment.message_count, 1);
        let message = ReliableMessage::read(&mut reader).unwrap();
        assert_eq!(message.sequence_number, 0);
        assert_eq!(message.payload, b"foo is test for bar");
        assert!(reader.is_empty());
    }

    #[test]
    fn write_then_read_message() {
        let mut client_stream = ReliableStream::default();
        let mut server_stream = ReliableStream::default();
        send_bytes(&mut client_stream, b"foo is test for bar");

        let mut buffer = [0u8; 1600];
        let write_count = client_stream.write(PACKET_ID, &mut buffer);
        assert!(write_count > 0);

        let (read_count, received) = read_into_vec(&mut server_stream, PACKET_ID, &buffer);
        assert_eq!(read_count, write_count);
        assert_eq!(received, vec![b"foo is test for bar".to_vec()]);
    }

    #[test]
    fn packet_delivery_status_drives_retransmission() {
        let dropped_packet_id = PACKET_ID;
        let unresolved_packet_id = PACKET_ID + 1;
        let successful_packet_id = PACKET_ID + 2;
        let after_success_packet_id = PACKET_ID + 3;

        let mut client_stream = ReliableStream::default();
        let mut server_stream = ReliableStream::default();
        send_bytes(&mut client_stream, b"foo is test for bar");

        let mut dropped_packet_buffer = [0u8; 1600];
        let dropped_write_count = client_stream.write(dropped_packet_id, &mut dropped_packet_buffer);
        assert!(dropped_write_count > 0);

        // The message is in flight, so it is not written again.
        let mut unresolved_packet_buffer = [0u8; 1600];
        assert_eq!(
            client_stream.write(unresolved_packet_id, &mut unresolved_packet_buffer),
            0
        );

        client_stream.on_packet_delivery_status(dropped_packet_id, PacketDeliveryStatus::Drop);

        let mut successful_packet_buffer = [0u8; 1600];
        let successful_write_count =
            client_stream.write(successful_packet_id, &mut successful_packet_buffer);
        assert_eq!(successful_write_count, dropped_write_count);

        let (read_count, received) =
            read_into_vec(&mut server_stream, successful_packet_id, &successful_packet_buffer);
        assert_eq!(read_count, successful_write_count);
        assert_eq!(received, vec![b"foo is test for bar".to_vec()]);

        // Once acked, the message is never sent again.
        client_stream.on_packet_delivery_status(successful_packet_id, PacketDeliveryStatus::Ack);
        let mut after_success_buffer = [0u8; 1600];
        assert_eq!(client_stream.write(after_success_packet_id, &mut after_success_buffer), 0);
    }

    #[test]
    fn writes_multiple_messages_per_packet_each_time() {
        let mut client_stream = ReliableStream::default();
        let mut server_stream = ReliableStream::default();

        let total_messages = 10;
        for i in 0..total_messages {
            let payload = format!("foo is test for bar {i}");
            stream_send_string(&mut client_stream, &payload);
        }

        // Room for at most 6 messages.
        let max_messages_per_packet = 6;
        let message_size = ReliableMessage::serialized_size("foo is test for bar X".len());
        let mut buffer = vec![0u8; Segment::SERIALIZED_SIZE + max_messages_per_packet * message_size];

        let write_count = client_stream.write(PACKET_ID, &mut buffer);
        assert!(write_count > 0);

        let (read_count, received) = read_into_vec(&mut server_stream, PACKET_ID, &buffer);
        assert_eq!(read_count, write_count);
        assert_eq!(received.len(), max_messages_per_packet);
        for (i, payload) in received.iter().enumerate() {
            assert_eq!(payload, format!("foo is test for bar {i}").as_bytes());
        }
    }

    fn stream_send_string(stream: &mut ReliableStream, payload: &str) {
        send_bytes(stream, payload.as_bytes());
    }

    #[test]
    fn reads_duplicate_message_only_once() {
        let first_packet_id = 1;
        let second_packet_id = 2;

        let mut client = ReliableStream::default();
        let mut server = ReliableStream::default();
        send_bytes(&mut client, b"foo");

        let mut buffer1 = [0u8; 1600];
        client.write(first_packet_id, &mut buffer1);
        let (_, received) = read_into_vec(&mut server, first_packet_id, &buffer1);
        assert_eq!(received, vec![b"foo".to_vec()]);

        // The client assumes the packet failed and sends the message again;
        // the server has already seen the sequence number.
        client.on_packet_delivery_status(first_packet_id, PacketDeliveryStatus::Drop);
        let mut buffer2 = [0u8; 1600];
        client.write(second_packet_id, &mut buffer2);
        let (_, received) = read_into_vec(&mut server, second_packet_id, &buffer2);
        assert!(received.is_empty());
    }

    #[test]
    fn drop_flushes_every_in_flight_message_in_order() {
        let mut client = ReliableStream::default();
        send_bytes(&mut client, b"first");
        let mut buffer1 = [0u8; 1600];
        client.write(1, &mut buffer1);

        send_bytes(&mut client, b"second");
        let mut buffer2 = [0u8; 1600];
        client.write(2, &mut buffer2);

        // Dropping packet 1 re-enqueues both messages, oldest first, even
        // though packet 2 is still unresolved.
        client.on_packet_delivery_status(1, PacketDeliveryStatus::Drop);

        let mut buffer3 = [0u8; 1600];
        let count = client.write(3, &mut buffer3);
        let mut reader = ByteReader::new(&buffer3[..count]);
        let segment = Segment::read(&mut reader).unwrap();
        assert_eq!(segment.message_count, 2);
        let first = ReliableMessage::read(&mut reader).unwrap();
        let second = ReliableMessage::read(&mut reader).unwrap();
        assert_eq!((first.sequence_number, first.payload), (0, b"first".as_slice()));
        assert_eq!((second.sequence_number, second.payload), (1, b"second".as_slice()));

        // A later status for the stale packet has nothing left to touch.
        client.on_packet_delivery_status(2, PacketDeliveryStatus::Ack);
        client.on_packet_delivery_status(3, PacketDeliveryStatus::Ack);
        let mut buffer4 = [0u8; 1600];
        assert_eq!(client.write(4, &mut buffer4), 0);
    }

    #[test]
    fn buffer_space_is_reclaimed_across_many_round_trips() {
        let mut stream = ReliableStream::new(256);
        for round in 0u32..100 {
            send_bytes(&mut stream, &[round as u8; 100]);
            let mut buffer = [0u8; 256];
            let count = stream.write(round, &mut buffer);
            assert!(count > 0);
            stream.on_packet_delivery_status(round, PacketDeliveryStatus::Ack);
        }
    }

    #[test]
    fn malformed_message_reports_error() {
        let mut stream = ReliableStream::default();
        let mut buffer = [0u8; 16];
        {
            let mut writer = ByteWriter::new(&mut buffer);
            Segment {
                manager_type: messages::RELIABLE_STREAM,
                message_count: 1,
            }
            .write(&mut writer)
            .unwrap();
            writer.write_u32(0).unwrap();
            // Declared length runs past the end of the buffer.
            writer.write_u16(500).unwrap();
        }
        let result = stream.read(PACKET_ID, &buffer, |_payload| {});
        assert!(matches!(result, Err(NeptunError::MalformedPacket(_))));
    }
}
