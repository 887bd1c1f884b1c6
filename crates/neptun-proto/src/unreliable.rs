use std::collections::VecDeque;

use neptun_binary::io::{ByteReader, ByteWriter};
use neptun_binary::traits::{Readable, Writable};

use crate::error::NeptunError;
use crate::flip_buffer::{BufferRange, FlipBuffer};
use crate::messages::{self, Segment, UnreliableMessage};

const DEFAULT_BUFFER_CAPACITY: usize = 3200;

/// Best-effort message stream. Messages that don't fit the current outgoing
/// datagram are discarded, never retransmitted: an unreliable message that
/// misses its tick is stale.
#[derive(Debug)]
pub struct UnreliableStream {
    buffer: FlipBuffer,
    pending_messages: VecDeque<BufferRange>,
}

impl Default for UnreliableStream {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl UnreliableStream {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            buffer: FlipBuffer::new(buffer_capacity),
            pending_messages: VecDeque::new(),
        }
    }

    pub fn send<F: FnOnce(&mut [u8]) -> usize>(&mut self, write_to_buffer: F) {
        let free = self.buffer.remaining_mut();
        let free_len = free.len();
        let used = write_to_buffer(free);
        debug_assert!(used <= free_len);
        let used = used.min(free_len);
        if used > 0 {
            let begin = self.buffer.end_index();
            self.pending_messages.push_back(BufferRange {
                begin,
                end: begin + used,
            });
            self.buffer.advance(used);
        }
    }

    /// Packs as many pending messages as fit, then discards the rest.
    pub fn write(&mut self, buffer: &mut [u8]) -> usize {
        let mut total_size = Segment::SERIALIZED_SIZE;
        let mut message_count = 0usize;
        for range in &self.pending_messages {
            let message_size = UnreliableMessage::serialized_size(range.len());
            if total_size + message_size > buffer.len() || message_count == u8::MAX as usize {
                break;
            }
            total_size += message_size;
            message_count += 1;
        }
        if message_count == 0 {
            self.discard_pending();
            return 0;
        }

        let mut writer = ByteWriter::new(buffer);
        let segment = Segment {
            manager_type: messages::UNRELIABLE_STREAM,
            message_count: message_count as u8,
        };
        if segment.write(&mut writer).is_err() {
            self.discard_pending();
            return 0;
        }
        for _ in 0..message_count {
            let Some(&range) = self.pending_messages.front() else {
                break;
            };
            let payload = self.buffer.span(range);
            if UnreliableMessage::write(&mut writer, payload).is_err() {
                // Unreachable: every counted message was budgeted above.
                break;
            }
            self.pending_messages.pop_front();
        }
        debug_assert_eq!(writer.position(), total_size);
        self.discard_pending();
        writer.position()
    }

    pub fn read<F: FnMut(&[u8])>(
        &mut self,
        buffer: &[u8],
        mut on_unreliable: F,
    ) -> Result<usize, NeptunError> {
        let mut reader = ByteReader::new(buffer);
        if reader.remaining() < Segment::SERIALIZED_SIZE {
            return Ok(0);
        }
        let segment = Segment::read(&mut reader)?;
        if segment.manager_type != messages::UNRELIABLE_STREAM {
            return Ok(0);
        }
        for _ in 0..segment.message_count {
            let message = UnreliableMessage::read(&mut reader)?;
            on_unreliable(message.payload);
        }
        Ok(reader.position())
    }

    fn discard_pending(&mut self) {
        self.pending_messages.clear();
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send_bytes(stream: &mut UnreliableStream, payload: &[u8]) {
        stream.send(|buffer| {
            buffer[..payload.len()].copy_from_slice(payload);
            payload.len()
        });
    }

    fn read_into_vec(stream: &mut UnreliableStream, buffer: &[u8]) -> (usize, Vec<Vec<u8>>) {
        let mut received = Vec::new();
        let count = stream
            .read(buffer, |payload| received.push(payload.to_vec()))
            .unwrap();
        (count, received)
    }

    #[test]
    fn write_is_empty_without_messages() {
        let mut stream = UnreliableStream::default();
        let mut buffer = [0u8; 1600];
        assert_eq!(stream.write(&mut buffer), 0);
    }

    #[test]
    fn write_then_read_messages() {
        let mut client = UnreliableStream::default();
        let mut server = UnreliableStream::default();
        send_bytes(&mut client, b"position update");
        send_bytes(&mut client, b"another one");

        let mut buffer = [0u8; 1600];
        let write_count = client.write(&mut buffer);
        assert!(write_count > 0);

        let (read_count, received) = read_into_vec(&mut server, &buffer);
        assert_eq!(read_count, write_count);
        assert_eq!(
            received,
            vec![b"position update".to_vec(), b"another one".to_vec()]
        );
    }

    #[test]
    fn messages_that_missed_their_packet_are_discarded() {
        let mut stream = UnreliableStream::default();
        send_bytes(&mut stream, b"first");
        send_bytes(&mut stream, b"second");

        // Room for the segment and the first message only.
        let first_size =
            Segment::SERIALIZED_SIZE + UnreliableMessage::serialized_size(b"first".len());
        let mut small_buffer = vec![0u8; first_size];
        let write_count = stream.write(&mut small_buffer);
        assert_eq!(write_count, first_size);

        // "second" missed its tick and is gone for good.
        let mut buffer = [0u8; 1600];
        assert_eq!(stream.write(&mut buffer), 0);
    }

    #[test]
    fn nothing_to_read_without_unreliable_segment() {
        let mut stream = UnreliableStream::default();
        let buffer = [0u8; 1600];
        let (count, received) = read_into_vec(&mut stream, &buffer);
        assert_eq!(count, 0);
        assert!(received.is_empty());
    }

    #[test]
    fn malformed_message_reports_error() {
        let mut stream = UnreliableStream::default();
        let mut buffer = [0u8; 8];
        {
            let mut writer = ByteWriter::new(&mut buffer);
            Segment {
                manager_type: messages::UNRELIABLE_STREAM,
                message_count: 1,
            }
            .write(&mut writer)
            .unwrap();
            // Declared length runs past the end of the buffer.
            writer.write_u16(500).unwrap();
        }
        let result = stream.read(&buffer, |_payload| {});
        assert!(matches!(result, Err(NeptunError::MalformedPacket(_))));
    }
}
