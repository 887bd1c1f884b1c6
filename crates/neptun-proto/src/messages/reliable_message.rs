use neptun_binary::error::{BinaryError, Result};
use neptun_binary::io::{ByteReader, ByteWriter};

use crate::SequenceNumber;

/// A reliable stream message: `sequence_number: u32`, `length: u16`, then
/// `length` payload bytes. The payload borrows from the input buffer, so
/// this type carries explicit read/write helpers instead of the codec
/// traits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReliableMessage<'a> {
    pub sequence_number: SequenceNumber,
    pub payload: &'a [u8],
}

impl<'a> ReliableMessage<'a> {
    pub const HEADER_SIZE: usize = 6;

    pub const fn serialized_size(payload_len: usize) -> usize {
        Self::HEADER_SIZE + payload_len
    }

    /// Parses and size-validates one message. An empty payload is malformed:
    /// the stream never wastes bandwidth on zero-length messages.
    pub fn read(reader: &mut ByteReader<'a>) -> Result<Self> {
        if reader.remaining() < Self::HEADER_SIZE {
            return Err(BinaryError::UnexpectedEof {
                needed: Self::HEADER_SIZE,
                remaining: reader.remaining(),
            });
        }
        let sequence_number = reader.read_u32()?;
        let length = reader.read_u16()?;
        if length == 0 {
            return Err(BinaryError::InvalidData(
                "reliable message with zero-length payload".to_string(),
            ));
        }
        let payload = reader.read_bytes(length as usize)?;
        Ok(Self {
            sequence_number,
            payload,
        })
    }

    pub fn write(
        writer: &mut ByteWriter,
        sequence_number: SequenceNumber,
        payload: &[u8],
    ) -> Result<()> {
        writer.write_u32(sequence_number)?;
        writer.write_u16(payload.len() as u16)?;
        writer.write_bytes(payload)
    }
}
