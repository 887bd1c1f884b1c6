use neptun_binary::error::{BinaryError, Result};
use neptun_binary::io::{ByteReader, ByteWriter};

/// A best-effort message: `length: u16`, then `length` payload bytes. No
/// sequencing, no retransmission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnreliableMessage<'a> {
    pub payload: &'a [u8],
}

impl<'a> UnreliableMessage<'a> {
    pub const HEADER_SIZE: usize = 2;

    pub const fn serialized_size(payload_len: usize) -> usize {
        Self::HEADER_SIZE + payload_len
    }

    pub fn read(reader: &mut ByteReader<'a>) -> Result<Self> {
        if reader.remaining() < Self::HEADER_SIZE {
            return Err(BinaryError::UnexpectedEof {
                needed: Self::HEADER_SIZE,
                remaining: reader.remaining(),
            });
        }
        let length = reader.read_u16()?;
        if length == 0 {
            return Err(BinaryError::InvalidData(
                "unreliable message with zero-length payload".to_string(),
            ));
        }
        let payload = reader.read_bytes(length as usize)?;
        Ok(Self { payload })
    }

    pub fn write(writer: &mut ByteWriter, payload: &[u8]) -> Result<()> {
        writer.write_u16(payload.len() as u16)?;
        writer.write_bytes(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut storage = [0u8; 16];
        let mut writer = ByteWriter::new(&mut storage);
        UnreliableMessage::write(&mut writer, b"state").unwrap();
        let written = writer.position();
        assert_eq!(written, UnreliableMessage::serialized_size(5));

        let mut reader = ByteReader::new(&storage[..written]);
        assert_eq!(
            UnreliableMessage::read(&mut reader).unwrap().payload,
            b"state"
        );
    }

    #[test]
    fn length_overrunning_buffer_is_malformed() {
        let storage = [0x00, 0x09, b'x'];
        let mut reader = ByteReader::new(&storage);
        assert!(matches!(
            UnreliableMessage::read(&mut reader),
            Err(BinaryError::UnexpectedEof { .. })
        ));
    }
}
