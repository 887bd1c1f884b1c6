use neptun_binary::error::BinaryError;
use neptun_binary::io::{ByteReader, ByteWriter};
use neptun_binary::traits::{Readable, Writable};

use crate::PacketId;

/// Leads every datagram. The ack fields describe delivery of the peer's own
/// packets: bit `k` of `ack_bitmask` asserts delivery of
/// `ack_sequence_number + k`. Bits above the most significant set bit are
/// unknown, not dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub id: PacketId,
    pub ack_sequence_number: u32,
    pub ack_bitmask: u32,
}

impl PacketHeader {
    pub const SERIALIZED_SIZE: usize = 12;
}

impl Writable for PacketHeader {
    fn write(&self, writer: &mut ByteWriter) -> Result<(), BinaryError> {
        writer.write_u32(self.id)?;
        writer.write_u32(self.ack_sequence_number)?;
        writer.write_u32(self.ack_bitmask)?;
        Ok(())
    }
}

impl Readable for PacketHeader {
    fn read(reader: &mut ByteReader) -> Result<Self, BinaryError> {
        let id = reader.read_u32()?;
        let ack_sequence_number = reader.read_u32()?;
        let ack_bitmask = reader.read_u32()?;
        Ok(Self {
            id,
            ack_sequence_number,
            ack_bitmask,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let header = PacketHeader {
            id: 77,
            ack_sequence_number: 15,
            ack_bitmask: 0b100011,
        };
        let mut storage = [0u8; PacketHeader::SERIALIZED_SIZE];
        let mut writer = ByteWriter::new(&mut storage);
        header.write(&mut writer).unwrap();
        assert_eq!(writer.position(), PacketHeader::SERIALIZED_SIZE);

        let mut reader = ByteReader::new(&storage);
        assert_eq!(PacketHeader::read(&mut reader).unwrap(), header);
    }
}
