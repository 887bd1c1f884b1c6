use neptun_binary::error::BinaryError;
use neptun_binary::io::{ByteReader, ByteWriter};
use neptun_binary::traits::{Readable, Writable};

/// Groups `message_count` messages addressed to one manager inside a
/// datagram. Segments appear in canonical order CONNECTION -> RELIABLE ->
/// UNRELIABLE; any of them may be absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub manager_type: u8,
    pub message_count: u8,
}

impl Segment {
    pub const SERIALIZED_SIZE: usize = 2;
}

impl Writable for Segment {
    fn write(&self, writer: &mut ByteWriter) -> Result<(), BinaryError> {
        writer.write_u8(self.manager_type)?;
        writer.write_u8(self.message_count)?;
        Ok(())
    }
}

impl Readable for Segment {
    fn read(reader: &mut ByteReader) -> Result<Self, BinaryError> {
        let manager_type = reader.read_u8()?;
        let message_count = reader.read_u8()?;
        Ok(Self {
            manager_type,
            message_count,
        })
    }
}
