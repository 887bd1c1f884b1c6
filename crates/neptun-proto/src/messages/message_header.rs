use neptun_binary::error::BinaryError;
use neptun_binary::io::{ByteReader, ByteWriter};
use neptun_binary::traits::{Readable, Writable};

/// Precedes the single message of a CONNECTION segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: u8,
}

impl MessageHeader {
    pub const SERIALIZED_SIZE: usize = 1;
}

impl Writable for MessageHeader {
    fn write(&self, writer: &mut ByteWriter) -> Result<(), BinaryError> {
        writer.write_u8(self.message_type)
    }
}

impl Readable for MessageHeader {
    fn read(reader: &mut ByteReader) -> Result<Self, BinaryError> {
        Ok(Self {
            message_type: reader.read_u8()?,
        })
    }
}
