use neptun_binary::error::BinaryError;
use neptun_binary::io::{ByteReader, ByteWriter};
use neptun_binary::traits::{Readable, Writable};

/// Handshake offer/response carrying the sender's bandwidth limits.
/// Rates are packets per second, sizes are bytes per packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LetsConnect {
    pub max_send_packet_rate: u8,
    pub max_read_packet_rate: u8,
    pub max_send_packet_size: u16,
    pub max_read_packet_size: u16,
}

impl LetsConnect {
    pub const ID: u8 = 0;
    pub const SERIALIZED_SIZE: usize = 6;
}

impl Writable for LetsConnect {
    fn write(&self, writer: &mut ByteWriter) -> Result<(), BinaryError> {
        writer.write_u8(self.max_send_packet_rate)?;
        writer.write_u8(self.max_read_packet_rate)?;
        writer.write_u16(self.max_send_packet_size)?;
        writer.write_u16(self.max_read_packet_size)?;
        Ok(())
    }
}

impl Readable for LetsConnect {
    fn read(reader: &mut ByteReader) -> Result<Self, BinaryError> {
        let max_send_packet_rate = reader.read_u8()?;
        let max_read_packet_rate = reader.read_u8()?;
        let max_send_packet_size = reader.read_u16()?;
        let max_read_packet_size = reader.read_u16()?;
        Ok(Self {
            max_send_packet_rate,
            max_read_packet_rate,
            max_send_packet_size,
            max_read_packet_size,
        })
    }
}

/// Handshake rejection; the refusal itself is the whole payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RejectLetsConnect;

impl RejectLetsConnect {
    pub const ID: u8 = 1;
    pub const SERIALIZED_SIZE: usize = 0;
}

impl Writable for RejectLetsConnect {
    fn write(&self, _writer: &mut ByteWriter) -> Result<(), BinaryError> {
        Ok(())
    }
}

impl Readable for RejectLetsConnect {
    fn read(_reader: &mut ByteReader) -> Result<Self, BinaryError> {
        Ok(Self)
    }
}
