//! Just enough of the classic libpcap file format, plus the Ethernet, IPv4
//! and UDP headers needed to reach the datagram payload.
//! <https://wiki.wireshark.org/Development/LibpcapFileFormat>

use neptun_binary::error::{BinaryError, Result};
use neptun_binary::io::ByteReader;

pub const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
/// Same capture format with the writer's byte order swapped.
pub const PCAP_MAGIC_SWAPPED: u32 = 0xd4c3_b2a1;

pub const LINKTYPE_ETHERNET: u32 = 1;
pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const IP_PROTOCOL_UDP: u8 = 0x11;

/// Reader over a capture file. File headers use the capture host's byte
/// order (detected from the magic number); the packet records themselves
/// carry network headers in big-endian as they appeared on the wire.
pub struct PcapReader<'a> {
    reader: ByteReader<'a>,
    swapped: bool,
}

impl<'a> PcapReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Result<Self> {
        let mut reader = ByteReader::new(buffer);
        let magic = reader.read_u32()?;
        let swapped = match magic {
            PCAP_MAGIC => false,
            PCAP_MAGIC_SWAPPED => true,
            other => {
                return Err(BinaryError::InvalidData(format!(
                    "not a pcap file (magic {other:#010x})"
                )));
            }
        };
        Ok(Self { reader, swapped })
    }

    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    pub fn global_header(&mut self) -> Result<PcapGlobalHeader> {
        Ok(PcapGlobalHeader {
            version_major: self.read_u16()?,
            version_minor: self.read_u16()?,
            thiszone: self.read_u32()? as i32,
            sigfigs: self.read_u32()?,
            snaplen: self.read_u32()?,
            network: self.read_u32()?,
        })
    }

    /// Reads one record header and its captured bytes.
    pub fn record(&mut self) -> Result<(PcapRecordHeader, &'a [u8])> {
        let header = PcapRecordHeader {
            ts_sec: self.read_u32()?,
            ts_usec: self.read_u32()?,
            incl_len: self.read_u32()?,
            orig_len: self.read_u32()?,
        };
        let payload = self.reader.read_bytes(header.incl_len as usize)?;
        Ok((header, payload))
    }

    fn read_u16(&mut self) -> Result<u16> {
        let value = self.reader.read_u16()?;
        Ok(if self.swapped { value.swap_bytes() } else { value })
    }

    fn read_u32(&mut self) -> Result<u32> {
        let value = self.reader.read_u32()?;
        Ok(if self.swapped { value.swap_bytes() } else { value })
    }
}

#[derive(Debug)]
pub struct PcapGlobalHeader {
    pub version_major: u16,
    pub version_minor: u16,
    pub thiszone: i32,
    pub sigfigs: u32,
    pub snaplen: u32,
    pub network: u32,
}

#[derive(Debug)]
pub struct PcapRecordHeader {
    pub ts_sec: u32,
    pub ts_usec: u32,
    pub incl_len: u32,
    pub orig_len: u32,
}

/// The UDP payload of one captured Ethernet/IPv4 frame, or `None` when the
/// record is some other traffic.
pub struct UdpDatagram<'a> {
    pub source_port: u16,
    pub destination_port: u16,
    pub payload: &'a [u8],
}

pub fn parse_udp_datagram<'a>(record: &'a [u8]) -> Result<Option<UdpDatagram<'a>>> {
    let mut reader = ByteReader::new(record);

    // Ethernet: destination MAC, source MAC, ether type.
    reader.read_bytes(6)?;
    reader.read_bytes(6)?;
    let ether_type = reader.read_u16()?;
    if ether_type != ETHER_TYPE_IPV4 {
        return Ok(None);
    }

    // IPv4.
    let version_ihl = reader.read_u8()?;
    if version_ihl >> 4 != 4 {
        return Ok(None);
    }
    let header_length = (version_ihl & 0x0f) as usize * 4;
    if header_length < 20 {
        return Err(BinaryError::InvalidData(format!(
            "ipv4 header length {header_length}"
        )));
    }
    reader.read_u8()?; // DSCP/ECN
    reader.read_u16()?; // total length
    reader.read_u32()?; // identification, flags, fragment offset
    reader.read_u8()?; // TTL
    let protocol = reader.read_u8()?;
    reader.read_u16()?; // checksum
    reader.read_u32()?; // source
    reader.read_u32()?; // destination
    reader.read_bytes(header_length - 20)?; // options
    if protocol != IP_PROTOCOL_UDP {
        return Ok(None);
    }

    // UDP.
    let source_port = reader.read_u16()?;
    let destination_port = reader.read_u16()?;
    let length = reader.read_u16()?;
    reader.read_u16()?; // checksum
    let payload_length = (length as usize)
        .checked_sub(8)
        .ok_or_else(|| BinaryError::InvalidData(format!("udp length {length}")))?;
    let payload = reader.read_bytes(payload_length.min(reader.remaining()))?;

    Ok(Some(UdpDatagram {
        source_port,
        destination_port,
        payload,
    }))
}
