//! Human-readable rendering of raw datagrams, used by the pcap inspector
//! and for verbose logging.

use std::fmt::Write;

use neptun_binary::io::ByteReader;
use neptun_binary::traits::Readable;

use crate::messages::{
    self, LetsConnect, MessageHeader, PacketHeader, RejectLetsConnect, ReliableMessage, Segment,
    UnreliableMessage,
};

/// Renders one datagram: packet header, then each segment with its messages,
/// payloads hex-encoded. Parsing stops at the first malformed byte and says
/// so, since everything after it is unframed.
pub fn format_packet(payload: &[u8]) -> String {
    let mut reader = ByteReader::new(payload);
    let mut out = String::new();
    let Ok(header) = PacketHeader::read(&mut reader) else {
        return format!("<runt datagram: {} bytes>", payload.len());
    };
    let _ = write!(
        out,
        "[packet_id={}, ack_seq_num={}, ack_bitmask={}]",
        header.id, header.ack_sequence_number, header.ack_bitmask
    );

    while !reader.is_empty() {
        match format_segment(&mut reader) {
            Ok(formatted) => {
                out.push(' ');
                out.push_str(&formatted);
            }
            Err(reason) => {
                let _ = write!(out, " <{reason}>");
                break;
            }
        }
    }
    out
}

fn format_segment(reader: &mut ByteReader) -> Result<String, String> {
    let segment = Segment::read(reader).map_err(|e| format!("malformed segment: {e}"))?;
    let mut out = String::new();
    let _ = write!(
        out,
        "[{}, msg_count={}]",
        manager_type_name(segment.manager_type),
        segment.message_count
    );

    match segment.manager_type {
        messages::CONNECTION_MANAGER => {
            let message_header =
                MessageHeader::read(reader).map_err(|e| format!("malformed message header: {e}"))?;
            match message_header.message_type {
                LetsConnect::ID => {
                    let lets_connect = LetsConnect::read(reader)
                        .map_err(|e| format!("malformed lets-connect: {e}"))?;
                    let _ = write!(
                        out,
                        "[max_read_packet_rate={}, max_read_packet_size={}, \
                         max_send_packet_rate={}, max_send_packet_size={}]",
                        lets_connect.max_read_packet_rate,
                        lets_connect.max_read_packet_size,
                        lets_connect.max_send_packet_rate,
                        lets_connect.max_send_packet_size
                    );
                }
                RejectLetsConnect::ID => {
                    out.push_str("[RejectLetsConnect]");
                }
                unknown => return Err(format!("unknown connection message type {unknown}")),
            }
        }
        messages::RELIABLE_STREAM => {
            for _ in 0..segment.message_count {
                let message = ReliableMessage::read(reader)
                    .map_err(|e| format!("malformed reliable message: {e}"))?;
                let _ = write!(
                    out,
                    "[seq_num={}, length={}, payload={}]",
                    message.sequence_number,
                    message.payload.len(),
                    hex::encode(message.payload)
                );
            }
        }
        messages::UNRELIABLE_STREAM => {
            for _ in 0..segment.message_count {
                let message = UnreliableMessage::read(reader)
                    .map_err(|e| format!("malformed unreliable message: {e}"))?;
                let _ = write!(
                    out,
                    "[length={}, payload={}]",
                    message.payload.len(),
                    hex::encode(message.payload)
                );
            }
        }
        unknown => return Err(format!("unknown manager type {unknown}")),
    }
    Ok(out)
}

fn manager_type_name(manager_type: u8) -> &'static str {
    match manager_type {
        messages::CONNECTION_MANAGER => "ConnectionManager",
        messages::RELIABLE_STREAM => "Reliable",
        messages::UNRELIABLE_STREAM => "Unreliable",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neptun_binary::io::ByteWriter;
    use neptun_binary::traits::Writable;

    #[test]
    fn formats_header_and_reliable_segment() {
        let mut buffer = [0u8; 64];
        let len = {
            let mut writer = ByteWriter::new(&mut buffer);
            PacketHeader {
                id: 7,
                ack_sequence_number: 3,
                ack_bitmask: 1,
            }
            .write(&mut writer)
            .unwrap();
            Segment {
                manager_type: messages::RELIABLE_STREAM,
                message_count: 1,
            }
            .write(&mut writer)
            .unwrap();
            ReliableMessage::write(&mut writer, 0, b"hi").unwrap();
            writer.position()
        };

        let formatted = format_packet(&buffer[..len]);
        assert_eq!(
            formatted,
            "[packet_id=7, ack_seq_num=3, ack_bitmask=1] \
             [Reliable, msg_count=1][seq_num=0, length=2, payload=6869]"
        );
    }

    #[test]
    fn runt_datagram_is_reported() {
        assert_eq!(format_packet(&[1, 2, 3]), "<runt datagram: 3 bytes>");
    }

    #[test]
    fn trailing_garbage_is_reported_not_panicked() {
        let mut buffer = [0u8; 14];
        {
            let mut writer = ByteWriter::new(&mut buffer);
            PacketHeader {
                id: 1,
                ack_sequence_number: 0,
                ack_bitmask: 0,
            }
            .write(&mut writer)
            .unwrap();
            // Two bytes that claim to be a segment of foreign type 9.
            writer.write_u8(9).unwrap();
            writer.write_u8(1).unwrap();
        }
        let formatted = format_packet(&buffer);
        assert!(formatted.contains("unknown manager type 9"));
    }
}
