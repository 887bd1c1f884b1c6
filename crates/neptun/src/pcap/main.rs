//! Offline capture inspector: walks a libpcap file, filters UDP traffic on
//! one port, and prints every matching datagram decoded as Neptun framing.
//! There is no protocol identifier on the wire, so the port filter is the
//! only selector.

use std::process::ExitCode;

use neptun_proto::format::format_packet;

mod file_format;

use file_format::{LINKTYPE_ETHERNET, PcapReader, parse_udp_datagram};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: neptun-pcap <capture.pcap> <port>");
        return ExitCode::FAILURE;
    }
    let path = &args[1];
    let port: u16 = match args[2].parse() {
        Ok(port) => port,
        Err(_) => {
            eprintln!("Invalid port: {}", args[2]);
            return ExitCode::FAILURE;
        }
    };

    let file = match std::fs::read(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to read {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    match inspect(&file, port) {
        Ok(matched) => {
            println!("{matched} matching datagrams");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to parse {path}: {e}");
            ExitCode::FAILURE
        }
    }
}

fn inspect(file: &[u8], port: u16) -> Result<u64, neptun_binary::error::BinaryError> {
    let mut reader = PcapReader::new(file)?;
    let global_header = reader.global_header()?;
    if global_header.network != LINKTYPE_ETHERNET {
        eprintln!(
            "warning: link type {} is not Ethernet, records may not parse",
            global_header.network
        );
    }

    let mut matched = 0u64;
    let mut index = 0u64;
    while !reader.is_empty() {
        let (record_header, record) = reader.record()?;
        index += 1;
        let datagram = match parse_udp_datagram(record) {
            Ok(Some(datagram)) => datagram,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("record #{index}: {e}");
                continue;
            }
        };
        if datagram.source_port != port && datagram.destination_port != port {
            continue;
        }
        matched += 1;
        println!(
            "#{index} {}.{:06} {} -> {} {}",
            record_header.ts_sec,
            record_header.ts_usec,
            datagram.source_port,
            datagram.destination_port,
            format_packet(datagram.payload)
        );
    }
    Ok(matched)
}
