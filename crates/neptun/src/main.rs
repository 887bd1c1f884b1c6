use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use log::{Level, error, info};
use neptun_log::NeptunLogger;
use neptun_proto::{ConnectionManagerConfig, Neptun, UdpTransport};

pub mod config;

const CHAT_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() {
    if NeptunLogger::init(Level::Info).is_err() {
        eprintln!("failed to install the logger");
        std::process::exit(1);
    }

    let config = match config::handle() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let bind_address = match SocketAddr::from_str(&config.network.bind_address) {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid bind address: {e}");
            std::process::exit(1);
        }
    };
    let socket = match UdpTransport::bind(bind_address) {
        Ok(socket) => socket,
        Err(e) => {
            error!("Failed to bind {bind_address}: {e}");
            std::process::exit(1);
        }
    };
    info!("Neptun bound to {bind_address}");

    let connection_manager_config = ConnectionManagerConfig {
        num_redundant_packets: config.protocol.num_redundant_packets,
        limit: config.bandwidth_limit(),
    };
    let packet_timeout = Duration::from_millis(config.protocol.packet_timeout_ms);
    let mut engine = Neptun::new(socket, connection_manager_config, packet_timeout);

    let peer_address = config.peer_address();
    if let Some(peer) = peer_address {
        info!("Connecting to {peer}");
        engine.connect(peer, Instant::now());
    } else {
        info!("No peer configured, waiting for inbound connections");
    }

    let mut interval =
        tokio::time::interval(Duration::from_millis(config.protocol.tick_interval_ms));
    let mut next_chat = Instant::now() + CHAT_INTERVAL;
    let mut chat_counter: u64 = 0;
    let mut was_connected = false;

    loop {
        interval.tick().await;
        let now = Instant::now();

        engine.tick(
            now,
            |payload| info!("reliable message: {}", String::from_utf8_lossy(payload)),
            |payload| info!("unreliable message: {}", String::from_utf8_lossy(payload)),
        );

        let Some(peer) = peer_address else {
            continue;
        };
        if !engine.is_connected(peer) {
            continue;
        }
        if !was_connected {
            was_connected = true;
            info!("Connected to {peer}");
        }
        if now >= next_chat {
            next_chat = now + CHAT_INTERVAL;
            let note = format!("hey there, I'm a reliable message #{chat_counter}");
            chat_counter += 1;
            info!("sending: {note}");
            engine.send_reliable_to(
                peer,
                move |buffer| {
                    if buffer.len() < note.len() {
                        // Doesn't fit right now; try again on a later tick.
                        return 0;
                    }
                    buffer[..note.len()].copy_from_slice(note.as_bytes());
                    note.len()
                },
                now,
            );
        }
    }
}
