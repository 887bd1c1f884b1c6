use error::ConfigError;
use neptun_proto::BandwidthLimit;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod error;

const CONFIG_FILE_NAME: &str = "neptun.toml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub network: NetworkConfig,
    pub limits: LimitsConfig,
    pub protocol: ProtocolConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    pub bind_address: String,
    /// Peer to connect to on startup; empty means "wait for inbound
    /// connections".
    pub peer_address: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LimitsConfig {
    pub max_send_packet_rate: u8,
    pub max_read_packet_rate: u8,
    pub max_send_packet_size: u16,
    pub max_read_packet_size: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProtocolConfig {
    pub num_redundant_packets: usize,
    pub packet_timeout_ms: u64,
    pub tick_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:24816".to_string(),
            peer_address: String::new(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_send_packet_rate: 60,
            max_read_packet_rate: 60,
            max_send_packet_size: 1400,
            max_read_packet_size: 1400,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            num_redundant_packets: 5,
            packet_timeout_ms: 5000,
            tick_interval_ms: 15,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            limits: LimitsConfig::default(),
            protocol: ProtocolConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if SocketAddr::from_str(&self.network.bind_address).is_err() {
            return Err(ConfigError::Validation(format!(
                "invalid bind address '{}', expected IP:PORT",
                self.network.bind_address
            )));
        }
        if !self.network.peer_address.is_empty()
            && SocketAddr::from_str(&self.network.peer_address).is_err()
        {
            return Err(ConfigError::Validation(format!(
                "invalid peer address '{}', expected IP:PORT or empty",
                self.network.peer_address
            )));
        }
        if self.limits.max_send_packet_size == 0 || self.limits.max_read_packet_size == 0 {
            return Err(ConfigError::Validation(
                "packet sizes must be greater than 0".to_string(),
            ));
        }
        if self.protocol.tick_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "tick interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bandwidth_limit(&self) -> BandwidthLimit {
        BandwidthLimit {
            max_send_packet_rate: self.limits.max_send_packet_rate,
            max_read_packet_rate: self.limits.max_read_packet_rate,
            max_send_packet_size: self.limits.max_send_packet_size,
            max_read_packet_size: self.limits.max_read_packet_size,
        }
    }

    pub fn peer_address(&self) -> Option<SocketAddr> {
        SocketAddr::from_str(&self.network.peer_address).ok()
    }
}

/// Loads `neptun.toml`, writing the defaults first if it doesn't exist.
pub fn handle() -> Result<Config, ConfigError> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);
    if config_path.exists() {
        let config_content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    } else {
        let config = Config::default();
        save(&config, &config_path)?;
        Ok(config)
    }
}

fn save(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let config_content = toml::to_string_pretty(config)?;
    let mut file = fs::File::create(path)?;
    file.write_all(config_content.as_bytes())?;
    Ok(())
}
