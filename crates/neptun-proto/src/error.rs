use neptun_binary::error::BinaryError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NeptunError {
    #[error("malformed packet: {0}")]
    MalformedPacket(#[from] BinaryError),
    #[error("connection rejected by peer")]
    LetsConnectRejected,
}
