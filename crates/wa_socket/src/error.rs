use std::time::Duration;

use thiserror::Error;
use wa_binary::BinaryError;
use wa_noise::NoiseError;

pub type Result<T> = std::result::Result<T, SocketError>;

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Noise error: {0}")]
    Noise(#[from] NoiseError),

    #[error("Node codec error: {0}")]
    Binary(#[from] BinaryError),

    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Server certificate rejected: {0}")]
    CertificateRejected(String),

    #[error("Unexpected prologue from peer")]
    UnexpectedPrologue,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Peer closed the stream with {0} bytes of an unfinished frame")]
    TruncatedStream(usize),

    #[error("Connection closed")]
    Closed,
}

impl SocketError {
    /// True for AEAD failures: a corrupted frame, counter desynchronisation or
    /// a second session using the same identity. Reconnect with a full handshake.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Noise(err) if err.is_authentication_failure())
    }
}
