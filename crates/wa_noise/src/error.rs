use thiserror::Error;

pub type Result<T> = std::result::Result<T, NoiseError>;

#[derive(Debug, Error)]
pub enum NoiseError {
    #[error("AEAD encryption failed")]
    Encrypt,

    #[error("Authentication failed: tag mismatch, counter desynchronisation or conflicting session")]
    AuthenticationFailed,

    #[error("Handshake sequencing error: {0}")]
    Sequence(&'static str),

    #[error("State poisoned by an earlier authentication failure")]
    Poisoned,

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Diffie-Hellman produced a non-contributory shared secret")]
    WeakSharedSecret,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Malformed handshake message: {0}")]
    MalformedMessage(String),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Nonce counter exhausted")]
    CounterExhausted,

    #[error("Frame of {len} bytes exceeds the limit of {max}")]
    FrameTooLarge { len: usize, max: usize },
}

impl NoiseError {
    /// AEAD failures must force a fresh handshake.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed | Self::Poisoned)
    }
}
