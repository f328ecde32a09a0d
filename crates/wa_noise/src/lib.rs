//! wa_noise — handshake and encrypted transport for the node socket
//!
//! # Module layout
//! - `keys`      — X25519 key pairs (static identity, per-connection ephemeral)
//! - `aead`      — AES-256-GCM with 12-byte big-endian counter nonces
//! - `kdf`       — HKDF-SHA256 extract/expand into two 32-byte halves
//! - `proto`     — protobuf handshake messages
//! - `handshake` — Noise XX state machine plus client and server drivers
//! - `transport` — session keys, frame writer/reader, stream splitter
//! - `error`     — unified error type
//!
//! Key material never leaves this crate except as a `FrameWriter`/`FrameReader`.

pub mod aead;
pub mod error;
pub mod handshake;
pub mod kdf;
pub mod keys;
pub mod proto;
pub mod transport;

pub use error::{NoiseError, Result};
pub use handshake::{
    prologue, ClientHandshake, ClientKind, HandshakeState, Role, ServerHandshake, ServerIdentity,
    NOISE_PROTOCOL,
};
pub use keys::KeyPair;
pub use transport::{
    frame, intro_header, FrameReader, FrameSplitter, FrameWriter, SessionKeys, MAX_FRAME_LEN,
};
