//! wa_socket — async node socket over tokio
//!
//! # Module layout
//! - `config`     — `SocketConfig` (serde, JSON file loading, validation)
//! - `auth`       — certificate verifier and registration payload collaborators
//! - `handshake`  — client handshake over a stream (and the responder side)
//! - `connection` — writer task, `NodeSender`, `NodeReceiver`, `connect`
//! - `error`      — unified error type
//!
//! Reconnection and backoff are left to the caller: every fatal error ends
//! the connection and a new one always runs a full handshake.

pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;

pub use auth::{CertificateVerifier, ClientPayload, PinnedServerKey};
pub use config::SocketConfig;
pub use connection::{connect, Connection, NodeReceiver, NodeSender};
pub use error::{Result, SocketError};
pub use handshake::{accept_handshake, perform_handshake, AcceptedClient, Session};
