//! wa_binary — tree-structured node format and its compact binary codec
//!
//! # Module layout
//! - `node`    — immutable `Node` tree: tag, ordered attributes, optional content
//! - `jid`     — structured addresses (user, server, agent/device)
//! - `token`   — wire tag bytes and the static token dictionaries
//! - `encoder` — `Node` → bytes (dictionary, nibble/hex packing, literal strings)
//! - `decoder` — bytes → `Node`, with optional zlib inflation of the payload
//! - `error`   — unified error type
//!
//! Both directions share the same versioned tables (`token::DICTIONARY_VERSION`).
//! A table mismatch with the peer corrupts every decode.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod jid;
pub mod node;
pub mod token;

pub use decoder::{decode, decode_with_limit};
pub use encoder::{encode, encode_compressed, encoded_len};
pub use error::{BinaryError, Result};
pub use jid::Jid;
pub use node::{AttributeValue, Attributes, Content, Node};
