//! Handshake messages (protobuf).
//!
//! ```text
//! message HandshakeMessage {
//!   optional ClientHello  client_hello  = 2;
//!   optional ServerHello  server_hello  = 3;
//!   optional ClientFinish client_finish = 4;
//! }
//! message ClientHello  { optional bytes ephemeral = 1; optional bytes static = 2; optional bytes payload = 3; }
//! message ServerHello  { optional bytes ephemeral = 1; optional bytes static = 2; optional bytes payload = 3; }
//! message ClientFinish { optional bytes static = 1; optional bytes payload = 2; }
//! ```

use prost::Message;

use crate::error::{NoiseError, Result};

#[derive(Clone, PartialEq, Message)]
pub struct HandshakeMessage {
    #[prost(message, optional, tag = "2")]
    pub client_hello: Option<ClientHello>,
    #[prost(message, optional, tag = "3")]
    pub server_hello: Option<ServerHello>,
    #[prost(message, optional, tag = "4")]
    pub client_finish: Option<ClientFinish>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClientHello {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub ephemeral: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub static_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub payload: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ServerHello {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub ephemeral: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub static_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub payload: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClientFinish {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub static_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub payload: Option<Vec<u8>>,
}

pub(crate) fn required<T>(value: Option<T>, field: &'static str) -> Result<T> {
    value.ok_or_else(|| NoiseError::MalformedMessage(format!("missing {field}")))
}

pub(crate) fn decode(bytes: &[u8]) -> Result<HandshakeMessage> {
    Ok(HandshakeMessage::decode(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_hello_wire_layout() {
        let message = HandshakeMessage {
            client_hello: Some(ClientHello {
                ephemeral: Some(vec![0xAA; 2]),
                ..Default::default()
            }),
            ..Default::default()
        };
        // field 2 (length-delimited) { field 1 (length-delimited) [AA AA] }
        assert_eq!(message.encode_to_vec(), vec![0x12, 0x04, 0x0A, 0x02, 0xAA, 0xAA]);
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = required::<Vec<u8>>(None, "server_hello").unwrap_err();
        assert!(matches!(err, NoiseError::MalformedMessage(m) if m.contains("server_hello")));
    }
}
