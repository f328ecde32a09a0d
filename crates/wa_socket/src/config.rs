use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wa_noise::{prologue, ClientKind, MAX_FRAME_LEN};

use crate::error::{Result, SocketError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    pub host: String,
    pub port: u16,
    pub client_kind: ClientKind,
    pub handshake_timeout_secs: u64,
    /// Largest accepted frame body; never above the 3-byte length limit.
    pub max_frame_len: usize,
    pub compress_outgoing: bool,
    /// Bound of the queue in front of the writer task.
    pub outgoing_queue: usize,
    pub max_inflated_len: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            host: "g.whatsapp.net".into(),
            port: 443,
            client_kind: ClientKind::Web,
            handshake_timeout_secs: 20,
            max_frame_len: MAX_FRAME_LEN,
            compress_outgoing: false,
            outgoing_queue: 64,
            max_inflated_len: 16 * 1024 * 1024,
        }
    }
}

impl SocketConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(SocketError::Config("host must not be empty".into()));
        }
        if self.handshake_timeout_secs == 0 {
            return Err(SocketError::Config("handshake_timeout_secs must be positive".into()));
        }
        if self.outgoing_queue == 0 {
            return Err(SocketError::Config("outgoing_queue must be positive".into()));
        }
        if self.max_frame_len == 0 || self.max_frame_len > MAX_FRAME_LEN {
            return Err(SocketError::Config(format!(
                "max_frame_len must be within 1..={MAX_FRAME_LEN}"
            )));
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn prologue(&self) -> [u8; 4] {
        prologue(self.client_kind)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
