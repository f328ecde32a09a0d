//! Structured addresses.
//!
//! Two shapes travel on the wire:
//!   - a pair `user@server` (user optional), and
//!   - an "AD" address carrying an agent byte and a device byte next to the
//!     user. The server of an AD address is implied by its agent.
//!
//! Text form: `user[.agent][:device]@server`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BinaryError;

pub const USER_SERVER: &str = "s.whatsapp.net";
pub const GROUP_SERVER: &str = "g.us";
pub const BROADCAST_SERVER: &str = "broadcast";
pub const LID_SERVER: &str = "lid";
pub const HOSTED_SERVER: &str = "hosted";
pub const LEGACY_USER_SERVER: &str = "c.us";
pub const NEWSLETTER_SERVER: &str = "newsletter";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    user: Option<String>,
    server: String,
    agent: u8,
    device: u8,
    ad: bool,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            server: server.into(),
            agent: 0,
            device: 0,
            ad: false,
        }
    }

    /// An address with no user part, e.g. the bare `s.whatsapp.net`.
    pub fn server_only(server: impl Into<String>) -> Self {
        Self {
            user: None,
            server: server.into(),
            agent: 0,
            device: 0,
            ad: false,
        }
    }

    /// An AD address. The server follows from `agent`.
    pub fn ad(user: impl Into<String>, agent: u8, device: u8) -> Self {
        Self {
            user: Some(user.into()),
            server: server_for_agent(agent).to_string(),
            agent,
            device,
            ad: true,
        }
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn agent(&self) -> u8 {
        self.agent
    }

    pub fn device(&self) -> u8 {
        self.device
    }

    pub fn is_ad(&self) -> bool {
        self.ad
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }

    /// The same address with agent and device stripped.
    pub fn to_non_ad(&self) -> Jid {
        Self {
            user: self.user.clone(),
            server: self.server.clone(),
            agent: 0,
            device: 0,
            ad: false,
        }
    }
}

fn server_for_agent(agent: u8) -> &'static str {
    match agent {
        0 => USER_SERVER,
        1 => LID_SERVER,
        _ => HOSTED_SERVER,
    }
}

fn agent_for_server(server: &str) -> Option<u8> {
    match server {
        USER_SERVER => Some(0),
        LID_SERVER => Some(1),
        _ => None,
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(user) = &self.user else {
            return f.write_str(&self.server);
        };
        f.write_str(user)?;
        if self.ad {
            if self.agent != 0 && agent_for_server(&self.server) != Some(self.agent) {
                write!(f, ".{}", self.agent)?;
            }
            write!(f, ":{}", self.device)?;
        }
        write!(f, "@{}", self.server)
    }
}

impl FromStr for Jid {
    type Err = BinaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((local, server)) = s.split_once('@') else {
            if s.is_empty() {
                return Err(BinaryError::MalformedJid("empty address".into()));
            }
            return Ok(Jid::server_only(s));
        };
        if server.is_empty() {
            return Err(BinaryError::MalformedJid(format!("missing server in {s:?}")));
        }

        let (local, device) = match local.split_once(':') {
            Some((local, device)) => {
                let device = device
                    .parse::<u8>()
                    .map_err(|_| BinaryError::MalformedJid(format!("bad device in {s:?}")))?;
                (local, Some(device))
            }
            None => (local, None),
        };
        let (user, agent) = match local.split_once('.') {
            Some((user, agent)) => {
                let agent = agent
                    .parse::<u8>()
                    .map_err(|_| BinaryError::MalformedJid(format!("bad agent in {s:?}")))?;
                (user, Some(agent))
            }
            None => (local, None),
        };

        if device.is_none() && agent.is_none() {
            return Ok(Jid::new(user, server));
        }

        let agent = match agent {
            Some(agent) => agent,
            None => agent_for_server(server).ok_or_else(|| {
                BinaryError::MalformedJid(format!("server {server:?} cannot carry a device"))
            })?,
        };
        let jid = Jid::ad(user, agent, device.unwrap_or(0));
        if jid.server != server {
            return Err(BinaryError::MalformedJid(format!(
                "agent {agent} does not belong to server {server:?}"
            )));
        }
        Ok(jid)
    }
}

impl Serialize for Jid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Jid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
