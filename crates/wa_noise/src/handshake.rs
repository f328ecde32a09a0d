//! Noise XX handshake over X25519 / AES-256-GCM / SHA-256.
//!
//! Protocol (initiator = client, responder = server):
//!
//!   -> e                     client hello
//!   <- e, ee, s, es          server hello (static key + certificate encrypted)
//!   -> s, se                 client finish (static key + payload encrypted)
//!
//! Both sides seed the transcript with the protocol name and the prologue,
//! then mix every public key and every ciphertext into it. `finish` splits
//! the final chaining key into the two transport keys.
//!
//! Non-negotiable:
//!   - a failed decrypt poisons the state; the handshake must restart from a
//!     fresh `start` with new ephemeral keys.
//!   - no encrypt, decrypt or finish before the first `mix_key`.

use prost::Message;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use wa_binary::token::DICTIONARY_VERSION;

use crate::{
    aead,
    error::{NoiseError, Result},
    kdf,
    keys::{public_key, KeyPair, PUBLIC_KEY_LEN},
    proto::{self, required, ClientFinish, ClientHello, HandshakeMessage, ServerHello},
    transport::SessionKeys,
};

/// Protocol name, exactly 32 bytes, used as the initial hash, salt and key.
pub const NOISE_PROTOCOL: &[u8; 32] = b"Noise_XX_25519_AESGCM_SHA256\0\0\0\0";

const PROLOGUE_MAGIC: &[u8; 2] = b"WA";

/// Which client flavour connects; selects the prologue version byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    #[default]
    Web,
    Mobile,
}

impl ClientKind {
    fn version_byte(self) -> u8 {
        match self {
            Self::Web => 6,
            Self::Mobile => 5,
        }
    }
}

/// `"WA" ++ [version, dictionary version]`. Mixed into the transcript and sent
/// raw ahead of the first handshake frame.
pub fn prologue(kind: ClientKind) -> [u8; 4] {
    [
        PROLOGUE_MAGIC[0],
        PROLOGUE_MAGIC[1],
        kind.version_byte(),
        DICTIONARY_VERSION,
    ]
}

/// Which end of the handshake we are; fixes the key split in `finish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

// ── State machine ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Started,
    Mixed(u32),
    Poisoned,
}

/// Running transcript hash, chaining salt, cipher key and nonce counter.
///
/// Owned by exactly one handshake; two handshakes never share a state.
pub struct HandshakeState {
    hash: [u8; 32],
    salt: Zeroizing<[u8; 32]>,
    key: Zeroizing<[u8; 32]>,
    counter: u64,
    phase: Phase,
}

impl HandshakeState {
    /// Seed hash, salt and key with `NOISE_PROTOCOL`, then mix the prologue.
    pub fn start(prologue: &[u8]) -> Self {
        let mut state = Self {
            hash: *NOISE_PROTOCOL,
            salt: Zeroizing::new(*NOISE_PROTOCOL),
            key: Zeroizing::new(*NOISE_PROTOCOL),
            counter: 0,
            phase: Phase::Started,
        };
        state.absorb(prologue);
        state
    }

    fn absorb(&mut self, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.hash);
        hasher.update(data);
        self.hash = hasher.finalize().into();
    }

    fn check_live(&self) -> Result<()> {
        match self.phase {
            Phase::Poisoned => Err(NoiseError::Poisoned),
            _ => Ok(()),
        }
    }

    fn check_keyed(&self, op: &'static str) -> Result<()> {
        match self.phase {
            Phase::Poisoned => Err(NoiseError::Poisoned),
            Phase::Started => Err(NoiseError::Sequence(op)),
            Phase::Mixed(_) => Ok(()),
        }
    }

    fn next_counter(&mut self) -> Result<u64> {
        let counter = self.counter;
        self.counter = counter.checked_add(1).ok_or(NoiseError::CounterExhausted)?;
        Ok(counter)
    }

    /// `hash = SHA-256(hash || data)`
    pub fn mix_hash(&mut self, data: &[u8]) -> Result<()> {
        self.check_live()?;
        self.absorb(data);
        Ok(())
    }

    /// `(salt, key) = HKDF(salt, ikm)`, counter back to zero.
    pub fn mix_key(&mut self, ikm: &[u8]) -> Result<()> {
        self.check_live()?;
        let okm = kdf::extract_and_expand(&self.salt, ikm)?;
        let (salt, key) = kdf::split(&okm);
        self.salt = salt;
        self.key = key;
        self.counter = 0;
        self.phase = match self.phase {
            Phase::Mixed(n) => Phase::Mixed(n.saturating_add(1)),
            _ => Phase::Mixed(1),
        };
        Ok(())
    }

    /// Encrypt with `aad = hash`, then mix the ciphertext into the hash.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.check_keyed("encrypt before the first mix_key")?;
        let counter = self.next_counter()?;
        let ciphertext = aead::seal(&self.key, counter, &self.hash, plaintext)?;
        self.absorb(&ciphertext);
        Ok(ciphertext)
    }

    /// Decrypt with `aad = hash`, then mix the ciphertext into the hash.
    /// An authentication failure poisons the state.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.check_keyed("decrypt before the first mix_key")?;
        let counter = self.next_counter()?;
        match aead::open(&self.key, counter, &self.hash, ciphertext) {
            Ok(plaintext) => {
                self.absorb(ciphertext);
                Ok(plaintext)
            }
            Err(err) => {
                self.phase = Phase::Poisoned;
                Err(err)
            }
        }
    }

    /// Derive the transport keys. Consumes the state.
    pub fn finish(self, role: Role) -> Result<SessionKeys> {
        self.check_keyed("finish before the first mix_key")?;
        let okm = kdf::extract_and_expand(&self.salt, &[])?;
        let (first, second) = kdf::split(&okm);
        let keys = match role {
            Role::Initiator => SessionKeys::new(first, second),
            Role::Responder => SessionKeys::new(second, first),
        };
        Ok(keys)
    }

    /// Current transcript hash.
    pub fn transcript_hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Number of `mix_key` calls so far.
    pub fn mix_count(&self) -> u32 {
        match self.phase {
            Phase::Mixed(n) => n,
            _ => 0,
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.phase == Phase::Poisoned
    }
}

impl Drop for HandshakeState {
    fn drop(&mut self) {
        self.hash.zeroize();
    }
}

fn dh(own: &KeyPair, peer: &[u8; PUBLIC_KEY_LEN]) -> Result<Zeroizing<[u8; 32]>> {
    own.agree(peer)
}

// ── Initiator ────────────────────────────────────────────────────────────────

/// What the server proved about itself in its hello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    pub static_key: [u8; PUBLIC_KEY_LEN],
    /// Decrypted certificate payload, for an external verifier.
    pub certificate: Vec<u8>,
}

/// Client side of the handshake.
pub struct ClientHandshake {
    state: HandshakeState,
    static_key: KeyPair,
    ephemeral: KeyPair,
    server_ephemeral: Option<[u8; PUBLIC_KEY_LEN]>,
}

impl ClientHandshake {
    pub fn new(prologue: &[u8], static_key: KeyPair, ephemeral: KeyPair) -> Result<Self> {
        let mut state = HandshakeState::start(prologue);
        state.mix_hash(&ephemeral.public_bytes())?;
        Ok(Self {
            state,
            static_key,
            ephemeral,
            server_ephemeral: None,
        })
    }

    /// Protobuf-encoded client hello carrying our ephemeral key.
    pub fn client_hello(&self) -> Vec<u8> {
        HandshakeMessage {
            client_hello: Some(ClientHello {
                ephemeral: Some(self.ephemeral.public_bytes().to_vec()),
                ..Default::default()
            }),
            ..Default::default()
        }
        .encode_to_vec()
    }

    /// Process the server hello. Returns the server static key and its
    /// decrypted certificate.
    pub fn read_server_hello(&mut self, bytes: &[u8]) -> Result<ServerIdentity> {
        if self.server_ephemeral.is_some() {
            return Err(NoiseError::Sequence("server hello already processed"));
        }
        let hello = required(proto::decode(bytes)?.server_hello, "server_hello")?;
        let ephemeral = required(hello.ephemeral, "server_hello.ephemeral")?;
        let encrypted_static = required(hello.static_key, "server_hello.static")?;
        let encrypted_payload = required(hello.payload, "server_hello.payload")?;
        let server_ephemeral = public_key(&ephemeral, "server ephemeral key")?;

        self.state.mix_hash(&server_ephemeral)?;
        self.state.mix_key(&*dh(&self.ephemeral, &server_ephemeral)?)?;

        let static_key = self.state.decrypt(&encrypted_static)?;
        let server_static = public_key(&static_key, "server static key")?;
        self.state.mix_key(&*dh(&self.ephemeral, &server_static)?)?;

        let certificate = self.state.decrypt(&encrypted_payload)?;
        self.server_ephemeral = Some(server_ephemeral);
        debug!(certificate_len = certificate.len(), "Server hello authenticated");

        Ok(ServerIdentity {
            static_key: server_static,
            certificate,
        })
    }

    /// Build the client finish around `payload` and derive the session keys.
    pub fn client_finish(mut self, payload: &[u8]) -> Result<(Vec<u8>, SessionKeys)> {
        let server_ephemeral = self
            .server_ephemeral
            .ok_or(NoiseError::Sequence("client finish before server hello"))?;

        let encrypted_static = self.state.encrypt(&self.static_key.public_bytes())?;
        self.state.mix_key(&*dh(&self.static_key, &server_ephemeral)?)?;
        let encrypted_payload = self.state.encrypt(payload)?;

        let message = HandshakeMessage {
            client_finish: Some(ClientFinish {
                static_key: Some(encrypted_static),
                payload: Some(encrypted_payload),
            }),
            ..Default::default()
        }
        .encode_to_vec();

        let keys = self.state.finish(Role::Initiator)?;
        debug!("Client handshake finished");
        Ok((message, keys))
    }

    pub fn transcript_hash(&self) -> [u8; 32] {
        self.state.transcript_hash()
    }
}

// ── Responder ────────────────────────────────────────────────────────────────

/// Server side of the handshake, the mirror of [`ClientHandshake`].
pub struct ServerHandshake {
    state: HandshakeState,
    static_key: KeyPair,
    ephemeral: KeyPair,
    certificate: Vec<u8>,
    client_ephemeral: Option<[u8; PUBLIC_KEY_LEN]>,
    hello_sent: bool,
}

impl ServerHandshake {
    pub fn new(prologue: &[u8], static_key: KeyPair, ephemeral: KeyPair, certificate: Vec<u8>) -> Self {
        Self {
            state: HandshakeState::start(prologue),
            static_key,
            ephemeral,
            certificate,
            client_ephemeral: None,
            hello_sent: false,
        }
    }

    pub fn read_client_hello(&mut self, bytes: &[u8]) -> Result<()> {
        if self.client_ephemeral.is_some() {
            return Err(NoiseError::Sequence("client hello already processed"));
        }
        let hello = required(proto::decode(bytes)?.client_hello, "client_hello")?;
        let ephemeral = required(hello.ephemeral, "client_hello.ephemeral")?;
        let client_ephemeral = public_key(&ephemeral, "client ephemeral key")?;
        self.state.mix_hash(&client_ephemeral)?;
        self.client_ephemeral = Some(client_ephemeral);
        Ok(())
    }

    pub fn server_hello(&mut self) -> Result<Vec<u8>> {
        let client_ephemeral = self
            .client_ephemeral
            .ok_or(NoiseError::Sequence("server hello before client hello"))?;
        if self.hello_sent {
            return Err(NoiseError::Sequence("server hello already sent"));
        }

        let ephemeral = self.ephemeral.public_bytes();
        self.state.mix_hash(&ephemeral)?;
        self.state.mix_key(&*dh(&self.ephemeral, &client_ephemeral)?)?;
        let encrypted_static = self.state.encrypt(&self.static_key.public_bytes())?;
        self.state.mix_key(&*dh(&self.static_key, &client_ephemeral)?)?;
        let encrypted_payload = self.state.encrypt(&self.certificate)?;
        self.hello_sent = true;

        Ok(HandshakeMessage {
            server_hello: Some(ServerHello {
                ephemeral: Some(ephemeral.to_vec()),
                static_key: Some(encrypted_static),
                payload: Some(encrypted_payload),
            }),
            ..Default::default()
        }
        .encode_to_vec())
    }

    /// Returns the client static key, its decrypted payload and the session keys.
    pub fn read_client_finish(mut self, bytes: &[u8]) -> Result<([u8; PUBLIC_KEY_LEN], Vec<u8>, SessionKeys)> {
        if !self.hello_sent {
            return Err(NoiseError::Sequence("client finish before server hello"));
        }
        let finish = required(proto::decode(bytes)?.client_finish, "client_finish")?;
        let encrypted_static = required(finish.static_key, "client_finish.static")?;
        let encrypted_payload = required(finish.payload, "client_finish.payload")?;

        let static_key = self.state.decrypt(&encrypted_static)?;
        let client_static = public_key(&static_key, "client static key")?;
        self.state.mix_key(&*dh(&self.ephemeral, &client_static)?)?;
        let payload = self.state.decrypt(&encrypted_payload)?;

        let keys = self.state.finish(Role::Responder)?;
        debug!(payload_len = payload.len(), "Server handshake finished");
        Ok((client_static, payload, keys))
    }

    pub fn transcript_hash(&self) -> [u8; 32] {
        self.state.transcript_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_name_is_32_bytes() {
        assert_eq!(NOISE_PROTOCOL.len(), 32);
        assert!(NOISE_PROTOCOL.starts_with(b"Noise_XX_25519_AESGCM_SHA256"));
    }

    #[test]
    fn prologue_layout() {
        assert_eq!(prologue(ClientKind::Web), [b'W', b'A', 6, DICTIONARY_VERSION]);
        assert_eq!(prologue(ClientKind::Mobile), [b'W', b'A', 5, DICTIONARY_VERSION]);
    }

    #[test]
    fn start_mixes_prologue_into_hash() {
        let state = HandshakeState::start(b"WA\x06\x03");
        let mut hasher = Sha256::new();
        hasher.update(NOISE_PROTOCOL);
        hasher.update(b"WA\x06\x03");
        let expected: [u8; 32] = hasher.finalize().into();
        assert_eq!(state.transcript_hash(), expected);
        assert_eq!(*state.salt, *NOISE_PROTOCOL);
        assert_eq!(*state.key, *NOISE_PROTOCOL);
    }

    #[test]
    fn cipher_operations_require_mix_key() {
        let mut state = HandshakeState::start(b"p");
        assert!(matches!(state.encrypt(b"x"), Err(NoiseError::Sequence(_))));
        assert!(matches!(state.decrypt(&[0u8; 32]), Err(NoiseError::Sequence(_))));
        assert!(matches!(state.finish(Role::Initiator), Err(NoiseError::Sequence(_))));
    }

    #[test]
    fn mix_key_resets_counter() {
        let mut state = HandshakeState::start(b"p");
        state.mix_key(b"ikm").unwrap();
        state.encrypt(b"a").unwrap();
        state.encrypt(b"b").unwrap();
        assert_eq!(state.counter(), 2);
        state.mix_key(b"ikm2").unwrap();
        assert_eq!(state.counter(), 0);
        assert_eq!(state.mix_count(), 2);
    }

    #[test]
    fn encrypt_mixes_ciphertext_not_plaintext() {
        let mut state = HandshakeState::start(b"p");
        state.mix_key(b"ikm").unwrap();
        let before = state.transcript_hash();
        let ciphertext = state.encrypt(b"plain").unwrap();

        let mut hasher = Sha256::new();
        hasher.update(before);
        hasher.update(&ciphertext);
        let expected: [u8; 32] = hasher.finalize().into();
        assert_eq!(state.transcript_hash(), expected);
    }

    #[test]
    fn mirrored_states_agree_and_decrypt() {
        let mut a = HandshakeState::start(b"p");
        let mut b = HandshakeState::start(b"p");
        a.mix_key(b"shared").unwrap();
        b.mix_key(b"shared").unwrap();

        let ct = a.encrypt(b"static key").unwrap();
        assert_eq!(b.decrypt(&ct).unwrap(), b"static key");
        assert_eq!(a.transcript_hash(), b.transcript_hash());

        let initiator = a.finish(Role::Initiator).unwrap();
        let responder = b.finish(Role::Responder).unwrap();
        assert_eq!(initiator.write_key(), responder.read_key());
        assert_eq!(initiator.read_key(), responder.write_key());
    }

    #[test]
    fn initiator_writes_with_first_half() {
        let mut state = HandshakeState::start(b"p");
        state.mix_key(b"shared").unwrap();
        let okm = kdf::extract_and_expand(&state.salt, &[]).unwrap();
        let keys = state.finish(Role::Initiator).unwrap();
        assert_eq!(keys.write_key(), &okm[..32]);
        assert_eq!(keys.read_key(), &okm[32..]);
    }

    #[test]
    fn failed_decrypt_poisons_state() {
        let mut state = HandshakeState::start(b"p");
        state.mix_key(b"ikm").unwrap();
        assert!(matches!(
            state.decrypt(&[0u8; 40]),
            Err(NoiseError::AuthenticationFailed)
        ));
        assert!(state.is_poisoned());
        assert!(matches!(state.mix_hash(b"x"), Err(NoiseError::Poisoned)));
        assert!(matches!(state.mix_key(b"x"), Err(NoiseError::Poisoned)));
        assert!(matches!(state.finish(Role::Initiator), Err(NoiseError::Poisoned)));
    }
}
