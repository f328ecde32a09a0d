//! Handshake over an async byte stream.
//!
//! Client:
//!   1. intro (prologue, raw) + framed client hello
//!   2. read framed server hello, verify certificate
//!   3. framed client finish
//!
//! The whole exchange runs under the configured timeout. Every piece of
//! handshake state lives inside the future, so a timeout or error drops it;
//! a retry always starts from fresh ephemeral keys.
//!
//! A read may pull transport bytes in behind the last handshake frame. They
//! stay in the splitter, which is handed to the connection with the keys.

use std::fmt;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use wa_noise::{
    frame, intro_header, ClientHandshake, FrameSplitter, KeyPair, ServerHandshake, SessionKeys,
};

use crate::{
    auth::{CertificateVerifier, ClientPayload},
    config::SocketConfig,
    error::{Result, SocketError},
};

/// Keys from a completed handshake and the stream bytes already read past it.
pub struct Session {
    pub keys: SessionKeys,
    pub(crate) splitter: FrameSplitter,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("keys", &self.keys)
            .field("buffered", &self.splitter.buffered())
            .finish()
    }
}

impl Session {
    /// Transport bytes received during the handshake, not yet consumed.
    pub fn buffered(&self) -> usize {
        self.splitter.buffered()
    }
}

/// Run the client handshake on `stream`.
pub async fn perform_handshake<S>(
    stream: &mut S,
    config: &SocketConfig,
    static_key: &KeyPair,
    verifier: &dyn CertificateVerifier,
    payload: &dyn ClientPayload,
) -> Result<Session>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let limit = config.handshake_timeout();
    match tokio::time::timeout(limit, client_exchange(stream, config, static_key, verifier, payload)).await {
        Ok(Ok(session)) => {
            info!(buffered = session.buffered(), "Handshake complete");
            Ok(session)
        }
        Ok(Err(err)) => {
            warn!(error = %err, "Handshake failed");
            Err(err)
        }
        Err(_) => {
            warn!(timeout = ?limit, "Handshake timed out");
            Err(SocketError::HandshakeTimeout(limit))
        }
    }
}

async fn client_exchange<S>(
    stream: &mut S,
    config: &SocketConfig,
    static_key: &KeyPair,
    verifier: &dyn CertificateVerifier,
    payload: &dyn ClientPayload,
) -> Result<Session>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let prologue = config.prologue();
    let mut handshake = ClientHandshake::new(&prologue, static_key.clone(), KeyPair::generate())?;

    let mut hello = intro_header(&prologue);
    hello.extend_from_slice(&frame(&handshake.client_hello())?);
    stream.write_all(&hello).await?;
    stream.flush().await?;
    debug!("Sent client hello");

    let mut splitter = FrameSplitter::new(config.max_frame_len);
    let server_hello = read_frame(stream, &mut splitter).await?.ok_or(SocketError::Closed)?;
    let identity = handshake.read_server_hello(&server_hello)?;
    verifier.verify(&identity.static_key, &identity.certificate)?;
    debug!("Server certificate accepted");

    let payload = payload.payload().await?;
    let (finish, keys) = handshake.client_finish(&payload)?;
    stream.write_all(&frame(&finish)?).await?;
    stream.flush().await?;
    Ok(Session { keys, splitter })
}

/// A client that completed the responder side of the handshake.
#[derive(Debug)]
pub struct AcceptedClient {
    pub static_key: [u8; 32],
    pub payload: Vec<u8>,
    pub session: Session,
}

/// Responder side of the handshake, for loopback peers and tests.
pub async fn accept_handshake<S>(
    stream: &mut S,
    config: &SocketConfig,
    static_key: &KeyPair,
    certificate: Vec<u8>,
) -> Result<AcceptedClient>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let limit = config.handshake_timeout();
    tokio::time::timeout(limit, server_exchange(stream, config, static_key, certificate))
        .await
        .map_err(|_| SocketError::HandshakeTimeout(limit))?
}

async fn server_exchange<S>(
    stream: &mut S,
    config: &SocketConfig,
    static_key: &KeyPair,
    certificate: Vec<u8>,
) -> Result<AcceptedClient>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let prologue = config.prologue();
    let mut intro = [0u8; 4];
    stream.read_exact(&mut intro).await?;
    if intro != prologue {
        return Err(SocketError::UnexpectedPrologue);
    }

    let mut handshake = ServerHandshake::new(&prologue, static_key.clone(), KeyPair::generate(), certificate);
    let mut splitter = FrameSplitter::new(config.max_frame_len);

    let hello = read_frame(stream, &mut splitter).await?.ok_or(SocketError::Closed)?;
    handshake.read_client_hello(&hello)?;
    stream.write_all(&frame(&handshake.server_hello()?)?).await?;
    stream.flush().await?;

    let finish = read_frame(stream, &mut splitter).await?.ok_or(SocketError::Closed)?;
    let (client_static, payload, keys) = handshake.read_client_finish(&finish)?;
    debug!(
        payload_len = payload.len(),
        buffered = splitter.buffered(),
        "Client handshake accepted"
    );
    Ok(AcceptedClient {
        static_key: client_static,
        payload,
        session: Session { keys, splitter },
    })
}

/// Next frame body from `source`; `None` on a clean end of stream.
pub(crate) async fn read_frame<R>(source: &mut R, splitter: &mut FrameSplitter) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(body) = splitter.next_frame()? {
            return Ok(Some(body));
        }
        if source.read_buf(splitter.buffer_mut()).await? == 0 {
            return match splitter.buffered() {
                0 => Ok(None),
                pending => Err(SocketError::TruncatedStream(pending)),
            };
        }
    }
}
