//! Established connection: one writer task, one receiver.
//!
//! The writer task is the only owner of the `FrameWriter`, so nonces are
//! assigned in the order nodes leave the queue and never reused. Senders encode
//! on their own task and wait for the writer to acknowledge the write.
//!
//! The receiver opens frames in arrival order. Any receive error is fatal:
//! the receiver answers `Closed` from then on and the writer task stops, so
//! pending and later sends fail with `Closed` as well.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, info, trace, warn};
use wa_binary::{decode_with_limit, encode, encode_compressed, Node};
use wa_noise::{FrameReader, FrameSplitter, FrameWriter, KeyPair};

use crate::{
    auth::{CertificateVerifier, ClientPayload},
    config::SocketConfig,
    error::{Result, SocketError},
    handshake::{perform_handshake, read_frame, Session},
};

struct Outgoing {
    payload: Vec<u8>,
    ack: oneshot::Sender<Result<()>>,
}

pub struct Connection;

impl Connection {
    /// Split `stream` and start the writer task. Must be called inside a
    /// tokio runtime.
    ///
    /// Bytes the handshake already read past its last frame are the start of
    /// the receive stream.
    pub fn establish<S>(stream: S, session: Session, config: &SocketConfig) -> (NodeSender, NodeReceiver)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let Session { keys, splitter } = session;
        let (read_half, write_half) = tokio::io::split(stream);
        let (framer_tx, framer_rx) = keys.into_transport();
        let (tx, rx) = mpsc::channel(config.outgoing_queue.max(1));
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(write_loop(write_half, framer_tx, rx, shutdown.clone()));

        let sender = NodeSender {
            tx,
            compress: config.compress_outgoing,
        };
        let receiver = NodeReceiver {
            source: Box::new(read_half),
            framer: framer_rx,
            splitter,
            max_inflated_len: config.max_inflated_len,
            shutdown,
            failed: false,
        };
        (sender, receiver)
    }
}

async fn write_loop<W>(
    mut sink: W,
    mut framer: FrameWriter,
    mut rx: mpsc::Receiver<Outgoing>,
    shutdown: Arc<Notify>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.notified() => {
                debug!("Receiver failed, stopping writer");
                break;
            }
            next = rx.recv() => next,
        };
        let Some(Outgoing { payload, ack }) = next else {
            break;
        };
        let result = write_frame(&mut sink, &mut framer, &payload).await;
        let failed = result.is_err();
        if let Err(err) = &result {
            warn!(error = %err, "Writer failed, closing connection");
        }
        let _ = ack.send(result);
        if failed {
            break;
        }
    }
    // queued sends see their ack dropped and report `Closed`
    drop(rx);
    let _ = sink.shutdown().await;
    debug!(frames = framer.counter(), "Writer task finished");
}

async fn write_frame<W>(sink: &mut W, framer: &mut FrameWriter, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let framed = framer.seal(payload)?;
    sink.write_all(&framed).await?;
    sink.flush().await?;
    trace!(counter = framer.counter(), len = framed.len(), "Frame sent");
    Ok(())
}

// ── Sender ───────────────────────────────────────────────────────────────────

/// Cloneable handle feeding the writer task.
#[derive(Clone)]
pub struct NodeSender {
    tx: mpsc::Sender<Outgoing>,
    compress: bool,
}

impl NodeSender {
    /// Encode `node` and wait until the writer has put it on the wire.
    pub async fn send(&self, node: &Node) -> Result<()> {
        let payload = if self.compress {
            encode_compressed(node)?
        } else {
            encode(node)?
        };
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Outgoing { payload, ack })
            .await
            .map_err(|_| SocketError::Closed)?;
        done.await.map_err(|_| SocketError::Closed)?
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── Receiver ─────────────────────────────────────────────────────────────────

pub struct NodeReceiver {
    source: Box<dyn AsyncRead + Send + Unpin>,
    framer: FrameReader,
    splitter: FrameSplitter,
    max_inflated_len: usize,
    shutdown: Arc<Notify>,
    failed: bool,
}

impl NodeReceiver {
    /// Next node from the peer; `Ok(None)` once the peer closed cleanly.
    ///
    /// The first error ends the connection; every later call returns `Closed`.
    pub async fn recv(&mut self) -> Result<Option<Node>> {
        if self.failed {
            return Err(SocketError::Closed);
        }
        let result = self.next_node().await;
        if let Err(err) = &result {
            warn!(error = %err, "Receive failed, closing connection");
            self.failed = true;
            self.shutdown.notify_one();
        }
        result
    }

    async fn next_node(&mut self) -> Result<Option<Node>> {
        let Some(body) = read_frame(&mut self.source, &mut self.splitter).await? else {
            debug!(frames = self.framer.counter(), "Peer closed the stream");
            return Ok(None);
        };
        let plaintext = self.framer.open(&body)?;
        let node = decode_with_limit(&plaintext, self.max_inflated_len)?;
        trace!(tag = node.tag(), counter = self.framer.counter(), "Node received");
        Ok(Some(node))
    }
}

/// Connect over TCP, run the handshake and start the connection.
pub async fn connect(
    config: &SocketConfig,
    static_key: &KeyPair,
    verifier: &dyn CertificateVerifier,
    payload: &dyn ClientPayload,
) -> Result<(NodeSender, NodeReceiver)> {
    config.validate()?;
    let address = config.address();
    info!(%address, kind = ?config.client_kind, "Connecting");

    let mut stream = TcpStream::connect(&address).await?;
    stream.set_nodelay(true)?;
    let session = perform_handshake(&mut stream, config, static_key, verifier, payload).await?;
    Ok(Connection::establish(stream, session, config))
}
