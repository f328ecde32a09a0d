//! Post-handshake transport framing.
//!
//! Wire format per frame:
//!   [ length (3 bytes, big-endian) | ciphertext + tag ]
//!
//! Each direction has its own key and its own counter. The writer and the
//! reader are separate values so that each can be owned by exactly one task;
//! `seal`/`open` take `&mut self`, so a counter can never be advanced by two
//! callers at once.

use std::fmt;

use bytes::{Buf, Bytes, BytesMut};
use tracing::warn;
use zeroize::Zeroizing;

use crate::{
    aead::{self, KEY_LEN, TAG_LEN},
    error::{NoiseError, Result},
};

pub const FRAME_HEADER_LEN: usize = 3;
pub const MAX_FRAME_LEN: usize = 0xFF_FFFF;

/// The `(write, read)` key pair produced by a finished handshake.
pub struct SessionKeys {
    write: Zeroizing<[u8; KEY_LEN]>,
    read: Zeroizing<[u8; KEY_LEN]>,
}

impl SessionKeys {
    pub(crate) fn new(write: Zeroizing<[u8; KEY_LEN]>, read: Zeroizing<[u8; KEY_LEN]>) -> Self {
        Self { write, read }
    }

    pub(crate) fn write_key(&self) -> &[u8; KEY_LEN] {
        &self.write
    }

    pub(crate) fn read_key(&self) -> &[u8; KEY_LEN] {
        &self.read
    }

    /// Hand the keys to the framer. Both counters start at zero.
    pub fn into_transport(self) -> (FrameWriter, FrameReader) {
        let writer = FrameWriter {
            key: self.write,
            counter: 0,
        };
        let reader = FrameReader {
            key: self.read,
            counter: 0,
            poisoned: false,
        };
        (writer, reader)
    }
}

impl PartialEq for SessionKeys {
    fn eq(&self, other: &Self) -> bool {
        self.write_key() == other.write_key() && self.read_key() == other.read_key()
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeys { .. }")
    }
}

/// Prefix `body` with its 3-byte length.
pub fn frame(body: &[u8]) -> Result<Vec<u8>> {
    if body.len() > MAX_FRAME_LEN {
        return Err(NoiseError::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(body);
    Ok(out)
}

/// Bytes sent raw once, before the first handshake frame.
pub fn intro_header(prologue: &[u8]) -> Vec<u8> {
    prologue.to_vec()
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct FrameWriter {
    key: Zeroizing<[u8; KEY_LEN]>,
    counter: u64,
}

impl FrameWriter {
    /// Encrypt `plaintext` under the next nonce and return the framed bytes.
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if self.counter == u64::MAX {
            return Err(NoiseError::CounterExhausted);
        }
        let len = plaintext.len() + TAG_LEN;
        if len > MAX_FRAME_LEN {
            return Err(NoiseError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }
        let ciphertext = aead::seal(&self.key, self.counter, &[], plaintext)?;
        self.counter += 1;
        frame(&ciphertext)
    }

    /// Frames sealed so far.
    pub fn counter(&self) -> u64 {
        self.counter
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct FrameReader {
    key: Zeroizing<[u8; KEY_LEN]>,
    counter: u64,
    poisoned: bool,
}

impl FrameReader {
    /// Decrypt one frame body (length prefix already stripped).
    ///
    /// An authentication failure is fatal: the reader refuses every later frame.
    pub fn open(&mut self, body: &[u8]) -> Result<Vec<u8>> {
        if self.poisoned {
            return Err(NoiseError::Poisoned);
        }
        if self.counter == u64::MAX {
            return Err(NoiseError::CounterExhausted);
        }
        match aead::open(&self.key, self.counter, &[], body) {
            Ok(plaintext) => {
                self.counter += 1;
                Ok(plaintext)
            }
            Err(err) => {
                warn!(counter = self.counter, len = body.len(), "Frame authentication failed");
                self.poisoned = true;
                Err(err)
            }
        }
    }

    /// Frames opened so far.
    pub fn counter(&self) -> u64 {
        self.counter
    }
}

// ── Splitter ─────────────────────────────────────────────────────────────────

/// Cuts a byte stream into length-prefixed frame bodies.
pub struct FrameSplitter {
    buf: BytesMut,
    max_frame_len: usize,
}

impl FrameSplitter {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(8 * 1024),
            max_frame_len: max_frame_len.min(MAX_FRAME_LEN),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Read target for stream readers (`AsyncReadExt::read_buf`).
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Bytes received but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// The next complete frame body, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        if self.buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let len = (usize::from(self.buf[0]) << 16) | (usize::from(self.buf[1]) << 8) | usize::from(self.buf[2]);
        if len > self.max_frame_len {
            return Err(NoiseError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        if self.buf.len() < FRAME_HEADER_LEN + len {
            self.buf.reserve(FRAME_HEADER_LEN + len - self.buf.len());
            return Ok(None);
        }
        self.buf.advance(FRAME_HEADER_LEN);
        Ok(Some(self.buf.split_to(len).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (FrameWriter, FrameReader) {
        let keys = SessionKeys::new(Zeroizing::new([1u8; 32]), Zeroizing::new([2u8; 32]));
        let mirror = SessionKeys::new(Zeroizing::new([2u8; 32]), Zeroizing::new([1u8; 32]));
        let (writer, _) = keys.into_transport();
        let (_, reader) = mirror.into_transport();
        (writer, reader)
    }

    #[test]
    fn frame_prefix_is_three_byte_big_endian() {
        let framed = frame(&[0xAB; 0x0102]).unwrap();
        assert_eq!(framed[..3], [0x00, 0x01, 0x02]);
        assert_eq!(framed.len(), 3 + 0x0102);
        assert!(matches!(
            frame(&vec![0u8; MAX_FRAME_LEN + 1]),
            Err(NoiseError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn seal_then_open_in_order() {
        let (mut writer, mut reader) = pair();
        for i in 0..5u8 {
            let framed = writer.seal(&[i; 10]).unwrap();
            assert_eq!(framed.len(), 3 + 10 + TAG_LEN);
            assert_eq!(reader.open(&framed[3..]).unwrap(), vec![i; 10]);
        }
        assert_eq!(writer.counter(), 5);
        assert_eq!(reader.counter(), 5);
    }

    #[test]
    fn each_frame_uses_a_fresh_nonce() {
        let (mut writer, _) = pair();
        let a = writer.seal(b"same").unwrap();
        let b = writer.seal(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn out_of_order_frame_fails_and_poisons() {
        let (mut writer, mut reader) = pair();
        let _first = writer.seal(b"one").unwrap();
        let second = writer.seal(b"two").unwrap();
        assert!(matches!(reader.open(&second[3..]), Err(NoiseError::AuthenticationFailed)));
        assert!(matches!(reader.open(&second[3..]), Err(NoiseError::Poisoned)));
    }

    #[test]
    fn exhausted_counter_refuses_to_seal() {
        let (mut writer, _) = pair();
        writer.counter = u64::MAX;
        assert!(matches!(writer.seal(b"x"), Err(NoiseError::CounterExhausted)));
    }

    #[test]
    fn splitter_handles_partial_and_coalesced_frames() {
        let mut splitter = FrameSplitter::new(MAX_FRAME_LEN);
        let a = frame(b"hello").unwrap();
        let b = frame(b"world!").unwrap();

        splitter.push(&a[..2]);
        assert!(splitter.next_frame().unwrap().is_none());
        splitter.push(&a[2..]);
        splitter.push(&b);

        assert_eq!(splitter.next_frame().unwrap().as_deref(), Some(&b"hello"[..]));
        assert_eq!(splitter.next_frame().unwrap().as_deref(), Some(&b"world!"[..]));
        assert!(splitter.next_frame().unwrap().is_none());
        assert_eq!(splitter.buffered(), 0);
    }

    #[test]
    fn splitter_rejects_oversized_frames() {
        let mut splitter = FrameSplitter::new(16);
        splitter.push(&[0x00, 0x00, 0x11]);
        assert!(matches!(
            splitter.next_frame(),
            Err(NoiseError::FrameTooLarge { len: 17, max: 16 })
        ));
    }

    #[test]
    fn session_keys_debug_is_redacted() {
        let keys = SessionKeys::new(Zeroizing::new([1u8; 32]), Zeroizing::new([2u8; 32]));
        assert_eq!(format!("{keys:?}"), "SessionKeys { .. }");
    }
}
