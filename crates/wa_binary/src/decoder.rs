//! bytes → `Node`.
//!
//! The first byte is a flags byte. When `flags & 2` is set, the rest of the
//! payload is a zlib stream and is inflated (bounded) before parsing. The
//! decoder has no resynchronisation points: any malformed or truncated input
//! aborts the whole decode and nothing partial is returned.

use std::io::Read;

use flate2::read::ZlibDecoder;
use tracing::trace;

use crate::encoder::FLAG_COMPRESSED;
use crate::error::{BinaryError, Result};
use crate::jid::Jid;
use crate::node::{AttributeValue, Attributes, Content, Node};
use crate::token::{
    double_byte_token, single_byte_token, AD_JID, BINARY_20, BINARY_32, BINARY_8, DICTIONARY_0,
    DICTIONARY_3, HEX_8, JID_PAIR, LIST_16, LIST_8, LIST_EMPTY, NIBBLE_8,
};

/// Inflation bound applied by [`decode`].
pub const DEFAULT_MAX_INFLATED: usize = 16 * 1024 * 1024;

/// Deepest node nesting accepted by the codec; the root is level 0.
pub(crate) const MAX_DEPTH: usize = 256;

const NIBBLE_ALPHABET: [u8; 12] = *b"0123456789-.";
const HEX_ALPHABET: [u8; 16] = *b"0123456789ABCDEF";

pub fn decode(bytes: &[u8]) -> Result<Node> {
    decode_with_limit(bytes, DEFAULT_MAX_INFLATED)
}

/// Decode a payload, refusing to inflate more than `max_inflated` bytes.
pub fn decode_with_limit(bytes: &[u8], max_inflated: usize) -> Result<Node> {
    let (&flags, body) = bytes.split_first().ok_or(BinaryError::Truncated {
        offset: 0,
        needed: 1,
        available: 0,
    })?;

    if flags & FLAG_COMPRESSED != 0 {
        let inflated = inflate(body, max_inflated)?;
        trace!(compressed = body.len(), inflated = inflated.len(), "Inflated payload");
        parse_root(&inflated)
    } else {
        parse_root(body)
    }
}

fn inflate(body: &[u8], max_inflated: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let limit = u64::try_from(max_inflated).unwrap_or(u64::MAX).saturating_add(1);
    ZlibDecoder::new(body).take(limit).read_to_end(&mut out)?;
    if out.len() > max_inflated {
        return Err(BinaryError::InflateLimit(max_inflated));
    }
    Ok(out)
}

fn parse_root(payload: &[u8]) -> Result<Node> {
    let mut reader = Reader::new(payload);
    let node = reader.read_node(0)?;
    if reader.remaining() > 0 {
        return Err(BinaryError::TrailingBytes(reader.remaining()));
    }
    Ok(node)
}

/// A string as read off the wire: tokens and packed strings are always text,
/// literals are whatever bytes were sent.
enum WireString {
    Text(String),
    Raw(Vec<u8>),
}

impl WireString {
    fn into_text(self, context: &'static str) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Raw(bytes) => String::from_utf8(bytes).map_err(|_| BinaryError::InvalidUtf8(context)),
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(BinaryError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u20(&mut self) -> Result<usize> {
        let b = self.take(3)?;
        Ok((usize::from(b[0] & 0x0F) << 16) | (usize::from(b[1]) << 8) | usize::from(b[2]))
    }

    fn read_u32(&mut self) -> Result<usize> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
    }

    fn read_list_size(&mut self, tag: u8) -> Result<usize> {
        match tag {
            LIST_EMPTY => Ok(0),
            LIST_8 => Ok(usize::from(self.read_u8()?)),
            LIST_16 => Ok(usize::from(self.read_u16()?)),
            other => Err(BinaryError::UnexpectedTag {
                tag: other,
                context: "list size",
            }),
        }
    }

    fn read_binary(&mut self, tag: u8) -> Result<Option<Vec<u8>>> {
        let len = match tag {
            BINARY_8 => usize::from(self.read_u8()?),
            BINARY_20 => self.read_u20()?,
            BINARY_32 => self.read_u32()?,
            _ => return Ok(None),
        };
        Ok(Some(self.take(len)?.to_vec()))
    }

    fn read_packed(&mut self, alphabet: &[u8]) -> Result<String> {
        let header = self.read_u8()?;
        let odd = header & 0x80 != 0;
        let packed = self.take(usize::from(header & 0x7F))?;

        let mut out = String::with_capacity(packed.len() * 2);
        for (i, byte) in packed.iter().enumerate() {
            out.push(packed_char(byte >> 4, alphabet)?);
            if odd && i + 1 == packed.len() {
                break;
            }
            out.push(packed_char(byte & 0x0F, alphabet)?);
        }
        Ok(out)
    }

    fn read_token(&mut self, tag: u8) -> Result<String> {
        let dictionary = tag - DICTIONARY_0;
        let index = self.read_u8()?;
        double_byte_token(dictionary, index)
            .map(str::to_string)
            .ok_or(BinaryError::UnknownToken {
                dictionary: Some(dictionary),
                index,
            })
    }

    /// Reads any string-shaped value. `None` means the tag is not a string form.
    fn read_string_form(&mut self, tag: u8) -> Result<Option<WireString>> {
        let value = match tag {
            LIST_EMPTY => WireString::Text(String::new()),
            1..DICTIONARY_0 => single_byte_token(tag)
                .map(|token| WireString::Text(token.to_string()))
                .ok_or(BinaryError::UnknownToken {
                    dictionary: None,
                    index: tag,
                })?,
            DICTIONARY_0..=DICTIONARY_3 => WireString::Text(self.read_token(tag)?),
            NIBBLE_8 => WireString::Text(self.read_packed(&NIBBLE_ALPHABET)?),
            HEX_8 => WireString::Text(self.read_packed(&HEX_ALPHABET)?),
            BINARY_8 | BINARY_20 | BINARY_32 => match self.read_binary(tag)? {
                Some(bytes) => WireString::Raw(bytes),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn read_string(&mut self, context: &'static str) -> Result<String> {
        let tag = self.read_u8()?;
        match self.read_string_form(tag)? {
            Some(value) => value.into_text(context),
            None => Err(BinaryError::UnexpectedTag { tag, context }),
        }
    }

    fn read_ad_jid(&mut self) -> Result<Jid> {
        let agent = self.read_u8()?;
        let device = self.read_u8()?;
        let user = self.read_string("address user")?;
        Ok(Jid::ad(user, agent, device))
    }

    fn read_jid_pair(&mut self) -> Result<Jid> {
        let user = match self.read_u8()? {
            LIST_EMPTY => None,
            tag => match self.read_string_form(tag)? {
                Some(value) => Some(value.into_text("address user")?),
                None => {
                    return Err(BinaryError::UnexpectedTag {
                        tag,
                        context: "address user",
                    })
                }
            },
        };
        let server = self.read_string("address server")?;
        Ok(match user {
            Some(user) => Jid::new(user, server),
            None => Jid::server_only(server),
        })
    }

    fn read_attribute(&mut self) -> Result<AttributeValue> {
        let tag = self.read_u8()?;
        match tag {
            AD_JID => return Ok(AttributeValue::Jid(self.read_ad_jid()?)),
            JID_PAIR => return Ok(AttributeValue::Jid(self.read_jid_pair()?)),
            _ => {}
        }
        match self.read_string_form(tag)? {
            Some(WireString::Text(text)) => Ok(AttributeValue::Text(text)),
            Some(WireString::Raw(bytes)) => Ok(match String::from_utf8(bytes) {
                Ok(text) => AttributeValue::Text(text),
                Err(err) => AttributeValue::Bytes(err.into_bytes()),
            }),
            None => Err(BinaryError::UnexpectedTag {
                tag,
                context: "attribute value",
            }),
        }
    }

    fn read_content(&mut self, depth: usize) -> Result<Content> {
        let tag = self.read_u8()?;
        match tag {
            LIST_EMPTY => Ok(Content::None),
            LIST_8 | LIST_16 => {
                let count = self.read_list_size(tag)?;
                let mut children = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    children.push(self.read_node(depth + 1)?);
                }
                Ok(Content::Nodes(children))
            }
            AD_JID => Ok(Content::Jid(self.read_ad_jid()?)),
            JID_PAIR => Ok(Content::Jid(self.read_jid_pair()?)),
            _ => match self.read_string_form(tag)? {
                Some(WireString::Text(text)) => Ok(Content::Text(text)),
                Some(WireString::Raw(bytes)) => Ok(Content::Bytes(bytes)),
                None => Err(BinaryError::UnexpectedTag {
                    tag,
                    context: "content",
                }),
            },
        }
    }

    fn read_node(&mut self, depth: usize) -> Result<Node> {
        if depth >= MAX_DEPTH {
            return Err(BinaryError::NestingTooDeep(MAX_DEPTH));
        }
        let size_tag = self.read_u8()?;
        let mut units = self.read_list_size(size_tag)?;

        let tag = if units > 0 {
            units -= 1;
            self.read_string("tag")?
        } else {
            String::new()
        };

        let mut attrs = Attributes::with_capacity(units / 2);
        while units >= 2 {
            let key = self.read_string("attribute key")?;
            let value = self.read_attribute()?;
            attrs.insert(key, value);
            units -= 2;
        }

        let content = if units % 2 == 1 {
            self.read_content(depth)?
        } else {
            Content::None
        };
        Ok(Node::from_parts(tag, attrs, content))
    }
}

fn packed_char(code: u8, alphabet: &[u8]) -> Result<char> {
    alphabet
        .get(usize::from(code))
        .map(|&b| char::from(b))
        .ok_or(BinaryError::InvalidPackedCode(code))
}
