//! `Node` → bytes.
//!
//! Encoding runs in two passes. `encoded_len` walks the tree once and checks
//! every list and length against its wire limit. The second pass writes into a
//! buffer of exactly that size and cannot fail. A node that does not fit the
//! format, or nests deeper than the decoder accepts, is therefore rejected
//! before a single byte is produced.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::trace;

use crate::decoder::MAX_DEPTH;
use crate::error::{BinaryError, Result};
use crate::jid::Jid;
use crate::node::{AttributeValue, Content, Node};
use crate::token::{
    double_byte_index, single_byte_index, AD_JID, BINARY_20, BINARY_32, BINARY_8, DICTIONARY_0,
    HEX_8, JID_PAIR, LIST_16, LIST_8, LIST_EMPTY, NIBBLE_8, PACKED_MAX,
};

const FLAG_NONE: u8 = 0;
pub(crate) const FLAG_COMPRESSED: u8 = 2;

const PACKED_PAD: u8 = 15;
const BINARY_20_LIMIT: usize = 1 << 20;

/// Total size of `encode(node)`, flags byte included.
pub fn encoded_len(node: &Node) -> Result<usize> {
    Ok(1 + node_len(node, 0)?)
}

/// Encode a node with an uncompressed payload.
pub fn encode(node: &Node) -> Result<Vec<u8>> {
    let len = encoded_len(node)?;
    let mut out = Vec::with_capacity(len);
    out.push(FLAG_NONE);
    write_node(node, &mut out);
    debug_assert_eq!(out.len(), len);
    trace!(tag = node.tag(), len, "Encoded node");
    Ok(out)
}

/// Encode a node and zlib-compress the payload behind the flags byte.
pub fn encode_compressed(node: &Node) -> Result<Vec<u8>> {
    let len = node_len(node, 0)?;
    let mut raw = Vec::with_capacity(len);
    write_node(node, &mut raw);

    let mut encoder = ZlibEncoder::new(vec![FLAG_COMPRESSED], Compression::default());
    encoder.write_all(&raw)?;
    let out = encoder.finish()?;
    trace!(tag = node.tag(), raw = len, compressed = out.len(), "Encoded compressed node");
    Ok(out)
}

// ── String classification ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringForm {
    Single(u8),
    Double(u8, u8),
    Nibble,
    Hex,
    Literal,
}

fn classify(value: &str) -> StringForm {
    if let Some(index) = single_byte_index(value) {
        return StringForm::Single(index);
    }
    if let Some((dictionary, index)) = double_byte_index(value) {
        return StringForm::Double(dictionary, index);
    }
    if value.is_empty() || value.len() > PACKED_MAX {
        return StringForm::Literal;
    }
    if value.bytes().all(|b| nibble_code(b).is_some()) {
        StringForm::Nibble
    } else if value.bytes().all(|b| hex_code(b).is_some()) {
        StringForm::Hex
    } else {
        StringForm::Literal
    }
}

fn nibble_code(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'-' => Some(10),
        b'.' => Some(11),
        _ => None,
    }
}

fn hex_code(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

// ── Length pass ──────────────────────────────────────────────────────────────

fn list_header_len(count: usize) -> Result<usize> {
    if count < 256 {
        Ok(2)
    } else if count < 65_536 {
        Ok(3)
    } else {
        Err(BinaryError::ListTooLarge(count))
    }
}

fn binary_header_len(len: usize) -> Result<usize> {
    if len < 256 {
        Ok(2)
    } else if len < BINARY_20_LIMIT {
        Ok(4)
    } else if u32::try_from(len).is_ok() {
        Ok(5)
    } else {
        Err(BinaryError::LengthTooLarge(len))
    }
}

fn string_len(value: &str) -> Result<usize> {
    match classify(value) {
        StringForm::Single(_) => Ok(1),
        StringForm::Double(..) => Ok(2),
        StringForm::Nibble | StringForm::Hex => Ok(2 + value.len().div_ceil(2)),
        StringForm::Literal => Ok(binary_header_len(value.len())? + value.len()),
    }
}

fn bytes_len(value: &[u8]) -> Result<usize> {
    Ok(binary_header_len(value.len())? + value.len())
}

fn jid_len(jid: &Jid) -> Result<usize> {
    if jid.is_ad() {
        return Ok(3 + string_len(jid.user().unwrap_or_default())?);
    }
    let user = match jid.user() {
        Some(user) => string_len(user)?,
        None => 1,
    };
    Ok(1 + user + string_len(jid.server())?)
}

fn attribute_len(value: &AttributeValue) -> Result<usize> {
    match value {
        AttributeValue::Text(text) => string_len(text),
        AttributeValue::Int(number) => string_len(&number.to_string()),
        AttributeValue::Bool(flag) => string_len(bool_text(*flag)),
        AttributeValue::Bytes(bytes) => bytes_len(bytes),
        AttributeValue::Jid(jid) => jid_len(jid),
    }
}

fn content_len(content: &Content, depth: usize) -> Result<usize> {
    match content {
        Content::None => Ok(0),
        Content::Text(text) => string_len(text),
        Content::Bytes(bytes) => bytes_len(bytes),
        Content::Jid(jid) => jid_len(jid),
        Content::Nodes(children) => {
            let mut total = list_header_len(children.len())?;
            for child in children {
                total += node_len(child, depth + 1)?;
            }
            Ok(total)
        }
    }
}

fn node_len(node: &Node, depth: usize) -> Result<usize> {
    if depth >= MAX_DEPTH {
        return Err(BinaryError::NestingTooDeep(MAX_DEPTH));
    }
    let mut total = list_header_len(node.size())?;
    total += string_len(node.tag())?;
    for (key, value) in node.attrs() {
        total += string_len(key)?;
        total += attribute_len(value)?;
    }
    total += content_len(node.content(), depth)?;
    Ok(total)
}

// ── Write pass ───────────────────────────────────────────────────────────────
//
// Every limit, nesting depth included, was checked by the length pass; the
// writers below only choose between forms that are known to fit.

fn bool_text(flag: bool) -> &'static str {
    if flag {
        "true"
    } else {
        "false"
    }
}

fn write_list_header(count: usize, out: &mut Vec<u8>) {
    if count < 256 {
        out.push(LIST_8);
        out.push(count as u8);
    } else {
        out.push(LIST_16);
        out.extend_from_slice(&(count as u16).to_be_bytes());
    }
}

fn write_binary_header(len: usize, out: &mut Vec<u8>) {
    if len < 256 {
        out.push(BINARY_8);
        out.push(len as u8);
    } else if len < BINARY_20_LIMIT {
        out.push(BINARY_20);
        out.extend_from_slice(&(len as u32).to_be_bytes()[1..]);
    } else {
        out.push(BINARY_32);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
}

fn write_packed(value: &str, tag: u8, code: fn(u8) -> Option<u8>, out: &mut Vec<u8>) {
    let bytes = value.as_bytes();
    let mut header = bytes.len().div_ceil(2) as u8;
    if bytes.len() % 2 == 1 {
        header |= 0x80;
    }
    out.push(tag);
    out.push(header);
    for pair in bytes.chunks(2) {
        let high = code(pair[0]).unwrap_or(PACKED_PAD);
        let low = match pair.get(1) {
            Some(&b) => code(b).unwrap_or(PACKED_PAD),
            None => PACKED_PAD,
        };
        out.push((high << 4) | low);
    }
}

fn write_string(value: &str, out: &mut Vec<u8>) {
    match classify(value) {
        StringForm::Single(index) => out.push(index),
        StringForm::Double(dictionary, index) => {
            out.push(DICTIONARY_0 + dictionary);
            out.push(index);
        }
        StringForm::Nibble => write_packed(value, NIBBLE_8, nibble_code, out),
        StringForm::Hex => write_packed(value, HEX_8, hex_code, out),
        StringForm::Literal => write_bytes(value.as_bytes(), out),
    }
}

fn write_bytes(value: &[u8], out: &mut Vec<u8>) {
    write_binary_header(value.len(), out);
    out.extend_from_slice(value);
}

fn write_jid(jid: &Jid, out: &mut Vec<u8>) {
    if jid.is_ad() {
        out.push(AD_JID);
        out.push(jid.agent());
        out.push(jid.device());
        write_string(jid.user().unwrap_or_default(), out);
        return;
    }
    out.push(JID_PAIR);
    match jid.user() {
        Some(user) => write_string(user, out),
        None => out.push(LIST_EMPTY),
    }
    write_string(jid.server(), out);
}

fn write_attribute(value: &AttributeValue, out: &mut Vec<u8>) {
    match value {
        AttributeValue::Text(text) => write_string(text, out),
        AttributeValue::Int(number) => write_string(&number.to_string(), out),
        AttributeValue::Bool(flag) => write_string(bool_text(*flag), out),
        AttributeValue::Bytes(bytes) => write_bytes(bytes, out),
        AttributeValue::Jid(jid) => write_jid(jid, out),
    }
}

fn write_node(node: &Node, out: &mut Vec<u8>) {
    write_list_header(node.size(), out);
    write_string(node.tag(), out);
    for (key, value) in node.attrs() {
        write_string(key, out);
        write_attribute(value, out);
    }
    match node.content() {
        Content::None => {}
        Content::Text(text) => write_string(text, out),
        Content::Bytes(bytes) => write_bytes(bytes, out),
        Content::Jid(jid) => write_jid(jid, out),
        Content::Nodes(children) => {
            write_list_header(children.len(), out);
            for child in children {
                write_node(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{single_byte_index, DOUBLE_BYTE_TOKENS};

    fn payload(node: &Node) -> Vec<u8> {
        let bytes = encode(node).unwrap();
        assert_eq!(bytes[0], FLAG_NONE);
        bytes[1..].to_vec()
    }

    #[test]
    fn digits_use_nibble_packing_with_pad() {
        let node = Node::new("12345");
        let bytes = payload(&node);
        assert_eq!(bytes, vec![LIST_8, 1, NIBBLE_8, 0x83, 0x12, 0x34, 0x5F]);
    }

    #[test]
    fn even_digit_string_has_no_parity_flag() {
        let bytes = payload(&Node::new("1234"));
        assert_eq!(bytes, vec![LIST_8, 1, NIBBLE_8, 0x02, 0x12, 0x34]);
    }

    #[test]
    fn uppercase_hex_uses_hex_packing() {
        let bytes = payload(&Node::new("DEADBEEF"));
        assert_eq!(bytes, vec![LIST_8, 1, HEX_8, 0x04, 0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn lowercase_hex_is_literal() {
        let bytes = payload(&Node::new("beef"));
        assert_eq!(bytes, vec![LIST_8, 1, BINARY_8, 4, b'b', b'e', b'e', b'f']);
    }

    #[test]
    fn single_byte_table_wins_over_double_byte() {
        assert!(DOUBLE_BYTE_TOKENS[0].contains(&"deny"));
        let index = single_byte_index("deny").unwrap();
        assert_eq!(payload(&Node::new("deny")), vec![LIST_8, 1, index]);
    }

    #[test]
    fn double_byte_tokens_use_dictionary_prefix() {
        assert_eq!(payload(&Node::new("read-self")), vec![LIST_8, 1, DICTIONARY_0, 0]);
    }

    #[test]
    fn empty_string_is_zero_length_literal() {
        assert_eq!(payload(&Node::new("")), vec![LIST_8, 1, BINARY_8, 0]);
    }

    #[test]
    fn long_digit_string_falls_back_to_literal() {
        let digits = "7".repeat(PACKED_MAX + 1);
        let bytes = payload(&Node::new(digits.as_str()));
        assert_eq!(&bytes[2..4], &[BINARY_8, (PACKED_MAX + 1) as u8]);
    }

    #[test]
    fn absent_content_emits_nothing() {
        let node = Node::new("iq").with_attr("id", "abc");
        let bytes = payload(&node);
        assert_eq!(bytes[..2], [LIST_8, 3]);
        assert_eq!(bytes.len(), encoded_len(&node).unwrap() - 1);
    }

    #[test]
    fn list_header_switches_at_256() {
        // "x" is not a token: LIST_8, size, BINARY_8, 1, 'x'
        let children = |n: usize| Node::new("x").with_children(vec![Node::new("y"); n]);

        let bytes = payload(&children(255));
        assert_eq!(bytes[5..7], [LIST_8, 255]);

        let bytes = payload(&children(256));
        assert_eq!(bytes[5..8], [LIST_16, 0x01, 0x00]);

        let err = encode(&children(65_536)).unwrap_err();
        assert!(matches!(err, BinaryError::ListTooLarge(65_536)));
    }

    #[test]
    fn node_size_header_switches_at_256() {
        let with_attrs = |count: usize| {
            (0..count).fold(Node::new("x"), |node, i| node.with_attr(format!("k{i}"), "v"))
        };

        let node = with_attrs(127);
        assert_eq!(node.size(), 255);
        assert_eq!(payload(&node)[..2], [LIST_8, 255]);

        let node = with_attrs(127).with_content(vec![1u8]);
        assert_eq!(node.size(), 256);
        assert_eq!(payload(&node)[..3], [LIST_16, 0x01, 0x00]);

        let node = with_attrs(32_767);
        assert_eq!(node.size(), 65_535);
        assert_eq!(payload(&node)[..3], [LIST_16, 0xFF, 0xFF]);

        let node = with_attrs(32_767).with_content(vec![1u8]);
        assert_eq!(node.size(), 65_536);
        assert!(matches!(encode(&node).unwrap_err(), BinaryError::ListTooLarge(65_536)));
        assert!(matches!(encoded_len(&node).unwrap_err(), BinaryError::ListTooLarge(65_536)));
    }

    #[test]
    fn nesting_is_bounded_like_the_decoder() {
        let chain = |levels: usize| {
            (1..levels).fold(Node::new("n"), |inner, _| Node::new("n").with_children(vec![inner]))
        };

        let deepest = chain(MAX_DEPTH);
        let bytes = encode(&deepest).unwrap();
        assert_eq!(crate::decoder::decode(&bytes).unwrap(), deepest);

        let too_deep = chain(MAX_DEPTH + 1);
        assert!(matches!(encode(&too_deep).unwrap_err(), BinaryError::NestingTooDeep(MAX_DEPTH)));
        assert!(matches!(
            encode_compressed(&too_deep).unwrap_err(),
            BinaryError::NestingTooDeep(MAX_DEPTH)
        ));
    }

    #[test]
    fn binary_length_tags_by_magnitude() {
        let bytes = payload(&Node::new("x").with_content(vec![0u8; 255]));
        assert_eq!(bytes[5..7], [BINARY_8, 255]);

        let bytes = payload(&Node::new("x").with_content(vec![0u8; 256]));
        assert_eq!(bytes[5..9], [BINARY_20, 0x00, 0x01, 0x00]);

        let bytes = payload(&Node::new("x").with_content(vec![0u8; BINARY_20_LIMIT]));
        assert_eq!(bytes[5..10], [BINARY_32, 0x00, 0x10, 0x00, 0x00]);
    }

    #[test]
    fn jid_forms() {
        let node = Node::new("x").with_attr("to", Jid::server_only("s.whatsapp.net"));
        let bytes = payload(&node);
        let server = single_byte_index("s.whatsapp.net").unwrap();
        assert_eq!(bytes[bytes.len() - 3..], [JID_PAIR, LIST_EMPTY, server]);

        let node = Node::new("x").with_content(Jid::ad("1234", 0, 7));
        let bytes = payload(&node);
        assert_eq!(bytes[5..], [AD_JID, 0, 7, NIBBLE_8, 0x02, 0x12, 0x34]);
    }

    #[test]
    fn compressed_payload_is_flagged() {
        let node = Node::new("x").with_content(vec![7u8; 4096]);
        let bytes = encode_compressed(&node).unwrap();
        assert_eq!(bytes[0], FLAG_COMPRESSED);
        assert!(bytes.len() < 4096);
    }
}
