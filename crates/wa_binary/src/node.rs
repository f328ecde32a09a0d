//! The node tree carried by the protocol.
//!
//! A `Node` is a tag, an ordered attribute map and optional content. Nodes are
//! immutable once built; the builder methods consume and return `self`.
//!
//! Integers and booleans are written as strings, and a literal string comes
//! back from the wire as raw bytes. Attribute values and content therefore
//! compare by their wire form: `Int(5) == Text("5")`, `Text("ab") == Bytes(b"ab")`.

use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;

use crate::jid::Jid;

pub type Attributes = IndexMap<String, AttributeValue>;

#[derive(Debug, Clone)]
pub enum AttributeValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Bytes(Vec<u8>),
    Jid(Jid),
}

#[derive(Debug, Clone, Default)]
pub enum Content {
    #[default]
    None,
    Bytes(Vec<u8>),
    Text(String),
    Jid(Jid),
    Nodes(Vec<Node>),
}

#[derive(Debug, Clone)]
pub struct Node {
    tag: String,
    attrs: Attributes,
    content: Content,
}

/// The representation a scalar value has once written.
#[derive(PartialEq)]
enum WireForm<'a> {
    Bytes(Cow<'a, [u8]>),
    Jid(&'a Jid),
}

// ── AttributeValue ───────────────────────────────────────────────────────────

impl AttributeValue {
    fn wire_form(&self) -> WireForm<'_> {
        match self {
            Self::Text(text) => WireForm::Bytes(Cow::Borrowed(text.as_bytes())),
            Self::Int(value) => WireForm::Bytes(Cow::Owned(value.to_string().into_bytes())),
            Self::Bool(value) => {
                let text: &'static str = if *value { "true" } else { "false" };
                WireForm::Bytes(Cow::Borrowed(text.as_bytes()))
            }
            Self::Bytes(bytes) => WireForm::Bytes(Cow::Borrowed(bytes)),
            Self::Jid(jid) => WireForm::Jid(jid),
        }
    }

    /// The value as it is written, if it is string-like.
    pub fn to_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(text) => Some(Cow::Borrowed(text)),
            Self::Int(value) => Some(Cow::Owned(value.to_string())),
            Self::Bool(value) => Some(Cow::Borrowed(if *value { "true" } else { "false" })),
            Self::Bytes(bytes) => std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
            Self::Jid(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            other => other.as_str()?.parse().ok(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            other => match other.as_str()? {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_jid(&self) -> Option<&Jid> {
        match self {
            Self::Jid(jid) => Some(jid),
            _ => None,
        }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        self.wire_form() == other.wire_form()
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Jid> for AttributeValue {
    fn from(value: Jid) -> Self {
        Self::Jid(value)
    }
}

// ── Content ──────────────────────────────────────────────────────────────────

impl Content {
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::None)
    }

    fn wire_form(&self) -> Option<WireForm<'_>> {
        match self {
            Self::Bytes(bytes) => Some(WireForm::Bytes(Cow::Borrowed(bytes))),
            Self::Text(text) => Some(WireForm::Bytes(Cow::Borrowed(text.as_bytes()))),
            Self::Jid(jid) => Some(WireForm::Jid(jid)),
            Self::None | Self::Nodes(_) => None,
        }
    }

    /// Text or bytes content as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Text(text) => Some(text.as_bytes()),
            _ => None,
        }
    }
}

impl PartialEq for Content {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Nodes(a), Self::Nodes(b)) => a == b,
            _ => match (self.wire_form(), other.wire_form()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl From<Vec<u8>> for Content {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Jid> for Content {
    fn from(value: Jid) -> Self {
        Self::Jid(value)
    }
}

impl From<Vec<Node>> for Content {
    fn from(value: Vec<Node>) -> Self {
        Self::Nodes(value)
    }
}

// ── Node ─────────────────────────────────────────────────────────────────────

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attributes::new(),
            content: Content::None,
        }
    }

    pub fn from_parts(tag: impl Into<String>, attrs: Attributes, content: Content) -> Self {
        Self {
            tag: tag.into(),
            attrs,
            content,
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<Content>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_children(self, children: Vec<Node>) -> Self {
        self.with_content(Content::Nodes(children))
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&AttributeValue> {
        self.attrs.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(AttributeValue::as_str)
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn content_bytes(&self) -> Option<&[u8]> {
        self.content.as_bytes()
    }

    /// Child nodes; empty unless the content is a node list.
    pub fn children(&self) -> &[Node] {
        match &self.content {
            Content::Nodes(children) => children,
            _ => &[],
        }
    }

    pub fn child(&self, tag: &str) -> Option<&Node> {
        self.children().iter().find(|child| child.tag == tag)
    }

    pub fn into_parts(self) -> (String, Attributes, Content) {
        (self.tag, self.attrs, self.content)
    }

    /// Wire size: one unit for the tag, two per attribute, one for content.
    pub fn size(&self) -> usize {
        1 + 2 * self.attrs.len() + usize::from(self.content.is_present())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.attrs.len() == other.attrs.len()
            && self.attrs.iter().eq(other.attrs.iter())
            && self.content == other.content
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jid(jid) => write!(f, "{jid}"),
            Self::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => f.write_str(text),
                Err(_) => f.write_str(&hex::encode(bytes)),
            },
            other => match other.to_text() {
                Some(text) => f.write_str(&text),
                None => Ok(()),
            },
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attrs {
            write!(f, " {key}=\"{value}\"")?;
        }
        match &self.content {
            Content::None => f.write_str("/>"),
            Content::Nodes(children) => {
                f.write_str(">")?;
                for child in children {
                    write!(f, "{child}")?;
                }
                write!(f, "</{}>", self.tag)
            }
            Content::Text(text) => write!(f, ">{text}</{}>", self.tag),
            Content::Jid(jid) => write!(f, ">{jid}</{}>", self.tag),
            Content::Bytes(bytes) => write!(f, ">{}</{}>", hex::encode(bytes), self.tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_counts_tag_attributes_and_content() {
        let bare = Node::new("iq");
        assert_eq!(bare.size(), 1);

        let with_attrs = Node::new("iq").with_attr("id", "abc").with_attr("type", "get");
        assert_eq!(with_attrs.size(), 5);

        let with_content = with_attrs.with_content(vec![1u8, 2, 3]);
        assert_eq!(with_content.size(), 6);
    }

    #[test]
    fn scalar_attributes_compare_by_wire_form() {
        assert_eq!(AttributeValue::Int(42), AttributeValue::Text("42".into()));
        assert_eq!(AttributeValue::Bool(true), AttributeValue::Bytes(b"true".to_vec()));
        assert_ne!(AttributeValue::Int(42), AttributeValue::Text("042".into()));
        assert_ne!(
            AttributeValue::Text("g.us".into()),
            AttributeValue::Jid(Jid::server_only("g.us"))
        );
    }

    #[test]
    fn attribute_order_matters_for_equality() {
        let a = Node::new("x").with_attr("a", "1").with_attr("b", "2");
        let b = Node::new("x").with_attr("b", "2").with_attr("a", "1");
        assert_ne!(a, b);
    }

    #[test]
    fn typed_accessors() {
        let node = Node::new("presence")
            .with_attr("count", 7i64)
            .with_attr("last", "12")
            .with_attr("available", true);
        assert_eq!(node.attr("count").and_then(AttributeValue::as_i64), Some(7));
        assert_eq!(node.attr("last").and_then(AttributeValue::as_i64), Some(12));
        assert_eq!(node.attr("available").and_then(AttributeValue::as_bool), Some(true));
        assert_eq!(node.attr_str("missing"), None);
    }

    #[test]
    fn children_lookup() {
        let node = Node::new("iq").with_children(vec![Node::new("ping"), Node::new("query")]);
        assert_eq!(node.children().len(), 2);
        assert_eq!(node.child("query").map(Node::tag), Some("query"));
        assert!(node.child("missing").is_none());
        assert!(Node::new("leaf").children().is_empty());
    }

    #[test]
    fn display_renders_xml_like_view() {
        let node = Node::new("iq")
            .with_attr("id", "abc")
            .with_children(vec![Node::new("enc").with_content(vec![0xde, 0xad])]);
        assert_eq!(node.to_string(), "<iq id=\"abc\"><enc>dead</enc></iq>");
    }
}
