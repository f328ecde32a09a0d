use thiserror::Error;

pub type Result<T> = std::result::Result<T, BinaryError>;

#[derive(Debug, Error)]
pub enum BinaryError {
    #[error("Truncated input: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Unexpected tag byte {tag:#04x} while reading {context}")]
    UnexpectedTag { tag: u8, context: &'static str },

    #[error("Unknown token: dictionary {dictionary:?} index {index}")]
    UnknownToken { dictionary: Option<u8>, index: u8 },

    #[error("Invalid packed character code {0}")]
    InvalidPackedCode(u8),

    #[error("Malformed address: {0}")]
    MalformedJid(String),

    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("List of {0} entries exceeds the 16-bit wire limit")]
    ListTooLarge(usize),

    #[error("Length {0} exceeds the 32-bit wire limit")]
    LengthTooLarge(usize),

    #[error("Node nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    #[error("{0} trailing bytes after the root node")]
    TrailingBytes(usize),

    #[error("Inflated payload exceeds {0} bytes")]
    InflateLimit(usize),

    #[error("Compression error: {0}")]
    Compression(#[from] std::io::Error),
}

impl BinaryError {
    /// True when the input ended before a declared length was satisfied.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}
