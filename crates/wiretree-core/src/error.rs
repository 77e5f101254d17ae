//! Error types for the wiretree-core library.
//!
//! Wire format failures carry the byte offset at which they were detected.
//! Inside the length-delimited fallback chain these errors are recovered
//! locally; at the top level any of them fails the whole decode.

use thiserror::Error;

/// Result type alias for wiretree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all wiretree operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Continuation bit still set when the buffer ran out
    #[error("truncated varint at offset {offset}")]
    TruncatedVarint {
        /// Byte offset where the varint started
        offset: usize,
    },

    /// Tag varint did not terminate within the buffer
    #[error("truncated field tag at offset {offset}")]
    TruncatedTag {
        /// Byte offset where the tag started
        offset: usize,
    },

    /// Varint encodes a value wider than 128 bits
    #[error("varint at offset {offset} does not fit in 128 bits")]
    VarintOverflow {
        /// Byte offset where the varint started
        offset: usize,
    },

    /// Fixed-width value runs past the end of its scope
    #[error("fixed{width} value at offset {offset} runs past its scope ({available} bytes available)")]
    TruncatedFixed {
        /// Byte offset where the value starts
        offset: usize,
        /// Width of the value in bits
        width: usize,
        /// Bytes left in the scope
        available: usize,
    },

    /// Length-delimited field declares more bytes than its scope holds
    #[error("declared length {length} at offset {offset} exceeds buffer ({available} bytes available)")]
    DeclaredLengthExceedsBuffer {
        /// Byte offset where the payload starts
        offset: usize,
        /// Declared payload length
        length: u128,
        /// Bytes left in the scope
        available: usize,
    },

    /// Wire type outside {0, 1, 2, 5}
    #[error("unsupported wire type {wire_type} at offset {offset}")]
    UnsupportedWireType {
        /// Byte offset of the tag
        offset: usize,
        /// The raw wire type bits
        wire_type: u8,
    },

    /// Field number outside `1..=MAX_FIELD_NUMBER`
    #[error("invalid field number {number} at offset {offset}: must be between 1 and {max}")]
    InvalidFieldNumber {
        /// Byte offset of the tag
        offset: usize,
        /// The invalid field number
        number: u128,
        /// Maximum valid field number
        max: u32,
    },

    /// Nesting exceeded the configured depth limit
    #[error("message nesting depth {depth} exceeds limit {limit}")]
    MessageTooDeep {
        /// Depth that was attempted
        depth: usize,
        /// Configured limit
        limit: usize,
    },

    /// Transport key is not of the form `field:index:kind`
    #[error("invalid entry key '{key}': {details}")]
    InvalidKey {
        /// The offending key
        key: String,
        /// What was wrong with it
        details: String,
    },

    /// Transport value does not match the shape its key declares
    #[error("invalid value for '{key}': expected {expected}")]
    InvalidJsonValue {
        /// Key of the offending entry
        key: String,
        /// Shape the kind requires
        expected: &'static str,
    },

    /// Hex-pair byte string could not be parsed
    #[error("invalid hex byte '{pair}' in byte string")]
    InvalidHexBytes {
        /// The offending colon-separated component
        pair: String,
    },

    /// Float value cannot be represented in the JSON transport
    #[error("non-finite float in entry '{key}' cannot be represented as JSON")]
    NonFiniteFloat {
        /// Key of the offending entry
        key: String,
    },

    /// Malformed JSON document
    #[error("failed to parse JSON document: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new invalid key error
    pub fn invalid_key(key: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            details: details.into(),
        }
    }

    /// Creates a new invalid value error
    pub fn invalid_json_value(key: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidJsonValue {
            key: key.into(),
            expected,
        }
    }

    /// Returns true if this is a wire format failure, i.e. one the
    /// length-delimited fallback chain recovers from when it happens inside
    /// a nested payload.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TruncatedVarint { .. }
                | Self::TruncatedTag { .. }
                | Self::VarintOverflow { .. }
                | Self::TruncatedFixed { .. }
                | Self::DeclaredLengthExceedsBuffer { .. }
                | Self::UnsupportedWireType { .. }
                | Self::InvalidFieldNumber { .. }
                | Self::MessageTooDeep { .. }
        )
    }
}
