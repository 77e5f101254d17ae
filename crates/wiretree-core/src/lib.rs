//! # wiretree-core
//!
//! A library for decoding Protocol Buffer payloads without their `.proto`
//! schema, editing the result, and encoding it back to bytes.
//!
//! This crate provides the core functionality for:
//! - Decoding raw wire format into a schema-free tree, inferring what each
//!   length-delimited field holds
//! - Re-encoding an edited tree with recomputed length prefixes
//! - Moving trees in and out of an editable JSON document
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`wire`]: Varint and tag primitives
//! - [`decoder`]: Wire format decoding with fallback for length-delimited fields
//! - [`tree`]: The decoded tree
//! - [`encoder`]: Tree re-encoding
//! - [`trace`]: Human-readable field trace
//! - [`json`]: JSON transport
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use wiretree_core::{decode, encode, Value};
//!
//! // field 2 = "abc"
//! let data = [0x12, 0x03, b'a', b'b', b'c'];
//! let mut message = decode(&data)?;
//! assert_eq!(message.first(2), Some(&Value::from("abc")));
//!
//! *message.first_mut(2).unwrap() = Value::from("abcd");
//! assert_eq!(encode(&message), vec![0x12, 0x04, b'a', b'b', b'c', b'd']);
//! # Ok::<(), wiretree_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod json;
pub mod trace;
pub mod tree;
pub mod wire;

// Re-export primary types for convenience
pub use decoder::{decode, decode_with_trace, Decoded, Decoder, DecoderConfig, DEFAULT_MAX_DEPTH};
pub use encoder::{encode, encode_to};
pub use error::{Error, Result};
pub use json::{from_json, from_json_str, to_json, to_json_string_pretty};
pub use trace::{Trace, TraceLine};
pub use tree::{FieldKey, FieldKind, Fixed32, Fixed64, FloatPolicy, Message, Value};
pub use wire::WireType;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;
