//! Schema-free wire format decoder.
//!
//! ## Algorithm Overview
//!
//! A message scope is consumed tag by tag until its window is exhausted.
//! Varint and fixed-width fields map directly onto values. A
//! length-delimited payload has no self-describing type, so the decoder
//! tries interpretations in a fixed priority order and keeps the first that
//! succeeds:
//!
//! 1. an embedded message, parsed recursively over the whole payload
//! 2. UTF-8 text
//! 3. a back-to-back run of varints with nothing left over
//! 4. raw bytes
//!
//! Each attempt builds its own [`Message`] and [`Trace`] and hands them back
//! only on success, so a failed attempt leaves nothing behind in the
//! enclosing scope. Failures outside the fallback chain abort the scope and
//! propagate to the caller; at the top level that fails the whole decode.

use crate::error::{Error, Result};
use crate::trace::Trace;
use crate::tree::{Fixed32, Fixed64, FloatPolicy, Message, Value};
use crate::wire::{decode_tag, decode_varint, WireType};
use tracing::{debug, trace};

/// Default nesting limit for embedded messages
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Configuration for the decoder
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Deepest nesting level parsed as an embedded message
    pub max_depth: usize,
    /// Integer/float classification for fixed-width fields
    pub float_policy: FloatPolicy,
    /// Whether to build the human-readable trace
    pub trace: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            float_policy: FloatPolicy::default(),
            trace: true,
        }
    }
}

impl DecoderConfig {
    /// Creates a new decoder config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the nesting limit
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the float classification policy
    pub fn float_policy(mut self, policy: FloatPolicy) -> Self {
        self.float_policy = policy;
        self
    }

    /// Sets whether a trace is built
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }
}

/// Output of a decode: the tree and its trace
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// The decoded tree
    pub message: Message,
    /// One line per decoded field (empty when tracing is disabled)
    pub trace: Trace,
}

/// Schema-free protobuf decoder
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Creates a new decoder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new decoder with custom configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a whole buffer into a tree
    ///
    /// No trace is built, whatever the configuration says.
    pub fn decode(&self, data: &[u8]) -> Result<Message> {
        self.decode_buffer(data, false).map(|decoded| decoded.message)
    }

    /// Decode a whole buffer into a tree and its trace
    pub fn decode_with_trace(&self, data: &[u8]) -> Result<Decoded> {
        self.decode_buffer(data, self.config.trace)
    }

    fn decode_buffer(&self, data: &[u8], traced: bool) -> Result<Decoded> {
        debug!("Decoding {} bytes", data.len());

        let (message, trace) = self.parse_scope(data, 0, data.len(), 0, traced)?;

        debug!("Decoded {} top-level fields", message.len());
        Ok(Decoded { message, trace })
    }

    /// Parse `data[start..end]` as one message scope at nesting `depth`.
    ///
    /// Succeeds only if the whole window is consumed.
    pub fn parse_message(
        &self,
        data: &[u8],
        start: usize,
        end: usize,
        depth: usize,
    ) -> Result<(Message, Trace)> {
        self.parse_scope(data, start, end, depth, self.config.trace)
    }

    fn parse_scope(
        &self,
        data: &[u8],
        start: usize,
        end: usize,
        depth: usize,
        traced: bool,
    ) -> Result<(Message, Trace)> {
        if depth > self.config.max_depth {
            return Err(Error::MessageTooDeep {
                depth,
                limit: self.config.max_depth,
            });
        }

        let end = end.min(data.len());
        let mut message = Message::new();
        let mut lines = Trace::new();
        let mut position = start;

        while position < end {
            let (wire_type, field_number, next) = decode_tag(data, position, end)?;
            position = next;

            let (value, nested) = match wire_type {
                WireType::Varint => {
                    let (value, next) = decode_varint(data, position, end)?;
                    position = next;
                    (Value::Varint(value), None)
                }
                WireType::Fixed64 => {
                    let bytes = read_fixed::<8>(data, position, end)?;
                    position += 8;
                    let bits = u64::from_le_bytes(bytes);
                    (
                        Value::Fixed64(Fixed64::from_bits(bits, self.config.float_policy)),
                        None,
                    )
                }
                WireType::Fixed32 => {
                    let bytes = read_fixed::<4>(data, position, end)?;
                    position += 4;
                    let bits = u32::from_le_bytes(bytes);
                    (
                        Value::Fixed32(Fixed32::from_bits(bits, self.config.float_policy)),
                        None,
                    )
                }
                WireType::LengthDelimited => {
                    let (length, next) = decode_varint(data, position, end)?;
                    let available = end - next;
                    if length > available as u128 {
                        return Err(Error::DeclaredLengthExceedsBuffer {
                            offset: next,
                            length,
                            available,
                        });
                    }
                    let payload_end = next + length as usize;
                    position = payload_end;
                    self.resolve_length_delimited(data, next, payload_end, depth, traced)
                }
            };

            if traced {
                lines.push_field(depth, field_number, &value);
                if let Some(nested) = nested {
                    lines.extend(nested);
                }
            }
            message.push(field_number, value);
        }

        Ok((message, lines))
    }

    /// Pick the interpretation of a length-delimited payload.
    ///
    /// Returns the value and, for embedded messages, the nested trace.
    fn resolve_length_delimited(
        &self,
        data: &[u8],
        start: usize,
        end: usize,
        depth: usize,
        traced: bool,
    ) -> (Value, Option<Trace>) {
        match self.parse_scope(data, start, end, depth + 1, traced) {
            Ok((message, nested)) => return (Value::Message(message), Some(nested)),
            Err(e) => {
                debug_assert!(e.is_recoverable());
                trace!("Payload at {}..{} is not a message: {}", start, end, e);
            }
        }

        let payload = &data[start..end];

        if let Ok(text) = std::str::from_utf8(payload) {
            return (Value::String(text.to_owned()), None);
        }

        if let Some(values) = parse_varint_run(payload) {
            return (Value::Repeated(values), None);
        }

        trace!("Payload at {}..{} kept as raw bytes", start, end);
        (Value::Bytes(payload.to_vec()), None)
    }
}

/// Read `N` bytes at `start`, failing if the window is too short
fn read_fixed<const N: usize>(data: &[u8], start: usize, end: usize) -> Result<[u8; N]> {
    let available = end.saturating_sub(start);
    if available < N {
        return Err(Error::TruncatedFixed {
            offset: start,
            width: N * 8,
            available,
        });
    }

    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&data[start..start + N]);
    Ok(bytes)
}

/// Consume `payload` as back-to-back varints; `None` on any leftover
fn parse_varint_run(payload: &[u8]) -> Option<Vec<u128>> {
    let mut values = Vec::new();
    let mut position = 0;

    while position < payload.len() {
        let (value, next) = decode_varint(payload, position, payload.len()).ok()?;
        values.push(value);
        position = next;
    }

    Some(values)
}

/// Decode a whole buffer with the default configuration
pub fn decode(data: &[u8]) -> Result<Message> {
    Decoder::new().decode(data)
}

/// Decode a whole buffer with the default configuration, keeping the trace
pub fn decode_with_trace(data: &[u8]) -> Result<Decoded> {
    Decoder::new().decode_with_trace(data)
}
