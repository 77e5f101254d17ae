//! The schema-free message tree.
//!
//! A [`Message`] maps [`FieldKey`]s (field number plus occurrence index) to
//! [`Value`]s. The occurrence index is the position of the field within its
//! message scope, so iterating a message in key order replays the original
//! field order even when field numbers repeat or interleave.
//!
//! The kind of an entry is derived from its value, which keeps the key and
//! the stored shape from disagreeing. The textual key used by the JSON
//! transport (`"01:00:Varint"`) is produced by [`FieldKey::label`].

use crate::error::{Error, Result};
use crate::wire::WireType;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The inferred interpretation of one field occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Plain varint
    Varint,
    /// 4-byte fixed-width value
    Fixed32,
    /// 8-byte fixed-width value
    Fixed64,
    /// Length-delimited payload that parsed as a nested message
    EmbeddedMessage,
    /// Length-delimited payload that is valid UTF-8
    String,
    /// Length-delimited payload that is a run of varints
    Repeated,
    /// Length-delimited payload with no structured interpretation
    Bytes,
}

impl FieldKind {
    /// Label used in entry keys and trace lines
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Varint => "Varint",
            FieldKind::Fixed32 => "32-bit",
            FieldKind::Fixed64 => "64-bit",
            FieldKind::EmbeddedMessage => "embedded message",
            FieldKind::String => "string",
            FieldKind::Repeated => "repeated",
            FieldKind::Bytes => "bytes",
        }
    }

    /// Wire type this kind is encoded with
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldKind::Varint => WireType::Varint,
            FieldKind::Fixed32 => WireType::Fixed32,
            FieldKind::Fixed64 => WireType::Fixed64,
            FieldKind::EmbeddedMessage
            | FieldKind::String
            | FieldKind::Repeated
            | FieldKind::Bytes => WireType::LengthDelimited,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FieldKind {
    type Err = Error;

    /// Accepts both the key labels and the variant names.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Varint" => Ok(FieldKind::Varint),
            "32-bit" | "Fixed32" => Ok(FieldKind::Fixed32),
            "64-bit" | "Fixed64" => Ok(FieldKind::Fixed64),
            "embedded message" | "EmbeddedMessage" => Ok(FieldKind::EmbeddedMessage),
            "string" | "String" => Ok(FieldKind::String),
            "repeated" | "Repeated" => Ok(FieldKind::Repeated),
            "bytes" | "Bytes" => Ok(FieldKind::Bytes),
            _ => Err(Error::invalid_key(s, "unknown field kind")),
        }
    }
}

/// How fixed-width bit patterns are classified as integer or float
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatPolicy {
    /// Float when the reinterpretation is finite, integer otherwise
    #[default]
    Finite,
    /// Always float, including infinities and NaNs
    Always,
    /// Float when the sign bit is clear, including infinities and NaNs;
    /// negative patterns stay integers
    SignBitClear,
    /// Always the raw integer
    Never,
}

/// Value of a 4-byte fixed-width field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fixed32 {
    /// Raw little-endian bit pattern
    Int(u32),
    /// IEEE-754 single precision reinterpretation
    Float(f32),
}

impl Fixed32 {
    /// Classify `bits` according to `policy`
    pub fn from_bits(bits: u32, policy: FloatPolicy) -> Self {
        let float = f32::from_bits(bits);
        match policy {
            FloatPolicy::Always => Fixed32::Float(float),
            FloatPolicy::Finite if float.is_finite() => Fixed32::Float(float),
            FloatPolicy::SignBitClear if bits >> 31 == 0 => Fixed32::Float(float),
            _ => Fixed32::Int(bits),
        }
    }

    /// The bit pattern written on the wire
    pub fn to_bits(&self) -> u32 {
        match *self {
            Fixed32::Int(bits) => bits,
            Fixed32::Float(float) => float.to_bits(),
        }
    }
}

/// Value of an 8-byte fixed-width field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fixed64 {
    /// Raw little-endian bit pattern
    Int(u64),
    /// IEEE-754 double precision reinterpretation
    Float(f64),
}

impl Fixed64 {
    /// Classify `bits` according to `policy`
    pub fn from_bits(bits: u64, policy: FloatPolicy) -> Self {
        let float = f64::from_bits(bits);
        match policy {
            FloatPolicy::Always => Fixed64::Float(float),
            FloatPolicy::Finite if float.is_finite() => Fixed64::Float(float),
            FloatPolicy::SignBitClear if bits >> 63 == 0 => Fixed64::Float(float),
            _ => Fixed64::Int(bits),
        }
    }

    /// The bit pattern written on the wire
    pub fn to_bits(&self) -> u64 {
        match *self {
            Fixed64::Int(bits) => bits,
            Fixed64::Float(float) => float.to_bits(),
        }
    }
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Varint, up to 128 bits wide
    Varint(u128),
    /// 32-bit fixed-width value
    Fixed32(Fixed32),
    /// 64-bit fixed-width value
    Fixed64(Fixed64),
    /// Nested message
    Message(Message),
    /// UTF-8 text
    String(String),
    /// Back-to-back varints
    Repeated(Vec<u128>),
    /// Uninterpreted payload
    Bytes(Vec<u8>),
}

impl Value {
    /// The kind this value is recorded as
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Varint(_) => FieldKind::Varint,
            Value::Fixed32(_) => FieldKind::Fixed32,
            Value::Fixed64(_) => FieldKind::Fixed64,
            Value::Message(_) => FieldKind::EmbeddedMessage,
            Value::String(_) => FieldKind::String,
            Value::Repeated(_) => FieldKind::Repeated,
            Value::Bytes(_) => FieldKind::Bytes,
        }
    }

    /// Returns the nested message, if this is one
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Value::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Returns the nested message mutably, if this is one
    pub fn as_message_mut(&mut self) -> Option<&mut Message> {
        match self {
            Value::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Returns the text, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the integer, if this is a varint
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Value::Varint(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer, if this is a varint that fits in a `u64`
    pub fn as_u64(&self) -> Option<u64> {
        self.as_u128().and_then(|value| u64::try_from(value).ok())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Varint(value.into())
    }
}

impl From<u128> for Value {
    fn from(value: u128) -> Self {
        Value::Varint(value)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::String(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(text.to_owned())
    }
}

impl From<Message> for Value {
    fn from(message: Message) -> Self {
        Value::Message(message)
    }
}

/// Position of an entry within its message scope
///
/// Ordering is by occurrence index first, which is the encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldKey {
    /// Zero-based occurrence index within the scope
    pub index: usize,
    /// Protobuf field number
    pub field_number: u32,
}

impl FieldKey {
    /// Creates a new key
    pub fn new(field_number: u32, index: usize) -> Self {
        Self {
            index,
            field_number,
        }
    }

    /// Textual key `field:index:kind`, both numbers zero-padded to two digits
    pub fn label(&self, kind: FieldKind) -> String {
        format!("{:02}:{:02}:{}", self.field_number, self.index, kind.label())
    }

    /// Parses a textual key produced by [`FieldKey::label`]
    pub fn parse_label(label: &str) -> Result<(Self, FieldKind)> {
        let mut parts = label.splitn(3, ':');
        let (Some(field), Some(index), Some(kind)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::invalid_key(label, "expected 'field:index:kind'"));
        };

        let field_number: u32 = field
            .trim()
            .parse()
            .map_err(|_| Error::invalid_key(label, "field number is not an integer"))?;
        if field_number == 0 || field_number > crate::MAX_FIELD_NUMBER {
            return Err(Error::invalid_key(label, "field number out of range"));
        }
        let index: usize = index
            .trim()
            .parse()
            .map_err(|_| Error::invalid_key(label, "occurrence index is not an integer"))?;
        let kind = kind
            .parse::<FieldKind>()
            .map_err(|_| Error::invalid_key(label, format!("unknown field kind '{}'", kind)))?;

        Ok((Self::new(field_number, index), kind))
    }
}

/// One decoded message scope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    entries: BTreeMap<FieldKey, Value>,
}

impl Message {
    /// Creates an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the message has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The occurrence index the next appended entry receives
    pub fn next_index(&self) -> usize {
        self.entries
            .keys()
            .next_back()
            .map(|key| key.index + 1)
            .unwrap_or(0)
    }

    /// Appends `value` as the next occurrence and returns its key
    pub fn push(&mut self, field_number: u32, value: impl Into<Value>) -> FieldKey {
        let key = FieldKey::new(field_number, self.next_index());
        self.entries.insert(key, value.into());
        key
    }

    /// Inserts an entry, returning the value previously stored under `key`
    pub fn insert(&mut self, key: FieldKey, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key, value.into())
    }

    /// Removes an entry
    pub fn remove(&mut self, key: &FieldKey) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Looks up an entry
    pub fn get(&self, key: &FieldKey) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Looks up an entry mutably
    pub fn get_mut(&mut self, key: &FieldKey) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// All occurrences of `field_number`, in order
    pub fn fields(&self, field_number: u32) -> impl Iterator<Item = &Value> + '_ {
        self.entries
            .iter()
            .filter(move |(key, _)| key.field_number == field_number)
            .map(|(_, value)| value)
    }

    /// First occurrence of `field_number`
    pub fn first(&self, field_number: u32) -> Option<&Value> {
        self.fields(field_number).next()
    }

    /// First occurrence of `field_number`, mutably
    pub fn first_mut(&mut self, field_number: u32) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key.field_number == field_number)
            .map(|(_, value)| value)
    }

    /// Entries in encoding order
    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &Value)> + '_ {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = (&'a FieldKey, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, FieldKey, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(FieldKey, Value)> for Message {
    fn from_iter<I: IntoIterator<Item = (FieldKey, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Render bytes as colon-separated `0xNN` pairs
pub fn to_hex_pairs(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parse colon-separated hex pairs, with or without the `0x` prefix
pub fn parse_hex_pairs(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    text.split(':')
        .map(|pair| {
            let digits = pair
                .trim()
                .strip_prefix("0x")
                .or_else(|| pair.trim().strip_prefix("0X"))
                .unwrap_or(pair.trim());
            if digits.is_empty() || digits.len() > 2 {
                return Err(Error::InvalidHexBytes {
                    pair: pair.to_string(),
                });
            }
            u8::from_str_radix(digits, 16).map_err(|_| Error::InvalidHexBytes {
                pair: pair.to_string(),
            })
        })
        .collect()
}
