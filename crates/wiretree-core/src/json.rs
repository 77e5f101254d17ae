//! JSON transport for hand-editing a decoded tree.
//!
//! A message becomes a JSON object keyed by `"field:index:kind"` labels:
//!
//! ```json
//! {
//!     "01:00:Varint": 150,
//!     "02:01:embedded message": { "01:00:string": "hello" },
//!     "03:02:32-bit": 1.5,
//!     "04:03:repeated": [1, 2, 3],
//!     "05:04:bytes": "0xde:0xad"
//! }
//! ```
//!
//! Fixed-width values are written as JSON floats when classified as floats
//! and as integers otherwise; reading them back follows the same rule, so an
//! untouched document re-encodes to the original bit patterns.

use crate::error::{Error, Result};
use crate::tree::{parse_hex_pairs, to_hex_pairs, FieldKey, FieldKind, Fixed32, Fixed64, Message, Value};
use serde_json::{Map, Number};

/// Convert a tree into its JSON document
pub fn to_json(message: &Message) -> Result<serde_json::Value> {
    let mut object = Map::new();

    for (key, value) in message {
        let label = key.label(value.kind());
        let json = match value {
            Value::Varint(v) => serde_json::Value::from(*v),
            Value::Fixed32(Fixed32::Int(bits)) => serde_json::Value::from(*bits),
            Value::Fixed32(Fixed32::Float(float)) => float_to_json(*float as f64, &label)?,
            Value::Fixed64(Fixed64::Int(bits)) => serde_json::Value::from(*bits),
            Value::Fixed64(Fixed64::Float(float)) => float_to_json(*float, &label)?,
            Value::Message(nested) => to_json(nested)?,
            Value::String(text) => serde_json::Value::from(text.as_str()),
            Value::Repeated(values) => serde_json::Value::from(values.clone()),
            Value::Bytes(bytes) => serde_json::Value::from(to_hex_pairs(bytes)),
        };
        object.insert(label, json);
    }

    Ok(serde_json::Value::Object(object))
}

/// Rebuild a tree from its JSON document
pub fn from_json(json: &serde_json::Value) -> Result<Message> {
    let object = json
        .as_object()
        .ok_or_else(|| Error::invalid_json_value("<root>", "an object"))?;

    let mut message = Message::new();
    for (label, json) in object {
        let (key, kind) = FieldKey::parse_label(label)?;
        let value = value_from_json(label, kind, json)?;
        if message.insert(key, value).is_some() {
            return Err(Error::invalid_key(
                label.as_str(),
                format!(
                    "field {} already has an entry at index {}",
                    key.field_number, key.index
                ),
            ));
        }
    }

    Ok(message)
}

/// Render a tree as pretty-printed JSON (keys sorted)
pub fn to_json_string_pretty(message: &Message) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_json(message)?)?)
}

/// Parse a JSON document into a tree
pub fn from_json_str(text: &str) -> Result<Message> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    from_json(&json)
}

fn value_from_json(label: &str, kind: FieldKind, json: &serde_json::Value) -> Result<Value> {
    let value = match kind {
        FieldKind::Varint => Value::Varint(
            as_u128(json)
                .ok_or_else(|| Error::invalid_json_value(label, "an unsigned integer"))?,
        ),
        FieldKind::Fixed32 => {
            let fixed = if json.is_f64() {
                json.as_f64().map(|float| Fixed32::Float(float as f32))
            } else {
                json.as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .map(Fixed32::Int)
            };
            Value::Fixed32(fixed.ok_or_else(|| {
                Error::invalid_json_value(label, "a float or a 32-bit unsigned integer")
            })?)
        }
        FieldKind::Fixed64 => {
            let fixed = if json.is_f64() {
                json.as_f64().map(Fixed64::Float)
            } else {
                json.as_u64().map(Fixed64::Int)
            };
            Value::Fixed64(fixed.ok_or_else(|| {
                Error::invalid_json_value(label, "a float or a 64-bit unsigned integer")
            })?)
        }
        FieldKind::EmbeddedMessage => {
            if !json.is_object() {
                return Err(Error::invalid_json_value(label, "an object"));
            }
            Value::Message(from_json(json)?)
        }
        FieldKind::String => Value::String(
            json.as_str()
                .ok_or_else(|| Error::invalid_json_value(label, "a string"))?
                .to_owned(),
        ),
        FieldKind::Repeated => {
            let items = json
                .as_array()
                .ok_or_else(|| Error::invalid_json_value(label, "an array of unsigned integers"))?;
            let values = items
                .iter()
                .map(|item| {
                    as_u128(item).ok_or_else(|| {
                        Error::invalid_json_value(label, "an array of unsigned integers")
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Value::Repeated(values)
        }
        FieldKind::Bytes => Value::Bytes(parse_hex_pairs(
            json.as_str()
                .ok_or_else(|| Error::invalid_json_value(label, "a hex byte string"))?,
        )?),
    };

    Ok(value)
}

/// Unsigned integer of any width up to 128 bits; floats are rejected
fn as_u128(json: &serde_json::Value) -> Option<u128> {
    json.as_number().and_then(Number::as_u128)
}

fn float_to_json(float: f64, label: &str) -> Result<serde_json::Value> {
    Number::from_f64(float)
        .map(serde_json::Value::Number)
        .ok_or_else(|| Error::NonFiniteFloat {
            key: label.to_string(),
        })
}
