//! Re-encoding of a (possibly edited) tree.
//!
//! Entries are written in occurrence order. Length prefixes are never carried
//! over from the source bytes: every length-delimited payload is serialized
//! first and its length is written in front of it, so edits that change a
//! payload's size propagate to every enclosing prefix.

use crate::tree::{Message, Value};
use crate::wire::{encode_tag, encode_varint, WireType};
use bytes::BufMut;
use tracing::trace;

/// Encode a tree into a new buffer
pub fn encode(message: &Message) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_to(message, &mut buf);
    buf
}

/// Encode a tree, appending to `buf`
pub fn encode_to(message: &Message, buf: &mut impl BufMut) {
    for (key, value) in message {
        encode_field(key.field_number, value, buf);
    }
    trace!("Encoded {} entries", message.len());
}

fn encode_field(field_number: u32, value: &Value, buf: &mut impl BufMut) {
    match value {
        Value::Varint(v) => {
            encode_tag(field_number, WireType::Varint, buf);
            encode_varint(*v, buf);
        }
        Value::Fixed32(fixed) => {
            encode_tag(field_number, WireType::Fixed32, buf);
            buf.put_u32_le(fixed.to_bits());
        }
        Value::Fixed64(fixed) => {
            encode_tag(field_number, WireType::Fixed64, buf);
            buf.put_u64_le(fixed.to_bits());
        }
        Value::Message(nested) => {
            let payload = encode(nested);
            encode_length_delimited(field_number, &payload, buf);
        }
        Value::Repeated(values) => {
            let mut payload = Vec::new();
            for v in values {
                encode_varint(*v, &mut payload);
            }
            encode_length_delimited(field_number, &payload, buf);
        }
        Value::String(text) => encode_length_delimited(field_number, text.as_bytes(), buf),
        Value::Bytes(bytes) => encode_length_delimited(field_number, bytes, buf),
    }
}

fn encode_length_delimited(field_number: u32, payload: &[u8], buf: &mut impl BufMut) {
    encode_tag(field_number, WireType::LengthDelimited, buf);
    encode_varint(payload.len() as u128, buf);
    buf.put_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::tree::{FieldKey, Fixed32, Fixed64};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_varint_field() {
        let mut message = Message::new();
        message.push(1, 150u64);
        assert_eq!(encode(&message), vec![0x08, 0x96, 0x01]);
    }

    #[test]
    fn test_encode_follows_occurrence_order() {
        let mut message = Message::new();
        message.insert(FieldKey::new(1, 1), 2u64);
        message.insert(FieldKey::new(2, 0), 1u64);
        assert_eq!(encode(&message), vec![0x10, 0x01, 0x08, 0x02]);
    }

    #[test]
    fn test_encode_fixed_width() {
        let mut message = Message::new();
        message.push(1, Value::Fixed32(Fixed32::Float(1.0)));
        message.push(2, Value::Fixed64(Fixed64::Int(0x0102_0304_0506_0708)));

        assert_eq!(
            encode(&message),
            vec![
                0x0D, 0x00, 0x00, 0x80, 0x3F, //
                0x11, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01,
            ]
        );
    }

    #[test]
    fn test_encode_length_delimited_kinds() {
        let mut nested = Message::new();
        nested.push(1, 1u64);

        let mut message = Message::new();
        message.push(1, nested);
        message.push(2, "hi");
        message.push(3, Value::Repeated(vec![1, 300]));
        message.push(4, Value::Bytes(vec![0xFF]));

        assert_eq!(
            encode(&message),
            vec![
                0x0A, 0x02, 0x08, 0x01, //
                0x12, 0x02, b'h', b'i', //
                0x1A, 0x03, 0x01, 0xAC, 0x02, //
                0x22, 0x01, 0xFF,
            ]
        );
    }

    #[test]
    fn test_edit_recomputes_lengths() {
        // field 1 = { field 2 = "abc" }
        let data = [0x0A, 0x05, 0x12, 0x03, b'a', b'b', b'c'];
        let mut message = decode(&data).unwrap();

        let nested = message
            .first_mut(1)
            .and_then(Value::as_message_mut)
            .unwrap();
        *nested.first_mut(2).unwrap() = Value::from("abcdef");

        assert_eq!(
            encode(&message),
            vec![0x0A, 0x08, 0x12, 0x06, b'a', b'b', b'c', b'd', b'e', b'f']
        );
    }

    #[test]
    fn test_long_payload_gets_multi_byte_length() {
        let text = "x".repeat(200);
        let mut message = Message::new();
        message.push(1, text.as_str());

        let encoded = encode(&message);
        assert_eq!(&encoded[..3], &[0x0A, 0xC8, 0x01]);
        assert_eq!(encoded.len(), 3 + 200);
    }

    #[test]
    fn test_wide_varints_round_trip() {
        // field 1 = 2^70, field 2 = 2^64
        let mut data = vec![0x08];
        data.extend_from_slice(&[0x80; 10]);
        data.push(0x01);
        data.push(0x10);
        data.extend_from_slice(&[0x80; 9]);
        data.push(0x02);

        let message = decode(&data).unwrap();
        assert_eq!(message.first(2), Some(&Value::Varint(1 << 64)));
        assert_eq!(encode(&message), data);
    }

    #[test]
    fn test_float_bits_survive_round_trip() {
        let data = [
            0x0D, 0xCD, 0xCC, 0xCC, 0x3D, // 0.1f32
            0x11, 0x9A, 0x99, 0x99, 0x99, 0x99, 0x99, 0xB9, 0x3F, // 0.1f64
            0x0D, 0x00, 0x00, 0x80, 0x7F, // +inf, kept as integer
        ];
        assert_eq!(encode(&decode(&data).unwrap()), data.to_vec());
    }
}
