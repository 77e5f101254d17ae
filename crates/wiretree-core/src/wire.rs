//! Low-level protobuf wire format primitives.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types understood here:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 5: I32 (fixed32, sfixed32, float)
//!
//! Groups (3 and 4) are rejected.
//!
//! Decoding works on a `start..end` window of a larger buffer so that nested
//! scopes can be parsed without slicing; every decoder returns the position
//! just past what it consumed.

use crate::error::{Error, Result};
use crate::MAX_FIELD_NUMBER;
use bytes::BufMut;
use std::fmt;

/// Shift of the last group that still fits in a `u128`
const MAX_VARINT_SHIFT: u32 = 126;

/// Protobuf wire types supported by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    Fixed64 = 1,
    /// Length-delimited (strings, bytes, embedded messages, packed runs)
    LengthDelimited = 2,
    /// 32-bit fixed-width
    Fixed32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            _ => Err(Error::UnsupportedWireType {
                offset: 0,
                wire_type: value,
            }),
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Varint => "varint",
            WireType::Fixed64 => "fixed64",
            WireType::LengthDelimited => "length-delimited",
            WireType::Fixed32 => "fixed32",
        };
        f.write_str(name)
    }
}

/// Decode a varint from `data[start..end]`.
///
/// Values up to 128 bits wide are accepted, so varints longer than the
/// ten bytes a `u64` needs still decode. Returns the decoded value and the
/// position just past the varint.
pub fn decode_varint(data: &[u8], start: usize, end: usize) -> Result<(u128, usize)> {
    let end = end.min(data.len());
    let mut result: u128 = 0;
    let mut shift = 0u32;
    let mut position = start;

    while position < end {
        let byte = data[position];
        position += 1;

        let low = (byte & 0x7F) as u128;
        // The nineteenth byte may only carry the top two bits of a u128
        if shift > MAX_VARINT_SHIFT || (shift == MAX_VARINT_SHIFT && low > 0x03) {
            return Err(Error::VarintOverflow { offset: start });
        }
        result |= low << shift;

        if byte & 0x80 == 0 {
            return Ok((result, position));
        }
        shift += 7;
    }

    Err(Error::TruncatedVarint { offset: start })
}

/// Decode a field tag from `data[start..end]`.
///
/// Returns the wire type, the field number and the position just past the tag.
pub fn decode_tag(data: &[u8], start: usize, end: usize) -> Result<(WireType, u32, usize)> {
    let end = end.min(data.len());
    if start >= end {
        return Err(Error::TruncatedTag { offset: start });
    }

    let first = data[start];
    let (tag, next) = if first & 0x80 == 0 {
        (first as u128, start + 1)
    } else {
        decode_varint(data, start, end).map_err(|e| match e {
            Error::TruncatedVarint { offset } => Error::TruncatedTag { offset },
            other => other,
        })?
    };

    let bits = (tag & 0x07) as u8;
    let wire_type = WireType::try_from(bits).map_err(|_| Error::UnsupportedWireType {
        offset: start,
        wire_type: bits,
    })?;

    let field_number = tag >> 3;
    if field_number == 0 || field_number > MAX_FIELD_NUMBER as u128 {
        return Err(Error::InvalidFieldNumber {
            offset: start,
            number: field_number,
            max: MAX_FIELD_NUMBER,
        });
    }

    Ok((wire_type, field_number as u32, next))
}

/// Append `value` as a varint.
pub fn encode_varint(value: u128, buf: &mut impl BufMut) {
    match u64::try_from(value) {
        Ok(narrow) => prost::encoding::encode_varint(narrow, buf),
        Err(_) => {
            let mut value = value;
            while value >= 0x80 {
                buf.put_u8((value as u8 & 0x7F) | 0x80);
                value >>= 7;
            }
            buf.put_u8(value as u8);
        }
    }
}

/// Append the tag for `field_number` / `wire_type`.
pub fn encode_tag(field_number: u32, wire_type: WireType, buf: &mut impl BufMut) {
    prost::encoding::encode_varint(((field_number as u64) << 3) | wire_type as u64, buf);
}

/// Number of bytes `value` occupies as a varint.
pub fn varint_len(value: u128) -> usize {
    match u64::try_from(value) {
        Ok(narrow) => prost::encoding::encoded_len_varint(narrow),
        Err(_) => (128 - value.leading_zeros() as usize).div_ceil(7),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varint_bytes(value: u128) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_varint(value, &mut buf);
        buf
    }

    #[test]
    fn test_decode_varint_single_byte() {
        let data = [0x08];
        assert_eq!(decode_varint(&data, 0, 1).unwrap(), (8, 1));
    }

    #[test]
    fn test_decode_varint_multi_byte() {
        let data = [0xAC, 0x02]; // 300
        assert_eq!(decode_varint(&data, 0, 2).unwrap(), (300, 2));
    }

    #[test]
    fn test_decode_varint_max() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert_eq!(
            decode_varint(&data, 0, data.len()).unwrap(),
            (u64::MAX as u128, 10)
        );

        let mut widest = vec![0xFF; 18];
        widest.push(0x03);
        assert_eq!(
            decode_varint(&widest, 0, widest.len()).unwrap(),
            (u128::MAX, 19)
        );
    }

    #[test]
    fn test_decode_varint_respects_window() {
        // Terminating byte lies outside the window
        let data = [0x00, 0x96, 0x01];
        assert!(matches!(
            decode_varint(&data, 1, 2),
            Err(Error::TruncatedVarint { offset: 1 })
        ));
        assert_eq!(decode_varint(&data, 1, 3).unwrap(), (150, 3));
    }

    #[test]
    fn test_decode_varint_truncated() {
        assert!(matches!(
            decode_varint(&[0x80, 0x80], 0, 2),
            Err(Error::TruncatedVarint { offset: 0 })
        ));
        assert!(matches!(
            decode_varint(&[], 0, 0),
            Err(Error::TruncatedVarint { .. })
        ));
    }

    #[test]
    fn test_decode_varint_wider_than_u64() {
        // 2^64: nine continuation bytes, then 0x02
        let mut data = vec![0x80; 9];
        data.push(0x02);
        assert_eq!(decode_varint(&data, 0, data.len()).unwrap(), (1 << 64, 10));

        // 2^70: ten continuation bytes, then 0x01
        let mut data = vec![0x80; 10];
        data.push(0x01);
        assert_eq!(decode_varint(&data, 0, data.len()).unwrap(), (1 << 70, 11));
    }

    #[test]
    fn test_decode_varint_overflow() {
        let mut data = vec![0xFF; 18];
        data.push(0x04);
        assert!(matches!(
            decode_varint(&data, 0, data.len()),
            Err(Error::VarintOverflow { offset: 0 })
        ));

        let mut twenty = vec![0x80; 19];
        twenty.push(0x01);
        assert!(matches!(
            decode_varint(&twenty, 0, twenty.len()),
            Err(Error::VarintOverflow { .. })
        ));
    }

    #[test]
    fn test_varint_inverse_law() {
        let samples = [
            0u128,
            1,
            127,
            128,
            150,
            300,
            16_383,
            16_384,
            u32::MAX as u128,
            1 << 56,
            u64::MAX as u128 - 1,
            u64::MAX as u128,
            1 << 64,
            1 << 70,
            u128::MAX,
        ];
        for value in samples {
            let bytes = varint_bytes(value);
            assert_eq!(bytes.len(), varint_len(value));
            assert_eq!(decode_varint(&bytes, 0, bytes.len()).unwrap(), (value, bytes.len()));
        }
    }

    #[test]
    fn test_decode_varint_agrees_with_prost() {
        for value in [0u64, 150, 1 << 35, u64::MAX] {
            let mut bytes = Vec::new();
            prost::encoding::encode_varint(value, &mut bytes);
            let mut slice: &[u8] = &bytes;
            let expected = prost::encoding::decode_varint(&mut slice).unwrap();
            assert_eq!(
                decode_varint(&bytes, 0, bytes.len()).unwrap().0,
                expected as u128
            );
            assert_eq!(varint_bytes(value as u128), bytes);
        }
    }

    #[test]
    fn test_wire_type_conversion() {
        assert_eq!(WireType::try_from(0).unwrap(), WireType::Varint);
        assert_eq!(WireType::try_from(1).unwrap(), WireType::Fixed64);
        assert_eq!(WireType::try_from(2).unwrap(), WireType::LengthDelimited);
        assert_eq!(WireType::try_from(5).unwrap(), WireType::Fixed32);
        for groupish in [3, 4, 6, 7] {
            assert!(WireType::try_from(groupish).is_err());
        }
    }

    #[test]
    fn test_decode_tag_fast_path() {
        // Field 1, varint
        assert_eq!(decode_tag(&[0x08], 0, 1).unwrap(), (WireType::Varint, 1, 1));
        // Field 2, length-delimited
        assert_eq!(
            decode_tag(&[0x12], 0, 1).unwrap(),
            (WireType::LengthDelimited, 2, 1)
        );
    }

    #[test]
    fn test_decode_tag_multi_byte() {
        // Field 16, fixed32: (16 << 3) | 5 = 133 = 0x85 0x01
        assert_eq!(
            decode_tag(&[0x85, 0x01], 0, 2).unwrap(),
            (WireType::Fixed32, 16, 2)
        );
    }

    #[test]
    fn test_decode_tag_errors() {
        assert!(matches!(
            decode_tag(&[0x85], 0, 1),
            Err(Error::TruncatedTag { offset: 0 })
        ));
        assert!(matches!(decode_tag(&[], 0, 0), Err(Error::TruncatedTag { .. })));
        // Field 1, start group
        assert!(matches!(
            decode_tag(&[0x0B], 0, 1),
            Err(Error::UnsupportedWireType { wire_type: 3, .. })
        ));
        // Field 0 is invalid
        assert!(matches!(
            decode_tag(&[0x00], 0, 1),
            Err(Error::InvalidFieldNumber { number: 0, .. })
        ));
    }

    #[test]
    fn test_tag_inverse_law() {
        let wire_types = [
            WireType::Varint,
            WireType::Fixed64,
            WireType::LengthDelimited,
            WireType::Fixed32,
        ];
        for field_number in [1u32, 2, 15, 16, 2047, 2048, 262_143, MAX_FIELD_NUMBER] {
            for wire_type in wire_types {
                let mut buf = Vec::new();
                encode_tag(field_number, wire_type, &mut buf);
                assert_eq!(
                    decode_tag(&buf, 0, buf.len()).unwrap(),
                    (wire_type, field_number, buf.len())
                );
            }
        }
    }
}
