//! Decode/encode tests against payloads produced by prost.

use pretty_assertions::assert_eq;
use prost::Message as _;
use prost_types::value::Kind;
use prost_types::{
    DescriptorProto, Duration, FieldDescriptorProto, FileDescriptorProto, ListValue, Struct,
};
use wiretree_core::{
    decode, decode_with_trace, encode, from_json_str, to_json_string_pretty, FieldKind, Fixed64,
    Value,
};

fn field(name: &str, number: i32, r#type: i32) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(1),
        r#type: Some(r#type),
        ..Default::default()
    }
}

fn sample_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("foo.proto".to_string()),
        package: Some("demo".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("Person".to_string()),
            field: vec![field("id", 1, 5), field("email", 2, 9), field("score", 3, 1)],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn sample_struct() -> Struct {
    let mut object = Struct::default();
    object.fields.insert(
        "alpha".to_string(),
        prost_types::Value {
            kind: Some(Kind::NumberValue(3.25)),
        },
    );
    object.fields.insert(
        "beta".to_string(),
        prost_types::Value {
            kind: Some(Kind::ListValue(ListValue {
                values: vec![
                    prost_types::Value {
                        kind: Some(Kind::BoolValue(true)),
                    },
                    prost_types::Value {
                        kind: Some(Kind::StringValue("gamma".to_string())),
                    },
                ],
            })),
        },
    );
    object
}

#[test]
fn round_trip_reproduces_prost_payloads() {
    let payloads = vec![
        sample_file().encode_to_vec(),
        sample_struct().encode_to_vec(),
        Duration {
            seconds: -1,
            nanos: 500,
        }
        .encode_to_vec(),
    ];

    for payload in payloads {
        let message = decode(&payload).unwrap();
        assert_eq!(encode(&message), payload);
    }
}

#[test]
fn round_trip_through_json_document() {
    for payload in [sample_file().encode_to_vec(), sample_struct().encode_to_vec()] {
        let text = to_json_string_pretty(&decode(&payload).unwrap()).unwrap();
        assert_eq!(encode(&from_json_str(&text).unwrap()), payload);
    }
}

#[test]
fn negative_int64_decodes_as_ten_byte_varint() {
    let payload = Duration {
        seconds: -1,
        nanos: 500,
    }
    .encode_to_vec();
    let message = decode(&payload).unwrap();

    assert_eq!(message.first(1), Some(&Value::Varint(u64::MAX as u128)));
    assert_eq!(message.first(2), Some(&Value::Varint(500)));
}

#[test]
fn double_is_classified_as_float() {
    let payload = prost_types::Value {
        kind: Some(Kind::NumberValue(3.25)),
    }
    .encode_to_vec();
    let message = decode(&payload).unwrap();

    assert_eq!(message.first(2), Some(&Value::Fixed64(Fixed64::Float(3.25))));
}

#[test]
fn nested_descriptors_decode_as_embedded_messages() {
    let payload = sample_file().encode_to_vec();
    let message = decode(&payload).unwrap();

    assert_eq!(message.first(1), Some(&Value::from("foo.proto")));
    assert_eq!(message.first(2), Some(&Value::from("demo")));
    assert_eq!(message.first(12), Some(&Value::from("proto3")));

    let person = message.first(4).and_then(Value::as_message).unwrap();
    assert_eq!(person.first(1), Some(&Value::from("Person")));
    assert_eq!(person.fields(2).count(), 3);
}

#[test]
fn embedded_message_wins_over_valid_text() {
    // "email" is valid UTF-8 but also reads as field 12 / fixed32 "mail"
    let payload = sample_file().encode_to_vec();
    let message = decode(&payload).unwrap();

    let person = message.first(4).and_then(Value::as_message).unwrap();
    let email = person.fields(2).nth(1).and_then(Value::as_message).unwrap();
    let name = email.first(1).unwrap();

    assert_eq!(name.kind(), FieldKind::EmbeddedMessage);
    assert_eq!(name.as_message().unwrap().first(12).unwrap().kind(), FieldKind::Fixed32);
}

#[test]
fn edits_propagate_to_prost() {
    let payload = sample_file().encode_to_vec();
    let mut message = decode(&payload).unwrap();

    *message.first_mut(2).unwrap() = Value::from("demo.v2");
    let person = message
        .first_mut(4)
        .and_then(Value::as_message_mut)
        .unwrap();
    *person.first_mut(1).unwrap() = Value::from("Human");

    let reparsed = FileDescriptorProto::decode(encode(&message).as_slice()).unwrap();
    assert_eq!(reparsed.package(), "demo.v2");
    assert_eq!(reparsed.message_type[0].name(), "Human");
    assert_eq!(reparsed.message_type[0].field.len(), 3);
    assert_eq!(reparsed.syntax(), "proto3");
}

#[test]
fn truncated_payload_is_rejected() {
    let payload = sample_file().encode_to_vec();
    assert!(decode(&payload[..payload.len() - 1]).is_err());

    let mut dangling = payload.clone();
    dangling.push(0x80);
    assert!(decode(&dangling).is_err());
}

#[test]
fn trace_nests_with_tabs() {
    let payload = Duration {
        seconds: 3,
        nanos: 0,
    }
    .encode_to_vec();
    let decoded = decode_with_trace(&payload).unwrap();
    assert_eq!(decoded.trace.to_string(), "(1) Varint: 3\n");

    let wrapped = {
        let mut out = vec![0x0A, payload.len() as u8];
        out.extend_from_slice(&payload);
        out
    };
    let decoded = decode_with_trace(&wrapped).unwrap();
    assert_eq!(
        decoded.trace.to_string(),
        "(1) embedded message:\n\t(1) Varint: 3\n"
    );
}
