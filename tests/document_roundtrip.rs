//! Round-trip property: decode(encode(doc)) == doc for every supported value type.
//!
//! Wire compatibility is checked against the `bson` crate in both directions.

use bson::spec::BinarySubtype;
use bson::Bson;
use docwire::protocol::{decode, encode, sample_document, Document, Value};
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int64),
        any::<i32>().prop_map(Value::Int32),
        // NaN != NaN, keep floats comparable
        (-1.0e12f64..1.0e12).prop_map(Value::Double),
        any::<bool>().prop_map(Value::Boolean),
        Just(Value::Null),
        "[^\\x00]{0,16}".prop_map(Value::String),
        // 0x02 is the legacy binary layout with a nested length
        (
            prop::sample::select(vec![0x00u8, 0x01, 0x05, 0x80, 0xff]),
            prop::collection::vec(any::<u8>(), 0..32),
        )
            .prop_map(|(subtype, data)| Value::Binary { subtype, data }),
    ]
}

fn key() -> impl Strategy<Value = String> {
    "[a-zA-Z_][a-zA-Z0-9_]{0,8}"
}

fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((key(), inner), 0..4)
                .prop_map(|fields| Value::Document(fields.into_iter().collect())),
        ]
    })
}

fn document() -> impl Strategy<Value = Document> {
    prop::collection::vec((key(), value()), 0..6).prop_map(|fields| fields.into_iter().collect())
}

fn to_bson(value: &Value) -> Bson {
    match value {
        Value::Double(v) => Bson::Double(*v),
        Value::String(v) => Bson::String(v.clone()),
        Value::Document(doc) => Bson::Document(to_bson_document(doc)),
        Value::Array(items) => Bson::Array(items.iter().map(to_bson).collect()),
        Value::Binary { subtype, data } => Bson::Binary(bson::Binary {
            subtype: BinarySubtype::from(*subtype),
            bytes: data.clone(),
        }),
        Value::Boolean(v) => Bson::Boolean(*v),
        Value::Null => Bson::Null,
        Value::Int32(v) => Bson::Int32(*v),
        Value::Int64(v) => Bson::Int64(*v),
    }
}

fn to_bson_document(doc: &Document) -> bson::Document {
    doc.iter()
        .map(|(key, value)| (key.to_string(), to_bson(value)))
        .collect()
}

fn bson_bytes(doc: &bson::Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.to_writer(&mut bytes).unwrap();
    bytes
}

proptest! {
    #[test]
    fn roundtrip_preserves_fields_and_order(doc in document()) {
        let bytes = encode(&doc).unwrap();
        let decoded = decode(&bytes).unwrap();

        prop_assert_eq!(decoded.keys().collect::<Vec<_>>(), doc.keys().collect::<Vec<_>>());
        prop_assert_eq!(decoded, doc);
    }

    #[test]
    fn length_prefix_equals_encoded_size(doc in document()) {
        let bytes = encode(&doc).unwrap();
        let prefix = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        prop_assert_eq!(prefix as usize, bytes.len());
        prop_assert_eq!(bytes[bytes.len() - 1], 0);
    }

    #[test]
    fn encoded_bytes_read_back_by_bson(doc in document()) {
        let bytes = encode(&doc).unwrap();
        let parsed = bson::Document::from_reader(&bytes[..]).unwrap();
        let expected = to_bson_document(&doc);

        // bson::Document equality ignores order
        prop_assert_eq!(parsed.keys().collect::<Vec<_>>(), expected.keys().collect::<Vec<_>>());
        prop_assert_eq!(parsed, expected);
    }

    #[test]
    fn bson_bytes_decode_to_same_document(doc in document()) {
        let bytes = bson_bytes(&to_bson_document(&doc));

        prop_assert_eq!(&bytes, &encode(&doc).unwrap());
        prop_assert_eq!(decode(&bytes).unwrap(), doc);
    }
}

#[test]
fn test_sample_document_matches_bson() {
    let reference = bson_bytes(&bson::doc! { "long": 100i64, "james": "perry" });
    let expected: [u8; 36] = [
        0x24, 0x00, 0x00, 0x00, // total length 36
        0x12, b'l', b'o', b'n', b'g', 0x00, // int64 "long"
        0x64, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 100
        0x02, b'j', b'a', b'm', b'e', b's', 0x00, // string "james"
        0x06, 0x00, 0x00, 0x00, b'p', b'e', b'r', b'r', b'y', 0x00, // "perry"
        0x00,
    ];

    assert_eq!(reference, expected);
    assert_eq!(encode(&sample_document()).unwrap(), expected);
    assert_eq!(decode(&reference).unwrap(), sample_document());
}

#[test]
fn test_duplicate_names_encode_last_value_once() {
    let doc: Document = vec![
        ("a", Value::Int64(1)),
        ("b", Value::Boolean(false)),
        ("a", Value::String("last".into())),
    ]
    .into_iter()
    .collect();

    let decoded = decode(&encode(&doc).unwrap()).unwrap();
    assert_eq!(decoded.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(decoded.get("a"), Some(&Value::String("last".into())));
}
