use kafka_template::*;
use serde::Serialize;

const ORDER_SCHEMA: &str = r#"
{
    "type": "record",
    "name": "Order",
    "fields": [
        {"name": "id", "type": "string"},
        {"name": "quantity", "type": "int"}
    ]
}
"#;

#[derive(Clone, Serialize)]
struct Order {
    id: String,
    quantity: i32,
}

#[derive(Serialize)]
struct Refund {
    reason: String,
}

#[test]
fn test_avro_serializer_frames_schema_id() {
    let order = Order {
        id: "o-1".to_string(),
        quantity: 2,
    };

    let plain = AvroSerializer::<Order>::from_schema_str(ORDER_SCHEMA).unwrap();
    let datum = plain.serialize("orders", &order).unwrap();
    // "o-1" is a zigzag length of 3 followed by the bytes, then zigzag 2
    assert_eq!(datum, vec![6, b'o', b'-', b'1', 4]);

    let framed = plain.clone().with_schema_id(42).serialize("orders", &order).unwrap();
    assert_eq!(&framed[..5], &[0, 0, 0, 0, 42]);
    assert_eq!(&framed[5..], datum.as_slice());
}

#[test]
fn test_avro_serializer_rejects_mismatched_value() {
    let serializer = AvroSerializer::<Refund>::from_schema_str(ORDER_SCHEMA).unwrap();
    let result = serializer.serialize(
        "orders",
        &Refund {
            reason: "damaged".to_string(),
        },
    );
    assert!(matches!(result, Err(KafkaTemplateError::Serialization(_))));
}

#[test]
fn test_avro_serializer_loads_schema_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let schema_path = temp_dir.path().join("order.avsc");
    std::fs::write(&schema_path, ORDER_SCHEMA).unwrap();

    let serializer = AvroSerializer::<Order>::from_schema_file(&schema_path).unwrap();
    assert_eq!(serializer.schema(), &apache_avro::Schema::parse_str(ORDER_SCHEMA).unwrap());
}

#[test]
fn test_json_and_plain_serializers() {
    let json = JsonSerializer::<Order>::new();
    let bytes = json
        .serialize(
            "orders",
            &Order {
                id: "o-2".to_string(),
                quantity: 1,
            },
        )
        .unwrap();
    assert_eq!(bytes, br#"{"id":"o-2","quantity":1}"#.to_vec());

    assert_eq!(StringSerializer.serialize("t", "héllo").unwrap(), "héllo".as_bytes().to_vec());
    assert_eq!(BytesSerializer.serialize("t", &vec![1, 2, 3]).unwrap(), vec![1, 2, 3]);
}
