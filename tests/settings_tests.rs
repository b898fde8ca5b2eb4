use kafka_template::*;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_properties_file_populates_settings() {
    let config_content = r#"
bootstrap.servers=broker-1:9092,broker-2:9092
client.id=orders-producer
acks=all
linger.ms=5
enable.idempotence=true
template.default.topic=orders
template.flush.timeout.ms=2500
template.auto.flush=true
batch.size=32768
"#;

    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("producer.properties");
    std::fs::write(&config_path, config_content).unwrap();

    let settings = parse_properties_file(&config_path).unwrap();

    assert_eq!(settings.bootstrap_servers, "broker-1:9092,broker-2:9092");
    assert_eq!(settings.client_id.as_deref(), Some("orders-producer"));
    assert_eq!(settings.acks.as_deref(), Some("all"));
    assert_eq!(settings.linger_ms, Some(5));
    assert_eq!(settings.enable_idempotence, Some(true));
    assert_eq!(settings.default_topic.as_deref(), Some("orders"));
    assert_eq!(settings.flush_timeout(), Duration::from_millis(2500));
    assert_eq!(settings.metadata_timeout(), Duration::from_secs(5));
    assert!(settings.auto_flush);
    assert_eq!(settings.additional_properties.get("batch.size"), Some(&"32768".to_string()));
}

#[test]
fn test_merge_overrides_earlier_values() {
    let temp_dir = tempdir().unwrap();
    let base_path = temp_dir.path().join("base.properties");
    let extra_path = temp_dir.path().join("extra.properties");
    std::fs::write(&base_path, "bootstrap.servers=a:9092\nacks=1\n").unwrap();
    std::fs::write(&extra_path, "acks=all\nretries=5\n").unwrap();

    let settings = parse_properties_file(&base_path).unwrap();
    let merged = merge_producer_properties(settings, &extra_path).unwrap();

    assert_eq!(merged.bootstrap_servers, "a:9092");
    assert_eq!(merged.acks.as_deref(), Some("all"));
    assert_eq!(merged.additional_properties.get("retries"), Some(&"5".to_string()));
}

#[test]
fn test_invalid_numeric_property_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("bad.properties");
    std::fs::write(&config_path, "linger.ms=soon\n").unwrap();

    let result = parse_properties_file(&config_path);
    assert!(matches!(result, Err(KafkaTemplateError::InvalidArgument(_))));
}

#[test]
fn test_missing_properties_file_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let result = parse_properties_file(temp_dir.path().join("absent.properties"));
    assert!(matches!(result, Err(KafkaTemplateError::InvalidArgument(_))));
}

#[test]
fn test_client_config_carries_typed_and_extra_properties() {
    let mut settings = ProducerSettings {
        client_id: Some("gateway".to_string()),
        compression_type: Some("lz4".to_string()),
        message_timeout_ms: Some(30_000),
        ..ProducerSettings::default()
    };
    settings
        .additional_properties
        .insert("compression.type".to_string(), "zstd".to_string());

    let config = settings.to_client_config();
    assert_eq!(config.get("bootstrap.servers"), Some("localhost:9092"));
    assert_eq!(config.get("client.id"), Some("gateway"));
    assert_eq!(config.get("message.timeout.ms"), Some("30000"));
    assert_eq!(config.get("compression.type"), Some("zstd"));
    assert_eq!(config.get("statistics.interval.ms"), Some("5000"));
    assert_eq!(config.get("acks"), None);

    let quiet = ProducerSettings {
        statistics_interval_ms: None,
        ..ProducerSettings::default()
    };
    assert_eq!(quiet.to_client_config().get("statistics.interval.ms"), None);
}

#[test]
fn test_environment_overrides_settings() {
    std::env::set_var("KAFKA_TEMPLATE__DEFAULT_TOPIC", "env-topic");
    std::env::set_var("KAFKA_TEMPLATE__FLUSH_TIMEOUT_MS", "750");

    let mut settings = ProducerSettings::default();
    settings
        .additional_properties
        .insert("batch.size".to_string(), "1024".to_string());
    let settings = settings.with_env_overrides().unwrap();

    std::env::remove_var("KAFKA_TEMPLATE__DEFAULT_TOPIC");
    std::env::remove_var("KAFKA_TEMPLATE__FLUSH_TIMEOUT_MS");

    assert_eq!(settings.default_topic.as_deref(), Some("env-topic"));
    assert_eq!(settings.flush_timeout_ms, 750);
    assert_eq!(settings.bootstrap_servers, "localhost:9092");
    assert_eq!(settings.additional_properties.get("batch.size"), Some(&"1024".to_string()));
}
