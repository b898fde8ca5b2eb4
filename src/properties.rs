use crate::{KafkaTemplateError, ProducerSettings, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

fn read_properties<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let file = File::open(&path).map_err(|e| {
        KafkaTemplateError::InvalidArgument(format!("Failed to open config file {:?}: {}", path.as_ref(), e))
    })?;

    let reader = BufReader::new(file);
    java_properties::read(reader)
        .map_err(|e| KafkaTemplateError::InvalidArgument(format!("Failed to parse properties: {}", e)))
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        KafkaTemplateError::InvalidArgument(format!("Invalid value '{}' for property '{}'", value, key))
    })
}

/// Parse a Java properties file into [`ProducerSettings`].
///
/// Known keys populate the typed fields; everything else is passed to the
/// client untouched.
pub fn parse_properties_file<P: AsRef<Path>>(path: P) -> Result<ProducerSettings> {
    let properties = read_properties(path)?;
    apply_properties(ProducerSettings::default(), properties)
}

/// Parse a second properties file and merge it over `settings`.
pub fn merge_producer_properties<P: AsRef<Path>>(
    settings: ProducerSettings,
    path: P,
) -> Result<ProducerSettings> {
    let properties = read_properties(path)?;
    apply_properties(settings, properties)
}

fn apply_properties(
    mut settings: ProducerSettings,
    properties: HashMap<String, String>,
) -> Result<ProducerSettings> {
    for (key, value) in properties {
        match key.as_str() {
            "bootstrap.servers" => settings.bootstrap_servers = value,
            "client.id" => settings.client_id = Some(value),
            "acks" => settings.acks = Some(value),
            "compression.type" => settings.compression_type = Some(value),
            "linger.ms" => settings.linger_ms = Some(parse_value(&key, &value)?),
            "enable.idempotence" => settings.enable_idempotence = Some(parse_value(&key, &value)?),
            "message.timeout.ms" => settings.message_timeout_ms = Some(parse_value(&key, &value)?),
            "statistics.interval.ms" => settings.statistics_interval_ms = Some(parse_value(&key, &value)?),
            "security.protocol" => settings.security_protocol = Some(value),
            "sasl.mechanism" => settings.sasl_mechanism = Some(value),
            "sasl.username" => settings.sasl_username = Some(value),
            "sasl.password" => settings.sasl_password = Some(value),
            "ssl.ca.location" => settings.ssl_ca_location = Some(value),
            "template.default.topic" => settings.default_topic = Some(value),
            "template.flush.timeout.ms" => settings.flush_timeout_ms = parse_value(&key, &value)?,
            "template.metadata.timeout.ms" => settings.metadata_timeout_ms = parse_value(&key, &value)?,
            "template.auto.flush" => settings.auto_flush = parse_value(&key, &value)?,
            _ => {
                settings.additional_properties.insert(key, value);
            }
        }
    }

    Ok(settings)
}
