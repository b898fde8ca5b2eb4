use crate::Result;
use ::config::{Config, Environment};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `KAFKA_TEMPLATE__BOOTSTRAP_SERVERS`.
pub const ENV_PREFIX: &str = "KAFKA_TEMPLATE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerSettings {
    pub bootstrap_servers: String,
    pub client_id: Option<String>,
    pub default_topic: Option<String>,
    pub acks: Option<String>,
    pub compression_type: Option<String>,
    pub linger_ms: Option<u64>,
    pub enable_idempotence: Option<bool>,
    pub message_timeout_ms: Option<u64>,
    /// Feeds the client statistics behind `metrics()`; `None` disables them.
    pub statistics_interval_ms: Option<u64>,
    pub security_protocol: Option<String>,
    pub sasl_mechanism: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
    pub ssl_ca_location: Option<String>,
    pub flush_timeout_ms: u64,
    pub metadata_timeout_ms: u64,
    pub auto_flush: bool,
    pub additional_properties: HashMap<String, String>,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            client_id: None,
            default_topic: None,
            acks: None,
            compression_type: None,
            linger_ms: None,
            enable_idempotence: None,
            message_timeout_ms: None,
            statistics_interval_ms: Some(5_000),
            security_protocol: None,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
            ssl_ca_location: None,
            flush_timeout_ms: 10_000,
            metadata_timeout_ms: 5_000,
            auto_flush: false,
            additional_properties: HashMap::new(),
        }
    }
}

impl ProducerSettings {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    pub fn to_client_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config.set("bootstrap.servers", &self.bootstrap_servers);

        if let Some(client_id) = &self.client_id {
            config.set("client.id", client_id);
        }

        if let Some(acks) = &self.acks {
            config.set("acks", acks);
        }

        if let Some(compression_type) = &self.compression_type {
            config.set("compression.type", compression_type);
        }

        if let Some(linger_ms) = self.linger_ms {
            config.set("linger.ms", linger_ms.to_string());
        }

        if let Some(enable_idempotence) = self.enable_idempotence {
            config.set("enable.idempotence", enable_idempotence.to_string());
        }

        if let Some(message_timeout_ms) = self.message_timeout_ms {
            config.set("message.timeout.ms", message_timeout_ms.to_string());
        }

        if let Some(statistics_interval_ms) = self.statistics_interval_ms {
            config.set("statistics.interval.ms", statistics_interval_ms.to_string());
        }

        if let Some(security_protocol) = &self.security_protocol {
            config.set("security.protocol", security_protocol);
        }

        if let Some(sasl_mechanism) = &self.sasl_mechanism {
            config.set("sasl.mechanism", sasl_mechanism);
        }

        if let Some(sasl_username) = &self.sasl_username {
            config.set("sasl.username", sasl_username);
        }

        if let Some(sasl_password) = &self.sasl_password {
            config.set("sasl.password", sasl_password);
        }

        if let Some(ssl_ca_location) = &self.ssl_ca_location {
            config.set("ssl.ca.location", ssl_ca_location);
        }

        // Pass-through client properties win over the typed fields
        for (key, value) in &self.additional_properties {
            config.set(key, value);
        }

        config
    }

    /// Apply `KAFKA_TEMPLATE__<FIELD>` environment variables on top of these settings.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.overlay(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
    }

    fn overlay(self, environment: Environment) -> Result<Self> {
        // Property keys contain dots, which the config crate reads as nesting.
        let additional_properties = self.additional_properties.clone();
        let base = Self {
            additional_properties: HashMap::new(),
            ..self
        };

        let merged: Self = Config::builder()
            .add_source(Config::try_from(&base)?)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        Ok(Self {
            additional_properties,
            ..merged
        })
    }
}
