use kafka_template::{
    JsonSerializer, KafkaOperations, KafkaTemplate, KafkaTemplateError, MessageBuilder,
    PartitionInfo, ProducerSettings, RecordMetadata, Result, StringSerializer, TemplateMetrics,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::{MessageRequest, SendRequest};

pub type GatewayTemplate = KafkaTemplate<String, Value>;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricEntry {
    pub name: String,
    pub group: String,
    pub tags: BTreeMap<String, String>,
    pub value: f64,
}

#[derive(Clone)]
pub struct GatewayService {
    template: GatewayTemplate,
    metrics: TemplateMetrics,
}

impl GatewayService {
    pub fn new(settings: &ProducerSettings) -> Result<Self> {
        let metrics = TemplateMetrics::new()?;
        let template = KafkaTemplate::from_settings(settings, StringSerializer, JsonSerializer::new())?
            .with_metrics(metrics.clone());

        Ok(Self { template, metrics })
    }

    pub fn template(&self) -> &GatewayTemplate {
        &self.template
    }

    pub async fn send(&self, topic: &str, request: SendRequest) -> Result<RecordMetadata> {
        info!("Sending record to topic '{}'", topic);

        let handle = match (request.partition, request.key) {
            (Some(partition), Some(key)) => {
                self.template.send_to_partition_with_key(topic, partition, key, request.value)
            }
            (Some(partition), None) => self.template.send_to_partition(topic, partition, request.value),
            (None, Some(key)) => self.template.send_with_key(topic, key, request.value),
            (None, None) => self.template.send(topic, request.value),
        };

        Ok(handle.await?.record_metadata)
    }

    pub async fn send_default(&self, request: SendRequest) -> Result<RecordMetadata> {
        let handle = match (request.partition, request.key) {
            (Some(partition), Some(key)) => {
                self.template.send_default_to_partition(partition, key, request.value)
            }
            (Some(_), None) => {
                return Err(KafkaTemplateError::InvalidArgument(
                    "A partition on the default topic requires a key".to_string(),
                ))
            }
            (None, Some(key)) => self.template.send_default_with_key(key, request.value),
            (None, None) => self.template.send_default(request.value),
        };

        Ok(handle.await?.record_metadata)
    }

    pub async fn send_message(&self, request: MessageRequest) -> Result<RecordMetadata> {
        let builder = MessageBuilder::with_payload(&request.payload)?;
        let message = request
            .headers
            .into_iter()
            .fold(builder, |builder, (name, value)| builder.header(name, value))
            .build();

        Ok(self.template.send_message(message).await?.record_metadata)
    }

    pub async fn partitions(&self, topic: &str) -> Result<Vec<PartitionInfo>> {
        let template = self.template.clone();
        let topic = topic.to_string();
        tokio::task::spawn_blocking(move || template.partitions_for(&topic))
            .await
            .map_err(|e| KafkaTemplateError::Producer(format!("metadata task failed: {}", e)))?
    }

    pub fn client_metrics(&self) -> Result<Vec<MetricEntry>> {
        Ok(self
            .template
            .metrics()?
            .into_iter()
            .map(|(name, value)| MetricEntry {
                name: name.name,
                group: name.group,
                tags: name.tags,
                value,
            })
            .collect())
    }

    pub fn prometheus(&self) -> Result<String> {
        self.metrics.export()
    }

    pub async fn flush(&self) -> Result<()> {
        let template = self.template.clone();
        tokio::task::spawn_blocking(move || template.flush())
            .await
            .map_err(|e| KafkaTemplateError::Producer(format!("flush task failed: {}", e)))?
    }
}

/// Collapse `--set key=value` pairs into client properties.
pub fn parse_overrides(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .ok_or_else(|| KafkaTemplateError::InvalidArgument(format!("Expected key=value, got '{}'", pair)))
        })
        .collect()
}
