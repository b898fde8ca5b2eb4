use crate::{KafkaTemplateError, ProducerRecord, RecordHeader, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Header names understood by [`MessagingMessageConverter`].
pub mod headers {
    /// Headers with this prefix carry routing data and are not copied onto records.
    pub const PREFIX: &str = "kafka_";
    pub const TOPIC: &str = "kafka_topic";
    pub const PARTITION: &str = "kafka_partitionId";
    pub const KEY: &str = "kafka_messageKey";
    pub const TIMESTAMP: &str = "kafka_timestamp";
    pub const ID: &str = "id";
    pub const MESSAGE_TIMESTAMP: &str = "timestamp";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageHeaders(BTreeMap<String, Value>);

impl MessageHeaders {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn id(&self) -> Option<Uuid> {
        self.get(headers::ID)
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

/// A payload plus headers; routing lives in the headers rather than in
/// method arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    payload: Value,
    headers: MessageHeaders,
}

impl Message {
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    pub fn into_parts(self) -> (Value, MessageHeaders) {
        (self.payload, self.headers)
    }
}

pub struct MessageBuilder {
    payload: Value,
    headers: MessageHeaders,
}

impl MessageBuilder {
    pub fn with_payload<T: Serialize + ?Sized>(payload: &T) -> Result<Self> {
        Ok(Self {
            payload: serde_json::to_value(payload)?,
            headers: MessageHeaders::default(),
        })
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn topic(self, topic: impl Into<String>) -> Self {
        self.header(headers::TOPIC, topic.into())
    }

    pub fn partition(self, partition: i32) -> Self {
        self.header(headers::PARTITION, partition)
    }

    pub fn key<K: Serialize + ?Sized>(self, key: &K) -> Result<Self> {
        let key = serde_json::to_value(key)?;
        Ok(self.header(headers::KEY, key))
    }

    pub fn timestamp(self, timestamp: i64) -> Self {
        self.header(headers::TIMESTAMP, timestamp)
    }

    /// Finish the message, stamping it with a fresh id and creation time
    /// unless those headers were set explicitly.
    pub fn build(mut self) -> Message {
        if !self.headers.contains_key(headers::ID) {
            self.headers.insert(headers::ID, Uuid::new_v4().to_string());
        }
        if !self.headers.contains_key(headers::MESSAGE_TIMESTAMP) {
            self.headers
                .insert(headers::MESSAGE_TIMESTAMP, chrono::Utc::now().timestamp_millis());
        }
        Message {
            payload: self.payload,
            headers: self.headers,
        }
    }
}

/// Converts a [`Message`] into the record a template sends.
pub trait RecordMessageConverter<K, V>: Send + Sync {
    fn to_record(
        &self,
        message: Message,
        default_topic: Option<&str>,
    ) -> Result<ProducerRecord<K, V>>;
}

/// Reads routing from the `kafka_*` headers and deserializes key and payload
/// with serde. Remaining headers become record headers: strings as raw UTF-8,
/// anything else as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagingMessageConverter;

impl MessagingMessageConverter {
    fn topic(headers: &MessageHeaders, default_topic: Option<&str>) -> Result<String> {
        match headers.get(headers::TOPIC) {
            Some(Value::String(topic)) => Ok(topic.clone()),
            Some(other) => Err(KafkaTemplateError::InvalidArgument(format!(
                "Header '{}' must be a string, got {}",
                headers::TOPIC,
                other
            ))),
            None => default_topic
                .map(str::to_string)
                .ok_or(KafkaTemplateError::NoDefaultTopic),
        }
    }

    fn integer_header(headers: &MessageHeaders, name: &str) -> Result<Option<i64>> {
        headers
            .get(name)
            .map(|value| {
                value.as_i64().ok_or_else(|| {
                    KafkaTemplateError::InvalidArgument(format!("Header '{}' must be an integer, got {}", name, value))
                })
            })
            .transpose()
    }

    fn record_headers(headers: &MessageHeaders) -> Result<Vec<RecordHeader>> {
        headers
            .iter()
            .filter(|(name, _)| {
                !name.starts_with(headers::PREFIX)
                    && name.as_str() != headers::ID
                    && name.as_str() != headers::MESSAGE_TIMESTAMP
            })
            .map(|(name, value)| -> Result<RecordHeader> {
                let bytes = match value {
                    Value::String(text) => text.as_bytes().to_vec(),
                    other => serde_json::to_vec(other)?,
                };
                Ok(RecordHeader::new(name.as_str(), bytes))
            })
            .collect()
    }
}

impl<K, V> RecordMessageConverter<K, V> for MessagingMessageConverter
where
    K: DeserializeOwned,
    V: DeserializeOwned,
{
    fn to_record(
        &self,
        message: Message,
        default_topic: Option<&str>,
    ) -> Result<ProducerRecord<K, V>> {
        let (payload, headers) = message.into_parts();

        let topic = Self::topic(&headers, default_topic)?;
        let partition = Self::integer_header(&headers, headers::PARTITION)?
            .map(|partition| {
                i32::try_from(partition).map_err(|_| {
                    KafkaTemplateError::InvalidArgument(format!("Partition {} out of range", partition))
                })
            })
            .transpose()?;
        let timestamp = Self::integer_header(&headers, headers::TIMESTAMP)?;
        let key = headers
            .get(headers::KEY)
            .map(|key| serde_json::from_value::<K>(key.clone()))
            .transpose()?;
        let value: V = serde_json::from_value(payload)?;

        Ok(ProducerRecord {
            topic,
            partition,
            key,
            value,
            timestamp,
            headers: Self::record_headers(&headers)?,
        })
    }
}
