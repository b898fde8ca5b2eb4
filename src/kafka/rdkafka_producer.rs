use crate::{
    DeliveryCompleter, KafkaTemplateError, MetricName, MetricsSnapshot, PartitionInfo, Producer,
    ProducerRecord, ProducerSettings, RecordHeader, RecordMetadata, Result, Serializer,
};
use rdkafka::client::ClientContext;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{DeliveryResult, Header, Message, OwnedHeaders};
use rdkafka::producer::{BaseRecord, Producer as _, ProducerContext, ThreadedProducer};
use rdkafka::statistics::Statistics;
use rdkafka::ClientConfig;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

const PRODUCER_METRICS_GROUP: &str = "producer-metrics";

/// librdkafka context: resolves delivery handles and keeps the latest statistics.
pub struct TemplateProducerContext {
    statistics: Arc<RwLock<MetricsSnapshot>>,
}

impl ClientContext for TemplateProducerContext {
    fn stats(&self, statistics: Statistics) {
        debug!(
            "Received statistics for client '{}' ({} messages queued)",
            statistics.client_id, statistics.msg_cnt
        );
        let snapshot = snapshot_from_statistics(&statistics);
        if let Ok(mut latest) = self.statistics.write() {
            *latest = snapshot;
        }
    }
}

impl ProducerContext for TemplateProducerContext {
    type DeliveryOpaque = Box<DeliveryCompleter>;

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, completer: Self::DeliveryOpaque) {
        completer.complete(map_delivery_result(delivery_result));
    }
}

fn map_delivery_result(delivery_result: &DeliveryResult<'_>) -> Result<RecordMetadata> {
    match delivery_result {
        Ok(message) => Ok(RecordMetadata {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            timestamp: message.timestamp().to_millis(),
        }),
        Err((err, _)) => Err(KafkaTemplateError::Kafka(err.clone())),
    }
}

fn snapshot_from_statistics(statistics: &Statistics) -> MetricsSnapshot {
    let metric = |name: &str| {
        MetricName::new(name, PRODUCER_METRICS_GROUP).with_tag("client-id", statistics.client_id.as_str())
    };

    let mut snapshot = MetricsSnapshot::new();
    snapshot.insert(metric("reply-queue-size"), statistics.replyq as f64);
    snapshot.insert(metric("message-count"), statistics.msg_cnt as f64);
    snapshot.insert(metric("message-bytes"), statistics.msg_size as f64);
    snapshot.insert(metric("message-count-max"), statistics.msg_max as f64);
    snapshot.insert(metric("message-bytes-max"), statistics.msg_size_max as f64);
    snapshot.insert(metric("request-total"), statistics.tx as f64);
    snapshot.insert(metric("outgoing-byte-total"), statistics.tx_bytes as f64);
    snapshot.insert(metric("response-total"), statistics.rx as f64);
    snapshot.insert(metric("incoming-byte-total"), statistics.rx_bytes as f64);
    snapshot.insert(metric("record-send-total"), statistics.txmsgs as f64);
    snapshot.insert(metric("record-send-bytes-total"), statistics.txmsg_bytes as f64);
    snapshot
}

fn owned_headers(headers: &[RecordHeader]) -> Option<OwnedHeaders> {
    if headers.is_empty() {
        return None;
    }

    let owned = headers
        .iter()
        .fold(OwnedHeaders::new_with_capacity(headers.len()), |acc, header| {
            acc.insert(Header {
                key: header.key.as_str(),
                value: header.value.as_deref(),
            })
        });
    Some(owned)
}

/// [`Producer`] backed by librdkafka's threaded producer.
///
/// Keys and values go through the configured serializers on the calling thread;
/// delivery reports arrive on the producer's polling thread.
pub struct RdKafkaProducer<K, V> {
    producer: ThreadedProducer<TemplateProducerContext>,
    key_serializer: Box<dyn Serializer<K>>,
    value_serializer: Box<dyn Serializer<V>>,
    statistics: Arc<RwLock<MetricsSnapshot>>,
    flush_timeout: Duration,
    metadata_timeout: Duration,
}

impl<K, V> RdKafkaProducer<K, V> {
    pub fn new<KS, VS>(
        config: &ClientConfig,
        key_serializer: KS,
        value_serializer: VS,
    ) -> Result<Self>
    where
        KS: Serializer<K> + 'static,
        VS: Serializer<V> + 'static,
    {
        let statistics = Arc::new(RwLock::new(MetricsSnapshot::new()));
        let context = TemplateProducerContext {
            statistics: Arc::clone(&statistics),
        };
        let producer: ThreadedProducer<TemplateProducerContext> =
            config.create_with_context(context)?;
        info!("Created Kafka producer");

        Ok(Self {
            producer,
            key_serializer: Box::new(key_serializer),
            value_serializer: Box::new(value_serializer),
            statistics,
            flush_timeout: Duration::from_secs(10),
            metadata_timeout: Duration::from_secs(5),
        })
    }

    pub fn from_settings<KS, VS>(
        settings: &ProducerSettings,
        key_serializer: KS,
        value_serializer: VS,
    ) -> Result<Self>
    where
        KS: Serializer<K> + 'static,
        VS: Serializer<V> + 'static,
    {
        let producer = Self::new(&settings.to_client_config(), key_serializer, value_serializer)?;
        Ok(producer
            .with_flush_timeout(settings.flush_timeout())
            .with_metadata_timeout(settings.metadata_timeout()))
    }

    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// The librdkafka producer, for operations the template does not cover.
    pub fn native(&self) -> &ThreadedProducer<TemplateProducerContext> {
        &self.producer
    }

    fn enqueue(&self, record: &ProducerRecord<K, V>, completer: DeliveryCompleter) {
        let payload = match self.value_serializer.serialize(&record.topic, &record.value) {
            Ok(payload) => payload,
            Err(e) => return completer.complete(Err(e)),
        };
        let key = match &record.key {
            Some(key) => match self.key_serializer.serialize(&record.topic, key) {
                Ok(key) => Some(key),
                Err(e) => return completer.complete(Err(e)),
            },
            None => None,
        };

        let mut base = BaseRecord::with_opaque_to(&record.topic, Box::new(completer))
            .payload(payload.as_slice());
        if let Some(partition) = record.partition {
            base = base.partition(partition);
        }
        if let Some(timestamp) = record.timestamp {
            base = base.timestamp(timestamp);
        }
        if let Some(headers) = owned_headers(&record.headers) {
            base = base.headers(headers);
        }

        let enqueued = match key.as_deref() {
            Some(key) => self
                .producer
                .send(base.key(key))
                .map_err(|(e, rejected)| (e, rejected.delivery_opaque)),
            None => self
                .producer
                .send(base)
                .map_err(|(e, rejected)| (e, rejected.delivery_opaque)),
        };

        if let Err((e, completer)) = enqueued {
            warn!("Failed to enqueue record for topic '{}': {}", record.topic, e);
            completer.complete(Err(KafkaTemplateError::Kafka(e)));
        }
    }
}

impl<K, V> Producer<K, V> for RdKafkaProducer<K, V> {
    fn send(&self, record: &ProducerRecord<K, V>, completer: DeliveryCompleter) {
        self.enqueue(record, completer);
    }

    fn partitions_for(&self, topic: &str) -> Result<Vec<PartitionInfo>> {
        let metadata = self
            .producer
            .client()
            .fetch_metadata(Some(topic), self.metadata_timeout)?;

        let entry = metadata
            .topics()
            .iter()
            .find(|entry| entry.name() == topic)
            .ok_or_else(|| KafkaTemplateError::UnknownTopic(topic.to_string()))?;

        if let Some(err) = entry.error() {
            let code = RDKafkaErrorCode::from(err);
            return Err(match code {
                RDKafkaErrorCode::UnknownTopicOrPartition | RDKafkaErrorCode::UnknownTopic => {
                    KafkaTemplateError::UnknownTopic(topic.to_string())
                }
                _ => KafkaTemplateError::Kafka(KafkaError::MetadataFetch(code)),
            });
        }
        if entry.partitions().is_empty() {
            return Err(KafkaTemplateError::UnknownTopic(topic.to_string()));
        }

        Ok(entry
            .partitions()
            .iter()
            .map(|partition| PartitionInfo {
                topic: topic.to_string(),
                partition: partition.id(),
                leader: partition.leader(),
                replicas: partition.replicas().to_vec(),
                in_sync_replicas: partition.isr().to_vec(),
            })
            .collect())
    }

    /// Latest librdkafka statistics plus the live in-flight count. Statistics
    /// arrive only while `statistics.interval.ms` is non-zero.
    fn metrics(&self) -> Result<MetricsSnapshot> {
        let mut snapshot = self
            .statistics
            .read()
            .map_err(|_| KafkaTemplateError::Producer("statistics lock poisoned".to_string()))?
            .clone();
        snapshot.insert(
            MetricName::new("in-flight-count", PRODUCER_METRICS_GROUP),
            self.producer.in_flight_count() as f64,
        );
        Ok(snapshot)
    }

    fn flush(&self) -> Result<()> {
        self.producer.flush(self.flush_timeout)?;
        Ok(())
    }
}
