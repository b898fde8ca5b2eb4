use crate::{
    delivery_channel, DeliveryCompleter, KafkaOperations, LoggingProducerListener, Message,
    MessagingMessageConverter, MetricsSnapshot, PartitionInfo, Producer, ProducerListener,
    ProducerRecord, ProducerSettings, RdKafkaProducer, RecordMessageConverter, Result, SendFuture,
    Serializer, TemplateMetrics,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// [`KafkaOperations`] over a shared [`Producer`].
///
/// Cloning is cheap: clones share the producer, converter, listener and
/// metrics.
pub struct KafkaTemplate<K, V, P = RdKafkaProducer<K, V>> {
    producer: Arc<P>,
    default_topic: Option<String>,
    converter: Arc<dyn RecordMessageConverter<K, V>>,
    listener: Option<Arc<dyn ProducerListener>>,
    metrics: Option<TemplateMetrics>,
    auto_flush: bool,
}

impl<K, V, P> KafkaTemplate<K, V, P>
where
    K: DeserializeOwned + 'static,
    V: DeserializeOwned + 'static,
    P: Producer<K, V>,
{
    /// A template that converts messages with [`MessagingMessageConverter`] and
    /// logs failed sends.
    pub fn new(producer: P) -> Self {
        Self::with_shared_producer(Arc::new(producer))
    }

    pub fn with_shared_producer(producer: Arc<P>) -> Self {
        Self::with_converter(producer, MessagingMessageConverter)
    }
}

impl<K, V, P> KafkaTemplate<K, V, P>
where
    P: Producer<K, V>,
{
    /// A template whose messages go through `converter`. Keys and values need
    /// no serde support here.
    pub fn with_converter<C>(producer: Arc<P>, converter: C) -> Self
    where
        C: RecordMessageConverter<K, V> + 'static,
    {
        Self {
            producer,
            default_topic: None,
            converter: Arc::new(converter),
            listener: Some(Arc::new(LoggingProducerListener::new())),
            metrics: None,
            auto_flush: false,
        }
    }
}

impl<K, V> KafkaTemplate<K, V, RdKafkaProducer<K, V>>
where
    K: DeserializeOwned + 'static,
    V: DeserializeOwned + 'static,
{
    /// Build an rdkafka-backed template, taking the default topic and flush
    /// behaviour from `settings`.
    pub fn from_settings<KS, VS>(
        settings: &ProducerSettings,
        key_serializer: KS,
        value_serializer: VS,
    ) -> Result<Self>
    where
        KS: Serializer<K> + 'static,
        VS: Serializer<V> + 'static,
    {
        let producer = RdKafkaProducer::from_settings(settings, key_serializer, value_serializer)?;
        let template = Self::new(producer).with_auto_flush(settings.auto_flush);
        Ok(match &settings.default_topic {
            Some(topic) => template.with_default_topic(topic.clone()),
            None => template,
        })
    }
}

impl<K, V, P> KafkaTemplate<K, V, P> {
    pub fn with_default_topic(mut self, topic: impl Into<String>) -> Self {
        self.default_topic = Some(topic.into());
        self
    }

    pub fn with_message_converter<C>(mut self, converter: C) -> Self
    where
        C: RecordMessageConverter<K, V> + 'static,
    {
        self.converter = Arc::new(converter);
        self
    }

    pub fn with_producer_listener<L>(mut self, listener: L) -> Self
    where
        L: ProducerListener + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn without_producer_listener(mut self) -> Self {
        self.listener = None;
        self
    }

    pub fn with_metrics(mut self, metrics: TemplateMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Flush after every send, so each handle is resolved by the time the
    /// send returns.
    pub fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }

    pub fn is_auto_flush(&self) -> bool {
        self.auto_flush
    }

    pub fn producer(&self) -> &Arc<P> {
        &self.producer
    }

    pub fn template_metrics(&self) -> Option<&TemplateMetrics> {
        self.metrics.as_ref()
    }

    fn observe(
        &self,
        completer: DeliveryCompleter,
        record: &ProducerRecord<K, V>,
    ) -> DeliveryCompleter {
        if self.listener.is_none() && self.metrics.is_none() {
            return completer;
        }

        let listener = self.listener.clone();
        let metrics = self.metrics.clone();
        let topic = record.topic.clone();
        let partition = record.partition;
        let started = Instant::now();

        completer.on_complete(move |result| {
            if let Some(metrics) = &metrics {
                metrics.record_send(started.elapsed(), result.is_ok());
            }
            if let Some(listener) = &listener {
                match result {
                    Ok(metadata) => listener.on_success(metadata),
                    Err(e) => listener.on_error(&topic, partition, e),
                }
            }
        })
    }
}

impl<K, V, P> Clone for KafkaTemplate<K, V, P> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
            default_topic: self.default_topic.clone(),
            converter: Arc::clone(&self.converter),
            listener: self.listener.clone(),
            metrics: self.metrics.clone(),
            auto_flush: self.auto_flush,
        }
    }
}

impl<K, V, P> KafkaOperations<K, V> for KafkaTemplate<K, V, P>
where
    P: Producer<K, V>,
{
    type Producer = P;

    fn default_topic(&self) -> Option<&str> {
        self.default_topic.as_deref()
    }

    fn send_record(&self, record: ProducerRecord<K, V>) -> SendFuture<K, V> {
        debug!(
            "Sending record to topic '{}' (partition: {:?}, keyed: {})",
            record.topic,
            record.partition,
            record.key.is_some()
        );

        let (completer, delivery) = delivery_channel();
        let completer = self.observe(completer, &record);
        self.producer.send(&record, completer);

        if self.auto_flush {
            if let Err(e) = self.producer.flush() {
                warn!("Auto flush after send to '{}' failed: {}", record.topic, e);
            }
        }

        SendFuture::new(record, delivery)
    }

    fn send_message(&self, message: Message) -> SendFuture<K, V> {
        match self.converter.to_record(message, self.default_topic.as_deref()) {
            Ok(record) => self.send_record(record),
            Err(e) => {
                warn!("Failed to convert message to a record: {}", e);
                SendFuture::failed(e)
            }
        }
    }

    fn partitions_for(&self, topic: &str) -> Result<Vec<PartitionInfo>> {
        self.producer.partitions_for(topic)
    }

    fn metrics(&self) -> Result<MetricsSnapshot> {
        self.producer.metrics()
    }

    fn execute<T, E, F>(&self, callback: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Self::Producer) -> std::result::Result<T, E>,
    {
        callback(self.producer.as_ref())
    }

    fn flush(&self) -> Result<()> {
        debug!("Flushing producer");
        if let Some(metrics) = &self.metrics {
            metrics.record_flush();
        }
        self.producer.flush()
    }
}
