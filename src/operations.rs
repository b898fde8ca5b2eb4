use crate::{
    KafkaTemplateError, Message, MetricsSnapshot, PartitionInfo, Producer, ProducerRecord, Result,
    SendFuture,
};

/// Operations for sending records and inspecting the producer behind them.
///
/// Every send returns a [`SendFuture`] straight away; failures of any kind,
/// including a missing default topic, surface through that handle rather than
/// as a synchronous error.
pub trait KafkaOperations<K, V> {
    type Producer: Producer<K, V>;

    /// Topic used by the `send_default*` family.
    fn default_topic(&self) -> Option<&str>;

    /// Send a fully built record. All other send operations end up here.
    fn send_record(&self, record: ProducerRecord<K, V>) -> SendFuture<K, V>;

    /// Send a message whose routing is carried in its headers.
    fn send_message(&self, message: Message) -> SendFuture<K, V>;

    fn send_default(&self, value: V) -> SendFuture<K, V> {
        match self.default_topic() {
            Some(topic) => self.send_record(ProducerRecord::new(topic, value)),
            None => SendFuture::failed(KafkaTemplateError::NoDefaultTopic),
        }
    }

    fn send_default_with_key(&self, key: K, value: V) -> SendFuture<K, V> {
        match self.default_topic() {
            Some(topic) => self.send_record(ProducerRecord::new(topic, value).with_key(key)),
            None => SendFuture::failed(KafkaTemplateError::NoDefaultTopic),
        }
    }

    fn send_default_to_partition(&self, partition: i32, key: K, value: V) -> SendFuture<K, V> {
        match self.default_topic() {
            Some(topic) => self.send_record(
                ProducerRecord::new(topic, value)
                    .with_partition(partition)
                    .with_key(key),
            ),
            None => SendFuture::failed(KafkaTemplateError::NoDefaultTopic),
        }
    }

    fn send(&self, topic: &str, value: V) -> SendFuture<K, V> {
        self.send_record(ProducerRecord::new(topic, value))
    }

    fn send_with_key(&self, topic: &str, key: K, value: V) -> SendFuture<K, V> {
        self.send_record(ProducerRecord::new(topic, value).with_key(key))
    }

    fn send_to_partition(&self, topic: &str, partition: i32, value: V) -> SendFuture<K, V> {
        self.send_record(ProducerRecord::new(topic, value).with_partition(partition))
    }

    fn send_to_partition_with_key(
        &self,
        topic: &str,
        partition: i32,
        key: K,
        value: V,
    ) -> SendFuture<K, V> {
        self.send_record(
            ProducerRecord::new(topic, value)
                .with_partition(partition)
                .with_key(key),
        )
    }

    /// Current partition layout of `topic`. Unknown topics are an error, never
    /// an empty list.
    fn partitions_for(&self, topic: &str) -> Result<Vec<PartitionInfo>>;

    fn metrics(&self) -> Result<MetricsSnapshot>;

    /// Run `callback` against the producer directly and hand back whatever it
    /// returns.
    fn execute<T, E, F>(&self, callback: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Self::Producer) -> std::result::Result<T, E>;

    /// Block until every record sent before this call has been resolved.
    fn flush(&self) -> Result<()>;
}
