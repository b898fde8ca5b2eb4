use crate::{DeliveryCompleter, MetricsSnapshot, PartitionInfo, ProducerRecord, Result};

/// The broker client a template delegates to.
///
/// Implementations own batching, retries and the network; they must be safe to
/// share across threads because a template hands the same client to every caller.
pub trait Producer<K, V>: Send + Sync {
    /// Enqueue `record`. The outcome, including failures that happen before the
    /// record leaves the process, is reported through `completer`.
    fn send(&self, record: &ProducerRecord<K, V>, completer: DeliveryCompleter);

    fn partitions_for(&self, topic: &str) -> Result<Vec<PartitionInfo>>;

    fn metrics(&self) -> Result<MetricsSnapshot>;

    /// Block until every record enqueued before the call has been resolved.
    fn flush(&self) -> Result<()>;
}
