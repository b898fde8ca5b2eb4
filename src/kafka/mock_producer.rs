use crate::{
    DeliveryCompleter, KafkaTemplateError, MetricName, MetricsSnapshot, PartitionInfo, Producer,
    ProducerRecord, RecordMetadata, Result,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

const MOCK_METRICS_GROUP: &str = "producer-metrics";

struct PendingSend {
    topic: String,
    partition: i32,
    timestamp: Option<i64>,
    completer: DeliveryCompleter,
}

struct MockState<K, V> {
    history: Vec<ProducerRecord<K, V>>,
    pending: VecDeque<PendingSend>,
    offsets: HashMap<(String, i32), i64>,
    topics: HashMap<String, Vec<PartitionInfo>>,
    errored: u64,
    flushes: u64,
}

impl<K, V> MockState<K, V> {
    fn next_metadata(
        &mut self,
        topic: String,
        partition: i32,
        timestamp: Option<i64>,
    ) -> RecordMetadata {
        let offset = self.offsets.entry((topic.clone(), partition)).or_insert(0);
        let metadata = RecordMetadata {
            topic,
            partition,
            offset: *offset,
            timestamp: Some(timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp_millis())),
        };
        *offset += 1;
        metadata
    }
}

/// In-memory [`Producer`] that records every record it is given.
///
/// With `auto_complete` each send succeeds immediately. Otherwise sends stay
/// pending until [`complete_next`](Self::complete_next),
/// [`error_next`](Self::error_next) or [`flush`](Producer::flush) resolve them
/// in submission order.
pub struct MockProducer<K, V> {
    state: Mutex<MockState<K, V>>,
    auto_complete: bool,
}

impl<K, V> MockProducer<K, V> {
    pub fn new(auto_complete: bool) -> Self {
        Self {
            state: Mutex::new(MockState {
                history: Vec::new(),
                pending: VecDeque::new(),
                offsets: HashMap::new(),
                topics: HashMap::new(),
                errored: 0,
                flushes: 0,
            }),
            auto_complete,
        }
    }

    /// Register `topic` with `partitions` partitions led by broker 0.
    pub fn with_topic(self, topic: &str, partitions: i32) -> Self {
        let layout = (0..partitions)
            .map(|partition| PartitionInfo {
                topic: topic.to_string(),
                partition,
                leader: 0,
                replicas: vec![0],
                in_sync_replicas: vec![0],
            })
            .collect();
        self.lock().topics.insert(topic.to_string(), layout);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn flush_count(&self) -> u64 {
        self.lock().flushes
    }

    /// Resolve the oldest pending send successfully.
    pub fn complete_next(&self) -> bool {
        let resolved = {
            let mut state = self.lock();
            state.pending.pop_front().map(|pending| {
                let metadata = state.next_metadata(pending.topic, pending.partition, pending.timestamp);
                (pending.completer, metadata)
            })
        };

        match resolved {
            Some((completer, metadata)) => {
                completer.complete(Ok(metadata));
                true
            }
            None => false,
        }
    }

    /// Fail the oldest pending send with `error`.
    pub fn error_next(&self, error: KafkaTemplateError) -> bool {
        let pending = {
            let mut state = self.lock();
            let pending = state.pending.pop_front();
            if pending.is_some() {
                state.errored += 1;
            }
            pending
        };

        match pending {
            Some(pending) => {
                pending.completer.complete(Err(error));
                true
            }
            None => false,
        }
    }
}

impl<K: Clone, V: Clone> MockProducer<K, V> {
    /// Every record sent so far, in submission order.
    pub fn history(&self) -> Vec<ProducerRecord<K, V>> {
        self.lock().history.clone()
    }

    pub fn clear(&self) {
        self.lock().history.clear();
    }
}

impl<K, V> Default for MockProducer<K, V> {
    fn default() -> Self {
        Self::new(true)
    }
}

impl<K, V> Producer<K, V> for MockProducer<K, V>
where
    K: Clone + Send,
    V: Clone + Send,
{
    fn send(&self, record: &ProducerRecord<K, V>, completer: DeliveryCompleter) {
        let partition = record.partition.unwrap_or(0);
        let completed = {
            let mut state = self.lock();
            state.history.push(record.clone());
            if self.auto_complete {
                Some(state.next_metadata(record.topic.clone(), partition, record.timestamp))
            } else {
                state.pending.push_back(PendingSend {
                    topic: record.topic.clone(),
                    partition,
                    timestamp: record.timestamp,
                    completer,
                });
                return;
            }
        };

        if let Some(metadata) = completed {
            debug!("Mock producer completed record for {}-{}", metadata.topic, metadata.partition);
            completer.complete(Ok(metadata));
        }
    }

    fn partitions_for(&self, topic: &str) -> Result<Vec<PartitionInfo>> {
        self.lock()
            .topics
            .get(topic)
            .cloned()
            .ok_or_else(|| KafkaTemplateError::UnknownTopic(topic.to_string()))
    }

    fn metrics(&self) -> Result<MetricsSnapshot> {
        let state = self.lock();
        let mut snapshot = MetricsSnapshot::new();
        snapshot.insert(
            MetricName::new("record-send-total", MOCK_METRICS_GROUP),
            state.history.len() as f64,
        );
        snapshot.insert(
            MetricName::new("record-error-total", MOCK_METRICS_GROUP),
            state.errored as f64,
        );
        snapshot.insert(
            MetricName::new("in-flight-count", MOCK_METRICS_GROUP),
            state.pending.len() as f64,
        );
        snapshot.insert(
            MetricName::new("flush-total", MOCK_METRICS_GROUP),
            state.flushes as f64,
        );
        Ok(snapshot)
    }

    fn flush(&self) -> Result<()> {
        let resolved: Vec<_> = {
            let mut state = self.lock();
            state.flushes += 1;
            let pending: Vec<_> = state.pending.drain(..).collect();
            pending
                .into_iter()
                .map(|pending| {
                    let metadata = state.next_metadata(pending.topic, pending.partition, pending.timestamp);
                    (pending.completer, metadata)
                })
                .collect()
        };

        for (completer, metadata) in resolved {
            completer.complete(Ok(metadata));
        }
        Ok(())
    }
}
