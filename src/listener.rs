use crate::{KafkaTemplateError, RecordMetadata};
use tracing::{debug, error};

/// Observes the outcome of every record a template sends.
///
/// Callbacks run on the thread that resolves the delivery, usually the
/// client's I/O thread, so they should return quickly.
pub trait ProducerListener: Send + Sync {
    fn on_success(&self, _metadata: &RecordMetadata) {}

    fn on_error(&self, _topic: &str, _partition: Option<i32>, _error: &KafkaTemplateError) {}
}

/// Logs failed sends, and successful ones at debug level when enabled.
#[derive(Debug, Clone, Default)]
pub struct LoggingProducerListener {
    include_successes: bool,
}

impl LoggingProducerListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_successes(mut self) -> Self {
        self.include_successes = true;
        self
    }
}

impl ProducerListener for LoggingProducerListener {
    fn on_success(&self, metadata: &RecordMetadata) {
        if self.include_successes {
            debug!(
                "Record sent to {}-{}@{}",
                metadata.topic, metadata.partition, metadata.offset
            );
        }
    }

    fn on_error(&self, topic: &str, partition: Option<i32>, error: &KafkaTemplateError) {
        match partition {
            Some(partition) => error!("Failed to send record to {}-{}: {}", topic, partition, error),
            None => error!("Failed to send record to {}: {}", topic, error),
        }
    }
}
