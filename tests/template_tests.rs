use kafka_template::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type MockTemplate = KafkaTemplate<String, String, MockProducer<String, String>>;

fn template(auto_complete: bool) -> MockTemplate {
    KafkaTemplate::new(MockProducer::new(auto_complete).with_topic("orders", 3))
        .with_default_topic("defaults")
}

fn last_record(template: &MockTemplate) -> ProducerRecord<String, String> {
    template.producer().history().pop().unwrap()
}

#[tokio::test]
async fn test_send_default_uses_configured_topic() {
    let template = template(true);

    template.send_default("v1".to_string()).await.unwrap();
    let record = last_record(&template);
    assert_eq!(record.topic, "defaults");
    assert_eq!(record.partition, None);
    assert_eq!(record.key, None);
    assert_eq!(record.value, "v1");

    template.send_default_with_key("k2".to_string(), "v2".to_string()).await.unwrap();
    let record = last_record(&template);
    assert_eq!(record.topic, "defaults");
    assert_eq!(record.partition, None);
    assert_eq!(record.key.as_deref(), Some("k2"));
    assert_eq!(record.value, "v2");

    let result = template
        .send_default_to_partition(42, "k3".to_string(), "v3".to_string())
        .await
        .unwrap();
    let record = last_record(&template);
    assert_eq!(record.topic, "defaults");
    assert_eq!(record.partition, Some(42));
    assert_eq!(record.key.as_deref(), Some("k3"));
    assert_eq!(record.value, "v3");
    assert_eq!(result.record_metadata.partition, 42);
    assert_eq!(result.producer_record, record);
}

#[tokio::test]
async fn test_send_overloads_route_exactly() {
    let template = template(true);

    template.send("t", "v".to_string()).await.unwrap();
    let record = last_record(&template);
    assert_eq!((record.topic.as_str(), record.partition, record.key), ("t", None, None));

    template.send_with_key("t", "k".to_string(), "v".to_string()).await.unwrap();
    let record = last_record(&template);
    assert_eq!(record.topic, "t");
    assert_eq!(record.partition, None);
    assert_eq!(record.key.as_deref(), Some("k"));

    template.send_to_partition("t", 2, "v".to_string()).await.unwrap();
    let record = last_record(&template);
    assert_eq!(record.partition, Some(2));
    assert_eq!(record.key, None);

    template
        .send_to_partition_with_key("t", 1, "k".to_string(), "v".to_string())
        .await
        .unwrap();
    let record = last_record(&template);
    assert_eq!(record.partition, Some(1));
    assert_eq!(record.key.as_deref(), Some("k"));
    assert_eq!(record.value, "v");

    assert_eq!(template.producer().history().len(), 4);
}

#[tokio::test]
async fn test_send_default_without_topic_fails_through_handle() {
    let template: MockTemplate = KafkaTemplate::new(MockProducer::new(true));

    let mut handle = template.send_default("v".to_string());
    assert!(handle.is_done());
    assert!(matches!(handle.await, Err(KafkaTemplateError::NoDefaultTopic)));
    assert!(template.producer().history().is_empty());
}

#[tokio::test]
async fn test_offsets_increase_per_partition() {
    let template = template(true);

    let first = template.send_to_partition("orders", 0, "a".to_string()).await.unwrap();
    let second = template.send_to_partition("orders", 0, "b".to_string()).await.unwrap();
    let other = template.send_to_partition("orders", 1, "c".to_string()).await.unwrap();

    assert_eq!(first.record_metadata.offset, 0);
    assert_eq!(second.record_metadata.offset, 1);
    assert_eq!(other.record_metadata.offset, 0);
}

#[tokio::test]
async fn test_flush_resolves_every_pending_send() {
    let template = template(false);

    let mut handles = vec![
        template.send("orders", "a".to_string()),
        template.send("orders", "b".to_string()),
        template.send("orders", "c".to_string()),
    ];
    assert!(handles.iter_mut().all(|handle| !handle.is_done()));
    assert_eq!(template.producer().pending_count(), 3);

    template.flush().unwrap();

    assert!(handles.iter_mut().all(|handle| handle.is_done()));
    assert_eq!(template.producer().pending_count(), 0);
    for (expected_offset, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap();
        assert_eq!(result.record_metadata.offset, expected_offset as i64);
    }
}

#[tokio::test]
async fn test_delivery_failure_surfaces_through_handle() {
    let template = template(false);

    let handle = template.send("orders", "a".to_string());
    assert!(template
        .producer()
        .error_next(KafkaTemplateError::Producer("leader not available".to_string())));

    match handle.await {
        Err(KafkaTemplateError::Producer(reason)) => assert_eq!(reason, "leader not available"),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_pending_send_completes_in_order() {
    let template = template(false);

    let mut first = template.send("orders", "a".to_string());
    let mut second = template.send("orders", "b".to_string());

    assert!(template.producer().complete_next());
    assert!(first.is_done());
    assert!(!second.is_done());

    assert!(template.producer().complete_next());
    assert!(second.is_done());
    assert!(!template.producer().complete_next());

    assert_eq!(first.await.unwrap().producer_record.value, "a");
    assert_eq!(second.await.unwrap().producer_record.value, "b");
}

#[tokio::test]
async fn test_auto_flush_resolves_before_send_returns() {
    let template = template(false).with_auto_flush(true);

    let mut handle = template.send("orders", "a".to_string());
    assert!(handle.is_done());
    assert_eq!(template.producer().flush_count(), 1);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_partitions_for_known_and_unknown_topics() {
    let template = template(true);

    let partitions = template.partitions_for("orders").unwrap();
    assert_eq!(partitions.len(), 3);
    assert_eq!(partitions[2].partition, 2);
    assert_eq!(partitions[0].topic, "orders");

    match template.partitions_for("missing-topic") {
        Err(KafkaTemplateError::UnknownTopic(topic)) => assert_eq!(topic, "missing-topic"),
        other => panic!("expected unknown topic, got {:?}", other),
    }
}

#[tokio::test]
async fn test_execute_returns_callback_result_unchanged() {
    let template = template(true);

    let partitions: Result<usize> = template.execute(|producer| {
        Ok(producer.partitions_for("orders")?.len())
    });
    assert_eq!(partitions.unwrap(), 3);

    let value: std::result::Result<&str, String> = template.execute(|_| Ok("unchanged"));
    assert_eq!(value, Ok("unchanged"));

    let failure: std::result::Result<(), String> = template.execute(|_| Err("boom".to_string()));
    assert_eq!(failure, Err("boom".to_string()));
}

#[tokio::test]
async fn test_metrics_are_idempotent_reads() {
    let template = template(true);
    template.send("orders", "a".to_string()).await.unwrap();

    let first = template.metrics().unwrap();
    let second = template.metrics().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.get(&MetricName::new("record-send-total", "producer-metrics")),
        Some(&1.0)
    );
}

#[derive(Clone, Default)]
struct RecordingListener {
    successes: Arc<AtomicUsize>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl ProducerListener for RecordingListener {
    fn on_success(&self, _metadata: &RecordMetadata) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, topic: &str, _partition: Option<i32>, _error: &KafkaTemplateError) {
        self.errors.lock().unwrap().push(topic.to_string());
    }
}

#[tokio::test]
async fn test_listener_sees_one_callback_per_record() {
    let listener = RecordingListener::default();
    let template = template(false).with_producer_listener(listener.clone());

    let first = template.send("orders", "a".to_string());
    let second = template.send("payments", "b".to_string());
    template.producer().complete_next();
    template
        .producer()
        .error_next(KafkaTemplateError::Producer("rejected".to_string()));

    assert!(first.await.is_ok());
    assert!(second.await.is_err());
    assert_eq!(listener.successes.load(Ordering::SeqCst), 1);
    assert_eq!(*listener.errors.lock().unwrap(), vec!["payments".to_string()]);
}

#[tokio::test]
async fn test_template_metrics_observe_outcomes() {
    let metrics = TemplateMetrics::new().unwrap();
    let template = template(false).with_metrics(metrics.clone());

    let ok = template.send("orders", "a".to_string());
    let failed = template.send("orders", "b".to_string());
    template.producer().complete_next();
    template
        .producer()
        .error_next(KafkaTemplateError::Producer("rejected".to_string()));
    ok.await.unwrap();
    failed.await.unwrap_err();
    template.flush().unwrap();

    assert_eq!(metrics.sends.get(), 2.0);
    assert_eq!(metrics.send_errors.get(), 1.0);
    assert_eq!(metrics.flushes.get(), 1.0);

    let exported = metrics.export().unwrap();
    assert!(exported.contains("kafka_template_sends_total 2"));
}

#[tokio::test]
async fn test_clones_share_the_producer() {
    let template = template(true);
    let clone = template.clone();

    clone.send("orders", "from clone".to_string()).await.unwrap();
    assert_eq!(template.producer().history().len(), 1);
    assert!(Arc::ptr_eq(template.producer(), clone.producer()));
}

#[tokio::test]
async fn test_concurrent_sends_from_many_tasks() {
    let template = template(true);

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let template = template.clone();
            tokio::spawn(async move {
                template
                    .send_to_partition("orders", 0, format!("v{}", i))
                    .await
            })
        })
        .collect();

    let mut offsets = Vec::new();
    for task in tasks {
        offsets.push(task.await.unwrap().unwrap().record_metadata.offset);
    }
    offsets.sort_unstable();
    assert_eq!(offsets, (0..8).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_dropped_completer_cancels_handle() {
    let (completer, delivery) = delivery_channel();
    drop(completer);
    assert!(matches!(delivery.await, Err(KafkaTemplateError::DeliveryCanceled)));
}

#[tokio::test]
async fn test_shutdown_flushes_registered_template() {
    let template = template(false);
    let pending = template.send("orders", "a".to_string());

    let coordinator = ShutdownCoordinator::default();
    coordinator
        .register_component(Box::new(TemplateShutdown::new("orders-template", template.clone())))
        .await;
    coordinator.shutdown().await.unwrap();

    assert_eq!(template.producer().flush_count(), 1);
    assert!(pending.await.is_ok());
}

struct StalledComponent;

#[async_trait::async_trait]
impl ShutdownComponent for StalledComponent {
    async fn shutdown(&self) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

#[tokio::test]
async fn test_shutdown_timeout_is_reported() {
    let coordinator = ShutdownCoordinator::new(Duration::from_millis(50));
    coordinator.register_component(Box::new(StalledComponent)).await;

    match coordinator.shutdown().await {
        Err(KafkaTemplateError::ShutdownTimeout(timeout)) => {
            assert_eq!(timeout, Duration::from_millis(50))
        }
        other => panic!("expected shutdown timeout, got {:?}", other),
    }
}

// Neither serde trait is implemented, so only a custom converter can build records.
#[derive(Debug, Clone, PartialEq)]
struct OrderId(u64);

struct OrderIdConverter;

impl RecordMessageConverter<OrderId, OrderId> for OrderIdConverter {
    fn to_record(
        &self,
        message: Message,
        default_topic: Option<&str>,
    ) -> Result<ProducerRecord<OrderId, OrderId>> {
        let id = message.payload().as_u64().ok_or_else(|| {
            KafkaTemplateError::InvalidArgument("payload must be a number".to_string())
        })?;
        let topic = default_topic.ok_or(KafkaTemplateError::NoDefaultTopic)?;
        Ok(ProducerRecord::new(topic, OrderId(id)).with_key(OrderId(id)))
    }
}

#[tokio::test]
async fn test_template_over_plain_types_with_custom_converter() {
    let producer = Arc::new(MockProducer::<OrderId, OrderId>::new(true));
    let template =
        KafkaTemplate::with_converter(producer, OrderIdConverter).with_default_topic("orders");

    let sent = template.send("orders", OrderId(3)).await.unwrap();
    assert_eq!(sent.producer_record.value, OrderId(3));

    let message = MessageBuilder::with_payload(&7u64).unwrap().build();
    let converted = template.send_message(message).await.unwrap();
    assert_eq!(converted.producer_record.key, Some(OrderId(7)));
    assert_eq!(converted.producer_record.topic, "orders");
}
