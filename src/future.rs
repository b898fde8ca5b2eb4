//! Result handles for sends.
//!
//! A [`DeliveryCompleter`] travels with the record into the client and is
//! consumed when the client learns the outcome; the paired [`DeliveryFuture`]
//! resolves exactly once with that outcome. [`SendFuture`] is the facade-level
//! handle which hands the original record back alongside the broker metadata.

use crate::{KafkaTemplateError, ProducerRecord, RecordMetadata, Result, SendResult};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

type CompletionHook = Box<dyn FnOnce(&Result<RecordMetadata>) + Send + Sync + 'static>;

/// Create a linked completer/future pair.
pub fn delivery_channel() -> (DeliveryCompleter, DeliveryFuture) {
    let (tx, rx) = oneshot::channel();
    (
        DeliveryCompleter {
            tx: Some(tx),
            hooks: Vec::new(),
        },
        DeliveryFuture {
            state: DeliveryState::Pending(rx),
        },
    )
}

/// Write side of a delivery outcome. Dropping it without calling
/// [`complete`](Self::complete) resolves the future with
/// [`KafkaTemplateError::DeliveryCanceled`].
pub struct DeliveryCompleter {
    tx: Option<oneshot::Sender<Result<RecordMetadata>>>,
    hooks: Vec<CompletionHook>,
}

impl DeliveryCompleter {
    /// Run `hook` on the completing thread just before the future resolves.
    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&Result<RecordMetadata>) + Send + Sync + 'static,
    {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn complete(mut self, result: Result<RecordMetadata>) {
        self.resolve(result);
    }

    fn resolve(&mut self, result: Result<RecordMetadata>) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        for hook in self.hooks.drain(..) {
            hook(&result);
        }
        // The caller may have dropped its handle; the outcome is then unobserved.
        let _ = tx.send(result);
    }
}

impl Drop for DeliveryCompleter {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.resolve(Err(KafkaTemplateError::DeliveryCanceled));
        }
    }
}

impl std::fmt::Debug for DeliveryCompleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryCompleter")
            .field("completed", &self.tx.is_none())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[derive(Debug)]
enum DeliveryState {
    Pending(oneshot::Receiver<Result<RecordMetadata>>),
    Resolved(Option<Result<RecordMetadata>>),
}

/// Read side of a delivery outcome.
#[derive(Debug)]
pub struct DeliveryFuture {
    state: DeliveryState,
}

impl DeliveryFuture {
    /// A future that is already resolved.
    pub fn resolved(result: Result<RecordMetadata>) -> Self {
        Self {
            state: DeliveryState::Resolved(Some(result)),
        }
    }

    /// Whether the outcome is known. Never blocks; a ready outcome is kept
    /// until the future is awaited.
    pub fn is_done(&mut self) -> bool {
        if let DeliveryState::Pending(rx) = &mut self.state {
            let result = match rx.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Closed) => Err(KafkaTemplateError::DeliveryCanceled),
            };
            self.state = DeliveryState::Resolved(Some(result));
        }
        true
    }
}

impl Future for DeliveryFuture {
    type Output = Result<RecordMetadata>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            DeliveryState::Pending(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(result)) => {
                    this.state = DeliveryState::Resolved(None);
                    Poll::Ready(result)
                }
                Poll::Ready(Err(_)) => {
                    this.state = DeliveryState::Resolved(None);
                    Poll::Ready(Err(KafkaTemplateError::DeliveryCanceled))
                }
                Poll::Pending => Poll::Pending,
            },
            DeliveryState::Resolved(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(KafkaTemplateError::Producer(
                    "delivery future polled after completion".to_string(),
                ))
            })),
        }
    }
}

/// Handle returned by every send operation of the facade.
///
/// Resolves to the [`SendResult`] once the broker acknowledges the record, or
/// to the error the client reported.
#[derive(Debug)]
pub struct SendFuture<K, V> {
    record: Option<ProducerRecord<K, V>>,
    delivery: DeliveryFuture,
}

impl<K, V> SendFuture<K, V> {
    pub fn new(record: ProducerRecord<K, V>, delivery: DeliveryFuture) -> Self {
        Self {
            record: Some(record),
            delivery,
        }
    }

    /// A handle that has already failed, for sends rejected before reaching
    /// the client.
    pub fn failed(error: KafkaTemplateError) -> Self {
        Self {
            record: None,
            delivery: DeliveryFuture::resolved(Err(error)),
        }
    }

    pub fn record(&self) -> Option<&ProducerRecord<K, V>> {
        self.record.as_ref()
    }

    pub fn is_done(&mut self) -> bool {
        self.delivery.is_done()
    }
}

// The record is never pinned structurally; only the delivery future is polled.
impl<K, V> Unpin for SendFuture<K, V> {}

impl<K, V> Future for SendFuture<K, V> {
    type Output = Result<SendResult<K, V>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let metadata = match Pin::new(&mut self.delivery).poll(cx) {
            Poll::Ready(Ok(metadata)) => metadata,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Pending => return Poll::Pending,
        };

        match self.record.take() {
            Some(producer_record) => Poll::Ready(Ok(SendResult {
                producer_record,
                record_metadata: metadata,
            })),
            None => Poll::Ready(Err(KafkaTemplateError::Producer(
                "send future resolved without a record".to_string(),
            ))),
        }
    }
}
