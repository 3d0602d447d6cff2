//! Consumer registration and the bounded worker pool.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::broker::Broker;
use crate::error::BrokerError;
use crate::message::Delivery;

/// Handles deliveries from a single queue.
///
/// Handlers for different deliveries may run concurrently, bounded by the
/// broker's worker count. Errors are logged and the delivery is dropped;
/// the transport never retries (recovery is the services' concern).
#[async_trait]
pub trait Consumer: Send + Sync + 'static {
    /// Processes one delivery.
    async fn handle(&self, delivery: Delivery) -> Result<(), BrokerError>;
}

impl Broker {
    /// Registers the single consumer for a queue and starts its delivery
    /// loop. Returns the loop's task handle.
    pub fn consume(
        &self,
        queue: &str,
        consumer: Arc<dyn Consumer>,
    ) -> Result<JoinHandle<()>, BrokerError> {
        let mut receiver = self.take_receiver(queue)?;
        let queue = queue.to_string();
        let workers = Arc::new(Semaphore::new(self.config().worker_count));

        let handle = tokio::spawn(async move {
            tracing::debug!(%queue, "consumer started");
            while let Some(delivery) = receiver.recv().await {
                let permit = workers
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("worker semaphore closed");
                let consumer = Arc::clone(&consumer);
                let queue = queue.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = consumer.handle(delivery).await {
                        metrics::counter!("broker_handler_failures_total").increment(1);
                        tracing::warn!(%queue, error = %e, "handler failed, delivery dropped");
                    }
                });
            }
            tracing::debug!(%queue, "consumer stopped");
        });
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recorder {
        seen: Mutex<Vec<String>>,
        notify: tokio::sync::Notify,
    }

    #[async_trait]
    impl Consumer for Recorder {
        async fn handle(&self, delivery: Delivery) -> Result<(), BrokerError> {
            self.seen.lock().unwrap().push(delivery.body);
            self.notify.notify_one();
            Ok(())
        }
    }

    #[tokio::test]
    async fn consumer_receives_published_messages() {
        let broker = Broker::new();
        broker.declare_queue("orders");

        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            notify: tokio::sync::Notify::new(),
        });
        broker.consume("orders", recorder.clone()).unwrap();

        broker.publish("", "orders", "first").await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), recorder.notify.notified())
            .await
            .unwrap();

        assert_eq!(*recorder.seen.lock().unwrap(), vec!["first".to_string()]);
    }

    struct Failing {
        notify: tokio::sync::Notify,
    }

    #[async_trait]
    impl Consumer for Failing {
        async fn handle(&self, _delivery: Delivery) -> Result<(), BrokerError> {
            self.notify.notify_one();
            Err(BrokerError::Handler("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn handler_error_does_not_stop_the_loop() {
        let broker = Broker::new();
        broker.declare_queue("orders");

        let failing = Arc::new(Failing {
            notify: tokio::sync::Notify::new(),
        });
        broker.consume("orders", failing.clone()).unwrap();

        broker.publish("", "orders", "a").await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), failing.notify.notified())
            .await
            .unwrap();

        // A second delivery still goes through.
        broker.publish("", "orders", "b").await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), failing.notify.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn registering_two_consumers_fails() {
        let broker = Broker::new();
        broker.declare_queue("orders");

        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            notify: tokio::sync::Notify::new(),
        });
        broker.consume("orders", recorder.clone()).unwrap();
        assert!(matches!(
            broker.consume("orders", recorder),
            Err(BrokerError::ConsumerAlreadyRegistered(_))
        ));
    }
}
