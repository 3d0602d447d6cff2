//! Broker primitives: queues, topic exchanges, bindings, publish.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;

use crate::error::BrokerError;
use crate::message::Delivery;

/// Broker tuning knobs.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Maximum number of deliveries a single queue's consumer processes
    /// concurrently.
    pub worker_count: usize,
    /// Buffered capacity of each queue.
    pub queue_depth: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_depth: 256,
        }
    }
}

struct QueueState {
    sender: mpsc::Sender<Delivery>,
    /// Taken exactly once by `consume`; a queue has at most one consumer.
    receiver: Mutex<Option<mpsc::Receiver<Delivery>>>,
}

struct ExchangeState {
    bindings: Vec<Binding>,
}

struct Binding {
    pattern: String,
    queue: String,
}

struct BrokerInner {
    config: BrokerConfig,
    queues: RwLock<HashMap<String, Arc<QueueState>>>,
    exchanges: RwLock<HashMap<String, ExchangeState>>,
}

/// In-process message broker.
///
/// Cloning is cheap; all clones share the same queues and exchanges.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    /// Creates a broker with default configuration.
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    /// Creates a broker with the given configuration.
    pub fn with_config(config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                config,
                queues: RwLock::new(HashMap::new()),
                exchanges: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    /// Declares a queue. Idempotent: redeclaring an existing queue keeps the
    /// queue and its buffered messages.
    pub fn declare_queue(&self, name: &str) {
        let mut queues = self.inner.queues.write().unwrap();
        queues.entry(name.to_string()).or_insert_with(|| {
            let (sender, receiver) = mpsc::channel(self.inner.config.queue_depth);
            Arc::new(QueueState {
                sender,
                receiver: Mutex::new(Some(receiver)),
            })
        });
    }

    /// Declares a topic exchange. Idempotent.
    pub fn declare_exchange(&self, name: &str) {
        let mut exchanges = self.inner.exchanges.write().unwrap();
        exchanges
            .entry(name.to_string())
            .or_insert_with(|| ExchangeState {
                bindings: Vec::new(),
            });
    }

    /// Binds a queue to an exchange with a routing-key pattern. Declaring
    /// the same binding twice is a no-op.
    ///
    /// Patterns are `_`-separated tokens where `*` matches exactly one token
    /// and `#` matches the remainder (e.g. `Stock_*` matches
    /// `Stock_Warning`).
    pub fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), BrokerError> {
        if !self.inner.queues.read().unwrap().contains_key(queue) {
            return Err(BrokerError::UnknownQueue(queue.to_string()));
        }
        let mut exchanges = self.inner.exchanges.write().unwrap();
        let state = exchanges
            .get_mut(exchange)
            .ok_or_else(|| BrokerError::UnknownExchange(exchange.to_string()))?;
        // An identical binding declared twice stays a single binding.
        if !state
            .bindings
            .iter()
            .any(|b| b.pattern == pattern && b.queue == queue)
        {
            state.bindings.push(Binding {
                pattern: pattern.to_string(),
                queue: queue.to_string(),
            });
        }
        Ok(())
    }

    /// Publishes a payload.
    ///
    /// An empty exchange name routes directly to the queue named by the
    /// routing key. On a declared exchange, a message matching no binding is
    /// dropped with a warning, mirroring an unroutable topic publish.
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: impl Into<String>,
    ) -> Result<(), BrokerError> {
        let delivery = Delivery::new(routing_key, body);

        let targets: Vec<(String, mpsc::Sender<Delivery>)> = if exchange.is_empty() {
            let queues = self.inner.queues.read().unwrap();
            let queue = queues
                .get(routing_key)
                .ok_or_else(|| BrokerError::UnknownQueue(routing_key.to_string()))?;
            vec![(routing_key.to_string(), queue.sender.clone())]
        } else {
            let exchanges = self.inner.exchanges.read().unwrap();
            let state = exchanges
                .get(exchange)
                .ok_or_else(|| BrokerError::UnknownExchange(exchange.to_string()))?;
            let matched: Vec<String> = state
                .bindings
                .iter()
                .filter(|b| topic_matches(&b.pattern, routing_key))
                .map(|b| b.queue.clone())
                .collect();
            drop(exchanges);

            let queues = self.inner.queues.read().unwrap();
            matched
                .into_iter()
                .filter_map(|name| {
                    queues
                        .get(&name)
                        .map(|q| (name.clone(), q.sender.clone()))
                })
                .collect()
        };

        if targets.is_empty() {
            tracing::warn!(exchange, routing_key, "unroutable message dropped");
            metrics::counter!("broker_messages_dropped_total").increment(1);
            return Ok(());
        }

        for (queue, sender) in targets {
            sender
                .send(delivery.clone())
                .await
                .map_err(|_| BrokerError::PublishFailed(queue.clone()))?;
            metrics::counter!("broker_messages_published_total").increment(1);
        }
        Ok(())
    }

    /// Takes the receiving end of a queue, for callers that want to drive
    /// consumption themselves instead of registering a [`Consumer`].
    /// Fails if the queue is unknown or already has a consumer.
    ///
    /// [`Consumer`]: crate::Consumer
    pub fn take_receiver(
        &self,
        queue: &str,
    ) -> Result<mpsc::Receiver<Delivery>, BrokerError> {
        let queues = self.inner.queues.read().unwrap();
        let state = queues
            .get(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
        state
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BrokerError::ConsumerAlreadyRegistered(queue.to_string()))
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

/// Matches a `_`-separated routing key against a binding pattern.
fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    fn matches(pattern: &[&str], key: &[&str]) -> bool {
        match (pattern.first(), key.first()) {
            (None, None) => true,
            (Some(&"#"), _) => {
                pattern.len() == 1
                    || (0..=key.len()).any(|skip| matches(&pattern[1..], &key[skip..]))
            }
            (Some(&"*"), Some(_)) => matches(&pattern[1..], &key[1..]),
            (Some(p), Some(k)) if p == k => matches(&pattern[1..], &key[1..]),
            _ => false,
        }
    }

    let pattern: Vec<&str> = pattern.split('_').collect();
    let key: Vec<&str> = routing_key.split('_').collect();
    matches(&pattern, &key)
}
