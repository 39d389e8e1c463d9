//! The service core: subscription registry, dispatch engine, and publisher.
//!
//! A [`Service`] owns one broker connection and one topic-to-handler
//! registry. Inbound messages are drained by a single dispatch task, so
//! handlers run one at a time in broker delivery order; a handler that
//! blocks stalls further delivery on this connection. Handler failures are
//! contained at the dispatch boundary and published as `Warning` log
//! packets, keeping the delivery stream live.

use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::link::{BrokerLink, DeliveryGuarantee, InboundMessage, MqttLink};
use crate::packet::Packet;
use crate::packets::{LogLevel, LogPacket};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Future returned by a packet handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A registered topic handler: side-effecting function over the raw message text
type PacketHandler = Box<dyn Fn(String) -> HandlerFuture + Send + Sync>;

type HandlerMap = Arc<RwLock<HashMap<String, PacketHandler>>>;

/// Counters describing a service's message traffic
#[derive(Debug, Clone, Default)]
pub struct ServiceStats {
    /// Inbound messages routed to a handler
    pub messages_dispatched: u64,
    /// Packets published, including log packets
    pub messages_published: u64,
    /// Handler invocations that returned an error
    pub handler_failures: u64,
    /// Inbound messages dropped for lack of a registered handler
    pub messages_dropped: u64,
}

/// Cloneable publishing handle.
///
/// Handlers capture clones of this to emit packets from inside dispatch.
#[derive(Clone)]
pub struct Publisher {
    link: Arc<dyn BrokerLink>,
    stats: Arc<Mutex<ServiceStats>>,
}

impl Publisher {
    /// Publish a typed packet to its fixed topic, not retained.
    pub async fn publish<P: Packet>(&self, packet: &P) -> Result<()> {
        self.publish_retained(packet, false).await
    }

    /// Publish a typed packet to its fixed topic.
    ///
    /// All publishes go out with an exactly-once delivery guarantee.
    pub async fn publish_retained<P: Packet>(&self, packet: &P, retain: bool) -> Result<()> {
        let payload = packet.encode()?;
        self.link
            .publish_raw(
                P::TOPIC,
                payload.into_bytes(),
                DeliveryGuarantee::ExactlyOnce,
                retain,
            )
            .await?;
        self.stats.lock().await.messages_published += 1;
        Ok(())
    }

    /// Publish a structured log record to the `LOG` topic.
    ///
    /// This is the system's only runtime error-reporting channel; all
    /// diagnostics after startup are bus messages, observable by any
    /// subscriber to `LOG`.
    pub async fn log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        stack_trace: impl Into<String>,
    ) -> Result<()> {
        self.publish(&LogPacket::new(level, message, stack_trace)).await
    }
}

/// A long-lived service communicating exclusively over the message bus.
///
/// Created once at process start; holds the broker connection, the handler
/// registry, and a configuration snapshot until [`Service::shutdown`]
/// releases the connection.
pub struct Service {
    name: String,
    config: Config,
    link: Arc<dyn BrokerLink>,
    publisher: Publisher,
    handlers: HandlerMap,
    stats: Arc<Mutex<ServiceStats>>,
    shutdown_tx: broadcast::Sender<()>,
    dispatch_task: Option<JoinHandle<()>>,
}

impl Service {
    /// Connect to the configured broker, using `name` as the client
    /// identifier, and start the dispatch loop.
    ///
    /// A connection failure is fatal: construction aborts and no service
    /// exists.
    pub async fn connect(name: &str, config: &Config) -> Result<Self> {
        let (link, inbound) = MqttLink::connect(&config.broker, name).await?;
        Ok(Self::with_link(name, config.clone(), Arc::new(link), inbound))
    }

    /// Build a service over an already-established broker link.
    ///
    /// `inbound` is the stream of raw messages the link delivers; the
    /// dispatch loop drains it until shutdown or until the stream ends.
    pub fn with_link(
        name: &str,
        config: Config,
        link: Arc<dyn BrokerLink>,
        inbound: mpsc::Receiver<InboundMessage>,
    ) -> Self {
        let handlers: HandlerMap = Arc::new(RwLock::new(HashMap::new()));
        let stats = Arc::new(Mutex::new(ServiceStats::default()));
        let publisher = Publisher {
            link: Arc::clone(&link),
            stats: Arc::clone(&stats),
        };
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let dispatch_task = tokio::spawn(Self::dispatch_loop(
            inbound,
            shutdown_rx,
            Arc::clone(&handlers),
            publisher.clone(),
            Arc::clone(&stats),
        ));

        Self {
            name: name.to_owned(),
            config,
            link,
            publisher,
            handlers,
            stats,
            shutdown_tx,
            dispatch_task: Some(dispatch_task),
        }
    }

    /// Logical name of the service, also its broker client identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration snapshot the service was constructed with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A publishing handle for this service's connection.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Snapshot of the service's traffic counters.
    pub async fn stats(&self) -> ServiceStats {
        self.stats.lock().await.clone()
    }

    /// Register a handler for a topic and subscribe to it at the broker.
    ///
    /// Returns `Ok(true)` when the topic was newly registered. If the topic
    /// already has a handler the call is a no-op returning `Ok(false)`: the
    /// existing handler is retained, the broker is not subscribed again,
    /// and callers must not rely on override semantics. A broker subscribe
    /// failure leaves the registry unchanged and surfaces to the caller.
    ///
    /// Registration is expected to complete during startup, before
    /// steady-state message flow begins; once registered, a topic stays
    /// registered for the service's lifetime.
    pub async fn register<F, Fut>(&self, topic: impl Into<String>, handler: F) -> Result<bool>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let topic = topic.into();
        let mut guard = self.handlers.write().await;
        if guard.contains_key(&topic) {
            debug!(topic = %topic, "topic already registered, keeping existing handler");
            return Ok(false);
        }

        // Subscribe first: an entry is only recorded once the broker
        // accepted the subscription. The write guard is held across the
        // call so a topic can never be subscribed twice.
        self.link
            .subscribe_raw(&topic, DeliveryGuarantee::ExactlyOnce)
            .await?;
        guard.insert(topic, Box::new(move |raw| Box::pin(handler(raw))));
        Ok(true)
    }

    /// Stop the dispatch loop and release the broker connection.
    ///
    /// Called exactly once at teardown; an in-flight handler finishes
    /// before the loop stops.
    pub async fn shutdown(mut self) -> Result<()> {
        debug!(service = %self.name, "shutting down");
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.dispatch_task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(service = %self.name, "dispatch task panicked before shutdown");
                }
            }
        }
        self.link.disconnect().await
    }

    async fn dispatch_loop(
        mut inbound: mpsc::Receiver<InboundMessage>,
        mut shutdown_rx: broadcast::Receiver<()>,
        handlers: HandlerMap,
        publisher: Publisher,
        stats: Arc<Mutex<ServiceStats>>,
    ) {
        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => {
                        Self::dispatch(&handlers, &publisher, &stats, message).await;
                    }
                    None => {
                        debug!("inbound stream ended, dispatch loop stopping");
                        break;
                    }
                },
                _ = shutdown_rx.recv() => {
                    debug!("dispatch loop stopping");
                    break;
                }
            }
        }
    }

    /// Route one inbound message to its registered handler.
    ///
    /// Messages on unregistered topics are dropped without any LOG traffic;
    /// a stray retained message may legitimately arrive before the topic's
    /// handler is registered. Handler failures become exactly one `Warning`
    /// log publication and never propagate out of dispatch.
    async fn dispatch(
        handlers: &HandlerMap,
        publisher: &Publisher,
        stats: &Arc<Mutex<ServiceStats>>,
        message: InboundMessage,
    ) {
        let InboundMessage { topic, payload } = message;

        let invocation = {
            let guard = handlers.read().await;
            match guard.get(&topic) {
                None => None,
                Some(handler) => Some(match String::from_utf8(payload) {
                    Ok(text) => Ok(handler(text)),
                    Err(e) => Err(ServiceError::decode(format!(
                        "payload on '{topic}' is not valid UTF-8: {e}"
                    ))),
                }),
            }
            // Guard released before the handler future is awaited, so
            // handlers may register further topics.
        };

        let Some(invocation) = invocation else {
            trace!(topic = %topic, "no handler registered, message dropped");
            stats.lock().await.messages_dropped += 1;
            return;
        };

        stats.lock().await.messages_dispatched += 1;

        let outcome = match invocation {
            Ok(handler_future) => handler_future.await,
            Err(decode_error) => Err(decode_error.into()),
        };

        if let Err(error) = outcome {
            stats.lock().await.handler_failures += 1;
            warn!(topic = %topic, error = %error, "handler failed");
            if let Err(log_error) = publisher
                .log(LogLevel::Warning, error.to_string(), format!("{error:?}"))
                .await
            {
                warn!(error = %log_error, "failed to publish handler failure log");
            }
        }
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        // Backstop for paths that never reach shutdown().
        if let Some(task) = self.dispatch_task.take() {
            task.abort();
        }
    }
}

/// A concrete service implementation registered over the framework.
///
/// The bootstrap layer constructs the implementation directly, connects a
/// [`Service`] under its name, and calls [`BusService::setup`] to let it
/// register its topic handlers.
#[async_trait]
pub trait BusService: Send + Sync {
    /// Logical name, used as the broker client identifier
    fn name(&self) -> &'static str;

    /// Register topic handlers and perform startup work
    async fn setup(&self, service: &Service) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullLink;

    #[async_trait]
    impl BrokerLink for NullLink {
        async fn publish_raw(
            &self,
            _topic: &str,
            _payload: Vec<u8>,
            _guarantee: DeliveryGuarantee,
            _retain: bool,
        ) -> Result<()> {
            Ok(())
        }

        async fn subscribe_raw(&self, _topic: &str, _guarantee: DeliveryGuarantee) -> Result<()> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }
    }

    fn null_service() -> (Service, mpsc::Sender<InboundMessage>) {
        let (tx, rx) = mpsc::channel(8);
        let service = Service::with_link("test-service", Config::default(), Arc::new(NullLink), rx);
        (service, tx)
    }

    #[tokio::test]
    async fn test_register_reports_insertion() {
        let (service, _tx) = null_service();

        let inserted = service
            .register("PING", |_| async { anyhow::Ok(()) })
            .await
            .unwrap();
        assert!(inserted);

        let inserted = service
            .register("PING", |_| async { anyhow::Ok(()) })
            .await
            .unwrap();
        assert!(!inserted);
    }

    #[tokio::test]
    async fn test_fresh_service_has_zeroed_stats() {
        let (service, _tx) = null_service();
        let stats = service.stats().await;
        assert_eq!(stats.messages_dispatched, 0);
        assert_eq!(stats.messages_published, 0);
        assert_eq!(stats.handler_failures, 0);
        assert_eq!(stats.messages_dropped, 0);
    }

    #[tokio::test]
    async fn test_shutdown_completes() {
        let (service, tx) = null_service();
        service.shutdown().await.unwrap();
        // The dispatch loop is gone; the link-side sender observes closure.
        assert!(tx.is_closed());
    }
}
