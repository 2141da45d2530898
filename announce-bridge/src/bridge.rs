//! Message bridge: inbound text topic -> synthesis -> outbound URL topic.
//!
//! The MQTT event loop and the synthesis work run on separate tasks. The
//! event loop forwards inbound payloads into a bounded queue consumed by a
//! single worker, so announcements are handled one at a time in receipt
//! order while the broker connection keeps being serviced.

use crate::identity::ServerIdentity;
use announce_common::config::Config;
use announce_common::error::{Error, Result};
use announce_common::shutdown::ShutdownListener;
use announce_speech::{Announcement, IdGenerator, Synthesizer, validate_text};
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, instrument, warn};

/// Requests buffered between the event loop and rumqttc's own network task.
const CLIENT_CHANNEL_CAPACITY: usize = 10;

/// Upper bound on flushing DISCONNECT during shutdown.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Sink for published artifact URLs.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `payload` to `topic`.
    async fn publish(&self, topic: &str, payload: String) -> Result<()>;
}

#[async_trait]
impl Publisher for AsyncClient {
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        AsyncClient::publish(self, topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| Error::broker(e.to_string()))
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Audio was generated and its URL published.
    Published(String),
    /// The payload was malformed and dropped without synthesis.
    Ignored(String),
    /// Synthesis or publishing failed; nothing was published.
    Failed(String),
}

/// Handles one payload at a time, independent of the transport.
pub struct AnnouncementHandler<P> {
    synthesizer: Synthesizer,
    identity: ServerIdentity,
    outbound_topic: String,
    ids: IdGenerator,
    publisher: P,
}

impl<P: Publisher> AnnouncementHandler<P> {
    pub fn new(
        synthesizer: Synthesizer,
        identity: ServerIdentity,
        outbound_topic: impl Into<String>,
        publisher: P,
    ) -> Self {
        Self {
            synthesizer,
            identity,
            outbound_topic: outbound_topic.into(),
            ids: IdGenerator::new(),
            publisher,
        }
    }

    /// The publisher, for inspection in tests.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Turn one raw payload into at most one published URL.
    pub async fn handle(&mut self, payload: &[u8]) -> Outcome {
        let text = match std::str::from_utf8(payload) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Ignoring payload that is not UTF-8");
                return Outcome::Ignored(format!("payload is not UTF-8: {}", e));
            }
        };

        info!(text = %text, "Announcement request");

        if let Err(e) = validate_text(text) {
            warn!("Empty text received, ignoring");
            return Outcome::Ignored(e.to_string());
        }

        let announcement = match Announcement::new(text, self.ids.next_id()) {
            Ok(announcement) => announcement,
            Err(e) => return Outcome::Ignored(e.to_string()),
        };

        let artifact = match self.synthesizer.synthesize(&announcement).await {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(id = %announcement.id(), error = %e, "Failed to generate audio");
                return Outcome::Failed(e.to_string());
            }
        };

        let url = self.identity.artifact_url(&artifact.file_name());
        match self.publisher.publish(&self.outbound_topic, url.clone()).await {
            Ok(()) => {
                info!(topic = %self.outbound_topic, url = %url, "Published audio URL");
                Outcome::Published(url)
            }
            Err(e) => {
                error!(url = %url, error = %e, "Failed to publish audio URL");
                Outcome::Failed(e.to_string())
            }
        }
    }
}

/// Broker connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
}

/// What the event loop should do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeAction {
    None,
    Subscribe,
    Deliver(Vec<u8>),
}

/// Connection state machine, driven by broker events.
#[derive(Debug)]
pub struct ConnectionTracker {
    state: ConnectionState,
    inbound_topic: String,
}

impl ConnectionTracker {
    pub fn new(inbound_topic: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            inbound_topic: inbound_topic.into(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// About to poll; a disconnected client reconnects on this poll.
    pub fn polling(&mut self) {
        if self.state == ConnectionState::Disconnected {
            self.state = ConnectionState::Connecting;
        }
    }

    /// The event loop reported an error. Refused connections arrive here,
    /// not as a `ConnAck` event.
    pub fn connection_lost(&mut self, error: &ConnectionError) {
        match error {
            ConnectionError::ConnectionRefused(code) => {
                warn!(code = ?code, "Broker refused connection");
            }
            other => warn!(error = %other, "MQTT connection error, reconnecting"),
        }
        self.state = ConnectionState::Disconnected;
    }

    pub fn on_event(&mut self, event: &Event) -> BridgeAction {
        match event {
            // rumqttc only emits accepted ConnAcks.
            Event::Incoming(Packet::ConnAck(_)) => {
                info!("Connected to MQTT broker");
                self.state = ConnectionState::Connected;
                BridgeAction::Subscribe
            }
            Event::Incoming(Packet::SubAck(ack)) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    warn!(topic = %self.inbound_topic, "Broker rejected subscription");
                } else {
                    info!(topic = %self.inbound_topic, "Subscribed");
                    self.state = ConnectionState::Subscribed;
                }
                BridgeAction::None
            }
            Event::Incoming(Packet::Publish(publish)) => {
                if publish.topic == self.inbound_topic {
                    BridgeAction::Deliver(publish.payload.to_vec())
                } else {
                    debug!(topic = %publish.topic, "Ignoring message on unexpected topic");
                    BridgeAction::None
                }
            }
            Event::Incoming(Packet::Disconnect) => {
                self.state = ConnectionState::Disconnected;
                BridgeAction::None
            }
            _ => BridgeAction::None,
        }
    }
}

/// MQTT side of the bridge.
pub struct MessageBridge {
    config: Config,
    synthesizer: Synthesizer,
    identity: ServerIdentity,
}

impl MessageBridge {
    pub fn new(config: Config, synthesizer: Synthesizer, identity: ServerIdentity) -> Self {
        Self {
            config,
            synthesizer,
            identity,
        }
    }

    /// Run until `shutdown` fires.
    ///
    /// # Errors
    /// Returns `Error::Broker` if the broker host cannot be resolved. Every
    /// later connection problem is retried.
    #[instrument(skip_all, fields(broker = %self.config.broker_addr()))]
    pub async fn run(self, mut shutdown: ShutdownListener) -> Result<()> {
        let Self {
            config,
            synthesizer,
            identity,
        } = self;

        resolve_broker(&config).await?;

        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);
        let (client, mut eventloop) = AsyncClient::new(options, CLIENT_CHANNEL_CAPACITY);

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let handler = AnnouncementHandler::new(
            synthesizer,
            identity,
            config.outbound_topic.clone(),
            client.clone(),
        );
        let worker = tokio::spawn(run_worker(handler, rx));

        let mut tracker = ConnectionTracker::new(config.inbound_topic.clone());

        loop {
            tracker.polling();
            let event = tokio::select! {
                _ = shutdown.wait() => break,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(event) => match tracker.on_event(&event) {
                    BridgeAction::Subscribe => {
                        if let Err(e) = client.try_subscribe(&config.inbound_topic, QoS::AtMostOnce)
                        {
                            warn!(error = %e, "Could not queue subscription");
                        }
                    }
                    BridgeAction::Deliver(payload) => {
                        if forward(&tx, payload) == Forwarded::WorkerGone {
                            break;
                        }
                    }
                    BridgeAction::None => {}
                },
                Err(e) => {
                    tracker.connection_lost(&e);
                    tokio::select! {
                        _ = shutdown.wait() => break,
                        _ = tokio::time::sleep(config.reconnect_delay) => {}
                    }
                }
            }
        }

        info!("Disconnecting from MQTT broker");
        disconnect(&client, &mut eventloop).await;

        drop(tx);
        worker.abort();
        let _ = worker.await;

        Ok(())
    }
}

/// Result of handing a payload to the worker queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forwarded {
    Queued,
    Dropped,
    WorkerGone,
}

/// Queue a payload without blocking the event loop. A full queue drops it.
fn forward(tx: &mpsc::Sender<Vec<u8>>, payload: Vec<u8>) -> Forwarded {
    match tx.try_send(payload) {
        Ok(()) => Forwarded::Queued,
        Err(TrySendError::Full(_)) => {
            warn!("Announcement queue full, dropping message");
            Forwarded::Dropped
        }
        Err(TrySendError::Closed(_)) => {
            error!("Announcement worker stopped");
            Forwarded::WorkerGone
        }
    }
}

/// Handles queued payloads one at a time, in queue order.
async fn run_worker<P: Publisher>(
    mut handler: AnnouncementHandler<P>,
    mut rx: mpsc::Receiver<Vec<u8>>,
) {
    while let Some(payload) = rx.recv().await {
        let outcome = handler.handle(&payload).await;
        debug!(?outcome, "Announcement handled");
    }
}

async fn resolve_broker(config: &Config) -> Result<()> {
    let addr = config.broker_addr();
    let mut resolved = tokio::net::lookup_host((config.broker_host.as_str(), config.broker_port))
        .await
        .map_err(|e| Error::broker(format!("cannot resolve {}: {}", addr, e)))?;

    match resolved.next() {
        Some(socket) => {
            debug!(%addr, resolved = %socket, "Resolved broker address");
            Ok(())
        }
        None => Err(Error::broker(format!("cannot resolve {}: no addresses", addr))),
    }
}

async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if let Err(e) = client.try_disconnect() {
        debug!(error = %e, "Could not queue DISCONNECT");
        return;
    }
    let flushed = tokio::time::timeout(DISCONNECT_GRACE, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if flushed.is_err() {
        debug!("DISCONNECT not flushed before grace period");
    }
}
