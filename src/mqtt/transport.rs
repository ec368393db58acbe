use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet, QoS};
use secrecy::ExposeSecret;
use std::collections::VecDeque;
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::MqttConfig;
use super::message_manager::{InboundMessage, TransportEvent};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport unavailable, not connected to the device (topic {0})")]
    TransportUnavailable(String),

    #[error("MQTT client error: {0}")]
    Client(#[from] ClientError),
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
    Reconnecting,
}

/// Publish/subscribe side of a device connection. Inbound traffic arrives
/// separately as [`TransportEvent`]s.
pub trait MqttTransport: Send + Sync {
    fn subscribe(&self, topics: &[String]) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// `rumqttc` connection to one device. Cloning shares the connection.
#[derive(Clone)]
pub struct RumqttTransport {
    client: AsyncClient,
    state: watch::Receiver<ConnectionState>,
}

impl RumqttTransport {
    /// Starts the event loop task. Events go to `events` until `shutdown` is
    /// cancelled or the receiver is dropped.
    pub fn connect(
        config: &MqttConfig,
        events: mpsc::Sender<TransportEvent>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options
            .set_credentials(
                config.username.clone(),
                config.password.expose_secret().to_string(),
            )
            .set_keep_alive(config.keep_alive);

        let (client, eventloop) = AsyncClient::new(options, config.channel_capacity);
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);

        info!(
            "Connecting to device broker {}:{} as {}",
            config.host, config.port, config.client_id
        );
        let handle = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            events,
            state_tx,
            shutdown,
            config.reconnect_delay,
        ));

        (Self { client, state }, handle)
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn ensure_connected(&self, topic: &str) -> Result<(), TransportError> {
        match self.connection_state() {
            ConnectionState::Connected => Ok(()),
            state => {
                warn!("Dropping MQTT operation on {} while {:?}", topic, state);
                Err(TransportError::TransportUnavailable(topic.to_string()))
            }
        }
    }
}

impl MqttTransport for RumqttTransport {
    async fn subscribe(&self, topics: &[String]) -> Result<(), TransportError> {
        for topic in topics {
            self.ensure_connected(topic)?;
            self.client.subscribe(topic.as_str(), QoS::AtLeastOnce).await?;
            info!("Subscribed to {}", topic);
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.ensure_connected(topic)?;
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        debug!("Published to {}", topic);
        Ok(())
    }
}

/// Non-blocking hand-over of transport events. The event loop must keep
/// polling while the owner is busy publishing, so it never waits on a full
/// channel. Dropped publishes are healed by the next state refresh;
/// connection changes are queued and retried.
struct EventForwarder {
    events: mpsc::Sender<TransportEvent>,
    backlog: VecDeque<TransportEvent>,
}

/// The owner dropped its receiver.
struct ReceiverGone;

impl EventForwarder {
    fn new(events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            events,
            backlog: VecDeque::new(),
        }
    }

    fn forward(&mut self, event: TransportEvent) -> Result<(), ReceiverGone> {
        self.flush()?;
        if !self.backlog.is_empty() {
            return self.hold(event);
        }
        match self.events.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => self.hold(event),
            Err(TrySendError::Closed(_)) => Err(ReceiverGone),
        }
    }

    /// Retries queued connection changes, oldest first.
    fn flush(&mut self) -> Result<(), ReceiverGone> {
        while let Some(event) = self.backlog.pop_front() {
            match self.events.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    self.backlog.push_front(event);
                    break;
                }
                Err(TrySendError::Closed(_)) => return Err(ReceiverGone),
            }
        }
        Ok(())
    }

    fn hold(&mut self, event: TransportEvent) -> Result<(), ReceiverGone> {
        match event {
            TransportEvent::Message(message) => {
                warn!("Event channel full, dropping message on {}", message.topic);
            }
            event => {
                debug!("Event channel full, queueing {:?}", event);
                self.backlog.push_back(event);
            }
        }
        Ok(())
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    events: mpsc::Sender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
    reconnect_delay: std::time::Duration,
) {
    let mut forwarder = EventForwarder::new(events);
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = eventloop.poll() => event,
        };

        let forwarded = match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("Device broker accepted connection ({:?})", ack.code);
                state.send_replace(ConnectionState::Connected);
                forwarder.forward(TransportEvent::Connected)
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage::from_topic(publish.topic, publish.payload.to_vec());
                debug!("Received {}", message);
                forwarder.forward(TransportEvent::Message(message))
            }
            Ok(_) => forwarder.flush(),
            Err(e) => {
                let was_connected = *state.borrow() == ConnectionState::Connected;
                let forwarded = if was_connected {
                    warn!("Lost connection to device broker: {}", e);
                    state.send_replace(ConnectionState::Reconnecting);
                    forwarder.forward(TransportEvent::Disconnected)
                } else {
                    error!("Connecting to device broker failed: {}", e);
                    state.send_replace(ConnectionState::Failed);
                    Ok(())
                };
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(reconnect_delay) => {}
                }
                forwarded
            }
        };

        if forwarded.is_err() {
            debug!("Transport event receiver dropped, stopping event loop");
            break;
        }
    }

    if let Err(e) = client.try_disconnect() {
        debug!("Disconnect request not queued: {}", e);
    }
    state.send_replace(ConnectionState::Disconnected);
    info!("Device connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(topic: &str) -> TransportEvent {
        TransportEvent::Message(InboundMessage::from_topic(topic, b"{}".to_vec()))
    }

    #[test]
    fn full_channel_never_blocks_and_keeps_connection_changes() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut forwarder = EventForwarder::new(tx);

        assert!(forwarder.forward(message("first")).is_ok());
        assert!(forwarder.forward(message("dropped")).is_ok());
        assert!(forwarder.forward(TransportEvent::Disconnected).is_ok());
        assert!(forwarder.forward(TransportEvent::Connected).is_ok());

        assert!(matches!(rx.try_recv(), Ok(TransportEvent::Message(m)) if m.topic == "first"));
        assert!(rx.try_recv().is_err());

        assert!(forwarder.flush().is_ok());
        assert_eq!(rx.try_recv().ok(), Some(TransportEvent::Disconnected));
        assert!(forwarder.flush().is_ok());
        assert_eq!(rx.try_recv().ok(), Some(TransportEvent::Connected));
        assert!(forwarder.backlog.is_empty());
    }

    #[test]
    fn dropped_receiver_stops_forwarding() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut forwarder = EventForwarder::new(tx);
        assert!(forwarder.forward(TransportEvent::Connected).is_err());
    }
}
