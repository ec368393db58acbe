//! Per-device state holder and command router.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::intent::{plan, CommandIntent};
use crate::cloud::DeviceCredential;
use crate::mqtt::{MqttTransport, TransportError};
use crate::protocol::message;
use crate::protocol::{
    CommandEncoder, CommandError, HeatTarget, MessageKind, OutboundMessage, ProductFamily,
    SensorCodec, SensorSnapshot, StateCodec, StateSnapshot,
};

pub const STATUS_CURRENT: &str = "status/current";
pub const STATUS_CONNECTION: &str = "status/connection";
pub const STATUS_FAULTS: &str = "status/faults";

/// Source of the `time` field in outbound commands.
pub type Clock = fn() -> DateTime<Utc>;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The controller task is gone.
    #[error("Channel error: {0}")]
    Channel(String),
}

/// Notifications for the host. Snapshots are clones; the controller keeps
/// the originals.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    StateChanged(StateSnapshot),
    SensorsChanged(SensorSnapshot),
    ConnectionReported(String),
    FaultsReported(String),
}

/// Owns the last known state of one device and everything that is sent to it.
///
/// Not synchronized. All calls for a device must come from one task, which is
/// what [`ControllerHandle`](super::ControllerHandle) provides.
pub struct DeviceController<T: MqttTransport> {
    name: String,
    base_topic: String,
    encoder: CommandEncoder,
    transport: T,
    events: mpsc::Sender<ControllerEvent>,
    clock: Clock,
    state: StateSnapshot,
    sensors: Option<SensorSnapshot>,
}

impl<T: MqttTransport> DeviceController<T> {
    pub fn new(device: &DeviceCredential, transport: T, events: mpsc::Sender<ControllerEvent>) -> Self {
        let base_topic = device.base_topic();
        let family = device.family();
        info!(
            "Controller for {} uses the {:?} vocabulary on {}",
            device.name, family, base_topic
        );
        Self {
            name: device.name.clone(),
            encoder: CommandEncoder::new(family, &base_topic),
            base_topic,
            transport,
            events,
            clock: Utc::now,
            state: StateSnapshot::default(),
            sensors: None,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> ProductFamily {
        self.encoder.family()
    }

    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    pub fn sensors(&self) -> Option<&SensorSnapshot> {
        self.sensors.as_ref()
    }

    pub fn status_topics(&self) -> Vec<String> {
        [STATUS_CURRENT, STATUS_CONNECTION, STATUS_FAULTS]
            .iter()
            .map(|suffix| format!("{}/{}", self.base_topic, suffix))
            .collect()
    }

    /// Subscribes to the status topics and asks for a full state.
    pub async fn on_connected(&mut self) -> Result<(), ControllerError> {
        self.transport.subscribe(&self.status_topics()).await?;
        self.request_state_refresh().await
    }

    pub async fn request_state_refresh(&mut self) -> Result<(), ControllerError> {
        let outbound = self.encoder.request_current_state((self.clock)())?;
        debug!("Requesting current state of {}", self.name);
        self.send(outbound).await
    }

    /// Publishes the commands planned for `intent`, in order. Nothing is
    /// published unless every command encodes. Stops at the first failed
    /// publish.
    pub async fn submit(&mut self, intent: CommandIntent) -> Result<(), ControllerError> {
        let commands = plan(intent, self.family());
        info!("Submitting {:?} to {} as {:?}", intent, self.name, commands);
        let now = (self.clock)();
        let outbound = commands
            .iter()
            .map(|command| self.encoder.encode(command, now))
            .collect::<Result<Vec<_>, _>>()?;
        for message in outbound {
            self.send(message).await?;
        }
        Ok(())
    }

    /// Routes a payload by topic. Decode failures are logged, never returned.
    pub async fn on_inbound_message(&mut self, topic: &str, payload: &[u8]) {
        let suffix = topic
            .strip_prefix(self.base_topic.as_str())
            .and_then(|rest| rest.strip_prefix('/'));
        match suffix {
            Some(STATUS_CURRENT) => self.on_current_status(payload).await,
            Some(STATUS_CONNECTION) => {
                let report = String::from_utf8_lossy(payload).into_owned();
                info!("Connection report from {}: {}", self.name, report);
                self.emit(ControllerEvent::ConnectionReported(report)).await;
            }
            Some(STATUS_FAULTS) => {
                let report = String::from_utf8_lossy(payload).into_owned();
                warn!("Fault report from {}: {}", self.name, report);
                self.emit(ControllerEvent::FaultsReported(report)).await;
            }
            _ => debug!("Ignoring message on unrelated topic {}", topic),
        }
    }

    async fn on_current_status(&mut self, payload: &[u8]) {
        let message = match message::parse(payload) {
            Ok(message) => message,
            Err(e) => {
                error!("Dropping payload from {}: {}", self.name, e);
                return;
            }
        };

        let reported_heat_target = self.apply_state(&message).await;

        if SensorCodec::is_sensor_value(&message) {
            match SensorCodec::decode_value(&message) {
                Ok(mut sensors) => {
                    if let Some(target) = reported_heat_target {
                        sensors.heat_target = Some(target);
                    }
                    if self.sensors.as_ref() == Some(&sensors) {
                        debug!("Sensor data from {} unchanged", self.name);
                        return;
                    }
                    self.sensors = Some(sensors.clone());
                    self.emit(ControllerEvent::SensorsChanged(sensors)).await;
                }
                Err(e) => warn!("Sensor data from {} not decoded: {}", self.name, e),
            }
        }
    }

    /// Decodes and merges a state message. Returns the heat target it
    /// reported, if any.
    async fn apply_state(&mut self, message: &Value) -> Option<HeatTarget> {
        let kind = StateCodec::classify_value(message);
        if kind == MessageKind::Unrecognized {
            if !SensorCodec::is_sensor_value(message) {
                warn!(
                    "Discarding unrecognized message from {}: {:?}",
                    self.name,
                    message::discriminator(message)
                );
            }
            return None;
        }

        let decoded = match StateCodec::decode_value(message) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("State from {} not decoded: {}", self.name, e);
                return None;
            }
        };

        let previous = self.state.clone();
        match kind {
            MessageKind::StateChange => self.state.merge(&decoded),
            _ => self.state = decoded.clone(),
        }
        if self.state == previous {
            debug!("{:?} from {} left the state unchanged", kind, self.name);
        } else {
            debug!("{:?} from {} applied", kind, self.name);
            self.emit(ControllerEvent::StateChanged(self.state.clone()))
                .await;
        }
        decoded.heat_target
    }

    async fn send(&self, outbound: OutboundMessage) -> Result<(), ControllerError> {
        debug!("Publishing {} to {}", outbound.payload_str(), outbound.topic);
        self.transport
            .publish(&outbound.topic, outbound.payload)
            .await?;
        Ok(())
    }

    async fn emit(&self, event: ControllerEvent) {
        if self.events.send(event).await.is_err() {
            debug!("No listener for events of {}", self.name);
        }
    }
}
