//! Controller Handle - single task that owns a [`DeviceController`]
//!
//! Serializes everything that touches one device: transport events, host
//! intents and the periodic state refresh all go through one `select!` loop,
//! so the controller's snapshots are never mutated concurrently.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::controller::{ControllerError, DeviceController};
use super::intent::CommandIntent;
use crate::mqtt::{MqttTransport, TransportEvent};

/// Settings for the controller task
#[derive(Clone, Debug)]
pub struct ControllerSettings {
    /// How often a full state is requested while connected.
    ///
    /// The device pushes changes on its own; the refresh catches anything
    /// missed while a message was dropped.
    pub refresh_interval: Duration,

    /// Buffer of the intent channel.
    pub intent_capacity: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            intent_capacity: 32,
        }
    }
}

/// Handle for the task running one device controller
///
/// # Threading Model
///
/// ```text
/// TransportEvent ──┐
/// CommandIntent ───┼──► select! loop ──► DeviceController ──► MqttTransport
/// refresh tick ────┘                            │
///                                               └──► ControllerEvent (host)
/// ```
///
/// The task ends when the shutdown token is cancelled or the transport event
/// channel closes, and hands the controller back through [`shutdown`](Self::shutdown).
pub struct ControllerHandle<T: MqttTransport + 'static> {
    intents: mpsc::Sender<CommandIntent>,
    shutdown: CancellationToken,
    task: JoinHandle<DeviceController<T>>,
}

impl<T: MqttTransport + 'static> ControllerHandle<T> {
    /// Spawns the controller task
    ///
    /// # Arguments
    ///
    /// * `controller` - Controller for the device, already wired to its transport
    /// * `transport_events` - Receiving end of the transport's event channel
    /// * `settings` - Optional configuration; uses defaults if None
    /// * `shutdown` - Cancels the task; usually shared with the transport
    pub fn spawn(
        controller: DeviceController<T>,
        transport_events: mpsc::Receiver<TransportEvent>,
        settings: Option<ControllerSettings>,
        shutdown: CancellationToken,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        info!(
            "Starting controller task for {} with settings: {:?}",
            controller.name(),
            settings
        );

        let (intents, intent_receiver) = mpsc::channel(settings.intent_capacity);
        let task = tokio::spawn(run(
            controller,
            transport_events,
            intent_receiver,
            settings.refresh_interval,
            shutdown.clone(),
        ));

        Self {
            intents,
            shutdown,
            task,
        }
    }

    /// Queues an intent for the controller task.
    pub async fn submit(&self, intent: CommandIntent) -> Result<(), ControllerError> {
        self.intents
            .send(intent)
            .await
            .map_err(|e| ControllerError::Channel(format!("intent {:?} not delivered", e.0)))
    }

    /// Stops the task and returns the controller with its final snapshots.
    pub async fn shutdown(self) -> Result<DeviceController<T>, ControllerError> {
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|e| ControllerError::Channel(format!("controller task failed: {}", e)))
    }
}

async fn run<T: MqttTransport>(
    mut controller: DeviceController<T>,
    mut transport_events: mpsc::Receiver<TransportEvent>,
    mut intents: mpsc::Receiver<CommandIntent>,
    refresh_interval: Duration,
    shutdown: CancellationToken,
) -> DeviceController<T> {
    let mut refresh = interval_at(Instant::now() + refresh_interval, refresh_interval);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut connected = false;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Shutdown requested for {}", controller.name());
                break;
            }
            event = transport_events.recv() => match event {
                Some(TransportEvent::Connected) => {
                    connected = true;
                    if let Err(e) = controller.on_connected().await {
                        error!("Setting up {} after connect failed: {}", controller.name(), e);
                    }
                }
                Some(TransportEvent::Disconnected) => {
                    connected = false;
                    warn!("{} disconnected, waiting for reconnect", controller.name());
                }
                Some(TransportEvent::Message(message)) => {
                    controller
                        .on_inbound_message(&message.topic, &message.payload)
                        .await;
                }
                None => {
                    info!("Transport for {} closed", controller.name());
                    break;
                }
            },
            Some(intent) = intents.recv() => {
                if let Err(e) = controller.submit(intent).await {
                    error!("{:?} for {} failed: {}", intent, controller.name(), e);
                }
            }
            _ = refresh.tick() => {
                if connected {
                    if let Err(e) = controller.request_state_refresh().await {
                        warn!("State refresh for {} failed: {}", controller.name(), e);
                    }
                }
            }
        }
    }

    info!("Controller task for {} stopped", controller.name());
    controller
}
