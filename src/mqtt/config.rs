use secrecy::SecretString;
use std::time::Duration;

use crate::cloud::DeviceCredential;

pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_CLIENT_ID: &str = "purelink-bridge";

/// Connection parameters for the device's local broker.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// The device serial.
    pub username: String,
    pub password: SecretString,
    pub keep_alive: Duration,
    /// Pause after a failed poll before the event loop reconnects.
    pub reconnect_delay: Duration,
    pub channel_capacity: usize,
}

impl MqttConfig {
    pub fn for_device(host: impl Into<String>, port: u16, device: &DeviceCredential) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            username: device.serial.clone(),
            password: device.password.clone(),
            keep_alive: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            channel_capacity: 64,
        }
    }
}
