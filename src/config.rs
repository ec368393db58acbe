use color_eyre::{eyre::eyre, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::cloud::{CloudSettings, DeviceCredential};
use crate::device::ControllerSettings;
use crate::mqtt::MqttConfig;

const CONFIG_DIR: &str = "purelink-bridge";
const CONFIG_FILE: &str = "config.toml";
pub const CONFIG_ENV: &str = "PURELINK_CONFIG";

/// Written on first start. Every key is optional except the account and the
/// device address.
pub const DEFAULT_CONFIG: &str = r#"# purelink-bridge configuration

[device]
# IP address or host name of the purifier on the local network
address = ""
port = 1883
# Name of the device in the vendor app. Required when the account has more than one.
# name = "Living Room"
client_id = "purelink-bridge"
keep_alive_secs = 30

[account]
email = ""
password = ""
# Country code of the account, e.g. "NL", "DE", "US" or "CN"
region = "NL"
# Emailed verification code. Fill in after the first start and restart.
# otp_code = ""

[bridge]
refresh_interval_secs = 30
log_level = "info"
# Forget stored devices and any pending login on next start
reset_cloud_data = false
# state_file = "/var/lib/purelink-bridge/state.toml"
# cloud_base_url = "https://appapi.cp.dyson.com"
"#;

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct BridgeConfig {
    pub device: DeviceConfig,
    pub account: AccountConfig,
    pub bridge: BridgeOptions,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct DeviceConfig {
    pub address: String,
    pub port: u16,
    pub name: Option<String>,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            port: crate::mqtt::config::DEFAULT_PORT,
            name: None,
            client_id: crate::mqtt::config::DEFAULT_CLIENT_ID.to_string(),
            keep_alive_secs: 30,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AccountConfig {
    pub email: String,
    pub password: SecretString,
    pub region: String,
    pub otp_code: Option<String>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: SecretString::from(""),
            region: "NL".to_string(),
            otp_code: None,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct BridgeOptions {
    pub refresh_interval_secs: u64,
    pub log_level: String,
    pub reset_cloud_data: bool,
    pub state_file: Option<PathBuf>,
    pub cloud_base_url: Option<String>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
            log_level: "info".to_string(),
            reset_cloud_data: false,
            state_file: None,
            cloud_base_url: None,
        }
    }
}

impl BridgeConfig {
    /// `$PURELINK_CONFIG`, else `<config dir>/purelink-bridge/config.toml`.
    pub fn config_path() -> Result<PathBuf> {
        Self::resolve_path(std::env::var_os(CONFIG_ENV).map(PathBuf::from))
    }

    fn resolve_path(override_path: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = override_path {
            return Ok(path);
        }
        let mut path =
            dirs::config_dir().ok_or_else(|| eyre!("Could not determine config directory"))?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Writes [`DEFAULT_CONFIG`] to `path` unless a file is already there.
    /// Returns whether it did.
    pub async fn ensure_default_config(path: &Path) -> Result<bool> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check config file {}: {}", path.display(), e))?
        {
            debug!("Using existing config file {}", path.display());
            return Ok(false);
        }

        info!("Creating default configuration at {}", path.display());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        tokio::fs::write(path, DEFAULT_CONFIG)
            .await
            .map_err(|e| eyre!("Failed to write default config: {}", e))?;
        Ok(true)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse config file: {}", e))
    }

    /// Rejects settings the bridge cannot start without.
    pub fn validate(&self) -> Result<()> {
        if self.account.email.trim().is_empty() {
            return Err(eyre!("[account] email is not set"));
        }
        if self.device.address.trim().is_empty() {
            return Err(eyre!("[device] address is not set"));
        }
        if self.bridge.refresh_interval_secs == 0 {
            return Err(eyre!("[bridge] refresh_interval_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn cloud_settings(&self) -> CloudSettings {
        let mut settings = CloudSettings::new(self.account.email.trim(), self.account.region.trim());
        settings.base_url = self.bridge.cloud_base_url.clone();
        settings
    }

    pub fn mqtt_config(&self, device: &DeviceCredential) -> MqttConfig {
        let mut config = MqttConfig::for_device(self.device.address.trim(), self.device.port, device);
        config.client_id = self.device.client_id.clone();
        config.keep_alive = Duration::from_secs(self.device.keep_alive_secs);
        config
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            refresh_interval: Duration::from_secs(self.bridge.refresh_interval_secs),
            ..ControllerSettings::default()
        }
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device.name.as_deref()
    }

    pub fn otp_code(&self) -> Option<&str> {
        self.account.otp_code.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProductType;
    use secrecy::ExposeSecret;

    #[test]
    fn default_template_parses_to_defaults() {
        let config = BridgeConfig::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.device.port, 1883);
        assert_eq!(config.device.name, None);
        assert_eq!(config.account.region, "NL");
        assert_eq!(config.bridge.refresh_interval_secs, 30);
        assert!(!config.bridge.reset_cloud_data);
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = BridgeConfig::parse(
            r#"
            [device]
            address = "192.168.1.20"
            name = "Bedroom"

            [account]
            email = "me@example.com"
            password = "hunter2"
            otp_code = "123456"
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.device_name(), Some("Bedroom"));
        assert_eq!(config.otp_code(), Some("123456"));
        assert_eq!(config.account.password.expose_secret(), "hunter2");
        assert_eq!(config.device.keep_alive_secs, 30);
        assert_eq!(config.bridge.log_level, "info");
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn device_settings_flow_into_mqtt_config() {
        let config = BridgeConfig::parse(
            r#"
            [device]
            address = " 10.0.0.5 "
            port = 1884
            client_id = "bridge-2"
            keep_alive_secs = 10
            "#,
        )
        .unwrap();
        let device = DeviceCredential {
            name: "Desk".into(),
            serial: "NN2-EU-0001".into(),
            password: SecretString::from("local"),
            product_type: ProductType::new("520"),
        };
        let mqtt = config.mqtt_config(&device);
        assert_eq!(mqtt.host, "10.0.0.5");
        assert_eq!(mqtt.port, 1884);
        assert_eq!(mqtt.client_id, "bridge-2");
        assert_eq!(mqtt.username, "NN2-EU-0001");
        assert_eq!(mqtt.keep_alive, Duration::from_secs(10));
    }

    #[test]
    fn explicit_path_wins() {
        let path = BridgeConfig::resolve_path(Some(PathBuf::from("/tmp/bridge.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/bridge.toml"));
    }

    #[tokio::test]
    async fn default_config_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert!(BridgeConfig::ensure_default_config(&path).await.unwrap());
        assert!(!BridgeConfig::ensure_default_config(&path).await.unwrap());
        let config = BridgeConfig::load(&path).await.unwrap();
        assert_eq!(config.bridge.log_level, "info");
    }
}
