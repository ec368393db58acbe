//! Cloud-facing data: what the login produces and the JSON it is built from.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::CloudError;
use super::local_credentials::decrypt_local_credentials;
use crate::protocol::{ProductFamily, ProductType};

/// Server-issued token tying an OTP request to its verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeState {
    pub challenge_id: String,
}

impl ChallengeState {
    pub fn new(challenge_id: impl Into<String>) -> Self {
        Self {
            challenge_id: challenge_id.into(),
        }
    }
}

/// Session returned by a successful verification.
#[derive(Debug, Clone)]
pub struct AccountSession {
    pub account: String,
    pub token: SecretString,
}

/// Everything needed to talk to one device on the local network.
#[derive(Debug, Clone)]
pub struct DeviceCredential {
    pub name: String,
    /// Also the MQTT username.
    pub serial: String,
    /// Local MQTT password.
    pub password: SecretString,
    pub product_type: ProductType,
}

impl DeviceCredential {
    /// `<product_type>/<serial>`, the prefix of every device topic.
    pub fn base_topic(&self) -> String {
        format!("{}/{}", self.product_type, self.serial)
    }

    pub fn family(&self) -> ProductFamily {
        self.product_type.family()
    }
}

impl fmt::Display for DeviceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (serial {}, product {}",
            self.name, self.serial, self.product_type
        )?;
        if let Some(model) = self.product_type.model() {
            write!(f, " {}", model)?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EmailRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserStatusResponse {
    pub account_status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChallengeResponse {
    pub challenge_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerifyRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub challenge_id: &'a str,
    pub otp_code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerifyResponse {
    pub account: String,
    pub token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// One device in the provisioning manifest.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ManifestEntry {
    pub serial: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Encrypted, see [`decrypt_local_credentials`].
    pub local_credentials: String,
    pub product_type: String,
}

impl TryFrom<ManifestEntry> for DeviceCredential {
    type Error = CloudError;

    fn try_from(entry: ManifestEntry) -> Result<Self, Self::Error> {
        let password = decrypt_local_credentials(&entry.local_credentials).map_err(|reason| {
            CloudError::InvalidLocalCredentials {
                serial: entry.serial.clone(),
                reason,
            }
        })?;
        let name = entry
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| entry.serial.clone());
        Ok(DeviceCredential {
            name,
            serial: entry.serial,
            password,
            product_type: ProductType::new(entry.product_type),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use secrecy::ExposeSecret;

    // {"serial":"S","apPasswordHash":"local-1"}
    const LOCAL_1: &str = "esaxhcTtnXJoLo8I3tT8NMVx7rbVlBca5JllGhAE1u+DgN4Gd1Uu4wb7yxyjtwUx";

    fn entry(local_credentials: &str) -> ManifestEntry {
        serde_json::from_value(serde_json::json!({
            "Serial": "AB1-EU-HAA0000A",
            "Name": null,
            "Version": "21.03.08",
            "LocalCredentials": local_credentials,
            "ProductType": "475",
            "AutoUpdate": true
        }))
        .unwrap()
    }

    #[test]
    fn manifest_entry_without_name_uses_serial() {
        let device = DeviceCredential::try_from(entry(LOCAL_1)).unwrap();
        assert_eq!(device.name, "AB1-EU-HAA0000A");
        assert_eq!(device.base_topic(), "475/AB1-EU-HAA0000A");
        assert_eq!(device.family(), ProductFamily::Link);
        assert_eq!(device.password.expose_secret(), "local-1");
    }

    #[test]
    fn undecryptable_credentials_name_the_device() {
        match DeviceCredential::try_from(entry("secret")) {
            Err(CloudError::InvalidLocalCredentials { serial, .. }) => {
                assert_eq!(serial, "AB1-EU-HAA0000A")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn display_never_shows_the_password() {
        let device = DeviceCredential {
            name: "Bedroom".into(),
            serial: "S1".into(),
            password: SecretString::from("hunter2"),
            product_type: ProductType::new("438"),
        };
        let shown = format!("{} {:?}", device, device);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("Pure Cool Tower"));
    }
}
