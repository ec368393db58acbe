use tracing::{info, warn};

use super::error::CloudError;
use super::models::DeviceCredential;

/// Picks the device the bridge talks to.
///
/// A configured name must match exactly. Without one, a single known device is
/// used as is and several are ambiguous.
pub fn select_device(
    devices: &[DeviceCredential],
    configured: Option<&str>,
) -> Result<DeviceCredential, CloudError> {
    let available = || devices.iter().map(|d| d.name.clone()).collect::<Vec<_>>();
    let configured = configured.map(str::trim).filter(|name| !name.is_empty());

    match (configured, devices) {
        (_, []) => Err(CloudError::NoDevicesFound),
        (Some(name), _) => match devices.iter().find(|d| d.name == name) {
            Some(device) => {
                info!("Using configured device {}", device);
                Ok(device.clone())
            }
            None => {
                warn!("Configured device '{}' is unknown", name);
                Err(CloudError::DeviceNotFound {
                    name: name.to_string(),
                    available: available(),
                })
            }
        },
        (None, [only]) => {
            info!("Using the only device in the account: {}", only);
            Ok(only.clone())
        }
        (None, _) => Err(CloudError::AmbiguousDeviceSelection {
            available: available(),
        }),
    }
}
