//! Typed access to the cloud state kept in a [`KeyValueStore`].
//!
//! Key layout, one entry per line:
//!
//! ```text
//! challenge_id            pending OTP challenge
//! {i}.name                device name, i = discovery order
//! {name}.credential       local MQTT password
//! {name}.serial           serial number / MQTT username
//! {name}.product_type     product code, e.g. "475"
//! bridge version          version that last wrote the store
//! ```

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use super::{KeyValueStore, StoreError};
use crate::cloud::{ChallengeState, DeviceCredential};
use crate::protocol::ProductType;

const CHALLENGE_KEY: &str = "challenge_id";
const VERSION_KEY: &str = "bridge version";
const NAME_SUFFIX: &str = ".name";

pub async fn save_challenge<S: KeyValueStore>(
    store: &S,
    challenge: &ChallengeState,
) -> Result<(), StoreError> {
    store.set(CHALLENGE_KEY, &challenge.challenge_id).await
}

pub async fn pending_challenge<S: KeyValueStore>(
    store: &S,
) -> Result<Option<ChallengeState>, StoreError> {
    Ok(store
        .get(CHALLENGE_KEY)
        .await?
        .filter(|id| !id.is_empty())
        .map(ChallengeState::new))
}

/// Removes the pending challenge and hands it out. A challenge is single use,
/// so it is gone from the store whether or not verification succeeds.
pub async fn take_challenge<S: KeyValueStore>(
    store: &S,
) -> Result<Option<ChallengeState>, StoreError> {
    Ok(store
        .remove(CHALLENGE_KEY)
        .await?
        .filter(|id| !id.is_empty())
        .map(ChallengeState::new))
}

pub async fn save_devices<S: KeyValueStore>(
    store: &S,
    devices: &[DeviceCredential],
) -> Result<(), StoreError> {
    for (index, device) in devices.iter().enumerate() {
        store.set(&format!("{}{}", index, NAME_SUFFIX), &device.name).await?;
        store
            .set(
                &format!("{}.credential", device.name),
                device.password.expose_secret(),
            )
            .await?;
        store
            .set(&format!("{}.serial", device.name), &device.serial)
            .await?;
        store
            .set(
                &format!("{}.product_type", device.name),
                device.product_type.code(),
            )
            .await?;
        debug!("Stored credentials for device '{}'", device.name);
    }
    info!("Stored {} device(s)", devices.len());
    Ok(())
}

/// Devices in discovery order. Entries with missing fields are skipped.
pub async fn load_devices<S: KeyValueStore>(store: &S) -> Result<Vec<DeviceCredential>, StoreError> {
    let entries = store.entries().await?;

    let mut names: Vec<(usize, &String)> = entries
        .iter()
        .filter_map(|(key, name)| {
            let index = key.strip_suffix(NAME_SUFFIX)?.parse().ok()?;
            Some((index, name))
        })
        .collect();
    names.sort_by_key(|(index, _)| *index);

    let mut devices = Vec::with_capacity(names.len());
    for (_, name) in names {
        let field = |suffix: &str| entries.get(&format!("{}.{}", name, suffix));
        match (field("credential"), field("serial"), field("product_type")) {
            (Some(password), Some(serial), Some(product_type)) => {
                devices.push(DeviceCredential {
                    name: name.clone(),
                    serial: serial.clone(),
                    password: SecretString::from(password.clone()),
                    product_type: ProductType::new(product_type.clone()),
                });
            }
            _ => warn!("Stored device '{}' is incomplete, ignoring it", name),
        }
    }
    Ok(devices)
}

/// Drops everything learned from the cloud so the next start logs in again.
pub async fn reset<S: KeyValueStore>(store: &S) -> Result<(), StoreError> {
    info!("Erasing stored cloud data");
    store.clear().await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upgrade {
    Major,
    Minor,
    Patch,
}

fn parse_version(version: &str) -> (u32, u32, u32) {
    let mut parts = version
        .split('.')
        .map(|part| part.trim().parse::<u32>().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

/// Compares `current` with the version that last wrote the store, logs the
/// kind of upgrade and records `current`.
pub async fn record_version<S: KeyValueStore>(
    store: &S,
    current: &str,
) -> Result<Option<Upgrade>, StoreError> {
    let stored = store
        .get(VERSION_KEY)
        .await?
        .unwrap_or_else(|| "0.0.0".to_string());
    info!("Starting version: {}", current);

    let (cur_major, cur_minor, cur_patch) = parse_version(current);
    let (old_major, old_minor, old_patch) = parse_version(&stored);
    let upgrade = if old_major < cur_major {
        Some(Upgrade::Major)
    } else if old_major == cur_major && old_minor < cur_minor {
        Some(Upgrade::Minor)
    } else if (old_major, old_minor) == (cur_major, cur_minor) && old_patch < cur_patch {
        Some(Upgrade::Patch)
    } else {
        None
    };
    if let Some(kind) = upgrade {
        info!("{:?} version upgrade: {} -> {}", kind, stored, current);
    }

    if stored != current {
        store.set(VERSION_KEY, current).await?;
    }
    Ok(upgrade)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    fn device(name: &str, serial: &str, product: &str) -> DeviceCredential {
        DeviceCredential {
            name: name.to_string(),
            serial: serial.to_string(),
            password: SecretString::from(format!("pw-{}", serial)),
            product_type: ProductType::new(product),
        }
    }

    #[tokio::test]
    async fn devices_round_trip_in_discovery_order() {
        let store = MemoryStore::new();
        let devices = vec![
            device("Living Room", "AB1-EU-0001", "475"),
            device("Bedroom", "CD2-EU-0002", "438"),
        ];
        save_devices(&store, &devices).await.unwrap();

        let loaded = load_devices(&store).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "Living Room");
        assert_eq!(loaded[1].serial, "CD2-EU-0002");
        assert_eq!(loaded[1].product_type.code(), "438");
        assert_eq!(loaded[0].password.expose_secret(), "pw-AB1-EU-0001");
        assert_eq!(
            store.get("Bedroom.product_type").await.unwrap().as_deref(),
            Some("438")
        );
    }

    #[tokio::test]
    async fn incomplete_devices_are_skipped() {
        let store = MemoryStore::new();
        store.set("0.name", "Orphan").await.unwrap();
        store.set("Orphan.serial", "X").await.unwrap();
        assert!(load_devices(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn challenge_is_single_use() {
        let store = MemoryStore::new();
        save_challenge(&store, &ChallengeState::new("abc")).await.unwrap();
        assert_eq!(
            pending_challenge(&store).await.unwrap(),
            Some(ChallengeState::new("abc"))
        );
        assert_eq!(
            take_challenge(&store).await.unwrap(),
            Some(ChallengeState::new("abc"))
        );
        assert_eq!(take_challenge(&store).await.unwrap(), None);
    }

    #[tokio::test]
    async fn reset_clears_devices_and_challenge() {
        let store = MemoryStore::new();
        save_devices(&store, &[device("Desk", "S1", "520")]).await.unwrap();
        save_challenge(&store, &ChallengeState::new("abc")).await.unwrap();
        reset(&store).await.unwrap();
        assert!(load_devices(&store).await.unwrap().is_empty());
        assert_eq!(pending_challenge(&store).await.unwrap(), None);
    }

    #[tokio::test]
    async fn version_upgrades_are_classified() {
        let store = MemoryStore::new();
        assert_eq!(record_version(&store, "4.0.1").await.unwrap(), Some(Upgrade::Major));
        assert_eq!(record_version(&store, "4.0.1").await.unwrap(), None);
        assert_eq!(record_version(&store, "4.1.0").await.unwrap(), Some(Upgrade::Minor));
        assert_eq!(record_version(&store, "4.1.3").await.unwrap(), Some(Upgrade::Patch));
    }
}
