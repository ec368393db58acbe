use secrecy::SecretString;
use tracing::{debug, info, warn};

use super::client::{CloudAuthClient, CloudSettings, Idle};
use super::error::CloudError;
use super::models::DeviceCredential;
use crate::persistence::{credentials, KeyValueStore};

const OTP_CODE_LENGTH: usize = 6;

/// Where a login attempt ended.
#[derive(Debug)]
pub enum AuthProgress {
    /// A code was emailed and the challenge stored. The operator has to supply
    /// the code and start the bridge again.
    OtpRequested,
    /// Devices are known, either from the store or from a fresh login.
    Completed(Vec<DeviceCredential>),
}

/// Two-run login over a persisted challenge.
///
/// Every step builds a fresh [`CloudAuthClient`]; the only state carried
/// between steps (and between processes) is what sits in the store.
pub struct AuthFlow<'a, S: KeyValueStore> {
    store: &'a S,
    settings: CloudSettings,
    password: SecretString,
}

impl<'a, S: KeyValueStore> AuthFlow<'a, S> {
    pub fn new(store: &'a S, settings: CloudSettings, password: SecretString) -> Self {
        Self {
            store,
            settings,
            password,
        }
    }

    /// Returns stored devices if there are any, otherwise requests a code or
    /// verifies `otp_code` depending on whether a challenge is pending.
    pub async fn run(&self, otp_code: Option<&str>) -> Result<AuthProgress, CloudError> {
        let stored = credentials::load_devices(self.store).await?;
        if !stored.is_empty() {
            info!("Using {} stored device(s), skipping cloud login", stored.len());
            return Ok(AuthProgress::Completed(stored));
        }

        match credentials::pending_challenge(self.store).await? {
            None => self.request_otp().await,
            Some(_) => {
                debug!("Pending challenge found, verifying code");
                let devices = self.verify(otp_code.unwrap_or_default()).await?;
                Ok(AuthProgress::Completed(devices))
            }
        }
    }

    pub async fn request_otp(&self) -> Result<AuthProgress, CloudError> {
        let client = CloudAuthClient::<Idle>::create(&self.settings)?;
        let (_, challenge) = client.request_otp().await?;
        credentials::save_challenge(self.store, &challenge).await?;
        info!(
            "Verification code sent to {}. Add it to the configuration and restart",
            self.settings.email
        );
        Ok(AuthProgress::OtpRequested)
    }

    /// Verifies `otp_code` against the stored challenge and stores the devices.
    ///
    /// A short code leaves the challenge in place. Anything past that point
    /// consumes it, so a rejected code means requesting a new one.
    pub async fn verify(&self, otp_code: &str) -> Result<Vec<DeviceCredential>, CloudError> {
        let otp_code = otp_code.trim();
        if otp_code.chars().count() < OTP_CODE_LENGTH {
            warn!("Verification code missing or shorter than {} characters", OTP_CODE_LENGTH);
            return Err(CloudError::MissingOtpCode);
        }

        let challenge = credentials::take_challenge(self.store)
            .await?
            .ok_or_else(|| CloudError::InvalidChallenge("no pending challenge".to_string()))?;

        let client = CloudAuthClient::<Idle>::create(&self.settings)?.resume();
        let devices = client
            .verify(challenge, otp_code, &self.password)
            .await?
            .fetch_devices()
            .await?
            .into_devices();

        credentials::save_devices(self.store, &devices).await?;
        Ok(devices)
    }
}
