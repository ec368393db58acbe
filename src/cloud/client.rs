//! Cloud account client with statum state machine for the two-factor login
//!
//! # State Machine
//!
//! ```text
//! Idle ──request_otp──► OtpRequested ──verify──► Verified ──fetch_devices──► DevicesFetched
//!  │                         ▲
//!  └────────resume───────────┘
//!       (persisted challenge)
//! ```
//!
//! Each step consumes the client, so a challenge can be verified at most once
//! per client and a device list can only be fetched with a verified session.
//! Nothing here retries; callers restart the whole sequence on failure.

use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use statum::{machine, state};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::error::CloudError;
use super::models::{
    AccountSession, ChallengeResponse, ChallengeState, DeviceCredential, EmailRequest,
    ManifestEntry, UserStatusResponse, VerifyRequest, VerifyResponse,
};

pub const DEFAULT_BASE_URL: &str = "https://appapi.cp.dyson.com";
pub const CHINA_BASE_URL: &str = "https://appapi.cp.dyson.cn";

const USER_AGENT: &str = "android client";
const USER_STATUS_PATH: &str = "/v3/userregistration/email/userstatus";
const REQUEST_OTP_PATH: &str = "/v3/userregistration/email/auth";
const VERIFY_PATH: &str = "/v3/userregistration/email/verify";
const MANIFEST_PATH: &str = "/v2/provisioningservice/manifest";
const CULTURE: &str = "en-US";
const ACTIVE_ACCOUNT: &str = "ACTIVE";

/// Connection settings for the cloud account.
#[derive(Debug, Clone)]
pub struct CloudSettings {
    pub email: String,
    /// Two-letter country code, e.g. `"NL"`.
    pub region: String,
    /// Overrides the region's default API host.
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl CloudSettings {
    pub fn new(email: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            region: region.into(),
            base_url: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn resolve_base_url(&self) -> Result<Url, CloudError> {
        let raw = match &self.base_url {
            Some(url) => url.as_str(),
            None if self.region.eq_ignore_ascii_case("CN") => CHINA_BASE_URL,
            None => DEFAULT_BASE_URL,
        };
        Ok(Url::parse(raw)?)
    }
}

/// Login lifecycle states
#[state]
#[derive(Debug, Clone)]
pub enum AuthState {
    Idle,
    OtpRequested,
    Verified,
    DevicesFetched,
}

/// Cloud account client with compile-time login state via statum
#[machine]
#[derive(Debug)]
pub struct CloudAuthClient<S: AuthState> {
    http: reqwest::Client,
    base_url: Url,
    email: String,
    region: String,
    session: Option<AccountSession>,
    devices: Vec<DeviceCredential>,
}

impl<S: AuthState> CloudAuthClient<S> {
    fn endpoint(&self, path: &str) -> Result<Url, CloudError> {
        Ok(self.base_url.join(path)?)
    }

    fn regional_endpoint(&self, path: &str) -> Result<Url, CloudError> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut().append_pair("country", &self.region);
        Ok(url)
    }
}

impl CloudAuthClient<Idle> {
    pub fn create(settings: &CloudSettings) -> Result<Self, CloudError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()?;
        let base_url = settings.resolve_base_url()?;
        info!("Cloud client created for {} at {}", settings.email, base_url);
        Ok(Self::with_client(
            http,
            base_url,
            settings.email.clone(),
            settings.region.clone(),
        ))
    }

    /// Builds a client around an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, email: String, region: String) -> Self {
        Self::new(
            http,
            base_url,
            email,
            region,
            None,       // session
            Vec::new(), // devices
        )
    }

    /// Step 1: asks the cloud to email a one-time code.
    ///
    /// The returned challenge must be persisted before control goes back to
    /// the operator, otherwise the code in their inbox becomes useless.
    /// Requesting again while a challenge is pending is allowed.
    pub async fn request_otp(
        self,
    ) -> Result<(CloudAuthClient<OtpRequested>, ChallengeState), CloudError> {
        self.check_account_status().await?;

        let mut url = self.regional_endpoint(REQUEST_OTP_PATH)?;
        url.query_pairs_mut().append_pair("culture", CULTURE);
        debug!("Requesting verification code at {}", url);

        let response = self
            .http
            .post(url)
            .json(&EmailRequest { email: &self.email })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body: ChallengeResponse = response.json().await?;

        info!("Verification code requested for {}", self.email);
        Ok((self.transition(), ChallengeState::new(body.challenge_id)))
    }

    /// Continues a login whose challenge was persisted by an earlier run.
    pub fn resume(self) -> CloudAuthClient<OtpRequested> {
        debug!("Resuming login for {} from stored challenge", self.email);
        self.transition()
    }

    async fn check_account_status(&self) -> Result<(), CloudError> {
        let url = self.regional_endpoint(USER_STATUS_PATH)?;
        debug!("Checking account status at {}", url);

        let response = self
            .http
            .post(url)
            .json(&EmailRequest { email: &self.email })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let status: UserStatusResponse = response.json().await?;

        if status.account_status != ACTIVE_ACCOUNT {
            error!(
                "Account {} has status {}",
                self.email, status.account_status
            );
            return Err(CloudError::AccountNotActive {
                email: self.email.clone(),
                status: status.account_status,
            });
        }
        Ok(())
    }
}

impl CloudAuthClient<OtpRequested> {
    /// Step 2: exchanges the emailed code for an account session.
    ///
    /// Takes the challenge by value; a challenge is never verified twice.
    pub async fn verify(
        mut self,
        challenge: ChallengeState,
        otp_code: &str,
        password: &SecretString,
    ) -> Result<CloudAuthClient<Verified>, CloudError> {
        let url = self.endpoint(VERIFY_PATH)?;
        debug!("Verifying code for {} at {}", self.email, url);

        let response = self
            .http
            .post(url)
            .json(&VerifyRequest {
                email: &self.email,
                password: password.expose_secret(),
                challenge_id: &challenge.challenge_id,
                otp_code: otp_code.trim(),
            })
            .send()
            .await?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            let body = response.text().await.unwrap_or_default();
            warn!("Verification rejected (HTTP {}): {}", status, body);
            if body.to_ascii_lowercase().contains("expired") {
                return Err(CloudError::ExpiredChallenge);
            }
            return Err(CloudError::InvalidChallenge(format!(
                "code rejected by the cloud (HTTP {})",
                status.as_u16()
            )));
        }
        let response = ensure_success(response).await?;
        let body: VerifyResponse = response.json().await?;

        if let Some(kind) = body.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("Bearer") {
                warn!("Unexpected token type '{}', using it as bearer token", kind);
            }
        }

        info!("Cloud account {} verified", body.account);
        self.session = Some(AccountSession {
            account: body.account,
            token: SecretString::from(body.token),
        });
        Ok(self.transition())
    }
}

impl CloudAuthClient<Verified> {
    pub fn session(&self) -> Option<&AccountSession> {
        self.session.as_ref()
    }

    /// Step 3: reads the account's device manifest.
    pub async fn fetch_devices(mut self) -> Result<CloudAuthClient<DevicesFetched>, CloudError> {
        let token = self
            .session
            .as_ref()
            .map(|session| session.token.clone())
            .ok_or_else(|| CloudError::InvalidChallenge("no verified session".to_string()))?;

        let url = self.endpoint(MANIFEST_PATH)?;
        debug!("Fetching device manifest at {}", url);

        let response = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let entries: Vec<ManifestEntry> = response.json().await?;

        if entries.is_empty() {
            error!("Device manifest for {} is empty", self.email);
            return Err(CloudError::NoDevicesFound);
        }

        self.devices = entries
            .into_iter()
            .map(|entry| {
                debug!(
                    "Manifest entry {} (product {}, firmware {})",
                    entry.serial,
                    entry.product_type,
                    entry.version.as_deref().unwrap_or("unknown")
                );
                DeviceCredential::try_from(entry)
            })
            .collect::<Result<Vec<_>, CloudError>>()?;

        let names: Vec<&str> = self.devices.iter().map(|d| d.name.as_str()).collect();
        info!("Received devices from cloud: {:?}", names);
        Ok(self.transition())
    }
}

impl CloudAuthClient<DevicesFetched> {
    pub fn devices(&self) -> &[DeviceCredential] {
        &self.devices
    }

    pub fn into_devices(self) -> Vec<DeviceCredential> {
        self.devices
    }
}

async fn ensure_success(response: Response) -> Result<Response, CloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    error!("Cloud request failed (HTTP {}): {}", status, message);
    Err(CloudError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_selects_api_host() {
        let settings = CloudSettings::new("a@b.c", "NL");
        assert_eq!(settings.resolve_base_url().unwrap().as_str(), "https://appapi.cp.dyson.com/");

        let settings = CloudSettings::new("a@b.c", "cn");
        assert_eq!(settings.resolve_base_url().unwrap().as_str(), "https://appapi.cp.dyson.cn/");

        let mut settings = CloudSettings::new("a@b.c", "CN");
        settings.base_url = Some("http://127.0.0.1:8080".into());
        assert_eq!(settings.resolve_base_url().unwrap().as_str(), "http://127.0.0.1:8080/");
    }
}
