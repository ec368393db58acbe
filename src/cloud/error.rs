use thiserror::Error;

use crate::persistence::StoreError;

/// Failures of the cloud login and device discovery.
///
/// Everything except `Transport` and `Store` is terminal for the current
/// start attempt and goes to the operator verbatim.
#[derive(Debug, Error)]
pub enum CloudError {
    /// The code was rejected, or there is no pending challenge to verify.
    /// Login has to restart with a new OTP request.
    #[error("Invalid challenge: {0}. Request a new verification code")]
    InvalidChallenge(String),

    #[error("Verification code expired. Request a new verification code")]
    ExpiredChallenge,

    #[error("A verification code was requested but none (or a too short one) was supplied")]
    MissingOtpCode,

    #[error("Cloud account '{email}' is not active (status: {status})")]
    AccountNotActive { email: String, status: String },

    #[error("No devices found in the cloud account")]
    NoDevicesFound,

    #[error("The configured device name '{name}' was not found in the cloud account. Available options: {available:?}")]
    DeviceNotFound { name: String, available: Vec<String> },

    #[error("More than 1 device found in cloud account but no device name given to select. Select one of: {available:?}")]
    AmbiguousDeviceSelection { available: Vec<String> },

    #[error("Local credentials of device {serial} could not be decoded: {reason}")]
    InvalidLocalCredentials { serial: String, reason: String },

    #[error("Cloud API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Cloud request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid cloud URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),
}
