//! # Cloud Account
//!
//! Logs into the vendor cloud with an emailed one-time code and reads the
//! local MQTT credentials of every device on the account.
//!
//! ```text
//! cloud/
//! ├── client.rs    - Typestate HTTP client, one method per login step
//! ├── flow.rs      - Login spread over two runs, driven by the stored challenge
//! ├── selection.rs - Picks the configured device out of the account
//! ├── local_credentials.rs - Decrypts the broker password from the manifest
//! ├── models.rs    - Credentials, challenge, session and wire DTOs
//! └── error.rs     - CloudError
//! ```
//!
//! The cloud is only contacted when the store has no devices yet. After a
//! successful login the bridge runs entirely on the local network.

pub mod client;
pub mod error;
pub mod flow;
pub mod local_credentials;
pub mod models;
pub mod selection;

pub use client::{CloudAuthClient, CloudSettings};
pub use error::CloudError;
pub use flow::{AuthFlow, AuthProgress};
pub use models::{AccountSession, ChallengeState, DeviceCredential};
pub use selection::select_device;
