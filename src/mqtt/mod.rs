//! # MQTT Transport Module
//!
//! Owns the connection to a device's local MQTT broker.
//!
//! ## Why This Module Exists
//!
//! The device controller only needs to publish commands and subscribe to the
//! device's status topics. Everything about sockets, reconnects and packet
//! types stays in here, behind the [`MqttTransport`] trait, so the controller
//! can be driven by a recording fake in tests.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker address, device credentials, timings
//! ├── message_manager.rs  - Inbound messages and transport events
//! └── transport.rs        - MqttTransport trait and the rumqttc implementation
//! ```
//!
//! ## Connection Lifecycle
//!
//! [`RumqttTransport::connect`] spawns the event loop task and returns at once.
//! The loop reports [`TransportEvent::Connected`] on every broker ConnAck,
//! forwards publishes as [`TransportEvent::Message`] over an `mpsc` channel,
//! and keeps polling (which reconnects) after errors until its
//! `CancellationToken` fires. Publishing while not connected fails with
//! [`TransportError::TransportUnavailable`]; nothing is queued.

pub mod config;
pub mod message_manager;
pub mod transport;

pub use config::MqttConfig;
pub use message_manager::{InboundMessage, TransportEvent};
pub use transport::{ConnectionState, MqttTransport, RumqttTransport, TransportError};
