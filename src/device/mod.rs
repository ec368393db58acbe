//! Device control for one purifier
//!
//! 1. [`intent`] - Host requests and their translation into commands
//! 2. [`controller`] - Snapshot ownership, inbound routing, publishing
//! 3. [`controller_handle`] - The task that serializes all of the above
//!
//! # Architecture
//!
//! ```text
//! MqttTransport ─[TransportEvent]─► ControllerHandle ─► DeviceController ─[ControllerEvent]─► host
//!                                          ▲                    │
//!                       host ─[CommandIntent]                   └─► CommandEncoder ─► MqttTransport
//! ```

pub mod controller;
pub mod controller_handle;
pub mod intent;

pub use controller::{Clock, ControllerError, ControllerEvent, DeviceController};
pub use controller_handle::{ControllerHandle, ControllerSettings};
pub use intent::{plan, CommandIntent};
