//! # Device Protocol
//!
//! Translates between the vendor's MQTT JSON and the bridge's typed model.
//!
//! ```text
//! protocol/
//! ├── values.rs   - Enumerated vocabularies, fan speed, heat target, sleep timer
//! ├── product.rs  - Product codes, families and their command vocabularies
//! ├── message.rs  - Envelope constants and `[old, new]` field resolution
//! ├── state.rs    - CURRENT-STATE / STATE-CHANGE decoding
//! ├── sensor.rs   - Environmental sensor decoding
//! └── command.rs  - STATE-SET / REQUEST-CURRENT-STATE encoding
//! ```
//!
//! Everything in here is pure: no I/O, no shared state, no locks. Decoding
//! failures are reported as [`CodecError`] and never panic; encoding rejects
//! out-of-domain values with [`CommandError`] before a topic is produced.

pub mod command;
pub mod error;
pub mod message;
pub mod product;
pub mod sensor;
pub mod state;
pub mod values;

pub use command::{Command, CommandEncoder, OutboundMessage};
pub use error::{CodecError, CommandError};
pub use product::{ProductFamily, ProductType, Property};
pub use sensor::{SensorCodec, SensorSnapshot};
pub use state::{MessageKind, StateCodec, StateSnapshot};
pub use values::{
    EnumeratedValue, FanMode, FanSpeed, FanState, HeatMode, HeatState, HeatTarget, QualityTarget,
    SleepTimer, Toggle,
};
