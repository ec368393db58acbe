//! Bridge between Dyson Pure Link purifiers and a home-automation host.
//!
//! ```text
//! cloud ──► persistence ──► device ◄──► mqtt
//!                              │
//!                           protocol
//! ```
//!
//! [`cloud`] logs in once and yields the local credentials of each device,
//! [`persistence`] keeps them (and a pending login) across restarts,
//! [`device`] owns one device's state and talks to it through [`mqtt`], and
//! [`protocol`] translates the vendor JSON in both directions.

pub mod cloud;
pub mod config;
pub mod device;
pub mod mqtt;
pub mod persistence;
pub mod protocol;
