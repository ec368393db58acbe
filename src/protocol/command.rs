//! Encoding of outbound `STATE-SET` and `REQUEST-CURRENT-STATE` commands.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::error::CommandError;
use super::message;
use super::product::{ProductFamily, Property};
use super::values::{
    EnumeratedValue, FanMode, FanSpeed, HeatMode, HeatTarget, QualityTarget, SleepTimer, Toggle,
};

const MODE_REASON: &str = "LAPP";

/// A single property assignment, the unit the device accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    FanMode(FanMode),
    FanPower(Toggle),
    FanModeAuto(Toggle),
    FanSpeed(FanSpeed),
    Oscillation(Toggle),
    NightMode(Toggle),
    StandbyMonitoring(Toggle),
    QualityTarget(QualityTarget),
    Focus(Toggle),
    HeatMode(HeatMode),
    HeatTarget(HeatTarget),
    SleepTimer(SleepTimer),
}

impl Command {
    pub fn property(&self) -> Property {
        match self {
            Command::FanMode(_) => Property::FanMode,
            Command::FanPower(_) => Property::FanPower,
            Command::FanModeAuto(_) => Property::FanModeAuto,
            Command::FanSpeed(_) => Property::FanSpeed,
            Command::Oscillation(_) => Property::Oscillation,
            Command::NightMode(_) => Property::NightMode,
            Command::StandbyMonitoring(_) => Property::StandbyMonitoring,
            Command::QualityTarget(_) => Property::QualityTarget,
            Command::Focus(_) => Property::Focus,
            Command::HeatMode(_) => Property::HeatMode,
            Command::HeatTarget(_) => Property::HeatTarget,
            Command::SleepTimer(_) => Property::SleepTimer,
        }
    }

    /// Wire token for the value, validated against the property's range.
    pub fn wire_value(&self) -> Result<String, CommandError> {
        match self {
            Command::FanMode(mode) => Ok(mode.token().to_string()),
            Command::FanPower(t)
            | Command::FanModeAuto(t)
            | Command::Oscillation(t)
            | Command::NightMode(t)
            | Command::StandbyMonitoring(t)
            | Command::Focus(t) => Ok(t.token().to_string()),
            Command::QualityTarget(target) => Ok(target.token().to_string()),
            Command::HeatMode(mode) => Ok(mode.token().to_string()),
            Command::FanSpeed(speed) => speed.to_wire(),
            Command::HeatTarget(target) => target.to_wire(),
            Command::SleepTimer(timer) => timer.to_wire(),
        }
    }

    /// Whether this command switches the fan on or off, if it does either.
    pub fn power_effect(&self) -> Option<bool> {
        match self {
            Command::FanPower(t) => Some(*t == Toggle::On),
            Command::FanMode(mode) => Some(*mode != FanMode::Off),
            _ => None,
        }
    }
}

/// Topic and serialized payload ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    pub fn payload_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or("<binary>")
    }
}

#[derive(Serialize)]
struct StateSetPayload<'a> {
    msg: &'static str,
    time: String,
    #[serde(rename = "mode-reason")]
    mode_reason: &'static str,
    data: BTreeMap<&'static str, &'a str>,
}

#[derive(Serialize)]
struct RequestStatePayload {
    msg: &'static str,
    time: String,
}

/// Per-device encoder. The product family is fixed at construction so one
/// device never mixes vocabularies.
#[derive(Debug, Clone)]
pub struct CommandEncoder {
    family: ProductFamily,
    command_topic: String,
}

impl CommandEncoder {
    pub fn new(family: ProductFamily, base_topic: &str) -> Self {
        Self {
            family,
            command_topic: format!("{}/command", base_topic),
        }
    }

    pub fn family(&self) -> ProductFamily {
        self.family
    }

    pub fn encode(
        &self,
        command: &Command,
        timestamp: DateTime<Utc>,
    ) -> Result<OutboundMessage, CommandError> {
        let property = command.property();
        if !self.family.supports(property) {
            return Err(CommandError::InvalidCommand(format!(
                "'{}' is not part of the {:?} vocabulary",
                property, self.family
            )));
        }
        let value = command.wire_value()?;

        let mut data = BTreeMap::new();
        data.insert(property.wire_key(), value.as_str());
        let payload = StateSetPayload {
            msg: message::STATE_SET,
            time: iso_timestamp(timestamp),
            mode_reason: MODE_REASON,
            data,
        };
        debug!("Encoded {:?} for {:?} family", command, self.family);
        self.serialize(&payload)
    }

    pub fn request_current_state(
        &self,
        timestamp: DateTime<Utc>,
    ) -> Result<OutboundMessage, CommandError> {
        self.serialize(&RequestStatePayload {
            msg: message::REQUEST_CURRENT_STATE,
            time: iso_timestamp(timestamp),
        })
    }

    fn serialize<T: Serialize>(&self, payload: &T) -> Result<OutboundMessage, CommandError> {
        let payload = serde_json::to_vec(payload)
            .map_err(|e| CommandError::InvalidCommand(e.to_string()))?;
        Ok(OutboundMessage {
            topic: self.command_topic.clone(),
            payload,
        })
    }
}

fn iso_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
