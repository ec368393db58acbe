//! Decoding of `CURRENT-STATE` and `STATE-CHANGE` messages.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::error::CodecError;
use super::message::{self, WireField};
use super::values::{
    EnumeratedValue, FanMode, FanSpeed, FanState, HeatMode, HeatState, HeatTarget, QualityTarget,
    Toggle,
};

/// Which state message shape a payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Complete `product-state` dump (`CURRENT-STATE`).
    FullState,
    /// Delta with `[old, new]` pairs (`STATE-CHANGE`).
    StateChange,
    Unrecognized,
}

/// Decoded device state. `None` means not reported (or unknown) in the
/// message it came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub fan_mode: Option<FanMode>,
    pub fan_state: Option<FanState>,
    pub fan_power: Option<Toggle>,
    pub fan_speed: Option<FanSpeed>,
    pub oscillation: Option<Toggle>,
    pub night_mode: Option<Toggle>,
    pub standby_monitoring: Option<Toggle>,
    pub quality_target: Option<QualityTarget>,
    pub filter_life: Option<u32>,
    pub fan_mode_auto: Option<Toggle>,
    pub focus: Option<Toggle>,
    pub heat_mode: Option<HeatMode>,
    pub heat_target: Option<HeatTarget>,
    pub heat_state: Option<HeatState>,
}

macro_rules! overlay {
    ($target:expr, $delta:expr, $($field:ident),+) => {
        $(
            if $delta.$field.is_some() {
                $target.$field = $delta.$field;
            }
        )+
    };
}

impl StateSnapshot {
    /// Copies every field reported by `delta` over `self`, leaving the rest.
    pub fn merge(&mut self, delta: &StateSnapshot) {
        overlay!(
            self,
            delta,
            fan_mode,
            fan_state,
            fan_power,
            fan_speed,
            oscillation,
            night_mode,
            standby_monitoring,
            quality_target,
            filter_life,
            fan_mode_auto,
            focus,
            heat_mode,
            heat_target,
            heat_state
        );
    }

    pub fn is_empty(&self) -> bool {
        *self == StateSnapshot::default()
    }
}

pub struct StateCodec;

impl StateCodec {
    /// Never fails: anything that is not a state message is `Unrecognized`.
    pub fn classify(payload: &[u8]) -> MessageKind {
        match message::parse(payload) {
            Ok(value) => Self::classify_value(&value),
            Err(_) => MessageKind::Unrecognized,
        }
    }

    pub(crate) fn classify_value(message: &Value) -> MessageKind {
        match message::discriminator(message) {
            Some(message::CURRENT_STATE) => MessageKind::FullState,
            Some(message::STATE_CHANGE) => MessageKind::StateChange,
            _ => MessageKind::Unrecognized,
        }
    }

    pub fn decode(payload: &[u8]) -> Result<StateSnapshot, CodecError> {
        let message = message::parse(payload)?;
        Self::decode_value(&message)
    }

    pub(crate) fn decode_value(message: &Value) -> Result<StateSnapshot, CodecError> {
        let kind = Self::classify_value(message);
        if kind == MessageKind::Unrecognized {
            return Err(CodecError::UnrecognizedMessage(
                message::discriminator(message)
                    .unwrap_or("<missing msg>")
                    .to_string(),
            ));
        }

        let fields = message::object(message, message::PRODUCT_STATE_KEY);
        if fields.is_none() {
            debug!("{:?} message without product-state", kind);
        }

        Ok(StateSnapshot {
            fan_mode: enumerated(fields, "fmod"),
            fan_state: enumerated(fields, "fnst"),
            fan_power: enumerated(fields, "fpwr"),
            fan_speed: fan_speed(fields),
            oscillation: enumerated(fields, "oson"),
            night_mode: enumerated(fields, "nmod"),
            standby_monitoring: enumerated(fields, "rhtm"),
            quality_target: enumerated(fields, "qtar"),
            filter_life: integer(fields, "hflr").or_else(|| integer(fields, "filf")),
            fan_mode_auto: enumerated(fields, "auto"),
            focus: enumerated(fields, "ffoc"),
            heat_mode: enumerated(fields, "hmod"),
            heat_target: heat_target(fields),
            heat_state: enumerated(fields, "hsta"),
        })
    }
}

fn unrecognized(field: &'static str, value: String) {
    warn!("{}", CodecError::UnrecognizedField { field, value });
}

fn enumerated<T: EnumeratedValue>(
    fields: Option<&Map<String, Value>>,
    key: &'static str,
) -> Option<T> {
    let token = WireField::lookup(fields, key).current()?;
    let value = T::from_token(&token);
    if value.is_none() {
        unrecognized(key, token);
    }
    value
}

fn fan_speed(fields: Option<&Map<String, Value>>) -> Option<FanSpeed> {
    let raw = WireField::lookup(fields, "fnsp").current()?;
    let speed = FanSpeed::from_wire(&raw);
    if speed.is_none() {
        unrecognized("fnsp", raw);
    }
    speed
}

fn heat_target(fields: Option<&Map<String, Value>>) -> Option<HeatTarget> {
    let raw = WireField::lookup(fields, "hmax").current()?;
    let target = HeatTarget::from_wire(&raw);
    if target.is_none() {
        unrecognized("hmax", raw);
    }
    target
}

fn integer(fields: Option<&Map<String, Value>>, key: &'static str) -> Option<u32> {
    let raw = WireField::lookup(fields, key).current()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            unrecognized(key, raw);
            None
        }
    }
}
