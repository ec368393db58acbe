//! Envelope-level helpers shared by the codecs.

use serde_json::{Map, Value};

use super::error::CodecError;

pub const CURRENT_STATE: &str = "CURRENT-STATE";
pub const STATE_CHANGE: &str = "STATE-CHANGE";
pub const SENSOR_DATA: &str = "ENVIRONMENTAL-CURRENT-SENSOR-DATA";
pub const STATE_SET: &str = "STATE-SET";
pub const REQUEST_CURRENT_STATE: &str = "REQUEST-CURRENT-STATE";

pub const MSG_KEY: &str = "msg";
pub const PRODUCT_STATE_KEY: &str = "product-state";
pub const DATA_KEY: &str = "data";

pub(crate) fn parse(payload: &[u8]) -> Result<Value, CodecError> {
    Ok(serde_json::from_slice(payload)?)
}

pub(crate) fn discriminator(message: &Value) -> Option<&str> {
    message.get(MSG_KEY).and_then(Value::as_str)
}

pub(crate) fn object<'a>(message: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    message.get(key).and_then(Value::as_object)
}

/// One `product-state` entry as it arrives on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireField<'a> {
    Absent,
    Scalar(&'a Value),
    Transition { old: &'a Value, new: &'a Value },
}

impl<'a> WireField<'a> {
    pub fn lookup(fields: Option<&'a Map<String, Value>>, key: &str) -> Self {
        match fields.and_then(|f| f.get(key)) {
            None | Some(Value::Null) => WireField::Absent,
            Some(Value::Array(pair)) if pair.len() == 2 => WireField::Transition {
                old: &pair[0],
                new: &pair[1],
            },
            Some(value) => WireField::Scalar(value),
        }
    }

    /// The value the device holds now: the second element of a transition.
    pub fn current(&self) -> Option<String> {
        let value = match self {
            WireField::Absent => return None,
            WireField::Scalar(value) => value,
            WireField::Transition { new, .. } => new,
        };
        match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
