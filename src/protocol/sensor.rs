//! Decoding of `ENVIRONMENTAL-CURRENT-SENSOR-DATA` messages.
//!
//! Sensor values arrive as fixed-width decimal strings under `data`. While a
//! sensor warms up or is disabled the device sends `"INIT"` or `"OFF"`
//! instead; those decode to `None` because `0` is a legitimate reading.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::error::CodecError;
use super::message::{self, WireField};
use super::values::{HeatTarget, SleepTimer};

const SENSOR_KEYS: &[&str] = &[
    "tact", "hact", "vact", "va10", "pact", "pm25", "pm10", "p25r", "p10r", "noxl", "sltm",
];

const NOT_AVAILABLE: &[&str] = &["OFF", "INIT"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorSnapshot {
    /// Kelvin.
    pub temperature: Option<f64>,
    /// Relative humidity, percent.
    pub humidity: Option<u32>,
    pub volatile_compounds: Option<u32>,
    pub particles: Option<u32>,
    pub particles2_5: Option<u32>,
    pub particles10: Option<u32>,
    pub particulate_matter_25: Option<u32>,
    pub particulate_matter_10: Option<u32>,
    pub nitrogen_dioxide_density: Option<u32>,
    pub heat_target: Option<HeatTarget>,
    pub sleep_timer: SleepTimer,
}

impl SensorSnapshot {
    /// Temperature converted for display; the snapshot itself stays in Kelvin.
    pub fn temperature_celsius(&self) -> Option<f64> {
        self.temperature.map(|kelvin| kelvin - 273.15)
    }
}

pub struct SensorCodec;

impl SensorCodec {
    pub fn is_sensor_payload(payload: &[u8]) -> bool {
        message::parse(payload)
            .map(|value| Self::is_sensor_value(&value))
            .unwrap_or(false)
    }

    pub(crate) fn is_sensor_value(message: &Value) -> bool {
        if message::discriminator(message) == Some(message::SENSOR_DATA) {
            return true;
        }
        message::object(message, message::DATA_KEY)
            .map(|data| SENSOR_KEYS.iter().any(|key| data.contains_key(*key)))
            .unwrap_or(false)
    }

    pub fn decode(payload: &[u8]) -> Result<SensorSnapshot, CodecError> {
        let message = message::parse(payload)?;
        Self::decode_value(&message)
    }

    pub(crate) fn decode_value(message: &Value) -> Result<SensorSnapshot, CodecError> {
        if !Self::is_sensor_value(message) {
            return Err(CodecError::UnrecognizedMessage(
                message::discriminator(message)
                    .unwrap_or("<missing msg>")
                    .to_string(),
            ));
        }
        let data = message::object(message, message::DATA_KEY);

        Ok(SensorSnapshot {
            temperature: reading(data, "tact").map(|decikelvin| f64::from(decikelvin) / 10.0),
            humidity: reading(data, "hact"),
            volatile_compounds: reading(data, "va10").or_else(|| reading(data, "vact")),
            particles: reading(data, "pact"),
            particles2_5: reading(data, "pm25"),
            particles10: reading(data, "pm10"),
            particulate_matter_25: reading(data, "p25r"),
            particulate_matter_10: reading(data, "p10r"),
            nitrogen_dioxide_density: reading(data, "noxl"),
            heat_target: reading(data, "hmax")
                .and_then(|raw| u16::try_from(raw).ok())
                .map(HeatTarget::from_decikelvin),
            sleep_timer: sleep_timer(data),
        })
    }
}

fn reading(data: Option<&Map<String, Value>>, key: &'static str) -> Option<u32> {
    let raw = WireField::lookup(data, key).current()?;
    if NOT_AVAILABLE.contains(&raw.as_str()) {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("{}", CodecError::UnrecognizedField { field: key, value: raw });
            None
        }
    }
}

fn sleep_timer(data: Option<&Map<String, Value>>) -> SleepTimer {
    let Some(raw) = WireField::lookup(data, "sltm").current() else {
        return SleepTimer::default();
    };
    SleepTimer::from_wire(&raw).unwrap_or_else(|| {
        warn!("{}", CodecError::UnrecognizedField { field: "sltm", value: raw });
        SleepTimer::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_link_sensor_message() {
        let payload = br#"{
            "msg": "ENVIRONMENTAL-CURRENT-SENSOR-DATA",
            "time": "2026-10-16T08:00:00.000Z",
            "data": { "tact": "2956", "hact": "0045", "pact": "0004", "vact": "0001", "sltm": "0120" }
        }"#;
        assert!(SensorCodec::is_sensor_payload(payload));
        let snapshot = SensorCodec::decode(payload).unwrap();
        assert_eq!(
            snapshot,
            SensorSnapshot {
                temperature: Some(295.6),
                humidity: Some(45),
                particles: Some(4),
                volatile_compounds: Some(1),
                sleep_timer: SleepTimer::Minutes(120),
                ..SensorSnapshot::default()
            }
        );
    }

    #[test]
    fn off_and_init_are_unknown_not_zero() {
        let payload = br#"{
            "msg": "ENVIRONMENTAL-CURRENT-SENSOR-DATA",
            "data": { "tact": "OFF", "hact": "INIT", "pm25": "0000", "noxl": "INIT", "sltm": "OFF" }
        }"#;
        let snapshot = SensorCodec::decode(payload).unwrap();
        assert_eq!(snapshot.temperature, None);
        assert_eq!(snapshot.humidity, None);
        assert_eq!(snapshot.nitrogen_dioxide_density, None);
        assert_eq!(snapshot.particles2_5, Some(0));
        assert_eq!(snapshot.sleep_timer, SleepTimer::Off);
    }

    #[test]
    fn prefers_newer_volatile_reading() {
        let payload = br#"{
            "msg": "ENVIRONMENTAL-CURRENT-SENSOR-DATA",
            "data": { "va10": "0012", "vact": "0003", "p25r": "0007", "p10r": "0009", "hmax": "2950" }
        }"#;
        let snapshot = SensorCodec::decode(payload).unwrap();
        assert_eq!(snapshot.volatile_compounds, Some(12));
        assert_eq!(snapshot.particulate_matter_25, Some(7));
        assert_eq!(snapshot.particulate_matter_10, Some(9));
        assert_eq!(snapshot.heat_target, Some(HeatTarget::from_decikelvin(2950)));
    }

    #[test]
    fn sleep_timer_defaults_when_missing() {
        let payload = br#"{"msg":"ENVIRONMENTAL-CURRENT-SENSOR-DATA","data":{"tact":"2900"}}"#;
        assert_eq!(SensorCodec::decode(payload).unwrap().sleep_timer, SleepTimer::Off);
    }

    #[test]
    fn state_messages_are_not_sensor_payloads() {
        assert!(!SensorCodec::is_sensor_payload(
            br#"{"msg":"CURRENT-STATE","product-state":{"fmod":"FAN"}}"#
        ));
        assert!(!SensorCodec::is_sensor_payload(b"garbage"));
        assert!(SensorCodec::is_sensor_payload(
            br#"{"msg":"CURRENT-STATE","data":{"tact":"2900"}}"#
        ));
    }

    #[test]
    fn celsius_is_a_view_over_kelvin() {
        let snapshot = SensorSnapshot {
            temperature: Some(295.6),
            ..SensorSnapshot::default()
        };
        let celsius = snapshot.temperature_celsius().unwrap();
        assert!((celsius - 22.45).abs() < 1e-9);
    }
}
