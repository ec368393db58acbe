//! Value types carried by device state and commands.
//!
//! Every on/off or mode-like property is a small closed vocabulary
//! implementing [`EnumeratedValue`]: a wire token plus an ordinal. Numeric
//! properties that also accept a reserved token (`AUTO`, `OFF`) get their own
//! types so the sentinel can never be mistaken for a level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::CommandError;

/// A named state out of a fixed vocabulary with a stable integer ordinal.
///
/// `from_ordinal(v.ordinal())` and `from_token(v.token())` both give `v` back.
pub trait EnumeratedValue: Sized + Copy + Eq + 'static {
    /// All values in ordinal order.
    const ALL: &'static [Self];

    fn ordinal(&self) -> u8;

    /// Token as it appears on the wire.
    fn token(&self) -> &'static str;

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.token() == token)
    }

    fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.ordinal() == ordinal)
    }
}

/// Declares a vocabulary enum. Ordinals follow declaration order.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $token:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl EnumeratedValue for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn ordinal(&self) -> u8 {
                *self as u8
            }

            fn token(&self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.token())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$name as EnumeratedValue>::from_token(s)
                    .ok_or_else(|| format!("unknown {} token '{}'", stringify!($name), s))
            }
        }
    };
}

vocabulary! {
    /// Legacy fan mode (`fmod`).
    FanMode { Off => "OFF", Fan => "FAN", Auto => "AUTO" }
}

vocabulary! {
    /// Whether the fan is currently moving air (`fnst`, read only).
    FanState { Off => "OFF", Fan => "FAN" }
}

vocabulary! {
    /// Plain on/off switch used by most boolean properties.
    Toggle { Off => "OFF", On => "ON" }
}

vocabulary! {
    /// Air quality target sensitivity (`qtar`).
    QualityTarget { Normal => "0004", Medium => "0003", High => "0001" }
}

vocabulary! {
    HeatMode { Off => "OFF", Heat => "HEAT" }
}

vocabulary! {
    /// Whether the heating element is active (`hsta`, read only).
    HeatState { Off => "OFF", Heat => "HEAT" }
}

impl From<bool> for Toggle {
    fn from(on: bool) -> Self {
        if on {
            Toggle::On
        } else {
            Toggle::Off
        }
    }
}

/// Fan speed: a fixed level or the `AUTO` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FanSpeed {
    Level(u8),
    Auto,
}

impl FanSpeed {
    pub const MIN_LEVEL: u8 = 1;
    pub const MAX_LEVEL: u8 = 10;

    /// Parses the wire form: `"AUTO"` or a zero-padded decimal level in range.
    pub fn from_wire(raw: &str) -> Option<Self> {
        if raw == "AUTO" {
            return Some(FanSpeed::Auto);
        }
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let level: u8 = raw.parse().ok()?;
        (Self::MIN_LEVEL..=Self::MAX_LEVEL)
            .contains(&level)
            .then_some(FanSpeed::Level(level))
    }

    pub fn to_wire(self) -> Result<String, CommandError> {
        match self {
            FanSpeed::Auto => Ok("AUTO".to_string()),
            FanSpeed::Level(level) if (Self::MIN_LEVEL..=Self::MAX_LEVEL).contains(&level) => {
                Ok(format!("{:04}", level))
            }
            FanSpeed::Level(level) => Err(CommandError::InvalidCommand(format!(
                "fan speed {} outside {}..={}",
                level,
                Self::MIN_LEVEL,
                Self::MAX_LEVEL
            ))),
        }
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanSpeed::Level(level) => write!(f, "{}", level),
            FanSpeed::Auto => f.write_str("AUTO"),
        }
    }
}

/// Heating target in decikelvin, the unit the device reports (`hmax`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeatTarget(u16);

impl HeatTarget {
    pub const MIN_CELSIUS: u16 = 1;
    pub const MAX_CELSIUS: u16 = 37;
    const KELVIN_OFFSET: u16 = 273;

    pub fn from_celsius(celsius: u16) -> Result<Self, CommandError> {
        if !(Self::MIN_CELSIUS..=Self::MAX_CELSIUS).contains(&celsius) {
            return Err(CommandError::InvalidCommand(format!(
                "heat target {}°C outside {}..={}",
                celsius,
                Self::MIN_CELSIUS,
                Self::MAX_CELSIUS
            )));
        }
        Ok(HeatTarget((celsius + Self::KELVIN_OFFSET) * 10))
    }

    /// Wraps a raw reading without range checks. Encoding validates.
    pub fn from_decikelvin(decikelvin: u16) -> Self {
        HeatTarget(decikelvin)
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().map(HeatTarget)
    }

    pub fn decikelvin(self) -> u16 {
        self.0
    }

    pub fn kelvin(self) -> f64 {
        f64::from(self.0) / 10.0
    }

    pub fn to_wire(self) -> Result<String, CommandError> {
        let min = (Self::MIN_CELSIUS + Self::KELVIN_OFFSET) * 10;
        let max = (Self::MAX_CELSIUS + Self::KELVIN_OFFSET) * 10;
        if !(min..=max).contains(&self.0) {
            return Err(CommandError::InvalidCommand(format!(
                "heat target {}dK outside {}..={}",
                self.0, min, max
            )));
        }
        Ok(format!("{:04}", self.0))
    }
}

impl fmt::Display for HeatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}K", self.kelvin())
    }
}

/// Sleep timer; `Off` doubles as the "nothing reported" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SleepTimer {
    #[default]
    Off,
    Minutes(u16),
}

impl SleepTimer {
    pub const MAX_MINUTES: u16 = 540;

    pub fn from_wire(raw: &str) -> Option<Self> {
        if raw == "OFF" {
            return Some(SleepTimer::Off);
        }
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match raw.parse::<u16>().ok()? {
            0 => Some(SleepTimer::Off),
            minutes => Some(SleepTimer::Minutes(minutes)),
        }
    }

    pub fn to_wire(self) -> Result<String, CommandError> {
        match self {
            SleepTimer::Off => Ok("OFF".to_string()),
            SleepTimer::Minutes(minutes) if (1..=Self::MAX_MINUTES).contains(&minutes) => {
                Ok(format!("{:04}", minutes))
            }
            SleepTimer::Minutes(minutes) => Err(CommandError::InvalidCommand(format!(
                "sleep timer {} minutes outside 1..={}",
                minutes,
                Self::MAX_MINUTES
            ))),
        }
    }
}

impl fmt::Display for SleepTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepTimer::Off => f.write_str("OFF"),
            SleepTimer::Minutes(minutes) => write!(f, "{}min", minutes),
        }
    }
}
