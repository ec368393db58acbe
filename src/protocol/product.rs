//! Product families and their command vocabularies.
//!
//! Devices report a numeric product code. Each code belongs to exactly one
//! [`ProductFamily`], and each family owns a fixed table of the properties it
//! accepts commands for. Supporting a new product is an edit to
//! [`PRODUCT_TABLE`]; supporting a new family is a new table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Settable properties, each with a fixed `product-state` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    FanMode,
    FanPower,
    FanModeAuto,
    FanSpeed,
    Oscillation,
    NightMode,
    StandbyMonitoring,
    QualityTarget,
    Focus,
    HeatMode,
    HeatTarget,
    SleepTimer,
}

impl Property {
    pub fn wire_key(self) -> &'static str {
        match self {
            Property::FanMode => "fmod",
            Property::FanPower => "fpwr",
            Property::FanModeAuto => "auto",
            Property::FanSpeed => "fnsp",
            Property::Oscillation => "oson",
            Property::NightMode => "nmod",
            Property::StandbyMonitoring => "rhtm",
            Property::QualityTarget => "qtar",
            Property::Focus => "ffoc",
            Property::HeatMode => "hmod",
            Property::HeatTarget => "hmax",
            Property::SleepTimer => "sltm",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_key())
    }
}

/// Command vocabulary family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductFamily {
    /// Pre-2018 "Link" models: power is expressed through `fmod OFF/FAN/AUTO`.
    Link,
    /// 2018+ models: separate `fpwr` power switch and `auto` flag.
    PowerControl,
}

const LINK_VOCABULARY: &[Property] = &[
    Property::FanMode,
    Property::FanSpeed,
    Property::Oscillation,
    Property::NightMode,
    Property::StandbyMonitoring,
    Property::QualityTarget,
    Property::Focus,
    Property::HeatMode,
    Property::HeatTarget,
    Property::SleepTimer,
];

const POWER_CONTROL_VOCABULARY: &[Property] = &[
    Property::FanPower,
    Property::FanModeAuto,
    Property::FanSpeed,
    Property::Oscillation,
    Property::NightMode,
    Property::StandbyMonitoring,
    Property::QualityTarget,
    Property::Focus,
    Property::HeatMode,
    Property::HeatTarget,
    Property::SleepTimer,
];

impl ProductFamily {
    pub fn vocabulary(self) -> &'static [Property] {
        match self {
            ProductFamily::Link => LINK_VOCABULARY,
            ProductFamily::PowerControl => POWER_CONTROL_VOCABULARY,
        }
    }

    pub fn supports(self, property: Property) -> bool {
        self.vocabulary().contains(&property)
    }
}

/// Known product codes: (code, model, family).
pub const PRODUCT_TABLE: &[(&str, &str, ProductFamily)] = &[
    ("455", "Pure Hot+Cool Link", ProductFamily::Link),
    ("469", "Pure Cool Link Desk", ProductFamily::Link),
    ("475", "Pure Cool Link Tower", ProductFamily::Link),
    ("438", "Pure Cool Tower", ProductFamily::PowerControl),
    ("520", "Pure Cool Desk", ProductFamily::PowerControl),
    ("527", "Pure Hot+Cool", ProductFamily::PowerControl),
];

/// Product-type classifier as reported by the cloud, e.g. `"475"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductType(String);

impl ProductType {
    pub fn new(code: impl Into<String>) -> Self {
        ProductType(code.into().trim().to_string())
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    fn entry(&self) -> Option<&'static (&'static str, &'static str, ProductFamily)> {
        PRODUCT_TABLE.iter().find(|(code, _, _)| *code == self.0)
    }

    /// Unlisted codes fall back to the legacy vocabulary.
    pub fn family(&self) -> ProductFamily {
        self.entry()
            .map(|(_, _, family)| *family)
            .unwrap_or(ProductFamily::Link)
    }

    pub fn model(&self) -> Option<&'static str> {
        self.entry().map(|(_, model, _)| *model)
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
