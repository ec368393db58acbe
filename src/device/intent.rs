//! Host-level requests and how they become device commands.

use crate::protocol::{
    Command, FanMode, FanSpeed, HeatMode, HeatTarget, ProductFamily, QualityTarget, SleepTimer,
    Toggle,
};

/// What the host wants the device to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandIntent {
    SetFanSpeed(FanSpeed),
    SetFanMode(FanMode),
    SetFanModeAuto(Toggle),
    TurnOff,
    SetOscillation(Toggle),
    SetNightMode(Toggle),
    SetStandbyMonitoring(Toggle),
    SetQualityTarget(QualityTarget),
    SetFocus(Toggle),
    SetHeatMode(HeatMode),
    SetHeatTarget(HeatTarget),
    SetSleepTimer(SleepTimer),
}

/// Translates `intent` into the commands `family` understands, in publish
/// order.
///
/// A command that switches the fan on comes before the speed it enables. A
/// command that switches it off comes after everything else. Vocabulary
/// checks are left to the encoder, so an intent the family cannot express
/// still yields its command and fails there.
pub fn plan(intent: CommandIntent, family: ProductFamily) -> Vec<Command> {
    use CommandIntent::*;
    use ProductFamily::*;

    match (intent, family) {
        (SetFanSpeed(FanSpeed::Auto), Link) => vec![Command::FanMode(FanMode::Auto)],
        (SetFanSpeed(FanSpeed::Auto), PowerControl) => vec![
            Command::FanPower(Toggle::On),
            Command::FanModeAuto(Toggle::On),
        ],
        (SetFanSpeed(level), Link) => vec![
            Command::FanMode(FanMode::Fan),
            Command::FanSpeed(level),
        ],
        (SetFanSpeed(level), PowerControl) => vec![
            Command::FanPower(Toggle::On),
            Command::FanSpeed(level),
        ],

        (SetFanMode(mode), Link) => vec![Command::FanMode(mode)],
        (SetFanMode(FanMode::Off), PowerControl) => vec![Command::FanPower(Toggle::Off)],
        (SetFanMode(FanMode::Fan), PowerControl) => vec![Command::FanPower(Toggle::On)],
        (SetFanMode(FanMode::Auto), PowerControl) => vec![
            Command::FanPower(Toggle::On),
            Command::FanModeAuto(Toggle::On),
        ],

        (SetFanModeAuto(toggle), PowerControl) => vec![Command::FanModeAuto(toggle)],
        (SetFanModeAuto(Toggle::On), Link) => vec![Command::FanMode(FanMode::Auto)],
        (SetFanModeAuto(Toggle::Off), Link) => vec![Command::FanMode(FanMode::Fan)],

        (TurnOff, Link) => vec![Command::FanMode(FanMode::Off)],
        (TurnOff, PowerControl) => vec![Command::FanPower(Toggle::Off)],

        (SetOscillation(toggle), _) => vec![Command::Oscillation(toggle)],
        (SetNightMode(toggle), _) => vec![Command::NightMode(toggle)],
        (SetStandbyMonitoring(toggle), _) => vec![Command::StandbyMonitoring(toggle)],
        (SetQualityTarget(target), _) => vec![Command::QualityTarget(target)],
        (SetFocus(toggle), _) => vec![Command::Focus(toggle)],
        (SetHeatMode(mode), _) => vec![Command::HeatMode(mode)],
        (SetHeatTarget(target), _) => vec![Command::HeatTarget(target)],
        (SetSleepTimer(timer), _) => vec![Command::SleepTimer(timer)],
    }
}
