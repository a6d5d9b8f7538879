//! Device kinds and their characteristic bindings.
//!
//! A physical device maps to a small set of characteristics, each fed
//! from one bus path through one converter. The mapping is data: a
//! [`DeviceKind`] yields its [`Binding`] list and the registration layer
//! turns bindings into subscriptions. Behavior varies by this data, not
//! by device-specific code paths.

use serde::{Deserialize, Serialize};

use crate::config::BridgeConfig;
use crate::convert::{CompareOp, ValueConverter};

/// A typed, externally observable property of an accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CharacteristicKind {
    On,
    Brightness,
    CurrentTemperature,
    CurrentRelativeHumidity,
    BatteryLevel,
    StatusLowBattery,
    ChargingState,
    LeakDetected,
    ContactState,
}

/// Tank contents determine the warning threshold and its direction:
/// supply tanks warn when low, holding tanks warn when full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TankKind {
    FreshWater,
    WasteWater,
    BlackWater,
    Fuel,
    Lubrication,
    LiveWell,
    Gas,
    Ballast,
}

impl TankKind {
    /// Parse the tank-type segment of a bus path.
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "freshWater" => Some(TankKind::FreshWater),
            "wasteWater" => Some(TankKind::WasteWater),
            "blackWater" => Some(TankKind::BlackWater),
            "fuel" => Some(TankKind::Fuel),
            "lubrication" => Some(TankKind::Lubrication),
            "liveWell" => Some(TankKind::LiveWell),
            "gas" => Some(TankKind::Gas),
            "ballast" => Some(TankKind::Ballast),
            _ => None,
        }
    }

    /// Holding tanks (waste, black water) warn when the level is high.
    fn warn_operator(&self) -> CompareOp {
        match self {
            TankKind::WasteWater | TankKind::BlackWater => CompareOp::Ge,
            _ => CompareOp::Le,
        }
    }

    fn warn_level(&self, config: &BridgeConfig) -> f64 {
        match self {
            TankKind::FreshWater => config.low_fresh_water_level,
            TankKind::WasteWater => config.high_waste_water_level,
            TankKind::BlackWater => config.high_black_water_level,
            TankKind::Fuel => config.low_fuel_level,
            TankKind::Lubrication => config.low_lubrication_level,
            TankKind::LiveWell => config.low_live_well_level,
            TankKind::Gas => config.low_gas_level,
            TankKind::Ballast => config.low_ballast_level,
        }
    }
}

/// The closed set of device kinds the bridge knows how to wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceKind {
    Switch,
    Dimmer,
    Temperature,
    Humidity,
    Tank(TankKind),
    Battery,
    BatterySoc,
    LeakSensor,
    ContactSensor { operator: CompareOp, threshold: f64 },
}

impl DeviceKind {
    /// Parse a free-form device type tag (configuration overrides and
    /// upstream metadata use "switch"/"dimmer" style tags).
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "switch" => Some(DeviceKind::Switch),
            "dimmer" => Some(DeviceKind::Dimmer),
            "temperature" => Some(DeviceKind::Temperature),
            "humidity" => Some(DeviceKind::Humidity),
            "battery" => Some(DeviceKind::Battery),
            "batterySOC" => Some(DeviceKind::BatterySoc),
            "leakSensor" => Some(DeviceKind::LeakSensor),
            _ => None,
        }
    }
}

/// One characteristic binding of a device: which path suffix feeds which
/// characteristic through which converter.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Dotted suffix appended to the device's base path; `None` means
    /// the base path itself carries the value.
    pub suffix: Option<&'static str>,
    pub characteristic: CharacteristicKind,
    pub converter: ValueConverter,
}

impl Binding {
    fn new(
        suffix: Option<&'static str>,
        characteristic: CharacteristicKind,
        converter: ValueConverter,
    ) -> Self {
        Self {
            suffix,
            characteristic,
            converter,
        }
    }
}

impl DeviceKind {
    /// The characteristic bindings for this device kind, with thresholds
    /// and truthy sets taken from configuration.
    pub fn bindings(&self, config: &BridgeConfig) -> Vec<Binding> {
        use CharacteristicKind::*;

        match self {
            DeviceKind::Switch => vec![Binding::new(
                Some("state"),
                On,
                ValueConverter::OnOff(config.switch_truthy()),
            )],
            DeviceKind::Dimmer => vec![
                Binding::new(
                    Some("state"),
                    On,
                    ValueConverter::OnOff(config.switch_truthy()),
                ),
                Binding::new(Some("dimmingLevel"), Brightness, ValueConverter::Percent),
            ],
            DeviceKind::Temperature => vec![Binding::new(
                None,
                CurrentTemperature,
                ValueConverter::KelvinToCelsius,
            )],
            DeviceKind::Humidity => vec![Binding::new(
                None,
                CurrentRelativeHumidity,
                ValueConverter::Percent,
            )],
            DeviceKind::Tank(kind) => {
                // Tank level is a 0..1 ratio; warning thresholds are in percent
                let warn = ValueConverter::scaled_threshold(
                    kind.warn_operator(),
                    kind.warn_level(config),
                    100.0,
                );
                vec![
                    Binding::new(
                        Some("currentLevel"),
                        CurrentRelativeHumidity,
                        ValueConverter::Percent,
                    ),
                    Binding::new(Some("currentLevel"), StatusLowBattery, warn),
                    Binding::new(Some("currentLevel"), BatteryLevel, ValueConverter::Percent),
                ]
            }
            DeviceKind::Battery => {
                let soc = ValueConverter::BatterySoc {
                    empty_voltage: config.empty_battery_voltage,
                    full_voltage: config.full_battery_voltage,
                };
                vec![
                    Binding::new(Some("voltage"), CurrentRelativeHumidity, soc.clone()),
                    Binding::new(Some("voltage"), BatteryLevel, soc),
                    Binding::new(
                        Some("voltage"),
                        StatusLowBattery,
                        ValueConverter::threshold(CompareOp::Le, config.low_battery_voltage),
                    ),
                    Binding::new(
                        Some("voltage"),
                        ChargingState,
                        ValueConverter::threshold(CompareOp::Ge, config.charging_battery_voltage),
                    ),
                ]
            }
            DeviceKind::BatterySoc => vec![
                Binding::new(
                    Some("capacity.stateOfCharge"),
                    CurrentRelativeHumidity,
                    ValueConverter::Percent,
                ),
                Binding::new(
                    Some("capacity.stateOfCharge"),
                    BatteryLevel,
                    ValueConverter::Percent,
                ),
                Binding::new(
                    Some("current"),
                    ChargingState,
                    ValueConverter::threshold(CompareOp::Gt, 0.0),
                ),
                Binding::new(
                    Some("voltage"),
                    StatusLowBattery,
                    ValueConverter::threshold(CompareOp::Le, config.low_battery_voltage),
                ),
            ],
            DeviceKind::LeakSensor => vec![Binding::new(
                Some("state"),
                LeakDetected,
                ValueConverter::OnOff(config.switch_truthy()),
            )],
            DeviceKind::ContactSensor {
                operator,
                threshold,
            } => vec![Binding::new(
                None,
                ContactState,
                ValueConverter::threshold(*operator, *threshold),
            )],
        }
    }
}
