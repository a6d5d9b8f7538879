//! Bridge configuration.
//!
//! Mirrors the camelCase JSON configuration of the reference setup:
//! upstream host and credentials, battery voltage thresholds, tank
//! warning levels, contact sensor definitions, and per-path overrides.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::convert::{CompareOp, TruthySet};

const API_PATH: &str = "signalk/v1/api/vessels/self/";
// "subscribe=none" streams only the heartbeat until we send subscribe frames
const STREAM_PATH: &str = "signalk/v1/stream?subscribe=none";

/// Errors that can occur loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no upstream host configured")]
    MissingHost,
    #[error("failed to read configuration: {0}")]
    Read(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A configured contact sensor: a bus path compared against a threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSensorConfig {
    /// Bus path holding the observed value.
    pub key: String,
    /// Optional display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Comparison operator, default `>`.
    #[serde(default)]
    pub operator: CompareOp,
    /// Threshold to compare against, default 0. The historical spelling
    /// "treshold" is accepted for compatibility.
    #[serde(default, alias = "treshold")]
    pub threshold: f64,
}

/// Bridge configuration with reference defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Upstream Signal K host, e.g. "demo.signalk.org" or "10.0.0.2:3000".
    pub host: String,
    /// Use https/wss.
    pub ssl: bool,
    /// Optional JWT security token attached to HTTP and stream requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_token: Option<String>,

    // Battery voltage thresholds (24 V bank defaults)
    pub empty_battery_voltage: f64,
    pub low_battery_voltage: f64,
    pub full_battery_voltage: f64,
    pub charging_battery_voltage: f64,

    // Tank warning levels in percent
    pub low_fresh_water_level: f64,
    pub high_waste_water_level: f64,
    pub high_black_water_level: f64,
    pub low_fuel_level: f64,
    pub low_lubrication_level: f64,
    pub low_live_well_level: f64,
    pub low_gas_level: f64,
    pub low_ballast_level: f64,

    /// Raw values the switch/dimmer family treats as "on". When unset,
    /// the default truthy set applies (true, "true", "on", positive numbers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_on_values: Option<Vec<serde_json::Value>>,

    /// Contact sensor definitions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contact_sensors: Vec<ContactSensorConfig>,

    /// Bus paths excluded from discovery.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_paths: Vec<String>,
    /// Display name overrides by bus path.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub display_names: HashMap<String, String>,
    /// Device type overrides by bus path (e.g. force "dimmer").
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub device_types: HashMap<String, String>,

    /// Remove accessories whose bus paths answer 404 during rediscovery.
    /// Off by default: a temporarily unreachable sensor keeps its
    /// accessory and simply stops updating.
    pub remove_devices_not_present: bool,

    /// Delay before reconnecting after a stream failure.
    pub reconnect_delay_secs: u64,
    /// Delay before the first discovery pass, giving the upstream time
    /// to build its API tree.
    pub initialize_delay_secs: u64,
    /// Interval between discovery passes for new devices.
    pub rediscovery_interval_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            ssl: false,
            security_token: None,
            empty_battery_voltage: 22.0,
            low_battery_voltage: 23.5,
            full_battery_voltage: 25.8,
            charging_battery_voltage: 27.0,
            low_fresh_water_level: 25.0,
            high_waste_water_level: 75.0,
            high_black_water_level: 75.0,
            low_fuel_level: 50.0,
            low_lubrication_level: 50.0,
            low_live_well_level: 50.0,
            low_gas_level: 50.0,
            low_ballast_level: 50.0,
            switch_on_values: None,
            contact_sensors: Vec::new(),
            ignored_paths: Vec::new(),
            display_names: HashMap::new(),
            device_types: HashMap::new(),
            remove_devices_not_present: false,
            reconnect_delay_secs: 5,
            initialize_delay_secs: 10,
            rediscovery_interval_secs: 15 * 60,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a JSON file and validate it.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: BridgeConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        Ok(())
    }

    /// REST API base URL for the self vessel, with trailing slash.
    pub fn api_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}/{}", scheme, self.host, API_PATH)
    }

    /// Streaming endpoint URL.
    pub fn stream_url(&self) -> String {
        let scheme = if self.ssl { "wss" } else { "ws" };
        format!("{}://{}/{}", scheme, self.host, STREAM_PATH)
    }

    /// Truthy set for the switch/dimmer family.
    pub fn switch_truthy(&self) -> TruthySet {
        match &self.switch_on_values {
            Some(values) => TruthySet::from_values(values.clone()),
            None => TruthySet::default(),
        }
    }

    /// True if the path is not excluded by configuration.
    pub fn path_allowed(&self, path: &str) -> bool {
        !self.ignored_paths.iter().any(|p| p == path)
    }

    /// Display name override for a path, if configured.
    pub fn display_name(&self, path: &str) -> Option<&str> {
        self.display_names.get(path).map(String::as_str)
    }

    /// Device type override for a path, if configured.
    pub fn device_type(&self, path: &str) -> Option<&str> {
        self.device_types.get(path).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_reference() {
        let config = BridgeConfig::default();
        assert_eq!(config.empty_battery_voltage, 22.0);
        assert_eq!(config.low_battery_voltage, 23.5);
        assert_eq!(config.full_battery_voltage, 25.8);
        assert_eq!(config.charging_battery_voltage, 27.0);
        assert_eq!(config.low_fresh_water_level, 25.0);
        assert_eq!(config.high_waste_water_level, 75.0);
        assert_eq!(config.low_fuel_level, 50.0);
        assert_eq!(config.reconnect_delay_secs, 5);
        assert_eq!(config.rediscovery_interval_secs, 900);
        assert!(!config.remove_devices_not_present);
    }

    #[test]
    fn test_urls() {
        let config = BridgeConfig {
            host: "boat.local:3000".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.api_url(),
            "http://boat.local:3000/signalk/v1/api/vessels/self/"
        );
        assert_eq!(
            config.stream_url(),
            "ws://boat.local:3000/signalk/v1/stream?subscribe=none"
        );

        let tls = BridgeConfig {
            ssl: true,
            ..config
        };
        assert!(tls.api_url().starts_with("https://"));
        assert!(tls.stream_url().starts_with("wss://"));
    }

    #[test]
    fn test_parse_camel_case() {
        let json = r#"{
            "host": "10.0.0.2",
            "securityToken": "abc.def.ghi",
            "lowBatteryVoltage": 11.8,
            "removeDevicesNotPresent": true,
            "ignoredPaths": ["electrical.switches.venus-0"],
            "contactSensors": [
                {"key": "propulsion.port.revolutions", "operator": "<=", "treshold": 25}
            ]
        }"#;
        let config: BridgeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.host, "10.0.0.2");
        assert_eq!(config.security_token.as_deref(), Some("abc.def.ghi"));
        assert_eq!(config.low_battery_voltage, 11.8);
        assert!(config.remove_devices_not_present);
        assert!(!config.path_allowed("electrical.switches.venus-0"));
        assert!(config.path_allowed("electrical.switches.venus-1"));
        assert_eq!(config.contact_sensors.len(), 1);
        assert_eq!(config.contact_sensors[0].operator, CompareOp::Le);
        assert_eq!(config.contact_sensors[0].threshold, 25.0);
    }

    #[test]
    fn test_validate_requires_host() {
        let config = BridgeConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingHost)));
    }

    #[test]
    fn test_custom_switch_truthy() {
        let json = r#"{"host": "x", "switchOnValues": ["on", "1", 1, true]}"#;
        let config: BridgeConfig = serde_json::from_str(json).unwrap();
        let set = config.switch_truthy();
        assert!(set.contains(&serde_json::json!("1")));
        assert!(!set.contains(&serde_json::json!(2)));
    }
}
