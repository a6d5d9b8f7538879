//! Device discovery over a full-tree API snapshot.
//!
//! Walks the self-vessel JSON tree and produces candidate device records
//! for everything the bridge knows how to represent: electrical switches
//! and dimmers, environment sensors, tanks, batteries, engine
//! temperatures, and configured contact sensors. Discovery is pure tree
//! traversal; fetching the snapshot and deciding which candidates are
//! new is the caller's concern.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::device::{DeviceKind, TankKind};
use crate::path::BusPath;
use crate::value::RawValue;

const CONTROLS_PATH: &str = "electrical.switches";
const EMPIRBUS_IDENTIFIER: &str = "empirBusNxt";
const VENUS_IDENTIFIER: &str = "venus";
const TANKS_PATH: &str = "tanks";
const BATTERIES_PATH: &str = "electrical.batteries";
const ENVIRONMENT_PATH: &str = "environment";
const ENGINE_PATH: &str = "propulsion";

/// Environment data points worth surfacing, relative to `environment.`.
const ENVIRONMENTS: &[(&str, &str, DeviceKind)] = &[
    ("outside.temperature", "Outside", DeviceKind::Temperature),
    ("inside.temperature", "Inside", DeviceKind::Temperature),
    ("inside.engineRoom.temperature", "Engine Room", DeviceKind::Temperature),
    ("inside.mainCabin.temperature", "Main Cabin", DeviceKind::Temperature),
    ("inside.refrigerator.temperature", "Refrigerator", DeviceKind::Temperature),
    ("inside.freezer.temperature", "Freezer", DeviceKind::Temperature),
    ("inside.heating.temperature", "Heating", DeviceKind::Temperature),
    ("water.temperature", "Water", DeviceKind::Temperature),
    ("cpu.temperature", "Raspberry Pi", DeviceKind::Temperature),
    ("outside.humidity", "Outside", DeviceKind::Humidity),
    ("inside.relativeHumidity", "Inside", DeviceKind::Humidity),
    ("inside.engineRoom.relativeHumidity", "Engine Room", DeviceKind::Humidity),
    ("inside.mainCabin.relativeHumidity", "Main Cabin", DeviceKind::Humidity),
    ("inside.refrigerator.relativeHumidity", "Refrigerator", DeviceKind::Humidity),
    ("inside.freezer.relativeHumidity", "Freezer", DeviceKind::Humidity),
    ("inside.heating.relativeHumidity", "Heating", DeviceKind::Humidity),
];

/// Engine data points, relative to `propulsion.`.
const ENGINES: &[(&str, &str)] = &[
    ("port.temperature", "Engine port"),
    ("starboard.temperature", "Engine starboard"),
];

/// Stable accessory identifier, derived deterministically from the
/// device identifier so rediscovery yields the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessoryId(Uuid);

impl AccessoryId {
    pub fn from_identifier(identifier: &str) -> Self {
        AccessoryId(Uuid::new_v5(&Uuid::NAMESPACE_OID, identifier.as_bytes()))
    }
}

impl std::fmt::Display for AccessoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A discovered candidate device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub id: AccessoryId,
    /// Device identifier within its category (PUT requests address this).
    pub identifier: String,
    pub display_name: String,
    /// Base bus path the device's values hang off.
    pub path: BusPath,
    /// Category prefix the device was discovered under.
    pub category: BusPath,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub kind: DeviceKind,
}

impl DeviceDescriptor {
    #[allow(clippy::too_many_arguments)]
    fn new(
        display_name: String,
        identifier: &str,
        path: BusPath,
        category: &str,
        manufacturer: String,
        model: String,
        serial_number: String,
        kind: DeviceKind,
    ) -> Self {
        Self {
            id: AccessoryId::from_identifier(identifier),
            identifier: identifier.to_string(),
            display_name,
            path,
            category: BusPath::new(category),
            manufacturer,
            model,
            serial_number,
            kind,
        }
    }
}

/// Walk a full-tree snapshot and return every candidate device,
/// honoring ignored paths and display-name/device-type overrides.
pub fn discover_devices(tree: &RawValue, config: &BridgeConfig) -> Vec<DeviceDescriptor> {
    let mut devices = Vec::new();
    discover_controls(tree, config, &mut devices);
    discover_environment(tree, config, &mut devices);
    discover_tanks(tree, config, &mut devices);
    discover_batteries(tree, config, &mut devices);
    discover_engines(tree, config, &mut devices);
    discover_contact_sensors(tree, config, &mut devices);
    devices
}

/// Electrical controls: EmpirBus NXT components, Venus relays, and
/// anything generic with a `.state` child.
fn discover_controls(tree: &RawValue, config: &BridgeConfig, out: &mut Vec<DeviceDescriptor>) {
    let Some(controls) = tree_get(tree, CONTROLS_PATH).and_then(RawValue::as_object) else {
        return;
    };

    for (device, node) in controls {
        let path = format!("{CONTROLS_PATH}.{device}");
        if !config.path_allowed(&path) {
            continue;
        }

        let fallback = meta_display_name(node)
            .or_else(|| leaf_str(node, "name"))
            .unwrap_or(device.as_str());
        let display_name = config.display_name(&path).unwrap_or(fallback).to_string();

        if device.starts_with(EMPIRBUS_IDENTIFIER) {
            let kind = config
                .device_type(&path)
                .and_then(DeviceKind::from_type_tag)
                .or_else(|| leaf_str(node, "type").and_then(DeviceKind::from_type_tag))
                .unwrap_or(DeviceKind::Switch);
            let serial = leaf_str(node, "name").unwrap_or(device).to_string();
            out.push(DeviceDescriptor::new(
                display_name,
                device,
                BusPath::new(&path),
                CONTROLS_PATH,
                manufacturer_name(node).unwrap_or("EmpirBus").to_string(),
                manufacturer_model(node).unwrap_or("NXT DCM").to_string(),
                serial,
                kind,
            ));
        } else if device.starts_with(VENUS_IDENTIFIER) {
            out.push(DeviceDescriptor::new(
                display_name,
                device,
                BusPath::new(&path),
                CONTROLS_PATH,
                manufacturer_name(node).unwrap_or("Victron Energy").to_string(),
                manufacturer_model(node).unwrap_or("Venus GX").to_string(),
                device.to_string(),
                DeviceKind::Switch,
            ));
        } else if node.get("state").is_some() {
            out.push(DeviceDescriptor::new(
                display_name,
                device,
                BusPath::new(&path),
                CONTROLS_PATH,
                manufacturer_name(node).unwrap_or("Unknown").to_string(),
                manufacturer_model(node).unwrap_or("Generic Switch").to_string(),
                device.to_string(),
                DeviceKind::Switch,
            ));
        }
    }
}

fn discover_environment(tree: &RawValue, config: &BridgeConfig, out: &mut Vec<DeviceDescriptor>) {
    for (key, name, kind) in ENVIRONMENTS {
        let path = format!("{ENVIRONMENT_PATH}.{key}");
        if tree_get(tree, &path).is_none() || !config.path_allowed(&path) {
            continue;
        }
        let display_name = config.display_name(&path).unwrap_or(name).to_string();
        out.push(DeviceDescriptor::new(
            display_name,
            key,
            BusPath::new(&path),
            ENVIRONMENT_PATH,
            "NMEA".to_string(),
            format!("{name} Sensor"),
            (*name).to_string(),
            kind.clone(),
        ));
    }
}

fn discover_tanks(tree: &RawValue, config: &BridgeConfig, out: &mut Vec<DeviceDescriptor>) {
    let Some(tanks) = tree_get(tree, TANKS_PATH).and_then(RawValue::as_object) else {
        return;
    };

    for (tank_type, instances) in tanks {
        let Some(kind) = TankKind::from_path_segment(tank_type) else {
            continue;
        };
        let Some(instances) = instances.as_object() else {
            continue;
        };
        for instance in instances.keys() {
            let path = format!("{TANKS_PATH}.{tank_type}.{instance}");
            if !config.path_allowed(&path) {
                continue;
            }
            let device_key = format!("{tank_type}.{instance}");
            let display_name = config
                .display_name(&path)
                .unwrap_or(tank_type.as_str())
                .to_string();
            out.push(DeviceDescriptor::new(
                display_name,
                &device_key,
                BusPath::new(&path),
                TANKS_PATH,
                "NMEA".to_string(),
                tank_type.to_string(),
                device_key.clone(),
                DeviceKind::Tank(kind),
            ));
        }
    }
}

fn discover_batteries(tree: &RawValue, config: &BridgeConfig, out: &mut Vec<DeviceDescriptor>) {
    let Some(batteries) = tree_get(tree, BATTERIES_PATH).and_then(RawValue::as_object) else {
        return;
    };

    for (instance, node) in batteries {
        let path = format!("{BATTERIES_PATH}.{instance}");
        if !config.path_allowed(&path) {
            continue;
        }
        // Batteries reporting capacity have a monitor tracking state of
        // charge directly; the rest are estimated from voltage.
        let has_soc = node.get("capacity").is_some();
        let (kind, model) = if has_soc {
            (DeviceKind::BatterySoc, "Battery SOC")
        } else {
            (DeviceKind::Battery, "Battery")
        };
        let fallback = format!("Battery {instance}");
        let display_name = config
            .display_name(&path)
            .unwrap_or(fallback.as_str())
            .to_string();
        let device_key = format!("batteries.{instance}");
        out.push(DeviceDescriptor::new(
            display_name.clone(),
            &device_key,
            BusPath::new(&path),
            BATTERIES_PATH,
            "NMEA".to_string(),
            model.to_string(),
            display_name,
            kind,
        ));
    }
}

fn discover_engines(tree: &RawValue, config: &BridgeConfig, out: &mut Vec<DeviceDescriptor>) {
    for (key, name) in ENGINES {
        let path = format!("{ENGINE_PATH}.{key}");
        if tree_get(tree, &path).is_none() || !config.path_allowed(&path) {
            continue;
        }
        let display_name = config.display_name(&path).unwrap_or(name).to_string();
        out.push(DeviceDescriptor::new(
            display_name,
            key,
            BusPath::new(&path),
            ENGINE_PATH,
            "NMEA".to_string(),
            format!("{name} Sensor"),
            (*name).to_string(),
            DeviceKind::Temperature,
        ));
    }
}

/// Contact sensors are configured, not autodetected; discovery only
/// confirms the observed path exists in the tree.
fn discover_contact_sensors(tree: &RawValue, config: &BridgeConfig, out: &mut Vec<DeviceDescriptor>) {
    for sensor in &config.contact_sensors {
        if tree_get(tree, &sensor.key).is_none() {
            continue;
        }
        let display_name = sensor
            .name
            .clone()
            .or_else(|| config.display_name(&sensor.key).map(String::from))
            .unwrap_or_else(|| sensor.key.clone());
        let operator_tag = serde_json::to_string(&sensor.operator)
            .unwrap_or_default()
            .trim_matches('"')
            .to_string();
        out.push(DeviceDescriptor::new(
            display_name,
            &sensor.key,
            BusPath::new(&sensor.key),
            &sensor.key,
            "NMEA".to_string(),
            format!("{} {} Sensor", operator_tag, sensor.threshold),
            sensor.key.clone(),
            DeviceKind::ContactSensor {
                operator: sensor.operator,
                threshold: sensor.threshold,
            },
        ));
    }
}

// ============================================================================
// Tree helpers
// ============================================================================

/// Get a node by dotted path.
fn tree_get<'a>(tree: &'a RawValue, path: &str) -> Option<&'a RawValue> {
    let mut current = tree;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Get the `value` of a leaf child as a string ("name", "type", ...).
fn leaf_str<'a>(node: &'a RawValue, child: &str) -> Option<&'a str> {
    node.get(child)?.get("value")?.as_str()
}

fn meta_display_name(node: &RawValue) -> Option<&str> {
    node.get("meta")?.get("displayName")?.get("value")?.as_str()
}

fn manufacturer_name(node: &RawValue) -> Option<&str> {
    node.get("meta")?
        .get("manufacturer")?
        .get("name")?
        .get("value")?
        .as_str()
}

fn manufacturer_model(node: &RawValue) -> Option<&str> {
    node.get("meta")?
        .get("manufacturer")?
        .get("model")?
        .get("value")?
        .as_str()
}
