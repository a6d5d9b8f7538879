//! Accessory wiring: device descriptors in, subscriptions out.
//!
//! Wiring expands a device's characteristic bindings into registry
//! subscriptions. The return values tell the caller which stream
//! subscriptions changed: wiring reports paths seen for the first time,
//! unwiring reports paths left without subscribers.

use tracing::debug;

use skbridge_core::{AccessoryId, BridgeConfig, BusPath, DeviceDescriptor};

use crate::registry::{write_registry, CharacteristicHandle, SharedRegistry, Subscription};

/// Register all characteristics of a device. Returns the paths that
/// were not subscribed before this call.
pub fn wire_accessory(
    registry: &SharedRegistry,
    descriptor: &DeviceDescriptor,
    config: &BridgeConfig,
) -> Vec<BusPath> {
    let bindings = descriptor.kind.bindings(config);
    let mut guard = write_registry(registry);
    let mut new_paths = Vec::new();

    for binding in bindings {
        let path = match binding.suffix {
            Some(suffix) => descriptor.path.join(suffix),
            None => descriptor.path.clone(),
        };
        let is_new = guard.add(Subscription {
            path: path.clone(),
            handle: CharacteristicHandle {
                owner: descriptor.id,
                characteristic: binding.characteristic,
            },
            converter: binding.converter,
        });
        if is_new {
            new_paths.push(path);
        }
    }

    debug!(
        device = %descriptor.display_name,
        new_paths = new_paths.len(),
        "accessory wired"
    );
    new_paths
}

/// Remove all of an accessory's subscriptions. Returns the paths left
/// without any subscriber.
pub fn unwire_accessory(registry: &SharedRegistry, owner: AccessoryId) -> Vec<BusPath> {
    let emptied = write_registry(registry).remove_owner(owner);
    debug!(%owner, emptied = emptied.len(), "accessory unwired");
    emptied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{read_registry, shared_registry};
    use skbridge_core::{DeviceKind, TankKind};

    fn config() -> BridgeConfig {
        BridgeConfig {
            host: "test".to_string(),
            ..Default::default()
        }
    }

    fn descriptor(identifier: &str, path: &str, kind: DeviceKind) -> DeviceDescriptor {
        DeviceDescriptor {
            id: AccessoryId::from_identifier(identifier),
            identifier: identifier.to_string(),
            display_name: identifier.to_string(),
            path: BusPath::new(path),
            category: BusPath::new("electrical.switches"),
            manufacturer: "Test".to_string(),
            model: "Test".to_string(),
            serial_number: identifier.to_string(),
            kind,
        }
    }

    #[test]
    fn test_wire_dimmer_yields_two_paths() {
        let registry = shared_registry();
        let dimmer = descriptor(
            "dimmer1",
            "electrical.switches.empirBusNxt-instance0-dimmer1",
            DeviceKind::Dimmer,
        );

        let mut new_paths = wire_accessory(&registry, &dimmer, &config());
        new_paths.sort();

        assert_eq!(
            new_paths,
            vec![
                BusPath::new("electrical.switches.empirBusNxt-instance0-dimmer1.dimmingLevel"),
                BusPath::new("electrical.switches.empirBusNxt-instance0-dimmer1.state"),
            ]
        );
    }

    #[test]
    fn test_wire_tank_collapses_shared_path() {
        let registry = shared_registry();
        let tank = descriptor(
            "freshWater.0",
            "tanks.freshWater.0",
            DeviceKind::Tank(TankKind::FreshWater),
        );

        // Three bindings, all on currentLevel
        let new_paths = wire_accessory(&registry, &tank, &config());
        assert_eq!(new_paths, vec![BusPath::new("tanks.freshWater.0.currentLevel")]);
        assert_eq!(
            read_registry(&registry)
                .lookup(&BusPath::new("tanks.freshWater.0.currentLevel"))
                .len(),
            3
        );
    }

    #[test]
    fn test_rewiring_reports_no_new_paths() {
        let registry = shared_registry();
        let switch = descriptor("sw", "electrical.switches.sw", DeviceKind::Switch);

        assert_eq!(wire_accessory(&registry, &switch, &config()).len(), 1);
        // Wiring the same device again changes nothing on the stream
        assert!(wire_accessory(&registry, &switch, &config()).is_empty());
    }

    #[test]
    fn test_unwire_keeps_shared_paths() {
        let registry = shared_registry();
        let cfg = config();
        // Two contact sensors watching the same path
        let a = descriptor(
            "hot",
            "propulsion.port.temperature",
            DeviceKind::ContactSensor {
                operator: Default::default(),
                threshold: 360.0,
            },
        );
        let b = descriptor(
            "warm",
            "propulsion.port.temperature",
            DeviceKind::ContactSensor {
                operator: Default::default(),
                threshold: 340.0,
            },
        );
        wire_accessory(&registry, &a, &cfg);
        wire_accessory(&registry, &b, &cfg);

        // Path still has a subscriber, so nothing to unsubscribe
        assert!(unwire_accessory(&registry, a.id).is_empty());
        // Last subscriber gone, path is released
        assert_eq!(
            unwire_accessory(&registry, b.id),
            vec![BusPath::new("propulsion.port.temperature")]
        );
    }
}
