//! Update routing: stream events fan out to characteristics.
//!
//! The router is called once per path/value observation, in the order
//! the server sent them. Each matching subscription applies its
//! converter and pushes the result through the [`CharacteristicWriter`].
//! Routing itself is synchronous; the writer must not block.

use std::sync::Arc;

use skbridge_protocol::UpdateEvent;
use tracing::trace;

use crate::registry::{read_registry, CharacteristicHandle, SharedRegistry};
use skbridge_core::CharacteristicValue;

/// Sink for converted characteristic values.
///
/// Implementations must return promptly: queue the write or hand it to
/// the accessory layer fire-and-forget. The routing loop processes
/// updates sequentially and a slow writer stalls the stream.
pub trait CharacteristicWriter: Send + Sync {
    fn write(&self, handle: CharacteristicHandle, value: CharacteristicValue);
}

/// Routes update events through the registry to a writer.
#[derive(Clone)]
pub struct UpdateRouter {
    registry: SharedRegistry,
    writer: Arc<dyn CharacteristicWriter>,
}

impl UpdateRouter {
    pub fn new(registry: SharedRegistry, writer: Arc<dyn CharacteristicWriter>) -> Self {
        Self { registry, writer }
    }

    /// Route one observation. Unknown paths are dropped; a path can stop
    /// being subscribed while its last updates are still in flight.
    pub fn route(&self, event: &UpdateEvent) {
        let registry = read_registry(&self.registry);
        let subscriptions = registry.lookup(&event.path);
        if subscriptions.is_empty() {
            trace!(path = %event.path, "update on unsubscribed path dropped");
            return;
        }

        for sub in subscriptions {
            let value = sub.converter.apply(&event.value);
            trace!(path = %event.path, ?value, "routing update");
            self.writer.write(sub.handle, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{shared_registry, write_registry, Subscription};
    use skbridge_core::{
        AccessoryId, BusPath, CharacteristicKind, CompareOp, TruthySet, ValueConverter,
    };
    use std::sync::Mutex;

    /// Writer that records every write for assertions.
    #[derive(Default)]
    struct RecordingWriter {
        writes: Mutex<Vec<(CharacteristicHandle, CharacteristicValue)>>,
    }

    impl CharacteristicWriter for RecordingWriter {
        fn write(&self, handle: CharacteristicHandle, value: CharacteristicValue) {
            self.writes.lock().unwrap().push((handle, value));
        }
    }

    fn event(path: &str, value: serde_json::Value) -> UpdateEvent {
        UpdateEvent {
            path: BusPath::new(path),
            value,
            timestamp: None,
        }
    }

    fn handle(owner: &str, characteristic: CharacteristicKind) -> CharacteristicHandle {
        CharacteristicHandle {
            owner: AccessoryId::from_identifier(owner),
            characteristic,
        }
    }

    #[test]
    fn test_routes_through_converter() {
        let registry = shared_registry();
        write_registry(&registry).add(Subscription {
            path: BusPath::new("electrical.switches.venus-0.state"),
            handle: handle("venus-0", CharacteristicKind::On),
            converter: ValueConverter::OnOff(TruthySet::default()),
        });

        let writer = Arc::new(RecordingWriter::default());
        let router = UpdateRouter::new(registry, writer.clone());

        router.route(&event(
            "electrical.switches.venus-0.state",
            serde_json::json!("on"),
        ));

        let writes = writer.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1, CharacteristicValue::Bool(true));
    }

    #[test]
    fn test_fans_out_to_all_subscribers() {
        let registry = shared_registry();
        {
            let mut guard = write_registry(&registry);
            // One tank path feeds level, warning, and battery-level views
            guard.add(Subscription {
                path: BusPath::new("tanks.freshWater.0.currentLevel"),
                handle: handle("tank0", CharacteristicKind::CurrentRelativeHumidity),
                converter: ValueConverter::Percent,
            });
            guard.add(Subscription {
                path: BusPath::new("tanks.freshWater.0.currentLevel"),
                handle: handle("tank0", CharacteristicKind::StatusLowBattery),
                converter: ValueConverter::scaled_threshold(CompareOp::Le, 25.0, 100.0),
            });
        }

        let writer = Arc::new(RecordingWriter::default());
        let router = UpdateRouter::new(registry, writer.clone());

        router.route(&event(
            "tanks.freshWater.0.currentLevel",
            serde_json::json!(0.18),
        ));

        let writes = writer.writes.lock().unwrap();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].1, CharacteristicValue::Float(18.0));
        assert_eq!(writes[1].1, CharacteristicValue::Bool(true));
    }

    #[test]
    fn test_unknown_path_dropped() {
        let registry = shared_registry();
        let writer = Arc::new(RecordingWriter::default());
        let router = UpdateRouter::new(registry, writer.clone());

        router.route(&event("navigation.position", serde_json::json!(1.0)));

        assert!(writer.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_writes_after_owner_removed() {
        let registry = shared_registry();
        let owner = AccessoryId::from_identifier("gone");
        write_registry(&registry).add(Subscription {
            path: BusPath::new("a.b"),
            handle: CharacteristicHandle {
                owner,
                characteristic: CharacteristicKind::On,
            },
            converter: ValueConverter::OnOff(TruthySet::default()),
        });
        write_registry(&registry).remove_owner(owner);

        let writer = Arc::new(RecordingWriter::default());
        let router = UpdateRouter::new(registry, writer.clone());
        router.route(&event("a.b", serde_json::json!(true)));

        assert!(writer.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sequential_events_keep_order() {
        let registry = shared_registry();
        write_registry(&registry).add(Subscription {
            path: BusPath::new("a.b"),
            handle: handle("x", CharacteristicKind::Brightness),
            converter: ValueConverter::Percent,
        });

        let writer = Arc::new(RecordingWriter::default());
        let router = UpdateRouter::new(registry, writer.clone());

        for raw in [0.1, 0.2, 0.3] {
            router.route(&event("a.b", serde_json::json!(raw)));
        }

        let writes = writer.writes.lock().unwrap();
        let values: Vec<_> = writes.iter().filter_map(|(_, v)| v.as_f64()).collect();
        assert_eq!(values, vec![10.0, 20.0, 30.0]);
    }
}
