//! # skbridge-sync
//!
//! Live state synchronization between the Signal K stream and accessory
//! characteristics.
//!
//! This crate owns the moving parts of the bridge:
//! - [`SubscriptionRegistry`]: which bus paths feed which characteristics
//! - [`UpdateRouter`]: fan-out of stream updates through converters
//! - the stream session: one WebSocket connection lifecycle
//! - [`ReconnectSupervisor`]: keeps a session alive across failures
//! - accessory wiring: turns device descriptors into subscriptions

pub mod accessory;
pub mod registry;
pub mod router;
pub mod stream;
pub mod supervisor;

pub use accessory::{unwire_accessory, wire_accessory};
pub use registry::{
    shared_registry, CharacteristicHandle, SharedRegistry, Subscription, SubscriptionRegistry,
};
pub use router::{CharacteristicWriter, UpdateRouter};
pub use stream::{CloseReason, ConnectionState, StreamCommand, StreamEvent};
pub use supervisor::{ReconnectSupervisor, SyncHandle};
