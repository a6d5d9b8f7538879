//! # skbridge-core
//!
//! Core domain types for the Signal K to HomeKit bridge.
//!
//! This crate provides:
//! - Bus path handling (dotted hierarchical keys)
//! - Raw value coercion and characteristic value types
//! - Pure value converters (percentage, truthy on/off, temperature, ...)
//! - Device kinds and their characteristic bindings
//! - Bridge configuration
//! - Device discovery over a full-tree API snapshot
//!
//! This crate is intentionally runtime-agnostic and contains no async code
//! or I/O; the streaming and HTTP layers live in sibling crates.

pub mod config;
pub mod convert;
pub mod device;
pub mod discovery;
pub mod path;
pub mod value;

pub use config::{BridgeConfig, ConfigError, ContactSensorConfig};
pub use convert::{CompareOp, TruthySet, ValueConverter};
pub use device::{Binding, CharacteristicKind, DeviceKind, TankKind};
pub use discovery::{discover_devices, AccessoryId, DeviceDescriptor};
pub use path::BusPath;
pub use value::{numeric, CharacteristicValue, RawValue};
