//! Protocol message types for WebSocket communication.
//!
//! Message types exchanged over the Signal K WebSocket stream, seen
//! from the client side:
//! - Server → Client: Hello (on connect), Delta
//! - Client → Server: Subscribe, Unsubscribe
//!
//! Messages are serialized as JSON over WebSocket text frames.

use serde::{Deserialize, Serialize};
use skbridge_core::{BusPath, RawValue};

/// Context used for all subscriptions: the vessel this bridge mirrors.
pub const SELF_CONTEXT: &str = "vessels.self";

/// Hello message sent by the server immediately on connection.
///
/// Only the name is guaranteed; servers differ on the rest.
///
/// # Example
/// ```json
/// {
///   "name": "signalk-server",
///   "version": "1.7.0",
///   "self": "vessels.urn:mrn:signalk:uuid:c0d79334-4e25-4245-8892-54e8ccc8021d",
///   "roles": ["main"],
///   "timestamp": "2024-01-17T10:30:00.000Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloMessage {
    /// Server name identifier.
    pub name: String,

    /// Signal K protocol version supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// The "self" context identifier for this vessel.
    #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_urn: Option<String>,

    /// Server roles (e.g., ["main"], ["main", "master"]).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// Server timestamp in ISO 8601 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A path/value pair within a delta update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathValue {
    pub path: BusPath,
    pub value: RawValue,
}

/// One update within a delta: a batch of values sharing a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "$source", skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    #[serde(default)]
    pub values: Vec<PathValue>,
}

/// Delta update message carrying changed values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub updates: Vec<Update>,
}

/// A single path/value observation, flattened out of a delta.
///
/// Deltas batch values per update; routing works one value at a time,
/// in the order the server sent them.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvent {
    pub path: BusPath,
    pub value: RawValue,
    pub timestamp: Option<String>,
}

impl Delta {
    /// Flatten the delta into individual events, preserving server order.
    /// Every value is emitted; a repeated path yields one event per
    /// occurrence so no observation is skipped.
    pub fn into_events(self) -> Vec<UpdateEvent> {
        let mut events = Vec::new();
        for update in self.updates {
            for pv in update.values {
                events.push(UpdateEvent {
                    path: pv.path,
                    value: pv.value,
                    timestamp: update.timestamp.clone(),
                });
            }
        }
        events
    }
}

/// Subscription request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub context: String,
    pub subscribe: Vec<Subscription>,
}

/// A single subscription specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub path: BusPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<u64>,
    #[serde(rename = "minPeriod", skip_serializing_if = "Option::is_none")]
    pub min_period: Option<u64>,
}

impl SubscribeRequest {
    /// One subscribe frame covering all given paths, in the self context.
    pub fn for_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = BusPath>,
    {
        Self {
            context: SELF_CONTEXT.to_string(),
            subscribe: paths
                .into_iter()
                .map(|path| Subscription {
                    path,
                    period: None,
                    min_period: None,
                })
                .collect(),
        }
    }
}

/// Unsubscribe request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    pub context: String,
    pub unsubscribe: Vec<UnsubscribeSpec>,
}

/// Unsubscribe specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeSpec {
    pub path: BusPath,
}

impl UnsubscribeRequest {
    pub fn for_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = BusPath>,
    {
        Self {
            context: SELF_CONTEXT.to_string(),
            unsubscribe: paths
                .into_iter()
                .map(|path| UnsubscribeSpec { path })
                .collect(),
        }
    }
}

/// Frames the bridge can receive from the stream.
///
/// Uses untagged deserialization: deltas carry `updates`, the hello
/// carries `name`. Anything else fails to decode and is dropped by the
/// connection layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundFrame {
    /// Delta update with new data.
    Delta(Delta),

    /// Hello message sent on connection.
    Hello(HelloMessage),
}
