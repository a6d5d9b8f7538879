//! # skbridge-protocol
//!
//! Signal K stream message types and codec, from the client side.
//!
//! This crate defines the WebSocket message formats the bridge consumes
//! (hello, delta) and produces (subscribe, unsubscribe), plus the flat
//! [`UpdateEvent`] form the routing layer works with.

pub mod codec;
pub mod messages;

pub use codec::{decode_frame, encode_subscribe, encode_unsubscribe, CodecError};
pub use messages::{
    Delta, HelloMessage, InboundFrame, PathValue, SubscribeRequest, Subscription,
    UnsubscribeRequest, UnsubscribeSpec, Update, UpdateEvent,
};
