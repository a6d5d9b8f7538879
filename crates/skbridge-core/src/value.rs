//! Raw and characteristic value types.
//!
//! Upstream values arrive as arbitrary JSON; characteristics accept a
//! small set of typed values. The coercion rules here mirror loose
//! numeric conversion: numbers pass through, numeric strings parse,
//! booleans map to 1/0, everything else has no numeric value.

use serde::{Deserialize, Serialize};

/// A raw value as received from the bus. Updates carry arbitrary JSON.
pub type RawValue = serde_json::Value;

/// A value ready to be pushed into a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Bool(bool),
    Float(f64),
}

impl CharacteristicValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CharacteristicValue::Bool(b) => Some(*b),
            CharacteristicValue::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CharacteristicValue::Bool(_) => None,
            CharacteristicValue::Float(f) => Some(*f),
        }
    }
}

impl From<bool> for CharacteristicValue {
    fn from(b: bool) -> Self {
        CharacteristicValue::Bool(b)
    }
}

impl From<f64> for CharacteristicValue {
    fn from(f: f64) -> Self {
        CharacteristicValue::Float(f)
    }
}

/// Coerce a raw value to a number, if it has one.
///
/// Numbers pass through, numeric strings parse, booleans become 1/0.
/// Null, objects, arrays, and non-numeric strings have no numeric value;
/// converters substitute their defined fallback instead of erroring.
pub fn numeric(raw: &RawValue) -> Option<f64> {
    match raw {
        RawValue::Number(n) => n.as_f64(),
        RawValue::String(s) => s.trim().parse::<f64>().ok(),
        RawValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
