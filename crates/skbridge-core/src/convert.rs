//! Pure value conversions from raw bus values to characteristic values.
//!
//! Each converter is a small piece of data applied with [`ValueConverter::apply`];
//! there is no state and no I/O. Malformed or missing raw input never
//! errors: numeric conversions fall back to 0, boolean conversions to false.

use serde::{Deserialize, Serialize};

use crate::value::{numeric, CharacteristicValue, RawValue};

/// Comparison operator for threshold conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompareOp {
    #[default]
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl CompareOp {
    fn compare(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
        }
    }
}

/// The set of raw values a device family treats as "on".
///
/// Different device families on the bus report on/off state differently:
/// plain booleans, the strings "true"/"on", mode strings like
/// "low power", or 1/0. The membership list is configurable per family;
/// `positive_numbers` additionally accepts any numeric value > 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruthySet {
    values: Vec<RawValue>,
    positive_numbers: bool,
}

impl Default for TruthySet {
    /// `true`, `"true"`, `"on"`, plus any positive number.
    fn default() -> Self {
        Self {
            values: vec![
                RawValue::Bool(true),
                RawValue::String("true".to_string()),
                RawValue::String("on".to_string()),
            ],
            positive_numbers: true,
        }
    }
}

impl TruthySet {
    /// Build an explicit membership set with no positive-number rule.
    pub fn from_values(values: Vec<RawValue>) -> Self {
        Self {
            values,
            positive_numbers: false,
        }
    }

    /// Check whether a raw value is a member of this set.
    pub fn contains(&self, raw: &RawValue) -> bool {
        if self.values.iter().any(|v| loose_eq(v, raw)) {
            return true;
        }
        if self.positive_numbers {
            if let RawValue::Number(n) = raw {
                return n.as_f64().is_some_and(|f| f > 0.0);
            }
        }
        false
    }
}

/// Equality that treats 1 and 1.0 as the same member.
fn loose_eq(a: &RawValue, b: &RawValue) -> bool {
    match (a, b) {
        (RawValue::Number(x), RawValue::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// A pure conversion from a raw bus value to a characteristic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueConverter {
    /// Ratio 0..1 scaled to a percentage, clamped to 0..100.
    Percent,
    /// Membership test against a configurable truthy set.
    OnOff(TruthySet),
    /// Kelvin to Celsius.
    KelvinToCelsius,
    /// Battery voltage mapped linearly onto 0..100% state of charge.
    BatterySoc {
        empty_voltage: f64,
        full_voltage: f64,
    },
    /// Numeric comparison against a threshold. `scale` multiplies the raw
    /// value before comparing, so percent-unit thresholds can be applied
    /// to 0..1 ratios (tanks configure scale 100).
    Threshold {
        operator: CompareOp,
        threshold: f64,
        scale: f64,
    },
}

impl ValueConverter {
    /// Threshold comparison on the raw numeric value.
    pub fn threshold(operator: CompareOp, threshold: f64) -> Self {
        ValueConverter::Threshold {
            operator,
            threshold,
            scale: 1.0,
        }
    }

    /// Threshold comparison with the raw value scaled first.
    pub fn scaled_threshold(operator: CompareOp, threshold: f64, scale: f64) -> Self {
        ValueConverter::Threshold {
            operator,
            threshold,
            scale,
        }
    }

    /// Apply the conversion. Never fails: malformed raw input yields the
    /// fallback (0 for numeric outputs, false for boolean outputs).
    pub fn apply(&self, raw: &RawValue) -> CharacteristicValue {
        match self {
            ValueConverter::Percent => {
                let n = numeric(raw).unwrap_or(0.0);
                CharacteristicValue::Float((n * 100.0).clamp(0.0, 100.0))
            }
            ValueConverter::OnOff(set) => CharacteristicValue::Bool(set.contains(raw)),
            ValueConverter::KelvinToCelsius => {
                let n = numeric(raw).unwrap_or(0.0);
                CharacteristicValue::Float(n - 273.15)
            }
            ValueConverter::BatterySoc {
                empty_voltage,
                full_voltage,
            } => {
                let v = numeric(raw).unwrap_or(0.0);
                let soc = (v - empty_voltage) / (full_voltage - empty_voltage) * 100.0;
                CharacteristicValue::Float(soc.clamp(0.0, 100.0))
            }
            ValueConverter::Threshold {
                operator,
                threshold,
                scale,
            } => match numeric(raw) {
                Some(n) => CharacteristicValue::Bool(operator.compare(n * scale, *threshold)),
                None => CharacteristicValue::Bool(false),
            },
        }
    }
}
