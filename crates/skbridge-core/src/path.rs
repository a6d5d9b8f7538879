//! Bus path handling.
//!
//! Signal K data points are addressed by dot-separated paths like
//! "electrical.switches.venus-0.state". The full path string is the join
//! key between discovered devices, registry subscriptions, and stream
//! updates, so `BusPath` is immutable once created and cheap to hash.

use serde::{Deserialize, Serialize};

/// A dotted hierarchical bus path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusPath {
    raw: String,
}

impl BusPath {
    /// Create a path from a dotted string.
    pub fn new(path: &str) -> Self {
        Self {
            raw: path.to_string(),
        }
    }

    /// Get the raw path string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Get the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.raw.split('.')
    }

    /// Append a dotted suffix, yielding a new path.
    pub fn join(&self, suffix: &str) -> BusPath {
        if suffix.is_empty() {
            self.clone()
        } else {
            BusPath {
                raw: format!("{}.{}", self.raw, suffix),
            }
        }
    }

    /// Check if this path starts with a given dotted prefix.
    pub fn starts_with(&self, prefix: &str) -> bool {
        let prefix_len: usize = prefix.len();
        if !self.raw.starts_with(prefix) {
            return false;
        }
        // Segment boundary: "tanks.fuel" is not a prefix of "tanks.fuelX.0"
        self.raw.len() == prefix_len || self.raw.as_bytes()[prefix_len] == b'.'
    }

    /// Render as a REST API path fragment (dots replaced by slashes).
    pub fn to_rest(&self) -> String {
        self.raw.replace('.', "/")
    }
}

impl std::fmt::Display for BusPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<&str> for BusPath {
    fn from(s: &str) -> Self {
        BusPath::new(s)
    }
}

impl From<String> for BusPath {
    fn from(s: String) -> Self {
        BusPath { raw: s }
    }
}
