//! The opaque record the topology layer persists for a network.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Key under which a network keeps its excess energy.
pub const EXTRA_ENERGY_KEY: &str = "extra_energy";

/// Key/value record stored and restored verbatim by the topology layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridStorage {
    data: Map<String, Value>,
}

impl GridStorage {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a number; absent or non-numeric fields read as zero.
    pub fn get_f64(&self, key: &str) -> f64 {
        self.data.get(key).and_then(Value::as_f64).unwrap_or(0.0)
    }

    /// Write a number. Non-finite values are stored as zero.
    pub fn set_f64(&mut self, key: &str, value: f64) {
        let number = serde_json::Number::from_f64(value).unwrap_or_else(|| serde_json::Number::from(0u8));
        self.data.insert(key.to_string(), Value::Number(number));
    }

    /// Whether a field is present.
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
