//! Identifiers and small shared value types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one connected network instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetworkId(pub u64);

/// Identity of a storage device in the host's device table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub u64);

/// Identity of a machine node attached to a network.
///
/// Nodes that observe power double as the consumer handle of their watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev#{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Whether an operation commits or only reports what would happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actionable {
    /// Report the outcome without touching any state.
    Simulate,
    /// Perform the operation.
    Modulate,
}

impl Actionable {
    /// True for [`Actionable::Modulate`].
    #[inline]
    pub const fn is_modulate(self) -> bool {
        matches!(self, Actionable::Modulate)
    }
}

/// Direction restriction on a storage device's power flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccessRestriction {
    /// Energy may be drawn and stored.
    #[default]
    ReadWrite,
    /// Export only: energy may be drawn, never stored.
    Read,
    /// Import only: energy may be stored, never drawn.
    Write,
}

impl AccessRestriction {
    /// The device may hand energy to the network.
    pub const fn can_export(self) -> bool {
        !matches!(self, AccessRestriction::Write)
    }

    /// The device may take energy from the network.
    pub const fn can_import(self) -> bool {
        !matches!(self, AccessRestriction::Read)
    }
}

/// Conversion between the caller's energy units and internal units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PowerMultiplier {
    /// Amounts are already internal units.
    One,
    /// Amounts are scaled by the configured ratio.
    Config(f64),
}

impl PowerMultiplier {
    fn ratio(self) -> f64 {
        match self {
            PowerMultiplier::One => 1.0,
            PowerMultiplier::Config(ratio) => ratio,
        }
    }

    /// Caller units to internal units.
    pub fn multiply(self, amount: f64) -> f64 {
        amount * self.ratio()
    }

    /// Internal units back to caller units.
    pub fn divide(self, amount: f64) -> f64 {
        let ratio = self.ratio();
        if ratio == 0.0 {
            0.0
        } else {
            amount / ratio
        }
    }
}
