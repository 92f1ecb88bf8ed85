//! Error types for ampere-grid.

use thiserror::Error;

use crate::types::{DeviceId, NetworkId, NodeId};

/// Result type for ampere-grid operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by structural operations on the energy system.
///
/// Energy flow itself never fails: extraction, injection and demand degrade
/// to "nothing moved" instead of returning an error.
#[derive(Debug, Error)]
pub enum Error {
    /// No network with this id exists in the system.
    #[error("unknown network {0}")]
    UnknownNetwork(NetworkId),

    /// No storage device with this id is registered.
    #[error("unknown storage device {0}")]
    UnknownDevice(DeviceId),

    /// The node is not attached to the network.
    #[error("node {node} is not attached to network {network}")]
    UnknownNode { network: NetworkId, node: NodeId },

    /// The node is already attached to the network.
    #[error("node {node} is already attached to network {network}")]
    DuplicateNode { network: NetworkId, node: NodeId },

    /// A device with this id is already registered.
    #[error("storage device {0} is already registered")]
    DuplicateDevice(DeviceId),

    /// A caller tried to route energy through a device that is not publicly chargeable.
    #[error("storage device {0} is not a public power storage")]
    NonPublicStorage(DeviceId),

    /// A configuration value could not be parsed.
    #[error("invalid configuration value for {key}: {value:?}")]
    Config { key: &'static str, value: String },

    /// Persisted grid storage could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
