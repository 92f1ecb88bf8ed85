//! Error types for ampere-sim.

use thiserror::Error;

/// Result type for ampere-sim operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or running a simulation.
#[derive(Debug, Error)]
pub enum Error {
    /// The energy ledger refused a structural operation.
    #[error("grid error: {0}")]
    Grid(#[from] ampere_grid::Error),

    /// No scenario with this name exists.
    #[error("unknown scenario {0:?}")]
    UnknownScenario(String),

    /// A scenario needs at least one network.
    #[error("scenario needs at least one network, got {0}")]
    EmptyTopology(usize),

    /// A configuration value could not be parsed.
    #[error("invalid configuration value for {key}: {value:?}")]
    Config { key: &'static str, value: String },

    /// A snapshot could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
