//! Ampere Scenario Simulation
//!
//! Drives the energy ledger through small topologies and records what it
//! reports.
//!
//! # Architecture
//!
//! - **Simulation**: builds a scenario, injects generated energy, jitters loads, ticks
//! - **Timeline**: every [`GridEvent`](ampere_grid::GridEvent) the ledger emits, in order
//! - **Snapshots**: serializable per-network state for plotting or diffing
//!
//! # Usage
//!
//! ```ignore
//! let mut sim = Simulation::new(SimulationConfig::default())?;
//! sim.run(200)?;
//! println!("{}", sim.snapshot()?.to_json()?);
//! ```

mod error;
mod simulation;
mod snapshot;

pub use error::{Error, Result};
pub use simulation::{Scenario, Simulation, SimulationConfig};
pub use snapshot::{NetworkSnapshot, SystemSnapshot};
