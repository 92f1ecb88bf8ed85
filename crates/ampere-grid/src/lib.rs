//! Ampere Energy Grid
//!
//! Tick-driven energy ledger for networks of storage devices.
//!
//! # Model
//!
//! A network is one connected topology of machines. It knows which of its
//! storage devices can hand out energy (providers) and which have room
//! (requesters), which other networks it may draw from (neighbors), and who
//! wants to hear about stored energy crossing a level (watchers).
//!
//! Networks link to each other through bridge nodes, and those links may
//! form cycles. Every recursive operation carries a visited set, so a
//! network entered twice during one call answers "nothing" the second time.
//!
//! # Modes
//!
//! Each flow runs as [`Actionable::Simulate`] (a dry run with no side effects)
//! or [`Actionable::Modulate`] (devices, sets and buffers change).
//!
//! # Tick
//!
//! Once per tick a network notifies crossed thresholds, recomputes the
//! unbounded-source flag if a topology change dirtied it, folds the tick into
//! its moving averages, pays its idle draw and feeds the outcome to the
//! power hysteresis. Power becomes public only after 30 consecutive good
//! ticks; it is lost at once.

mod config;
mod delegation;
mod demand;
mod device;
mod error;
mod events;
mod extract;
mod infinite;
mod inject;
mod network;
mod persist;
mod stats;
mod storage;
mod system;
mod threshold;
mod types;

pub use config::GridConfig;
pub use delegation::{DelegationGraph, VisitedSet};
pub use device::{CreativeCell, DeviceTable, EnergyCell, PowerStorage};
pub use error::{Error, Result};
pub use events::{EventScope, GridEvent};
pub use network::{Machine, Network, StorageEvent};
pub use persist::{GridStorage, EXTRA_ENERGY_KEY};
pub use stats::{PowerHysteresis, PowerState, TickStatistics};
pub use storage::{DeviceSet, PowerStorageRegistry};
pub use system::EnergySystem;
pub use threshold::{EnergyThreshold, EnergyWatcher, ThresholdKey, WatcherRegistry};
pub use types::{AccessRestriction, Actionable, DeviceId, NetworkId, NodeId, PowerMultiplier};
