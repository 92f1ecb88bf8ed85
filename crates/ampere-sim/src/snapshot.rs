//! Serializable views of the energy system at one tick.

use ampere_grid::{EnergySystem, NetworkId, PowerState};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// State of one network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub id: NetworkId,
    pub stored: f64,
    pub max_stored: f64,
    pub extra: f64,
    pub idle_draw: f64,
    pub avg_drain: f64,
    pub avg_injection: f64,
    pub powered: bool,
    pub state: PowerState,
    pub infinite: bool,
    pub providers: usize,
    pub requesters: usize,
    pub neighbors: Vec<NetworkId>,
}

/// State of every network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub tick: u64,
    pub networks: Vec<NetworkSnapshot>,
    pub powered_count: usize,
}

impl SystemSnapshot {
    /// Capture `system`. Needs `&mut` because reading stored power may
    /// refresh a stale cache.
    pub fn capture(system: &mut EnergySystem) -> Result<Self> {
        let mut networks = Vec::new();
        for id in system.network_ids() {
            let stored = system.stored_power(id)?;
            let net = system.network(id)?;
            networks.push(NetworkSnapshot {
                id,
                stored,
                max_stored: net.max_stored_power(),
                extra: net.extra(),
                idle_draw: net.idle_power_usage(),
                avg_drain: net.avg_power_usage(),
                avg_injection: net.avg_power_injection(),
                powered: net.is_powered(),
                state: net.power_state(),
                infinite: net.has_infinite_store(),
                providers: net.storage().providers().len(),
                requesters: net.storage().requesters().len(),
                neighbors: net.delegation().neighbor_list(),
            });
        }
        let powered_count = networks.iter().filter(|n| n.powered).count();

        Ok(Self {
            tick: system.current_tick(),
            networks,
            powered_count,
        })
    }

    /// Encode as a single JSON line.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
