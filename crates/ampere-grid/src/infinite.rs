//! Flood fill of the "an unbounded source is reachable" flag.

use crate::delegation::VisitedSet;
use crate::events::GridEvent;
use crate::system::EnergySystem;
use crate::types::NetworkId;

impl EnergySystem {
    /// Whether an unbounded source is reachable from `id`, not walking into
    /// networks already in `visited`.
    pub fn compute_infinite(&self, id: NetworkId, seed: bool, visited: &mut VisitedSet) -> bool {
        if !visited.enter(id) {
            return seed;
        }
        let Some(net) = self.networks.get(&id) else {
            return seed;
        };

        let mut infinite = seed
            || net
                .storage
                .providers()
                .iter()
                .filter_map(|device| self.devices.get(device))
                .any(|device| device.is_infinite());

        // the whole component has to be visited so every member gets the result
        for neighbor in net.delegation.neighbors() {
            infinite = self.compute_infinite(neighbor, infinite, visited);
        }
        infinite
    }

    /// Recompute the flag for the component containing `id` and assign the
    /// result to every member.
    pub(crate) fn update_infinite(&mut self, id: NetworkId) {
        let mut visited = VisitedSet::new();
        let infinite = self.compute_infinite(id, false, &mut visited);

        let tick = self.current_tick();
        let mut changed = Vec::new();
        for member in visited.iter() {
            let Some(net) = self.networks.get_mut(&member) else {
                continue;
            };
            if net.infinite != infinite {
                changed.push(member);
            }
            net.set_has_infinite_store(infinite);
        }

        for network in changed {
            tracing::info!("{}: unbounded source {}", network, if infinite { "reachable" } else { "lost" });
            self.push_event(GridEvent::InfiniteStoreChanged {
                network,
                infinite,
                tick,
            });
        }
    }
}
