//! How much energy a network and its neighbors could still absorb.

use crate::delegation::VisitedSet;
use crate::system::EnergySystem;
use crate::types::NetworkId;

impl EnergySystem {
    /// Free capacity reachable from `id`, counted up to `max_required`.
    ///
    /// Starts from the room left in the excess buffer, then adds the free
    /// space of every importing requester, then asks the neighbors for the
    /// rest. Counting stops as soon as `max_required` is reached, so the
    /// result is only meaningful up to that bound.
    pub fn demand_with(&self, id: NetworkId, max_required: f64, visited: &mut VisitedSet) -> f64 {
        if !visited.enter(id) {
            return 0.0;
        }
        let Some(net) = self.networks.get(&id) else {
            return 0.0;
        };

        let mut required = (net.buffer(&self.config) - net.extra).max(0.0);
        for device in net.storage.requesters().iter() {
            if required >= max_required {
                return required;
            }
            let Some(storage) = self.devices.get(device) else {
                continue;
            };
            if storage.power_flow().can_import() {
                required += (storage.max_power() - storage.current_power()).max(0.0);
            }
        }

        for neighbor in net.delegation.neighbors() {
            if required >= max_required {
                break;
            }
            required += self.demand_with(neighbor, max_required - required, visited);
        }
        required
    }
}
