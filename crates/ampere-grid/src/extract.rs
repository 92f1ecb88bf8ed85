//! Drawing energy: excess first, then local providers, then neighbors.

use crate::delegation::VisitedSet;
use crate::device::DeviceTable;
use crate::network::Network;
use crate::system::EnergySystem;
use crate::types::{Actionable, NetworkId};

impl EnergySystem {
    /// Extract up to `amount` from `id`, delegating to neighbors for the rest.
    ///
    /// Returns 0 if `id` was already entered during this call. In
    /// [`Actionable::Simulate`] nothing is mutated: no device, set, cache or
    /// excess buffer changes.
    pub fn extract_with(
        &mut self,
        id: NetworkId,
        amount: f64,
        mode: Actionable,
        visited: &mut VisitedSet,
    ) -> f64 {
        if !visited.enter(id) {
            return 0.0;
        }
        let epsilon = self.config.epsilon;
        let Self {
            networks, devices, ..
        } = self;
        let Some(net) = networks.get_mut(&id) else {
            return 0.0;
        };

        if net.infinite {
            if mode.is_modulate() {
                net.stats.record_drain(amount);
            }
            return amount;
        }

        let mut extracted = net.extra;
        if mode.is_modulate() {
            net.extra = 0.0;
        }

        let local = draw_local(net, devices, amount - extracted, mode, epsilon);
        extracted += local;
        if mode.is_modulate() {
            net.storage.adjust_available(-local);
        }

        if amount - extracted > epsilon {
            extracted += self.extract_from_neighbors(id, amount - extracted, mode, visited);
        }

        match mode {
            Actionable::Simulate => extracted.min(amount),
            Actionable::Modulate => {
                let Some(net) = self.networks.get_mut(&id) else {
                    return extracted.min(amount);
                };
                let reported = if extracted > amount {
                    net.set_extra(extracted - amount, epsilon);
                    amount
                } else {
                    extracted
                };
                net.stats.record_drain(reported);
                reported
            }
        }
    }

    /// Ask the cached neighbor first, then every neighbor in link order.
    fn extract_from_neighbors(
        &mut self,
        id: NetworkId,
        wanted: f64,
        mode: Actionable,
        visited: &mut VisitedSet,
    ) -> f64 {
        let epsilon = self.config.epsilon;
        let Some(net) = self.networks.get(&id) else {
            return 0.0;
        };
        let cached = net.delegation.last_neighbor();
        let neighbors = net.delegation.neighbor_list();

        let mut got = 0.0;
        if let Some(last) = cached {
            let yielded = self.extract_with(last, wanted, mode, visited);
            if yielded < epsilon {
                if mode.is_modulate() {
                    if let Some(net) = self.networks.get_mut(&id) {
                        net.delegation.invalidate();
                    }
                }
            } else {
                got += yielded;
            }
        }

        for neighbor in neighbors {
            if wanted - got <= epsilon {
                break;
            }
            let yielded = self.extract_with(neighbor, wanted - got, mode, visited);
            if yielded > epsilon {
                tracing::trace!("{}: drew {} from neighbor {}", id, yielded, neighbor);
                if mode.is_modulate() {
                    if let Some(net) = self.networks.get_mut(&id) {
                        net.delegation.remember(neighbor);
                    }
                }
                got += yielded;
            }
        }
        got
    }
}

/// Drain local providers in set order. Only [`Actionable::Modulate`] evicts
/// exhausted providers and moves the draw position.
fn draw_local(net: &mut Network, devices: &mut DeviceTable, wanted: f64, mode: Actionable, epsilon: f64) -> f64 {
    let mut drawn = 0.0;
    if wanted <= epsilon {
        return drawn;
    }

    match mode {
        Actionable::Simulate => {
            for id in net.storage.providers().iter() {
                if wanted - drawn <= epsilon {
                    break;
                }
                if let Some(device) = devices.get_mut(id) {
                    drawn += device.extract_power(wanted - drawn, Actionable::Simulate);
                }
            }
        }
        Actionable::Modulate => {
            while wanted - drawn > epsilon {
                let Some(id) = net.storage.first_provider() else {
                    break;
                };
                let request = wanted - drawn;
                let got = devices
                    .get_mut(id)
                    .map_or(0.0, |device| device.extract_power(request, Actionable::Modulate));
                drawn += got;
                if got < request {
                    net.storage.evict_provider(id);
                }
            }
        }
    }
    drawn
}
