//! Storing energy: local requesters first, then neighbors, then the buffer.

use crate::delegation::VisitedSet;
use crate::device::DeviceTable;
use crate::network::Network;
use crate::system::EnergySystem;
use crate::types::{Actionable, NetworkId};

impl EnergySystem {
    /// Offer `amount` to `id` and its neighbors; returns the part nobody took.
    ///
    /// A network entered twice during one call accepts nothing. Whatever is
    /// left after requesters and neighbors stays in the excess buffer up to
    /// the empty-network buffer size; only the rest goes back to the caller,
    /// and never more than was offered.
    pub fn inject_with(
        &mut self,
        id: NetworkId,
        amount: f64,
        mode: Actionable,
        visited: &mut VisitedSet,
    ) -> f64 {
        if !visited.enter(id) {
            return amount;
        }
        let epsilon = self.config.epsilon;
        let Self {
            networks, devices, ..
        } = self;
        let Some(net) = networks.get_mut(&id) else {
            return amount;
        };

        let mut remaining = amount + net.extra;
        if mode.is_modulate() {
            net.stats.record_injection(amount);
            net.extra = 0.0;
        }
        remaining = fill_local(net, devices, remaining, mode, epsilon);
        let neighbors = net.delegation.neighbor_list();

        for neighbor in neighbors {
            if remaining <= epsilon {
                break;
            }
            if visited.contains(neighbor) {
                continue;
            }
            remaining = match mode {
                Actionable::Simulate => self.inject_with(neighbor, remaining, mode, visited),
                Actionable::Modulate => {
                    let mut probe = visited.clone();
                    let cannot_hold = self.inject_with(neighbor, remaining, Actionable::Simulate, &mut probe);
                    let accepted = remaining - cannot_hold;
                    if accepted > epsilon {
                        tracing::trace!("{}: pushed {} into neighbor {}", id, accepted, neighbor);
                        cannot_hold + self.inject_with(neighbor, accepted, mode, visited)
                    } else {
                        remaining
                    }
                }
            };
        }

        let Some(net) = self.networks.get_mut(&id) else {
            return amount.min(remaining);
        };
        let remaining = if remaining < epsilon { 0.0 } else { remaining };
        let returned = amount.min((remaining - net.buffer(&self.config)).max(0.0));
        if mode.is_modulate() {
            net.set_extra(remaining - returned, epsilon);
        }
        returned
    }
}

/// Fill local requesters in set order. Only [`Actionable::Modulate`] evicts
/// requesters that could not take everything and moves the fill position.
fn fill_local(net: &mut Network, devices: &mut DeviceTable, mut remaining: f64, mode: Actionable, epsilon: f64) -> f64 {
    match mode {
        Actionable::Simulate => {
            for id in net.storage.requesters().iter() {
                if remaining <= epsilon {
                    break;
                }
                if let Some(device) = devices.get_mut(id) {
                    remaining = device.inject_power(remaining, Actionable::Simulate);
                }
            }
        }
        Actionable::Modulate => {
            while remaining > epsilon {
                let Some(id) = net.storage.first_requester() else {
                    break;
                };
                remaining = devices
                    .get_mut(id)
                    .map_or(remaining, |device| device.inject_power(remaining, Actionable::Modulate));
                if remaining > 0.0 {
                    net.storage.evict_requester(id);
                }
            }
        }
    }
    remaining
}
