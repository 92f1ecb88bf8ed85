//! The arena owning every network, the device table, and the tick loop.
//!
//! Networks refer to each other by [`NetworkId`], so the possibly cyclic
//! delegation graph needs no shared ownership. Recursive energy flow lives in
//! the `extract`, `inject`, `demand` and `infinite` modules as further
//! `impl EnergySystem` blocks.

use std::collections::BTreeMap;

use crate::config::GridConfig;
use crate::delegation::VisitedSet;
use crate::device::{DeviceTable, PowerStorage};
use crate::error::{Error, Result};
use crate::events::{EventScope, GridEvent};
use crate::network::{Machine, Network, StorageEvent};
use crate::persist::GridStorage;
use crate::types::{Actionable, DeviceId, NetworkId, NodeId, PowerMultiplier};

/// Every network of a world plus the host's storage devices.
#[derive(Debug)]
pub struct EnergySystem {
    pub(crate) config: GridConfig,
    pub(crate) networks: BTreeMap<NetworkId, Network>,
    pub(crate) devices: DeviceTable,
    events: Vec<GridEvent>,
    tick: u64,
    next_network: u64,
}

impl Default for EnergySystem {
    fn default() -> Self {
        Self::with_config(GridConfig::default())
    }
}

impl EnergySystem {
    /// Create an empty system, rejecting a config the ledger cannot work with.
    pub fn new(config: GridConfig) -> Result<Self> {
        Ok(Self::with_config(config.validated()?))
    }

    fn with_config(config: GridConfig) -> Self {
        Self {
            config,
            networks: BTreeMap::new(),
            devices: DeviceTable::new(),
            events: Vec::new(),
            tick: 0,
            next_network: 0,
        }
    }

    /// Shared configuration.
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Ticks processed so far.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// The `Config` multiplier for this system's unit ratio.
    pub fn config_multiplier(&self) -> PowerMultiplier {
        PowerMultiplier::Config(self.config.power_multiplier)
    }

    // ---- topology -------------------------------------------------------

    /// A topology formed: create its network.
    pub fn create_network(&mut self) -> NetworkId {
        let id = NetworkId(self.next_network);
        self.next_network += 1;
        self.networks.insert(id, Network::new(id));
        tracing::debug!("created {}", id);
        id
    }

    /// A topology disbanded: drop its network and every link pointing at it.
    pub fn dissolve_network(&mut self, id: NetworkId) -> Result<Network> {
        let network = self.networks.remove(&id).ok_or(Error::UnknownNetwork(id))?;
        for other in self.networks.values_mut() {
            if other.delegation.remove_all(id) > 0 {
                other.infinite_dirty = true;
            }
        }
        tracing::debug!("dissolved {} ({} nodes)", id, network.node_count());
        Ok(network)
    }

    /// Look up a network.
    pub fn network(&self, id: NetworkId) -> Result<&Network> {
        self.networks.get(&id).ok_or(Error::UnknownNetwork(id))
    }

    fn network_mut(&mut self, id: NetworkId) -> Result<&mut Network> {
        self.networks.get_mut(&id).ok_or(Error::UnknownNetwork(id))
    }

    /// All network ids, ascending.
    pub fn network_ids(&self) -> Vec<NetworkId> {
        self.networks.keys().copied().collect()
    }

    /// Host device store.
    pub fn devices(&self) -> &DeviceTable {
        &self.devices
    }

    /// Host device store, for creating and charging devices.
    pub fn devices_mut(&mut self) -> &mut DeviceTable {
        &mut self.devices
    }

    /// Shorthand for registering a device.
    pub fn add_device(&mut self, device: impl PowerStorage + 'static) -> DeviceId {
        self.devices.insert(device)
    }

    /// A machine joined `network`.
    pub fn attach(&mut self, network: NetworkId, node: NodeId, machine: Machine) -> Result<()> {
        let Self {
            networks, devices, ..
        } = self;
        let net = networks.get_mut(&network).ok_or(Error::UnknownNetwork(network))?;
        net.attach(node, machine, devices)?;
        let powered = net.is_powered();
        self.events.push(GridEvent::PowerStatusChanged {
            network,
            scope: EventScope::Node(node),
            powered,
            tick: self.tick,
        });
        Ok(())
    }

    /// A machine left `network`.
    pub fn detach(&mut self, network: NetworkId, node: NodeId) -> Result<Machine> {
        let Self {
            networks, devices, ..
        } = self;
        let net = networks.get_mut(&network).ok_or(Error::UnknownNetwork(network))?;
        net.detach(node, devices)
    }

    /// A device's charge changed and it re-offers itself.
    pub fn notify_storage(&mut self, network: NetworkId, device: DeviceId, event: StorageEvent) -> Result<()> {
        let Self {
            networks, devices, ..
        } = self;
        let net = networks.get_mut(&network).ok_or(Error::UnknownNetwork(network))?;
        net.notify_storage(device, event, devices)
    }

    /// A node's idle draw changed.
    pub fn update_idle_draw(&mut self, network: NetworkId, node: NodeId, new_draw: f64) -> Result<()> {
        self.network_mut(network)?.update_idle_draw(node, new_draw)
    }

    /// Register a watched level for an observing node.
    pub fn watch(&mut self, network: NetworkId, consumer: NodeId, level: f64) -> Result<bool> {
        Ok(self.network_mut(network)?.watch(consumer, level))
    }

    /// Withdraw a watched level.
    pub fn unwatch(&mut self, network: NetworkId, consumer: NodeId, level: f64) -> Result<bool> {
        Ok(self.network_mut(network)?.unwatch(consumer, level))
    }

    // ---- persistence ----------------------------------------------------

    /// `network` is being split; `storage` is the record of the other half.
    pub fn split(&mut self, network: NetworkId, storage: &mut GridStorage) -> Result<()> {
        let net = self.network_mut(network)?;
        net.on_split(storage);
        tracing::debug!("{}: split, excess now {}", network, net.extra());
        Ok(())
    }

    /// The network persisted in `storage` merges into `network`.
    pub fn join(&mut self, network: NetworkId, storage: &GridStorage) -> Result<()> {
        let net = self.network_mut(network)?;
        net.on_join(storage);
        tracing::debug!("{}: joined, excess now {}", network, net.extra());
        Ok(())
    }

    /// Write `network`'s state into its persisted record.
    pub fn populate(&self, network: NetworkId, storage: &mut GridStorage) -> Result<()> {
        self.network(network)?.populate(storage);
        Ok(())
    }

    // ---- public queries -------------------------------------------------

    /// Draw `amount` (caller units) from `network`, falling back to its neighbors.
    pub fn extract_power(
        &mut self,
        network: NetworkId,
        amount: f64,
        mode: Actionable,
        multiplier: PowerMultiplier,
    ) -> Result<f64> {
        self.network(network)?;
        let Some(amount) = self.checked_amount(network, amount) else {
            return Ok(0.0);
        };
        let mut visited = VisitedSet::new();
        let extracted = self.extract_with(network, multiplier.multiply(amount), mode, &mut visited);
        Ok(multiplier.divide(extracted))
    }

    /// Draw `amount` internal units from `network`.
    pub fn extract(&mut self, network: NetworkId, amount: f64, mode: Actionable) -> Result<f64> {
        self.extract_power(network, amount, mode, PowerMultiplier::One)
    }

    /// Offer `amount` to `network`; returns what was not accepted.
    pub fn inject(&mut self, network: NetworkId, amount: f64, mode: Actionable) -> Result<f64> {
        self.network(network)?;
        let Some(checked) = self.checked_amount(network, amount) else {
            return Ok(amount.max(0.0));
        };
        let mut visited = VisitedSet::new();
        Ok(self.inject_with(network, checked, mode, &mut visited))
    }

    /// Energy `network` and its neighbors could absorb, counted up to `max_required`.
    pub fn demand(&self, network: NetworkId, max_required: f64) -> Result<f64> {
        self.network(network)?;
        let mut visited = VisitedSet::new();
        Ok(self.demand_with(network, max_required, &mut visited))
    }

    /// Stored energy of `network`, cached between refreshes.
    pub fn stored_power(&mut self, network: NetworkId) -> Result<f64> {
        let Self {
            networks,
            devices,
            config,
            ..
        } = self;
        let net = networks.get_mut(&network).ok_or(Error::UnknownNetwork(network))?;
        Ok(net.stored_power(devices, config))
    }

    /// Recompute the stored energy cache of `network` now.
    pub fn refresh_stored_power(&mut self, network: NetworkId) -> Result<f64> {
        let Self {
            networks, devices, ..
        } = self;
        let net = networks.get_mut(&network).ok_or(Error::UnknownNetwork(network))?;
        net.refresh_power(devices);
        Ok(net.storage().available_power().max(0.0))
    }

    /// Capacity of `network`'s exporting storage.
    pub fn max_stored_power(&self, network: NetworkId) -> Result<f64> {
        Ok(self.network(network)?.max_stored_power())
    }

    /// Smoothed extraction per tick.
    pub fn average_drain(&self, network: NetworkId) -> Result<f64> {
        Ok(self.network(network)?.avg_power_usage())
    }

    /// Smoothed injection per tick.
    pub fn average_injection(&self, network: NetworkId) -> Result<f64> {
        Ok(self.network(network)?.avg_power_injection())
    }

    /// Public power status.
    pub fn is_powered(&self, network: NetworkId) -> Result<bool> {
        Ok(self.network(network)?.is_powered())
    }

    /// Idle draw of every node in `network`.
    pub fn idle_power_usage(&self, network: NetworkId) -> Result<f64> {
        Ok(self.network(network)?.idle_power_usage())
    }

    /// Whether an unbounded source is reachable from `network`.
    pub fn has_infinite_store(&self, network: NetworkId) -> Result<bool> {
        Ok(self.network(network)?.has_infinite_store())
    }

    fn checked_amount(&self, network: NetworkId, amount: f64) -> Option<f64> {
        if !amount.is_finite() || amount < 0.0 {
            tracing::warn!("{}: rejected invalid energy amount {}", network, amount);
            return None;
        }
        (amount > 0.0).then_some(amount)
    }

    // ---- tick -----------------------------------------------------------

    /// Advance every network by one tick.
    pub fn tick(&mut self) {
        for id in self.network_ids() {
            self.tick_network(id);
        }
        self.tick += 1;
    }

    /// Advance one network by one tick.
    pub fn tick_network(&mut self, id: NetworkId) {
        self.notify_thresholds(id);

        if self.networks.get(&id).is_some_and(|n| n.infinite_dirty) {
            self.update_infinite(id);
        }

        let Some(net) = self.networks.get_mut(&id) else {
            return;
        };
        net.stats.roll(&self.config);
        let idle_draw = net.stats.idle_draw();

        let has_power = if idle_draw > self.config.idle_draw_threshold {
            let pm = self.config_multiplier();
            let drained = self.extract_with(id, pm.multiply(idle_draw), Actionable::Modulate, &mut VisitedSet::new());
            pm.divide(drained) >= idle_draw - self.config.draw_tolerance
        } else {
            let probe = self.config.probe_amount;
            self.extract_with(id, probe, Actionable::Simulate, &mut VisitedSet::new()) > 0.0
        };

        let debounce = self.config.power_debounce_ticks;
        let Some(net) = self.networks.get_mut(&id) else {
            return;
        };
        if let Some(powered) = net.hysteresis.observe(has_power, debounce) {
            tracing::info!("{}: power {}", id, if powered { "available" } else { "lost" });
            self.events.push(GridEvent::PowerStatusChanged {
                network: id,
                scope: EventScope::Network,
                powered,
                tick: self.tick,
            });
        }
        net.ticks_since_refresh += 1;
    }

    /// Notify watchers whose levels lie between the stored energy of the
    /// previous tick and now.
    fn notify_thresholds(&mut self, id: NetworkId) {
        let Self {
            networks,
            devices,
            config,
            events,
            tick,
            ..
        } = self;
        let Some(net) = networks.get_mut(&id) else {
            return;
        };
        if !net.watchers.has_interests() {
            return;
        }

        let old = net.last_stored_power;
        let now = net.stored_power(devices, config);
        net.last_stored_power = now;

        let crossed: Vec<_> = net
            .watchers
            .crossed(old.min(now), old.max(now))
            .filter_map(|t| t.consumer().map(|consumer| (consumer, t.level)))
            .collect();
        for (consumer, level) in crossed {
            net.watchers.mark_notified(consumer, now);
            events.push(GridEvent::ThresholdCrossed {
                network: id,
                consumer,
                level,
                stored: now,
                tick: *tick,
            });
        }
    }

    pub(crate) fn push_event(&mut self, event: GridEvent) {
        self.events.push(event);
    }

    /// Take every event produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<GridEvent> {
        std::mem::take(&mut self.events)
    }

    /// Events produced since the last drain.
    pub fn pending_events(&self) -> &[GridEvent] {
        &self.events
    }
}
