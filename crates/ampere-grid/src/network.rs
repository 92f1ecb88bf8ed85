//! One connected network: its local storage, neighbors, watchers and accounts.
//!
//! A [`Network`] reacts to attach/detach notifications and keeps its sets
//! up to date incrementally. Energy flow that may recurse into neighbors is
//! driven by [`EnergySystem`](crate::EnergySystem), which owns every network.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::GridConfig;
use crate::delegation::DelegationGraph;
use crate::device::DeviceTable;
use crate::error::{Error, Result};
use crate::persist::{GridStorage, EXTRA_ENERGY_KEY};
use crate::stats::{PowerHysteresis, PowerState, TickStatistics};
use crate::storage::PowerStorageRegistry;
use crate::threshold::WatcherRegistry;
use crate::types::{DeviceId, NetworkId, NodeId};

/// What an attached node brings to the network.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Machine {
    /// Energy drawn every tick while attached.
    pub idle_draw: f64,
    /// Storage block exposed by the node.
    pub storage: Option<DeviceId>,
    /// Network this node bridges to; makes the node a delegation provider.
    pub link: Option<NetworkId>,
    /// The node observes power and gets a watcher.
    pub observes_power: bool,
}

impl Machine {
    /// A plain consumer drawing `idle_draw` per tick.
    pub fn consumer(idle_draw: f64) -> Self {
        Self {
            idle_draw,
            ..Self::default()
        }
    }

    /// A node exposing a storage device.
    pub fn storage(device: DeviceId) -> Self {
        Self {
            storage: Some(device),
            ..Self::default()
        }
    }

    /// A bridge toward another network.
    pub fn link(neighbor: NetworkId) -> Self {
        Self {
            link: Some(neighbor),
            ..Self::default()
        }
    }

    /// Give the node a watcher.
    pub fn observing(mut self) -> Self {
        self.observes_power = true;
        self
    }

    /// Set the idle draw.
    pub fn with_idle_draw(mut self, idle_draw: f64) -> Self {
        self.idle_draw = idle_draw;
        self
    }
}

/// A device telling its network that its charge changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageEvent {
    /// The device holds energy again.
    ProvidePower,
    /// The device has room again.
    RequestPower,
}

#[derive(Debug, Clone, Copy)]
struct NodeRecord {
    machine: Machine,
    previous_draw: f64,
}

/// The aggregate root of one connected topology.
#[derive(Debug)]
pub struct Network {
    id: NetworkId,
    pub(crate) storage: PowerStorageRegistry,
    pub(crate) delegation: DelegationGraph,
    pub(crate) watchers: WatcherRegistry,
    pub(crate) stats: TickStatistics,
    pub(crate) hysteresis: PowerHysteresis,
    nodes: BTreeMap<NodeId, NodeRecord>,
    /// Energy drawn or received beyond what a call asked for.
    pub(crate) extra: f64,
    pub(crate) infinite: bool,
    pub(crate) infinite_dirty: bool,
    pub(crate) ticks_since_refresh: u64,
    pub(crate) last_stored_power: f64,
}

impl Network {
    /// Create an empty network.
    pub fn new(id: NetworkId) -> Self {
        Self {
            id,
            storage: PowerStorageRegistry::new(),
            delegation: DelegationGraph::new(),
            watchers: WatcherRegistry::new(),
            stats: TickStatistics::new(),
            hysteresis: PowerHysteresis::new(),
            nodes: BTreeMap::new(),
            extra: 0.0,
            infinite: false,
            infinite_dirty: false,
            ticks_since_refresh: 0,
            last_stored_power: -1.0,
        }
    }

    /// This network's id.
    pub fn id(&self) -> NetworkId {
        self.id
    }

    /// Register a node and whatever it brings.
    pub fn attach(&mut self, node: NodeId, machine: Machine, devices: &DeviceTable) -> Result<()> {
        if self.nodes.contains_key(&node) {
            return Err(Error::DuplicateNode {
                network: self.id,
                node,
            });
        }
        let device = match machine.storage {
            Some(id) => Some((id, devices.require(id)?)),
            None => None,
        };

        if let Some(neighbor) = machine.link {
            self.delegation.add(neighbor);
            // a new link cannot turn an infinite network finite
            self.infinite_dirty |= !self.infinite;
        }

        self.stats.adjust_idle_draw(machine.idle_draw);

        if let Some((id, device)) = device {
            if device.is_public() {
                let flow = device.power_flow();
                let current = device.current_power();
                let max = device.max_power();

                if flow.can_export() {
                    self.storage.adjust_max(max);
                }
                if current > 0.0 && flow.can_export() {
                    self.storage.adjust_available(current);
                    self.storage.add_provider(id);
                }
                if current < max && flow.can_import() {
                    self.storage.add_requester(id);
                }
                if device.is_infinite() {
                    self.infinite_dirty = true;
                }
            } else {
                tracing::debug!("{}: {} is private storage, not classified", self.id, id);
            }
        }

        if machine.observes_power {
            self.watchers.create(node);
        }

        self.nodes.insert(
            node,
            NodeRecord {
                machine,
                previous_draw: machine.idle_draw,
            },
        );
        tracing::debug!("{}: attached {} (idle draw {})", self.id, node, machine.idle_draw);
        Ok(())
    }

    /// Remove a node and undo everything its attachment did.
    pub fn detach(&mut self, node: NodeId, devices: &DeviceTable) -> Result<Machine> {
        let record = self.nodes.remove(&node).ok_or(Error::UnknownNode {
            network: self.id,
            node,
        })?;
        let machine = record.machine;

        if let Some(neighbor) = machine.link {
            self.delegation.remove(neighbor);
            // removing a link cannot turn a finite network infinite, but may end infinity
            self.infinite_dirty = true;
        }

        self.stats.adjust_idle_draw(-record.previous_draw);

        if let Some(id) = machine.storage {
            if let Some(device) = devices.get(id) {
                if device.is_public() {
                    if device.power_flow().can_export() {
                        self.storage.adjust_max(-device.max_power());
                        self.storage.adjust_available(-device.current_power());
                    }
                    if device.is_infinite() {
                        self.infinite_dirty = true;
                    }
                }
            }
            self.storage.forget(id);
        }

        if machine.observes_power {
            let levels = self.watchers.watcher(node).map_or(0, |w| w.levels().len());
            if self.watchers.remove(node).is_some() {
                tracing::debug!("{}: dropped watcher of {} ({} levels)", self.id, node, levels);
            }
        }

        tracing::debug!("{}: detached {}", self.id, node);
        Ok(machine)
    }

    /// A device re-offers itself after its charge changed.
    pub fn notify_storage(&mut self, device: DeviceId, event: StorageEvent, devices: &DeviceTable) -> Result<()> {
        let storage = devices.require(device)?;
        if !storage.is_public() {
            tracing::error!(
                "{}: attempt to route energy through non-public storage {}",
                self.id,
                device
            );
            return Err(Error::NonPublicStorage(device));
        }
        let flow = storage.power_flow();
        match event {
            StorageEvent::ProvidePower if flow.can_export() => {
                self.storage.add_provider(device);
            }
            StorageEvent::RequestPower if flow.can_import() => {
                self.storage.add_requester(device);
            }
            _ => {}
        }
        Ok(())
    }

    /// A node's idle draw changed.
    pub fn update_idle_draw(&mut self, node: NodeId, new_draw: f64) -> Result<()> {
        let record = self.nodes.get_mut(&node).ok_or(Error::UnknownNode {
            network: self.id,
            node,
        })?;
        let diff = new_draw - record.previous_draw;
        record.previous_draw = new_draw;
        self.stats.adjust_idle_draw(diff);
        Ok(())
    }

    /// Register a watched level for an observing node.
    pub fn watch(&mut self, consumer: NodeId, level: f64) -> bool {
        self.watchers.watch(consumer, level)
    }

    /// Withdraw a watched level.
    pub fn unwatch(&mut self, consumer: NodeId, level: f64) -> bool {
        self.watchers.unwatch(consumer, level)
    }

    /// The network is being split in two; the other half persists `storage`.
    pub fn on_split(&mut self, storage: &mut GridStorage) {
        // intent of splitting the excess is unclear; halve it literally
        self.infinite_dirty = true;
        self.extra /= 2.0;
        storage.set_f64(EXTRA_ENERGY_KEY, self.extra);
    }

    /// Another network, persisted in `storage`, merges into this one.
    pub fn on_join(&mut self, storage: &GridStorage) {
        self.infinite_dirty = true;
        self.extra += storage.get_f64(EXTRA_ENERGY_KEY);
    }

    /// Write this network's state into its persisted record.
    pub fn populate(&self, storage: &mut GridStorage) {
        storage.set_f64(EXTRA_ENERGY_KEY, self.extra);
    }

    /// Stored energy, recomputed from the providers once the cache is older
    /// than the refresh interval.
    pub fn stored_power(&mut self, devices: &DeviceTable, config: &GridConfig) -> f64 {
        if self.ticks_since_refresh > config.refresh_interval {
            self.refresh_power(devices);
        }
        self.storage.available_power().max(0.0)
    }

    /// Recompute stored energy from the providers now.
    pub fn refresh_power(&mut self, devices: &DeviceTable) {
        self.ticks_since_refresh = 0;
        let total = devices.total_power(self.storage.providers().iter());
        self.storage.set_available(total);
    }

    /// Capacity of attached exporting storage.
    pub fn max_stored_power(&self) -> f64 {
        self.storage.max_power()
    }

    /// Energy buffered instead of returned when injecting into a network
    /// without providers.
    pub fn buffer(&self, config: &GridConfig) -> f64 {
        if self.storage.providers().is_empty() {
            config.empty_buffer
        } else {
            0.0
        }
    }

    pub(crate) fn set_extra(&mut self, value: f64, epsilon: f64) {
        self.extra = if value.abs() < epsilon { 0.0 } else { value };
    }

    /// Excess energy carried into the next call.
    pub fn extra(&self) -> f64 {
        self.extra
    }

    /// Whether an unbounded source is reachable.
    pub fn has_infinite_store(&self) -> bool {
        self.infinite
    }

    /// Whether the infinite flag awaits recomputation.
    pub fn infinite_dirty(&self) -> bool {
        self.infinite_dirty
    }

    pub(crate) fn set_has_infinite_store(&mut self, infinite: bool) {
        self.infinite_dirty = false;
        self.infinite = infinite;
    }

    /// Idle draw of all attached nodes.
    pub fn idle_power_usage(&self) -> f64 {
        self.stats.idle_draw()
    }

    /// Smoothed extraction per tick.
    pub fn avg_power_usage(&self) -> f64 {
        self.stats.avg_drain()
    }

    /// Smoothed injection per tick.
    pub fn avg_power_injection(&self) -> f64 {
        self.stats.avg_injection()
    }

    /// Public power status.
    pub fn is_powered(&self) -> bool {
        self.hysteresis.is_public()
    }

    /// Hysteresis state.
    pub fn power_state(&self) -> PowerState {
        self.hysteresis.state()
    }

    /// Local storage sets.
    pub fn storage(&self) -> &PowerStorageRegistry {
        &self.storage
    }

    /// Neighbor networks.
    pub fn delegation(&self) -> &DelegationGraph {
        &self.delegation
    }

    /// Watchers and thresholds.
    pub fn watchers(&self) -> &WatcherRegistry {
        &self.watchers
    }

    /// Accounting.
    pub fn stats(&self) -> &TickStatistics {
        &self.stats
    }

    /// Whether a node is attached.
    pub fn has_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Number of attached nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
