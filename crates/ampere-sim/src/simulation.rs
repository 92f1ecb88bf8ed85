//! Scenario simulation with event recording.

use std::str::FromStr;
use std::time::Duration;

use ampere_grid::{
    Actionable, CreativeCell, DeviceId, EnergyCell, EnergySystem, GridConfig, GridEvent, Machine, NetworkId,
    NodeId, PowerStorage, StorageEvent,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::snapshot::SystemSnapshot;

/// Topology a simulation is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Networks linked both ways in a line; the generator sits at the head.
    Chain,
    /// A chain whose ends are linked too.
    Ring,
    /// Like `Chain`, but the head holds an unbounded source instead of a generator.
    Creative,
}

impl FromStr for Scenario {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chain" => Ok(Scenario::Chain),
            "ring" => Ok(Scenario::Ring),
            "creative" => Ok(Scenario::Creative),
            other => Err(Error::UnknownScenario(other.to_string())),
        }
    }
}

/// Configuration for the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed for deterministic load jitter
    pub seed: u64,
    /// Ticks to run
    pub ticks: u64,
    /// Wall-clock pause between ticks when run paced
    pub tick_interval_ms: u64,
    /// Emit a snapshot every this many ticks
    pub snapshot_every: u64,
    /// Topology to build
    pub scenario: Scenario,
    /// Number of networks in the topology
    pub networks: usize,
    /// Energy the generator offers each tick
    pub generation: f64,
    /// Ledger tunables
    pub grid: GridConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            ticks: 200,
            tick_interval_ms: 50,
            snapshot_every: 20,
            scenario: Scenario::Chain,
            networks: 4,
            generation: 8.0,
            grid: GridConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Create config from `AMPERE_SIM_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            seed: env_or("AMPERE_SIM_SEED", defaults.seed)?,
            ticks: env_or("AMPERE_SIM_TICKS", defaults.ticks)?,
            tick_interval_ms: env_or("AMPERE_SIM_TICK_INTERVAL_MS", defaults.tick_interval_ms)?,
            snapshot_every: env_or("AMPERE_SIM_SNAPSHOT_EVERY", defaults.snapshot_every)?,
            scenario: env_or("AMPERE_SIM_SCENARIO", defaults.scenario)?,
            networks: env_or("AMPERE_SIM_NETWORKS", defaults.networks)?,
            generation: env_or("AMPERE_SIM_GENERATION", defaults.generation)?,
            grid: GridConfig::from_env()?,
        })
    }

    /// Pause between ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| Error::Config { key, value: raw }),
        Err(_) => Ok(default),
    }
}

/// A machine drawing a jittered load from one network.
#[derive(Debug, Clone, Copy)]
struct Consumer {
    network: NetworkId,
    node: NodeId,
    base_draw: f64,
}

/// Drives an [`EnergySystem`] through a scenario and records its events.
pub struct Simulation {
    config: SimulationConfig,
    system: EnergySystem,
    rng: StdRng,
    events: Vec<GridEvent>,
    networks: Vec<NetworkId>,
    batteries: Vec<(NetworkId, DeviceId)>,
    consumers: Vec<Consumer>,
    generator: Option<NetworkId>,
    next_node: u64,
}

impl Simulation {
    /// Build the scenario's topology.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        if config.networks == 0 {
            return Err(Error::EmptyTopology(config.networks));
        }
        let mut sim = Self {
            system: EnergySystem::new(config.grid.clone())?,
            rng: StdRng::seed_from_u64(config.seed),
            events: Vec::new(),
            networks: Vec::new(),
            batteries: Vec::new(),
            consumers: Vec::new(),
            generator: None,
            next_node: 0,
            config,
        };
        sim.build()?;
        Ok(sim)
    }

    fn node(&mut self) -> NodeId {
        self.next_node += 1;
        NodeId(self.next_node)
    }

    fn build(&mut self) -> Result<()> {
        let count = self.config.networks;
        self.networks = (0..count).map(|_| self.system.create_network()).collect();

        for i in 0..count {
            let net = self.networks[i];

            let battery = self.system.add_device(EnergyCell::new(100.0, 500.0));
            let node = self.node();
            self.system.attach(net, node, Machine::storage(battery))?;
            self.batteries.push((net, battery));

            let base_draw = self.rng.gen_range(0.5..2.0);
            let node = self.node();
            self.system
                .attach(net, node, Machine::consumer(base_draw).observing())?;
            self.system.watch(net, node, 50.0)?;
            self.consumers.push(Consumer {
                network: net,
                node,
                base_draw,
            });

            let mut neighbors = Vec::new();
            if i + 1 < count {
                neighbors.push(self.networks[i + 1]);
            }
            if i > 0 {
                neighbors.push(self.networks[i - 1]);
            }
            if self.config.scenario == Scenario::Ring && count > 2 {
                if i == 0 {
                    neighbors.push(self.networks[count - 1]);
                }
                if i == count - 1 {
                    neighbors.push(self.networks[0]);
                }
            }
            for neighbor in neighbors {
                let node = self.node();
                self.system.attach(net, node, Machine::link(neighbor))?;
            }
        }

        let head = self.networks[0];
        match self.config.scenario {
            Scenario::Creative => {
                let source = self.system.add_device(CreativeCell);
                let node = self.node();
                self.system.attach(head, node, Machine::storage(source))?;
            }
            Scenario::Chain | Scenario::Ring => self.generator = Some(head),
        }

        tracing::info!(
            "built {:?} scenario: {} networks, {} consumers",
            self.config.scenario,
            count,
            self.consumers.len()
        );
        self.collect_events();
        Ok(())
    }

    /// Advance one tick: generate, jitter loads, tick the ledger, re-offer
    /// batteries whose charge changed, record events.
    pub fn step(&mut self) -> Result<usize> {
        if let Some(head) = self.generator {
            let offered = self.config.generation * self.rng.gen_range(0.5..1.5);
            let returned = self.system.inject(head, offered, Actionable::Modulate)?;
            tracing::trace!("generator offered {:.3}, {:.3} came back", offered, returned);
        }

        for consumer in self.consumers.clone() {
            let draw = consumer.base_draw * self.rng.gen_range(0.8..1.2);
            self.system
                .update_idle_draw(consumer.network, consumer.node, draw)?;
        }

        self.system.tick();
        self.reoffer_batteries()?;
        Ok(self.collect_events())
    }

    fn reoffer_batteries(&mut self) -> Result<()> {
        for &(net, battery) in &self.batteries {
            let Some(device) = self.system.devices().get(battery) else {
                continue;
            };
            let (current, max) = (device.current_power(), device.max_power());
            if current > 0.0 {
                self.system.notify_storage(net, battery, StorageEvent::ProvidePower)?;
            }
            if current < max {
                self.system.notify_storage(net, battery, StorageEvent::RequestPower)?;
            }
        }
        Ok(())
    }

    fn collect_events(&mut self) -> usize {
        let fresh = self.system.drain_events();
        for event in &fresh {
            match event {
                GridEvent::PowerStatusChanged { network, powered, .. } => {
                    tracing::debug!("{}: powered = {}", network, powered)
                }
                GridEvent::ThresholdCrossed {
                    network, level, stored, ..
                } => tracing::debug!("{}: crossed {} (stored {:.2})", network, level, stored),
                GridEvent::InfiniteStoreChanged { network, infinite, .. } => {
                    tracing::debug!("{}: infinite = {}", network, infinite)
                }
            }
        }
        let count = fresh.len();
        self.events.extend(fresh);
        count
    }

    /// Run `ticks` steps back to back.
    pub fn run(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Run the configured number of ticks on a wall-clock interval, handing
    /// a snapshot to `on_snapshot` every `snapshot_every` ticks and after the
    /// last one.
    pub async fn run_paced<F>(&mut self, mut on_snapshot: F) -> Result<()>
    where
        F: FnMut(&SystemSnapshot),
    {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        let every = self.config.snapshot_every.max(1);
        for done in 1..=self.config.ticks {
            interval.tick().await;
            self.step()?;
            if done % every == 0 || done == self.config.ticks {
                on_snapshot(&self.snapshot()?);
            }
        }
        Ok(())
    }

    /// Capture the current state.
    pub fn snapshot(&mut self) -> Result<SystemSnapshot> {
        SystemSnapshot::capture(&mut self.system)
    }

    /// Get all recorded events.
    pub fn events(&self) -> &[GridEvent] {
        &self.events
    }

    /// Get the number of events recorded.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Networks in build order.
    pub fn networks(&self) -> &[NetworkId] {
        &self.networks
    }

    /// The ledger being driven.
    pub fn system(&self) -> &EnergySystem {
        &self.system
    }

    /// Configuration in use.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(scenario: Scenario) -> SimulationConfig {
        SimulationConfig {
            scenario,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn scenario_names_parse() {
        assert_eq!("Ring".parse::<Scenario>().unwrap(), Scenario::Ring);
        assert_eq!(" chain ".parse::<Scenario>().unwrap(), Scenario::Chain);
        assert!(matches!(
            "mesh".parse::<Scenario>(),
            Err(Error::UnknownScenario(name)) if name == "mesh"
        ));
    }

    #[test]
    fn empty_topology_is_rejected() {
        let cfg = SimulationConfig {
            networks: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(Simulation::new(cfg), Err(Error::EmptyTopology(0))));
    }

    #[test]
    fn chain_links_neighbors_both_ways() {
        let sim = Simulation::new(config(Scenario::Chain)).unwrap();
        let nets = sim.networks().to_vec();
        let middle = sim.system().network(nets[1]).unwrap();
        assert_eq!(middle.delegation().neighbor_list(), vec![nets[2], nets[0]]);
        let head = sim.system().network(nets[0]).unwrap();
        assert_eq!(head.delegation().neighbor_list(), vec![nets[1]]);
    }

    #[test]
    fn ring_closes_the_loop() {
        let sim = Simulation::new(config(Scenario::Ring)).unwrap();
        let nets = sim.networks().to_vec();
        let head = sim.system().network(nets[0]).unwrap();
        assert_eq!(head.delegation().neighbor_list(), vec![nets[1], nets[3]]);
    }

    #[test]
    fn powered_after_the_debounce_window() {
        let mut sim = Simulation::new(config(Scenario::Chain)).unwrap();
        sim.run(40).unwrap();
        let snap = sim.snapshot().unwrap();
        assert_eq!(snap.tick, 40);
        assert_eq!(snap.powered_count, sim.networks().len());
        let gains = sim
            .events()
            .iter()
            .filter(|e| matches!(e, GridEvent::PowerStatusChanged { powered: true, scope: ampere_grid::EventScope::Network, .. }))
            .count();
        assert_eq!(gains, sim.networks().len());
    }

    #[test]
    fn creative_head_spreads_to_the_chain() {
        let mut sim = Simulation::new(config(Scenario::Creative)).unwrap();
        sim.step().unwrap();
        let snap = sim.snapshot().unwrap();
        assert!(snap.networks.iter().all(|n| n.infinite));
        assert!(sim
            .events()
            .iter()
            .any(|e| matches!(e, GridEvent::InfiniteStoreChanged { infinite: true, .. })));
    }

    #[test]
    fn same_seed_same_timeline() {
        let mut a = Simulation::new(config(Scenario::Ring)).unwrap();
        let mut b = Simulation::new(config(Scenario::Ring)).unwrap();
        a.run(60).unwrap();
        b.run(60).unwrap();
        assert_eq!(a.events(), b.events());
        assert_eq!(a.snapshot().unwrap(), b.snapshot().unwrap());
    }
}
