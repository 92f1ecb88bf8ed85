//! End-to-end behavior of networks driven through the public API.

use ampere_grid::{
    Actionable, CreativeCell, EnergyCell, EnergySystem, EventScope, GridEvent, GridStorage, Machine, NetworkId,
    NodeId, PowerState, PowerStorage, StorageEvent,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ampere_grid=trace")
        .with_test_writer()
        .try_init();
}

fn power_events(events: &[GridEvent], network: NetworkId) -> Vec<bool> {
    events
        .iter()
        .filter_map(|e| match e {
            GridEvent::PowerStatusChanged {
                network: n,
                scope: EventScope::Network,
                powered,
                ..
            } if *n == network => Some(*powered),
            _ => None,
        })
        .collect()
}

#[test]
fn single_provider_drains_then_evicts() {
    let mut system = EnergySystem::default();
    let net = system.create_network();
    let cell = system.add_device(EnergyCell::new(1000.0, 1000.0));
    system.attach(net, NodeId(1), Machine::storage(cell)).unwrap();

    assert_eq!(system.extract(net, 500.0, Actionable::Modulate).unwrap(), 500.0);
    assert_eq!(system.refresh_stored_power(net).unwrap(), 500.0);
    assert_eq!(system.stored_power(net).unwrap(), 500.0);

    assert_eq!(system.extract(net, 600.0, Actionable::Modulate).unwrap(), 500.0);
    assert!(system.network(net).unwrap().storage().providers().is_empty());
    assert_eq!(system.devices().get(cell).unwrap().current_power(), 0.0);
}

#[test]
fn empty_network_keeps_overflow_in_its_buffer() {
    let mut system = EnergySystem::default();
    let net = system.create_network();
    let cell = system.add_device(EnergyCell::new(0.0, 100.0));
    system.attach(net, NodeId(1), Machine::storage(cell)).unwrap();

    assert_eq!(system.inject(net, 150.0, Actionable::Modulate).unwrap(), 0.0);
    assert_eq!(system.devices().get(cell).unwrap().current_power(), 100.0);
    assert_eq!(system.network(net).unwrap().extra(), 50.0);
}

#[test]
fn delegated_extraction_caches_the_neighbor() {
    let mut system = EnergySystem::default();
    let a = system.create_network();
    let b = system.create_network();
    let cell = system.add_device(EnergyCell::new(200.0, 200.0));
    system.attach(a, NodeId(1), Machine::link(b)).unwrap();
    system.attach(b, NodeId(2), Machine::storage(cell)).unwrap();

    assert_eq!(system.extract(a, 150.0, Actionable::Modulate).unwrap(), 150.0);
    assert_eq!(system.devices().get(cell).unwrap().current_power(), 50.0);
    assert_eq!(system.network(a).unwrap().delegation().last_neighbor(), Some(b));
    assert_eq!(system.network(b).unwrap().stats().tick_drain(), 150.0);
}

#[test]
fn exhausted_neighbor_loses_the_cache() {
    let mut system = EnergySystem::default();
    let a = system.create_network();
    let b = system.create_network();
    let cell = system.add_device(EnergyCell::new(10.0, 200.0));
    system.attach(a, NodeId(1), Machine::link(b)).unwrap();
    system.attach(b, NodeId(2), Machine::storage(cell)).unwrap();

    assert_eq!(system.extract(a, 10.0, Actionable::Modulate).unwrap(), 10.0);
    assert_eq!(system.network(a).unwrap().delegation().last_neighbor(), Some(b));
    assert_eq!(system.extract(a, 10.0, Actionable::Modulate).unwrap(), 0.0);
    assert_eq!(system.network(a).unwrap().delegation().last_neighbor(), None);
}

#[test]
fn detaching_the_link_invalidates_the_cache() {
    let mut system = EnergySystem::default();
    let a = system.create_network();
    let b = system.create_network();
    let cell = system.add_device(EnergyCell::new(100.0, 100.0));
    system.attach(a, NodeId(1), Machine::link(b)).unwrap();
    system.attach(b, NodeId(2), Machine::storage(cell)).unwrap();
    system.extract(a, 10.0, Actionable::Modulate).unwrap();

    system.detach(a, NodeId(1)).unwrap();
    assert_eq!(system.network(a).unwrap().delegation().last_neighbor(), None);
    assert_eq!(system.extract(a, 10.0, Actionable::Modulate).unwrap(), 0.0);
}

#[test]
fn cycles_count_every_network_once() {
    init_tracing();
    let mut system = EnergySystem::default();
    let a = system.create_network();
    let b = system.create_network();
    let cell_a = system.add_device(EnergyCell::new(30.0, 30.0));
    let cell_b = system.add_device(EnergyCell::new(50.0, 50.0));
    system.attach(a, NodeId(1), Machine::storage(cell_a)).unwrap();
    system.attach(a, NodeId(2), Machine::link(b)).unwrap();
    system.attach(b, NodeId(3), Machine::storage(cell_b)).unwrap();
    system.attach(b, NodeId(4), Machine::link(a)).unwrap();

    assert_eq!(system.extract(a, 1000.0, Actionable::Simulate).unwrap(), 80.0);
    assert_eq!(system.demand(a, 1000.0).unwrap(), 0.0);
    assert_eq!(system.extract(a, 1000.0, Actionable::Modulate).unwrap(), 80.0);
    assert_eq!(system.devices().get(cell_a).unwrap().current_power(), 0.0);
    assert_eq!(system.devices().get(cell_b).unwrap().current_power(), 0.0);
}

#[test]
fn cyclic_injection_fills_both_sides_and_returns_the_rest() {
    init_tracing();
    let mut system = EnergySystem::default();
    let a = system.create_network();
    let b = system.create_network();
    let cell_a = system.add_device(EnergyCell::new(10.0, 50.0));
    let cell_b = system.add_device(EnergyCell::new(10.0, 30.0));
    system.attach(a, NodeId(1), Machine::storage(cell_a)).unwrap();
    system.attach(a, NodeId(2), Machine::link(b)).unwrap();
    system.attach(b, NodeId(3), Machine::storage(cell_b)).unwrap();
    system.attach(b, NodeId(4), Machine::link(a)).unwrap();

    assert_eq!(system.demand(a, 1000.0).unwrap(), 60.0);
    assert_eq!(system.inject(a, 100.0, Actionable::Simulate).unwrap(), 40.0);
    assert_eq!(system.inject(a, 100.0, Actionable::Modulate).unwrap(), 40.0);
    assert_eq!(system.devices().get(cell_a).unwrap().current_power(), 50.0);
    assert_eq!(system.devices().get(cell_b).unwrap().current_power(), 30.0);
    assert_eq!(system.network(a).unwrap().extra(), 0.0);
    assert_eq!(system.network(b).unwrap().extra(), 0.0);
}

#[test]
fn recharged_device_is_drawn_again_after_notification() {
    let mut system = EnergySystem::default();
    let net = system.create_network();
    let cell = system.add_device(EnergyCell::new(5.0, 100.0));
    system.attach(net, NodeId(1), Machine::storage(cell)).unwrap();
    system.extract(net, 10.0, Actionable::Modulate).unwrap();
    assert!(system.network(net).unwrap().storage().providers().is_empty());

    system
        .devices_mut()
        .get_mut(cell)
        .unwrap()
        .inject_power(40.0, Actionable::Modulate);
    system.notify_storage(net, cell, StorageEvent::ProvidePower).unwrap();
    assert_eq!(system.extract(net, 10.0, Actionable::Modulate).unwrap(), 10.0);
}

#[test]
fn power_is_debounced_on_gain_and_immediate_on_loss() {
    let mut system = EnergySystem::default();
    let net = system.create_network();
    let cell = system.add_device(EnergyCell::new(31.0, 100.0));
    system.attach(net, NodeId(1), Machine::storage(cell)).unwrap();
    system.attach(net, NodeId(2), Machine::consumer(1.0)).unwrap();
    system.drain_events();

    for _ in 0..30 {
        system.tick();
        assert!(!system.is_powered(net).unwrap());
    }
    assert_eq!(system.network(net).unwrap().power_state(), PowerState::PowerPending);

    system.tick();
    assert!(system.is_powered(net).unwrap());
    assert_eq!(power_events(&system.drain_events(), net), vec![true]);

    // the 31st tick drew the last unit
    system.tick();
    assert!(!system.is_powered(net).unwrap());
    assert_eq!(system.network(net).unwrap().power_state(), PowerState::NoPower);
    assert_eq!(power_events(&system.drain_events(), net), vec![false]);
}

#[test]
fn trivial_idle_draw_only_probes() {
    let mut system = EnergySystem::default();
    let net = system.create_network();
    let cell = system.add_device(EnergyCell::new(1.0, 100.0));
    system.attach(net, NodeId(1), Machine::storage(cell)).unwrap();

    for _ in 0..40 {
        system.tick();
    }
    assert!(system.is_powered(net).unwrap());
    assert_eq!(system.devices().get(cell).unwrap().current_power(), 1.0);
}

#[test]
fn averages_follow_the_drain() {
    let mut system = EnergySystem::default();
    let net = system.create_network();
    let cell = system.add_device(EnergyCell::new(1e6, 1e6));
    system.attach(net, NodeId(1), Machine::storage(cell)).unwrap();

    system.extract(net, 40.0, Actionable::Modulate).unwrap();
    system.inject(net, 80.0, Actionable::Modulate).unwrap();
    system.tick();
    assert!((system.average_drain(net).unwrap() - 1.0).abs() < 1e-12);
    assert!((system.average_injection(net).unwrap() - 2.0).abs() < 1e-12);
}

#[test]
fn watchers_hear_about_crossed_levels() {
    let mut system = EnergySystem::default();
    let net = system.create_network();
    let cell = system.add_device(EnergyCell::new(100.0, 100.0));
    system.attach(net, NodeId(1), Machine::storage(cell)).unwrap();
    system.attach(net, NodeId(2), Machine::consumer(0.0).observing()).unwrap();
    assert!(system.watch(net, NodeId(2), 50.0).unwrap());
    assert!(system.watch(net, NodeId(2), 75.0).unwrap());
    assert!(!system.watch(net, NodeId(3), 10.0).unwrap());

    let crossings = |events: Vec<GridEvent>| -> Vec<f64> {
        events
            .into_iter()
            .filter_map(|e| match e {
                GridEvent::ThresholdCrossed { level, .. } => Some(level),
                _ => None,
            })
            .collect()
    };

    system.tick();
    system.drain_events();

    system.extract(net, 60.0, Actionable::Modulate).unwrap();
    system.tick();
    assert_eq!(crossings(system.drain_events()), vec![50.0, 75.0]);

    system.tick();
    assert!(crossings(system.drain_events()).is_empty());

    assert!(system.unwatch(net, NodeId(2), 50.0).unwrap());
    system.extract(net, 30.0, Actionable::Modulate).unwrap();
    system.tick();
    assert!(crossings(system.drain_events()).is_empty());
}

#[test]
fn detached_watchers_are_silent() {
    let mut system = EnergySystem::default();
    let net = system.create_network();
    let cell = system.add_device(EnergyCell::new(100.0, 100.0));
    system.attach(net, NodeId(1), Machine::storage(cell)).unwrap();
    system.attach(net, NodeId(2), Machine::consumer(0.0).observing()).unwrap();
    system.watch(net, NodeId(2), 50.0).unwrap();
    system.tick();

    system.detach(net, NodeId(2)).unwrap();
    system.extract(net, 60.0, Actionable::Modulate).unwrap();
    system.drain_events();
    system.tick();
    assert!(!system
        .drain_events()
        .iter()
        .any(|e| matches!(e, GridEvent::ThresholdCrossed { .. })));
}

#[test]
fn unbounded_source_flag_follows_links() {
    init_tracing();
    let mut system = EnergySystem::default();
    let a = system.create_network();
    let b = system.create_network();
    let c = system.create_network();
    let creative = system.add_device(CreativeCell);
    system.attach(a, NodeId(1), Machine::link(b)).unwrap();
    system.attach(b, NodeId(2), Machine::link(a)).unwrap();
    system.attach(b, NodeId(3), Machine::link(c)).unwrap();
    system.attach(c, NodeId(4), Machine::link(b)).unwrap();
    system.attach(c, NodeId(5), Machine::storage(creative)).unwrap();

    system.tick();
    for net in [a, b, c] {
        assert!(system.has_infinite_store(net).unwrap());
    }
    assert_eq!(system.extract(a, 1e9, Actionable::Simulate).unwrap(), 1e9);

    system.detach(b, NodeId(3)).unwrap();
    system.detach(c, NodeId(4)).unwrap();
    system.tick();
    assert!(!system.has_infinite_store(a).unwrap());
    assert!(!system.has_infinite_store(b).unwrap());
    assert!(system.has_infinite_store(c).unwrap());
}

#[test]
fn split_and_join_carry_the_excess() {
    let mut system = EnergySystem::default();
    let net = system.create_network();
    system.inject(net, 80.0, Actionable::Modulate).unwrap();
    assert_eq!(system.network(net).unwrap().extra(), 80.0);

    let mut other_half = GridStorage::new();
    system.split(net, &mut other_half).unwrap();
    assert_eq!(system.network(net).unwrap().extra(), 40.0);

    let restored = GridStorage::from_json(&other_half.to_json().unwrap()).unwrap();
    let other = system.create_network();
    system.join(other, &restored).unwrap();
    assert_eq!(system.network(other).unwrap().extra(), 40.0);

    let mut record = GridStorage::new();
    system.populate(net, &mut record).unwrap();
    assert_eq!(record, restored);
}
