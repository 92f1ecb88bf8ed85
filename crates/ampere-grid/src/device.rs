//! Storage devices the ledger draws from and charges.
//!
//! Devices belong to the host. The engine only ever talks to them through
//! [`PowerStorage`], and networks refer to them by [`DeviceId`].

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::{AccessRestriction, Actionable, DeviceId};

/// A block that stores energy and may exchange it with a network.
pub trait PowerStorage: std::fmt::Debug {
    /// Energy currently stored.
    fn current_power(&self) -> f64;

    /// Capacity.
    fn max_power(&self) -> f64;

    /// Which directions energy may flow.
    fn power_flow(&self) -> AccessRestriction;

    /// Unbounded source: never depletes.
    fn is_infinite(&self) -> bool {
        false
    }

    /// Only public storages may be charged or drained by a network.
    fn is_public(&self) -> bool {
        true
    }

    /// Remove up to `amount`; returns what was (or would be) removed.
    fn extract_power(&mut self, amount: f64, mode: Actionable) -> f64;

    /// Store up to `amount`; returns the part that did not fit.
    fn inject_power(&mut self, amount: f64, mode: Actionable) -> f64;
}

/// A bounded energy cell.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyCell {
    current: f64,
    max: f64,
    flow: AccessRestriction,
    public: bool,
}

impl EnergyCell {
    /// Create a bidirectional public cell holding `current` out of `max`.
    pub fn new(current: f64, max: f64) -> Self {
        let max = max.max(0.0);
        Self {
            current: current.clamp(0.0, max),
            max,
            flow: AccessRestriction::ReadWrite,
            public: true,
        }
    }

    /// Restrict the flow direction.
    pub fn with_flow(mut self, flow: AccessRestriction) -> Self {
        self.flow = flow;
        self
    }

    /// Mark the cell as private (not chargeable by a network).
    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }
}

impl PowerStorage for EnergyCell {
    fn current_power(&self) -> f64 {
        self.current
    }

    fn max_power(&self) -> f64 {
        self.max
    }

    fn power_flow(&self) -> AccessRestriction {
        self.flow
    }

    fn is_public(&self) -> bool {
        self.public
    }

    fn extract_power(&mut self, amount: f64, mode: Actionable) -> f64 {
        if !self.flow.can_export() || amount <= 0.0 {
            return 0.0;
        }
        let taken = amount.min(self.current);
        if mode.is_modulate() {
            self.current -= taken;
        }
        taken
    }

    fn inject_power(&mut self, amount: f64, mode: Actionable) -> f64 {
        if !self.flow.can_import() || amount <= 0.0 {
            return amount.max(0.0);
        }
        let stored = amount.min(self.max - self.current);
        if mode.is_modulate() {
            self.current += stored;
        }
        amount - stored
    }
}

/// An unbounded source: always full, hands out anything, swallows injection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CreativeCell;

impl CreativeCell {
    const NOMINAL: f64 = (i64::MAX / 10_000) as f64;
}

impl PowerStorage for CreativeCell {
    fn current_power(&self) -> f64 {
        Self::NOMINAL
    }

    fn max_power(&self) -> f64 {
        Self::NOMINAL
    }

    fn power_flow(&self) -> AccessRestriction {
        AccessRestriction::ReadWrite
    }

    fn is_infinite(&self) -> bool {
        true
    }

    fn extract_power(&mut self, amount: f64, _mode: Actionable) -> f64 {
        amount.max(0.0)
    }

    fn inject_power(&mut self, _amount: f64, _mode: Actionable) -> f64 {
        0.0
    }
}

/// The host's device store, consulted by the networks.
#[derive(Debug, Default)]
pub struct DeviceTable {
    devices: BTreeMap<DeviceId, Box<dyn PowerStorage>>,
    next_id: u64,
}

impl DeviceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device under a fresh id.
    pub fn insert(&mut self, device: impl PowerStorage + 'static) -> DeviceId {
        while self.devices.contains_key(&DeviceId(self.next_id)) {
            self.next_id += 1;
        }
        let id = DeviceId(self.next_id);
        self.next_id += 1;
        self.devices.insert(id, Box::new(device));
        id
    }

    /// Register a device under a caller-chosen id.
    pub fn insert_with_id(&mut self, id: DeviceId, device: Box<dyn PowerStorage>) -> Result<()> {
        if self.devices.contains_key(&id) {
            return Err(Error::DuplicateDevice(id));
        }
        self.devices.insert(id, device);
        Ok(())
    }

    /// Forget a device.
    pub fn remove(&mut self, id: DeviceId) -> Option<Box<dyn PowerStorage>> {
        self.devices.remove(&id)
    }

    /// Look up a device.
    pub fn get(&self, id: DeviceId) -> Option<&dyn PowerStorage> {
        self.devices.get(&id).map(|d| d.as_ref())
    }

    /// Look up a device mutably.
    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut (dyn PowerStorage + 'static)> {
        self.devices.get_mut(&id).map(|d| d.as_mut())
    }

    /// Look up a device or fail with [`Error::UnknownDevice`].
    pub fn require(&self, id: DeviceId) -> Result<&dyn PowerStorage> {
        self.get(id).ok_or(Error::UnknownDevice(id))
    }

    /// Sum of stored energy over the given devices; missing ids count as empty.
    pub fn total_power(&self, ids: impl IntoIterator<Item = DeviceId>) -> f64 {
        ids.into_iter()
            .filter_map(|id| self.get(id))
            .map(|d| d.current_power())
            .sum()
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_extract_is_bounded_by_charge() {
        let mut cell = EnergyCell::new(100.0, 200.0);
        assert_eq!(cell.extract_power(150.0, Actionable::Simulate), 100.0);
        assert_eq!(cell.current_power(), 100.0);
        assert_eq!(cell.extract_power(30.0, Actionable::Modulate), 30.0);
        assert_eq!(cell.current_power(), 70.0);
    }

    #[test]
    fn cell_inject_returns_overflow() {
        let mut cell = EnergyCell::new(180.0, 200.0);
        assert_eq!(cell.inject_power(50.0, Actionable::Simulate), 30.0);
        assert_eq!(cell.current_power(), 180.0);
        assert_eq!(cell.inject_power(50.0, Actionable::Modulate), 30.0);
        assert_eq!(cell.current_power(), 200.0);
    }

    #[test]
    fn restricted_cells_refuse_the_wrong_direction() {
        let mut export_only = EnergyCell::new(50.0, 100.0).with_flow(AccessRestriction::Read);
        assert_eq!(export_only.inject_power(10.0, Actionable::Modulate), 10.0);

        let mut import_only = EnergyCell::new(50.0, 100.0).with_flow(AccessRestriction::Write);
        assert_eq!(import_only.extract_power(10.0, Actionable::Modulate), 0.0);
    }

    #[test]
    fn creative_cell_never_depletes() {
        let mut cell = CreativeCell;
        assert!(cell.is_infinite());
        assert_eq!(cell.extract_power(1e9, Actionable::Modulate), 1e9);
        assert_eq!(cell.inject_power(5.0, Actionable::Modulate), 0.0);
    }

    #[test]
    fn table_assigns_fresh_ids() {
        let mut table = DeviceTable::new();
        table
            .insert_with_id(DeviceId(0), Box::new(EnergyCell::new(1.0, 1.0)))
            .unwrap();
        let id = table.insert(EnergyCell::new(2.0, 2.0));
        assert_ne!(id, DeviceId(0));
        assert_eq!(table.total_power([DeviceId(0), id, DeviceId(99)]), 3.0);
        assert!(matches!(
            table.insert_with_id(id, Box::new(CreativeCell)),
            Err(Error::DuplicateDevice(_))
        ));
    }
}
