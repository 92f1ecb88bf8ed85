//! Provider and requester sets of a network.
//!
//! Both sets keep insertion order and never hold duplicates. Membership is
//! maintained incrementally by attach/detach and storage notifications; the
//! drain and fill loops evict devices once they are exhausted or full.

use crate::types::DeviceId;

/// Insertion-ordered set of device ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSet {
    items: Vec<DeviceId>,
}

impl DeviceSet {
    /// Add a device; returns false if it was already present.
    pub fn insert(&mut self, id: DeviceId) -> bool {
        if self.items.contains(&id) {
            return false;
        }
        self.items.push(id);
        true
    }

    /// Remove a device; returns false if it was absent.
    pub fn remove(&mut self, id: DeviceId) -> bool {
        match self.items.iter().position(|d| *d == id) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Membership test.
    pub fn contains(&self, id: DeviceId) -> bool {
        self.items.contains(&id)
    }

    /// The oldest member.
    pub fn first(&self) -> Option<DeviceId> {
        self.items.first().copied()
    }

    /// Members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.items.iter().copied()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Local storage of one network: who can give, who can take, and where the
/// last draw or fill left off.
#[derive(Debug, Default)]
pub struct PowerStorageRegistry {
    providers: DeviceSet,
    requesters: DeviceSet,
    last_provider: Option<DeviceId>,
    last_requester: Option<DeviceId>,
    /// Capacity of every attached exporting device.
    max_power: f64,
    /// Cached stored energy, recomputed by the network every refresh interval.
    available_power: f64,
}

impl PowerStorageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a device as provider.
    pub fn add_provider(&mut self, id: DeviceId) -> bool {
        self.providers.insert(id)
    }

    /// Offer a device as requester.
    pub fn add_requester(&mut self, id: DeviceId) -> bool {
        self.requesters.insert(id)
    }

    /// Evict an exhausted provider and forget it as draw position.
    pub fn evict_provider(&mut self, id: DeviceId) {
        self.providers.remove(id);
        if self.last_provider == Some(id) {
            self.last_provider = None;
        }
    }

    /// Evict a full requester and forget it as fill position.
    pub fn evict_requester(&mut self, id: DeviceId) {
        self.requesters.remove(id);
        if self.last_requester == Some(id) {
            self.last_requester = None;
        }
    }

    /// Drop a device from both sets and both caches.
    pub fn forget(&mut self, id: DeviceId) {
        self.evict_provider(id);
        self.evict_requester(id);
    }

    /// The provider to draw from next, re-resolved from the set after eviction.
    pub fn first_provider(&mut self) -> Option<DeviceId> {
        if self.last_provider.is_none() {
            self.last_provider = self.providers.first();
        }
        self.last_provider
    }

    /// The requester to fill next, re-resolved from the set after eviction.
    pub fn first_requester(&mut self) -> Option<DeviceId> {
        if self.last_requester.is_none() {
            self.last_requester = self.requesters.first();
        }
        self.last_requester
    }

    /// Current draw position.
    pub fn last_provider(&self) -> Option<DeviceId> {
        self.last_provider
    }

    /// Current fill position.
    pub fn last_requester(&self) -> Option<DeviceId> {
        self.last_requester
    }

    /// Provider set.
    pub fn providers(&self) -> &DeviceSet {
        &self.providers
    }

    /// Requester set.
    pub fn requesters(&self) -> &DeviceSet {
        &self.requesters
    }

    /// Capacity of attached exporting devices.
    pub fn max_power(&self) -> f64 {
        self.max_power
    }

    /// Cached stored energy; may drift until the next refresh.
    pub fn available_power(&self) -> f64 {
        self.available_power
    }

    pub(crate) fn adjust_max(&mut self, delta: f64) {
        self.max_power += delta;
    }

    pub(crate) fn adjust_available(&mut self, delta: f64) {
        self.available_power += delta;
    }

    pub(crate) fn set_available(&mut self, value: f64) {
        self.available_power = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_set_is_unique_and_ordered() {
        let mut set = DeviceSet::default();
        assert!(set.insert(DeviceId(3)));
        assert!(set.insert(DeviceId(1)));
        assert!(!set.insert(DeviceId(3)));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![DeviceId(3), DeviceId(1)]);
        assert!(set.remove(DeviceId(3)));
        assert!(!set.remove(DeviceId(3)));
        assert_eq!(set.first(), Some(DeviceId(1)));
    }

    #[test]
    fn provider_cache_follows_eviction() {
        let mut registry = PowerStorageRegistry::new();
        registry.add_provider(DeviceId(1));
        registry.add_provider(DeviceId(2));

        assert_eq!(registry.first_provider(), Some(DeviceId(1)));
        registry.evict_provider(DeviceId(1));
        assert_eq!(registry.last_provider(), None);
        assert_eq!(registry.first_provider(), Some(DeviceId(2)));
        registry.evict_provider(DeviceId(2));
        assert_eq!(registry.first_provider(), None);
    }

    #[test]
    fn evicting_other_device_keeps_cache() {
        let mut registry = PowerStorageRegistry::new();
        registry.add_requester(DeviceId(1));
        registry.add_requester(DeviceId(2));
        assert_eq!(registry.first_requester(), Some(DeviceId(1)));
        registry.evict_requester(DeviceId(2));
        assert_eq!(registry.last_requester(), Some(DeviceId(1)));
    }

    #[test]
    fn forget_removes_from_both_sets() {
        let mut registry = PowerStorageRegistry::new();
        registry.add_provider(DeviceId(7));
        registry.add_requester(DeviceId(7));
        registry.first_provider();
        registry.first_requester();
        registry.forget(DeviceId(7));
        assert!(registry.providers().is_empty());
        assert!(registry.requesters().is_empty());
        assert_eq!(registry.last_provider(), None);
        assert_eq!(registry.last_requester(), None);
    }
}
