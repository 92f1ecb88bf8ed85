//! Energy thresholds and the watchers bound to them.
//!
//! A consumer that observes power registers levels of interest. Every tick
//! the network asks for all thresholds between the previous and the current
//! stored energy and notifies their watchers.
//!
//! # Ordering
//!
//! Thresholds order by level, then by [`ThresholdKey`]. The `Floor` and
//! `Ceiling` keys carry no watcher and sort before and after every watcher at
//! the same level, so an inclusive range query can be bounded by two sentinels.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::types::NodeId;

/// Second ordering key of a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ThresholdKey {
    /// Range sentinel below all watchers at a level.
    Floor,
    /// A threshold owned by this consumer's watcher.
    Watcher(NodeId),
    /// Range sentinel above all watchers at a level.
    Ceiling,
}

/// An (energy level, watcher) pair.
#[derive(Debug, Clone, Copy)]
pub struct EnergyThreshold {
    /// Stored energy at which the watcher wants to hear about changes.
    pub level: f64,
    /// Tie-break between thresholds at the same level.
    pub key: ThresholdKey,
}

impl EnergyThreshold {
    /// A threshold bound to a consumer's watcher.
    pub fn new(level: f64, consumer: NodeId) -> Self {
        Self {
            level,
            key: ThresholdKey::Watcher(consumer),
        }
    }

    /// Lower range sentinel at `level`.
    pub fn floor(level: f64) -> Self {
        Self {
            level,
            key: ThresholdKey::Floor,
        }
    }

    /// Upper range sentinel at `level`.
    pub fn ceiling(level: f64) -> Self {
        Self {
            level,
            key: ThresholdKey::Ceiling,
        }
    }

    /// The consumer that owns this threshold, if it is not a sentinel.
    pub fn consumer(&self) -> Option<NodeId> {
        match self.key {
            ThresholdKey::Watcher(node) => Some(node),
            _ => None,
        }
    }
}

impl PartialEq for EnergyThreshold {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EnergyThreshold {}

impl PartialOrd for EnergyThreshold {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EnergyThreshold {
    fn cmp(&self, other: &Self) -> Ordering {
        self.level
            .total_cmp(&other.level)
            .then_with(|| self.key.cmp(&other.key))
    }
}

/// A consumer's subscription to energy levels.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyWatcher {
    consumer: NodeId,
    levels: Vec<f64>,
    last_notified: Option<f64>,
}

impl EnergyWatcher {
    fn new(consumer: NodeId) -> Self {
        Self {
            consumer,
            levels: Vec::new(),
            last_notified: None,
        }
    }

    /// The observing node.
    pub fn consumer(&self) -> NodeId {
        self.consumer
    }

    /// Levels this watcher is interested in, in registration order.
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Stored energy at the last notification.
    pub fn last_notified(&self) -> Option<f64> {
        self.last_notified
    }
}

/// Ordered set of thresholds plus the watcher of every observing consumer.
#[derive(Debug, Default)]
pub struct WatcherRegistry {
    interests: BTreeSet<EnergyThreshold>,
    watchers: BTreeMap<NodeId, EnergyWatcher>,
}

impl WatcherRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the watcher of a consumer. Existing watchers are kept.
    pub fn create(&mut self, consumer: NodeId) {
        self.watchers
            .entry(consumer)
            .or_insert_with(|| EnergyWatcher::new(consumer));
    }

    /// Clear and drop the watcher of a consumer.
    pub fn remove(&mut self, consumer: NodeId) -> Option<EnergyWatcher> {
        self.clear(consumer);
        self.watchers.remove(&consumer)
    }

    /// Register interest in `level`. Returns false if there is no watcher or
    /// the level was already registered.
    pub fn watch(&mut self, consumer: NodeId, level: f64) -> bool {
        if level.is_nan() {
            return false;
        }
        let Some(watcher) = self.watchers.get_mut(&consumer) else {
            return false;
        };
        if !self.interests.insert(EnergyThreshold::new(level, consumer)) {
            return false;
        }
        watcher.levels.push(level);
        true
    }

    /// Withdraw interest in `level`.
    pub fn unwatch(&mut self, consumer: NodeId, level: f64) -> bool {
        let Some(watcher) = self.watchers.get_mut(&consumer) else {
            return false;
        };
        if !self.interests.remove(&EnergyThreshold::new(level, consumer)) {
            return false;
        }
        watcher.levels.retain(|l| l.total_cmp(&level) != Ordering::Equal);
        true
    }

    /// Withdraw every level of a consumer, keeping the watcher itself.
    pub fn clear(&mut self, consumer: NodeId) {
        if let Some(watcher) = self.watchers.get_mut(&consumer) {
            for level in watcher.levels.drain(..) {
                self.interests.remove(&EnergyThreshold::new(level, consumer));
            }
        }
    }

    /// Thresholds with `low <= level <= high`, ascending.
    pub fn crossed(&self, low: f64, high: f64) -> impl Iterator<Item = &EnergyThreshold> {
        let (low, high) = if low.total_cmp(&high).is_le() { (low, high) } else { (high, low) };
        self.interests
            .range(EnergyThreshold::floor(low)..=EnergyThreshold::ceiling(high))
    }

    /// Record that `consumer` was told about `stored`.
    pub(crate) fn mark_notified(&mut self, consumer: NodeId, stored: f64) {
        if let Some(watcher) = self.watchers.get_mut(&consumer) {
            watcher.last_notified = Some(stored);
        }
    }

    /// The watcher of a consumer.
    pub fn watcher(&self, consumer: NodeId) -> Option<&EnergyWatcher> {
        self.watchers.get(&consumer)
    }

    /// No thresholds registered.
    pub fn has_interests(&self) -> bool {
        !self.interests.is_empty()
    }

    /// Number of registered thresholds.
    pub fn interest_count(&self) -> usize {
        self.interests.len()
    }

    /// Number of watchers.
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }
}
