//! Neighbor networks a network falls back on, and the per-call cycle guard.

use std::collections::BTreeSet;

use crate::types::NetworkId;

/// Networks already entered during one externally-initiated call.
///
/// Every recursive entry point checks and inserts its own id first; a second
/// entry is a normal outcome of a branching graph and moves no energy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitedSet {
    seen: BTreeSet<NetworkId>,
}

impl VisitedSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record entry into `id`. Returns false if it was already entered.
    pub fn enter(&mut self, id: NetworkId) -> bool {
        self.seen.insert(id)
    }

    /// Whether `id` was entered.
    pub fn contains(&self, id: NetworkId) -> bool {
        self.seen.contains(&id)
    }

    /// Entered networks, ascending.
    pub fn iter(&self) -> impl Iterator<Item = NetworkId> + '_ {
        self.seen.iter().copied()
    }

    /// Number of entered networks.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Multiset of neighbor networks, one count per physical link, plus the
/// neighbor that most recently yielded energy.
#[derive(Debug, Clone, Default)]
pub struct DelegationGraph {
    /// (neighbor, link count), in order of first link.
    links: Vec<(NetworkId, usize)>,
    last_neighbor: Option<NetworkId>,
}

impl DelegationGraph {
    /// Create a graph without neighbors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one link to `neighbor`.
    pub fn add(&mut self, neighbor: NetworkId) {
        match self.links.iter_mut().find(|(id, _)| *id == neighbor) {
            Some((_, count)) => *count += 1,
            None => self.links.push((neighbor, 1)),
        }
    }

    /// Remove one link to `neighbor`. The cache is invalidated whenever a link
    /// to the cached neighbor goes away.
    pub fn remove(&mut self, neighbor: NetworkId) -> bool {
        let Some(index) = self.links.iter().position(|(id, _)| *id == neighbor) else {
            return false;
        };
        self.links[index].1 -= 1;
        if self.links[index].1 == 0 {
            self.links.remove(index);
        }
        if self.last_neighbor == Some(neighbor) {
            self.last_neighbor = None;
        }
        true
    }

    /// Drop every link to `neighbor` (the neighbor network was dissolved).
    pub fn remove_all(&mut self, neighbor: NetworkId) -> usize {
        let before = self.link_count();
        self.links.retain(|(id, _)| *id != neighbor);
        if self.last_neighbor == Some(neighbor) {
            self.last_neighbor = None;
        }
        before - self.link_count()
    }

    /// Distinct neighbors in order of first link.
    pub fn neighbors(&self) -> impl Iterator<Item = NetworkId> + '_ {
        self.links.iter().map(|(id, _)| *id)
    }

    /// Snapshot of distinct neighbors, for iterating while the owner recurses.
    pub fn neighbor_list(&self) -> Vec<NetworkId> {
        self.neighbors().collect()
    }

    /// Links to `neighbor`.
    pub fn multiplicity(&self, neighbor: NetworkId) -> usize {
        self.links
            .iter()
            .find(|(id, _)| *id == neighbor)
            .map_or(0, |(_, count)| *count)
    }

    /// Total links.
    pub fn link_count(&self) -> usize {
        self.links.iter().map(|(_, count)| count).sum()
    }

    /// Whether there are no neighbors.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// The cached neighbor, if it is still linked.
    pub fn last_neighbor(&self) -> Option<NetworkId> {
        self.last_neighbor
            .filter(|id| self.links.iter().any(|(linked, _)| linked == id))
    }

    /// Remember `neighbor` as the last one that yielded energy.
    pub fn remember(&mut self, neighbor: NetworkId) {
        if self.multiplicity(neighbor) > 0 {
            self.last_neighbor = Some(neighbor);
        }
    }

    /// Forget the cached neighbor.
    pub fn invalidate(&mut self) {
        self.last_neighbor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visited_set_rejects_reentry() {
        let mut seen = VisitedSet::new();
        assert!(seen.enter(NetworkId(1)));
        assert!(!seen.enter(NetworkId(1)));
        assert!(seen.contains(NetworkId(1)));
        seen.clear();
        assert!(seen.is_empty());
    }

    #[test]
    fn multiset_counts_links() {
        let mut graph = DelegationGraph::new();
        graph.add(NetworkId(2));
        graph.add(NetworkId(2));
        graph.add(NetworkId(3));
        assert_eq!(graph.multiplicity(NetworkId(2)), 2);
        assert_eq!(graph.link_count(), 3);
        assert_eq!(graph.neighbor_list(), vec![NetworkId(2), NetworkId(3)]);

        assert!(graph.remove(NetworkId(2)));
        assert_eq!(graph.multiplicity(NetworkId(2)), 1);
        assert!(graph.remove(NetworkId(2)));
        assert!(!graph.remove(NetworkId(2)));
        assert_eq!(graph.neighbor_list(), vec![NetworkId(3)]);
    }

    #[test]
    fn cache_is_validated_against_links() {
        let mut graph = DelegationGraph::new();
        graph.remember(NetworkId(5));
        assert_eq!(graph.last_neighbor(), None);

        graph.add(NetworkId(5));
        graph.remember(NetworkId(5));
        assert_eq!(graph.last_neighbor(), Some(NetworkId(5)));

        graph.remove_all(NetworkId(5));
        assert_eq!(graph.last_neighbor(), None);
    }

    #[test]
    fn removing_one_of_two_links_invalidates_cache() {
        let mut graph = DelegationGraph::new();
        graph.add(NetworkId(4));
        graph.add(NetworkId(4));
        graph.remember(NetworkId(4));
        graph.remove(NetworkId(4));
        assert_eq!(graph.last_neighbor(), None);
        assert_eq!(graph.multiplicity(NetworkId(4)), 1);
    }
}
