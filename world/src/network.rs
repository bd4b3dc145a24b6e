//! Connectivity graph and derived caches used by the world crate.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use ooze_defence_core::BuildingId;

/// Undirected building graph plus the caches derived from it.
///
/// The adjacency is always live. Reachability and path caches are only
/// recomputed by [`Network::rebuild_with`], so between a structural change
/// and the next rebuild they may still mention buildings that no longer
/// exist.
#[derive(Clone, Debug, Default)]
pub(crate) struct Network {
    adjacency: BTreeMap<BuildingId, BTreeSet<BuildingId>>,
    reachable: BTreeMap<BuildingId, BTreeSet<BuildingId>>,
    paths: BTreeMap<(BuildingId, BuildingId), Vec<BuildingId>>,
    last_target_index: BTreeMap<BuildingId, usize>,
    dirty: bool,
}

impl Network {
    /// Adds a node and links it with the provided neighbours.
    pub(crate) fn insert_node(&mut self, id: BuildingId, neighbors: &[BuildingId]) {
        let _ = self.adjacency.entry(id).or_default();
        for &neighbor in neighbors {
            if neighbor == id {
                continue;
            }
            let _ = self.adjacency.entry(id).or_default().insert(neighbor);
            let _ = self.adjacency.entry(neighbor).or_default().insert(id);
        }
        self.dirty = true;
    }

    /// Unlinks a node from the live adjacency. Caches are left untouched.
    pub(crate) fn remove_node(&mut self, id: BuildingId) {
        if let Some(neighbors) = self.adjacency.remove(&id) {
            for neighbor in neighbors {
                if let Some(links) = self.adjacency.get_mut(&neighbor) {
                    let _ = links.remove(&id);
                }
            }
        }
        self.dirty = true;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn neighbors(&self, id: BuildingId) -> impl Iterator<Item = BuildingId> + '_ {
        self.adjacency.get(&id).into_iter().flatten().copied()
    }

    /// Breadth-first search over the live adjacency.
    ///
    /// Only built buildings forward the search; the endpoints themselves may
    /// be unbuilt.
    pub(crate) fn are_connected<F>(&self, a: BuildingId, b: BuildingId, is_built: F) -> bool
    where
        F: Fn(BuildingId) -> bool,
    {
        if !self.adjacency.contains_key(&a) || !self.adjacency.contains_key(&b) {
            return false;
        }
        if a == b {
            return true;
        }

        let mut visited = BTreeSet::from([a]);
        let mut queue = VecDeque::from([a]);

        while let Some(current) = queue.pop_front() {
            if current != a && !is_built(current) {
                continue;
            }
            for neighbor in self.neighbors(current) {
                if neighbor == b {
                    return true;
                }
                if visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }

        false
    }

    /// Recomputes reachability and shortest paths for every source.
    ///
    /// Unbuilt buildings are reachable leaves: they receive paths but never
    /// forward the search.
    pub(crate) fn rebuild_with<F>(&mut self, sources: &[BuildingId], is_built: F)
    where
        F: Fn(BuildingId) -> bool,
    {
        self.reachable.clear();
        self.paths.clear();

        for &source in sources {
            if !self.adjacency.contains_key(&source) {
                continue;
            }

            let mut parents: BTreeMap<BuildingId, BuildingId> = BTreeMap::new();
            let mut reached = BTreeSet::new();
            let mut queue = VecDeque::from([source]);

            while let Some(current) = queue.pop_front() {
                if current != source && !is_built(current) {
                    continue;
                }
                for neighbor in self.neighbors(current) {
                    if neighbor == source || parents.contains_key(&neighbor) {
                        continue;
                    }
                    let _ = parents.insert(neighbor, current);
                    let _ = reached.insert(neighbor);
                    queue.push_back(neighbor);
                }
            }

            for &target in &reached {
                let path = trace_path(source, target, &parents);
                let _ = self.paths.insert((source, target), path);
            }
            let _ = self.reachable.insert(source, reached);
        }

        self.last_target_index
            .retain(|source, _| sources.contains(source));
        self.dirty = false;
    }

    pub(crate) fn reachable_from(&self, source: BuildingId) -> Option<&BTreeSet<BuildingId>> {
        self.reachable.get(&source)
    }

    pub(crate) fn cached_path(&self, source: BuildingId, target: BuildingId) -> Option<&[BuildingId]> {
        self.paths.get(&(source, target)).map(Vec::as_slice)
    }

    pub(crate) fn last_target_index(&self, source: BuildingId) -> usize {
        self.last_target_index.get(&source).copied().unwrap_or(0)
    }

    pub(crate) fn set_last_target_index(&mut self, source: BuildingId, index: usize) {
        let _ = self.last_target_index.insert(source, index);
    }
}

fn trace_path(
    source: BuildingId,
    target: BuildingId,
    parents: &BTreeMap<BuildingId, BuildingId>,
) -> Vec<BuildingId> {
    let mut path = vec![target];
    let mut current = target;
    while current != source {
        let Some(&parent) = parents.get(&current) else {
            break;
        };
        path.push(parent);
        current = parent;
    }
    path.reverse();
    path
}
