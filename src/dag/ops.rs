//! Generic operations over parent-linked message graphs.
//!
//! These algorithms are used for:
//! - Checking whether a message is its own ancestor before insertion
//! - Topologically sorting messages (parents before children) for export and
//!   index rebuilds
//!
//! The operations are generic over record types via the `ParentLinked` trait
//! and look records up through a closure, so they work against any arena.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// Trait for types that can participate in parent-linked graph operations.
pub trait ParentLinked {
    /// Identifier type used for the graph edges.
    type Id: Clone + Eq + Hash + Ord;

    /// Returns the identifier of this node.
    fn id(&self) -> &Self::Id;

    /// Returns the identifiers of this node's parents.
    fn parent_ids(&self) -> Vec<Self::Id>;

    /// Returns the creation timestamp in milliseconds since Unix epoch.
    fn created_at(&self) -> u64;
}

/// Returns true if `target` is `start` or one of its ancestors.
///
/// Stops as soon as the target is found. Terminates on cyclic input.
pub fn reaches<'a, N, F>(start: &N::Id, target: &N::Id, lookup: F) -> bool
where
    N: ParentLinked + 'a,
    F: Fn(&N::Id) -> Option<&'a N>,
{
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([start.clone()]);

    while let Some(id) = queue.pop_front() {
        if &id == target {
            return true;
        }
        if !visited.insert(id.clone()) {
            continue;
        }
        if let Some(node) = lookup(&id) {
            queue.extend(
                node.parent_ids()
                    .into_iter()
                    .filter(|parent| !visited.contains(parent)),
            );
        }
    }

    false
}

/// Returns node references in topological order (parents before children).
///
/// Kahn's algorithm with `(created_at, id)` as the tiebreaker, so the output
/// is deterministic for a given set of nodes. Parents that are not part of
/// the input are ignored. Nodes caught in a cycle are appended at the end in
/// tiebreak order.
pub fn nodes_in_topological_order<'a, N, I>(nodes: I) -> Vec<&'a N>
where
    N: ParentLinked + 'a,
    I: IntoIterator<Item = &'a N>,
{
    let mut node_vec: Vec<&N> = nodes.into_iter().collect();
    node_vec.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });

    let position: HashMap<&N::Id, usize> = node_vec
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id(), i))
        .collect();

    let mut pending_parents = vec![0usize; node_vec.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); node_vec.len()];
    for (i, node) in node_vec.iter().enumerate() {
        let parents: HashSet<N::Id> = node.parent_ids().into_iter().collect();
        for parent in parents {
            if let Some(&p) = position.get(&parent) {
                if p != i {
                    pending_parents[i] += 1;
                    children[p].push(i);
                }
            }
        }
    }

    // Ready set keyed by tiebreak rank so output stays deterministic.
    let mut ready: std::collections::BTreeSet<usize> = pending_parents
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(i, _)| i)
        .collect();

    let mut result = Vec::with_capacity(node_vec.len());
    let mut added = vec![false; node_vec.len()];

    while let Some(i) = ready.pop_first() {
        result.push(node_vec[i]);
        added[i] = true;
        for &child in &children[i] {
            pending_parents[child] -= 1;
            if pending_parents[child] == 0 {
                ready.insert(child);
            }
        }
    }

    if result.len() < node_vec.len() {
        result.extend(
            node_vec
                .iter()
                .enumerate()
                .filter(|(i, _)| !added[*i])
                .map(|(_, n)| *n),
        );
    }

    result
}
