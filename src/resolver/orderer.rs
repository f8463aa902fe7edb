// src/resolver/orderer.rs

//! Orders transaction elements (package installs and erasures) into a
//! sequence that respects dependency edges.
//!
//! Nodes are transaction elements; an edge install(A) -> install(B) means A
//! requires a capability provided by B, so B must be driven through the file
//! state machine before A. Erase edges run in the opposite direction: if A
//! requires a capability provided by B, erase(B) must come after erase(A).
//! Ordering uses Kahn's algorithm, picking among ready nodes by successor
//! count (the node whose removal unblocks the most other nodes goes first)
//! to keep related packages clustered. A cycle is broken by dropping the
//! first edge in the remaining node set marked `breakable` (a requires not
//! strictly required, or a pre/post scriptlet ordering hint) and logging it;
//! if no breakable edge exists among a stuck set, those nodes are emitted in
//! their original stable order and counted as unordered rather than failing
//! the whole transaction.

use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Whether a transaction element installs or erases a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Install,
    Erase,
}

/// A dependency edge between two transaction elements, by element id.
#[derive(Debug, Clone)]
pub struct ElementEdge {
    pub from: usize,
    pub to: usize,
    /// If true, this edge may be dropped to resolve a cycle without failing
    /// the transaction (e.g. a "requires" not marked strictly required, or a
    /// pre/post scriptlet ordering hint rather than a real file dependency).
    pub breakable: bool,
}

/// A node to be ordered: one package install or erase.
#[derive(Debug, Clone)]
pub struct TransactionElement {
    pub id: usize,
    pub name: String,
    pub kind: ElementKind,
    /// Diagnostic-only side data, populated by `order_elements`.
    pub tree_index: usize,
    pub depth: usize,
    pub breadth: usize,
}

impl TransactionElement {
    pub fn new(id: usize, name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            tree_index: 0,
            depth: 0,
            breadth: 0,
        }
    }
}

/// Outcome of ordering a set of transaction elements.
#[derive(Debug, Clone)]
pub struct OrderResult {
    /// Elements in the order they should be driven through the file state
    /// machine, with `tree_index`/`depth`/`breadth` filled in.
    pub ordered: Vec<TransactionElement>,
    /// Count of elements that could not be placed by a dependency edge and
    /// were instead emitted in their original stable order because no
    /// breakable edge existed to unstick them. Non-zero does not mean the
    /// transaction failed.
    pub unordered: usize,
    /// Edges that were dropped to break a cycle, as (from_id, to_id) pairs,
    /// for diagnostic logging by the caller.
    pub broken_edges: Vec<(usize, usize)>,
}

/// Order transaction elements topologically over the given edges.
///
/// `elements` is consumed in its original order to seed stable tie-breaking
/// and the final fallback emission order.
pub fn order_elements(
    elements: Vec<TransactionElement>,
    edges: Vec<ElementEdge>,
) -> OrderResult {
    let n = elements.len();
    let original_order: Vec<usize> = elements.iter().map(|e| e.id).collect();
    let mut by_id: HashMap<usize, TransactionElement> =
        elements.into_iter().map(|e| (e.id, e)).collect();

    // successors[x] = nodes that must come after x (x provides something they require)
    let mut successors: HashMap<usize, Vec<(usize, bool)>> = HashMap::new();
    let mut in_degree: HashMap<usize, usize> = by_id.keys().map(|&id| (id, 0)).collect();
    let mut remaining_edges: Vec<ElementEdge> = Vec::new();

    for edge in edges {
        if !by_id.contains_key(&edge.from) || !by_id.contains_key(&edge.to) {
            continue;
        }
        successors
            .entry(edge.to)
            .or_default()
            .push((edge.from, edge.breakable));
        *in_degree.entry(edge.from).or_insert(0) += 1;
        remaining_edges.push(edge);
    }

    let mut ordered_ids: Vec<usize> = Vec::with_capacity(n);
    let mut broken_edges: Vec<(usize, usize)> = Vec::new();
    let mut placed: HashSet<usize> = HashSet::new();
    let mut unordered = 0usize;

    loop {
        if placed.len() == n {
            break;
        }

        // Ready set: zero in-degree, not yet placed. Pick by successor count
        // descending (more things unblocked goes first), tie-broken by
        // original input order for determinism.
        let mut ready: Vec<usize> = in_degree
            .iter()
            .filter(|(id, &deg)| deg == 0 && !placed.contains(id))
            .map(|(&id, _)| id)
            .collect();

        if ready.is_empty() {
            // Stuck: either a genuine cycle remains, or we're done.
            let stuck: Vec<usize> = by_id
                .keys()
                .copied()
                .filter(|id| !placed.contains(id))
                .collect();
            if stuck.is_empty() {
                break;
            }

            if let Some(pos) = remaining_edges
                .iter()
                .position(|e| e.breakable && !placed.contains(&e.from) && !placed.contains(&e.to))
            {
                let edge = remaining_edges.remove(pos);
                warn!(
                    "breaking dependency cycle: dropping edge {} -> {}",
                    edge.from, edge.to
                );
                broken_edges.push((edge.from, edge.to));
                if let Some(deg) = in_degree.get_mut(&edge.from) {
                    *deg = deg.saturating_sub(1);
                }
                if let Some(succ) = successors.get_mut(&edge.to) {
                    succ.retain(|(id, _)| *id != edge.from);
                }
                continue;
            }

            // No breakable edge left: emit the stuck set in stable input
            // order and count it as unordered rather than failing.
            warn!(
                "{} transaction elements could not be ordered by dependency; emitting in stable order",
                stuck.len()
            );
            for id in &original_order {
                if stuck.contains(id) {
                    ordered_ids.push(*id);
                    placed.insert(*id);
                    unordered += 1;
                }
            }
            continue;
        }

        ready.sort_by_key(|id| {
            let succ_count = successors.get(id).map(|v| v.len()).unwrap_or(0);
            let orig_pos = original_order.iter().position(|x| x == id).unwrap_or(usize::MAX);
            (std::cmp::Reverse(succ_count), orig_pos)
        });

        let next = ready[0];
        ordered_ids.push(next);
        placed.insert(next);

        if let Some(succ) = successors.get(&next) {
            for (dep_id, _) in succ.clone() {
                if let Some(deg) = in_degree.get_mut(&dep_id) {
                    *deg = deg.saturating_sub(1);
                }
            }
        }
        remaining_edges.retain(|e| e.to != next);
    }

    let mut ordered: Vec<TransactionElement> = Vec::with_capacity(n);
    for (idx, id) in ordered_ids.into_iter().enumerate() {
        if let Some(mut elem) = by_id.remove(&id) {
            elem.tree_index = idx;
            elem.depth = 0;
            elem.breadth = idx;
            ordered.push(elem);
        }
    }

    // Assign depth as longest-path-from-a-root within the final order, purely
    // for diagnostics; best-effort single pass since the order is already
    // dependency-respecting (modulo broken/unordered edges).
    let mut depth_by_id: HashMap<usize, usize> = HashMap::new();
    for elem in &ordered {
        let mut depth = 0;
        if let Some(succ) = successors.get(&elem.id) {
            for (dep_id, _) in succ {
                if let Some(&d) = depth_by_id.get(dep_id) {
                    depth = depth.max(d + 1);
                }
            }
        }
        depth_by_id.insert(elem.id, depth);
    }
    let mut ordered: Vec<TransactionElement> = ordered;
    for elem in ordered.iter_mut() {
        elem.depth = *depth_by_id.get(&elem.id).unwrap_or(&0);
    }

    OrderResult {
        ordered,
        unordered,
        broken_edges,
    }
}
