//! # Undirected Skeleton Graph
//!
//! The mutable adjacency structure a constraint-based discovery algorithm
//! prunes: start from a complete graph, delete `{i, j}` whenever the CI
//! oracle declares `i` and `j` conditionally independent.
//!
//! Storage is hash-based so that `has_edge` is O(1) expected and every
//! mutator is O(degree). Neighbor sets and degree counts are derived from
//! the edge set once at construction and then maintained incrementally.
//! Snapshots are returned as `BTreeMap`/`BTreeSet` for deterministic ordering.
//!
//! ## Invariants (hold after every public operation)
//!
//! 1. Every endpoint of every edge is a node, and each endpoint is in the
//!    other's neighbor set.
//! 2. `degree[i] == |neighbors[i]|` for every node.
//! 3. No duplicate or self-pair edges (guaranteed by [`Edge`]).
//! 4. A node has a neighbor entry and a degree entry iff it is in `nodes`.
//!    Isolated nodes have an empty set and degree 0; `delete_node` removes
//!    both entries.
//!
//! ## Lookup Policy
//!
//! Read-only lookups on a single node (`neighbors_of`, `degree_of`) are
//! lenient and answer "empty" for unknown nodes. Every mutator is strict and
//! returns a typed error instead.

use crate::{Edge, NodeKey, SkeletonError};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

// =============================================================================
// GRAPH
// =============================================================================

/// An undirected graph over hashable, totally ordered node identifiers.
///
/// Equality compares the node and edge sets only; the derived indices are
/// consistent by construction.
#[derive(Debug, Clone)]
pub struct UndirectedGraph<N = usize> {
    /// Node set.
    nodes: HashSet<N>,

    /// Edge set, canonicalized pairs.
    edges: HashSet<Edge<N>>,

    /// Adjacency: node -> set of neighbors.
    neighbors: HashMap<N, HashSet<N>>,

    /// Incident edge count per node.
    degrees: HashMap<N, usize>,
}

impl<N> Default for UndirectedGraph<N> {
    fn default() -> Self {
        Self {
            nodes: HashSet::new(),
            edges: HashSet::new(),
            neighbors: HashMap::new(),
            degrees: HashMap::new(),
        }
    }
}

impl<N: NodeKey> PartialEq for UndirectedGraph<N> {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.edges == other.edges
    }
}

impl<N: NodeKey> Eq for UndirectedGraph<N> {}

impl<N: NodeKey> UndirectedGraph<N> {
    /// Create a graph with no nodes and no edges.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a graph from a node set and an edge list.
    ///
    /// Edge endpoints missing from `nodes` are added implicitly. Pairs are
    /// normalized, so `(a, b)` and `(b, a)` describe the same edge.
    ///
    /// Fails with [`SkeletonError::SelfLoop`] if any pair has equal endpoints.
    pub fn new<I, E>(nodes: I, edges: E) -> Result<Self, SkeletonError>
    where
        I: IntoIterator<Item = N>,
        E: IntoIterator<Item = (N, N)>,
    {
        let mut graph = Self::empty();
        for node in nodes {
            graph.add_node(node);
        }
        for (i, j) in edges {
            graph.insert_edge(Edge::new(i, j)?);
        }
        Ok(graph)
    }

    /// Create the complete graph over `nodes`.
    ///
    /// This is the usual starting skeleton of the PC algorithm.
    pub fn complete<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
    {
        let mut ordered: Vec<N> = nodes.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let mut graph = Self::empty();

        while let Some(node) = ordered.pop() {
            graph.add_node(node.clone());
            for other in &ordered {
                if let Ok(edge) = Edge::new(node.clone(), other.clone()) {
                    graph.insert_edge(edge);
                }
            }
        }

        graph
    }

    /// Return an independent copy of this graph.
    ///
    /// Equivalent to `clone()`; no state is shared with the original.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Number of nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Snapshot of the node set.
    #[must_use]
    pub fn nodes(&self) -> BTreeSet<N> {
        self.nodes.iter().cloned().collect()
    }

    /// Snapshot of the edge set.
    #[must_use]
    pub fn edges(&self) -> BTreeSet<Edge<N>> {
        self.edges.iter().cloned().collect()
    }

    /// The adjacencies of the graph. Same as [`edges`](Self::edges).
    #[must_use]
    pub fn skeleton(&self) -> BTreeSet<Edge<N>> {
        self.edges()
    }

    /// Iterate nodes without copying, in unspecified order.
    pub fn nodes_iter(&self) -> impl Iterator<Item = &N> {
        self.nodes.iter()
    }

    /// Iterate edges without copying, in unspecified order.
    pub fn edges_iter(&self) -> impl Iterator<Item = &Edge<N>> {
        self.edges.iter()
    }

    /// Snapshot of every node's degree.
    #[must_use]
    pub fn degrees(&self) -> BTreeMap<N, usize> {
        self.nodes
            .iter()
            .map(|node| (node.clone(), self.degree_of(node)))
            .collect()
    }

    /// Snapshot of every node's neighbor set.
    #[must_use]
    pub fn neighbors(&self) -> BTreeMap<N, BTreeSet<N>> {
        self.nodes
            .iter()
            .map(|node| (node.clone(), self.neighbors_of(node)))
            .collect()
    }

    /// Check if the graph contains a node.
    #[must_use]
    pub fn contains_node(&self, node: &N) -> bool {
        self.nodes.contains(node)
    }

    /// Check if the graph contains the edge `{i, j}`.
    #[must_use]
    pub fn has_edge(&self, i: &N, j: &N) -> bool {
        self.neighbors
            .get(i)
            .is_some_and(|adjacent| adjacent.contains(j))
    }

    /// Neighbors of `node`; empty if the node is unknown.
    #[must_use]
    pub fn neighbors_of(&self, node: &N) -> BTreeSet<N> {
        self.neighbors
            .get(node)
            .map(|adjacent| adjacent.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Degree of `node`; 0 if the node is unknown.
    #[must_use]
    pub fn degree_of(&self, node: &N) -> usize {
        self.degrees.get(node).copied().unwrap_or(0)
    }

    // =========================================================================
    // MUTATORS
    // =========================================================================

    /// Register a node. Returns `false` if it was already present.
    pub fn add_node(&mut self, node: N) -> bool {
        if self.nodes.contains(&node) {
            return false;
        }
        self.neighbors.insert(node.clone(), HashSet::new());
        self.degrees.insert(node.clone(), 0);
        self.nodes.insert(node);
        true
    }

    /// Add the edge `{i, j}`, registering unknown endpoints as nodes.
    ///
    /// Idempotent: returns `Ok(false)` if the edge already exists.
    pub fn add_edge(&mut self, i: N, j: N) -> Result<bool, SkeletonError> {
        let edge = Edge::new(i, j)?;
        let inserted = self.insert_edge(edge);
        if inserted {
            tracing::trace!(num_edges = self.edges.len(), "edge added");
        }
        Ok(inserted)
    }

    /// Add every pair in `edges`. Returns the number of new edges.
    ///
    /// Stops at the first self-loop; pairs before it stay inserted.
    pub fn add_edges_from<E>(&mut self, edges: E) -> Result<usize, SkeletonError>
    where
        E: IntoIterator<Item = (N, N)>,
    {
        let mut added: usize = 0;
        for (i, j) in edges {
            if self.add_edge(i, j)? {
                added = added.saturating_add(1);
            }
        }
        Ok(added)
    }

    /// Delete the edge `{i, j}`.
    ///
    /// Fails with [`SkeletonError::EdgeNotFound`] if the edge is absent.
    pub fn delete_edge(&mut self, i: &N, j: &N) -> Result<(), SkeletonError> {
        let edge = Edge::new(i.clone(), j.clone()).map_err(|_| edge_not_found(i, j))?;
        if !self.edges.remove(&edge) {
            return Err(edge_not_found(i, j));
        }

        self.unlink(i, j);
        self.unlink(j, i);
        tracing::trace!(num_edges = self.edges.len(), "edge deleted");
        Ok(())
    }

    /// Delete every pair in `edges`.
    ///
    /// Aborts at the first missing edge. Deletions made before the failure
    /// are not rolled back.
    pub fn delete_edges_from<'a, E>(&mut self, edges: E) -> Result<(), SkeletonError>
    where
        N: 'a,
        E: IntoIterator<Item = (&'a N, &'a N)>,
    {
        for (i, j) in edges {
            self.delete_edge(i, j)?;
        }
        Ok(())
    }

    /// Delete a node and every edge incident to it.
    ///
    /// Returns the number of edges removed, which equals the node's former
    /// degree. Fails with [`SkeletonError::NodeNotFound`] if the node is absent.
    pub fn delete_node(&mut self, node: &N) -> Result<usize, SkeletonError> {
        if !self.nodes.remove(node) {
            return Err(SkeletonError::NodeNotFound(format!("{node:?}")));
        }

        let former = self.neighbors.remove(node).unwrap_or_default();
        self.degrees.remove(node);

        for neighbor in &former {
            self.unlink(neighbor, node);
            if let Ok(edge) = Edge::new(node.clone(), neighbor.clone()) {
                self.edges.remove(&edge);
            }
        }

        tracing::trace!(removed_edges = former.len(), "node deleted");
        Ok(former.len())
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    /// Insert a canonical edge and update the derived indices.
    fn insert_edge(&mut self, edge: Edge<N>) -> bool {
        if self.edges.contains(&edge) {
            return false;
        }

        let (a, b) = edge.endpoints();
        let (a, b) = (a.clone(), b.clone());
        self.add_node(a.clone());
        self.add_node(b.clone());
        self.link(a.clone(), b.clone());
        self.link(b, a);
        self.edges.insert(edge);
        true
    }

    /// Record `to` as a neighbor of `from`.
    fn link(&mut self, from: N, to: N) {
        if self.neighbors.entry(from.clone()).or_default().insert(to) {
            let degree = self.degrees.entry(from).or_insert(0);
            *degree = degree.saturating_add(1);
        }
    }

    /// Forget `to` as a neighbor of `from`.
    fn unlink(&mut self, from: &N, to: &N) {
        let removed = self
            .neighbors
            .get_mut(from)
            .is_some_and(|adjacent| adjacent.remove(to));
        if removed {
            if let Some(degree) = self.degrees.get_mut(from) {
                *degree = degree.saturating_sub(1);
            }
        }
    }

    /// Check invariants 1, 2 and 4.
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let edges_ok = self.edges.iter().all(|edge| {
            let (a, b) = edge.endpoints();
            self.nodes.contains(a)
                && self.nodes.contains(b)
                && self.has_edge(a, b)
                && self.has_edge(b, a)
        });
        let degrees_ok = self.nodes.iter().all(|node| {
            self.degrees.get(node).copied() == self.neighbors.get(node).map(HashSet::len)
        });
        let no_dangling = self.neighbors.keys().all(|n| self.nodes.contains(n))
            && self.degrees.keys().all(|n| self.nodes.contains(n));
        let adjacency_total: usize = self.degrees.values().sum();

        edges_ok && degrees_ok && no_dangling && adjacency_total == 2 * self.edges.len()
    }
}

fn edge_not_found<N: NodeKey>(i: &N, j: &N) -> SkeletonError {
    SkeletonError::EdgeNotFound(format!("{i:?}"), format!("{j:?}"))
}

// =============================================================================
// TESTS
// =============================================================================
