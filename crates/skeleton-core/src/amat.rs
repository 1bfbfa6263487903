//! # Adjacency Matrix Interchange
//!
//! Dense 0/1 matrices are the format the rest of a discovery pipeline
//! exchanges skeletons in.
//!
//! - Export: row/column `k` is `node_list[k]`, or the `k`-th node in sorted
//!   order when no list is given. The result is symmetric by construction.
//! - Import: nodes are `0..size`; any nonzero cell `(i, j)` with `i != j`
//!   yields the edge `{i, j}`, so an asymmetric input imports as its
//!   symmetrization. Diagonal cells are ignored.
//!
//! Sparse export is not provided.

use crate::graph::UndirectedGraph;
use crate::{NodeKey, SkeletonError};
use nalgebra::{DMatrix, Scalar};
use num_traits::Zero;
use std::collections::HashMap;

/// Dense adjacency matrix with 0/1 entries.
pub type AdjacencyMatrix = DMatrix<u8>;

impl<N: NodeKey> UndirectedGraph<N> {
    /// Export the graph as a symmetric 0/1 adjacency matrix.
    ///
    /// `node_list` fixes the row/column order and must contain every node of
    /// the graph exactly once. Without it nodes are laid out in sorted order.
    pub fn to_amat(&self, node_list: Option<&[N]>) -> Result<AdjacencyMatrix, SkeletonError> {
        let index = match node_list {
            Some(list) => self.index_node_list(list)?,
            None => {
                let mut sorted: Vec<&N> = self.nodes_iter().collect();
                sorted.sort();
                sorted
                    .into_iter()
                    .enumerate()
                    .map(|(position, node)| (node, position))
                    .collect()
            }
        };

        let size = self.num_nodes();
        let mut amat = AdjacencyMatrix::zeros(size, size);

        for edge in self.edges_iter() {
            let (a, b) = edge.endpoints();
            let row = position_of(&index, a)?;
            let col = position_of(&index, b)?;
            amat[(row, col)] = 1;
            amat[(col, row)] = 1;
        }

        Ok(amat)
    }

    /// Validate a caller-supplied layout and map each node to its position.
    fn index_node_list<'a>(&self, list: &'a [N]) -> Result<HashMap<&'a N, usize>, SkeletonError> {
        let mut index = HashMap::with_capacity(list.len());
        for (position, node) in list.iter().enumerate() {
            if index.insert(node, position).is_some() {
                return Err(SkeletonError::DuplicateNode(format!("{node:?}")));
            }
        }

        if let Some(missing) = self.nodes_iter().find(|node| !index.contains_key(node)) {
            return Err(SkeletonError::NodeNotFound(format!("{missing:?}")));
        }

        if list.len() != self.num_nodes() {
            return Err(SkeletonError::NodeListMismatch {
                expected: self.num_nodes(),
                actual: list.len(),
            });
        }

        Ok(index)
    }
}

impl UndirectedGraph<usize> {
    /// Build a graph from a square adjacency matrix.
    ///
    /// The node set is `0..size`; `{i, j}` is an edge iff `amat[(i, j)]` or
    /// `amat[(j, i)]` is nonzero.
    pub fn from_amat<T>(amat: &DMatrix<T>) -> Result<Self, SkeletonError>
    where
        T: Scalar + Zero,
    {
        if !amat.is_square() {
            return Err(SkeletonError::NotSquare {
                rows: amat.nrows(),
                cols: amat.ncols(),
            });
        }

        let size = amat.nrows();
        let pairs = (0..size)
            .flat_map(|i| (0..size).map(move |j| (i, j)))
            .filter(|&(i, j)| i != j && !amat[(i, j)].is_zero());

        Self::new(0..size, pairs)
    }

    /// Relabel an index-based graph: node `k` becomes `labels[k]`.
    ///
    /// Inverse of exporting with `node_list = labels` and re-importing.
    pub fn relabel<M: NodeKey>(&self, labels: &[M]) -> Result<UndirectedGraph<M>, SkeletonError> {
        let mut seen = std::collections::HashSet::with_capacity(labels.len());
        if let Some(duplicate) = labels.iter().find(|label| !seen.insert(*label)) {
            return Err(SkeletonError::DuplicateNode(format!("{duplicate:?}")));
        }

        let label = |k: usize| {
            labels
                .get(k)
                .cloned()
                .ok_or(SkeletonError::IndexOutOfBounds {
                    index: k,
                    dim: labels.len(),
                })
        };

        let nodes = self
            .nodes_iter()
            .map(|&k| label(k))
            .collect::<Result<Vec<_>, _>>()?;
        let edges = self
            .edges_iter()
            .map(|edge| Ok((label(*edge.first())?, label(*edge.second())?)))
            .collect::<Result<Vec<_>, SkeletonError>>()?;

        UndirectedGraph::new(nodes, edges)
    }
}

fn position_of<N: NodeKey>(index: &HashMap<&N, usize>, node: &N) -> Result<usize, SkeletonError> {
    index
        .get(node)
        .copied()
        .ok_or_else(|| SkeletonError::NodeNotFound(format!("{node:?}")))
}

// =============================================================================
// TESTS
// =============================================================================
