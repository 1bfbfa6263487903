//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the crate:
//! - Node identity (`NodeKey`)
//! - Edge identity (`Edge`), an unordered pair stored in canonical order
//! - Error types (`SkeletonError`)
//!
//! ## Identity Guarantees
//!
//! - `Edge::new(a, b) == Edge::new(b, a)` and both hash identically
//! - Self-pairs are unrepresentable: `Edge::new(a, a)` is an error

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

// =============================================================================
// NODE IDENTITY
// =============================================================================

/// Identifier of a variable in the skeleton.
///
/// Nodes carry no attributes beyond identity. `Ord` supplies the total order
/// used to canonicalize edges and to sort the default adjacency-matrix layout.
pub trait NodeKey: Clone + Eq + Hash + Ord + Debug {}

impl<T> NodeKey for T where T: Clone + Eq + Hash + Ord + Debug {}

// =============================================================================
// EDGE
// =============================================================================

/// An undirected edge `{a, b}` between two distinct nodes.
///
/// The endpoints are stored smallest first, so equality and hashing do not
/// depend on the order the caller supplied them in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(
    try_from = "RawEdge<N>",
    bound(deserialize = "N: NodeKey + Deserialize<'de>")
)]
pub struct Edge<N> {
    first: N,
    second: N,
}

/// Serialized form of an [`Edge`], canonicalized on the way in.
#[derive(Deserialize)]
struct RawEdge<N> {
    first: N,
    second: N,
}

impl<N: NodeKey> TryFrom<RawEdge<N>> for Edge<N> {
    type Error = SkeletonError;

    fn try_from(raw: RawEdge<N>) -> Result<Self, Self::Error> {
        Self::new(raw.first, raw.second)
    }
}

impl<N: NodeKey> Edge<N> {
    /// Create the canonical edge between `a` and `b`.
    pub fn new(a: N, b: N) -> Result<Self, SkeletonError> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self {
                first: a,
                second: b,
            }),
            std::cmp::Ordering::Greater => Ok(Self {
                first: b,
                second: a,
            }),
            std::cmp::Ordering::Equal => Err(SkeletonError::SelfLoop(format!("{a:?}"))),
        }
    }

    /// The smaller endpoint.
    #[must_use]
    pub fn first(&self) -> &N {
        &self.first
    }

    /// The larger endpoint.
    #[must_use]
    pub fn second(&self) -> &N {
        &self.second
    }

    /// Both endpoints, smallest first.
    #[must_use]
    pub fn endpoints(&self) -> (&N, &N) {
        (&self.first, &self.second)
    }

    /// Consume the edge into its endpoints, smallest first.
    #[must_use]
    pub fn into_endpoints(self) -> (N, N) {
        (self.first, self.second)
    }

    /// Check if `node` is one of the endpoints.
    #[must_use]
    pub fn contains(&self, node: &N) -> bool {
        self.first == *node || self.second == *node
    }

    /// The endpoint opposite to `node`, if `node` is an endpoint.
    #[must_use]
    pub fn other(&self, node: &N) -> Option<&N> {
        if self.first == *node {
            Some(&self.second)
        } else if self.second == *node {
            Some(&self.first)
        } else {
            None
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the skeleton graph and the CI oracle.
///
/// Node identities are rendered with `Debug` so that the error type stays
/// independent of the node type. Errors are data for the calling algorithm;
/// neither component retries or recovers internally.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SkeletonError {
    /// The node is not part of the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// The edge is not part of the graph.
    #[error("Edge not found: {0} -- {1}")]
    EdgeNotFound(String, String),

    /// Both endpoints of an edge are the same node.
    #[error("Self-loop on node {0} is not allowed")]
    SelfLoop(String),

    /// A node list does not have one entry per graph node.
    #[error("Node list has {actual} entries, graph has {expected} nodes")]
    NodeListMismatch { expected: usize, actual: usize },

    /// A node appears more than once in a node list.
    #[error("Duplicate node in node list: {0}")]
    DuplicateNode(String),

    /// A matrix that must be square is not.
    #[error("Matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    /// A variable index lies outside the correlation matrix.
    #[error("Index {index} out of bounds for dimension {dim}")]
    IndexOutOfBounds { index: usize, dim: usize },

    /// The tested pair or conditioning set is malformed.
    #[error("Invalid hypothesis: {0}")]
    InvalidHypothesis(String),

    /// Significance level outside the open interval (0, 1).
    #[error("Significance level must lie in (0, 1), got {0}")]
    InvalidAlpha(f64),

    /// The sufficient statistic is malformed.
    #[error("Invalid sufficient statistic: {0}")]
    InvalidSuffstat(String),

    /// The conditioning submatrix could not be inverted.
    #[error("Singular conditioning submatrix for variables {0:?}")]
    SingularMatrix(Vec<usize>),

    /// The conditioning submatrix has a negative eigenvalue.
    #[error("Conditioning submatrix for variables {0:?} is not positive definite")]
    NotPositiveDefinite(Vec<usize>),

    /// Fewer samples than the Fisher-z statistic needs.
    #[error("Insufficient sample size {n} for conditioning set of size {conditioning}")]
    InsufficientSamples { n: usize, conditioning: usize },

    /// The test statistic evaluated to NaN.
    #[error("Test statistic is not a number (partial correlation {0})")]
    NonFiniteStatistic(f64),
}

// =============================================================================
// TESTS
// =============================================================================
