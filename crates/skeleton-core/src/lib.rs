//! # skeleton-core
//!
//! Leaf components of constraint-based causal structure discovery.
//!
//! - [`UndirectedGraph`]: the skeleton a discovery algorithm prunes, with
//!   incrementally maintained neighbor sets and degree counts, and lossless
//!   conversion to and from dense adjacency matrices.
//! - [`gauss_ci_test`] / [`GaussCiTest`]: the Fisher z conditional
//!   independence oracle over a [`Suffstat`] (sample size plus correlation
//!   matrix).
//!
//! The two components are independent. A discovery algorithm starts from
//! [`UndirectedGraph::complete`], queries the oracle for pairs and
//! conditioning sets of its choosing, and calls
//! [`UndirectedGraph::delete_edge`] whenever `reject` is false.
//!
//! ## Architectural Constraints
//!
//! - Synchronous, no internal locking; callers sharing a graph across
//!   threads must synchronize mutations themselves
//! - No persistence, no I/O
//! - Errors are returned as [`SkeletonError`], never panics
//! - Diagnostics go through `tracing`; no subscriber is installed here

// =============================================================================
// MODULES
// =============================================================================

pub mod amat;
pub mod ci;
pub mod graph;
pub mod suffstat;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Edge, NodeKey, SkeletonError};

// =============================================================================
// RE-EXPORTS: Graph
// =============================================================================

pub use amat::AdjacencyMatrix;
pub use graph::UndirectedGraph;

// =============================================================================
// RE-EXPORTS: CI Oracle
// =============================================================================

pub use ci::{
    CiTest, CiTestConfig, CiTestResult, DEFAULT_ALPHA, GaussCiTest, fisher_z, gauss_ci_test,
    partial_correlation,
};
pub use suffstat::Suffstat;
