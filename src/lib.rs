//! A library for exact nearest neighbour and maximum inner product search
//! based on metric ball trees with single-tree and dual-tree pruning.
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    broken_intra_doc_links
)]

type Scalar = f64;

mod bound;
pub use bound::BallBound;

mod error;
pub use error::{Error, Result};

mod metric;
pub use metric::Kernel;
pub use metric::Metric;

mod strategy;
pub use strategy::CandidateList;
pub use strategy::KernelAccumulator;
pub use strategy::KernelSum;
pub use strategy::MaxInnerProduct;
pub use strategy::NearestNeighbors;
pub use strategy::Neighbour;
pub use strategy::SearchStrategy;

#[cfg(test)]
mod tests;

mod tree;
pub use tree::BallTree;
pub use tree::BallTreeBuilder;
pub use tree::Permutation;

mod search;
