use thiserror::Error;

/// Errors reported for invalid construction or search inputs.
///
/// All variants are detected before any tree or query work is performed.
/// Invariant violations inside a finished tree are programming errors and
/// abort via assertions instead of surfacing here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A tree cannot be built over zero points.
    #[error("point set is empty")]
    EmptyPointSet,

    /// Leaves must hold at least one point.
    #[error("leaf size must be at least 1, got {0}")]
    InvalidLeafSize(usize),

    /// More neighbours requested than reference points exist.
    #[error("k = {k} exceeds the number of reference points ({n})")]
    InvalidNeighbourCount {
        /// Requested number of neighbours.
        k: usize,
        /// Number of reference points in the tree.
        n: usize,
    },

    /// Query and reference points live in different dimensions.
    #[error("dimension mismatch: query has {query} columns, reference has {reference}")]
    DimensionMismatch {
        /// Query dimensionality.
        query: usize,
        /// Reference dimensionality.
        reference: usize,
    },
}

/// Result type for tree construction and search operations.
pub type Result<T> = std::result::Result<T, Error>;
