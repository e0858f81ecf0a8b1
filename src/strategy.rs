use ndarray::ArrayView1;

use crate::{BallBound, Error, Kernel, Metric, Permutation, Result, Scalar};

/// A neighbour resulted from a k-nearest neighbour or k-max inner product
/// search, with its index expressed in the caller's original index space.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbour {
    index: usize,
    score: Scalar,
}

impl Neighbour {
    /// Returns the index of a neighbour.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the score of a neighbour against its query: a distance for
    /// nearest-neighbour search, an inner product for max inner product
    /// search.
    pub fn score(&self) -> Scalar {
        self.score
    }
}

/// Task-specific scoring, pruning and bookkeeping for tree search.
///
/// The traversal engines on [`BallTree`](crate::BallTree) are task-agnostic:
/// everything a task defines — the point-to-point score, optimistic bounds
/// consistent with the score's direction, the candidate update rule and the
/// current pruning threshold — lives behind this trait. A strategy value is
/// immutable shared configuration; all mutation happens on the per-query
/// [`State`](SearchStrategy::State), which lets batch and dual-tree searches
/// run queries in parallel without locking. The engines are generic over the
/// strategy, so scoring is monomorphised rather than dispatched per point
/// pair.
pub trait SearchStrategy: Sync {
    /// Mutable per-query search state.
    type State: Send;
    /// Finalised per-query result.
    type Output: Send;

    /// Fresh state for one query.
    fn init(&self) -> Self::State;

    /// Checks strategy parameters against the reference set size before any
    /// traversal begins.
    fn validate(&self, n_references: usize) -> Result<()> {
        let _ = n_references;
        Ok(())
    }

    /// Scores reference point `index` against the query and updates the
    /// state.
    fn visit(
        &self,
        state: &mut Self::State,
        query: ArrayView1<'_, Scalar>,
        index: usize,
        reference: ArrayView1<'_, Scalar>,
    );

    /// The most promising score any point under `bound` could achieve for
    /// the query.
    fn node_score(&self, query: ArrayView1<'_, Scalar>, bound: &BallBound) -> Scalar;

    /// The most promising score between any pair of points under the two
    /// bounds.
    fn pair_score(&self, query_bound: &BallBound, reference_bound: &BallBound) -> Scalar;

    /// The worst score that could still change the state; a node whose
    /// optimistic score cannot improve on it is pruned.
    fn threshold(&self, state: &Self::State) -> Scalar;

    /// Whether score `a` is strictly more promising than `b`.
    fn improves(&self, a: Scalar, b: Scalar) -> bool;

    /// Accounts for a subtree of `count` points under `bound` that the
    /// engine pruned for this query. A no-op for candidate-list tasks;
    /// accumulation tasks fold the skipped range in here.
    fn absorb(
        &self,
        state: &mut Self::State,
        query: ArrayView1<'_, Scalar>,
        bound: &BallBound,
        count: usize,
    ) {
        let _ = (state, query, bound, count);
    }

    /// Converts the final state into a caller-facing result, translating
    /// reference indices back to the original index space through
    /// `permutation`.
    fn finish(&self, state: Self::State, permutation: &Permutation) -> Self::Output;
}

/// A bounded candidate list kept sorted best-to-worst; its worst entry is
/// the current pruning threshold.
#[derive(Clone, Debug)]
pub struct CandidateList {
    entries: Vec<(usize, Scalar)>,
    k: usize,
}

impl CandidateList {
    fn new(k: usize) -> Self {
        Self {
            entries: Vec::with_capacity(k + 1),
            k,
        }
    }

    fn is_full(&self) -> bool {
        self.entries.len() == self.k
    }

    fn worst(&self) -> Option<Scalar> {
        self.entries.last().map(|e| e.1)
    }

    /// Inserts keeping sort order; among equal scores the earlier visit
    /// stays in front, so traversal order fixes the tie order.
    fn insert(&mut self, index: usize, score: Scalar, better: impl Fn(Scalar, Scalar) -> bool) {
        if self.is_full() {
            match self.worst() {
                Some(worst) if better(score, worst) => {}
                _ => return,
            }
        }

        let pos = self.entries.partition_point(|e| !better(score, e.1));
        self.entries.insert(pos, (index, score));
        self.entries.truncate(self.k);
    }

    fn into_neighbours(self, permutation: &Permutation) -> Vec<Neighbour> {
        self.entries
            .into_iter()
            .map(|(index, score)| Neighbour {
                index: permutation.to_original(index),
                score,
            })
            .collect()
    }
}

/// k-nearest-neighbour search: retains the `k` smallest metric distances.
#[derive(Clone, Copy, Debug)]
pub struct NearestNeighbors {
    k: usize,
    metric: Metric,
}

impl NearestNeighbors {
    /// Creates a strategy returning the `k` nearest neighbours under
    /// `metric`.
    ///
    /// The metric must be the one the reference tree (and, for dual-tree
    /// search, the query tree) was built with; bounds taken in one metric do
    /// not prune soundly in another.
    pub fn new(k: usize, metric: Metric) -> Self {
        Self { k, metric }
    }
}

impl SearchStrategy for NearestNeighbors {
    type State = CandidateList;
    type Output = Vec<Neighbour>;

    fn init(&self) -> CandidateList {
        CandidateList::new(self.k)
    }

    fn validate(&self, n_references: usize) -> Result<()> {
        if self.k > n_references {
            return Err(Error::InvalidNeighbourCount {
                k: self.k,
                n: n_references,
            });
        }

        Ok(())
    }

    fn visit(
        &self,
        state: &mut CandidateList,
        query: ArrayView1<'_, Scalar>,
        index: usize,
        reference: ArrayView1<'_, Scalar>,
    ) {
        let d = self.metric.distance(query, reference);
        state.insert(index, d, |a, b| a < b);
    }

    fn node_score(&self, query: ArrayView1<'_, Scalar>, bound: &BallBound) -> Scalar {
        bound.min_distance(query, self.metric)
    }

    fn pair_score(&self, query_bound: &BallBound, reference_bound: &BallBound) -> Scalar {
        query_bound.min_distance_bound(reference_bound, self.metric)
    }

    fn threshold(&self, state: &CandidateList) -> Scalar {
        match state.worst() {
            Some(worst) if state.is_full() => worst,
            _ => Scalar::INFINITY,
        }
    }

    fn improves(&self, a: Scalar, b: Scalar) -> bool {
        a < b
    }

    fn finish(&self, state: CandidateList, permutation: &Permutation) -> Vec<Neighbour> {
        let mut out = state.into_neighbours(permutation);
        // Equal distances break towards the smaller original index.
        out.sort_by(|x, y| {
            x.score
                .partial_cmp(&y.score)
                .unwrap()
                .then(x.index.cmp(&y.index))
        });
        out
    }
}

/// k-maximum-inner-product search: retains the `k` largest inner products.
///
/// The pruning bounds are derived from Euclidean ball geometry
/// (Cauchy-Schwarz), so this strategy must run against trees built with
/// [`Metric::Euclidean`].
#[derive(Clone, Copy, Debug)]
pub struct MaxInnerProduct {
    k: usize,
}

impl MaxInnerProduct {
    /// Creates a strategy returning the `k` points with the largest inner
    /// products against each query.
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl SearchStrategy for MaxInnerProduct {
    type State = CandidateList;
    type Output = Vec<Neighbour>;

    fn init(&self) -> CandidateList {
        CandidateList::new(self.k)
    }

    fn validate(&self, n_references: usize) -> Result<()> {
        if self.k > n_references {
            return Err(Error::InvalidNeighbourCount {
                k: self.k,
                n: n_references,
            });
        }

        Ok(())
    }

    fn visit(
        &self,
        state: &mut CandidateList,
        query: ArrayView1<'_, Scalar>,
        index: usize,
        reference: ArrayView1<'_, Scalar>,
    ) {
        let p = query.dot(&reference);
        state.insert(index, p, |a, b| a > b);
    }

    fn node_score(&self, query: ArrayView1<'_, Scalar>, bound: &BallBound) -> Scalar {
        // TODO: hoist the query norm out of the per-node bound computation.
        bound.max_inner_product(query, query.dot(&query).sqrt())
    }

    fn pair_score(&self, query_bound: &BallBound, reference_bound: &BallBound) -> Scalar {
        query_bound.max_inner_product_bound(reference_bound)
    }

    fn threshold(&self, state: &CandidateList) -> Scalar {
        match state.worst() {
            Some(worst) if state.is_full() => worst,
            _ => Scalar::NEG_INFINITY,
        }
    }

    fn improves(&self, a: Scalar, b: Scalar) -> bool {
        a > b
    }

    fn finish(&self, state: CandidateList, permutation: &Permutation) -> Vec<Neighbour> {
        let mut out = state.into_neighbours(permutation);
        out.sort_by(|x, y| {
            y.score
                .partial_cmp(&x.score)
                .unwrap()
                .then(x.index.cmp(&y.index))
        });
        out
    }
}

/// Kernel-sum accumulation: for each query, the sum of kernel values
/// against every reference point, within a configurable per-point absolute
/// tolerance.
///
/// There is no candidate list; each point's contribution is bracketed by
/// evaluating the kernel at the node's minimum and maximum distance, and a
/// subtree whose interval half-width falls under the tolerance contributes
/// its midpoint wholesale. With the default tolerance of zero the sum is
/// exact.
#[derive(Clone, Copy, Debug)]
pub struct KernelSum {
    kernel: Kernel,
    metric: Metric,
    tolerance: Scalar,
}

/// Running kernel-sum accumulator for one query.
#[derive(Clone, Debug, Default)]
pub struct KernelAccumulator {
    sum: Scalar,
}

impl KernelSum {
    /// Creates an exact kernel-sum strategy for `kernel` over distances in
    /// `metric`.
    pub fn new(kernel: Kernel, metric: Metric) -> Self {
        Self {
            kernel,
            metric,
            tolerance: 0.,
        }
    }

    /// Sets the absolute error tolerated per reference point. The total
    /// error of a query's sum is then bounded by `n * tolerance`.
    pub fn tolerance(mut self, tolerance: Scalar) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl SearchStrategy for KernelSum {
    type State = KernelAccumulator;
    type Output = Scalar;

    fn init(&self) -> KernelAccumulator {
        KernelAccumulator::default()
    }

    fn visit(
        &self,
        state: &mut KernelAccumulator,
        query: ArrayView1<'_, Scalar>,
        _index: usize,
        reference: ArrayView1<'_, Scalar>,
    ) {
        state.sum += self.kernel.eval(self.metric.distance(query, reference));
    }

    fn node_score(&self, query: ArrayView1<'_, Scalar>, bound: &BallBound) -> Scalar {
        let lo = self.kernel.eval(bound.max_distance(query, self.metric));
        let hi = self.kernel.eval(bound.min_distance(query, self.metric));
        (hi - lo) / 2.
    }

    fn pair_score(&self, query_bound: &BallBound, reference_bound: &BallBound) -> Scalar {
        let lo = self
            .kernel
            .eval(query_bound.max_distance_bound(reference_bound, self.metric));
        let hi = self
            .kernel
            .eval(query_bound.min_distance_bound(reference_bound, self.metric));
        (hi - lo) / 2.
    }

    fn threshold(&self, _state: &KernelAccumulator) -> Scalar {
        self.tolerance
    }

    fn improves(&self, a: Scalar, b: Scalar) -> bool {
        a > b
    }

    fn absorb(
        &self,
        state: &mut KernelAccumulator,
        query: ArrayView1<'_, Scalar>,
        bound: &BallBound,
        count: usize,
    ) {
        let lo = self.kernel.eval(bound.max_distance(query, self.metric));
        let hi = self.kernel.eval(bound.min_distance(query, self.metric));
        state.sum += count as Scalar * (lo + hi) / 2.;
    }

    fn finish(&self, state: KernelAccumulator, _permutation: &Permutation) -> Scalar {
        state.sum
    }
}
