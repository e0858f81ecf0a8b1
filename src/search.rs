use std::cmp::Ordering;
use std::ops::Div;

use ndarray::{ArrayView1, ArrayView2};
use ndarray_linalg::Norm;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::debug;

use crate::{BallTree, Error, Metric, Result, Scalar, SearchStrategy};

impl BallTree {
    /// Performs a single-tree search for one query point.
    ///
    /// The traversal starts at the root and prunes every subtree whose
    /// bound proves it cannot improve the strategy's current state; leaves
    /// that survive are scanned point by point, and the more promising
    /// child is always descended first so the sibling prunes more often.
    pub fn search<S: SearchStrategy>(
        &self,
        query: ArrayView1<'_, Scalar>,
        strategy: &S,
    ) -> Result<S::Output> {
        self.validate_query(query.len(), strategy)?;
        Ok(self.search_one(query, strategy))
    }

    /// Performs single-tree searches for an array of queries, one query per
    /// row, in parallel against the immutable tree.
    ///
    /// An empty query matrix yields an empty result vector without touching
    /// the tree.
    pub fn search2<S: SearchStrategy>(
        &self,
        queries: ArrayView2<'_, Scalar>,
        strategy: &S,
    ) -> Result<Vec<S::Output>> {
        if queries.nrows() == 0 {
            return Ok(Vec::new());
        }
        self.validate_query(queries.ncols(), strategy)?;

        debug!("single-tree search over {} queries", queries.nrows());

        Ok(queries
            .outer_iter()
            .into_par_iter()
            .map(|q| self.search_one(q, strategy))
            .collect())
    }

    /// Performs a dual-tree search of a whole query tree against this
    /// reference tree, amortising pruning decisions across groups of
    /// queries.
    ///
    /// Both trees must be built with the metric the strategy scores with.
    /// Results come back in the query matrix's original row order, with
    /// reference indices likewise translated back through this tree's
    /// permutation. Searching a tree against itself is fine; each point
    /// then finds itself at distance zero.
    pub fn search_dual<S: SearchStrategy>(
        &self,
        queries: &BallTree,
        strategy: &S,
    ) -> Result<Vec<S::Output>> {
        if queries.dim() != self.dim() {
            return Err(Error::DimensionMismatch {
                query: queries.dim(),
                reference: self.dim(),
            });
        }
        strategy.validate(self.size())?;

        debug!(
            "dual-tree search: {} queries against {} references",
            queries.size(),
            self.size()
        );

        let mut states: Vec<S::State> = (0..queries.size()).map(|_| strategy.init()).collect();
        self.dual_recurse(queries, queries.root(), self.root(), strategy, &mut states);

        let mut out: Vec<Option<S::Output>> = (0..queries.size()).map(|_| None).collect();
        for (new, state) in states.into_iter().enumerate() {
            let original = queries.permutation().to_original(new);
            out[original] = Some(strategy.finish(state, self.permutation()));
        }

        Ok(out.into_iter().map(|o| o.unwrap()).collect())
    }

    fn validate_query<S: SearchStrategy>(&self, dim: usize, strategy: &S) -> Result<()> {
        if dim != self.dim() {
            return Err(Error::DimensionMismatch {
                query: dim,
                reference: self.dim(),
            });
        }

        strategy.validate(self.size())
    }

    fn search_one<S: SearchStrategy>(&self, query: ArrayView1<'_, Scalar>, strategy: &S) -> S::Output {
        let mut state = strategy.init();

        if self.metric() == Metric::Angular {
            let q = query.div(query.norm());
            self.single_recurse(self.root(), q.view(), strategy, &mut state);
        } else {
            self.single_recurse(self.root(), query, strategy, &mut state);
        }

        strategy.finish(state, self.permutation())
    }

    fn single_recurse<S: SearchStrategy>(
        &self,
        handle: usize,
        query: ArrayView1<'_, Scalar>,
        strategy: &S,
        state: &mut S::State,
    ) {
        let node = self.node(handle);
        let score = strategy.node_score(query, node.bound());
        if !strategy.improves(score, strategy.threshold(state)) {
            strategy.absorb(state, query, node.bound(), node.count());
            return;
        }

        match node.children() {
            None => {
                for row in node.range() {
                    strategy.visit(state, query, row, self.point(row));
                }
            }
            Some((left, right)) => {
                let ls = strategy.node_score(query, self.node(left).bound());
                let rs = strategy.node_score(query, self.node(right).bound());
                let (first, second) = if strategy.improves(rs, ls) {
                    (right, left)
                } else {
                    (left, right)
                };
                self.single_recurse(first, query, strategy, state);
                self.single_recurse(second, query, strategy, state);
            }
        }
    }

    fn dual_recurse<S: SearchStrategy>(
        &self,
        queries: &BallTree,
        q_handle: usize,
        r_handle: usize,
        strategy: &S,
        states: &mut [S::State],
    ) {
        let qnode = queries.node(q_handle);
        let rnode = self.node(r_handle);

        // The pair survives if any query under the query node could still be
        // improved, so prune against the loosest threshold in its range.
        // TODO: cache per-node thresholds instead of folding over the range
        // on every pair visit.
        let mut threshold = strategy.threshold(&states[qnode.range().start]);
        for qi in qnode.range().skip(1) {
            let t = strategy.threshold(&states[qi]);
            if strategy.improves(threshold, t) {
                threshold = t;
            }
        }

        let score = strategy.pair_score(qnode.bound(), rnode.bound());
        if !strategy.improves(score, threshold) {
            for qi in qnode.range() {
                strategy.absorb(&mut states[qi], queries.point(qi), rnode.bound(), rnode.count());
            }
            return;
        }

        if qnode.is_leaf() && rnode.is_leaf() {
            for qi in qnode.range() {
                let q = queries.point(qi);
                for ri in rnode.range() {
                    strategy.visit(&mut states[qi], q, ri, self.point(ri));
                }
            }
            return;
        }

        // Expand whichever sides are internal and visit the child pairs in
        // descending order of promise.
        let q_children = match qnode.children() {
            Some((l, r)) => vec![l, r],
            None => vec![q_handle],
        };
        let r_children = match rnode.children() {
            Some((l, r)) => vec![l, r],
            None => vec![r_handle],
        };

        let mut pairs = Vec::with_capacity(q_children.len() * r_children.len());
        for &qh in &q_children {
            for &rh in &r_children {
                let s = strategy.pair_score(queries.node(qh).bound(), self.node(rh).bound());
                pairs.push((s, qh, rh));
            }
        }
        pairs.sort_by(|x, y| {
            if strategy.improves(x.0, y.0) {
                Ordering::Less
            } else if strategy.improves(y.0, x.0) {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        });

        for (_, qh, rh) in pairs {
            self.dual_recurse(queries, qh, rh, strategy, states);
        }
    }
}
