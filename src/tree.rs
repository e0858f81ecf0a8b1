use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::{norm, NormalizeAxis};
use tracing::debug;

use crate::{BallBound, Error, Metric, Result, Scalar};

/// Default maximum number of points stored in a leaf.
const DEFAULT_LEAF_SIZE: usize = 20;

/// The index mappings produced by tree construction.
///
/// Building a tree reorders the point matrix so that every node owns a
/// contiguous row range. `old_from_new[i]` is the original row of the point
/// now stored at row `i`; `new_from_old[j]` is the current row of original
/// point `j`. The two arrays are mutually inverse bijections on `[0, n)`.
#[derive(Clone, Debug)]
pub struct Permutation {
    old_from_new: Vec<usize>,
    new_from_old: Vec<usize>,
}

impl Permutation {
    pub(crate) fn new(old_from_new: Vec<usize>) -> Self {
        let mut new_from_old = vec![0; old_from_new.len()];
        for (new, &old) in old_from_new.iter().enumerate() {
            new_from_old[old] = new;
        }

        Self {
            old_from_new,
            new_from_old,
        }
    }

    /// Returns the number of points covered by the mapping.
    pub fn len(&self) -> usize {
        self.old_from_new.len()
    }

    /// Returns ```true``` if the mapping covers no points.
    pub fn is_empty(&self) -> bool {
        self.old_from_new.is_empty()
    }

    /// Translates a reordered row index back to the caller's original index.
    pub fn to_original(&self, new: usize) -> usize {
        self.old_from_new[new]
    }

    /// Translates an original row index to its position after reordering.
    pub fn to_reordered(&self, old: usize) -> usize {
        self.new_from_old[old]
    }

    /// The full new-to-old mapping.
    pub fn old_from_new(&self) -> &[usize] {
        &self.old_from_new
    }

    /// The full old-to-new mapping.
    pub fn new_from_old(&self) -> &[usize] {
        &self.new_from_old
    }
}

/// One slot of the tree's node arena.
///
/// A node covers the contiguous row range `[begin, begin + count)` of the
/// reordered point matrix. Children, when present, partition that range
/// exactly. The arena owns every node; handles are plain indices into it,
/// and the parent handle is non-owning bookkeeping for traversals.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    begin: usize,
    count: usize,
    bound: BallBound,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
}

impl Node {
    pub(crate) fn is_leaf(&self) -> bool {
        self.left.is_none()
    }

    pub(crate) fn range(&self) -> std::ops::Range<usize> {
        self.begin..self.begin + self.count
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn bound(&self) -> &BallBound {
        &self.bound
    }

    /// Child handles; ```None``` for a leaf.
    pub(crate) fn children(&self) -> Option<(usize, usize)> {
        match (self.left, self.right) {
            (Some(l), Some(r)) => Some((l, r)),
            _ => None,
        }
    }
}

/// A binary metric tree over a fixed point set, built once and immutable
/// thereafter.
///
/// Each row of the owned matrix is one point. Construction reorders the
/// rows so every node covers a contiguous range; the [`Permutation`]
/// translates search results back to the caller's original indices.
#[derive(Clone, Debug)]
pub struct BallTree {
    data: Array2<Scalar>,
    metric: Metric,
    leaf_size: usize,
    nodes: Vec<Node>,
    root: usize,
    permutation: Permutation,
}

impl BallTree {
    /// Returns the number of points in a tree.
    pub fn size(&self) -> usize {
        self.data.nrows()
    }

    /// Returns the dimensionality of the indexed points.
    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    /// The reordered point matrix.
    pub fn points(&self) -> ArrayView2<'_, Scalar> {
        self.data.view()
    }

    /// The index mappings between original and reordered rows.
    pub fn permutation(&self) -> &Permutation {
        &self.permutation
    }

    /// The metric the tree was built with.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// The configured maximum leaf point count.
    pub fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    pub(crate) fn root(&self) -> usize {
        self.root
    }

    pub(crate) fn node(&self, handle: usize) -> &Node {
        &self.nodes[handle]
    }

    pub(crate) fn point(&self, row: usize) -> ArrayView1<'_, Scalar> {
        self.data.row(row)
    }

    /// Walks the finished tree asserting its structural invariants: child
    /// ranges partition the parent exactly, every point lies inside its
    /// node's bound, leaves respect the leaf size, and the permutation is a
    /// bijection.
    #[allow(dead_code)]
    pub(crate) fn verify(&self) {
        assert_eq!(self.permutation.len(), self.size());
        for old in 0..self.size() {
            assert_eq!(
                self.permutation.to_original(self.permutation.to_reordered(old)),
                old
            );
        }

        let root = self.node(self.root);
        assert_eq!(root.begin, 0);
        assert_eq!(root.count, self.size());
        assert_eq!(root.parent, None);

        for (handle, node) in self.nodes.iter().enumerate() {
            for row in node.range() {
                assert!(node.bound.contains(self.data.row(row), self.metric));
            }

            match node.children() {
                Some((l, r)) => {
                    assert!(node.count > self.leaf_size);
                    assert_eq!(self.node(l).parent, Some(handle));
                    assert_eq!(self.node(r).parent, Some(handle));
                    let (l, r) = (self.node(l), self.node(r));
                    assert!(l.count > 0 && r.count > 0);
                    assert_eq!(l.begin, node.begin);
                    assert_eq!(l.begin + l.count, r.begin);
                    assert_eq!(r.begin + r.count, node.begin + node.count);
                }
                None => assert!(node.count <= self.leaf_size),
            }
        }
    }
}

/// A build struct for initialising a new ball tree.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BallTreeBuilder {
    leaf_size: Option<usize>,
    metric: Option<Metric>,
}

impl BallTreeBuilder {
    /// Creates a builder with default parameters.
    pub fn new() -> Self {
        Self {
            ..Default::default()
        }
    }

    /// Sets the maximum number of points a leaf may hold directly.
    pub fn leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = Some(leaf_size);
        self
    }

    /// Sets the distance function for a tree.
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Constructs a ball tree over the given points.
    ///
    /// The matrix is consumed; its rows are reordered so that every tree
    /// node covers a contiguous range. Fails without doing any work if the
    /// matrix has no rows or the configured leaf size is zero.
    pub fn build(self, mut data: Array2<Scalar>) -> Result<BallTree> {
        let n = data.nrows();
        if n == 0 {
            return Err(Error::EmptyPointSet);
        }

        let leaf_size = self.leaf_size.unwrap_or(DEFAULT_LEAF_SIZE);
        if leaf_size < 1 {
            return Err(Error::InvalidLeafSize(leaf_size));
        }

        let metric = self.metric.unwrap_or(Metric::Euclidean);
        if metric == Metric::Angular {
            data = norm::normalize(data, NormalizeAxis::Row).0;
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut nodes = Vec::new();
        let root = split(data.view(), &mut order, 0, n, leaf_size, metric, None, &mut nodes);

        // The recursion only permutes the index array; the matrix itself is
        // reordered in one explicit pass at the end.
        let data = data.select(Axis(0), &order);
        let permutation = Permutation::new(order);

        debug!(
            "built ball tree over {} points ({} nodes, leaf size {})",
            n,
            nodes.len(),
            leaf_size
        );

        Ok(BallTree {
            data,
            metric,
            leaf_size,
            nodes,
            root,
            permutation,
        })
    }
}

/// Recursively splits `order[begin..end]`, appending nodes to the arena in
/// pre-order, and returns the handle of the subtree root.
#[allow(clippy::too_many_arguments)]
fn split(
    data: ArrayView2<'_, Scalar>,
    order: &mut [usize],
    begin: usize,
    end: usize,
    leaf_size: usize,
    metric: Metric,
    parent: Option<usize>,
    nodes: &mut Vec<Node>,
) -> usize {
    let bound = BallBound::from_rows(data, &order[begin..end], metric);
    let handle = nodes.len();
    nodes.push(Node {
        begin,
        count: end - begin,
        bound,
        parent,
        left: None,
        right: None,
    });

    if end - begin <= leaf_size {
        return handle;
    }

    let mid = begin + partition(data, &mut order[begin..end], metric);
    let left = split(data, order, begin, mid, leaf_size, metric, Some(handle), nodes);
    let right = split(data, order, mid, end, leaf_size, metric, Some(handle), nodes);
    nodes[handle].left = Some(left);
    nodes[handle].right = Some(right);
    handle
}

/// Partitions `order` in place around two far-apart pole points and returns
/// the split position. Pole A is the point farthest from the first point of
/// the range, pole B the point farthest from pole A; each point goes to its
/// nearer pole, ties to A. Both sides are guaranteed non-empty.
fn partition(data: ArrayView2<'_, Scalar>, order: &mut [usize], metric: Metric) -> usize {
    let pole_a = farthest_from(data, order, data.row(order[0]), metric);
    let a = data.row(order[pole_a]);
    let pole_b = farthest_from(data, order, a, metric);
    let b = data.row(order[pole_b]);

    let mut cursor = 0;
    for i in 0..order.len() {
        let p = data.row(order[i]);
        if metric.distance(p, a) <= metric.distance(p, b) {
            order.swap(cursor, i);
            cursor += 1;
        }
    }

    // Coincident poles put every point on one side; fall back to a median
    // split so neither child is empty.
    if cursor == 0 || cursor == order.len() {
        cursor = order.len() / 2;
    }

    cursor
}

fn farthest_from(
    data: ArrayView2<'_, Scalar>,
    order: &[usize],
    from: ArrayView1<'_, Scalar>,
    metric: Metric,
) -> usize {
    let mut best = 0;
    let mut best_dist = -1.;
    for (i, &row) in order.iter().enumerate() {
        let d = metric.distance(from, data.row(row));
        if d > best_dist {
            best_dist = d;
            best = i;
        }
    }

    best
}
