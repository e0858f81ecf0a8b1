use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::{Metric, Scalar};

/// A ball enclosing every point of one tree node: a centre point plus the
/// maximum distance from the centre to any point in the node's range.
///
/// Bounds are computed once at node creation and never change. All pruning
/// decisions derive from the triangle inequality on these balls, so the
/// radius must be taken in the same metric the tree was built with.
#[derive(Clone, Debug)]
pub struct BallBound {
    center: Array1<Scalar>,
    radius: Scalar,
    center_norm: Scalar,
}

impl BallBound {
    /// Computes the bound over the rows of `data` selected by `rows`.
    ///
    /// The centre is the centroid of the selected points; under the angular
    /// metric it is pulled back onto the unit sphere so that geodesic
    /// distances from it are well defined. `rows` must be non-empty.
    pub(crate) fn from_rows(data: ArrayView2<'_, Scalar>, rows: &[usize], metric: Metric) -> Self {
        debug_assert!(!rows.is_empty());

        let mut center = Array1::zeros(data.ncols());
        for &r in rows {
            center += &data.row(r);
        }
        center /= rows.len() as Scalar;

        if metric == Metric::Angular {
            let norm = center.dot(&center).sqrt();
            if norm > Scalar::EPSILON {
                center /= norm;
            } else {
                // Antipodal points cancel out; any member point works as a
                // centre for a sound (if looser) bound.
                center = data.row(rows[0]).to_owned();
            }
        }

        let mut radius: Scalar = 0.;
        for &r in rows {
            let d = metric.distance(center.view(), data.row(r));
            if d > radius {
                radius = d;
            }
        }

        let center_norm = center.dot(&center).sqrt();
        Self {
            center,
            radius,
            center_norm,
        }
    }

    /// Returns the centre of the ball.
    pub fn center(&self) -> ArrayView1<'_, Scalar> {
        self.center.view()
    }

    /// Returns the radius of the ball.
    pub fn radius(&self) -> Scalar {
        self.radius
    }

    /// Returns the Euclidean norm of the centre.
    pub fn center_norm(&self) -> Scalar {
        self.center_norm
    }

    /// Smallest possible distance from `point` to any point inside the ball.
    pub fn min_distance(&self, point: ArrayView1<'_, Scalar>, metric: Metric) -> Scalar {
        (metric.distance(self.center.view(), point) - self.radius).max(0.)
    }

    /// Largest possible distance from `point` to any point inside the ball.
    pub fn max_distance(&self, point: ArrayView1<'_, Scalar>, metric: Metric) -> Scalar {
        metric.distance(self.center.view(), point) + self.radius
    }

    /// Smallest possible distance between a point of `self` and a point of
    /// `other`.
    pub fn min_distance_bound(&self, other: &BallBound, metric: Metric) -> Scalar {
        let d = metric.distance(self.center.view(), other.center.view());
        (d - self.radius - other.radius).max(0.)
    }

    /// Largest possible distance between a point of `self` and a point of
    /// `other`.
    pub fn max_distance_bound(&self, other: &BallBound, metric: Metric) -> Scalar {
        metric.distance(self.center.view(), other.center.view()) + self.radius + other.radius
    }

    /// Largest possible inner product between `query` and any point inside
    /// the ball: `<q, c> + r * ||q||` by Cauchy-Schwarz.
    ///
    /// Only meaningful for balls with a Euclidean radius.
    pub fn max_inner_product(&self, query: ArrayView1<'_, Scalar>, query_norm: Scalar) -> Scalar {
        self.center.dot(&query) + self.radius * query_norm
    }

    /// Largest possible inner product between a point under `self` (the
    /// query ball) and a point under `reference`.
    pub fn max_inner_product_bound(&self, reference: &BallBound) -> Scalar {
        self.center.dot(&reference.center)
            + self.radius * reference.center_norm
            + reference.radius * self.center_norm
            + self.radius * reference.radius
    }

    /// Whether `point` lies inside the ball, up to floating point slack.
    pub fn contains(&self, point: ArrayView1<'_, Scalar>, metric: Metric) -> bool {
        metric.distance(self.center.view(), point) <= self.radius + 1e-9
    }
}
