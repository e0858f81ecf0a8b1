use crate::Scalar;
use ndarray::ArrayView1;

use ndarray_stats::DeviationExt;

/// Enum for distance functions in a metric space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    /// L-1 or Manhattan distance. See [\[Wikipedia\]](https://en.wikipedia.org/wiki/Taxicab_geometry).
    Manhattan,
    /// L-2 or Euclidean distance. See [\[Wikipedia\]](https://en.wikipedia.org/wiki/Euclidean_distance)
    Euclidean,
    /// L-inf or Chebyshev distance. See [\[Wikipedia\]](https://en.wikipedia.org/wiki/Chebyshev_distance)
    Chebyshev,
    /// Angular (geodesic) distance on the unit sphere, scaled to `[0, 1]`.
    ///
    /// Points are normalised to unit length when a tree is built with this
    /// metric; queries are normalised on entry. Unlike raw cosine similarity
    /// this form satisfies the triangle inequality, which the pruning bounds
    /// rely on.
    Angular,
}

impl Metric {
    /// Calculate the distance between two points.
    pub fn distance(&self, a: ArrayView1<'_, Scalar>, b: ArrayView1<'_, Scalar>) -> Scalar {
        match self {
            Metric::Manhattan => a.l1_dist(&b).unwrap(),
            Metric::Euclidean => a.l2_dist(&b).unwrap() as Scalar,
            Metric::Chebyshev => a.linf_dist(&b).unwrap(),
            Metric::Angular => {
                // floating point issue (e.g. 1.0000000000000002).
                let dot = a.dot(&b).max(-1.).min(1.);
                dot.acos() / std::f64::consts::PI
            }
        }
    }
}

/// Similarity kernels for kernel-sum accumulation.
///
/// Both kernels are monotone decreasing in distance and unnormalised
/// (value 1 at distance 0); density normalisation is left to the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Kernel {
    /// Gaussian kernel `exp(-d^2 / (2 h^2))`.
    Gaussian {
        /// Bandwidth `h`.
        bandwidth: Scalar,
    },
    /// Epanechnikov kernel `max(0, 1 - d^2 / h^2)`.
    Epanechnikov {
        /// Bandwidth `h`.
        bandwidth: Scalar,
    },
}

impl Kernel {
    /// Evaluate the kernel at distance `dist`.
    pub fn eval(&self, dist: Scalar) -> Scalar {
        match self {
            Kernel::Gaussian { bandwidth } => {
                let z = dist / bandwidth;
                (-0.5 * z * z).exp()
            }
            Kernel::Epanechnikov { bandwidth } => {
                let z = dist / bandwidth;
                (1. - z * z).max(0.)
            }
        }
    }
}
