use balltree::{BallTreeBuilder, Kernel, KernelSum, Metric, NearestNeighbors};
use ndarray::{Array, Array1, Array2};

// In this example, we generate a random array of 1000 points in a
// 20-dimensional Euclidean space and build a ball tree over it. Queries can
// then run one at a time or as a batch, where each row of the query array is
// searched in parallel against the immutable tree.
fn single_and_batch() {
    let mut rng = oorandom::Rand64::new(0);
    let data = Array::from_shape_simple_fn((1000, 20), || rng.rand_float());
    let tree = BallTreeBuilder::new()
        .leaf_size(10)
        .metric(Metric::Euclidean)
        .build(data)
        .unwrap();

    let knn = NearestNeighbors::new(10, Metric::Euclidean);

    // Search 10 nearest neighbours for a single query.
    let query = Array1::from_shape_simple_fn(20, || rng.rand_float());
    let _ = tree.search(query.view(), &knn).unwrap();

    // Search 10 nearest neighbours for 10 query points.
    let queries = Array2::from_shape_simple_fn((10, 20), || rng.rand_float());
    let _ = tree.search2(queries.view(), &knn).unwrap();
}

// With many queries it pays to index the query set too: dual-tree search
// prunes whole groups of queries against whole groups of reference points.
fn dual_and_kernels() {
    let mut rng = oorandom::Rand64::new(1);
    let data = Array::from_shape_simple_fn((500, 8), || rng.rand_float());
    let queries = Array::from_shape_simple_fn((100, 8), || rng.rand_float());

    let reference = BallTreeBuilder::new().leaf_size(8).build(data).unwrap();
    let query_tree = BallTreeBuilder::new().leaf_size(8).build(queries).unwrap();

    let results = reference
        .search_dual(&query_tree, &NearestNeighbors::new(5, Metric::Euclidean))
        .unwrap();
    println!(
        "first query's nearest neighbour: index {}, distance {:.4}",
        results[0][0].index(),
        results[0][0].score()
    );

    // Kernel sums with a per-point absolute tolerance.
    let strategy = KernelSum::new(Kernel::Gaussian { bandwidth: 0.25 }, Metric::Euclidean)
        .tolerance(1e-4);
    let sums = reference.search2(query_tree.points(), &strategy).unwrap();
    println!("kernel sum of first query: {:.4}", sums[0]);
}

fn main() {
    single_and_batch();
    dual_and_kernels();
}
