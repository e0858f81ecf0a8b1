use ndarray::{array, Array2, ArrayView1, ArrayView2};

use crate::{
    BallTree, BallTreeBuilder, Error, Kernel, KernelSum, MaxInnerProduct, Metric, NearestNeighbors,
    Scalar,
};

fn random_points(n: usize, dim: usize, seed: u128) -> Array2<Scalar> {
    let mut rng = oorandom::Rand64::new(seed);
    Array2::from_shape_simple_fn((n, dim), || rng.rand_float())
}

fn build(data: Array2<Scalar>, leaf_size: usize) -> BallTree {
    BallTreeBuilder::new()
        .leaf_size(leaf_size)
        .build(data)
        .unwrap()
}

/// Exhaustive k-NN over the original matrix, ties towards smaller index.
fn brute_knn(
    data: ArrayView2<'_, Scalar>,
    query: ArrayView1<'_, Scalar>,
    k: usize,
    metric: Metric,
) -> Vec<(usize, Scalar)> {
    let mut all: Vec<(usize, Scalar)> = data
        .outer_iter()
        .enumerate()
        .map(|(i, row)| (i, metric.distance(query, row)))
        .collect();
    all.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
    all.truncate(k);
    all
}

fn brute_maxip(
    data: ArrayView2<'_, Scalar>,
    query: ArrayView1<'_, Scalar>,
    k: usize,
) -> Vec<(usize, Scalar)> {
    let mut all: Vec<(usize, Scalar)> = data
        .outer_iter()
        .enumerate()
        .map(|(i, row)| (i, query.dot(&row)))
        .collect();
    all.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));
    all.truncate(k);
    all
}

fn brute_kernel_sum(
    data: ArrayView2<'_, Scalar>,
    query: ArrayView1<'_, Scalar>,
    kernel: Kernel,
    metric: Metric,
) -> Scalar {
    data.outer_iter()
        .map(|row| kernel.eval(metric.distance(query, row)))
        .sum()
}

#[test]
fn test_metric() {
    let arr1 = array![1., 2., 3., 4.];
    let arr2 = array![2., 3., 4., 5.];

    assert_eq!(
        4.,
        Metric::Manhattan.distance(arr1.view(), arr2.view()),
        "Test Manhattan distance"
    );
    assert_eq!(
        2.,
        Metric::Euclidean.distance(arr1.view(), arr2.view()),
        "Test Euclidean distance"
    );
    assert_eq!(
        1.,
        Metric::Chebyshev.distance(arr1.view(), arr2.view()),
        "Test Chebyshev distance"
    );

    let e1 = array![1., 0.];
    let e2 = array![0., 1.];
    assert!((Metric::Angular.distance(e1.view(), e1.view())).abs() < 1e-12);
    assert!((Metric::Angular.distance(e1.view(), e2.view()) - 0.5).abs() < 1e-12);
}

#[test]
fn test_kernels() {
    let gaussian = Kernel::Gaussian { bandwidth: 0.5 };
    assert_eq!(1., gaussian.eval(0.));
    assert!(gaussian.eval(0.5) > gaussian.eval(1.));

    let epan = Kernel::Epanechnikov { bandwidth: 1. };
    assert_eq!(1., epan.eval(0.));
    assert_eq!(0., epan.eval(1.));
    assert_eq!(0., epan.eval(2.));
}

#[test]
fn test_build_invariants() {
    let tree = build(random_points(200, 3, 7), 5);
    assert_eq!(200, tree.size());
    assert_eq!(3, tree.dim());
    tree.verify();
}

#[test]
fn test_build_reorders_rows() {
    let data = random_points(40, 4, 11);
    let tree = build(data.clone(), 4);

    let perm = tree.permutation();
    for new in 0..tree.size() {
        assert_eq!(tree.points().row(new), data.row(perm.to_original(new)));
        assert_eq!(new, perm.to_reordered(perm.to_original(new)));
    }
}

#[test]
fn test_build_errors() {
    let empty: Array2<Scalar> = Array2::zeros((0, 3));
    assert_eq!(
        Err(Error::EmptyPointSet),
        BallTreeBuilder::new().build(empty).map(|_| ())
    );

    assert_eq!(
        Err(Error::InvalidLeafSize(0)),
        BallTreeBuilder::new()
            .leaf_size(0)
            .build(random_points(5, 2, 1))
            .map(|_| ())
    );
}

#[test]
fn test_nearest_corner() {
    let data = array![[0., 0.], [1., 0.], [0., 1.], [5., 5.]];
    let tree = build(data, 1);

    let result = tree
        .search(array![0.1, 0.1].view(), &NearestNeighbors::new(1, Metric::Euclidean))
        .unwrap();

    assert_eq!(1, result.len());
    assert_eq!(0, result[0].index());
    assert!((result[0].score() - 0.1414).abs() < 1e-3);
}

#[test]
fn test_single_matches_brute() {
    let data = random_points(100, 2, 13);
    let queries = random_points(10, 2, 17);
    let tree = build(data.clone(), 5);
    let strategy = NearestNeighbors::new(5, Metric::Euclidean);

    let results = tree.search2(queries.view(), &strategy).unwrap();
    assert_eq!(10, results.len());

    for (q, result) in queries.outer_iter().zip(&results) {
        let expected = brute_knn(data.view(), q, 5, Metric::Euclidean);
        assert_eq!(5, result.len());
        for (n, &(idx, dist)) in result.iter().zip(&expected) {
            assert_eq!(idx, n.index());
            assert!((dist - n.score()).abs() < 1e-12);
        }
    }
}

#[test]
fn test_dual_self_search() {
    let data = random_points(50, 2, 23);
    let tree = build(data.clone(), 4);
    let strategy = NearestNeighbors::new(2, Metric::Euclidean);

    let results = tree.search_dual(&tree, &strategy).unwrap();
    assert_eq!(50, results.len());

    for (i, result) in results.iter().enumerate() {
        assert_eq!(2, result.len());
        assert_eq!(i, result[0].index());
        assert_eq!(0., result[0].score());

        let expected = brute_knn(data.view(), data.row(i), 2, Metric::Euclidean);
        assert_eq!(expected[1].0, result[1].index());
        assert!((expected[1].1 - result[1].score()).abs() < 1e-12);
    }
}

#[test]
fn test_dual_matches_brute() {
    let data = random_points(120, 3, 29);
    let queries = random_points(30, 3, 31);
    let reference = build(data.clone(), 6);
    let query_tree = build(queries.clone(), 6);
    let strategy = NearestNeighbors::new(4, Metric::Euclidean);

    let results = reference.search_dual(&query_tree, &strategy).unwrap();
    assert_eq!(30, results.len());

    for (q, result) in queries.outer_iter().zip(&results) {
        let expected = brute_knn(data.view(), q, 4, Metric::Euclidean);
        for (n, &(idx, dist)) in result.iter().zip(&expected) {
            assert_eq!(idx, n.index());
            assert!((dist - n.score()).abs() < 1e-12);
        }
    }
}

#[test]
fn test_maxip_matches_brute() {
    let data = random_points(80, 5, 37);
    let queries = random_points(10, 5, 41);
    let tree = build(data.clone(), 5);
    let strategy = MaxInnerProduct::new(3);

    let results = tree.search2(queries.view(), &strategy).unwrap();
    for (q, result) in queries.outer_iter().zip(&results) {
        let expected = brute_maxip(data.view(), q, 3);
        for (n, &(idx, product)) in result.iter().zip(&expected) {
            assert_eq!(idx, n.index());
            assert!((product - n.score()).abs() < 1e-12);
        }
    }

    // The dual-tree path must agree with the single-tree path.
    let query_tree = build(queries.clone(), 5);
    let dual = tree.search_dual(&query_tree, &strategy).unwrap();
    assert_eq!(results, dual);
}

#[test]
fn test_kernel_sum_exact() {
    let data = random_points(60, 2, 43);
    let queries = random_points(5, 2, 47);
    let tree = build(data.clone(), 5);
    let kernel = Kernel::Gaussian { bandwidth: 0.5 };
    let strategy = KernelSum::new(kernel, Metric::Euclidean);

    let sums = tree.search2(queries.view(), &strategy).unwrap();
    for (q, sum) in queries.outer_iter().zip(&sums) {
        let expected = brute_kernel_sum(data.view(), q, kernel, Metric::Euclidean);
        assert!((expected - sum).abs() < 1e-8);
    }
}

#[test]
fn test_kernel_sum_tolerance() {
    let n = 200;
    let tolerance = 1e-3;
    let data = random_points(n, 2, 53);
    let queries = random_points(8, 2, 59);
    let tree = build(data.clone(), 10);
    let kernel = Kernel::Epanechnikov { bandwidth: 1. };
    let strategy = KernelSum::new(kernel, Metric::Euclidean).tolerance(tolerance);

    let sums = tree.search2(queries.view(), &strategy).unwrap();
    for (q, sum) in queries.outer_iter().zip(&sums) {
        let expected = brute_kernel_sum(data.view(), q, kernel, Metric::Euclidean);
        assert!((expected - sum).abs() <= n as Scalar * tolerance + 1e-9);
    }
}

#[test]
fn test_identical_points() {
    let data = Array2::from_elem((10, 3), 0.5);
    let tree = build(data, 2);
    tree.verify();

    let result = tree
        .search(
            array![0.5, 0.5, 0.5].view(),
            &NearestNeighbors::new(3, Metric::Euclidean),
        )
        .unwrap();

    assert_eq!(3, result.len());
    for n in &result {
        assert_eq!(0., n.score());
    }
    assert!(result[0].index() < result[1].index());
    assert!(result[1].index() < result[2].index());
}

#[test]
fn test_single_point() {
    let tree = build(array![[2., 3.]], 1);
    tree.verify();

    let result = tree
        .search(array![0., 0.].view(), &NearestNeighbors::new(1, Metric::Euclidean))
        .unwrap();
    assert_eq!(0, result[0].index());
    assert!((result[0].score() - 13f64.sqrt()).abs() < 1e-12);
}

#[test]
fn test_collinear_points() {
    let data = Array2::from_shape_fn((20, 2), |(i, j)| if j == 0 { i as Scalar } else { 1. });
    let tree = build(data.clone(), 3);
    tree.verify();

    let query = array![7.2, 1.];
    let result = tree
        .search(query.view(), &NearestNeighbors::new(3, Metric::Euclidean))
        .unwrap();
    let expected = brute_knn(data.view(), query.view(), 3, Metric::Euclidean);
    for (n, &(idx, dist)) in result.iter().zip(&expected) {
        assert_eq!(idx, n.index());
        assert!((dist - n.score()).abs() < 1e-12);
    }
}

#[test]
fn test_invalid_neighbour_count() {
    let tree = build(random_points(3, 2, 61), 2);
    let result = tree.search(array![0., 0.].view(), &NearestNeighbors::new(5, Metric::Euclidean));
    assert_eq!(Err(Error::InvalidNeighbourCount { k: 5, n: 3 }), result);
}

#[test]
fn test_dimension_mismatch() {
    let tree = build(random_points(10, 2, 67), 2);
    let strategy = NearestNeighbors::new(1, Metric::Euclidean);

    assert_eq!(
        Err(Error::DimensionMismatch {
            query: 3,
            reference: 2
        }),
        tree.search(array![0., 0., 0.].view(), &strategy)
    );

    let query_tree = build(random_points(10, 3, 71), 2);
    assert_eq!(
        Err(Error::DimensionMismatch {
            query: 3,
            reference: 2
        }),
        tree.search_dual(&query_tree, &strategy)
    );
}

#[test]
fn test_empty_queries() {
    let tree = build(random_points(10, 2, 73), 2);
    let queries: Array2<Scalar> = Array2::zeros((0, 2));

    let results = tree
        .search2(queries.view(), &NearestNeighbors::new(1, Metric::Euclidean))
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_determinism() {
    let data = random_points(90, 3, 79);
    let queries = random_points(15, 3, 83);
    let strategy = NearestNeighbors::new(4, Metric::Euclidean);

    let one = build(data.clone(), 5);
    let two = build(data, 5);
    assert_eq!(one.permutation().old_from_new(), two.permutation().old_from_new());

    let r1 = one.search2(queries.view(), &strategy).unwrap();
    let r2 = two.search2(queries.view(), &strategy).unwrap();
    assert_eq!(r1, r2);
}

#[test]
fn test_angular_search() {
    let data = random_points(60, 3, 89);
    let queries = random_points(6, 3, 97);
    let tree = BallTreeBuilder::new()
        .leaf_size(4)
        .metric(Metric::Angular)
        .build(data.clone())
        .unwrap();
    tree.verify();

    // Brute force over the same normalised rows the tree indexes.
    let strategy = NearestNeighbors::new(3, Metric::Angular);
    let results = tree.search2(queries.view(), &strategy).unwrap();
    for (q, result) in queries.outer_iter().zip(&results) {
        let qn = &q / q.dot(&q).sqrt();
        let mut expected: Vec<(usize, Scalar)> = data
            .outer_iter()
            .enumerate()
            .map(|(i, row)| {
                let rn = &row / row.dot(&row).sqrt();
                (i, Metric::Angular.distance(qn.view(), rn.view()))
            })
            .collect();
        expected.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));

        for (n, &(idx, dist)) in result.iter().zip(&expected) {
            assert_eq!(idx, n.index());
            assert!((dist - n.score()).abs() < 1e-9);
        }
    }
}
