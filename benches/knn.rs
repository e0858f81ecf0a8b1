use balltree::{BallTreeBuilder, Metric, NearestNeighbors};
use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array;

fn bench_knn(c: &mut Criterion) {
    let mut rng = oorandom::Rand64::new(0);
    let data = Array::from_shape_simple_fn((2000, 10), || rng.rand_float());
    let queries = Array::from_shape_simple_fn((100, 10), || rng.rand_float());

    c.bench_function("build", {
        let data = data.clone();
        move |b| {
            b.iter(|| {
                BallTreeBuilder::new()
                    .leaf_size(20)
                    .build(data.clone())
                    .unwrap()
            })
        }
    });

    let tree = BallTreeBuilder::new().leaf_size(20).build(data).unwrap();
    let query_tree = BallTreeBuilder::new()
        .leaf_size(20)
        .build(queries.clone())
        .unwrap();
    let strategy = NearestNeighbors::new(5, Metric::Euclidean);

    c.bench_function("single_tree_batch", |b| {
        b.iter(|| tree.search2(queries.view(), &strategy).unwrap())
    });

    c.bench_function("dual_tree", |b| {
        b.iter(|| tree.search_dual(&query_tree, &strategy).unwrap())
    });
}

criterion_group!(benches, bench_knn);
criterion_main!(benches);
