use balltree::{BallTreeBuilder, Metric, NearestNeighbors};
use clap::{App, Arg};
use ndarray::Array;
use std::time::Instant;

// All-nearest-neighbours over a random point set: every point queries the
// set it belongs to, so each neighbour list starts with the point itself at
// distance zero. Dual-tree self-search is the default; pass --single to run
// one single-tree search per point instead and compare timings.
fn main() {
    tracing_subscriber::fmt::init();

    let matches = App::new("allnn")
        .about("All-nearest-neighbours over random data")
        .arg(
            Arg::with_name("count")
                .short("n")
                .long("count")
                .takes_value(true)
                .default_value("10000")
                .help("Number of points"),
        )
        .arg(
            Arg::with_name("dim")
                .short("d")
                .long("dim")
                .takes_value(true)
                .default_value("16")
                .help("Dimensionality of the points"),
        )
        .arg(
            Arg::with_name("k")
                .short("k")
                .takes_value(true)
                .default_value("5")
                .help("Number of neighbours per point"),
        )
        .arg(
            Arg::with_name("leaf-size")
                .short("l")
                .long("leaf-size")
                .takes_value(true)
                .default_value("20")
                .help("Maximum points per leaf"),
        )
        .arg(
            Arg::with_name("single")
                .short("s")
                .long("single")
                .help("Use repeated single-tree search instead of dual-tree"),
        )
        .get_matches();

    let count: usize = matches.value_of("count").unwrap().parse().expect("invalid --count");
    let dim: usize = matches.value_of("dim").unwrap().parse().expect("invalid --dim");
    let k: usize = matches.value_of("k").unwrap().parse().expect("invalid -k");
    let leaf_size: usize = matches
        .value_of("leaf-size")
        .unwrap()
        .parse()
        .expect("invalid --leaf-size");

    let mut rng = oorandom::Rand64::new(0);
    let data = Array::from_shape_simple_fn((count, dim), || rng.rand_float());

    let start = Instant::now();
    let tree = BallTreeBuilder::new()
        .leaf_size(leaf_size)
        .build(data)
        .expect("tree construction failed");
    println!("built tree over {} points in {:?}", tree.size(), start.elapsed());

    let strategy = NearestNeighbors::new(k, Metric::Euclidean);
    let start = Instant::now();
    let results = if matches.is_present("single") {
        tree.search2(tree.points(), &strategy)
    } else {
        tree.search_dual(&tree, &strategy)
    }
    .expect("search failed");
    println!(
        "computed {} neighbour lists in {:?}",
        results.len(),
        start.elapsed()
    );

    // Skip the self-match at distance zero.
    let mean: f64 = results
        .iter()
        .filter_map(|r| r.get(1).map(|n| n.score()))
        .sum::<f64>()
        / count as f64;
    println!("mean nearest-neighbour distance: {:.6}", mean);
}
