use camino::Utf8PathBuf;
use criterion::{Criterion, criterion_group, criterion_main};
use recipeforge::graph;
use recipeforge::model::{Origin, Package, State};

/// A layered synthetic package set: layer 0 has no deps, every package in
/// layer `k > 0` build-depends on a handful of packages from layer `k - 1`.
/// Mirrors the fan-out shape of a real recipe tree closely enough to
/// exercise `build_dep_graph`/`lift` at a representative size.
fn synthetic_packages(layers: usize, per_layer: usize, fanout: usize) -> Vec<Package> {
    let mut packages = Vec::with_capacity(layers * per_layer);
    for layer in 0..layers {
        for i in 0..per_layer {
            let name = format!("pkg-{layer}-{i}");
            let mut build_deps = Vec::new();
            if layer > 0 {
                for f in 0..fanout {
                    let dep_idx = (i + f) % per_layer;
                    build_deps.push(format!("name(pkg-{}-{dep_idx})", layer - 1));
                }
            }
            let mut pkg = Package {
                source: name.clone(),
                names: vec![name.clone()],
                version: "1.0".to_string(),
                release: 1,
                provides: Vec::new(),
                build_deps,
                ignores: Vec::new(),
                path: Utf8PathBuf::from(name.clone()),
                root: Utf8PathBuf::from("."),
                resolved: false,
            };
            pkg.normalize();
            packages.push(pkg);
        }
    }
    packages.sort_by(|a, b| (a.source.clone(), a.primary_name().to_string()).cmp(&(b.source.clone(), b.primary_name().to_string())));
    packages
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("benches");
    group.sample_size(10);

    let packages = synthetic_packages(20, 50, 3);

    group.bench_function("build_dep_graph", |b| {
        b.iter(|| {
            State::from_sorted_packages(packages.clone(), Origin::SourceTree);
        })
    });

    let (state, _) = State::from_sorted_packages(packages, Origin::SourceTree);
    group.bench_function("lift_half_the_graph", |b| {
        b.iter(|| {
            graph::lift(&state.dep_graph, |v| v % 2 == 0);
        })
    });

    group.bench_function("tiered_topological_sort", |b| {
        b.iter(|| {
            graph::tiered_topological_sort(&state.dep_graph).expect("synthetic graph is acyclic");
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
