//! Benchmarks for point location and P1 evaluation
//!
//! Meshes come from [`IntervalMesher`] and query points from a seeded RNG.
//! Each dimension measures:
//!
//! 1. **Point location**: naive scan against the bin grid, pointwise and batched
//! 2. **Nearest vertex**: naive scan against the k-d tree
//! 3. **P1 evaluation**: sequential against the global rayon pool

#![allow(missing_docs)] // Criterion macros generate undocumented functions

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simplicial_interp::prelude::*;
use std::hint::black_box;
use std::sync::OnceLock;

const QUERY_COUNT: usize = 2_000;

/// Get the deterministic seed for random query generation.
/// Reads `SIMPLICIAL_BENCH_SEED` (decimal or 0x-hex). Defaults to 0x51A1.
fn get_benchmark_seed() -> u64 {
    static SEED: OnceLock<u64> = OnceLock::new();
    *SEED.get_or_init(|| {
        std::env::var("SIMPLICIAL_BENCH_SEED")
            .ok()
            .and_then(|s| {
                let s = s.trim();
                s.strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .map_or_else(|| s.parse().ok(), |hex| u64::from_str_radix(hex, 16).ok())
            })
            .unwrap_or(0x51A1)
    })
}

fn random_points(count: usize, dimension: usize) -> Sample {
    let mut rng = StdRng::seed_from_u64(get_benchmark_seed());
    let data = (0..count * dimension)
        .map(|_| rng.random_range(-0.1..1.1))
        .collect();
    Sample::from_flat(dimension, data).unwrap()
}

macro_rules! generate_location_benchmarks {
    ($dim:literal, $($cells:literal),+) => {
        pastey::paste! {
            /// Benchmark point location and evaluation for [<$dim>]D
            fn [<benchmark_point_location_ $dim d>](c: &mut Criterion) {
                let points = random_points(QUERY_COUNT, $dim);
                let mut group = c.benchmark_group(concat!("point_location_", stringify!($dim), "d"));
                group.throughput(Throughput::Elements(QUERY_COUNT as u64));

                for cells in [$($cells),+] {
                    let mesh = IntervalMesher::new(vec![cells; $dim])
                        .build(&[0.0; $dim], &[1.0; $dim])
                        .unwrap();
                    let simplices = mesh.simplices_number();

                    let naive = NaiveEnclosingSimplex::new()
                        .rebind(mesh.vertices(), mesh.simplices())
                        .unwrap();
                    let grid = BinGridEnclosingSimplex::new()
                        .rebind(mesh.vertices(), mesh.simplices())
                        .unwrap();
                    group.bench_with_input(BenchmarkId::new("naive", simplices), &points, |b, points| {
                        b.iter(|| {
                            for point in points.rows() {
                                black_box(naive.query(point));
                            }
                        });
                    });
                    group.bench_with_input(BenchmarkId::new("bin_grid", simplices), &points, |b, points| {
                        b.iter(|| {
                            for point in points.rows() {
                                black_box(grid.query(point));
                            }
                        });
                    });
                    group.bench_with_input(
                        BenchmarkId::new("bin_grid_batched", simplices),
                        &points,
                        |b, points| {
                            let executor = Executor::global();
                            b.iter(|| black_box(grid.query_sample(points, &executor).unwrap()));
                        },
                    );

                    let naive_nn = NaiveNearestNeighbour::new(mesh.vertices());
                    let tree = KdTree::new(mesh.vertices());
                    let vertices = mesh.vertices_number();
                    group.bench_with_input(BenchmarkId::new("nearest_naive", vertices), &points, |b, points| {
                        b.iter(|| {
                            for point in points.rows() {
                                black_box(naive_nn.query(point));
                            }
                        });
                    });
                    group.bench_with_input(BenchmarkId::new("nearest_kd_tree", vertices), &points, |b, points| {
                        b.iter(|| {
                            for point in points.rows() {
                                black_box(tree.query(point));
                            }
                        });
                    });

                    let values = Sample::from_flat(
                        1,
                        mesh.vertices().rows().map(|v| v.iter().sum()).collect(),
                    )
                    .unwrap();
                    let mut field = P1LagrangeEvaluation::new(mesh, values).unwrap();
                    group.bench_with_input(BenchmarkId::new("p1_parallel", simplices), &points, |b, points| {
                        b.iter(|| black_box(field.evaluate_sample(points).unwrap()));
                    });
                    field.set_executor(Executor::sequential());
                    group.bench_with_input(BenchmarkId::new("p1_sequential", simplices), &points, |b, points| {
                        b.iter(|| black_box(field.evaluate_sample(points).unwrap()));
                    });
                }

                group.finish();
            }
        }
    };
}

generate_location_benchmarks!(1, 64, 1024);
generate_location_benchmarks!(2, 8, 32);
generate_location_benchmarks!(3, 4, 10);
generate_location_benchmarks!(4, 3, 5);

criterion_group!(
    benches,
    benchmark_point_location_1d,
    benchmark_point_location_2d,
    benchmark_point_location_3d,
    benchmark_point_location_4d
);
criterion_main!(benches);
