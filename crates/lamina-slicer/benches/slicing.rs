//! Benchmarks for mesh slicing.
//!
//! Run with: cargo bench -p lamina-slicer

#![allow(missing_docs)]

use std::f64::consts::PI;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lamina_slicer::{generate_layer_heights, slice_mesh, NoopObserver, SliceSettings, Triangle, Vector3};

/// UV sphere of radius `r` with outward winding.
fn create_sphere(r: f64, stacks: usize, sectors: usize) -> Vec<Triangle> {
    let vertex = |i: usize, j: usize| {
        let theta = PI * i as f64 / stacks as f64;
        let phi = 2.0 * PI * j as f64 / sectors as f64;
        Vector3::new(
            r * theta.sin() * phi.cos(),
            r * theta.sin() * phi.sin(),
            r * theta.cos(),
        )
        .unwrap()
    };

    let mut triangles = Vec::with_capacity(stacks * sectors * 2);
    for i in 0..stacks {
        for j in 0..sectors {
            let a = vertex(i, j);
            let b = vertex(i + 1, j);
            let c = vertex(i + 1, j + 1);
            let d = vertex(i, j + 1);
            triangles.push(Triangle::new(a, b, c));
            triangles.push(Triangle::new(a, c, d));
        }
    }
    triangles
}

fn bench_slicing(c: &mut Criterion) {
    let settings = SliceSettings::default();

    let mut group = c.benchmark_group("slice_sphere");
    group.sample_size(10);

    for &(stacks, sectors) in &[(32, 64), (128, 256)] {
        let sphere = create_sphere(10.0, stacks, sectors);
        let heights = generate_layer_heights(-10.0, 10.0, 0.3, 0.2);
        group.throughput(Throughput::Elements(sphere.len() as u64));
        group.bench_function(format!("{}tri_{}layers", sphere.len(), heights.len()), |b| {
            b.iter(|| {
                slice_mesh(
                    black_box(&sphere),
                    black_box(&heights),
                    &settings,
                    &NoopObserver,
                )
                .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_slicing);
criterion_main!(benches);
