use criterion::{criterion_group, criterion_main, Criterion, black_box};

use glam::{UVec3, Vec3};

use voxsculpt::mesh::{Mesher, SurfaceNetsMesher};
use voxsculpt::terrain::{LevelConfig, LevelGrid, PerlinNoiseField};
use voxsculpt::voxel::{EditEngine, RemeshQueue};

fn level(chunks: u32, voxels: u32) -> (LevelGrid, RemeshQueue) {
    let mut noise = PerlinNoiseField::default();
    let mut queue = RemeshQueue::immediate(SurfaceNetsMesher::default());
    let config = LevelConfig {
        chunk_grid: [chunks; 3],
        voxel_grid: [voxels; 3],
        surface_level: 0.0,
        ..Default::default()
    };
    let level = LevelGrid::generate(config, &mut noise, &mut queue).expect("level generation");
    (level, queue)
}

fn bench_generate_4x4x4(c: &mut Criterion) {
    let config = LevelConfig {
        surface_level: 0.0,
        ground_level: Some(4.0),
        ..Default::default()
    };
    let mut noise = PerlinNoiseField::default();

    c.bench_function("generate_level_4x4x4_10", |b| {
        b.iter(|| {
            let mut queue = RemeshQueue::immediate(SurfaceNetsMesher::default());
            LevelGrid::generate(black_box(config.clone()), &mut noise, &mut queue)
        });
    });
}

fn bench_step_edit(c: &mut Criterion) {
    let (mut level, mut queue) = level(2, 16);

    c.bench_function("edit_step_r2_straddling", |b| {
        b.iter(|| {
            EditEngine::apply_edit(&mut level, &mut queue, black_box(Vec3::splat(5.0)), 2.0, true, false)
        });
    });
}

fn bench_gradient_edit(c: &mut Criterion) {
    let (mut level, mut queue) = level(2, 16);

    c.bench_function("edit_gradient_r3_straddling", |b| {
        let mut subtract = false;
        b.iter(|| {
            subtract = !subtract;
            EditEngine::apply_edit(&mut level, &mut queue, black_box(Vec3::splat(5.0)), 3.0, subtract, true)
        });
    });
}

fn bench_surface_nets_32(c: &mut Criterion) {
    let (level, _queue) = level(1, 32);
    let snapshot = level.chunks()[0].snapshot(level.surface_level());
    let mesher = SurfaceNetsMesher::default();

    c.bench_function("surface_nets_33_cubed", |b| {
        b.iter(|| mesher.extract(black_box(&snapshot)));
    });
    assert_eq!(snapshot.size, UVec3::splat(33));
}

criterion_group!(
    benches,
    bench_generate_4x4x4,
    bench_step_edit,
    bench_gradient_edit,
    bench_surface_nets_32,
);
criterion_main!(benches);
