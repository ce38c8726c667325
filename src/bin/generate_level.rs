//! Level generator binary: builds a density level, applies edits and reports
//! mesh statistics.
//!
//! Usage: cargo run --release --bin generate_level -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>      Load a LevelConfig from JSON (flags below override it)
//!   --size <METERS>      Level size per axis (default: 10)
//!   --chunks <N>         Chunks per axis (default: 4)
//!   --voxels <N>         Cells per chunk per axis (default: 10)
//!   --surface <ISO>      Surface level in [-1, 1] (default: 0.5)
//!   --seed <SEED>        Noise seed (default: 0)
//!   --ground <HEIGHT>    Enable ground leveling at this height
//!   --workers <N>        Background extraction workers (default: 2)
//!   --edit x,y,z,r       Sculpt a sphere; repeatable
//!   --add                Edits fill instead of carve
//!   --gradient           Edits fade linearly to the radius
//!   --out <PATH>         Write a JSON summary

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use glam::Vec3;
use serde_json::json;

use voxsculpt::core::Result;
use voxsculpt::mesh::SurfaceNetsMesher;
use voxsculpt::terrain::{LevelConfig, LevelGrid, PerlinNoiseField};
use voxsculpt::voxel::{EditEngine, EditReport, RemeshQueue};

fn main() -> ExitCode {
    voxsculpt::core::logging::init();

    let args: Vec<String> = std::env::args().collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<()> {
    let mut config = match parse_str_arg(args, "--config") {
        Some(path) => LevelConfig::from_json_file(path)?,
        None => LevelConfig::default(),
    };
    if let Some(size) = parse_f32_arg(args, "--size") {
        config.level_size = [size; 3];
    }
    if let Some(chunks) = parse_u32_arg(args, "--chunks") {
        config.chunk_grid = [chunks; 3];
    }
    if let Some(voxels) = parse_u32_arg(args, "--voxels") {
        config.voxel_grid = [voxels; 3];
    }
    if let Some(surface) = parse_f32_arg(args, "--surface") {
        config.surface_level = surface;
    }
    if let Some(seed) = parse_u32_arg(args, "--seed") {
        config.seed = seed;
    }
    if let Some(ground) = parse_f32_arg(args, "--ground") {
        config.ground_level = Some(ground);
    }
    if let Some(workers) = parse_u32_arg(args, "--workers") {
        config.remesh_workers = workers as usize;
    }
    config.validate()?;

    let subtract = !args.iter().any(|a| a == "--add");
    let gradient = args.iter().any(|a| a == "--gradient");
    let edits = parse_edits(args);
    let output = parse_str_arg(args, "--out").map(PathBuf::from);

    println!("=== Voxsculpt Level Generator ===");
    println!("Size:    {:?}", config.level_size);
    println!("Chunks:  {:?}", config.chunk_grid);
    println!("Voxels:  {:?} per chunk", config.voxel_grid);
    println!("Surface: {}", config.surface_level);
    println!("Seed:    {}", config.seed);
    println!("Edits:   {} ({}, {})", edits.len(),
        if subtract { "subtract" } else { "add" },
        if gradient { "gradient" } else { "step" });
    println!();

    let mut noise = PerlinNoiseField::new(config.seed);
    let mut queue = RemeshQueue::new(SurfaceNetsMesher::default(), config.remesh_workers)?;

    let start = Instant::now();
    let mut level = LevelGrid::generate(config.clone(), &mut noise, &mut queue)?;
    let generated_in = start.elapsed();

    let mut reports: Vec<EditReport> = Vec::with_capacity(edits.len());
    for &(center, radius) in &edits {
        let report = EditEngine::apply_edit(&mut level, &mut queue, center, radius, subtract, gradient)?;
        println!("Edit at {} r={}: {} samples in {} chunks",
            center, radius, report.voxels_changed, report.chunks.len());
        reports.push(report);
        queue.poll();
    }

    queue.wait_idle();
    let elapsed = start.elapsed();
    let stats = queue.stats();
    let store = queue.store();

    println!();
    println!("Generated {} chunks in {:.1}ms", level.chunks().len(), generated_in.as_secs_f64() * 1000.0);
    println!("Meshes:    {} chunks, {} triangles", store.len(), store.total_triangles());
    println!("Remesh:    {} submitted, {} dispatched, {} coalesced, {} failed",
        stats.submitted, stats.dispatched, stats.coalesced, stats.failed);
    println!("Total:     {:.1}ms", elapsed.as_secs_f64() * 1000.0);

    if let Some(path) = output {
        let summary = json!({
            "config": config,
            "chunks": level.chunks().iter().map(|chunk| {
                let (min, max) = chunk.min_max();
                json!({
                    "coord": chunk.coord(),
                    "revision": chunk.revision(),
                    "min": min,
                    "max": max,
                    "triangles": store.get(chunk.coord()).map_or(0, |mesh| mesh.triangle_count()),
                })
            }).collect::<Vec<_>>(),
            "edits": reports,
            "remesh": stats,
            "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
        });
        std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
        println!("Summary: {}", path.display());
    }

    Ok(())
}

/// Every `--edit x,y,z,r` occurrence
fn parse_edits(args: &[String]) -> Vec<(Vec3, f32)> {
    args.iter()
        .enumerate()
        .filter(|(_, a)| *a == "--edit")
        .filter_map(|(i, _)| args.get(i + 1))
        .filter_map(|s| {
            let parts: Vec<f32> = s.split(',').filter_map(|p| p.trim().parse().ok()).collect();
            match parts.as_slice() {
                [x, y, z, r] => Some((Vec3::new(*x, *y, *z), *r)),
                _ => {
                    log::warn!("Ignoring malformed --edit '{}', expected x,y,z,r", s);
                    None
                }
            }
        })
        .collect()
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
