//! Follower benchmarks using Criterion.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gvf_rs::particles::{ParticlePopulation, Resampler};
use gvf_rs::sampling::Sampler;
use gvf_rs::{FollowerConfig, GestureFollower, GestureTemplate, Parameters, State};

/// Circle template with `points` frames in `dims` dimensions.
fn create_template(points: usize, dims: usize) -> GestureTemplate {
    let frames: Vec<Vec<f64>> = (0..points)
        .map(|i| {
            let t = i as f64 / points as f64 * std::f64::consts::TAU;
            (0..dims).map(|d| (t + d as f64).sin()).collect()
        })
        .collect();
    GestureTemplate::from_frames(&frames).expect("valid template")
}

fn create_follower(particles: usize, templates: usize, dims: usize) -> GestureFollower {
    let config = FollowerConfig::new(Parameters {
        number_of_particles: particles,
        resampling_threshold: particles / 4,
        ..Parameters::default()
    });
    let mut follower = GestureFollower::with_seed(config, 1);
    for _ in 0..templates {
        follower.add_template(create_template(64, dims)).expect("valid template");
    }
    follower.set_state(State::Following, None);
    follower
}

fn benchmark_update(c: &mut Criterion, name: &str, particles: usize, templates: usize, dims: usize) {
    let mut follower = create_follower(particles, templates, dims);
    let observations: Vec<Vec<f64>> = create_template(64, dims)
        .frames()
        .iter()
        .map(|f| f.iter().copied().collect())
        .collect();
    let mut frame = 0;

    c.bench_function(name, |b| {
        b.iter(|| {
            follower.update(black_box(&observations[frame])).expect("following");
            frame = (frame + 1) % observations.len();
            if frame == 0 {
                follower.restart();
            }
        })
    });
}

fn benchmark_update_1000_particles_2d(c: &mut Criterion) {
    benchmark_update(c, "follower_update_1000_particles_2d", 1000, 3, 2);
}

fn benchmark_update_2000_particles_3d(c: &mut Criterion) {
    benchmark_update(c, "follower_update_2000_particles_3d", 2000, 3, 3);
}

fn benchmark_update_1000_particles_8d(c: &mut Criterion) {
    benchmark_update(c, "follower_update_1000_particles_8d", 1000, 5, 8);
}

fn benchmark_restart(c: &mut Criterion) {
    let mut follower = create_follower(1000, 3, 2);
    c.bench_function("follower_restart_1000_particles", |b| b.iter(|| follower.restart()));
}

fn benchmark_resample(c: &mut Criterion) {
    let population = ParticlePopulation::new(1000, 3);
    let mut resampler = Resampler::new(1000);
    let mut sampler = Sampler::seeded(1);

    c.bench_function("resample_1000_particles", |b| {
        b.iter(|| {
            let mut population = population.clone();
            resampler.resample(black_box(&mut population), &mut sampler);
        })
    });
}

criterion_group!(
    benches,
    benchmark_update_1000_particles_2d,
    benchmark_update_2000_particles_3d,
    benchmark_update_1000_particles_8d,
    benchmark_restart,
    benchmark_resample,
);
criterion_main!(benches);
