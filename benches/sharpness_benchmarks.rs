//! Performance benchmarks for the focus loop hot path
//!
//! Run with: cargo bench --bench sharpness_benchmarks
//!
//! Scoring runs once per frame, so it bounds the loop rate at each resolution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crabfocus::testing::{simulated_rig, LensModel, ThresholdActuator};
use crabfocus::{CameraFrame, ControllerConfig, FocusController, SharpnessMeter};
use std::time::Duration;

/// Gradient RGB frame with some high-frequency detail
fn generate_test_frame(width: u32, height: u32) -> CameraFrame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let detail = if (x / 4 + y / 4) % 2 == 0 { 40 } else { 0 };
            data.push(((x % 256) as u8).wrapping_add(detail));
            data.push((y % 256) as u8);
            data.push(((x + y) % 256) as u8);
        }
    }
    CameraFrame::new(data, width, height, "bench".to_string())
}

fn bench_sharpness_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sharpness Score");
    group.measurement_time(Duration::from_secs(10));

    let meter = SharpnessMeter::default();
    let resolutions = [(320, 240, "QVGA"), (640, 480, "VGA"), (1280, 720, "720p")];

    for (width, height, name) in resolutions {
        if width >= 1280 {
            group.sample_size(10);
        }
        let frame = generate_test_frame(width, height);
        group.throughput(Throughput::Elements((width * height) as u64));
        group.bench_with_input(BenchmarkId::new("score", name), &frame, |b, frame| {
            b.iter(|| meter.score(black_box(frame)))
        });
    }

    group.finish();
}

fn bench_simulated_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("Simulated Rig");
    let meter = SharpnessMeter::default();

    for defocus in [0i64, 2_000, 6_000] {
        let actuator = ThresholdActuator::new(1, 40_000).with_position(20_000 + defocus);
        let (camera, _lens) = simulated_rig(LensModel::new(actuator, 20_000));
        group.bench_function(BenchmarkId::new("render_and_score", defocus), |b| {
            b.iter(|| meter.score(&camera.frame()))
        });
    }

    group.finish();
}

fn bench_controller(c: &mut Criterion) {
    let scores: Vec<f64> = (0..1_000)
        .map(|i| 0.2 + 0.1 * ((i as f64) * 0.05).sin())
        .collect();

    c.bench_function("controller_1000_observations", |b| {
        b.iter(|| {
            let mut controller = FocusController::new(ControllerConfig::default(), 16);
            for &score in &scores {
                black_box(controller.correct_focus(true, score));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_sharpness_score,
    bench_simulated_frame,
    bench_controller
);
criterion_main!(benches);
