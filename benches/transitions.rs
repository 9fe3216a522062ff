#![allow(missing_docs)]
//! Benchmark: controller transition throughput against the mock device.
//!
//! `open_to_preview` measures open → InitSurface → OpenDevice → CreateSession
//! → Preview → close with the simulator completing every async step.
//! `still_cycles` measures `n` full take_picture cycles from a running preview;
//! controller construction and open happen in the setup phase.
use capture_fsm::{
    config::{ControllerConfig, SimulatorConfig},
    device::{MockDevice, MockTarget},
    machine::{Controller, State},
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

// Converge on the first frame so the bench measures the machine, not waiting.
fn fast_simulator() -> SimulatorConfig {
    SimulatorConfig {
        max_frames_to_focus: 1,
        max_frames_to_expose: 1,
        ..Default::default()
    }
}

fn previewing() -> Controller<MockDevice, MockTarget> {
    let mut controller = Controller::new(
        MockDevice::simulated(fast_simulator()),
        ControllerConfig::default(),
    )
    .expect("default config is valid");
    controller
        .open(MockTarget::available())
        .expect("fresh controller is closed");
    controller.dispatch_pending();
    assert_eq!(controller.state(), State::Preview);
    controller
}

fn bench_open_to_preview(c: &mut Criterion) {
    c.bench_function("open_to_preview", |b| {
        b.iter_batched(
            || {
                Controller::<MockDevice, MockTarget>::new(
                    MockDevice::simulated(fast_simulator()),
                    ControllerConfig::default(),
                )
                .expect("default config is valid")
            },
            |mut controller| {
                controller
                    .open(MockTarget::available())
                    .expect("fresh controller is closed");
                controller.dispatch_pending();
                controller.close();
                black_box(controller.stats().transitions)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_still_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("still_cycles");
    for &n in &[1u64, 10, 100] {
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                previewing,
                |mut controller| {
                    for _ in 0..n {
                        assert!(controller.take_picture(|image| {
                            black_box(image.data().len());
                        }));
                        while controller.state() != State::Preview {
                            controller.backend_mut().tick();
                            controller.dispatch_pending();
                        }
                    }
                    black_box(controller.stats().stills_delivered)
                },
                BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_open_to_preview, bench_still_cycles);
criterion_main!(benches);
