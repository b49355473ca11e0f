/*
Measures the cost of the acquisition loop itself (simulated bus, no pacing delay), and
the period jitter of the two pacing primitives at the default 0.3 ms sleep between reads.
*/

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::{
    hint::black_box,
    io::sink,
    time::{Duration, Instant},
};

use velocity_trace::acquisition::{
    acquisition_loop::AcquisitionSettings,
    pacing::{Pacer, Pacing, PacingStrategy},
};
use velocity_trace::app::acquire;
use velocity_trace::robot_io::{
    Bus, MonotonicClock,
    configuration::{ActuatorConfiguration, RobotConfiguration, SimulationConfiguration},
    simulated::{SimulatedPort, SimulatedRobot},
};

const ITERATIONS: usize = 10_000;
const PACED_SAMPLES: usize = 500;

fn robot_config() -> RobotConfiguration {
    RobotConfiguration {
        name: "bench".into(),
        actuators: vec![ActuatorConfiguration::default(); 8],
        simulation: SimulationConfiguration {
            seed: Some(1),
            ..SimulationConfiguration::default()
        },
    }
}

fn bench_acquisition_loop(c: &mut Criterion) {
    let config = robot_config();
    let mut group = c.benchmark_group("acquisition_loop");
    group.sample_size(20);

    group.bench_function(BenchmarkId::new("simulated_port", ITERATIONS), |b| {
        b.iter(|| {
            let mut port = SimulatedPort::new(0);
            port.attach(SimulatedRobot::from_config(&config));
            let settings = AcquisitionSettings {
                actuator: 3,
                iterations: ITERATIONS,
            };
            let pacing = Pacing::new(PacingStrategy::Spin, Duration::ZERO);
            let trace = acquire(port, MonotonicClock::new(), pacing, settings, &mut sink());
            black_box(trace.is_ok());
        })
    });

    group.finish();
}

fn bench_pacing_jitter(c: &mut Criterion) {
    let delay = Duration::from_micros(300);
    let mut group = c.benchmark_group("pacing_jitter");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    for strategy in [PacingStrategy::Os, PacingStrategy::Spin] {
        group.bench_function(BenchmarkId::new(format!("{:?}", strategy), "300us"), |b| {
            let mut pacing = Pacing::new(strategy, delay);
            b.iter(|| {
                let mut last = Instant::now();
                let mut jitter_ns = Vec::with_capacity(PACED_SAMPLES);
                for _ in 0..PACED_SAMPLES {
                    pacing.pace();
                    let now = Instant::now();
                    let period = now.duration_since(last);
                    last = now;
                    jitter_ns.push(period.as_nanos() as i64 - delay.as_nanos() as i64);
                }
                black_box(jitter_ns);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_acquisition_loop, bench_pacing_jitter);
criterion_main!(benches);
