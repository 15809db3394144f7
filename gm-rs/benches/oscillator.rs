use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gm_rs::kernel::KernelLifecycle;
use gm_rs::response::{OscillatorConfig, OscillatorKernel, Subsampling};
use gm_rs::traits::OscillatorResponse1D;
use rand::rngs::ThreadRng;
use std::num::NonZeroUsize;

/// Synthetic accelerogram: a noisy burst under an exponential envelope.
fn randomized_record(mut rng: ThreadRng, num_samples: NonZeroUsize, dt: f64) -> Vec<f64> {
    use rand::Rng;

    let n: usize = num_samples.into();
    let rise = 0.1 * n as f64 * dt;
    (0..n)
        .map(|i| {
            let t = i as f64 * dt;
            let envelope = (t / rise) * (1.0 - t / rise).exp();
            envelope * rng.random_range(-1.0..1.0)
        })
        .collect()
}

/// Full response at several periods on a 200 Hz record.
fn oscillator_periods(c: &mut Criterion) {
    const DT: f64 = 0.005;
    let acc = randomized_record(rand::rng(), NonZeroUsize::new(1 << 14).unwrap(), DT);
    let mut sacc = vec![0.0; acc.len()];
    let mut svel = vec![0.0; acc.len()];
    let mut sdis = vec![0.0; acc.len()];

    let mut group = c.benchmark_group("oscillator_run_into");
    for period in [0.05, 0.3, 1.0, 3.0] {
        let kernel = OscillatorKernel::try_new(OscillatorConfig {
            period,
            damping: 0.05,
            dt: DT,
            subsampling: Subsampling::None,
        })
        .expect("oscillator config should be valid");

        group.bench_with_input(BenchmarkId::from_parameter(period), &acc, |bench, acc| {
            bench.iter(|| {
                kernel
                    .run_into(
                        black_box(acc.as_slice()),
                        black_box(sacc.as_mut_slice()),
                        black_box(svel.as_mut_slice()),
                        black_box(sdis.as_mut_slice()),
                    )
                    .expect("buffers are sized to the record")
            })
        });
    }
    group.finish();
}

/// Short-period oscillator on a coarse record, first-substep variant.
fn oscillator_first_substep(c: &mut Criterion) {
    const DT: f64 = 0.02;
    let acc = randomized_record(rand::rng(), NonZeroUsize::new(1 << 12).unwrap(), DT);
    let kernel = OscillatorKernel::try_new(OscillatorConfig {
        period: 0.05,
        damping: 0.05,
        dt: DT,
        subsampling: Subsampling::FirstSubstep,
    })
    .expect("oscillator config should be valid");

    c.bench_with_input(
        BenchmarkId::new("oscillator_first_substep", kernel.substeps()),
        &acc,
        |bench, acc| bench.iter(|| kernel.run_alloc(black_box(acc.as_slice()))),
    );
}

criterion_group!(benches, oscillator_periods, oscillator_first_substep);
criterion_main!(benches);
