//! Trait-first kernel for the SDOF oscillator response.

use crate::kernel::{
    ensure_len, read_min, require_positive, ConfigError, ExecInvariantViolation, KernelLifecycle,
    Read1D, Write1D,
};
use crate::traits::OscillatorResponse1D;
use nalgebra::RealField;

#[cfg(feature = "alloc")]
use alloc::{vec, vec::Vec};

/// How the input interval is treated by the recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subsampling {
    /// One recursion step per input interval. The record must already be
    /// sampled finely enough for the period (`dt <= period / 10`).
    #[default]
    None,
    /// Split each interval into `trunc(10 * dt / period - 0.01) + 1`
    /// substeps and keep only the state after the first one.
    ///
    /// The output stays on the input time base, so for coarse records the
    /// response is not the fully upsampled one. Getting that would require
    /// longer output buffers and a new sample rate.
    FirstSubstep,
}

/// Constructor config for [`OscillatorKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorConfig<F>
where
    F: RealField + Copy,
{
    /// Natural period of the oscillator in seconds, `> 0`.
    pub period: F,
    /// Fraction of critical damping, in `[0, 1)`.
    pub damping: F,
    /// Sample interval of the acceleration record in seconds, `> 0`.
    pub dt: F,
    /// Interval treatment, see [`Subsampling`].
    pub subsampling: Subsampling,
}

impl<F> OscillatorConfig<F>
where
    F: RealField + Copy,
{
    /// Config for a record described by its sample times.
    ///
    /// The interval is `times[1] - times[0]` and the spacing is assumed
    /// uniform. Selects [`Subsampling::FirstSubstep`].
    pub fn from_times(times: &[F], period: F, damping: F) -> Result<Self, ConfigError> {
        if times.len() < 2 {
            return Err(ConfigError::EmptyInput { arg: "times" });
        }
        let dt = require_positive(
            times[1] - times[0],
            "times",
            "sample times must be strictly increasing",
        )?;
        Ok(Self {
            period,
            damping,
            dt,
            subsampling: Subsampling::FirstSubstep,
        })
    }
}

/// Number of substeps the recursion needs for `dt` at `period`.
pub(crate) fn substep_factor<F>(dt: F, period: F) -> F
where
    F: RealField + Copy,
{
    let ten = nalgebra::convert::<f64, F>(10.0);
    let margin = nalgebra::convert::<f64, F>(0.01);
    (ten * dt / period - margin).trunc() + F::one()
}

/// Exact recursive solution of a damped SDOF oscillator driven by a
/// piecewise-linear base acceleration.
///
/// All trigonometric and exponential terms depend only on period, damping
/// and the step, so they are computed once at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorKernel<F>
where
    F: RealField + Copy,
{
    period: F,
    damping: F,
    dt: F,
    step: F,
    substep_scale: F,
    substeps: usize,
    wd: F,
    sine: F,
    cosine: F,
    w2: F,
    w2i: F,
    wdi: F,
    dw: F,
    neg_two_dw: F,
    ddtw3: F,
}

impl<F> OscillatorKernel<F>
where
    F: RealField + Copy,
{
    /// Return configured natural period.
    pub fn period(&self) -> F {
        self.period
    }

    /// Return configured damping ratio.
    pub fn damping(&self) -> F {
        self.damping
    }

    /// Return the sample interval of the input record.
    pub fn dt(&self) -> F {
        self.dt
    }

    /// Return the step the recursion actually advances by.
    pub fn step(&self) -> F {
        self.step
    }

    /// Return the number of substeps each input interval is split into.
    pub fn substeps(&self) -> usize {
        self.substeps
    }

    /// Advance the oscillator across one (sub)step.
    ///
    /// `state` is the relative displacement and velocity at the previous
    /// output index. Returns displacement, velocity and absolute acceleration.
    #[inline]
    fn advance(&self, state: (F, F), g: F, next: F) -> (F, F, F) {
        let (dis_prev, vel_prev) = state;
        let dug = (next - g) / self.substep_scale;
        let gw2i = g * self.w2i;
        let dugw2i = dug * self.w2i;
        let dugw2idt = dugw2i / self.step;

        let b = dis_prev + gw2i - self.ddtw3 * dug;
        let a = self.wdi * vel_prev + self.dw * self.wdi * b + self.wdi * dugw2idt;

        let dis = a * self.sine + b * self.cosine + self.ddtw3 * dug - gw2i - dugw2i;
        let vel = a * (self.wd * self.cosine - self.dw * self.sine)
            - b * (self.wd * self.sine + self.dw * self.cosine)
            - dugw2idt;
        let acc = self.neg_two_dw * vel - self.w2 * dis;
        (dis, vel, acc)
    }

    fn integrate(&self, acc: &[F], sacc: &mut [F], svel: &mut [F], sdis: &mut [F]) {
        let mut state = (F::zero(), F::zero());
        for (((pair, a_out), v_out), d_out) in acc
            .windows(2)
            .zip(sacc.iter_mut())
            .zip(svel.iter_mut())
            .zip(sdis.iter_mut())
        {
            let (dis, vel, accel) = self.advance(state, pair[0], pair[1]);
            *d_out = dis;
            *v_out = vel;
            *a_out = accel;
            state = (dis, vel);
        }
    }
}

impl<F> KernelLifecycle for OscillatorKernel<F>
where
    F: RealField + Copy,
{
    type Config = OscillatorConfig<F>;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        let period = require_positive(config.period, "period", "period must be finite and > 0")?;
        let dt = require_positive(config.dt, "dt", "dt must be finite and > 0")?;
        let damping = config.damping;
        if !(damping.is_finite() && damping >= F::zero() && damping < F::one()) {
            return Err(ConfigError::InvalidArgument {
                arg: "damping",
                reason: "damping must be in [0, 1)",
            });
        }

        let substep_scale = match config.subsampling {
            Subsampling::None => F::one(),
            Subsampling::FirstSubstep => substep_factor(dt, period),
        };
        let substeps = nalgebra::try_convert::<F, f64>(substep_scale)
            .map(|ns| ns as usize)
            .unwrap_or(1);
        let step = dt / substep_scale;

        let tenth = nalgebra::convert::<f64, F>(0.1);
        match config.subsampling {
            Subsampling::None if dt > period * tenth => log::warn!(
                "oscillator: dt={dt} is coarser than period/10 for period={period}; resample the record first"
            ),
            Subsampling::FirstSubstep if substeps > 1 => log::warn!(
                "oscillator: dt={dt} needs {substeps} substeps for period={period}; only the first substep is kept"
            ),
            _ => {}
        }

        let d = damping;
        let w = F::two_pi() / period;
        let wd = (F::one() - d * d).sqrt() * w;
        let e = (-d * w * step).exp();
        let w2 = w * w;
        let w3 = w2 * w;
        let dw = d * w;
        let two = nalgebra::convert::<f64, F>(2.0);

        log::debug!(
            "oscillator: period={period} damping={damping} step={step} substeps={substeps}"
        );

        Ok(Self {
            period,
            damping,
            dt,
            step,
            substep_scale,
            substeps,
            wd,
            sine: e * (wd * step).sin(),
            cosine: e * (wd * step).cos(),
            w2,
            w2i: F::one() / w2,
            wdi: F::one() / wd,
            dw,
            neg_two_dw: -two * dw,
            ddtw3: two * d / (step * w3),
        })
    }
}

/// Response of an SDOF oscillator to an acceleration record.
///
/// All three series have the length of the input record. Only the first
/// `len() - 1` entries are computed; the last one is zero.
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq)]
pub struct OscillatorResponse<F> {
    /// Absolute acceleration of the oscillator mass.
    pub acceleration: Vec<F>,
    /// Velocity relative to the ground.
    pub velocity: Vec<F>,
    /// Displacement relative to the ground.
    pub displacement: Vec<F>,
    /// Sample interval of the series.
    pub dt: F,
}

#[cfg(feature = "alloc")]
impl<F> OscillatorResponse<F>
where
    F: RealField + Copy,
{
    fn zeros(len: usize, dt: F) -> Self {
        Self {
            acceleration: vec![F::zero(); len],
            velocity: vec![F::zero(); len],
            displacement: vec![F::zero(); len],
            dt,
        }
    }

    /// Number of samples in each series.
    pub fn len(&self) -> usize {
        self.acceleration.len()
    }

    /// True when the response holds no samples.
    pub fn is_empty(&self) -> bool {
        self.acceleration.is_empty()
    }

    /// Samples per second.
    pub fn sampling_rate(&self) -> F {
        F::one() / self.dt
    }

    /// Peak absolute acceleration, the spectral acceleration at this period.
    pub fn peak_acceleration(&self) -> F {
        peak_abs(self.computed(&self.acceleration))
    }

    /// Peak absolute relative velocity.
    pub fn peak_velocity(&self) -> F {
        peak_abs(self.computed(&self.velocity))
    }

    /// Peak absolute relative displacement.
    pub fn peak_displacement(&self) -> F {
        peak_abs(self.computed(&self.displacement))
    }

    fn computed<'a>(&self, series: &'a [F]) -> &'a [F] {
        &series[..series.len().saturating_sub(1)]
    }
}

#[cfg(feature = "alloc")]
fn peak_abs<F>(series: &[F]) -> F
where
    F: RealField + Copy,
{
    series
        .iter()
        .fold(F::zero(), |peak, v| if v.abs() > peak { v.abs() } else { peak })
}

impl<F> OscillatorResponse1D<F> for OscillatorKernel<F>
where
    F: RealField + Copy,
{
    fn run_into<I, A, V, D>(
        &self,
        acc: &I,
        sacc: &mut A,
        svel: &mut V,
        sdis: &mut D,
    ) -> Result<(), ExecInvariantViolation>
    where
        I: Read1D<F> + ?Sized,
        A: Write1D<F> + ?Sized,
        V: Write1D<F> + ?Sized,
        D: Write1D<F> + ?Sized,
    {
        let acc = read_min(acc, "acc", 2)?;
        let sacc = sacc.write_slice_mut()?;
        let svel = svel.write_slice_mut()?;
        let sdis = sdis.write_slice_mut()?;
        ensure_len("sacc", acc.len(), sacc.len())?;
        ensure_len("svel", acc.len(), svel.len())?;
        ensure_len("sdis", acc.len(), sdis.len())?;
        log::trace!("oscillator: integrating {} samples", acc.len());

        self.integrate(acc, sacc, svel, sdis);
        Ok(())
    }

    #[cfg(feature = "alloc")]
    fn run_alloc<I>(&self, acc: &I) -> Result<OscillatorResponse<F>, ExecInvariantViolation>
    where
        I: Read1D<F> + ?Sized,
    {
        let acc = read_min(acc, "acc", 2)?;
        let mut out = OscillatorResponse::zeros(acc.len(), self.dt);
        self.integrate(
            acc,
            &mut out.acceleration,
            &mut out.velocity,
            &mut out.displacement,
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn kernel(period: f64, damping: f64, dt: f64) -> OscillatorKernel<f64> {
        OscillatorKernel::try_new(OscillatorConfig {
            period,
            damping,
            dt,
            subsampling: Subsampling::None,
        })
        .expect("valid oscillator config")
    }

    #[test]
    fn zero_record_gives_zero_response() {
        let acc = [0.0f64; 64];
        let mut sacc = [f64::NAN; 64];
        let mut svel = [f64::NAN; 64];
        let mut sdis = [f64::NAN; 64];
        kernel(0.3, 0.05, 0.01)
            .run_into(&acc, &mut sacc, &mut svel, &mut sdis)
            .expect("run");
        for k in 0..63 {
            assert_eq!(sacc[k], 0.0);
            assert_eq!(svel[k], 0.0);
            assert_eq!(sdis[k], 0.0);
        }
    }

    #[test]
    fn last_index_is_left_untouched() {
        let acc = [0.0f64, 1.0, 1.0, 0.0];
        let sentinel = -7.5;
        let mut sacc = [sentinel; 4];
        let mut svel = [sentinel; 4];
        let mut sdis = [sentinel; 4];
        kernel(1.0, 0.05, 0.01)
            .run_into(&acc, &mut sacc, &mut svel, &mut sdis)
            .expect("run");
        assert_eq!(sacc[3], sentinel);
        assert_eq!(svel[3], sentinel);
        assert_eq!(sdis[3], sentinel);
        assert!(sacc[..3].iter().all(|v| *v != sentinel));
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn matches_reference_fixture() {
        let response = kernel(1.0, 0.05, 0.01)
            .run_alloc(&[0.0f64, 1.0, 1.0, 0.0])
            .expect("run");

        let sacc = [
            0.003_790_804_213_005_986_6,
            0.013_949_804_903_098_561,
            0.024_133_660_334_573_516,
            0.0,
        ];
        let svel = [
            -0.004_987_903_862_664_122_6,
            -0.014_902_409_571_841_383,
            -0.019_708_283_414_813_01,
            0.0,
        ];
        let sdis = [
            -1.663_723_691_351_648_4e-5,
            -1.161_734_713_565_551_5e-4,
            -2.976_456_851_479_306e-4,
            0.0,
        ];
        for k in 0..4 {
            assert_relative_eq!(response.acceleration[k], sacc[k], max_relative = 1e-12);
            assert_relative_eq!(response.velocity[k], svel[k], max_relative = 1e-12);
            assert_relative_eq!(response.displacement[k], sdis[k], max_relative = 1e-12);
        }
        assert_eq!(response.dt, 0.01);
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn reruns_are_bit_identical() {
        let acc: Vec<f64> = (0..500).map(|i| (i as f64 * 0.37).sin()).collect();
        let k = kernel(0.2, 0.05, 0.005);
        let first = k.run_alloc(&acc).expect("first run");
        let second = k.run_alloc(&acc).expect("second run");
        assert_eq!(first, second);
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn undamped_step_matches_closed_form() {
        let a0 = 1.0f64;
        let period = 1.0f64;
        let dt = 0.01f64;
        let w = 2.0 * core::f64::consts::PI / period;
        let acc = vec![a0; 200];

        let response = kernel(period, 0.0, dt).run_alloc(&acc).expect("run");

        for k in 0..199 {
            let t = (k + 1) as f64 * dt;
            let dis = -a0 / (w * w) * (1.0 - (w * t).cos());
            let vel = -a0 / w * (w * t).sin();
            let acc = -w * w * dis;
            assert_relative_eq!(response.displacement[k], dis, epsilon = 1e-12, max_relative = 1e-10);
            assert_relative_eq!(response.velocity[k], vel, epsilon = 1e-12, max_relative = 1e-10);
            assert_relative_eq!(response.acceleration[k], acc, epsilon = 1e-12, max_relative = 1e-10);
        }
        assert_relative_eq!(response.peak_acceleration(), 2.0 * a0, max_relative = 1e-6);
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn first_substep_mode_matches_reference_fixture() {
        let times = [0.0f64, 0.2, 0.4, 0.6];
        let config = OscillatorConfig::from_times(&times, 0.5, 0.05).expect("times config");
        let k = OscillatorKernel::try_new(config).expect("kernel");
        assert_eq!(k.substeps(), 4);
        assert_relative_eq!(k.step(), 0.05);
        assert_eq!(k.dt(), 0.2);

        let response = k.run_alloc(&[0.0, 1.0, 1.0, 0.0]).expect("run");
        let sacc = [0.023_322_480_329_798_16, 0.304_077_373_076_957, 0.802_052_796_988_18];
        let svel = [
            -5.923_217_253_380_963_5e-3,
            -4.909_332_027_163_985e-2,
            -6.553_615_007_929_833e-2,
        ];
        let sdis = [
            -1.005_558_667_865_041_2e-4,
            -1.534_920_230_236_874_2e-3,
            -4.557_538_559_088_996e-3,
        ];
        for i in 0..3 {
            assert_relative_eq!(response.acceleration[i], sacc[i], max_relative = 1e-12);
            assert_relative_eq!(response.velocity[i], svel[i], max_relative = 1e-12);
            assert_relative_eq!(response.displacement[i], sdis[i], max_relative = 1e-12);
        }
        assert_eq!(response.velocity[3], 0.0);
    }

    #[test]
    fn first_substep_mode_with_fine_record_is_a_single_step() {
        let fine = OscillatorKernel::try_new(OscillatorConfig {
            period: 1.0f64,
            damping: 0.05,
            dt: 0.01,
            subsampling: Subsampling::FirstSubstep,
        })
        .expect("kernel");
        assert_eq!(fine, kernel(1.0, 0.05, 0.01));
        assert_eq!(fine.substeps(), 1);
    }

    #[test]
    fn rejects_invalid_parameters() {
        let base = OscillatorConfig {
            period: 1.0f64,
            damping: 0.05,
            dt: 0.01,
            subsampling: Subsampling::None,
        };
        let cases = [
            (
                OscillatorConfig { damping: 1.0, ..base },
                ConfigError::InvalidArgument {
                    arg: "damping",
                    reason: "damping must be in [0, 1)",
                },
            ),
            (
                OscillatorConfig { damping: -0.1, ..base },
                ConfigError::InvalidArgument {
                    arg: "damping",
                    reason: "damping must be in [0, 1)",
                },
            ),
            (
                OscillatorConfig { period: 0.0, ..base },
                ConfigError::InvalidArgument {
                    arg: "period",
                    reason: "period must be finite and > 0",
                },
            ),
            (
                OscillatorConfig { dt: f64::NAN, ..base },
                ConfigError::InvalidArgument {
                    arg: "dt",
                    reason: "dt must be finite and > 0",
                },
            ),
        ];
        for (config, expected) in cases {
            assert_eq!(OscillatorKernel::try_new(config), Err(expected));
        }
    }

    #[test]
    fn rejects_short_records_and_mismatched_buffers() {
        let k = kernel(1.0, 0.05, 0.01);
        let mut out = [0.0f64; 1];
        let (mut v, mut d) = ([0.0f64; 1], [0.0f64; 1]);
        assert_eq!(
            k.run_into(&[1.0], &mut out, &mut v, &mut d),
            Err(ExecInvariantViolation::Config(ConfigError::EmptyInput { arg: "acc" }))
        );

        let mut sacc = [0.0f64; 3];
        let mut svel = [0.0f64; 3];
        let mut sdis = [0.0f64; 2];
        assert_eq!(
            k.run_into(&[0.0, 1.0, 0.0], &mut sacc, &mut svel, &mut sdis),
            Err(ExecInvariantViolation::LengthMismatch {
                arg: "sdis",
                expected: 3,
                got: 2,
            })
        );
    }

    #[test]
    fn rejects_non_increasing_times() {
        assert_eq!(
            OscillatorConfig::from_times(&[0.0f64], 1.0, 0.05),
            Err(ConfigError::EmptyInput { arg: "times" })
        );
        assert_eq!(
            OscillatorConfig::from_times(&[0.1f64, 0.1, 0.2], 1.0, 0.05),
            Err(ConfigError::InvalidArgument {
                arg: "times",
                reason: "sample times must be strictly increasing",
            })
        );
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn ndarray_buffers_are_accepted() {
        use ndarray::Array1;

        let acc = Array1::from(vec![0.0f64, 1.0, 1.0, 0.0]);
        let mut sacc = Array1::zeros(4);
        let mut svel = Array1::zeros(4);
        let mut sdis = Array1::zeros(4);
        let k = kernel(1.0, 0.05, 0.01);
        k.run_into(&acc, &mut sacc, &mut svel, &mut sdis)
            .expect("ndarray run");
        let expected = k.run_alloc(&acc).expect("alloc run");
        assert_eq!(sacc.to_vec(), expected.acceleration);
        assert_eq!(svel.to_vec(), expected.velocity);
        assert_eq!(sdis.to_vec(), expected.displacement);
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn runs_in_single_precision() {
        let k = OscillatorKernel::try_new(OscillatorConfig {
            period: 1.0f32,
            damping: 0.05,
            dt: 0.01,
            subsampling: Subsampling::None,
        })
        .expect("f32 kernel");
        let response = k.run_alloc(&[0.0f32, 1.0, 1.0, 0.0]).expect("run");
        assert_relative_eq!(response.acceleration[2], 0.024_133_66f32, max_relative = 1e-3);
        assert_relative_eq!(response.sampling_rate(), 100.0f32, max_relative = 1e-6);
    }
}
