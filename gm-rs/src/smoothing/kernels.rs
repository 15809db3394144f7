//! Trait-first kernel for Konno-Ohmachi spectral smoothing.

use crate::kernel::{
    ensure_len, require_positive, ConfigError, ExecInvariantViolation, KernelLifecycle, Read1D,
    Write1D,
};
use crate::traits::SpectrumSmooth1D;
use core::ops::Range;
use nalgebra::RealField;

#[cfg(feature = "alloc")]
use alloc::{vec, vec::Vec};

/// Frequencies below this many Hz are treated as zero.
pub const FREQ_EPSILON: f64 = 1e-6;

/// Constructor config for [`KonnoOhmachiKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KonnoOhmachiConfig<F>
where
    F: RealField + Copy,
{
    /// Window bandwidth coefficient `b`, `> 0`. Larger values give
    /// narrower windows.
    pub bandwidth: F,
    /// The spectrum frequencies are non-decreasing.
    ///
    /// When set, each target frequency only visits the contiguous run of
    /// frequencies inside its window. The result is identical to the full
    /// scan; unsorted input is rejected at run time.
    pub sorted_freqs: bool,
}

/// Konno and Ohmachi (1998) log-frequency smoothing window,
/// `(sin(b log10(f/fc)) / (b log10(f/fc)))^4`.
///
/// The window is truncated to `fc * 10^(-3/b) <= f <= fc * 10^(3/b)`, past
/// which its contribution is negligible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KonnoOhmachiKernel<F>
where
    F: RealField + Copy,
{
    bandwidth: F,
    max_ratio: F,
    min_ratio: F,
    sorted_freqs: bool,
}

impl<F> KonnoOhmachiKernel<F>
where
    F: RealField + Copy,
{
    /// Return configured bandwidth.
    pub fn bandwidth(&self) -> F {
        self.bandwidth
    }

    /// Upper bound of `f / fc` inside the window.
    pub fn max_ratio(&self) -> F {
        self.max_ratio
    }

    /// Lower bound of `f / fc` inside the window.
    pub fn min_ratio(&self) -> F {
        self.min_ratio
    }

    /// Window weight of `freq` for a window centred on `fc`.
    ///
    /// Zero outside the truncated support or when either frequency is
    /// below [`FREQ_EPSILON`].
    pub fn weight(&self, freq: F, fc: F) -> F {
        if fc < epsilon() {
            return F::zero();
        }
        self.window(freq, fc).unwrap_or_else(F::zero)
    }

    fn window(&self, freq: F, fc: F) -> Option<F> {
        let eps = epsilon::<F>();
        let frat = freq / fc;
        if freq < eps || frat > self.max_ratio || frat < self.min_ratio {
            return None;
        }
        if (freq - fc).abs() < eps {
            // sin(x)/x -> 1
            return Some(F::one());
        }
        let x = self.bandwidth * frat.log10();
        let w = x.sin() / x;
        let w = w * w;
        Some(w * w)
    }

    /// Indices of `freqs` that can fall inside the window around `fc`.
    fn candidates(&self, freqs: &[F], fc: F) -> Range<usize> {
        if !self.sorted_freqs {
            return 0..freqs.len();
        }
        let start = freqs.partition_point(|f| *f / fc < self.min_ratio);
        let len = freqs[start..].partition_point(|f| *f / fc <= self.max_ratio);
        start..start + len
    }

    fn smooth_at(&self, spec: &[F], freqs: &[F], fc: F) -> F {
        if fc < epsilon() {
            return undefined();
        }
        let mut total = F::zero();
        let mut window_total = F::zero();
        for j in self.candidates(freqs, fc) {
            if let Some(w) = self.window(freqs[j], fc) {
                total += w * spec[j];
                window_total += w;
            }
        }
        if window_total > F::zero() {
            total / window_total
        } else {
            undefined()
        }
    }

    fn check_inputs(&self, spec: &[F], freqs: &[F]) -> Result<(), ExecInvariantViolation> {
        ensure_len("spec", freqs.len(), spec.len())?;
        if self.sorted_freqs && !freqs.windows(2).all(|w| w[0] <= w[1]) {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "freqs must be non-decreasing when sorted_freqs is set",
            });
        }
        Ok(())
    }
}

fn epsilon<F: RealField + Copy>() -> F {
    nalgebra::convert::<f64, F>(FREQ_EPSILON)
}

fn undefined<F: RealField + Copy>() -> F {
    nalgebra::convert::<f64, F>(f64::NAN)
}

impl<F> KernelLifecycle for KonnoOhmachiKernel<F>
where
    F: RealField + Copy,
{
    type Config = KonnoOhmachiConfig<F>;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        let bandwidth = require_positive(
            config.bandwidth,
            "bandwidth",
            "bandwidth must be finite and > 0",
        )?;
        let three = nalgebra::convert::<f64, F>(3.0);
        let ten = nalgebra::convert::<f64, F>(10.0);
        let max_ratio = ten.powf(three / bandwidth);
        let min_ratio = F::one() / max_ratio;
        log::debug!(
            "konno-ohmachi: bandwidth={bandwidth} ratio bounds=[{min_ratio}, {max_ratio}]"
        );
        Ok(Self {
            bandwidth,
            max_ratio,
            min_ratio,
            sorted_freqs: config.sorted_freqs,
        })
    }
}

impl<F> SpectrumSmooth1D<F> for KonnoOhmachiKernel<F>
where
    F: RealField + Copy,
{
    fn run_into<S, Fq, K, O>(
        &self,
        spec: &S,
        freqs: &Fq,
        ko_freqs: &K,
        out: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        S: Read1D<F> + ?Sized,
        Fq: Read1D<F> + ?Sized,
        K: Read1D<F> + ?Sized,
        O: Write1D<F> + ?Sized,
    {
        let spec = spec.read_slice()?;
        let freqs = freqs.read_slice()?;
        let ko_freqs = ko_freqs.read_slice()?;
        let out = out.write_slice_mut()?;
        self.check_inputs(spec, freqs)?;
        ensure_len("out", ko_freqs.len(), out.len())?;
        log::trace!(
            "konno-ohmachi: {} spectrum samples onto {} target frequencies",
            spec.len(),
            ko_freqs.len()
        );

        out.iter_mut()
            .zip(ko_freqs.iter())
            .for_each(|(out, fc)| *out = self.smooth_at(spec, freqs, *fc));
        Ok(())
    }

    #[cfg(feature = "alloc")]
    fn run_alloc<S, Fq, K>(
        &self,
        spec: &S,
        freqs: &Fq,
        ko_freqs: &K,
    ) -> Result<Vec<F>, ExecInvariantViolation>
    where
        S: Read1D<F> + ?Sized,
        Fq: Read1D<F> + ?Sized,
        K: Read1D<F> + ?Sized,
    {
        let mut out = vec![F::zero(); ko_freqs.read_slice()?.len()];
        self.run_into(spec, freqs, ko_freqs, &mut out)?;
        Ok(out)
    }
}
