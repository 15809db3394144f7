//! Konno-Ohmachi smoothing of Fourier amplitude spectra.
//!
//! Konno, K. and Ohmachi, T., 1998. Ground-motion characteristics estimated
//! from spectral ratio between horizontal and vertical components of
//! microtremor. Bulletin of the Seismological Society of America, 88(1),
//! pp.228-241.
//!
//! The window has a constant width in log frequency, so it averages over
//! more bins at high frequencies than at low ones.

use crate::kernel::{require_positive, ConfigError};

mod kernels;
pub use kernels::*;

#[cfg(feature = "alloc")]
use crate::error::Result;
#[cfg(feature = "alloc")]
use crate::kernel::{KernelLifecycle, Read1D};
#[cfg(feature = "alloc")]
use crate::traits::SpectrumSmooth1D;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;
#[cfg(feature = "alloc")]
use nalgebra::RealField;

/// Smooth `spec`, sampled at `freqs`, onto the frequencies `ko_freqs`.
///
/// Targets below [`FREQ_EPSILON`] and targets whose window contains no
/// spectrum sample are NaN.
///
/// # Examples
/// ```
/// use gm_rs::smoothing::konno_ohmachi_smooth;
///
/// let spec = [1.0_f64, 1.0, 1.0, 1.0, 1.0];
/// let freqs = [1.0, 2.0, 3.0, 4.0, 5.0];
/// let smoothed = konno_ohmachi_smooth(&spec, &freqs, &[3.0, 0.0], 20.0).unwrap();
/// assert!((smoothed[0] - 1.0).abs() < 1e-12);
/// assert!(smoothed[1].is_nan());
/// ```
#[cfg(feature = "alloc")]
pub fn konno_ohmachi_smooth<F, S, Fq, K>(
    spec: &S,
    freqs: &Fq,
    ko_freqs: &K,
    bandwidth: F,
) -> Result<Vec<F>>
where
    F: RealField + Copy,
    S: Read1D<F> + ?Sized,
    Fq: Read1D<F> + ?Sized,
    K: Read1D<F> + ?Sized,
{
    let kernel = KonnoOhmachiKernel::try_new(KonnoOhmachiConfig {
        bandwidth,
        sorted_freqs: false,
    })?;
    Ok(kernel.run_alloc(spec, freqs, ko_freqs)?)
}

/// Smoothed Fourier amplitude at the frequency `1 / period`.
///
/// NaN when the window around that frequency holds no spectrum sample.
#[cfg(feature = "alloc")]
pub fn smoothed_amplitude_at_period<F>(spec: &[F], freqs: &[F], period: F, bandwidth: F) -> Result<F>
where
    F: RealField + Copy,
{
    let period = require_positive(period, "period", "period must be finite and > 0")?;
    let fc = [F::one() / period];
    let smoothed = konno_ohmachi_smooth(spec, freqs, &fc, bandwidth)?;
    Ok(smoothed[0])
}

/// Smallest power of two that is `>= n` (one for `n == 0`), or `None` when
/// it does not fit in `usize`.
pub fn next_pow_2(n: usize) -> Option<usize> {
    n.max(1).checked_next_power_of_two()
}

/// FFT length for a record of `npts` samples whose amplitude spectrum will
/// be smoothed down to the frequency `1 / max_period`.
///
/// With `allow_nans` the record length is used as is. Otherwise the length
/// is raised to `nyquist / df`, where `df` is the width of the smoothing
/// window at `1 / max_period`. The result is always a power of two.
pub fn smoothing_nfft(
    npts: usize,
    sampling_rate: f64,
    max_period: f64,
    bandwidth: f64,
    allow_nans: bool,
) -> core::result::Result<usize, ConfigError> {
    if npts == 0 {
        return Err(ConfigError::EmptyInput { arg: "npts" });
    }
    let too_long = ConfigError::InvalidArgument {
        arg: "npts",
        reason: "FFT length does not fit in usize",
    };
    if allow_nans {
        return next_pow_2(npts).ok_or(too_long);
    }
    let sampling_rate = require_positive(
        sampling_rate,
        "sampling_rate",
        "sampling rate must be finite and > 0",
    )?;
    let max_period =
        require_positive(max_period, "max_period", "max_period must be finite and > 0")?;
    let bandwidth =
        require_positive(bandwidth, "bandwidth", "bandwidth must be finite and > 0")?;

    let nyquist = 0.5 * sampling_rate;
    let min_freq = 1.0 / max_period;
    let ratio = num_traits::Float::powf(10.0, 3.0 / bandwidth);
    let df = min_freq * ratio - min_freq / ratio;
    if !(df.is_finite() && df > 0.0) {
        return Err(ConfigError::InvalidArgument {
            arg: "bandwidth",
            reason: "bandwidth is too large to give a window width",
        });
    }
    let needed = num_traits::Float::ceil(nyquist / df);
    let largest = (1usize << (usize::BITS - 1)) as f64;
    if !(needed.is_finite() && needed <= largest) {
        return Err(too_long);
    }
    next_pow_2(npts.max(needed as usize)).ok_or(too_long)
}

/// Sample frequencies of a real FFT of length `n` with sample spacing `d`,
/// `[0, 1, ..., n/2] / (d * n)`.
#[cfg(feature = "alloc")]
pub fn rfftfreq<F>(n: usize, d: F) -> Vec<F>
where
    F: RealField + Copy,
{
    if n == 0 {
        return Vec::new();
    }
    let val = F::one() / (nalgebra::convert::<f64, F>(n as f64) * d);
    (0..=n / 2)
        .map(|i| nalgebra::convert::<f64, F>(i as f64) * val)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_pow_2_rounds_up() {
        assert_eq!(next_pow_2(0), Some(1));
        assert_eq!(next_pow_2(1), Some(1));
        assert_eq!(next_pow_2(1000), Some(1024));
        assert_eq!(next_pow_2(1024), Some(1024));
        assert_eq!(next_pow_2(1025), Some(2048));
        assert_eq!(next_pow_2(usize::MAX), None);
    }

    #[test]
    fn nfft_grows_for_long_periods() {
        assert_eq!(smoothing_nfft(1000, 100.0, 10.0, 20.0, false), Ok(1024));
        assert_eq!(smoothing_nfft(1000, 100.0, 100.0, 20.0, false), Ok(8192));
        assert_eq!(smoothing_nfft(1000, 100.0, 100.0, 20.0, true), Ok(1024));
    }

    #[test]
    fn nfft_validates_its_inputs() {
        assert_eq!(
            smoothing_nfft(0, 100.0, 10.0, 20.0, true),
            Err(ConfigError::EmptyInput { arg: "npts" })
        );
        assert_eq!(
            smoothing_nfft(1000, 100.0, 0.0, 20.0, false),
            Err(ConfigError::InvalidArgument {
                arg: "max_period",
                reason: "max_period must be finite and > 0",
            })
        );
    }

    #[test]
    fn nfft_rejects_lengths_it_cannot_represent() {
        assert_eq!(
            smoothing_nfft(1000, 100.0, 10.0, 1e17, false),
            Err(ConfigError::InvalidArgument {
                arg: "bandwidth",
                reason: "bandwidth is too large to give a window width",
            })
        );
        assert!(matches!(
            smoothing_nfft(1000, 1e300, 1e300, 20.0, false),
            Err(ConfigError::InvalidArgument { arg: "npts", .. })
        ));
        assert!(matches!(
            smoothing_nfft(usize::MAX, 100.0, 10.0, 20.0, true),
            Err(ConfigError::InvalidArgument { arg: "npts", .. })
        ));
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn rfftfreq_matches_numpy_layout() {
        use approx::assert_relative_eq;

        let freqs = rfftfreq(8, 0.1f64);
        let expected = [0.0, 1.25, 2.5, 3.75, 5.0];
        assert_eq!(freqs.len(), expected.len());
        for (a, b) in freqs.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
        assert_eq!(rfftfreq(9, 0.1f64).len(), 5);
        assert!(rfftfreq(0, 0.1f64).is_empty());
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn amplitude_at_period_smooths_at_the_inverse_frequency() {
        use approx::assert_relative_eq;

        let freqs = rfftfreq(1024, 0.01f64);
        let spec: Vec<f64> = freqs.iter().map(|f| 2.0 + (0.3 * f).cos()).collect();
        let at_period = smoothed_amplitude_at_period(&spec, &freqs, 0.5, 30.0).expect("fas");
        let direct = konno_ohmachi_smooth(&spec, &freqs, &[2.0], 30.0).expect("smooth");
        assert_relative_eq!(at_period, direct[0]);
        assert!(at_period > 1.0 && at_period < 3.0);

        assert!(smoothed_amplitude_at_period(&spec, &freqs, 0.0, 30.0).is_err());
        assert!(smoothed_amplitude_at_period(&spec, &freqs, 0.5, 0.0).is_err());
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn sparse_spectrum_leaves_gaps_undefined() {
        let spec = [3.0f64, 4.0];
        let freqs = [1.0, 10.0];
        let out = konno_ohmachi_smooth(&spec, &freqs, &[1.0, 3.0, 10.0], 40.0).expect("smooth");
        assert_eq!(out[0], 3.0);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 4.0);
    }
}
