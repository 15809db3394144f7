//! Response of a single-degree-of-freedom oscillator to base acceleration.
//!
//! The recursion is the exact solution for an acceleration that varies
//! linearly between samples (Nigam and Jennings, 1969, as implemented in
//! Boore's `icmpmx`). It is a strict left-to-right fold over the record.
//! Input records should be sampled with `dt <= period / 10`; see Boore and
//! Goulet (2014), Bull Earthquake Eng 12:203-216.

use crate::kernel::ConfigError;
use nalgebra::RealField;

mod kernels;
pub use kernels::*;

#[cfg(feature = "alloc")]
use crate::error::Result;
#[cfg(feature = "alloc")]
use crate::kernel::{KernelLifecycle, Read1D};
#[cfg(feature = "alloc")]
use crate::traits::OscillatorResponse1D;

/// Compute the acceleration, velocity and displacement response of an
/// oscillator with natural `period` and `damping` to `acc` sampled at `dt`.
///
/// No resampling is done. The last sample of each series is zero.
///
/// # Errors
/// Fails when `period <= 0`, `damping` is outside `[0, 1)`, `dt <= 0` or
/// `acc` has fewer than two samples.
///
/// # Examples
/// ```
/// use gm_rs::response::calculate_spectrals;
///
/// let response = calculate_spectrals(&[0.0, 1.0, 1.0, 0.0], 0.01, 1.0, 0.05).unwrap();
/// assert_eq!(response.len(), 4);
/// assert_eq!(response.acceleration[3], 0.0);
/// ```
#[cfg(feature = "alloc")]
pub fn calculate_spectrals<F, I>(
    acc: &I,
    dt: F,
    period: F,
    damping: F,
) -> Result<OscillatorResponse<F>>
where
    F: RealField + Copy,
    I: Read1D<F> + ?Sized,
{
    let kernel = OscillatorKernel::try_new(OscillatorConfig {
        period,
        damping,
        dt,
        subsampling: Subsampling::None,
    })?;
    Ok(kernel.run_alloc(acc)?)
}

/// Compute the oscillator response of a record described by its sample
/// `times`, splitting each interval into substeps.
///
/// Only the state after the first substep of every interval is kept, so
/// the output has the length and time base of the input. See
/// [`Subsampling::FirstSubstep`].
#[cfg(feature = "alloc")]
pub fn calculate_spectrals_from_times<F>(
    times: &[F],
    acc: &[F],
    period: F,
    damping: F,
) -> Result<OscillatorResponse<F>>
where
    F: RealField + Copy,
{
    if times.len() != acc.len() {
        return Err(ConfigError::LengthMismatch {
            arg: "times",
            expected: acc.len(),
            got: times.len(),
        }
        .into());
    }
    let kernel = OscillatorKernel::try_new(OscillatorConfig::from_times(times, period, damping)?)?;
    Ok(kernel.run_alloc(acc)?)
}

/// Number of substeps an interval `dt` must be split into for the
/// recursion to resolve `period`.
///
/// A result above one means the record should be resampled to
/// `dt / substep_count(dt, period)` before calling [`calculate_spectrals`].
pub fn substep_count<F>(dt: F, period: F) -> core::result::Result<usize, ConfigError>
where
    F: RealField + Copy,
{
    let dt = crate::kernel::require_positive(dt, "dt", "dt must be finite and > 0")?;
    let period =
        crate::kernel::require_positive(period, "period", "period must be finite and > 0")?;
    nalgebra::try_convert::<F, f64>(substep_factor(dt, period))
        .map(|ns| ns as usize)
        .ok_or(ConfigError::InvalidArgument {
            arg: "dt",
            reason: "substep count is not representable",
        })
}

/// Peak absolute acceleration response, the spectral acceleration of `acc`
/// at `period` and `damping`.
#[cfg(feature = "alloc")]
pub fn spectral_acceleration<F, I>(acc: &I, dt: F, period: F, damping: F) -> Result<F>
where
    F: RealField + Copy,
    I: Read1D<F> + ?Sized,
{
    Ok(calculate_spectrals(acc, dt, period, damping)?.peak_acceleration())
}
