//! Trait interfaces for the ground-motion kernels.
//!
//! Each capability has a `run_into` entrypoint that writes into caller
//! buffers without allocating, and an allocating `run_alloc` convenience.

use crate::kernel::{ExecInvariantViolation, Read1D, Write1D};

#[cfg(feature = "alloc")]
use crate::response::OscillatorResponse;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

/// SDOF oscillator response to a uniformly sampled acceleration record.
pub trait OscillatorResponse1D<T> {
    /// Integrate `acc` into caller-provided acceleration, velocity and
    /// displacement buffers, each as long as `acc`.
    ///
    /// Indices `0..acc.len() - 1` are written. The last index is left as the
    /// caller supplied it.
    fn run_into<I, A, V, D>(
        &self,
        acc: &I,
        sacc: &mut A,
        svel: &mut V,
        sdis: &mut D,
    ) -> Result<(), ExecInvariantViolation>
    where
        I: Read1D<T> + ?Sized,
        A: Write1D<T> + ?Sized,
        V: Write1D<T> + ?Sized,
        D: Write1D<T> + ?Sized;

    /// Integrate `acc` and allocate the response. The last index is zero.
    #[cfg(feature = "alloc")]
    fn run_alloc<I>(&self, acc: &I) -> Result<OscillatorResponse<T>, ExecInvariantViolation>
    where
        I: Read1D<T> + ?Sized;
}

/// Spectral smoothing of an amplitude spectrum onto a target frequency grid.
pub trait SpectrumSmooth1D<T> {
    /// Smooth `spec`, sampled at `freqs`, onto `ko_freqs` writing one value
    /// per target frequency into `out`.
    fn run_into<S, Fq, K, O>(
        &self,
        spec: &S,
        freqs: &Fq,
        ko_freqs: &K,
        out: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        S: Read1D<T> + ?Sized,
        Fq: Read1D<T> + ?Sized,
        K: Read1D<T> + ?Sized,
        O: Write1D<T> + ?Sized;

    /// Smooth `spec` onto `ko_freqs` and allocate the output.
    #[cfg(feature = "alloc")]
    fn run_alloc<S, Fq, K>(
        &self,
        spec: &S,
        freqs: &Fq,
        ko_freqs: &K,
    ) -> Result<Vec<T>, ExecInvariantViolation>
    where
        S: Read1D<T> + ?Sized,
        Fq: Read1D<T> + ?Sized,
        K: Read1D<T> + ?Sized;
}
