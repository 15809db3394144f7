//! Numerical kernels for earthquake ground-motion processing.
//!
//! - [`response`]: acceleration, velocity and displacement response of a
//!   damped single-degree-of-freedom oscillator to a base acceleration record.
//! - [`smoothing`]: Konno-Ohmachi smoothing of Fourier amplitude spectra.
//!
//! Kernels are built once from a validated config through
//! [`kernel::KernelLifecycle::try_new`] and run any number of times through
//! the capability traits in [`traits`]. The free functions in each module
//! wrap that lifecycle for one-shot use.
//!
//! The crate is `no_std`. The `alloc` feature (on by default) enables the
//! allocating entrypoints and `ndarray` buffers; `std` adds `std::error::Error`
//! support.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

/// Crate-level error type for the one-shot entrypoints.
#[cfg(feature = "alloc")]
pub mod error;

/// Kernel lifecycle, buffer adapters and kernel errors.
pub mod kernel;

pub mod response;

pub mod smoothing;

pub mod traits;
