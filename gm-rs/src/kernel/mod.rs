//! Shared kernel substrate.
//!
//! Constructor validation, 1D buffer adapters and the error types used by
//! the oscillator and smoothing kernels.

mod errors;
mod io;
mod lifecycle;

pub use errors::*;
pub use io::*;
pub use lifecycle::*;

pub(crate) use errors::ensure_len;
pub(crate) use lifecycle::require_positive;
