use alloc::string::{String, ToString};
use core::{error, fmt};

use crate::kernel::{ConfigError, ExecInvariantViolation};

/// Errors raised by the checked free functions of gm-rs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An argument passed into a function was invalid.
    InvalidArg {
        /// The invalid arg
        arg: String,
        /// Explaining why arg is invalid.
        reason: String,
    },
    /// A validated kernel refused to run on the supplied buffers.
    ExecInvariantViolation {
        /// Why execution could not proceed.
        reason: String,
    },
}

/// Result alias for the checked free functions.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArg { arg, reason } => {
                write!(f, "Invalid argument `{arg}`: {reason}")
            }
            Error::ExecInvariantViolation { reason } => {
                write!(f, "Execution invariant violation: {reason}")
            }
        }
    }
}

impl error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(value: ConfigError) -> Self {
        match value {
            ConfigError::InvalidArgument { arg, reason } => Error::InvalidArg {
                arg: arg.into(),
                reason: reason.into(),
            },
            ConfigError::EmptyInput { arg }
            | ConfigError::NonContiguous { arg }
            | ConfigError::LengthMismatch { arg, .. } => Error::InvalidArg {
                arg: arg.into(),
                reason: value.to_string(),
            },
        }
    }
}

impl From<ExecInvariantViolation> for Error {
    fn from(value: ExecInvariantViolation) -> Self {
        match value {
            ExecInvariantViolation::Config(err) => err.into(),
            other => Error::ExecInvariantViolation {
                reason: other.to_string(),
            },
        }
    }
}
