use core::fmt;

/// Validation errors raised when a kernel is built from its config or when
/// a buffer adapter is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required input sequence is empty or too short to use.
    EmptyInput {
        /// Name of the argument.
        arg: &'static str,
    },
    /// A physical parameter is outside its admissible range.
    InvalidArgument {
        /// Name of the argument.
        arg: &'static str,
        /// Human readable reason.
        reason: &'static str,
    },
    /// A contiguous 1D slice view could not be obtained.
    NonContiguous {
        /// Name of the argument that is non-contiguous.
        arg: &'static str,
    },
    /// Two sequences that must be parallel have different lengths.
    LengthMismatch {
        /// Name of the argument.
        arg: &'static str,
        /// Required length.
        expected: usize,
        /// Received length.
        got: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyInput { arg } => {
                write!(f, "Input `{arg}` does not hold enough samples.")
            }
            ConfigError::InvalidArgument { arg, reason } => {
                write!(f, "Invalid argument `{arg}`: {reason}")
            }
            ConfigError::NonContiguous { arg } => {
                write!(f, "Argument `{arg}` is not contiguous in memory.")
            }
            ConfigError::LengthMismatch { arg, expected, got } => {
                write!(
                    f,
                    "Length mismatch on `{arg}`. Expected {expected}, got {got}."
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Violations detected while running an already validated kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecInvariantViolation {
    /// The input cannot be processed by this kernel.
    InvalidState {
        /// Human readable reason.
        reason: &'static str,
    },
    /// A caller buffer does not have the length the run requires.
    LengthMismatch {
        /// Name of the argument.
        arg: &'static str,
        /// Required length.
        expected: usize,
        /// Received length.
        got: usize,
    },
    /// Adapter binding failure.
    Config(ConfigError),
}

impl From<ConfigError> for ExecInvariantViolation {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl fmt::Display for ExecInvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecInvariantViolation::InvalidState { reason } => {
                write!(f, "Execution invariant violation: {reason}")
            }
            ExecInvariantViolation::LengthMismatch { arg, expected, got } => {
                write!(
                    f,
                    "Buffer `{arg}` has {got} samples, the run needs {expected}."
                )
            }
            ExecInvariantViolation::Config(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ExecInvariantViolation {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecInvariantViolation::Config(err) => Some(err),
            _ => None,
        }
    }
}

/// Fail with [`ExecInvariantViolation::LengthMismatch`] unless `got == expected`.
pub(crate) fn ensure_len(
    arg: &'static str,
    expected: usize,
    got: usize,
) -> Result<(), ExecInvariantViolation> {
    if got != expected {
        return Err(ExecInvariantViolation::LengthMismatch { arg, expected, got });
    }
    Ok(())
}
