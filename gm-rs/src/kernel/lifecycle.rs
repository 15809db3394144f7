use super::ConfigError;

/// Constructor validation shared by the kernel structs.
///
/// Every physical parameter is checked once here so the numeric loops can
/// run without further branching on configuration.
pub trait KernelLifecycle: Sized {
    /// Kernel config type.
    type Config;

    /// Construct a validated kernel from config.
    fn try_new(config: Self::Config) -> Result<Self, ConfigError>;
}

/// Require `value` to be finite and strictly positive.
pub(crate) fn require_positive<F>(
    value: F,
    arg: &'static str,
    reason: &'static str,
) -> Result<F, ConfigError>
where
    F: nalgebra::RealField + Copy,
{
    if value.is_finite() && value > F::zero() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidArgument { arg, reason })
    }
}
