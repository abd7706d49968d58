//! Synchronous capability checks.

use crate::Policy;
use crate::context::ContextManager;
use crate::error::{ErrorKind, ProviderCode};

/// Why a probe reported the policy as unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ProbeError {
    /// No usable context: the provider refused a session, or the context was invalidated.
    #[error("no authentication context available")]
    NoContext,
    /// No biometric hardware is present or usable.
    #[error("biometric hardware not available")]
    BiometryNotAvailable,
    /// Hardware is present but no identity is enrolled.
    #[error("no biometric identity enrolled")]
    BiometryNotEnrolled,
    /// No device passcode is configured.
    #[error("device passcode not set")]
    PasscodeNotSet,
    /// Biometrics are locked out after repeated failures.
    #[error("biometrics locked out")]
    BiometryLockout,
    /// Any other reason the provider gave.
    #[error("{0}")]
    Other(ErrorKind),
}

impl ProbeError {
    /// Classifies a provider code returned by a capability check.
    #[must_use]
    pub const fn from_code(code: ProviderCode) -> Self {
        match ErrorKind::from_code(code) {
            ErrorKind::BiometryNotAvailable => Self::BiometryNotAvailable,
            ErrorKind::BiometryNotEnrolled => Self::BiometryNotEnrolled,
            ErrorKind::PasscodeNotSet => Self::PasscodeNotSet,
            ErrorKind::BiometryLockout => Self::BiometryLockout,
            ErrorKind::InvalidContext => Self::NoContext,
            other => Self::Other(other),
        }
    }
}

impl From<ProbeError> for ErrorKind {
    fn from(error: ProbeError) -> Self {
        match error {
            ProbeError::NoContext => Self::InvalidContext,
            ProbeError::BiometryNotAvailable => Self::BiometryNotAvailable,
            ProbeError::BiometryNotEnrolled => Self::BiometryNotEnrolled,
            ProbeError::PasscodeNotSet => Self::PasscodeNotSet,
            ProbeError::BiometryLockout => Self::BiometryLockout,
            ProbeError::Other(kind) => kind,
        }
    }
}

/// Outcome of a capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability {
    reason: Option<ProbeError>,
}

impl Capability {
    /// The policy can be evaluated.
    pub const AVAILABLE: Self = Self { reason: None };

    /// The policy cannot be evaluated, for `reason`.
    #[must_use]
    pub const fn unavailable(reason: ProbeError) -> Self {
        Self {
            reason: Some(reason),
        }
    }

    /// Whether the policy can be evaluated.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.reason.is_none()
    }

    /// Why the policy cannot be evaluated. `None` when available.
    #[must_use]
    pub const fn reason(&self) -> Option<ProbeError> {
        self.reason
    }
}

/// Asks the provider whether `policy` could be evaluated on the current context.
///
/// Opens the context if needed but never prompts and never caches: every call
/// reflects the device state at that moment.
pub(crate) fn probe(contexts: &ContextManager, policy: Policy) -> Capability {
    let Some(context) = contexts.get() else {
        return Capability::unavailable(ProbeError::NoContext);
    };
    if context.is_invalidated() {
        return Capability::unavailable(ProbeError::NoContext);
    }

    match context.session().can_evaluate(policy) {
        Ok(()) => Capability::AVAILABLE,
        Err(code) => Capability::unavailable(ProbeError::from_code(code)),
    }
}
