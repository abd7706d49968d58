//! Provider error codes and the closed [`ErrorKind`] taxonomy.

use std::fmt;

/// Raw error code reported by an authentication provider.
///
/// The documented set mirrors `LAError.Code` from Apple's `LocalAuthentication`.
/// Other backends translate their native results into this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderCode(pub i64);

impl ProviderCode {
    /// The presented credentials did not match.
    pub const AUTHENTICATION_FAILED: Self = Self(-1);
    /// The user tapped cancel.
    pub const USER_CANCEL: Self = Self(-2);
    /// The user asked for the fallback mechanism.
    pub const USER_FALLBACK: Self = Self(-3);
    /// The system dismissed the prompt (e.g. another app came forward).
    pub const SYSTEM_CANCEL: Self = Self(-4);
    /// No device passcode is configured.
    pub const PASSCODE_NOT_SET: Self = Self(-5);
    /// Biometric hardware is absent or unusable.
    pub const BIOMETRY_NOT_AVAILABLE: Self = Self(-6);
    /// Hardware is present but no identity is enrolled.
    pub const BIOMETRY_NOT_ENROLLED: Self = Self(-7);
    /// Too many failed attempts.
    pub const BIOMETRY_LOCKOUT: Self = Self(-8);
    /// The application cancelled the prompt.
    pub const APP_CANCEL: Self = Self(-9);
    /// The session was invalidated before or during evaluation.
    pub const INVALID_CONTEXT: Self = Self(-10);
    /// A paired watch was required but is not available.
    pub const WATCH_NOT_AVAILABLE: Self = Self(-11);
    /// A removable biometric accessory is not paired.
    pub const BIOMETRY_NOT_PAIRED: Self = Self(-12);
    /// A removable biometric accessory is disconnected.
    pub const BIOMETRY_DISCONNECTED: Self = Self(-13);
    /// Presenting UI is not allowed in the current context.
    pub const NOT_INTERACTIVE: Self = Self(-1004);

    /// Every code the provider documents.
    pub const DOCUMENTED: [Self; 14] = [
        Self::AUTHENTICATION_FAILED,
        Self::USER_CANCEL,
        Self::USER_FALLBACK,
        Self::SYSTEM_CANCEL,
        Self::PASSCODE_NOT_SET,
        Self::BIOMETRY_NOT_AVAILABLE,
        Self::BIOMETRY_NOT_ENROLLED,
        Self::BIOMETRY_LOCKOUT,
        Self::APP_CANCEL,
        Self::INVALID_CONTEXT,
        Self::WATCH_NOT_AVAILABLE,
        Self::BIOMETRY_NOT_PAIRED,
        Self::BIOMETRY_DISCONNECTED,
        Self::NOT_INTERACTIVE,
    ];

    /// Returns the raw integer value.
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProviderCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider code {}", self.0)
    }
}

/// Why an authentication attempt did not succeed.
///
/// The set is closed: every provider code lands on exactly one variant and
/// anything unrecognised lands on [`ErrorKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credentials presented did not match.
    AuthenticationFailed,
    /// The user aborted the prompt.
    UserCancel,
    /// The application aborted the prompt.
    AppCancel,
    /// The system aborted the prompt.
    SystemCancel,
    /// The user requested a fallback that this policy does not offer.
    UserFallback,
    /// No device passcode is configured.
    PasscodeNotSet,
    /// No biometric hardware is present or usable.
    BiometryNotAvailable,
    /// Hardware is present but no identity is enrolled.
    BiometryNotEnrolled,
    /// Too many failed attempts; the user has to unlock through the OS.
    BiometryLockout,
    /// The context is absent or was invalidated. Call `reset` before retrying.
    InvalidContext,
    /// Presenting UI is forbidden in the current execution context.
    NotInteractive,
    /// Another evaluation is already pending on the same context.
    AlreadyInProgress,
    /// Any code not covered above.
    Unknown,
}

impl ErrorKind {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::AuthenticationFailed,
        Self::UserCancel,
        Self::AppCancel,
        Self::SystemCancel,
        Self::UserFallback,
        Self::PasscodeNotSet,
        Self::BiometryNotAvailable,
        Self::BiometryNotEnrolled,
        Self::BiometryLockout,
        Self::InvalidContext,
        Self::NotInteractive,
        Self::AlreadyInProgress,
        Self::Unknown,
    ];

    /// Maps a provider code onto the taxonomy. Never fails.
    #[must_use]
    pub const fn from_code(code: ProviderCode) -> Self {
        match code {
            ProviderCode::AUTHENTICATION_FAILED => Self::AuthenticationFailed,
            ProviderCode::USER_CANCEL => Self::UserCancel,
            ProviderCode::USER_FALLBACK => Self::UserFallback,
            ProviderCode::SYSTEM_CANCEL => Self::SystemCancel,
            ProviderCode::PASSCODE_NOT_SET => Self::PasscodeNotSet,
            ProviderCode::BIOMETRY_NOT_AVAILABLE
            | ProviderCode::WATCH_NOT_AVAILABLE
            | ProviderCode::BIOMETRY_NOT_PAIRED
            | ProviderCode::BIOMETRY_DISCONNECTED => Self::BiometryNotAvailable,
            ProviderCode::BIOMETRY_NOT_ENROLLED => Self::BiometryNotEnrolled,
            ProviderCode::BIOMETRY_LOCKOUT => Self::BiometryLockout,
            ProviderCode::APP_CANCEL => Self::AppCancel,
            ProviderCode::INVALID_CONTEXT => Self::InvalidContext,
            ProviderCode::NOT_INTERACTIVE => Self::NotInteractive,
            _ => Self::Unknown,
        }
    }

    /// The canonical provider code for this kind, if it has one.
    ///
    /// `AlreadyInProgress` is raised locally and `Unknown` has no single code.
    #[must_use]
    pub const fn code(self) -> Option<ProviderCode> {
        match self {
            Self::AuthenticationFailed => Some(ProviderCode::AUTHENTICATION_FAILED),
            Self::UserCancel => Some(ProviderCode::USER_CANCEL),
            Self::AppCancel => Some(ProviderCode::APP_CANCEL),
            Self::SystemCancel => Some(ProviderCode::SYSTEM_CANCEL),
            Self::UserFallback => Some(ProviderCode::USER_FALLBACK),
            Self::PasscodeNotSet => Some(ProviderCode::PASSCODE_NOT_SET),
            Self::BiometryNotAvailable => Some(ProviderCode::BIOMETRY_NOT_AVAILABLE),
            Self::BiometryNotEnrolled => Some(ProviderCode::BIOMETRY_NOT_ENROLLED),
            Self::BiometryLockout => Some(ProviderCode::BIOMETRY_LOCKOUT),
            Self::InvalidContext => Some(ProviderCode::INVALID_CONTEXT),
            Self::NotInteractive => Some(ProviderCode::NOT_INTERACTIVE),
            Self::AlreadyInProgress | Self::Unknown => None,
        }
    }

    /// Human-readable message for this kind.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "Authentication failed",
            Self::UserCancel => "User canceled",
            Self::AppCancel => "App canceled",
            Self::SystemCancel => "System canceled",
            Self::UserFallback => "User fallback",
            Self::PasscodeNotSet => "Please go to Settings and turn on a passcode",
            Self::BiometryNotAvailable => "Touch ID or Face ID not available",
            Self::BiometryNotEnrolled => "Touch ID or Face ID not enrolled",
            Self::BiometryLockout => {
                "Touch ID or Face ID locked out, go to Settings and turn on a passcode"
            }
            Self::InvalidContext => "Invalid context",
            Self::NotInteractive => "Not interactive",
            Self::AlreadyInProgress => "Authentication already in progress",
            Self::Unknown => "Unknown error",
        }
    }

    /// Whether the context that produced this failure can no longer be used.
    #[must_use]
    pub const fn invalidates_context(self) -> bool {
        matches!(self, Self::InvalidContext)
    }
}

impl From<ProviderCode> for ErrorKind {
    fn from(code: ProviderCode) -> Self {
        Self::from_code(code)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ErrorKind {}

/// Formats the text shown when a user did not get through authentication.
#[must_use]
pub fn failure_summary(kind: ErrorKind) -> String {
    format!("User did not authenticate successfully\n{}", kind.message())
}
