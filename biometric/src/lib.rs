//! Biometric authentication controller.
//!
//! Gates an action behind device-local biometric (or passcode fallback)
//! verification. An [`AuthController`] owns one provider session, probes its
//! capability, runs at most one evaluation at a time and reports failures
//! through the closed [`ErrorKind`] taxonomy.
//!
//! Platform backends live in [`sys`]: `LocalAuthentication` on iOS and macOS,
//! `UserConsentVerifier` on Windows. Other targets get a backend that reports
//! biometrics as unavailable.
//!
//! ```no_run
//! use bioauth_biometric::{AuthController, Policy};
//!
//! async fn unlock() {
//!     let controller = AuthController::platform();
//!     if controller.check_availability(Policy::BiometricsOnly) {
//!         match controller.authenticate("Unlock your vault").await {
//!             Ok(success) => println!("{}", success.message()),
//!             Err(kind) => println!("{kind}"),
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]

mod authenticator;
pub mod config;
mod context;
mod controller;
mod error;
mod probe;
pub mod provider;
/// Platform-specific implementations.
pub mod sys;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use serde::{Deserialize, Serialize};

pub use authenticator::{AuthSuccess, AuthenticationOutcome, SUCCESS_MESSAGE};
pub use config::{AuthConfig, ConfigError};
pub use context::{AuthenticationContext, ContextId, ContextManager};
pub use controller::AuthController;
pub use error::{ErrorKind, ProviderCode, failure_summary};
pub use probe::{Capability, ProbeError};
pub use provider::{AuthProvider, EvaluationReply, ProviderSession};

/// Which credentials satisfy an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Only a biometric match is accepted.
    BiometricsOnly,
    /// A biometric match, or the device passcode as fallback.
    BiometricsOrPasscode,
}

/// The biometric modality a device offers. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BiometryKind {
    /// Fingerprint (`TouchID`).
    Touch,
    /// Facial recognition (`FaceID`).
    Face,
    /// No usable biometric modality.
    #[default]
    None,
}

impl BiometryKind {
    /// Label suitable for prompt copy and iconography.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Touch => "Touch ID",
            Self::Face => "Face ID",
            Self::None => "Biometrics not supported",
        }
    }
}
