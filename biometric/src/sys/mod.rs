use std::sync::Arc;

use crate::provider::AuthProvider;

#[cfg(any(target_os = "ios", target_os = "macos"))]
pub mod apple;
#[cfg(any(target_os = "ios", target_os = "macos"))]
pub use self::apple::AppleProvider as PlatformProvider;

#[cfg(target_os = "windows")]
pub mod windows;
#[cfg(target_os = "windows")]
pub use self::windows::WindowsProvider as PlatformProvider;

/// Fallback for targets without a biometric backend.
#[cfg(not(any(target_os = "ios", target_os = "macos", target_os = "windows")))]
pub mod stub {
    use crate::error::ProviderCode;
    use crate::provider::{AuthProvider, EvaluationReply, ProviderSession};
    use crate::{BiometryKind, Policy};

    /// Provider for platforms without a biometric backend.
    ///
    /// Sessions open, but every probe and evaluation reports
    /// `BiometryNotAvailable`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct UnsupportedProvider;

    struct UnsupportedSession;

    impl AuthProvider for UnsupportedProvider {
        fn open_session(&self) -> Option<Box<dyn ProviderSession>> {
            Some(Box::new(UnsupportedSession))
        }
    }

    impl ProviderSession for UnsupportedSession {
        fn can_evaluate(&self, _policy: Policy) -> Result<(), ProviderCode> {
            Err(ProviderCode::BIOMETRY_NOT_AVAILABLE)
        }

        fn evaluate(&self, _policy: Policy, _reason: &str, reply: EvaluationReply) {
            reply.fail(ProviderCode::BIOMETRY_NOT_AVAILABLE);
        }

        fn biometry_kind(&self) -> BiometryKind {
            BiometryKind::None
        }
    }
}
#[cfg(not(any(target_os = "ios", target_os = "macos", target_os = "windows")))]
pub use self::stub::UnsupportedProvider as PlatformProvider;

/// The provider for the platform this crate was compiled for.
#[must_use]
pub fn platform_provider() -> Arc<dyn AuthProvider> {
    Arc::new(PlatformProvider::default())
}

#[cfg(all(
    test,
    not(any(target_os = "ios", target_os = "macos", target_os = "windows"))
))]
mod tests {
    use crate::{AuthController, ErrorKind, Policy, ProbeError};

    #[tokio::test]
    async fn unsupported_platform_never_prompts() {
        let controller = AuthController::platform();
        assert_eq!(
            controller.probe(Policy::BiometricsOrPasscode).reason(),
            Some(ProbeError::BiometryNotAvailable)
        );
        assert!(!controller.permit_and_auth().await);
        assert_eq!(
            controller.authenticate("Unlock").await.unwrap_err(),
            ErrorKind::BiometryNotAvailable
        );
    }
}
