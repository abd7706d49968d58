//! The authentication controller facade the application talks to.

use std::fmt;
use std::sync::Arc;

use log::warn;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::authenticator::{self, AuthenticationOutcome};
use crate::config::AuthConfig;
use crate::context::{AuthenticationContext, ContextManager};
use crate::probe::{self, Capability};
use crate::provider::AuthProvider;
use crate::{BiometryKind, Policy, sys};

/// Authentication controller owning exactly one provider context.
///
/// Construct one per consumer and pass it around; there is no global
/// instance. Probing is synchronous, evaluation is async and single-flight.
pub struct AuthController {
    contexts: ContextManager,
    config: AuthConfig,
    callbacks: Option<Handle>,
}

impl AuthController {
    /// Creates a controller over `provider` with the default configuration.
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self::with_config(provider, AuthConfig::default())
    }

    /// Creates a controller over `provider` with `config`.
    ///
    /// A blank configured reason is replaced by the default one.
    pub fn with_config(provider: Arc<dyn AuthProvider>, mut config: AuthConfig) -> Self {
        if config.validate().is_err() {
            warn!("configured reason is blank, using the default prompt");
            config.reason = AuthConfig::default().reason;
        }
        Self {
            contexts: ContextManager::new(provider),
            config,
            callbacks: None,
        }
    }

    /// Creates a controller over the backend for the current platform.
    #[must_use]
    pub fn platform() -> Self {
        Self::new(sys::platform_provider())
    }

    /// Delivers callback-style results on `handle`'s runtime.
    #[must_use]
    pub fn with_callback_handle(mut self, handle: Handle) -> Self {
        self.callbacks = Some(handle);
        self
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Returns the current context, opening one if needed.
    #[must_use]
    pub fn context(&self) -> Option<AuthenticationContext> {
        self.contexts.get()
    }

    /// Discards the current context so the next call negotiates a new one.
    ///
    /// Call this after a failure with `ErrorKind::InvalidContext`. A pending
    /// evaluation resolves with `InvalidContext` and its late result is dropped.
    pub fn reset(&self) {
        self.contexts.reset();
    }

    /// Invalidates the current context without replacing it, cancelling any
    /// pending prompt. Further calls fail with `InvalidContext` until [`reset`](Self::reset).
    pub fn invalidate(&self) {
        self.contexts.invalidate();
    }

    /// Probes whether `policy` can be evaluated right now. Never prompts.
    #[must_use]
    pub fn probe(&self, policy: Policy) -> Capability {
        probe::probe(&self.contexts, policy)
    }

    /// Shorthand for `probe(policy).is_available()`.
    #[must_use]
    pub fn check_availability(&self, policy: Policy) -> bool {
        self.probe(policy).is_available()
    }

    /// Whether biometrics alone can be evaluated.
    #[must_use]
    pub fn is_biometrics_available(&self) -> bool {
        self.check_availability(Policy::BiometricsOnly)
    }

    /// Whether biometrics or the device passcode can be evaluated.
    #[must_use]
    pub fn is_auth_available(&self) -> bool {
        self.check_availability(Policy::BiometricsOrPasscode)
    }

    /// The modality the device offers, or [`BiometryKind::None`] if biometrics
    /// cannot be evaluated.
    #[must_use]
    pub fn biometry_kind(&self) -> BiometryKind {
        if !self.is_biometrics_available() {
            return BiometryKind::None;
        }
        self.contexts
            .get()
            .map_or(BiometryKind::None, |context| context.session().biometry_kind())
    }

    /// Evaluates the configured policy, prompting with `reason`.
    ///
    /// A second call while one is pending fails with `AlreadyInProgress`.
    ///
    /// # Errors
    /// Returns the [`ErrorKind`](crate::ErrorKind) describing why the user was not authenticated.
    ///
    /// # Panics
    /// Panics if `reason` is blank.
    pub async fn authenticate(&self, reason: &str) -> AuthenticationOutcome {
        self.authenticate_with_policy(self.config.policy, reason)
            .await
    }

    /// Evaluates `policy`, prompting with `reason`.
    ///
    /// # Errors
    /// Returns the [`ErrorKind`](crate::ErrorKind) describing why the user was not authenticated.
    ///
    /// # Panics
    /// Panics if `reason` is blank.
    pub async fn authenticate_with_policy(
        &self,
        policy: Policy,
        reason: &str,
    ) -> AuthenticationOutcome {
        authenticator::authenticate(&self.contexts, policy, reason).await
    }

    /// Probes the configured policy and, only if it is available, evaluates it
    /// with the configured reason.
    ///
    /// Resolves `true` iff the user authenticated.
    pub async fn permit_and_auth(&self) -> bool {
        if !self.check_availability(self.config.policy) {
            return false;
        }
        self.authenticate(&self.config.reason).await.is_ok()
    }

    /// Runs [`authenticate`](Self::authenticate) and hands the outcome to
    /// `on_complete` on the callback runtime.
    ///
    /// The callback never runs before this method returns.
    ///
    /// # Panics
    /// Panics if `reason` is blank, or if no callback handle was configured
    /// and this is called outside a Tokio runtime.
    pub fn authenticate_with_callback<F>(
        self: &Arc<Self>,
        reason: impl Into<String>,
        on_complete: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(AuthenticationOutcome) + Send + 'static,
    {
        let reason = reason.into();
        assert!(
            !reason.trim().is_empty(),
            "authentication reason must not be empty"
        );
        let controller = Arc::clone(self);
        self.callback_handle().spawn(async move {
            let outcome = controller.authenticate(&reason).await;
            on_complete(outcome);
        })
    }

    /// Runs [`permit_and_auth`](Self::permit_and_auth) and hands the result to
    /// `on_complete` on the callback runtime.
    ///
    /// # Panics
    /// Panics if no callback handle was configured and this is called outside
    /// a Tokio runtime.
    pub fn permit_and_auth_with_callback<F>(self: &Arc<Self>, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let controller = Arc::clone(self);
        self.callback_handle().spawn(async move {
            on_complete(controller.permit_and_auth().await);
        })
    }

    fn callback_handle(&self) -> Handle {
        self.callbacks.clone().unwrap_or_else(Handle::current)
    }
}

impl fmt::Debug for AuthController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthController")
            .field("contexts", &self.contexts)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;

    use super::*;
    use crate::ErrorKind;
    use crate::error::ProviderCode;
    use crate::mock::{MockDevice, MockProvider, Scripted};

    fn controller(provider: &MockProvider) -> AuthController {
        AuthController::new(Arc::new(provider.clone()))
    }

    #[tokio::test]
    async fn not_enrolled_short_circuits() {
        let provider = MockProvider::with_device(MockDevice {
            enrolled: false,
            ..MockDevice::default()
        });
        let controller = controller(&provider);

        assert!(!controller.check_availability(Policy::BiometricsOnly));
        assert_eq!(
            controller.probe(Policy::BiometricsOnly).reason(),
            Some(crate::ProbeError::BiometryNotEnrolled)
        );
        assert!(!controller.permit_and_auth().await);
        assert_eq!(provider.evaluations(), 0);
    }

    #[tokio::test]
    async fn capable_device_authenticates() {
        let provider = MockProvider::new();
        let controller = controller(&provider);

        let success = controller.authenticate("Unlock").await.unwrap();
        assert_eq!(success.message(), crate::SUCCESS_MESSAGE);
        assert!(controller.permit_and_auth().await);
        assert_eq!(provider.evaluations(), 2);
        assert_eq!(
            provider.last_reason().as_deref(),
            Some(crate::config::DEFAULT_REASON)
        );
    }

    #[tokio::test]
    async fn failed_evaluation_resolves_false() {
        let provider = MockProvider::new();
        provider.script(Scripted::Fail(ProviderCode::AUTHENTICATION_FAILED));
        let controller = controller(&provider);

        assert!(!controller.permit_and_auth().await);
        assert_eq!(provider.evaluations(), 1);
    }

    #[tokio::test]
    async fn configured_policy_is_used() {
        let provider = MockProvider::with_device(MockDevice {
            hardware: false,
            ..MockDevice::default()
        });
        let config = AuthConfig::new(Policy::BiometricsOrPasscode, "Confirm payment").unwrap();
        let controller = AuthController::with_config(Arc::new(provider.clone()), config);

        assert!(controller.permit_and_auth().await);
        assert_eq!(provider.last_reason().as_deref(), Some("Confirm payment"));
        assert_eq!(
            controller
                .authenticate_with_policy(Policy::BiometricsOnly, "Unlock")
                .await
                .unwrap_err(),
            ErrorKind::BiometryNotAvailable
        );
    }

    #[test]
    fn blank_configured_reason_falls_back() {
        let config = AuthConfig {
            policy: Policy::BiometricsOnly,
            reason: String::new(),
        };
        let controller = AuthController::with_config(Arc::new(MockProvider::new()), config);
        assert_eq!(controller.config().reason, crate::config::DEFAULT_REASON);
    }

    #[test]
    fn biometry_kind_requires_capability() {
        let provider = MockProvider::with_device(MockDevice {
            kind: BiometryKind::Touch,
            ..MockDevice::default()
        });
        let controller = controller(&provider);
        assert_eq!(controller.biometry_kind(), BiometryKind::Touch);
        assert_eq!(controller.biometry_kind().label(), "Touch ID");

        provider.update_device(|device| device.enrolled = false);
        assert_eq!(controller.biometry_kind(), BiometryKind::None);
    }

    #[test]
    fn availability_shorthands() {
        let provider = MockProvider::with_device(MockDevice {
            hardware: false,
            ..MockDevice::default()
        });
        let controller = controller(&provider);
        assert!(!controller.is_biometrics_available());
        assert!(controller.is_auth_available());
    }

    #[tokio::test]
    async fn retry_after_invalid_context_needs_reset() {
        let provider = MockProvider::new();
        provider.script(Scripted::Fail(ProviderCode::INVALID_CONTEXT));
        let controller = controller(&provider);

        assert_eq!(
            controller.authenticate("Unlock").await.unwrap_err(),
            ErrorKind::InvalidContext
        );
        assert!(!controller.permit_and_auth().await);
        assert_eq!(provider.evaluations(), 1);

        controller.reset();
        assert!(controller.permit_and_auth().await);
        assert_eq!(provider.sessions_opened(), 2);
    }

    #[tokio::test]
    async fn invalidate_cancels_a_pending_prompt() {
        let provider = MockProvider::new();
        provider.script(Scripted::Hold);
        let controller = Arc::new(controller(&provider));

        let pending = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.authenticate("Unlock").await }
        });
        while provider.held() == 0 {
            tokio::task::yield_now().await;
        }

        controller.invalidate();
        assert_eq!(
            pending.await.unwrap().unwrap_err(),
            ErrorKind::InvalidContext
        );
        assert_eq!(provider.invalidations(), 1);
        assert!(!provider.release(Ok(())));
    }

    #[tokio::test]
    async fn callback_runs_after_the_call_returns() {
        let provider = MockProvider::new();
        let controller = Arc::new(controller(&provider));
        let delivered = Arc::new(AtomicBool::new(false));

        let task = controller.authenticate_with_callback("Unlock", {
            let delivered = Arc::clone(&delivered);
            move |outcome| {
                assert!(outcome.is_ok());
                delivered.store(true, Ordering::SeqCst);
            }
        });
        assert!(!delivered.load(Ordering::SeqCst));

        task.await.unwrap();
        assert!(delivered.load(Ordering::SeqCst));
    }

    #[test]
    fn callback_is_delivered_on_the_designated_runtime() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("bioauth-callbacks")
            .build()
            .unwrap();
        let provider = MockProvider::with_device(MockDevice {
            enrolled: false,
            ..MockDevice::default()
        });
        let controller = Arc::new(
            AuthController::new(Arc::new(provider.clone()))
                .with_callback_handle(runtime.handle().clone()),
        );

        let (tx, rx) = mpsc::channel();
        controller.permit_and_auth_with_callback(move |permitted| {
            let thread = std::thread::current().name().map(str::to_owned);
            tx.send((permitted, thread)).unwrap();
        });

        let (permitted, thread) = rx.recv().unwrap();
        assert!(!permitted);
        assert_eq!(thread.as_deref(), Some("bioauth-callbacks"));
        assert_eq!(provider.evaluations(), 0);
    }
}
