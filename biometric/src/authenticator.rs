//! Single-flight policy evaluation.

use log::{debug, info, warn};

use crate::Policy;
use crate::context::{AuthenticationContext, ContextManager};
use crate::error::ErrorKind;

/// Message carried by every successful outcome.
pub const SUCCESS_MESSAGE: &str = "User authenticated successfully";

/// Result of one authentication attempt.
pub type AuthenticationOutcome = Result<AuthSuccess, ErrorKind>;

/// A successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSuccess {
    message: &'static str,
    context: AuthenticationContext,
}

impl AuthSuccess {
    const fn new(context: AuthenticationContext) -> Self {
        Self {
            message: SUCCESS_MESSAGE,
            context,
        }
    }

    /// Confirmation text.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// The context the evaluation ran on.
    #[must_use]
    pub const fn context(&self) -> &AuthenticationContext {
        &self.context
    }
}

/// Evaluates `policy` once on the manager's context.
///
/// Produces exactly one outcome. Never retries.
///
/// # Panics
/// Panics if `reason` is blank.
pub(crate) async fn authenticate(
    contexts: &ContextManager,
    policy: Policy,
    reason: &str,
) -> AuthenticationOutcome {
    assert!(
        !reason.trim().is_empty(),
        "authentication reason must not be empty"
    );

    let Some(context) = contexts.get() else {
        debug!("no context available, skipping evaluation");
        return Err(ErrorKind::InvalidContext);
    };
    if context.is_invalidated() {
        debug!("{} is invalidated, reset before retrying", context.id());
        return Err(ErrorKind::InvalidContext);
    }

    let mut flight = context.begin_flight().inspect_err(|_| {
        debug!("rejecting concurrent evaluation on {}", context.id());
    })?;

    // Device state may have changed since the caller last probed.
    let checked = context.session().can_evaluate(policy);
    if flight.is_aborted() {
        info!("{} was reset before prompting", context.id());
        return Err(ErrorKind::InvalidContext);
    }
    if let Err(code) = checked {
        return Err(settle(&context, ErrorKind::from_code(code)));
    }

    let (reply, outcome) = flight.reply();
    debug!("evaluating {policy:?} on {}", context.id());
    context.session().evaluate(policy, reason, reply);

    // A reply accepted before a reset still wins; one rejected as stale
    // closes the channel and is reported through the abort.
    let received = tokio::select! {
        biased;
        received = outcome => received.ok(),
        () = flight.aborted() => None,
    };
    let aborted = flight.is_aborted();
    drop(flight);

    match received {
        Some(Ok(())) => {
            info!("authenticated on {}", context.id());
            Ok(AuthSuccess::new(context))
        }
        Some(Err(code)) => Err(settle(&context, ErrorKind::from_code(code))),
        None if aborted => {
            info!("evaluation on {} aborted by reset", context.id());
            Err(ErrorKind::InvalidContext)
        }
        None => {
            warn!("provider dropped the reply for {}", context.id());
            Err(ErrorKind::Unknown)
        }
    }
}

fn settle(context: &AuthenticationContext, kind: ErrorKind) -> ErrorKind {
    info!("authentication on {} failed: {kind}", context.id());
    if kind.invalidates_context() {
        context.mark_invalidated();
    }
    kind
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ProviderCode;
    use crate::mock::{MockDevice, MockProvider, Scripted};

    fn setup() -> (MockProvider, Arc<ContextManager>) {
        let provider = MockProvider::new();
        let contexts = Arc::new(ContextManager::new(Arc::new(provider.clone())));
        (provider, contexts)
    }

    async fn wait_for_held(provider: &MockProvider, count: usize) {
        while provider.held() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn success_carries_message_and_context() {
        let (provider, contexts) = setup();
        let success = authenticate(&contexts, Policy::BiometricsOnly, "Unlock")
            .await
            .unwrap();
        assert_eq!(success.message(), SUCCESS_MESSAGE);
        assert_eq!(Some(success.context().clone()), contexts.current());
        assert_eq!(provider.evaluations(), 1);
        assert_eq!(provider.last_reason().as_deref(), Some("Unlock"));
    }

    #[tokio::test]
    async fn user_cancel_keeps_the_context_usable() {
        let (provider, contexts) = setup();
        provider.script(Scripted::Fail(ProviderCode::USER_CANCEL));

        let outcome = authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await;
        assert_eq!(outcome.unwrap_err(), ErrorKind::UserCancel);
        let context = contexts.current().unwrap();
        assert!(!context.is_invalidated());

        let retry = authenticate(&contexts, Policy::BiometricsOnly, "Unlock")
            .await
            .unwrap();
        assert_eq!(retry.context(), &context);
        assert_eq!(provider.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn invalid_context_sticks_until_reset() {
        let (provider, contexts) = setup();
        provider.script(Scripted::Fail(ProviderCode::INVALID_CONTEXT));

        let first = authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await;
        assert_eq!(first.unwrap_err(), ErrorKind::InvalidContext);
        assert_eq!(provider.evaluations(), 1);
        let probes = provider.probes();

        let retry = authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await;
        assert_eq!(retry.unwrap_err(), ErrorKind::InvalidContext);
        assert_eq!(provider.evaluations(), 1);
        assert_eq!(provider.probes(), probes);

        contexts.reset();
        assert!(
            authenticate(&contexts, Policy::BiometricsOnly, "Unlock")
                .await
                .is_ok()
        );
        assert_eq!(provider.sessions_opened(), 2);
    }

    #[tokio::test]
    async fn revalidates_before_prompting() {
        let (provider, contexts) = setup();
        provider.update_device(|device| device.locked_out = true);

        let outcome = authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await;
        assert_eq!(outcome.unwrap_err(), ErrorKind::BiometryLockout);
        assert_eq!(provider.evaluations(), 0);
        assert!(!contexts.current().unwrap().is_evaluating());
    }

    #[tokio::test]
    async fn concurrent_call_is_rejected() {
        let (provider, contexts) = setup();
        provider.script(Scripted::Hold);

        let pending = tokio::spawn({
            let contexts = Arc::clone(&contexts);
            async move { authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await }
        });
        wait_for_held(&provider, 1).await;

        let second = authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await;
        assert_eq!(second.unwrap_err(), ErrorKind::AlreadyInProgress);
        assert_eq!(provider.evaluations(), 1);

        assert!(provider.release(Ok(())));
        assert!(pending.await.unwrap().is_ok());

        assert!(
            authenticate(&contexts, Policy::BiometricsOnly, "Unlock")
                .await
                .is_ok()
        );
        assert_eq!(provider.evaluations(), 2);
    }

    #[tokio::test]
    async fn reset_discards_the_pending_reply() {
        let (provider, contexts) = setup();
        provider.script(Scripted::Hold);

        let pending = tokio::spawn({
            let contexts = Arc::clone(&contexts);
            async move { authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await }
        });
        wait_for_held(&provider, 1).await;
        let stale = contexts.current().unwrap();

        contexts.reset();
        assert_eq!(pending.await.unwrap().unwrap_err(), ErrorKind::InvalidContext);
        assert!(!provider.release(Ok(())));

        let fresh = authenticate(&contexts, Policy::BiometricsOnly, "Unlock")
            .await
            .unwrap();
        assert_ne!(fresh.context().id(), stale.id());
        assert_eq!(provider.sessions_opened(), 2);
    }

    #[tokio::test]
    async fn reset_during_recheck_never_prompts() {
        let (provider, contexts) = setup();
        let weak = Arc::downgrade(&contexts);
        provider.before_next_check(move || {
            if let Some(contexts) = weak.upgrade() {
                contexts.reset();
            }
        });

        let outcome = authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await;
        assert_eq!(outcome.unwrap_err(), ErrorKind::InvalidContext);
        assert_eq!(provider.probes(), 1);
        assert_eq!(provider.evaluations(), 0);
        assert!(contexts.current().is_none());
    }

    #[tokio::test]
    async fn invalidate_during_failing_recheck_reports_invalid_context() {
        let (provider, contexts) = setup();
        provider.update_device(|device| device.enrolled = false);
        let weak = Arc::downgrade(&contexts);
        provider.before_next_check(move || {
            if let Some(contexts) = weak.upgrade() {
                contexts.invalidate();
            }
        });

        let outcome = authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await;
        assert_eq!(outcome.unwrap_err(), ErrorKind::InvalidContext);
        assert_eq!(provider.evaluations(), 0);
        assert!(contexts.current().unwrap().is_invalidated());
    }

    #[tokio::test]
    async fn reply_accepted_before_reset_reaches_the_caller() {
        let (provider, contexts) = setup();
        provider.script(Scripted::Hold);

        let pending = tokio::spawn({
            let contexts = Arc::clone(&contexts);
            async move { authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await }
        });
        wait_for_held(&provider, 1).await;

        assert!(provider.release(Ok(())));
        contexts.reset();
        assert!(pending.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn dropping_the_future_frees_the_slot() {
        let (provider, contexts) = setup();
        provider.script(Scripted::Hold);

        let pending = tokio::spawn({
            let contexts = Arc::clone(&contexts);
            async move { authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await }
        });
        wait_for_held(&provider, 1).await;
        pending.abort();
        let _ = pending.await;

        assert!(!contexts.current().unwrap().is_evaluating());
        assert!(!provider.release(Err(ProviderCode::USER_CANCEL)));
        assert!(
            authenticate(&contexts, Policy::BiometricsOnly, "Unlock")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn dropped_reply_maps_to_unknown() {
        let (provider, contexts) = setup();
        provider.script(Scripted::Drop);

        let outcome = authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await;
        assert_eq!(outcome.unwrap_err(), ErrorKind::Unknown);
        assert!(!contexts.current().unwrap().is_invalidated());
    }

    #[tokio::test]
    async fn refused_session_fails_without_provider_call() {
        let provider = MockProvider::with_device(MockDevice::default());
        provider.refuse_sessions(true);
        let contexts = ContextManager::new(Arc::new(provider.clone()));

        let outcome = authenticate(&contexts, Policy::BiometricsOnly, "Unlock").await;
        assert_eq!(outcome.unwrap_err(), ErrorKind::InvalidContext);
        assert_eq!(provider.evaluations(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "reason must not be empty")]
    async fn blank_reason_is_a_precondition_violation() {
        let (_, contexts) = setup();
        let _ = authenticate(&contexts, Policy::BiometricsOnly, "  ").await;
    }
}
