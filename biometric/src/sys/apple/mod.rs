//! Apple platform (iOS/macOS) provider over `LocalAuthentication`, using swift-bridge.
//!
//! The Swift side wraps one `LAContext` per session and reports raw
//! `LAError.Code` values, which map directly onto [`ProviderCode`].

use crate::error::ProviderCode;
use crate::provider::{AuthProvider, EvaluationReply, ProviderSession};
use crate::{BiometryKind, Policy};

#[swift_bridge::bridge]
mod ffi {
    extern "Rust" {
        type EvaluationCallback;
        fn on_success(self);
        fn on_error(self, code: i64);
    }

    extern "Swift" {
        type LocalAuthSession;

        #[swift_bridge(init)]
        fn new() -> LocalAuthSession;

        // 0 when the policy can be evaluated, otherwise the `LAError` code.
        fn can_evaluate(self: &LocalAuthSession, policy: u8) -> i64;
        fn biometry_type(self: &LocalAuthSession) -> u8; // 0: None, 1: TouchID, 2: FaceID
        fn evaluate(
            self: &LocalAuthSession,
            policy: u8,
            reason: &str,
            callback: EvaluationCallback,
        );
        fn invalidate(self: &LocalAuthSession);
    }
}

/// Completion handle passed to Swift.
#[derive(Debug)]
pub struct EvaluationCallback {
    reply: EvaluationReply,
}

impl EvaluationCallback {
    fn on_success(self) {
        self.reply.succeed();
    }

    fn on_error(self, code: i64) {
        self.reply.fail(ProviderCode(code));
    }
}

const fn policy_to_ffi(policy: Policy) -> u8 {
    match policy {
        Policy::BiometricsOnly => 1,       // .deviceOwnerAuthenticationWithBiometrics
        Policy::BiometricsOrPasscode => 2, // .deviceOwnerAuthentication
    }
}

/// Provider backed by `LAContext`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppleProvider;

impl AuthProvider for AppleProvider {
    fn open_session(&self) -> Option<Box<dyn ProviderSession>> {
        Some(Box::new(AppleSession {
            inner: ffi::LocalAuthSession::new(),
        }))
    }
}

struct AppleSession {
    inner: ffi::LocalAuthSession,
}

// Safety: LAContext is documented as thread-safe for policy queries and evaluation;
// the Swift wrapper hops completion onto the caller-independent callback.
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl Send for AppleSession {}
unsafe impl Sync for AppleSession {}

impl ProviderSession for AppleSession {
    fn can_evaluate(&self, policy: Policy) -> Result<(), ProviderCode> {
        match self.inner.can_evaluate(policy_to_ffi(policy)) {
            0 => Ok(()),
            code => Err(ProviderCode(code)),
        }
    }

    fn evaluate(&self, policy: Policy, reason: &str, reply: EvaluationReply) {
        self.inner.evaluate(
            policy_to_ffi(policy),
            reason,
            EvaluationCallback { reply },
        );
    }

    fn biometry_kind(&self) -> BiometryKind {
        match self.inner.biometry_type() {
            1 => BiometryKind::Touch,
            2 => BiometryKind::Face,
            _ => BiometryKind::None,
        }
    }

    fn invalidate(&self) {
        self.inner.invalidate();
    }
}
