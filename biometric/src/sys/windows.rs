//! Windows Hello provider over `UserConsentVerifier`.

use log::warn;
use windows::Security::Credentials::UI::{
    UserConsentVerificationResult, UserConsentVerifier, UserConsentVerifierAvailability,
};
use windows::core::HSTRING;

use crate::error::ProviderCode;
use crate::provider::{AuthProvider, EvaluationReply, ProviderSession};
use crate::{BiometryKind, Policy};

/// Provider backed by Windows Hello.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsProvider;

impl AuthProvider for WindowsProvider {
    fn open_session(&self) -> Option<Box<dyn ProviderSession>> {
        Some(Box::new(WindowsSession))
    }
}

struct WindowsSession;

// Outside the documented range, so the failure surfaces as `ErrorKind::Unknown`.
const TRANSPORT_FAILURE: ProviderCode = ProviderCode(i64::MIN);

fn availability_to_code(availability: UserConsentVerifierAvailability) -> Result<(), ProviderCode> {
    match availability {
        UserConsentVerifierAvailability::Available => Ok(()),
        UserConsentVerifierAvailability::NotConfiguredForUser => {
            Err(ProviderCode::BIOMETRY_NOT_ENROLLED)
        }
        UserConsentVerifierAvailability::DeviceBusy => Err(ProviderCode::SYSTEM_CANCEL),
        // DeviceNotPresent, DisabledByPolicy
        _ => Err(ProviderCode::BIOMETRY_NOT_AVAILABLE),
    }
}

fn verification_to_code(result: UserConsentVerificationResult) -> Result<(), ProviderCode> {
    match result {
        UserConsentVerificationResult::Verified => Ok(()),
        UserConsentVerificationResult::Canceled => Err(ProviderCode::USER_CANCEL),
        UserConsentVerificationResult::DeviceBusy => Err(ProviderCode::SYSTEM_CANCEL),
        UserConsentVerificationResult::RetriesExhausted => Err(ProviderCode::BIOMETRY_LOCKOUT),
        UserConsentVerificationResult::NotConfiguredForUser => {
            Err(ProviderCode::BIOMETRY_NOT_ENROLLED)
        }
        UserConsentVerificationResult::DeviceNotPresent
        | UserConsentVerificationResult::DisabledByPolicy => {
            Err(ProviderCode::BIOMETRY_NOT_AVAILABLE)
        }
        other => Err(ProviderCode(i64::from(other.0))),
    }
}

impl ProviderSession for WindowsSession {
    // Windows Hello always falls back to the PIN, so both policies share one check.
    fn can_evaluate(&self, _policy: Policy) -> Result<(), ProviderCode> {
        match UserConsentVerifier::CheckAvailabilityAsync().and_then(|op| op.get()) {
            Ok(availability) => availability_to_code(availability),
            Err(err) => {
                warn!("CheckAvailabilityAsync failed: {err}");
                Err(ProviderCode::BIOMETRY_NOT_AVAILABLE)
            }
        }
    }

    fn evaluate(&self, _policy: Policy, reason: &str, reply: EvaluationReply) {
        let reason = HSTRING::from(reason);
        std::thread::spawn(move || {
            let result = UserConsentVerifier::RequestVerificationAsync(&reason)
                .and_then(|op| op.get());
            match result.map(verification_to_code) {
                Ok(Ok(())) => {
                    reply.succeed();
                }
                Ok(Err(code)) => {
                    reply.fail(code);
                }
                Err(err) => {
                    warn!("RequestVerificationAsync failed: {err}");
                    reply.fail(TRANSPORT_FAILURE);
                }
            }
        });
    }

    // UserConsentVerifier does not say whether Hello uses a face or a fingerprint.
    fn biometry_kind(&self) -> BiometryKind {
        BiometryKind::None
    }
}
