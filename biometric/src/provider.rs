//! The seam between the controller and a platform authentication stack.
//!
//! Backends in [`crate::sys`] and the test [`MockProvider`](crate::mock::MockProvider)
//! implement these traits. The controller never talks to the platform directly.

use std::fmt;

use log::warn;
use tokio::sync::oneshot;

use crate::context::FlightTicket;
use crate::error::ProviderCode;
use crate::{BiometryKind, Policy};

/// Factory for provider sessions.
pub trait AuthProvider: Send + Sync {
    /// Allocates a new session.
    ///
    /// Must be cheap and must not evaluate any policy. Returns `None` when the
    /// platform cannot hand out a session at all.
    fn open_session(&self) -> Option<Box<dyn ProviderSession>>;
}

/// One provider-side security session (an `LAContext` on Apple platforms).
pub trait ProviderSession: Send + Sync {
    /// Checks whether `policy` could be evaluated right now. Never prompts.
    ///
    /// # Errors
    /// Returns the provider code describing why evaluation would fail.
    fn can_evaluate(&self, policy: Policy) -> Result<(), ProviderCode>;

    /// Starts evaluating `policy`, possibly showing the system prompt.
    ///
    /// Implementations must complete `reply` exactly once. They may do so from
    /// any thread, including synchronously before returning.
    fn evaluate(&self, policy: Policy, reason: &str, reply: EvaluationReply);

    /// Which biometric modality this session would use.
    fn biometry_kind(&self) -> BiometryKind;

    /// Cancels any pending prompt and makes the session unusable.
    fn invalidate(&self) {}
}

type ReplySender = oneshot::Sender<Result<(), ProviderCode>>;

/// Completion handle passed to [`ProviderSession::evaluate`].
///
/// Consuming it delivers the outcome to the waiting caller. Outcomes for a call
/// that has since been reset or abandoned are discarded. Acceptance and reset
/// are serialized on the call's slot, so an accepted outcome is the one the
/// caller receives.
pub struct EvaluationReply {
    sender: ReplySender,
    ticket: FlightTicket,
}

impl EvaluationReply {
    pub(crate) const fn new(sender: ReplySender, ticket: FlightTicket) -> Self {
        Self { sender, ticket }
    }

    /// Reports a successful evaluation.
    ///
    /// Returns `false` if the outcome was not accepted: the call was reset or
    /// abandoned first.
    pub fn succeed(self) -> bool {
        self.deliver(Ok(()))
    }

    /// Reports a failed evaluation with the provider's code.
    ///
    /// Returns `false` if the outcome was not accepted: the call was reset or
    /// abandoned first.
    pub fn fail(self, code: ProviderCode) -> bool {
        self.deliver(Err(code))
    }

    fn deliver(self, result: Result<(), ProviderCode>) -> bool {
        let Self { sender, ticket } = self;
        match ticket.while_current(|| sender.send(result)) {
            Some(Ok(())) => true,
            Some(Err(_)) => {
                warn!("caller stopped waiting for {ticket}");
                false
            }
            None => {
                warn!("discarding stale evaluation result for {ticket}");
                false
            }
        }
    }
}

impl fmt::Debug for EvaluationReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationReply")
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}
