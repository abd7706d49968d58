//! Ownership of the provider session.
//!
//! A [`ContextManager`] holds at most one live [`AuthenticationContext`]. The
//! context is opened lazily, reused across calls and discarded by `reset`.
//! Each context also carries the single-flight slot for its evaluations.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::debug;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::error::{ErrorKind, ProviderCode};
use crate::provider::{AuthProvider, EvaluationReply, ProviderSession};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an [`AuthenticationContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context #{}", self.0)
    }
}

struct InFlight {
    call: u64,
    abort: oneshot::Sender<()>,
}

struct ContextInner {
    id: ContextId,
    session: Box<dyn ProviderSession>,
    invalidated: AtomicBool,
    next_call: AtomicU64,
    flight: Mutex<Option<InFlight>>,
}

/// Reference to the provider session owned by a [`ContextManager`].
///
/// Cloning yields another reference to the same session, never a new one.
#[derive(Clone)]
pub struct AuthenticationContext {
    inner: Arc<ContextInner>,
}

impl AuthenticationContext {
    fn open(session: Box<dyn ProviderSession>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId::next(),
                session,
                invalidated: AtomicBool::new(false),
                next_call: AtomicU64::new(1),
                flight: Mutex::new(None),
            }),
        }
    }

    /// Identifier of this context.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Whether this context has been invalidated.
    ///
    /// An invalidated context rejects every operation until the owning
    /// manager is reset.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.inner.invalidated.load(Ordering::Acquire)
    }

    /// Whether an evaluation is currently pending on this context.
    #[must_use]
    pub fn is_evaluating(&self) -> bool {
        self.flight().is_some()
    }

    pub(crate) fn session(&self) -> &dyn ProviderSession {
        self.inner.session.as_ref()
    }

    pub(crate) fn mark_invalidated(&self) {
        if !self.inner.invalidated.swap(true, Ordering::AcqRel) {
            debug!("{} invalidated", self.inner.id);
        }
    }

    /// Claims the single-flight slot.
    pub(crate) fn begin_flight(&self) -> Result<Flight, ErrorKind> {
        let mut slot = self.flight();
        if slot.is_some() {
            return Err(ErrorKind::AlreadyInProgress);
        }
        let call = self.inner.next_call.fetch_add(1, Ordering::Relaxed);
        let (abort, aborted) = oneshot::channel();
        *slot = Some(InFlight { call, abort });
        drop(slot);

        Ok(Flight {
            context: self.clone(),
            call,
            aborted,
        })
    }

    /// Aborts the pending evaluation, if any. Its caller resolves with
    /// `InvalidContext` and the provider's eventual reply is discarded.
    fn abort_flight(&self) {
        let pending = self.flight().take();
        if let Some(pending) = pending {
            debug!("aborting call {} on {}", pending.call, self.inner.id);
            let _ = pending.abort.send(());
        }
    }

    fn flight(&self) -> std::sync::MutexGuard<'_, Option<InFlight>> {
        self.inner
            .flight
            .lock()
            .expect("single-flight mutex poisoned")
    }
}

impl PartialEq for AuthenticationContext {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for AuthenticationContext {}

impl fmt::Debug for AuthenticationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationContext")
            .field("id", &self.inner.id)
            .field("invalidated", &self.is_invalidated())
            .finish_non_exhaustive()
    }
}

/// A claimed single-flight slot. Dropping it releases the slot.
pub(crate) struct Flight {
    context: AuthenticationContext,
    call: u64,
    aborted: oneshot::Receiver<()>,
}

impl Flight {
    /// Creates the reply handle for this call and the receiver its outcome
    /// arrives on.
    pub(crate) fn reply(&self) -> (EvaluationReply, oneshot::Receiver<Result<(), ProviderCode>>) {
        let (sender, receiver) = oneshot::channel();
        let ticket = FlightTicket {
            context: Arc::downgrade(&self.context.inner),
            id: self.context.id(),
            call: self.call,
        };
        (EvaluationReply::new(sender, ticket), receiver)
    }

    /// Resolves once the context is reset or invalidated underneath this call.
    pub(crate) async fn aborted(&mut self) {
        let _ = (&mut self.aborted).await;
    }

    /// Whether the context was reset or invalidated underneath this call.
    pub(crate) fn is_aborted(&mut self) -> bool {
        !matches!(self.aborted.try_recv(), Err(TryRecvError::Empty))
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        let mut slot = self.context.flight();
        if slot.as_ref().is_some_and(|pending| pending.call == self.call) {
            *slot = None;
        }
    }
}

/// Identifies the call an [`EvaluationReply`] belongs to.
pub(crate) struct FlightTicket {
    context: Weak<ContextInner>,
    id: ContextId,
    call: u64,
}

impl FlightTicket {
    /// Runs `deliver` only while the call is still the one pending on a live
    /// context. The slot stays locked throughout, so a concurrent reset lands
    /// either before (and `deliver` is skipped) or after.
    pub(crate) fn while_current<R>(&self, deliver: impl FnOnce() -> R) -> Option<R> {
        let inner = self.context.upgrade()?;
        let slot = inner.flight.lock().expect("single-flight mutex poisoned");
        let current = slot.as_ref().is_some_and(|pending| pending.call == self.call);
        current.then(deliver)
    }
}

impl fmt::Display for FlightTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call {} on {}", self.call, self.id)
    }
}

impl fmt::Debug for FlightTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightTicket")
            .field("context", &self.id)
            .field("call", &self.call)
            .finish()
    }
}

/// Owns the controller's provider session.
pub struct ContextManager {
    provider: Arc<dyn AuthProvider>,
    current: Mutex<Option<AuthenticationContext>>,
}

impl ContextManager {
    /// Creates a manager with no context. Nothing is allocated until [`get`](Self::get).
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            current: Mutex::new(None),
        }
    }

    /// Returns the current context, opening one if there is none.
    ///
    /// An invalidated context is returned as-is; it is only replaced by
    /// [`reset`](Self::reset). Returns `None` if the provider cannot open a
    /// session.
    pub fn get(&self) -> Option<AuthenticationContext> {
        let mut current = self.lock();
        if let Some(context) = current.as_ref() {
            return Some(context.clone());
        }

        let context = AuthenticationContext::open(self.provider.open_session()?);
        debug!("opened {}", context.id());
        *current = Some(context.clone());
        Some(context)
    }

    /// Returns the current context without opening one.
    pub fn current(&self) -> Option<AuthenticationContext> {
        self.lock().clone()
    }

    /// Discards the current context. No-op if there is none.
    ///
    /// A pending evaluation on the discarded context resolves with
    /// `InvalidContext`; whatever the provider reports for it later is dropped.
    pub fn reset(&self) {
        let discarded = self.lock().take();
        if let Some(context) = discarded {
            debug!("resetting {}", context.id());
            Self::retire(&context);
        }
    }

    /// Invalidates the current context but keeps it in place.
    ///
    /// Every further operation fails with `InvalidContext` until [`reset`](Self::reset).
    pub fn invalidate(&self) {
        let current = self.current();
        if let Some(context) = current {
            Self::retire(&context);
        }
    }

    fn retire(context: &AuthenticationContext) {
        context.mark_invalidated();
        context.abort_flight();
        context.session().invalidate();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<AuthenticationContext>> {
        self.current.lock().expect("context mutex poisoned")
    }
}

impl fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextManager")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

impl Drop for ContextManager {
    fn drop(&mut self) {
        self.reset();
    }
}
