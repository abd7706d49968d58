//! Scriptable in-memory provider for tests.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ProviderCode;
use crate::provider::{AuthProvider, EvaluationReply, ProviderSession};
use crate::{BiometryKind, Policy};

/// Simulated device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockDevice {
    /// Biometric hardware is present.
    pub hardware: bool,
    /// An identity is enrolled.
    pub enrolled: bool,
    /// A device passcode is configured.
    pub passcode_set: bool,
    /// Biometrics are locked out.
    pub locked_out: bool,
    /// Modality reported by sessions.
    pub kind: BiometryKind,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            hardware: true,
            enrolled: true,
            passcode_set: true,
            locked_out: false,
            kind: BiometryKind::Face,
        }
    }
}

impl MockDevice {
    fn check(&self, policy: Policy) -> Result<(), ProviderCode> {
        match policy {
            Policy::BiometricsOnly if !self.hardware => Err(ProviderCode::BIOMETRY_NOT_AVAILABLE),
            Policy::BiometricsOnly if !self.enrolled => Err(ProviderCode::BIOMETRY_NOT_ENROLLED),
            Policy::BiometricsOnly if self.locked_out => Err(ProviderCode::BIOMETRY_LOCKOUT),
            Policy::BiometricsOrPasscode if !self.passcode_set => {
                Err(ProviderCode::PASSCODE_NOT_SET)
            }
            _ => Ok(()),
        }
    }
}

/// What the next evaluation does with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    /// Complete successfully before `evaluate` returns.
    Succeed,
    /// Fail with the given code before `evaluate` returns.
    Fail(ProviderCode),
    /// Keep the reply until [`MockProvider::release`] is called.
    Hold,
    /// Drop the reply without completing it.
    Drop,
}

struct Hook(Box<dyn FnOnce() + Send>);

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook")
    }
}

#[derive(Debug, Default)]
struct MockState {
    before_check: VecDeque<Hook>,
    device: MockDevice,
    refuse_sessions: bool,
    script: VecDeque<Scripted>,
    held: VecDeque<EvaluationReply>,
    last_reason: Option<String>,
    sessions_opened: usize,
    probes: usize,
    evaluations: usize,
    invalidations: usize,
}

/// A provider whose device state and evaluation results are set by the test.
///
/// Clones share state, so a test can keep one handle while the controller
/// owns another. Unscripted evaluations succeed.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    /// A capable device with Face ID enrolled and a passcode set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider simulating `device`.
    #[must_use]
    pub fn with_device(device: MockDevice) -> Self {
        let provider = Self::default();
        provider.lock().device = device;
        provider
    }

    /// Mutates the simulated device state.
    pub fn update_device(&self, update: impl FnOnce(&mut MockDevice)) {
        update(&mut self.lock().device);
    }

    /// Makes `open_session` return `None` while set.
    pub fn refuse_sessions(&self, refuse: bool) {
        self.lock().refuse_sessions = refuse;
    }

    /// Queues the behaviour of the next unscripted evaluation.
    pub fn script(&self, step: Scripted) {
        self.lock().script.push_back(step);
    }

    /// Runs `hook` inside the next capability check, before the device state
    /// is consulted. The provider's lock is not held while it runs.
    pub fn before_next_check(&self, hook: impl FnOnce() + Send + 'static) {
        self.lock().before_check.push_back(Hook(Box::new(hook)));
    }

    /// Completes the oldest held reply.
    ///
    /// Returns whether the outcome reached a caller; `false` if nothing was
    /// held or the reply was stale.
    pub fn release(&self, result: Result<(), ProviderCode>) -> bool {
        let reply = self.lock().held.pop_front();
        match (reply, result) {
            (Some(reply), Ok(())) => reply.succeed(),
            (Some(reply), Err(code)) => reply.fail(code),
            (None, _) => false,
        }
    }

    /// Number of replies currently held.
    #[must_use]
    pub fn held(&self) -> usize {
        self.lock().held.len()
    }

    /// Reason string of the most recent evaluation.
    #[must_use]
    pub fn last_reason(&self) -> Option<String> {
        self.lock().last_reason.clone()
    }

    /// Sessions opened so far.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions_opened
    }

    /// Capability checks performed so far.
    #[must_use]
    pub fn probes(&self) -> usize {
        self.lock().probes
    }

    /// Evaluations started so far.
    #[must_use]
    pub fn evaluations(&self) -> usize {
        self.lock().evaluations
    }

    /// Sessions invalidated so far.
    #[must_use]
    pub fn invalidations(&self) -> usize {
        self.lock().invalidations
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock provider mutex poisoned")
    }
}

impl AuthProvider for MockProvider {
    fn open_session(&self) -> Option<Box<dyn ProviderSession>> {
        let mut state = self.lock();
        if state.refuse_sessions {
            return None;
        }
        state.sessions_opened += 1;
        Some(Box::new(MockSession {
            provider: self.clone(),
        }))
    }
}

struct MockSession {
    provider: MockProvider,
}

impl ProviderSession for MockSession {
    fn can_evaluate(&self, policy: Policy) -> Result<(), ProviderCode> {
        let hook = self.provider.lock().before_check.pop_front();
        if let Some(Hook(hook)) = hook {
            hook();
        }
        let mut state = self.provider.lock();
        state.probes += 1;
        state.device.check(policy)
    }

    fn evaluate(&self, _policy: Policy, reason: &str, reply: EvaluationReply) {
        let step = {
            let mut state = self.provider.lock();
            state.evaluations += 1;
            state.last_reason = Some(reason.to_owned());
            state.script.pop_front().unwrap_or(Scripted::Succeed)
        };

        match step {
            Scripted::Succeed => {
                reply.succeed();
            }
            Scripted::Fail(code) => {
                reply.fail(code);
            }
            Scripted::Hold => self.provider.lock().held.push_back(reply),
            Scripted::Drop => drop(reply),
        }
    }

    fn biometry_kind(&self) -> BiometryKind {
        self.provider.lock().device.kind
    }

    fn invalidate(&self) {
        self.provider.lock().invalidations += 1;
    }
}
