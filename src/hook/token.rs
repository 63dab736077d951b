use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use strum::Display;

use crate::{
    hook::{closure::HookClosure, engine::EngineShared, ContextKey, HookMode},
    runtime::InstanceId,
};

/// What a cancellation actually did.
///
/// The three states are deliberately distinct: callers tearing down an entire
/// hook installation can tell "this was the last closure, the original
/// implementation is back" apart from "other closures remain" and from "there
/// was nothing left to remove".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CancelOutcome {
    /// The registration was already gone (cancelled before, or its context,
    /// instance or engine no longer exists)
    AlreadyGone,
    /// The closure was removed; its context stays live for other closures
    Removed,
    /// The closure was removed and it was the last one; the context was
    /// destroyed and the original implementation restored
    RemovedLast,
}

/// Where a token's registration lives.
pub(crate) enum TokenSlot {
    /// A pooled closure in a hook context
    Context {
        /// The owning context's key
        key: ContextKey,
        /// The pool the closure was registered into
        mode: HookMode,
        /// Set for instance-level hooks; drives shadow release
        instance: Option<InstanceId>,
    },
    /// A queued closure on a destruction sentinel
    Sentinel {
        /// The instance the sentinel is attached to
        instance: InstanceId,
        /// The sentinel entry's active flag
        flag: Arc<AtomicBool>,
    },
}

/// Cancellable handle to one registration.
///
/// Cancellation is synchronous, idempotent and never raises: the first call
/// reports what it did, every later call reports
/// [`CancelOutcome::AlreadyGone`]. Dropping a token does *not* cancel the
/// registration.
pub struct HookToken {
    shared: Weak<EngineShared>,
    closure: Weak<HookClosure>,
    slot: TokenSlot,
    active: AtomicBool,
}

impl HookToken {
    pub(crate) fn new(
        shared: Weak<EngineShared>,
        closure: Weak<HookClosure>,
        slot: TokenSlot,
    ) -> Self {
        HookToken {
            shared,
            closure,
            slot,
            active: AtomicBool::new(true),
        }
    }

    /// Remove the registration this token stands for.
    pub fn cancel(&self) -> CancelOutcome {
        if !self.active.swap(false, Ordering::SeqCst) {
            return CancelOutcome::AlreadyGone;
        }
        let Some(shared) = self.shared.upgrade() else {
            return CancelOutcome::AlreadyGone;
        };
        let Some(closure) = self.closure.upgrade() else {
            return CancelOutcome::AlreadyGone;
        };
        shared.cancel(&self.slot, &closure)
    }

    /// Whether this token has not been cancelled yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for HookToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = match &self.slot {
            TokenSlot::Context { key, mode, .. } => format!("{mode} '{}' on {}", key.1, key.0),
            TokenSlot::Sentinel { instance, .. } => format!("sentinel on {instance}"),
        };
        write!(f, "HookToken({slot}, active: {})", self.is_active())
    }
}
