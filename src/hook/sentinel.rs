use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    hook::{
        closure::{HookClosureRc, Invocation},
        CancelOutcome, HookMode,
    },
    runtime::{InstanceId, MethodKey, Value, DESTROY_METHOD},
    Error::DuplicateHook,
    Result,
};

/// Alternate after-destruction hook path for object kinds whose method table
/// cannot carry a destructor trampoline.
///
/// The sentinel is a side table attached to one instance, which is its only
/// owner. When the instance is destroyed the sentinel fires its queued
/// closures in reverse attachment order, regardless of the instance's kind.
/// Only after-destruction semantics are supported on this path.
pub struct DestructionSentinel {
    entries: Mutex<Vec<SentinelEntry>>,
}

struct SentinelEntry {
    closure: HookClosureRc,
    active: Arc<AtomicBool>,
}

impl DestructionSentinel {
    pub(crate) fn new() -> Self {
        DestructionSentinel {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Queue a closure; returns the entry's active flag for cancellation.
    pub(crate) fn attach(&self, closure: &HookClosureRc) -> Result<Arc<AtomicBool>> {
        let mut entries = lock!(self.entries);
        if entries
            .iter()
            .any(|entry| Arc::ptr_eq(&entry.closure, closure))
        {
            return Err(DuplicateHook {
                key: MethodKey::new(DESTROY_METHOD),
                mode: HookMode::After,
            });
        }

        let active = Arc::new(AtomicBool::new(true));
        entries.push(SentinelEntry {
            closure: Arc::clone(closure),
            active: Arc::clone(&active),
        });
        Ok(active)
    }

    /// Remove the entry owning `flag`.
    pub(crate) fn cancel(&self, flag: &Arc<AtomicBool>) -> CancelOutcome {
        let mut entries = lock!(self.entries);
        let len = entries.len();
        entries.retain(|entry| !Arc::ptr_eq(&entry.active, flag));
        if entries.len() == len {
            return CancelOutcome::AlreadyGone;
        }

        flag.store(false, Ordering::Release);
        if entries.is_empty() {
            CancelOutcome::RemovedLast
        } else {
            CancelOutcome::Removed
        }
    }

    /// Fire all still-active closures in reverse attachment order.
    ///
    /// Failures are logged and do not stop the remaining closures.
    pub(crate) fn fire(&self, instance: InstanceId) {
        let entries = std::mem::take(&mut *lock!(self.entries));
        let key = MethodKey::new(DESTROY_METHOD);

        for entry in entries.iter().rev() {
            if !entry.active.swap(false, Ordering::AcqRel) {
                continue;
            }
            let invocation = Invocation {
                receiver: Value::Instance(instance),
                key: key.clone(),
                args: &[],
                original: None,
            };
            if let Err(error) = entry.closure.invoke(&invocation) {
                log::warn!("after-destroy closure failed for {instance}: {error}");
            }
        }
    }
}
