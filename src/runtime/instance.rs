use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::hook::DestructionSentinel;
use crate::runtime::TypeId;

/// Per-instance bookkeeping: the mutable type slot and the optionally
/// attached destruction sentinel.
///
/// The record is the sentinel's only owner; dropping the record without
/// firing would drop the sentinel's queued closures unfired, so destruction
/// always detaches it first.
pub(crate) struct InstanceRecord {
    type_id: AtomicU32,
    sentinel: Mutex<Option<Arc<DestructionSentinel>>>,
}

impl InstanceRecord {
    pub(crate) fn new(type_id: TypeId) -> Self {
        InstanceRecord {
            type_id: AtomicU32::new(type_id.value()),
            sentinel: Mutex::new(None),
        }
    }

    /// The type currently stored in the instance's type slot.
    pub(crate) fn type_id(&self) -> TypeId {
        TypeId::new(self.type_id.load(Ordering::Acquire))
    }

    pub(crate) fn set_type_id(&self, type_id: TypeId) {
        self.type_id.store(type_id.value(), Ordering::Release);
    }

    /// The attached sentinel, creating it on first use.
    pub(crate) fn sentinel(&self) -> Arc<DestructionSentinel> {
        let mut guard = lock!(self.sentinel);
        Arc::clone(guard.get_or_insert_with(|| Arc::new(DestructionSentinel::new())))
    }

    /// Detach the sentinel for firing at destruction.
    pub(crate) fn take_sentinel(&self) -> Option<Arc<DestructionSentinel>> {
        lock!(self.sentinel).take()
    }
}
