use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    hook::ContextKey,
    runtime::{Implementation, MethodKey, MethodSlot, Runtime, TypeId},
    Result,
};

/// Reference count for one locality override, per (type, method key).
///
/// `synthesized` records whether the slot was created here (a forwarder over
/// an inherited implementation) or was already local to the type. Teardown of
/// a synthesized slot removes it entirely, restoring inheritance.
pub(crate) struct OverrideEntry {
    count: u32,
    synthesized: bool,
}

/// Guarantee the method-table entry for `key` is local to `type_id` before it
/// is mutated, and return that local slot.
///
/// An inherited slot gets a local forwarder to the inherited implementation,
/// so the trampoline install only ever touches this type's own entry and
/// sibling types sharing the inherited implementation stay unaffected.
pub(crate) fn ensure_local(
    runtime: &Runtime,
    type_id: TypeId,
    key: &MethodKey,
    overrides: &mut HashMap<ContextKey, OverrideEntry>,
) -> Result<Arc<MethodSlot>> {
    let (owner, slot) = runtime.resolve(type_id, key)?;
    let entry = overrides
        .entry((type_id, key.clone()))
        .or_insert(OverrideEntry {
            count: 0,
            synthesized: false,
        });
    entry.count += 1;

    if owner.id() == type_id {
        return Ok(slot);
    }

    let inherited = slot.implementation();
    let local = Arc::new(MethodSlot::new(
        key.clone(),
        slot.encoding(),
        Implementation::forwarder(move |env| inherited.call(env)),
    ));
    runtime.install_local_slot(type_id, Arc::clone(&local))?;
    entry.synthesized = true;

    log::debug!("installed locality forwarder for '{key}' on {type_id}");
    Ok(local)
}

/// Drop one reference to the override for (type, key); at zero, restore the
/// slot: synthesized overrides are removed entirely (restoring inheritance),
/// preexisting local slots get the captured original implementation back.
///
/// Teardown is best-effort; failures are logged, never raised.
pub(crate) fn release(
    runtime: &Runtime,
    type_id: TypeId,
    key: &MethodKey,
    overrides: &mut HashMap<ContextKey, OverrideEntry>,
    original: &Implementation,
) {
    let context_key = (type_id, key.clone());
    let Some(entry) = overrides.get_mut(&context_key) else {
        log::warn!("override entry for '{key}' on {type_id} missing at release");
        return;
    };

    entry.count = entry.count.saturating_sub(1);
    if entry.count > 0 {
        return;
    }

    let synthesized = entry.synthesized;
    overrides.remove(&context_key);

    let restored = if synthesized {
        runtime.remove_local_slot(type_id, key)
    } else {
        runtime
            .replace_implementation(type_id, key, original.clone())
            .map(|_| ())
    };
    if let Err(error) = restored {
        log::warn!("failed to restore slot '{key}' on {type_id}: {error}");
    } else {
        log::debug!("restored slot '{key}' on {type_id}");
    }
}
