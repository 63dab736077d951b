use std::sync::Arc;

use crate::{
    hook::engine::EngineShared,
    runtime::{Implementation, MethodKey, TypeId},
};

/// Key of one hook context: the (possibly shadow) type and the method key.
pub(crate) type ContextKey = (TypeId, MethodKey);

/// Synthesize the generic intercepting implementation for a context.
///
/// When invoked by ordinary dispatch, the trampoline forwards the whole call
/// environment plus its context key into the engine's fixed dispatcher, which
/// looks up the owning context and runs the invocation plan. Two teardown
/// races are absorbed by falling back to the captured original: the context
/// may be gone while a fetched trampoline is still in flight, and the engine
/// itself may have been dropped with the install still in place.
pub(crate) fn synthesize(
    shared: &Arc<EngineShared>,
    key: ContextKey,
    original: Implementation,
) -> Implementation {
    let weak = Arc::downgrade(shared);
    Implementation::trampoline(move |env| {
        if let Some(shared) = weak.upgrade() {
            if let Some(context) = shared.context(&key) {
                return context.fire(env);
            }
        }
        original.call(env)
    })
}
