use std::sync::{Arc, RwLock};

use crate::{
    abi::CallInterface,
    hook::{
        closure::{HookClosureRc, Invocation, OriginalCall},
        HookMode,
    },
    runtime::{CallEnv, Implementation, MethodKey, Runtime, TypeId, Value},
    Error::DuplicateHook,
    Result,
};

/// Bookkeeping for one hooked (type, method key): the three insertion-ordered
/// closure pools, the captured original implementation, and the shared call
/// interface the trampoline dispatches through.
///
/// A context is created when the first closure registers for its key and
/// destroyed (restoring the original implementation) when the last one
/// unregisters. Structural mutation happens behind the engine's admission
/// lock; invocations snapshot the pools without it, so a closure removed
/// mid-flight may or may not be observed by in-flight calls.
pub struct HookContext {
    type_id: TypeId,
    key: MethodKey,
    interface: Arc<CallInterface>,
    original: Implementation,
    before: RwLock<Vec<HookClosureRc>>,
    instead: RwLock<Vec<HookClosureRc>>,
    after: RwLock<Vec<HookClosureRc>>,
}

impl HookContext {
    pub(crate) fn new(
        type_id: TypeId,
        key: MethodKey,
        interface: Arc<CallInterface>,
        original: Implementation,
    ) -> Self {
        HookContext {
            type_id,
            key,
            interface,
            original,
            before: RwLock::new(Vec::new()),
            instead: RwLock::new(Vec::new()),
            after: RwLock::new(Vec::new()),
        }
    }

    /// The type this context is keyed on (a shadow type for instance hooks).
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The method key this context is keyed on.
    #[must_use]
    pub fn key(&self) -> &MethodKey {
        &self.key
    }

    pub(crate) fn original(&self) -> &Implementation {
        &self.original
    }

    fn pool(&self, mode: HookMode) -> &RwLock<Vec<HookClosureRc>> {
        match mode {
            HookMode::Before => &self.before,
            HookMode::Instead => &self.instead,
            HookMode::After => &self.after,
        }
    }

    /// Append a closure to its mode's pool, rejecting duplicates.
    pub(crate) fn register(&self, mode: HookMode, closure: &HookClosureRc) -> Result<()> {
        let mut pool = write_lock!(self.pool(mode));
        if pool.iter().any(|member| Arc::ptr_eq(member, closure)) {
            return Err(DuplicateHook {
                key: self.key.clone(),
                mode,
            });
        }
        pool.push(Arc::clone(closure));
        Ok(())
    }

    /// Remove a closure from its mode's pool; `true` if it was present.
    pub(crate) fn unregister(&self, mode: HookMode, closure: &HookClosureRc) -> bool {
        let mut pool = write_lock!(self.pool(mode));
        let len = pool.len();
        pool.retain(|member| !Arc::ptr_eq(member, closure));
        pool.len() != len
    }

    /// Total closures across all three pools.
    pub(crate) fn live_count(&self) -> usize {
        read_lock!(self.before).len()
            + read_lock!(self.instead).len()
            + read_lock!(self.after).len()
    }

    /// Execute the invocation plan.
    ///
    /// 1. before pool in reverse insertion order
    /// 2. instead chain, last-registered outermost, terminating at the
    ///    captured original implementation
    /// 3. after pool in reverse insertion order
    /// 4. return the chain's value
    pub(crate) fn fire(&self, env: &CallEnv<'_>) -> Result<Value> {
        self.interface.validate_call(&env.receiver, env.args)?;

        let before = read_lock!(self.before).clone();
        let instead = read_lock!(self.instead).clone();
        let after = read_lock!(self.after).clone();

        for closure in before.iter().rev() {
            closure.invoke(&Invocation {
                receiver: env.receiver.clone(),
                key: env.key.clone(),
                args: env.args,
                original: None,
            })?;
        }

        let result = self.call_chain(env.runtime, &env.receiver, &env.key, &instead, env.args)?;

        for closure in after.iter().rev() {
            closure.invoke(&Invocation {
                receiver: env.receiver.clone(),
                key: env.key.clone(),
                args: env.args,
                original: None,
            })?;
        }

        self.interface.validate_return(&result)?;
        Ok(result)
    }

    /// Invoke one link of the instead chain: the last closure of `chain`
    /// wraps the rest, and an empty chain reaches the captured original.
    pub(crate) fn call_chain<'a>(
        &'a self,
        runtime: &'a Runtime,
        receiver: &'a Value,
        key: &'a MethodKey,
        chain: &'a [HookClosureRc],
        args: &'a [Value],
    ) -> Result<Value> {
        match chain.split_last() {
            Some((outer, rest)) => outer.invoke(&Invocation {
                receiver: receiver.clone(),
                key: key.clone(),
                args,
                original: Some(OriginalCall {
                    context: self,
                    runtime,
                    receiver,
                    key,
                    chain: rest,
                }),
            }),
            None => self.interface.invoke(
                &self.original,
                &CallEnv {
                    runtime,
                    receiver: receiver.clone(),
                    key: key.clone(),
                    args,
                },
            ),
        }
    }
}
