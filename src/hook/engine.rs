use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::{
    abi::{CallInterface, InterfaceCache},
    encoding::CallSignature,
    hook::{
        closure::HookClosureRc,
        compat::{self, DetectionConfig, ShadowClass},
        context::HookContext,
        matcher, overrider,
        overrider::OverrideEntry,
        subtype::{self, ShadowRecord},
        token::{CancelOutcome, HookToken, TokenSlot},
        trampoline::{self, ContextKey},
        HookMode, HookTarget,
    },
    runtime::{InstanceId, MethodKey, Runtime, TypeId, DESTROY_METHOD},
    Error::{DeniedMethod, SentinelRequired, TargetKind},
    Result,
};

/// Engine-wide policy knobs.
///
/// The deny list blocks hooking of unsafe lifecycle primitives through the
/// generic entry points; the dedicated destruction entry points route the
/// destructor deliberately and bypass it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Method keys the generic entry points refuse to hook
    pub deny_list: Vec<MethodKey>,
    /// Shadow-classification heuristics
    pub detection: DetectionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            deny_list: vec![
                MethodKey::new(DESTROY_METHOD),
                MethodKey::new("alloc"),
                MethodKey::new("retain"),
                MethodKey::new("release"),
            ],
            detection: DetectionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// No deny list, no name-pattern detection.
    #[must_use]
    pub fn permissive() -> Self {
        EngineConfig {
            deny_list: Vec::new(),
            detection: DetectionConfig::permissive(),
        }
    }
}

/// State mutated only behind the admission lock.
struct AdmissionState {
    overrides: HashMap<ContextKey, OverrideEntry>,
    shadows: HashMap<TypeId, ShadowRecord>,
    instance_hooks: HashMap<InstanceId, usize>,
}

/// Everything the engine, its trampolines and its tokens share.
pub(crate) struct EngineShared {
    runtime: Arc<Runtime>,
    config: EngineConfig,
    contexts: DashMap<ContextKey, Arc<HookContext>>,
    interfaces: InterfaceCache,
    admission: Mutex<AdmissionState>,
}

impl EngineShared {
    /// The dispatcher's context lookup; runs without the admission lock.
    pub(crate) fn context(&self, key: &ContextKey) -> Option<Arc<HookContext>> {
        self.contexts.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove one registration; the engine half of [`HookToken::cancel`].
    pub(crate) fn cancel(
        self: &Arc<Self>,
        slot: &TokenSlot,
        closure: &HookClosureRc,
    ) -> CancelOutcome {
        match slot {
            TokenSlot::Context {
                key,
                mode,
                instance,
            } => {
                let mut state = lock!(self.admission);
                let Some(context) = self.context(key) else {
                    return CancelOutcome::AlreadyGone;
                };
                if !context.unregister(*mode, closure) {
                    return CancelOutcome::AlreadyGone;
                }

                let mut outcome = CancelOutcome::Removed;
                if context.live_count() == 0 {
                    self.contexts.remove(key);
                    overrider::release(
                        &self.runtime,
                        key.0,
                        &key.1,
                        &mut state.overrides,
                        context.original(),
                    );
                    log::debug!("context for '{}' on {} destroyed", key.1, key.0);
                    outcome = CancelOutcome::RemovedLast;
                }

                if let Some(id) = instance {
                    if let Some(count) = state.instance_hooks.get_mut(id) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            state.instance_hooks.remove(id);
                            subtype::release_shadow(&self.runtime, &mut state.shadows, key.0);
                        }
                    }
                }
                outcome
            }
            TokenSlot::Sentinel { instance, flag } => {
                let _state = lock!(self.admission);
                match self.runtime.record(*instance) {
                    Ok(record) => record.sentinel().cancel(flag),
                    Err(_) => CancelOutcome::AlreadyGone,
                }
            }
        }
    }
}

/// The hooking facade: validates, serializes structural mutation behind one
/// admission point, and issues cancellable tokens.
///
/// One engine instance owns all hook state for the runtime it was built on;
/// there are no ambient statics. Trampoline *invocation* is not serialized by
/// the admission point and runs concurrently on whatever threads call the
/// hooked methods.
///
/// # Example
///
/// ```rust
/// use graft::{Engine, HookClosure, HookMode, Implementation, Runtime, Value};
/// use std::sync::Arc;
///
/// let runtime = Arc::new(Runtime::new());
/// let calculator = runtime.type_builder("Calculator").build()?;
/// runtime.define_method(
///     calculator,
///     "sum".into(),
///     "q@:qq",
///     Implementation::new(|env| {
///         Ok(Value::Int(
///             env.args[0].as_int().unwrap_or(0) + env.args[1].as_int().unwrap_or(0),
///         ))
///     }),
/// )?;
///
/// let engine = Engine::new(Arc::clone(&runtime));
/// let doubler = HookClosure::new("q@?@?<q@:qq>qq", |inv| {
///     let a = inv.arg(0).and_then(Value::as_int).unwrap_or(0);
///     let b = inv.arg(1).and_then(Value::as_int).unwrap_or(0);
///     inv.original().unwrap().call(&[Value::Int(a * 2), Value::Int(b * 2)])
/// })?;
/// let token = engine.hook_type(calculator, "sum".into(), HookMode::Instead, doubler)?;
///
/// let calc = runtime.alloc(calculator)?;
/// let sum = runtime.send(calc, "sum".into(), &[Value::Int(3), Value::Int(4)])?;
/// assert_eq!(sum, Value::Int(14));
///
/// token.cancel();
/// # Ok::<(), graft::Error>(())
/// ```
pub struct Engine {
    shared: Arc<EngineShared>,
}

impl Engine {
    /// Create an engine over a runtime with the default configuration.
    #[must_use]
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Engine::with_config(runtime, EngineConfig::default())
    }

    /// Create an engine over a runtime with an explicit configuration.
    #[must_use]
    pub fn with_config(runtime: Arc<Runtime>, config: EngineConfig) -> Self {
        Engine {
            shared: Arc::new(EngineShared {
                runtime,
                config,
                contexts: DashMap::new(),
                interfaces: InterfaceCache::new(),
                admission: Mutex::new(AdmissionState {
                    overrides: HashMap::new(),
                    shadows: HashMap::new(),
                    instance_hooks: HashMap::new(),
                }),
            }),
        }
    }

    /// The runtime this engine instruments.
    #[must_use]
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.shared.runtime
    }

    /// Hook a method for every instance of a type, or for one instance only.
    ///
    /// # Errors
    /// Returns signature, target, restriction and state errors per the
    /// crate-level rules. A failed registration leaves no partial state.
    pub fn hook(
        &self,
        target: HookTarget,
        key: MethodKey,
        mode: HookMode,
        closure: HookClosureRc,
    ) -> Result<HookToken> {
        match target {
            HookTarget::Type(type_id) => self.hook_type(type_id, key, mode, closure),
            HookTarget::Instance(instance) => self.hook_instance(instance, key, mode, closure),
        }
    }

    /// Hook a method for every instance of a type.
    ///
    /// # Errors
    /// See [`Engine::hook`].
    pub fn hook_type(
        &self,
        type_id: TypeId,
        key: MethodKey,
        mode: HookMode,
        closure: HookClosureRc,
    ) -> Result<HookToken> {
        self.deny_check(&key)?;
        let mut state = lock!(self.shared.admission);
        self.register_at(&mut state, type_id, key, mode, &closure, None)
    }

    /// Hook one of a type's class-level methods (keyed to the type object
    /// itself).
    ///
    /// # Errors
    /// See [`Engine::hook`].
    pub fn hook_class_method(
        &self,
        type_id: TypeId,
        key: MethodKey,
        mode: HookMode,
        closure: HookClosureRc,
    ) -> Result<HookToken> {
        self.deny_check(&key)?;
        let meta = self.shared.runtime.meta_of(type_id)?;
        let mut state = lock!(self.shared.admission);
        self.register_at(&mut state, meta, key, mode, &closure, None)
    }

    /// Hook a method for one specific instance via a shadow type.
    ///
    /// # Errors
    /// See [`Engine::hook`]; additionally refuses instances whose current
    /// shadow layer does not support overriding the slot.
    pub fn hook_instance(
        &self,
        instance: InstanceId,
        key: MethodKey,
        mode: HookMode,
        closure: HookClosureRc,
    ) -> Result<HookToken> {
        self.deny_check(&key)?;
        let mut state = lock!(self.shared.admission);
        self.register_instance(&mut state, instance, key, mode, &closure)
    }

    /// Run a closure before the destructor.
    ///
    /// # Errors
    /// Returns [`SentinelRequired`] for kinds with a fixed destruction path;
    /// otherwise see [`Engine::hook`].
    pub fn hook_before_destroy(
        &self,
        target: HookTarget,
        closure: HookClosureRc,
    ) -> Result<HookToken> {
        self.hook_destroy(target, HookMode::Before, closure)
    }

    /// Run a closure after the destructor.
    ///
    /// # Errors
    /// Returns [`SentinelRequired`] for kinds with a fixed destruction path;
    /// otherwise see [`Engine::hook`].
    pub fn hook_after_destroy(
        &self,
        target: HookTarget,
        closure: HookClosureRc,
    ) -> Result<HookToken> {
        self.hook_destroy(target, HookMode::After, closure)
    }

    /// Replace the destructor, receiving the original as a callable.
    ///
    /// # Errors
    /// Returns [`SentinelRequired`] for kinds with a fixed destruction path;
    /// otherwise see [`Engine::hook`].
    pub fn hook_instead_destroy(
        &self,
        target: HookTarget,
        closure: HookClosureRc,
    ) -> Result<HookToken> {
        self.hook_destroy(target, HookMode::Instead, closure)
    }

    /// Queue an after-destruction closure on the instance's sentinel.
    ///
    /// This path works uniformly for every object kind, including those with
    /// a fixed destruction fast path, and supports only after-destruction
    /// semantics: the closure shape is validated like an after-hook on the
    /// destructor.
    ///
    /// # Errors
    /// Returns [`TargetKind`] for a type target, [`crate::Error::InstanceNotFound`]
    /// for a dead instance, and signature errors for incompatible closures.
    pub fn hook_after_destroy_by_tail(
        &self,
        target: HookTarget,
        closure: HookClosureRc,
    ) -> Result<HookToken> {
        let HookTarget::Instance(instance) = target else {
            return Err(TargetKind(
                "after-destroy-by-tail requires an instance target".to_string(),
            ));
        };

        let destructor = CallSignature::parse("v@:")?;
        matcher::check_closure(HookMode::After, &destructor, closure.signature())?;

        let _state = lock!(self.shared.admission);
        let record = self.shared.runtime.record(instance)?;
        let flag = record.sentinel().attach(&closure)?;
        log::debug!("after-destroy closure queued by tail on {instance}");

        Ok(HookToken::new(
            Arc::downgrade(&self.shared),
            Arc::downgrade(&closure),
            TokenSlot::Sentinel { instance, flag },
        ))
    }

    /// Whether a (type, method key) currently has a live context.
    #[must_use]
    pub fn is_hooked(&self, type_id: TypeId, key: &MethodKey) -> bool {
        self.shared.contexts.contains_key(&(type_id, key.clone()))
    }

    /// Number of live hook contexts.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.shared.contexts.len()
    }

    /// Number of cached call-interface descriptors.
    #[must_use]
    pub fn cached_interfaces(&self) -> usize {
        self.shared.interfaces.len()
    }

    /// Classify what currently sits in an instance's type slot.
    ///
    /// # Errors
    /// Returns [`crate::Error::InstanceNotFound`] for a dead instance.
    pub fn classify_instance(&self, instance: InstanceId) -> Result<ShadowClass> {
        let state = lock!(self.shared.admission);
        let current = self.shared.runtime.instance_type(instance)?;
        compat::classify(
            &self.shared.runtime,
            &self.shared.config.detection,
            &state.shadows,
            current,
        )
    }

    fn deny_check(&self, key: &MethodKey) -> Result<()> {
        if self.shared.config.deny_list.contains(key) {
            return Err(DeniedMethod(key.clone()));
        }
        Ok(())
    }

    /// Resolve the method, fetch its interface and match the closure shape.
    /// Everything fallible happens here, before any mutation.
    fn validate(
        &self,
        type_id: TypeId,
        key: &MethodKey,
        mode: HookMode,
        closure: &HookClosureRc,
    ) -> Result<Arc<CallInterface>> {
        let (_, slot) = self.shared.runtime.resolve(type_id, key)?;
        let interface = self.shared.interfaces.get_or_build(slot.encoding())?;
        matcher::check_closure(mode, interface.signature(), closure.signature())?;
        Ok(interface)
    }

    fn register_at(
        &self,
        state: &mut AdmissionState,
        type_id: TypeId,
        key: MethodKey,
        mode: HookMode,
        closure: &HookClosureRc,
        instance: Option<InstanceId>,
    ) -> Result<HookToken> {
        let interface = self.validate(type_id, &key, mode, closure)?;
        let runtime = &self.shared.runtime;
        let context_key: ContextKey = (type_id, key.clone());

        let context = match self.shared.context(&context_key) {
            Some(context) => context,
            None => {
                let (_, slot) = runtime.resolve(type_id, &key)?;
                let original = slot.implementation();
                let local = overrider::ensure_local(runtime, type_id, &key, &mut state.overrides)?;

                let context = Arc::new(HookContext::new(
                    type_id,
                    key.clone(),
                    interface,
                    original.clone(),
                ));
                self.shared
                    .contexts
                    .insert(context_key.clone(), Arc::clone(&context));
                local.replace(trampoline::synthesize(
                    &self.shared,
                    context_key.clone(),
                    original,
                ));
                log::debug!("trampoline installed for '{key}' on {type_id}");
                context
            }
        };

        context.register(mode, closure)?;
        if let Some(id) = instance {
            *state.instance_hooks.entry(id).or_insert(0) += 1;
        }

        Ok(HookToken::new(
            Arc::downgrade(&self.shared),
            Arc::downgrade(closure),
            TokenSlot::Context {
                key: context_key,
                mode,
                instance,
            },
        ))
    }

    fn register_instance(
        &self,
        state: &mut AdmissionState,
        instance: InstanceId,
        key: MethodKey,
        mode: HookMode,
        closure: &HookClosureRc,
    ) -> Result<HookToken> {
        // validate against the current chain first, so a rejected closure
        // leaves no shadow behind
        let current = self.shared.runtime.instance_type(instance)?;
        self.validate(current, &key, mode, closure)?;

        let shadow = subtype::ensure_shadow(
            &self.shared.runtime,
            &self.shared.config.detection,
            &mut state.shadows,
            instance,
            &key,
            mode,
        )?;
        self.register_at(state, shadow, key, mode, closure, Some(instance))
    }

    fn hook_destroy(
        &self,
        target: HookTarget,
        mode: HookMode,
        closure: HookClosureRc,
    ) -> Result<HookToken> {
        let runtime = &self.shared.runtime;
        let key = MethodKey::new(DESTROY_METHOD);
        match target {
            HookTarget::Type(type_id) => {
                if runtime.destruction_is_fixed(type_id)? {
                    return Err(SentinelRequired);
                }
                let mut state = lock!(self.shared.admission);
                self.register_at(&mut state, type_id, key, mode, &closure, None)
            }
            HookTarget::Instance(instance) => {
                let current = runtime.instance_type(instance)?;
                if runtime.destruction_is_fixed(current)? {
                    return Err(SentinelRequired);
                }
                let mut state = lock!(self.shared.admission);
                self.register_instance(&mut state, instance, key, mode, &closure)
            }
        }
    }
}
