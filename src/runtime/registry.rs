//! Central registry modeling the host runtime.
//!
//! The [`Runtime`] owns every [`TypeDescriptor`] and live instance, resolves
//! method keys through parent chains, and dispatches dynamic calls. It doubles
//! as the host services the hooking engine consumes: the type-encoding
//! provider (every slot carries its raw encoding) and the reflection service
//! (responds-to queries, slot lookup, implementation replacement).
//!
//! # Registry Architecture
//!
//! - **Type storage**: lock-free ordered map keyed by [`TypeId`]
//! - **Name index**: concurrent map from type name to id
//! - **Instances**: concurrent map from [`InstanceId`] to per-instance state
//! - **Id generation**: atomic counters; synthesized types draw from the same
//!   sequence as host-registered ones
//!
//! # Example
//!
//! ```rust
//! use graft::{Implementation, Runtime, Value};
//!
//! let runtime = Runtime::new();
//! let calculator = runtime.type_builder("Calculator").build()?;
//! runtime.define_method(
//!     calculator,
//!     "sum".into(),
//!     "q@:qq",
//!     Implementation::new(|env| {
//!         let a = env.args[0].as_int().unwrap_or(0);
//!         let b = env.args[1].as_int().unwrap_or(0);
//!         Ok(Value::Int(a + b))
//!     }),
//! )?;
//!
//! let calc = runtime.alloc(calculator)?;
//! let sum = runtime.send(calc, "sum".into(), &[Value::Int(3), Value::Int(4)])?;
//! assert_eq!(sum, Value::Int(7));
//! # Ok::<(), graft::Error>(())
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;

use crate::{
    encoding::CallSignature,
    runtime::{
        instance::InstanceRecord, CallEnv, Implementation, InstanceId, MethodKey, MethodSlot,
        TypeDescriptor, TypeId, Value, DESTROY_METHOD,
    },
    Error::{InstanceNotFound, MethodNotFound, TypeNotFound},
    Result,
};

/// The modeled host runtime: type records, method tables, and live instances.
///
/// All mutation entry points are individually thread-safe; the hooking
/// engine's admission lock provides the cross-slot atomicity it needs on top.
pub struct Runtime {
    types: SkipMap<TypeId, Arc<TypeDescriptor>>,
    names: DashMap<Box<str>, TypeId>,
    instances: DashMap<InstanceId, Arc<InstanceRecord>>,
    next_type: AtomicU32,
    next_instance: AtomicU64,
}

impl Runtime {
    /// Create an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Runtime {
            types: SkipMap::new(),
            names: DashMap::new(),
            instances: DashMap::new(),
            next_type: AtomicU32::new(0),
            next_instance: AtomicU64::new(0),
        }
    }

    /// Start building a new type record.
    #[must_use]
    pub fn type_builder<'a>(&'a self, name: &str) -> TypeBuilder<'a> {
        TypeBuilder {
            runtime: self,
            name: name.to_string(),
            parent: None,
            identity_override: None,
            frozen: Vec::new(),
            fixed_destruction: false,
        }
    }

    pub(crate) fn insert_type(
        &self,
        name: &str,
        parent: Option<TypeId>,
        identity_override: Option<TypeId>,
        frozen: Vec<MethodKey>,
        fixed_destruction: bool,
    ) -> Result<TypeId> {
        if let Some(parent) = parent {
            if self.types.get(&parent).is_none() {
                return Err(TypeNotFound(parent));
            }
        }

        let id = TypeId::new(self.next_type.fetch_add(1, Ordering::Relaxed) + 1);
        let descriptor = TypeDescriptor::new(
            id,
            name,
            parent,
            identity_override,
            frozen.into_iter().collect(),
            fixed_destruction,
        );
        self.types.insert(id, Arc::new(descriptor));
        self.names.insert(Box::from(name), id);
        Ok(id)
    }

    /// Remove a type record and its name-index entry.
    ///
    /// Used when a synthesized shadow type is released; host types normally
    /// live as long as the runtime.
    pub(crate) fn release_type(&self, id: TypeId) {
        if let Some(entry) = self.types.remove(&id) {
            self.names.remove(entry.value().name());
        }
    }

    /// Look up a type id by name.
    #[must_use]
    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.names.get(name).map(|entry| *entry.value())
    }

    /// The descriptor for a type id.
    ///
    /// # Errors
    /// Returns [`TypeNotFound`] when the id is not registered.
    pub fn descriptor(&self, id: TypeId) -> Result<Arc<TypeDescriptor>> {
        self.types
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(TypeNotFound(id))
    }

    /// Number of registered types (host-registered plus synthesized).
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// The companion meta type holding a type's class-level method table,
    /// created on first use.
    ///
    /// The meta chain mirrors the base chain: a meta type's parent is the
    /// parent type's meta.
    ///
    /// # Errors
    /// Returns [`TypeNotFound`] when the id is not registered.
    pub fn meta_of(&self, id: TypeId) -> Result<TypeId> {
        let descriptor = self.descriptor(id)?;
        if let Some(meta) = descriptor.meta_cell().get() {
            return Ok(*meta);
        }

        let parent_meta = match descriptor.parent() {
            Some(parent) => Some(self.meta_of(parent)?),
            None => None,
        };
        let name = format!("{}$meta", descriptor.name());
        let meta = self.insert_type(&name, parent_meta, None, Vec::new(), false)?;

        match descriptor.meta_cell().set(meta) {
            Ok(()) => Ok(meta),
            Err(_) => {
                // lost a race; discard ours and use the winner
                self.release_type(meta);
                descriptor
                    .meta_cell()
                    .get()
                    .copied()
                    .ok_or_else(|| internal_error!("meta cell emptied after set race"))
            }
        }
    }

    /// Register a method slot on a type's own table.
    ///
    /// The encoding string is validated before the slot is installed.
    ///
    /// # Errors
    /// Returns [`TypeNotFound`] for an unregistered type and an encoding
    /// error when the signature string does not parse.
    pub fn define_method(
        &self,
        type_id: TypeId,
        key: MethodKey,
        encoding: &str,
        implementation: Implementation,
    ) -> Result<()> {
        CallSignature::parse(encoding)?;
        let descriptor = self.descriptor(type_id)?;
        descriptor.install_slot(Arc::new(MethodSlot::new(key, encoding, implementation)));
        Ok(())
    }

    /// Register a class-level method slot, keyed to the type object itself.
    ///
    /// # Errors
    /// Returns [`TypeNotFound`] for an unregistered type and an encoding
    /// error when the signature string does not parse.
    pub fn define_class_method(
        &self,
        type_id: TypeId,
        key: MethodKey,
        encoding: &str,
        implementation: Implementation,
    ) -> Result<()> {
        let meta = self.meta_of(type_id)?;
        self.define_method(meta, key, encoding, implementation)
    }

    /// Whether the type or any ancestor answers to the method key.
    #[must_use]
    pub fn responds_to(&self, type_id: TypeId, key: &MethodKey) -> bool {
        self.resolve(type_id, key).is_ok()
    }

    /// Resolve a method key through the parent chain.
    ///
    /// Returns the owning descriptor (the first in the chain with a local
    /// entry) together with its slot.
    ///
    /// # Errors
    /// Returns [`TypeNotFound`] for an unregistered type and
    /// [`MethodNotFound`] when no type in the chain holds the slot.
    pub fn resolve(
        &self,
        type_id: TypeId,
        key: &MethodKey,
    ) -> Result<(Arc<TypeDescriptor>, Arc<MethodSlot>)> {
        let mut current = Some(type_id);
        while let Some(id) = current {
            let descriptor = self.descriptor(id)?;
            if let Some(slot) = descriptor.local_slot(key) {
                return Ok((descriptor, slot));
            }
            current = descriptor.parent();
        }
        Err(MethodNotFound {
            key: key.clone(),
            type_id,
        })
    }

    /// The raw type-encoding string of a resolved method.
    ///
    /// # Errors
    /// Propagates resolution failures.
    pub fn encoding_of(&self, type_id: TypeId, key: &MethodKey) -> Result<Box<str>> {
        let (_, slot) = self.resolve(type_id, key)?;
        Ok(Box::from(slot.encoding()))
    }

    /// Replace a type's *local* slot implementation, returning the previous
    /// one. The slot must already be local; the overrider guarantees that
    /// before any trampoline install.
    pub(crate) fn replace_implementation(
        &self,
        type_id: TypeId,
        key: &MethodKey,
        implementation: Implementation,
    ) -> Result<Implementation> {
        let descriptor = self.descriptor(type_id)?;
        let Some(slot) = descriptor.local_slot(key) else {
            return Err(internal_error!(
                "replace on non-local slot '{}' of {}",
                key,
                type_id
            ));
        };
        Ok(slot.replace(implementation))
    }

    pub(crate) fn install_local_slot(&self, type_id: TypeId, slot: Arc<MethodSlot>) -> Result<()> {
        let descriptor = self.descriptor(type_id)?;
        descriptor.install_slot(slot);
        Ok(())
    }

    pub(crate) fn remove_local_slot(&self, type_id: TypeId, key: &MethodKey) -> Result<()> {
        let descriptor = self.descriptor(type_id)?;
        descriptor.remove_slot(key);
        Ok(())
    }

    /// Allocate a new instance of a type.
    ///
    /// # Errors
    /// Returns [`TypeNotFound`] when the type is not registered.
    pub fn alloc(&self, type_id: TypeId) -> Result<InstanceId> {
        self.descriptor(type_id)?;
        let id = InstanceId::new(self.next_instance.fetch_add(1, Ordering::Relaxed) + 1);
        self.instances.insert(id, Arc::new(InstanceRecord::new(type_id)));
        Ok(id)
    }

    /// Whether the instance is still alive.
    #[must_use]
    pub fn is_alive(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    /// The type stored in the instance's type slot.
    ///
    /// # Errors
    /// Returns [`InstanceNotFound`] for a dead or unknown instance.
    pub fn instance_type(&self, id: InstanceId) -> Result<TypeId> {
        Ok(self.record(id)?.type_id())
    }

    /// The type the instance *reports* as its own.
    ///
    /// Differs from [`Runtime::instance_type`] when the stored type overrides
    /// its identity, as observation mechanisms do.
    ///
    /// # Errors
    /// Returns [`InstanceNotFound`] for a dead or unknown instance.
    pub fn reported_type(&self, id: InstanceId) -> Result<TypeId> {
        let stored = self.instance_type(id)?;
        Ok(self.descriptor(stored)?.reported_identity())
    }

    /// Overwrite the instance's type slot.
    ///
    /// This is the raw slot-mutation primitive every shadowing mechanism is
    /// built on; the engine itself only ever stacks a shadow or restores the
    /// immediately-prior type through it.
    ///
    /// # Errors
    /// Returns [`TypeNotFound`] / [`InstanceNotFound`] when either side is
    /// not registered.
    pub fn set_instance_type(&self, id: InstanceId, type_id: TypeId) -> Result<()> {
        self.descriptor(type_id)?;
        self.record(id)?.set_type_id(type_id);
        Ok(())
    }

    pub(crate) fn record(&self, id: InstanceId) -> Result<Arc<InstanceRecord>> {
        self.instances
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(InstanceNotFound(id))
    }

    /// Dispatch a method on an instance through its stored type's chain.
    ///
    /// `args` holds the declared arguments only; receiver and key are supplied
    /// by the dispatcher.
    ///
    /// # Errors
    /// Returns [`InstanceNotFound`] / [`MethodNotFound`] for resolution
    /// failures and propagates whatever the implementation returns.
    pub fn send(&self, id: InstanceId, key: MethodKey, args: &[Value]) -> Result<Value> {
        let type_id = self.instance_type(id)?;
        let (_, slot) = self.resolve(type_id, &key)?;
        let implementation = slot.implementation();
        implementation.call(&CallEnv {
            runtime: self,
            receiver: Value::Instance(id),
            key,
            args,
        })
    }

    /// Dispatch a class-level method on a type object through its meta chain.
    ///
    /// # Errors
    /// Returns [`MethodNotFound`] when no ancestor's meta table holds the
    /// slot and propagates whatever the implementation returns.
    pub fn send_type(&self, type_id: TypeId, key: MethodKey, args: &[Value]) -> Result<Value> {
        let mut current = Some(type_id);
        while let Some(id) = current {
            let descriptor = self.descriptor(id)?;
            if let Some(meta) = descriptor.meta_cell().get() {
                let (_, slot) = self.resolve(*meta, &key)?;
                let implementation = slot.implementation();
                return implementation.call(&CallEnv {
                    runtime: self,
                    receiver: Value::Type(type_id),
                    key,
                    args,
                });
            }
            current = descriptor.parent();
        }
        Err(MethodNotFound { key, type_id })
    }

    /// Whether instances whose chain starts at this type destruct through the
    /// fixed, non-overridable fast path.
    ///
    /// # Errors
    /// Returns [`TypeNotFound`] when the chain is broken.
    pub fn destruction_is_fixed(&self, type_id: TypeId) -> Result<bool> {
        let mut current = Some(type_id);
        while let Some(id) = current {
            let descriptor = self.descriptor(id)?;
            if descriptor.fixed_destruction() {
                return Ok(true);
            }
            current = descriptor.parent();
        }
        Ok(false)
    }

    /// Destroy an instance.
    ///
    /// Unless the instance's kind uses the fixed destruction fast path, the
    /// `destroy` slot is dispatched first (and is interceptable like any other
    /// method). The instance is then removed and any attached destruction
    /// sentinel fires its queued closures in reverse attachment order.
    /// Failures inside destructor code are logged and do not abort
    /// destruction.
    ///
    /// # Errors
    /// Returns [`InstanceNotFound`] for a dead or unknown instance.
    pub fn destroy(&self, id: InstanceId) -> Result<()> {
        let record = self.record(id)?;
        let type_id = record.type_id();
        let destroy_key = MethodKey::new(DESTROY_METHOD);

        if !self.destruction_is_fixed(type_id)?
            && self.responds_to(type_id, &destroy_key)
        {
            if let Err(error) = self.send(id, destroy_key, &[]) {
                log::warn!("destructor of {id} failed: {error}");
            }
        }

        self.instances.remove(&id);
        if let Some(sentinel) = record.take_sentinel() {
            sentinel.fire(id);
        }
        Ok(())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}

/// Fluent construction of a host type record.
///
/// # Example
///
/// ```rust
/// use graft::Runtime;
///
/// let runtime = Runtime::new();
/// let base = runtime.type_builder("Shape").build()?;
/// let circle = runtime
///     .type_builder("Circle")
///     .parent(base)
///     .build()?;
/// assert_eq!(runtime.descriptor(circle)?.parent(), Some(base));
/// # Ok::<(), graft::Error>(())
/// ```
pub struct TypeBuilder<'a> {
    runtime: &'a Runtime,
    name: String,
    parent: Option<TypeId>,
    identity_override: Option<TypeId>,
    frozen: Vec<MethodKey>,
    fixed_destruction: bool,
}

impl TypeBuilder<'_> {
    /// Set the parent type.
    #[must_use]
    pub fn parent(mut self, parent: TypeId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Make the type report the given id as its identity instead of its own.
    ///
    /// This models observation mechanisms that override their type-accessor.
    #[must_use]
    pub fn identity_override(mut self, reported: TypeId) -> Self {
        self.identity_override = Some(reported);
        self
    }

    /// Mark a slot as frozen: the type refuses replacement of its
    /// implementation.
    #[must_use]
    pub fn freeze(mut self, key: MethodKey) -> Self {
        self.frozen.push(key);
        self
    }

    /// Mark instances of this kind as destructing through the fixed,
    /// non-overridable fast path.
    #[must_use]
    pub fn fixed_destruction(mut self) -> Self {
        self.fixed_destruction = true;
        self
    }

    /// Register the type and return its id.
    ///
    /// # Errors
    /// Returns [`TypeNotFound`] when the declared parent is not registered.
    pub fn build(self) -> Result<TypeId> {
        self.runtime.insert_type(
            &self.name,
            self.parent,
            self.identity_override,
            self.frozen,
            self.fixed_destruction,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime_with_method() -> (Runtime, TypeId) {
        let runtime = Runtime::new();
        let type_id = runtime.type_builder("Widget").build().unwrap();
        runtime
            .define_method(
                type_id,
                "size".into(),
                "q@:",
                Implementation::new(|_| Ok(Value::Int(42))),
            )
            .unwrap();
        (runtime, type_id)
    }

    #[test]
    fn test_resolution_walks_parent_chain() {
        let (runtime, base) = runtime_with_method();
        let child = runtime.type_builder("Gadget").parent(base).build().unwrap();

        assert_eq!(runtime.type_by_name("Widget"), Some(base));
        assert!(runtime.responds_to(child, &"size".into()));
        let (owner, _) = runtime.resolve(child, &"size".into()).unwrap();
        assert_eq!(owner.id(), base);

        let gadget = runtime.alloc(child).unwrap();
        assert_eq!(
            runtime.send(gadget, "size".into(), &[]).unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn test_missing_method_reports_starting_type() {
        let (runtime, type_id) = runtime_with_method();
        let error = runtime.resolve(type_id, &"missing".into()).unwrap_err();
        assert!(matches!(
            error,
            crate::Error::MethodNotFound { type_id: at, .. } if at == type_id
        ));
    }

    #[test]
    fn test_encoding_provider_surface() {
        let (runtime, type_id) = runtime_with_method();
        assert_eq!(&*runtime.encoding_of(type_id, &"size".into()).unwrap(), "q@:");
    }

    #[test]
    fn test_class_methods_dispatch_through_meta_chain() {
        let (runtime, base) = runtime_with_method();
        runtime
            .define_class_method(
                base,
                "family".into(),
                "q#:",
                Implementation::new(|_| Ok(Value::Int(7))),
            )
            .unwrap();
        let child = runtime.type_builder("Gadget").parent(base).build().unwrap();

        assert_eq!(
            runtime.send_type(child, "family".into(), &[]).unwrap(),
            Value::Int(7)
        );
    }

    #[test]
    fn test_destroy_removes_instance() {
        let (runtime, type_id) = runtime_with_method();
        let instance = runtime.alloc(type_id).unwrap();
        assert!(runtime.is_alive(instance));

        runtime.destroy(instance).unwrap();
        assert!(!runtime.is_alive(instance));
        assert!(matches!(
            runtime.destroy(instance),
            Err(crate::Error::InstanceNotFound(_))
        ));
    }

    #[test]
    fn test_reported_type_follows_identity_override() {
        let (runtime, base) = runtime_with_method();
        let observer = runtime
            .type_builder("observed$Widget")
            .parent(base)
            .identity_override(base)
            .build()
            .unwrap();

        let instance = runtime.alloc(base).unwrap();
        runtime.set_instance_type(instance, observer).unwrap();

        assert_eq!(runtime.instance_type(instance).unwrap(), observer);
        assert_eq!(runtime.reported_type(instance).unwrap(), base);
    }
}
