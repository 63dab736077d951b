use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use dashmap::DashMap;

use crate::runtime::{InstanceId, MethodKey, Runtime, TypeId};
use crate::Result;

/// Method key under which a type's destructor is dispatched.
pub const DESTROY_METHOD: &str = "destroy";

/// An invocable value passed through a call (distinct from hook closures,
/// which carry a signature and are registered with the engine).
#[derive(Clone)]
pub struct Callable(Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>);

impl Callable {
    /// Wrap a function as an invocable value.
    pub fn new(body: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static) -> Self {
        Callable(Arc::new(body))
    }

    /// Invoke with the given arguments.
    ///
    /// # Errors
    /// Propagates whatever the wrapped function returns.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.0)(args)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(..)")
    }
}

/// A dynamic value crossing the generic call interface.
///
/// The interface validates values against the ABI category their declared
/// encoding classifies to; see [`crate::abi::CallInterface`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value (void)
    #[default]
    Unit,
    /// Boolean
    Bool(bool),
    /// Signed integer of any declared width
    Int(i64),
    /// Unsigned integer of any declared width
    UInt(u64),
    /// Floating-point of any declared width
    Float(f64),
    /// An opaque pointer word (C strings, raw pointers)
    Raw(u64),
    /// A reference to a live instance
    Instance(InstanceId),
    /// A reference to a type object
    Type(TypeId),
    /// A method key value
    Key(MethodKey),
    /// A by-value aggregate with ordered members
    Aggregate(Vec<Value>),
    /// An invocable value
    Invocable(Callable),
}

impl Value {
    /// The contained signed integer, if this is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// The contained unsigned integer, if this is one.
    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(value) => Some(*value),
            _ => None,
        }
    }

    /// The contained float, if this is one.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// The contained bool, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The referenced instance, if this is an instance reference.
    #[must_use]
    pub fn as_instance(&self) -> Option<InstanceId> {
        match self {
            Value::Instance(id) => Some(*id),
            _ => None,
        }
    }

    /// The referenced type, if this is a type reference.
    #[must_use]
    pub fn as_type(&self) -> Option<TypeId> {
        match self {
            Value::Type(id) => Some(*id),
            _ => None,
        }
    }
}

/// Everything an implementation sees when it is invoked.
pub struct CallEnv<'a> {
    /// The runtime the call executes in
    pub runtime: &'a Runtime,
    /// The receiver: an instance reference, or a type reference for
    /// class-level methods
    pub receiver: Value,
    /// The method key the call was dispatched under
    pub key: MethodKey,
    /// The declared arguments (everything after receiver and key)
    pub args: &'a [Value],
}

/// Boxed body type of an [`Implementation`].
pub type ImplementationBody = dyn Fn(&CallEnv<'_>) -> Result<Value> + Send + Sync;

/// Where an installed implementation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImplOrigin {
    /// Registered by the host
    Host,
    /// A locality forwarder installed ahead of a trampoline
    Forwarder,
    /// A synthesized intercepting trampoline
    Trampoline,
}

/// An opaque invocable implementation occupying a method-table slot.
///
/// Implementations are reference-counted; cloning shares the body. Identity
/// comparisons (used when restoring a slot) are by reference, never by shape.
#[derive(Clone)]
pub struct Implementation {
    body: Arc<ImplementationBody>,
    origin: ImplOrigin,
}

impl Implementation {
    /// Wrap a host-provided method body.
    pub fn new(body: impl Fn(&CallEnv<'_>) -> Result<Value> + Send + Sync + 'static) -> Self {
        Implementation {
            body: Arc::new(body),
            origin: ImplOrigin::Host,
        }
    }

    pub(crate) fn forwarder(
        body: impl Fn(&CallEnv<'_>) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Implementation {
            body: Arc::new(body),
            origin: ImplOrigin::Forwarder,
        }
    }

    pub(crate) fn trampoline(
        body: impl Fn(&CallEnv<'_>) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Implementation {
            body: Arc::new(body),
            origin: ImplOrigin::Trampoline,
        }
    }

    /// Invoke the implementation.
    ///
    /// # Errors
    /// Propagates whatever the body returns.
    pub fn call(&self, env: &CallEnv<'_>) -> Result<Value> {
        (self.body)(env)
    }

    /// Reference identity with another implementation.
    #[must_use]
    pub fn same_as(&self, other: &Implementation) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Implementation({:?})", self.origin)
    }
}

/// One entry of a type's method table: the slot's raw encoding plus its
/// current implementation.
///
/// The implementation is replaceable in place; the encoding is fixed for the
/// slot's lifetime.
pub struct MethodSlot {
    key: MethodKey,
    encoding: Box<str>,
    implementation: RwLock<Implementation>,
}

impl MethodSlot {
    pub(crate) fn new(key: MethodKey, encoding: &str, implementation: Implementation) -> Self {
        MethodSlot {
            key,
            encoding: Box::from(encoding),
            implementation: RwLock::new(implementation),
        }
    }

    /// The method key this slot answers to.
    #[must_use]
    pub fn key(&self) -> &MethodKey {
        &self.key
    }

    /// The slot's raw type-encoding string.
    #[must_use]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// The slot's current implementation.
    #[must_use]
    pub fn implementation(&self) -> Implementation {
        read_lock!(self.implementation).clone()
    }

    /// Swap the slot's implementation, returning the previous one.
    pub(crate) fn replace(&self, implementation: Implementation) -> Implementation {
        std::mem::replace(&mut write_lock!(self.implementation), implementation)
    }
}

impl fmt::Debug for MethodSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodSlot({} '{}')", self.key, self.encoding)
    }
}

/// A runtime type record: a parent link and a mutable method table.
///
/// Descriptors are created by the host through [`crate::runtime::TypeBuilder`]
/// or synthesized by the engine (shadow types). The optional identity override
/// models observation mechanisms that report a different type than the one
/// actually stored in an instance's type slot.
pub struct TypeDescriptor {
    id: TypeId,
    name: Box<str>,
    parent: Option<TypeId>,
    methods: DashMap<MethodKey, Arc<MethodSlot>>,
    meta: OnceLock<TypeId>,
    identity_override: Option<TypeId>,
    frozen: HashSet<MethodKey>,
    fixed_destruction: bool,
}

impl TypeDescriptor {
    pub(crate) fn new(
        id: TypeId,
        name: &str,
        parent: Option<TypeId>,
        identity_override: Option<TypeId>,
        frozen: HashSet<MethodKey>,
        fixed_destruction: bool,
    ) -> Self {
        TypeDescriptor {
            id,
            name: Box::from(name),
            parent,
            methods: DashMap::new(),
            meta: OnceLock::new(),
            identity_override,
            frozen,
            fixed_destruction,
        }
    }

    /// The descriptor's id.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The descriptor's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parent type, if any.
    #[must_use]
    pub fn parent(&self) -> Option<TypeId> {
        self.parent
    }

    /// The id this type reports as its identity.
    ///
    /// Normally the type's own id; observation mechanisms override their
    /// type-accessor to report the shadowed type instead.
    #[must_use]
    pub fn reported_identity(&self) -> TypeId {
        self.identity_override.unwrap_or(self.id)
    }

    /// Whether this type lies about its identity.
    #[must_use]
    pub fn overrides_identity(&self) -> bool {
        self.identity_override.is_some()
    }

    /// Whether this type refuses replacement of the given slot.
    #[must_use]
    pub fn is_frozen(&self, key: &MethodKey) -> bool {
        self.frozen.contains(key)
    }

    /// Whether instances of this kind destruct through the fixed,
    /// non-overridable fast path.
    #[must_use]
    pub fn fixed_destruction(&self) -> bool {
        self.fixed_destruction
    }

    /// Whether this type's own table holds the given slot.
    #[must_use]
    pub fn responds_locally(&self, key: &MethodKey) -> bool {
        self.methods.contains_key(key)
    }

    /// This type's own entry for the given slot, if present.
    #[must_use]
    pub fn local_slot(&self, key: &MethodKey) -> Option<Arc<MethodSlot>> {
        self.methods.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of slots in this type's own table.
    #[must_use]
    pub fn local_method_count(&self) -> usize {
        self.methods.len()
    }

    pub(crate) fn install_slot(&self, slot: Arc<MethodSlot>) {
        self.methods.insert(slot.key().clone(), slot);
    }

    pub(crate) fn remove_slot(&self, key: &MethodKey) -> Option<Arc<MethodSlot>> {
        self.methods.remove(key).map(|(_, slot)| slot)
    }

    pub(crate) fn meta_cell(&self) -> &OnceLock<TypeId> {
        &self.meta
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TypeDescriptor({} '{}', parent: {:?})",
            self.id, self.name, self.parent
        )
    }
}
