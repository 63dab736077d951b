use std::fmt;
use std::sync::Arc;

use crate::{
    encoding::CallSignature,
    hook::context::HookContext,
    runtime::{MethodKey, Runtime, Value},
    Error::NotIntrospectable,
    Result,
};

/// Boxed body type of a [`HookClosure`].
pub type ClosureBody = dyn Fn(&Invocation<'_>) -> Result<Value> + Send + Sync;

/// Shared handle to a registered closure.
///
/// Closure identity is by reference: registering the same handle twice for
/// the same mode on the same context is rejected, while two separately
/// constructed closures with identical bodies are distinct.
pub type HookClosureRc = Arc<HookClosure>;

/// An injectable closure: an opaque body tagged with its declared signature.
///
/// The signature is a raw type-encoding string whose first parameter must be
/// the closure's own invocable marker (`@?`). What follows the marker is
/// validated against the hooked method according to the mode at registration
/// time; see the crate-level rules.
///
/// # Example
///
/// ```rust
/// use graft::{HookClosure, Value};
///
/// // void closure taking (marker, receiver, key)
/// let logger = HookClosure::new("v@?@:", |inv| {
///     println!("called {} on {:?}", inv.key, inv.receiver);
///     Ok(Value::Unit)
/// })?;
/// assert_eq!(logger.encoding(), "v@?@:");
/// # Ok::<(), graft::Error>(())
/// ```
pub struct HookClosure {
    encoding: Box<str>,
    signature: CallSignature,
    body: Box<ClosureBody>,
}

impl HookClosure {
    /// Wrap a body with its declared encoding.
    ///
    /// # Errors
    /// Returns [`NotIntrospectable`] when the encoding is empty or its first
    /// parameter is not the invocable marker, and propagates parse errors for
    /// damaged encodings.
    pub fn new(
        encoding: &str,
        body: impl Fn(&Invocation<'_>) -> Result<Value> + Send + Sync + 'static,
    ) -> Result<HookClosureRc> {
        let signature = CallSignature::parse(encoding)?;
        if !signature
            .params
            .first()
            .is_some_and(|param| param.encoding.is_invocable())
        {
            return Err(NotIntrospectable);
        }

        Ok(Arc::new(HookClosure {
            encoding: Box::from(encoding),
            signature,
            body: Box::new(body),
        }))
    }

    /// The raw encoding the closure was declared with.
    #[must_use]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// The parsed signature.
    #[must_use]
    pub fn signature(&self) -> &CallSignature {
        &self.signature
    }

    pub(crate) fn invoke(&self, invocation: &Invocation<'_>) -> Result<Value> {
        (self.body)(invocation)
    }
}

impl fmt::Debug for HookClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookClosure('{}')", self.encoding)
    }
}

/// The view a hook body receives when its method fires.
///
/// Before- and after-closures observe the call; an instead-closure
/// additionally holds the [`OriginalCall`] handle for the next link of the
/// chain.
pub struct Invocation<'a> {
    /// The receiver the method was dispatched on
    pub receiver: Value,
    /// The method key the call was dispatched under
    pub key: MethodKey,
    /// The declared arguments as seen by this link of the chain
    pub args: &'a [Value],
    pub(crate) original: Option<OriginalCall<'a>>,
}

impl<'a> Invocation<'a> {
    /// A declared argument by index.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// The original-callback handle; present only for instead-closures.
    #[must_use]
    pub fn original(&self) -> Option<&OriginalCall<'a>> {
        self.original.as_ref()
    }
}

/// Handle an instead-closure uses to invoke the next link of its chain: the
/// next-older instead-closure, terminating at the captured original
/// implementation.
///
/// The handle is bound to the invocation's receiver and method key; only the
/// declared arguments are supplied (and may differ from the ones the closure
/// itself received).
pub struct OriginalCall<'a> {
    pub(crate) context: &'a HookContext,
    pub(crate) runtime: &'a Runtime,
    pub(crate) receiver: &'a Value,
    pub(crate) key: &'a MethodKey,
    pub(crate) chain: &'a [HookClosureRc],
}

impl OriginalCall<'_> {
    /// Invoke the next link with the given declared arguments.
    ///
    /// # Errors
    /// Propagates validation failures and whatever the invoked link returns.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        self.context
            .call_chain(self.runtime, self.receiver, self.key, self.chain, args)
    }
}
