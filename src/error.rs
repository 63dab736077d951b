use thiserror::Error;

use crate::hook::HookMode;
use crate::runtime::{InstanceId, MethodKey, TypeId};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::MalformedEncoding {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::MalformedEncoding {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! internal_error {
    ($msg:expr) => {
        crate::Error::Internal {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Internal {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all possible error conditions that can occur during signature parsing,
/// closure/method shape matching, and hook installation or teardown. Each variant provides
/// specific context about the failure mode to enable appropriate error handling.
///
/// # Error Categories
///
/// ## Signature Errors
/// - [`Error::NotIntrospectable`] - Closure carries no usable signature
/// - [`Error::MalformedEncoding`] - Corrupted or unsupported type-encoding string
/// - [`Error::RecursionLimit`] - Nested encoding exceeds the parser depth limit
/// - [`Error::EmptyAggregate`] - Aggregate encoding with zero members
/// - [`Error::ZeroSizedAggregate`] - Aggregate whose computed layout has no size
/// - [`Error::ClosureArity`] - Closure parameter count incompatible with the method
/// - [`Error::ClosureParameter`] - Closure parameter type incompatible with the method
/// - [`Error::ClosureReturn`] - Closure return type incompatible with the hooking mode
/// - [`Error::OriginalCallbackShape`] - Instead-closure's original-callback parameter malformed
///
/// ## Target Errors
/// - [`Error::TypeNotFound`] - Type id absent from the runtime registry
/// - [`Error::InstanceNotFound`] - Instance id absent from the runtime registry
/// - [`Error::MethodNotFound`] - Method key absent from the target's ancestry
/// - [`Error::TargetKind`] - Entry point used with the wrong flavor of target
///
/// ## Restriction and State Errors
/// - [`Error::DeniedMethod`] - Method key on the engine's deny list
/// - [`Error::SentinelRequired`] - Destruction hooking requires the sentinel path
/// - [`Error::DuplicateHook`] - Same closure already registered for this mode
/// - [`Error::IncompatibleShadow`] - Foreign shadow refuses the requested override
/// - [`Error::UnsupportedObservation`] - Observation layer does not support overriding the slot
///
/// ## Infrastructure Errors
/// - [`Error::LockFailure`] - Thread synchronization failure
/// - [`Error::Internal`] - Defensive assertion failure with source location
///
/// # Examples
///
/// ```rust
/// use graft::{Engine, Error, HookClosure, HookMode, Runtime, Value};
/// use std::sync::Arc;
///
/// # fn example() -> graft::Result<()> {
/// let runtime = Arc::new(Runtime::new());
/// let engine = Engine::new(runtime.clone());
///
/// let closure = HookClosure::new("v@?", |_inv| Ok(Value::Unit))?;
/// match engine.hook_type(graft::TypeId::new(99), "missing".into(), HookMode::Before, closure) {
///     Err(Error::TypeNotFound(id)) => eprintln!("no such type: {id}"),
///     Err(e) => eprintln!("other error: {e}"),
///     Ok(_) => unreachable!(),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Signature errors
    /// The closure does not expose a signature.
    ///
    /// Every hookable closure must carry a raw type-encoding string beginning
    /// with its own invocable marker. An empty encoding, or one whose first
    /// parameter is not the marker, cannot be matched against any method.
    #[error("Closure is not introspectable - no usable signature")]
    NotIntrospectable,

    /// The type-encoding string is damaged or uses unsupported constructs.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed encoding - {file}:{line}: {message}")]
    MalformedEncoding {
        /// The message to be printed for the malformed encoding
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Recursion limit reached while parsing a nested encoding.
    ///
    /// Aggregates, pointers and invocable signatures nest; a maximum depth is
    /// enforced to prevent stack overflow on hostile input. The associated
    /// value shows the limit that was reached.
    #[error("Reached the maximum encoding nesting level allowed - {0}")]
    RecursionLimit(usize),

    /// An aggregate encoding contains zero members.
    ///
    /// The call-interface layer cannot describe an aggregate without members,
    /// so such encodings are rejected during parsing.
    #[error("Aggregate encoding has zero members")]
    EmptyAggregate,

    /// An aggregate's computed layout occupies no storage.
    ///
    /// Zero-sized aggregates cannot be passed by value through the generic
    /// call interface and are rejected when the layout is computed.
    #[error("Aggregate type is zero-sized")]
    ZeroSizedAggregate,

    /// The closure's parameter count is incompatible with the method.
    #[error("Closure arity mismatch - method has {method} parameter(s), closure has {closure}")]
    ClosureArity {
        /// Parameter count of the hooked method
        method: usize,
        /// Parameter count declared by the closure
        closure: usize,
    },

    /// A closure parameter's type is incompatible with the method.
    #[error("Closure parameter {index} mismatch - expected '{expected}', found '{found}'")]
    ClosureParameter {
        /// Zero-based index of the offending closure parameter
        index: usize,
        /// Canonical rendering of the expected encoding
        expected: String,
        /// Canonical rendering of the encoding the closure declared
        found: String,
    },

    /// The closure's return type is incompatible with the hooking mode.
    ///
    /// Before- and after-closures must return void; an instead-closure must
    /// return exactly what the method returns.
    #[error("Closure return mismatch - expected '{expected}', found '{found}'")]
    ClosureReturn {
        /// Canonical rendering of the expected return encoding
        expected: String,
        /// Canonical rendering of the return encoding the closure declared
        found: String,
    },

    /// The instead-closure's first parameter is not a well-formed original-callback.
    ///
    /// An instead-closure receives the next implementation in the chain as its
    /// first parameter; that parameter must be invocable and carry a signature
    /// identical to the hooked method's.
    #[error("Malformed original-callback shape - {0}")]
    OriginalCallbackShape(String),

    /// A value crossing the call interface does not fit its declared category.
    ///
    /// Raised by the generic call interface when an argument, receiver or
    /// return value fails validation against the ABI category its encoding
    /// classifies to.
    #[error("Value at {slot} does not fit its declared category '{expected}'")]
    MistypedValue {
        /// Which slot failed ("receiver", "return" or "argument N")
        slot: String,
        /// Canonical rendering of the declared encoding
        expected: String,
    },

    // Target errors
    /// The requested type id is not present in the runtime registry.
    #[error("Type {0} not found in the runtime registry")]
    TypeNotFound(TypeId),

    /// The requested instance id is not present in the runtime registry.
    #[error("Instance {0} not found in the runtime registry")]
    InstanceNotFound(InstanceId),

    /// The method key is absent from the target type and its entire ancestry.
    #[error("Method '{key}' not found on type {type_id} or its ancestors")]
    MethodNotFound {
        /// The method key that was looked up
        key: MethodKey,
        /// The type at which resolution started
        type_id: TypeId,
    },

    /// An entry point was used with the wrong flavor of target.
    ///
    /// Occurs when an instance-only operation (such as sentinel attachment)
    /// receives a type target, or vice versa.
    #[error("Target kind mismatch - {0}")]
    TargetKind(String),

    // Restriction errors
    /// The method key is on the engine's deny list of unsafe lifecycle primitives.
    #[error("Method '{0}' is on the deny list and cannot be hooked")]
    DeniedMethod(MethodKey),

    // State errors
    /// Destruction hooking on this object kind must use the sentinel path.
    ///
    /// Kinds with a fixed destruction fast path have no mutable table slot for
    /// their destructor; only tail-attached after-destruction closures work.
    #[error("Object kind has a fixed destruction path - use the after-destroy-by-tail variant")]
    SentinelRequired,

    /// The same closure is already registered for this mode on this context.
    #[error("Closure already registered for mode '{mode}' on method '{key}'")]
    DuplicateHook {
        /// The method key of the existing registration
        key: MethodKey,
        /// The mode of the existing registration
        mode: HookMode,
    },

    /// The instance carries a foreign shadow that refuses the requested override.
    #[error("Incompatible foreign shadow '{0}' refuses the requested override")]
    IncompatibleShadow(String),

    /// The instance's observation layer does not support overriding this slot.
    #[error("Observation layer does not support overriding method '{0}'")]
    UnsupportedObservation(MethodKey),

    // Infrastructure errors
    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically when
    /// trying to acquire a mutex or rwlock that is in an invalid state.
    #[error("Failed to lock target")]
    LockFailure,

    /// A defensive assertion failed.
    ///
    /// Indicates a bug in the engine's own bookkeeping rather than misuse of
    /// the API. The source location is included for diagnosis.
    #[error("Internal - {file}:{line}: {message}")]
    Internal {
        /// The message describing the failed assertion
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}
