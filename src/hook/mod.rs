//! The interception engine: contexts, trampolines, shadows, and the facade.
//!
//! # Key Components
//!
//! - [`Engine`] - the facade serializing all structural mutation and issuing
//!   cancellable tokens
//! - [`HookClosure`] - an injectable closure with a declared signature
//! - [`HookMode`] - before / after / instead
//! - [`HookContext`] - ordered pools and the installed trampoline for one
//!   (type, method key)
//! - [`HookToken`] / [`CancelOutcome`] - cancellation handles
//! - [`ShadowClass`] / [`DetectionConfig`] - shadow-stack classification
//! - [`DestructionSentinel`] - the after-destruction side table
//!
//! # Hook anatomy
//!
//! Registering the first closure for a (type, method key) captures the slot's
//! current implementation, guarantees the slot is local to the type, and
//! installs a synthesized trampoline. Invocations then run the plan: the
//! before pool in reverse insertion order, the instead pool as a nested chain
//! (last registered outermost) terminating at the captured original, and the
//! after pool in reverse insertion order. Removing the last closure restores
//! the original implementation and destroys the context.

mod closure;
mod compat;
mod context;
mod engine;
mod matcher;
mod overrider;
mod sentinel;
mod subtype;
mod token;
mod trampoline;

pub(crate) use trampoline::ContextKey;

pub use closure::{ClosureBody, HookClosure, HookClosureRc, Invocation, OriginalCall};
pub use compat::{DetectionConfig, ShadowClass};
pub use context::HookContext;
pub use engine::{Engine, EngineConfig};
pub use sentinel::DestructionSentinel;
pub use token::{CancelOutcome, HookToken};

use strum::Display;

use crate::runtime::{InstanceId, TypeId};

/// When an injected closure runs relative to the original implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum HookMode {
    /// Run before the original implementation; cannot alter the call
    Before,
    /// Run after the original implementation; cannot alter the result
    After,
    /// Replace the original implementation, receiving it as a callable
    /// parameter to invoke (or not) at will
    Instead,
}

/// What a hook applies to: every instance of a type, or one specific instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookTarget {
    /// Hook the method for every instance of the type
    Type(TypeId),
    /// Hook the method for one instance only, via a shadow type
    Instance(InstanceId),
}

impl From<TypeId> for HookTarget {
    fn from(id: TypeId) -> Self {
        HookTarget::Type(id)
    }
}

impl From<InstanceId> for HookTarget {
    fn from(id: InstanceId) -> Self {
        HookTarget::Instance(id)
    }
}
