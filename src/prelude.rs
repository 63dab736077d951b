//! # graft Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! from the graft library. Import this module to get quick access to the
//! essential types for method interception.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all graft operations
pub use crate::Error;

/// The result type used throughout graft
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The hooking facade
pub use crate::hook::{Engine, EngineConfig};

/// The modeled host runtime
pub use crate::runtime::{Runtime, TypeBuilder};

// ================================================================================================
// Hooking Surface
// ================================================================================================

/// Closures, modes, targets and tokens
pub use crate::hook::{
    CancelOutcome, HookClosure, HookClosureRc, HookMode, HookTarget, HookToken, Invocation,
    OriginalCall,
};

/// Shadow-stack classification
pub use crate::hook::{DetectionConfig, ShadowClass};

// ================================================================================================
// Runtime Surface
// ================================================================================================

/// Identifiers for types, instances and method slots
pub use crate::runtime::{InstanceId, MethodKey, TypeId};

/// Values, implementations and the call environment
pub use crate::runtime::{CallEnv, Callable, Implementation, Value};

// ================================================================================================
// Signatures and ABI
// ================================================================================================

/// Parsed signatures
pub use crate::encoding::{CallSignature, TypeEncoding};

/// The generic call interface
pub use crate::abi::{AbiCategory, CallInterface};
