// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # graft
//!
//! A dynamic method interception engine for runtimes with mutable per-type
//! method tables. `graft` lets callers inject code before, after, or instead
//! of a method's original implementation (for every instance of a type, for a
//! type's class-level methods, or for one specific instance) without touching
//! the method's declared source, plus a destruction-time variant.
//!
//! ## Features
//!
//! - **Signature matching** - arbitrary closures validated against arbitrary
//!   methods from raw type-encoding strings, per hooking mode
//! - **Generic trampolines** - one synthesized intercepting implementation per
//!   hooked slot, built from cached ABI call-interface descriptors
//! - **Ordered composition** - multiple simultaneous hooks per method with
//!   deterministic ordering and a nested instead-chain
//! - **Per-instance hooks** - shadow types scope hooks to one instance and
//!   coexist with foreign mechanisms that also mutate type slots
//! - **Cancellable tokens** - idempotent cancellation with a tri-state outcome
//!
//! ## Quick Start
//!
//! ```rust
//! use graft::prelude::*;
//! use std::sync::Arc;
//!
//! // a host runtime with one type and one method
//! let runtime = Arc::new(Runtime::new());
//! let calculator = runtime.type_builder("Calculator").build()?;
//! runtime.define_method(
//!     calculator,
//!     "sum".into(),
//!     "q@:qq",
//!     Implementation::new(|env| {
//!         Ok(Value::Int(
//!             env.args[0].as_int().unwrap_or(0) + env.args[1].as_int().unwrap_or(0),
//!         ))
//!     }),
//! )?;
//!
//! // intercept it
//! let engine = Engine::new(Arc::clone(&runtime));
//! let before = HookClosure::new("v@?@:", |inv| {
//!     println!("about to run {}", inv.key);
//!     Ok(Value::Unit)
//! })?;
//! let token = engine.hook_type(calculator, "sum".into(), HookMode::Before, before)?;
//!
//! let calc = runtime.alloc(calculator)?;
//! assert_eq!(
//!     runtime.send(calc, "sum".into(), &[Value::Int(3), Value::Int(4)])?,
//!     Value::Int(7)
//! );
//!
//! // tear down; the original implementation is back
//! assert_eq!(token.cancel(), CancelOutcome::RemovedLast);
//! # Ok::<(), graft::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `graft` is organized into several key modules:
//!
//! - [`prelude`] - convenient re-exports of commonly used types
//! - [`encoding`] - type-encoding strings parsed into structured signatures
//! - [`abi`] - ABI classification and the generic call interface
//! - [`runtime`] - the modeled host runtime (types, tables, instances)
//! - [`hook`] - contexts, trampolines, shadow types, and the [`Engine`] facade
//! - [`Error`] and [`Result`] - comprehensive error handling
//!
//! ## Concurrency
//!
//! All structural mutation (context create/destroy, pool changes, shadow and
//! override lifecycle) is serialized behind one process-wide admission point
//! per engine. Invocations of hooked methods are *not* serialized by it and
//! run concurrently; pool reads during invocation take per-pool snapshots, so
//! a closure removed mid-flight may or may not be observed by calls already in
//! progress. All hook closures run synchronously on whichever thread triggered
//! the hooked method.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use graft::prelude::*;
///
/// let runtime = Runtime::new();
/// let widget = runtime.type_builder("Widget").build()?;
/// assert!(runtime.descriptor(widget).is_ok());
/// # Ok::<(), graft::Error>(())
/// ```
pub mod prelude;

/// ABI classification and the generic call interface.
///
/// Maps parsed encodings to native ABI categories (integer, float, pointer,
/// aggregate-by-value with recursive layout) and builds the cached
/// [`abi::CallInterface`] descriptors every trampoline dispatches through.
pub mod abi;

/// Type-encoding strings and their structured form.
///
/// Parsing of raw encoding strings into [`encoding::CallSignature`] trees and
/// the structural shape comparisons used by hook registration.
pub mod encoding;

/// The interception engine: contexts, trampolines, shadows, and the
/// [`Engine`] facade.
pub mod hook;

/// The modeled host runtime: type records, method tables, instances, and
/// dynamic dispatch.
pub mod runtime;

/// `graft` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`]. Used consistently throughout the crate for all fallible
/// operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `graft` Error type
///
/// The main error type for all operations in this crate; see [`error`] module
/// docs on the variants' grouping into signature, target, restriction, state
/// and infrastructure categories.
pub use error::Error;

pub use hook::{
    CancelOutcome, DestructionSentinel, DetectionConfig, Engine, EngineConfig, HookClosure,
    HookClosureRc, HookContext, HookMode, HookTarget, HookToken, Invocation, OriginalCall,
    ShadowClass,
};
pub use runtime::{
    Callable, CallEnv, Implementation, InstanceId, MethodKey, Runtime, TypeBuilder,
    TypeDescriptor, TypeId, Value,
};
