//! The modeled host runtime: types, method tables, instances, dispatch.
//!
//! The hooking engine assumes a runtime with a per-type, mutable method table
//! and parent-chain lookup. This module supplies that runtime as an explicit
//! registry: [`TypeId`] → parent + (MethodKey → [`Implementation`]), plus a
//! live-instance table with a mutable type slot per instance.
//!
//! # Key Components
//!
//! - [`Runtime`] - the registry and dispatcher
//! - [`TypeBuilder`] - fluent host-type construction
//! - [`TypeDescriptor`] - one type record (parent link, method table)
//! - [`MethodSlot`] - one table entry (encoding + replaceable implementation)
//! - [`Implementation`] - an opaque invocable occupying a slot
//! - [`Value`] / [`CallEnv`] - dynamic values and the view a call receives
//! - [`TypeId`] / [`InstanceId`] / [`MethodKey`] - opaque identifiers

mod instance;
mod registry;
mod token;
mod types;

pub use registry::{Runtime, TypeBuilder};
pub use token::{InstanceId, MethodKey, TypeId};
pub use types::{
    Callable, CallEnv, Implementation, ImplementationBody, MethodSlot, TypeDescriptor, Value,
    DESTROY_METHOD,
};
