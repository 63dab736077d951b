//! ABI classification and the generic call interface.
//!
//! Method shapes are unknown until the moment they are hooked, so the engine
//! cannot carry per-method glue. Instead, every signature is classified once
//! into native ABI categories (integer, float, pointer, or aggregate-by-value
//! with its full recursive layout) and a [`CallInterface`] descriptor built
//! from those categories both invokes arbitrary implementations and validates
//! everything that crosses the boundary.
//!
//! # Key Components
//!
//! - [`AbiCategory`] - native register class of one encoding element
//! - [`AggregateLayout`] / [`AbiField`] - recursive by-value aggregate layout
//! - [`CallInterface`] - per-signature descriptor (cached content-addressed
//!   by encoding string)

mod classify;
mod interface;

pub(crate) use interface::InterfaceCache;

pub use classify::{AbiCategory, AbiField, AggregateLayout, POINTER_SIZE};
pub use interface::CallInterface;
