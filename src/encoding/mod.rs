//! Type-encoding strings and their structured form.
//!
//! A host runtime describes every method and closure with a raw type-encoding
//! string: one element for the return type followed by one element per
//! parameter. This module parses those strings into [`CallSignature`] trees and
//! implements the shape comparisons the hooking engine is built on.
//!
//! # Key Components
//!
//! - [`EncodingParser`] - recursive-descent parser over a raw encoding string
//! - [`TypeEncoding`] - one parsed element (primitive, reference, pointer,
//!   aggregate or invocable)
//! - [`CallSignature`] - a parsed return slot plus ordered parameter slots
//! - [`Qualifiers`] - cosmetic qualifier flags, ignored by all comparisons
//!
//! # Encoding Grammar
//!
//! | Form | Meaning |
//! |---|---|
//! | `v B c C s S i I l L q Q f d *` | primitives |
//! | `@` | object reference |
//! | `#` | type object reference |
//! | `:` | method key |
//! | `^<enc>` | pointer to an element |
//! | `{Name=<members>}` | by-value aggregate (zero members rejected) |
//! | `@?` | invocable marker |
//! | `@?<ret params...>` | invocable carrying its own signature |
//! | `r n N o O R V` | cosmetic qualifiers |
//!
//! Decimal digits between elements (frame offsets) are skipped.
//!
//! # Example
//!
//! ```rust
//! use graft::encoding::CallSignature;
//!
//! // i64 sum(receiver, key, i64, i64)
//! let method = CallSignature::parse("q@:qq")?;
//! // closure: void (marker, receiver, key)
//! let closure = CallSignature::parse("v@?@:")?;
//!
//! assert!(closure.return_type.encoding.is_void());
//! assert!(closure.params[0].encoding.is_invocable());
//! # Ok::<(), graft::Error>(())
//! ```

mod parser;
mod signature;
mod types;

pub use parser::EncodingParser;
pub use signature::{CallSignature, Parameter};
pub use types::{Aggregate, Primitive, Qualifiers, TypeEncoding};
