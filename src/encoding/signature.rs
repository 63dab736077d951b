use std::fmt;

use crate::{
    encoding::{EncodingParser, Qualifiers, TypeEncoding},
    Result,
};

/// A single slot of a [`CallSignature`]: a parsed encoding plus the cosmetic
/// qualifiers that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Cosmetic qualifiers; ignored by all shape comparisons
    pub qualifiers: Qualifiers,
    /// The parsed shape of this slot
    pub encoding: TypeEncoding,
}

/// The structured shape of a method or closure: one return slot plus an
/// ordered parameter list, derived from a raw type-encoding string.
///
/// A *method* signature's parameter list begins with the receiver (`@`, or `#`
/// for class-level methods) and the method key (`:`). A *closure* signature's
/// first parameter is the closure's own invocable marker (`@?`).
///
/// # Example
///
/// ```rust
/// use graft::encoding::CallSignature;
///
/// let sum = CallSignature::parse("q@:qq")?;
/// assert_eq!(sum.params.len(), 4);
/// assert!(sum.params[0].encoding.is_receiver());
/// assert!(sum.params[1].encoding.is_method_key());
/// # Ok::<(), graft::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CallSignature {
    /// The return slot
    pub return_type: Parameter,
    /// The ordered parameter slots
    pub params: Vec<Parameter>,
}

impl CallSignature {
    /// Parse a raw encoding string into a structured signature.
    ///
    /// The first element is the return type; every following element is a
    /// parameter. Decimal frame offsets between elements are tolerated and
    /// skipped.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotIntrospectable`] for an empty string and a
    /// malformed-encoding error for unsupported or damaged constructs.
    pub fn parse(encoding: &str) -> Result<Self> {
        EncodingParser::new(encoding).parse_signature()
    }

    /// Number of parameter slots.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Structural shape equality against another signature.
    ///
    /// Compares the return slot and every parameter slot with
    /// [`TypeEncoding::matches`]; qualifiers never participate.
    #[must_use]
    pub fn matches(&self, other: &CallSignature) -> bool {
        if self.params.len() != other.params.len() {
            return false;
        }
        if !self.return_type.encoding.matches(&other.return_type.encoding) {
            return false;
        }
        self.params
            .iter()
            .zip(other.params.iter())
            .all(|(a, b)| a.encoding.matches(&b.encoding))
    }

    /// Shape equality for an original-callback signature against the hooked
    /// method's signature.
    ///
    /// Signatures derived by reflective introspection of an already-bound call
    /// report the consumed receiver slot as an invocable marker rather than the
    /// method's receiver encoding. That leading slot is therefore accepted as
    /// equivalent to the method's own receiver; every other slot must match
    /// exactly.
    #[must_use]
    pub fn matches_as_bound(&self, method: &CallSignature) -> bool {
        if self.params.len() != method.params.len() {
            return false;
        }
        if !self
            .return_type
            .encoding
            .matches(&method.return_type.encoding)
        {
            return false;
        }
        for (index, (own, methods)) in self.params.iter().zip(method.params.iter()).enumerate() {
            if index == 0
                && own.encoding.is_invocable()
                && methods.encoding.is_receiver()
            {
                continue;
            }
            if !own.encoding.matches(&methods.encoding) {
                return false;
            }
        }
        true
    }

    /// Render the signature back to its canonical encoding form.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.return_type.encoding.render();
        for param in &self.params {
            out.push_str(&param.encoding.render());
        }
        out
    }
}

impl fmt::Display for CallSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
