use std::fmt;

use bitflags::bitflags;

use crate::encoding::CallSignature;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Cosmetic qualifiers a host runtime may attach to an encoding element.
    ///
    /// Qualifiers describe calling-convention details (const-ness, direction,
    /// copy semantics) that do not change an element's shape. Structural
    /// equality ignores them entirely.
    pub struct Qualifiers: u8 {
        /// The element is immutable (`r`)
        const CONST = 0x01;
        /// The element is an input argument (`n`)
        const IN = 0x02;
        /// The element is both read and written (`N`)
        const INOUT = 0x04;
        /// The element is an output argument (`o`)
        const OUT = 0x08;
        /// The element is passed by copy (`O`)
        const BYCOPY = 0x10;
        /// The element is passed by reference (`R`)
        const BYREF = 0x20;
        /// The call does not wait for completion (`V`)
        const ONEWAY = 0x40;
    }
}

impl Qualifiers {
    /// Map a qualifier character to its flag, if it is one.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'r' => Some(Qualifiers::CONST),
            b'n' => Some(Qualifiers::IN),
            b'N' => Some(Qualifiers::INOUT),
            b'o' => Some(Qualifiers::OUT),
            b'O' => Some(Qualifiers::BYCOPY),
            b'R' => Some(Qualifiers::BYREF),
            b'V' => Some(Qualifiers::ONEWAY),
            _ => None,
        }
    }
}

/// A fixed-shape scalar element of an encoding string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// No value (`v`); valid only as a return type
    Void,
    /// Boolean (`B`)
    Bool,
    /// Signed 8bit integer (`c`)
    Char,
    /// Unsigned 8bit integer (`C`)
    UChar,
    /// Signed 16bit integer (`s`)
    Short,
    /// Unsigned 16bit integer (`S`)
    UShort,
    /// Signed 32bit integer (`i`)
    Int,
    /// Unsigned 32bit integer (`I`)
    UInt,
    /// Signed long integer (`l`)
    Long,
    /// Unsigned long integer (`L`)
    ULong,
    /// Signed 64bit integer (`q`)
    LongLong,
    /// Unsigned 64bit integer (`Q`)
    ULongLong,
    /// 32bit floating-point (`f`)
    Float,
    /// 64bit floating-point (`d`)
    Double,
    /// Pointer to a NUL-terminated character string (`*`)
    CString,
}

impl Primitive {
    /// Map a primitive character to its variant, if it is one.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'v' => Some(Primitive::Void),
            b'B' => Some(Primitive::Bool),
            b'c' => Some(Primitive::Char),
            b'C' => Some(Primitive::UChar),
            b's' => Some(Primitive::Short),
            b'S' => Some(Primitive::UShort),
            b'i' => Some(Primitive::Int),
            b'I' => Some(Primitive::UInt),
            b'l' => Some(Primitive::Long),
            b'L' => Some(Primitive::ULong),
            b'q' => Some(Primitive::LongLong),
            b'Q' => Some(Primitive::ULongLong),
            b'f' => Some(Primitive::Float),
            b'd' => Some(Primitive::Double),
            b'*' => Some(Primitive::CString),
            _ => None,
        }
    }

    /// The canonical single-character code of this primitive.
    #[must_use]
    pub fn code(&self) -> char {
        match self {
            Primitive::Void => 'v',
            Primitive::Bool => 'B',
            Primitive::Char => 'c',
            Primitive::UChar => 'C',
            Primitive::Short => 's',
            Primitive::UShort => 'S',
            Primitive::Int => 'i',
            Primitive::UInt => 'I',
            Primitive::Long => 'l',
            Primitive::ULong => 'L',
            Primitive::LongLong => 'q',
            Primitive::ULongLong => 'Q',
            Primitive::Float => 'f',
            Primitive::Double => 'd',
            Primitive::CString => '*',
        }
    }
}

/// Represents one parsed element of a type-encoding string.
///
/// Encodings form a tree: pointers and aggregates nest arbitrary elements, and
/// an invocable element may carry a complete nested [`CallSignature`] of its
/// own. Structural equality (see [`TypeEncoding::matches`]) preserves the
/// aggregate shape recursively while ignoring cosmetic qualifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeEncoding {
    /// A fixed-shape scalar
    Primitive(Primitive),
    /// A reference to a runtime object (`@`)
    ObjectRef,
    /// A reference to a runtime type object (`#`)
    TypeRef,
    /// A method key value (`:`)
    MethodKeyRef,
    /// A pointer to another element (`^`)
    Pointer(Box<TypeEncoding>),
    /// A by-value aggregate with ordered members (`{Name=...}`)
    Aggregate(Aggregate),
    /// An invocable value (`@?`), optionally carrying its own signature (`@?<...>`)
    Invocable(Option<Box<CallSignature>>),
}

/// A by-value aggregate: an ordered list of nested encodings.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    /// Optional name tag carried by the encoding
    pub name: Option<Box<str>>,
    /// The ordered member encodings; never empty
    pub members: Vec<TypeEncoding>,
}

impl TypeEncoding {
    /// Whether this element is the void primitive.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, TypeEncoding::Primitive(Primitive::Void))
    }

    /// Whether this element can act as a receiver (object or type reference).
    #[must_use]
    pub fn is_receiver(&self) -> bool {
        matches!(self, TypeEncoding::ObjectRef | TypeEncoding::TypeRef)
    }

    /// Whether this element is a method key value.
    #[must_use]
    pub fn is_method_key(&self) -> bool {
        matches!(self, TypeEncoding::MethodKeyRef)
    }

    /// Whether this element is invocable (with or without a nested signature).
    #[must_use]
    pub fn is_invocable(&self) -> bool {
        matches!(self, TypeEncoding::Invocable(_))
    }

    /// Structural shape equality.
    ///
    /// Aggregates must agree in member count and, recursively, in member
    /// shapes; aggregate name tags are cosmetic. Two invocables are
    /// shape-equal whenever at least one of them carries no nested signature;
    /// when both do, the nested signatures are compared structurally.
    #[must_use]
    pub fn matches(&self, other: &TypeEncoding) -> bool {
        match (self, other) {
            (TypeEncoding::Primitive(a), TypeEncoding::Primitive(b)) => a == b,
            (TypeEncoding::ObjectRef, TypeEncoding::ObjectRef)
            | (TypeEncoding::TypeRef, TypeEncoding::TypeRef)
            | (TypeEncoding::MethodKeyRef, TypeEncoding::MethodKeyRef) => true,
            (TypeEncoding::Pointer(a), TypeEncoding::Pointer(b)) => a.matches(b),
            (TypeEncoding::Aggregate(a), TypeEncoding::Aggregate(b)) => {
                a.members.len() == b.members.len()
                    && a.members
                        .iter()
                        .zip(b.members.iter())
                        .all(|(x, y)| x.matches(y))
            }
            (TypeEncoding::Invocable(a), TypeEncoding::Invocable(b)) => match (a, b) {
                (Some(x), Some(y)) => x.matches(y),
                _ => true,
            },
            _ => false,
        }
    }

    /// Render this element back to its canonical encoding form.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        match self {
            TypeEncoding::Primitive(p) => out.push(p.code()),
            TypeEncoding::ObjectRef => out.push('@'),
            TypeEncoding::TypeRef => out.push('#'),
            TypeEncoding::MethodKeyRef => out.push(':'),
            TypeEncoding::Pointer(inner) => {
                out.push('^');
                inner.render_into(out);
            }
            TypeEncoding::Aggregate(agg) => {
                out.push('{');
                if let Some(name) = &agg.name {
                    out.push_str(name);
                }
                out.push('=');
                for member in &agg.members {
                    member.render_into(out);
                }
                out.push('}');
            }
            TypeEncoding::Invocable(signature) => {
                out.push_str("@?");
                if let Some(signature) = signature {
                    out.push('<');
                    out.push_str(&signature.render());
                    out.push('>');
                }
            }
        }
    }
}

impl fmt::Display for TypeEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
