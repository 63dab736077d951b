use crate::{
    encoding::{Primitive, TypeEncoding},
    Error::ZeroSizedAggregate,
    Result,
};

/// Pointer width of the modeled host platform, in bytes.
pub const POINTER_SIZE: usize = 8;

/// Native ABI category of one encoding element.
///
/// Every value crossing the generic call interface is classified as an
/// integer, a float, a pointer, or an aggregate passed by value with its full
/// recursive layout. The `Void` category is valid only for return slots.
#[derive(Debug, Clone, PartialEq)]
pub enum AbiCategory {
    /// No storage; return slots only
    Void,
    /// Integer register class with the value's byte width
    Integer {
        /// Width in bytes (1, 2, 4 or 8)
        size: usize,
    },
    /// Floating-point register class with the value's byte width
    Float {
        /// Width in bytes (4 or 8)
        size: usize,
    },
    /// Pointer register class (object, type and key references, pointers,
    /// C strings and invocables)
    Pointer,
    /// Aggregate passed by value, with its recursive layout
    Aggregate(AggregateLayout),
}

/// Memory layout of a by-value aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateLayout {
    /// Total size in bytes, padded to the alignment
    pub size: usize,
    /// Alignment in bytes (largest member alignment)
    pub align: usize,
    /// Member categories with their byte offsets, in declaration order
    pub fields: Vec<AbiField>,
}

/// One member of an [`AggregateLayout`].
#[derive(Debug, Clone, PartialEq)]
pub struct AbiField {
    /// Byte offset from the start of the aggregate
    pub offset: usize,
    /// The member's own category
    pub category: AbiCategory,
}

impl AbiCategory {
    /// Classify an encoding element into its ABI category.
    ///
    /// Aggregates are laid out recursively with natural alignment.
    ///
    /// # Errors
    /// Returns [`ZeroSizedAggregate`] when an aggregate's computed layout
    /// occupies no storage (a void member, or nothing but void members).
    pub fn of(encoding: &TypeEncoding) -> Result<Self> {
        match encoding {
            TypeEncoding::Primitive(primitive) => Ok(match primitive {
                Primitive::Void => AbiCategory::Void,
                Primitive::Bool | Primitive::Char | Primitive::UChar => {
                    AbiCategory::Integer { size: 1 }
                }
                Primitive::Short | Primitive::UShort => AbiCategory::Integer { size: 2 },
                Primitive::Int | Primitive::UInt => AbiCategory::Integer { size: 4 },
                Primitive::Long
                | Primitive::ULong
                | Primitive::LongLong
                | Primitive::ULongLong => AbiCategory::Integer { size: 8 },
                Primitive::Float => AbiCategory::Float { size: 4 },
                Primitive::Double => AbiCategory::Float { size: 8 },
                Primitive::CString => AbiCategory::Pointer,
            }),
            TypeEncoding::ObjectRef
            | TypeEncoding::TypeRef
            | TypeEncoding::MethodKeyRef
            | TypeEncoding::Pointer(_)
            | TypeEncoding::Invocable(_) => Ok(AbiCategory::Pointer),
            TypeEncoding::Aggregate(aggregate) => {
                let mut fields = Vec::with_capacity(aggregate.members.len());
                let mut offset = 0usize;
                let mut align = 1usize;

                for member in &aggregate.members {
                    let category = AbiCategory::of(member)?;
                    let (member_size, member_align) = category.size_align();
                    if member_size == 0 {
                        return Err(ZeroSizedAggregate);
                    }

                    offset = offset.next_multiple_of(member_align);
                    align = align.max(member_align);
                    fields.push(AbiField { offset, category });
                    offset += member_size;
                }

                let size = offset.next_multiple_of(align);
                if size == 0 {
                    return Err(ZeroSizedAggregate);
                }

                Ok(AbiCategory::Aggregate(AggregateLayout {
                    size,
                    align,
                    fields,
                }))
            }
        }
    }

    /// Size and alignment of this category in bytes.
    #[must_use]
    pub fn size_align(&self) -> (usize, usize) {
        match self {
            AbiCategory::Void => (0, 1),
            AbiCategory::Integer { size } | AbiCategory::Float { size } => (*size, *size),
            AbiCategory::Pointer => (POINTER_SIZE, POINTER_SIZE),
            AbiCategory::Aggregate(layout) => (layout.size, layout.align),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::CallSignature;
    use crate::Error;

    fn classify(encoding: &str) -> Result<AbiCategory> {
        let signature = CallSignature::parse(encoding)?;
        AbiCategory::of(&signature.return_type.encoding)
    }

    #[test]
    fn test_scalar_categories() {
        assert_eq!(classify("i").unwrap(), AbiCategory::Integer { size: 4 });
        assert_eq!(classify("q").unwrap(), AbiCategory::Integer { size: 8 });
        assert_eq!(classify("f").unwrap(), AbiCategory::Float { size: 4 });
        assert_eq!(classify("d").unwrap(), AbiCategory::Float { size: 8 });
        assert_eq!(classify("@").unwrap(), AbiCategory::Pointer);
        assert_eq!(classify("^i").unwrap(), AbiCategory::Pointer);
        assert_eq!(classify("@?").unwrap(), AbiCategory::Pointer);
        assert_eq!(classify("v").unwrap(), AbiCategory::Void);
    }

    #[test]
    fn test_aggregate_layout_with_padding() {
        // {Mixed=cq} - one byte, then an 8-byte member aligned up to offset 8
        let AbiCategory::Aggregate(layout) = classify("{Mixed=cq}").unwrap() else {
            panic!("expected aggregate");
        };
        assert_eq!(layout.align, 8);
        assert_eq!(layout.size, 16);
        assert_eq!(layout.fields[0].offset, 0);
        assert_eq!(layout.fields[1].offset, 8);
    }

    #[test]
    fn test_nested_aggregate_layout() {
        let AbiCategory::Aggregate(layout) = classify("{Outer={Inner=ii}d}").unwrap() else {
            panic!("expected aggregate");
        };
        assert_eq!(layout.size, 16);
        assert!(matches!(
            layout.fields[0].category,
            AbiCategory::Aggregate(_)
        ));
        assert_eq!(layout.fields[1].offset, 8);
    }

    #[test]
    fn test_void_member_rejected() {
        assert!(matches!(
            classify("{Bad=v}"),
            Err(Error::ZeroSizedAggregate)
        ));
    }
}
