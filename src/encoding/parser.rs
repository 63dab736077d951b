use crate::{
    encoding::{Aggregate, CallSignature, Parameter, Primitive, Qualifiers, TypeEncoding},
    Error::{EmptyAggregate, NotIntrospectable, RecursionLimit},
    Result,
};

/// Maximum recursion depth for encoding parsing
const MAX_RECURSION_DEPTH: usize = 50;

/// Parser turning raw type-encoding strings into [`CallSignature`] trees.
///
/// # Example
///
/// ```rust
/// use graft::encoding::EncodingParser;
/// let signature = EncodingParser::new("v@:qq").parse_signature()?;
/// assert_eq!(signature.params.len(), 4);
/// # Ok::<(), graft::Error>(())
/// ```
///
/// ## Notes:
/// - Decimal digits between elements (frame offsets emitted by some hosts) are
///   skipped wherever they appear.
/// - A parser instance consumes exactly one signature string; do not reuse it.
pub struct EncodingParser<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> EncodingParser<'a> {
    /// Create a new `EncodingParser` over a raw encoding string.
    #[must_use]
    pub fn new(encoding: &'a str) -> Self {
        EncodingParser {
            data: encoding.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    /// Parse the whole string as a signature: return type first, then every
    /// following element as a parameter.
    ///
    /// # Errors
    /// Returns [`NotIntrospectable`] for an empty string, [`EmptyAggregate`]
    /// for member-less aggregates, [`RecursionLimit`] for pathological nesting
    /// and a malformed-encoding error for anything unsupported.
    pub fn parse_signature(mut self) -> Result<CallSignature> {
        self.skip_digits();
        if !self.has_more() {
            return Err(NotIntrospectable);
        }

        let return_type = self.parse_parameter()?;
        let mut params = Vec::new();
        while self.has_more() {
            params.push(self.parse_parameter()?);
        }

        Ok(CallSignature {
            return_type,
            params,
        })
    }

    fn parse_parameter(&mut self) -> Result<Parameter> {
        let qualifiers = self.take_qualifiers();
        let encoding = self.parse_element()?;
        self.skip_digits();
        Ok(Parameter {
            qualifiers,
            encoding,
        })
    }

    /// Parse a single element from the encoding
    fn parse_element(&mut self) -> Result<TypeEncoding> {
        self.depth += 1;
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }
        let element = self.parse_element_inner();
        self.depth -= 1;
        element
    }

    fn parse_element_inner(&mut self) -> Result<TypeEncoding> {
        let Some(current) = self.advance() else {
            return Err(malformed_error!("Encoding ended mid-element"));
        };

        match current {
            b'@' => {
                if self.peek() == Some(b'?') {
                    self.pos += 1;
                    if self.peek() == Some(b'<') {
                        self.pos += 1;
                        let signature = self.parse_nested_signature()?;
                        Ok(TypeEncoding::Invocable(Some(Box::new(signature))))
                    } else {
                        Ok(TypeEncoding::Invocable(None))
                    }
                } else {
                    Ok(TypeEncoding::ObjectRef)
                }
            }
            b'#' => Ok(TypeEncoding::TypeRef),
            b':' => Ok(TypeEncoding::MethodKeyRef),
            b'^' => {
                // pointee qualifiers are cosmetic and dropped
                let _ = self.take_qualifiers();
                Ok(TypeEncoding::Pointer(Box::new(self.parse_element()?)))
            }
            b'{' => self.parse_aggregate(),
            code => match Primitive::from_code(code) {
                Some(primitive) => Ok(TypeEncoding::Primitive(primitive)),
                None => Err(malformed_error!(
                    "Unsupported encoding element - '{}'",
                    code as char
                )),
            },
        }
    }

    /// Parse an aggregate body after the opening `{`
    fn parse_aggregate(&mut self) -> Result<TypeEncoding> {
        let name_start = self.pos;
        loop {
            match self.peek() {
                Some(b'=') => break,
                Some(b'}') => {
                    // opaque form without a member list carries no shape
                    return Err(EmptyAggregate);
                }
                Some(_) => self.pos += 1,
                None => return Err(malformed_error!("Unterminated aggregate encoding")),
            }
        }
        let name = if self.pos > name_start {
            std::str::from_utf8(&self.data[name_start..self.pos])
                .ok()
                .map(Box::from)
        } else {
            None
        };
        self.pos += 1; // consume '='

        let mut members = Vec::new();
        loop {
            match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    let _ = self.take_qualifiers();
                    members.push(self.parse_element()?);
                    self.skip_digits();
                }
                None => return Err(malformed_error!("Unterminated aggregate encoding")),
            }
        }

        if members.is_empty() {
            return Err(EmptyAggregate);
        }

        Ok(TypeEncoding::Aggregate(Aggregate { name, members }))
    }

    /// Parse a nested invocable signature after the opening `<`, up to the
    /// closing `>`
    fn parse_nested_signature(&mut self) -> Result<CallSignature> {
        self.skip_digits();
        let return_type = self.parse_parameter()?;
        let mut params = Vec::new();
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => params.push(self.parse_parameter()?),
                None => return Err(malformed_error!("Unterminated invocable signature")),
            }
        }
        Ok(CallSignature {
            return_type,
            params,
        })
    }

    fn take_qualifiers(&mut self) -> Qualifiers {
        let mut qualifiers = Qualifiers::empty();
        while let Some(code) = self.peek() {
            match Qualifiers::from_code(code) {
                Some(flag) => {
                    qualifiers |= flag;
                    self.pos += 1;
                }
                None => break,
            }
        }
        qualifiers
    }

    fn skip_digits(&mut self) {
        while matches!(self.peek(), Some(code) if code.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn has_more(&self) -> bool {
        self.pos < self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let current = self.peek()?;
        self.pos += 1;
        Some(current)
    }
}
