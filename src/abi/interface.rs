use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    abi::AbiCategory,
    encoding::CallSignature,
    runtime::{CallEnv, Implementation, Value},
    Result,
};

/// Generic call-interface descriptor for one method signature.
///
/// For every slot of a [`CallSignature`] the descriptor carries the native ABI
/// category (integer, float, pointer, or aggregate-by-value with its full
/// recursive layout). It is the single path by which the engine invokes an
/// arbitrary [`Implementation`]: values are validated against their category
/// on the way in, the return value on the way out. Method shapes are unknown
/// until hooked, so this generic path replaces per-method glue.
///
/// Descriptors are immutable and shared; see [`InterfaceCache`].
pub struct CallInterface {
    encoding: Box<str>,
    signature: CallSignature,
    params: Vec<AbiCategory>,
    return_category: AbiCategory,
}

impl CallInterface {
    /// Build a descriptor for a method encoding.
    ///
    /// The signature must have the method shape: a receiver slot followed by a
    /// method-key slot, then the declared arguments. Parameters classified as
    /// void are rejected.
    ///
    /// # Errors
    /// Returns encoding/layout errors from parsing and classification, and a
    /// malformed-encoding error when the method shape is violated.
    pub fn for_method(encoding: &str) -> Result<Self> {
        let signature = CallSignature::parse(encoding)?;
        if signature.params.len() < 2
            || !signature.params[0].encoding.is_receiver()
            || !signature.params[1].encoding.is_method_key()
        {
            return Err(malformed_error!(
                "Method encoding '{}' lacks receiver and key slots",
                encoding
            ));
        }

        let mut params = Vec::with_capacity(signature.params.len());
        for param in &signature.params {
            let category = AbiCategory::of(&param.encoding)?;
            if category == AbiCategory::Void {
                return Err(malformed_error!(
                    "Void parameter in method encoding '{}'",
                    encoding
                ));
            }
            params.push(category);
        }
        let return_category = AbiCategory::of(&signature.return_type.encoding)?;

        Ok(CallInterface {
            encoding: Box::from(encoding),
            signature,
            params,
            return_category,
        })
    }

    /// The raw encoding this descriptor was built from.
    #[must_use]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// The parsed signature.
    #[must_use]
    pub fn signature(&self) -> &CallSignature {
        &self.signature
    }

    /// ABI categories of all parameter slots (receiver and key included).
    #[must_use]
    pub fn param_categories(&self) -> &[AbiCategory] {
        &self.params
    }

    /// ABI category of the return slot.
    #[must_use]
    pub fn return_category(&self) -> &AbiCategory {
        &self.return_category
    }

    /// Number of declared arguments (parameters after receiver and key).
    #[must_use]
    pub fn declared_arity(&self) -> usize {
        self.params.len() - 2
    }

    /// Validate an incoming call's receiver and declared arguments.
    ///
    /// # Errors
    /// Returns [`crate::Error::MistypedValue`] naming the offending slot.
    pub fn validate_call(&self, receiver: &Value, args: &[Value]) -> Result<()> {
        if !admits(&self.params[0], receiver) {
            return Err(self.mistyped("receiver", &self.signature.params[0].encoding.render()));
        }
        if args.len() != self.declared_arity() {
            return Err(self.mistyped(
                &format!("argument {}", args.len()),
                &format!("{} argument(s)", self.declared_arity()),
            ));
        }
        for (index, (value, category)) in args.iter().zip(&self.params[2..]).enumerate() {
            if !admits(category, value) {
                return Err(self.mistyped(
                    &format!("argument {index}"),
                    &self.signature.params[index + 2].encoding.render(),
                ));
            }
        }
        Ok(())
    }

    /// Validate a value produced for the return slot.
    ///
    /// # Errors
    /// Returns [`crate::Error::MistypedValue`] for the return slot.
    pub fn validate_return(&self, value: &Value) -> Result<()> {
        if !admits(&self.return_category, value) {
            return Err(self.mistyped("return", &self.signature.return_type.encoding.render()));
        }
        Ok(())
    }

    /// Invoke an arbitrary implementation through the descriptor, validating
    /// arguments on the way in and the return value on the way out.
    ///
    /// # Errors
    /// Returns validation failures and whatever the implementation returns.
    pub fn invoke(&self, implementation: &Implementation, env: &CallEnv<'_>) -> Result<Value> {
        self.validate_call(&env.receiver, env.args)?;
        let result = implementation.call(env)?;
        self.validate_return(&result)?;
        Ok(result)
    }

    fn mistyped(&self, slot: &str, expected: &str) -> crate::Error {
        crate::Error::MistypedValue {
            slot: slot.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// Whether a dynamic value fits an ABI category.
fn admits(category: &AbiCategory, value: &Value) -> bool {
    match category {
        AbiCategory::Void => matches!(value, Value::Unit),
        AbiCategory::Integer { .. } => {
            matches!(value, Value::Int(_) | Value::UInt(_) | Value::Bool(_))
        }
        AbiCategory::Float { .. } => matches!(value, Value::Float(_)),
        AbiCategory::Pointer => matches!(
            value,
            Value::Raw(_)
                | Value::Instance(_)
                | Value::Type(_)
                | Value::Key(_)
                | Value::Invocable(_)
        ),
        AbiCategory::Aggregate(layout) => match value {
            Value::Aggregate(members) => {
                members.len() == layout.fields.len()
                    && members
                        .iter()
                        .zip(&layout.fields)
                        .all(|(member, field)| admits(&field.category, member))
            }
            _ => false,
        },
    }
}

/// Content-addressed cache of [`CallInterface`] descriptors, keyed by the raw
/// encoding string.
///
/// Two methods sharing an encoding share one descriptor.
pub(crate) struct InterfaceCache {
    map: DashMap<Box<str>, Arc<CallInterface>>,
}

impl InterfaceCache {
    pub(crate) fn new() -> Self {
        InterfaceCache {
            map: DashMap::new(),
        }
    }

    /// Fetch the descriptor for an encoding, building it on first use.
    pub(crate) fn get_or_build(&self, encoding: &str) -> Result<Arc<CallInterface>> {
        if let Some(hit) = self.map.get(encoding) {
            return Ok(Arc::clone(hit.value()));
        }
        let built = Arc::new(CallInterface::for_method(encoding)?);
        self.map.insert(Box::from(encoding), Arc::clone(&built));
        Ok(built)
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_shape_enforced() {
        assert!(CallInterface::for_method("q@:qq").is_ok());
        assert!(CallInterface::for_method("q").is_err());
        assert!(CallInterface::for_method("qqq").is_err());
        assert!(CallInterface::for_method("v@:v").is_err());
    }

    #[test]
    fn test_validate_call_checks_categories() {
        let interface = CallInterface::for_method("q@:qd").unwrap();
        let receiver = Value::Instance(crate::runtime::InstanceId::new(1));

        assert!(interface
            .validate_call(&receiver, &[Value::Int(1), Value::Float(2.0)])
            .is_ok());
        assert!(interface
            .validate_call(&receiver, &[Value::Float(2.0), Value::Int(1)])
            .is_err());
        assert!(interface.validate_call(&receiver, &[Value::Int(1)]).is_err());
        assert!(interface
            .validate_call(&Value::Unit, &[Value::Int(1), Value::Float(2.0)])
            .is_err());
    }

    #[test]
    fn test_validate_aggregates_recursively() {
        let interface = CallInterface::for_method("v@:{Pair=qq}").unwrap();
        let receiver = Value::Instance(crate::runtime::InstanceId::new(1));

        let good = Value::Aggregate(vec![Value::Int(1), Value::Int(2)]);
        let short = Value::Aggregate(vec![Value::Int(1)]);
        let wrong = Value::Aggregate(vec![Value::Int(1), Value::Float(2.0)]);

        assert!(interface.validate_call(&receiver, &[good]).is_ok());
        assert!(interface.validate_call(&receiver, &[short]).is_err());
        assert!(interface.validate_call(&receiver, &[wrong]).is_err());
    }

    #[test]
    fn test_validate_invocable_values() {
        let interface = CallInterface::for_method("v@:@?").unwrap();
        let receiver = Value::Instance(crate::runtime::InstanceId::new(1));
        let callback = Value::Invocable(crate::runtime::Callable::new(|_| Ok(Value::Unit)));

        assert!(interface.validate_call(&receiver, &[callback]).is_ok());
        assert!(interface.validate_call(&receiver, &[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_cache_shares_descriptors() {
        let cache = InterfaceCache::new();
        let a = cache.get_or_build("q@:qq").unwrap();
        let b = cache.get_or_build("q@:qq").unwrap();
        let c = cache.get_or_build("v@:").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }
}
