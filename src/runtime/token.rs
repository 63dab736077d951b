use std::fmt;
use std::sync::Arc;

/// An opaque identifier naming one type record in the runtime registry.
///
/// Type ids are allocated atomically by the registry; synthesized shadow types
/// receive ids from the same sequence as host-registered types and are
/// indistinguishable by id alone.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Creates a type id from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        TypeId(value)
    }

    /// Returns the raw id value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for TypeId {
    fn from(value: u32) -> Self {
        TypeId(value)
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId(0x{:08x})", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// An opaque identifier naming one live instance in the runtime registry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub u64);

impl InstanceId {
    /// Creates an instance id from a raw 64-bit value
    #[must_use]
    pub fn new(value: u64) -> Self {
        InstanceId(value)
    }

    /// Returns the raw id value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId(0x{:016x})", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// An opaque identifier naming one method slot, stable across a type's
/// ancestry.
///
/// Keys are cheap to clone and compare; two keys with the same name address
/// the same slot anywhere in a parent chain.
///
/// # Example
///
/// ```rust
/// use graft::MethodKey;
///
/// let key = MethodKey::new("sum");
/// assert_eq!(key.name(), "sum");
/// assert_eq!(key, "sum".into());
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodKey(Arc<str>);

impl MethodKey {
    /// Creates a method key from a slot name
    #[must_use]
    pub fn new(name: &str) -> Self {
        MethodKey(Arc::from(name))
    }

    /// Returns the slot name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MethodKey {
    fn from(name: &str) -> Self {
        MethodKey::new(name)
    }
}

impl From<String> for MethodKey {
    fn from(name: String) -> Self {
        MethodKey(Arc::from(name))
    }
}

impl fmt::Debug for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodKey({})", self.0)
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_type_id_roundtrip() {
        let id = TypeId::new(0x2A);
        assert_eq!(id.value(), 0x2A);
        assert_eq!(TypeId::from(0x2A), id);
        assert_eq!(format!("{id}"), "0x0000002a");
    }

    #[test]
    fn test_method_key_equality_by_name() {
        let a = MethodKey::new("sum");
        let b: MethodKey = "sum".into();
        assert_eq!(a, b);

        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
    }
}
