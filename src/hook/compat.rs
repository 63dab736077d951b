use std::collections::HashMap;

use strum::Display;

use crate::{
    hook::subtype::ShadowRecord,
    runtime::{MethodKey, Runtime, TypeDescriptor, TypeId},
    Error::{IncompatibleShadow, UnsupportedObservation},
    Result,
};

/// What an instance's current type slot holds, as far as structural probing
/// can tell.
///
/// The engine never assumes exclusive ownership of the slot: classification
/// decides whether it may stack a new shadow on top of what is there, and
/// restoration only ever reinstates the immediately-prior type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ShadowClass {
    /// No shadow detected
    Plain,
    /// A shadow synthesized by this engine
    HookShadow,
    /// A shadow installed by an observation mechanism (detected by an
    /// identity override or a configured name pattern)
    Observation,
    /// A shadow installed by a foreign hooking framework (detected by a
    /// configured name pattern)
    Foreign,
}

/// Heuristics for classifying foreign shadow types.
///
/// Detection is inherently heuristic: beyond the engine's own bookkeeping,
/// shadows are recognized by cross-checking a type's self-reported identity
/// against its actual storage and by name-prefix patterns. Both prefix lists
/// are configurable per engine.
///
/// # Example
///
/// ```rust
/// use graft::DetectionConfig;
///
/// let config = DetectionConfig {
///     observation_prefixes: vec!["observed$".to_string()],
///     foreign_prefixes: vec!["patched$".to_string()],
/// };
/// assert_eq!(config.observation_prefixes.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Name prefixes marking observation-mechanism shadows
    pub observation_prefixes: Vec<String>,
    /// Name prefixes marking foreign hook-framework shadows
    pub foreign_prefixes: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            observation_prefixes: vec!["observed$".to_string()],
            foreign_prefixes: vec!["swizzled$".to_string(), "proxied$".to_string()],
        }
    }
}

impl DetectionConfig {
    /// A configuration with no name patterns; only identity cross-checking
    /// remains active.
    #[must_use]
    pub fn permissive() -> Self {
        DetectionConfig {
            observation_prefixes: Vec::new(),
            foreign_prefixes: Vec::new(),
        }
    }
}

/// Classify the type currently stored in an instance's type slot.
pub(crate) fn classify(
    runtime: &Runtime,
    config: &DetectionConfig,
    shadows: &HashMap<TypeId, ShadowRecord>,
    type_id: TypeId,
) -> Result<ShadowClass> {
    if shadows.contains_key(&type_id) {
        return Ok(ShadowClass::HookShadow);
    }

    let descriptor = runtime.descriptor(type_id)?;
    let name = descriptor.name();
    if descriptor.overrides_identity()
        || config
            .observation_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    {
        return Ok(ShadowClass::Observation);
    }
    if config
        .foreign_prefixes
        .iter()
        .any(|prefix| name.starts_with(prefix.as_str()))
    {
        return Ok(ShadowClass::Foreign);
    }
    Ok(ShadowClass::Plain)
}

/// Refuse overrides the current shadow layer does not support.
///
/// A layer that freezes a slot manages it itself; stacking a hook shadow over
/// such a slot would corrupt the layer's bookkeeping.
pub(crate) fn ensure_supported(
    class: ShadowClass,
    descriptor: &TypeDescriptor,
    key: &MethodKey,
) -> Result<()> {
    match class {
        ShadowClass::Observation if descriptor.is_frozen(key) => {
            Err(UnsupportedObservation(key.clone()))
        }
        ShadowClass::Foreign if descriptor.is_frozen(key) => {
            Err(IncompatibleShadow(descriptor.name().to_string()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_heuristics() {
        let runtime = Runtime::new();
        let config = DetectionConfig::default();
        let shadows = HashMap::new();

        let plain = runtime.type_builder("Widget").build().unwrap();
        let named = runtime
            .type_builder("observed$Widget")
            .parent(plain)
            .build()
            .unwrap();
        let lying = runtime
            .type_builder("Helper")
            .parent(plain)
            .identity_override(plain)
            .build()
            .unwrap();
        let foreign = runtime
            .type_builder("swizzled$Widget")
            .parent(plain)
            .build()
            .unwrap();

        let class = |id| classify(&runtime, &config, &shadows, id).unwrap();
        assert_eq!(class(plain), ShadowClass::Plain);
        assert_eq!(class(named), ShadowClass::Observation);
        assert_eq!(class(lying), ShadowClass::Observation);
        assert_eq!(class(foreign), ShadowClass::Foreign);
    }

    #[test]
    fn test_frozen_slots_refused() {
        let runtime = Runtime::new();
        let base = runtime.type_builder("Widget").build().unwrap();
        let observer = runtime
            .type_builder("observed$Widget")
            .parent(base)
            .freeze("size".into())
            .build()
            .unwrap();
        let descriptor = runtime.descriptor(observer).unwrap();

        assert!(matches!(
            ensure_supported(ShadowClass::Observation, &descriptor, &"size".into()),
            Err(crate::Error::UnsupportedObservation(_))
        ));
        assert!(ensure_supported(ShadowClass::Observation, &descriptor, &"other".into()).is_ok());
        assert!(matches!(
            ensure_supported(ShadowClass::Foreign, &descriptor, &"size".into()),
            Err(crate::Error::IncompatibleShadow(_))
        ));
    }
}
