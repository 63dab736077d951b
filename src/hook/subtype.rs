use std::collections::HashMap;

use crate::{
    hook::{
        compat::{self, DetectionConfig, ShadowClass},
        HookMode,
    },
    runtime::{InstanceId, MethodKey, Runtime, TypeId},
    Result,
};

/// Bookkeeping for one shadow type synthesized by this engine.
pub(crate) struct ShadowRecord {
    /// The single instance the shadow scopes hooks to
    pub(crate) instance: InstanceId,
    /// The type that was in the instance's slot when the shadow was layered
    /// on; restoration reinstates exactly this id
    pub(crate) prior: TypeId,
}

/// Route an instance hook to its shadow type, synthesizing one if the
/// instance's current type is not already this engine's shadow for it.
///
/// A shadow installed by a foreign mechanism is never replaced; the new
/// shadow is layered on top (its parent is the existing one), after the
/// compatibility check for the requested slot passes.
pub(crate) fn ensure_shadow(
    runtime: &Runtime,
    config: &DetectionConfig,
    shadows: &mut HashMap<TypeId, ShadowRecord>,
    instance: InstanceId,
    key: &MethodKey,
    mode: HookMode,
) -> Result<TypeId> {
    let current = runtime.instance_type(instance)?;
    let class = compat::classify(runtime, config, shadows, current)?;

    if class == ShadowClass::HookShadow {
        if let Some(record) = shadows.get(&current) {
            if record.instance == instance {
                return Ok(current);
            }
        }
    }

    let descriptor = runtime.descriptor(current)?;
    compat::ensure_supported(class, &descriptor, key)?;

    let name = format!("intercepted${}${}", descriptor.name(), instance.value());
    let shadow = runtime.insert_type(&name, Some(current), None, Vec::new(), false)?;
    shadows.insert(
        shadow,
        ShadowRecord {
            instance,
            prior: current,
        },
    );
    runtime.set_instance_type(instance, shadow)?;

    log::debug!("shadow {shadow} '{name}' layered on {current} for {mode} hook on '{key}'");
    Ok(shadow)
}

/// Release a shadow once its instance's hook-closure count has dropped to
/// zero: restore the immediately-prior type and retire the shadow record.
///
/// If something else has since been stacked on top, the shadow stays in the
/// chain (it is now a parent) and only the bookkeeping is dropped. Best
/// effort throughout; a destroyed instance is tolerated.
pub(crate) fn release_shadow(
    runtime: &Runtime,
    shadows: &mut HashMap<TypeId, ShadowRecord>,
    shadow: TypeId,
) {
    let Some(record) = shadows.remove(&shadow) else {
        return;
    };

    match runtime.instance_type(record.instance) {
        Ok(current) if current == shadow => {
            if runtime.set_instance_type(record.instance, record.prior).is_ok() {
                runtime.release_type(shadow);
                log::debug!(
                    "shadow {shadow} released, {} restored to {}",
                    record.instance,
                    record.prior
                );
            }
        }
        Ok(_) => {
            // something stacked above us; the shadow stays as a chain node
            log::debug!("shadow {shadow} no longer topmost, leaving it in the chain");
        }
        Err(_) => {
            runtime.release_type(shadow);
        }
    }
}
