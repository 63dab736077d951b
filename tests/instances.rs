//! Integration tests for per-instance hooking: shadow types, isolation,
//! coexistence with foreign shadow mechanisms, and prior-type restoration.

mod common;

use common::{calculator_fixture, entries, logging_closure, new_log};
use graft::prelude::*;

/// Hooking instance A never alters instance B's behavior, even when both
/// share the original type.
#[test]
fn test_instance_isolation() -> Result<()> {
    let fixture = calculator_fixture()?;
    let log = new_log();
    let other = fixture.runtime.alloc(fixture.calculator)?;
    let args = [Value::Int(3), Value::Int(4)];

    fixture.engine.hook(
        HookTarget::Instance(fixture.instance),
        "sum".into(),
        HookMode::Before,
        logging_closure("v@?", &log, "a")?,
    )?;

    assert_eq!(
        fixture.runtime.send(fixture.instance, "sum".into(), &args)?,
        Value::Int(7)
    );
    assert_eq!(
        fixture.runtime.send(other, "sum".into(), &args)?,
        Value::Int(7)
    );
    assert_eq!(entries(&log), vec!["a"], "only the hooked instance fires");

    assert_eq!(
        fixture.engine.classify_instance(fixture.instance)?,
        ShadowClass::HookShadow
    );
    assert_eq!(
        fixture.engine.classify_instance(other)?,
        ShadowClass::Plain
    );
    Ok(())
}

/// One shadow per hooked instance: further hooks reuse it, and the last
/// cancellation restores the prior type and retires the shadow.
#[test]
fn test_shadow_lifecycle() -> Result<()> {
    let fixture = calculator_fixture()?;
    let log = new_log();
    let types_before = fixture.runtime.type_count();

    let t1 = fixture.engine.hook_instance(
        fixture.instance,
        "sum".into(),
        HookMode::Before,
        logging_closure("v@?", &log, "one")?,
    )?;
    let shadow = fixture.runtime.instance_type(fixture.instance)?;
    assert_ne!(shadow, fixture.calculator);
    assert_eq!(
        fixture.runtime.descriptor(shadow)?.parent(),
        Some(fixture.calculator)
    );

    let t2 = fixture.engine.hook_instance(
        fixture.instance,
        "sum".into(),
        HookMode::After,
        logging_closure("v@?", &log, "two")?,
    )?;
    assert_eq!(
        fixture.runtime.instance_type(fixture.instance)?,
        shadow,
        "second hook reuses the shadow"
    );

    assert_eq!(t1.cancel(), CancelOutcome::Removed);
    assert_eq!(
        fixture.runtime.instance_type(fixture.instance)?,
        shadow,
        "shadow persists while hooks remain"
    );

    assert_eq!(t2.cancel(), CancelOutcome::RemovedLast);
    assert_eq!(
        fixture.runtime.instance_type(fixture.instance)?,
        fixture.calculator
    );
    assert_eq!(fixture.runtime.type_count(), types_before);
    Ok(())
}

/// An instance already shadowed by an observation mechanism gets a new
/// shadow layered on top; cancellation restores exactly the observation
/// shadow, never the bare type.
#[test]
fn test_stacking_over_observation_shadow() -> Result<()> {
    let fixture = calculator_fixture()?;
    let log = new_log();
    let runtime = &fixture.runtime;

    // emulate an observer: subtype that lies about its identity
    let observer = runtime
        .type_builder("observed$Calculator")
        .parent(fixture.calculator)
        .identity_override(fixture.calculator)
        .build()?;
    runtime.set_instance_type(fixture.instance, observer)?;
    assert_eq!(
        fixture.engine.classify_instance(fixture.instance)?,
        ShadowClass::Observation
    );

    let token = fixture.engine.hook_instance(
        fixture.instance,
        "sum".into(),
        HookMode::Before,
        logging_closure("v@?", &log, "stacked")?,
    )?;
    let shadow = runtime.instance_type(fixture.instance)?;
    assert_eq!(
        runtime.descriptor(shadow)?.parent(),
        Some(observer),
        "new shadow layers on top of the observation shadow"
    );

    fixture
        .runtime
        .send(fixture.instance, "sum".into(), &[Value::Int(1), Value::Int(2)])?;
    assert_eq!(entries(&log), vec!["stacked"]);

    assert_eq!(token.cancel(), CancelOutcome::RemovedLast);
    assert_eq!(
        runtime.instance_type(fixture.instance)?,
        observer,
        "restoration reinstates the immediately-prior type"
    );
    Ok(())
}

/// An observation layer that froze the slot refuses the override, and the
/// refusal leaves the instance untouched.
#[test]
fn test_unsupported_observation_refused() -> Result<()> {
    let fixture = calculator_fixture()?;
    let log = new_log();
    let runtime = &fixture.runtime;

    let observer = runtime
        .type_builder("observed$Calculator")
        .parent(fixture.calculator)
        .identity_override(fixture.calculator)
        .freeze("sum".into())
        .build()?;
    runtime.set_instance_type(fixture.instance, observer)?;

    let result = fixture.engine.hook_instance(
        fixture.instance,
        "sum".into(),
        HookMode::Before,
        logging_closure("v@?", &log, "never")?,
    );
    assert!(matches!(result, Err(Error::UnsupportedObservation(_))));
    assert_eq!(runtime.instance_type(fixture.instance)?, observer);
    assert_eq!(fixture.engine.context_count(), 0);

    // a slot the layer does not manage is still hookable
    runtime.define_method(
        fixture.calculator,
        "reset".into(),
        "v@:",
        Implementation::new(|_| Ok(Value::Unit)),
    )?;
    let log2 = new_log();
    let token = fixture.engine.hook_instance(
        fixture.instance,
        "reset".into(),
        HookMode::Before,
        logging_closure("v@?", &log2, "ok")?,
    )?;
    assert!(token.is_active());
    Ok(())
}

/// A foreign hook framework's shadow is stacked over when it permits the
/// override and refused when it does not.
#[test]
fn test_foreign_shadow_coexistence() -> Result<()> {
    let fixture = calculator_fixture()?;
    let log = new_log();
    let runtime = &fixture.runtime;

    let hostile = runtime
        .type_builder("swizzled$Calculator")
        .parent(fixture.calculator)
        .freeze("sum".into())
        .build()?;
    runtime.set_instance_type(fixture.instance, hostile)?;
    assert_eq!(
        fixture.engine.classify_instance(fixture.instance)?,
        ShadowClass::Foreign
    );
    assert!(matches!(
        fixture.engine.hook_instance(
            fixture.instance,
            "sum".into(),
            HookMode::Before,
            logging_closure("v@?", &log, "never")?
        ),
        Err(Error::IncompatibleShadow(_))
    ));

    let friendly = runtime
        .type_builder("proxied$Calculator")
        .parent(fixture.calculator)
        .build()?;
    let other = runtime.alloc(fixture.calculator)?;
    runtime.set_instance_type(other, friendly)?;

    let token = fixture.engine.hook_instance(
        other,
        "sum".into(),
        HookMode::Before,
        logging_closure("v@?", &log, "stacked")?,
    )?;
    let shadow = runtime.instance_type(other)?;
    assert_eq!(runtime.descriptor(shadow)?.parent(), Some(friendly));

    token.cancel();
    assert_eq!(runtime.instance_type(other)?, friendly);
    Ok(())
}

/// Cancelling hooks on an already-destroyed instance stays best-effort.
#[test]
fn test_cancel_after_instance_destruction() -> Result<()> {
    let fixture = calculator_fixture()?;
    let log = new_log();

    let token = fixture.engine.hook_instance(
        fixture.instance,
        "sum".into(),
        HookMode::Before,
        logging_closure("v@?", &log, "x")?,
    )?;
    fixture.runtime.destroy(fixture.instance)?;

    // the context still existed, so removal succeeds; the type-slot restore
    // is silently skipped for the dead instance
    assert_eq!(token.cancel(), CancelOutcome::RemovedLast);
    assert_eq!(token.cancel(), CancelOutcome::AlreadyGone);
    Ok(())
}
