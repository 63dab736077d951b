//! Integration tests for hook ordering: the before/after pools, the nested
//! instead chain, and the combined end-to-end plan.

mod common;

use common::{calculator_fixture, define_ping, entries, logging_closure, new_log};
use graft::prelude::*;
use std::sync::Arc;

/// Before-closures run in reverse insertion order, ahead of the method body.
#[test]
fn test_before_pool_runs_in_reverse_insertion_order() -> Result<()> {
    let fixture = calculator_fixture()?;
    let log = new_log();
    define_ping(&fixture.runtime, fixture.calculator, &log)?;

    let c1 = logging_closure("v@?", &log, "c1")?;
    let c2 = logging_closure("v@?", &log, "c2")?;
    fixture
        .engine
        .hook_type(fixture.calculator, "ping".into(), HookMode::Before, c1)?;
    fixture
        .engine
        .hook_type(fixture.calculator, "ping".into(), HookMode::Before, c2)?;

    fixture.runtime.send(fixture.instance, "ping".into(), &[])?;
    assert_eq!(entries(&log), vec!["c2", "c1", "body"]);
    Ok(())
}

/// After-closures are symmetric: body first, then reverse insertion order.
#[test]
fn test_after_pool_runs_in_reverse_insertion_order() -> Result<()> {
    let fixture = calculator_fixture()?;
    let log = new_log();
    define_ping(&fixture.runtime, fixture.calculator, &log)?;

    let c1 = logging_closure("v@?@:", &log, "c1")?;
    let c2 = logging_closure("v@?@:", &log, "c2")?;
    fixture
        .engine
        .hook_type(fixture.calculator, "ping".into(), HookMode::After, c1)?;
    fixture
        .engine
        .hook_type(fixture.calculator, "ping".into(), HookMode::After, c2)?;

    fixture.runtime.send(fixture.instance, "ping".into(), &[])?;
    assert_eq!(entries(&log), vec!["body", "c2", "c1"]);
    Ok(())
}

fn wrapping_closure(log: &common::Log, tag: &str) -> Result<HookClosureRc> {
    let log = Arc::clone(log);
    let tag = tag.to_string();
    HookClosure::new("v@?@?<v@:>", move |inv| {
        log.lock().unwrap().push(format!("{tag}-pre"));
        let result = inv.original().unwrap().call(&[])?;
        log.lock().unwrap().push(format!("{tag}-post"));
        Ok(result)
    })
}

/// The last-registered instead-closure is the outermost wrapper.
#[test]
fn test_instead_chain_nests_last_registered_outermost() -> Result<()> {
    let fixture = calculator_fixture()?;
    let log = new_log();
    define_ping(&fixture.runtime, fixture.calculator, &log)?;

    let i1 = wrapping_closure(&log, "i1")?;
    let i2 = wrapping_closure(&log, "i2")?;
    fixture
        .engine
        .hook_type(fixture.calculator, "ping".into(), HookMode::Instead, i1)?;
    fixture
        .engine
        .hook_type(fixture.calculator, "ping".into(), HookMode::Instead, i2)?;

    fixture.runtime.send(fixture.instance, "ping".into(), &[])?;
    assert_eq!(
        entries(&log),
        vec!["i2-pre", "i1-pre", "body", "i1-post", "i2-post"]
    );
    Ok(())
}

/// An instead-closure that never invokes its original suppresses the body.
#[test]
fn test_instead_closure_may_skip_the_original() -> Result<()> {
    let fixture = calculator_fixture()?;
    let log = new_log();
    define_ping(&fixture.runtime, fixture.calculator, &log)?;

    let skip = {
        let log = Arc::clone(&log);
        HookClosure::new("v@?@?<v@:>", move |_inv| {
            log.lock().unwrap().push("skipped".to_string());
            Ok(Value::Unit)
        })?
    };
    fixture
        .engine
        .hook_type(fixture.calculator, "ping".into(), HookMode::Instead, skip)?;

    fixture.runtime.send(fixture.instance, "ping".into(), &[])?;
    assert_eq!(entries(&log), vec!["skipped"]);
    Ok(())
}

/// The full plan: before fires, the instead-closure doubles both inputs and
/// calls the original, after fires; `sum(3, 4)` becomes `(3*2)+(4*2) = 14`
/// with each log entry exactly once in order.
#[test]
fn test_end_to_end_sum_interception() -> Result<()> {
    let fixture = calculator_fixture()?;
    let log = new_log();

    let before = logging_closure("v@?", &log, "before")?;
    let after = logging_closure("v@?@:qq", &log, "after")?;
    let doubler = HookClosure::new("q@?@?<q@:qq>qq", |inv| {
        let a = inv.arg(0).and_then(Value::as_int).unwrap_or(0);
        let b = inv.arg(1).and_then(Value::as_int).unwrap_or(0);
        inv.original()
            .unwrap()
            .call(&[Value::Int(a * 2), Value::Int(b * 2)])
    })?;

    fixture
        .engine
        .hook_type(fixture.calculator, "sum".into(), HookMode::Before, before)?;
    fixture
        .engine
        .hook_type(fixture.calculator, "sum".into(), HookMode::Instead, doubler)?;
    fixture
        .engine
        .hook_type(fixture.calculator, "sum".into(), HookMode::After, after)?;

    let result = fixture.runtime.send(
        fixture.instance,
        "sum".into(),
        &[Value::Int(3), Value::Int(4)],
    )?;
    assert_eq!(result, Value::Int(14));
    assert_eq!(entries(&log), vec!["before", "after"]);
    Ok(())
}

/// Class-level methods hook through the type's meta table and observe the
/// type object as receiver.
#[test]
fn test_class_method_hooking() -> Result<()> {
    let fixture = calculator_fixture()?;
    let log = new_log();
    fixture.runtime.define_class_method(
        fixture.calculator,
        "family".into(),
        "q#:",
        Implementation::new(|_| Ok(Value::Int(1))),
    )?;

    let observer = logging_closure("v@?#:", &log, "class-hook")?;
    let token = fixture.engine.hook_class_method(
        fixture.calculator,
        "family".into(),
        HookMode::Before,
        observer,
    )?;

    let result = fixture
        .runtime
        .send_type(fixture.calculator, "family".into(), &[])?;
    assert_eq!(result, Value::Int(1));
    assert_eq!(entries(&log), vec!["class-hook"]);

    assert_eq!(token.cancel(), CancelOutcome::RemovedLast);
    fixture
        .runtime
        .send_type(fixture.calculator, "family".into(), &[])?;
    assert_eq!(entries(&log), vec!["class-hook"]);
    Ok(())
}
