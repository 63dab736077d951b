//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use graft::prelude::*;

/// A runtime with one `Calculator` type carrying `sum` and `destroy`, one
/// live instance, and an engine over it.
pub struct Fixture {
    pub runtime: Arc<Runtime>,
    pub engine: Engine,
    pub calculator: TypeId,
    pub instance: InstanceId,
}

pub fn calculator_fixture() -> Result<Fixture> {
    let _ = env_logger::builder().is_test(true).try_init();

    let runtime = Arc::new(Runtime::new());
    let calculator = runtime.type_builder("Calculator").build()?;
    runtime.define_method(
        calculator,
        "sum".into(),
        "q@:qq",
        Implementation::new(|env| {
            Ok(Value::Int(
                env.args[0].as_int().unwrap_or(0) + env.args[1].as_int().unwrap_or(0),
            ))
        }),
    )?;
    runtime.define_method(
        calculator,
        "destroy".into(),
        "v@:",
        Implementation::new(|_| Ok(Value::Unit)),
    )?;

    let instance = runtime.alloc(calculator)?;
    let engine = Engine::new(Arc::clone(&runtime));
    Ok(Fixture {
        runtime,
        engine,
        calculator,
        instance,
    })
}

/// An append-only event log shared between test body and hook closures.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// A void closure with the given encoding that appends `entry` when it fires.
pub fn logging_closure(encoding: &str, log: &Log, entry: &str) -> Result<HookClosureRc> {
    let log = Arc::clone(log);
    let entry = entry.to_string();
    HookClosure::new(encoding, move |_inv| {
        log.lock().unwrap().push(entry.clone());
        Ok(Value::Unit)
    })
}

/// Register a void `ping` method on `type_id` that logs `"body"`.
pub fn define_ping(runtime: &Runtime, type_id: TypeId, log: &Log) -> Result<()> {
    let log = Arc::clone(log);
    runtime.define_method(
        type_id,
        "ping".into(),
        "v@:",
        Implementation::new(move |_| {
            log.lock().unwrap().push("body".to_string());
            Ok(Value::Unit)
        }),
    )
}
