use crate::{
    encoding::{CallSignature, Parameter},
    hook::HookMode,
    Error::{ClosureArity, ClosureParameter, ClosureReturn, OriginalCallbackShape},
    Result,
};

/// Validate a closure's shape against a method's shape for a hooking mode.
///
/// The closure signature's first parameter is its own invocable marker
/// (guaranteed by [`crate::HookClosure::new`]); the rules apply to what
/// follows it.
///
/// - **before/after**: the tail is empty, or exactly {receiver, method key},
///   or exactly the method's full parameter list; the return must be void.
/// - **instead**: the tail is the original-callback (an invocable whose
///   nested signature equals the method's, modulo the consumed-receiver
///   tolerance) followed by the method's declared arguments; the return must
///   equal the method's.
pub(crate) fn check_closure(
    mode: HookMode,
    method: &CallSignature,
    closure: &CallSignature,
) -> Result<()> {
    let tail = &closure.params[1..];
    match mode {
        HookMode::Before | HookMode::After => check_observer(method, closure, tail),
        HookMode::Instead => check_replacer(method, closure, tail),
    }
}

fn check_observer(
    method: &CallSignature,
    closure: &CallSignature,
    tail: &[Parameter],
) -> Result<()> {
    if !closure.return_type.encoding.is_void() {
        return Err(ClosureReturn {
            expected: "v".to_string(),
            found: closure.return_type.encoding.render(),
        });
    }

    match tail.len() {
        0 => Ok(()),
        len if len == 2 || len == method.params.len() => {
            compare_params(&method.params[..len], tail)
        }
        len => Err(ClosureArity {
            method: method.params.len(),
            closure: len,
        }),
    }
}

fn check_replacer(
    method: &CallSignature,
    closure: &CallSignature,
    tail: &[Parameter],
) -> Result<()> {
    // original-callback plus the method's declared arguments
    let declared = &method.params[2..];
    if tail.len() != declared.len() + 1 {
        return Err(ClosureArity {
            method: declared.len() + 1,
            closure: tail.len(),
        });
    }

    match &tail[0].encoding {
        crate::encoding::TypeEncoding::Invocable(Some(nested)) => {
            if !nested.matches_as_bound(method) {
                return Err(OriginalCallbackShape(format!(
                    "callback signature '{nested}' differs from method signature '{method}'"
                )));
            }
        }
        crate::encoding::TypeEncoding::Invocable(None) => {
            return Err(OriginalCallbackShape(
                "first parameter carries no signature".to_string(),
            ));
        }
        other => {
            return Err(OriginalCallbackShape(format!(
                "first parameter '{other}' is not invocable"
            )));
        }
    }

    compare_params(declared, &tail[1..])?;

    if !closure
        .return_type
        .encoding
        .matches(&method.return_type.encoding)
    {
        return Err(ClosureReturn {
            expected: method.return_type.encoding.render(),
            found: closure.return_type.encoding.render(),
        });
    }
    Ok(())
}

fn compare_params(expected: &[Parameter], found: &[Parameter]) -> Result<()> {
    for (index, (want, have)) in expected.iter().zip(found.iter()).enumerate() {
        if !have.encoding.matches(&want.encoding) {
            return Err(ClosureParameter {
                index,
                expected: want.encoding.render(),
                found: have.encoding.render(),
            });
        }
    }
    Ok(())
}
