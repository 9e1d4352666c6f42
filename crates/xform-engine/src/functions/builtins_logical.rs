use crate::coercion::{to_boolean, to_numeric, to_text};
use crate::error::EvalResult;
use crate::functions::{Arity, FunctionContext, FunctionSpec};
use crate::value::Value;

inventory::submit! {
    FunctionSpec {
        name: "true",
        arity: Arity::Exact(0),
        implementation: true_fn,
    }
}

fn true_fn(_ctx: &dyn FunctionContext, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(true))
}

inventory::submit! {
    FunctionSpec {
        name: "false",
        arity: Arity::Exact(0),
        implementation: false_fn,
    }
}

fn false_fn(_ctx: &dyn FunctionContext, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(false))
}

inventory::submit! {
    FunctionSpec {
        name: "boolean",
        arity: Arity::Exact(1),
        implementation: boolean_fn,
    }
}

fn boolean_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(to_boolean(&args[0])?))
}

inventory::submit! {
    FunctionSpec {
        name: "not",
        arity: Arity::Exact(1),
        implementation: not_fn,
    }
}

fn not_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(!to_boolean(&args[0])?))
}

inventory::submit! {
    FunctionSpec {
        name: "boolean-from-string",
        arity: Arity::Exact(1),
        implementation: boolean_from_string_fn,
    }
}

/// `"true"` (any case) and `"1"` are true; everything else is false.
fn boolean_from_string_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let s = to_text(&args[0])?;
    Ok(Value::Bool(s.eq_ignore_ascii_case("true") || s == "1"))
}

inventory::submit! {
    FunctionSpec {
        name: "if",
        arity: Arity::Exact(3),
        implementation: if_fn,
    }
}

fn if_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    Ok(if to_boolean(&args[0])? {
        args[1].clone()
    } else {
        args[2].clone()
    })
}

/// A negative bound leaves that side of the range open. Only `checklist` counts this way.
fn within(value: f64, min: f64, max: f64) -> bool {
    (min < 0.0 || value >= min) && (max < 0.0 || value <= max)
}

inventory::submit! {
    FunctionSpec {
        name: "checklist",
        arity: Arity::AtLeast(2),
        implementation: checklist_fn,
    }
}

/// `checklist(min, max, b1, .., bn)`: true iff the number of true `bi` lies in `[min, max]`.
fn checklist_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let min = to_numeric(&args[0])?.trunc();
    let max = to_numeric(&args[1])?.trunc();
    let mut count = 0usize;
    for factor in &args[2..] {
        if to_boolean(factor)? {
            count += 1;
        }
    }
    Ok(Value::Bool(within(count as f64, min, max)))
}

inventory::submit! {
    FunctionSpec {
        name: "weighted-checklist",
        arity: Arity::EvenAtLeast(2),
        implementation: weighted_checklist_fn,
    }
}

/// `weighted-checklist(min, max, b1, w1, .., bn, wn)`: true iff the summed weight of the true
/// `bi` lies in `[min, max]`. Weights and bounds may be negative.
fn weighted_checklist_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let min = to_numeric(&args[0])?;
    let max = to_numeric(&args[1])?;
    let mut sum = 0.0;
    for pair in args[2..].chunks_exact(2) {
        if to_boolean(&pair[0])? {
            sum += to_numeric(&pair[1])?;
        }
    }
    Ok(Value::Bool(sum >= min && sum <= max))
}
