use crate::coercion::to_numeric;
use crate::error::{EvalError, EvalResult};
use crate::functions::{Arity, FunctionContext, FunctionSpec};
use crate::value::{NodeSet, Value};

fn node_set<'a>(value: &'a Value, function: &str) -> EvalResult<&'a NodeSet> {
    match value {
        Value::NodeSet(set) => Ok(set),
        other => Err(EvalError::mismatch(format!(
            "{function}() expects a node-set, got {}",
            other.type_name()
        ))),
    }
}

inventory::submit! {
    FunctionSpec {
        name: "count",
        arity: Arity::Exact(1),
        implementation: count_fn,
    }
}

fn count_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(node_set(&args[0], "count")?.len() as f64))
}

inventory::submit! {
    FunctionSpec {
        name: "sum",
        arity: Arity::Exact(1),
        implementation: sum_fn,
    }
}

/// Sums the numeric values of the nodes; the empty set sums to 0.
fn sum_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let mut total = 0.0;
    for value in node_set(&args[0], "sum")?.values() {
        total += to_numeric(value)?;
    }
    Ok(Value::Number(total))
}
