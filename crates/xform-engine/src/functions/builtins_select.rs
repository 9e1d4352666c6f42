use crate::coercion::to_text;
use crate::error::EvalResult;
use crate::functions::{Arity, FunctionContext, FunctionSpec};
use crate::value::Value;

inventory::submit! {
    FunctionSpec {
        name: "selected",
        arity: Arity::Exact(2),
        implementation: selected_fn,
    }
}

inventory::submit! {
    FunctionSpec {
        name: "is-selected",
        arity: Arity::Exact(2),
        implementation: selected_fn,
    }
}

/// Whether the space-separated selection list contains `choice` as a whole item.
fn selected_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let list = to_text(&args[0])?;
    let choice = to_text(&args[1])?;
    let padded = format!(" {list} ");
    Ok(Value::Bool(padded.contains(&format!(" {} ", choice.trim()))))
}

inventory::submit! {
    FunctionSpec {
        name: "count-selected",
        arity: Arity::Exact(1),
        implementation: count_selected_fn,
    }
}

fn count_selected_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let list = to_text(&args[0])?;
    Ok(Value::Number(list.split_whitespace().count() as f64))
}
