use crate::coercion::{to_date, to_numeric, to_text};
use crate::error::EvalResult;
use crate::functions::{Arity, FunctionContext, FunctionSpec};
use crate::value::Value;

inventory::submit! {
    FunctionSpec {
        name: "number",
        arity: Arity::Exact(1),
        implementation: number_fn,
    }
}

fn number_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(to_numeric(&args[0])?))
}

inventory::submit! {
    FunctionSpec {
        name: "string",
        arity: Arity::Exact(1),
        implementation: string_fn,
    }
}

fn string_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Text(to_text(&args[0])?))
}

inventory::submit! {
    FunctionSpec {
        name: "date",
        arity: Arity::Exact(1),
        implementation: date_fn,
    }
}

/// Converts to a date, dropping any time of day.
fn date_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let dt = to_date(&args[0])?;
    Ok(Value::Date(dt.date().and_time(chrono::NaiveTime::MIN)))
}
