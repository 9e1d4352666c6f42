use chrono::NaiveTime;

use crate::error::EvalResult;
use crate::functions::{Arity, FunctionContext, FunctionSpec};
use crate::value::Value;

inventory::submit! {
    FunctionSpec {
        name: "today",
        arity: Arity::Exact(0),
        implementation: today_fn,
    }
}

fn today_fn(ctx: &dyn FunctionContext, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Date(ctx.now().date().and_time(NaiveTime::MIN)))
}

inventory::submit! {
    FunctionSpec {
        name: "now",
        arity: Arity::Exact(0),
        implementation: now_fn,
    }
}

fn now_fn(ctx: &dyn FunctionContext, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Date(ctx.now()))
}
