use regex::Regex;

use crate::coercion::to_text;
use crate::error::{EvalError, EvalResult};
use crate::functions::{Arity, FunctionContext, FunctionSpec};
use crate::value::Value;

inventory::submit! {
    FunctionSpec {
        name: "concat",
        arity: Arity::AtLeast(0),
        implementation: concat_fn,
    }
}

fn concat_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&to_text(arg)?);
    }
    Ok(Value::Text(out))
}

inventory::submit! {
    FunctionSpec {
        name: "regex",
        arity: Arity::Exact(2),
        implementation: regex_fn,
    }
}

/// `regex(subject, pattern)`: unanchored search using the `regex` crate's syntax.
fn regex_fn(_ctx: &dyn FunctionContext, args: &[Value]) -> EvalResult<Value> {
    let subject = to_text(&args[0])?;
    let pattern = to_text(&args[1])?;
    let re = Regex::new(&pattern).map_err(|err| EvalError::InvalidRegex {
        pattern: pattern.clone(),
        message: err.to_string(),
    })?;
    Ok(Value::Bool(re.is_match(&subject)))
}
