use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::NaiveDateTime;

use crate::error::{EvalError, EvalResult};
use crate::eval::EvaluationContext;
use crate::value::Value;

pub mod handlers;

// Built-in functions registered with the inventory-backed registry live in dedicated modules.
mod builtins_aggregate;
mod builtins_convert;
mod builtins_date_time;
mod builtins_logical;
mod builtins_select;
mod builtins_text;

pub use handlers::{ArgType, FnHandler, FunctionHandler, FunctionRegistry};

/// What a function implementation may ask of its caller.
pub trait FunctionContext {
    /// Local wall-clock time used by `today()`, `now()` and timestamp preloads.
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// An even number of arguments, at least the given count.
    EvenAtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::EvenAtLeast(n) => count >= n && count % 2 == 0,
        }
    }
}

pub type FunctionImpl = fn(&dyn FunctionContext, &[Value]) -> EvalResult<Value>;

#[derive(Clone, Copy)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub arity: Arity,
    pub implementation: FunctionImpl,
}

inventory::collect!(FunctionSpec);

/// Iterate all [`FunctionSpec`] registrations collected via [`inventory`].
pub fn iter_function_specs() -> impl Iterator<Item = &'static FunctionSpec> {
    inventory::iter::<FunctionSpec>.into_iter()
}

fn registry() -> &'static HashMap<&'static str, &'static FunctionSpec> {
    static REGISTRY: OnceLock<HashMap<&'static str, &'static FunctionSpec>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        for spec in inventory::iter::<FunctionSpec> {
            map.insert(spec.name, spec);
        }
        map
    })
}

/// Finds the built-in for `name` if it accepts `arg_count` arguments.
pub fn lookup_function(name: &str, arg_count: usize) -> Option<&'static FunctionSpec> {
    registry()
        .get(name)
        .copied()
        .filter(|spec| spec.arity.accepts(arg_count))
}

/// Dispatches a call: built-ins first (by name and arity), then the handlers registered on the
/// evaluation context (by name only).
pub fn call_function(ctx: &EvaluationContext, name: &str, args: &[Value]) -> EvalResult<Value> {
    if let Some(spec) = lookup_function(name, args.len()) {
        return (spec.implementation)(ctx, args);
    }

    match ctx.functions().get(name) {
        Some(handler) => handlers::call_handler(handler.as_ref(), ctx, args),
        None => Err(EvalError::UnhandledFunction {
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_is_complete() {
        let expected = [
            ("true", 0),
            ("false", 0),
            ("boolean", 1),
            ("number", 1),
            ("string", 1),
            ("date", 1),
            ("not", 1),
            ("boolean-from-string", 1),
            ("if", 3),
            ("selected", 2),
            ("is-selected", 2),
            ("count-selected", 1),
            ("count", 1),
            ("sum", 1),
            ("today", 0),
            ("now", 0),
            ("concat", 0),
            ("concat", 5),
            ("checklist", 2),
            ("checklist", 5),
            ("weighted-checklist", 2),
            ("weighted-checklist", 6),
            ("regex", 2),
        ];
        for (name, argc) in expected {
            assert!(
                lookup_function(name, argc).is_some(),
                "missing built-in {name}/{argc}"
            );
        }
        assert!(lookup_function("weighted-checklist", 5).is_none());
        assert!(lookup_function("checklist", 1).is_none());
        assert!(lookup_function("if", 2).is_none());
    }
}
