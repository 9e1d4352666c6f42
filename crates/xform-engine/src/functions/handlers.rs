//! Host-registered functions, matched against typed prototypes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::coercion::{to_boolean, to_date, to_numeric, to_text};
use crate::error::{EvalError, EvalResult};
use crate::functions::FunctionContext;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    Boolean,
    Number,
    Text,
    Date,
}

impl ArgType {
    pub fn coerce(self, value: &Value) -> EvalResult<Value> {
        Ok(match self {
            ArgType::Boolean => Value::Bool(to_boolean(value)?),
            ArgType::Number => Value::Number(to_numeric(value)?),
            ArgType::Text => Value::Text(to_text(value)?),
            ArgType::Date => Value::Date(to_date(value)?),
        })
    }
}

pub trait FunctionHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Typed signatures, tried in order.
    fn prototypes(&self) -> &[Vec<ArgType>];

    /// Whether the handler accepts the uncoerced arguments when no prototype matches.
    fn raw_args(&self) -> bool {
        false
    }

    fn eval(&self, args: &[Value], ctx: &dyn FunctionContext) -> EvalResult<Value>;
}

type HandlerFn = dyn Fn(&[Value], &dyn FunctionContext) -> EvalResult<Value> + Send + Sync;

/// A [`FunctionHandler`] backed by a closure.
pub struct FnHandler {
    name: String,
    prototypes: Vec<Vec<ArgType>>,
    raw_args: bool,
    func: Box<HandlerFn>,
}

impl FnHandler {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value], &dyn FunctionContext) -> EvalResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            prototypes: Vec::new(),
            raw_args: false,
            func: Box::new(func),
        }
    }

    #[must_use]
    pub fn with_prototype(mut self, prototype: Vec<ArgType>) -> Self {
        self.prototypes.push(prototype);
        self
    }

    #[must_use]
    pub fn accepting_raw_args(mut self) -> Self {
        self.raw_args = true;
        self
    }
}

impl FunctionHandler for FnHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn prototypes(&self) -> &[Vec<ArgType>] {
        &self.prototypes
    }

    fn raw_args(&self) -> bool {
        self.raw_args
    }

    fn eval(&self, args: &[Value], ctx: &dyn FunctionContext) -> EvalResult<Value> {
        (self.func)(args, ctx)
    }
}

/// Registry of host functions keyed by name.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    handlers: HashMap<String, Arc<dyn FunctionHandler>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler`, replacing any handler of the same name.
    pub fn register(&mut self, handler: impl FunctionHandler + 'static) {
        self.register_arc(Arc::new(handler));
    }

    pub fn register_arc(&mut self, handler: Arc<dyn FunctionHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FunctionHandler>> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("handlers", &names)
            .finish()
    }
}

/// Coerces `args` into `prototype`, or `None` when the arity differs or a conversion fails.
fn match_prototype(args: &[Value], prototype: &[ArgType]) -> EvalResult<Option<Vec<Value>>> {
    if args.len() != prototype.len() {
        return Ok(None);
    }
    let mut typed = Vec::with_capacity(args.len());
    for (arg, ty) in args.iter().zip(prototype) {
        match ty.coerce(arg) {
            Ok(v) => typed.push(v),
            Err(EvalError::TypeMismatch { .. }) => return Ok(None),
            Err(other) => return Err(other),
        }
    }
    Ok(Some(typed))
}

pub(crate) fn call_handler(
    handler: &dyn FunctionHandler,
    ctx: &dyn FunctionContext,
    args: &[Value],
) -> EvalResult<Value> {
    for prototype in handler.prototypes() {
        if let Some(typed) = match_prototype(args, prototype)? {
            return handler.eval(&typed, ctx);
        }
    }
    if handler.raw_args() {
        return handler.eval(args, ctx);
    }
    Err(EvalError::mismatch(format!("arguments for {}", handler.name())))
}
