#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Reactive form engine: typed expression evaluation, a dependency graph of conditions and
//! calculations, and repeat-aware navigation over a form.
//!
//! A [`FormDef`] owns the static element tree, the live [`xform_model::DataInstance`] and the
//! registered [`Triggerable`]s. Hosts register triggerables while loading a form, call
//! [`FormDef::finalize_triggerables`] once, and then drive the form with
//! [`FormDef::set_value`], [`FormDef::create_new_repeat`] / [`FormDef::delete_repeat`] and the
//! [`Navigator`] returned by [`FormDef::navigator`].
//!
//! ## Host functions
//!
//! Expressions may call functions beyond the built-in table. Hosts register a
//! [`FunctionHandler`] (for example an [`FnHandler`] wrapping a closure) with
//! [`FormDef::register_function`]; arguments are coerced against the handler's typed
//! prototypes in order.
//!
//! The engine logs through the [`log`] facade and never installs a logger itself.

pub mod coercion;
pub mod error;
pub mod eval;
pub mod expr;
pub mod form;
pub mod functions;
pub mod graph;
pub mod nav;
pub mod triggerable;
pub mod value;

pub use crate::error::{EvalError, EvalResult, FormError, FormResult};
pub use crate::eval::{evaluate, EvaluationContext};
pub use crate::expr::{BinaryOp, Expr};
pub use crate::form::{
    Constraint, FormDef, FormDefSnapshot, PreloadHandler, QuestionPreloader, TextCatalog,
};
pub use crate::functions::{ArgType, FnHandler, FunctionContext, FunctionHandler, FunctionRegistry};
pub use crate::graph::{DependencyCycleError, DependencyGraph, GraphStats, TriggerableId};
pub use crate::nav::{CollapsedIndex, FormIndex, IndexLevel, Navigator};
pub use crate::triggerable::{wrap_result, ConditionAction, Triggerable, TriggerableKind};
pub use crate::value::{CustomValue, NodeSet, Value};
