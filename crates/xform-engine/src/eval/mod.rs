mod context;
mod evaluator;

pub use context::EvaluationContext;
pub use evaluator::{evaluate, resolve_path};
