use std::sync::Arc;

use chrono::NaiveDateTime;
use xform_model::{AnswerValue, TreeReference};

use crate::functions::{FunctionContext, FunctionRegistry};

/// Per-evaluation state: where relative paths are anchored, which host functions exist, and
/// (for constraint checks) the value being validated.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    context_ref: TreeReference,
    functions: Arc<FunctionRegistry>,
    is_constraint: bool,
    candidate_value: Option<AnswerValue>,
    now: Option<NaiveDateTime>,
}

impl EvaluationContext {
    pub fn new(context_ref: TreeReference) -> Self {
        Self {
            context_ref,
            functions: Arc::new(FunctionRegistry::default()),
            is_constraint: false,
            candidate_value: None,
            now: None,
        }
    }

    #[must_use]
    pub fn with_functions(mut self, functions: Arc<FunctionRegistry>) -> Self {
        self.functions = functions;
        self
    }

    /// Pins the clock seen by `today()` / `now()`.
    #[must_use]
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    /// Marks this as a constraint check: the context node reads as `candidate`.
    #[must_use]
    pub fn with_candidate(mut self, candidate: AnswerValue) -> Self {
        self.is_constraint = true;
        self.candidate_value = Some(candidate);
        self
    }

    /// Same registry, clock and constraint state, anchored at `context_ref`.
    #[must_use]
    pub fn rebase(&self, context_ref: TreeReference) -> Self {
        Self {
            context_ref,
            ..self.clone()
        }
    }

    pub fn context_ref(&self) -> &TreeReference {
        &self.context_ref
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn is_constraint(&self) -> bool {
        self.is_constraint
    }

    pub fn candidate_value(&self) -> Option<&AnswerValue> {
        self.candidate_value.as_ref()
    }
}

impl FunctionContext for EvaluationContext {
    fn now(&self) -> NaiveDateTime {
        self.now
            .unwrap_or_else(|| chrono::Local::now().naive_local())
    }
}
