use thiserror::Error;
use xform_model::{ModelError, TreeReference};

use crate::graph::DependencyCycleError;

pub type EvalResult<T> = Result<T, EvalError>;

/// Failure of a single expression evaluation. Aborts that evaluation only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("type mismatch: {context}")]
    TypeMismatch { context: String },

    #[error("cannot handle function `{name}`")]
    UnhandledFunction { name: String },

    #[error("invalid regular expression `{pattern}`: {message}")]
    InvalidRegex { pattern: String, message: String },
}

impl EvalError {
    pub(crate) fn mismatch(context: impl Into<String>) -> Self {
        EvalError::TypeMismatch {
            context: context.into(),
        }
    }
}

pub type FormResult<T> = Result<T, FormError>;

#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Cycle(#[from] DependencyCycleError),

    #[error("form index {0} does not address an element of this form")]
    InvalidIndex(String),

    #[error("form index {0} is not inside a repeat")]
    NotInRepeat(String),

    #[error("form index {0} does not map onto the instance")]
    UnresolvedIndex(String),

    #[error("no repeat template for {0}")]
    NoTemplate(TreeReference),

    #[error("dependency cycle in <output>s; recursion limit of {limit} exceeded")]
    TemplateRecursionLimit { limit: u32 },

    #[error("triggerables must be finalized before they are evaluated")]
    NotFinalized,

    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}
