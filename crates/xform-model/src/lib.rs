//! `xform-model` defines the core in-memory data structures of a reactive form.
//!
//! The crate is intentionally self-contained so it can be reused by:
//! - the form engine (dependency graph, expression evaluation, navigation)
//! - import/export layers and IPC boundaries via `serde`

mod error;
pub mod form;
pub mod form_settings;
mod instance;
mod reference;
mod value;

pub use error::{ModelError, ModelResult};
pub use form::{ControlType, FormElement, GroupDef, QuestionDef, SelectChoice};
pub use form_settings::FormSettings;
pub use instance::{DataInstance, Preload, TreeElement};
pub use reference::{Multiplicity, RefStep, ReferenceParseError, TreeReference};
pub use value::{AnswerValue, DataType};
