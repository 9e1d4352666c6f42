use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use xform_model::{AnswerValue, TreeElement, TreeReference};

use crate::error::EvalResult;

/// Host-defined runtime type that supplies its own conversions.
pub trait CustomValue: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &'static str;
    fn to_boolean(&self) -> EvalResult<bool>;
    fn to_numeric(&self) -> EvalResult<f64>;
    fn to_text(&self) -> EvalResult<String>;
}

/// A runtime value produced by expression evaluation.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
    NodeSet(NodeSet),
    Custom(Arc<dyn CustomValue>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::NodeSet(a), Value::NodeSet(b)) => a == b,
            (Value::Custom(a), Value::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Date(_) => "date",
            Value::NodeSet(_) => "nodeset",
            Value::Custom(c) => c.type_name(),
        }
    }

    /// Collapses a node-set to the value of its first node (empty string when empty).
    /// Other values are returned unchanged.
    pub fn unpack(&self) -> Value {
        match self {
            Value::NodeSet(set) => set
                .first_value()
                .cloned()
                .unwrap_or_else(|| Value::Text(String::new())),
            other => other.clone(),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&AnswerValue> for Value {
    fn from(value: &AnswerValue) -> Self {
        match value {
            AnswerValue::Integer(n) => Value::Number(*n as f64),
            AnswerValue::Decimal(n) => Value::Number(*n),
            AnswerValue::Boolean(b) => Value::Bool(*b),
            AnswerValue::Date(d) => Value::Date(d.and_time(chrono::NaiveTime::MIN)),
            AnswerValue::DateTime(dt) => Value::Date(*dt),
            other => Value::Text(other.display_text()),
        }
    }
}

impl From<&TreeElement> for Value {
    /// Leaves yield their typed answer (empty string when unanswered); groups their string-value.
    fn from(node: &TreeElement) -> Self {
        if node.is_leaf() {
            node.value()
                .map(Value::from)
                .unwrap_or_else(|| Value::Text(String::new()))
        } else {
            Value::Text(node.string_value())
        }
    }
}

/// An ordered set of resolved instance nodes, with their values read at resolution time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeSet {
    nodes: Vec<(TreeReference, Value)>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reference: TreeReference, value: Value) {
        self.nodes.push((reference, value));
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn refs(&self) -> impl Iterator<Item = &TreeReference> {
        self.nodes.iter().map(|(r, _)| r)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.nodes.iter().map(|(_, v)| v)
    }

    pub fn first_value(&self) -> Option<&Value> {
        self.nodes.first().map(|(_, v)| v)
    }
}

impl FromIterator<(TreeReference, Value)> for NodeSet {
    fn from_iter<I: IntoIterator<Item = (TreeReference, Value)>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}
