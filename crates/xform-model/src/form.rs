//! The static form element tree: questions, groups and repeats with their instance bindings.

use serde::{Deserialize, Serialize};

use crate::reference::TreeReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlType {
    #[default]
    Input,
    SelectOne,
    SelectMulti,
    Trigger,
    Upload,
    /// Read-only caption with no answer.
    Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectChoice {
    pub label: String,
    pub value: String,
}

impl SelectChoice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A question bound to a single instance leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDef {
    bind: TreeReference,
    pub control: ControlType,
    pub label: Option<String>,
    pub choices: Vec<SelectChoice>,
}

impl QuestionDef {
    /// `bind` is stored in generic form; concrete multiplicities come from the navigation index.
    pub fn new(bind: &TreeReference, control: ControlType) -> Self {
        Self {
            bind: bind.genericize(),
            control,
            label: None,
            choices: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_choices(mut self, choices: Vec<SelectChoice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn bind(&self) -> &TreeReference {
        &self.bind
    }
}

/// A group of elements. Repeat groups are bound to the repeated instance node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDef {
    bind: Option<TreeReference>,
    repeat: bool,
    pub label: Option<String>,
    pub children: Vec<FormElement>,
}

impl GroupDef {
    pub fn new(bind: Option<&TreeReference>, children: Vec<FormElement>) -> Self {
        Self {
            bind: bind.map(TreeReference::genericize),
            repeat: false,
            label: None,
            children,
        }
    }

    pub fn repeat(bind: &TreeReference, children: Vec<FormElement>) -> Self {
        Self {
            bind: Some(bind.genericize()),
            repeat: true,
            label: None,
            children,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn bind(&self) -> Option<&TreeReference> {
        self.bind.as_ref()
    }

    pub fn is_repeat(&self) -> bool {
        self.repeat
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormElement {
    Question(QuestionDef),
    Group(GroupDef),
}

impl FormElement {
    pub fn children(&self) -> &[FormElement] {
        match self {
            FormElement::Question(_) => &[],
            FormElement::Group(g) => &g.children,
        }
    }

    pub fn child(&self, index: usize) -> Option<&FormElement> {
        self.children().get(index)
    }

    pub fn bind(&self) -> Option<&TreeReference> {
        match self {
            FormElement::Question(q) => Some(q.bind()),
            FormElement::Group(g) => g.bind(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            FormElement::Question(q) => q.label.as_deref(),
            FormElement::Group(g) => g.label.as_deref(),
        }
    }

    pub fn is_repeat(&self) -> bool {
        matches!(self, FormElement::Group(g) if g.is_repeat())
    }

    pub fn is_question(&self) -> bool {
        matches!(self, FormElement::Question(_))
    }

    /// Number of elements below this one, counted recursively.
    pub fn deep_child_count(&self) -> usize {
        self.children()
            .iter()
            .map(|c| 1 + c.deep_child_count())
            .sum()
    }
}

impl From<QuestionDef> for FormElement {
    fn from(value: QuestionDef) -> Self {
        FormElement::Question(value)
    }
}

impl From<GroupDef> for FormElement {
    fn from(value: GroupDef) -> Self {
        FormElement::Group(value)
    }
}
