use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::reference::{Multiplicity, TreeReference};
use crate::value::{AnswerValue, DataType};

/// Names a preload handler (e.g. `timestamp`) and its parameters (e.g. `start`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preload {
    pub handler: String,
    pub params: String,
}

/// A node is either a leaf that may hold an answer or a group that owns children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum NodeContent {
    Value(Option<AnswerValue>),
    Children(Vec<TreeElement>),
}

/// A node of the instance tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeElement {
    name: String,
    multiplicity: Multiplicity,
    content: NodeContent,
    data_type: DataType,
    repeatable: bool,
    relevant: bool,
    relevant_inherited: bool,
    required: bool,
    enabled: bool,
    preload: Option<Preload>,
}

impl TreeElement {
    fn with_content(name: impl Into<String>, content: NodeContent, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            multiplicity: Multiplicity::Index(0),
            content,
            data_type,
            repeatable: false,
            relevant: true,
            relevant_inherited: true,
            required: false,
            enabled: true,
            preload: None,
        }
    }

    /// An unanswered leaf.
    pub fn leaf(name: impl Into<String>, data_type: DataType) -> Self {
        Self::with_content(name, NodeContent::Value(None), data_type)
    }

    /// A group owning `children`.
    pub fn group(name: impl Into<String>, children: Vec<TreeElement>) -> Self {
        Self::with_content(name, NodeContent::Children(children), DataType::Unspecified)
    }

    /// Builder: sets the answer of a leaf. Has no effect on groups.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<AnswerValue>) -> Self {
        if let NodeContent::Value(slot) = &mut self.content {
            *slot = Some(value.into());
        }
        self
    }

    #[must_use]
    pub fn with_multiplicity(mut self, multiplicity: Multiplicity) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    /// Builder: marks the node as a repeat template (clone source for new instances).
    #[must_use]
    pub fn into_template(mut self) -> Self {
        self.multiplicity = Multiplicity::Template;
        self.repeatable = true;
        self
    }

    /// Builder: marks the node as one instance of a repeat.
    #[must_use]
    pub fn into_repeat_instance(mut self, index: usize) -> Self {
        self.multiplicity = Multiplicity::Index(index);
        self.repeatable = true;
        self
    }

    #[must_use]
    pub fn with_preload(mut self, handler: impl Into<String>, params: impl Into<String>) -> Self {
        self.preload = Some(Preload {
            handler: handler.into(),
            params: params.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    pub fn set_multiplicity(&mut self, multiplicity: Multiplicity) {
        self.multiplicity = multiplicity;
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.content, NodeContent::Value(_))
    }

    pub fn is_template(&self) -> bool {
        self.multiplicity == Multiplicity::Template
    }

    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    pub fn preload(&self) -> Option<&Preload> {
        self.preload.as_ref()
    }

    pub fn value(&self) -> Option<&AnswerValue> {
        match &self.content {
            NodeContent::Value(v) => v.as_ref(),
            NodeContent::Children(_) => None,
        }
    }

    /// Replaces the answer of a leaf. Returns whether the stored answer changed.
    pub fn set_answer(&mut self, value: Option<AnswerValue>) -> ModelResult<bool> {
        match &mut self.content {
            NodeContent::Value(slot) => {
                let changed = *slot != value;
                *slot = value;
                Ok(changed)
            }
            NodeContent::Children(_) => Err(ModelError::NotALeaf {
                name: self.name.clone(),
            }),
        }
    }

    pub fn children(&self) -> &[TreeElement] {
        match &self.content {
            NodeContent::Children(c) => c,
            NodeContent::Value(_) => &[],
        }
    }

    pub fn num_children(&self) -> usize {
        self.children().len()
    }

    pub fn child(&self, name: &str, multiplicity: Multiplicity) -> Option<&TreeElement> {
        self.children()
            .iter()
            .find(|c| c.name == name && c.multiplicity == multiplicity)
    }

    pub fn child_mut(&mut self, name: &str, multiplicity: Multiplicity) -> Option<&mut TreeElement> {
        match &mut self.content {
            NodeContent::Children(c) => c
                .iter_mut()
                .find(|c| c.name == name && c.multiplicity == multiplicity),
            NodeContent::Value(_) => None,
        }
    }

    /// Number of live (non-template) children named `name`.
    pub fn child_multiplicity(&self, name: &str) -> usize {
        self.children()
            .iter()
            .filter(|c| c.name == name && !c.is_template())
            .count()
    }

    /// Inserts `child` after the last sibling sharing its name (or at the end).
    pub fn add_child(&mut self, mut child: TreeElement) -> ModelResult<()> {
        let inherited = self.is_relevant();
        let NodeContent::Children(children) = &mut self.content else {
            return Err(ModelError::NotAGroup {
                name: self.name.clone(),
            });
        };
        child.set_relevant_inherited(inherited);
        let pos = children
            .iter()
            .rposition(|c| c.name == child.name)
            .map_or(children.len(), |p| p + 1);
        children.insert(pos, child);
        Ok(())
    }

    pub fn remove_child(&mut self, name: &str, multiplicity: Multiplicity) -> Option<TreeElement> {
        let NodeContent::Children(children) = &mut self.content else {
            return None;
        };
        let pos = children
            .iter()
            .position(|c| c.name == name && c.multiplicity == multiplicity)?;
        Some(children.remove(pos))
    }

    /// Renumbers the `name` siblings whose index exceeds `removed` down by one, keeping
    /// multiplicities dense after a removal.
    pub fn shift_multiplicities_down(&mut self, name: &str, removed: usize) {
        if let NodeContent::Children(children) = &mut self.content {
            for c in children.iter_mut().filter(|c| c.name == name) {
                if let Multiplicity::Index(i) = c.multiplicity {
                    if i > removed {
                        c.multiplicity = Multiplicity::Index(i - 1);
                    }
                }
            }
        }
    }

    /// XPath string-value: a leaf's answer text, or the concatenation of all live descendants.
    pub fn string_value(&self) -> String {
        match &self.content {
            NodeContent::Value(v) => v.as_ref().map(AnswerValue::display_text).unwrap_or_default(),
            NodeContent::Children(children) => children
                .iter()
                .filter(|c| !c.is_template())
                .map(TreeElement::string_value)
                .collect(),
        }
    }

    pub fn is_relevant(&self) -> bool {
        self.relevant && self.relevant_inherited
    }

    pub fn set_relevant(&mut self, relevant: bool) {
        if self.relevant == relevant {
            return;
        }
        self.relevant = relevant;
        let effective = self.is_relevant();
        self.propagate_relevance(effective);
    }

    fn set_relevant_inherited(&mut self, inherited: bool) {
        if self.relevant_inherited == inherited {
            return;
        }
        self.relevant_inherited = inherited;
        let effective = self.is_relevant();
        self.propagate_relevance(effective);
    }

    fn propagate_relevance(&mut self, effective: bool) {
        if let NodeContent::Children(children) = &mut self.content {
            for c in children {
                c.set_relevant_inherited(effective);
            }
        }
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn set_required(&mut self, required: bool) {
        self.required = required;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Visits every live (non-template) node of the subtree, parents first.
    pub fn visit_live_mut(&mut self, f: &mut dyn FnMut(&mut TreeElement)) {
        f(self);
        if let NodeContent::Children(children) = &mut self.content {
            for c in children.iter_mut().filter(|c| !c.is_template()) {
                c.visit_live_mut(f);
            }
        }
    }
}

/// The instance tree: the hierarchical answer data of one form entry.
///
/// The root is an unnamed container; the top-level data node is its only child, so
/// `/data/q` resolves `data` below the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataInstance {
    root: TreeElement,
    form_id: Option<i32>,
}

impl DataInstance {
    pub fn new(top: TreeElement) -> Self {
        Self {
            root: TreeElement::group("", vec![top]),
            form_id: None,
        }
    }

    pub fn root(&self) -> &TreeElement {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut TreeElement {
        &mut self.root
    }

    pub fn form_id(&self) -> Option<i32> {
        self.form_id
    }

    pub fn set_form_id(&mut self, id: i32) {
        self.form_id = Some(id);
    }

    /// Returns the node addressed by an absolute reference. Wildcard steps never resolve.
    pub fn resolve_reference(&self, reference: &TreeReference) -> Option<&TreeElement> {
        if !reference.is_absolute() {
            return None;
        }
        let mut node = &self.root;
        for step in reference.steps() {
            if step.multiplicity == Multiplicity::Wildcard {
                return None;
            }
            node = node.child(&step.name, step.multiplicity)?;
        }
        Some(node)
    }

    pub fn resolve_reference_mut(&mut self, reference: &TreeReference) -> Option<&mut TreeElement> {
        if !reference.is_absolute() {
            return None;
        }
        let mut node = &mut self.root;
        for step in reference.steps() {
            if step.multiplicity == Multiplicity::Wildcard {
                return None;
            }
            node = node.child_mut(&step.name, step.multiplicity)?;
        }
        Some(node)
    }

    /// Expands the wildcard steps of an absolute reference into every matching live node,
    /// in document order. Templates are never produced by a wildcard.
    pub fn expand_reference(&self, reference: &TreeReference) -> Vec<TreeReference> {
        if !reference.is_absolute() {
            return Vec::new();
        }
        let mut frontier: Vec<(TreeReference, &TreeElement)> = vec![(TreeReference::root(), &self.root)];
        for step in reference.steps() {
            let mut next = Vec::new();
            for &(ref r, node) in &frontier {
                match step.multiplicity {
                    Multiplicity::Wildcard => {
                        let mut matches: Vec<&TreeElement> = node
                            .children()
                            .iter()
                            .filter(|c| c.name == step.name && !c.is_template())
                            .collect();
                        matches.sort_by_key(|c| c.multiplicity);
                        for c in matches {
                            next.push((r.child(step.name.clone(), c.multiplicity), c));
                        }
                    }
                    m => {
                        if let Some(c) = node.child(&step.name, m) {
                            next.push((r.child(step.name.clone(), m), c));
                        }
                    }
                }
            }
            frontier = next;
        }
        frontier.into_iter().map(|(r, _)| r).collect()
    }

    /// Returns the repeat template a reference (to a repeat instance, existing or not)
    /// would be cloned from.
    pub fn get_template(&self, reference: &TreeReference) -> Option<&TreeElement> {
        if !reference.is_absolute() || reference.is_empty() {
            return None;
        }
        let mut node = &self.root;
        for step in reference.steps() {
            let fallback = match step.multiplicity {
                Multiplicity::Index(i) => Multiplicity::Index(i),
                _ => Multiplicity::Index(0),
            };
            node = node
                .child(&step.name, Multiplicity::Template)
                .or_else(|| node.child(&step.name, fallback))?;
        }
        node.is_template().then_some(node)
    }

    /// Materializes a clone of `template` as the repeat instance addressed by `dest`, which
    /// must be the next free multiplicity so instances stay dense.
    pub fn copy_node(&mut self, template: &TreeElement, dest: &TreeReference) -> ModelResult<()> {
        let Some(Multiplicity::Index(index)) = dest.last_multiplicity() else {
            return Err(ModelError::NodeNotFound(dest.clone()));
        };
        let parent_ref = dest
            .parent_ref()
            .ok_or_else(|| ModelError::ParentNotFound(dest.clone()))?;
        let parent = self
            .resolve_reference_mut(&parent_ref)
            .ok_or_else(|| ModelError::ParentNotFound(dest.clone()))?;
        if parent.child(template.name(), Multiplicity::Index(index)).is_some() {
            return Err(ModelError::NodeExists(dest.clone()));
        }
        let next = parent.child_multiplicity(template.name());
        if index != next {
            return Err(ModelError::MultiplicityGap {
                reference: dest.clone(),
                next,
            });
        }
        parent.add_child(template.clone().into_repeat_instance(index))
    }

    /// Removes the node at `reference` and returns it.
    pub fn remove_node(&mut self, reference: &TreeReference) -> ModelResult<TreeElement> {
        let (Some(name), Some(multiplicity)) = (reference.last_name(), reference.last_multiplicity())
        else {
            return Err(ModelError::NodeNotFound(reference.clone()));
        };
        let name = name.to_string();
        let parent_ref = reference
            .parent_ref()
            .ok_or_else(|| ModelError::ParentNotFound(reference.clone()))?;
        let parent = self
            .resolve_reference_mut(&parent_ref)
            .ok_or_else(|| ModelError::ParentNotFound(reference.clone()))?;
        parent
            .remove_child(&name, multiplicity)
            .ok_or_else(|| ModelError::NodeNotFound(reference.clone()))
    }
}
