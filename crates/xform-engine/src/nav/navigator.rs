use xform_model::{DataInstance, FormElement, Multiplicity, TreeReference};

use crate::error::{FormError, FormResult};
use crate::nav::{FormIndex, IndexLevel};

/// A [`FormIndex`] resolved against the element tree: parallel per-level child positions,
/// instance multiplicities (0 for non-repeats) and elements.
#[derive(Debug, Clone, Default)]
pub struct CollapsedIndex<'a> {
    pub indexes: Vec<usize>,
    pub multiplicities: Vec<usize>,
    pub elements: Vec<&'a FormElement>,
}

impl<'a> CollapsedIndex<'a> {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.indexes.truncate(len);
        self.multiplicities.truncate(len);
        self.elements.truncate(len);
    }

    fn push(&mut self, index: usize, multiplicity: usize, element: &'a FormElement) {
        self.indexes.push(index);
        self.multiplicities.push(multiplicity);
        self.elements.push(element);
    }

    fn pop(&mut self) {
        self.indexes.pop();
        self.multiplicities.pop();
        self.elements.pop();
    }

    /// Rebuilds the index; only repeat levels carry an instance number.
    pub fn to_index(&self) -> FormIndex {
        FormIndex::from_levels(
            self.indexes
                .iter()
                .zip(&self.multiplicities)
                .zip(&self.elements)
                .map(|((&index, &mult), element)| {
                    if element.is_repeat() {
                        IndexLevel::repeat(index, mult)
                    } else {
                        IndexLevel::element(index)
                    }
                }),
        )
    }
}

/// Stateless navigation over a form's element tree and its live instance.
#[derive(Debug, Clone, Copy)]
pub struct Navigator<'a> {
    children: &'a [FormElement],
    instance: &'a DataInstance,
}

impl<'a> Navigator<'a> {
    pub fn new(children: &'a [FormElement], instance: &'a DataInstance) -> Self {
        Self { children, instance }
    }

    /// Elements sharing a parent with level `level`.
    fn siblings(&self, collapsed: &CollapsedIndex<'a>, level: usize) -> &'a [FormElement] {
        match level.checked_sub(1) {
            None => self.children,
            Some(parent) => collapsed.elements[parent].children(),
        }
    }

    pub fn collapse(&self, index: &FormIndex) -> FormResult<CollapsedIndex<'a>> {
        let mut collapsed = CollapsedIndex::default();
        for (level, step) in index.levels().iter().enumerate() {
            let element = self
                .siblings(&collapsed, level)
                .get(step.local_index)
                .ok_or_else(|| FormError::InvalidIndex(index.to_string()))?;
            collapsed.push(
                step.local_index,
                step.instance_index.unwrap_or(0),
                element,
            );
        }
        Ok(collapsed)
    }

    /// Maps a collapsed index onto a concrete instance reference.
    ///
    /// Returns `None` for unbound elements, or when a repeat's binding is not an ancestor of
    /// the target binding.
    pub fn child_instance_ref(&self, collapsed: &CollapsedIndex<'_>) -> Option<TreeReference> {
        let mut reference = collapsed.elements.last()?.bind()?.clone();
        for (element, &mult) in collapsed.elements.iter().zip(&collapsed.multiplicities) {
            if !element.is_repeat() {
                continue;
            }
            let repeat = element.bind()?;
            if !repeat.is_parent_of(&reference, false) {
                return None;
            }
            reference.set_multiplicity(repeat.len().checked_sub(1)?, Multiplicity::Index(mult));
        }
        for level in 0..reference.len() {
            if reference.multiplicity(level) == Some(Multiplicity::Wildcard) {
                reference.set_multiplicity(level, Multiplicity::Index(0));
            }
        }
        Some(reference)
    }

    pub fn instance_ref(&self, index: &FormIndex) -> FormResult<Option<TreeReference>> {
        Ok(self.child_instance_ref(&self.collapse(index)?))
    }

    fn instance_exists(&self, collapsed: &CollapsedIndex<'_>) -> bool {
        self.child_instance_ref(collapsed)
            .is_some_and(|r| self.instance.resolve_reference(&r).is_some())
    }

    /// Number of live instances of the repeat at the deepest level of `collapsed`.
    fn repeat_count(&self, collapsed: &CollapsedIndex<'_>) -> usize {
        let Some(reference) = self.child_instance_ref(collapsed) else {
            return 0;
        };
        let (Some(name), Some(parent)) = (reference.last_name(), reference.parent_ref()) else {
            return 0;
        };
        self.instance
            .resolve_reference(&parent)
            .map_or(0, |node| node.child_multiplicity(name))
    }

    /// Points the deepest (repeat) level at its last live instance. Returns `false` when there
    /// is none, leaving the level at instance 0.
    fn land_on_last_instance(&self, collapsed: &mut CollapsedIndex<'a>) -> bool {
        let Some(last) = collapsed.multiplicities.len().checked_sub(1) else {
            return false;
        };
        collapsed.multiplicities[last] = 0;
        match self.repeat_count(collapsed) {
            0 => false,
            count => {
                collapsed.multiplicities[last] = count - 1;
                true
            }
        }
    }

    /// Next element in depth-first pre-order; [`FormIndex::End`] after the last one.
    pub fn increment(&self, index: &FormIndex) -> FormResult<FormIndex> {
        let mut collapsed = match index {
            FormIndex::End => return Ok(FormIndex::End),
            FormIndex::Beginning if self.children.is_empty() => return Ok(FormIndex::End),
            FormIndex::Beginning => CollapsedIndex::default(),
            FormIndex::At(_) => self.collapse(index)?,
        };
        self.increment_helper(&mut collapsed, true);
        Ok(if collapsed.is_empty() {
            FormIndex::End
        } else {
            collapsed.to_index()
        })
    }

    fn increment_helper(&self, collapsed: &mut CollapsedIndex<'a>, mut descend: bool) {
        let mut exit_repeat = false;

        let current = collapsed.elements.last().copied();
        if current.map_or(true, |e| !e.is_question()) {
            if current.is_some_and(FormElement::is_repeat) && !self.instance_exists(collapsed) {
                // Not materialized: step past it instead of into it.
                descend = false;
                exit_repeat = true;
            }
            if descend {
                let children = current.map_or(self.children, FormElement::children);
                if let Some(first) = children.first() {
                    collapsed.push(0, 0, first);
                    return;
                }
            }
        }

        while let Some(level) = collapsed.len().checked_sub(1) {
            if !exit_repeat && collapsed.elements[level].is_repeat() {
                collapsed.multiplicities[level] += 1;
                return;
            }

            let siblings = self.siblings(collapsed, level);
            let next = collapsed.indexes[level] + 1;
            match siblings.get(next) {
                Some(element) => {
                    collapsed.indexes[level] = next;
                    collapsed.multiplicities[level] = 0;
                    collapsed.elements[level] = element;
                    return;
                }
                None => {
                    collapsed.pop();
                    exit_repeat = false;
                }
            }
        }
    }

    /// Previous element in depth-first pre-order; [`FormIndex::Beginning`] before the first.
    ///
    /// Moving backwards onto a repeat lands in its last live instance, on the deepest last
    /// element inside it.
    pub fn decrement(&self, index: &FormIndex) -> FormResult<FormIndex> {
        let mut collapsed = match index {
            FormIndex::Beginning => return Ok(FormIndex::Beginning),
            FormIndex::End if self.children.is_empty() => return Ok(FormIndex::Beginning),
            FormIndex::End => CollapsedIndex::default(),
            FormIndex::At(_) => self.collapse(index)?,
        };
        self.decrement_helper(&mut collapsed);
        Ok(if collapsed.is_empty() {
            FormIndex::Beginning
        } else {
            collapsed.to_index()
        })
    }

    fn decrement_helper(&self, collapsed: &mut CollapsedIndex<'a>) {
        if let Some(level) = collapsed.len().checked_sub(1) {
            let current = collapsed.indexes[level];
            let mult = collapsed.multiplicities[level];
            if collapsed.elements[level].is_repeat() && mult > 0 {
                collapsed.multiplicities[level] = mult - 1;
            } else if current > 0 {
                let siblings = self.siblings(collapsed, level);
                collapsed.indexes[level] = current - 1;
                collapsed.multiplicities[level] = 0;
                collapsed.elements[level] = &siblings[current - 1];
                if collapsed.elements[level].is_repeat() && !self.land_on_last_instance(collapsed)
                {
                    return;
                }
            } else {
                collapsed.pop();
                return;
            }
        }

        loop {
            let children = match collapsed.elements.last().copied() {
                None => self.children,
                Some(element) if element.is_question() => return,
                Some(element) => element.children(),
            };
            let Some(last) = children.len().checked_sub(1) else {
                return;
            };
            collapsed.push(last, 0, &children[last]);
            if children[last].is_repeat() && !self.land_on_last_instance(collapsed) {
                return;
            }
        }
    }

    /// The root-to-element path of form elements, for captions and breadcrumbs.
    pub fn explode(&self, index: &FormIndex) -> FormResult<Vec<&'a FormElement>> {
        Ok(self.collapse(index)?.elements)
    }

    pub fn child_element(&self, index: &FormIndex) -> Option<&'a FormElement> {
        self.collapse(index).ok()?.elements.last().copied()
    }

    /// Number of elements in the whole form, counted recursively.
    pub fn deep_child_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.deep_child_count())
            .sum()
    }
}
