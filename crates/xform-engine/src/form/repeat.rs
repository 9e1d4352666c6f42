use xform_model::{Multiplicity, TreeReference};

use crate::error::{FormError, FormResult};
use crate::form::FormDef;
use crate::nav::FormIndex;

impl FormDef {
    /// Materializes the repeat instance addressed by `index` from the repeat's template, then
    /// preloads it and re-evaluates what depends on it.
    pub fn create_new_repeat(&mut self, index: &FormIndex) -> FormResult<TreeReference> {
        self.ensure_finalized()?;
        let dest = {
            let nav = self.navigator();
            let collapsed = nav.collapse(index)?;
            if !collapsed.elements.last().is_some_and(|e| e.is_repeat()) {
                return Err(FormError::NotInRepeat(index.to_string()));
            }
            nav.child_instance_ref(&collapsed)
                .ok_or_else(|| FormError::UnresolvedIndex(index.to_string()))?
        };

        let template = self
            .instance
            .get_template(&dest)
            .cloned()
            .ok_or_else(|| FormError::NoTemplate(dest.clone()))?;
        self.instance.copy_node(&template, &dest)?;

        let now = self.now();
        self.preloader.preload_subtree(&mut self.instance, &dest, now);
        self.trigger_structural(&dest)?;
        self.initialize_triggerables(&dest)?;
        log::debug!("created repeat instance {dest}");
        Ok(dest)
    }

    /// Removes the innermost repeat instance enclosing `index` and renumbers the later
    /// instances down by one. Returns the index of the repeat level itself.
    pub fn delete_repeat(&mut self, index: &FormIndex) -> FormResult<FormIndex> {
        self.ensure_finalized()?;
        let (repeat_ref, repeat_index) = {
            let nav = self.navigator();
            let mut collapsed = nav.collapse(index)?;
            let level = collapsed
                .elements
                .iter()
                .rposition(|e| e.is_repeat())
                .ok_or_else(|| FormError::NotInRepeat(index.to_string()))?;
            collapsed.truncate(level + 1);
            let repeat_ref = nav
                .child_instance_ref(&collapsed)
                .ok_or_else(|| FormError::UnresolvedIndex(index.to_string()))?;
            (repeat_ref, collapsed.to_index())
        };

        let removed = self.instance.remove_node(&repeat_ref)?;
        if let (Some(parent_ref), Multiplicity::Index(mult)) =
            (repeat_ref.parent_ref(), removed.multiplicity())
        {
            if let Some(parent) = self.instance.resolve_reference_mut(&parent_ref) {
                parent.shift_multiplicities_down(removed.name(), mult);
            }
        }
        log::debug!("deleted repeat instance {repeat_ref}");

        self.trigger_structural(&repeat_ref)?;
        Ok(repeat_index)
    }

    /// Whether a new instance of the repeat at `repeat_ref` may be created. Without a
    /// condition on the repeat this is always allowed.
    pub fn can_create_repeat(&self, repeat_ref: &TreeReference) -> FormResult<bool> {
        let Some(t) = self
            .graph
            .repeat_condition(&repeat_ref.genericize())
            .and_then(|id| self.graph.get(id))
        else {
            return Ok(true);
        };
        let ctx = self.evaluation_context(repeat_ref.clone());
        Ok(t.eval_bool(&self.instance, &ctx)?)
    }
}
