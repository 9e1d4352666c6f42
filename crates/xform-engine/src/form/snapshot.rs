use serde::{Deserialize, Serialize};
use xform_model::{DataInstance, FormElement, FormSettings};

use crate::error::FormResult;
use crate::expr::Expr;
use crate::form::{Constraint, FormDef, TextCatalog};
use crate::triggerable::Triggerable;

/// The persisted shape of a [`FormDef`].
///
/// Host functions, preload handlers and the pinned clock belong to the runtime and are not
/// part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefSnapshot {
    pub id: i32,
    pub name: String,
    pub title: Option<String>,
    pub children: Vec<FormElement>,
    pub instance: DataInstance,
    pub localizer: Option<TextCatalog>,
    pub conditions: Vec<Triggerable>,
    pub recalculates: Vec<Triggerable>,
    pub output_fragments: Vec<Expr>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub settings: FormSettings,
}

impl FormDef {
    pub fn snapshot(&self) -> FormDefSnapshot {
        let (conditions, recalculates): (Vec<_>, Vec<_>) = self
            .graph
            .iter()
            .map(|(_, t)| t.clone())
            .partition(Triggerable::is_condition);
        FormDefSnapshot {
            id: self.id,
            name: self.name.clone(),
            title: self.title.clone(),
            children: self.children.clone(),
            instance: self.instance.clone(),
            localizer: self.localizer.clone(),
            conditions,
            recalculates,
            output_fragments: self.output_fragments.clone(),
            constraints: self.constraints.values().cloned().collect(),
            settings: self.settings.clone(),
        }
    }

    /// Rebuilds a form from a snapshot. Triggerables are registered again (conditions first)
    /// and ordered, so the result is ready for use.
    pub fn from_snapshot(snapshot: FormDefSnapshot) -> FormResult<Self> {
        let FormDefSnapshot {
            id,
            name,
            title,
            children,
            instance,
            localizer,
            conditions,
            recalculates,
            output_fragments,
            constraints,
            settings,
        } = snapshot;

        let mut form = FormDef::new(id, name, children, instance).with_settings(settings);
        form.title = title;
        if let Some(catalog) = localizer {
            form.set_localizer(catalog);
        }
        for t in conditions.into_iter().chain(recalculates) {
            form.add_triggerable(t);
        }
        for fragment in output_fragments {
            form.add_output_fragment(fragment);
        }
        for c in constraints {
            form.constraints.insert(c.bind.clone(), c);
        }
        form.finalize_triggerables()?;
        Ok(form)
    }

    pub fn to_json(&self) -> FormResult<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn from_json(json: &str) -> FormResult<Self> {
        Self::from_snapshot(serde_json::from_str(json)?)
    }
}
