//! The loaded form: element tree, instance, triggerables and the operations a runtime drives.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use xform_model::{
    AnswerValue, DataInstance, FormElement, FormSettings, ModelError, TreeReference,
};

use crate::coercion::to_boolean;
use crate::error::{FormError, FormResult};
use crate::eval::{evaluate, EvaluationContext};
use crate::expr::Expr;
use crate::functions::{FunctionHandler, FunctionRegistry};
use crate::graph::{DependencyGraph, TriggerableId};
use crate::nav::Navigator;
use crate::triggerable::Triggerable;

mod localizer;
mod preload;
mod repeat;
mod snapshot;
mod template;

pub use localizer::TextCatalog;
pub use preload::{PreloadHandler, QuestionPreloader};
pub use snapshot::FormDefSnapshot;

use localizer::ItextHandler;

/// A validity rule bound to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    bind: TreeReference,
    expr: Expr,
    message: Option<String>,
}

impl Constraint {
    pub fn bind(&self) -> &TreeReference {
        &self.bind
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Text shown when the rule fails.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// A form definition together with its live instance.
#[derive(Debug, Clone)]
pub struct FormDef {
    id: i32,
    name: String,
    title: Option<String>,
    children: Vec<FormElement>,
    instance: DataInstance,
    localizer: Option<TextCatalog>,
    graph: DependencyGraph,
    /// Keyed by generic binding.
    constraints: BTreeMap<TreeReference, Constraint>,
    output_fragments: Vec<Expr>,
    functions: Arc<FunctionRegistry>,
    preloader: QuestionPreloader,
    settings: FormSettings,
    now: Option<NaiveDateTime>,
}

impl FormDef {
    pub fn new(
        id: i32,
        name: impl Into<String>,
        children: Vec<FormElement>,
        mut instance: DataInstance,
    ) -> Self {
        instance.set_form_id(id);
        Self {
            id,
            name: name.into(),
            title: None,
            children,
            instance,
            localizer: None,
            graph: DependencyGraph::new(),
            constraints: BTreeMap::new(),
            output_fragments: Vec::new(),
            functions: Arc::new(FunctionRegistry::new()),
            preloader: QuestionPreloader::new(),
            settings: FormSettings::default(),
            now: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: FormSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn settings(&self) -> &FormSettings {
        &self.settings
    }

    pub fn children(&self) -> &[FormElement] {
        &self.children
    }

    pub fn instance(&self) -> &DataInstance {
        &self.instance
    }

    /// Direct access to the instance. Writes made here do not trigger anything.
    pub fn instance_mut(&mut self) -> &mut DataInstance {
        &mut self.instance
    }

    pub fn navigator(&self) -> Navigator<'_> {
        Navigator::new(&self.children, &self.instance)
    }

    /// Pins the clock used by `today()`, `now()` and the timestamp preloaders.
    pub fn set_clock(&mut self, now: NaiveDateTime) {
        self.now = Some(now);
    }

    fn now(&self) -> NaiveDateTime {
        self.now
            .unwrap_or_else(|| chrono::Local::now().naive_local())
    }

    pub fn register_function(&mut self, handler: impl FunctionHandler + 'static) {
        Arc::make_mut(&mut self.functions).register(handler);
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn register_preload_handler(&mut self, handler: impl PreloadHandler + 'static) {
        self.preloader.register(handler);
    }

    /// Installs localized texts and the `jr:itext` function reading them.
    pub fn set_localizer(&mut self, catalog: TextCatalog) {
        self.register_function(ItextHandler::new(catalog.clone()));
        self.localizer = Some(catalog);
    }

    pub fn localizer(&self) -> Option<&TextCatalog> {
        self.localizer.as_ref()
    }

    /// Switches the active locale; `false` without a localizer or for an unknown locale.
    pub fn set_locale(&mut self, locale: &str) -> bool {
        let Some(mut catalog) = self.localizer.take() else {
            return false;
        };
        let switched = catalog.set_locale(locale);
        self.set_localizer(catalog);
        switched
    }

    /// An evaluation context anchored at `context_ref`, carrying the form's functions and
    /// clock.
    pub fn evaluation_context(&self, context_ref: TreeReference) -> EvaluationContext {
        let ctx = EvaluationContext::new(context_ref).with_functions(Arc::clone(&self.functions));
        match self.now {
            Some(now) => ctx.with_now(now),
            None => ctx,
        }
    }

    pub fn add_triggerable(&mut self, t: Triggerable) -> TriggerableId {
        self.graph.add(t, &self.instance)
    }

    pub fn triggerable(&self, id: TriggerableId) -> Option<&Triggerable> {
        self.graph.get(id)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Orders the registered triggerables. Must run after the last registration and before
    /// anything is evaluated.
    pub fn finalize_triggerables(&mut self) -> FormResult<()> {
        self.graph.finalize()?;
        Ok(())
    }

    fn ensure_finalized(&self) -> FormResult<()> {
        if self.graph.is_finalized() {
            Ok(())
        } else {
            Err(FormError::NotFinalized)
        }
    }

    /// Writes an answer and re-evaluates everything depending on it. Returns whether the
    /// stored answer changed.
    pub fn set_value(
        &mut self,
        reference: &TreeReference,
        value: Option<AnswerValue>,
    ) -> FormResult<bool> {
        self.ensure_finalized()?;
        let node = self
            .instance
            .resolve_reference_mut(reference)
            .ok_or_else(|| ModelError::NodeNotFound(reference.clone()))?;
        let changed = node.set_answer(value)?;
        self.trigger_triggerables(reference)?;
        Ok(changed)
    }

    /// Re-evaluates the triggerables reading `changed` and everything cascading from them, in
    /// global order.
    pub fn trigger_triggerables(&mut self, changed: &TreeReference) -> FormResult<()> {
        self.ensure_finalized()?;
        let direct = self.graph.triggered_by(&changed.genericize()).to_vec();
        self.evaluate_cascade(direct, changed)
    }

    /// Evaluates from scratch every triggerable with a target at or below `scope`.
    pub fn initialize_triggerables(&mut self, scope: &TreeReference) -> FormResult<()> {
        self.ensure_finalized()?;
        let applicable = self.graph.targeting_under(&scope.genericize());
        let ordered = self.graph.in_order(&applicable);
        self.apply_all(&ordered, scope)
    }

    /// Re-evaluates after a repeat instance at `repeat_ref` appeared or disappeared: whatever
    /// reads the parent or anything inside the repeat, anchored at the parent.
    fn trigger_structural(&mut self, repeat_ref: &TreeReference) -> FormResult<()> {
        let parent = repeat_ref.parent_ref().unwrap_or_else(TreeReference::root);
        let mut direct: BTreeSet<TriggerableId> = self
            .graph
            .triggered_by(&parent.genericize())
            .iter()
            .copied()
            .collect();
        direct.extend(self.graph.triggered_under(&repeat_ref.genericize()));
        self.evaluate_cascade(direct, &parent)
    }

    fn evaluate_cascade(
        &mut self,
        direct: impl IntoIterator<Item = TriggerableId>,
        anchor: &TreeReference,
    ) -> FormResult<()> {
        let closure = self.graph.cascade_closure(direct);
        let ordered = self.graph.in_order(&closure);
        self.apply_all(&ordered, anchor)
    }

    fn apply_all(&mut self, ids: &[TriggerableId], anchor: &TreeReference) -> FormResult<()> {
        let base = self.evaluation_context(TreeReference::root());
        for &id in ids {
            if let Some(t) = self.graph.get(id) {
                t.apply(&mut self.instance, &base, anchor)?;
            }
        }
        Ok(())
    }

    /// Binds a constraint to every node matching `bind`, replacing an earlier one.
    pub fn add_constraint(&mut self, bind: &TreeReference, expr: Expr, message: Option<String>) {
        let bind = bind.genericize();
        self.constraints.insert(
            bind.clone(),
            Constraint {
                bind,
                expr,
                message,
            },
        );
    }

    pub fn constraint(&self, reference: &TreeReference) -> Option<&Constraint> {
        self.constraints.get(&reference.genericize())
    }

    /// Checks `candidate` against the constraint bound to `reference` without writing it.
    ///
    /// No candidate, or no constraint, is valid. A constraint that fails to evaluate is not.
    pub fn evaluate_constraint(
        &self,
        reference: &TreeReference,
        candidate: Option<&AnswerValue>,
    ) -> bool {
        let (Some(candidate), Some(constraint)) = (candidate, self.constraint(reference)) else {
            return true;
        };
        let ctx = self
            .evaluation_context(reference.clone())
            .with_candidate(candidate.clone());
        match evaluate(&constraint.expr, &self.instance, &ctx).and_then(|v| to_boolean(&v)) {
            Ok(valid) => valid,
            Err(err) => {
                log::warn!("constraint on {reference} could not be evaluated: {err}");
                false
            }
        }
    }

    /// Registers an `<output>` expression; returns the `n` used by `${n}` placeholders.
    pub fn add_output_fragment(&mut self, expr: Expr) -> usize {
        self.output_fragments.push(expr);
        self.output_fragments.len() - 1
    }

    pub fn output_fragments(&self) -> &[Expr] {
        &self.output_fragments
    }

    /// Fills preload values into the whole live instance.
    pub fn preload_model(&mut self) {
        let now = self.now();
        self.preloader
            .preload_subtree(&mut self.instance, &TreeReference::root(), now);
    }

    /// Runs post-processing handlers; `true` if the instance changed.
    pub fn post_process_model(&mut self) -> bool {
        let now = self.now();
        self.preloader
            .post_process_subtree(&mut self.instance, &TreeReference::root(), now)
    }

    /// Prepares the form for entry: preloads a blank instance (unless disabled in the
    /// settings), then evaluates every triggerable.
    pub fn initialize(&mut self, new_instance: bool) -> FormResult<()> {
        if new_instance && self.settings.preload_new_instances {
            self.preload_model();
        }
        self.initialize_triggerables(&TreeReference::root())
    }
}
