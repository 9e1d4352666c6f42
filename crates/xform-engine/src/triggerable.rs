//! Reactive units registered with the dependency graph.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use xform_model::{AnswerValue, DataInstance, DataType, TreeReference};

use crate::coercion::{to_boolean, to_date, to_numeric, to_text};
use crate::error::{EvalError, EvalResult, FormResult};
use crate::eval::{evaluate, EvaluationContext};
use crate::expr::Expr;
use crate::value::Value;

/// Effect a condition applies to its targets for one boolean outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionAction {
    Relevant,
    Irrelevant,
    Enable,
    Disable,
    Require,
    DontRequire,
}

impl ConditionAction {
    fn changes_relevance(self) -> bool {
        matches!(self, ConditionAction::Relevant | ConditionAction::Irrelevant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerableKind {
    Condition {
        true_action: ConditionAction,
        false_action: ConditionAction,
    },
    Recalculate,
}

/// A condition or calculation: an expression evaluated in `context`, whose result is applied
/// to every `target`.
///
/// All references are stored in generic form. Two triggerables are equal when kind, expression,
/// context and targets are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triggerable {
    kind: TriggerableKind,
    expr: Expr,
    context: TreeReference,
    targets: Vec<TreeReference>,
    #[serde(skip)]
    triggers: BTreeSet<TreeReference>,
}

impl Triggerable {
    fn new(kind: TriggerableKind, expr: Expr, target: &TreeReference) -> Self {
        let target = target.genericize();
        let mut out = Self {
            kind,
            expr,
            context: target.clone(),
            targets: vec![target],
            triggers: BTreeSet::new(),
        };
        out.rebuild_triggers();
        out
    }

    /// A condition on `target`. Relative paths in `expr` are resolved against the target.
    pub fn condition(
        expr: Expr,
        target: &TreeReference,
        true_action: ConditionAction,
        false_action: ConditionAction,
    ) -> Self {
        Self::new(
            TriggerableKind::Condition {
                true_action,
                false_action,
            },
            expr,
            target,
        )
    }

    /// Shorthand for a `relevant` binding: relevant when true, irrelevant when false.
    pub fn relevance(expr: Expr, target: &TreeReference) -> Self {
        Self::condition(
            expr,
            target,
            ConditionAction::Relevant,
            ConditionAction::Irrelevant,
        )
    }

    /// A calculation that writes its result into `target`.
    pub fn recalculate(expr: Expr, target: &TreeReference) -> Self {
        Self::new(TriggerableKind::Recalculate, expr, target)
    }

    /// Re-anchors relative paths at `context`.
    #[must_use]
    pub fn with_context(mut self, context: &TreeReference) -> Self {
        self.context = context.genericize();
        self.rebuild_triggers();
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: &TreeReference) -> Self {
        let target = target.genericize();
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
        self
    }

    /// Generic form of every node the expression reads.
    pub(crate) fn rebuild_triggers(&mut self) {
        self.triggers = self
            .expr
            .references()
            .into_iter()
            .filter_map(|r| r.contextualize(&self.context))
            .map(|r| r.genericize())
            .collect();
    }

    pub fn kind(&self) -> TriggerableKind {
        self.kind
    }

    pub fn is_condition(&self) -> bool {
        matches!(self.kind, TriggerableKind::Condition { .. })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn context(&self) -> &TreeReference {
        &self.context
    }

    pub fn targets(&self) -> &[TreeReference] {
        &self.targets
    }

    pub fn triggers(&self) -> &BTreeSet<TreeReference> {
        &self.triggers
    }

    /// Whether a change to a target can feed further triggerables.
    ///
    /// Calculations always cascade; conditions only when they change relevance.
    pub fn is_cascading(&self) -> bool {
        match self.kind {
            TriggerableKind::Recalculate => true,
            TriggerableKind::Condition {
                true_action,
                false_action,
            } => true_action.changes_relevance() || false_action.changes_relevance(),
        }
    }

    /// Evaluates the expression as a boolean in `ctx`.
    pub fn eval_bool(&self, instance: &DataInstance, ctx: &EvaluationContext) -> EvalResult<bool> {
        to_boolean(&evaluate(&self.expr, instance, ctx)?)
    }

    /// Evaluates once per concrete context node selected below `anchor` and applies the result
    /// to each concrete target.
    pub(crate) fn apply(
        &self,
        instance: &mut DataInstance,
        base: &EvaluationContext,
        anchor: &TreeReference,
    ) -> FormResult<()> {
        let Some(context) = self.context.contextualize(anchor) else {
            return Ok(());
        };

        for context_ref in instance.expand_reference(&context) {
            log::trace!("evaluating {} at {context_ref}", self.expr);
            let ctx = base.rebase(context_ref.clone());
            let result = evaluate(&self.expr, instance, &ctx)?;
            for target in &self.targets {
                let Some(target) = target.contextualize(&context_ref) else {
                    continue;
                };
                for target_ref in instance.expand_reference(&target) {
                    self.apply_to(&result, instance, &target_ref)?;
                }
            }
        }
        Ok(())
    }

    fn apply_to(
        &self,
        result: &Value,
        instance: &mut DataInstance,
        target_ref: &TreeReference,
    ) -> FormResult<()> {
        let Some(node) = instance.resolve_reference_mut(target_ref) else {
            return Ok(());
        };
        match self.kind {
            TriggerableKind::Condition {
                true_action,
                false_action,
            } => {
                let action = if to_boolean(result)? {
                    true_action
                } else {
                    false_action
                };
                match action {
                    ConditionAction::Relevant => node.set_relevant(true),
                    ConditionAction::Irrelevant => node.set_relevant(false),
                    ConditionAction::Enable => node.set_enabled(true),
                    ConditionAction::Disable => node.set_enabled(false),
                    ConditionAction::Require => node.set_required(true),
                    ConditionAction::DontRequire => node.set_required(false),
                }
            }
            TriggerableKind::Recalculate => {
                let answer = wrap_result(result, node.data_type())?;
                node.set_answer(answer)?;
            }
        }
        Ok(())
    }
}

/// Converts a computed value into an answer of `data_type`. An empty string clears the
/// answer, as does a non-numeric result for a numeric type.
pub fn wrap_result(result: &Value, data_type: DataType) -> EvalResult<Option<AnswerValue>> {
    let value = result.unpack();
    if matches!(&value, Value::Text(s) if s.is_empty()) {
        return Ok(None);
    }

    Ok(match data_type {
        DataType::Integer => {
            let n = to_numeric(&value)?;
            (!n.is_nan()).then(|| AnswerValue::Integer(n.trunc() as i64))
        }
        DataType::Decimal => {
            let n = to_numeric(&value)?;
            (!n.is_nan()).then_some(AnswerValue::Decimal(n))
        }
        DataType::Boolean => Some(AnswerValue::Boolean(to_boolean(&value)?)),
        DataType::Date => Some(AnswerValue::Date(to_date(&value)?.date())),
        DataType::DateTime => Some(AnswerValue::DateTime(to_date(&value)?)),
        DataType::SelectOne => Some(AnswerValue::Choice(to_text(&value)?)),
        DataType::SelectMulti => Some(AnswerValue::Choices(
            to_text(&value)?
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        )),
        DataType::GeoPoint => {
            let text = to_text(&value)?;
            let coords = text
                .split_whitespace()
                .map(|part| part.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| EvalError::mismatch(format!("`{text}` is not a geopoint")))?;
            Some(AnswerValue::GeoPoint(coords))
        }
        DataType::Text | DataType::Unspecified => Some(AnswerValue::Text(to_text(&value)?)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn triggers_are_contextualized_and_generic() {
        let t = Triggerable::recalculate(
            Expr::binary(
                crate::expr::BinaryOp::Add,
                Expr::path("../a"),
                Expr::path("/data/b"),
            ),
            &TreeReference::path("/data/rep[2]/c"),
        );
        let triggers: Vec<String> = t.triggers().iter().map(ToString::to_string).collect();
        assert_eq!(triggers, vec!["/data[*]/b[*]", "/data[*]/rep[*]/a[*]"]);
        assert_eq!(t.context().to_string(), "/data[*]/rep[*]/c[*]");
        assert_eq!(t.targets()[0].to_string(), "/data[*]/rep[*]/c[*]");
    }

    #[test]
    fn only_relevance_conditions_cascade() {
        let target = TreeReference::path("/data/q");
        let e = Expr::call("true", vec![]);
        assert!(Triggerable::relevance(e.clone(), &target).is_cascading());
        assert!(Triggerable::recalculate(e.clone(), &target).is_cascading());
        assert!(!Triggerable::condition(
            e,
            &target,
            ConditionAction::Require,
            ConditionAction::DontRequire
        )
        .is_cascading());
    }

    #[test]
    fn results_wrap_into_declared_type() {
        assert_eq!(
            wrap_result(&Value::Number(4.9), DataType::Integer).unwrap(),
            Some(AnswerValue::Integer(4))
        );
        assert_eq!(
            wrap_result(&Value::Text("abc".into()), DataType::Decimal).unwrap(),
            None
        );
        assert_eq!(
            wrap_result(&Value::Text(String::new()), DataType::Text).unwrap(),
            None
        );
        assert_eq!(
            wrap_result(&Value::Text("a b".into()), DataType::SelectMulti).unwrap(),
            Some(AnswerValue::Choices(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            wrap_result(&Value::Number(1.0), DataType::Date).unwrap(),
            Some(AnswerValue::Date(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()))
        );
        assert_eq!(
            wrap_result(&Value::Number(3.0), DataType::Unspecified).unwrap(),
            Some(AnswerValue::Text("3".into()))
        );
    }
}
