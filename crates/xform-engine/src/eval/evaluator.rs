use xform_model::{DataInstance, TreeReference};

use crate::coercion::{to_boolean, to_numeric, to_text};
use crate::error::EvalResult;
use crate::eval::EvaluationContext;
use crate::expr::{BinaryOp, Expr};
use crate::functions::call_function;
use crate::value::{NodeSet, Value};

/// Evaluates `expr` against the current state of `instance`.
pub fn evaluate(expr: &Expr, instance: &DataInstance, ctx: &EvaluationContext) -> EvalResult<Value> {
    match expr {
        Expr::Number { value } => Ok(Value::Number(*value)),
        Expr::String { value } => Ok(Value::Text(value.clone())),
        Expr::Path { reference } => Ok(Value::NodeSet(resolve_path(reference, instance, ctx))),
        Expr::Neg { operand } => Ok(Value::Number(-to_numeric(&evaluate(operand, instance, ctx)?)?)),
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, instance, ctx),
        Expr::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, instance, ctx)?);
            }
            call_function(ctx, name, &values)
        }
    }
}

/// Resolves a location path to the live nodes it selects, in document order.
///
/// During a constraint check the context node itself reads as the candidate value.
pub fn resolve_path(
    reference: &TreeReference,
    instance: &DataInstance,
    ctx: &EvaluationContext,
) -> NodeSet {
    let Some(absolute) = reference.contextualize(ctx.context_ref()) else {
        return NodeSet::new();
    };

    instance
        .expand_reference(&absolute)
        .into_iter()
        .filter_map(|r| {
            let node = instance.resolve_reference(&r)?;
            let value = match ctx.candidate_value() {
                Some(candidate) if ctx.is_constraint() && &r == ctx.context_ref() => {
                    Value::from(candidate)
                }
                _ => Value::from(node),
            };
            Some((r, value))
        })
        .collect()
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    instance: &DataInstance,
    ctx: &EvaluationContext,
) -> EvalResult<Value> {
    match op {
        BinaryOp::Or => {
            let l = to_boolean(&evaluate(left, instance, ctx)?)?;
            if l {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(to_boolean(&evaluate(right, instance, ctx)?)?))
        }
        BinaryOp::And => {
            let l = to_boolean(&evaluate(left, instance, ctx)?)?;
            if !l {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(to_boolean(&evaluate(right, instance, ctx)?)?))
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            let l = evaluate(left, instance, ctx)?.unpack();
            let r = evaluate(right, instance, ctx)?.unpack();
            let equal = values_equal(&l, &r)?;
            Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
        }
        BinaryOp::Lt => compare(left, right, instance, ctx, |l, r| l < r),
        BinaryOp::Le => compare(left, right, instance, ctx, |l, r| l <= r),
        BinaryOp::Gt => compare(left, right, instance, ctx, |l, r| l > r),
        BinaryOp::Ge => compare(left, right, instance, ctx, |l, r| l >= r),
        BinaryOp::Add => arithmetic(left, right, instance, ctx, |l, r| l + r),
        BinaryOp::Sub => arithmetic(left, right, instance, ctx, |l, r| l - r),
        BinaryOp::Mul => arithmetic(left, right, instance, ctx, |l, r| l * r),
        BinaryOp::Div => arithmetic(left, right, instance, ctx, |l, r| l / r),
        BinaryOp::Mod => arithmetic(left, right, instance, ctx, |l, r| l % r),
    }
}

fn operands(
    left: &Expr,
    right: &Expr,
    instance: &DataInstance,
    ctx: &EvaluationContext,
) -> EvalResult<(f64, f64)> {
    let l = to_numeric(&evaluate(left, instance, ctx)?)?;
    let r = to_numeric(&evaluate(right, instance, ctx)?)?;
    Ok((l, r))
}

fn compare(
    left: &Expr,
    right: &Expr,
    instance: &DataInstance,
    ctx: &EvaluationContext,
    op: fn(f64, f64) -> bool,
) -> EvalResult<Value> {
    let (l, r) = operands(left, right, instance, ctx)?;
    Ok(Value::Bool(op(l, r)))
}

fn arithmetic(
    left: &Expr,
    right: &Expr,
    instance: &DataInstance,
    ctx: &EvaluationContext,
    op: fn(f64, f64) -> f64,
) -> EvalResult<Value> {
    let (l, r) = operands(left, right, instance, ctx)?;
    Ok(Value::Number(op(l, r)))
}

/// Boolean comparison if either side is boolean, numeric if either side is a number,
/// otherwise string comparison (dates compare through their ISO rendering).
fn values_equal(l: &Value, r: &Value) -> EvalResult<bool> {
    if matches!(l, Value::Bool(_)) || matches!(r, Value::Bool(_)) {
        Ok(to_boolean(l)? == to_boolean(r)?)
    } else if matches!(l, Value::Number(_)) || matches!(r, Value::Number(_)) {
        Ok(to_numeric(l)? == to_numeric(r)?)
    } else {
        Ok(to_text(l)? == to_text(r)?)
    }
}
