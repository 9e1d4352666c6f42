//! The already-parsed expression tree evaluated by [`crate::eval`].

use std::fmt;

use serde::{Deserialize, Serialize};
use xform_model::TreeReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Number { value: f64 },
    String { value: String },
    /// A location path; relative paths are resolved against the evaluation context.
    Path { reference: TreeReference },
    Neg { operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn number(value: f64) -> Self {
        Expr::Number { value }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::String {
            value: value.into(),
        }
    }

    /// A location path selecting every same-named node along each step, like an XPath step
    /// without predicates. Panics on malformed paths; intended for static tables and tests.
    #[track_caller]
    pub fn path(text: &str) -> Self {
        Expr::Path {
            reference: TreeReference::path(text).genericize(),
        }
    }

    /// A location path taken as-is, including explicit multiplicities.
    pub fn reference(reference: TreeReference) -> Self {
        Expr::Path { reference }
    }

    pub fn neg(operand: Expr) -> Self {
        Expr::Neg {
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    /// Every location path in the expression, in source order.
    pub fn references(&self) -> Vec<&TreeReference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a TreeReference>) {
        match self {
            Expr::Number { .. } | Expr::String { .. } => {}
            Expr::Path { reference } => out.push(reference),
            Expr::Neg { operand } => operand.collect_references(out),
            Expr::Binary { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number { value } => write!(f, "{value}"),
            Expr::String { value } => write!(f, "'{value}'"),
            Expr::Path { reference } => write!(f, "{reference}"),
            Expr::Neg { operand } => write!(f, "-{operand}"),
            Expr::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_paths_in_order() {
        let e = Expr::binary(
            BinaryOp::Add,
            Expr::path("/data/a"),
            Expr::call("sum", vec![Expr::path("../rep/b")]),
        );
        let refs: Vec<String> = e.references().iter().map(|r| r.to_string()).collect();
        assert_eq!(refs, vec!["/data[*]/a[*]", "../rep[*]/b[*]"]);
        assert_eq!(e.to_string(), "(/data[*]/a[*] + sum(../rep[*]/b[*]))");
    }
}
