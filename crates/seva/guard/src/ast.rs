//! The compiled guard expression tree and its value domain.

use serde::{Deserialize, Serialize};

/// A compiled guard expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GuardExpr {
    /// A literal value.
    Literal(Value),
    /// A dotted variable path resolved from the evaluation context.
    Var(String),
    /// `has_role("X")` — whether the acting officer holds role X.
    HasRole(String),
    Unary {
        op: UnaryOp,
        operand: Box<GuardExpr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<GuardExpr>,
        rhs: Box<GuardExpr>,
    },
}

impl GuardExpr {
    /// Collect every variable path referenced by this expression.
    ///
    /// The engine uses this to pre-resolve external lookup variables before
    /// evaluation, keeping evaluation itself free of I/O.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            GuardExpr::Var(path) => out.push(path.as_str()),
            GuardExpr::Unary { operand, .. } => operand.collect_variables(out),
            GuardExpr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            GuardExpr::Literal(_) | GuardExpr::HasRole(_) => {}
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
}

/// Values flowing through guard evaluation.
///
/// `Undefined` is what unresolved variables produce: it is falsy, compares
/// unequal to every value (including itself), and poisons arithmetic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Undefined,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    /// Truthiness: `false`, `0`, `""`, and `Undefined` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
        }
    }

    /// Equality with Undefined never equal, numbers compared numerically.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, _) | (_, Value::Undefined) => false,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Undefined,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                n.as_f64().map(Value::Number).unwrap_or(Value::Undefined)
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            // Objects and arrays are containers, not comparable scalars.
            _ => Value::Undefined,
        }
    }
}
