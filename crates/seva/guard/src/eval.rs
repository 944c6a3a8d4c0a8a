//! Pure evaluation of compiled guard expressions.
//!
//! Evaluation runs inside the transition lock, so it must be cheap and
//! deterministic: the context carries everything, including the clock.

use crate::ast::{BinaryOp, GuardExpr, UnaryOp, Value};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// The evaluation context for one guard run.
///
/// Variables resolve in order: well-known names (`now`, `authority.id`,
/// `actor.id`), dotted paths into the application data, then the extras map
/// (ledger/property lookups the caller resolved beforehand). Anything else
/// is `Undefined`.
#[derive(Clone, Debug)]
pub struct GuardContext {
    /// Application form payload.
    pub data: serde_json::Value,
    /// Roles held by the acting officer.
    pub actor_roles: Vec<String>,
    /// Acting officer id.
    pub actor_id: String,
    /// The authority processing the case.
    pub authority_id: String,
    /// The injected clock, exposed as `now` (epoch seconds).
    pub now: DateTime<Utc>,
    /// Pre-resolved external lookups. A failed lookup is simply absent —
    /// the variable evaluates Undefined, not an error.
    pub extras: HashMap<String, Value>,
}

impl GuardContext {
    pub fn new(data: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            data,
            actor_roles: Vec::new(),
            actor_id: String::new(),
            authority_id: String::new(),
            now,
            extras: HashMap::new(),
        }
    }

    pub fn with_actor(mut self, id: impl Into<String>, roles: Vec<String>) -> Self {
        self.actor_id = id.into();
        self.actor_roles = roles;
        self
    }

    pub fn with_authority(mut self, id: impl Into<String>) -> Self {
        self.authority_id = id.into();
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    /// Resolve a dotted variable path.
    fn resolve(&self, path: &str) -> Value {
        match path {
            "now" => return Value::Number(self.now.timestamp() as f64),
            "actor.id" => return Value::Text(self.actor_id.clone()),
            "authority.id" => return Value::Text(self.authority_id.clone()),
            _ => {}
        }

        if let Some(value) = self.extras.get(path) {
            return value.clone();
        }

        let mut cursor = &self.data;
        for segment in path.split('.') {
            match cursor.get(segment) {
                Some(next) => cursor = next,
                None => return Value::Undefined,
            }
        }
        Value::from(cursor)
    }
}

/// Evaluate a compiled guard against a context. Pure and total: every
/// expression produces a boolean, with Undefined propagating as falsy.
pub fn evaluate(expr: &GuardExpr, ctx: &GuardContext) -> bool {
    eval_value(expr, ctx).is_truthy()
}

fn eval_value(expr: &GuardExpr, ctx: &GuardContext) -> Value {
    match expr {
        GuardExpr::Literal(value) => value.clone(),
        GuardExpr::Var(path) => ctx.resolve(path),
        GuardExpr::HasRole(role) => Value::Bool(ctx.actor_roles.iter().any(|r| r == role)),
        GuardExpr::Unary { op, operand } => {
            let value = eval_value(operand, ctx);
            match op {
                UnaryOp::Not => Value::Bool(!value.is_truthy()),
                UnaryOp::Neg => value
                    .as_number()
                    .map(|n| Value::Number(-n))
                    .unwrap_or(Value::Undefined),
            }
        }
        GuardExpr::Binary { op, lhs, rhs } => match op {
            BinaryOp::And => {
                // Short-circuit: the right side never runs when the left
                // is falsy.
                if !eval_value(lhs, ctx).is_truthy() {
                    Value::Bool(false)
                } else {
                    Value::Bool(eval_value(rhs, ctx).is_truthy())
                }
            }
            BinaryOp::Or => {
                if eval_value(lhs, ctx).is_truthy() {
                    Value::Bool(true)
                } else {
                    Value::Bool(eval_value(rhs, ctx).is_truthy())
                }
            }
            BinaryOp::Eq => Value::Bool(eval_value(lhs, ctx).loose_eq(&eval_value(rhs, ctx))),
            BinaryOp::NotEq => {
                let l = eval_value(lhs, ctx);
                let r = eval_value(rhs, ctx);
                // Undefined compares unequal to everything, so != over an
                // unresolved variable is still falsy rather than vacuously
                // true.
                if l == Value::Undefined || r == Value::Undefined {
                    Value::Bool(false)
                } else {
                    Value::Bool(!l.loose_eq(&r))
                }
            }
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let l = eval_value(lhs, ctx).as_number();
                let r = eval_value(rhs, ctx).as_number();
                match (l, r) {
                    (Some(l), Some(r)) => Value::Bool(match op {
                        BinaryOp::Lt => l < r,
                        BinaryOp::LtEq => l <= r,
                        BinaryOp::Gt => l > r,
                        BinaryOp::GtEq => l >= r,
                        _ => unreachable!(),
                    }),
                    _ => Value::Bool(false),
                }
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                let l = eval_value(lhs, ctx).as_number();
                let r = eval_value(rhs, ctx).as_number();
                match (l, r) {
                    (Some(l), Some(r)) => Value::Number(match op {
                        BinaryOp::Add => l + r,
                        BinaryOp::Sub => l - r,
                        BinaryOp::Mul => l * r,
                        _ => unreachable!(),
                    }),
                    _ => Value::Undefined,
                }
            }
        },
    }
}
