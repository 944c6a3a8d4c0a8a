//! Guard expression language for transition rules.
//!
//! Guards are boolean expressions over a context map built from application
//! data, the acting officer, the authority, and the current time:
//!
//! ```text
//! applicant.age >= 18 && has_role("CLERK") && fee_paid == true
//! ```
//!
//! Expressions are compiled when a workflow definition is loaded — a
//! malformed guard fails the load, never an in-flight transition. Evaluation
//! is pure: no I/O, no clock reads (the caller injects `now`), deterministic
//! for a given context. Unknown variables resolve to `Undefined`, which is
//! falsy and compares unequal to everything, so optional form sections never
//! raise.

#![deny(unsafe_code)]

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, GuardExpr, UnaryOp, Value};
pub use error::{GuardError, GuardResult};
pub use eval::{evaluate, GuardContext};
pub use parser::compile;
