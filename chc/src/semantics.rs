// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Concrete values and term evaluation.
//!
//! Evaluation is used to check counterexample paths and to pick the disjunct
//! of a merged clause that a recorded model actually satisfies.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::syntax::*;

/// A concrete value of the background theory.
#[derive(PartialEq, Eq, Clone, Copy, Debug, PartialOrd, Ord)]
pub enum Value {
    /// A boolean value
    Bool(bool),
    /// An integer value
    Int(i64),
}

impl Value {
    /// The boolean inside, or an error for an integer.
    pub fn bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(_) => Err(EvalError::SortMismatch),
        }
    }

    /// The integer inside, or an error for a boolean.
    pub fn int(&self) -> Result<i64, EvalError> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Bool(_) => Err(EvalError::SortMismatch),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
        }
    }
}

/// A mapping from variables to values, as returned by a solver model or
/// recorded in a witness step.
pub type Assignment = BTreeMap<Var, Value>;

/// An evaluation failure.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EvalError {
    /// A free variable had no value in the assignment
    #[error("no value for variable {0}")]
    UnboundVar(String),
    /// A value of the wrong sort was used
    #[error("value of the wrong sort")]
    SortMismatch,
    /// Quantified terms are not evaluated
    #[error("cannot evaluate a quantified term")]
    Quantifier,
}

/// Evaluate a term under an assignment.
pub fn eval(t: &Term, assignment: &Assignment) -> Result<Value, EvalError> {
    match t {
        Term::Literal(b) => Ok(Value::Bool(*b)),
        Term::Int(i) => Ok(Value::Int(*i)),
        Term::Var(v) => assignment
            .get(v)
            .copied()
            .ok_or_else(|| EvalError::UnboundVar(format!("{v}"))),
        Term::UnaryOp(UOp::Not, arg) => Ok(Value::Bool(!eval(arg, assignment)?.bool()?)),
        Term::BinOp(op, lhs, rhs) => {
            let lhs = eval(lhs, assignment)?;
            let rhs = eval(rhs, assignment)?;
            let b = match op {
                BinOp::Equals => lhs == rhs,
                BinOp::NotEquals => lhs != rhs,
                BinOp::Implies => !lhs.bool()? || rhs.bool()?,
                BinOp::Iff => lhs.bool()? == rhs.bool()?,
            };
            Ok(Value::Bool(b))
        }
        Term::NAryOp(op, ts) => {
            let mut acc = matches!(op, NOp::And);
            for t in ts {
                let v = eval(t, assignment)?.bool()?;
                acc = match op {
                    NOp::And => acc && v,
                    NOp::Or => acc || v,
                };
            }
            Ok(Value::Bool(acc))
        }
        Term::NumOp(op, lhs, rhs) => {
            let lhs = eval(lhs, assignment)?.int()?;
            let rhs = eval(rhs, assignment)?.int()?;
            let i = match op {
                NumOp::Add => lhs + rhs,
                NumOp::Sub => lhs - rhs,
                NumOp::Mul => lhs * rhs,
            };
            Ok(Value::Int(i))
        }
        Term::NumRel(rel, lhs, rhs) => {
            let lhs = eval(lhs, assignment)?.int()?;
            let rhs = eval(rhs, assignment)?.int()?;
            let b = match rel {
                NumRel::Lt => lhs < rhs,
                NumRel::Leq => lhs <= rhs,
                NumRel::Gt => lhs > rhs,
                NumRel::Geq => lhs >= rhs,
            };
            Ok(Value::Bool(b))
        }
        Term::Ite { cond, then, else_ } => {
            if eval(cond, assignment)?.bool()? {
                eval(then, assignment)
            } else {
                eval(else_, assignment)
            }
        }
        Term::Quantified { .. } => Err(EvalError::Quantifier),
    }
}

/// Evaluate a term to a boolean, treating evaluation failure as `None`.
pub fn holds(t: &Term, assignment: &Assignment) -> Option<bool> {
    eval(t, assignment).ok().and_then(|v| v.bool().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_arith() {
        let x = Var::at("x", 0, Sort::Int);
        let x1 = Var::at("x", 1, Sort::Int);
        let step = Term::equals(
            Term::var(&x1),
            Term::num_op(NumOp::Add, Term::var(&x), Term::Int(1)),
        );
        let mut a = Assignment::new();
        a.insert(x.clone(), Value::Int(4));
        a.insert(x1.clone(), Value::Int(5));
        assert_eq!(eval(&step, &a), Ok(Value::Bool(true)));
        a.insert(x1, Value::Int(7));
        assert_eq!(eval(&step, &a), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_eval_unbound() {
        let x = Var::at("x", 0, Sort::Int);
        let t = Term::num_rel(NumRel::Lt, Term::var(&x), Term::Int(0));
        assert!(matches!(
            eval(&t, &Assignment::new()),
            Err(EvalError::UnboundVar(_))
        ));
        assert_eq!(holds(&t, &Assignment::new()), None);
    }
}
