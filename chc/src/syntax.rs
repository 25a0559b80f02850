// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The AST for first-order terms over linear integer arithmetic.

use serde::Serialize;

/// A background-theory sort. The engine works over quantifier-free linear
/// integer arithmetic, so booleans and integers are all we need.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, PartialOrd, Ord, Serialize)]
pub enum Sort {
    /// The boolean sort
    Bool,
    /// The integer sort
    Int,
}

/// A variable with an optional time index.
///
/// State variables carry `index: Some(k)` meaning "the value of this variable
/// at step `k` of an unrolling"; auxiliary variables introduced by clause
/// labels are versioned as well (at index 0 when first created) so that
/// shifting an unrolled formula keeps distinct steps apart. A variable with
/// `index: None` is unversioned and is left alone by time shifting.
#[derive(PartialEq, Eq, Clone, Debug, Hash, PartialOrd, Ord, Serialize)]
pub struct Var {
    /// Base name of the variable
    pub name: String,
    /// Time index, or `None` for an unversioned variable
    pub index: Option<i32>,
    /// Sort of the variable
    pub sort: Sort,
}

impl Var {
    /// Create an unversioned variable.
    pub fn new<N: AsRef<str>>(name: N, sort: Sort) -> Self {
        Var {
            name: name.as_ref().to_string(),
            index: None,
            sort,
        }
    }

    /// Create a variable at the given time index.
    pub fn at<N: AsRef<str>>(name: N, index: i32, sort: Sort) -> Self {
        Var {
            name: name.as_ref().to_string(),
            index: Some(index),
            sort,
        }
    }
}

/// Unary operators
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, PartialOrd, Ord, Serialize)]
pub enum UOp {
    /// Boolean negation
    Not,
}

/// Binary operators
#[allow(missing_docs)]
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, PartialOrd, Ord, Serialize)]
pub enum BinOp {
    Equals,
    NotEquals,
    Implies,
    Iff,
}

/// N-ary logical operators
#[allow(missing_docs)]
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, PartialOrd, Ord, Serialize)]
pub enum NOp {
    And,
    Or,
}

/// Arithmetic operators
#[allow(missing_docs)]
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, PartialOrd, Ord, Serialize)]
pub enum NumOp {
    Add,
    Sub,
    Mul,
}

/// Arithmetic relations
#[allow(missing_docs)]
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, PartialOrd, Ord, Serialize)]
pub enum NumRel {
    Lt,
    Leq,
    Gt,
    Geq,
}

/// A kind of quantifier (forall or exists)
#[allow(missing_docs)]
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, PartialOrd, Ord, Serialize)]
pub enum Quantifier {
    Forall,
    Exists,
}

/// A binder for a quantifier
#[derive(PartialEq, Eq, Clone, Debug, Hash, PartialOrd, Ord, Serialize)]
pub struct Binder {
    /// The bound variable
    pub var: Var,
}

/// A first-order term over booleans and linear integer arithmetic.
#[derive(PartialEq, Eq, Clone, Debug, Hash, PartialOrd, Ord, Serialize)]
pub enum Term {
    /// A constant true or false
    Literal(bool),
    /// An integer constant
    Int(i64),
    /// A variable occurrence
    Var(Var),
    /// An applied unary operation
    UnaryOp(UOp, Box<Term>),
    /// An applied binary operation
    BinOp(BinOp, Box<Term>, Box<Term>),
    /// An applied n-ary operation
    NAryOp(NOp, Vec<Term>),
    /// An applied arithmetic operation
    NumOp(NumOp, Box<Term>, Box<Term>),
    /// An applied arithmetic relation
    NumRel(NumRel, Box<Term>, Box<Term>),
    /// If-then-else
    Ite {
        /// A boolean conditional
        cond: Box<Term>,
        /// Value of the Ite when `cond` is true
        then: Box<Term>,
        /// Value of the Ite when `cond` is false
        else_: Box<Term>,
    },
    /// A quantifier with a sequence of binders and a body where the binders
    /// might be used freely.
    #[allow(missing_docs)]
    Quantified {
        quantifier: Quantifier,
        binders: Vec<Binder>,
        body: Box<Term>,
    },
}

impl Term {
    /// Flatten an n-ary relation one level deep.
    fn flatten_nary(self) -> Self {
        match self {
            Self::NAryOp(op, ts) => {
                let new_ts = ts
                    .into_iter()
                    .flat_map(|t| match t {
                        Self::NAryOp(op2, ts2) if op == op2 => ts2,
                        _ => vec![t],
                    })
                    .collect();
                Self::NAryOp(op, new_ts)
            }
            _ => self,
        }
    }

    /// Smart constructor for a variable occurrence.
    pub fn var(v: &Var) -> Self {
        Self::Var(v.clone())
    }

    /// Smart constructor equivalent to the And of an iterator of terms
    pub fn and<I>(ts: I) -> Self
    where
        I: IntoIterator,
        I::IntoIter: Iterator<Item = Term>,
    {
        let mut ts: Vec<Term> = ts.into_iter().filter(|t| !t.is_true()).collect();
        if ts.iter().any(|t| t.is_false()) {
            return Term::Literal(false);
        }
        if ts.is_empty() {
            return Term::Literal(true);
        } else if ts.len() == 1 {
            return ts.pop().unwrap();
        }
        Self::NAryOp(NOp::And, ts).flatten_nary()
    }

    /// Smart constructor equivalent to the Or of an iterator of terms
    pub fn or<I>(ts: I) -> Self
    where
        I: IntoIterator,
        I::IntoIter: Iterator<Item = Term>,
    {
        let mut ts: Vec<Term> = ts.into_iter().filter(|t| !t.is_false()).collect();
        if ts.iter().any(|t| t.is_true()) {
            return Term::Literal(true);
        }
        if ts.is_empty() {
            return Term::Literal(false);
        } else if ts.len() == 1 {
            return ts.pop().unwrap();
        }
        Self::NAryOp(NOp::Or, ts).flatten_nary()
    }

    /// Convenience function to create `lhs -> rhs`
    pub fn implies(lhs: Term, rhs: Term) -> Self {
        Self::BinOp(BinOp::Implies, Box::new(lhs), Box::new(rhs))
    }

    /// Convenience function to create `lhs <-> rhs`
    pub fn iff(lhs: Term, rhs: Term) -> Self {
        Self::BinOp(BinOp::Iff, Box::new(lhs), Box::new(rhs))
    }

    /// Convenience function to create `lhs = rhs`
    pub fn equals(lhs: Term, rhs: Term) -> Self {
        Self::BinOp(BinOp::Equals, Box::new(lhs), Box::new(rhs))
    }

    /// Convenience function to create `!t`
    pub fn negate(t: Term) -> Self {
        match t {
            Term::Literal(b) => Term::Literal(!b),
            Term::UnaryOp(UOp::Not, t) => *t,
            _ => Self::UnaryOp(UOp::Not, Box::new(t)),
        }
    }

    /// Construct a simplified term logically equivalent to `!t`, pushing the
    /// negation through the boolean structure.
    pub fn negate_and_simplify(t: Term) -> Self {
        match t {
            Term::Literal(b) => Term::Literal(!b),
            Term::UnaryOp(UOp::Not, t) => *t,
            Term::BinOp(BinOp::NotEquals, lhs, rhs) => Term::BinOp(BinOp::Equals, lhs, rhs),
            Term::BinOp(BinOp::Equals, lhs, rhs) => Term::BinOp(BinOp::NotEquals, lhs, rhs),
            Term::NAryOp(NOp::Or, terms) => Term::NAryOp(
                NOp::And,
                terms.into_iter().map(Term::negate_and_simplify).collect(),
            ),
            Term::NAryOp(NOp::And, terms) => Term::NAryOp(
                NOp::Or,
                terms.into_iter().map(Term::negate_and_simplify).collect(),
            ),
            Term::NumRel(NumRel::Lt, x, y) => Term::NumRel(NumRel::Geq, x, y),
            Term::NumRel(NumRel::Leq, x, y) => Term::NumRel(NumRel::Gt, x, y),
            Term::NumRel(NumRel::Gt, x, y) => Term::NumRel(NumRel::Leq, x, y),
            Term::NumRel(NumRel::Geq, x, y) => Term::NumRel(NumRel::Lt, x, y),
            t => Term::negate(t),
        }
    }

    /// Convenience function for an arithmetic relation.
    pub fn num_rel(rel: NumRel, lhs: Term, rhs: Term) -> Self {
        Self::NumRel(rel, Box::new(lhs), Box::new(rhs))
    }

    /// Convenience function for an arithmetic operation.
    pub fn num_op(op: NumOp, lhs: Term, rhs: Term) -> Self {
        Self::NumOp(op, Box::new(lhs), Box::new(rhs))
    }

    /// Convenience to construct `exists (binders), body`
    pub fn exists<I>(binders: I, body: Term) -> Self
    where
        I: IntoIterator,
        I::IntoIter: Iterator<Item = Binder>,
    {
        let binders: Vec<Binder> = binders.into_iter().collect();
        if binders.is_empty() {
            return body;
        }
        Self::Quantified {
            quantifier: Quantifier::Exists,
            binders,
            body: Box::new(body),
        }
    }

    /// Convenience to construct `forall (binders), body`
    pub fn forall<I>(binders: I, body: Term) -> Self
    where
        I: IntoIterator,
        I::IntoIter: Iterator<Item = Binder>,
    {
        let binders: Vec<Binder> = binders.into_iter().collect();
        if binders.is_empty() {
            return body;
        }
        Self::Quantified {
            quantifier: Quantifier::Forall,
            binders,
            body: Box::new(body),
        }
    }

    /// Whether this term is syntactically the constant `true`.
    pub fn is_true(&self) -> bool {
        matches!(self, Term::Literal(true))
    }

    /// Whether this term is syntactically the constant `false`.
    pub fn is_false(&self) -> bool {
        matches!(self, Term::Literal(false))
    }

    /// The conjuncts of a term: the elements of a top-level `And`, or the term
    /// itself.
    pub fn conjuncts(&self) -> Vec<&Term> {
        match self {
            Term::NAryOp(NOp::And, ts) => ts.iter().collect(),
            t => vec![t],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_or_units() {
        let x = Term::var(&Var::new("x", Sort::Bool));
        assert_eq!(Term::and([]), Term::Literal(true));
        assert_eq!(Term::or([]), Term::Literal(false));
        assert_eq!(Term::and([x.clone()]), x);
        assert_eq!(Term::and([x.clone(), Term::Literal(false)]), Term::Literal(false));
        assert_eq!(Term::or([x.clone(), Term::Literal(true)]), Term::Literal(true));
        // true conjuncts are absorbed
        assert_eq!(Term::and([Term::Literal(true), x.clone()]), x);
    }

    #[test]
    fn test_nary_flattening() {
        let x = Term::var(&Var::new("x", Sort::Bool));
        let y = Term::var(&Var::new("y", Sort::Bool));
        let z = Term::var(&Var::new("z", Sort::Bool));
        let inner = Term::and([x.clone(), y.clone()]);
        let t = Term::and([inner, z.clone()]);
        assert_eq!(t, Term::NAryOp(NOp::And, vec![x, y, z]));
    }

    #[test]
    fn test_negate_and_simplify() {
        let x = Var::at("x", 0, Sort::Int);
        let t = Term::or([
            Term::num_rel(NumRel::Lt, Term::var(&x), Term::Int(0)),
            Term::equals(Term::var(&x), Term::Int(3)),
        ]);
        let n = Term::negate_and_simplify(t);
        assert_eq!(
            n,
            Term::NAryOp(
                NOp::And,
                vec![
                    Term::num_rel(NumRel::Geq, Term::var(&x), Term::Int(0)),
                    Term::BinOp(
                        BinOp::NotEquals,
                        Box::new(Term::var(&x)),
                        Box::new(Term::Int(3))
                    ),
                ]
            )
        );
    }
}
