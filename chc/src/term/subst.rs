// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Perform substitutions of variables by other terms.

use std::collections::HashMap;

use crate::syntax::{Term, Var};

/// A map from variables to the terms that replace them.
pub type Substitution = HashMap<Var, Term>;

/// Perform a capture-avoiding substitution of free variables.
pub fn substitute(term: &Term, substitution: &Substitution) -> Term {
    substitute_rec(term, substitution, &im::HashSet::new())
}

/// Build a substitution renaming the variables of `from` to the variables of
/// `to`, position by position. The two slices must have equal lengths.
pub fn renaming(from: &[Var], to: &[Var]) -> Substitution {
    assert_eq!(from.len(), to.len());
    from.iter()
        .zip(to)
        .map(|(f, t)| (f.clone(), Term::var(t)))
        .collect()
}

fn substitute_rec(term: &Term, substitution: &Substitution, bound: &im::HashSet<Var>) -> Term {
    match term {
        Term::Literal(_) | Term::Int(_) => term.clone(),
        Term::Var(v) => {
            if !bound.contains(v) && substitution.contains_key(v) {
                substitution[v].clone()
            } else {
                term.clone()
            }
        }
        Term::UnaryOp(op, arg) => {
            Term::UnaryOp(*op, Box::new(substitute_rec(arg, substitution, bound)))
        }
        Term::BinOp(op, lhs, rhs) => Term::BinOp(
            *op,
            Box::new(substitute_rec(lhs, substitution, bound)),
            Box::new(substitute_rec(rhs, substitution, bound)),
        ),
        Term::NAryOp(op, ts) => Term::NAryOp(
            *op,
            ts.iter()
                .map(|t| substitute_rec(t, substitution, bound))
                .collect(),
        ),
        Term::NumOp(op, lhs, rhs) => Term::NumOp(
            *op,
            Box::new(substitute_rec(lhs, substitution, bound)),
            Box::new(substitute_rec(rhs, substitution, bound)),
        ),
        Term::NumRel(rel, lhs, rhs) => Term::NumRel(
            *rel,
            Box::new(substitute_rec(lhs, substitution, bound)),
            Box::new(substitute_rec(rhs, substitution, bound)),
        ),
        Term::Ite { cond, then, else_ } => Term::Ite {
            cond: Box::new(substitute_rec(cond, substitution, bound)),
            then: Box::new(substitute_rec(then, substitution, bound)),
            else_: Box::new(substitute_rec(else_, substitution, bound)),
        },
        Term::Quantified {
            quantifier,
            binders,
            body,
        } => {
            let mut bound = bound.clone();
            bound.extend(binders.iter().map(|b| b.var.clone()));
            Term::Quantified {
                quantifier: *quantifier,
                binders: binders.clone(),
                body: Box::new(substitute_rec(body, substitution, &bound)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Binder, NumOp, NumRel, Sort};

    #[test]
    fn test_substitute() {
        let x = Var::at("x", 0, Sort::Int);
        let y = Var::at("y", 0, Sort::Int);
        let t = Term::num_rel(NumRel::Lt, Term::var(&x), Term::var(&y));
        let mut sub = Substitution::new();
        sub.insert(x.clone(), Term::num_op(NumOp::Add, Term::var(&y), Term::Int(1)));
        assert_eq!(
            substitute(&t, &sub),
            Term::num_rel(
                NumRel::Lt,
                Term::num_op(NumOp::Add, Term::var(&y), Term::Int(1)),
                Term::var(&y)
            )
        );
    }

    #[test]
    fn test_substitute_respects_binders() {
        let x = Var::at("x", 0, Sort::Int);
        let body = Term::num_rel(NumRel::Geq, Term::var(&x), Term::Int(0));
        let t = Term::forall([Binder { var: x.clone() }], body.clone());
        let mut sub = Substitution::new();
        sub.insert(x.clone(), Term::Int(5));
        // the bound occurrence is untouched
        assert_eq!(substitute(&t, &sub), t);
    }
}
