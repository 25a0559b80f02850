// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Trivial quantifier elimination.
//!
//! Eliminates a variable bound by a top-level conjunct equality `v = t` where
//! `t` is independent of `v`, by substituting `t` for `v` and dropping the
//! equality. Applied to fixpoint. This is deliberately incomplete: anything
//! beyond equality-defined variables is left in place, and callers either
//! keep the residual variables as auxiliaries or close over them with an
//! explicit quantifier.

use std::collections::BTreeSet;

use crate::syntax::{NumOp, Term, Var};
use crate::term::fo::{contains_var, free_vars};
use crate::term::subst::{substitute, Substitution};

/// The result of an elimination pass.
pub struct Elimination {
    /// The reduced term
    pub term: Term,
    /// The eliminated variables with their defining terms, in elimination
    /// order. A defining term may mention variables eliminated later in the
    /// list (never earlier ones), so consumers reconstruct values by
    /// evaluating the list back to front.
    pub bindings: Vec<(Var, Term)>,
}

/// Try to eliminate each of `targets` from `term`.
pub fn eliminate_vars(targets: &BTreeSet<Var>, term: &Term) -> Elimination {
    let mut conjuncts: Vec<Term> = term.conjuncts().into_iter().cloned().collect();
    let mut bindings: Vec<(Var, Term)> = vec![];
    let mut remaining: BTreeSet<Var> = targets.clone();

    loop {
        let mut eliminated = None;
        'search: for (i, c) in conjuncts.iter().enumerate() {
            for v in &remaining {
                if let Some(def) = solve_for(c, v) {
                    eliminated = Some((i, v.clone(), def));
                    break 'search;
                }
            }
        }
        let Some((i, v, def)) = eliminated else { break };
        conjuncts.remove(i);
        let mut sub = Substitution::new();
        sub.insert(v.clone(), def.clone());
        conjuncts = conjuncts.iter().map(|c| substitute(c, &sub)).collect();
        // earlier bindings may mention v; resolve them now so that each
        // defining term only references later bindings or surviving variables
        bindings = bindings
            .into_iter()
            .map(|(bv, bt)| (bv, substitute(&bt, &sub)))
            .collect();
        bindings.push((v.clone(), def));
        remaining.remove(&v);
    }

    Elimination {
        term: Term::and(conjuncts),
        bindings,
    }
}

/// Eliminate every free variable of `term` not listed in `keep`.
pub fn eliminate_vars_except(keep: &[Var], term: &Term) -> Elimination {
    let keep: BTreeSet<&Var> = keep.iter().collect();
    let targets: BTreeSet<Var> = free_vars(term)
        .into_iter()
        .filter(|v| !keep.contains(v))
        .collect();
    eliminate_vars(&targets, term)
}

/// If `conjunct` is an equality that defines `v` by a term independent of
/// `v`, return that term.
fn solve_for(conjunct: &Term, v: &Var) -> Option<Term> {
    let Term::BinOp(crate::syntax::BinOp::Equals, lhs, rhs) = conjunct else {
        return None;
    };
    isolate(lhs, rhs, v).or_else(|| isolate(rhs, lhs, v))
}

/// Solve `lhs = rhs` for `v`, where `v` must appear on the `lhs` side. Handles
/// a bare variable and one level of `v + a` / `v - a` / `a + v`.
fn isolate(lhs: &Term, rhs: &Term, v: &Var) -> Option<Term> {
    if contains_var(rhs, v) {
        return None;
    }
    match lhs {
        Term::Var(u) if u == v => Some(rhs.clone()),
        Term::NumOp(NumOp::Add, a, b) => {
            if matches!(a.as_ref(), Term::Var(u) if u == v) && !contains_var(b, v) {
                Some(Term::num_op(NumOp::Sub, rhs.clone(), (**b).clone()))
            } else if matches!(b.as_ref(), Term::Var(u) if u == v) && !contains_var(a, v) {
                Some(Term::num_op(NumOp::Sub, rhs.clone(), (**a).clone()))
            } else {
                None
            }
        }
        Term::NumOp(NumOp::Sub, a, b) => {
            if matches!(a.as_ref(), Term::Var(u) if u == v) && !contains_var(b, v) {
                Some(Term::num_op(NumOp::Add, rhs.clone(), (**b).clone()))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Existentially close `term` over its free variables outside `keep`, after a
/// trivial-elimination pass. Used where a residual variable must not stay
/// free (invariants, initial formulas).
pub fn close_except(keep: &[Var], term: &Term) -> Term {
    let reduced = eliminate_vars_except(keep, term);
    let keep: BTreeSet<&Var> = keep.iter().collect();
    let leftover: Vec<_> = free_vars(&reduced.term)
        .into_iter()
        .filter(|v| !keep.contains(v))
        .map(|var| crate::syntax::Binder { var })
        .collect();
    Term::exists(leftover, reduced.term)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::{eval, Assignment, Value};
    use crate::syntax::{NumRel, Sort};

    fn int_at(name: &str, i: i32) -> Var {
        Var::at(name, i, Sort::Int)
    }

    #[test]
    fn test_eliminate_defined_var() {
        // y = x + 1 & y >= 3, eliminating y, leaves x + 1 >= 3
        let x = int_at("x", 0);
        let y = int_at("y", 0);
        let t = Term::and([
            Term::equals(
                Term::var(&y),
                Term::num_op(NumOp::Add, Term::var(&x), Term::Int(1)),
            ),
            Term::num_rel(NumRel::Geq, Term::var(&y), Term::Int(3)),
        ]);
        let res = eliminate_vars(&BTreeSet::from([y.clone()]), &t);
        assert!(!contains_var(&res.term, &y));
        assert_eq!(res.bindings.len(), 1);
        assert_eq!(res.bindings[0].0, y);

        // semantics preserved under the binding: for x = 5, y must be 6
        let mut a = Assignment::new();
        a.insert(x.clone(), Value::Int(5));
        assert_eq!(eval(&res.term, &a), Ok(Value::Bool(true)));
        assert_eq!(eval(&res.bindings[0].1, &a), Ok(Value::Int(6)));
    }

    #[test]
    fn test_eliminate_chain() {
        // z = y & y = x + 1, eliminating {y, z}: everything collapses
        let x = int_at("x", 0);
        let y = int_at("y", 0);
        let z = int_at("z", 0);
        let t = Term::and([
            Term::equals(Term::var(&z), Term::var(&y)),
            Term::equals(
                Term::var(&y),
                Term::num_op(NumOp::Add, Term::var(&x), Term::Int(1)),
            ),
        ]);
        let res = eliminate_vars(&BTreeSet::from([y.clone(), z.clone()]), &t);
        assert!(res.term.is_true());
        assert_eq!(res.bindings.len(), 2);
        // bindings must be resolvable back to front from x alone
        let mut a = Assignment::new();
        a.insert(x, Value::Int(2));
        for (v, def) in res.bindings.iter().rev() {
            let val = eval(def, &a).unwrap();
            a.insert(v.clone(), val);
        }
        assert_eq!(a[&y], Value::Int(3));
        assert_eq!(a[&z], Value::Int(3));
    }

    #[test]
    fn test_keeps_undefined_vars() {
        // x < y has no defining equality; nothing happens
        let x = int_at("x", 0);
        let y = int_at("y", 0);
        let t = Term::num_rel(NumRel::Lt, Term::var(&x), Term::var(&y));
        let res = eliminate_vars(&BTreeSet::from([y.clone()]), &t);
        assert_eq!(res.term, t);
        assert!(res.bindings.is_empty());
    }

    #[test]
    fn test_eliminate_vars_except() {
        let x = int_at("x", 0);
        let m = int_at("m", 0);
        let t = Term::and([
            Term::equals(Term::var(&m), Term::Int(7)),
            Term::num_rel(NumRel::Lt, Term::var(&x), Term::var(&m)),
        ]);
        let res = eliminate_vars_except(&[x.clone()], &t);
        assert_eq!(
            res.term,
            Term::num_rel(NumRel::Lt, Term::var(&x), Term::Int(7))
        );
    }

    #[test]
    fn test_isolate_sum() {
        // x + 1 = y defines x as y - 1
        let x = int_at("x", 0);
        let y = int_at("y", 0);
        let t = Term::equals(
            Term::num_op(NumOp::Add, Term::var(&x), Term::Int(1)),
            Term::var(&y),
        );
        let res = eliminate_vars(&BTreeSet::from([x.clone()]), &t);
        assert!(res.term.is_true());
        assert_eq!(
            res.bindings[0].1,
            Term::num_op(NumOp::Sub, Term::var(&y), Term::Int(1))
        );
    }

    #[test]
    fn test_close_except() {
        let x = int_at("x", 0);
        let y = int_at("y", 0);
        let t = Term::num_rel(NumRel::Lt, Term::var(&x), Term::var(&y));
        let closed = close_except(&[x.clone()], &t);
        assert!(free_vars(&closed).iter().all(|v| *v == x));
    }
}
