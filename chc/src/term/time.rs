// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Time-index versioning of variables.
//!
//! Every versioned variable carries an integer time index; shifting a formula
//! through time adds a constant offset to every versioned variable in it.
//! Unrollings are built this way: the transition relation between steps `k`
//! and `k+1` is the base relation shifted by `k`.

use fxhash::FxHashMap;

use crate::syntax::{Term, Var};

/// Whether a variable is versioned (carries a time index).
pub fn is_versioned(v: &Var) -> bool {
    v.index.is_some()
}

/// Add `delta` to the time index of a versioned variable. Unversioned
/// variables are returned unchanged.
pub fn send_var_through_time(v: &Var, delta: i32) -> Var {
    match v.index {
        Some(i) => Var {
            name: v.name.clone(),
            index: Some(i + delta),
            sort: v.sort,
        },
        None => v.clone(),
    }
}

/// Cast a variable to version zero.
pub fn var_version_zero(v: &Var) -> Var {
    Var {
        name: v.name.clone(),
        index: Some(0),
        sort: v.sort,
    }
}

/// Strip the time index from a variable.
pub fn unversioned(v: &Var) -> Var {
    Var {
        name: v.name.clone(),
        index: None,
        sort: v.sort,
    }
}

/// Add `delta` to the time index of every versioned variable in the formula.
/// Unversioned variables and all other term structure are unchanged. Bound
/// variables are shifted along with free ones; since binders only ever close
/// over unversioned auxiliaries or whole time slices, this preserves meaning.
pub fn send_through_time(term: &Term, delta: i32) -> Term {
    if delta == 0 {
        return term.clone();
    }
    match term {
        Term::Literal(_) | Term::Int(_) => term.clone(),
        Term::Var(v) => Term::Var(send_var_through_time(v, delta)),
        Term::UnaryOp(op, arg) => Term::UnaryOp(*op, Box::new(send_through_time(arg, delta))),
        Term::BinOp(op, lhs, rhs) => Term::BinOp(
            *op,
            Box::new(send_through_time(lhs, delta)),
            Box::new(send_through_time(rhs, delta)),
        ),
        Term::NAryOp(op, ts) => {
            Term::NAryOp(*op, ts.iter().map(|t| send_through_time(t, delta)).collect())
        }
        Term::NumOp(op, lhs, rhs) => Term::NumOp(
            *op,
            Box::new(send_through_time(lhs, delta)),
            Box::new(send_through_time(rhs, delta)),
        ),
        Term::NumRel(rel, lhs, rhs) => Term::NumRel(
            *rel,
            Box::new(send_through_time(lhs, delta)),
            Box::new(send_through_time(rhs, delta)),
        ),
        Term::Ite { cond, then, else_ } => Term::Ite {
            cond: Box::new(send_through_time(cond, delta)),
            then: Box::new(send_through_time(then, delta)),
            else_: Box::new(send_through_time(else_, delta)),
        },
        Term::Quantified {
            quantifier,
            binders,
            body,
        } => Term::Quantified {
            quantifier: *quantifier,
            binders: binders
                .iter()
                .map(|b| crate::syntax::Binder {
                    var: send_var_through_time(&b.var, delta),
                })
                .collect(),
            body: Box::new(send_through_time(body, delta)),
        },
    }
}

/// A memoisation cache for [`send_through_time`].
///
/// The accelerated engine shifts the same level formulas over and over; the
/// cache trades memory for the repeated traversals.
#[derive(Default)]
pub struct ShiftCache {
    cache: FxHashMap<(Term, i32), Term>,
}

impl ShiftCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift `term` by `delta`, reusing a previously computed result if any.
    pub fn shift(&mut self, term: &Term, delta: i32) -> Term {
        if delta == 0 {
            return term.clone();
        }
        let key = (term.clone(), delta);
        if let Some(shifted) = self.cache.get(&key) {
            return shifted.clone();
        }
        let shifted = send_through_time(term, delta);
        self.cache.insert(key, shifted.clone());
        shifted
    }

    /// Number of memoised entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{NumOp, NumRel, Sort};

    fn sample() -> Term {
        let x0 = Var::at("x", 0, Sort::Int);
        let x1 = Var::at("x", 1, Sort::Int);
        let aux = Var::at("tmp", 0, Sort::Int);
        Term::and([
            Term::equals(
                Term::var(&x1),
                Term::num_op(NumOp::Add, Term::var(&x0), Term::var(&aux)),
            ),
            Term::num_rel(NumRel::Geq, Term::var(&aux), Term::Int(0)),
        ])
    }

    #[test]
    fn test_round_trip() {
        let t = sample();
        for delta in [-3, -1, 1, 2, 7] {
            assert_eq!(send_through_time(&send_through_time(&t, delta), -delta), t);
        }
        assert_eq!(send_through_time(&t, 0), t);
    }

    #[test]
    fn test_unversioned_untouched() {
        let u = Var::new("c", Sort::Int);
        let t = Term::num_rel(NumRel::Lt, Term::var(&u), Term::Int(3));
        assert_eq!(send_through_time(&t, 5), t);
    }

    #[test]
    fn test_shift_moves_every_version() {
        let t = sample();
        let shifted = send_through_time(&t, 2);
        let fv = crate::term::fo::free_vars(&shifted);
        assert!(fv.iter().all(|v| matches!(v.index, Some(2) | Some(3))));
    }

    #[test]
    fn test_cache_consistent() {
        let t = sample();
        let mut cache = ShiftCache::new();
        let a = cache.shift(&t, 4);
        let b = cache.shift(&t, 4);
        assert_eq!(a, b);
        assert_eq!(a, send_through_time(&t, 4));
        assert_eq!(cache.len(), 1);
    }
}
