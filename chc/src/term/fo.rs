// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! First-order reasoning about terms: free variables.

use std::collections::BTreeSet;

use crate::syntax::{Term, Var};

/// Compute the free variables of a term, in a deterministic order.
pub fn free_vars(term: &Term) -> BTreeSet<Var> {
    let mut vars = BTreeSet::new();
    collect(term, &im::HashSet::new(), &mut vars);
    vars
}

/// Whether `v` occurs free in `term`.
pub fn contains_var(term: &Term, v: &Var) -> bool {
    free_vars(term).contains(v)
}

fn collect(term: &Term, bound: &im::HashSet<Var>, vars: &mut BTreeSet<Var>) {
    match term {
        Term::Literal(_) | Term::Int(_) => (),
        Term::Var(v) => {
            if !bound.contains(v) {
                vars.insert(v.clone());
            }
        }
        Term::UnaryOp(_, arg) => collect(arg, bound, vars),
        Term::BinOp(_, lhs, rhs) | Term::NumOp(_, lhs, rhs) | Term::NumRel(_, lhs, rhs) => {
            collect(lhs, bound, vars);
            collect(rhs, bound, vars);
        }
        Term::NAryOp(_, ts) => {
            for t in ts {
                collect(t, bound, vars);
            }
        }
        Term::Ite { cond, then, else_ } => {
            collect(cond, bound, vars);
            collect(then, bound, vars);
            collect(else_, bound, vars);
        }
        Term::Quantified { binders, body, .. } => {
            let mut bound = bound.clone();
            bound.extend(binders.iter().map(|b| b.var.clone()));
            collect(body, &bound, vars);
        }
    }
}
