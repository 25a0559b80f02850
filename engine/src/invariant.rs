// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Strengthening a k-inductive invariant into a 1-inductive one.
//!
//! Given `φ` that is k-inductive for `Tr`, the inductive strengthening is
//!
//! ```text
//! ψ(X) := ⋀_{i=0..k-1} ψᵢ(X),   ψᵢ(X) := "φ holds after every path of length i from X"
//! ```
//!
//! Each `ψᵢ` is materialised by trivial quantifier elimination over the
//! i-unrolling; when elimination is incomplete the residue stays under an
//! explicit quantifier, which keeps the result a pure state formula.

use chc::syntax::Term;
use chc::term::qelim::close_except;
use chc::term::time::send_through_time;
use solver::basics::{ContextFactory, SatResult, SmtContext, SolverError};

use crate::ts::TransitionSystem;

/// Compute a 1-inductive invariant from a k-inductive one.
pub fn kinductive_to_inductive(invariant: &Term, k: usize, system: &TransitionSystem) -> Term {
    let mut conjuncts = vec![invariant.clone()];
    let mut unrolling = vec![];
    for i in 1..k {
        unrolling.push(send_through_time(system.transition(), (i - 1) as i32));
        // ∃ X₁..Xᵢ. Tr(X₀,X₁) ∧ … ∧ Tr(X_{i-1},Xᵢ) ∧ ¬φ(Xᵢ)
        let escape = Term::and(
            unrolling
                .iter()
                .cloned()
                .chain([send_through_time(&Term::negate(invariant.clone()), i as i32)]),
        );
        let closed = close_except(system.state_vars(), &escape);
        conjuncts.push(Term::negate(closed));
    }
    Term::and(conjuncts)
}

/// Discharge the three obligations of a k-inductive invariant via independent
/// checks: `φ` holds on every state reachable from `Init` in fewer than `k`
/// steps, and `k` consecutive `φ`-states force `φ` after one more transition.
/// Returns whether every obligation holds; `Err` reports a solver failure.
pub fn verify_kinductive_invariant<F: ContextFactory>(
    factory: &F,
    system: &TransitionSystem,
    invariant: &Term,
    k: usize,
) -> Result<bool, SolverError> {
    // base obligations
    let mut base = factory.context("invariant-base")?;
    base.assert(system.init())?;
    for j in 0..k {
        base.push()?;
        base.assert(&send_through_time(&Term::negate(invariant.clone()), j as i32))?;
        match base.check_sat()? {
            SatResult::Unsat => {}
            SatResult::Sat => return Ok(false),
            SatResult::Unknown(reason) => {
                return Err(SolverError::BadResponse(reason));
            }
        }
        base.pop()?;
        base.assert(&send_through_time(system.transition(), j as i32))?;
    }
    // consecution obligation
    let mut step = factory.context("invariant-step")?;
    for i in 0..k {
        step.assert(&send_through_time(invariant, i as i32))?;
        step.assert(&send_through_time(system.transition(), i as i32))?;
    }
    step.assert(&send_through_time(&Term::negate(invariant.clone()), k as i32))?;
    match step.check_sat()? {
        SatResult::Unsat => Ok(true),
        SatResult::Sat => Ok(false),
        SatResult::Unknown(reason) => Err(SolverError::BadResponse(reason)),
    }
}

/// Discharge the three obligations of a 1-inductive invariant `ψ`:
/// `Init ⇒ ψ`, `ψ ∧ Tr ⇒ ψ'`, and `ψ ⇒ ¬Bad`.
pub fn verify_inductive_invariant<F: ContextFactory>(
    factory: &F,
    system: &TransitionSystem,
    invariant: &Term,
) -> Result<bool, SolverError> {
    let obligations = [
        Term::and([
            system.init().clone(),
            Term::negate(invariant.clone()),
        ]),
        Term::and([
            invariant.clone(),
            system.transition().clone(),
            send_through_time(&Term::negate(invariant.clone()), 1),
        ]),
        Term::and([invariant.clone(), system.query().clone()]),
    ];
    for obligation in obligations {
        let mut ctx = factory.context("invariant-check")?;
        ctx.assert(&obligation)?;
        match ctx.check_sat()? {
            SatResult::Unsat => {}
            SatResult::Sat => return Ok(false),
            SatResult::Unknown(reason) => return Err(SolverError::BadResponse(reason)),
        }
    }
    Ok(true)
}
