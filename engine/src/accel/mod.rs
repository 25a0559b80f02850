// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Power-accelerated reachability.
//!
//! The accelerated engines compose the transition relation in doubling
//! exponents. At level `n` the split engine keeps two relations, both pure
//! transition formulas over `(X, X')`:
//!
//! - `Exact(n)`, over-approximating exactly `2ⁿ` steps;
//! - `LT(n)`, over-approximating fewer than `2ⁿ` steps.
//!
//! A level's solver holds the *two-step composition* of the level below over
//! time indices 0, 1, 2; queries conjoin a source at index 0 and a target at
//! index 2, models expose the intermediate state at index 1, and interpolants
//! come back over indices 0 and 2 and are rewritten to `(X, X')` before they
//! strengthen the level's stored relation. Satisfiable queries are validated
//! recursively through the level below (abstractions may lie); refuted
//! validations strengthen the lower level and the query is retried.

mod single;
mod split;

pub use single::AccelSingle;
pub use split::AccelSplit;

use chc::semantics::Assignment;
use chc::syntax::{Term, Var};
use chc::term::fo::free_vars;
use chc::term::qelim::eliminate_vars_except;
use chc::term::subst::{substitute, Substitution};
use chc::term::time::{send_var_through_time, ShiftCache};
use solver::basics::{ContextFactory, ItpGroup, SatResult, SmtContext, SolverError};

use crate::options::{Deadline, EngineOptions};
use crate::result::{Diagnostic, TsPath, VerificationResult};
use crate::ts::{is_pure_transition_formula, TransitionSystem};

/// Why an accelerated run stopped without a verdict.
pub(crate) enum Stop {
    Timeout,
    Solver(String),
}

impl From<SolverError> for Stop {
    fn from(e: SolverError) -> Self {
        Stop::Solver(e.to_string())
    }
}

impl Stop {
    pub(crate) fn into_result(self) -> VerificationResult {
        match self {
            Stop::Timeout => VerificationResult::unknown(Diagnostic::SolverFailure(
                "deadline exceeded".to_string(),
            )),
            Stop::Solver(reason) => {
                VerificationResult::unknown(Diagnostic::SolverFailure(reason))
            }
        }
    }
}

/// A concrete run of states discovered by validated reachability queries.
#[derive(Debug, Clone, Default)]
pub(crate) struct Trace {
    /// Assignments to the state variables, one per visited state
    pub states: Vec<Assignment>,
    /// Assignments to the transition auxiliaries, one per step
    pub step_aux: Vec<Assignment>,
}

impl Trace {
    fn single(state: Assignment) -> Self {
        Trace {
            states: vec![state],
            step_aux: vec![],
        }
    }

    /// Concatenate two traces sharing the junction state.
    fn join(mut self, other: Trace) -> Trace {
        self.states.extend(other.states.into_iter().skip(1));
        self.step_aux.extend(other.step_aux);
        self
    }
}

/// The memoised answer of a reachability query.
#[derive(Debug, Clone)]
pub(crate) enum QueryResult {
    /// No run connects the source to the target at this level
    Unreachable,
    /// A validated run exists
    Reachable {
        /// A refined target implying the queried one, reached by the run
        refined: Term,
        /// Concrete number of transition steps of the run
        steps: usize,
        /// The run itself, when witnesses are being computed
        trace: Option<Trace>,
    },
}

impl QueryResult {
    pub(crate) fn is_reachable(&self) -> bool {
        matches!(self, QueryResult::Reachable { .. })
    }
}

/// Join the traces of two validated halves, when both are present.
pub(crate) fn join_traces(a: Option<Trace>, b: Option<Trace>) -> Option<Trace> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.join(b)),
        _ => None,
    }
}

/// What a [`SolverWrapper::check_consistent`] caller will ask for next.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Want {
    /// Only the verdict and a model on sat
    Model,
    /// Additionally an interpolant on unsat
    ModelAndInterpolant,
}

/// The outcome of a consistency check against a level's relation.
pub(crate) enum Outcome {
    /// The query is consistent; the model covers indices 0, 1, 2
    Consistent(Assignment),
    /// The query is inconsistent; the interpolant separates the relation
    /// from the query when one was requested
    Inconsistent(Option<Term>),
}

/// A per-level solver context holding a two-step composition and serving
/// consistency queries against it.
pub(crate) struct SolverWrapper<C: SmtContext> {
    ctx: C,
}

impl<C: SmtContext> SolverWrapper<C> {
    pub(crate) fn new(mut ctx: C, transition: &Term) -> Result<Self, Stop> {
        ctx.assert(transition)?;
        Ok(SolverWrapper { ctx })
    }

    /// Conjoin a refinement to the level's relation.
    pub(crate) fn strengthen_transition(&mut self, t: &Term) -> Result<(), Stop> {
        self.ctx.assert(t)?;
        Ok(())
    }

    /// Is the relation consistent with `query`?
    pub(crate) fn check_consistent(&mut self, query: &Term, want: Want) -> Result<Outcome, Stop> {
        self.ctx.push()?;
        self.ctx.assert_in(ItpGroup::B, query)?;
        let result = self.ctx.check_sat()?;
        let outcome = match result {
            SatResult::Sat => Outcome::Consistent(self.ctx.get_model()?),
            SatResult::Unsat => {
                let itp = if want == Want::ModelAndInterpolant {
                    Some(self.ctx.get_interpolant()?)
                } else {
                    None
                };
                Outcome::Inconsistent(itp)
            }
            SatResult::Unknown(reason) => {
                self.ctx.pop()?;
                return Err(Stop::Solver(reason));
            }
        };
        self.ctx.pop()?;
        Ok(outcome)
    }
}

/// State shared by both accelerated engines: the versioned system, the
/// shift cache, and the model/formula plumbing around a level's solver.
pub(crate) struct AccelCore<'a, F: ContextFactory> {
    pub factory: &'a F,
    pub options: &'a EngineOptions,
    pub deadline: Deadline,
    pub init: Term,
    pub transition: Term,
    pub query: Term,
    pub state_vars: Vec<Var>,
    pub identity: Term,
    cache: ShiftCache,
}

impl<'a, F: ContextFactory> AccelCore<'a, F> {
    pub(crate) fn new(
        factory: &'a F,
        options: &'a EngineOptions,
        system: &TransitionSystem,
    ) -> Self {
        let identity = Term::and(system.state_vars().iter().map(|x| {
            Term::equals(
                Term::var(&send_var_through_time(x, 1)),
                Term::var(x),
            )
        }));
        AccelCore {
            factory,
            options,
            deadline: Deadline::start(options.timeout),
            init: system.init().clone(),
            transition: system.transition().clone(),
            query: system.query().clone(),
            state_vars: system.state_vars().to_vec(),
            identity,
            cache: ShiftCache::new(),
        }
    }

    pub(crate) fn tick(&self) -> Result<(), Stop> {
        if self.deadline.expired() {
            return Err(Stop::Timeout);
        }
        Ok(())
    }

    /// Shift a formula through time, memoised.
    pub(crate) fn shift(&mut self, t: &Term, delta: i32) -> Term {
        self.cache.shift(t, delta)
    }

    /// The two-step composition of a relation: one copy over (0, 1) and one
    /// over (1, 2), with the second copy's auxiliaries freshened by the shift.
    pub(crate) fn two_step(&mut self, relation: &Term) -> Term {
        let second = self.shift(relation, 1);
        Term::and([relation.clone(), second])
    }

    /// Rewrite the next-state variables of a relation to the next-next slot,
    /// casting a `(X, X')` formula to the (0, 2) endpoints of a composition.
    pub(crate) fn shift_only_next_vars(&self, t: &Term) -> Term {
        let sub: Substitution = free_vars(t)
            .into_iter()
            .filter(|v| v.index == Some(1))
            .map(|v| {
                let shifted = send_var_through_time(&v, 1);
                (v, Term::var(&shifted))
            })
            .collect();
        substitute(t, &sub)
    }

    /// Rewrite the next-next variables of an interpolant down to the
    /// next-state slot: an interpolant from a level solver lives over indices
    /// 0 and 2, with index 2 standing for "X after the level's power of
    /// steps"; the stored relations use index 1 for that role.
    pub(crate) fn clean_interpolant(&self, itp: &Term) -> Term {
        let sub: Substitution = free_vars(itp)
            .into_iter()
            .filter(|v| v.index == Some(2))
            .map(|v| {
                let shifted = send_var_through_time(&v, -1);
                (v, Term::var(&shifted))
            })
            .collect();
        substitute(itp, &sub)
    }

    /// Eliminate auxiliary variables a backend may leak into an interpolant.
    /// Returns `None` when the result still is not a pure transition formula,
    /// in which case the caller must not use it as a strengthening.
    pub(crate) fn simplify_interpolant(&self, itp: &Term) -> Option<Term> {
        let keep: Vec<Var> = self
            .state_vars
            .iter()
            .cloned()
            .chain(self.state_vars.iter().map(|v| send_var_through_time(v, 1)))
            .collect();
        let reduced = eliminate_vars_except(&keep, itp).term;
        if is_pure_transition_formula(&self.state_vars, &reduced) {
            Some(reduced)
        } else {
            log::warn!("discarding impure interpolant {itp}");
            None
        }
    }

    /// Clean, simplify, and purity-check an interpolant from a level solver.
    pub(crate) fn usable_interpolant(&self, itp: &Term) -> Option<Term> {
        self.simplify_interpolant(&self.clean_interpolant(itp))
    }

    /// Read the state at a time index off a model, as an assignment to the
    /// state variables at version 0.
    pub(crate) fn state_assignment(&self, model: &Assignment, index: i32) -> Assignment {
        self.state_vars
            .iter()
            .filter_map(|x| {
                model
                    .get(&send_var_through_time(x, index))
                    .map(|v| (x.clone(), *v))
            })
            .collect()
    }

    /// The point formula of a model's state at a time index, over the state
    /// variables at version 0. This is the mid-point extraction: the
    /// intermediate state of a two-step model, cast back to state variables.
    pub(crate) fn extract_mid_point(&self, model: &Assignment, index: i32) -> Term {
        Term::and(self.state_assignment(model, index).into_iter().map(
            |(x, v)| {
                let value = match v {
                    chc::semantics::Value::Int(i) => Term::Int(i),
                    chc::semantics::Value::Bool(b) => Term::Literal(b),
                };
                Term::equals(Term::var(&x), value)
            },
        ))
    }

    /// The auxiliaries of the transition relation.
    fn transition_aux(&self) -> Vec<Var> {
        let state: std::collections::BTreeSet<Var> = self
            .state_vars
            .iter()
            .cloned()
            .chain(self.state_vars.iter().map(|v| send_var_through_time(v, 1)))
            .collect();
        free_vars(&self.transition)
            .into_iter()
            .filter(|v| !state.contains(v))
            .collect()
    }

    /// A fresh scratch context. All one-shot checks go through the shared
    /// `accel-check` stream so scripted tests see one deterministic sequence.
    fn scratch(&self) -> Result<F::Ctx, Stop> {
        Ok(self.factory.context("accel-check")?)
    }

    /// Is `formula` satisfiable? Returns the model if so.
    pub(crate) fn check_scratch(&self, formula: &Term) -> Result<Option<Assignment>, Stop> {
        self.tick()?;
        let mut ctx = self.scratch()?;
        ctx.assert(formula)?;
        match ctx.check_sat()? {
            SatResult::Sat => Ok(Some(ctx.get_model()?)),
            SatResult::Unsat => Ok(None),
            SatResult::Unknown(reason) => Err(Stop::Solver(reason)),
        }
    }

    /// Zero-step reachability: is `from ∧ to` satisfiable?
    pub(crate) fn reachability_exact_zero_step(
        &mut self,
        from: &Term,
        to: &Term,
    ) -> Result<QueryResult, Stop> {
        let formula = Term::and([from.clone(), to.clone()]);
        match self.check_scratch(&formula)? {
            None => Ok(QueryResult::Unreachable),
            Some(model) => {
                let refined = self.extract_mid_point(&model, 0);
                let trace = self
                    .options
                    .compute_witness
                    .then(|| Trace::single(self.state_assignment(&model, 0)));
                Ok(QueryResult::Reachable {
                    refined,
                    steps: 0,
                    trace,
                })
            }
        }
    }

    /// One-step reachability over the concrete transition relation.
    pub(crate) fn reachability_exact_one_step(
        &mut self,
        from: &Term,
        to: &Term,
    ) -> Result<QueryResult, Stop> {
        let to_next = self.shift(to, 1);
        let formula = Term::and([from.clone(), self.transition.clone(), to_next]);
        match self.check_scratch(&formula)? {
            None => Ok(QueryResult::Unreachable),
            Some(model) => {
                let refined = self.extract_mid_point(&model, 1);
                let trace = self.options.compute_witness.then(|| {
                    let aux = self
                        .transition_aux()
                        .iter()
                        .filter_map(|v| model.get(v).map(|val| (v.clone(), *val)))
                        .collect();
                    Trace {
                        states: vec![
                            self.state_assignment(&model, 0),
                            self.state_assignment(&model, 1),
                        ],
                        step_aux: vec![aux],
                    }
                });
                Ok(QueryResult::Reachable {
                    refined,
                    steps: 1,
                    trace,
                })
            }
        }
    }

    /// Turn a validated trace into a counterexample path with the entry and
    /// exit auxiliaries filled in from dedicated models.
    pub(crate) fn ts_path(&self, trace: Trace) -> Result<TsPath, Stop> {
        let aux_assignment = |formula: &Term, state: &Assignment| -> Result<Assignment, Stop> {
            let state_set: std::collections::BTreeSet<&Var> = self.state_vars.iter().collect();
            if free_vars(formula).iter().all(|v| state_set.contains(v)) {
                return Ok(Assignment::new());
            }
            let point = Term::and(state.iter().map(|(x, v)| {
                let value = match v {
                    chc::semantics::Value::Int(i) => Term::Int(*i),
                    chc::semantics::Value::Bool(b) => Term::Literal(*b),
                };
                Term::equals(Term::var(x), value)
            }));
            let model = self
                .check_scratch(&Term::and([formula.clone(), point]))?
                .unwrap_or_default();
            Ok(model
                .into_iter()
                .filter(|(v, _)| !state_set.contains(v))
                .collect())
        };
        let entry_aux = match trace.states.first() {
            Some(first) => aux_assignment(&self.init, first)?,
            None => Assignment::new(),
        };
        let exit_aux = match trace.states.last() {
            Some(last) => aux_assignment(&self.query, last)?,
            None => Assignment::new(),
        };
        Ok(TsPath {
            states: trace.states,
            step_aux: trace.step_aux,
            entry_aux,
            exit_aux,
        })
    }
}
