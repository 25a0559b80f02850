// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Forward and backward k-induction.
//!
//! Three incrementally extended solver contexts run in lock step:
//!
//! - `base` holds `Init(X₀) ∧ Tr(X₀,X₁) ∧ …` and asks for `Bad(X_k)` under a
//!   push/pop, refuting or finding counterexamples of each depth;
//! - `step-forward` holds `Bad(X₀) ∧ Tr⁻¹(X₀,X₁) ∧ ¬Bad(X₁) ∧ …`; when it
//!   goes unsat, `¬Bad` is k-inductive;
//! - `step-backward` holds `Init(X₀) ∧ Tr(X₀,X₁) ∧ ¬Init(X₁) ∧ …`; when it
//!   goes unsat, `¬Init` is k-inductive for the reversed system.
//!
//! A k-inductive invariant is strengthened into a 1-inductive witness before
//! it is reported.

use chc::graph::DirectedGraph;
use chc::syntax::Term;
use chc::term::time::send_through_time;
use solver::basics::{ContextFactory, SatResult, SmtContext, SolverError};

use crate::invariant::{kinductive_to_inductive, verify_kinductive_invariant};
use crate::options::{Deadline, EngineOptions};
use crate::result::{
    Diagnostic, InvalidityWitness, TsPath, ValidityWitness, VerificationResult,
};
use crate::ts::TransitionSystem;

/// The k-induction engine.
pub struct Kind<'a, F: ContextFactory> {
    factory: &'a F,
    options: &'a EngineOptions,
}

enum Stop {
    Solver(String),
    Timeout,
}

impl From<SolverError> for Stop {
    fn from(e: SolverError) -> Self {
        Stop::Solver(e.to_string())
    }
}

impl<'a, F: ContextFactory> Kind<'a, F> {
    /// Create a k-induction engine.
    pub fn new(factory: &'a F, options: &'a EngineOptions) -> Self {
        Kind { factory, options }
    }

    /// Decide reachability of the query by simultaneous forward and backward
    /// k-induction.
    pub fn solve_transition_system(
        &self,
        system: &TransitionSystem,
        graph: &DirectedGraph,
    ) -> VerificationResult {
        match self.run(system, graph) {
            Ok(result) => result,
            Err(Stop::Timeout) => VerificationResult::unknown(Diagnostic::SolverFailure(
                "deadline exceeded".to_string(),
            )),
            Err(Stop::Solver(reason)) => {
                VerificationResult::unknown(Diagnostic::SolverFailure(reason))
            }
        }
    }

    fn run(
        &self,
        system: &TransitionSystem,
        graph: &DirectedGraph,
    ) -> Result<VerificationResult, Stop> {
        let deadline = Deadline::start(self.options.timeout);
        let init = system.init().clone();
        let query = system.query().clone();
        let transition = system.transition().clone();
        let backward_transition = system.reverse_transition_relation();
        let neg_query = Term::negate(query.clone());
        let neg_init = Term::negate(init.clone());

        let mut base = self.factory.context("kind-base")?;
        let mut step_forward = self.factory.context("kind-step-forward")?;
        let mut step_backward = self.factory.context("kind-step-backward")?;
        base.assert(&init)?;
        step_forward.assert(&query)?;
        step_backward.assert(&init)?;

        // a system with empty initial states is trivially safe
        if self.check(&mut base, &deadline)? == SatResult::Unsat {
            log::info!("KIND: initial states are empty");
            return Ok(self.safe(graph, Term::Literal(false)));
        }

        for k in 0..=self.options.max_k {
            // base case at depth k
            base.push()?;
            base.assert(&send_through_time(&query, k as i32))?;
            if self.check(&mut base, &deadline)? == SatResult::Sat {
                log::info!("KIND: bug found in depth {k}");
                if !self.options.compute_witness {
                    return Ok(VerificationResult::unsafe_());
                }
                let model = base.get_model()?;
                let path = TsPath::from_unrolling_model(system, &model, k);
                let witness = InvalidityWitness::from_transition_system(graph, path)
                    .expect("graph lost its transition-system shape");
                return Ok(VerificationResult::unsafe_with(witness));
            }
            log::debug!("KIND: no path of length {k}");
            base.pop()?;
            base.assert(&send_through_time(&transition, k as i32))?;

            // forward induction step
            if self.check(&mut step_forward, &deadline)? == SatResult::Unsat {
                log::info!("KIND: forward induction found a {k}-inductive invariant");
                return Ok(self.witness_from_forward_induction(system, graph, k));
            }
            step_forward.assert(&send_through_time(&backward_transition, k as i32))?;
            step_forward.assert(&send_through_time(&neg_query, (k + 1) as i32))?;

            // backward induction step
            if self.check(&mut step_backward, &deadline)? == SatResult::Unsat {
                log::info!("KIND: backward induction found a {k}-inductive invariant");
                return Ok(self.witness_from_backward_induction(system, graph, k));
            }
            step_backward.assert(&send_through_time(&transition, k as i32))?;
            step_backward.assert(&send_through_time(&neg_init, (k + 1) as i32))?;
        }
        Ok(VerificationResult::unknown(Diagnostic::SolverFailure(
            "induction depth bound exceeded".to_string(),
        )))
    }

    fn check<C: SmtContext>(&self, ctx: &mut C, deadline: &Deadline) -> Result<SatResult, Stop> {
        if deadline.expired() {
            return Err(Stop::Timeout);
        }
        match ctx.check_sat()? {
            SatResult::Unknown(reason) => Err(Stop::Solver(reason)),
            result => Ok(result),
        }
    }

    fn witness_from_forward_induction(
        &self,
        system: &TransitionSystem,
        graph: &DirectedGraph,
        k: usize,
    ) -> VerificationResult {
        if !self.options.compute_witness {
            return VerificationResult::safe();
        }
        let kinductive = Term::negate(system.query().clone());
        let inductive = kinductive_to_inductive(&kinductive, k.max(1), system);
        self.checked_safe(system, graph, &kinductive, k.max(1), inductive)
    }

    fn witness_from_backward_induction(
        &self,
        system: &TransitionSystem,
        graph: &DirectedGraph,
        k: usize,
    ) -> VerificationResult {
        if !self.options.compute_witness {
            return VerificationResult::safe();
        }
        let reversed = system.reverse();
        let kinductive = Term::negate(reversed.query().clone());
        let inductive = kinductive_to_inductive(&kinductive, k.max(1), &reversed);
        // an invariant of the reversed system excludes the states that reach
        // Bad; its negation over-approximates the forward-reachable states
        match verify_kinductive_invariant(self.factory, &reversed, &kinductive, k.max(1)) {
            Ok(true) => {}
            Ok(false) => panic!("backward k-induction produced a non-inductive invariant"),
            Err(e) => {
                return VerificationResult::unknown(Diagnostic::SolverFailure(e.to_string()))
            }
        }
        let original = Term::negate(inductive);
        self.safe(graph, original)
    }

    fn checked_safe(
        &self,
        system: &TransitionSystem,
        graph: &DirectedGraph,
        kinductive: &Term,
        k: usize,
        inductive: Term,
    ) -> VerificationResult {
        match verify_kinductive_invariant(self.factory, system, kinductive, k) {
            Ok(true) => {}
            Ok(false) => panic!("forward k-induction produced a non-inductive invariant"),
            Err(e) => {
                return VerificationResult::unknown(Diagnostic::SolverFailure(e.to_string()))
            }
        }
        self.safe(graph, inductive)
    }

    fn safe(&self, graph: &DirectedGraph, invariant: Term) -> VerificationResult {
        if self.options.compute_witness {
            VerificationResult::safe_with(ValidityWitness::from_transition_system(
                graph, invariant,
            ))
        } else {
            VerificationResult::safe()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{VerificationAnswer, Witness};
    use crate::ts::to_transition_system;
    use chc::graph::{PredicateTable, ENTRY, EXIT};
    use chc::semantics::{holds, Assignment, Value};
    use chc::syntax::{NumOp, NumRel, Sort, Var};
    use solver::basics::{ScriptEntry, ScriptedFactory};

    /// P(0), P(x+1) <- P(x) ∧ x >= 0, false <- P(x) ∧ x < 0
    fn monotone_counter() -> DirectedGraph {
        let mut table = PredicateTable::new();
        let p = table.intern("P", &[Sort::Int]);
        let x0 = Var::at("P.0", 0, Sort::Int);
        let x1 = Var::at("P.0", 1, Sort::Int);
        DirectedGraph::new(
            table,
            vec![
                (ENTRY, p, Term::equals(Term::var(&x1), Term::Int(0))),
                (
                    p,
                    p,
                    Term::and([
                        Term::equals(
                            Term::var(&x1),
                            Term::num_op(NumOp::Add, Term::var(&x0), Term::Int(1)),
                        ),
                        Term::num_rel(NumRel::Geq, Term::var(&x0), Term::Int(0)),
                    ]),
                ),
                (p, EXIT, Term::num_rel(NumRel::Lt, Term::var(&x0), Term::Int(0))),
            ],
        )
    }

    #[test]
    fn test_safe_by_forward_induction_at_k1() {
        let graph = monotone_counter();
        let system = to_transition_system(&graph).unwrap();
        let factory = ScriptedFactory::new();
        factory.script(
            "kind-base",
            [
                // init non-empty; depth 0 and 1 have no bug
                ScriptEntry::Sat(Assignment::new()),
                ScriptEntry::Unsat(None),
                ScriptEntry::Unsat(None),
            ],
        );
        factory.script(
            "kind-step-forward",
            [
                // k = 0: Bad(X0) alone is satisfiable
                ScriptEntry::Sat(Assignment::new()),
                // k = 1: no backward extension, ¬Bad is 1-inductive
                ScriptEntry::Unsat(None),
            ],
        );
        factory.script("kind-step-backward", [ScriptEntry::Sat(Assignment::new())]);
        // witness verification: one base obligation, one consecution
        factory.script("invariant-base", [ScriptEntry::Unsat(None)]);
        factory.script("invariant-step", [ScriptEntry::Unsat(None)]);

        let options = EngineOptions::default();
        let engine = Kind::new(&factory, &options);
        let result = engine.solve_transition_system(&system, &graph);
        assert_eq!(result.answer, VerificationAnswer::Safe);
        let Some(Witness::Validity(witness)) = result.witness else {
            panic!("missing invariant witness");
        };
        let p = graph.predicates().lookup("P").unwrap();
        let inv = &witness.invariants[&p];
        // the invariant excludes the bad states
        let x0 = Var::at("P.0", 0, Sort::Int);
        let mut bad_state = Assignment::new();
        bad_state.insert(x0, Value::Int(-1));
        assert_eq!(holds(inv, &bad_state), Some(false));
        assert_eq!(factory.remaining(), 0);
    }

    #[test]
    fn test_unsafe_found_in_base_case() {
        let mut table = PredicateTable::new();
        let q = table.intern("Q", &[Sort::Int]);
        let x0 = Var::at("Q.0", 0, Sort::Int);
        let x1 = Var::at("Q.0", 1, Sort::Int);
        let graph = DirectedGraph::new(
            table,
            vec![
                (ENTRY, q, Term::equals(Term::var(&x1), Term::Int(0))),
                (
                    q,
                    q,
                    Term::equals(
                        Term::var(&x1),
                        Term::num_op(NumOp::Add, Term::var(&x0), Term::Int(1)),
                    ),
                ),
                (q, EXIT, Term::equals(Term::var(&x0), Term::Int(1))),
            ],
        );
        let system = to_transition_system(&graph).unwrap();
        let factory = ScriptedFactory::new();
        let mut model = Assignment::new();
        model.insert(Var::at("Q.0", 0, Sort::Int), Value::Int(0));
        model.insert(Var::at("Q.0", 1, Sort::Int), Value::Int(1));
        factory.script(
            "kind-base",
            [
                ScriptEntry::Sat(Assignment::new()),
                // depth 0: no bug; depth 1: bug
                ScriptEntry::Unsat(None),
                ScriptEntry::Sat(model),
            ],
        );
        factory.script("kind-step-forward", [ScriptEntry::Sat(Assignment::new())]);
        factory.script("kind-step-backward", [ScriptEntry::Sat(Assignment::new())]);

        let options = EngineOptions::default();
        let engine = Kind::new(&factory, &options);
        let result = engine.solve_transition_system(&system, &graph);
        assert_eq!(result.answer, VerificationAnswer::Unsafe);
        let Some(Witness::Invalidity(witness)) = result.witness else {
            panic!("missing counterexample");
        };
        assert_eq!(witness.length(), 1);
        assert_eq!(witness.validate(&graph), Ok(()));
        assert_eq!(factory.remaining(), 0);
    }

    #[test]
    fn test_solver_unknown_becomes_unknown_verdict() {
        let graph = monotone_counter();
        let system = to_transition_system(&graph).unwrap();
        let factory = ScriptedFactory::new();
        factory.script(
            "kind-base",
            [ScriptEntry::Unknown("resource limit".to_string())],
        );
        let options = EngineOptions::default();
        let engine = Kind::new(&factory, &options);
        let result = engine.solve_transition_system(&system, &graph);
        assert_eq!(result.answer, VerificationAnswer::Unknown);
        assert!(matches!(
            result.diagnostic,
            Some(Diagnostic::SolverFailure(_))
        ));
    }
}
