// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The single-hierarchy accelerated engine.
//!
//! Keeps one relation per level, over-approximating *at most* `2ⁿ` steps,
//! instead of the split exact/less-than pair. The outer loop has the same
//! structure as the split engine but each level needs only one solver and
//! one fixed-point check. For inputs whose exact powers are never consulted
//! separately the split representation is wasteful; configuration selects
//! between the two.

use fxhash::FxHashMap;

use chc::graph::DirectedGraph;
use chc::syntax::{Term, Var};
use chc::term::qelim::close_except;
use chc::term::time::{send_through_time, send_var_through_time};
use solver::basics::ContextFactory;

use crate::options::EngineOptions;
use crate::result::{InvalidityWitness, ValidityWitness, VerificationResult};
use crate::ts::TransitionSystem;

use super::{join_traces, AccelCore, Outcome, QueryResult, SolverWrapper, Stop, Trace, Want};

/// The single-hierarchy accelerated engine.
pub struct AccelSingle<'a, F: ContextFactory> {
    factory: &'a F,
    options: &'a EngineOptions,
}

impl<'a, F: ContextFactory> AccelSingle<'a, F> {
    /// Create a single-hierarchy accelerated engine.
    pub fn new(factory: &'a F, options: &'a EngineOptions) -> Self {
        AccelSingle { factory, options }
    }

    /// Decide reachability of the query by power-doubling acceleration.
    pub fn solve_transition_system(
        &self,
        system: &TransitionSystem,
        graph: &DirectedGraph,
    ) -> VerificationResult {
        let mut run = SingleRun::new(self.factory, self.options, system);
        match run.run(graph) {
            Ok(result) => result,
            Err(stop) => stop.into_result(),
        }
    }
}

type QueryCache = FxHashMap<(Term, Term), QueryResult>;

struct SingleRun<'a, F: ContextFactory> {
    core: AccelCore<'a, F>,
    /// `transition_hierarchy[n]` over-approximates runs of at most `2ⁿ`
    /// steps; level 0 is `Id ∨ Tr` exactly
    transition_hierarchy: Vec<Term>,
    solvers: Vec<Option<SolverWrapper<F::Ctx>>>,
    cache: Vec<QueryCache>,
}

impl<'a, F: ContextFactory> SingleRun<'a, F> {
    fn new(factory: &'a F, options: &'a EngineOptions, system: &TransitionSystem) -> Self {
        let core = AccelCore::new(factory, options, system);
        let base = Term::or([core.identity.clone(), core.transition.clone()]);
        SingleRun {
            transition_hierarchy: vec![base],
            solvers: vec![None],
            cache: vec![QueryCache::default()],
            core,
        }
    }

    fn ensure_level(&mut self, n: u32) -> Result<(), Stop> {
        while self.transition_hierarchy.len() <= n as usize {
            let m = self.transition_hierarchy.len();
            let composition = self.core.two_step(&self.transition_hierarchy[m - 1].clone());
            let ctx = self.core.factory.context(&format!("accel-level-{m}"))?;
            self.solvers.push(Some(SolverWrapper::new(ctx, &composition)?));
            self.transition_hierarchy.push(Term::Literal(true));
            self.cache.push(QueryCache::default());
        }
        Ok(())
    }

    fn strengthen_level(&mut self, n: usize, delta: &Term) -> Result<(), Stop> {
        self.transition_hierarchy[n] =
            Term::and([self.transition_hierarchy[n].clone(), delta.clone()]);
        let endpoints = self.core.shift_only_next_vars(delta);
        if let Some(w) = self.solvers[n].as_mut() {
            w.strengthen_transition(&endpoints)?;
        }
        if n + 1 < self.transition_hierarchy.len() {
            let second = self.core.shift(delta, 1);
            if let Some(w) = self.solvers[n + 1].as_mut() {
                w.strengthen_transition(&Term::and([delta.clone(), second]))?;
            }
        }
        Ok(())
    }

    /// Is `to` reachable from `from` in at most `2ⁿ` steps?
    fn reachability_query(&mut self, from: &Term, to: &Term, n: usize) -> Result<QueryResult, Stop> {
        if n == 0 {
            let zero = self.core.reachability_exact_zero_step(from, to)?;
            if zero.is_reachable() {
                return Ok(zero);
            }
            return self.core.reachability_exact_one_step(from, to);
        }
        let key = (from.clone(), to.clone());
        if let Some(cached) = self.cache[n].get(&key) {
            return Ok(cached.clone());
        }
        for _ in 0..self.core.options.max_refinements {
            self.core.tick()?;
            let goal = self.core.shift(to, 2);
            let query = Term::and([from.clone(), goal]);
            let outcome = self.solvers[n]
                .as_mut()
                .unwrap()
                .check_consistent(&query, Want::ModelAndInterpolant)?;
            match outcome {
                Outcome::Inconsistent(itp) => {
                    if let Some(delta) = itp.and_then(|i| self.core.usable_interpolant(&i)) {
                        self.strengthen_level(n, &delta)?;
                    }
                    self.cache[n].insert(key, QueryResult::Unreachable);
                    return Ok(QueryResult::Unreachable);
                }
                Outcome::Consistent(model) => {
                    let mid = self.core.extract_mid_point(&model, 1);
                    let first = self.reachability_query(from, &mid, n - 1)?;
                    let QueryResult::Reachable {
                        refined: refined_mid,
                        steps: s1,
                        trace: t1,
                    } = first
                    else {
                        continue;
                    };
                    let second = self.reachability_query(&refined_mid, to, n - 1)?;
                    let QueryResult::Reachable {
                        refined,
                        steps: s2,
                        trace: t2,
                    } = second
                    else {
                        continue;
                    };
                    let result = QueryResult::Reachable {
                        refined,
                        steps: s1 + s2,
                        trace: join_traces(t1, t2),
                    };
                    self.cache[n].insert(key, result.clone());
                    return Ok(result);
                }
            }
        }
        Err(Stop::Solver(
            "refinement budget exhausted in reachability".to_string(),
        ))
    }

    /// Audit the stored level relation against its composition, repairing
    /// gaps by strengthening the level below.
    fn verify_level(&mut self, n: usize) -> Result<(), Stop> {
        for _ in 0..self.core.options.max_refinements {
            self.core.tick()?;
            let stored = self.transition_hierarchy[n].clone();
            let audit = Term::negate(self.core.shift_only_next_vars(&stored));
            let outcome = self.solvers[n]
                .as_mut()
                .unwrap()
                .check_consistent(&audit, Want::Model)?;
            let Outcome::Consistent(model) = outcome else {
                return Ok(());
            };
            let s0 = self.core.extract_mid_point(&model, 0);
            let s1 = self.core.extract_mid_point(&model, 1);
            let s2 = self.core.extract_mid_point(&model, 2);
            let first = self.reachability_query(&s0, &s1, n - 1)?;
            let QueryResult::Reachable { refined, .. } = first else {
                continue;
            };
            if self.reachability_query(&refined, &s2, n - 1)?.is_reachable() {
                panic!("internal error: level {n} relation excludes a real run");
            }
        }
        Err(Stop::Solver(
            "refinement budget exhausted while verifying a level".to_string(),
        ))
    }

    /// The single fixed-point test of a level: the relation absorbs one more
    /// concrete step.
    fn check_fixed_point(&mut self, n: usize) -> Result<bool, Stop> {
        let level = self.transition_hierarchy[n].clone();
        let tr12 = {
            let tr = self.core.transition.clone();
            self.core.shift(&tr, 1)
        };
        let not_level = Term::negate(self.core.shift_only_next_vars(&level));
        let closure = Term::and([level, tr12, not_level]);
        Ok(self.core.check_scratch(&closure)?.is_none())
    }

    /// `Init(X) ∧ R(X, X') ∧ Bad(X')` is unsatisfiable.
    fn excludes_query(&mut self, relation: &Term) -> Result<bool, Stop> {
        let bad1 = {
            let bad = self.core.query.clone();
            self.core.shift(&bad, 1)
        };
        let formula = Term::and([self.core.init.clone(), relation.clone(), bad1]);
        Ok(self.core.check_scratch(&formula)?.is_none())
    }

    fn invariant_from_level(&self, n: usize) -> Term {
        let reach = Term::and([
            self.core.init.clone(),
            self.transition_hierarchy[n].clone(),
        ]);
        let next_vars: Vec<Var> = self
            .core
            .state_vars
            .iter()
            .map(|v| send_var_through_time(v, 1))
            .collect();
        let closed = close_except(&next_vars, &reach);
        send_through_time(&closed, -1)
    }

    fn run(&mut self, graph: &DirectedGraph) -> Result<VerificationResult, Stop> {
        let init = self.core.init.clone();
        let query = self.core.query.clone();
        if self.core.check_scratch(&init)?.is_none() {
            log::info!("ACCEL: initial states are empty");
            return Ok(self.safe_result(graph, None));
        }
        match self.reachability_query(&init, &query, 0)? {
            QueryResult::Reachable { steps, trace, .. } => {
                log::info!("ACCEL: bug found in depth {steps}");
                return self.unsafe_result(graph, trace);
            }
            QueryResult::Unreachable => {}
        }
        for n in 1..=self.core.options.max_power {
            log::debug!("ACCEL: entering power level {n}");
            self.ensure_level(n)?;
            let n = n as usize;
            self.verify_level(n)?;
            match self.reachability_query(&init, &query, n)? {
                QueryResult::Reachable { steps, trace, .. } => {
                    log::info!("ACCEL: bug found in depth {steps}");
                    return self.unsafe_result(graph, trace);
                }
                QueryResult::Unreachable => {}
            }
            let level = self.transition_hierarchy[n].clone();
            if self.excludes_query(&level)? && self.check_fixed_point(n)? {
                log::info!("ACCEL: fixed point at level {n}");
                return Ok(self.safe_result(graph, Some(n)));
            }
        }
        Err(Stop::Solver("power bound exceeded".to_string()))
    }

    fn unsafe_result(
        &mut self,
        graph: &DirectedGraph,
        trace: Option<Trace>,
    ) -> Result<VerificationResult, Stop> {
        if !self.core.options.compute_witness {
            return Ok(VerificationResult::unsafe_());
        }
        let Some(trace) = trace else {
            return Ok(VerificationResult::unsafe_());
        };
        let path = self.core.ts_path(trace)?;
        let witness = InvalidityWitness::from_transition_system(graph, path)
            .expect("graph lost its transition-system shape");
        Ok(VerificationResult::unsafe_with(witness))
    }

    fn safe_result(&self, graph: &DirectedGraph, level: Option<usize>) -> VerificationResult {
        if !self.core.options.compute_witness {
            return VerificationResult::safe();
        }
        let invariant = match level {
            Some(n) => self.invariant_from_level(n),
            None => Term::Literal(false),
        };
        VerificationResult::safe_with(ValidityWitness::from_transition_system(graph, invariant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{VerificationAnswer, Witness};
    use crate::ts::to_transition_system;
    use chc::graph::{PredicateTable, ENTRY, EXIT};
    use chc::semantics::{holds, Assignment, Value};
    use chc::syntax::{NumOp, Sort};
    use solver::basics::{ScriptEntry, ScriptedFactory};

    fn x(i: i32) -> Var {
        Var::at("L.0", i, Sort::Int)
    }

    fn assignment(pairs: &[(Var, i64)]) -> Assignment {
        pairs
            .iter()
            .map(|(v, val)| (v.clone(), Value::Int(*val)))
            .collect()
    }

    /// entry: x = 0, loop: x' = x, exit: x = 1.
    fn stutter_graph() -> DirectedGraph {
        let mut table = PredicateTable::new();
        let l = table.intern("L", &[Sort::Int]);
        DirectedGraph::new(
            table,
            vec![
                (ENTRY, l, Term::equals(Term::var(&x(1)), Term::Int(0))),
                (l, l, Term::equals(Term::var(&x(1)), Term::var(&x(0)))),
                (l, EXIT, Term::equals(Term::var(&x(0)), Term::Int(1))),
            ],
        )
    }

    #[test]
    fn test_safe_by_single_fixed_point() {
        let graph = stutter_graph();
        let system = to_transition_system(&graph).unwrap();
        let factory = ScriptedFactory::new();
        let itp = Term::equals(Term::var(&x(2)), Term::var(&x(0)));
        factory.script(
            "accel-check",
            [
                // initial states are non-empty
                ScriptEntry::Sat(assignment(&[(x(0), 0)])),
                // no counterexample of length zero or one
                ScriptEntry::Unsat(None),
                ScriptEntry::Unsat(None),
                // the strengthened relation excludes Init -> Bad
                ScriptEntry::Unsat(None),
                // the level-1 closure check passes
                ScriptEntry::Unsat(None),
            ],
        );
        factory.script(
            "accel-level-1",
            [
                // audit of the trivial stored relation passes
                ScriptEntry::Unsat(None),
                // Init cannot reach Bad within the composition
                ScriptEntry::Unsat(Some(itp)),
            ],
        );

        let options = EngineOptions::default();
        let engine = AccelSingle::new(&factory, &options);
        let result = engine.solve_transition_system(&system, &graph);
        assert_eq!(result.answer, VerificationAnswer::Safe);
        let Some(Witness::Validity(witness)) = result.witness else {
            panic!("missing invariant witness");
        };
        let l = graph.predicates().lookup("L").unwrap();
        let inv = &witness.invariants[&l];
        assert_eq!(holds(inv, &assignment(&[(x(0), 0)])), Some(true));
        assert_eq!(holds(inv, &assignment(&[(x(0), 1)])), Some(false));
        assert_eq!(factory.remaining(), 0);
    }

    #[test]
    fn test_unsafe_at_base_level() {
        // entry: x = 0, loop: x' = x + 1, exit: x = 1
        let mut table = PredicateTable::new();
        let l = table.intern("L", &[Sort::Int]);
        let graph = DirectedGraph::new(
            table,
            vec![
                (ENTRY, l, Term::equals(Term::var(&x(1)), Term::Int(0))),
                (
                    l,
                    l,
                    Term::equals(
                        Term::var(&x(1)),
                        Term::num_op(NumOp::Add, Term::var(&x(0)), Term::Int(1)),
                    ),
                ),
                (l, EXIT, Term::equals(Term::var(&x(0)), Term::Int(1))),
            ],
        );
        let system = to_transition_system(&graph).unwrap();
        let factory = ScriptedFactory::new();
        factory.script(
            "accel-check",
            [
                // initial states are non-empty
                ScriptEntry::Sat(assignment(&[(x(0), 0)])),
                // no zero-step counterexample
                ScriptEntry::Unsat(None),
                // a one-step counterexample
                ScriptEntry::Sat(assignment(&[(x(0), 0), (x(1), 1)])),
            ],
        );
        let options = EngineOptions::default();
        let engine = AccelSingle::new(&factory, &options);
        let result = engine.solve_transition_system(&system, &graph);
        assert_eq!(result.answer, VerificationAnswer::Unsafe);
        let Some(Witness::Invalidity(witness)) = result.witness else {
            panic!("missing counterexample");
        };
        assert_eq!(witness.length(), 1);
        assert_eq!(witness.validate(&graph), Ok(()));
        assert_eq!(factory.remaining(), 0);
    }
}
