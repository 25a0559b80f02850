// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The split accelerated engine: separate exact-power and less-than-power
//! relations per level.

use fxhash::FxHashMap;

use chc::graph::DirectedGraph;
use chc::syntax::{Term, Var};
use chc::term::qelim::close_except;
use chc::term::time::{send_through_time, send_var_through_time};
use solver::basics::ContextFactory;

use crate::options::EngineOptions;
use crate::result::{
    InvalidityWitness, ValidityWitness, VerificationResult,
};
use crate::ts::TransitionSystem;

use super::{join_traces, AccelCore, Outcome, QueryResult, SolverWrapper, Stop, Trace, Want};

/// The split accelerated engine.
pub struct AccelSplit<'a, F: ContextFactory> {
    factory: &'a F,
    options: &'a EngineOptions,
}

impl<'a, F: ContextFactory> AccelSplit<'a, F> {
    /// Create a split accelerated engine.
    pub fn new(factory: &'a F, options: &'a EngineOptions) -> Self {
        AccelSplit { factory, options }
    }

    /// Decide reachability of the query by power-doubling acceleration.
    pub fn solve_transition_system(
        &self,
        system: &TransitionSystem,
        graph: &DirectedGraph,
    ) -> VerificationResult {
        let mut run = SplitRun::new(self.factory, self.options, system);
        match run.run(graph) {
            Ok(result) => result,
            Err(stop) => stop.into_result(),
        }
    }
}

type QueryCache = FxHashMap<(Term, Term), QueryResult>;

struct SplitRun<'a, F: ContextFactory> {
    core: AccelCore<'a, F>,
    // level 0 is the concrete transition relation / the identity; levels
    // above hold the interpolant conjunctions refined so far
    exact_powers: Vec<Term>,
    less_than_powers: Vec<Term>,
    exact_solvers: Vec<Option<SolverWrapper<F::Ctx>>>,
    lt_solvers: Vec<Option<SolverWrapper<F::Ctx>>>,
    exact_cache: Vec<QueryCache>,
    lt_cache: Vec<QueryCache>,
}

impl<'a, F: ContextFactory> SplitRun<'a, F> {
    fn new(factory: &'a F, options: &'a EngineOptions, system: &TransitionSystem) -> Self {
        let core = AccelCore::new(factory, options, system);
        SplitRun {
            exact_powers: vec![core.transition.clone()],
            less_than_powers: vec![core.identity.clone()],
            exact_solvers: vec![None],
            lt_solvers: vec![None],
            exact_cache: vec![QueryCache::default()],
            lt_cache: vec![QueryCache::default()],
            core,
        }
    }

    /// Materialise levels up to `n`: each level's solvers hold the two-step
    /// composition of the level below.
    fn ensure_level(&mut self, n: u32) -> Result<(), Stop> {
        while self.exact_powers.len() <= n as usize {
            let m = self.exact_powers.len();
            let exact_comp = self.core.two_step(&self.exact_powers[m - 1].clone());
            let ctx = self.core.factory.context(&format!("accel-exact-{m}"))?;
            self.exact_solvers
                .push(Some(SolverWrapper::new(ctx, &exact_comp)?));

            let identity = self.core.identity.clone();
            let id12 = self.core.shift(&identity, 1);
            let step12 = self.core.shift(&self.exact_powers[m - 1].clone(), 1);
            let lt_comp = Term::and([
                self.less_than_powers[m - 1].clone(),
                Term::or([id12, step12]),
            ]);
            let ctx = self.core.factory.context(&format!("accel-lt-{m}"))?;
            self.lt_solvers
                .push(Some(SolverWrapper::new(ctx, &lt_comp)?));

            self.exact_powers.push(Term::Literal(true));
            self.less_than_powers.push(Term::Literal(true));
            self.exact_cache.push(QueryCache::default());
            self.lt_cache.push(QueryCache::default());
        }
        Ok(())
    }

    /// Conjoin a refinement to `Exact(n)`, keeping every solver that embeds
    /// a copy of it consistent.
    fn strengthen_exact(&mut self, n: usize, delta: &Term) -> Result<(), Stop> {
        self.exact_powers[n] = Term::and([self.exact_powers[n].clone(), delta.clone()]);
        let endpoints = self.core.shift_only_next_vars(delta);
        if let Some(w) = self.exact_solvers[n].as_mut() {
            w.strengthen_transition(&endpoints)?;
        }
        if n + 1 < self.exact_powers.len() {
            let second = self.core.shift(delta, 1);
            if let Some(w) = self.exact_solvers[n + 1].as_mut() {
                w.strengthen_transition(&Term::and([delta.clone(), second.clone()]))?;
            }
            let identity = self.core.identity.clone();
            let id12 = self.core.shift(&identity, 1);
            if let Some(w) = self.lt_solvers[n + 1].as_mut() {
                w.strengthen_transition(&Term::or([id12, second]))?;
            }
        }
        Ok(())
    }

    /// Conjoin a refinement to `LT(n)`.
    fn strengthen_less_than(&mut self, n: usize, delta: &Term) -> Result<(), Stop> {
        self.less_than_powers[n] = Term::and([self.less_than_powers[n].clone(), delta.clone()]);
        let endpoints = self.core.shift_only_next_vars(delta);
        if let Some(w) = self.lt_solvers[n].as_mut() {
            w.strengthen_transition(&endpoints)?;
        }
        if n + 1 < self.less_than_powers.len() {
            if let Some(w) = self.lt_solvers[n + 1].as_mut() {
                w.strengthen_transition(delta)?;
            }
        }
        Ok(())
    }

    /// Is `to` reachable from `from` in exactly `2ⁿ` steps? A satisfiable
    /// level query is only believed after both halves validate recursively;
    /// a refuted half strengthens the level below and the query is retried.
    fn reachability_query_exact(
        &mut self,
        from: &Term,
        to: &Term,
        n: usize,
    ) -> Result<QueryResult, Stop> {
        if n == 0 {
            return self.core.reachability_exact_one_step(from, to);
        }
        let key = (from.clone(), to.clone());
        if let Some(cached) = self.exact_cache[n].get(&key) {
            return Ok(cached.clone());
        }
        for _ in 0..self.core.options.max_refinements {
            self.core.tick()?;
            let goal = self.core.shift(to, 2);
            let query = Term::and([from.clone(), goal]);
            let outcome = self.exact_solvers[n]
                .as_mut()
                .unwrap()
                .check_consistent(&query, Want::ModelAndInterpolant)?;
            match outcome {
                Outcome::Inconsistent(itp) => {
                    if let Some(delta) = itp.and_then(|i| self.core.usable_interpolant(&i)) {
                        self.strengthen_exact(n, &delta)?;
                    }
                    self.exact_cache[n].insert(key, QueryResult::Unreachable);
                    return Ok(QueryResult::Unreachable);
                }
                Outcome::Consistent(model) => {
                    let mid = self.core.extract_mid_point(&model, 1);
                    let first = self.reachability_query_exact(from, &mid, n - 1)?;
                    let QueryResult::Reachable {
                        refined: refined_mid,
                        steps: s1,
                        trace: t1,
                    } = first
                    else {
                        continue;
                    };
                    let second = self.reachability_query_exact(&refined_mid, to, n - 1)?;
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
                    self.exact_cache[n].insert(key, result.clone());
                    return Ok(result);
                }
            }
        }
        Err(Stop::Solver(
            "refinement budget exhausted in exact reachability".to_string(),
        ))
    }

    /// Is `to` reachable from `from` in fewer than `2ⁿ` steps?
    fn reachability_query_less_than(
        &mut self,
        from: &Term,
        to: &Term,
        n: usize,
    ) -> Result<QueryResult, Stop> {
        if n == 0 {
            return self.core.reachability_exact_zero_step(from, to);
        }
        let key = (from.clone(), to.clone());
        if let Some(cached) = self.lt_cache[n].get(&key) {
            return Ok(cached.clone());
        }
        for _ in 0..self.core.options.max_refinements {
            self.core.tick()?;
            let goal = self.core.shift(to, 2);
            let query = Term::and([from.clone(), goal]);
            let outcome = self.lt_solvers[n]
                .as_mut()
                .unwrap()
                .check_consistent(&query, Want::ModelAndInterpolant)?;
            match outcome {
                Outcome::Inconsistent(itp) => {
                    if let Some(delta) = itp.and_then(|i| self.core.usable_interpolant(&i)) {
                        self.strengthen_less_than(n, &delta)?;
                    }
                    self.lt_cache[n].insert(key, QueryResult::Unreachable);
                    return Ok(QueryResult::Unreachable);
                }
                Outcome::Consistent(model) => {
                    let mid = self.core.extract_mid_point(&model, 1);
                    let first = self.reachability_query_less_than(from, &mid, n - 1)?;
                    let QueryResult::Reachable {
                        refined: refined_mid,
                        steps: s1,
                        trace: t1,
                    } = first
                    else {
                        continue;
                    };
                    // the second half of the composition is the identity or
                    // one exact power; try what the model suggests first
                    if self.core.state_assignment(&model, 1) == self.core.state_assignment(&model, 2)
                    {
                        if let QueryResult::Reachable {
                            refined,
                            steps: _,
                            trace: t2,
                        } = self.core.reachability_exact_zero_step(&refined_mid, to)?
                        {
                            let result = QueryResult::Reachable {
                                refined,
                                steps: s1,
                                trace: join_traces(t1.clone(), t2),
                            };
                            self.lt_cache[n].insert(key, result.clone());
                            return Ok(result);
                        }
                    }
                    let second = self.reachability_query_exact(&refined_mid, to, n - 1)?;
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
                    self.lt_cache[n].insert(key, result.clone());
                    return Ok(result);
                }
            }
        }
        Err(Stop::Solver(
            "refinement budget exhausted in less-than reachability".to_string(),
        ))
    }

    /// Audit that the stored `LT(n)` over-approximates the level's
    /// composition; a gap is repaired by strengthening the level below, and
    /// a genuine composition run outside the stored relation is a bug.
    fn verify_less_than_power(&mut self, n: usize) -> Result<(), Stop> {
        for _ in 0..self.core.options.max_refinements {
            self.core.tick()?;
            let stored = self.less_than_powers[n].clone();
            let audit = Term::negate(self.core.shift_only_next_vars(&stored));
            let outcome = self.lt_solvers[n]
                .as_mut()
                .unwrap()
                .check_consistent(&audit, Want::Model)?;
            let Outcome::Consistent(model) = outcome else {
                return Ok(());
            };
            let s0 = self.core.extract_mid_point(&model, 0);
            let s1 = self.core.extract_mid_point(&model, 1);
            let s2 = self.core.extract_mid_point(&model, 2);
            let first = self.reachability_query_less_than(&s0, &s1, n - 1)?;
            let QueryResult::Reachable { refined, .. } = first else {
                continue;
            };
            if self.core.state_assignment(&model, 1) == self.core.state_assignment(&model, 2)
                && self
                    .core
                    .reachability_exact_zero_step(&refined, &s2)?
                    .is_reachable()
            {
                panic!("internal error: less-than relation at level {n} excludes a real run");
            }
            if self
                .reachability_query_exact(&refined, &s2, n - 1)?
                .is_reachable()
            {
                panic!("internal error: less-than relation at level {n} excludes a real run");
            }
        }
        Err(Stop::Solver(
            "refinement budget exhausted while verifying a less-than power".to_string(),
        ))
    }

    /// The exact-power counterpart of [`Self::verify_less_than_power`].
    fn verify_exact_power(&mut self, n: usize) -> Result<(), Stop> {
        for _ in 0..self.core.options.max_refinements {
            self.core.tick()?;
            let stored = self.exact_powers[n].clone();
            let audit = Term::negate(self.core.shift_only_next_vars(&stored));
            let outcome = self.exact_solvers[n]
                .as_mut()
                .unwrap()
                .check_consistent(&audit, Want::Model)?;
            let Outcome::Consistent(model) = outcome else {
                return Ok(());
            };
            let s0 = self.core.extract_mid_point(&model, 0);
            let s1 = self.core.extract_mid_point(&model, 1);
            let s2 = self.core.extract_mid_point(&model, 2);
            let first = self.reachability_query_exact(&s0, &s1, n - 1)?;
            let QueryResult::Reachable { refined, .. } = first else {
                continue;
            };
            if self
                .reachability_query_exact(&refined, &s2, n - 1)?
                .is_reachable()
            {
                panic!("internal error: exact relation at level {n} excludes a real run");
            }
        }
        Err(Stop::Solver(
            "refinement budget exhausted while verifying an exact power".to_string(),
        ))
    }

    /// `LT(n) ∘ Tr ⊆ LT(n)`: together with the query exclusion established
    /// by the caller, the reachable states within `LT(n)` form an inductive
    /// invariant.
    fn check_less_than_fixed_point(&mut self, n: usize) -> Result<bool, Stop> {
        let lt = self.less_than_powers[n].clone();
        let tr12 = {
            let tr = self.core.transition.clone();
            self.core.shift(&tr, 1)
        };
        let not_lt = Term::negate(self.core.shift_only_next_vars(&lt));
        let closure = Term::and([lt, tr12, not_lt]);
        Ok(self.core.check_scratch(&closure)?.is_none())
    }

    /// `LT(n) ∘ Exact(n) ⊆ LT(n)`: composing one more exact power reaches
    /// nothing new, so `LT(n)` covers runs of every length.
    fn check_exact_fixed_point(&mut self, n: usize) -> Result<bool, Stop> {
        let lt = self.less_than_powers[n].clone();
        let exact12 = {
            let exact = self.exact_powers[n].clone();
            self.core.shift(&exact, 1)
        };
        let not_lt = Term::negate(self.core.shift_only_next_vars(&lt));
        let closure = Term::and([lt, exact12, not_lt]);
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

    /// The inductive invariant of a fixed point at level `n`: the image of
    /// `Init` under `LT(n)`, cast to state variables.
    fn invariant_from_level(&self, n: usize) -> Term {
        let reach = Term::and([
            self.core.init.clone(),
            self.less_than_powers[n].clone(),
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
        match self.core.reachability_exact_zero_step(&init, &query)? {
            QueryResult::Reachable { trace, .. } => {
                log::info!("ACCEL: bug found in depth 0");
                return self.unsafe_result(graph, trace);
            }
            QueryResult::Unreachable => {}
        }
        for n in 1..=self.core.options.max_power {
            log::debug!("ACCEL: entering power level {n}");
            self.ensure_level(n)?;
            let n = n as usize;
            self.verify_less_than_power(n)?;
            self.verify_exact_power(n)?;
            match self.reachability_query_less_than(&init, &query, n)? {
                QueryResult::Reachable { steps, trace, .. } => {
                    log::info!("ACCEL: bug found in depth {steps}");
                    return self.unsafe_result(graph, trace);
                }
                QueryResult::Unreachable => {}
            }
            // both fixed points conclude SAFE only when the strengthened
            // relation itself keeps Init away from Bad
            let lt = self.less_than_powers[n].clone();
            if self.excludes_query(&lt)? {
                if self.check_less_than_fixed_point(n)? {
                    log::info!("ACCEL: less-than fixed point at level {n}");
                    return Ok(self.safe_result(graph, Some(n)));
                }
                if self.check_exact_fixed_point(n)? {
                    log::info!("ACCEL: exact fixed point at level {n}");
                    return Ok(self.safe_result(graph, Some(n)));
                }
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
    use chc::syntax::{NumOp, NumRel, Sort};
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

    /// entry: x = 0, loop: x' = x, exit: x = 1. Stabilises at level 1.
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
    fn test_safe_by_less_than_fixed_point() {
        let graph = stutter_graph();
        let system = to_transition_system(&graph).unwrap();
        let factory = ScriptedFactory::new();
        // the interpolant the level-1 less-than solver reports: "x does not
        // change", which is pure transition after cleaning 2 -> 1
        let itp = Term::equals(Term::var(&x(2)), Term::var(&x(0)));
        factory.script(
            "accel-check",
            [
                // initial states are non-empty
                ScriptEntry::Sat(assignment(&[(x(0), 0)])),
                // no zero-step counterexample
                ScriptEntry::Unsat(None),
                // fixed point: Init ∧ LT(1) ∧ Bad' unsat
                ScriptEntry::Unsat(None),
                // fixed point: LT(1) ∘ Tr ⊆ LT(1)
                ScriptEntry::Unsat(None),
            ],
        );
        factory.script(
            "accel-lt-1",
            [
                // audit of the trivial stored relation passes
                ScriptEntry::Unsat(None),
                // Init cannot reach Bad within the composition
                ScriptEntry::Unsat(Some(itp)),
            ],
        );
        factory.script("accel-exact-1", [ScriptEntry::Unsat(None)]);

        let options = EngineOptions::default();
        let engine = AccelSplit::new(&factory, &options);
        let result = engine.solve_transition_system(&system, &graph);
        assert_eq!(result.answer, VerificationAnswer::Safe);
        let Some(Witness::Validity(witness)) = result.witness else {
            panic!("missing invariant witness");
        };
        let l = graph.predicates().lookup("L").unwrap();
        let inv = &witness.invariants[&l];
        // the invariant keeps the initial state and excludes the bad one
        assert_eq!(holds(inv, &assignment(&[(x(0), 0)])), Some(true));
        assert_eq!(holds(inv, &assignment(&[(x(0), 1)])), Some(false));
        assert_eq!(factory.remaining(), 0);
    }

    /// entry: x = 0, loop: x' = x + 1, exit: x = 2. Counterexample found at
    /// level 2 by splitting through mid-points.
    fn counter_to_two() -> DirectedGraph {
        let mut table = PredicateTable::new();
        let l = table.intern("L", &[Sort::Int]);
        DirectedGraph::new(
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
                (l, EXIT, Term::equals(Term::var(&x(0)), Term::Int(2))),
            ],
        )
    }

    #[test]
    fn test_unsafe_with_midpoint_splitting() {
        let graph = counter_to_two();
        let system = to_transition_system(&graph).unwrap();
        let factory = ScriptedFactory::new();
        // level 1 refutes the target within two composed steps and reports
        // an interpolant bounding the step distance
        let lt1_itp = Term::num_rel(
            NumRel::Leq,
            Term::var(&x(2)),
            Term::num_op(NumOp::Add, Term::var(&x(0)), Term::Int(1)),
        );
        factory.script(
            "accel-check",
            [
                // initial states are non-empty
                ScriptEntry::Sat(assignment(&[(x(0), 0)])),
                // no zero-step counterexample
                ScriptEntry::Unsat(None),
                // level 1: the strengthened relation excludes Init -> Bad
                ScriptEntry::Unsat(None),
                // level 1: the less-than closure check fails
                ScriptEntry::Sat(assignment(&[])),
                // level 1: the exact closure check fails
                ScriptEntry::Sat(assignment(&[])),
                // level 2, validating the first half (init to mid 0):
                // zero-step init ∧ mid
                ScriptEntry::Sat(assignment(&[(x(0), 0)])),
                // zero-step from the refined mid to itself
                ScriptEntry::Sat(assignment(&[(x(0), 0)])),
                // second half, one-step runs of the exact-1 validation:
                // 0 -> 1
                ScriptEntry::Sat(assignment(&[(x(0), 0), (x(1), 1)])),
                // 1 -> 2
                ScriptEntry::Sat(assignment(&[(x(0), 1), (x(1), 2)])),
            ],
        );
        factory.script(
            "accel-lt-1",
            [
                // audit passes
                ScriptEntry::Unsat(None),
                // init cannot reach x = 2 in fewer than two steps
                ScriptEntry::Unsat(Some(lt1_itp)),
                // level-2 validation: init reaches the mid point below level 2
                ScriptEntry::Sat(assignment(&[(x(0), 0), (x(1), 0), (x(2), 0)])),
            ],
        );
        factory.script(
            "accel-exact-1",
            [
                // audit passes
                ScriptEntry::Unsat(None),
                // exact-1 query 0 -> 2 during the level-2 validation: the
                // concrete two-step composition is satisfiable through 1
                ScriptEntry::Sat(assignment(&[(x(0), 0), (x(1), 1), (x(2), 2)])),
            ],
        );
        factory.script(
            "accel-lt-2",
            [
                // audit passes
                ScriptEntry::Unsat(None),
                // level-2 less-than query is satisfiable: mid stays at the
                // initial state, the exact half covers the two steps
                ScriptEntry::Sat(assignment(&[(x(0), 0), (x(1), 0), (x(2), 2)])),
            ],
        );
        factory.script("accel-exact-2", [ScriptEntry::Unsat(None)]);

        let options = EngineOptions::default();
        let engine = AccelSplit::new(&factory, &options);
        let result = engine.solve_transition_system(&system, &graph);
        assert_eq!(result.answer, VerificationAnswer::Unsafe);
        let Some(Witness::Invalidity(witness)) = result.witness else {
            panic!("missing counterexample");
        };
        assert_eq!(witness.length(), 2);
        assert_eq!(witness.validate(&graph), Ok(()));
        assert_eq!(factory.remaining(), 0);
    }

    #[test]
    fn test_cleaned_interpolants_are_pure_transition() {
        let graph = stutter_graph();
        let system = to_transition_system(&graph).unwrap();
        let options = EngineOptions::default();
        let factory = ScriptedFactory::new();
        let run = SplitRun::new(&factory, &options, &system);
        let itp = Term::and([
            Term::equals(Term::var(&x(2)), Term::var(&x(0))),
            Term::num_rel(NumRel::Geq, Term::var(&x(0)), Term::Int(0)),
        ]);
        let cleaned = run.core.usable_interpolant(&itp).unwrap();
        assert!(crate::ts::is_pure_transition_formula(
            run.core.state_vars.as_slice(),
            &cleaned
        ));
        assert_eq!(
            cleaned,
            Term::and([
                Term::equals(Term::var(&x(1)), Term::var(&x(0))),
                Term::num_rel(NumRel::Geq, Term::var(&x(0)), Term::Int(0)),
            ])
        );
    }
}
