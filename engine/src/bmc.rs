// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Bounded model checking over a single incrementally extended unrolling.

use chc::graph::DirectedGraph;
use chc::term::time::send_through_time;
use solver::basics::{ContextFactory, SatResult, SmtContext};

use crate::options::{Deadline, EngineOptions};
use crate::result::{
    Diagnostic, InvalidityWitness, TsPath, ValidityWitness, VerificationResult,
};
use crate::ts::TransitionSystem;

/// The BMC engine: refutation only, but every refutation comes with a
/// counterexample of minimal length.
pub struct Bmc<'a, F: ContextFactory> {
    factory: &'a F,
    options: &'a EngineOptions,
}

impl<'a, F: ContextFactory> Bmc<'a, F> {
    /// Create a BMC engine.
    pub fn new(factory: &'a F, options: &'a EngineOptions) -> Self {
        Bmc { factory, options }
    }

    /// Decide reachability of the query by incremental unrolling.
    pub fn solve_transition_system(
        &self,
        system: &TransitionSystem,
        graph: &DirectedGraph,
    ) -> VerificationResult {
        match self.run(system, graph) {
            Ok(result) => result,
            Err(reason) => VerificationResult::unknown(Diagnostic::SolverFailure(reason)),
        }
    }

    fn run(
        &self,
        system: &TransitionSystem,
        graph: &DirectedGraph,
    ) -> Result<VerificationResult, String> {
        let deadline = Deadline::start(self.options.timeout);
        let mut solver = self
            .factory
            .context("bmc")
            .map_err(|e| e.to_string())?;
        solver.assert(system.init()).map_err(|e| e.to_string())?;
        // a system with empty initial states is trivially safe
        match solver.check_sat().map_err(|e| e.to_string())? {
            SatResult::Unsat => {
                log::info!("BMC: initial states are empty");
                return Ok(self.safe(graph, chc::syntax::Term::Literal(false)));
            }
            SatResult::Unknown(reason) => return Err(reason),
            SatResult::Sat => {}
        }
        for k in 0..=self.options.max_k {
            if deadline.expired() {
                return Err("deadline exceeded".to_string());
            }
            solver.push().map_err(|e| e.to_string())?;
            solver
                .assert(&send_through_time(system.query(), k as i32))
                .map_err(|e| e.to_string())?;
            match solver.check_sat().map_err(|e| e.to_string())? {
                SatResult::Sat => {
                    log::info!("BMC: bug found in depth {k}");
                    if !self.options.compute_witness {
                        return Ok(VerificationResult::unsafe_());
                    }
                    let model = solver.get_model().map_err(|e| e.to_string())?;
                    let path = TsPath::from_unrolling_model(system, &model, k);
                    let witness = InvalidityWitness::from_transition_system(graph, path)
                        .expect("graph lost its transition-system shape");
                    return Ok(VerificationResult::unsafe_with(witness));
                }
                SatResult::Unknown(reason) => return Err(reason),
                SatResult::Unsat => {
                    log::debug!("BMC: no path of length {k}");
                }
            }
            solver.pop().map_err(|e| e.to_string())?;
            solver
                .assert(&send_through_time(system.transition(), k as i32))
                .map_err(|e| e.to_string())?;
        }
        Ok(VerificationResult::unknown(Diagnostic::SolverFailure(
            "unrolling bound exceeded".to_string(),
        )))
    }

    fn safe(&self, graph: &DirectedGraph, invariant: chc::syntax::Term) -> VerificationResult {
        if self.options.compute_witness {
            VerificationResult::safe_with(ValidityWitness::from_transition_system(
                graph, invariant,
            ))
        } else {
            VerificationResult::safe()
        }
    }
}
