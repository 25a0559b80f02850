// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Verification results and witnesses.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use chc::graph::{DirectedGraph, EdgeId, SymbolId, ENTRY, EXIT};
use chc::semantics::{holds, Assignment};
use chc::syntax::Term;
use chc::term::time::send_var_through_time;

/// The three-valued verdict of a solve call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum VerificationAnswer {
    /// The query state is unreachable
    Safe,
    /// The query state is reachable
    Unsafe,
    /// The engine could not decide
    Unknown,
}

/// Why an engine answered UNKNOWN.
#[derive(Error, Debug, Clone, Serialize)]
pub enum Diagnostic {
    /// The rewritten graph is not a transition system
    #[error("unsupported fragment: {0}")]
    UnsupportedFragment(String),
    /// The underlying solver failed or gave up
    #[error("solver failure: {0}")]
    SolverFailure(String),
}

/// For UNSAFE: one step of a counterexample path, an edge together with a
/// model of its label.
#[derive(Debug, Clone)]
pub struct WitnessStep {
    /// The edge taken
    pub edge: EdgeId,
    /// A model of the edge label; keys follow the label's variable
    /// conventions (state version of the source, next-state version of the
    /// target, auxiliaries as-is)
    pub model: Assignment,
}

/// A counterexample: a path from `entry` to `exit` with per-step models.
#[derive(Debug, Clone, Default)]
pub struct InvalidityWitness {
    /// The steps of the path, entry edge first, exit edge last
    pub steps: Vec<WitnessStep>,
}

/// An inductive invariant, one pure-state formula per vertex.
#[derive(Debug, Clone, Default)]
pub struct ValidityWitness {
    /// Interpretation of each predicate over its canonical state variables
    pub invariants: BTreeMap<SymbolId, Term>,
}

/// A witness for either verdict.
#[derive(Debug, Clone)]
pub enum Witness {
    /// An inductive invariant establishing SAFE
    Validity(ValidityWitness),
    /// A counterexample path establishing UNSAFE
    Invalidity(InvalidityWitness),
}

/// The result of a solve call.
#[derive(Debug)]
pub struct VerificationResult {
    /// The verdict
    pub answer: VerificationAnswer,
    /// The witness, when requested and available
    pub witness: Option<Witness>,
    /// Diagnostic information for UNKNOWN verdicts
    pub diagnostic: Option<Diagnostic>,
}

impl VerificationResult {
    /// A SAFE verdict without a witness.
    pub fn safe() -> Self {
        VerificationResult {
            answer: VerificationAnswer::Safe,
            witness: None,
            diagnostic: None,
        }
    }

    /// A SAFE verdict with an invariant witness.
    pub fn safe_with(witness: ValidityWitness) -> Self {
        VerificationResult {
            answer: VerificationAnswer::Safe,
            witness: Some(Witness::Validity(witness)),
            diagnostic: None,
        }
    }

    /// An UNSAFE verdict without a witness.
    pub fn unsafe_() -> Self {
        VerificationResult {
            answer: VerificationAnswer::Unsafe,
            witness: None,
            diagnostic: None,
        }
    }

    /// An UNSAFE verdict with a counterexample witness.
    pub fn unsafe_with(witness: InvalidityWitness) -> Self {
        VerificationResult {
            answer: VerificationAnswer::Unsafe,
            witness: Some(Witness::Invalidity(witness)),
            diagnostic: None,
        }
    }

    /// An UNKNOWN verdict carrying a diagnostic.
    pub fn unknown(diagnostic: Diagnostic) -> Self {
        VerificationResult {
            answer: VerificationAnswer::Unknown,
            witness: None,
            diagnostic: Some(diagnostic),
        }
    }
}

/// A counterexample of a transition system, before it is rendered as a graph
/// path: the visited states and the auxiliary choices of each step.
#[derive(Debug, Clone, Default)]
pub struct TsPath {
    /// Assignments to the state variables (state version), one per visited
    /// state; `states.len()` is the path length plus one
    pub states: Vec<Assignment>,
    /// Assignments to the transition auxiliaries, one per step
    pub step_aux: Vec<Assignment>,
    /// Assignment to the auxiliaries of the initial-edge label
    pub entry_aux: Assignment,
    /// Assignment to the auxiliaries of the query-edge label
    pub exit_aux: Assignment,
}

impl TsPath {
    /// Number of transition steps.
    pub fn length(&self) -> usize {
        self.states.len().saturating_sub(1)
    }

    /// Read a counterexample path off a model of the k-unrolling
    /// `Init(X₀) ∧ Tr(X₀,X₁) ∧ … ∧ Tr(X_{k-1},X_k) ∧ Bad(X_k)`.
    pub fn from_unrolling_model(
        system: &crate::ts::TransitionSystem,
        model: &Assignment,
        k: usize,
    ) -> TsPath {
        use chc::term::fo::free_vars;
        let state: std::collections::BTreeSet<&chc::syntax::Var> =
            system.state_vars().iter().collect();
        let next: std::collections::BTreeSet<&chc::syntax::Var> =
            system.next_vars().iter().collect();
        let aux_of = |t: &Term| -> Vec<chc::syntax::Var> {
            free_vars(t)
                .into_iter()
                .filter(|v| !state.contains(v) && !next.contains(v))
                .collect()
        };
        let read = |vars: &[chc::syntax::Var], shift: i32| -> Assignment {
            vars.iter()
                .filter_map(|v| {
                    model
                        .get(&send_var_through_time(v, shift))
                        .map(|val| (v.clone(), *val))
                })
                .collect()
        };
        let states = (0..=k)
            .map(|i| read(system.state_vars(), i as i32))
            .collect();
        let tr_aux = aux_of(system.transition());
        let step_aux = (0..k).map(|i| read(&tr_aux, i as i32)).collect();
        TsPath {
            states,
            step_aux,
            entry_aux: read(&aux_of(system.init()), 0),
            exit_aux: read(&aux_of(system.query()), k as i32),
        }
    }
}

/// The three edges of a transition-system shaped graph.
fn ts_edges(graph: &DirectedGraph) -> Option<(EdgeId, EdgeId, EdgeId)> {
    let mut init = None;
    let mut step = None;
    let mut query = None;
    for edge in graph.edges() {
        if edge.from == ENTRY {
            init = Some(edge.id);
        } else if edge.from == edge.to {
            step = Some(edge.id);
        } else if edge.to == EXIT {
            query = Some(edge.id);
        }
    }
    Some((init?, step?, query?))
}

impl InvalidityWitness {
    /// Render a transition-system counterexample as a path in the graph the
    /// system was extracted from.
    pub fn from_transition_system(graph: &DirectedGraph, path: TsPath) -> Option<Self> {
        let (init_edge, step_edge, query_edge) = ts_edges(graph)?;
        let shift_state = |a: &Assignment, delta: i32| -> Assignment {
            a.iter()
                .map(|(v, val)| (send_var_through_time(v, delta), *val))
                .collect()
        };
        let mut steps = vec![];
        // the init label speaks of the loop vertex in its next-state version
        let mut entry_model = shift_state(path.states.first()?, 1);
        entry_model.extend(path.entry_aux.clone());
        steps.push(WitnessStep {
            edge: init_edge,
            model: entry_model,
        });
        for (i, aux) in path.step_aux.iter().enumerate() {
            let mut model = path.states[i].clone();
            model.extend(shift_state(&path.states[i + 1], 1));
            model.extend(aux.clone());
            steps.push(WitnessStep {
                edge: step_edge,
                model,
            });
        }
        let mut exit_model = path.states.last()?.clone();
        exit_model.extend(path.exit_aux.clone());
        steps.push(WitnessStep {
            edge: query_edge,
            model: exit_model,
        });
        Some(InvalidityWitness { steps })
    }

    /// The number of transition steps (excluding the entry and exit edges).
    pub fn length(&self) -> usize {
        self.steps.len().saturating_sub(2)
    }

    /// Check that every step's model satisfies its edge label. Returns the
    /// index of the first failing step.
    pub fn validate(&self, graph: &DirectedGraph) -> Result<(), usize> {
        for (i, step) in self.steps.iter().enumerate() {
            let label = &graph.edge(step.edge).label;
            if holds(label, &step.model) != Some(true) {
                return Err(i);
            }
        }
        Ok(())
    }
}

impl ValidityWitness {
    /// The invariant witness of a solved transition system: the discovered
    /// invariant at the loop vertex, `true` at `entry` and `false` at `exit`.
    pub fn from_transition_system(graph: &DirectedGraph, invariant: Term) -> Self {
        let mut invariants = BTreeMap::new();
        for sym in graph.vertices() {
            let interp = match sym {
                ENTRY => Term::Literal(true),
                EXIT => Term::Literal(false),
                _ => invariant.clone(),
            };
            invariants.insert(sym, interp);
        }
        ValidityWitness { invariants }
    }
}

impl fmt::Display for InvalidityWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "counterexample of length {}:", self.length())?;
        for step in &self.steps {
            let model = step
                .model
                .iter()
                .map(|(v, val)| format!("{v} = {val}"))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "  edge {:?}: {model}", step.edge)?;
        }
        Ok(())
    }
}

impl fmt::Display for ValidityWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "inductive invariant:")?;
        for (sym, term) in &self.invariants {
            writeln!(f, "  {:?}: {term}", sym)?;
        }
        Ok(())
    }
}
