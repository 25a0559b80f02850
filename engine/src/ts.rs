// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Transition systems and their extraction from graphs.
//!
//! A graph is a transition system when, entry and exit aside, a single vertex
//! remains and the edges are exactly `entry → L`, `L → L`, `L → exit`. The
//! extracted system is written over the loop vertex's canonical arguments:
//! the state vector `X` at time index 0 and its next-state copy `X'` at
//! index 1. Auxiliary variables of the labels keep index 0 and are shifted
//! along when an unrolling is built.

use std::collections::BTreeSet;

use thiserror::Error;

use chc::graph::{DirectedGraph, EdgeId, SymbolId};
use chc::syntax::{Term, Var};
use chc::term::fo::free_vars;
use chc::term::subst::{renaming, substitute};
use chc::term::time::send_var_through_time;

/// A transition system `(X, X', A, Init(X), Tr(X, X', A), Bad(X))`.
#[derive(Debug, Clone)]
pub struct TransitionSystem {
    state_vars: Vec<Var>,
    next_vars: Vec<Var>,
    aux_vars: Vec<Var>,
    init: Term,
    transition: Term,
    query: Term,
}

/// A malformed transition system.
#[derive(Error, Debug)]
pub enum SystemError {
    /// A formula mentions a versioned variable at an unexpected time index
    #[error("{formula} formula has a variable at an unexpected time index")]
    BadVersion {
        /// Which formula is at fault
        formula: &'static str,
    },
}

impl TransitionSystem {
    /// Build a transition system over the given state vector, validating the
    /// version discipline: `init` and `query` live at time index 0, the
    /// transition at indices 0 and 1, and every index-1 variable of the
    /// transition belongs to the state vector.
    pub fn new(
        state_vars: Vec<Var>,
        init: Term,
        transition: Term,
        query: Term,
    ) -> Result<Self, SystemError> {
        if !is_state_formula(&init) {
            return Err(SystemError::BadVersion { formula: "init" });
        }
        if !is_state_formula(&query) {
            return Err(SystemError::BadVersion { formula: "query" });
        }
        let next_vars: Vec<Var> = state_vars
            .iter()
            .map(|v| send_var_through_time(v, 1))
            .collect();
        let next_set: BTreeSet<&Var> = next_vars.iter().collect();
        let state_set: BTreeSet<&Var> = state_vars.iter().collect();
        let mut aux_vars = BTreeSet::new();
        for v in free_vars(&transition) {
            match v.index {
                Some(0) => {
                    if !state_set.contains(&v) {
                        aux_vars.insert(v);
                    }
                }
                Some(1) => {
                    if !next_set.contains(&v) {
                        return Err(SystemError::BadVersion {
                            formula: "transition",
                        });
                    }
                }
                _ => {
                    return Err(SystemError::BadVersion {
                        formula: "transition",
                    })
                }
            }
        }
        for v in free_vars(&init).into_iter().chain(free_vars(&query)) {
            if !state_set.contains(&v) {
                aux_vars.insert(v);
            }
        }
        Ok(TransitionSystem {
            state_vars,
            next_vars,
            aux_vars: aux_vars.into_iter().collect(),
            init,
            transition,
            query,
        })
    }

    /// The state vector `X`.
    pub fn state_vars(&self) -> &[Var] {
        &self.state_vars
    }

    /// The next-state vector `X'`.
    pub fn next_vars(&self) -> &[Var] {
        &self.next_vars
    }

    /// The auxiliary variables of the three formulas.
    pub fn aux_vars(&self) -> &[Var] {
        &self.aux_vars
    }

    /// The initial-states formula `Init(X)`.
    pub fn init(&self) -> &Term {
        &self.init
    }

    /// The transition relation `Tr(X, X')`.
    pub fn transition(&self) -> &Term {
        &self.transition
    }

    /// The unsafe-states formula `Bad(X)`.
    pub fn query(&self) -> &Term {
        &self.query
    }

    /// The transition relation with `X` and `X'` exchanged.
    pub fn reverse_transition_relation(&self) -> Term {
        let mut sub = renaming(&self.state_vars, &self.next_vars);
        sub.extend(renaming(&self.next_vars, &self.state_vars));
        substitute(&self.transition, &sub)
    }

    /// The reversed system: `Init` and `Bad` swapped, transition reversed.
    pub fn reverse(&self) -> TransitionSystem {
        TransitionSystem {
            state_vars: self.state_vars.clone(),
            next_vars: self.next_vars.clone(),
            aux_vars: self.aux_vars.clone(),
            init: self.query.clone(),
            transition: self.reverse_transition_relation(),
            query: self.init.clone(),
        }
    }
}

/// Whether every versioned free variable of `t` has time index 0.
pub fn is_state_formula(t: &Term) -> bool {
    free_vars(t)
        .iter()
        .all(|v| v.index.is_none() || v.index == Some(0))
}

/// Whether `t` is a pure state formula over the state vector `X`: every
/// versioned free variable is in `X`.
pub fn is_pure_state_formula(state_vars: &[Var], t: &Term) -> bool {
    let state: BTreeSet<&Var> = state_vars.iter().collect();
    free_vars(t)
        .iter()
        .all(|v| v.index.is_none() || state.contains(v))
}

/// Whether `t` is a pure transition formula over `X` and `X'`: every
/// versioned free variable projects to `X` (at index 0) or `X'` (at 1).
pub fn is_pure_transition_formula(state_vars: &[Var], t: &Term) -> bool {
    let state: BTreeSet<&Var> = state_vars.iter().collect();
    let next: BTreeSet<Var> = state_vars
        .iter()
        .map(|v| send_var_through_time(v, 1))
        .collect();
    free_vars(t)
        .iter()
        .all(|v| v.index.is_none() || state.contains(v) || next.contains(v))
}

/// The loop vertex of a transition-system shaped graph, if the graph has the
/// shape: a single non-terminal vertex `L` whose edges are exactly
/// `entry → L`, `L → L`, and `L → exit`.
fn loop_vertex(graph: &DirectedGraph) -> Option<SymbolId> {
    let non_terminal: Vec<SymbolId> = graph
        .vertices()
        .into_iter()
        .filter(|&v| !graph.predicates().is_terminal(v))
        .collect();
    if non_terminal.len() != 1 {
        return None;
    }
    let l = non_terminal[0];
    if graph.edge_count() != 3 {
        return None;
    }
    let mut init = 0;
    let mut step = 0;
    let mut query = 0;
    for edge in graph.edges() {
        if edge.from == graph.entry() && edge.to == l {
            init += 1;
        } else if edge.from == l && edge.to == l {
            step += 1;
        } else if edge.from == l && edge.to == graph.exit() {
            query += 1;
        } else {
            return None;
        }
    }
    (init == 1 && step == 1 && query == 1).then_some(l)
}

/// Whether the graph is exactly the transition-system shape.
pub fn is_transition_system(graph: &DirectedGraph) -> bool {
    loop_vertex(graph).is_some()
}

/// Whether the graph is a loop-free chain `entry → v₁ → … → vₙ → exit` with
/// every interior vertex having exactly one incoming and one outgoing edge.
pub fn is_transition_system_chain(graph: &DirectedGraph) -> bool {
    let adj = graph.adjacency();
    if adj.outgoing(graph.entry()).len() != 1 || adj.incoming(graph.exit()).len() != 1 {
        return false;
    }
    let mut seen = BTreeSet::new();
    let mut current = graph.entry();
    loop {
        let out = adj.outgoing(current);
        if out.len() != 1 {
            return false;
        }
        let edge = graph.edge(out[0]);
        if edge.to == edge.from || !seen.insert(edge.to) {
            return false;
        }
        if edge.to == graph.exit() {
            // every edge must lie on the chain
            return graph.edge_count() == seen.len();
        }
        if adj.incoming(edge.to).len() != 1 {
            return false;
        }
        current = edge.to;
    }
}

/// Materialise the transition system of a transition-system shaped graph.
///
/// `X` is the loop vertex's canonical arguments at version 0. The init label
/// speaks of the loop vertex in its next-state version and is cast down to
/// `X`; the query label is already over `X`; the self-loop label is the
/// transition relation as-is.
pub fn to_transition_system(graph: &DirectedGraph) -> Option<TransitionSystem> {
    let l = loop_vertex(graph)?;
    let mut init = None;
    let mut step = None;
    let mut query = None;
    for edge in graph.edges() {
        if edge.from == graph.entry() {
            init = Some(edge.label.clone());
        } else if edge.from == edge.to {
            step = Some(edge.label.clone());
        } else {
            query = Some(edge.label.clone());
        }
    }
    let cast_down = renaming(&graph.next_args(l), &graph.state_args(l));
    let init = substitute(&init?, &cast_down);
    let system = TransitionSystem::new(graph.state_args(l), init, step?, query?)
        .expect("transition-system labels violate the version discipline");
    Some(system)
}

/// The variables of an edge label, split into the state variables of its
/// source, the next-state variables of its target, and auxiliaries.
#[derive(Debug)]
pub struct EdgeVariables {
    /// State version of the source arguments that occur in the label
    pub state: Vec<Var>,
    /// Next-state version of the target arguments that occur in the label
    pub next: Vec<Var>,
    /// Everything else
    pub aux: Vec<Var>,
}

/// Classify the free variables of an edge's label.
pub fn edge_variables(graph: &DirectedGraph, eid: EdgeId) -> EdgeVariables {
    let edge = graph.edge(eid);
    let state: BTreeSet<Var> = graph.state_args(edge.from).into_iter().collect();
    let next: BTreeSet<Var> = graph.next_args(edge.to).into_iter().collect();
    let mut result = EdgeVariables {
        state: vec![],
        next: vec![],
        aux: vec![],
    };
    for v in free_vars(&edge.label) {
        if state.contains(&v) {
            result.state.push(v);
        } else if next.contains(&v) {
            result.next.push(v);
        } else {
            result.aux.push(v);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chc::graph::{PredicateTable, ENTRY, EXIT};
    use chc::syntax::{NumOp, NumRel, Sort};

    fn counter_graph() -> DirectedGraph {
        let mut table = PredicateTable::new();
        let l = table.intern("L", &[Sort::Int]);
        let x0 = Var::at("L.0", 0, Sort::Int);
        let x1 = Var::at("L.0", 1, Sort::Int);
        DirectedGraph::new(
            table,
            vec![
                (ENTRY, l, Term::equals(Term::var(&x1), Term::Int(0))),
                (
                    l,
                    l,
                    Term::equals(
                        Term::var(&x1),
                        Term::num_op(NumOp::Add, Term::var(&x0), Term::Int(1)),
                    ),
                ),
                (l, EXIT, Term::num_rel(NumRel::Lt, Term::var(&x0), Term::Int(0))),
            ],
        )
    }

    #[test]
    fn test_is_transition_system() {
        let graph = counter_graph();
        assert!(is_transition_system(&graph));
        assert!(!is_transition_system_chain(&graph));
    }

    #[test]
    fn test_two_loop_vertices_rejected() {
        let mut table = PredicateTable::new();
        let a = table.intern("A", &[Sort::Int]);
        let b = table.intern("B", &[Sort::Int]);
        let graph = DirectedGraph::new(
            table,
            vec![
                (ENTRY, a, Term::Literal(true)),
                (a, a, Term::Literal(true)),
                (a, b, Term::Literal(true)),
                (b, b, Term::Literal(true)),
                (b, EXIT, Term::Literal(true)),
            ],
        );
        assert!(!is_transition_system(&graph));
    }

    #[test]
    fn test_to_transition_system() {
        let graph = counter_graph();
        let ts = to_transition_system(&graph).unwrap();
        let x0 = Var::at("L.0", 0, Sort::Int);
        let x1 = Var::at("L.0", 1, Sort::Int);
        assert_eq!(ts.state_vars(), &[x0.clone()]);
        assert_eq!(ts.next_vars(), &[x1.clone()]);
        // the init label was cast from the next-state version down to X
        assert_eq!(ts.init(), &Term::equals(Term::var(&x0), Term::Int(0)));
        assert_eq!(
            ts.query(),
            &Term::num_rel(NumRel::Lt, Term::var(&x0), Term::Int(0))
        );
        assert!(ts.aux_vars().is_empty());
    }

    #[test]
    fn test_reverse_system() {
        let ts = to_transition_system(&counter_graph()).unwrap();
        let rev = ts.reverse();
        assert_eq!(rev.init(), ts.query());
        assert_eq!(rev.query(), ts.init());
        let x0 = Var::at("L.0", 0, Sort::Int);
        let x1 = Var::at("L.0", 1, Sort::Int);
        assert_eq!(
            rev.transition(),
            &Term::equals(
                Term::var(&x0),
                Term::num_op(NumOp::Add, Term::var(&x1), Term::Int(1))
            )
        );
        // reversing twice is the identity
        assert_eq!(rev.reverse().transition(), ts.transition());
    }

    #[test]
    fn test_purity_predicates() {
        let x0 = Var::at("x", 0, Sort::Int);
        let x1 = Var::at("x", 1, Sort::Int);
        let aux = Var::at("tmp", 0, Sort::Int);
        let state = vec![x0.clone()];
        let pure_state = Term::num_rel(NumRel::Geq, Term::var(&x0), Term::Int(0));
        let pure_transition = Term::equals(Term::var(&x1), Term::var(&x0));
        let with_aux = Term::equals(Term::var(&x0), Term::var(&aux));
        assert!(is_pure_state_formula(&state, &pure_state));
        assert!(!is_pure_state_formula(&state, &pure_transition));
        assert!(is_pure_transition_formula(&state, &pure_transition));
        assert!(is_pure_transition_formula(&state, &pure_state));
        assert!(!is_pure_state_formula(&state, &with_aux));
        assert!(!is_pure_transition_formula(&state, &with_aux));
        assert!(is_state_formula(&with_aux));
    }

    #[test]
    fn test_bad_version_rejected() {
        let x0 = Var::at("x", 0, Sort::Int);
        let x2 = Var::at("x", 2, Sort::Int);
        let res = TransitionSystem::new(
            vec![x0.clone()],
            Term::Literal(true),
            Term::equals(Term::var(&x2), Term::var(&x0)),
            Term::Literal(false),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_chain_detection() {
        let mut table = PredicateTable::new();
        let a = table.intern("A", &[Sort::Int]);
        let b = table.intern("B", &[Sort::Int]);
        let graph = DirectedGraph::new(
            table,
            vec![
                (ENTRY, a, Term::Literal(true)),
                (a, b, Term::Literal(true)),
                (b, EXIT, Term::Literal(true)),
            ],
        );
        assert!(is_transition_system_chain(&graph));
        assert!(!is_transition_system(&graph));
    }

    #[test]
    fn test_edge_variables() {
        let mut table = PredicateTable::new();
        let l = table.intern("L", &[Sort::Int]);
        let x0 = Var::at("L.0", 0, Sort::Int);
        let x1 = Var::at("L.0", 1, Sort::Int);
        let aux = Var::at("step", 0, Sort::Int);
        let graph = DirectedGraph::new(
            table,
            vec![(
                l,
                l,
                Term::and([
                    Term::equals(
                        Term::var(&x1),
                        Term::num_op(NumOp::Add, Term::var(&x0), Term::var(&aux)),
                    ),
                    Term::num_rel(NumRel::Gt, Term::var(&aux), Term::Int(0)),
                ]),
            )],
        );
        let eid = graph.edges().next().unwrap().id;
        let vars = edge_variables(&graph, eid);
        assert_eq!(vars.state, vec![x0]);
        assert_eq!(vars.next, vec![x1]);
        assert_eq!(vars.aux, vec![aux]);
    }
}
