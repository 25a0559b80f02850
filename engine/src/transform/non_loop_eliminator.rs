// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Eliminate vertices that carry no self-loop by contraction.

use std::collections::HashMap;

use chc::graph::{ContractionError, DirectedHyperGraph, EdgeId, SymbolId};
use chc::semantics::{eval, Assignment};
use chc::syntax::Term;
use chc::term::fo::free_vars;
use chc::term::qelim::close_except;
use chc::term::time::{send_through_time, send_var_through_time, var_version_zero};

use crate::result::{VerificationResult, Witness, WitnessStep};

use super::{label_to_normal, Transformer, WitnessBackTranslator};

/// Contracts every vertex distinct from entry, exit, and the vertices that
/// carry a self-loop: each (incoming, outgoing) pair becomes one edge whose
/// label is the conjunction of the two labels with the common vertex's
/// variables identified, then simplified by trivial quantifier elimination.
/// Contraction of a vertex adjacent to a true hyperedge fails.
pub struct NonLoopEliminator;

/// Replacement of one synthesized edge by the pair it contracted.
struct Expansion {
    in_edge: EdgeId,
    /// Label of the replaced incoming edge, normal convention (`from → mid`)
    in_label: Term,
    out_edge: EdgeId,
    /// Label of the replaced outgoing edge, normal convention (`mid → to`)
    out_label: Term,
    /// Variables the label simplification eliminated, with defining terms in
    /// the synthesized edge's model-key space; evaluate back to front
    bindings: Vec<(chc::syntax::Var, Term)>,
}

/// Everything recorded about one eliminated vertex.
struct Elimination {
    mid: SymbolId,
    /// Base canonical arguments of the eliminated vertex
    mid_args: Vec<chc::syntax::Var>,
    /// Incoming edges at elimination time: source vertex and label in the
    /// normal convention; used to re-derive the vertex's invariant
    incoming: Vec<(SymbolId, Term)>,
    expansions: HashMap<EdgeId, Expansion>,
}

struct EliminationTranslator {
    // in elimination order
    eliminations: Vec<Elimination>,
}

impl Transformer for NonLoopEliminator {
    fn transform(
        &self,
        mut graph: DirectedHyperGraph,
    ) -> Result<(DirectedHyperGraph, Box<dyn WitnessBackTranslator>), ContractionError> {
        let mut eliminations = vec![];
        loop {
            let adj = graph.adjacency();
            let candidate = graph.vertices().into_iter().find(|&v| {
                !graph.predicates().is_terminal(v) && graph.self_loop_for(v, &adj).is_none()
            });
            let Some(mid) = candidate else { break };
            log::debug!("contracting vertex {}", graph.predicates().name(mid));

            // snapshot the adjacent edges before mutation
            let mut edge_info: HashMap<EdgeId, (SymbolId, SymbolId, Term)> = HashMap::new();
            for &eid in adj.incoming(mid).iter().chain(adj.outgoing(mid)) {
                let edge = graph.edge(eid);
                if edge.from.len() == 1 {
                    edge_info.insert(eid, (edge.from[0], edge.to, edge.label.clone()));
                }
            }
            let incoming = adj
                .incoming(mid)
                .iter()
                .filter_map(|eid| edge_info.get(eid))
                .map(|(from, to, label)| (*from, label_to_normal(&graph, *from, *to, label)))
                .collect();

            let records = graph.contract_vertex(mid)?;
            let expansions = records
                .into_iter()
                .map(|r| {
                    let (in_from, _, in_label) = edge_info[&r.incoming].clone();
                    let (_, out_to, out_label) = edge_info[&r.outgoing].clone();
                    let bindings = r
                        .bindings
                        .into_iter()
                        .map(|(v, def)| (v, label_to_normal(&graph, in_from, out_to, &def)))
                        .collect();
                    (
                        r.new_edge,
                        Expansion {
                            in_edge: r.incoming,
                            in_label: label_to_normal(&graph, in_from, mid, &in_label),
                            out_edge: r.outgoing,
                            out_label: label_to_normal(&graph, mid, out_to, &out_label),
                            bindings,
                        },
                    )
                })
                .collect();
            eliminations.push(Elimination {
                mid,
                mid_args: graph.predicates().decl(mid).args.clone(),
                incoming,
                expansions,
            });
        }
        Ok((graph, Box::new(EliminationTranslator { eliminations })))
    }
}

impl EliminationTranslator {
    fn expansion_for(&self, eid: EdgeId) -> Option<(&Elimination, &Expansion)> {
        self.eliminations
            .iter()
            .find_map(|e| e.expansions.get(&eid).map(|x| (e, x)))
    }

    /// Expand one synthesized step into the two steps it contracted,
    /// reconstructing the intermediate state from the recorded bindings.
    fn expand_step(&self, elim: &Elimination, exp: &Expansion, step: &WitnessStep) -> Vec<WitnessStep> {
        let mut values = step.model.clone();
        for (v, def) in exp.bindings.iter().rev() {
            if !values.contains_key(v) {
                if let Ok(val) = eval(def, &values) {
                    values.insert(v.clone(), val);
                }
            }
        }
        // the eliminated vertex's state appears under its tagged source
        // variables; re-key it to the versions the original labels use
        for base in &elim.mid_args {
            let tagged = chc::graph::to_source(base, 0);
            if let Some(val) = values.get(&tagged).copied() {
                values.insert(var_version_zero(base), val);
                values.insert(send_var_through_time(&var_version_zero(base), 1), val);
            }
        }
        let restrict = |label: &Term| -> Assignment {
            let keep = free_vars(label);
            values
                .iter()
                .filter(|(v, _)| keep.contains(v))
                .map(|(v, val)| (v.clone(), *val))
                .collect()
        };
        vec![
            WitnessStep {
                edge: exp.in_edge,
                model: restrict(&exp.in_label),
            },
            WitnessStep {
                edge: exp.out_edge,
                model: restrict(&exp.out_label),
            },
        ]
    }
}

impl WitnessBackTranslator for EliminationTranslator {
    fn translate(&self, mut result: VerificationResult) -> VerificationResult {
        match &mut result.witness {
            Some(Witness::Invalidity(witness)) => {
                // a step may expand into steps over edges synthesized by an
                // earlier elimination, so iterate until the path is fixed
                let mut budget = self
                    .eliminations
                    .iter()
                    .map(|e| e.expansions.len() + 1)
                    .sum::<usize>()
                    * (witness.steps.len() + 1);
                while let Some(i) = witness
                    .steps
                    .iter()
                    .position(|s| self.expansion_for(s.edge).is_some())
                {
                    if budget == 0 {
                        break;
                    }
                    budget -= 1;
                    let (elim, exp) = self.expansion_for(witness.steps[i].edge).unwrap();
                    let replacement = self.expand_step(elim, exp, &witness.steps[i]);
                    let _removed: Vec<_> = witness.steps.splice(i..=i, replacement).collect();
                }
            }
            Some(Witness::Validity(witness)) => {
                // restore eliminated vertices in reverse elimination order:
                // each one's interpretation is the image of its predecessors
                // through its incoming labels
                for elim in self.eliminations.iter().rev() {
                    let next_args: Vec<_> = elim
                        .mid_args
                        .iter()
                        .map(|v| send_var_through_time(&var_version_zero(v), 1))
                        .collect();
                    let disjuncts: Vec<Term> = elim
                        .incoming
                        .iter()
                        .map(|(src, in_label)| {
                            let src_inv = witness
                                .invariants
                                .get(src)
                                .cloned()
                                .unwrap_or(Term::Literal(true));
                            let image =
                                close_except(&next_args, &Term::and([src_inv, in_label.clone()]));
                            send_through_time(&image, -1)
                        })
                        .collect();
                    witness
                        .invariants
                        .insert(elim.mid, Term::or(disjuncts));
                }
            }
            None => {}
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{InvalidityWitness, ValidityWitness, VerificationAnswer};
    use chc::graph::{to_source, to_target, PredicateTable, ENTRY, EXIT};
    use chc::semantics::{holds, Value};
    use chc::syntax::{NumOp, NumRel, Sort, Var};

    /// entry -> A -> B (with B's self-loop) -> exit; A is contracted.
    fn chained_graph() -> (DirectedHyperGraph, SymbolId, SymbolId) {
        let mut table = PredicateTable::new();
        let a = table.intern("A", &[Sort::Int]);
        let b = table.intern("B", &[Sort::Int]);
        let a_base = Var::new("A.0", Sort::Int);
        let b_base = Var::new("B.0", Sort::Int);
        let graph = DirectedHyperGraph::new(
            table,
            vec![
                (
                    vec![ENTRY],
                    a,
                    Term::equals(Term::var(&to_target(&a_base)), Term::Int(0)),
                ),
                (
                    vec![a],
                    b,
                    Term::equals(
                        Term::var(&to_target(&b_base)),
                        Term::var(&to_source(&a_base, 0)),
                    ),
                ),
                (
                    vec![b],
                    b,
                    Term::equals(
                        Term::var(&to_target(&b_base)),
                        Term::num_op(NumOp::Add, Term::var(&to_source(&b_base, 0)), Term::Int(1)),
                    ),
                ),
                (
                    vec![b],
                    EXIT,
                    Term::num_rel(
                        NumRel::Geq,
                        Term::var(&to_source(&b_base, 0)),
                        Term::Int(100),
                    ),
                ),
            ],
        );
        (graph, a, b)
    }

    #[test]
    fn test_contracts_to_transition_shape() {
        let (graph, _, b) = chained_graph();
        let (graph, _) = NonLoopEliminator.transform(graph).unwrap();
        let vertices = graph.vertices();
        assert!(vertices.iter().all(|&v| graph.predicates().is_terminal(v) || v == b));
        // entry -> B, B -> B, B -> exit
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_invalidity_translation_reconstructs_midpoint() {
        let (graph, _a, _) = chained_graph();
        let in_edge = graph.edges().next().unwrap().id;
        let out_edge = graph.edges().nth(1).unwrap().id;
        let (transformed, translator) = NonLoopEliminator.transform(graph).unwrap();
        let new_edge = transformed
            .edges()
            .find(|e| e.from == vec![ENTRY])
            .unwrap()
            .id;

        // model of the synthesized entry edge: B starts at 0
        let b1 = Var::at("B.0", 1, Sort::Int);
        let mut model = Assignment::new();
        model.insert(b1.clone(), Value::Int(0));
        let result = VerificationResult::unsafe_with(InvalidityWitness {
            steps: vec![WitnessStep {
                edge: new_edge,
                model,
            }],
        });
        let translated = translator.translate(result);
        let Some(Witness::Invalidity(witness)) = translated.witness else {
            panic!("witness dropped");
        };
        assert_eq!(witness.steps.len(), 2);
        assert_eq!(witness.steps[0].edge, in_edge);
        assert_eq!(witness.steps[1].edge, out_edge);
        // the reconstructed intermediate state satisfies both original labels
        let a1 = Var::at("A.0", 1, Sort::Int);
        let a0 = Var::at("A.0", 0, Sort::Int);
        assert_eq!(witness.steps[0].model.get(&a1), Some(&Value::Int(0)));
        assert_eq!(witness.steps[1].model.get(&a0), Some(&Value::Int(0)));
    }

    #[test]
    fn test_validity_translation_restores_invariant() {
        let (graph, a, b) = chained_graph();
        let (_, translator) = NonLoopEliminator.transform(graph).unwrap();
        let b0 = Var::at("B.0", 0, Sort::Int);
        let mut invariants = std::collections::BTreeMap::new();
        invariants.insert(ENTRY, Term::Literal(true));
        invariants.insert(EXIT, Term::Literal(false));
        invariants.insert(b, Term::num_rel(NumRel::Geq, Term::var(&b0), Term::Int(0)));
        let result = VerificationResult::safe_with(ValidityWitness { invariants });
        let translated = translator.translate(result);
        assert_eq!(translated.answer, VerificationAnswer::Safe);
        let Some(Witness::Validity(witness)) = translated.witness else {
            panic!("witness dropped");
        };
        let a_inv = witness.invariants.get(&a).expect("A has no invariant");
        // A's derived interpretation holds at its only reachable state, 0
        let a0 = Var::at("A.0", 0, Sort::Int);
        let mut at_zero = Assignment::new();
        at_zero.insert(a0.clone(), Value::Int(0));
        assert_eq!(holds(a_inv, &at_zero), Some(true));
        let mut at_neg = Assignment::new();
        at_neg.insert(a0, Value::Int(-5));
        assert_eq!(holds(a_inv, &at_neg), Some(false));
    }
}
