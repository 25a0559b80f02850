// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Merge parallel edges by disjunction.

use chc::graph::{ContractionError, DirectedHyperGraph, EdgeId};
use chc::semantics::holds;
use chc::syntax::Term;
use chc::term::fo::free_vars;

use crate::result::{VerificationResult, Witness};

use super::{label_to_normal, Transformer, WitnessBackTranslator};

/// Groups edges by their endpoints and replaces each group of two or more by
/// a single edge labelled with the disjunction of the group's labels.
/// Hyperedges with more than one source are currently excluded from merging.
pub struct MultiEdgeMerger;

struct MergedGroup {
    kept: EdgeId,
    // original edge ids with their labels in the normal-graph convention, in
    // disjunct order
    originals: Vec<(EdgeId, Term)>,
}

struct MergeTranslator {
    groups: Vec<MergedGroup>,
}

impl Transformer for MultiEdgeMerger {
    fn transform(
        &self,
        mut graph: DirectedHyperGraph,
    ) -> Result<(DirectedHyperGraph, Box<dyn WitnessBackTranslator>), ContractionError> {
        // snapshot endpoints before mutation so the original labels can be
        // rewritten to the normal-graph convention for witness translation
        let endpoints: std::collections::BTreeMap<EdgeId, (chc::graph::SymbolId, chc::graph::SymbolId)> =
            graph
                .edges()
                .filter(|e| e.from.len() == 1)
                .map(|e| (e.id, (e.from[0], e.to)))
                .collect();
        let records = graph.merge_multi_edges();
        if !records.is_empty() {
            log::debug!("merged {} groups of parallel edges", records.len());
        }
        let groups = records
            .into_iter()
            .map(|r| MergedGroup {
                kept: r.kept,
                originals: r
                    .originals
                    .into_iter()
                    .map(|(eid, label)| {
                        let (from, to) = endpoints[&eid];
                        (eid, label_to_normal(&graph, from, to, &label))
                    })
                    .collect(),
            })
            .collect();
        Ok((graph, Box::new(MergeTranslator { groups })))
    }
}

impl WitnessBackTranslator for MergeTranslator {
    fn translate(&self, mut result: VerificationResult) -> VerificationResult {
        // invariants are untouched (merging keeps every vertex); a path step
        // over a merged edge is mapped to the disjunct its model satisfies
        if let Some(Witness::Invalidity(witness)) = &mut result.witness {
            for step in &mut witness.steps {
                let Some(group) = self.groups.iter().find(|g| g.kept == step.edge) else {
                    continue;
                };
                let chosen = group
                    .originals
                    .iter()
                    .find(|(_, label)| holds(label, &step.model) == Some(true))
                    .or_else(|| group.originals.first());
                if let Some((eid, label)) = chosen {
                    step.edge = *eid;
                    let keep = free_vars(label);
                    step.model.retain(|v, _| keep.contains(v));
                }
            }
        }
        result
    }
}
