// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Structural transformations that reduce a normalised hypergraph toward the
//! transition-system shape, each paired with a translator that lifts a
//! witness of the transformed problem back to the original graph.

mod false_clause_removal;
mod multi_edge_merger;
mod non_loop_eliminator;

pub use false_clause_removal::FalseClauseRemoval;
pub use multi_edge_merger::MultiEdgeMerger;
pub use non_loop_eliminator::NonLoopEliminator;

use chc::graph::{ContractionError, DirectedHyperGraph, SymbolId};
use chc::syntax::Term;
use chc::term::subst::{substitute, Substitution};
use chc::term::time::{send_var_through_time, var_version_zero};

use crate::result::VerificationResult;

/// Lifts a witness of the transformed problem back to the graph the
/// transformation consumed.
pub trait WitnessBackTranslator {
    /// Translate a result; non-witness results pass through unchanged.
    fn translate(&self, result: VerificationResult) -> VerificationResult;
}

/// A structural graph transformation.
pub trait Transformer {
    /// Transform the graph, returning the rewritten graph and a witness
    /// translator for it.
    fn transform(
        &self,
        graph: DirectedHyperGraph,
    ) -> Result<(DirectedHyperGraph, Box<dyn WitnessBackTranslator>), ContractionError>;
}

/// A translator that changes nothing.
pub struct IdentityTranslator;

impl WitnessBackTranslator for IdentityTranslator {
    fn translate(&self, result: VerificationResult) -> VerificationResult {
        result
    }
}

/// A sequence of transformations applied in order; translation composes the
/// stage translators in reverse.
pub struct TransformationPipeline {
    stages: Vec<Box<dyn Transformer>>,
}

struct ComposedTranslator {
    // translators of the stages in application order
    translators: Vec<Box<dyn WitnessBackTranslator>>,
}

impl WitnessBackTranslator for ComposedTranslator {
    fn translate(&self, result: VerificationResult) -> VerificationResult {
        self.translators
            .iter()
            .rev()
            .fold(result, |res, t| t.translate(res))
    }
}

impl TransformationPipeline {
    /// Create a pipeline from stages.
    pub fn new(stages: Vec<Box<dyn Transformer>>) -> Self {
        TransformationPipeline { stages }
    }

    /// Apply every stage in order.
    pub fn transform(
        &self,
        graph: DirectedHyperGraph,
    ) -> Result<(DirectedHyperGraph, Box<dyn WitnessBackTranslator>), ContractionError> {
        let mut graph = graph;
        let mut translators = vec![];
        for stage in &self.stages {
            let (next, translator) = stage.transform(graph)?;
            graph = next;
            translators.push(translator);
        }
        Ok((graph, Box::new(ComposedTranslator { translators })))
    }
}

/// The pipeline that reduces a normalised graph toward transition-system
/// shape: merge parallel edges, contract non-loop vertices, drop false
/// clauses, and merge the parallel edges the contraction introduced.
pub fn towards_transition_systems() -> TransformationPipeline {
    TransformationPipeline::new(vec![
        Box::new(MultiEdgeMerger),
        Box::new(NonLoopEliminator),
        Box::new(FalseClauseRemoval),
        Box::new(MultiEdgeMerger),
    ])
}

/// Rewrite a single-source hyperedge label from tagged variables to the
/// version-0/1 convention its normal-graph form uses. Variables of vertices
/// other than the two endpoints (contraction residue) are left tagged, which
/// is how they appear in the normal graph as well.
pub(crate) fn label_to_normal(
    graph: &DirectedHyperGraph,
    from: SymbolId,
    to: SymbolId,
    label: &Term,
) -> Term {
    let mut sub = Substitution::new();
    for (tagged, base) in graph
        .source_args(from, 0)
        .iter()
        .zip(&graph.predicates().decl(from).args)
    {
        sub.insert(tagged.clone(), Term::var(&var_version_zero(base)));
    }
    for (tagged, base) in graph
        .target_args(to)
        .iter()
        .zip(&graph.predicates().decl(to).args)
    {
        sub.insert(
            tagged.clone(),
            Term::var(&send_var_through_time(&var_version_zero(base), 1)),
        );
    }
    substitute(label, &sub)
}
