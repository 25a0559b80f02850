// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Drop edges whose labels are syntactically `false`.

use chc::graph::{ContractionError, DirectedHyperGraph};

use super::{IdentityTranslator, Transformer, WitnessBackTranslator};

/// Removes clauses that can never fire. A dropped edge can appear in no
/// witness, so translation is the identity.
pub struct FalseClauseRemoval;

impl Transformer for FalseClauseRemoval {
    fn transform(
        &self,
        mut graph: DirectedHyperGraph,
    ) -> Result<(DirectedHyperGraph, Box<dyn WitnessBackTranslator>), ContractionError> {
        let dropped = graph.delete_false_edges();
        if !dropped.is_empty() {
            log::debug!("removed {} false clauses", dropped.len());
        }
        Ok((graph, Box::new(IdentityTranslator)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chc::graph::{PredicateTable, ENTRY, EXIT};
    use chc::syntax::{Sort, Term};

    #[test]
    fn test_removes_false_edges() {
        let mut table = PredicateTable::new();
        let l = table.intern("L", &[Sort::Int]);
        let graph = DirectedHyperGraph::new(
            table,
            vec![
                (vec![ENTRY], l, Term::Literal(true)),
                (vec![l], EXIT, Term::Literal(false)),
            ],
        );
        let (graph, _) = FalseClauseRemoval.transform(graph).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }
}
