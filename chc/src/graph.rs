// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The Horn-clause graph model.
//!
//! Vertices are uninterpreted predicates; edges carry interpreted labels over
//! the canonical arguments of their endpoints. Two distinguished vertices,
//! `entry` and `exit`, stand for the `true` and `false` predicates: `entry`
//! has no incoming edges and `exit` no outgoing ones. A hypergraph edge may
//! have several sources (the body of a nonlinear clause); a graph is *normal*
//! when every edge has exactly one.
//!
//! Canonical variables: every predicate owns a tuple of base variables. In a
//! normal (linear) graph a label is written over the *state version* (time
//! index 0) of its source's variables and the *next-state version* (index 1)
//! of its target's. In a hypergraph a label is written over tagged source
//! variables (one tag per source instance) and tagged target variables, so
//! that repeated predicates in one body stay distinct.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

use crate::syntax::{Sort, Term, Var};
use crate::term::qelim;
use crate::term::subst::{substitute, Substitution};
use crate::term::time::{send_var_through_time, var_version_zero};

/// An opaque predicate-symbol identifier, valid within one [`PredicateTable`].
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(pub(crate) u32);

/// An opaque edge identifier, unique within a graph and stable until the edge
/// is erased.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeId(pub(crate) u64);

/// The distinguished `true` predicate, the source of every graph.
pub const ENTRY: SymbolId = SymbolId(0);
/// The distinguished `false` predicate, the sink of every graph.
pub const EXIT: SymbolId = SymbolId(1);

/// A predicate declaration: name and canonical argument variables.
#[derive(Clone, Debug)]
pub struct PredicateDecl {
    /// Predicate name
    pub name: String,
    /// Canonical arguments (unversioned base variables, unique per predicate)
    pub args: Vec<Var>,
}

/// Interns predicate declarations and owns the canonical argument tuples.
#[derive(Clone, Debug, Default)]
pub struct PredicateTable {
    decls: Vec<PredicateDecl>,
    by_name: HashMap<String, SymbolId>,
}

impl PredicateTable {
    /// Create a table holding only the distinguished `entry` and `exit`
    /// symbols.
    pub fn new() -> Self {
        let mut table = PredicateTable {
            decls: vec![],
            by_name: HashMap::new(),
        };
        let entry = table.intern("true", &[]);
        let exit = table.intern("false", &[]);
        assert_eq!(entry, ENTRY);
        assert_eq!(exit, EXIT);
        table
    }

    /// Intern a predicate with the given argument sorts. The canonical
    /// arguments are freshly named after the predicate so that no two
    /// predicates share a variable.
    pub fn intern(&mut self, name: &str, sorts: &[Sort]) -> SymbolId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = SymbolId(self.decls.len() as u32);
        let args = sorts
            .iter()
            .enumerate()
            .map(|(i, sort)| Var::new(format!("{name}.{i}"), *sort))
            .collect();
        self.decls.push(PredicateDecl {
            name: name.to_string(),
            args,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Look up a predicate by name.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }

    /// The declaration of a symbol.
    pub fn decl(&self, sym: SymbolId) -> &PredicateDecl {
        &self.decls[sym.0 as usize]
    }

    /// The name of a symbol.
    pub fn name(&self, sym: SymbolId) -> &str {
        &self.decl(sym).name
    }

    /// Whether the symbol is `entry` or `exit`.
    pub fn is_terminal(&self, sym: SymbolId) -> bool {
        sym == ENTRY || sym == EXIT
    }
}

/// Tag a base variable as the `instance`-th source occurrence in a hyperedge.
pub fn to_source(v: &Var, instance: u32) -> Var {
    Var::new(format!("{}~{instance}", v.name), v.sort)
}

/// Tag a base variable as a target occurrence.
pub fn to_target(v: &Var) -> Var {
    Var::new(format!("{}~t", v.name), v.sort)
}

/// Strip a source or target tag; other variables are returned unchanged.
pub fn to_base(v: &Var) -> Var {
    match v.name.rsplit_once('~') {
        Some((base, _)) => Var::new(base, v.sort),
        None => v.clone(),
    }
}

/// An edge of a normal graph, labelled over `state(from) ∪ next(to) ∪ aux`.
#[derive(Clone, Debug)]
pub struct Edge {
    /// Source vertex
    pub from: SymbolId,
    /// Target vertex
    pub to: SymbolId,
    /// Interpreted label
    pub label: Term,
    /// Stable identifier
    pub id: EdgeId,
}

/// An edge of a hypergraph; `from` is a non-empty ordered list of sources.
#[derive(Clone, Debug)]
pub struct HyperEdge {
    /// Source vertices (non-empty)
    pub from: Vec<SymbolId>,
    /// Target vertex
    pub to: SymbolId,
    /// Interpreted label
    pub label: Term,
    /// Stable identifier
    pub id: EdgeId,
}

/// Provenance of one contraction step: the new edge and the incoming/outgoing
/// pair it replaces, together with the variables the label simplification
/// eliminated and their defining terms.
#[derive(Clone, Debug)]
pub struct ContractionRecord {
    /// The edge created by the contraction
    pub new_edge: EdgeId,
    /// The incoming edge it subsumes
    pub incoming: EdgeId,
    /// The outgoing edge it subsumes
    pub outgoing: EdgeId,
    /// Eliminated variables with defining terms (evaluate back to front)
    pub bindings: Vec<(Var, Term)>,
}

/// Provenance of one multi-edge merge: the kept edge and the original
/// edges (with their labels, in disjunct order).
#[derive(Clone, Debug)]
pub struct MergeRecord {
    /// The surviving edge, relabelled with the disjunction
    pub kept: EdgeId,
    /// The merged originals in disjunct order, with their original labels
    pub originals: Vec<(EdgeId, Term)>,
}

/// Failure to contract a vertex.
#[derive(Error, Debug)]
pub enum ContractionError {
    /// The vertex touches a hyperedge with more than one source
    #[error("unable to contract vertex {vertex} with a hyperedge")]
    HyperEdge {
        /// Name of the offending vertex
        vertex: String,
    },
}

/// Incoming and outgoing edge lists per vertex.
#[derive(Debug, Default)]
pub struct AdjacencyLists {
    incoming: BTreeMap<SymbolId, Vec<EdgeId>>,
    outgoing: BTreeMap<SymbolId, Vec<EdgeId>>,
}

impl AdjacencyLists {
    /// Incoming edges of a vertex.
    pub fn incoming(&self, sym: SymbolId) -> &[EdgeId] {
        self.incoming.get(&sym).map_or(&[], |v| v)
    }

    /// Outgoing edges of a vertex.
    pub fn outgoing(&self, sym: SymbolId) -> &[EdgeId] {
        self.outgoing.get(&sym).map_or(&[], |v| v)
    }

    fn touch(&mut self, sym: SymbolId) {
        self.incoming.entry(sym).or_default();
        self.outgoing.entry(sym).or_default();
    }
}

/// A directed graph of Horn clauses where every edge has a single source.
#[derive(Clone, Debug)]
pub struct DirectedGraph {
    edges: BTreeMap<EdgeId, Edge>,
    predicates: PredicateTable,
    next_id: u64,
}

/// A directed hypergraph of Horn clauses.
#[derive(Clone, Debug)]
pub struct DirectedHyperGraph {
    edges: BTreeMap<EdgeId, HyperEdge>,
    predicates: PredicateTable,
    next_id: u64,
}

impl DirectedGraph {
    /// Build a graph from `(from, to, label)` triples, assigning fresh edge
    /// ids in order.
    pub fn new(
        predicates: PredicateTable,
        edges: impl IntoIterator<Item = (SymbolId, SymbolId, Term)>,
    ) -> Self {
        let mut graph = DirectedGraph {
            edges: BTreeMap::new(),
            predicates,
            next_id: 0,
        };
        for (from, to, label) in edges {
            graph.new_edge(from, to, label);
        }
        graph
    }

    fn fresh_id(&mut self) -> EdgeId {
        let id = EdgeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn new_edge(&mut self, from: SymbolId, to: SymbolId, label: Term) -> EdgeId {
        let id = self.fresh_id();
        self.edges.insert(
            id,
            Edge {
                from,
                to,
                label,
                id,
            },
        );
        id
    }

    /// The predicate table of this graph.
    pub fn predicates(&self) -> &PredicateTable {
        &self.predicates
    }

    /// The entry vertex.
    pub fn entry(&self) -> SymbolId {
        ENTRY
    }

    /// The exit vertex.
    pub fn exit(&self) -> SymbolId {
        EXIT
    }

    /// The state version (time index 0) of a vertex's canonical arguments.
    pub fn state_args(&self, sym: SymbolId) -> Vec<Var> {
        self.predicates
            .decl(sym)
            .args
            .iter()
            .map(var_version_zero)
            .collect()
    }

    /// The next-state version (time index 1) of a vertex's canonical
    /// arguments.
    pub fn next_args(&self, sym: SymbolId) -> Vec<Var> {
        self.predicates
            .decl(sym)
            .args
            .iter()
            .map(|v| send_var_through_time(&var_version_zero(v), 1))
            .collect()
    }

    /// The edge with the given id.
    pub fn edge(&self, eid: EdgeId) -> &Edge {
        &self.edges[&eid]
    }

    /// Iterate over the edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// The vertices of the graph: every edge target plus `entry`.
    pub fn vertices(&self) -> Vec<SymbolId> {
        let mut vertices: BTreeSet<SymbolId> = self.edges.values().map(|e| e.to).collect();
        vertices.insert(ENTRY);
        vertices.into_iter().collect()
    }

    /// Build adjacency lists for the current edges.
    pub fn adjacency(&self) -> AdjacencyLists {
        let mut adj = AdjacencyLists::default();
        for edge in self.edges.values() {
            adj.incoming.entry(edge.to).or_default().push(edge.id);
            adj.outgoing.entry(edge.from).or_default().push(edge.id);
            adj.touch(edge.from);
            adj.touch(edge.to);
        }
        adj
    }

    /// The self-loop of `sym`, if it has one.
    pub fn self_loop_for(&self, sym: SymbolId, adj: &AdjacencyLists) -> Option<EdgeId> {
        adj.outgoing(sym)
            .iter()
            .copied()
            .find(|&eid| self.edge(eid).to == sym)
    }

    /// Group edges by endpoints and replace each group of two or more by a
    /// single edge labelled with the disjunction of the group's labels.
    pub fn merge_multi_edges(&mut self) -> Vec<MergeRecord> {
        let mut buckets: BTreeMap<(SymbolId, SymbolId), Vec<EdgeId>> = BTreeMap::new();
        for edge in self.edges.values() {
            buckets.entry((edge.from, edge.to)).or_default().push(edge.id);
        }
        let mut records = vec![];
        for bucket in buckets.into_values() {
            if bucket.len() < 2 {
                continue;
            }
            let originals: Vec<(EdgeId, Term)> = bucket
                .iter()
                .map(|eid| (*eid, self.edge(*eid).label.clone()))
                .collect();
            let merged = Term::or(originals.iter().map(|(_, l)| l.clone()));
            let kept = bucket[0];
            self.edges.get_mut(&kept).unwrap().label = merged;
            for eid in &bucket[1..] {
                self.edges.remove(eid);
            }
            records.push(MergeRecord { kept, originals });
        }
        records
    }

    /// Contract a non-terminal vertex without a self-loop: connect each
    /// incoming edge to each outgoing edge and drop every edge touching the
    /// vertex.
    pub fn contract_vertex(&mut self, sym: SymbolId) -> Vec<ContractionRecord> {
        let adj = self.adjacency();
        let incoming: Vec<EdgeId> = adj.incoming(sym).to_vec();
        let outgoing: Vec<EdgeId> = adj.outgoing(sym).to_vec();
        let mut records = vec![];
        for &in_id in &incoming {
            assert_ne!(self.edge(in_id).from, self.edge(in_id).to);
            for &out_id in &outgoing {
                assert_ne!(self.edge(out_id).from, self.edge(out_id).to);
                records.push(self.merge_edges(in_id, out_id));
            }
        }
        self.delete_node(sym);
        records
    }

    fn merge_edges(&mut self, in_id: EdgeId, out_id: EdgeId) -> ContractionRecord {
        let incoming = self.edge(in_id).clone();
        let outgoing = self.edge(out_id).clone();
        assert_eq!(incoming.to, outgoing.from, "merging edges without a common vertex");
        let common = incoming.to;
        // the incoming label speaks of the common vertex in its next-state
        // version; cast it down to the state version used by the outgoing label
        let sub = crate::term::subst::renaming(&self.next_args(common), &self.state_args(common));
        let updated_incoming = substitute(&incoming.label, &sub);
        let combined = Term::and([updated_incoming, outgoing.label.clone()]);
        let eliminated = qelim::eliminate_vars(
            &self.state_args(common).into_iter().collect(),
            &combined,
        );
        let new_edge = self.new_edge(incoming.from, outgoing.to, eliminated.term);
        ContractionRecord {
            new_edge,
            incoming: in_id,
            outgoing: out_id,
            bindings: eliminated.bindings,
        }
    }

    /// Drop every edge whose label is syntactically `false`.
    pub fn delete_false_edges(&mut self) -> Vec<EdgeId> {
        let dropped: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.label.is_false())
            .map(|e| e.id)
            .collect();
        for eid in &dropped {
            self.edges.remove(eid);
        }
        dropped
    }

    /// Drop every edge touching `sym`.
    pub fn delete_node(&mut self, sym: SymbolId) {
        self.edges.retain(|_, e| e.from != sym && e.to != sym);
    }

    /// Reverse the graph: flip every edge, exchanging the state and
    /// next-state versions of its endpoint variables, and remap the
    /// `entry` and `exit` symbols in the flipped endpoint positions so that
    /// the result is again a graph from `entry` to `exit`.
    pub fn reverse(&self) -> DirectedGraph {
        let swap_terminal = |sym: SymbolId| match sym {
            ENTRY => EXIT,
            EXIT => ENTRY,
            other => other,
        };
        let mut reversed = vec![];
        for edge in self.edges.values() {
            let mut sub = Substitution::new();
            // source variables are state; in the flipped edge they are next state
            for (s, n) in self.state_args(edge.from).iter().zip(self.next_args(edge.from)) {
                sub.insert(s.clone(), Term::var(&n));
            }
            // target variables are next state; they become state
            for (n, s) in self.next_args(edge.to).iter().zip(self.state_args(edge.to)) {
                sub.insert(n.clone(), Term::var(&s));
            }
            let label = substitute(&edge.label, &sub);
            reversed.push((swap_terminal(edge.to), swap_terminal(edge.from), label));
        }
        DirectedGraph::new(self.predicates.clone(), reversed)
    }

    /// Embed this graph into a hypergraph over tagged canonical variables.
    pub fn to_hyper_graph(&self) -> DirectedHyperGraph {
        let mut edges = vec![];
        for edge in self.edges.values() {
            let mut sub = Substitution::new();
            for (state, base) in self
                .state_args(edge.from)
                .iter()
                .zip(&self.predicates.decl(edge.from).args)
            {
                sub.insert(state.clone(), Term::var(&to_source(base, 0)));
            }
            for (next, base) in self
                .next_args(edge.to)
                .iter()
                .zip(&self.predicates.decl(edge.to).args)
            {
                sub.insert(next.clone(), Term::var(&to_target(base)));
            }
            edges.push((vec![edge.from], edge.to, substitute(&edge.label, &sub)));
        }
        DirectedHyperGraph::new(self.predicates.clone(), edges)
    }

    /// Render the graph in Graphviz dot format, for debugging.
    pub fn to_dot(&self, full: bool) -> String {
        let mut out = String::new();
        writeln!(out, "digraph chc {{").unwrap();
        for sym in self.vertices() {
            writeln!(out, "n{} [label = \"{}\"];", sym.0, self.predicates.name(sym)).unwrap();
        }
        for edge in self.edges.values() {
            let label = if full {
                format!("{}", edge.label)
            } else {
                String::new()
            };
            writeln!(out, "n{} -> n{} [label = \"{label}\"];", edge.from.0, edge.to.0).unwrap();
        }
        writeln!(out, "}}").unwrap();
        out
    }
}

/// Post-order of the vertices reachable from `entry`.
pub fn post_order(graph: &DirectedGraph, adj: &AdjacencyLists) -> Vec<SymbolId> {
    let mut order = vec![];
    let mut marked = BTreeSet::new();
    let mut stack = vec![(graph.entry(), false)];
    while let Some((sym, expanded)) = stack.pop() {
        if expanded {
            order.push(sym);
            continue;
        }
        if !marked.insert(sym) {
            continue;
        }
        stack.push((sym, true));
        for &eid in adj.outgoing(sym) {
            let target = graph.edge(eid).to;
            if !marked.contains(&target) {
                stack.push((target, false));
            }
        }
    }
    order
}

/// Reverse post-order of the vertices reachable from `entry`.
pub fn reverse_post_order(graph: &DirectedGraph, adj: &AdjacencyLists) -> Vec<SymbolId> {
    let mut order = post_order(graph, adj);
    order.reverse();
    order
}

impl DirectedHyperGraph {
    /// Build a hypergraph from `(from, to, label)` triples, assigning fresh
    /// edge ids in order.
    pub fn new(
        predicates: PredicateTable,
        edges: impl IntoIterator<Item = (Vec<SymbolId>, SymbolId, Term)>,
    ) -> Self {
        let mut graph = DirectedHyperGraph {
            edges: BTreeMap::new(),
            predicates,
            next_id: 0,
        };
        for (from, to, label) in edges {
            assert!(!from.is_empty(), "hyperedge must have at least one source");
            graph.new_edge(from, to, label);
        }
        graph
    }

    fn fresh_id(&mut self) -> EdgeId {
        let id = EdgeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn new_edge(&mut self, from: Vec<SymbolId>, to: SymbolId, label: Term) -> EdgeId {
        let id = self.fresh_id();
        self.edges.insert(
            id,
            HyperEdge {
                from,
                to,
                label,
                id,
            },
        );
        id
    }

    /// The predicate table of this graph.
    pub fn predicates(&self) -> &PredicateTable {
        &self.predicates
    }

    /// The entry vertex.
    pub fn entry(&self) -> SymbolId {
        ENTRY
    }

    /// The exit vertex.
    pub fn exit(&self) -> SymbolId {
        EXIT
    }

    /// Tagged source variables of `sym` for a given instance.
    pub fn source_args(&self, sym: SymbolId, instance: u32) -> Vec<Var> {
        self.predicates
            .decl(sym)
            .args
            .iter()
            .map(|v| to_source(v, instance))
            .collect()
    }

    /// Tagged target variables of `sym`.
    pub fn target_args(&self, sym: SymbolId) -> Vec<Var> {
        self.predicates.decl(sym).args.iter().map(to_target).collect()
    }

    /// The edge with the given id.
    pub fn edge(&self, eid: EdgeId) -> &HyperEdge {
        &self.edges[&eid]
    }

    /// Iterate over the edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &HyperEdge> {
        self.edges.values()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// The vertices of the graph: every edge target plus `entry`.
    pub fn vertices(&self) -> Vec<SymbolId> {
        let mut vertices: BTreeSet<SymbolId> = self.edges.values().map(|e| e.to).collect();
        vertices.insert(ENTRY);
        vertices.into_iter().collect()
    }

    /// Build adjacency lists; a hyperedge is outgoing for each of its sources.
    pub fn adjacency(&self) -> AdjacencyLists {
        let mut adj = AdjacencyLists::default();
        for edge in self.edges.values() {
            adj.incoming.entry(edge.to).or_default().push(edge.id);
            for &source in &edge.from {
                adj.outgoing.entry(source).or_default().push(edge.id);
                adj.touch(source);
            }
            adj.touch(edge.to);
        }
        adj
    }

    /// The self-loop of `sym`, if it has one.
    pub fn self_loop_for(&self, sym: SymbolId, adj: &AdjacencyLists) -> Option<EdgeId> {
        adj.outgoing(sym)
            .iter()
            .copied()
            .find(|&eid| self.edge(eid).to == sym)
    }

    /// Whether every edge has exactly one source.
    pub fn is_normal(&self) -> bool {
        self.edges.values().all(|e| e.from.len() == 1)
    }

    /// Convert a normal hypergraph to a directed graph over version-0/1
    /// variables. Edge ids are preserved. Panics unless [`Self::is_normal`].
    pub fn to_normal_graph(&self) -> DirectedGraph {
        let mut normal = DirectedGraph {
            edges: BTreeMap::new(),
            predicates: self.predicates.clone(),
            next_id: self.next_id,
        };
        for edge in self.edges.values() {
            assert_eq!(edge.from.len(), 1, "graph is not normal");
            let source = edge.from[0];
            let mut sub = Substitution::new();
            for (tagged, base) in self
                .source_args(source, 0)
                .iter()
                .zip(&self.predicates.decl(source).args)
            {
                sub.insert(tagged.clone(), Term::var(&var_version_zero(base)));
            }
            for (tagged, base) in self
                .target_args(edge.to)
                .iter()
                .zip(&self.predicates.decl(edge.to).args)
            {
                sub.insert(
                    tagged.clone(),
                    Term::var(&send_var_through_time(&var_version_zero(base), 1)),
                );
            }
            normal.edges.insert(
                edge.id,
                Edge {
                    from: source,
                    to: edge.to,
                    label: substitute(&edge.label, &sub),
                    id: edge.id,
                },
            );
        }
        normal
    }

    /// Group single-source edges by endpoints and replace each group of two
    /// or more by a single edge labelled with the disjunction of the group's
    /// labels. Hyperedges with several sources are left alone.
    pub fn merge_multi_edges(&mut self) -> Vec<MergeRecord> {
        let mut buckets: BTreeMap<(SymbolId, SymbolId), Vec<EdgeId>> = BTreeMap::new();
        for edge in self.edges.values() {
            if edge.from.len() != 1 {
                continue;
            }
            let pair = (edge.from[0], edge.to);
            buckets.entry(pair).or_default().push(edge.id);
        }
        let mut records = vec![];
        for bucket in buckets.into_values() {
            if bucket.len() < 2 {
                continue;
            }
            let originals: Vec<(EdgeId, Term)> = bucket
                .iter()
                .map(|eid| (*eid, self.edge(*eid).label.clone()))
                .collect();
            let merged = Term::or(originals.iter().map(|(_, l)| l.clone()));
            let kept = bucket[0];
            self.edges.get_mut(&kept).unwrap().label = merged;
            for eid in &bucket[1..] {
                self.edges.remove(eid);
            }
            records.push(MergeRecord { kept, originals });
        }
        records
    }

    /// Contract a non-terminal vertex without a self-loop. Fails if any
    /// adjacent edge has more than one source.
    pub fn contract_vertex(
        &mut self,
        sym: SymbolId,
    ) -> Result<Vec<ContractionRecord>, ContractionError> {
        let adj = self.adjacency();
        let incoming: Vec<EdgeId> = adj.incoming(sym).to_vec();
        let outgoing: Vec<EdgeId> = adj.outgoing(sym).to_vec();
        let blocked = incoming
            .iter()
            .chain(&outgoing)
            .any(|&eid| self.edge(eid).from.len() > 1);
        if blocked {
            return Err(ContractionError::HyperEdge {
                vertex: self.predicates.name(sym).to_string(),
            });
        }
        let mut records = vec![];
        for &in_id in &incoming {
            for &out_id in &outgoing {
                records.push(self.merge_edges(in_id, out_id));
            }
        }
        self.delete_node(sym);
        Ok(records)
    }

    fn merge_edges(&mut self, in_id: EdgeId, out_id: EdgeId) -> ContractionRecord {
        let incoming = self.edge(in_id).clone();
        let outgoing = self.edge(out_id).clone();
        let common = incoming.to;
        assert_eq!(outgoing.from, vec![common]);
        // cast the common vertex's target variables in the incoming label to
        // the source variables the outgoing label uses
        let sub = crate::term::subst::renaming(
            &self.target_args(common),
            &self.source_args(common, 0),
        );
        let updated_incoming = substitute(&incoming.label, &sub);
        let combined = Term::and([updated_incoming, outgoing.label.clone()]);
        let keep: Vec<Var> = self
            .source_args(incoming.from[0], 0)
            .into_iter()
            .chain(self.target_args(outgoing.to))
            .collect();
        let eliminated = qelim::eliminate_vars_except(&keep, &combined);
        let new_edge = self.new_edge(incoming.from.clone(), outgoing.to, eliminated.term);
        ContractionRecord {
            new_edge,
            incoming: in_id,
            outgoing: out_id,
            bindings: eliminated.bindings,
        }
    }

    /// Contract a chain of single-source edges `v₀ → v₁ → … → vₙ` into one
    /// summary edge `v₀ → vₙ`, dropping the interior vertices.
    pub fn contract_trivial_chain(&mut self, chain: &[EdgeId]) -> ContractionRecord {
        assert!(chain.len() >= 2, "a trivial chain has at least two edges");
        let mut record = self.merge_edges(chain[0], chain[1]);
        for &next in &chain[2..] {
            let prev = record.new_edge;
            let mut merged = self.merge_edges(prev, next);
            self.edges.remove(&prev);
            merged.incoming = record.incoming;
            merged.bindings = record
                .bindings
                .iter()
                .cloned()
                .chain(merged.bindings)
                .collect();
            record = merged;
        }
        // drop the interior vertices, keeping the endpoints
        let interior: Vec<SymbolId> = chain[..chain.len() - 1]
            .iter()
            .map(|&eid| self.edge(eid).to)
            .collect();
        for sym in interior {
            self.delete_node(sym);
        }
        record
    }

    /// Drop every edge whose label is syntactically `false`.
    pub fn delete_false_edges(&mut self) -> Vec<EdgeId> {
        let dropped: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.label.is_false())
            .map(|e| e.id)
            .collect();
        for eid in &dropped {
            self.edges.remove(eid);
        }
        dropped
    }

    /// Drop every edge touching `sym` as source or target.
    pub fn delete_node(&mut self, sym: SymbolId) {
        self.edges
            .retain(|_, e| e.to != sym && !e.from.contains(&sym));
    }
}

/// Instance numbers for the repeated sources of each hyperedge.
pub struct VertexInstances {
    instances: BTreeMap<EdgeId, Vec<u32>>,
}

impl VertexInstances {
    /// Count source instances for every edge of the graph.
    pub fn new(graph: &DirectedHyperGraph) -> Self {
        let mut instances = BTreeMap::new();
        for edge in graph.edges() {
            let mut counter: HashMap<SymbolId, u32> = HashMap::new();
            let numbers = edge
                .from
                .iter()
                .map(|&source| {
                    let n = counter.entry(source).or_insert(0);
                    let instance = *n;
                    *n += 1;
                    instance
                })
                .collect_vec();
            instances.insert(edge.id, numbers);
        }
        VertexInstances { instances }
    }

    /// The instance number of the `source_index`-th source of `eid`.
    pub fn instance_number(&self, eid: EdgeId, source_index: usize) -> u32 {
        self.instances[&eid][source_index]
    }
}
