// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! A reader for the SMT-LIB Horn fragment.
//!
//! Accepts `(declare-fun P (Int …) Bool)` declarations and clauses of the
//! forms
//!
//! ```text
//! (assert (forall ((x Int) …) (=> body head)))
//! (assert (forall ((x Int) …) head))
//! (assert (=> body head))
//! (assert head)
//! ```
//!
//! where `body` is a conjunction of predicate applications and constraints
//! and `head` is a predicate application or `false`. Each clause becomes a
//! hyperedge: the body predicates are its sources (`entry` when there are
//! none), the head its target, and the label equates canonical arguments
//! with the applied argument terms, conjoins the constraints, and eliminates
//! the clause variables where they are equality-defined. Remaining clause
//! variables become clause-local auxiliaries.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use chc::graph::{DirectedHyperGraph, PredicateTable, SymbolId, ENTRY, EXIT};
use chc::syntax::{BinOp, NumOp, NumRel, Sort, Term, Var};
use chc::term::qelim::eliminate_vars;
use smtlib::sexp::{Atom, Sexp};

/// A failure to read a Horn file.
#[derive(Error, Debug)]
pub enum ReadError {
    /// The input is not well-formed s-expressions
    #[error("parse error: {0}")]
    Syntax(String),
    /// A command or term outside the supported fragment
    #[error("unsupported construct: {0}")]
    Unsupported(String),
    /// A reference to an unknown symbol
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
    /// A malformed clause
    #[error("malformed clause: {0}")]
    BadClause(String),
}

/// Read a Horn-clause system into a hypergraph.
pub fn read_system(input: &str) -> Result<DirectedHyperGraph, ReadError> {
    let commands = smtlib::sexp::parse_many(input).map_err(|e| ReadError::Syntax(e.to_string()))?;
    let mut table = PredicateTable::new();
    let mut clauses = vec![];
    for command in &commands {
        let Some((head, args)) = command.app() else {
            match command {
                Sexp::Comment(_) => continue,
                _ => return Err(ReadError::Unsupported(format!("{command}"))),
            }
        };
        match head {
            "set-logic" | "set-info" | "set-option" | "check-sat" | "get-model" | "exit" => {}
            "declare-fun" => declare_fun(&mut table, args)?,
            "assert" => {
                if args.len() != 1 {
                    return Err(ReadError::BadClause(format!("{command}")));
                }
                clauses.push(&args[0]);
            }
            _ => return Err(ReadError::Unsupported(head.to_string())),
        }
    }
    let mut edges = vec![];
    for (index, clause) in clauses.into_iter().enumerate() {
        edges.push(read_clause(&table, clause, index)?);
    }
    Ok(DirectedHyperGraph::new(table, edges))
}

fn declare_fun(table: &mut PredicateTable, args: &[Sexp]) -> Result<(), ReadError> {
    let [name, params, ret] = args else {
        return Err(ReadError::Unsupported("malformed declare-fun".to_string()));
    };
    let name = name
        .atom_s()
        .ok_or_else(|| ReadError::Unsupported("predicate name".to_string()))?;
    if name.contains(['~', '!', '$', '.']) {
        return Err(ReadError::Unsupported(format!(
            "reserved character in name {name}"
        )));
    }
    if ret.atom_s() != Some("Bool") {
        return Err(ReadError::Unsupported(format!(
            "predicate {name} must return Bool"
        )));
    }
    let sorts = params
        .list()
        .ok_or_else(|| ReadError::Unsupported("parameter list".to_string()))?
        .iter()
        .map(|s| read_sort(s))
        .collect::<Result<Vec<_>, _>>()?;
    table.intern(name, &sorts);
    Ok(())
}

fn read_sort(sexp: &Sexp) -> Result<Sort, ReadError> {
    match sexp.atom_s() {
        Some("Int") => Ok(Sort::Int),
        Some("Bool") => Ok(Sort::Bool),
        _ => Err(ReadError::Unsupported(format!("sort {sexp}"))),
    }
}

/// The environment of clause-local variables: maps source names to the
/// freshened auxiliary variables of the clause.
type Env = HashMap<String, Var>;

fn read_clause(
    table: &PredicateTable,
    clause: &Sexp,
    index: usize,
) -> Result<(Vec<SymbolId>, SymbolId, Term), ReadError> {
    let mut env = Env::new();
    let mut body = clause;
    if let Some(("forall", [binders, inner])) = clause.app() {
        let binders = binders
            .list()
            .ok_or_else(|| ReadError::BadClause(format!("{clause}")))?;
        for binder in binders {
            let pair = binder
                .list()
                .ok_or_else(|| ReadError::BadClause(format!("{binder}")))?;
            let [name, sort] = pair else {
                return Err(ReadError::BadClause(format!("{binder}")));
            };
            let name = name
                .atom_s()
                .ok_or_else(|| ReadError::BadClause(format!("{binder}")))?;
            let sort = read_sort(sort)?;
            // clause variables are freshened per clause so that labels of
            // different edges never share an auxiliary
            env.insert(name.to_string(), Var::at(format!("{name}${index}"), 0, sort));
        }
        body = inner;
    }

    let (hypotheses, conclusion) = match body.app() {
        Some(("=>", [hypotheses, conclusion])) => (Some(hypotheses), conclusion),
        _ => (None, body),
    };

    let mut sources = vec![];
    let mut conjuncts = vec![];
    let mut instance_counter: HashMap<SymbolId, u32> = HashMap::new();
    if let Some(hypotheses) = hypotheses {
        let elements: Vec<&Sexp> = match hypotheses.app() {
            Some(("and", elements)) => elements.iter().collect(),
            _ => vec![hypotheses],
        };
        for element in elements {
            if let Some(sym) = predicate_of(table, element) {
                let counter = instance_counter.entry(sym).or_insert(0);
                let instance = *counter;
                *counter += 1;
                sources.push(sym);
                let formals = source_args(table, sym, instance);
                bind_application(table, element, &formals, &env, &mut conjuncts)?;
            } else {
                conjuncts.push(read_term(table, element, &env)?);
            }
        }
    }
    if sources.is_empty() {
        sources.push(ENTRY);
    }

    let target = if conclusion.atom_s() == Some("false") {
        EXIT
    } else if let Some(sym) = predicate_of(table, conclusion) {
        let formals = target_args(table, sym);
        bind_application(table, conclusion, &formals, &env, &mut conjuncts)?;
        sym
    } else {
        return Err(ReadError::BadClause(format!(
            "head must be a predicate or false: {conclusion}"
        )));
    };

    // solve away the clause variables that are equality-defined; whatever is
    // left stays as a clause-local auxiliary
    let label = Term::and(conjuncts);
    let targets: BTreeSet<Var> = env.values().cloned().collect();
    let label = eliminate_vars(&targets, &label).term;
    Ok((sources, target, label))
}

/// The predicate a body or head element applies, if any.
fn predicate_of(table: &PredicateTable, sexp: &Sexp) -> Option<SymbolId> {
    match sexp {
        Sexp::Atom(Atom::S(name)) => table.lookup(name).filter(|s| !table.is_terminal(*s)),
        _ => sexp
            .app()
            .and_then(|(head, _)| table.lookup(head))
            .filter(|s| !table.is_terminal(*s)),
    }
}

fn source_args(table: &PredicateTable, sym: SymbolId, instance: u32) -> Vec<Var> {
    table
        .decl(sym)
        .args
        .iter()
        .map(|v| chc::graph::to_source(v, instance))
        .collect()
}

fn target_args(table: &PredicateTable, sym: SymbolId) -> Vec<Var> {
    table.decl(sym).args.iter().map(chc::graph::to_target).collect()
}

/// Equate the formal arguments of an application with its actual argument
/// terms.
fn bind_application(
    table: &PredicateTable,
    application: &Sexp,
    formals: &[Var],
    env: &Env,
    conjuncts: &mut Vec<Term>,
) -> Result<(), ReadError> {
    let actuals: &[Sexp] = match application {
        Sexp::Atom(_) => &[],
        _ => application.app().map(|(_, args)| args).unwrap_or(&[]),
    };
    if actuals.len() != formals.len() {
        return Err(ReadError::BadClause(format!(
            "wrong arity in {application}"
        )));
    }
    for (formal, actual) in formals.iter().zip(actuals) {
        let actual = read_term(table, actual, env)?;
        conjuncts.push(Term::equals(Term::var(formal), actual));
    }
    Ok(())
}

/// Translate a constraint term.
fn read_term(table: &PredicateTable, sexp: &Sexp, env: &Env) -> Result<Term, ReadError> {
    match sexp {
        Sexp::Atom(Atom::I(i)) => Ok(Term::Int(*i as i64)),
        Sexp::Atom(Atom::S(s)) => match s.as_str() {
            "true" => Ok(Term::Literal(true)),
            "false" => Ok(Term::Literal(false)),
            name => {
                if let Some(v) = env.get(name) {
                    return Ok(Term::var(v));
                }
                if let Ok(i) = name.parse::<i64>() {
                    return Ok(Term::Int(i));
                }
                Err(ReadError::UnknownSymbol(name.to_string()))
            }
        },
        Sexp::Comment(_) => Err(ReadError::Unsupported("comment in term".to_string())),
        Sexp::List(_) => {
            let (head, args) = sexp
                .app()
                .ok_or_else(|| ReadError::Unsupported(format!("{sexp}")))?;
            if table.lookup(head).is_some_and(|s| !table.is_terminal(s)) {
                return Err(ReadError::BadClause(format!(
                    "nested predicate application {sexp}"
                )));
            }
            let sub = |s: &Sexp| read_term(table, s, env);
            match head {
                "not" if args.len() == 1 => Ok(Term::negate(sub(&args[0])?)),
                "and" => Ok(Term::and(
                    args.iter().map(sub).collect::<Result<Vec<_>, _>>()?,
                )),
                "or" => Ok(Term::or(
                    args.iter().map(sub).collect::<Result<Vec<_>, _>>()?,
                )),
                "=>" if args.len() == 2 => Ok(Term::implies(sub(&args[0])?, sub(&args[1])?)),
                "=" if args.len() == 2 => Ok(Term::equals(sub(&args[0])?, sub(&args[1])?)),
                "distinct" if args.len() == 2 => Ok(Term::BinOp(
                    BinOp::NotEquals,
                    Box::new(sub(&args[0])?),
                    Box::new(sub(&args[1])?),
                )),
                "<" | "<=" | ">" | ">=" if args.len() == 2 => {
                    let rel = match head {
                        "<" => NumRel::Lt,
                        "<=" => NumRel::Leq,
                        ">" => NumRel::Gt,
                        _ => NumRel::Geq,
                    };
                    Ok(Term::num_rel(rel, sub(&args[0])?, sub(&args[1])?))
                }
                "+" | "*" if !args.is_empty() => {
                    let op = if head == "+" { NumOp::Add } else { NumOp::Mul };
                    let mut terms = args.iter().map(sub).collect::<Result<Vec<_>, _>>()?;
                    let mut acc = terms.remove(0);
                    for t in terms {
                        acc = Term::num_op(op, acc, t);
                    }
                    Ok(acc)
                }
                "-" if args.len() == 1 => {
                    Ok(Term::num_op(NumOp::Sub, Term::Int(0), sub(&args[0])?))
                }
                "-" if args.len() == 2 => {
                    Ok(Term::num_op(NumOp::Sub, sub(&args[0])?, sub(&args[1])?))
                }
                "ite" if args.len() == 3 => Ok(Term::Ite {
                    cond: Box::new(sub(&args[0])?),
                    then: Box::new(sub(&args[1])?),
                    else_: Box::new(sub(&args[2])?),
                }),
                _ => Err(ReadError::Unsupported(format!("{sexp}"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chc::graph::to_source;

    const COUNTER: &str = "
(set-logic HORN)
(declare-fun P (Int) Bool)
(assert (forall ((x Int)) (=> (= x 0) (P x))))
(assert (forall ((x Int)) (=> (and (P x) (>= x 0)) (P (+ x 1)))))
(assert (forall ((x Int)) (=> (and (P x) (< x 0)) false)))
(check-sat)
";

    #[test]
    fn test_read_counter_system() {
        let graph = read_system(COUNTER).unwrap();
        assert_eq!(graph.edge_count(), 3);
        let p = graph.predicates().lookup("P").unwrap();

        let edges: Vec<_> = graph.edges().collect();
        // fact: entry -> P with the head argument pinned to 0
        assert_eq!(edges[0].from, vec![ENTRY]);
        assert_eq!(edges[0].to, p);
        let pt = chc::graph::to_target(&Var::new("P.0", Sort::Int));
        assert_eq!(edges[0].label, Term::equals(Term::var(&pt), Term::Int(0)));

        // loop clause: P -> P
        assert_eq!(edges[1].from, vec![p]);
        assert_eq!(edges[1].to, p);
        let p0 = to_source(&Var::new("P.0", Sort::Int), 0);
        // x is eliminated by the body equality, leaving canonical variables
        assert_eq!(
            edges[1].label,
            Term::and([
                Term::num_rel(NumRel::Geq, Term::var(&p0), Term::Int(0)),
                Term::equals(
                    Term::var(&pt),
                    Term::num_op(NumOp::Add, Term::var(&p0), Term::Int(1))
                ),
            ])
        );

        // query clause: P -> exit
        assert_eq!(edges[2].from, vec![p]);
        assert_eq!(edges[2].to, EXIT);
        assert_eq!(
            edges[2].label,
            Term::num_rel(NumRel::Lt, Term::var(&p0), Term::Int(0))
        );
    }

    #[test]
    fn test_nonlinear_clause_builds_hyperedge() {
        let source = "
(declare-fun A (Int) Bool)
(declare-fun B (Int) Bool)
(assert (forall ((x Int) (y Int)) (=> (and (A x) (A y)) (B (+ x y)))))
";
        let graph = read_system(source).unwrap();
        let a = graph.predicates().lookup("A").unwrap();
        let edge = graph.edges().next().unwrap();
        assert_eq!(edge.from, vec![a, a]);
        assert!(!graph.is_normal());
        // the two body occurrences are distinguished by instance tags
        let base = Var::new("A.0", Sort::Int);
        let fv = chc::term::fo::free_vars(&edge.label);
        assert!(fv.contains(&to_source(&base, 0)));
        assert!(fv.contains(&to_source(&base, 1)));
    }

    #[test]
    fn test_residual_clause_variables_become_aux() {
        // y is constrained by an inequality only, so it must survive as a
        // clause-local auxiliary
        let source = "
(declare-fun P (Int) Bool)
(assert (forall ((x Int) (y Int)) (=> (and (P x) (< x y)) (P y))))
";
        let graph = read_system(source).unwrap();
        let edge = graph.edges().next().unwrap();
        let fv = chc::term::fo::free_vars(&edge.label);
        // y was eliminated (defined by the head equality); x was eliminated
        // (defined by the body equality); nothing clause-local is left
        assert!(fv.iter().all(|v| v.name.starts_with("P.0")));
    }

    #[test]
    fn test_rejects_undeclared_predicate() {
        let source = "(assert (forall ((x Int)) (=> (Q x) false)))";
        assert!(read_system(source).is_err());
    }

    #[test]
    fn test_ground_fact() {
        let source = "
(declare-fun P (Int) Bool)
(assert (P 7))
";
        let graph = read_system(source).unwrap();
        let edge = graph.edges().next().unwrap();
        assert_eq!(edge.from, vec![ENTRY]);
        let pt = chc::graph::to_target(&Var::new("P.0", Sort::Int));
        assert_eq!(edge.label, Term::equals(Term::var(&pt), Term::Int(7)));
    }
}
