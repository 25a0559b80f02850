// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Translation between [`Term`]s and SMT-LIB s-expressions.
//!
//! Versioned variables print as `name!index`; the inverse direction recovers
//! variables through a map of declared names, so a response can only mention
//! variables the context has seen.

use std::collections::HashMap;

use chc::semantics::Value;
use chc::syntax::*;
use smtlib::sexp::{app, atom_s, sexp_l, Atom, Sexp};

use crate::basics::SolverError;

/// The SMT-LIB name of a variable.
pub fn var_name(v: &Var) -> String {
    match v.index {
        Some(i) => format!("{}!{i}", v.name),
        None => v.name.clone(),
    }
}

/// The SMT-LIB sort name.
pub fn sort_name(sort: Sort) -> &'static str {
    match sort {
        Sort::Bool => "Bool",
        Sort::Int => "Int",
    }
}

fn int_sexp(i: i64) -> Sexp {
    if i < 0 {
        app("-", [Sexp::Atom(Atom::I(i.unsigned_abs() as usize))])
    } else {
        Sexp::Atom(Atom::I(i as usize))
    }
}

/// Translate a term to an s-expression.
pub fn term_to_sexp(t: &Term) -> Sexp {
    match t {
        Term::Literal(b) => atom_s(if *b { "true" } else { "false" }),
        Term::Int(i) => int_sexp(*i),
        Term::Var(v) => atom_s(var_name(v)),
        Term::UnaryOp(UOp::Not, arg) => app("not", [term_to_sexp(arg)]),
        Term::BinOp(op, lhs, rhs) => {
            let head = match op {
                BinOp::Equals | BinOp::Iff => "=",
                BinOp::NotEquals => "distinct",
                BinOp::Implies => "=>",
            };
            app(head, [term_to_sexp(lhs), term_to_sexp(rhs)])
        }
        Term::NAryOp(op, ts) => {
            let head = match op {
                NOp::And => "and",
                NOp::Or => "or",
            };
            app(head, ts.iter().map(term_to_sexp))
        }
        Term::NumOp(op, lhs, rhs) => {
            let head = match op {
                NumOp::Add => "+",
                NumOp::Sub => "-",
                NumOp::Mul => "*",
            };
            app(head, [term_to_sexp(lhs), term_to_sexp(rhs)])
        }
        Term::NumRel(rel, lhs, rhs) => {
            let head = match rel {
                NumRel::Lt => "<",
                NumRel::Leq => "<=",
                NumRel::Gt => ">",
                NumRel::Geq => ">=",
            };
            app(head, [term_to_sexp(lhs), term_to_sexp(rhs)])
        }
        Term::Ite { cond, then, else_ } => app(
            "ite",
            [term_to_sexp(cond), term_to_sexp(then), term_to_sexp(else_)],
        ),
        Term::Quantified {
            quantifier,
            binders,
            body,
        } => {
            let head = match quantifier {
                Quantifier::Forall => "forall",
                Quantifier::Exists => "exists",
            };
            let binders = sexp_l(binders.iter().map(|b| {
                sexp_l([atom_s(var_name(&b.var)), atom_s(sort_name(b.var.sort))])
            }));
            app(head, [binders, term_to_sexp(body)])
        }
    }
}

/// Translate a solver response back to a term, resolving symbols through the
/// declared-variable map. Supports `let` bindings, which several solvers use
/// in models and interpolants.
pub fn term_of_sexp(
    sexp: &Sexp,
    declared: &HashMap<String, Var>,
) -> Result<Term, SolverError> {
    let mut lets: im::HashMap<String, Term> = im::HashMap::new();
    term_of_sexp_rec(sexp, declared, &mut lets)
}

fn bad(sexp: &Sexp) -> SolverError {
    SolverError::BadResponse(format!("{sexp}"))
}

fn term_of_sexp_rec(
    sexp: &Sexp,
    declared: &HashMap<String, Var>,
    lets: &im::HashMap<String, Term>,
) -> Result<Term, SolverError> {
    match sexp {
        Sexp::Atom(Atom::I(i)) => Ok(Term::Int(*i as i64)),
        Sexp::Atom(Atom::S(s)) => match s.as_str() {
            "true" => Ok(Term::Literal(true)),
            "false" => Ok(Term::Literal(false)),
            name => {
                if let Some(t) = lets.get(name) {
                    return Ok(t.clone());
                }
                if let Some(v) = declared.get(name) {
                    return Ok(Term::var(v));
                }
                // a bare negative integer like -5 parses as a symbol
                if let Ok(i) = name.parse::<i64>() {
                    return Ok(Term::Int(i));
                }
                Err(bad(sexp))
            }
        },
        Sexp::Comment(_) => Err(bad(sexp)),
        Sexp::List(_) => {
            let (head, args) = sexp.app().ok_or_else(|| bad(sexp))?;
            let sub = |s: &Sexp| term_of_sexp_rec(s, declared, lets);
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
                "let" if args.len() == 2 => {
                    let bindings = args[0].list().ok_or_else(|| bad(sexp))?;
                    let mut lets = lets.clone();
                    for binding in bindings {
                        let pair = binding.list().ok_or_else(|| bad(sexp))?;
                        if pair.len() != 2 {
                            return Err(bad(sexp));
                        }
                        let name = pair[0].atom_s().ok_or_else(|| bad(sexp))?;
                        let value = term_of_sexp_rec(&pair[1], declared, &lets)?;
                        lets.insert(name.to_string(), value);
                    }
                    term_of_sexp_rec(&args[1], declared, &lets)
                }
                _ => Err(bad(sexp)),
            }
        }
    }
}

/// Parse a concrete value from a `get-value` response.
pub fn value_of_sexp(sexp: &Sexp) -> Result<Value, SolverError> {
    match sexp {
        Sexp::Atom(Atom::I(i)) => Ok(Value::Int(*i as i64)),
        Sexp::Atom(Atom::S(s)) => match s.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            name => name
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| bad(sexp)),
        },
        _ => {
            if let Some(("-", [arg])) = sexp.app() {
                return Ok(Value::Int(-value_of_sexp(arg)?.int().map_err(|_| bad(sexp))?));
            }
            Err(bad(sexp))
        }
    }
}
