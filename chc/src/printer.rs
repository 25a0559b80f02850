// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Display terms in a concrete infix syntax.

use std::fmt;

use crate::syntax::*;

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "bool"),
            Sort::Int => write!(f, "int"),
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}!{i}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

fn precedence(t: &Term) -> usize {
    match t {
        Term::Quantified { .. } => 0,
        Term::BinOp(BinOp::Iff | BinOp::Implies, ..) => 10,
        Term::NAryOp(NOp::Or, _) => 20,
        Term::NAryOp(NOp::And, _) => 30,
        Term::BinOp(BinOp::Equals | BinOp::NotEquals, ..) | Term::NumRel(..) => 40,
        Term::NumOp(NumOp::Add | NumOp::Sub, ..) => 50,
        Term::NumOp(NumOp::Mul, ..) => 60,
        Term::UnaryOp(UOp::Not, _) => 70,
        Term::Ite { .. } => 0,
        Term::Literal(_) | Term::Int(_) | Term::Var(_) => 100,
    }
}

fn parens(add: bool, s: String) -> String {
    if add {
        format!("({s})")
    } else {
        s
    }
}

/// Print a term, inserting parentheses under a parent of the given precedence.
fn term_at(t: &Term, parent: usize) -> String {
    let prec = precedence(t);
    let s = match t {
        Term::Literal(b) => format!("{b}"),
        Term::Int(i) => format!("{i}"),
        Term::Var(v) => format!("{v}"),
        Term::UnaryOp(UOp::Not, arg) => format!("!{}", term_at(arg, prec)),
        Term::BinOp(op, lhs, rhs) => {
            let op = match op {
                BinOp::Equals => "=",
                BinOp::NotEquals => "!=",
                BinOp::Implies => "->",
                BinOp::Iff => "<->",
            };
            format!("{} {op} {}", term_at(lhs, prec + 1), term_at(rhs, prec + 1))
        }
        Term::NAryOp(op, ts) => {
            let op = match op {
                NOp::And => " & ",
                NOp::Or => " | ",
            };
            ts.iter()
                .map(|t| term_at(t, prec + 1))
                .collect::<Vec<_>>()
                .join(op)
        }
        Term::NumOp(op, lhs, rhs) => {
            let op = match op {
                NumOp::Add => "+",
                NumOp::Sub => "-",
                NumOp::Mul => "*",
            };
            format!("{} {op} {}", term_at(lhs, prec), term_at(rhs, prec + 1))
        }
        Term::NumRel(rel, lhs, rhs) => {
            let rel = match rel {
                NumRel::Lt => "<",
                NumRel::Leq => "<=",
                NumRel::Gt => ">",
                NumRel::Geq => ">=",
            };
            format!("{} {rel} {}", term_at(lhs, prec + 1), term_at(rhs, prec + 1))
        }
        Term::Ite { cond, then, else_ } => format!(
            "if {} then {} else {}",
            term_at(cond, 1),
            term_at(then, 1),
            term_at(else_, 1)
        ),
        Term::Quantified {
            quantifier,
            binders,
            body,
        } => {
            let q = match quantifier {
                Quantifier::Forall => "forall",
                Quantifier::Exists => "exists",
            };
            let binders = binders
                .iter()
                .map(|b| format!("{}:{}", b.var, b.var.sort))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{q} {binders}. {}", term_at(body, 0))
        }
    };
    parens(prec < parent, s)
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", term_at(self, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_term() {
        let x = Var::at("x", 0, Sort::Int);
        let x1 = Var::at("x", 1, Sort::Int);
        let t = Term::and([
            Term::equals(
                Term::var(&x1),
                Term::num_op(NumOp::Add, Term::var(&x), Term::Int(1)),
            ),
            Term::num_rel(NumRel::Geq, Term::var(&x), Term::Int(0)),
        ]);
        assert_eq!(format!("{t}"), "x!1 = x!0 + 1 & x!0 >= 0");
    }

    #[test]
    fn test_print_parens() {
        let p = Var::new("p", Sort::Bool);
        let q = Var::new("q", Sort::Bool);
        let t = Term::negate(Term::or([Term::var(&p), Term::var(&q)]));
        assert_eq!(format!("{t}"), "!(p | q)");
    }
}
