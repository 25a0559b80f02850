// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! An incremental solver context backed by an SMT-LIB process.

use std::collections::HashMap;
use std::path::Path;

use itertools::Itertools;

use chc::semantics::Assignment;
use chc::syntax::{Term, Var};
use smtlib::proc::{SatResp, SmtProc};
use smtlib::sexp::{app, atom_s, sexp_l, Sexp};

use crate::backends::GenericBackend;
use crate::basics::{ItpGroup, SatResult, SmtContext, SolverError};
use crate::sexp::{sort_name, term_of_sexp, term_to_sexp, value_of_sexp, var_name};

/// An incremental solver context over a running solver process.
///
/// The context declares the free variables of asserted terms on the fly and
/// tracks them per assertion scope, so that a `pop` forgets the declarations
/// the solver itself forgets. When the backend produces interpolants, every
/// assertion is named and tagged with its interpolation group.
pub struct Solver {
    proc: SmtProc,
    name: String,
    interpolants: bool,
    declared: HashMap<String, Var>,
    // names declared at each scope depth; index 0 is the base level
    scopes: Vec<Vec<String>>,
    // named assertions with their interpolation group, per scope depth
    named: Vec<Vec<(ItpGroup, String)>>,
    assertion_count: usize,
    last_check: Option<SatResult>,
}

impl Solver {
    /// Launch a solver process for a context tagged with `name`.
    pub fn new(
        backend: &GenericBackend,
        name: &str,
        tee: Option<&Path>,
    ) -> Result<Self, SolverError> {
        let proc = SmtProc::new(backend.get_cmd(), tee)?;
        log::debug!("launched solver context {name}");
        Ok(Self {
            proc,
            name: name.to_string(),
            interpolants: backend.supports_interpolants(),
            declared: HashMap::new(),
            scopes: vec![vec![]],
            named: vec![vec![]],
            assertion_count: 0,
            last_check: None,
        })
    }

    /// The name this context was created under.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn declare_vars(&mut self, t: &Term) {
        for v in chc::term::fo::free_vars(t) {
            let name = var_name(&v);
            if self.declared.contains_key(&name) {
                continue;
            }
            self.proc.send(&app(
                "declare-fun",
                [atom_s(&name), sexp_l([]), atom_s(sort_name(v.sort))],
            ));
            self.declared.insert(name.clone(), v);
            self.scopes.last_mut().unwrap().push(name);
        }
    }

    fn group_conjunction(&self, group: ItpGroup) -> Sexp {
        let names = self
            .named
            .iter()
            .flatten()
            .filter(|(g, _)| *g == group)
            .map(|(_, name)| atom_s(name))
            .collect_vec();
        app("and", names)
    }
}

impl SmtContext for Solver {
    fn push(&mut self) -> Result<(), SolverError> {
        self.proc.send(&app("push", []));
        self.scopes.push(vec![]);
        self.named.push(vec![]);
        Ok(())
    }

    fn pop(&mut self) -> Result<(), SolverError> {
        assert!(self.scopes.len() > 1, "pop without matching push");
        self.proc.send(&app("pop", []));
        for name in self.scopes.pop().unwrap() {
            self.declared.remove(&name);
        }
        self.named.pop();
        Ok(())
    }

    fn assert_in(&mut self, group: ItpGroup, t: &Term) -> Result<(), SolverError> {
        self.declare_vars(t);
        let body = term_to_sexp(t);
        if self.interpolants {
            let label = format!("itp!{}", self.assertion_count);
            self.assertion_count += 1;
            self.proc.send(&app(
                "assert",
                [app("!", [body, atom_s(":named"), atom_s(&label)])],
            ));
            self.named.last_mut().unwrap().push((group, label));
        } else {
            self.proc.send(&app("assert", [body]));
        }
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, SolverError> {
        let resp = self.proc.check_sat()?;
        let result = match resp {
            SatResp::Sat => SatResult::Sat,
            SatResp::Unsat => SatResult::Unsat,
            SatResp::Unknown(reason) => SatResult::Unknown(reason),
        };
        log::debug!("context {}: check-sat returned {result:?}", self.name);
        self.last_check = Some(result.clone());
        Ok(result)
    }

    fn get_model(&mut self) -> Result<Assignment, SolverError> {
        if self.last_check != Some(SatResult::Sat) {
            return Err(SolverError::NotAvailable("model"));
        }
        let names = self.declared.keys().sorted().collect_vec();
        let mut model = Assignment::new();
        if names.is_empty() {
            return Ok(model);
        }
        let resp = self
            .proc
            .send_with_reply(&app("get-value", [sexp_l(names.iter().map(atom_s))]))?;
        let pairs = resp
            .list()
            .ok_or_else(|| SolverError::BadResponse(format!("{resp}")))?;
        for pair in pairs {
            let pair = pair
                .list()
                .ok_or_else(|| SolverError::BadResponse(format!("{pair}")))?;
            if pair.len() != 2 {
                return Err(SolverError::BadResponse(format!("{pair:?}")));
            }
            let name = pair[0]
                .atom_s()
                .ok_or_else(|| SolverError::BadResponse(format!("{}", pair[0])))?;
            let var = self
                .declared
                .get(name)
                .ok_or_else(|| SolverError::BadResponse(format!("undeclared {name}")))?;
            model.insert(var.clone(), value_of_sexp(&pair[1])?);
        }
        Ok(model)
    }

    fn get_interpolant(&mut self) -> Result<Term, SolverError> {
        if !self.interpolants {
            return Err(SolverError::NoInterpolants);
        }
        if self.last_check != Some(SatResult::Unsat) {
            return Err(SolverError::NotAvailable("interpolant"));
        }
        let a = self.group_conjunction(ItpGroup::A);
        let b = self.group_conjunction(ItpGroup::B);
        let resp = self.proc.send_with_reply(&app("get-interpolants", [a, b]))?;
        // the response is a list of interpolants, one per partition cut; with
        // two partitions there is exactly one
        let itp = match resp.list() {
            Some([single]) => single,
            _ => &resp,
        };
        term_of_sexp(itp, &self.declared)
    }
}
