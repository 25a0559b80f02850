// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Traits defining a very basic interface to incremental SMT contexts, and a
//! scripted implementation used by the engine unit tests.
//!
//! This is the only seam between the verification engines and an actual
//! solver: a context supports push/pop, asserting a formula into one of two
//! interpolation groups, checking satisfiability, and querying a model or an
//! interpolant for the last check.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use thiserror::Error;

use chc::semantics::Assignment;
use chc::syntax::Term;

/// The result of a satisfiability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatResult {
    /// The assertions are satisfiable
    Sat,
    /// The assertions are unsatisfiable
    Unsat,
    /// The solver could not decide, with its reason
    Unknown(String),
}

/// The interpolation group an assertion belongs to. An interpolant computed
/// after an unsatisfiable check separates the `A` part from the `B` part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItpGroup {
    /// The first (left) partition
    A,
    /// The second (right) partition
    B,
}

/// An error from interacting with a solver context.
#[derive(Error, Debug)]
pub enum SolverError {
    /// The underlying process failed
    #[error("{0}")]
    Smtlib(#[from] smtlib::proc::SolverError),
    /// The backend cannot produce interpolants
    #[error("backend does not produce interpolants")]
    NoInterpolants,
    /// A model or interpolant was requested without a suitable check
    #[error("no {0} available for the last check")]
    NotAvailable(&'static str),
    /// A scripted context ran out of scripted responses
    #[error("script exhausted for context {0}")]
    ScriptExhausted(String),
    /// A response could not be interpreted
    #[error("could not parse solver response: {0}")]
    BadResponse(String),
}

/// An incremental solver context.
pub trait SmtContext {
    /// Push an assertion scope.
    fn push(&mut self) -> Result<(), SolverError>;
    /// Pop the innermost assertion scope.
    fn pop(&mut self) -> Result<(), SolverError>;
    /// Assert a formula into the given interpolation group.
    fn assert_in(&mut self, group: ItpGroup, t: &Term) -> Result<(), SolverError>;
    /// Assert a formula into the `A` group.
    fn assert(&mut self, t: &Term) -> Result<(), SolverError> {
        self.assert_in(ItpGroup::A, t)
    }
    /// Check satisfiability of the current assertions.
    fn check_sat(&mut self) -> Result<SatResult, SolverError>;
    /// After a sat check, the model over the declared variables.
    fn get_model(&mut self) -> Result<Assignment, SolverError>;
    /// After an unsat check, an interpolant between the `A` and `B` groups.
    fn get_interpolant(&mut self) -> Result<Term, SolverError>;
}

/// Hands out named solver contexts. Engines create every context they own
/// through a factory, so tests can swap in scripted contexts.
pub trait ContextFactory {
    /// The context type produced by this factory.
    type Ctx: SmtContext;
    /// Create a context tagged with a name.
    fn context(&self, name: &str) -> Result<Self::Ctx, SolverError>;
}

/// One scripted response to a `check_sat` call.
#[derive(Debug, Clone)]
pub enum ScriptEntry {
    /// Answer sat, with the model to report
    Sat(Assignment),
    /// Answer unsat, optionally with the interpolant to report
    Unsat(Option<Term>),
    /// Answer unknown
    Unknown(String),
}

/// A factory of scripted contexts. Each context name has a single stream of
/// [`ScriptEntry`]s; every context created under that name consumes from the
/// shared stream, in order. This mirrors how the engines use short-lived
/// scratch contexts: a test scripts the whole sequence of checks a name will
/// ever see.
#[derive(Default)]
pub struct ScriptedFactory {
    scripts: RefCell<HashMap<String, Rc<RefCell<VecDeque<ScriptEntry>>>>>,
}

impl ScriptedFactory {
    /// Create a factory with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append entries to the script of `name`.
    pub fn script(&self, name: &str, entries: impl IntoIterator<Item = ScriptEntry>) {
        let mut scripts = self.scripts.borrow_mut();
        let queue = scripts
            .entry(name.to_string())
            .or_insert_with(|| Rc::new(RefCell::new(VecDeque::new())));
        queue.borrow_mut().extend(entries);
    }

    /// Number of unconsumed entries across all scripts, for asserting that a
    /// test consumed exactly what it scripted.
    pub fn remaining(&self) -> usize {
        self.scripts
            .borrow()
            .values()
            .map(|q| q.borrow().len())
            .sum()
    }
}

impl ContextFactory for ScriptedFactory {
    type Ctx = ScriptedContext;

    fn context(&self, name: &str) -> Result<ScriptedContext, SolverError> {
        let mut scripts = self.scripts.borrow_mut();
        let queue = scripts
            .entry(name.to_string())
            .or_insert_with(|| Rc::new(RefCell::new(VecDeque::new())));
        Ok(ScriptedContext {
            name: name.to_string(),
            entries: queue.clone(),
            last: None,
            asserted: vec![],
            depth: 0,
        })
    }
}

/// A context that replays a script instead of running a solver.
pub struct ScriptedContext {
    name: String,
    entries: Rc<RefCell<VecDeque<ScriptEntry>>>,
    last: Option<ScriptEntry>,
    /// Every assertion made on this context, with its group, for inspection
    /// by tests.
    pub asserted: Vec<(ItpGroup, Term)>,
    depth: usize,
}

impl SmtContext for ScriptedContext {
    fn push(&mut self) -> Result<(), SolverError> {
        self.depth += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<(), SolverError> {
        assert!(self.depth > 0, "pop without matching push");
        self.depth -= 1;
        Ok(())
    }

    fn assert_in(&mut self, group: ItpGroup, t: &Term) -> Result<(), SolverError> {
        self.asserted.push((group, t.clone()));
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, SolverError> {
        let entry = self
            .entries
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| SolverError::ScriptExhausted(self.name.clone()))?;
        let result = match &entry {
            ScriptEntry::Sat(_) => SatResult::Sat,
            ScriptEntry::Unsat(_) => SatResult::Unsat,
            ScriptEntry::Unknown(reason) => SatResult::Unknown(reason.clone()),
        };
        self.last = Some(entry);
        Ok(result)
    }

    fn get_model(&mut self) -> Result<Assignment, SolverError> {
        match &self.last {
            Some(ScriptEntry::Sat(model)) => Ok(model.clone()),
            _ => Err(SolverError::NotAvailable("model")),
        }
    }

    fn get_interpolant(&mut self) -> Result<Term, SolverError> {
        match &self.last {
            Some(ScriptEntry::Unsat(Some(itp))) => Ok(itp.clone()),
            Some(ScriptEntry::Unsat(None)) => Err(SolverError::NoInterpolants),
            _ => Err(SolverError::NotAvailable("interpolant")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chc::semantics::Value;
    use chc::syntax::{Sort, Var};

    #[test]
    fn test_scripted_replay() {
        let factory = ScriptedFactory::new();
        let x = Var::at("x", 0, Sort::Int);
        let mut model = Assignment::new();
        model.insert(x.clone(), Value::Int(3));
        factory.script(
            "test",
            [ScriptEntry::Sat(model.clone()), ScriptEntry::Unsat(None)],
        );

        let mut ctx = factory.context("test").unwrap();
        ctx.assert(&Term::var(&Var::new("p", Sort::Bool))).unwrap();
        assert_eq!(ctx.check_sat().unwrap(), SatResult::Sat);
        assert_eq!(ctx.get_model().unwrap(), model);
        assert_eq!(ctx.check_sat().unwrap(), SatResult::Unsat);
        assert!(ctx.get_model().is_err());
        assert!(matches!(
            ctx.check_sat(),
            Err(SolverError::ScriptExhausted(_))
        ));
        assert_eq!(factory.remaining(), 0);
    }

    #[test]
    fn test_scripted_shared_stream() {
        let factory = ScriptedFactory::new();
        factory.script("scratch", [ScriptEntry::Unsat(None), ScriptEntry::Sat(Assignment::new())]);
        // two contexts under the same name consume one stream in order
        let mut first = factory.context("scratch").unwrap();
        assert_eq!(first.check_sat().unwrap(), SatResult::Unsat);
        let mut second = factory.context("scratch").unwrap();
        assert_eq!(second.check_sat().unwrap(), SatResult::Sat);
    }
}
