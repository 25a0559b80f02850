// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Holds the configuration needed to launch a solver.

use std::path::PathBuf;

use crate::backends::GenericBackend;
use crate::basics::{ContextFactory, SolverError};
use crate::imp::Solver;

/// Wrapper around the configuration needed to launch a solver.
#[derive(Debug, Clone)]
pub struct SolverConf {
    /// Which backend to use for launched solvers.
    pub backend: GenericBackend,
    /// The optional path to tee SMT output to.
    pub tee: Option<PathBuf>,
}

impl ContextFactory for SolverConf {
    type Ctx = Solver;

    fn context(&self, name: &str) -> Result<Solver, SolverError> {
        Solver::new(&self.backend, name, self.tee.as_deref())
    }
}
