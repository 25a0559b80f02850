// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Support for launching a solver (Z3, CVC5, or OpenSMT), the two features
//! that differ from solver to solver being the command line and whether the
//! binary serves interpolation queries.

use smtlib::conf::{CvcConf, OpenSmtConf, SolverCmd, Z3Conf};

/// The type of solver being used
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SolverType {
    Z3,
    Cvc5,
    OpenSmt,
}

/// A Backend for launching Z3/CVC5/OpenSMT, with some hard-coded options.
#[derive(Debug, Clone)]
pub struct GenericBackend {
    solver_type: SolverType,
    bin: String,
    timeout_ms: Option<usize>,
    seed: usize,
}

impl GenericBackend {
    /// Create a Backend for a given type of solver and with a path to the
    /// solver binary.
    pub fn new(solver_type: SolverType, bin: &str) -> Self {
        Self {
            solver_type,
            bin: bin.to_string(),
            timeout_ms: None,
            seed: 0,
        }
    }

    /// Set the solver timeout. None disables the timeout.
    pub fn timeout_ms(&mut self, timeout_ms: Option<usize>) -> &mut Self {
        self.timeout_ms = timeout_ms;
        return self;
    }

    /// Set the solver's random seed.
    pub fn seed(&mut self, seed: usize) -> &mut Self {
        self.seed = seed;
        return self;
    }

    /// Get the solver type.
    pub fn solver_type(&self) -> SolverType {
        self.solver_type
    }

    /// Whether this backend can answer `get-interpolants`.
    pub fn supports_interpolants(&self) -> bool {
        matches!(self.solver_type, SolverType::OpenSmt)
    }

    /// Build the command invocation for this backend.
    pub fn get_cmd(&self) -> SolverCmd {
        match self.solver_type {
            SolverType::Z3 => {
                let mut conf = Z3Conf::new(&self.bin);
                conf.timeout_ms(self.timeout_ms);
                if self.seed != 0 {
                    conf.options()
                        .option("smt.random_seed", format!("{}", self.seed));
                    conf.options()
                        .option("sat.random_seed", format!("{}", self.seed));
                }
                conf.done()
            }
            SolverType::Cvc5 => {
                let mut conf = CvcConf::new_cvc5(&self.bin);
                conf.timeout_ms(self.timeout_ms);
                if self.seed != 0 {
                    conf.options().option("seed", format!("{}", self.seed));
                }
                conf.done()
            }
            SolverType::OpenSmt => OpenSmtConf::new(&self.bin).done(),
        }
    }
}
