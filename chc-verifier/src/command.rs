// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The chc-verifier binary's command-line interface.

use std::time::Duration;
use std::{fs, process};

use clap::Parser;

use engine::options::{EngineKind, EngineOptions};
use engine::result::{VerificationAnswer, VerificationResult, Witness};
use solver::backends::{GenericBackend, SolverType};
use solver::conf::SolverConf;
use solver::solver_path;

use crate::horn;

#[derive(clap::ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum SolverArg {
    Z3,
    Cvc5,
    Opensmt,
}

#[derive(clap::ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum EngineArg {
    /// Bounded model checking (refutation only)
    Bmc,
    /// Forward and backward k-induction
    Kind,
    /// Accelerated reachability, split exact/less-than relations
    AccelSplit,
    /// Accelerated reachability, single transition hierarchy
    AccelSingle,
}

/// Solve a constrained Horn clause system.
#[derive(clap::Parser, Debug)]
#[command(about, long_about = None)]
pub struct App {
    /// Engine to use
    #[arg(value_enum, long, default_value_t = EngineArg::Kind)]
    engine: EngineArg,

    /// Solver to use
    #[arg(value_enum, long, default_value_t = SolverArg::Z3)]
    solver: SolverArg,

    /// Tee SMT output next to the input file
    #[arg(long)]
    smt: bool,

    /// Wall-clock budget in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Compute a witness (an invariant or a counterexample)
    #[arg(long)]
    compute_witness: bool,

    /// Print the computed witness
    #[arg(long)]
    print_witness: bool,

    /// Internally validate the computed witness
    #[arg(long)]
    validate: bool,

    /// Print the verdict as JSON
    #[arg(long)]
    json: bool,

    /// Increase verbosity (can be applied multiple times)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Input file in the SMT-LIB Horn fragment
    file: String,
}

impl App {
    fn solver_conf(&self) -> SolverConf {
        let (solver_type, bin) = match self.solver {
            SolverArg::Z3 => (SolverType::Z3, solver_path("z3")),
            SolverArg::Cvc5 => (SolverType::Cvc5, solver_path("cvc5")),
            SolverArg::Opensmt => (SolverType::OpenSmt, solver_path("opensmt")),
        };
        let mut backend = GenericBackend::new(solver_type, &bin);
        backend.timeout_ms(self.timeout.map(|secs| secs as usize * 1000));
        let tee = if self.smt {
            let dir = solver::log_dir(std::path::Path::new(&self.file));
            fs::create_dir_all(&dir).expect("could not create log dir");
            Some(dir)
        } else {
            None
        };
        SolverConf { backend, tee }
    }

    fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            engine: match self.engine {
                EngineArg::Bmc => EngineKind::Bmc,
                EngineArg::Kind => EngineKind::Kind,
                EngineArg::AccelSplit => EngineKind::AccelSplit,
                EngineArg::AccelSingle => EngineKind::AccelSingle,
            },
            compute_witness: self.compute_witness || self.print_witness || self.validate,
            timeout: self.timeout.map(Duration::from_secs),
            ..EngineOptions::default()
        }
    }

    fn init_logger(&self) {
        if std::env::var_os("RUST_LOG").is_some() {
            pretty_env_logger::init();
            return;
        }
        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        };
        pretty_env_logger::formatted_builder()
            .filter_level(level)
            .init();
    }

    /// Run the command.
    pub fn exec(self) {
        self.init_logger();
        let contents = fs::read_to_string(&self.file).unwrap_or_else(|err| {
            eprintln!("could not read {}: {err}", &self.file);
            process::exit(1);
        });
        let graph = horn::read_system(&contents).unwrap_or_else(|err| {
            eprintln!("could not parse {}: {err}", &self.file);
            process::exit(1);
        });
        let conf = self.solver_conf();
        let options = self.engine_options();
        let result = engine::solve(&graph, &options, &conf).unwrap_or_else(|err| {
            eprintln!("transformation failed: {err}");
            process::exit(1);
        });
        self.report(&graph, &conf, result);
    }

    fn report(
        &self,
        graph: &chc::graph::DirectedHyperGraph,
        conf: &SolverConf,
        result: VerificationResult,
    ) {
        if self.json {
            let json = serde_json::json!({
                "answer": result.answer,
                "diagnostic": result.diagnostic,
            });
            println!("{json}");
        } else {
            // the CHC convention: a safe system is a satisfiable clause set
            match result.answer {
                VerificationAnswer::Safe => println!("sat"),
                VerificationAnswer::Unsafe => println!("unsat"),
                VerificationAnswer::Unknown => {
                    println!("unknown");
                    if let Some(diagnostic) = &result.diagnostic {
                        log::warn!("{diagnostic}");
                    }
                }
            }
        }
        if self.print_witness {
            match &result.witness {
                Some(Witness::Validity(witness)) => print!("{witness}"),
                Some(Witness::Invalidity(witness)) => print!("{witness}"),
                None => {}
            }
        }
        if self.validate && result.witness.is_some() {
            match engine::validate_witness(graph, &result, conf) {
                Ok(true) => log::info!("witness validated"),
                Ok(false) => {
                    eprintln!("witness validation failed");
                    process::exit(2);
                }
                Err(err) => {
                    eprintln!("witness validation errored: {err}");
                    process::exit(2);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let app = App::parse_from([
            "chc-verifier",
            "--engine",
            "accel-split",
            "--solver",
            "opensmt",
            "--print-witness",
            "-vv",
            "input.smt2",
        ]);
        assert_eq!(app.engine, EngineArg::AccelSplit);
        assert_eq!(app.solver, SolverArg::Opensmt);
        assert_eq!(app.verbose, 2);
        let options = app.engine_options();
        assert_eq!(options.engine, EngineKind::AccelSplit);
        assert!(options.compute_witness);
    }

    #[test]
    fn test_default_engine_is_kind() {
        let app = App::parse_from(["chc-verifier", "input.smt2"]);
        assert_eq!(app.engine_options().engine, EngineKind::Kind);
        assert!(!app.engine_options().compute_witness);
    }
}
