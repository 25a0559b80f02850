// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! End-to-end tests over the example inputs. The structural tests run
//! everywhere; the tests that need a real solver binary are ignored by
//! default and run with `cargo test -- --ignored` on a machine with the
//! solvers installed.

use std::fs;
use std::path::Path;

use chc_verifier::horn::read_system;
use engine::options::{EngineKind, EngineOptions};
use engine::result::{Diagnostic, VerificationAnswer};
use engine::transform::towards_transition_systems;
use engine::ts::is_transition_system;
use solver::backends::{GenericBackend, SolverType};
use solver::basics::ScriptedFactory;
use solver::conf::SolverConf;
use solver::solver_path;

fn read_input(name: &str) -> chc::graph::DirectedHyperGraph {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/inputs")
        .join(name);
    let contents = fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("could not read {}: {err}", path.display()));
    read_system(&contents).unwrap_or_else(|err| panic!("could not parse {name}: {err}"))
}

#[test]
fn test_inputs_parse() {
    for name in [
        "safe_counter.smt2",
        "bounded_unsafe.smt2",
        "chain_safe.smt2",
        "nonlinear_unknown.smt2",
        "deep_counter.smt2",
    ] {
        let graph = read_input(name);
        assert!(graph.edge_count() >= 2, "{name} lost clauses");
    }
}

#[test]
fn test_rewriter_produces_transition_systems() {
    for name in ["safe_counter.smt2", "bounded_unsafe.smt2", "chain_safe.smt2"] {
        let graph = read_input(name);
        let pipeline = towards_transition_systems();
        let (rewritten, _) = pipeline.transform(graph).unwrap();
        assert!(rewritten.is_normal(), "{name} failed to normalise");
        assert!(
            is_transition_system(&rewritten.to_normal_graph()),
            "{name} did not reduce to a transition system"
        );
    }
}

#[test]
fn test_rewriter_is_idempotent() {
    for name in ["safe_counter.smt2", "chain_safe.smt2", "nonlinear_unknown.smt2"] {
        let graph = read_input(name);
        let pipeline = towards_transition_systems();
        let (once, _) = pipeline.transform(graph).unwrap();
        let before: Vec<_> = once.edges().map(|e| (e.from.clone(), e.to, e.label.clone())).collect();
        let (twice, _) = pipeline.transform(once).unwrap();
        let after: Vec<_> = twice.edges().map(|e| (e.from.clone(), e.to, e.label.clone())).collect();
        assert_eq!(before, after, "{name} pipeline is not idempotent");
    }
}

#[test]
fn test_nonlinear_input_is_unknown_without_solving() {
    let graph = read_input("nonlinear_unknown.smt2");
    // no scripted responses: the verdict must be reached without a solver
    let factory = ScriptedFactory::new();
    let options = EngineOptions::default();
    let result = engine::solve(&graph, &options, &factory).unwrap();
    assert_eq!(result.answer, VerificationAnswer::Unknown);
    assert!(matches!(
        result.diagnostic,
        Some(Diagnostic::UnsupportedFragment(_))
    ));
}

fn z3_conf() -> SolverConf {
    SolverConf {
        backend: GenericBackend::new(SolverType::Z3, &solver_path("z3")),
        tee: None,
    }
}

fn opensmt_conf() -> SolverConf {
    SolverConf {
        backend: GenericBackend::new(SolverType::OpenSmt, &solver_path("opensmt")),
        tee: None,
    }
}

#[test]
#[ignore = "requires z3 on PATH"]
fn test_safe_counter_with_kind() {
    let graph = read_input("safe_counter.smt2");
    let options = EngineOptions {
        engine: EngineKind::Kind,
        ..EngineOptions::default()
    };
    let result = engine::solve(&graph, &options, &z3_conf()).unwrap();
    assert_eq!(result.answer, VerificationAnswer::Safe);
    assert!(engine::validate_witness(&graph, &result, &z3_conf()).unwrap());
}

#[test]
#[ignore = "requires z3 on PATH"]
fn test_bounded_unsafe_with_bmc() {
    let graph = read_input("bounded_unsafe.smt2");
    let options = EngineOptions {
        engine: EngineKind::Bmc,
        ..EngineOptions::default()
    };
    let result = engine::solve(&graph, &options, &z3_conf()).unwrap();
    assert_eq!(result.answer, VerificationAnswer::Unsafe);
    let Some(engine::result::Witness::Invalidity(witness)) = &result.witness else {
        panic!("missing counterexample");
    };
    assert_eq!(witness.length(), 3);
    assert!(engine::validate_witness(&graph, &result, &z3_conf()).unwrap());
}

#[test]
#[ignore = "requires z3 on PATH"]
fn test_chain_safe_with_kind() {
    let graph = read_input("chain_safe.smt2");
    let options = EngineOptions {
        engine: EngineKind::Kind,
        ..EngineOptions::default()
    };
    let result = engine::solve(&graph, &options, &z3_conf()).unwrap();
    assert_eq!(result.answer, VerificationAnswer::Safe);
}

#[test]
#[ignore = "requires opensmt on PATH"]
fn test_deep_counter_with_acceleration() {
    let graph = read_input("deep_counter.smt2");
    let options = EngineOptions {
        engine: EngineKind::AccelSplit,
        ..EngineOptions::default()
    };
    let result = engine::solve(&graph, &options, &opensmt_conf()).unwrap();
    assert_eq!(result.answer, VerificationAnswer::Unsafe);
}
