// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Engine-facing configuration.

use std::time::{Duration, Instant};

/// Which verification engine to run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EngineKind {
    /// Plain bounded model checking (refutation only)
    Bmc,
    /// Forward and backward k-induction
    Kind,
    /// Power-accelerated reachability with split exact/less-than relations
    AccelSplit,
    /// Power-accelerated reachability with a single transition hierarchy
    AccelSingle,
}

/// Options shared by all engines.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// The engine to dispatch to
    pub engine: EngineKind,
    /// Whether to compute witnesses (an invariant for SAFE, a path for UNSAFE)
    pub compute_witness: bool,
    /// Wall-clock budget for a solve call; `None` runs without a deadline
    pub timeout: Option<Duration>,
    /// Bound on the unrolling depth of the k-induction and BMC engines
    pub max_k: usize,
    /// Bound on the power level of the accelerated engines
    pub max_power: u32,
    /// Bound on refinement iterations within a single reachability query
    pub max_refinements: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            engine: EngineKind::Kind,
            compute_witness: true,
            timeout: None,
            max_k: usize::MAX,
            max_power: 30,
            max_refinements: 10_000,
        }
    }
}

/// A global deadline sampled before each solver check.
#[derive(Debug, Copy, Clone)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// Start the clock on an optional budget.
    pub fn start(timeout: Option<Duration>) -> Self {
        Deadline(timeout.map(|d| Instant::now() + d))
    }

    /// Whether the budget has run out.
    pub fn expired(&self) -> bool {
        self.0.is_some_and(|end| Instant::now() >= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline() {
        assert!(!Deadline::start(None).expired());
        assert!(!Deadline::start(Some(Duration::from_secs(3600))).expired());
        assert!(Deadline::start(Some(Duration::ZERO)).expired());
    }
}
