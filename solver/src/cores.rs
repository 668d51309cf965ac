// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Unsat-core extraction for the table strategy: activate sub-problems one
//! at a time, in input order, re-solving until the restricted family is
//! itself unsatisfiable. The returned core is the set of sub-problems whose
//! tables the final run actually had to instantiate; a sub-problem that was
//! active but never rejected cannot have contributed to the conflict.

use crate::table;
use ccu::problem::{Problem, SolveResult};

/// Extract a core for a problem already known UNSAT.
///
/// `cached` is the core the solving run recorded when it declared UNSAT; if
/// present it is returned as-is. Cancellation falls back to the full index
/// set, which is always a sound core.
pub fn extract(
    problem: &mut Problem,
    cached: Option<&[usize]>,
    timeout: &mut dyn FnMut() -> bool,
    budget_ms: Option<u64>,
) -> Vec<usize> {
    if let Some(core) = cached {
        return core.to_vec();
    }

    let saved = problem.active_indices();
    let num_subs = problem.sub_problems().len();
    for index in 0..num_subs {
        problem.deactivate(index);
    }

    let mut found = None;
    for index in 0..num_subs {
        problem.activate(index);
        match table::solve(problem, timeout, budget_ms) {
            Ok(outcome) if outcome.result == SolveResult::Sat => {
                log::debug!("core: sub-problems 0..={index} are satisfiable, widening");
            }
            Ok(outcome) => {
                found = Some(outcome.core);
                break;
            }
            Err(_) => {
                log::debug!("core: extraction cancelled, returning the full index set");
                found = Some((0..num_subs).collect());
                break;
            }
        }
    }

    for index in 0..num_subs {
        problem.deactivate(index);
    }
    for &index in &saved {
        problem.activate(index);
    }

    match found {
        Some(core) => core,
        None => panic!("unsat core extraction activated every sub-problem without finding a conflict"),
    }
}
