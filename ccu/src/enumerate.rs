// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Explicit enumeration over the assignment space: walk the cartesian
//! product of all domains in canonical order and hand each assignment to
//! the congruence-closure verifier.
//!
//! The space is exponential in the number of terms, so this is no solving
//! strategy; it is the ground truth the SAT-based strategies are checked
//! against on small instances.

use crate::congruence;
use crate::problem::{Problem, TermId};
use itertools::Itertools;

/// The first assignment, in canonical order, satisfying every active
/// sub-problem, or `None` if no assignment does.
pub fn first_satisfying(problem: &Problem) -> Option<Vec<TermId>> {
    let num_terms = problem.num_terms();
    problem
        .domains()
        .iter()
        .map(|domain| domain.iter().copied())
        .multi_cartesian_product()
        .find(|assignment| {
            problem
                .sub_problems()
                .iter()
                .filter(|sub| sub.is_active())
                .all(|sub| congruence::verifies(num_terms, &sub.fun_eqs, &sub.goal, assignment))
        })
}

/// Whether any assignment satisfies every active sub-problem.
pub fn satisfiable(problem: &Problem) -> bool {
    first_satisfying(problem).is_some()
}
