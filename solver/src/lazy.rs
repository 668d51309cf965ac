// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The lazy strategy: guess a total assignment with the SAT oracle, verify
//! each sub-problem with explicit congruence closure, and on rejection add
//! a minimised blocking clause saying "at least one disequality the model
//! forces must become an equality".
//!
//! Every iteration rules out at least the current model, and the model
//! space is finite, so the loop terminates.

use crate::bits::{self, EqMemo};
use crate::oracle::Oracle;
use crate::{SolveError, SolveOutcome};
use ccu::congruence;
use ccu::disequality::Interrupted;
use ccu::problem::Problem;
use itertools::Itertools;
use std::collections::BTreeSet;

/// Run the lazy strategy to a definite answer.
pub fn solve(
    problem: &Problem,
    timeout: &mut dyn FnMut() -> bool,
    budget_ms: Option<u64>,
) -> Result<SolveOutcome, SolveError> {
    let num_terms = problem.num_terms();
    let mut oracle = Oracle::new(budget_ms);
    let assignments = bits::assignment_column(&mut oracle, problem);
    let mut memo = EqMemo::new();
    let mut blockers = BTreeSet::new();

    loop {
        if timeout() {
            return Err(SolveError::Timeout);
        }
        if !oracle.is_satisfiable()? {
            return Ok(SolveOutcome::unsat(blockers));
        }
        let assignment = bits::decode(&oracle, &assignments);

        let rejected = problem.sub_problems().iter().enumerate().find(|(_, sub)| {
            sub.is_active()
                && !congruence::verifies(num_terms, &sub.fun_eqs, &sub.goal, &assignment)
        });
        let Some((index, sub)) = rejected else {
            log::debug!("lazy: all sub-problems verified, SAT");
            return Ok(SolveOutcome::sat(assignment));
        };
        blockers.insert(index);

        // Every pair the model keeps in different classes is a disequality
        // it forces; shrink those to a hitting set of the goals. The model's
        // equality pattern is itself a congruence, so enforcing its
        // disequalities directly leaves the matrix closed.
        let mut classes = congruence::close_assignment(num_terms, &sub.fun_eqs, &assignment);
        let mut dq = sub.dq.clone();
        for s in 0..num_terms {
            for t in s + 1..num_terms {
                if !classes.same_class(s, t) {
                    dq.remove(s, t);
                }
            }
        }
        dq.minimise(&sub.goal, &sub.fun_eqs, problem.base_dq(), timeout)
            .map_err(|Interrupted| SolveError::Timeout)?;

        // Disequalities forced by the domains alone can never be repaired
        // and contribute nothing to the clause.
        let pairs = dq
            .inequalities()
            .into_iter()
            .filter(|&(s, t)| problem.base_dq().may_equal(s, t))
            .collect_vec();
        log::debug!(
            "lazy: sub-problem {index} rejected {assignment:?}, blocking over {} pairs",
            pairs.len()
        );
        let clause = pairs
            .iter()
            .map(|&(s, t)| memo.bit(&mut oracle, &assignments, s, t))
            .collect_vec();
        oracle.add_clause(&clause);
        if oracle.contradiction() {
            return Ok(SolveOutcome::unsat(blockers));
        }
    }
}
