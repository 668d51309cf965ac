// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The may-equal matrix over terms, and the operations the solving
//! strategies need from it: functionality propagation, cascading removal,
//! and goal-driven minimisation of the enforced disequalities.
//!
//! An entry `eq[s][t] = true` reads "s and t may still end up equal"; a
//! cleared entry is an enforced disequality. The matrix starts from what the
//! domains allow and is only ever tightened or loosened through the
//! operations below, all of which keep it symmetric and reflexive.

use crate::problem::{FunEq, Goal, TermId};
use itertools::Itertools;
use thiserror::Error;

/// Raised when a cancellation callback interrupts a fixpoint loop.
#[derive(Debug, Error)]
#[error("interrupted by the cancellation callback")]
pub struct Interrupted;

/// Symmetric boolean matrix over terms; `true` means the pair may be equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisequalityMatrix {
    num_terms: usize,
    eq: Vec<bool>,
}

impl DisequalityMatrix {
    /// Initialise from domains: two terms may be equal iff their domains
    /// share a candidate value (both can be assigned that value). With the
    /// self-membership invariant this covers direct assignment of one term
    /// to the other.
    pub fn from_domains(domains: &[Vec<TermId>]) -> DisequalityMatrix {
        let num_terms = domains.len();
        let mut matrix = DisequalityMatrix {
            num_terms,
            eq: vec![false; num_terms * num_terms],
        };
        for s in 0..num_terms {
            for t in s..num_terms {
                let shared = domains[s].iter().any(|d| domains[t].binary_search(d).is_ok());
                if shared {
                    matrix.set(s, t, true);
                }
            }
        }
        matrix
    }

    /// Number of terms the matrix ranges over.
    pub fn num_terms(&self) -> usize {
        self.num_terms
    }

    /// Whether `s` and `t` may still be equal.
    pub fn may_equal(&self, s: TermId, t: TermId) -> bool {
        self.eq[s * self.num_terms + t]
    }

    fn set(&mut self, s: TermId, t: TermId, value: bool) {
        self.eq[s * self.num_terms + t] = value;
        self.eq[t * self.num_terms + s] = value;
    }

    /// Close under functionality to a fixpoint: whenever two equations on
    /// the same symbol have all argument pairs may-equal, their results may
    /// be equal too, and so may the neighbours of the two results (the
    /// closure is deliberately only taken through the result pair, not over
    /// the whole matrix).
    pub fn propagate(&mut self, fun_eqs: &[FunEq]) {
        loop {
            let mut changed = false;
            for (e1, e2) in fun_eqs.iter().tuple_combinations() {
                if e1.func != e2.func || e1.args.len() != e2.args.len() {
                    continue;
                }
                let args_match = e1
                    .args
                    .iter()
                    .zip(&e2.args)
                    .all(|(&a, &b)| self.may_equal(a, b));
                if !args_match {
                    continue;
                }
                let (r1, r2) = (e1.result, e2.result);
                if !self.may_equal(r1, r2) {
                    self.set(r1, r2, true);
                    changed = true;
                }
                for i in 0..self.num_terms {
                    if !self.may_equal(r1, i) {
                        continue;
                    }
                    for j in 0..self.num_terms {
                        if self.may_equal(r2, j) && !self.may_equal(i, j) {
                            self.set(i, j, true);
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                return;
            }
        }
    }

    /// Enforce the disequality of `s` and `t`.
    pub fn remove(&mut self, s: TermId, t: TermId) {
        if s != t {
            self.set(s, t, false);
        }
    }

    /// Enforce the disequality of `s` and `t` and cascade: any functionality
    /// conclusion whose argument match just failed is un-derived as well.
    /// The cascade does not re-check other support for a conclusion, so it
    /// over-removes when a conclusion also holds for an unrelated reason;
    /// callers retracting a single pair incrementally accept that bound.
    pub fn cascade_remove(&mut self, s: TermId, t: TermId, fun_eqs: &[FunEq]) {
        if s == t || !self.may_equal(s, t) {
            return;
        }
        self.set(s, t, false);
        let mut queue = vec![(s, t)];
        while let Some((u, v)) = queue.pop() {
            for (e1, e2) in fun_eqs.iter().tuple_combinations() {
                if e1.func != e2.func || e1.args.len() != e2.args.len() {
                    continue;
                }
                let lost_match = e1
                    .args
                    .iter()
                    .zip(&e2.args)
                    .any(|(&a, &b)| (a, b) == (u, v) || (a, b) == (v, u));
                if !lost_match {
                    continue;
                }
                let (r1, r2) = (e1.result, e2.result);
                if r1 != r2 && self.may_equal(r1, r2) {
                    self.set(r1, r2, false);
                    queue.push((r1, r2));
                }
            }
        }
    }

    /// Shrink the enforced disequalities to a hitting set of the goal: drop
    /// every disequality whose removal (with functionality re-propagation)
    /// still leaves every sub-goal blocked. Disequalities already enforced
    /// by `base` are facts and are never dropped.
    ///
    /// `cancel` is polled once per candidate pair.
    pub fn minimise(
        &mut self,
        goal: &Goal,
        fun_eqs: &[FunEq],
        base: &DisequalityMatrix,
        cancel: &mut dyn FnMut() -> bool,
    ) -> Result<(), Interrupted> {
        for s in 0..self.num_terms {
            for t in s + 1..self.num_terms {
                if self.may_equal(s, t) || !base.may_equal(s, t) {
                    continue;
                }
                if cancel() {
                    return Err(Interrupted);
                }
                let mut trial = self.clone();
                trial.set(s, t, true);
                trial.propagate(fun_eqs);
                let all_blocked = goal.subgoals.iter().all(|subgoal| {
                    subgoal.iter().any(|&(x, y)| !trial.may_equal(x, y))
                });
                if all_blocked {
                    *self = trial;
                }
            }
        }
        Ok(())
    }

    /// The enforced disequalities, as pairs `s < t`.
    pub fn inequalities(&self) -> Vec<(TermId, TermId)> {
        let mut pairs = vec![];
        for s in 0..self.num_terms {
            for t in s + 1..self.num_terms {
                if !self.may_equal(s, t) {
                    pairs.push((s, t));
                }
            }
        }
        pairs
    }
}
