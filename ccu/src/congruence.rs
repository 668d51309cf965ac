// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The reference congruence-closure check: union-find over term ids, closed
//! under the functionality axiom `a1 = b1, ..., an = bn  =>  f(a) = f(b)`.
//!
//! Solving strategies use this as the ground-truth verifier for candidate
//! assignments; it is deliberately the plainest possible implementation.

use crate::problem::{FunEq, Goal, TermId};
use ena::unify::{InPlaceUnificationTable, UnifyKey};

// wrapper to implement the ena::unify key trait on
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
struct TermKey(u32);

impl UnifyKey for TermKey {
    type Value = ();
    fn index(&self) -> u32 {
        self.0
    }
    fn from_index(u: u32) -> TermKey {
        TermKey(u)
    }
    fn tag() -> &'static str {
        "TermKey"
    }
}

/// Union-find over term ids with on-demand congruence closure.
pub struct Congruence {
    table: InPlaceUnificationTable<TermKey>,
    num_terms: usize,
}

impl Congruence {
    /// Every term starts in its own singleton class.
    pub fn new(num_terms: usize) -> Congruence {
        let mut table = InPlaceUnificationTable::new();
        for _ in 0..num_terms {
            table.new_key(());
        }
        Congruence { table, num_terms }
    }

    /// Merge the classes of `s` and `t`.
    pub fn union(&mut self, s: TermId, t: TermId) {
        self.table.union(TermKey(s as u32), TermKey(t as u32));
    }

    /// Whether `s` and `t` are in the same class.
    pub fn same_class(&mut self, s: TermId, t: TermId) -> bool {
        self.table.unioned(TermKey(s as u32), TermKey(t as u32))
    }

    /// Close under functionality: merge the results of any two equations on
    /// the same symbol whose arguments are pairwise merged, to a fixpoint.
    pub fn close(&mut self, fun_eqs: &[FunEq]) {
        loop {
            let mut changed = false;
            for (i, e1) in fun_eqs.iter().enumerate() {
                for e2 in &fun_eqs[i + 1..] {
                    if e1.func != e2.func || e1.args.len() != e2.args.len() {
                        continue;
                    }
                    if self.same_class(e1.result, e2.result) {
                        continue;
                    }
                    let args_match = e1
                        .args
                        .iter()
                        .zip(&e2.args)
                        .all(|(&a, &b)| self.same_class(a, b));
                    if args_match {
                        self.union(e1.result, e2.result);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Whether some sub-goal has all its pairs merged. An empty sub-goal is
    /// vacuously satisfied.
    pub fn satisfies(&mut self, goal: &Goal) -> bool {
        goal.subgoals
            .iter()
            .any(|subgoal| subgoal.iter().all(|&(s, t)| self.same_class(s, t)))
    }

    /// All pairs `s < t` currently in the same class.
    pub fn equal_pairs(&mut self) -> Vec<(TermId, TermId)> {
        let mut pairs = vec![];
        for s in 0..self.num_terms {
            for t in s + 1..self.num_terms {
                if self.same_class(s, t) {
                    pairs.push((s, t));
                }
            }
        }
        pairs
    }
}

/// The congruence closure induced by an assignment: each term is merged with
/// its assigned value, then the equations are closed under functionality.
pub fn close_assignment(
    num_terms: usize,
    fun_eqs: &[FunEq],
    assignment: &[TermId],
) -> Congruence {
    let mut cc = Congruence::new(num_terms);
    for (t, &v) in assignment.iter().enumerate() {
        cc.union(t, v);
    }
    cc.close(fun_eqs);
    cc
}

/// Whether `assignment` makes the goal hold under the congruence closure of
/// the given equations.
pub fn verifies(
    num_terms: usize,
    fun_eqs: &[FunEq],
    goal: &Goal,
    assignment: &[TermId],
) -> bool {
    close_assignment(num_terms, fun_eqs, assignment).satisfies(goal)
}
