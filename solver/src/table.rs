// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The table strategy: encode a bounded unfolding of congruence closure
//! directly into SAT. Each sub-problem gets a *table* whose columns assign
//! every term a value; column 0 is the shared input assignment and each
//! derived column applies one round of the functionality axiom. The
//! unfolding grows one column at a time until the goal is reachable or no
//! column can change anything anymore (saturation).
//!
//! Tables are instantiated lazily: a sub-problem whose goal happens to hold
//! under the oracle's current model never pays for its own encoding.

use crate::bits::{self, BitVec, EqMemo, ValMemo};
use crate::oracle::{Oracle, Var};
use crate::{SolveError, SolveOutcome};
use ccu::congruence;
use ccu::problem::{Problem, SubProblem, TermId};
use fxhash::FxHashMap;
use itertools::Itertools;

/// One enabled rewrite opportunity: equation `lhs`'s result row may take the
/// value of equation `rhs`'s result, provided the arguments coincide and the
/// values are strictly ordered.
#[derive(Debug, Clone, Copy)]
struct Rewrite {
    lhs: usize,
    rhs: usize,
}

/// One sub-problem's unfolding.
struct Table {
    sub: usize,
    /// Rewrite candidates, enumerated in the lexicographic order of the
    /// equation list. The emission order of their firing bits doubles as the
    /// canonical order used to break symmetry between competing rewrites.
    rewrites: Vec<Rewrite>,
    /// `columns[k][t]` is term `t`'s value vector at unfolding step `k`.
    columns: Vec<Vec<BitVec>>,
    /// Firing bits of the last derived column.
    v_bits: Vec<Var>,
}

impl Table {
    fn new(sub_index: usize, sub: &SubProblem, input: &[BitVec]) -> Table {
        let mut rewrites = vec![];
        for (i, e1) in sub.fun_eqs.iter().enumerate() {
            for (j, e2) in sub.fun_eqs.iter().enumerate() {
                if i == j
                    || e1.func != e2.func
                    || e1.args.len() != e2.args.len()
                    || e1.result == e2.result
                {
                    continue;
                }
                let unifiable = e1
                    .args
                    .iter()
                    .zip(&e2.args)
                    .all(|(&a, &b)| sub.dq.may_equal(a, b));
                if unifiable {
                    rewrites.push(Rewrite { lhs: i, rhs: j });
                }
            }
        }
        Table {
            sub: sub_index,
            rewrites,
            columns: vec![input.to_vec()],
            v_bits: vec![],
        }
    }

    fn current(&self) -> &[BitVec] {
        self.columns.last().unwrap()
    }

    /// Emit the clauses of one more unfolding step.
    ///
    /// For the new column `c`:
    /// - a term whose previous value names another term follows that term's
    ///   new value (so chains compress one step per column);
    /// - each rewrite gets a firing bit: arguments pairwise equal at `c - 1`
    ///   and left result value strictly greater than the right one;
    /// - a representative (a term whose previous value is itself) either
    ///   keeps its value with no rewrite firing on its row, or takes the new
    ///   value of the lowest firing rewrite's right result.
    fn add_derived_column(&mut self, oracle: &mut Oracle, problem: &Problem, sub: &SubProblem) {
        let num_terms = problem.num_terms();
        let width = problem.bits();
        let prev = self.current().to_vec();
        let cur: Vec<BitVec> = (0..num_terms)
            .map(|_| {
                let first = oracle.alloc(width);
                (first..first + width as Var).collect()
            })
            .collect();

        let mut prev_eq = EqMemo::new();
        let mut prev_val = ValMemo::new();
        let mut cur_eq = EqMemo::new();
        let mut cur_val = ValMemo::new();
        let mut gt_memo: FxHashMap<(TermId, TermId), Var> = FxHashMap::default();

        // chain compression
        for t in 0..num_terms {
            for u in 0..num_terms {
                if u == t {
                    continue;
                }
                let points_at = prev_val.bit(oracle, &prev, t, u);
                let follows = cur_eq.bit(oracle, &cur, t, u);
                oracle.add_clause(&[-points_at, follows]);
            }
        }

        // firing bits
        let mut v_bits = Vec::with_capacity(self.rewrites.len());
        for &Rewrite { lhs, rhs } in &self.rewrites {
            let e1 = &sub.fun_eqs[lhs];
            let e2 = &sub.fun_eqs[rhs];
            let arg_bit = if e1.args.is_empty() {
                oracle.one()
            } else {
                let per_arg = e1
                    .args
                    .iter()
                    .zip(&e2.args)
                    .map(|(&a, &b)| prev_eq.bit(oracle, &prev, a, b))
                    .collect_vec();
                let out = oracle.alloc(1);
                oracle.and_gate(out, &per_arg);
                out
            };
            let gt_bit = *gt_memo
                .entry((e1.result, e2.result))
                .or_insert_with(|| bits::term_gt_term(oracle, &prev[e1.result], &prev[e2.result]));
            let fire = oracle.alloc(1);
            oracle.and_gate(fire, &[arg_bit, gt_bit]);
            v_bits.push(fire);
        }

        // representative commitment
        for t in 0..num_terms {
            let was_rep = prev_val.bit(oracle, &prev, t, t);
            let row_fires = v_bits
                .iter()
                .zip(&self.rewrites)
                .map(|(&fire, &Rewrite { lhs, .. })| {
                    let on_row = prev_val.bit(oracle, &prev, sub.fun_eqs[lhs].result, t);
                    let out = oracle.alloc(1);
                    oracle.and_gate(out, &[fire, on_row]);
                    out
                })
                .collect_vec();

            let keeps = cur_val.bit(oracle, &cur, t, t);
            let mut identity_inputs = row_fires.iter().map(|&f| -f).collect_vec();
            identity_inputs.push(keeps);
            let identity = oracle.alloc(1);
            oracle.and_gate(identity, &identity_inputs);

            let mut commitment = vec![-was_rep, identity];
            for (k, (&fire, &Rewrite { rhs, .. })) in
                row_fires.iter().zip(&self.rewrites).enumerate()
            {
                let takes = cur_eq.bit(oracle, &cur, t, sub.fun_eqs[rhs].result);
                // canonical choice: all earlier rewrites must miss this row
                let mut inputs = vec![fire, takes];
                inputs.extend(row_fires[..k].iter().map(|&f| -f));
                let rewrite_bit = oracle.alloc(1);
                oracle.and_gate(rewrite_bit, &inputs);
                commitment.push(rewrite_bit);
            }
            oracle.add_clause(&commitment);
        }

        self.columns.push(cur);
        self.v_bits = v_bits;
    }

    /// The goal of `sub` at the current column: one disjunct per sub-goal,
    /// each the conjunction of its pair equalities.
    fn goal_clause(&self, oracle: &mut Oracle, sub: &SubProblem) -> Vec<Var> {
        let column = self.current();
        let mut eq = EqMemo::new();
        sub.goal
            .subgoals
            .iter()
            .map(|pairs| {
                let conj = pairs
                    .iter()
                    .map(|&(s, t)| eq.bit(oracle, column, s, t))
                    .collect_vec();
                let out = oracle.alloc(1);
                oracle.and_gate(out, &conj);
                out
            })
            .collect()
    }
}

/// Keep the input column flat: a term may only point at a term that keeps
/// itself. Pointer chains and cycles would leave derived values
/// underconstrained, and every class reachable by a chained assignment is
/// also reachable by a flat one.
fn flatten_input(oracle: &mut Oracle, problem: &Problem, input: &[BitVec]) {
    let mut vals = ValMemo::new();
    for (t, domain) in problem.domains().iter().enumerate() {
        for &u in domain {
            if u == t {
                continue;
            }
            let points_at = vals.bit(oracle, input, t, u);
            let target_is_rep = vals.bit(oracle, input, u, u);
            oracle.add_clause(&[-points_at, target_is_rep]);
        }
    }
}

/// Run the table strategy to a definite answer.
pub fn solve(
    problem: &Problem,
    timeout: &mut dyn FnMut() -> bool,
    budget_ms: Option<u64>,
) -> Result<SolveOutcome, SolveError> {
    let num_terms = problem.num_terms();
    let mut oracle = Oracle::new(budget_ms);
    let assignments = bits::assignment_column(&mut oracle, problem);
    flatten_input(&mut oracle, problem, &assignments);
    let mut tables: Vec<Option<Table>> = problem.sub_problems().iter().map(|_| None).collect();

    loop {
        if timeout() {
            return Err(SolveError::Timeout);
        }
        let goal_handles = tables
            .iter()
            .flatten()
            .map(|table| {
                let clause = table.goal_clause(&mut oracle, &problem.sub_problems()[table.sub]);
                oracle.add_removable(&clause)
            })
            .collect_vec();
        let sat = oracle.is_satisfiable()?;

        if sat {
            let assignment = bits::decode(&oracle, &assignments);
            for handle in goal_handles {
                oracle.remove(handle);
            }
            let rejected = problem
                .sub_problems()
                .iter()
                .enumerate()
                .filter(|(index, sub)| {
                    sub.is_active()
                        && tables[*index].is_none()
                        && !congruence::verifies(num_terms, &sub.fun_eqs, &sub.goal, &assignment)
                })
                .map(|(index, _)| index)
                .collect_vec();
            if rejected.is_empty() {
                debug_assert!(
                    problem
                        .sub_problems()
                        .iter()
                        .filter(|sub| sub.is_active())
                        .all(|sub| congruence::verifies(
                            num_terms,
                            &sub.fun_eqs,
                            &sub.goal,
                            &assignment
                        )),
                    "a sub-problem with a table produced an unverifiable model"
                );
                log::debug!("table: all sub-problems verified, SAT");
                return Ok(SolveOutcome::sat(assignment));
            }
            for index in rejected {
                let sub = &problem.sub_problems()[index];
                let mut table = Table::new(index, sub, &assignments);
                table.add_derived_column(&mut oracle, problem, sub);
                log::debug!(
                    "table: instantiated sub-problem {index} ({} rewrites)",
                    table.rewrites.len()
                );
                tables[index] = Some(table);
            }
        } else {
            for handle in goal_handles {
                oracle.remove(handle);
            }
            let instantiated = tables.iter().flatten().map(|t| t.sub).collect_vec();
            let v_all = tables
                .iter()
                .flatten()
                .flat_map(|t| t.v_bits.iter().copied())
                .collect_vec();
            if v_all.is_empty() {
                log::debug!("table: no rewrite can fire, UNSAT with core {instantiated:?}");
                return Ok(SolveOutcome::unsat(instantiated));
            }
            let v_handle = oracle.add_removable(&v_all);
            let v_sat = oracle.is_satisfiable();
            oracle.remove(v_handle);
            if !v_sat? {
                log::debug!("table: saturated, UNSAT with core {instantiated:?}");
                return Ok(SolveOutcome::unsat(instantiated));
            }
            for table in tables.iter_mut().flatten() {
                if timeout() {
                    return Err(SolveError::Timeout);
                }
                table.add_derived_column(&mut oracle, problem, &problem.sub_problems()[table.sub]);
            }
            log::debug!("table: goal unreachable yet, grew every table by one column");
        }
    }
}
