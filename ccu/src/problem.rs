// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Terms, domains, function equations, goals, and the multi-sub-problem
//! container shared by the solving strategies.
//!
//! Terms are dense integer ids; the id order is the canonical term order and
//! fixes the bit width used by the SAT encodings. Translating host-level
//! terms to and from these ids is the driver's job, not this module's.

use crate::disequality::DisequalityMatrix;
use thiserror::Error;

/// A term, identified by its position in the canonical term order.
pub type TermId = usize;

/// A function symbol, identified by its interning order.
pub type FuncId = usize;

/// A ground function equation `f(args) = result`.
///
/// Duplicates are allowed in a sub-problem's equation list and have no
/// additional semantic effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunEq {
    /// The function symbol.
    pub func: FuncId,
    /// The argument terms, in application order.
    pub args: Vec<TermId>,
    /// The result term.
    pub result: TermId,
}

/// A disjunction of conjunctive sub-goals.
///
/// Each sub-goal is a list of pairs read as a conjunction of equalities. An
/// empty sub-goal is vacuously satisfied; a goal with no sub-goals at all is
/// unsatisfiable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Goal {
    /// The sub-goals.
    pub subgoals: Vec<Vec<(TermId, TermId)>>,
}

/// One independent sub-problem: its function equations, its goal, and the
/// precomputed may-equal matrix those induce over the shared domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubProblem {
    /// The ground function equations.
    pub fun_eqs: Vec<FunEq>,
    /// The goal.
    pub goal: Goal,
    /// May-equal matrix from the shared domains, closed under [`FunEq`]
    /// functionality (see [`DisequalityMatrix::propagate`]).
    pub dq: DisequalityMatrix,
    active: bool,
}

impl SubProblem {
    /// Whether this sub-problem currently contributes clauses and a
    /// verification obligation.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// The result of a finished solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveResult {
    /// Some assignment satisfies every active sub-problem.
    Sat,
    /// No assignment does.
    Unsat,
}

/// An error rejecting a problem at load time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProblemError {
    /// A problem needs at least one term.
    #[error("a problem needs at least one term")]
    NoTerms,
    /// A term id referred outside the declared term range.
    #[error("term {0} is out of range ({1} terms are declared)")]
    TermOutOfRange(TermId, usize),
    /// The goal and function-equation lists must pair up one sub-problem each.
    #[error("expected {expected} sub-problems but found {found}")]
    SubProblemMismatch {
        /// Number of goals given.
        expected: usize,
        /// Number of function-equation lists given.
        found: usize,
    },
    /// A host-level term was used without being declared in the domain list.
    #[error("term {0} does not appear in the domain declarations")]
    UndeclaredTerm(String),
    /// A host-level term was declared twice in the domain list.
    #[error("term {0} is declared twice in the domain list")]
    DuplicateTerm(String),
}

/// The number of bits used to encode one term value: enough for every index
/// in the canonical term order, plus one spare high bit.
pub fn value_width(num_terms: usize) -> usize {
    if num_terms <= 1 {
        1
    } else {
        (num_terms - 1).ilog2() as usize + 2
    }
}

/// A CCU instance: an ordered family of sub-problems over one shared set of
/// terms, each term carrying a finite domain of candidate values.
///
/// The container also caches the outcome of the last solve: the result and,
/// on SAT, the satisfying assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    num_terms: usize,
    bits: usize,
    domains: Vec<Vec<TermId>>,
    base_dq: DisequalityMatrix,
    sub_problems: Vec<SubProblem>,
    /// Outcome of the last completed solve, if any.
    pub result: Option<SolveResult>,
    /// The satisfying assignment of the last SAT solve, term to assigned term.
    pub assignment: Option<Vec<TermId>>,
}

impl Problem {
    /// Build and validate a problem. `domains[t]` lists the candidate values
    /// of term `t`; `goals` and `fun_eqs` pair up into sub-problems.
    ///
    /// Domains are sorted, deduplicated, and completed with the term itself
    /// (a term may always be assigned its own value).
    pub fn new(
        mut domains: Vec<Vec<TermId>>,
        goals: Vec<Goal>,
        fun_eqs: Vec<Vec<FunEq>>,
    ) -> Result<Problem, ProblemError> {
        let num_terms = domains.len();
        if num_terms == 0 {
            return Err(ProblemError::NoTerms);
        }
        if goals.len() != fun_eqs.len() {
            return Err(ProblemError::SubProblemMismatch {
                expected: goals.len(),
                found: fun_eqs.len(),
            });
        }

        let check = |t: TermId| {
            if t < num_terms {
                Ok(())
            } else {
                Err(ProblemError::TermOutOfRange(t, num_terms))
            }
        };
        for (t, domain) in domains.iter_mut().enumerate() {
            for &d in domain.iter() {
                check(d)?;
            }
            domain.push(t);
            domain.sort_unstable();
            domain.dedup();
        }
        for goal in &goals {
            for subgoal in &goal.subgoals {
                for &(s, t) in subgoal {
                    check(s)?;
                    check(t)?;
                }
            }
        }
        for eqs in &fun_eqs {
            for eq in eqs {
                for &a in &eq.args {
                    check(a)?;
                }
                check(eq.result)?;
            }
        }

        let base_dq = DisequalityMatrix::from_domains(&domains);
        let sub_problems = goals
            .into_iter()
            .zip(fun_eqs)
            .map(|(goal, fun_eqs)| {
                let mut dq = base_dq.clone();
                dq.propagate(&fun_eqs);
                SubProblem {
                    fun_eqs,
                    goal,
                    dq,
                    active: true,
                }
            })
            .collect();

        Ok(Problem {
            num_terms,
            bits: value_width(num_terms),
            domains,
            base_dq,
            sub_problems,
            result: None,
            assignment: None,
        })
    }

    /// Number of terms.
    pub fn num_terms(&self) -> usize {
        self.num_terms
    }

    /// Bit width of one encoded term value.
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// The normalised domain of every term.
    pub fn domains(&self) -> &[Vec<TermId>] {
        &self.domains
    }

    /// The may-equal matrix induced by the domains alone. Pairs already
    /// unequal here can never be fixed by any assignment.
    pub fn base_dq(&self) -> &DisequalityMatrix {
        &self.base_dq
    }

    /// The sub-problems, in input order.
    pub fn sub_problems(&self) -> &[SubProblem] {
        &self.sub_problems
    }

    /// Let sub-problem `index` contribute clauses and a verification
    /// obligation again.
    pub fn activate(&mut self, index: usize) {
        self.sub_problems[index].active = true;
    }

    /// Withdraw sub-problem `index` from solving.
    pub fn deactivate(&mut self, index: usize) {
        self.sub_problems[index].active = false;
    }

    /// Indices of the currently active sub-problems.
    pub fn active_indices(&self) -> Vec<usize> {
        self.sub_problems
            .iter()
            .enumerate()
            .filter(|(_, sub)| sub.active)
            .map(|(i, _)| i)
            .collect()
    }

    /// Drop the cached result and assignment, e.g. after an activation
    /// toggle made them stale.
    pub fn clear_cached(&mut self) {
        self.result = None;
        self.assignment = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_width_counts_index_bits_plus_spare() {
        assert_eq!(value_width(1), 1);
        assert_eq!(value_width(2), 2);
        assert_eq!(value_width(3), 3);
        assert_eq!(value_width(4), 3);
        assert_eq!(value_width(5), 4);
        assert_eq!(value_width(8), 4);
        assert_eq!(value_width(9), 5);
    }

    #[test]
    fn rejects_empty_and_out_of_range() {
        assert_eq!(
            Problem::new(vec![], vec![], vec![]),
            Err(ProblemError::NoTerms)
        );
        assert_eq!(
            Problem::new(vec![vec![0], vec![7]], vec![], vec![]),
            Err(ProblemError::TermOutOfRange(7, 2))
        );
        assert_eq!(
            Problem::new(vec![vec![0]], vec![Goal::default()], vec![]),
            Err(ProblemError::SubProblemMismatch {
                expected: 1,
                found: 0
            })
        );
    }

    #[test]
    fn domains_are_normalised() {
        let problem = Problem::new(vec![vec![1, 1], vec![]], vec![], vec![]).unwrap();
        assert_eq!(problem.domains(), &[vec![0, 1], vec![1]]);
        assert_eq!(problem.bits(), 2);
    }

    #[test]
    fn activation_toggles() {
        let mut problem = Problem::new(
            vec![vec![0], vec![1]],
            vec![Goal::default(), Goal::default()],
            vec![vec![], vec![]],
        )
        .unwrap();
        assert_eq!(problem.active_indices(), vec![0, 1]);
        problem.deactivate(0);
        assert_eq!(problem.active_indices(), vec![1]);
        problem.activate(0);
        assert_eq!(problem.active_indices(), vec![0, 1]);
    }
}
