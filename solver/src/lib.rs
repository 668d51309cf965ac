// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! SAT-based decision procedure for simultaneous congruence-closure
//! unification with finite domains.
//!
//! A problem is a family of sub-problems sharing one set of terms: each
//! sub-problem brings ground function equations and a disjunctive equality
//! goal, and every term ranges over a finite domain. The problem is SAT iff
//! one assignment of terms to domain values satisfies, under each
//! sub-problem's congruence closure, at least one of its sub-goals.
//!
//! Two strategies reduce this to propositional SAT over the [CaDiCaL][cadical]
//! backend: [`Strategy::Lazy`] guesses assignments and refines with blocking
//! clauses, [`Strategy::Table`] unfolds congruence-closure rounds into an
//! incremental tabular encoding.
//!
//! [cadical]: https://fmv.jku.at/cadical/

// configure clippy
#![allow(clippy::needless_return)]
#![allow(clippy::type_complexity)]
#![deny(clippy::uninlined_format_args)]
// documentation-related lints (only checked when running rustdoc)
#![warn(missing_docs)]
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod bits;
pub mod cores;
pub mod lazy;
pub mod oracle;
pub mod table;

pub use ccu::problem::{FunEq, Goal, ProblemError, SolveResult, TermId};

use ccu::problem::Problem;
use fxhash::FxHashMap;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Which solving strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Guess a full assignment, verify it with explicit congruence closure,
    /// refine with minimised blocking clauses.
    Lazy,
    /// Encode a growing unfolding of congruence-closure rounds and stop at
    /// the first reachable goal or at saturation.
    #[default]
    Table,
}

/// An error aborting a solve.
#[derive(Debug, Error)]
pub enum SolveError {
    /// The host's timeout checker asked for an abort.
    #[error("solving was interrupted by the timeout checker")]
    Timeout,
    /// The SAT backend gave up, likely exceeding its per-call budget.
    #[error("the SAT solver gave up, likely exceeding its budget")]
    SatSolverFailed,
}

/// Callback polled at cancellation points; returns true once the host's
/// deadline has passed.
pub type TimeoutChecker = Box<dyn FnMut() -> bool>;

/// Configuration of a solver instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverConf {
    /// The strategy to dispatch to.
    pub strategy: Strategy,
    /// Budget for each individual SAT oracle call, if any.
    pub max_call_ms: Option<u64>,
}

/// What a strategy run produced.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// SAT or UNSAT.
    pub result: SolveResult,
    /// The satisfying assignment, term to assigned term, on SAT.
    pub assignment: Option<Vec<TermId>>,
    /// On UNSAT, the sub-problem indices involved in the conflict.
    pub core: Vec<usize>,
}

impl SolveOutcome {
    pub(crate) fn sat(assignment: Vec<TermId>) -> SolveOutcome {
        SolveOutcome {
            result: SolveResult::Sat,
            assignment: Some(assignment),
            core: vec![],
        }
    }

    pub(crate) fn unsat(core: impl IntoIterator<Item = usize>) -> SolveOutcome {
        SolveOutcome {
            result: SolveResult::Unsat,
            assignment: None,
            core: core.into_iter().collect(),
        }
    }
}

/// The host boundary: interns host-level terms and function symbols to dense
/// integer ids, drives the integer engine, and maps models back.
///
/// The declared domain order is the canonical term order, which fixes the
/// bit width and makes solving deterministic for a deterministic backend.
pub struct CcuSolver<T, F> {
    conf: SolverConf,
    timeout: TimeoutChecker,
    terms: Vec<T>,
    term_ids: FxHashMap<T, TermId>,
    funcs: Vec<F>,
    func_ids: FxHashMap<F, usize>,
    problem: Option<Problem>,
    outcome: Option<SolveOutcome>,
}

impl<T, F> CcuSolver<T, F>
where
    T: Clone + Eq + Hash + Debug,
    F: Clone + Eq + Hash + Debug,
{
    /// A solver with the given configuration and timeout checker.
    pub fn new(conf: SolverConf, timeout: TimeoutChecker) -> CcuSolver<T, F> {
        CcuSolver {
            conf,
            timeout,
            terms: vec![],
            term_ids: FxHashMap::default(),
            funcs: vec![],
            func_ids: FxHashMap::default(),
            problem: None,
            outcome: None,
        }
    }

    /// A solver with the given strategy, no timeout, and no per-call budget.
    pub fn with_strategy(strategy: Strategy) -> CcuSolver<T, F> {
        CcuSolver::new(
            SolverConf {
                strategy,
                max_call_ms: None,
            },
            Box::new(|| false),
        )
    }

    /// Load a problem. `domains` declares every term and its candidate
    /// values (declaration order is the canonical term order); `goals` and
    /// `fun_apps` pair up into sub-problems, every one initially active.
    pub fn create_problem(
        &mut self,
        domains: &[(T, Vec<T>)],
        goals: &[Vec<Vec<(T, T)>>],
        fun_apps: &[Vec<(F, Vec<T>, T)>],
    ) -> Result<(), ProblemError> {
        self.release();

        for (term, _) in domains {
            if self
                .term_ids
                .insert(term.clone(), self.terms.len())
                .is_some()
            {
                return Err(ProblemError::DuplicateTerm(format!("{term:?}")));
            }
            self.terms.push(term.clone());
        }

        let mut int_domains = Vec::with_capacity(domains.len());
        for (_, domain) in domains {
            let mut ids = Vec::with_capacity(domain.len());
            for value in domain {
                ids.push(self.term_id(value)?);
            }
            int_domains.push(ids);
        }

        let mut int_goals = Vec::with_capacity(goals.len());
        for subgoals in goals {
            let mut goal = Goal::default();
            for subgoal in subgoals {
                let mut pairs = Vec::with_capacity(subgoal.len());
                for (s, t) in subgoal {
                    pairs.push((self.term_id(s)?, self.term_id(t)?));
                }
                goal.subgoals.push(pairs);
            }
            int_goals.push(goal);
        }

        let mut int_fun_eqs = Vec::with_capacity(fun_apps.len());
        for apps in fun_apps {
            let mut eqs = Vec::with_capacity(apps.len());
            for (func, args, result) in apps {
                let func = self.func_id(func);
                let mut arg_ids = Vec::with_capacity(args.len());
                for arg in args {
                    arg_ids.push(self.term_id(arg)?);
                }
                eqs.push(FunEq {
                    func,
                    args: arg_ids,
                    result: self.term_id(result)?,
                });
            }
            int_fun_eqs.push(eqs);
        }

        self.problem = Some(Problem::new(int_domains, int_goals, int_fun_eqs)?);
        Ok(())
    }

    /// Run the configured strategy to a definite answer. The result and, on
    /// SAT, the assignment are cached on the problem.
    pub fn solve(&mut self) -> Result<SolveResult, SolveError> {
        let problem = self
            .problem
            .as_mut()
            .expect("solve called before create_problem");
        problem.clear_cached();
        self.outcome = None;
        log::debug!(
            "solving {} sub-problems over {} terms with {:?}",
            problem.sub_problems().len(),
            problem.num_terms(),
            self.conf.strategy
        );
        let outcome = match self.conf.strategy {
            Strategy::Lazy => lazy::solve(problem, self.timeout.as_mut(), self.conf.max_call_ms)?,
            Strategy::Table => table::solve(problem, self.timeout.as_mut(), self.conf.max_call_ms)?,
        };
        problem.result = Some(outcome.result);
        problem.assignment = outcome.assignment.clone();
        let result = outcome.result;
        self.outcome = Some(outcome);
        Ok(result)
    }

    /// Re-solve the current problem, typically after activation toggles.
    pub fn solve_again(&mut self) -> Result<SolveResult, SolveError> {
        assert!(
            self.problem.is_some(),
            "solve_again called before create_problem"
        );
        self.solve()
    }

    /// The model of the last SAT solve: each term mapped to the term whose
    /// value it was assigned. `None` before a solve or after UNSAT.
    pub fn model(&self) -> Option<HashMap<T, T>> {
        let assignment = self.problem.as_ref()?.assignment.as_ref()?;
        Some(
            assignment
                .iter()
                .enumerate()
                .map(|(t, &v)| (self.terms[t].clone(), self.terms[v].clone()))
                .collect(),
        )
    }

    /// Sub-problem indices whose conjunction is itself unsatisfiable. Only
    /// valid after an UNSAT solve; extraction is bounded by `timeout_ms` and
    /// falls back to the full index set when cancelled.
    pub fn unsat_core(&mut self, timeout_ms: u64) -> Vec<usize> {
        let problem = self
            .problem
            .as_mut()
            .expect("unsat_core called before create_problem");
        assert_eq!(
            problem.result,
            Some(SolveResult::Unsat),
            "unsat_core requires a prior UNSAT result"
        );
        let cached = self.outcome.as_ref().map(|outcome| outcome.core.clone());
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let host = self.timeout.as_mut();
        let mut checker = move || host() || Instant::now() >= deadline;
        cores::extract(
            problem,
            cached.as_deref(),
            &mut checker,
            self.conf.max_call_ms,
        )
    }

    /// Let sub-problem `index` take part in solving again.
    pub fn activate_problem(&mut self, index: usize) {
        let problem = self
            .problem
            .as_mut()
            .expect("activate_problem called before create_problem");
        problem.activate(index);
        problem.clear_cached();
        self.outcome = None;
    }

    /// Withdraw sub-problem `index` from solving.
    pub fn deactivate_problem(&mut self, index: usize) {
        let problem = self
            .problem
            .as_mut()
            .expect("deactivate_problem called before create_problem");
        problem.deactivate(index);
        problem.clear_cached();
        self.outcome = None;
    }

    /// Release the installed problem and every interned symbol.
    pub fn reset(&mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.terms.clear();
        self.term_ids.clear();
        self.funcs.clear();
        self.func_ids.clear();
        self.problem = None;
        self.outcome = None;
    }

    fn term_id(&self, term: &T) -> Result<TermId, ProblemError> {
        self.term_ids
            .get(term)
            .copied()
            .ok_or_else(|| ProblemError::UndeclaredTerm(format!("{term:?}")))
    }

    fn func_id(&mut self, func: &F) -> usize {
        if let Some(&id) = self.func_ids.get(func) {
            return id;
        }
        let id = self.funcs.len();
        self.funcs.push(func.clone());
        self.func_ids.insert(func.clone(), id);
        id
    }
}
