// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The incremental SAT oracle: a thin layer over the [CaDiCaL][cadical] SAT
//! solver adding what the encoders need on top, that is a contiguous
//! variable allocator with pinned true/false bits, a Tseitin gate
//! translator, and removable clauses realised with selector literals passed
//! as assumptions.
//!
//! [cadical]: https://fmv.jku.at/cadical/

use crate::SolveError;

/// A propositional variable. CaDiCaL variables are positive `i32`s.
pub type Var = i32;

/// A literal: a variable or its negation.
pub type Lit = i32;

/// Handle to a removable clause; spend it with [`Oracle::remove`].
#[derive(Debug)]
pub struct ClauseHandle(Var);

/// The oracle owned by one solver run.
pub struct Oracle {
    sat: cadical::Solver,
    next_var: Var,
    one: Var,
    zero: Var,
    assumptions: Vec<Var>,
    contradiction: bool,
    budget_ms: Option<u64>,
}

impl Oracle {
    /// A fresh oracle. `budget_ms` bounds each satisfiability call.
    pub fn new(budget_ms: Option<u64>) -> Oracle {
        let mut oracle = Oracle {
            sat: cadical::Solver::default(),
            next_var: 1,
            one: 0,
            zero: 0,
            assumptions: vec![],
            contradiction: false,
            budget_ms,
        };
        oracle.one = oracle.alloc(1);
        oracle.zero = oracle.alloc(1);
        let (one, zero) = (oracle.one, oracle.zero);
        oracle.add_clause(&[one]);
        oracle.add_clause(&[-zero]);
        oracle
    }

    /// The variable pinned true.
    pub fn one(&self) -> Var {
        self.one
    }

    /// The variable pinned false.
    pub fn zero(&self) -> Var {
        self.zero
    }

    /// First of `n` fresh contiguous variables.
    pub fn alloc(&mut self, n: usize) -> Var {
        let first = self.next_var;
        self.next_var += n as i32;
        first
    }

    /// Add a permanent clause. The empty clause trips the contradiction flag
    /// instead of reaching the backend.
    pub fn add_clause(&mut self, lits: &[Lit]) {
        if lits.is_empty() {
            self.contradiction = true;
            return;
        }
        self.sat.add_clause(lits.iter().copied());
    }

    /// Whether an empty clause has been added, making the instance trivially
    /// unsatisfiable.
    pub fn contradiction(&self) -> bool {
        self.contradiction
    }

    /// Add a clause that can later be retired with [`Oracle::remove`]. The
    /// clause is guarded by a fresh selector assumed true until retirement.
    pub fn add_removable(&mut self, lits: &[Lit]) -> ClauseHandle {
        let selector = self.alloc(1);
        let mut clause = Vec::with_capacity(lits.len() + 1);
        clause.extend_from_slice(lits);
        clause.push(-selector);
        self.sat.add_clause(clause);
        self.assumptions.push(selector);
        ClauseHandle(selector)
    }

    /// Retire a removable clause: stop assuming its selector and pin the
    /// selector false so the guarded clause is satisfied forever.
    pub fn remove(&mut self, handle: ClauseHandle) {
        self.assumptions.retain(|&s| s != handle.0);
        self.sat.add_clause([-handle.0]);
    }

    /// Budget for each subsequent satisfiability call.
    pub fn set_budget_ms(&mut self, budget_ms: Option<u64>) {
        self.budget_ms = budget_ms;
    }

    /// Run the backend under the current assumptions.
    pub fn is_satisfiable(&mut self) -> Result<bool, SolveError> {
        if self.contradiction {
            return Ok(false);
        }
        if let Some(ms) = self.budget_ms {
            self.sat
                .set_callbacks(Some(cadical::Timeout::new(ms as f32 / 1000.0)));
        }
        match self.sat.solve_with(self.assumptions.iter().copied()) {
            Some(sat) => Ok(sat),
            None => Err(SolveError::SatSolverFailed),
        }
    }

    /// Value of `var` in the last SAT model. Only meaningful directly after
    /// [`Oracle::is_satisfiable`] returned true.
    pub fn model_value(&self, var: Var) -> bool {
        self.sat.value(var).unwrap_or(false)
    }

    /// Clauses making `y` equivalent to the conjunction of `xs`. An empty
    /// conjunction pins `y` true.
    pub fn and_gate(&mut self, y: Var, xs: &[Lit]) {
        for &x in xs {
            self.add_clause(&[-y, x]);
        }
        let mut clause: Vec<Lit> = xs.iter().map(|&x| -x).collect();
        clause.push(y);
        self.add_clause(&clause);
    }

    /// Clauses making `y` equivalent to the disjunction of `xs`. An empty
    /// disjunction pins `y` false.
    pub fn or_gate(&mut self, y: Var, xs: &[Lit]) {
        for &x in xs {
            self.add_clause(&[y, -x]);
        }
        let mut clause: Vec<Lit> = xs.to_vec();
        clause.push(-y);
        self.add_clause(&clause);
    }

    /// Clauses making `y` equivalent to `a <-> b`.
    pub fn iff_gate(&mut self, y: Var, a: Lit, b: Lit) {
        self.add_clause(&[-y, -a, b]);
        self.add_clause(&[-y, a, -b]);
        self.add_clause(&[y, -a, -b]);
        self.add_clause(&[y, a, b]);
    }

    /// Clauses making `y` equivalent to `!x`.
    pub fn not_gate(&mut self, y: Var, x: Lit) {
        self.add_clause(&[y, x]);
        self.add_clause(&[-y, -x]);
    }

    /// Pin `y` false.
    pub fn gate_false(&mut self, y: Var) {
        self.add_clause(&[-y]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_bits() {
        let mut oracle = Oracle::new(None);
        assert!(oracle.is_satisfiable().unwrap());
        assert!(oracle.model_value(oracle.one()));
        assert!(!oracle.model_value(oracle.zero()));
    }

    #[test]
    fn alloc_is_contiguous() {
        let mut oracle = Oracle::new(None);
        let a = oracle.alloc(3);
        let b = oracle.alloc(1);
        assert_eq!(b, a + 3);
    }

    #[test]
    fn and_gate_truth_table() {
        for (x1, x2, expected) in [(1, 1, true), (1, -1, false), (-1, 1, false)] {
            let mut oracle = Oracle::new(None);
            let a = oracle.alloc(2);
            let b = a + 1;
            let y = oracle.alloc(1);
            oracle.and_gate(y, &[a, b]);
            oracle.add_clause(&[x1 * a]);
            oracle.add_clause(&[x2 * b]);
            assert!(oracle.is_satisfiable().unwrap());
            assert_eq!(oracle.model_value(y), expected);
        }
    }

    #[test]
    fn or_and_not_gates() {
        let mut oracle = Oracle::new(None);
        let a = oracle.alloc(2);
        let b = a + 1;
        let or = oracle.alloc(1);
        oracle.or_gate(or, &[a, b]);
        let not_a = oracle.alloc(1);
        oracle.not_gate(not_a, a);
        oracle.add_clause(&[-a]);
        oracle.add_clause(&[b]);
        assert!(oracle.is_satisfiable().unwrap());
        assert!(oracle.model_value(or));
        assert!(oracle.model_value(not_a));
    }

    #[test]
    fn iff_gate_tracks_equality() {
        let mut oracle = Oracle::new(None);
        let a = oracle.alloc(2);
        let b = a + 1;
        let y = oracle.alloc(1);
        oracle.iff_gate(y, a, b);
        oracle.add_clause(&[a]);
        oracle.add_clause(&[-b]);
        assert!(oracle.is_satisfiable().unwrap());
        assert!(!oracle.model_value(y));
    }

    #[test]
    fn removable_clauses_come_and_go() {
        let mut oracle = Oracle::new(None);
        let x = oracle.alloc(1);
        oracle.add_clause(&[x]);
        let handle = oracle.add_removable(&[-x]);
        assert!(!oracle.is_satisfiable().unwrap());
        oracle.remove(handle);
        assert!(oracle.is_satisfiable().unwrap());
        assert!(oracle.model_value(x));
    }

    #[test]
    fn empty_clause_is_a_contradiction() {
        let mut oracle = Oracle::new(None);
        assert!(!oracle.contradiction());
        oracle.add_clause(&[]);
        assert!(oracle.contradiction());
        assert!(!oracle.is_satisfiable().unwrap());
    }

    #[test]
    fn gate_false_pins() {
        let mut oracle = Oracle::new(None);
        let y = oracle.alloc(1);
        oracle.gate_false(y);
        assert!(oracle.is_satisfiable().unwrap());
        assert!(!oracle.model_value(y));
    }
}
