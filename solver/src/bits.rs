// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Bit-level encoders over term values: fresh output bits equivalent to
//! "this term's value is exactly v", "these two terms have the same value",
//! and "this term's value is greater than that one's".
//!
//! A term value is a little-endian vector of propositional variables; where
//! two vectors differ in width the shorter one is padded on the high side
//! with the oracle's pinned-false bit.

use crate::oracle::{Oracle, Var};
use ccu::problem::{Problem, TermId};
use fxhash::FxHashMap;
use itertools::Itertools;

/// Little-endian vector of propositional variables encoding one term value.
pub type BitVec = Vec<Var>;

/// Allocate one value vector per term and constrain each to range over the
/// term's domain. This is column 0 of every encoding: the input assignment.
pub fn assignment_column(oracle: &mut Oracle, problem: &Problem) -> Vec<BitVec> {
    let width = problem.bits();
    let column: Vec<BitVec> = (0..problem.num_terms())
        .map(|_| {
            let first = oracle.alloc(width);
            (first..first + width as Var).collect()
        })
        .collect();
    for (t, domain) in problem.domains().iter().enumerate() {
        let clause = domain
            .iter()
            .map(|&d| term_eq_value(oracle, &column[t], d))
            .collect_vec();
        oracle.add_clause(&clause);
    }
    column
}

/// Fresh bit equivalent to "the vector encodes exactly `value`".
pub fn term_eq_value(oracle: &mut Oracle, bv: &[Var], value: usize) -> Var {
    let lits = bv
        .iter()
        .enumerate()
        .map(|(k, &bit)| if value >> k & 1 == 1 { bit } else { -bit })
        .collect_vec();
    let out = oracle.alloc(1);
    oracle.and_gate(out, &lits);
    out
}

/// Fresh bit equivalent to bitwise equality of the two vectors.
pub fn term_eq_term(oracle: &mut Oracle, a: &[Var], b: &[Var]) -> Var {
    let width = a.len().max(b.len());
    let zero = oracle.zero();
    let mut per_bit = Vec::with_capacity(width);
    for k in 0..width {
        let ab = a.get(k).copied().unwrap_or(zero);
        let bb = b.get(k).copied().unwrap_or(zero);
        let bit_eq = oracle.alloc(1);
        oracle.iff_gate(bit_eq, ab, bb);
        per_bit.push(bit_eq);
    }
    let out = oracle.alloc(1);
    oracle.and_gate(out, &per_bit);
    out
}

/// Fresh bit equivalent to "a > b" over the unsigned values.
///
/// Bits are walked high to low with two rolling chains: "all bits so far
/// equal" and "already strictly greater". A position contributes to the
/// greater chain only while the equal chain still holds above it.
pub fn term_gt_term(oracle: &mut Oracle, a: &[Var], b: &[Var]) -> Var {
    let width = a.len().max(b.len());
    let zero = oracle.zero();
    let mut eq_chain = oracle.one();
    let mut gt_chain = zero;
    for k in (0..width).rev() {
        let ab = a.get(k).copied().unwrap_or(zero);
        let bb = b.get(k).copied().unwrap_or(zero);
        let bit_gt = oracle.alloc(1);
        oracle.and_gate(bit_gt, &[ab, -bb]);
        let bit_eq = oracle.alloc(1);
        oracle.iff_gate(bit_eq, ab, bb);
        let step = oracle.alloc(1);
        oracle.and_gate(step, &[eq_chain, bit_gt]);
        let next_gt = oracle.alloc(1);
        oracle.or_gate(next_gt, &[gt_chain, step]);
        let next_eq = oracle.alloc(1);
        oracle.and_gate(next_eq, &[eq_chain, bit_eq]);
        eq_chain = next_eq;
        gt_chain = next_gt;
    }
    gt_chain
}

/// Memo of pair-equality bits within one fixed column, keyed by unordered
/// term pair. Needed for progress in the lazy strategy (identical blocking
/// clauses must reuse identical bits) and to keep column emission small.
#[derive(Debug, Default)]
pub struct EqMemo {
    bits: FxHashMap<(TermId, TermId), Var>,
}

impl EqMemo {
    /// An empty memo.
    pub fn new() -> EqMemo {
        EqMemo::default()
    }

    /// The memoised equality bit for `(s, t)` over `column`.
    pub fn bit(&mut self, oracle: &mut Oracle, column: &[BitVec], s: TermId, t: TermId) -> Var {
        let key = (s.min(t), s.max(t));
        if let Some(&bit) = self.bits.get(&key) {
            return bit;
        }
        let bit = term_eq_term(oracle, &column[key.0], &column[key.1]);
        self.bits.insert(key, bit);
        bit
    }
}

/// Memo of term-has-value bits within one fixed column.
#[derive(Debug, Default)]
pub struct ValMemo {
    bits: FxHashMap<(TermId, usize), Var>,
}

impl ValMemo {
    /// An empty memo.
    pub fn new() -> ValMemo {
        ValMemo::default()
    }

    /// The memoised "term `t` has value `value`" bit over `column`.
    pub fn bit(&mut self, oracle: &mut Oracle, column: &[BitVec], t: TermId, value: usize) -> Var {
        if let Some(&bit) = self.bits.get(&(t, value)) {
            return bit;
        }
        let bit = term_eq_value(oracle, &column[t], value);
        self.bits.insert((t, value), bit);
        bit
    }
}

/// Read a column's values back out of the oracle's model.
pub fn decode(oracle: &Oracle, column: &[BitVec]) -> Vec<TermId> {
    column
        .iter()
        .map(|bv| {
            bv.iter().enumerate().fold(0usize, |acc, (k, &bit)| {
                acc | (usize::from(oracle.model_value(bit)) << k)
            })
        })
        .collect()
}
