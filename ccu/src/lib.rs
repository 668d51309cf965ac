// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The CCU problem model: terms over finite domains, ground function
//! equations, disjunctive equality goals, and the two semantic tools every
//! solving strategy leans on, namely a union-find congruence-closure
//! verifier and a may-equal matrix with goal-driven minimisation.

// configure clippy
#![allow(clippy::needless_return)]
#![allow(clippy::type_complexity)]
#![deny(clippy::uninlined_format_args)]
// documentation-related lints (only checked when running rustdoc)
#![warn(missing_docs)]
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod congruence;
pub mod disequality;
pub mod enumerate;
pub mod problem;
