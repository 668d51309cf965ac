// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! End-to-end scenarios driven through the public solver API, each run under
//! both strategies.

use ccu::congruence;
use ccu::problem::{FunEq, Goal, SolveResult};
use solver::{CcuSolver, Strategy};
use std::collections::HashMap;

const BOTH: [Strategy; 2] = [Strategy::Lazy, Strategy::Table];

fn solver(strategy: Strategy) -> CcuSolver<&'static str, &'static str> {
    CcuSolver::with_strategy(strategy)
}

/// Re-check a host-level model against the inputs with the reference
/// congruence closure.
fn model_satisfies(
    domains: &[(&str, Vec<&str>)],
    fun_apps: &[(&str, Vec<&str>, &str)],
    subgoals: &[Vec<(&str, &str)>],
    model: &HashMap<&str, &str>,
) -> bool {
    let id = |name: &str| domains.iter().position(|(t, _)| *t == name).unwrap();
    let mut symbols: Vec<&str> = vec![];
    let fun_eqs: Vec<FunEq> = fun_apps
        .iter()
        .map(|(func, args, result)| {
            let func = match symbols.iter().position(|s| s == func) {
                Some(i) => i,
                None => {
                    symbols.push(func);
                    symbols.len() - 1
                }
            };
            FunEq {
                func,
                args: args.iter().map(|a| id(a)).collect(),
                result: id(result),
            }
        })
        .collect();
    let goal = Goal {
        subgoals: subgoals
            .iter()
            .map(|sg| sg.iter().map(|&(s, t)| (id(s), id(t))).collect())
            .collect(),
    };
    let assignment: Vec<usize> = domains.iter().map(|(t, _)| id(model[t])).collect();
    for (term, domain) in domains {
        assert!(
            domain.contains(&model[term]) || model[term] == *term,
            "{term} was assigned outside its domain"
        );
    }
    congruence::verifies(domains.len(), &fun_eqs, &goal, &assignment)
}

#[test]
fn free_equality_is_sat() {
    let domains = [
        ("a", vec!["a", "b", "c"]),
        ("b", vec!["a", "b", "c"]),
        ("c", vec!["a", "b", "c"]),
    ];
    let subgoals = vec![vec![("a", "b")]];
    for strategy in BOTH {
        let mut s = solver(strategy);
        s.create_problem(&domains, &[subgoals.clone()], &[vec![]])
            .unwrap();
        assert_eq!(s.solve().unwrap(), SolveResult::Sat, "{strategy:?}");
        let model = s.model().unwrap();
        assert!(model_satisfies(&domains, &[], &subgoals, &model), "{strategy:?}");
    }
}

#[test]
fn colliding_results_with_separated_arguments_are_unsat() {
    // f(a) = c and f(b) = c never force a = b, and the domains keep them apart
    let domains = [("a", vec!["a"]), ("b", vec!["b"]), ("c", vec!["c"])];
    let fun_apps = vec![
        ("f", vec!["a"], "c"),
        ("f", vec!["b"], "c"),
    ];
    for strategy in BOTH {
        let mut s = solver(strategy);
        s.create_problem(&domains, &[vec![vec![("a", "b")]]], &[fun_apps.clone()])
            .unwrap();
        assert_eq!(s.solve().unwrap(), SolveResult::Unsat, "{strategy:?}");
        assert_eq!(s.unsat_core(10_000), vec![0], "{strategy:?}");
    }
}

#[test]
fn collapsing_arguments_bridges_the_goal() {
    // c = d is only derivable by assigning b to a and applying functionality
    let domains = [
        ("a", vec!["a"]),
        ("b", vec!["a", "b"]),
        ("c", vec!["c"]),
        ("d", vec!["d"]),
    ];
    let fun_apps = vec![("f", vec!["a"], "c"), ("f", vec!["b"], "d")];
    let subgoals = vec![vec![("c", "d")]];
    for strategy in BOTH {
        let mut s = solver(strategy);
        s.create_problem(&domains, &[subgoals.clone()], &[fun_apps.clone()])
            .unwrap();
        assert_eq!(s.solve().unwrap(), SolveResult::Sat, "{strategy:?}");
        let model = s.model().unwrap();
        assert_eq!(model["b"], "a", "{strategy:?}");
        assert!(
            model_satisfies(&domains, &fun_apps, &subgoals, &model),
            "{strategy:?}"
        );
    }
}

#[test]
fn jointly_conflicting_sub_problems() {
    // sub-problem 0 pulls b towards a, sub-problem 1 pulls it towards c
    let domains = [
        ("a", vec!["a"]),
        ("b", vec!["a", "b", "c"]),
        ("c", vec!["c"]),
    ];
    let goals = [vec![vec![("a", "b")]], vec![vec![("b", "c")]]];
    for strategy in BOTH {
        let mut s = solver(strategy);
        s.create_problem(&domains, &goals, &[vec![], vec![]]).unwrap();
        assert_eq!(s.solve().unwrap(), SolveResult::Unsat, "{strategy:?}");
        assert_eq!(s.unsat_core(10_000), vec![0, 1], "{strategy:?}");
    }
}

#[test]
fn independent_sub_problem_stays_out_of_the_core() {
    let domains = [
        ("a", vec!["a"]),
        ("b", vec!["a", "b", "c"]),
        ("c", vec!["c"]),
        ("d", vec!["d"]),
    ];
    let goals = [
        vec![vec![("a", "b")]],
        vec![vec![("d", "d")]],
        vec![vec![("b", "c")]],
    ];
    for strategy in BOTH {
        let mut s = solver(strategy);
        s.create_problem(&domains, &goals, &[vec![], vec![], vec![]])
            .unwrap();
        assert_eq!(s.solve().unwrap(), SolveResult::Unsat, "{strategy:?}");
        assert_eq!(s.unsat_core(10_000), vec![0, 2], "{strategy:?}");
    }
}

#[test]
fn empty_subgoal_is_immediately_sat() {
    let domains = [("a", vec!["a", "b"]), ("b", vec!["a", "b"])];
    for strategy in BOTH {
        let mut s = solver(strategy);
        s.create_problem(&domains, &[vec![vec![]]], &[vec![]]).unwrap();
        assert_eq!(s.solve().unwrap(), SolveResult::Sat, "{strategy:?}");
    }
}

#[test]
fn empty_goal_disjunction_is_unsat() {
    let domains = [("a", vec!["a", "b"]), ("b", vec!["a", "b"])];
    for strategy in BOTH {
        let mut s = solver(strategy);
        s.create_problem(&domains, &[vec![]], &[vec![]]).unwrap();
        assert_eq!(s.solve().unwrap(), SolveResult::Unsat, "{strategy:?}");
    }
}

#[test]
fn deactivation_and_solve_again() {
    let domains = [
        ("a", vec!["a"]),
        ("b", vec!["a", "b", "c"]),
        ("c", vec!["c"]),
    ];
    let goals = [vec![vec![("a", "b")]], vec![vec![("b", "c")]]];
    let mut s = solver(Strategy::Table);
    s.create_problem(&domains, &goals, &[vec![], vec![]]).unwrap();
    assert_eq!(s.solve().unwrap(), SolveResult::Unsat);

    s.deactivate_problem(0);
    assert_eq!(s.solve_again().unwrap(), SolveResult::Sat);
    assert_eq!(s.model().unwrap()["b"], "c");

    s.activate_problem(0);
    assert_eq!(s.solve_again().unwrap(), SolveResult::Unsat);
}

#[test]
fn solving_twice_is_deterministic() {
    let domains = [
        ("a", vec!["a", "b", "c"]),
        ("b", vec!["a", "b", "c"]),
        ("c", vec!["a", "b", "c"]),
    ];
    let goals = [vec![vec![("a", "b")], vec![("b", "c")]]];
    for strategy in BOTH {
        let mut s = solver(strategy);
        s.create_problem(&domains, &goals, &[vec![]]).unwrap();
        assert_eq!(s.solve().unwrap(), SolveResult::Sat);
        let first = s.model().unwrap();
        assert_eq!(s.solve().unwrap(), SolveResult::Sat);
        assert_eq!(first, s.model().unwrap(), "{strategy:?}");
    }
}

#[test]
fn singleton_problem_still_works() {
    for strategy in BOTH {
        let mut s = solver(strategy);
        s.create_problem(&[("a", vec!["a"])], &[vec![vec![("a", "a")]]], &[vec![]])
            .unwrap();
        assert_eq!(s.solve().unwrap(), SolveResult::Sat, "{strategy:?}");
        assert_eq!(s.model().unwrap()["a"], "a");
    }
}

#[test]
fn nullary_equations_count_as_matching_arguments() {
    // k() = a and k() = b merge a and b unconditionally
    let domains = [
        ("a", vec!["a"]),
        ("b", vec!["b"]),
        ("c", vec!["a", "c"]),
    ];
    let fun_apps = vec![("k", vec![], "a"), ("k", vec![], "b")];
    let subgoals = vec![vec![("a", "b")]];
    for strategy in BOTH {
        let mut s = solver(strategy);
        s.create_problem(&domains, &[subgoals.clone()], &[fun_apps.clone()])
            .unwrap();
        assert_eq!(s.solve().unwrap(), SolveResult::Sat, "{strategy:?}");
    }
}
