/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![deny(unused_must_use)]

use std::{collections::BTreeSet, sync::Arc};

use logic::resolvable::Resolvable;
use reasoner::planner::{greedy::GreedyCostSearch, plan::CallMode, ReasonerPlanner};
use test_utils::assert_approx_eq;

use crate::common::{dave_rule, man_has_name, mutually_recursive_rules, setup_session};

mod common;

fn split(resolvables: &[Arc<Resolvable>]) -> (Arc<Resolvable>, Arc<Resolvable>) {
    let concludable = resolvables.iter().find(|resolvable| resolvable.is_concludable()).unwrap().clone();
    let retrievable = resolvables.iter().find(|resolvable| !resolvable.is_concludable()).unwrap().clone();
    (concludable, retrievable)
}

#[test]
fn order_free_cost_sums_retrieval_and_rule_bodies() {
    let session = setup_session(vec![dave_rule()]);
    let conjunction = session.register(man_has_name()).unwrap();
    let estimator = session.cost_estimator();
    let (_, retrievable) = split(conjunction.resolvables());

    // 2 owned names, 5 persons in the rule body, 2 men
    assert_eq!(estimator.estimate_cost(conjunction.id(), &BTreeSet::new(), None).unwrap(), 9);
    let only_retrievable = BTreeSet::from([retrievable.id()]);
    assert_eq!(estimator.estimate_cost(conjunction.id(), &BTreeSet::new(), Some(&only_retrievable)).unwrap(), 2);

    let x = conjunction.conjunction().variable("x").unwrap();
    assert!(estimator.estimate_cost(conjunction.id(), &BTreeSet::from([x]), None).unwrap() <= 9);
}

#[test]
fn concludables_trigger_calls_in_the_bound_mode() {
    let session = setup_session(vec![dave_rule()]);
    let conjunction = session.register(man_has_name()).unwrap();
    let node = session.conjunction_graph().conjunction_node(conjunction.id()).unwrap();
    let (_, concludable) = conjunction.concludables().next().unwrap();
    let body = session.logic_manager().rules()[0].body();
    let x = conjunction.conjunction().variable("x").unwrap();

    let unbound = session.cost_estimator().triggered_calls(&node, concludable, &BTreeSet::new());
    assert_eq!(unbound.len(), 1);
    assert_eq!(unbound[0].call_mode(), &CallMode::new(body, BTreeSet::new()));

    let bound = session.cost_estimator().triggered_calls(&node, concludable, &BTreeSet::from([x]));
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].concludable(), concludable.id());
    assert_eq!(bound[0].call_mode().conjunction(), body);
    assert_eq!(bound[0].call_mode().mode().len(), 1);
    assert!(!bound[0].is_cyclic());
}

#[test]
fn restricting_retrievables_first_is_cheaper() {
    let session = setup_session(vec![dave_rule()]);
    let conjunction = session.register(man_has_name()).unwrap();
    let planner = GreedyCostSearch::new(session.clone());
    planner.plan(conjunction.id(), &BTreeSet::new()).unwrap();

    let (concludable, retrievable) = split(conjunction.resolvables());
    let call_mode = CallMode::new(conjunction.id(), BTreeSet::new());
    let plans = |call_mode: &CallMode| planner.cached_plan(call_mode);
    let estimator = session.cost_estimator();

    let retrievable_first =
        estimator.ordering_cost(&call_mode, &[retrievable.clone(), concludable.clone()], plans).unwrap();
    let concludable_first = estimator.ordering_cost(&call_mode, &[concludable, retrievable], plans).unwrap();
    assert_approx_eq(12.0, retrievable_first.acyclic_cost(), 1e-9);
    assert_approx_eq(18.0, concludable_first.acyclic_cost(), 1e-9);
    assert!(retrievable_first.cyclic_calls().is_empty());
}

#[test]
fn recursive_calls_are_recorded_rather_than_costed() {
    let session = setup_session(mutually_recursive_rules());
    let rules = session.logic_manager().rules();
    let body = session.resolvable_conjunction(rules[0].body()).unwrap();
    let other_body = rules[1].body();
    let call_mode = CallMode::new(body.id(), BTreeSet::new());

    let cost = session.cost_estimator().ordering_cost(&call_mode, body.resolvables(), |_| None).unwrap();
    assert!(cost.acyclic_cost().is_finite() && cost.acyclic_cost() > 0.0);
    assert_eq!(cost.cyclic_calls().len(), 1);
    let (concludable, callees) = cost.cyclic_calls().iter().next().unwrap();
    assert_eq!(callees, &BTreeSet::from([CallMode::new(other_body, BTreeSet::new())]));
    assert_eq!(cost.scaling_factor(*concludable), 0.0);
    assert!(cost.cyclic_bounds()[concludable].is_empty());
}
