/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![deny(unused_must_use)]

use std::{collections::BTreeSet, sync::Arc};

use concept::{thing::statistics::Statistics, type_::Label};
use logic::logic_manager::LogicManager;
use reasoner::{session::PlanningSession, PlannerError};

use crate::common::{
    dave_rule, hierarchy, man_has_name, mutually_recursive_rules, r1_then_r2, relation_copy_rule, setup_session,
};

mod common;

#[test]
fn rule_bodies_without_recursion_are_acyclic() {
    let session = setup_session(vec![dave_rule()]);
    let conjunction = session.register(man_has_name()).unwrap();
    let graph = session.conjunction_graph();

    let node = graph.conjunction_node(conjunction.id()).unwrap();
    assert!(!node.is_cyclic());
    assert_eq!(node.component(), &BTreeSet::from([conjunction.id()]));

    let dependencies = graph.dependencies(conjunction.id()).unwrap();
    assert_eq!(dependencies.len(), 1);
    let body = session.logic_manager().rules()[0].body();
    let (concludable, rules) = dependencies.iter().next().unwrap();
    assert_eq!(rules.values().copied().collect::<Vec<_>>(), vec![body]);
    assert_eq!(node.acyclic_dependencies(*concludable), BTreeSet::from([body]));
    assert!(node.cyclic_dependencies(*concludable).is_empty());
    assert!(!graph.is_cyclic(body).unwrap());
}

#[test]
fn mutually_recursive_bodies_share_a_component() {
    let session = setup_session(mutually_recursive_rules());
    let conjunction = session.register(r1_then_r2()).unwrap();
    let graph = session.conjunction_graph();

    let node = graph.conjunction_node(conjunction.id()).unwrap();
    assert!(!node.is_cyclic());
    assert_eq!(node.cyclic_concludables().count(), 0);
    assert_eq!(node.acyclic_concludables().count(), 2);

    let bodies: BTreeSet<_> = session.logic_manager().rules().iter().map(|rule| rule.body()).collect();
    assert_eq!(bodies.len(), 2);
    for body in &bodies {
        let body_node = graph.conjunction_node(*body).unwrap();
        assert!(body_node.is_cyclic());
        assert_eq!(body_node.component(), &bodies);
        assert_eq!(body_node.cyclic_concludables().count(), 1);
        for other in &bodies {
            assert!(graph.in_same_cycle(*body, *other).unwrap());
        }
        assert!(!graph.in_same_cycle(*body, conjunction.id()).unwrap());
    }
}

#[test]
fn self_recursive_rules_are_cyclic() {
    let session = setup_session(vec![relation_copy_rule("r1-transitive", "r1", "r1")]);
    let body = session.logic_manager().rules()[0].body();
    let node = session.conjunction_graph().conjunction_node(body).unwrap();
    assert!(node.is_cyclic());
    assert_eq!(node.component(), &BTreeSet::from([body]));
    let (concludable, _) = node.dependencies().iter().next().unwrap();
    assert!(node.is_cyclic_dependency(*concludable, body));
}

#[test]
fn cleared_graphs_are_rebuilt_identically() {
    let session = setup_session(mutually_recursive_rules());
    let conjunction = session.register(r1_then_r2()).unwrap();
    let before = session.conjunction_graph().dependencies(conjunction.id()).unwrap();
    session.clear();
    let after = session.conjunction_graph().dependencies(conjunction.id()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn inconsistent_statistics_are_rejected_at_session_start() {
    let logic_manager = Arc::new(LogicManager::build(hierarchy(), vec![dave_rule()]).unwrap());
    let mut statistics = Statistics::new(1);
    statistics.update_entity(&Label::build("person"), 3);
    statistics.total_entity_count = 4;
    let result = PlanningSession::new(logic_manager.clone(), Arc::new(statistics));
    assert!(matches!(result, Err(PlannerError::InconsistentStatistics { .. })));

    let mut statistics = Statistics::new(1);
    statistics.update_entity(&Label::build("dog"), 1);
    let result = PlanningSession::new(logic_manager, Arc::new(statistics));
    assert!(matches!(result, Err(PlannerError::InconsistentStatistics { .. })));
}
