/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![deny(unused_must_use)]

use std::sync::Arc;

use concept::type_::{type_hierarchy::TypeHierarchy, Label};
use ir::pattern::{
    conjunction::{Conjunction, ConjunctionBuilder},
    constraint::{Comparator, IsaKind, Value},
};
use logic::{
    logic_manager::LogicManager,
    resolvable::ConcludableKind,
    rule::{RuleDefinition, RuleHead},
    LogicError,
};
use test_utils::init_logging;

fn hierarchy() -> Arc<TypeHierarchy> {
    Arc::new(
        TypeHierarchy::builder()
            .define_entity("person", None)
            .define_entity("man", Some("person"))
            .define_attribute("name", None)
            .define_attribute("first-name", Some("name"))
            .define_attribute("last-name", Some("name"))
            .set_abstract("name")
            .define_relation("friendship", None, &["friendor", "friendee"])
            .build()
            .unwrap(),
    )
}

fn labels(names: &[&str]) -> Vec<Label> {
    names.iter().map(|name| Label::build(name)).collect()
}

fn dave_rule() -> RuleDefinition {
    let mut builder = ConjunctionBuilder::new();
    let x = builder.get_or_declare_variable("x").unwrap();
    builder.add_isa(IsaKind::Subtype, x, Label::build("person")).unwrap();
    builder.annotate(x, labels(&["person"])).unwrap();
    let when = builder.build().unwrap();
    let then = RuleHead::ExplicitHas { owner: x, attribute_type: Label::build("first-name"), value: "Dave".into() };
    RuleDefinition::new("dave", when, then)
}

fn self_friendship_rule() -> RuleDefinition {
    let mut builder = ConjunctionBuilder::new();
    let x = builder.get_or_declare_variable("x").unwrap();
    builder.add_isa(IsaKind::Subtype, x, Label::build("person")).unwrap();
    builder.annotate(x, labels(&["person"])).unwrap();
    let when = builder.build().unwrap();
    let then = RuleHead::Relation {
        relation_type: Label::build("friendship"),
        role_players: vec![(Label::build("friendor"), x), (Label::build("friendee"), x)],
    };
    RuleDefinition::new("self-friendship", when, then)
}

fn person_has_name() -> Conjunction {
    let mut builder = ConjunctionBuilder::new();
    let p = builder.get_or_declare_variable("p").unwrap();
    let n = builder.get_or_declare_variable("n").unwrap();
    let m = builder.get_or_declare_variable("m").unwrap();
    builder.add_isa(IsaKind::Subtype, p, Label::build("person")).unwrap();
    builder.add_has(p, n).unwrap();
    builder.add_has(p, m).unwrap();
    builder.add_comparison(n, m, Comparator::NotEqual).unwrap();
    builder.annotate(p, labels(&["person"])).unwrap();
    builder.annotate(n, labels(&["first-name"])).unwrap();
    builder.annotate(m, labels(&["last-name"])).unwrap();
    builder.build().unwrap()
}

#[test]
fn only_rule_concluded_constraints_become_concludables() {
    init_logging();
    let logic_manager = LogicManager::build(hierarchy(), [dave_rule()]).unwrap();
    let conjunction = logic_manager.register(person_has_name()).unwrap();

    let concludables: Vec<_> = conjunction.concludables().collect();
    assert_eq!(concludables.len(), 1);
    let (_, concludable) = concludables[0];
    let n = conjunction.conjunction().variable("n").unwrap();
    assert_eq!(concludable.generating(), n);
    assert_eq!(concludable.applicable_rules().len(), 1);

    // isa, the last-name ownership and the comparison share variables and form one retrievable.
    let retrievables: Vec<_> = conjunction.resolvables().iter().filter(|resolvable| !resolvable.is_concludable()).collect();
    assert_eq!(retrievables.len(), 1);
    assert_eq!(retrievables[0].constraints().len(), 3);
}

#[test]
fn candidate_types_are_closed_over_subtypes() {
    init_logging();
    let logic_manager = LogicManager::build(hierarchy(), Vec::new()).unwrap();

    let mut builder = ConjunctionBuilder::new();
    let p = builder.get_or_declare_variable("p").unwrap();
    builder.add_isa(IsaKind::Subtype, p, Label::build("person")).unwrap();
    builder.annotate(p, labels(&["person"])).unwrap();
    let subtypes = logic_manager.register(builder.build().unwrap()).unwrap();
    assert_eq!(subtypes.candidate_types(subtypes.conjunction().variable("p").unwrap()).unwrap().len(), 2);

    let mut builder = ConjunctionBuilder::new();
    let p = builder.get_or_declare_variable("p").unwrap();
    builder.add_isa(IsaKind::Exact, p, Label::build("person")).unwrap();
    builder.annotate(p, labels(&["person", "man"])).unwrap();
    let exact = logic_manager.register(builder.build().unwrap()).unwrap();
    assert_eq!(
        exact.candidate_types(exact.conjunction().variable("p").unwrap()).unwrap().iter().collect::<Vec<_>>(),
        vec![&Label::build("person")]
    );
    assert!(!exact.is_unsatisfiable());
}

#[test]
fn identical_conjunctions_share_an_identity() {
    init_logging();
    let logic_manager = LogicManager::build(hierarchy(), [dave_rule()]).unwrap();
    let first = logic_manager.register(person_has_name()).unwrap();
    let second = logic_manager.register(person_has_name()).unwrap();
    assert_eq!(first.id(), second.id());
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &logic_manager.resolvable_conjunction(first.id()).unwrap()));
    assert_eq!(logic_manager.conjunction_count(), 2);
}

#[test]
fn rules_concluding_matches_by_type_and_value() {
    init_logging();
    let logic_manager = LogicManager::build(hierarchy(), [dave_rule()]).unwrap();
    let conjunction = logic_manager.register(person_has_name()).unwrap();
    let types = conjunction.all_candidate_types();
    let p = conjunction.conjunction().variable("p").unwrap();
    let n = conjunction.conjunction().variable("n").unwrap();
    let m = conjunction.conjunction().variable("m").unwrap();
    let has = |attribute, value: Option<Value>| ConcludableKind::Has { owner: p, attribute, value };

    let first_names = logic_manager.rules_concluding(&has(n, None), types);
    assert_eq!(first_names.len(), 1);
    let (rule, unifier) = &first_names[0];
    assert_eq!(logic_manager.rule(*rule).unwrap().label(), "dave");
    assert_eq!(unifier.get(p).count(), 1);

    assert!(logic_manager.rules_concluding(&has(m, None), types).is_empty());
    assert!(logic_manager.rules_concluding(&has(n, Some("Bob".into())), types).is_empty());
    assert_eq!(logic_manager.rules_concluding(&has(n, Some("Dave".into())), types).len(), 1);
}

#[test]
fn relation_concludables_unify_by_role() {
    init_logging();
    let logic_manager = LogicManager::build(hierarchy(), [self_friendship_rule()]).unwrap();

    let mut builder = ConjunctionBuilder::new();
    let f = builder.get_or_declare_variable("f").unwrap();
    let a = builder.get_or_declare_variable("a").unwrap();
    let b = builder.get_or_declare_variable("b").unwrap();
    builder.add_links(f, [(Some("friendor"), a), (None, b)]).unwrap();
    builder.add_isa(IsaKind::Subtype, f, Label::build("friendship")).unwrap();
    builder.annotate(f, labels(&["friendship"])).unwrap();
    builder.annotate(a, labels(&["person"])).unwrap();
    builder.annotate(b, labels(&["person"])).unwrap();
    let conjunction = logic_manager.register(builder.build().unwrap()).unwrap();

    assert_eq!(conjunction.resolvables().len(), 1);
    let (_, concludable) = conjunction.concludables().next().unwrap();
    assert!(matches!(concludable.kind(), ConcludableKind::Relation { .. }));
    assert_eq!(concludable.constraints().len(), 2);
    let (rule, unifier) = &concludable.applicable_rules()[0];
    let x = logic_manager.rule(*rule).unwrap().when().variable("x").unwrap();
    assert_eq!(unifier.get(a).collect::<Vec<_>>(), vec![x]);
    assert_eq!(unifier.get(b).collect::<Vec<_>>(), vec![x]);
    assert_eq!(unifier.get(f).count(), 0);
}

#[test]
fn invalid_rules_are_rejected() {
    init_logging();
    let mut builder = ConjunctionBuilder::new();
    let x = builder.get_or_declare_variable("x").unwrap();
    let y = builder.get_or_declare_variable("y").unwrap();
    builder.add_isa(IsaKind::Subtype, x, Label::build("person")).unwrap();
    builder.annotate(x, labels(&["person"])).unwrap();
    let when = builder.build().unwrap();

    let unbound = RuleDefinition::new(
        "unbound",
        when.clone(),
        RuleHead::VariableHas { owner: x, attribute: y },
    );
    assert!(matches!(LogicManager::build(hierarchy(), [unbound]), Err(LogicError::UnboundHeadVariable { .. })));

    let wrong_kind = RuleDefinition::new(
        "wrong-kind",
        when.clone(),
        RuleHead::ExplicitHas { owner: x, attribute_type: Label::build("person"), value: "Dave".into() },
    );
    assert!(matches!(
        LogicManager::build(hierarchy(), [wrong_kind]),
        Err(LogicError::UnexpectedConclusionKind { .. })
    ));

    let unknown_role = RuleDefinition::new(
        "unknown-role",
        when,
        RuleHead::Relation { relation_type: Label::build("friendship"), role_players: vec![(Label::build("enemy"), x)] },
    );
    assert!(matches!(LogicManager::build(hierarchy(), [unknown_role]), Err(LogicError::UnknownRole { .. })));

    assert!(matches!(
        LogicManager::build(hierarchy(), [dave_rule(), dave_rule()]),
        Err(LogicError::DuplicateRuleLabel { .. })
    ));
}
