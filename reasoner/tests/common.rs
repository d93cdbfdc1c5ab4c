/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![allow(dead_code)]

use std::sync::Arc;

use concept::{
    thing::statistics::Statistics,
    type_::{type_hierarchy::TypeHierarchy, Label},
};
use ir::pattern::{
    conjunction::{Conjunction, ConjunctionBuilder},
    constraint::IsaKind,
};
use logic::{
    logic_manager::LogicManager,
    rule::{RuleDefinition, RuleHead},
};
use reasoner::session::PlanningSession;
use test_utils::init_logging;

pub fn hierarchy() -> Arc<TypeHierarchy> {
    Arc::new(
        TypeHierarchy::builder()
            .define_entity("person", None)
            .define_entity("man", Some("person"))
            .define_attribute("name", None)
            .define_attribute("first-name", Some("name"))
            .define_attribute("last-name", Some("name"))
            .set_abstract("name")
            .define_relation("household", None, &["member"])
            .define_relation("friendship", None, &["friendor", "friendee"])
            .define_relation("r1", None, &["x", "y"])
            .define_relation("r2", None, &["x", "y"])
            .build()
            .unwrap(),
    )
}

/// 3 plain persons and 2 men, one household of 3 members and one of 1, 3 friendships.
pub fn statistics() -> Statistics {
    let mut statistics = Statistics::new(1);
    statistics.update_entity(&Label::build("person"), 3);
    statistics.update_entity(&Label::build("man"), 2);
    statistics.update_attribute(&Label::build("first-name"), 3);
    statistics.update_attribute(&Label::build("last-name"), 2);
    statistics.update_has(&Label::build("person"), &Label::build("first-name"), 2);
    statistics.update_has(&Label::build("person"), &Label::build("last-name"), 1);
    statistics.update_has(&Label::build("man"), &Label::build("first-name"), 1);
    statistics.update_has(&Label::build("man"), &Label::build("last-name"), 1);
    statistics.update_relation(&Label::build("household"), 2);
    statistics.update_role_player(&Label::build("household"), &Label::build_scoped("member", "household"), 4);
    statistics.update_relation(&Label::build("friendship"), 3);
    statistics.update_role_player(&Label::build("friendship"), &Label::build_scoped("friendor", "friendship"), 3);
    statistics.update_role_player(&Label::build("friendship"), &Label::build_scoped("friendee", "friendship"), 3);
    statistics.update_relation(&Label::build("r1"), 1);
    statistics.update_role_player(&Label::build("r1"), &Label::build_scoped("x", "r1"), 1);
    statistics.update_role_player(&Label::build("r1"), &Label::build_scoped("y", "r1"), 1);
    statistics.update_relation(&Label::build("r2"), 2);
    statistics.update_role_player(&Label::build("r2"), &Label::build_scoped("x", "r2"), 2);
    statistics.update_role_player(&Label::build("r2"), &Label::build_scoped("y", "r2"), 2);
    statistics
}

pub fn labels(names: &[&str]) -> Vec<Label> {
    names.iter().map(|name| Label::build(name)).collect()
}

/// Every person has first-name "Dave".
pub fn dave_rule() -> RuleDefinition {
    let mut builder = ConjunctionBuilder::new();
    let x = builder.get_or_declare_variable("x").unwrap();
    builder.add_isa(IsaKind::Subtype, x, Label::build("person")).unwrap();
    builder.annotate(x, labels(&["person"])).unwrap();
    let then = RuleHead::ExplicitHas { owner: x, attribute_type: Label::build("first-name"), value: "Dave".into() };
    RuleDefinition::new("dave", builder.build().unwrap(), then)
}

/// `(x: $a, y: $b) isa <from>` concludes `(x: $a, y: $b) isa <to>`.
pub fn relation_copy_rule(label: &str, from: &str, to: &str) -> RuleDefinition {
    let mut builder = ConjunctionBuilder::new();
    let r = builder.get_or_declare_variable("r").unwrap();
    let a = builder.get_or_declare_variable("a").unwrap();
    let b = builder.get_or_declare_variable("b").unwrap();
    builder.add_links(r, [(Some("x"), a), (Some("y"), b)]).unwrap();
    builder.add_isa(IsaKind::Subtype, r, Label::build(from)).unwrap();
    builder.annotate(r, labels(&[from])).unwrap();
    builder.annotate(a, labels(&["person"])).unwrap();
    builder.annotate(b, labels(&["person"])).unwrap();
    let then = RuleHead::Relation {
        relation_type: Label::build(to),
        role_players: vec![(Label::build("x"), a), (Label::build("y"), b)],
    };
    RuleDefinition::new(label, builder.build().unwrap(), then)
}

pub fn mutually_recursive_rules() -> Vec<RuleDefinition> {
    vec![relation_copy_rule("r1-from-r2", "r2", "r1"), relation_copy_rule("r2-from-r1", "r1", "r2")]
}

pub fn setup_session(rules: Vec<RuleDefinition>) -> Arc<PlanningSession> {
    init_logging();
    let logic_manager = Arc::new(LogicManager::build(hierarchy(), rules).unwrap());
    Arc::new(PlanningSession::new(logic_manager, Arc::new(statistics())).unwrap())
}

/// `$p isa person` or, when `exact`, `$p isa! person`.
pub fn person(exact: bool) -> Conjunction {
    let mut builder = ConjunctionBuilder::new();
    let p = builder.get_or_declare_variable("p").unwrap();
    let kind = if exact { IsaKind::Exact } else { IsaKind::Subtype };
    builder.add_isa(kind, p, Label::build("person")).unwrap();
    builder.annotate(p, labels(&["person"])).unwrap();
    builder.build().unwrap()
}

/// `$r (member: $p1) isa household`
pub fn household_member() -> Conjunction {
    let mut builder = ConjunctionBuilder::new();
    let r = builder.get_or_declare_variable("r").unwrap();
    let p1 = builder.get_or_declare_variable("p1").unwrap();
    builder.add_links(r, [(Some("member"), p1)]).unwrap();
    builder.add_isa(IsaKind::Subtype, r, Label::build("household")).unwrap();
    builder.annotate(r, labels(&["household"])).unwrap();
    builder.annotate(p1, labels(&["person"])).unwrap();
    builder.build().unwrap()
}

/// `$r isa household`
pub fn household() -> Conjunction {
    let mut builder = ConjunctionBuilder::new();
    let r = builder.get_or_declare_variable("r").unwrap();
    builder.add_isa(IsaKind::Subtype, r, Label::build("household")).unwrap();
    builder.annotate(r, labels(&["household"])).unwrap();
    builder.build().unwrap()
}

/// `$p isa person; $p has name $n`
pub fn person_has_name() -> Conjunction {
    let mut builder = ConjunctionBuilder::new();
    let p = builder.get_or_declare_variable("p").unwrap();
    let n = builder.get_or_declare_variable("n").unwrap();
    builder.add_isa(IsaKind::Subtype, p, Label::build("person")).unwrap();
    builder.add_has(p, n).unwrap();
    builder.annotate(p, labels(&["person"])).unwrap();
    builder.annotate(n, labels(&["name"])).unwrap();
    builder.build().unwrap()
}

/// `$x isa man; $x has name $n`
pub fn man_has_name() -> Conjunction {
    let mut builder = ConjunctionBuilder::new();
    let x = builder.get_or_declare_variable("x").unwrap();
    let n = builder.get_or_declare_variable("n").unwrap();
    builder.add_isa(IsaKind::Subtype, x, Label::build("man")).unwrap();
    builder.add_has(x, n).unwrap();
    builder.annotate(x, labels(&["man"])).unwrap();
    builder.annotate(n, labels(&["name"])).unwrap();
    builder.build().unwrap()
}

/// `$p has first-name "Alice"`
pub fn named_alice() -> Conjunction {
    let mut builder = ConjunctionBuilder::new();
    let p = builder.get_or_declare_variable("p").unwrap();
    let n = builder.get_or_declare_variable("n").unwrap();
    builder.add_has_value(p, n, "Alice").unwrap();
    builder.annotate(p, labels(&["person"])).unwrap();
    builder.annotate(n, labels(&["first-name"])).unwrap();
    builder.build().unwrap()
}

/// `$f (friendor: $a, friendee: $b) isa friendship`
pub fn friendship() -> Conjunction {
    let mut builder = ConjunctionBuilder::new();
    let f = builder.get_or_declare_variable("f").unwrap();
    let a = builder.get_or_declare_variable("a").unwrap();
    let b = builder.get_or_declare_variable("b").unwrap();
    builder.add_links(f, [(Some("friendor"), a), (Some("friendee"), b)]).unwrap();
    builder.add_isa(IsaKind::Subtype, f, Label::build("friendship")).unwrap();
    builder.annotate(f, labels(&["friendship"])).unwrap();
    builder.annotate(a, labels(&["person"])).unwrap();
    builder.annotate(b, labels(&["person"])).unwrap();
    builder.build().unwrap()
}

/// `$s (x: $a, y: $b) isa r1; $t (x: $b, y: $c) isa r2`
pub fn r1_then_r2() -> Conjunction {
    let mut builder = ConjunctionBuilder::new();
    let s = builder.get_or_declare_variable("s").unwrap();
    let t = builder.get_or_declare_variable("t").unwrap();
    let a = builder.get_or_declare_variable("a").unwrap();
    let b = builder.get_or_declare_variable("b").unwrap();
    let c = builder.get_or_declare_variable("c").unwrap();
    builder.add_links(s, [(Some("x"), a), (Some("y"), b)]).unwrap();
    builder.add_isa(IsaKind::Subtype, s, Label::build("r1")).unwrap();
    builder.add_links(t, [(Some("x"), b), (Some("y"), c)]).unwrap();
    builder.add_isa(IsaKind::Subtype, t, Label::build("r2")).unwrap();
    builder.annotate(s, labels(&["r1"])).unwrap();
    builder.annotate(t, labels(&["r2"])).unwrap();
    for variable in [a, b, c] {
        builder.annotate(variable, labels(&["person"])).unwrap();
    }
    builder.build().unwrap()
}
