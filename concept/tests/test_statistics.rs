/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![deny(unused_must_use)]

use concept::{
    error::ConceptError,
    thing::statistics::Statistics,
    type_::{type_hierarchy::TypeHierarchy, Label},
};
use test_utils::init_logging;

fn hierarchy() -> TypeHierarchy {
    TypeHierarchy::builder()
        .define_entity("person", None)
        .define_entity("man", Some("person"))
        .define_attribute("name", None)
        .define_attribute("first-name", Some("name"))
        .define_relation("household", None, &["member"])
        .build()
        .unwrap()
}

fn statistics() -> Statistics {
    let person = Label::build("person");
    let man = Label::build("man");
    let first_name = Label::build("first-name");
    let household = Label::build("household");
    let member = Label::build_scoped("member", "household");

    let mut statistics = Statistics::new(1);
    statistics.update_entity(&person, 3);
    statistics.update_entity(&man, 2);
    statistics.update_attribute(&first_name, 4);
    statistics.update_has(&person, &first_name, 2);
    statistics.update_has(&man, &first_name, 2);
    statistics.update_relation(&household, 2);
    statistics.update_role_player(&household, &member, 4);
    statistics
}

#[test]
fn instance_counts_aggregate_subtypes_on_request() {
    init_logging();
    let hierarchy = hierarchy();
    let statistics = statistics();
    let person = Label::build("person");
    assert_eq!(statistics.instance_count(&hierarchy, &person, true), 5);
    assert_eq!(statistics.instance_count(&hierarchy, &person, false), 3);
    assert_eq!(statistics.instance_count(&hierarchy, &Label::build("name"), true), 4);
    assert_eq!(statistics.instance_count(&hierarchy, &Label::build("name"), false), 0);
    assert_eq!(statistics.instance_count(&hierarchy, &Label::build("undefined"), true), 0);
}

#[test]
fn edge_counts_are_per_direct_type() {
    init_logging();
    let statistics = statistics();
    let first_name = Label::build("first-name");
    assert_eq!(statistics.ownership_edge_count(&Label::build("man"), &first_name), 2);
    assert_eq!(statistics.ownership_edge_count(&Label::build("person"), &Label::build("name")), 0);
    let member = Label::build_scoped("member", "household");
    assert_eq!(statistics.role_player_edge_count(&Label::build("household"), &member), 4);
    assert_eq!(statistics.total_has_count, 4);
}

#[test]
fn consistent_statistics_validate() {
    init_logging();
    statistics().validate(&hierarchy()).unwrap();
}

#[test]
fn inconsistent_statistics_are_rejected() {
    init_logging();
    let hierarchy = hierarchy();

    let mut mismatched_total = statistics();
    mismatched_total.total_entity_count += 1;
    assert!(matches!(
        mismatched_total.validate(&hierarchy),
        Err(ConceptError::StatisticsTotalMismatch { total_name: "entity", .. })
    ));

    let mut unknown_type = statistics();
    unknown_type.update_entity(&Label::build("robot"), 1);
    assert!(matches!(unknown_type.validate(&hierarchy), Err(ConceptError::UnknownType { .. })));

    let mut wrong_kind = statistics();
    wrong_kind.update_attribute(&Label::build("person"), 1);
    assert!(matches!(wrong_kind.validate(&hierarchy), Err(ConceptError::UnexpectedTypeKind { .. })));

    let mut unrelated_role = statistics();
    unrelated_role.update_role_player(&Label::build("household"), &Label::build_scoped("head", "household"), 1);
    assert!(unrelated_role.validate(&hierarchy).is_err());
}

#[test]
fn serialised_statistics_survive_the_round_trip() {
    init_logging();
    let statistics = statistics();
    let bytes = statistics.serialise().unwrap();
    let decoded = Statistics::deserialise(&bytes).unwrap();
    assert_eq!(decoded.sequence_number, statistics.sequence_number);
    assert_eq!(decoded.total_thing_count, statistics.total_thing_count);
    assert_eq!(decoded.entity_counts, statistics.entity_counts);
    assert_eq!(decoded.has_attribute_counts, statistics.has_attribute_counts);
    assert_eq!(decoded.relation_role_counts, statistics.relation_role_counts);
    decoded.validate(&hierarchy()).unwrap();
    assert!(Statistics::deserialise(&bytes[..bytes.len() / 2]).is_err());
}
