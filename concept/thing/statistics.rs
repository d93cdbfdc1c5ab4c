/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{collections::HashMap, fmt, sync::Arc};

use resource::constants::statistics::STATISTICS_ENCODING_VERSION;
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

use crate::{
    error::ConceptError,
    type_::{type_hierarchy::TypeHierarchy, Kind, Label},
};

type StatisticsEncodingVersion = u64;

/// Thing statistics, reflecting a snapshot of instance and edge counts as of a particular sequence number.
/// Counts are kept per direct type; subtype aggregation happens on read.
#[derive(Clone, Serialize, Deserialize)]
pub struct Statistics {
    encoding_version: StatisticsEncodingVersion,
    pub sequence_number: u64,

    pub total_thing_count: u64,
    pub total_entity_count: u64,
    pub total_relation_count: u64,
    pub total_attribute_count: u64,
    pub total_role_count: u64,
    pub total_has_count: u64,

    pub entity_counts: HashMap<Label, u64>,
    pub relation_counts: HashMap<Label, u64>,
    pub attribute_counts: HashMap<Label, u64>,
    pub role_counts: HashMap<Label, u64>,

    pub has_attribute_counts: HashMap<Label, HashMap<Label, u64>>,
    pub attribute_owner_counts: HashMap<Label, HashMap<Label, u64>>,
    pub relation_role_counts: HashMap<Label, HashMap<Label, u64>>,
}

impl Statistics {
    pub fn new(sequence_number: u64) -> Self {
        Statistics {
            encoding_version: STATISTICS_ENCODING_VERSION,
            sequence_number,
            total_thing_count: 0,
            total_entity_count: 0,
            total_relation_count: 0,
            total_attribute_count: 0,
            total_role_count: 0,
            total_has_count: 0,
            entity_counts: HashMap::new(),
            relation_counts: HashMap::new(),
            attribute_counts: HashMap::new(),
            role_counts: HashMap::new(),
            has_attribute_counts: HashMap::new(),
            attribute_owner_counts: HashMap::new(),
            relation_role_counts: HashMap::new(),
        }
    }

    pub fn update_entity(&mut self, entity_type: &Label, delta: i64) {
        update_count(&mut self.entity_counts, entity_type, delta);
        self.total_entity_count = self.total_entity_count.saturating_add_signed(delta);
        self.total_thing_count = self.total_thing_count.saturating_add_signed(delta);
    }

    pub fn update_relation(&mut self, relation_type: &Label, delta: i64) {
        update_count(&mut self.relation_counts, relation_type, delta);
        self.total_relation_count = self.total_relation_count.saturating_add_signed(delta);
        self.total_thing_count = self.total_thing_count.saturating_add_signed(delta);
    }

    pub fn update_attribute(&mut self, attribute_type: &Label, delta: i64) {
        update_count(&mut self.attribute_counts, attribute_type, delta);
        self.total_attribute_count = self.total_attribute_count.saturating_add_signed(delta);
        self.total_thing_count = self.total_thing_count.saturating_add_signed(delta);
    }

    pub fn update_has(&mut self, owner_type: &Label, attribute_type: &Label, delta: i64) {
        update_count(self.has_attribute_counts.entry(owner_type.clone()).or_default(), attribute_type, delta);
        update_count(self.attribute_owner_counts.entry(attribute_type.clone()).or_default(), owner_type, delta);
        self.total_has_count = self.total_has_count.saturating_add_signed(delta);
    }

    pub fn update_role_player(&mut self, relation_type: &Label, role_type: &Label, delta: i64) {
        update_count(&mut self.role_counts, role_type, delta);
        self.total_role_count = self.total_role_count.saturating_add_signed(delta);
        update_count(self.relation_role_counts.entry(relation_type.clone()).or_default(), role_type, delta);
    }

    /// Number of instances of the type, optionally including instances of its transitive subtypes.
    pub fn instance_count(&self, hierarchy: &TypeHierarchy, type_: &Label, include_subtypes: bool) -> u64 {
        if include_subtypes {
            hierarchy.type_and_subtypes(type_).iter().map(|label| self.direct_instance_count(hierarchy, label)).sum()
        } else {
            self.direct_instance_count(hierarchy, type_)
        }
    }

    fn direct_instance_count(&self, hierarchy: &TypeHierarchy, type_: &Label) -> u64 {
        let counts = match hierarchy.kind(type_) {
            Some(Kind::Entity) => &self.entity_counts,
            Some(Kind::Relation) => &self.relation_counts,
            Some(Kind::Attribute) => &self.attribute_counts,
            Some(Kind::Role) => &self.role_counts,
            None => return 0,
        };
        counts.get(type_).copied().unwrap_or(0)
    }

    /// Number of `has` edges from owners of exactly `owner_type` to attributes of exactly `attribute_type`.
    pub fn ownership_edge_count(&self, owner_type: &Label, attribute_type: &Label) -> u64 {
        self.has_attribute_counts
            .get(owner_type)
            .and_then(|attributes| attributes.get(attribute_type))
            .copied()
            .unwrap_or(0)
    }

    /// Number of role players of `role_type` across relations of exactly `relation_type`.
    pub fn role_player_edge_count(&self, relation_type: &Label, role_type: &Label) -> u64 {
        self.relation_role_counts.get(relation_type).and_then(|roles| roles.get(role_type)).copied().unwrap_or(0)
    }

    /// Checks that the snapshot describes the given hierarchy: every counted type exists with the expected kind,
    /// every recorded role is related by its relation, and the totals equal the per-type sums.
    pub fn validate(&self, hierarchy: &TypeHierarchy) -> Result<(), ConceptError> {
        if self.encoding_version != STATISTICS_ENCODING_VERSION {
            return Err(ConceptError::StatisticsEncodingVersion {
                found: self.encoding_version,
                expected: STATISTICS_ENCODING_VERSION,
            });
        }

        let per_kind = [
            (&self.entity_counts, Kind::Entity),
            (&self.relation_counts, Kind::Relation),
            (&self.attribute_counts, Kind::Attribute),
            (&self.role_counts, Kind::Role),
        ];
        for (counts, kind) in per_kind {
            for label in counts.keys() {
                expect_kind(hierarchy, label, kind)?;
            }
        }
        for (owner, attributes) in &self.has_attribute_counts {
            hierarchy.get_kind(owner)?;
            for attribute in attributes.keys() {
                expect_kind(hierarchy, attribute, Kind::Attribute)?;
            }
        }
        for (relation, roles) in &self.relation_role_counts {
            expect_kind(hierarchy, relation, Kind::Relation)?;
            let related = hierarchy.relates(relation);
            if let Some(role) = roles.keys().find(|role| !related.contains(*role)) {
                return Err(ConceptError::StatisticsUnrelatedRole { relation: relation.clone(), role: role.clone() });
            }
        }

        check_total("entity", self.total_entity_count, self.entity_counts.values().sum())?;
        check_total("relation", self.total_relation_count, self.relation_counts.values().sum())?;
        check_total("attribute", self.total_attribute_count, self.attribute_counts.values().sum())?;
        check_total("role", self.total_role_count, self.role_counts.values().sum())?;
        check_total(
            "thing",
            self.total_thing_count,
            self.total_entity_count + self.total_relation_count + self.total_attribute_count,
        )?;
        check_total(
            "has",
            self.total_has_count,
            self.has_attribute_counts.values().flat_map(|attributes| attributes.values()).sum(),
        )?;
        event!(Level::TRACE, "Statistics at sequence number {} validated.", self.sequence_number);
        Ok(())
    }

    pub fn serialise(&self) -> Result<Vec<u8>, ConceptError> {
        bincode::serialize(self).map_err(|source| ConceptError::StatisticsSerialisation { source: Arc::new(source) })
    }

    pub fn deserialise(bytes: &[u8]) -> Result<Self, ConceptError> {
        let statistics: Statistics = bincode::deserialize(bytes)
            .map_err(|source| ConceptError::StatisticsSerialisation { source: Arc::new(source) })?;
        if statistics.encoding_version != STATISTICS_ENCODING_VERSION {
            return Err(ConceptError::StatisticsEncodingVersion {
                found: statistics.encoding_version,
                expected: STATISTICS_ENCODING_VERSION,
            });
        }
        Ok(statistics)
    }
}

fn update_count(counts: &mut HashMap<Label, u64>, label: &Label, delta: i64) {
    let count = counts.entry(label.clone()).or_default();
    *count = count.saturating_add_signed(delta);
}

fn expect_kind(hierarchy: &TypeHierarchy, label: &Label, expected: Kind) -> Result<(), ConceptError> {
    let actual = hierarchy.get_kind(label)?;
    if actual != expected {
        return Err(ConceptError::UnexpectedTypeKind { label: label.clone(), expected, actual });
    }
    Ok(())
}

fn check_total(total_name: &'static str, total: u64, sum: u64) -> Result<(), ConceptError> {
    if total != sum {
        Err(ConceptError::StatisticsTotalMismatch { total_name, total, sum })
    } else {
        Ok(())
    }
}

impl fmt::Debug for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const INDENT: usize = 4;

        let pretty = f.alternate();

        writeln!(f, "Statistics {{")?;

        macro_rules! write_field {
            ($name:expr, $value:expr) => {
                if pretty {
                    writeln!(f, "{:INDENT$}{}: {:?},", "", $name, $value)?;
                } else {
                    write!(f, " {}: {:?},", $name, $value)?;
                }
            };
        }

        macro_rules! write_counts {
            ($name:expr, $map:expr) => {
                let mut entries: Vec<_> = $map.iter().collect();
                entries.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));
                if pretty {
                    write!(f, "{:INDENT$}{}: {{", "", $name)?;
                    if entries.is_empty() {
                        writeln!(f, "}}")?;
                    } else {
                        writeln!(f)?;
                        for (key, value) in entries {
                            writeln!(f, "{:indent$}{}: {:?},", "", key, value, indent = INDENT * 2)?;
                        }
                        writeln!(f, "{:INDENT$}}},", "")?;
                    }
                } else {
                    write!(f, " {}: {{", $name)?;
                    for (key, value) in entries {
                        write!(f, " {}: {:?},", key, value)?;
                    }
                    write!(f, " }},")?;
                }
            };
        }

        write_field!("encoding_version", self.encoding_version);
        write_field!("sequence_number", self.sequence_number);
        write_field!("total_thing_count", self.total_thing_count);
        write_field!("total_entity_count", self.total_entity_count);
        write_field!("total_relation_count", self.total_relation_count);
        write_field!("total_attribute_count", self.total_attribute_count);
        write_field!("total_role_count", self.total_role_count);
        write_field!("total_has_count", self.total_has_count);

        write_counts!("entity_counts", self.entity_counts);
        write_counts!("relation_counts", self.relation_counts);
        write_counts!("attribute_counts", self.attribute_counts);
        write_counts!("role_counts", self.role_counts);
        write_counts!("has_attribute_counts", self.has_attribute_counts);
        write_counts!("attribute_owner_counts", self.attribute_owner_counts);
        write_counts!("relation_role_counts", self.relation_role_counts);

        write!(f, "}}")
    }
}
