/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use concept::type_::Label;
use ir::pattern::{conjunction::Conjunction, constraint::Value, variable::Variable};
use itertools::Itertools;

use crate::resolvable_conjunction::ConjunctionId;

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct RuleId(u32);

impl RuleId {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// The conclusion of a rule. Every head variable is a variable of the rule body.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum RuleHead {
    /// `$owner has attribute_type value`
    ExplicitHas { owner: Variable, attribute_type: Label, value: Value },
    /// `$owner has $attribute`
    VariableHas { owner: Variable, attribute: Variable },
    /// `(role: $player, ...) isa relation_type`
    Relation { relation_type: Label, role_players: Vec<(Label, Variable)> },
}

impl RuleHead {
    pub fn variables(&self) -> BTreeSet<Variable> {
        match self {
            RuleHead::ExplicitHas { owner, .. } => BTreeSet::from([*owner]),
            RuleHead::VariableHas { owner, attribute } => BTreeSet::from([*owner, *attribute]),
            RuleHead::Relation { role_players, .. } => role_players.iter().map(|(_, player)| *player).collect(),
        }
    }

    /// The type of the new instance this conclusion creates, if it creates one.
    pub fn generated_type(&self) -> Option<&Label> {
        match self {
            RuleHead::ExplicitHas { attribute_type, .. } => Some(attribute_type),
            RuleHead::VariableHas { .. } => None,
            RuleHead::Relation { relation_type, .. } => Some(relation_type),
        }
    }
}

impl fmt::Display for RuleHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleHead::ExplicitHas { owner, attribute_type, value } => write!(f, "{owner} has {attribute_type} {value}"),
            RuleHead::VariableHas { owner, attribute } => write!(f, "{owner} has {attribute}"),
            RuleHead::Relation { relation_type, role_players } => {
                let players = role_players.iter().map(|(role, player)| format!("{}: {}", role.name(), player)).join(", ");
                write!(f, "({players}) isa {relation_type}")
            }
        }
    }
}

/// A rule as written, before it is checked against the schema.
#[derive(Debug, Clone)]
pub struct RuleDefinition {
    label: String,
    when: Conjunction,
    then: RuleHead,
}

impl RuleDefinition {
    pub fn new(label: impl Into<String>, when: Conjunction, then: RuleHead) -> Self {
        Self { label: label.into(), when, then }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn into_parts(self) -> (String, Conjunction, RuleHead) {
        (self.label, self.when, self.then)
    }
}

#[derive(Debug)]
pub struct Rule {
    id: RuleId,
    label: String,
    body: ConjunctionId,
    when: Arc<Conjunction>,
    body_types: BTreeMap<Variable, BTreeSet<Label>>,
    head: RuleHead,
}

impl Rule {
    pub(crate) fn new(
        id: RuleId,
        label: String,
        body: ConjunctionId,
        when: Arc<Conjunction>,
        body_types: BTreeMap<Variable, BTreeSet<Label>>,
        head: RuleHead,
    ) -> Self {
        Self { id, label, body, when, body_types, head }
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn body(&self) -> ConjunctionId {
        self.body
    }

    pub fn when(&self) -> &Conjunction {
        &self.when
    }

    pub fn head(&self) -> &RuleHead {
        &self.head
    }

    /// Candidate types of a body variable, closed over subtypes.
    pub fn body_types(&self, variable: Variable) -> Option<&BTreeSet<Label>> {
        self.body_types.get(&variable)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {}: when {} then {{ {}; }}", self.label, self.when, self.head)
    }
}
