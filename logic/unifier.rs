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
use ir::pattern::{constraint::RolePlayer, variable::Variable};
use itertools::Itertools;

use crate::{
    resolvable::ConcludableKind,
    rule::{Rule, RuleHead, RuleId},
};

/// Maps the variables of a concludable to the rule body variables that produce them.
/// A variable the rule generates maps to no body variable.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Unifier {
    mapping: BTreeMap<Variable, BTreeSet<Variable>>,
}

impl Unifier {
    pub fn mapping(&self) -> &BTreeMap<Variable, BTreeSet<Variable>> {
        &self.mapping
    }

    pub fn get(&self, variable: Variable) -> impl Iterator<Item = Variable> + '_ {
        self.mapping.get(&variable).into_iter().flatten().copied()
    }

    /// The body variables that the given concludable variables unify with.
    pub fn map_variables<'a>(&self, variables: impl IntoIterator<Item = &'a Variable>) -> BTreeSet<Variable> {
        variables.into_iter().flat_map(|variable| self.get(*variable)).collect()
    }

    fn bind(&mut self, variable: Variable, body_variable: Variable) {
        self.mapping.entry(variable).or_default().insert(body_variable);
    }

    fn generate(&mut self, variable: Variable) {
        self.mapping.entry(variable).or_default();
    }
}

impl fmt::Display for Unifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .mapping
            .iter()
            .map(|(variable, body)| format!("{} -> {{{}}}", variable, body.iter().join(", ")))
            .join(", ");
        write!(f, "{{{entries}}}")
    }
}

pub(crate) fn applicable_rules(
    concludable: &ConcludableKind,
    types: &BTreeMap<Variable, BTreeSet<Label>>,
    rules: &[Arc<Rule>],
) -> Vec<(RuleId, Unifier)> {
    rules
        .iter()
        .flat_map(|rule| unify(concludable, types, rule).into_iter().map(|unifier| (rule.id(), unifier)))
        .collect()
}

/// All ways the head of `rule` can produce answers to the concludable, one unifier per way.
fn unify(
    concludable: &ConcludableKind,
    types: &BTreeMap<Variable, BTreeSet<Label>>,
    rule: &Rule,
) -> Vec<Unifier> {
    match concludable {
        ConcludableKind::Has { owner, attribute, value } => {
            let owner_matches = |head_owner: &Variable| overlaps(types.get(owner), rule.body_types(*head_owner));
            match rule.head() {
                RuleHead::ExplicitHas { owner: head_owner, attribute_type, value: head_value } => {
                    let type_matches = types.get(attribute).is_some_and(|candidates| candidates.contains(attribute_type));
                    let value_matches = value.as_ref().map_or(true, |value| value == head_value);
                    if type_matches && value_matches && owner_matches(head_owner) {
                        let mut unifier = Unifier::default();
                        unifier.bind(*owner, *head_owner);
                        unifier.generate(*attribute);
                        vec![unifier]
                    } else {
                        Vec::new()
                    }
                }
                RuleHead::VariableHas { owner: head_owner, attribute: head_attribute } => {
                    let type_matches = overlaps(types.get(attribute), rule.body_types(*head_attribute));
                    if type_matches && owner_matches(head_owner) {
                        let mut unifier = Unifier::default();
                        unifier.bind(*owner, *head_owner);
                        unifier.bind(*attribute, *head_attribute);
                        vec![unifier]
                    } else {
                        Vec::new()
                    }
                }
                RuleHead::Relation { .. } => Vec::new(),
            }
        }
        ConcludableKind::Relation { relation, role_players } => {
            let RuleHead::Relation { relation_type, role_players: head_role_players } = rule.head() else {
                return Vec::new();
            };
            if !types.get(relation).is_some_and(|candidates| candidates.contains(relation_type)) {
                return Vec::new();
            }
            let mut unifiers = BTreeSet::new();
            let mut assigned = vec![None; role_players.len()];
            assign_role_players(role_players, head_role_players, types, rule, 0, &mut assigned, &mut unifiers);
            unifiers
                .into_iter()
                .map(|mut unifier| {
                    unifier.generate(*relation);
                    unifier
                })
                .collect()
        }
        ConcludableKind::Isa { thing } => match rule.head().generated_type() {
            Some(generated) if types.get(thing).is_some_and(|candidates| candidates.contains(generated)) => {
                let mut unifier = Unifier::default();
                unifier.generate(*thing);
                vec![unifier]
            }
            _ => Vec::new(),
        },
    }
}

// Injective assignment of concludable role players to head role players.
fn assign_role_players(
    role_players: &[RolePlayer],
    head_role_players: &[(Label, Variable)],
    types: &BTreeMap<Variable, BTreeSet<Label>>,
    rule: &Rule,
    index: usize,
    assigned: &mut [Option<usize>],
    unifiers: &mut BTreeSet<Unifier>,
) {
    if index == role_players.len() {
        let mut unifier = Unifier::default();
        for (role_player, head_index) in role_players.iter().zip(assigned.iter()) {
            if let Some(head_index) = head_index {
                unifier.bind(role_player.player(), head_role_players[*head_index].1);
            }
        }
        unifiers.insert(unifier);
        return;
    }
    let role_player = &role_players[index];
    for (head_index, (head_role, head_player)) in head_role_players.iter().enumerate() {
        if assigned.contains(&Some(head_index)) {
            continue;
        }
        let role_matches = role_player.role().map_or(true, |role| role.name() == head_role.name());
        if role_matches && overlaps(types.get(&role_player.player()), rule.body_types(*head_player)) {
            assigned[index] = Some(head_index);
            assign_role_players(role_players, head_role_players, types, rule, index + 1, assigned, unifiers);
            assigned[index] = None;
        }
    }
}

fn overlaps(lhs: Option<&BTreeSet<Label>>, rhs: Option<&BTreeSet<Label>>) -> bool {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => !lhs.is_disjoint(rhs),
        _ => false,
    }
}
