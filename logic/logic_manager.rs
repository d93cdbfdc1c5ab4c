/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::{Arc, RwLock},
};

use concept::type_::{type_hierarchy::TypeHierarchy, Kind, Label};
use ir::pattern::{
    conjunction::Conjunction,
    constraint::{Constraint, IsaKind},
    variable::Variable,
};
use tracing::{event, Level};

use crate::{
    resolvable::{decompose, ConcludableKind},
    resolvable_conjunction::{ConjunctionId, ResolvableConjunction},
    rule::{Rule, RuleDefinition, RuleHead, RuleId},
    unifier::{applicable_rules, Unifier},
    LogicError,
};

#[derive(Debug)]
struct ArenaEntry {
    conjunction: Arc<Conjunction>,
    candidate_types: BTreeMap<Variable, BTreeSet<Label>>,
    resolvable: Option<Arc<ResolvableConjunction>>,
}

/// Interns conjunctions by structure, so identical patterns share one id wherever they occur.
#[derive(Debug, Default)]
struct ConjunctionArena {
    ids: HashMap<Arc<Conjunction>, ConjunctionId>,
    entries: Vec<ArenaEntry>,
}

impl ConjunctionArena {
    fn allocate(
        &mut self,
        conjunction: Arc<Conjunction>,
        candidate_types: BTreeMap<Variable, BTreeSet<Label>>,
    ) -> ConjunctionId {
        if let Some(id) = self.ids.get(&conjunction) {
            return *id;
        }
        let id = ConjunctionId::new(self.entries.len() as u32);
        self.ids.insert(conjunction.clone(), id);
        self.entries.push(ArenaEntry { conjunction, candidate_types, resolvable: None });
        id
    }
}

/// The rule index of one schema snapshot, and the arena of every conjunction planned against it.
#[derive(Debug)]
pub struct LogicManager {
    hierarchy: Arc<TypeHierarchy>,
    rules: Vec<Arc<Rule>>,
    arena: RwLock<ConjunctionArena>,
}

impl LogicManager {
    pub fn build(
        hierarchy: Arc<TypeHierarchy>,
        definitions: impl IntoIterator<Item = RuleDefinition>,
    ) -> Result<Self, LogicError> {
        let mut arena = ConjunctionArena::default();
        let mut rules = Vec::new();
        let mut labels = HashSet::new();
        for (index, definition) in definitions.into_iter().enumerate() {
            let (label, when, then) = definition.into_parts();
            if !labels.insert(label.clone()) {
                return Err(LogicError::DuplicateRuleLabel { rule: label });
            }
            if let Some(unknown) = find_unknown_type(&hierarchy, &when) {
                return Err(LogicError::UnknownType { rule: label, label: unknown });
            }
            let head = validate_head(&hierarchy, &label, &when, then)?;
            let body_types = candidate_types(&hierarchy, &when);
            let when = Arc::new(when);
            let body = arena.allocate(when.clone(), body_types.clone());
            rules.push(Arc::new(Rule::new(RuleId::new(index as u32), label, body, when, body_types, head)));
        }
        event!(Level::DEBUG, "Built logic manager with {} rules over {} rule bodies.", rules.len(), arena.entries.len());
        Ok(Self { hierarchy, rules, arena: RwLock::new(arena) })
    }

    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> Option<&Arc<Rule>> {
        self.rules.get(id.as_u32() as usize)
    }

    pub fn conjunction_count(&self) -> usize {
        self.arena.read().unwrap().entries.len()
    }

    /// Interns a query conjunction, returning the existing entry for a structurally identical one.
    pub fn register(&self, conjunction: Conjunction) -> Result<Arc<ResolvableConjunction>, LogicError> {
        if let Some(label) = find_unknown_type(&self.hierarchy, &conjunction) {
            return Err(LogicError::UnknownPatternType { label });
        }
        let id = {
            let mut arena = self.arena.write().unwrap();
            let candidate_types = candidate_types(&self.hierarchy, &conjunction);
            arena.allocate(Arc::new(conjunction), candidate_types)
        };
        self.resolvable_conjunction(id)
    }

    /// The decomposed conjunction, decomposing it on first access.
    pub fn resolvable_conjunction(&self, id: ConjunctionId) -> Result<Arc<ResolvableConjunction>, LogicError> {
        {
            let arena = self.arena.read().unwrap();
            let entry = arena.entries.get(id.as_u32() as usize).ok_or(LogicError::UnknownConjunction { id })?;
            if let Some(resolvable) = &entry.resolvable {
                return Ok(resolvable.clone());
            }
        }
        let mut arena = self.arena.write().unwrap();
        let entry = arena.entries.get_mut(id.as_u32() as usize).ok_or(LogicError::UnknownConjunction { id })?;
        if let Some(resolvable) = &entry.resolvable {
            return Ok(resolvable.clone());
        }
        let candidate_types = &entry.candidate_types;
        let resolvables = decompose(id, &entry.conjunction, |kind| self.rules_concluding(kind, candidate_types))?;
        event!(
            Level::TRACE,
            "Decomposed conjunction {} {} into {} resolvables.",
            id,
            entry.conjunction,
            resolvables.len()
        );
        let resolvable = Arc::new(ResolvableConjunction::new(
            id,
            entry.conjunction.clone(),
            entry.candidate_types.clone(),
            resolvables,
        ));
        entry.resolvable = Some(resolvable.clone());
        Ok(resolvable)
    }

    /// Rules whose heads can produce answers to a concludable of this shape, with one entry per unifier.
    pub fn rules_concluding(
        &self,
        concludable: &ConcludableKind,
        types: &BTreeMap<Variable, BTreeSet<Label>>,
    ) -> Vec<(RuleId, Unifier)> {
        applicable_rules(concludable, types, &self.rules)
    }
}

/// Candidate types of each annotated variable, closed over subtypes, then narrowed by every `isa` on it.
fn candidate_types(hierarchy: &TypeHierarchy, conjunction: &Conjunction) -> BTreeMap<Variable, BTreeSet<Label>> {
    conjunction
        .annotations()
        .iter()
        .map(|(variable, types)| {
            let mut closed: BTreeSet<Label> = types.iter().flat_map(|type_| hierarchy.type_and_subtypes(type_)).collect();
            let isas = conjunction.constraints().iter().filter_map(Constraint::as_isa);
            for isa in isas.filter(|isa| isa.thing() == variable) {
                match isa.isa_kind() {
                    IsaKind::Exact => closed.retain(|type_| type_ == isa.type_()),
                    IsaKind::Subtype => closed.retain(|type_| hierarchy.is_subtype_of(type_, isa.type_())),
                }
            }
            (variable, closed)
        })
        .collect()
}

fn find_unknown_type(hierarchy: &TypeHierarchy, conjunction: &Conjunction) -> Option<Label> {
    let annotated = conjunction.annotations().iter().flat_map(|(_, types)| types.iter());
    let isa_types = conjunction.constraints().iter().filter_map(Constraint::as_isa).map(|isa| isa.type_());
    annotated.chain(isa_types).find(|label| !hierarchy.contains(label)).cloned()
}

fn validate_head(
    hierarchy: &TypeHierarchy,
    rule: &str,
    when: &Conjunction,
    then: RuleHead,
) -> Result<RuleHead, LogicError> {
    let body_variables = when.variables();
    let check_bound = |variable: &Variable| {
        if body_variables.contains(variable) {
            Ok(())
        } else {
            let variable = when.variable_name(*variable).map(str::to_owned).unwrap_or_else(|| variable.to_string());
            Err(LogicError::UnboundHeadVariable { rule: rule.to_owned(), variable })
        }
    };
    let check_kind = |label: &Label, expected: Kind| match hierarchy.kind(label) {
        None => Err(LogicError::UnknownType { rule: rule.to_owned(), label: label.clone() }),
        Some(actual) if actual != expected => Err(LogicError::UnexpectedConclusionKind {
            rule: rule.to_owned(),
            label: label.clone(),
            expected,
            actual,
        }),
        Some(_) => Ok(()),
    };

    match then {
        RuleHead::ExplicitHas { owner, attribute_type, value } => {
            check_bound(&owner)?;
            check_kind(&attribute_type, Kind::Attribute)?;
            Ok(RuleHead::ExplicitHas { owner, attribute_type, value })
        }
        RuleHead::VariableHas { owner, attribute } => {
            check_bound(&owner)?;
            check_bound(&attribute)?;
            Ok(RuleHead::VariableHas { owner, attribute })
        }
        RuleHead::Relation { relation_type, role_players } => {
            check_kind(&relation_type, Kind::Relation)?;
            if role_players.is_empty() {
                return Err(LogicError::EmptyRelationConclusion { rule: rule.to_owned() });
            }
            let mut resolved = Vec::with_capacity(role_players.len());
            for (role, player) in role_players {
                check_bound(&player)?;
                let Some(scoped) = hierarchy.resolve_role(&relation_type, role.name()) else {
                    return Err(LogicError::UnknownRole {
                        rule: rule.to_owned(),
                        relation: relation_type.clone(),
                        role,
                    });
                };
                resolved.push((scoped, player));
            }
            Ok(RuleHead::Relation { relation_type, role_players: resolved })
        }
    }
}
