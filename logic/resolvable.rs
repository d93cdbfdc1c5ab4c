/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use ir::pattern::{
    conjunction::Conjunction,
    constraint::{Constraint, RolePlayer, Value},
    variable::Variable,
};
use itertools::Itertools;

use crate::{resolvable_conjunction::ConjunctionId, rule::RuleId, unifier::Unifier, LogicError};

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ResolvableId {
    conjunction: ConjunctionId,
    index: u16,
}

impl ResolvableId {
    pub fn conjunction(&self) -> ConjunctionId {
        self.conjunction
    }

    pub fn index(&self) -> u16 {
        self.index
    }
}

impl fmt::Display for ResolvableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.conjunction, self.index)
    }
}

/// A unit of evaluation within a conjunction.
/// Identity, ordering and hashing are by id alone.
#[derive(Debug)]
pub enum Resolvable {
    Retrievable(Retrievable),
    Concludable(Concludable),
}

impl Resolvable {
    pub fn id(&self) -> ResolvableId {
        match self {
            Resolvable::Retrievable(retrievable) => retrievable.id,
            Resolvable::Concludable(concludable) => concludable.id,
        }
    }

    pub fn conjunction(&self) -> ConjunctionId {
        self.id().conjunction
    }

    pub fn constraints(&self) -> &[Constraint] {
        match self {
            Resolvable::Retrievable(retrievable) => &retrievable.constraints,
            Resolvable::Concludable(concludable) => &concludable.constraints,
        }
    }

    pub fn variables(&self) -> &BTreeSet<Variable> {
        match self {
            Resolvable::Retrievable(retrievable) => &retrievable.variables,
            Resolvable::Concludable(concludable) => &concludable.variables,
        }
    }

    pub fn is_concludable(&self) -> bool {
        matches!(self, Resolvable::Concludable(_))
    }

    pub fn as_concludable(&self) -> Option<&Concludable> {
        match self {
            Resolvable::Concludable(concludable) => Some(concludable),
            Resolvable::Retrievable(_) => None,
        }
    }

    pub fn as_retrievable(&self) -> Option<&Retrievable> {
        match self {
            Resolvable::Retrievable(retrievable) => Some(retrievable),
            Resolvable::Concludable(_) => None,
        }
    }

    /// The variable whose instances the resolvable may create, which only a concludable can.
    pub fn generating(&self) -> Option<Variable> {
        self.as_concludable().map(Concludable::generating)
    }
}

impl PartialEq for Resolvable {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Resolvable {}

impl Hash for Resolvable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state)
    }
}

impl PartialOrd for Resolvable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Resolvable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl fmt::Display for Resolvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Resolvable::Retrievable(_) => "Retrievable",
            Resolvable::Concludable(_) => "Concludable",
        };
        write!(f, "{}[{}]{{ {} }}", kind, self.id(), self.constraints().iter().join("; "))
    }
}

/// Constraints answered purely from stored facts.
#[derive(Debug)]
pub struct Retrievable {
    id: ResolvableId,
    constraints: Vec<Constraint>,
    variables: BTreeSet<Variable>,
}

impl Retrievable {
    pub fn id(&self) -> ResolvableId {
        self.id
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConcludableKind {
    Has { owner: Variable, attribute: Variable, value: Option<Value> },
    Relation { relation: Variable, role_players: Vec<RolePlayer> },
    Isa { thing: Variable },
}

impl ConcludableKind {
    pub fn generating(&self) -> Variable {
        match self {
            ConcludableKind::Has { attribute, .. } => *attribute,
            ConcludableKind::Relation { relation, .. } => *relation,
            ConcludableKind::Isa { thing } => *thing,
        }
    }
}

/// Constraints whose answers may additionally be produced by applying rules.
#[derive(Debug)]
pub struct Concludable {
    id: ResolvableId,
    kind: ConcludableKind,
    constraints: Vec<Constraint>,
    variables: BTreeSet<Variable>,
    applicable_rules: Vec<(RuleId, Unifier)>,
}

impl Concludable {
    pub fn id(&self) -> ResolvableId {
        self.id
    }

    pub fn kind(&self) -> &ConcludableKind {
        &self.kind
    }

    pub fn generating(&self) -> Variable {
        self.kind.generating()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn variables(&self) -> &BTreeSet<Variable> {
        &self.variables
    }

    /// Rules whose head unifies with this concludable, with one entry per distinct unifier.
    pub fn applicable_rules(&self) -> &[(RuleId, Unifier)] {
        &self.applicable_rules
    }
}

struct ConcludableCandidate {
    kind: ConcludableKind,
    constraint_indices: Vec<usize>,
}

/// Splits a conjunction into concludables, for every constraint shape some rule may conclude,
/// and retrievables, one per connected component of the remaining constraints.
/// Rules are looked up per candidate through `rules_concluding`.
pub(crate) fn decompose(
    conjunction_id: ConjunctionId,
    conjunction: &Conjunction,
    rules_concluding: impl Fn(&ConcludableKind) -> Vec<(RuleId, Unifier)>,
) -> Result<Vec<Arc<Resolvable>>, LogicError> {
    let constraints = conjunction.constraints();
    let mut consumed = vec![false; constraints.len()];
    let mut candidates = Vec::new();

    for (index, constraint) in constraints.iter().enumerate() {
        match constraint {
            Constraint::Has(has) => candidates.push(ConcludableCandidate {
                kind: ConcludableKind::Has { owner: has.owner(), attribute: has.attribute(), value: has.value().cloned() },
                constraint_indices: vec![index],
            }),
            Constraint::Links(links) => {
                let mut constraint_indices = vec![index];
                constraint_indices.extend(constraints.iter().enumerate().filter_map(|(isa_index, other)| {
                    other.as_isa().filter(|isa| isa.thing() == links.relation()).map(|_| isa_index)
                }));
                candidates.push(ConcludableCandidate {
                    kind: ConcludableKind::Relation {
                        relation: links.relation(),
                        role_players: links.role_players().to_vec(),
                    },
                    constraint_indices,
                });
            }
            Constraint::Isa(_) | Constraint::Comparison(_) => (),
        }
    }
    for (index, constraint) in constraints.iter().enumerate() {
        if let Constraint::Isa(isa) = constraint {
            candidates.push(ConcludableCandidate {
                kind: ConcludableKind::Isa { thing: isa.thing() },
                constraint_indices: vec![index],
            });
        }
    }

    let mut resolvables = Vec::new();
    for candidate in candidates {
        if candidate.constraint_indices.iter().any(|index| consumed[*index]) {
            continue;
        }
        let applicable_rules = rules_concluding(&candidate.kind);
        if applicable_rules.is_empty() {
            continue;
        }
        let constraints = candidate.constraint_indices.iter().map(|index| constraints[*index].clone()).collect_vec();
        for index in &candidate.constraint_indices {
            consumed[*index] = true;
        }
        let variables = constraints.iter().flat_map(Constraint::variables).collect();
        resolvables.push(Resolvable::Concludable(Concludable {
            id: ResolvableId { conjunction: conjunction_id, index: 0 },
            kind: candidate.kind,
            constraints,
            variables,
            applicable_rules,
        }));
    }

    for component in connected_components(constraints, &consumed) {
        let constraints = component.into_iter().map(|index| constraints[index].clone()).collect_vec();
        let variables = constraints.iter().flat_map(Constraint::variables).collect();
        resolvables.push(Resolvable::Retrievable(Retrievable {
            id: ResolvableId { conjunction: conjunction_id, index: 0 },
            constraints,
            variables,
        }));
    }

    resolvables
        .into_iter()
        .enumerate()
        .map(|(index, mut resolvable)| {
            let id = resolvable_id(conjunction_id, index)?;
            match &mut resolvable {
                Resolvable::Retrievable(retrievable) => retrievable.id = id,
                Resolvable::Concludable(concludable) => concludable.id = id,
            }
            Ok(Arc::new(resolvable))
        })
        .collect()
}

fn resolvable_id(conjunction: ConjunctionId, index: usize) -> Result<ResolvableId, LogicError> {
    let index = u16::try_from(index)
        .map_err(|_| LogicError::ResolvableLimitExceeded { id: conjunction, limit: u16::MAX as usize + 1 })?;
    Ok(ResolvableId { conjunction, index })
}

// Components of the unconsumed constraints, connected through shared variables, each in constraint order.
fn connected_components(constraints: &[Constraint], consumed: &[bool]) -> Vec<Vec<usize>> {
    let remaining = (0..constraints.len()).filter(|index| !consumed[*index]).collect_vec();
    let mut component_of: BTreeMap<usize, usize> = BTreeMap::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    for &start in &remaining {
        if component_of.contains_key(&start) {
            continue;
        }
        let component_id = components.len();
        let mut members = vec![start];
        component_of.insert(start, component_id);
        let mut frontier = vec![start];
        while let Some(current) = frontier.pop() {
            let current_variables: BTreeSet<Variable> = constraints[current].variables().collect();
            for &other in &remaining {
                if component_of.contains_key(&other) {
                    continue;
                }
                if constraints[other].variables().any(|variable| current_variables.contains(&variable)) {
                    component_of.insert(other, component_id);
                    members.push(other);
                    frontier.push(other);
                }
            }
        }
        members.sort();
        components.push(members);
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolvable_indices_past_u16_are_rejected() {
        let conjunction = ConjunctionId::new(3);
        let last = resolvable_id(conjunction, u16::MAX as usize).unwrap();
        assert_eq!(last.index(), u16::MAX);
        assert_eq!(last.conjunction(), conjunction);
        match resolvable_id(conjunction, u16::MAX as usize + 1) {
            Err(LogicError::ResolvableLimitExceeded { id, limit }) => {
                assert_eq!(id, conjunction);
                assert_eq!(limit, 65536);
            }
            other => panic!("expected the resolvable limit to be exceeded, got {other:?}"),
        }
    }
}
