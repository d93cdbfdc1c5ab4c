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
use ir::pattern::{conjunction::Conjunction, variable::Variable};
use itertools::Itertools;

use crate::resolvable::{Concludable, Resolvable};

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ConjunctionId(u32);

impl ConjunctionId {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConjunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// A conjunction with a stable identity, decomposed once into its resolvables.
#[derive(Debug)]
pub struct ResolvableConjunction {
    id: ConjunctionId,
    conjunction: Arc<Conjunction>,
    candidate_types: BTreeMap<Variable, BTreeSet<Label>>,
    resolvables: Vec<Arc<Resolvable>>,
}

impl ResolvableConjunction {
    pub(crate) fn new(
        id: ConjunctionId,
        conjunction: Arc<Conjunction>,
        candidate_types: BTreeMap<Variable, BTreeSet<Label>>,
        resolvables: Vec<Arc<Resolvable>>,
    ) -> Self {
        Self { id, conjunction, candidate_types, resolvables }
    }

    pub fn id(&self) -> ConjunctionId {
        self.id
    }

    pub fn conjunction(&self) -> &Conjunction {
        &self.conjunction
    }

    pub fn resolvables(&self) -> &[Arc<Resolvable>] {
        &self.resolvables
    }

    pub fn concludables(&self) -> impl Iterator<Item = (&Arc<Resolvable>, &Concludable)> {
        self.resolvables.iter().filter_map(|resolvable| resolvable.as_concludable().map(|concludable| (resolvable, concludable)))
    }

    pub fn variables(&self) -> BTreeSet<Variable> {
        self.conjunction.variables()
    }

    /// Types a variable's instances may have, closed over subtypes and narrowed by the conjunction's `isa`s.
    pub fn candidate_types(&self, variable: Variable) -> Option<&BTreeSet<Label>> {
        self.candidate_types.get(&variable)
    }

    pub fn all_candidate_types(&self) -> &BTreeMap<Variable, BTreeSet<Label>> {
        &self.candidate_types
    }

    /// A variable no type can satisfy makes the whole conjunction unsatisfiable.
    pub fn is_unsatisfiable(&self) -> bool {
        self.variables().iter().any(|variable| self.candidate_types(*variable).map_or(true, BTreeSet::is_empty))
    }
}

impl fmt::Display for ResolvableConjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}]", self.id, self.conjunction, self.resolvables.iter().map(|resolvable| resolvable.id()).join(", "))
    }
}
