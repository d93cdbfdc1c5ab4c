/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use concept::type_::Label;
use itertools::Itertools;

use crate::pattern::variable::Variable;

/// Candidate types of each variable, as assigned by type inference.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct TypeAnnotations {
    variables: BTreeMap<Variable, BTreeSet<Label>>,
}

impl TypeAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annotate(&mut self, variable: Variable, types: impl IntoIterator<Item = Label>) {
        self.variables.entry(variable).or_default().extend(types);
    }

    pub fn declare_empty(&mut self, variable: Variable) {
        self.variables.entry(variable).or_default();
    }

    pub fn types(&self, variable: Variable) -> Option<&BTreeSet<Label>> {
        self.variables.get(&variable)
    }

    pub fn contains(&self, variable: Variable) -> bool {
        self.variables.contains_key(&variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Variable, &BTreeSet<Label>)> {
        self.variables.iter().map(|(variable, types)| (*variable, types))
    }
}

impl fmt::Display for TypeAnnotations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (variable, types) in &self.variables {
            writeln!(f, "{} -> {{{}}}", variable, types.iter().join(", "))?;
        }
        Ok(())
    }
}
