/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    hash::{Hash, Hasher},
};

use concept::type_::Label;

use crate::{
    pattern::{
        annotations::TypeAnnotations,
        constraint::{Comparator, Comparison, Constraint, Has, Isa, IsaKind, Links, RolePlayer, Value},
        variable::Variable,
    },
    PatternDefinitionError,
};

/// An unordered set of constraints over shared variables, with the candidate types of every variable.
/// Constraints are kept sorted and de-duplicated so structurally identical conjunctions compare equal.
#[derive(Debug, Clone)]
pub struct Conjunction {
    constraints: Vec<Constraint>,
    annotations: TypeAnnotations,
    variable_names: HashMap<Variable, String>,
}

impl Conjunction {
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn annotations(&self) -> &TypeAnnotations {
        &self.annotations
    }

    pub fn variables(&self) -> BTreeSet<Variable> {
        self.constraints.iter().flat_map(Constraint::variables).collect()
    }

    pub fn variable(&self, name: &str) -> Option<Variable> {
        self.variable_names.iter().find(|(_, variable_name)| variable_name.as_str() == name).map(|(var, _)| *var)
    }

    pub fn variable_name(&self, variable: Variable) -> Option<&str> {
        self.variable_names.get(&variable).map(String::as_str)
    }
}

impl PartialEq for Conjunction {
    fn eq(&self, other: &Self) -> bool {
        self.constraints == other.constraints && self.annotations == other.annotations
    }
}

impl Eq for Conjunction {}

impl Hash for Conjunction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.constraints.hash(state);
        self.annotations.hash(state);
    }
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for constraint in &self.constraints {
            write!(f, " {};", constraint)?;
        }
        write!(f, " }}")
    }
}

#[derive(Debug, Default)]
pub struct ConjunctionBuilder {
    next_variable_id: u16,
    named_variables: HashMap<String, Variable>,
    declared: BTreeSet<Variable>,
    constraints: Vec<Constraint>,
    annotations: TypeAnnotations,
}

impl ConjunctionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_declare_variable(&mut self, name: &str) -> Result<Variable, PatternDefinitionError> {
        if let Some(variable) = self.named_variables.get(name) {
            return Ok(*variable);
        }
        let variable = Variable::new(self.allocate_id()?);
        self.named_variables.insert(name.to_owned(), variable);
        self.declared.insert(variable);
        Ok(variable)
    }

    pub fn declare_anonymous(&mut self) -> Result<Variable, PatternDefinitionError> {
        let variable = Variable::new_anonymous(self.allocate_id()?);
        self.declared.insert(variable);
        Ok(variable)
    }

    fn allocate_id(&mut self) -> Result<u16, PatternDefinitionError> {
        let id = self.next_variable_id;
        self.next_variable_id = id
            .checked_add(1)
            .ok_or(PatternDefinitionError::VariableLimitExceeded { limit: u16::MAX as usize })?;
        Ok(id)
    }

    pub fn add_isa(&mut self, kind: IsaKind, thing: Variable, type_: Label) -> Result<(), PatternDefinitionError> {
        self.check_declared(thing)?;
        self.constraints.push(Isa::new(kind, thing, type_).into());
        Ok(())
    }

    pub fn add_has(&mut self, owner: Variable, attribute: Variable) -> Result<(), PatternDefinitionError> {
        self.check_declared(owner)?;
        self.check_declared(attribute)?;
        self.constraints.push(Has::new(owner, attribute, None).into());
        Ok(())
    }

    pub fn add_has_value(
        &mut self,
        owner: Variable,
        attribute: Variable,
        value: impl Into<Value>,
    ) -> Result<(), PatternDefinitionError> {
        self.check_declared(owner)?;
        self.check_declared(attribute)?;
        self.constraints.push(Has::new(owner, attribute, Some(value.into())).into());
        Ok(())
    }

    pub fn add_links<'a>(
        &mut self,
        relation: Variable,
        role_players: impl IntoIterator<Item = (Option<&'a str>, Variable)>,
    ) -> Result<(), PatternDefinitionError> {
        self.check_declared(relation)?;
        let mut players = Vec::new();
        for (role, player) in role_players {
            self.check_declared(player)?;
            players.push(RolePlayer::new(role.map(Label::parse_from), player));
        }
        if players.is_empty() {
            return Err(PatternDefinitionError::EmptyRelation { variable: self.describe(relation) });
        }
        self.constraints.push(Links::new(relation, players).into());
        Ok(())
    }

    pub fn add_comparison(
        &mut self,
        lhs: Variable,
        rhs: Variable,
        comparator: Comparator,
    ) -> Result<(), PatternDefinitionError> {
        self.check_declared(lhs)?;
        self.check_declared(rhs)?;
        self.constraints.push(Comparison::new(lhs, rhs, comparator).into());
        Ok(())
    }

    pub fn annotate(
        &mut self,
        variable: Variable,
        types: impl IntoIterator<Item = Label>,
    ) -> Result<(), PatternDefinitionError> {
        self.check_declared(variable)?;
        self.annotations.declare_empty(variable);
        self.annotations.annotate(variable, types);
        Ok(())
    }

    pub fn build(self) -> Result<Conjunction, PatternDefinitionError> {
        if self.constraints.is_empty() {
            return Err(PatternDefinitionError::EmptyConjunction {});
        }
        let mut constraints = self.constraints;
        constraints.sort();
        constraints.dedup();
        for constraint in &constraints {
            for variable in constraint.variables() {
                if !self.annotations.contains(variable) {
                    let variable = match self.named_variables.iter().find(|(_, named)| **named == variable) {
                        Some((name, _)) => name.clone(),
                        None => variable.to_string(),
                    };
                    return Err(PatternDefinitionError::UnannotatedVariable { variable });
                }
            }
        }
        let variable_names = self.named_variables.into_iter().map(|(name, variable)| (variable, name)).collect();
        Ok(Conjunction { constraints, annotations: self.annotations, variable_names })
    }

    fn check_declared(&self, variable: Variable) -> Result<(), PatternDefinitionError> {
        if self.declared.contains(&variable) {
            Ok(())
        } else {
            Err(PatternDefinitionError::UndeclaredVariable { variable: variable.to_string() })
        }
    }

    fn describe(&self, variable: Variable) -> String {
        self.named_variables
            .iter()
            .find(|(_, named)| **named == variable)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| variable.to_string())
    }
}
