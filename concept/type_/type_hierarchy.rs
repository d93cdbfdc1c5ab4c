/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use itertools::Itertools;
use tracing::{event, Level};

use crate::{
    error::ConceptError,
    type_::{Kind, Label},
};

#[derive(Debug, Clone)]
struct TypeDefinition {
    kind: Kind,
    supertype: Option<Label>,
    is_abstract: bool,
}

/// Read-only snapshot of the schema's type hierarchy: kinds, single-inheritance supertypes
/// and the roles each relation type relates. Role types are labelled `relation:role`.
#[derive(Debug, Clone)]
pub struct TypeHierarchy {
    types: BTreeMap<Label, TypeDefinition>,
    subtypes: HashMap<Label, BTreeSet<Label>>,
    relates: HashMap<Label, BTreeSet<Label>>,
}

impl TypeHierarchy {
    pub fn builder() -> TypeHierarchyBuilder {
        TypeHierarchyBuilder::default()
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.types.contains_key(label)
    }

    pub fn kind(&self, label: &Label) -> Option<Kind> {
        self.types.get(label).map(|definition| definition.kind)
    }

    pub fn get_kind(&self, label: &Label) -> Result<Kind, ConceptError> {
        self.kind(label).ok_or_else(|| ConceptError::UnknownType { label: label.clone() })
    }

    pub fn is_abstract(&self, label: &Label) -> bool {
        self.types.get(label).is_some_and(|definition| definition.is_abstract)
    }

    pub fn supertype(&self, label: &Label) -> Option<&Label> {
        self.types.get(label).and_then(|definition| definition.supertype.as_ref())
    }

    pub fn supertypes_transitive(&self, label: &Label) -> Vec<Label> {
        let mut supertypes = Vec::new();
        let mut current = self.supertype(label);
        while let Some(supertype) = current {
            supertypes.push(supertype.clone());
            current = self.supertype(supertype);
        }
        supertypes
    }

    pub fn subtypes(&self, label: &Label) -> impl Iterator<Item = &Label> {
        self.subtypes.get(label).into_iter().flatten()
    }

    /// Transitive subtypes, excluding the type itself, in breadth-first order.
    pub fn subtypes_transitive(&self, label: &Label) -> Vec<Label> {
        let mut result = Vec::new();
        let mut frontier = self.subtypes(label).cloned().collect_vec();
        while let Some(subtype) = frontier.pop() {
            frontier.extend(self.subtypes(&subtype).cloned());
            result.push(subtype);
        }
        result.sort();
        result
    }

    pub fn type_and_subtypes(&self, label: &Label) -> Vec<Label> {
        let mut result = vec![label.clone()];
        result.extend(self.subtypes_transitive(label));
        result
    }

    /// Reflexive: every type is a subtype of itself.
    pub fn is_subtype_of(&self, subtype: &Label, supertype: &Label) -> bool {
        subtype == supertype || self.supertypes_transitive(subtype).contains(supertype)
    }

    /// Roles related by the relation type, including the ones inherited from its supertypes.
    pub fn relates(&self, relation: &Label) -> BTreeSet<Label> {
        let mut roles = BTreeSet::new();
        for relation_type in std::iter::once(relation.clone()).chain(self.supertypes_transitive(relation)) {
            if let Some(declared) = self.relates.get(&relation_type) {
                roles.extend(declared.iter().cloned());
            }
        }
        roles
    }

    pub fn resolve_role(&self, relation: &Label, role_name: &str) -> Option<Label> {
        self.relates(relation).into_iter().find(|role| role.name() == role_name)
    }

    pub fn labels_of_kind(&self, kind: Kind) -> impl Iterator<Item = &Label> {
        self.types.iter().filter(move |(_, definition)| definition.kind == kind).map(|(label, _)| label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.types.keys()
    }
}

#[derive(Debug, Default)]
pub struct TypeHierarchyBuilder {
    definitions: Vec<(Label, Kind, Option<Label>)>,
    roles: Vec<(Label, Label)>,
    abstracts: HashSet<Label>,
}

impl TypeHierarchyBuilder {
    pub fn define_entity(&mut self, name: &str, supertype: Option<&str>) -> &mut Self {
        self.definitions.push((Label::build(name), Kind::Entity, supertype.map(Label::build)));
        self
    }

    pub fn define_attribute(&mut self, name: &str, supertype: Option<&str>) -> &mut Self {
        self.definitions.push((Label::build(name), Kind::Attribute, supertype.map(Label::build)));
        self
    }

    pub fn define_relation(&mut self, name: &str, supertype: Option<&str>, roles: &[&str]) -> &mut Self {
        let relation = Label::build(name);
        for role in roles {
            let role = Label::build_scoped(role, name);
            self.definitions.push((role.clone(), Kind::Role, None));
            self.roles.push((relation.clone(), role));
        }
        self.definitions.push((relation, Kind::Relation, supertype.map(Label::build)));
        self
    }

    pub fn set_abstract(&mut self, name: &str) -> &mut Self {
        self.abstracts.insert(Label::build(name));
        self
    }

    pub fn build(&self) -> Result<TypeHierarchy, ConceptError> {
        let mut types = BTreeMap::new();
        for (label, kind, supertype) in &self.definitions {
            let definition =
                TypeDefinition { kind: *kind, supertype: supertype.clone(), is_abstract: self.abstracts.contains(label) };
            if types.insert(label.clone(), definition).is_some() {
                return Err(ConceptError::DuplicateTypeDefinition { label: label.clone() });
            }
        }
        if let Some(label) = self.abstracts.iter().find(|label| !types.contains_key(*label)) {
            return Err(ConceptError::UnknownType { label: label.clone() });
        }

        let mut subtypes: HashMap<Label, BTreeSet<Label>> = HashMap::new();
        for (label, definition) in &types {
            let Some(supertype) = &definition.supertype else { continue };
            let Some(super_definition) = types.get(supertype) else {
                return Err(ConceptError::UnknownSupertype { label: label.clone(), supertype: supertype.clone() });
            };
            if super_definition.kind != definition.kind {
                return Err(ConceptError::SupertypeKindMismatch {
                    label: label.clone(),
                    kind: definition.kind,
                    supertype: supertype.clone(),
                    supertype_kind: super_definition.kind,
                });
            }
            subtypes.entry(supertype.clone()).or_default().insert(label.clone());
        }

        for label in types.keys() {
            let mut visited = HashSet::from([label]);
            let mut current = types.get(label).and_then(|definition| definition.supertype.as_ref());
            while let Some(supertype) = current {
                if !visited.insert(supertype) {
                    return Err(ConceptError::CyclicTypeHierarchy { label: label.clone() });
                }
                current = types.get(supertype).and_then(|definition| definition.supertype.as_ref());
            }
        }

        let mut relates: HashMap<Label, BTreeSet<Label>> = HashMap::new();
        for (relation, role) in &self.roles {
            relates.entry(relation.clone()).or_default().insert(role.clone());
        }

        event!(Level::TRACE, "Built type hierarchy with {} types.", types.len());
        Ok(TypeHierarchy { types, subtypes, relates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> TypeHierarchy {
        TypeHierarchy::builder()
            .define_entity("person", None)
            .define_entity("man", Some("person"))
            .define_entity("boy", Some("man"))
            .define_attribute("name", None)
            .define_attribute("first-name", Some("name"))
            .set_abstract("name")
            .define_relation("friendship", None, &["friendor", "friendee"])
            .define_relation("best-friendship", Some("friendship"), &[])
            .build()
            .unwrap()
    }

    #[test]
    fn subtypes_are_transitive_and_reflexive() {
        let hierarchy = hierarchy();
        let person = Label::build("person");
        assert_eq!(
            hierarchy.type_and_subtypes(&person),
            vec![person.clone(), Label::build("boy"), Label::build("man")]
        );
        assert!(hierarchy.is_subtype_of(&Label::build("boy"), &person));
        assert!(hierarchy.is_subtype_of(&person, &person));
        assert!(!hierarchy.is_subtype_of(&person, &Label::build("man")));
        assert!(hierarchy.is_abstract(&Label::build("name")));
    }

    #[test]
    fn roles_are_inherited() {
        let hierarchy = hierarchy();
        let best = Label::build("best-friendship");
        assert_eq!(hierarchy.resolve_role(&best, "friendor"), Some(Label::parse_from("friendship:friendor")));
        assert_eq!(hierarchy.relates(&best).len(), 2);
        assert_eq!(hierarchy.kind(&Label::parse_from("friendship:friendee")), Some(Kind::Role));
    }

    #[test]
    fn invalid_hierarchies_are_rejected() {
        let unknown = TypeHierarchy::builder().define_entity("man", Some("person")).build();
        assert!(matches!(unknown, Err(ConceptError::UnknownSupertype { .. })));

        let mismatch =
            TypeHierarchy::builder().define_entity("person", None).define_attribute("name", Some("person")).build();
        assert!(matches!(mismatch, Err(ConceptError::SupertypeKindMismatch { .. })));

        let cyclic = TypeHierarchy::builder().define_entity("a", Some("b")).define_entity("b", Some("a")).build();
        assert!(matches!(cyclic, Err(ConceptError::CyclicTypeHierarchy { .. })));

        let duplicate = TypeHierarchy::builder().define_entity("a", None).define_entity("a", None).build();
        assert!(matches!(duplicate, Err(ConceptError::DuplicateTypeDefinition { .. })));
    }
}
