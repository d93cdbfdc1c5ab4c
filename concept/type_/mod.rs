/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

pub mod type_hierarchy;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Kind {
    Entity,
    Attribute,
    Relation,
    Role,
}

impl Kind {
    pub fn is_object(&self) -> bool {
        matches!(self, Kind::Entity | Kind::Relation)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Entity => write!(f, "entity"),
            Kind::Attribute => write!(f, "attribute"),
            Kind::Relation => write!(f, "relation"),
            Kind::Role => write!(f, "relation:role"),
        }
    }
}

/// Schema type label. Role labels are scoped by their relation, as in `household:member`.
#[derive(Clone)]
pub struct Label {
    name: Arc<str>,
    scope: Option<Arc<str>>,
    scoped_name: Arc<str>,
}

impl Label {
    pub fn parse_from(string: &str) -> Label {
        match string.split_once(':') {
            Some((scope, name)) => Self::build_scoped(name, scope),
            None => Self::build(string),
        }
    }

    pub fn build(name: &str) -> Label {
        let name: Arc<str> = Arc::from(name);
        Label { scoped_name: name.clone(), name, scope: None }
    }

    pub fn build_scoped(name: &str, scope: &str) -> Label {
        Label {
            name: Arc::from(name),
            scope: Some(Arc::from(scope)),
            scoped_name: Arc::from(format!("{}:{}", scope, name).as_str()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn scoped_name(&self) -> &str {
        &self.scoped_name
    }
}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scoped_name.hash(state)
    }
}

impl Eq for Label {}

impl PartialEq<Self> for Label {
    fn eq(&self, other: &Self) -> bool {
        self.scoped_name == other.scoped_name
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.scoped_name.cmp(&other.scoped_name)
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scoped_name)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label[{}]", self.scoped_name)
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.scoped_name())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LabelVisitor;

        impl de::Visitor<'_> for LabelVisitor {
            type Value = Label;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a scoped or unscoped type label")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Label, E> {
                Ok(Label::parse_from(value))
            }
        }

        deserializer.deserialize_str(LabelVisitor)
    }
}
