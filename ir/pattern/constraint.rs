/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, sync::Arc};

use concept::type_::Label;
use itertools::Itertools;

use crate::pattern::variable::Variable;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Constraint {
    Isa(Isa),
    Has(Has),
    Links(Links),
    Comparison(Comparison),
}

impl Constraint {
    pub fn variables(&self) -> Box<dyn Iterator<Item = Variable> + '_> {
        match self {
            Constraint::Isa(isa) => Box::new(isa.variables()),
            Constraint::Has(has) => Box::new(has.variables()),
            Constraint::Links(links) => Box::new(links.variables()),
            Constraint::Comparison(comparison) => Box::new(comparison.variables()),
        }
    }

    pub fn as_isa(&self) -> Option<&Isa> {
        match self {
            Constraint::Isa(isa) => Some(isa),
            _ => None,
        }
    }

    pub fn as_has(&self) -> Option<&Has> {
        match self {
            Constraint::Has(has) => Some(has),
            _ => None,
        }
    }

    pub fn as_links(&self) -> Option<&Links> {
        match self {
            Constraint::Links(links) => Some(links),
            _ => None,
        }
    }

    pub fn as_comparison(&self) -> Option<&Comparison> {
        match self {
            Constraint::Comparison(comparison) => Some(comparison),
            _ => None,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Isa(isa) => fmt::Display::fmt(isa, f),
            Constraint::Has(has) => fmt::Display::fmt(has, f),
            Constraint::Links(links) => fmt::Display::fmt(links, f),
            Constraint::Comparison(comparison) => fmt::Display::fmt(comparison, f),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum IsaKind {
    Exact,
    Subtype,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Isa {
    thing: Variable,
    type_: Label,
    kind: IsaKind,
}

impl Isa {
    pub fn new(kind: IsaKind, thing: Variable, type_: Label) -> Self {
        Self { thing, type_, kind }
    }

    pub fn thing(&self) -> Variable {
        self.thing
    }

    pub fn type_(&self) -> &Label {
        &self.type_
    }

    pub fn isa_kind(&self) -> IsaKind {
        self.kind
    }

    pub fn variables(&self) -> impl Iterator<Item = Variable> {
        [self.thing].into_iter()
    }
}

impl From<Isa> for Constraint {
    fn from(isa: Isa) -> Self {
        Constraint::Isa(isa)
    }
}

impl fmt::Display for Isa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IsaKind::Exact => write!(f, "{} isa! {}", self.thing, self.type_),
            IsaKind::Subtype => write!(f, "{} isa {}", self.thing, self.type_),
        }
    }
}

/// Ownership, optionally restricting the attribute to a single value.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Has {
    owner: Variable,
    attribute: Variable,
    value: Option<Value>,
}

impl Has {
    pub fn new(owner: Variable, attribute: Variable, value: Option<Value>) -> Self {
        Has { owner, attribute, value }
    }

    pub fn owner(&self) -> Variable {
        self.owner
    }

    pub fn attribute(&self) -> Variable {
        self.attribute
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn variables(&self) -> impl Iterator<Item = Variable> {
        [self.owner, self.attribute].into_iter()
    }
}

impl From<Has> for Constraint {
    fn from(has: Has) -> Self {
        Constraint::Has(has)
    }
}

impl fmt::Display for Has {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            None => write!(f, "{} has {}", self.owner, self.attribute),
            Some(value) => write!(f, "{} has {} {}", self.owner, self.attribute, value),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RolePlayer {
    role: Option<Label>,
    player: Variable,
}

impl RolePlayer {
    pub fn new(role: Option<Label>, player: Variable) -> Self {
        Self { role, player }
    }

    /// The role name as written, `None` when any role may be played.
    pub fn role(&self) -> Option<&Label> {
        self.role.as_ref()
    }

    pub fn player(&self) -> Variable {
        self.player
    }
}

impl fmt::Display for RolePlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.role {
            None => write!(f, "{}", self.player),
            Some(role) => write!(f, "{}: {}", role, self.player),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Links {
    relation: Variable,
    role_players: Vec<RolePlayer>,
}

impl Links {
    pub fn new(relation: Variable, mut role_players: Vec<RolePlayer>) -> Self {
        role_players.sort();
        Self { relation, role_players }
    }

    pub fn relation(&self) -> Variable {
        self.relation
    }

    pub fn role_players(&self) -> &[RolePlayer] {
        &self.role_players
    }

    pub fn players(&self) -> impl Iterator<Item = Variable> + '_ {
        self.role_players.iter().map(RolePlayer::player)
    }

    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        [self.relation].into_iter().chain(self.players())
    }
}

impl From<Links> for Constraint {
    fn from(links: Links) -> Self {
        Constraint::Links(links)
    }
}

impl fmt::Display for Links {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} links ({})", self.relation, self.role_players.iter().join(", "))
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Comparator {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Equal => "==",
            Comparator::NotEqual => "!=",
            Comparator::Less => "<",
            Comparator::Greater => ">",
            Comparator::LessOrEqual => "<=",
            Comparator::GreaterOrEqual => ">=",
        }
    }
}

/// A check between two variables. Never binds either side.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Comparison {
    lhs: Variable,
    rhs: Variable,
    comparator: Comparator,
}

impl Comparison {
    pub fn new(lhs: Variable, rhs: Variable, comparator: Comparator) -> Self {
        Self { lhs, rhs, comparator }
    }

    pub fn lhs(&self) -> Variable {
        self.lhs
    }

    pub fn rhs(&self) -> Variable {
        self.rhs
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn variables(&self) -> impl Iterator<Item = Variable> {
        [self.lhs, self.rhs].into_iter()
    }
}

impl From<Comparison> for Constraint {
    fn from(comparison: Comparison) -> Self {
        Constraint::Comparison(comparison)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.comparator.symbol(), self.rhs)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Value {
    Boolean(bool),
    Long(i64),
    String(Arc<str>),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Long(value) => write!(f, "{value}"),
            Value::String(value) => write!(f, "\"{value}\""),
        }
    }
}
