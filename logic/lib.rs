/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![deny(unused_must_use)]
#![deny(elided_lifetimes_in_paths)]

use concept::type_::{Kind, Label};
use error::typedb_error;

use crate::resolvable_conjunction::ConjunctionId;

pub mod logic_manager;
pub mod resolvable;
pub mod resolvable_conjunction;
pub mod rule;
pub mod unifier;

typedb_error!(
    pub LogicError(component = "Logic", prefix = "LGC") {
        UnknownType(1, "Rule '{rule}' references type '{label}', which is not defined.", rule: String, label: Label),
        UnexpectedConclusionKind(
            2,
            "Rule '{rule}' concludes '{label}' of kind '{actual}', where a type of kind '{expected}' is required.",
            rule: String,
            label: Label,
            expected: Kind,
            actual: Kind
        ),
        UnboundHeadVariable(3, "Rule '{rule}' concludes variable '{variable}', which its body does not bind.", rule: String, variable: String),
        UnknownRole(4, "Rule '{rule}' concludes role '{role}', which relation '{relation}' does not relate.", rule: String, relation: Label, role: Label),
        EmptyRelationConclusion(5, "Rule '{rule}' concludes a relation without role players.", rule: String),
        DuplicateRuleLabel(6, "Rule '{rule}' is defined more than once.", rule: String),
        UnknownConjunction(7, "Conjunction '{id}' is not registered with the logic manager.", id: ConjunctionId),
        UnknownPatternType(8, "Pattern references type '{label}', which is not defined.", label: Label),
        ResolvableLimitExceeded(
            9,
            "Conjunction '{id}' decomposes into more than {limit} resolvables.",
            id: ConjunctionId,
            limit: usize
        ),
    }
);
