/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![deny(unused_must_use)]
#![deny(elided_lifetimes_in_paths)]

use error::typedb_error;

pub mod pattern;

typedb_error!(
    pub PatternDefinitionError(component = "Pattern definition", prefix = "PAT") {
        UndeclaredVariable(1, "Variable '{variable}' is used before it is declared in this conjunction.", variable: String),
        EmptyConjunction(2, "A conjunction must contain at least one constraint."),
        VariableLimitExceeded(3, "A conjunction may declare at most {limit} variables.", limit: usize),
        EmptyRelation(4, "Relation constraint on '{variable}' declares no role players.", variable: String),
        UnannotatedVariable(
            5,
            "Variable '{variable}' has no candidate types. Type inference must annotate every variable before planning.",
            variable: String
        ),
    }
);
