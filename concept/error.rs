/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::Arc;

use error::typedb_error;

use crate::type_::{Kind, Label};

typedb_error!(
    pub ConceptError(component = "Concept", prefix = "CON") {
        DuplicateTypeDefinition(1, "Type '{label}' is defined more than once.", label: Label),
        UnknownSupertype(2, "Type '{label}' declares an undefined supertype '{supertype}'.", label: Label, supertype: Label),
        SupertypeKindMismatch(
            3,
            "Type '{label}' of kind '{kind}' cannot subtype '{supertype}' of kind '{supertype_kind}'.",
            label: Label,
            kind: Kind,
            supertype: Label,
            supertype_kind: Kind
        ),
        CyclicTypeHierarchy(4, "Type '{label}' is its own transitive supertype.", label: Label),
        UnknownType(5, "Type '{label}' is not defined in the type hierarchy.", label: Label),
        UnexpectedTypeKind(6, "Type '{label}' was expected to be of kind '{expected}', but is of kind '{actual}'.", label: Label, expected: Kind, actual: Kind),
        StatisticsTotalMismatch(
            7,
            "Statistics snapshot is inconsistent: total '{total_name}' is {total}, but the per-type counts sum to {sum}.",
            total_name: &'static str,
            total: u64,
            sum: u64
        ),
        StatisticsUnrelatedRole(8, "Statistics record players of role '{role}' in relation '{relation}', which does not relate it.", relation: Label, role: Label),
        StatisticsEncodingVersion(9, "Statistics snapshot has encoding version {found}, expected {expected}.", found: u64, expected: u64),
        StatisticsSerialisation(10, "Statistics snapshot could not be (de)serialised.", ( source : Arc<bincode::Error> )),
    }
);
