/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use concept::error::ConceptError;
use error::typedb_error;
use logic::{resolvable_conjunction::ConjunctionId, LogicError};

use crate::planner::plan::CallMode;

typedb_error!(
    pub PlannerError(component = "Reasoner planner", prefix = "RPL") {
        UnresolvableDependencyCycle(
            1,
            "Conjunction '{conjunction}' has no valid ordering: resolvables [{blocked}] require each other's variables outside of rule recursion.",
            conjunction: ConjunctionId,
            blocked: String
        ),
        TerminationGuardExceeded(
            2,
            "Planning of conjunction '{conjunction}' reached nesting depth {depth}, beyond the {limit} registered conjunctions.",
            conjunction: ConjunctionId,
            depth: usize,
            limit: usize
        ),
        UnknownConjunction(3, "Conjunction could not be resolved for planning.", ( typedb_source : LogicError )),
        InconsistentStatistics(4, "Statistics snapshot does not describe the schema being planned against.", ( typedb_source : ConceptError )),
        InvalidRuleIndex(5, "Body of rule '{rule}' could not be resolved.", rule: String, ( typedb_source : LogicError )),
        MissingPlan(6, "No plan was produced for call mode '{call_mode}'.", call_mode: CallMode),
    }
);
