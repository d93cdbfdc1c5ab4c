/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod reasoner {
    // Combining answers is a table lookup, with no retrieval or reasoning behind it.
    pub const RELATIVE_COST_ANSWER_COMBINATION: f64 = 1.0;

    // Above this many resolvables, every conjunction is ordered greedily.
    pub const EXHAUSTIVE_PLANNER_RESOLVABLE_LIMIT: usize = 8;

    pub const CYCLIC_REFINEMENT_ROUNDS: usize = 1;

    pub const PERF_COUNTERS_ENABLED: bool = true;
}

pub mod statistics {
    pub const STATISTICS_ENCODING_VERSION: u64 = 0;
}
