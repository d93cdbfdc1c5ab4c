/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{collections::BTreeSet, fmt, sync::Arc};

use ir::pattern::variable::Variable;
use itertools::Itertools;
use logic::{resolvable::Resolvable, resolvable_conjunction::ConjunctionId};
use moka::sync::Cache;
use resource::perf_counters::{Counter, PLAN_CACHE_FLUSH, PLAN_CACHE_HITS, PLAN_CACHE_MISSES};

/// A conjunction together with the variables bound on entry. Plans are made and cached per call mode.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CallMode {
    conjunction: ConjunctionId,
    mode: BTreeSet<Variable>,
}

impl CallMode {
    pub fn new(conjunction: ConjunctionId, mode: BTreeSet<Variable>) -> Self {
        Self { conjunction, mode }
    }

    pub fn conjunction(&self) -> ConjunctionId {
        self.conjunction
    }

    pub fn mode(&self) -> &BTreeSet<Variable> {
        &self.mode
    }
}

impl fmt::Display for CallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.conjunction, self.mode.iter().join(", "))
    }
}

#[derive(Debug)]
pub struct Plan {
    call_mode: CallMode,
    order: Vec<Arc<Resolvable>>,
    cost: f64,
    all_calls_cost: f64,
    cyclic_scaling_factor: f64,
}

impl Plan {
    pub(crate) fn new(
        call_mode: CallMode,
        order: Vec<Arc<Resolvable>>,
        cost: f64,
        all_calls_cost: f64,
        cyclic_scaling_factor: f64,
    ) -> Self {
        Self { call_mode, order, cost, all_calls_cost, cyclic_scaling_factor }
    }

    pub fn call_mode(&self) -> &CallMode {
        &self.call_mode
    }

    pub fn order(&self) -> &[Arc<Resolvable>] {
        &self.order
    }

    /// Expected work of answering every binding of the call mode, excluding recursive calls back into its cycle.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Cost including the calls made around the recursive structure the conjunction belongs to.
    /// Equal to `cost` for conjunctions outside any cycle.
    pub fn all_calls_cost(&self) -> f64 {
        self.all_calls_cost
    }

    /// Fraction of the conjunction's answers that recursive callers within its cycle are expected to request.
    pub fn cyclic_scaling_factor(&self) -> f64 {
        self.cyclic_scaling_factor
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Plan[{}]({}) cost={} all_calls_cost={}",
            self.call_mode,
            self.order.iter().map(|resolvable| resolvable.id()).join(" -> "),
            self.cost,
            self.all_calls_cost
        )
    }
}

/// Plans of one planning session, keyed by call mode. Entries live until the session clears the cache.
#[derive(Debug)]
pub struct PlanCache {
    plans: Cache<CallMode, Arc<Plan>>,
    computed: Counter,
    hits: Counter,
}

impl PlanCache {
    pub fn new() -> Self {
        Self { plans: Cache::builder().build(), computed: Counter::default(), hits: Counter::default() }
    }

    pub fn get(&self, call_mode: &CallMode) -> Option<Arc<Plan>> {
        let plan = self.plans.get(call_mode);
        if plan.is_some() {
            self.hits.increment();
            PLAN_CACHE_HITS.increment();
        }
        plan
    }

    /// Lookup made while planning other call modes. Not counted as a hit.
    pub(crate) fn peek(&self, call_mode: &CallMode) -> Option<Arc<Plan>> {
        self.plans.get(call_mode)
    }

    pub fn contains(&self, call_mode: &CallMode) -> bool {
        self.plans.contains_key(call_mode)
    }

    pub(crate) fn insert(&self, plan: Plan) -> Arc<Plan> {
        self.computed.increment();
        PLAN_CACHE_MISSES.increment();
        let plan = Arc::new(plan);
        self.plans.insert(plan.call_mode().clone(), plan.clone());
        plan
    }

    /// Number of plans computed since the cache was created.
    pub fn computed_count(&self) -> u64 {
        self.computed.get()
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.get()
    }

    pub fn clear(&self) {
        // Entries are removed one by one: invalidate_all may leave plans inserted in the same clock tick visible.
        let call_modes: Vec<Arc<CallMode>> = self.plans.iter().map(|(call_mode, _)| call_mode).collect();
        for call_mode in call_modes {
            self.plans.invalidate(call_mode.as_ref());
        }
        PLAN_CACHE_FLUSH.increment();
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new()
    }
}
