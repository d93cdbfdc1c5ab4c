/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex},
};

use itertools::Itertools;
use logic::resolvable::Resolvable;
use tracing::{event, Level};

use crate::{
    cost_estimator::{OrderingCost, StepCost},
    planner::{
        dependencies, enabled,
        plan::{CallMode, Plan, PlanCache},
        value_identified, PlanningStates, ReasonerPlanner,
    },
    session::PlanningSession,
    PlannerError,
};

/// Orders each conjunction by repeatedly appending the cheapest resolvable whose inputs are bound.
/// Never backtracks, so it may miss a cheaper order.
#[derive(Debug)]
pub struct GreedyCostSearch {
    session: Arc<PlanningSession>,
    plan_cache: PlanCache,
    planning_states: Mutex<PlanningStates>,
}

impl GreedyCostSearch {
    pub fn new(session: Arc<PlanningSession>) -> Self {
        Self { session, plan_cache: PlanCache::new(), planning_states: Mutex::new(HashMap::new()) }
    }
}

impl ReasonerPlanner for GreedyCostSearch {
    fn session(&self) -> &PlanningSession {
        &self.session
    }

    fn plan_cache(&self) -> &PlanCache {
        &self.plan_cache
    }

    fn planning_states(&self) -> &Mutex<PlanningStates> {
        &self.planning_states
    }

    fn compute_plan(&self, states: &mut PlanningStates, call_mode: &CallMode, depth: usize) -> Result<(), PlannerError> {
        let ordering = greedy_ordering(self, states, call_mode, depth)?;

        // Recursive callees in the same cycle are planned at this depth; those still being planned contribute
        // their estimated answers instead of a plan.
        let answer_count_estimator = self.session.answer_count_estimator();
        let mut cyclic_seed_cost = 0.0;
        for (concludable, callees) in ordering.cyclic_calls() {
            let scaling_factor = ordering.scaling_factor(*concludable);
            for callee in callees {
                self.plan_call(states, callee, depth)?;
                let callee_cost = match self.plan_cache.peek(callee) {
                    Some(plan) => plan.all_calls_cost(),
                    None => answer_count_estimator.estimate_all_answers(callee.conjunction())?,
                };
                cyclic_seed_cost += callee_cost * scaling_factor;
            }
        }

        let cost = ordering.acyclic_cost();
        let plan = Plan::new(call_mode.clone(), ordering.order().to_vec(), cost, cost + cyclic_seed_cost, 0.0);
        event!(Level::TRACE, "Greedy search: {}", plan);
        self.plan_cache.insert(plan);
        Ok(())
    }
}

/// The greedy ordering of a call mode, with the calls it makes out of its component planned at `depth + 1`.
/// Ties go to the resolvable with the lowest id.
pub(crate) fn greedy_ordering<P: ReasonerPlanner + ?Sized>(
    planner: &P,
    states: &mut PlanningStates,
    call_mode: &CallMode,
    depth: usize,
) -> Result<OrderingCost, PlannerError> {
    let session = planner.session();
    let conjunction = session.resolvable_conjunction(call_mode.conjunction())?;
    let dependencies = dependencies(&conjunction);
    let value_identified = value_identified(&conjunction);
    let mut coster = session.cost_estimator().ordering_coster(call_mode)?;
    let mut remaining: BTreeSet<Arc<Resolvable>> = conjunction.resolvables().iter().cloned().collect();

    while !remaining.is_empty() {
        let bound = coster.bound_variables() | &value_identified;
        let candidates = enabled(coster.node(), &dependencies, &remaining, &bound)?;
        let mut best: Option<(Arc<Resolvable>, StepCost)> = None;
        for candidate in candidates {
            for callee in coster.acyclic_calls(&candidate) {
                planner.plan_call(states, &callee, depth + 1)?;
            }
            let step = coster.step_cost(&candidate, &|callee: &CallMode| planner.plan_cache().peek(callee))?;
            event!(Level::TRACE, "{}: candidate {} costs {}.", call_mode, candidate.id(), step);
            if best.as_ref().map_or(true, |(_, best_step)| step.total() < best_step.total()) {
                best = Some((candidate, step));
            }
        }
        let Some((next, step)) = best else {
            return Err(PlannerError::UnresolvableDependencyCycle {
                conjunction: call_mode.conjunction(),
                blocked: remaining.iter().map(|resolvable| resolvable.id()).join(", "),
            });
        };
        remaining.remove(&next);
        coster.push(&next, &step);
    }
    Ok(coster.finish())
}
