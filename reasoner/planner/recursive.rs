/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, Mutex},
};

use ir::pattern::variable::Variable;
use logic::resolvable::ResolvableId;
use tracing::{event, Level};

use crate::{
    cost_estimator::OrderingCost,
    planner::{
        cost_ordering,
        greedy::greedy_ordering,
        partial_order::PartialOrderReductionSearch,
        plan::{CallMode, Plan, PlanCache},
        PlanningState, PlanningStates, ReasonerPlanner,
    },
    session::PlanningSession,
    PlannerError,
};

/// Searches every valid ordering, up to partial order reduction, and plans each strongly connected component of
/// recursive conjunctions jointly.
///
/// Conjunctions outside any cycle get their cheapest ordering. For a cyclic conjunction the planner collects
/// candidate orderings of every call mode reachable through recursive calls, then picks one ordering per call mode
/// so that the cost of the whole component, weighted by how often each call mode is expected to be called, is lowest.
/// Conjunctions with more resolvables than the exhaustive limit are only ordered greedily.
#[derive(Debug)]
pub struct RecursivePlanner {
    session: Arc<PlanningSession>,
    plan_cache: PlanCache,
    planning_states: Mutex<PlanningStates>,
}

impl RecursivePlanner {
    pub fn new(session: Arc<PlanningSession>) -> Self {
        Self { session, plan_cache: PlanCache::new(), planning_states: Mutex::new(HashMap::new()) }
    }

    /// Candidate orderings of a call mode. Orderings making the same recursive calls are interchangeable
    /// within the component, so only the cheapest of them is kept.
    fn ordering_choices(
        &self,
        states: &mut PlanningStates,
        call_mode: &CallMode,
        depth: usize,
    ) -> Result<Vec<OrderingCost>, PlannerError> {
        let conjunction = self.session.resolvable_conjunction(call_mode.conjunction())?;
        if conjunction.resolvables().len() > self.session.options().exhaustive_planner_resolvable_limit {
            event!(
                Level::TRACE,
                "{} has {} resolvables, ordering greedily.",
                call_mode,
                conjunction.resolvables().len()
            );
            return Ok(vec![greedy_ordering(self, states, call_mode, depth)?]);
        }

        let node = self.session.conjunction_graph().conjunction_node(call_mode.conjunction())?;
        let orderings = PartialOrderReductionSearch::new(&node, &conjunction, call_mode.mode()).orderings()?;
        let mut choices: BTreeMap<BTreeMap<ResolvableId, BTreeSet<Variable>>, OrderingCost> = BTreeMap::new();
        for ordering in &orderings {
            let cost = cost_ordering(self, states, call_mode, ordering, depth)?;
            match choices.get(cost.cyclic_bounds()) {
                Some(existing) if existing.acyclic_cost() <= cost.acyclic_cost() => (),
                _ => {
                    choices.insert(cost.cyclic_bounds().clone(), cost);
                }
            }
        }
        event!(
            Level::TRACE,
            "{}: kept {} of {} orderings.",
            call_mode,
            choices.len(),
            orderings.len()
        );
        Ok(choices.into_values().collect())
    }

    fn plan_component(&self, states: &mut PlanningStates, root: &CallMode, depth: usize) -> Result<(), PlannerError> {
        let mut choices: BTreeMap<CallMode, Vec<OrderingCost>> = BTreeMap::new();
        let mut worklist = vec![root.clone()];
        while let Some(call_mode) = worklist.pop() {
            if choices.contains_key(&call_mode) {
                continue;
            }
            let options = self.ordering_choices(states, &call_mode, depth)?;
            for option in &options {
                for callee in option.cyclic_calls().values().flatten() {
                    if !choices.contains_key(callee) {
                        worklist.push(callee.clone());
                    }
                }
            }
            choices.insert(call_mode, options);
        }

        let mut search = ComponentSearch { root, choices: &choices, best: None };
        search.explore(BTreeSet::from([root.clone()]), &mut BTreeMap::new())?;
        let Some(best) = search.best else {
            return Err(PlannerError::MissingPlan { call_mode: root.clone() });
        };
        event!(
            Level::DEBUG,
            "Planned component of {} over {} call modes at cost {}.",
            root,
            best.choices.len(),
            best.cost(root, 1.0)
        );

        for (call_mode, choice) in &best.choices {
            if self.plan_cache.contains(call_mode) {
                continue;
            }
            let plan = Plan::new(
                call_mode.clone(),
                choice.order().to_vec(),
                choice.acyclic_cost(),
                best.cost(call_mode, 1.0),
                best.scaling_factor(call_mode),
            );
            self.plan_cache.insert(plan);
            states.insert(call_mode.clone(), PlanningState::Planned);
        }
        Ok(())
    }
}

impl ReasonerPlanner for RecursivePlanner {
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
        let node = self.session.conjunction_graph().conjunction_node(call_mode.conjunction())?;
        if node.is_cyclic() {
            return self.plan_component(states, call_mode, depth);
        }

        let choices = self.ordering_choices(states, call_mode, depth)?;
        let best = choices
            .into_iter()
            .min_by(|first, second| first.acyclic_cost().total_cmp(&second.acyclic_cost()))
            .ok_or_else(|| PlannerError::MissingPlan { call_mode: call_mode.clone() })?;
        let cost = best.acyclic_cost();
        self.plan_cache.insert(Plan::new(call_mode.clone(), best.order().to_vec(), cost, cost, 0.0));
        Ok(())
    }
}

/// One ordering chosen per call mode of a component.
#[derive(Debug, Clone)]
struct ComponentPlan<'a> {
    choices: BTreeMap<CallMode, &'a OrderingCost>,
    scaling_factor_sums: BTreeMap<CallMode, f64>,
}

impl<'a> ComponentPlan<'a> {
    fn new(choices: BTreeMap<CallMode, &'a OrderingCost>) -> Self {
        let mut scaling_factor_sums: BTreeMap<CallMode, f64> = BTreeMap::new();
        for choice in choices.values() {
            for (concludable, callees) in choice.cyclic_calls() {
                let scaling_factor = choice.scaling_factor(*concludable);
                for callee in callees {
                    let sum = scaling_factor_sums.entry(callee.clone()).or_insert(0.0);
                    *sum = (*sum + scaling_factor).min(1.0);
                }
            }
        }
        Self { choices, scaling_factor_sums }
    }

    fn scaling_factor(&self, call_mode: &CallMode) -> f64 {
        self.scaling_factor_sums.get(call_mode).copied().unwrap_or(0.0)
    }

    /// Cost of the component when `root` is called with weight `root_scaling_factor` from outside it.
    fn cost(&self, root: &CallMode, root_scaling_factor: f64) -> f64 {
        self.choices
            .iter()
            .map(|(call_mode, choice)| {
                let external = if call_mode == root { root_scaling_factor } else { 0.0 };
                choice.acyclic_cost() * (self.scaling_factor(call_mode) + external)
            })
            .sum()
    }
}

struct ComponentSearch<'a> {
    root: &'a CallMode,
    choices: &'a BTreeMap<CallMode, Vec<OrderingCost>>,
    best: Option<ComponentPlan<'a>>,
}

impl<'a> ComponentSearch<'a> {
    /// Picks an ordering for the next pending call mode, adds the recursive calls it makes, and backtracks.
    /// Adding choices never lowers the cost, so branches already as costly as the best plan are abandoned.
    fn explore(
        &mut self,
        mut pending: BTreeSet<CallMode>,
        chosen: &mut BTreeMap<CallMode, &'a OrderingCost>,
    ) -> Result<(), PlannerError> {
        if let Some(best) = &self.best {
            let partial = ComponentPlan::new(chosen.clone());
            if partial.cost(self.root, 1.0) >= best.cost(self.root, 1.0) {
                return Ok(());
            }
        }
        let Some(call_mode) = pending.pop_first() else {
            self.best = Some(ComponentPlan::new(chosen.clone()));
            return Ok(());
        };
        let choices = self.choices;
        let options = choices.get(&call_mode).ok_or_else(|| PlannerError::MissingPlan { call_mode: call_mode.clone() })?;
        for option in options {
            let mut next_pending = pending.clone();
            for callee in option.cyclic_calls().values().flatten() {
                if *callee != call_mode && !chosen.contains_key(callee) {
                    next_pending.insert(callee.clone());
                }
            }
            chosen.insert(call_mode.clone(), option);
            let result = self.explore(next_pending, chosen);
            chosen.remove(&call_mode);
            result?;
        }
        Ok(())
    }
}
