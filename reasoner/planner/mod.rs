/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, Mutex},
};

use ir::pattern::{constraint::Constraint, variable::Variable};
use itertools::Itertools;
use logic::{
    resolvable::{Resolvable, ResolvableId},
    resolvable_conjunction::{ConjunctionId, ResolvableConjunction},
};
use tracing::{event, Level};

use crate::{
    conjunction_graph::ConjunctionNode,
    cost_estimator::OrderingCost,
    planner::plan::{CallMode, Plan, PlanCache},
    session::PlanningSession,
    PlannerError,
};

pub mod greedy;
pub mod partial_order;
pub mod plan;
pub mod recursive;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PlanningState {
    Planning,
    Planned,
}

pub type PlanningStates = HashMap<CallMode, PlanningState>;

/// Variables each resolvable needs bound before it may be evaluated.
pub(crate) type Dependencies = BTreeMap<ResolvableId, BTreeSet<Variable>>;

/// Plans conjunctions per call mode, caching every plan it computes.
///
/// A call mode is `Planning` from the moment it is first requested until its plan is cached, after which it is
/// `Planned`. Requests for a call mode that is already `Planning` return without planning it again: the request
/// comes from a recursive call within the same strongly connected component, whose plans are made together.
/// Calls that leave the component are planned one level deeper; the depth can never exceed the number of
/// registered conjunctions unless the component bookkeeping is broken.
pub trait ReasonerPlanner {
    fn session(&self) -> &PlanningSession;

    fn plan_cache(&self) -> &PlanCache;

    fn planning_states(&self) -> &Mutex<PlanningStates>;

    /// Computes and caches the plan for `call_mode`, and any call modes that must be planned jointly with it.
    fn compute_plan(&self, states: &mut PlanningStates, call_mode: &CallMode, depth: usize) -> Result<(), PlannerError>;

    fn plan(&self, conjunction: ConjunctionId, bounds: &BTreeSet<Variable>) -> Result<Arc<Plan>, PlannerError> {
        let call_mode = call_mode(self.session(), conjunction, bounds)?;
        if let Some(plan) = self.plan_cache().get(&call_mode) {
            return Ok(plan);
        }
        let mut states = self.planning_states().lock().unwrap();
        self.plan_call(&mut states, &call_mode, 0)?;
        let plan = self.plan_cache().get(&call_mode).ok_or_else(|| PlannerError::MissingPlan { call_mode })?;
        event!(Level::DEBUG, "{}", plan);
        Ok(plan)
    }

    /// The cached plan, planning it first if it was never requested.
    fn get_plan(&self, conjunction: ConjunctionId, bounds: &BTreeSet<Variable>) -> Result<Arc<Plan>, PlannerError> {
        let call_mode = call_mode(self.session(), conjunction, bounds)?;
        match self.plan_cache().get(&call_mode) {
            Some(plan) => Ok(plan),
            None => self.plan(conjunction, bounds),
        }
    }

    fn cached_plan(&self, call_mode: &CallMode) -> Option<Arc<Plan>> {
        self.plan_cache().get(call_mode)
    }

    fn plan_call(&self, states: &mut PlanningStates, call_mode: &CallMode, depth: usize) -> Result<(), PlannerError> {
        if self.plan_cache().contains(call_mode) {
            return Ok(());
        }
        let limit = self.session().logic_manager().conjunction_count();
        if depth > limit {
            return Err(PlannerError::TerminationGuardExceeded { conjunction: call_mode.conjunction(), depth, limit });
        }
        if states.contains_key(call_mode) {
            return Ok(());
        }
        states.insert(call_mode.clone(), PlanningState::Planning);
        event!(Level::TRACE, "Planning {} at depth {}.", call_mode, depth);
        match self.compute_plan(states, call_mode, depth) {
            Ok(()) => {
                states.insert(call_mode.clone(), PlanningState::Planned);
                Ok(())
            }
            Err(err) => {
                states.remove(call_mode);
                Err(err)
            }
        }
    }

    /// Drops every plan and planning state. Does not clear the session.
    fn clear(&self) {
        self.planning_states().lock().unwrap().clear();
        self.plan_cache().clear();
    }
}

/// Call modes only bind variables of the conjunction they call.
pub(crate) fn call_mode(
    session: &PlanningSession,
    conjunction: ConjunctionId,
    bounds: &BTreeSet<Variable>,
) -> Result<CallMode, PlannerError> {
    let resolvable_conjunction = session.resolvable_conjunction(conjunction)?;
    let variables = resolvable_conjunction.variables();
    Ok(CallMode::new(conjunction, bounds.intersection(&variables).copied().collect()))
}

/// A resolvable requires every variable generated by a different concludable,
/// and both operands of its comparisons unless its other constraints bind them.
pub(crate) fn dependencies(conjunction: &ResolvableConjunction) -> Dependencies {
    let generated: Vec<(ResolvableId, Variable)> =
        conjunction.concludables().map(|(resolvable, concludable)| (resolvable.id(), concludable.generating())).collect();
    conjunction
        .resolvables()
        .iter()
        .map(|resolvable| {
            let mut required: BTreeSet<Variable> = resolvable
                .variables()
                .iter()
                .copied()
                .filter(|variable| resolvable.generating() != Some(*variable))
                .filter(|variable| generated.iter().any(|(id, generated)| *id != resolvable.id() && generated == variable))
                .collect();
            let checked: BTreeSet<Variable> = resolvable
                .constraints()
                .iter()
                .filter(|constraint| constraint.as_comparison().is_none())
                .flat_map(Constraint::variables)
                .collect();
            required.extend(
                resolvable
                    .constraints()
                    .iter()
                    .filter_map(Constraint::as_comparison)
                    .flat_map(|comparison| comparison.variables())
                    .filter(|variable| !checked.contains(variable)),
            );
            (resolvable.id(), required)
        })
        .collect()
}

/// Attribute variables pinned to a value are as good as bound from the start.
pub(crate) fn value_identified(conjunction: &ResolvableConjunction) -> BTreeSet<Variable> {
    conjunction
        .conjunction()
        .constraints()
        .iter()
        .filter_map(Constraint::as_has)
        .filter(|has| has.value().is_some())
        .map(|has| has.attribute())
        .collect()
}

/// Resolvables that may be placed next. When dependencies block every remaining resolvable,
/// only recursion may break the deadlock: cyclic concludables are then released regardless.
pub(crate) fn enabled(
    node: &ConjunctionNode,
    dependencies: &Dependencies,
    remaining: &BTreeSet<Arc<Resolvable>>,
    bound: &BTreeSet<Variable>,
) -> Result<Vec<Arc<Resolvable>>, PlannerError> {
    let satisfied: Vec<Arc<Resolvable>> = remaining
        .iter()
        .filter(|resolvable| dependencies.get(&resolvable.id()).map_or(true, |required| required.is_subset(bound)))
        .cloned()
        .collect();
    if !satisfied.is_empty() {
        return Ok(satisfied);
    }
    let cyclic: Vec<Arc<Resolvable>> = remaining
        .iter()
        .filter(|resolvable| !node.cyclic_dependencies(resolvable.id()).is_empty())
        .cloned()
        .collect();
    if cyclic.is_empty() {
        Err(PlannerError::UnresolvableDependencyCycle {
            conjunction: node.id(),
            blocked: remaining.iter().map(|resolvable| resolvable.id()).join(", "),
        })
    } else {
        Ok(cyclic)
    }
}

/// Costs an ordering, first planning the calls it makes out of its own strongly connected component.
pub(crate) fn cost_ordering<P: ReasonerPlanner + ?Sized>(
    planner: &P,
    states: &mut PlanningStates,
    call_mode: &CallMode,
    ordering: &[Arc<Resolvable>],
    depth: usize,
) -> Result<OrderingCost, PlannerError> {
    let mut coster = planner.session().cost_estimator().ordering_coster(call_mode)?;
    for resolvable in ordering {
        for callee in coster.acyclic_calls(resolvable) {
            planner.plan_call(states, &callee, depth + 1)?;
        }
        let step = coster.step_cost(resolvable, &|callee: &CallMode| planner.plan_cache().peek(callee))?;
        coster.push(resolvable, &step);
    }
    Ok(coster.finish())
}
