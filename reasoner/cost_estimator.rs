/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use ir::pattern::variable::Variable;
use logic::{
    logic_manager::LogicManager,
    resolvable::{Concludable, Resolvable, ResolvableId},
    resolvable_conjunction::ConjunctionId,
};
use tracing::{event, Level};

use crate::{
    answer_count_estimator::{AnswerCountEstimator, IncrementalEstimator},
    conjunction_graph::{ConjunctionGraph, ConjunctionNode},
    planner::plan::{CallMode, Plan},
    session::PlannerOptions,
    PlannerError,
};

/// A rule body call made by a concludable, in the mode given by the concludable's bound variables.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TriggeredCall {
    concludable: ResolvableId,
    call_mode: CallMode,
    cyclic: bool,
}

impl TriggeredCall {
    pub fn concludable(&self) -> ResolvableId {
        self.concludable
    }

    pub fn call_mode(&self) -> &CallMode {
        &self.call_mode
    }

    /// Whether the call leads back into the caller's own cycle.
    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }
}

/// Costs evaluation orders of conjunctions.
///
/// The cost of a plan for a call mode is the work of answering every binding of the mode.
/// Each step retrieves the resolvable's answers, scaled down by how selective the preceding steps are on
/// the variables they share with it, pays for the rule body calls it triggers, and combines answers.
#[derive(Debug)]
pub struct CostEstimator {
    logic_manager: Arc<LogicManager>,
    conjunction_graph: Arc<ConjunctionGraph>,
    answer_count_estimator: Arc<AnswerCountEstimator>,
    options: PlannerOptions,
}

impl CostEstimator {
    pub(crate) fn new(
        logic_manager: Arc<LogicManager>,
        conjunction_graph: Arc<ConjunctionGraph>,
        answer_count_estimator: Arc<AnswerCountEstimator>,
        options: PlannerOptions,
    ) -> Self {
        Self { logic_manager, conjunction_graph, answer_count_estimator, options }
    }

    /// Order-free lower bound on the cost of resolving the conjunction, or only the `include_only` resolvables of it,
    /// with `bounds` bound on entry. Every resolvable is scaled as if all the others had already been evaluated.
    pub fn estimate_cost(
        &self,
        conjunction: ConjunctionId,
        bounds: &BTreeSet<Variable>,
        include_only: Option<&BTreeSet<ResolvableId>>,
    ) -> Result<u64, PlannerError> {
        let resolvable_conjunction = self
            .logic_manager
            .resolvable_conjunction(conjunction)
            .map_err(|typedb_source| PlannerError::UnknownConjunction { typedb_source })?;
        let included: Vec<&Arc<Resolvable>> = resolvable_conjunction
            .resolvables()
            .iter()
            .filter(|resolvable| include_only.map_or(true, |include| include.contains(&resolvable.id())))
            .collect();

        let mut answers = self.answer_count_estimator.create_incremental_estimator(conjunction)?;
        for resolvable in &included {
            answers.extend(resolvable);
        }

        let mut cost = 0.0;
        for resolvable in included {
            let resolvable_bounds: BTreeSet<Variable> = resolvable.variables().intersection(bounds).copied().collect();
            let scaling = if resolvable_bounds.is_empty() {
                1.0
            } else {
                ratio(answers.answer_estimate(&resolvable_bounds), answers.local_estimate(resolvable, &resolvable_bounds))
            };
            cost += scaling * answers.local_estimate(resolvable, resolvable.variables());
            if let Some(concludable) = resolvable.as_concludable() {
                for (rule, _) in concludable.applicable_rules() {
                    if let Some(rule) = self.logic_manager.rule(*rule) {
                        cost += scaling * self.answer_count_estimator.estimate_all_answers(rule.body())?;
                    }
                }
            }
        }
        Ok(cost.ceil() as u64)
    }

    /// The rule body calls a concludable makes when `bounds` are bound, one per distinct callee mode.
    pub fn triggered_calls(
        &self,
        node: &ConjunctionNode,
        concludable: &Concludable,
        bounds: &BTreeSet<Variable>,
    ) -> Vec<TriggeredCall> {
        let calls: BTreeSet<TriggeredCall> = concludable
            .applicable_rules()
            .iter()
            .filter_map(|(rule, unifier)| {
                let body = self.logic_manager.rule(*rule)?.body();
                Some(TriggeredCall {
                    concludable: concludable.id(),
                    call_mode: CallMode::new(body, unifier.map_variables(bounds)),
                    cyclic: node.is_cyclic_dependency(concludable.id(), body),
                })
            })
            .collect();
        calls.into_iter().collect()
    }

    pub fn ordering_coster(&self, call_mode: &CallMode) -> Result<OrderingCoster<'_>, PlannerError> {
        let node = self.conjunction_graph.conjunction_node(call_mode.conjunction())?;
        let answers = self.answer_count_estimator.create_incremental_estimator(call_mode.conjunction())?;
        Ok(OrderingCoster {
            estimator: self,
            call_mode: call_mode.clone(),
            node,
            answers,
            bound_variables: call_mode.mode().clone(),
            prefix_variables: BTreeSet::new(),
            order: Vec::new(),
            acyclic_cost: 0.0,
            cyclic_calls: BTreeMap::new(),
            cyclic_bounds: BTreeMap::new(),
            scaling_factors: BTreeMap::new(),
        })
    }

    /// Cost of a complete ordering. Acyclic rule body calls are costed with the plans `plans` returns for them.
    pub fn ordering_cost(
        &self,
        call_mode: &CallMode,
        ordering: &[Arc<Resolvable>],
        plans: impl Fn(&CallMode) -> Option<Arc<Plan>>,
    ) -> Result<OrderingCost, PlannerError> {
        let mut coster = self.ordering_coster(call_mode)?;
        for resolvable in ordering {
            let step = coster.step_cost(resolvable, &plans)?;
            coster.push(resolvable, &step);
        }
        Ok(coster.finish())
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        0.0
    } else {
        (numerator / denominator).min(1.0)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct StepCost {
    pub retrieval: f64,
    pub calls: f64,
    pub combination: f64,
}

impl StepCost {
    pub fn total(&self) -> f64 {
        self.retrieval + self.calls + self.combination
    }
}

impl fmt::Display for StepCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (retrieval {}, calls {}, combination {})", self.total(), self.retrieval, self.calls, self.combination)
    }
}

/// Accumulates the cost of an ordering one resolvable at a time.
#[derive(Debug)]
pub struct OrderingCoster<'a> {
    estimator: &'a CostEstimator,
    call_mode: CallMode,
    node: Arc<ConjunctionNode>,
    answers: IncrementalEstimator,
    bound_variables: BTreeSet<Variable>,
    prefix_variables: BTreeSet<Variable>,
    order: Vec<Arc<Resolvable>>,
    acyclic_cost: f64,
    cyclic_calls: BTreeMap<ResolvableId, BTreeSet<CallMode>>,
    cyclic_bounds: BTreeMap<ResolvableId, BTreeSet<Variable>>,
    scaling_factors: BTreeMap<ResolvableId, f64>,
}

impl<'a> OrderingCoster<'a> {
    pub fn node(&self) -> &Arc<ConjunctionNode> {
        &self.node
    }

    /// Mode variables and every variable of the resolvables pushed so far.
    pub fn bound_variables(&self) -> &BTreeSet<Variable> {
        &self.bound_variables
    }

    pub fn order(&self) -> &[Arc<Resolvable>] {
        &self.order
    }

    pub fn resolvable_bounds(&self, resolvable: &Resolvable) -> BTreeSet<Variable> {
        resolvable.variables().intersection(&self.bound_variables).copied().collect()
    }

    pub fn triggered_calls(&self, resolvable: &Resolvable) -> Vec<TriggeredCall> {
        match resolvable.as_concludable() {
            Some(concludable) => {
                self.estimator.triggered_calls(&self.node, concludable, &self.resolvable_bounds(resolvable))
            }
            None => Vec::new(),
        }
    }

    /// Calls that must be planned before the resolvable can be costed at this position.
    pub fn acyclic_calls(&self, resolvable: &Resolvable) -> Vec<CallMode> {
        self.triggered_calls(resolvable).into_iter().filter(|call| !call.cyclic).map(|call| call.call_mode).collect()
    }

    pub fn step_cost(
        &self,
        resolvable: &Resolvable,
        plans: &impl Fn(&CallMode) -> Option<Arc<Plan>>,
    ) -> Result<StepCost, PlannerError> {
        let bounds = self.resolvable_bounds(resolvable);
        let restricted: BTreeSet<Variable> = resolvable.variables().intersection(&self.prefix_variables).copied().collect();
        let bound_answers = self.bound_answers(resolvable, &restricted, &bounds);
        let scaling = ratio(bound_answers, self.answers.local_estimate(resolvable, &bounds));
        let retrieval = scaling * self.answers.local_estimate(resolvable, resolvable.variables());

        let answer_count_estimator = &self.estimator.answer_count_estimator;
        let mut calls = 0.0;
        for call in self.triggered_calls(resolvable).into_iter().filter(|call| !call.cyclic) {
            let callee = call.call_mode.conjunction();
            let (all_calls_cost, cyclic_scaling_factor) = match plans(&call.call_mode) {
                Some(plan) => (plan.all_calls_cost(), plan.cyclic_scaling_factor()),
                None => (answer_count_estimator.estimate_all_answers(callee)?, 0.0),
            };
            let call_scaling = if call.call_mode.mode().is_empty() {
                1.0
            } else {
                ratio(bound_answers, answer_count_estimator.estimate_answers(callee, call.call_mode.mode())?)
            };
            calls += all_calls_cost * (call_scaling + cyclic_scaling_factor).min(1.0);
        }

        let mut answers = self.answers.clone();
        answers.extend(resolvable);
        let combination = answers.answer_set_size() * self.estimator.options.relative_cost_answer_combination;
        Ok(StepCost { retrieval, calls, combination })
    }

    pub fn push(&mut self, resolvable: &Arc<Resolvable>, step: &StepCost) {
        let bounds = self.resolvable_bounds(resolvable);
        let cyclic_calls: BTreeSet<CallMode> = self
            .triggered_calls(resolvable)
            .into_iter()
            .filter(|call| call.cyclic)
            .map(|call| call.call_mode)
            .collect();
        if !cyclic_calls.is_empty() {
            let scaling_factor = self.cyclic_scaling_factor(resolvable, &bounds);
            self.scaling_factors.insert(resolvable.id(), scaling_factor);
            self.cyclic_bounds.insert(resolvable.id(), bounds);
            self.cyclic_calls.insert(resolvable.id(), cyclic_calls);
        }
        event!(Level::TRACE, "{}: step {} costs {}.", self.call_mode, resolvable, step);

        self.acyclic_cost += step.total();
        self.answers.extend(resolvable);
        self.prefix_variables.extend(resolvable.variables().iter().copied());
        self.bound_variables.extend(resolvable.variables().iter().copied());
        self.order.push(resolvable.clone());
    }

    pub fn finish(self) -> OrderingCost {
        OrderingCost {
            call_mode: self.call_mode,
            order: self.order,
            acyclic_cost: self.acyclic_cost,
            cyclic_calls: self.cyclic_calls,
            cyclic_bounds: self.cyclic_bounds,
            scaling_factors: self.scaling_factors,
        }
    }

    // Expected number of distinct bindings of `bounds` the resolvable receives: the prefix's answers on the
    // variables it shares with the prefix, times every value of mode variables the prefix has not touched.
    fn bound_answers(&self, resolvable: &Resolvable, restricted: &BTreeSet<Variable>, bounds: &BTreeSet<Variable>) -> f64 {
        if restricted.is_empty() {
            return self.answers.local_estimate(resolvable, bounds);
        }
        let prefix_answers = self.answers.answer_estimate(restricted);
        let unrestricted: BTreeSet<Variable> = bounds.difference(restricted).copied().collect();
        if unrestricted.is_empty() {
            prefix_answers
        } else {
            prefix_answers * self.answers.local_estimate(resolvable, &unrestricted)
        }
    }

    // Fraction of the recursive callee's answers this call is expected to request, damped by the square root
    // of the concludable's own answer count.
    fn cyclic_scaling_factor(&self, resolvable: &Resolvable, bounds: &BTreeSet<Variable>) -> f64 {
        let restricted: BTreeSet<Variable> = resolvable.variables().intersection(&self.prefix_variables).copied().collect();
        if restricted.is_empty() {
            return 0.0;
        }
        let local = self.answers.local_estimate(resolvable, bounds);
        if local <= 0.0 {
            return 0.0;
        }
        let all_answers = self.answers.local_estimate(resolvable, resolvable.variables());
        let damping = if all_answers > 0.0 { all_answers.sqrt() / all_answers } else { 0.0 };
        (self.answers.answer_estimate(&restricted) / local).min(damping)
    }
}

/// The cost of one ordering, with the recursive calls it leaves to be costed over the whole cycle.
#[derive(Debug, Clone)]
pub struct OrderingCost {
    call_mode: CallMode,
    order: Vec<Arc<Resolvable>>,
    acyclic_cost: f64,
    cyclic_calls: BTreeMap<ResolvableId, BTreeSet<CallMode>>,
    cyclic_bounds: BTreeMap<ResolvableId, BTreeSet<Variable>>,
    scaling_factors: BTreeMap<ResolvableId, f64>,
}

impl OrderingCost {
    pub fn call_mode(&self) -> &CallMode {
        &self.call_mode
    }

    pub fn order(&self) -> &[Arc<Resolvable>] {
        &self.order
    }

    pub fn acyclic_cost(&self) -> f64 {
        self.acyclic_cost
    }

    /// Per cyclic concludable, the call modes of the recursive calls it makes.
    pub fn cyclic_calls(&self) -> &BTreeMap<ResolvableId, BTreeSet<CallMode>> {
        &self.cyclic_calls
    }

    /// Per cyclic concludable, its bound variables. Orderings with equal cyclic bounds make the same recursive calls.
    pub fn cyclic_bounds(&self) -> &BTreeMap<ResolvableId, BTreeSet<Variable>> {
        &self.cyclic_bounds
    }

    pub fn scaling_factor(&self, concludable: ResolvableId) -> f64 {
        self.scaling_factors.get(&concludable).copied().unwrap_or(0.0)
    }
}
