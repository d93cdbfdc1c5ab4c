/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::Arc;

use concept::thing::statistics::Statistics;
use ir::pattern::conjunction::Conjunction;
use logic::{
    logic_manager::LogicManager,
    resolvable_conjunction::{ConjunctionId, ResolvableConjunction},
};
use resource::constants::reasoner::{
    CYCLIC_REFINEMENT_ROUNDS, EXHAUSTIVE_PLANNER_RESOLVABLE_LIMIT, RELATIVE_COST_ANSWER_COMBINATION,
};
use tracing::{event, Level};

use crate::{
    answer_count_estimator::AnswerCountEstimator, conjunction_graph::ConjunctionGraph, cost_estimator::CostEstimator,
    PlannerError,
};

#[derive(Debug, Clone)]
pub struct PlannerOptions {
    pub relative_cost_answer_combination: f64,
    pub exhaustive_planner_resolvable_limit: usize,
    pub cyclic_refinement_rounds: usize,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            relative_cost_answer_combination: RELATIVE_COST_ANSWER_COMBINATION,
            exhaustive_planner_resolvable_limit: EXHAUSTIVE_PLANNER_RESOLVABLE_LIMIT,
            cyclic_refinement_rounds: CYCLIC_REFINEMENT_ROUNDS,
        }
    }
}

/// Everything planning needs for one schema and statistics snapshot.
/// Owns the conjunction graph and the estimator models, which are dropped by `clear` when the snapshot ends.
#[derive(Debug)]
pub struct PlanningSession {
    logic_manager: Arc<LogicManager>,
    statistics: Arc<Statistics>,
    options: PlannerOptions,
    conjunction_graph: Arc<ConjunctionGraph>,
    answer_count_estimator: Arc<AnswerCountEstimator>,
    cost_estimator: CostEstimator,
}

impl PlanningSession {
    pub fn new(logic_manager: Arc<LogicManager>, statistics: Arc<Statistics>) -> Result<Self, PlannerError> {
        Self::with_options(logic_manager, statistics, PlannerOptions::default())
    }

    /// Fails before any estimation if the statistics do not describe the schema, or a rule body cannot be resolved.
    pub fn with_options(
        logic_manager: Arc<LogicManager>,
        statistics: Arc<Statistics>,
        options: PlannerOptions,
    ) -> Result<Self, PlannerError> {
        statistics
            .validate(logic_manager.hierarchy())
            .map_err(|typedb_source| PlannerError::InconsistentStatistics { typedb_source })?;
        for rule in logic_manager.rules() {
            logic_manager
                .resolvable_conjunction(rule.body())
                .map_err(|typedb_source| PlannerError::InvalidRuleIndex { rule: rule.label().to_owned(), typedb_source })?;
        }

        let conjunction_graph = Arc::new(ConjunctionGraph::new(logic_manager.clone()));
        let answer_count_estimator = Arc::new(AnswerCountEstimator::new(
            logic_manager.clone(),
            statistics.clone(),
            conjunction_graph.clone(),
            options.cyclic_refinement_rounds,
        ));
        let cost_estimator = CostEstimator::new(
            logic_manager.clone(),
            conjunction_graph.clone(),
            answer_count_estimator.clone(),
            options.clone(),
        );
        event!(
            Level::DEBUG,
            "Opened planning session over {} rules at statistics sequence number {}.",
            logic_manager.rules().len(),
            statistics.sequence_number
        );
        Ok(Self { logic_manager, statistics, options, conjunction_graph, answer_count_estimator, cost_estimator })
    }

    pub fn logic_manager(&self) -> &Arc<LogicManager> {
        &self.logic_manager
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    pub fn conjunction_graph(&self) -> &ConjunctionGraph {
        &self.conjunction_graph
    }

    pub fn answer_count_estimator(&self) -> &AnswerCountEstimator {
        &self.answer_count_estimator
    }

    pub fn cost_estimator(&self) -> &CostEstimator {
        &self.cost_estimator
    }

    pub fn register(&self, conjunction: Conjunction) -> Result<Arc<ResolvableConjunction>, PlannerError> {
        self.logic_manager.register(conjunction).map_err(|typedb_source| PlannerError::UnknownConjunction { typedb_source })
    }

    pub fn resolvable_conjunction(&self, conjunction: ConjunctionId) -> Result<Arc<ResolvableConjunction>, PlannerError> {
        self.logic_manager
            .resolvable_conjunction(conjunction)
            .map_err(|typedb_source| PlannerError::UnknownConjunction { typedb_source })
    }

    /// Drops the conjunction graph and estimator models. Plans are owned and cleared by each planner.
    pub fn clear(&self) {
        self.conjunction_graph.clear();
        self.answer_count_estimator.clear();
    }
}
