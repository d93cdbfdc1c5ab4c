/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    ops::AddAssign,
    sync::{Arc, Mutex, RwLock},
};

use concept::{thing::statistics::Statistics, type_::Label};
use ir::pattern::{
    constraint::{Constraint, Has, Links, Value},
    variable::Variable,
};
use itertools::Itertools;
use logic::{
    logic_manager::LogicManager,
    resolvable::{Concludable, ConcludableKind, Resolvable, ResolvableId},
    resolvable_conjunction::ConjunctionId,
    rule::{Rule, RuleHead},
    unifier::Unifier,
    LogicError,
};
use tracing::{event, Level};

use crate::{
    conjunction_graph::{ConjunctionGraph, ConjunctionNode},
    PlannerError,
};

/// Estimates the number of distinct answers of conjunctions, projected onto sets of their variables.
///
/// Each conjunction is summarised once into a `ConjunctionModel`: a unary bound per variable
/// (persisted instances plus instances rules may generate) and one model per `has` or role player constraint.
/// Rule contributions are read from the models of rule bodies. Bodies in the same cycle as the conjunction
/// are first left out entirely, then folded in for a bounded number of rounds.
#[derive(Debug)]
pub struct AnswerCountEstimator {
    logic_manager: Arc<LogicManager>,
    statistics: Arc<Statistics>,
    conjunction_graph: Arc<ConjunctionGraph>,
    cyclic_refinement_rounds: usize,
    models: RwLock<HashMap<ConjunctionId, Arc<ConjunctionModel>>>,
    build_lock: Mutex<()>,
}

impl AnswerCountEstimator {
    pub fn new(
        logic_manager: Arc<LogicManager>,
        statistics: Arc<Statistics>,
        conjunction_graph: Arc<ConjunctionGraph>,
        cyclic_refinement_rounds: usize,
    ) -> Self {
        Self {
            logic_manager,
            statistics,
            conjunction_graph,
            cyclic_refinement_rounds,
            models: RwLock::new(HashMap::new()),
            build_lock: Mutex::new(()),
        }
    }

    pub fn estimate_answers(
        &self,
        conjunction: ConjunctionId,
        variables: &BTreeSet<Variable>,
    ) -> Result<f64, PlannerError> {
        let estimate = self.conjunction_model(conjunction)?.estimate_answers(variables);
        event!(Level::TRACE, "Estimated {} answers for {} over {{{}}}.", estimate, conjunction, variables.iter().join(", "));
        Ok(estimate)
    }

    pub fn estimate_all_answers(&self, conjunction: ConjunctionId) -> Result<f64, PlannerError> {
        let model = self.conjunction_model(conjunction)?;
        let variables = model.unary.keys().copied().collect();
        Ok(model.estimate_answers(&variables))
    }

    /// The unary bound of a variable: the most distinct values it can take in any answer.
    pub fn unary_estimate(&self, conjunction: ConjunctionId, variable: Variable) -> Result<f64, PlannerError> {
        Ok(self.conjunction_model(conjunction)?.unary.get(&variable).copied().unwrap_or(0.0))
    }

    pub fn create_incremental_estimator(&self, conjunction: ConjunctionId) -> Result<IncrementalEstimator, PlannerError> {
        Ok(IncrementalEstimator::new(self.conjunction_model(conjunction)?, BTreeSet::new()))
    }

    /// An incremental estimator that treats the mode variables as already bound to a single value.
    pub fn create_incremental_estimator_with_mode(
        &self,
        conjunction: ConjunctionId,
        mode: &BTreeSet<Variable>,
    ) -> Result<IncrementalEstimator, PlannerError> {
        Ok(IncrementalEstimator::new(self.conjunction_model(conjunction)?, mode.clone()))
    }

    pub fn clear(&self) {
        let _guard = self.build_lock.lock().unwrap();
        self.models.write().unwrap().clear();
    }

    fn conjunction_model(&self, conjunction: ConjunctionId) -> Result<Arc<ConjunctionModel>, PlannerError> {
        if let Some(model) = self.published_model(conjunction) {
            return Ok(model);
        }
        let _guard = self.build_lock.lock().unwrap();
        if let Some(model) = self.published_model(conjunction) {
            return Ok(model);
        }
        let mut staged = HashMap::new();
        self.build_component(conjunction, &mut staged, 0)?;
        let model = staged.get(&conjunction).cloned();
        self.models.write().unwrap().extend(staged);
        model.ok_or(PlannerError::UnknownConjunction {
            typedb_source: LogicError::UnknownConjunction { id: conjunction },
        })
    }

    fn published_model(&self, conjunction: ConjunctionId) -> Option<Arc<ConjunctionModel>> {
        self.models.read().unwrap().get(&conjunction).cloned()
    }

    fn build_component(
        &self,
        conjunction: ConjunctionId,
        staged: &mut HashMap<ConjunctionId, Arc<ConjunctionModel>>,
        depth: usize,
    ) -> Result<(), PlannerError> {
        if staged.contains_key(&conjunction) || self.published_model(conjunction).is_some() {
            return Ok(());
        }
        let limit = self.logic_manager.conjunction_count();
        if depth > limit {
            return Err(PlannerError::TerminationGuardExceeded { conjunction, depth, limit });
        }

        let node = self.conjunction_graph.conjunction_node(conjunction)?;
        let members: Vec<Arc<ConjunctionNode>> = if node.is_cyclic() {
            node.component().iter().map(|member| self.conjunction_graph.conjunction_node(*member)).collect::<Result<_, _>>()?
        } else {
            vec![node.clone()]
        };
        for member in &members {
            for concludable in member.dependencies().keys() {
                for body in member.acyclic_dependencies(*concludable) {
                    self.build_component(body, staged, depth + 1)?;
                }
            }
        }

        let mut round: HashMap<ConjunctionId, Arc<ConjunctionModel>> = members
            .iter()
            .map(|member| (member.id(), Arc::new(ModelBuilder::new(self, member, staged, None).build())))
            .collect();
        if node.is_cyclic() {
            for _ in 0..self.cyclic_refinement_rounds {
                round = members
                    .iter()
                    .map(|member| (member.id(), Arc::new(ModelBuilder::new(self, member, staged, Some(&round)).build())))
                    .collect();
            }
        }
        event!(
            Level::DEBUG,
            "Built answer count models for {{{}}}{}.",
            members.iter().map(|member| member.id()).join(", "),
            if node.is_cyclic() { " (cyclic)" } else { "" }
        );
        staged.extend(round);
        Ok(())
    }
}

/// The estimate of a single constraint over its variables, owned by the resolvable holding the constraint.
#[derive(Debug, Clone)]
struct LocalModel {
    resolvable: ResolvableId,
    variables: BTreeSet<Variable>,
    estimate: f64,
}

impl LocalModel {
    fn estimate(&self, variables: &BTreeSet<Variable>, unary: &BTreeMap<Variable, f64>) -> f64 {
        let independent: f64 = variables.iter().map(|variable| unary_bound(unary, *variable)).product();
        self.estimate.min(independent)
    }
}

#[derive(Debug)]
pub(crate) struct ConjunctionModel {
    conjunction: ConjunctionId,
    unsatisfiable: bool,
    unary: BTreeMap<Variable, f64>,
    // ascending by estimate, so the cheapest model claims shared variables first
    models: Vec<LocalModel>,
}

impl ConjunctionModel {
    fn estimate_answers(&self, variables: &BTreeSet<Variable>) -> f64 {
        self.estimate(variables, &self.unary, &BTreeSet::new(), |_| true)
    }

    fn estimate(
        &self,
        variables: &BTreeSet<Variable>,
        unary: &BTreeMap<Variable, f64>,
        mode: &BTreeSet<Variable>,
        enabled: impl Fn(&LocalModel) -> bool,
    ) -> f64 {
        if self.unsatisfiable {
            return 0.0;
        }
        let variables: BTreeSet<Variable> =
            variables.iter().filter(|variable| unary.contains_key(variable)).copied().collect();
        if variables.is_empty() {
            return 1.0;
        }

        let mut cover: BTreeMap<Variable, Option<usize>> = variables.iter().map(|variable| (*variable, None)).collect();
        for (index, model) in self.models.iter().enumerate().filter(|(_, model)| enabled(model)) {
            let overlap: BTreeSet<Variable> = model.variables.intersection(&variables).copied().collect();
            if overlap.is_empty() {
                continue;
            }
            if model.estimate(&overlap, unary) < cover_cost(&self.models, &cover, &overlap, unary) {
                for variable in overlap {
                    cover.insert(variable, Some(index));
                }
            }
        }
        let estimate = cover_cost(&self.models, &cover, &variables, unary);

        let cap = variables
            .iter()
            .filter(|variable| !mode.contains(variable))
            .map(|variable| unary_bound(unary, *variable))
            .fold(f64::INFINITY, f64::min);
        estimate.min(cap)
    }
}

// Product of the estimates of the models covering `considered`, each over every variable it covers.
fn cover_cost(
    models: &[LocalModel],
    cover: &BTreeMap<Variable, Option<usize>>,
    considered: &BTreeSet<Variable>,
    unary: &BTreeMap<Variable, f64>,
) -> f64 {
    let mut cost = 1.0;
    let mut counted = BTreeSet::new();
    for variable in considered {
        match cover.get(variable).copied().flatten() {
            None => cost *= unary_bound(unary, *variable),
            Some(index) => {
                if counted.insert(index) {
                    let covered = cover
                        .iter()
                        .filter(|(_, covering)| **covering == Some(index))
                        .map(|(variable, _)| *variable)
                        .collect();
                    cost *= models[index].estimate(&covered, unary);
                }
            }
        }
    }
    cost
}

fn unary_bound(unary: &BTreeMap<Variable, f64>, variable: Variable) -> f64 {
    unary.get(&variable).copied().unwrap_or(0.0)
}

/// Rule-derived answers, split by whether the rule body closes a cycle.
#[derive(Debug, Default, Copy, Clone)]
struct Inferred {
    acyclic: f64,
    cyclic: f64,
}

impl Inferred {
    /// The cyclic part only counts in proportion to its share of the total.
    fn combine(self, persisted: f64) -> f64 {
        let total = persisted + self.acyclic + self.cyclic;
        if self.cyclic <= 0.0 || total <= 0.0 {
            persisted + self.acyclic
        } else {
            persisted + self.acyclic + self.cyclic * (self.cyclic / total)
        }
    }
}

impl AddAssign for Inferred {
    fn add_assign(&mut self, other: Self) {
        self.acyclic += other.acyclic;
        self.cyclic += other.cyclic;
    }
}

struct ModelBuilder<'a> {
    estimator: &'a AnswerCountEstimator,
    node: &'a ConjunctionNode,
    staged: &'a HashMap<ConjunctionId, Arc<ConjunctionModel>>,
    cyclic_round: Option<&'a HashMap<ConjunctionId, Arc<ConjunctionModel>>>,
}

impl<'a> ModelBuilder<'a> {
    fn new(
        estimator: &'a AnswerCountEstimator,
        node: &'a ConjunctionNode,
        staged: &'a HashMap<ConjunctionId, Arc<ConjunctionModel>>,
        cyclic_round: Option<&'a HashMap<ConjunctionId, Arc<ConjunctionModel>>>,
    ) -> Self {
        Self { estimator, node, staged, cyclic_round }
    }

    fn build(&self) -> ConjunctionModel {
        let conjunction = self.node.conjunction();
        let value_identified: BTreeSet<Variable> = conjunction
            .conjunction()
            .constraints()
            .iter()
            .filter_map(Constraint::as_has)
            .filter(|has| has.value().is_some())
            .map(Has::attribute)
            .collect();

        let unary = conjunction
            .variables()
            .into_iter()
            .map(|variable| {
                let bound = if value_identified.contains(&variable) {
                    1.0
                } else {
                    self.generated(variable).combine(self.instance_count(conjunction.candidate_types(variable)))
                };
                (variable, bound)
            })
            .collect();

        let mut models = Vec::new();
        for resolvable in conjunction.resolvables() {
            for constraint in resolvable.constraints() {
                match constraint {
                    Constraint::Has(has) => models.push(self.has_model(resolvable, has)),
                    Constraint::Links(links) => models.push(self.relation_model(resolvable, links)),
                    Constraint::Isa(_) | Constraint::Comparison(_) => (),
                }
            }
        }
        models.sort_by(|lhs, rhs| lhs.estimate.total_cmp(&rhs.estimate));

        ConjunctionModel { conjunction: conjunction.id(), unsatisfiable: conjunction.is_unsatisfiable(), unary, models }
    }

    fn instance_count(&self, types: Option<&BTreeSet<Label>>) -> f64 {
        let hierarchy = self.estimator.logic_manager.hierarchy();
        types
            .into_iter()
            .flatten()
            .map(|type_| self.estimator.statistics.instance_count(hierarchy, type_, false) as f64)
            .sum()
    }

    /// Instances of the variable's types that rules may create.
    fn generated(&self, variable: Variable) -> Inferred {
        let mut generated = Inferred::default();
        let concludables = self.node.conjunction().concludables().filter(|(_, concludable)| concludable.generating() == variable);
        for (_, concludable) in concludables {
            match concludable.kind() {
                ConcludableKind::Has { .. } => {
                    // each distinct concluded value is one attribute, whoever owns it
                    let values: BTreeSet<(&Label, &Value)> = concludable
                        .applicable_rules()
                        .iter()
                        .filter_map(|(rule, _)| self.estimator.logic_manager.rule(*rule))
                        .filter_map(|rule| match rule.head() {
                            RuleHead::ExplicitHas { attribute_type, value, .. } => Some((attribute_type, value)),
                            RuleHead::VariableHas { .. } | RuleHead::Relation { .. } => None,
                        })
                        .collect();
                    generated.acyclic += values.len() as f64;
                }
                ConcludableKind::Relation { .. } | ConcludableKind::Isa { .. } => {
                    generated += self.inferred(concludable, &BTreeSet::from([variable]));
                }
            }
        }
        generated
    }

    fn has_model(&self, resolvable: &Resolvable, has: &Has) -> LocalModel {
        let conjunction = self.node.conjunction();
        let owner_types = conjunction.candidate_types(has.owner()).into_iter().flatten();
        let attribute_types = conjunction.candidate_types(has.attribute());
        let edges: f64 = owner_types
            .cartesian_product(attribute_types.into_iter().flatten())
            .map(|(owner, attribute)| self.estimator.statistics.ownership_edge_count(owner, attribute) as f64)
            .sum();
        let persisted = if has.value().is_some() {
            let attributes = self.instance_count(attribute_types);
            if attributes > 0.0 {
                (edges / attributes).ceil()
            } else {
                0.0
            }
        } else {
            edges
        };

        let variables = BTreeSet::from([has.owner(), has.attribute()]);
        let estimate = match resolvable.as_concludable() {
            Some(concludable) => self.inferred(concludable, &variables).combine(persisted),
            None => persisted,
        };
        LocalModel { resolvable: resolvable.id(), variables, estimate }
    }

    /// Role players are assumed to be spread evenly over the relation instances,
    /// so each relation contributes an ordered selection of players per role.
    fn relation_model(&self, resolvable: &Resolvable, links: &Links) -> LocalModel {
        let relation_types = self.node.conjunction().candidate_types(links.relation());
        let relations = self.instance_count(relation_types);
        let persisted = if relations > 0.0 {
            let mut role_groups: BTreeMap<Option<&str>, usize> = BTreeMap::new();
            for role_player in links.role_players() {
                *role_groups.entry(role_player.role().map(Label::name)).or_default() += 1;
            }
            let per_relation: f64 = role_groups
                .into_iter()
                .map(|(role, players)| {
                    let role_players: f64 = relation_types
                        .into_iter()
                        .flatten()
                        .map(|relation_type| self.role_player_count(relation_type, role))
                        .sum();
                    permutations((role_players / relations).ceil(), players)
                })
                .product();
            (relations * per_relation).ceil()
        } else {
            0.0
        };

        let variables: BTreeSet<Variable> = links.variables().collect();
        let estimate = match resolvable.as_concludable() {
            Some(concludable) => self.inferred(concludable, &variables).combine(persisted),
            None => persisted,
        };
        LocalModel { resolvable: resolvable.id(), variables, estimate }
    }

    fn role_player_count(&self, relation_type: &Label, role: Option<&str>) -> f64 {
        let hierarchy = self.estimator.logic_manager.hierarchy();
        let roles: Vec<Label> = match role {
            Some(name) => hierarchy.resolve_role(relation_type, name).into_iter().collect(),
            None => hierarchy.relates(relation_type).into_iter().collect(),
        };
        roles.iter().map(|role| self.estimator.statistics.role_player_edge_count(relation_type, role) as f64).sum()
    }

    /// Answers over `variables` that the concludable's rules can produce.
    fn inferred(&self, concludable: &Concludable, variables: &BTreeSet<Variable>) -> Inferred {
        let mut inferred = Inferred::default();
        for (rule, unifier) in concludable.applicable_rules() {
            let Some(rule) = self.estimator.logic_manager.rule(*rule) else { continue };
            let projection = rule_projection(concludable, rule, unifier, variables);
            let body = rule.body();
            if self.node.is_cyclic_dependency(concludable.id(), body) {
                if let Some(model) = self.cyclic_round.and_then(|round| round.get(&body)) {
                    inferred.cyclic += model.estimate_answers(&projection);
                }
            } else {
                let model = self.body_model(body);
                debug_assert!(model.is_some(), "acyclic rule bodies are modelled before their callers");
                inferred.acyclic += model.map_or(0.0, |model| model.estimate_answers(&projection));
            }
        }
        inferred
    }

    fn body_model(&self, body: ConjunctionId) -> Option<Arc<ConjunctionModel>> {
        self.staged.get(&body).cloned().or_else(|| self.estimator.published_model(body))
    }
}

/// Body variables whose answers correspond to the concludable's answers over `variables`.
/// A generated relation is distinct per combination of all its concluded role players.
fn rule_projection(
    concludable: &Concludable,
    rule: &Rule,
    unifier: &Unifier,
    variables: &BTreeSet<Variable>,
) -> BTreeSet<Variable> {
    if variables.contains(&concludable.generating()) && matches!(rule.head(), RuleHead::Relation { .. }) {
        rule.head().variables()
    } else {
        unifier.map_variables(variables)
    }
}

fn permutations(n: f64, k: usize) -> f64 {
    if n < k as f64 {
        return 0.0;
    }
    (0..k).map(|i| n - i as f64).product()
}

/// Estimates answers of a growing prefix of a conjunction's resolvables.
#[derive(Debug, Clone)]
pub struct IncrementalEstimator {
    model: Arc<ConjunctionModel>,
    unary: BTreeMap<Variable, f64>,
    mode: BTreeSet<Variable>,
    enabled: BTreeSet<ResolvableId>,
    variables: BTreeSet<Variable>,
}

impl IncrementalEstimator {
    fn new(model: Arc<ConjunctionModel>, mode: BTreeSet<Variable>) -> Self {
        let mut unary = model.unary.clone();
        for variable in &mode {
            if let Some(bound) = unary.get_mut(variable) {
                *bound = bound.min(1.0);
            }
        }
        Self { model, unary, mode, enabled: BTreeSet::new(), variables: BTreeSet::new() }
    }

    pub fn conjunction(&self) -> ConjunctionId {
        self.model.conjunction
    }

    pub fn mode(&self) -> &BTreeSet<Variable> {
        &self.mode
    }

    /// Variables of every resolvable added so far.
    pub fn variables(&self) -> &BTreeSet<Variable> {
        &self.variables
    }

    pub fn extend(&mut self, resolvable: &Resolvable) {
        debug_assert_eq!(resolvable.conjunction(), self.model.conjunction);
        self.enabled.insert(resolvable.id());
        self.variables.extend(resolvable.variables().iter().copied());
    }

    pub fn answer_estimate(&self, variables: &BTreeSet<Variable>) -> f64 {
        self.model.estimate(variables, &self.unary, &self.mode, |model| self.enabled.contains(&model.resolvable))
    }

    pub fn answer_set_size(&self) -> f64 {
        self.answer_estimate(&self.variables)
    }

    /// Estimate using only the given resolvable's own constraints.
    pub fn local_estimate(&self, resolvable: &Resolvable, variables: &BTreeSet<Variable>) -> f64 {
        self.model.estimate(variables, &self.unary, &self.mode, |model| model.resolvable == resolvable.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutations_vanish_when_too_few_players() {
        assert_eq!(permutations(3.0, 2), 6.0);
        assert_eq!(permutations(2.0, 1), 2.0);
        assert_eq!(permutations(1.0, 2), 0.0);
        assert_eq!(permutations(0.0, 0), 1.0);
    }

    #[test]
    fn cyclic_contributions_are_damped_by_their_share() {
        assert_eq!(Inferred { acyclic: 2.0, cyclic: 0.0 }.combine(3.0), 5.0);
        assert_eq!(Inferred { acyclic: 0.0, cyclic: 5.0 }.combine(5.0), 7.5);
        assert_eq!(Inferred::default().combine(0.0), 0.0);
    }
}
