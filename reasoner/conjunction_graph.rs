/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    fmt,
    sync::{Arc, Mutex, RwLock},
};

use itertools::Itertools;
use logic::{
    logic_manager::LogicManager,
    resolvable::ResolvableId,
    resolvable_conjunction::{ConjunctionId, ResolvableConjunction},
    rule::RuleId,
    LogicError,
};
use tracing::{event, Level};

use crate::PlannerError;

/// A conjunction together with the rule bodies its concludables depend on,
/// and its strongly connected component in the concludable-to-rule-body graph.
#[derive(Debug)]
pub struct ConjunctionNode {
    conjunction: Arc<ResolvableConjunction>,
    dependencies: BTreeMap<ResolvableId, BTreeMap<RuleId, ConjunctionId>>,
    component: BTreeSet<ConjunctionId>,
    is_cyclic: bool,
}

impl ConjunctionNode {
    pub fn id(&self) -> ConjunctionId {
        self.conjunction.id()
    }

    pub fn conjunction(&self) -> &Arc<ResolvableConjunction> {
        &self.conjunction
    }

    pub fn dependencies(&self) -> &BTreeMap<ResolvableId, BTreeMap<RuleId, ConjunctionId>> {
        &self.dependencies
    }

    /// Members of this conjunction's strongly connected component, including itself.
    pub fn component(&self) -> &BTreeSet<ConjunctionId> {
        &self.component
    }

    /// A conjunction is cyclic when it can reach itself through rule bodies.
    pub fn is_cyclic(&self) -> bool {
        self.is_cyclic
    }

    pub fn in_same_cycle(&self, other: ConjunctionId) -> bool {
        self.is_cyclic && self.component.contains(&other)
    }

    /// Whether calling `body` from `concludable` closes a cycle back into this conjunction.
    pub fn is_cyclic_dependency(&self, concludable: ResolvableId, body: ConjunctionId) -> bool {
        self.in_same_cycle(body)
            && self.dependencies.get(&concludable).is_some_and(|rules| rules.values().contains(&body))
    }

    pub fn cyclic_dependencies(&self, concludable: ResolvableId) -> BTreeSet<ConjunctionId> {
        self.dependency_bodies(concludable).filter(|body| self.in_same_cycle(*body)).collect()
    }

    pub fn acyclic_dependencies(&self, concludable: ResolvableId) -> BTreeSet<ConjunctionId> {
        self.dependency_bodies(concludable).filter(|body| !self.in_same_cycle(*body)).collect()
    }

    /// Concludables with at least one rule whose body lies in this conjunction's cycle.
    pub fn cyclic_concludables(&self) -> impl Iterator<Item = ResolvableId> + '_ {
        self.dependencies.keys().copied().filter(|concludable| !self.cyclic_dependencies(*concludable).is_empty())
    }

    pub fn acyclic_concludables(&self) -> impl Iterator<Item = ResolvableId> + '_ {
        self.dependencies.keys().copied().filter(|concludable| self.cyclic_dependencies(*concludable).is_empty())
    }

    fn dependency_bodies(&self, concludable: ResolvableId) -> impl Iterator<Item = ConjunctionId> + '_ {
        self.dependencies.get(&concludable).into_iter().flat_map(|rules| rules.values().copied())
    }
}

impl fmt::Display for ConjunctionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> [{}]", self.id(), self.dependencies.values().flat_map(|rules| rules.values()).unique().join(", "))?;
        if self.is_cyclic {
            write!(f, " (cycle {{{}}})", self.component.iter().join(", "))?;
        }
        Ok(())
    }
}

/// Lazily built, memoised dependency graph over conjunctions.
/// Nodes are only published once their whole reachable subgraph and its components are known,
/// so a published node never changes.
#[derive(Debug)]
pub struct ConjunctionGraph {
    logic_manager: Arc<LogicManager>,
    nodes: RwLock<HashMap<ConjunctionId, Arc<ConjunctionNode>>>,
    build_lock: Mutex<()>,
}

impl ConjunctionGraph {
    pub fn new(logic_manager: Arc<LogicManager>) -> Self {
        Self { logic_manager, nodes: RwLock::new(HashMap::new()), build_lock: Mutex::new(()) }
    }

    pub fn conjunction_node(&self, conjunction: ConjunctionId) -> Result<Arc<ConjunctionNode>, PlannerError> {
        if let Some(node) = self.nodes.read().unwrap().get(&conjunction) {
            return Ok(node.clone());
        }
        let _guard = self.build_lock.lock().unwrap();
        if let Some(node) = self.nodes.read().unwrap().get(&conjunction) {
            return Ok(node.clone());
        }
        self.build_from(conjunction)?;
        self.nodes.read().unwrap().get(&conjunction).cloned().ok_or(PlannerError::UnknownConjunction {
            typedb_source: LogicError::UnknownConjunction { id: conjunction },
        })
    }

    pub fn is_cyclic(&self, conjunction: ConjunctionId) -> Result<bool, PlannerError> {
        Ok(self.conjunction_node(conjunction)?.is_cyclic())
    }

    pub fn in_same_cycle(&self, first: ConjunctionId, second: ConjunctionId) -> Result<bool, PlannerError> {
        Ok(self.conjunction_node(first)?.in_same_cycle(second))
    }

    pub fn dependencies(
        &self,
        conjunction: ConjunctionId,
    ) -> Result<BTreeMap<ResolvableId, BTreeMap<RuleId, ConjunctionId>>, PlannerError> {
        Ok(self.conjunction_node(conjunction)?.dependencies().clone())
    }

    pub fn clear(&self) {
        let _guard = self.build_lock.lock().unwrap();
        self.nodes.write().unwrap().clear();
    }

    fn build_from(&self, root: ConjunctionId) -> Result<(), PlannerError> {
        let published: HashSet<ConjunctionId> = self.nodes.read().unwrap().keys().copied().collect();

        let mut expanded: HashMap<ConjunctionId, Arc<ResolvableConjunction>> = HashMap::new();
        let mut dependencies: HashMap<ConjunctionId, BTreeMap<ResolvableId, BTreeMap<RuleId, ConjunctionId>>> =
            HashMap::new();
        let mut worklist = vec![root];
        while let Some(id) = worklist.pop() {
            if published.contains(&id) || expanded.contains_key(&id) {
                continue;
            }
            let conjunction = self
                .logic_manager
                .resolvable_conjunction(id)
                .map_err(|typedb_source| PlannerError::UnknownConjunction { typedb_source })?;
            let mut node_dependencies = BTreeMap::new();
            for (resolvable, concludable) in conjunction.concludables() {
                let mut bodies = BTreeMap::new();
                for (rule, _) in concludable.applicable_rules() {
                    if let Some(rule) = self.logic_manager.rule(*rule) {
                        bodies.insert(rule.id(), rule.body());
                        worklist.push(rule.body());
                    }
                }
                node_dependencies.insert(resolvable.id(), bodies);
            }
            expanded.insert(id, conjunction);
            dependencies.insert(id, node_dependencies);
        }

        // Edges into published nodes cannot close a cycle: anything reaching back would have been published too.
        let successors: HashMap<ConjunctionId, BTreeSet<ConjunctionId>> = dependencies
            .iter()
            .map(|(id, node_dependencies)| {
                let bodies = node_dependencies
                    .values()
                    .flat_map(|rules| rules.values().copied())
                    .filter(|body| expanded.contains_key(body))
                    .collect();
                (*id, bodies)
            })
            .collect();
        let components = strongly_connected_components(&successors);

        let mut new_nodes = HashMap::with_capacity(expanded.len());
        for (id, conjunction) in expanded {
            let component = components.get(&id).cloned().unwrap_or_else(|| BTreeSet::from([id]));
            let is_cyclic = component.len() > 1 || successors.get(&id).is_some_and(|bodies| bodies.contains(&id));
            let node_dependencies = dependencies.remove(&id).unwrap_or_default();
            let node = ConjunctionNode { conjunction, dependencies: node_dependencies, component, is_cyclic };
            event!(Level::TRACE, "Conjunction graph node: {}", node);
            new_nodes.insert(id, Arc::new(node));
        }
        event!(
            Level::DEBUG,
            "Built conjunction graph from {} with {} new nodes, {} of them cyclic.",
            root,
            new_nodes.len(),
            new_nodes.values().filter(|node| node.is_cyclic).count()
        );
        self.nodes.write().unwrap().extend(new_nodes);
        Ok(())
    }
}

/// Kosaraju's algorithm, with explicit stacks for both passes.
fn strongly_connected_components(
    successors: &HashMap<ConjunctionId, BTreeSet<ConjunctionId>>,
) -> HashMap<ConjunctionId, BTreeSet<ConjunctionId>> {
    let post_order = post_order(successors);

    let mut predecessors: HashMap<ConjunctionId, BTreeSet<ConjunctionId>> =
        successors.keys().map(|id| (*id, BTreeSet::new())).collect();
    for (id, bodies) in successors {
        for body in bodies {
            predecessors.entry(*body).or_default().insert(*id);
        }
    }

    let mut component_root: HashMap<ConjunctionId, ConjunctionId> = HashMap::new();
    for root in post_order.iter().rev() {
        if component_root.contains_key(root) {
            continue;
        }
        component_root.insert(*root, *root);
        let mut stack = vec![*root];
        while let Some(id) = stack.pop() {
            for predecessor in predecessors.get(&id).into_iter().flatten() {
                if !component_root.contains_key(predecessor) {
                    component_root.insert(*predecessor, *root);
                    stack.push(*predecessor);
                }
            }
        }
    }

    let mut members: HashMap<ConjunctionId, BTreeSet<ConjunctionId>> = HashMap::new();
    for (id, root) in &component_root {
        members.entry(*root).or_default().insert(*id);
    }
    component_root.into_iter().map(|(id, root)| (id, members[&root].clone())).collect()
}

fn post_order(successors: &HashMap<ConjunctionId, BTreeSet<ConjunctionId>>) -> Vec<ConjunctionId> {
    let mut post_order = Vec::with_capacity(successors.len());
    let mut visited = HashSet::new();
    for start in successors.keys().sorted() {
        if !visited.insert(*start) {
            continue;
        }
        let mut stack: Vec<(ConjunctionId, Vec<ConjunctionId>)> = vec![(*start, pending_successors(successors, *start))];
        loop {
            let Some((id, pending)) = stack.last_mut() else { break };
            let id = *id;
            match pending.pop() {
                Some(next) => {
                    if visited.insert(next) {
                        stack.push((next, pending_successors(successors, next)));
                    }
                }
                None => {
                    post_order.push(id);
                    stack.pop();
                }
            }
        }
    }
    post_order
}

fn pending_successors(
    successors: &HashMap<ConjunctionId, BTreeSet<ConjunctionId>>,
    id: ConjunctionId,
) -> Vec<ConjunctionId> {
    successors.get(&id).into_iter().flatten().rev().copied().collect()
}
