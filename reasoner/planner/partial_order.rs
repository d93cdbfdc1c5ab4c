/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{collections::BTreeSet, sync::Arc};

use ir::pattern::variable::Variable;
use logic::{resolvable::Resolvable, resolvable_conjunction::ResolvableConjunction};

use crate::{
    conjunction_graph::ConjunctionNode,
    planner::{dependencies, enabled, value_identified, Dependencies},
    PlannerError,
};

/// Enumerates valid orderings of a conjunction, skipping orderings that only swap resolvables sharing no variables.
///
/// Sleep sets hold resolvables already explored as the next step at an ancestor; a sleeping resolvable wakes up
/// once a resolvable sharing a variable with it is placed. Where some enabled resolvable touches a bound variable,
/// only those are considered, so disconnected resolvables are not placed early.
#[derive(Debug)]
pub struct PartialOrderReductionSearch<'a> {
    node: &'a ConjunctionNode,
    resolvables: BTreeSet<Arc<Resolvable>>,
    dependencies: Dependencies,
    bounds: BTreeSet<Variable>,
}

impl<'a> PartialOrderReductionSearch<'a> {
    pub fn new(node: &'a ConjunctionNode, conjunction: &ResolvableConjunction, mode: &BTreeSet<Variable>) -> Self {
        Self {
            node,
            resolvables: conjunction.resolvables().iter().cloned().collect(),
            dependencies: dependencies(conjunction),
            bounds: mode | &value_identified(conjunction),
        }
    }

    pub fn orderings(&self) -> Result<Vec<Vec<Arc<Resolvable>>>, PlannerError> {
        let mut orderings = Vec::new();
        let mut path = Vec::with_capacity(self.resolvables.len());
        let mut remaining = self.resolvables.clone();
        let mut bounds = self.bounds.clone();
        self.search(&mut path, &mut remaining, &mut bounds, &BTreeSet::new(), &mut orderings)?;
        Ok(orderings)
    }

    fn search(
        &self,
        path: &mut Vec<Arc<Resolvable>>,
        remaining: &mut BTreeSet<Arc<Resolvable>>,
        bounds: &mut BTreeSet<Variable>,
        sleeping: &BTreeSet<Arc<Resolvable>>,
        orderings: &mut Vec<Vec<Arc<Resolvable>>>,
    ) -> Result<(), PlannerError> {
        if remaining.is_empty() {
            orderings.push(path.clone());
            return Ok(());
        }

        let mut candidates: Vec<Arc<Resolvable>> = enabled(self.node, &self.dependencies, remaining, bounds)?
            .into_iter()
            .filter(|resolvable| !sleeping.contains(resolvable))
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }
        let connected: Vec<Arc<Resolvable>> = candidates
            .iter()
            .filter(|resolvable| !resolvable.variables().is_disjoint(bounds))
            .cloned()
            .collect();
        if !connected.is_empty() {
            candidates = connected;
        }

        let mut explored = sleeping.clone();
        for next in candidates {
            let next_sleeping: BTreeSet<Arc<Resolvable>> = explored
                .iter()
                .filter(|asleep| asleep.variables().is_disjoint(next.variables()))
                .cloned()
                .collect();
            let newly_bound: Vec<Variable> =
                next.variables().iter().filter(|variable| !bounds.contains(variable)).copied().collect();

            path.push(next.clone());
            remaining.remove(&next);
            bounds.extend(newly_bound.iter().copied());
            let result = self.search(path, remaining, bounds, &next_sleeping, orderings);
            for variable in &newly_bound {
                bounds.remove(variable);
            }
            remaining.insert(next.clone());
            path.pop();
            result?;

            explored.insert(next);
        }
        Ok(())
    }
}
