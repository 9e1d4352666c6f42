use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use xform_model::{DataInstance, TreeReference};

use crate::triggerable::Triggerable;

/// Position of a triggerable in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerableId(usize);

impl TriggerableId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TriggerableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Raised by [`DependencyGraph::finalize`] when triggerables feed each other in a loop.
///
/// `targets` lists the targets of every triggerable that could not be ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCycleError {
    pub targets: Vec<TreeReference>,
}

impl fmt::Display for DependencyCycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency cycle among: ")?;
        for (idx, target) in self.targets.iter().enumerate() {
            if idx > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{target}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DependencyCycleError {}

#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    pub triggerables: usize,
    /// Cascade edges (t -> u where a target of t is a trigger of u).
    pub edges: usize,
    /// Root-extraction rounds used by the last successful ordering.
    pub rounds: usize,
}

/// Registered triggerables, the indexes over them, and their global evaluation order.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    triggerables: Vec<Triggerable>,
    /// Generic trigger reference -> triggerables reading it, in registration order.
    trigger_index: BTreeMap<TreeReference, Vec<TriggerableId>>,
    /// Generic repeat reference -> condition gating creation of new instances.
    repeat_conditions: BTreeMap<TreeReference, TriggerableId>,
    order: Vec<TriggerableId>,
    ordered: bool,
    stats: GraphStats,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            triggerables: Vec::new(),
            trigger_index: BTreeMap::new(),
            repeat_conditions: BTreeMap::new(),
            order: Vec::new(),
            ordered: true,
            stats: GraphStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.triggerables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggerables.is_empty()
    }

    pub fn get(&self, id: TriggerableId) -> Option<&Triggerable> {
        self.triggerables.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TriggerableId, &Triggerable)> {
        self.triggerables
            .iter()
            .enumerate()
            .map(|(i, t)| (TriggerableId(i), t))
    }

    /// Registers `t` unless an equal triggerable exists; returns the id of the registered one.
    ///
    /// Conditions targeting a repeat (a node with a template in `instance`) are also indexed
    /// by target so they can gate repeat creation.
    pub fn add(&mut self, mut t: Triggerable, instance: &DataInstance) -> TriggerableId {
        t.rebuild_triggers();
        if let Some(existing) = self.triggerables.iter().position(|e| *e == t) {
            log::debug!("triggerable for {:?} already registered as #{existing}", t.targets());
            return TriggerableId(existing);
        }

        let id = TriggerableId(self.triggerables.len());
        for trigger in t.triggers() {
            let ids = self.trigger_index.entry(trigger.clone()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if t.is_condition() {
            for target in t.targets() {
                if instance.get_template(target).is_some() {
                    self.repeat_conditions.insert(target.clone(), id);
                }
            }
        }
        log::debug!("registered triggerable {id}: {}", t.expr());
        self.triggerables.push(t);
        self.ordered = false;
        id
    }

    /// Whether the current registration set has been ordered.
    pub fn is_finalized(&self) -> bool {
        self.ordered
    }

    pub fn order(&self) -> &[TriggerableId] {
        &self.order
    }

    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    /// Directly triggered by a change to `generic`.
    pub fn triggered_by(&self, generic: &TreeReference) -> &[TriggerableId] {
        self.trigger_index
            .get(generic)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Triggerables reading `generic` or any node below it.
    pub fn triggered_under(&self, generic: &TreeReference) -> BTreeSet<TriggerableId> {
        self.trigger_index
            .iter()
            .filter(|(trigger, _)| generic.is_parent_of(trigger, false))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Triggerables with at least one target at or below `generic`.
    pub fn targeting_under(&self, generic: &TreeReference) -> BTreeSet<TriggerableId> {
        self.iter()
            .filter(|(_, t)| t.targets().iter().any(|target| generic.is_parent_of(target, false)))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn repeat_condition(&self, generic_repeat: &TreeReference) -> Option<TriggerableId> {
        self.repeat_conditions.get(generic_repeat).copied()
    }

    /// Cascade edges `t -> u`: `t` cascades and one of its targets is a trigger of `u`.
    pub fn edges(&self) -> Vec<(TriggerableId, TriggerableId)> {
        let mut edges = BTreeSet::new();
        for (id, t) in self.iter() {
            if !t.is_cascading() {
                continue;
            }
            for target in t.targets() {
                for &dependent in self.triggered_by(target) {
                    edges.insert((id, dependent));
                }
            }
        }
        edges.into_iter().collect()
    }

    /// Computes the global evaluation order by repeated root extraction.
    ///
    /// Each round places every remaining triggerable with no incoming edge from another
    /// remaining triggerable, in registration order.
    pub fn finalize(&mut self) -> Result<(), DependencyCycleError> {
        let edges = self.edges();
        let mut in_degree = vec![0usize; self.triggerables.len()];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); self.triggerables.len()];
        for &(from, to) in &edges {
            in_degree[to.0] += 1;
            outgoing[from.0].push(to.0);
        }

        let mut remaining: BTreeSet<usize> = (0..self.triggerables.len()).collect();
        let mut order = Vec::with_capacity(self.triggerables.len());
        let mut rounds = 0usize;
        // Every round places at least one vertex, so `n` rounds always suffice for a DAG.
        let max_rounds = self.triggerables.len();

        while !remaining.is_empty() && rounds < max_rounds {
            rounds += 1;
            let roots: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&v| in_degree[v] == 0)
                .collect();
            if roots.is_empty() {
                break;
            }
            for &root in &roots {
                remaining.remove(&root);
                for &to in &outgoing[root] {
                    in_degree[to] = in_degree[to].saturating_sub(1);
                }
                order.push(TriggerableId(root));
            }
        }

        if !remaining.is_empty() {
            let targets = remaining
                .iter()
                .flat_map(|&v| self.triggerables[v].targets().iter().cloned())
                .collect();
            return Err(DependencyCycleError { targets });
        }

        log::debug!(
            "ordered {} triggerables ({} edges, {rounds} rounds)",
            order.len(),
            edges.len()
        );
        self.stats = GraphStats {
            triggerables: order.len(),
            edges: edges.len(),
            rounds,
        };
        self.order = order;
        self.ordered = true;
        Ok(())
    }

    /// `direct` plus everything reachable from it through cascading targets.
    pub fn cascade_closure(
        &self,
        direct: impl IntoIterator<Item = TriggerableId>,
    ) -> BTreeSet<TriggerableId> {
        let mut closure = BTreeSet::new();
        let mut stack: Vec<TriggerableId> = direct.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !closure.insert(id) {
                continue;
            }
            let Some(t) = self.get(id) else {
                continue;
            };
            if !t.is_cascading() {
                continue;
            }
            for target in t.targets() {
                stack.extend(
                    self.triggered_by(target)
                        .iter()
                        .copied()
                        .filter(|d| !closure.contains(d)),
                );
            }
        }
        closure
    }

    /// The members of `set` in global evaluation order.
    pub fn in_order(&self, set: &BTreeSet<TriggerableId>) -> Vec<TriggerableId> {
        self.order
            .iter()
            .copied()
            .filter(|id| set.contains(id))
            .collect()
    }
}
