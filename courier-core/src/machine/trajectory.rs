/*
 * Copyright (c) 2024. Courier Contributors
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */
use std::collections::HashSet;
use std::sync::Arc;

use crate::machine::{State, StateTransition};

/// An ordered, acyclic chain of transitions forming one candidate path to
/// the target state. Never empty; never contains the same transition twice.
#[derive(Clone, Debug)]
pub struct Trajectory {
    steps: Vec<Arc<StateTransition>>,
}

impl Trajectory {
    fn seed(step: Arc<StateTransition>) -> Self {
        Self { steps: vec![step] }
    }

    // Returns None when prepending would repeat a transition (cyclic).
    fn prepended(&self, step: Arc<StateTransition>) -> Option<Self> {
        if self.contains(step.name()) {
            return None;
        }
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.push(step);
        steps.extend(self.steps.iter().cloned());
        Some(Self { steps })
    }

    /// The chain of transitions, in execution order.
    pub fn steps(&self) -> &[Arc<StateTransition>] {
        &self.steps
    }

    /// Number of transitions in the chain.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// A trajectory is never empty by construction.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The state the chain departs from.
    pub fn initial_state(&self) -> &State {
        self.steps[0].initial()
    }

    /// The state the chain arrives at.
    pub fn terminal_state(&self) -> &State {
        self.steps[self.steps.len() - 1].terminal()
    }

    /// Whether the chain leads from `from` to `to`.
    pub fn connects(&self, from: &State, to: &State) -> bool {
        self.initial_state() == from && self.terminal_state() == to
    }

    /// Whether the named transition appears in the chain.
    pub fn contains(&self, transition_name: &str) -> bool {
        self.steps.iter().any(|step| step.name() == transition_name)
    }

    /// The chain's next hop departing from `state`, together with the
    /// number of hops remaining from there to the terminal state.
    pub(crate) fn step_from(&self, state: &State) -> Option<(Arc<StateTransition>, usize)> {
        self.steps
            .iter()
            .position(|step| step.initial() == state)
            .map(|index| (self.steps[index].clone(), self.steps.len() - index))
    }

    fn key(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }
}

/// Derives every accepted trajectory from `current` to `target` over the
/// given transition set.
///
/// Pure function of its inputs: seeds one single-transition trajectory per
/// transition terminating at the target; adopts a directly connecting seed
/// as the sole result (prefer shortcuts); otherwise works backwards,
/// prepending every transition arriving at a candidate's initial state,
/// discarding cyclic extensions, promoting candidates that reach `current`,
/// and deduplicating equivalent chains.
pub(crate) fn derive_trajectories(
    transitions: &[Arc<StateTransition>],
    current: &State,
    target: &State,
) -> Vec<Trajectory> {
    let seeds: Vec<Trajectory> = transitions
        .iter()
        .filter(|transition| transition.terminal() == target)
        .map(|transition| Trajectory::seed(transition.clone()))
        .collect();

    if let Some(shortcut) = seeds.iter().find(|seed| seed.connects(current, target)) {
        return vec![shortcut.clone()];
    }

    let mut accepted: Vec<Trajectory> = Vec::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut candidates: Vec<Trajectory> = seeds;

    while let Some(candidate) = candidates.pop() {
        let head = candidate.initial_state().clone();
        for transition in transitions {
            if transition.terminal() != &head {
                continue;
            }
            let Some(extended) = candidate.prepended(transition.clone()) else {
                continue;
            };
            if transition.initial() == current {
                let key: Vec<String> = extended.key().iter().map(|s| s.to_string()).collect();
                if seen.insert(key) {
                    accepted.push(extended);
                }
            } else {
                candidates.push(extended);
            }
        }
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(name: &str, ordinal: u32) -> State {
        State::new(name, ordinal)
    }

    fn edge(name: &str, from: &State, to: &State) -> Arc<StateTransition> {
        Arc::new(StateTransition::new(name, from.clone(), to.clone(), 0))
    }

    #[test]
    fn direct_edge_yields_single_shortcut() {
        let a = state("A", 0);
        let d = state("D", 3);
        let transitions = vec![edge("a-d", &a, &d)];
        let trajectories = derive_trajectories(&transitions, &a, &d);
        assert_eq!(trajectories.len(), 1);
        assert_eq!(trajectories[0].len(), 1);
        assert!(trajectories[0].connects(&a, &d));
    }

    #[test]
    fn diamond_graph_yields_both_paths() {
        let a = state("A", 0);
        let b = state("B", 1);
        let c = state("C", 2);
        let d = state("D", 3);
        let transitions = vec![
            edge("a-b", &a, &b),
            edge("b-c", &b, &c),
            edge("a-c", &a, &c),
            edge("c-d", &c, &d),
        ];
        let mut trajectories = derive_trajectories(&transitions, &a, &d);
        assert_eq!(trajectories.len(), 2);
        trajectories.sort_by_key(Trajectory::len);
        assert!(trajectories[0].connects(&a, &d));
        assert_eq!(trajectories[0].len(), 2);
        assert_eq!(trajectories[1].len(), 3);
    }

    #[test]
    fn unreachable_target_yields_nothing() {
        let a = state("A", 0);
        let b = state("B", 1);
        let c = state("C", 2);
        let d = state("D", 3);
        let e = state("E", 4);
        let transitions = vec![edge("a-b", &a, &b), edge("b-c", &b, &c), edge("d-e", &d, &e)];
        let trajectories = derive_trajectories(&transitions, &a, &d);
        assert!(trajectories.is_empty());
    }

    #[test]
    fn cyclic_extensions_are_discarded() {
        let a = state("A", 0);
        let b = state("B", 1);
        let c = state("C", 2);
        let transitions = vec![
            edge("a-b", &a, &b),
            edge("b-b", &b, &b),
            edge("b-c", &b, &c),
        ];
        // The self-loop may appear once per chain but repeating it would be
        // cyclic, so the search terminates with exactly two paths.
        let trajectories = derive_trajectories(&transitions, &a, &c);
        assert_eq!(trajectories.len(), 2);
        assert!(trajectories.iter().all(|t| t.connects(&a, &c)));
    }

    #[test]
    fn equivalent_chains_are_deduplicated() {
        let a = state("A", 0);
        let b = state("B", 1);
        let c = state("C", 2);
        let transitions = vec![
            edge("a-b", &a, &b),
            edge("b-c", &b, &c),
            edge("a-b", &a, &b),
        ];
        let trajectories = derive_trajectories(&transitions, &a, &c);
        assert_eq!(trajectories.len(), 1);
    }
}
