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
use std::fmt::{Debug, Display, Formatter};

use derive_new::new;

use crate::common::RouteFuture;

/// An enum-like state value: an identity plus an ordinal.
#[derive(Clone, PartialEq, Eq, Hash, Debug, new)]
pub struct State {
    #[new(into)]
    name: String,
    ordinal: u32,
}

impl State {
    /// The state's identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The state's ordinal.
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

type ViabilityFn = dyn Fn() -> bool + Send + Sync;
type ActionFn = dyn Fn() -> RouteFuture + Send + Sync;

/// One edge of the state graph: an initial state, a terminal state, an
/// order value used for tie-breaking (lower preferred, negatives legal), a
/// viability predicate, and the async action executed to take the edge.
pub struct StateTransition {
    name: String,
    initial: State,
    terminal: State,
    order: i32,
    viability: Box<ViabilityFn>,
    action: Box<ActionFn>,
}

impl StateTransition {
    /// Creates a transition with a default (always-true) viability and a
    /// no-op action.
    pub fn new(name: impl Into<String>, initial: State, terminal: State, order: i32) -> Self {
        Self {
            name: name.into(),
            initial,
            terminal,
            order,
            viability: Box::new(|| true),
            action: Box::new(|| Box::pin(async { Ok(()) })),
        }
    }

    /// Overrides the viability predicate consulted during selection.
    pub fn with_viability(mut self, viability: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.viability = Box::new(viability);
        self
    }

    /// Sets the async action executed when the transition is taken.
    pub fn with_action(
        mut self,
        action: impl Fn() -> RouteFuture + Send + Sync + 'static,
    ) -> Self {
        self.action = Box::new(action);
        self
    }

    /// The transition's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The state this transition departs from.
    pub fn initial(&self) -> &State {
        &self.initial
    }

    /// The state this transition arrives at.
    pub fn terminal(&self) -> &State {
        &self.terminal
    }

    /// The tie-breaking order value; lower wins.
    pub fn order(&self) -> i32 {
        self.order
    }

    pub(crate) fn is_viable(&self) -> bool {
        (self.viability)()
    }

    pub(crate) fn execute(&self) -> RouteFuture {
        (self.action)()
    }
}

impl Debug for StateTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTransition")
            .field("name", &self.name)
            .field("initial", &self.initial)
            .field("terminal", &self.terminal)
            .field("order", &self.order)
            .finish()
    }
}
