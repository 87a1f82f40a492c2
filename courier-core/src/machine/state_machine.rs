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
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use acton_ern::Ern;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{instrument, trace, warn};

use crate::common::FutureBox;
use crate::machine::{derive_trajectories, State, StateTransition, Trajectory};
use crate::message::{Message, QueueError, Request};
use crate::queue::DispatchEngine;
use crate::traits::{MessagePayload, Recipient, RecipientRef, Sender, SenderRef};

type HookTask = Arc<dyn Fn() -> FutureBox + Send + Sync>;

tokio::task_local! {
    // Present while one of this machine's on_state hooks is executing.
    static IN_HOOK: ();
}

fn in_hook() -> bool {
    IN_HOOK.try_with(|_| ()).is_ok()
}

/// A state machine computing trajectories from its current state to a
/// target state and driving them one transition at a time through the
/// dispatch engine.
///
/// The machine is itself a [`Recipient`]: `start`, retargeting, and
/// transition merges arrive through its queue, so they serialize with each
/// other and with transition execution. A run is terminal for its own
/// [`Request`] only; the machine stays at its last reached state and a
/// later `start` resumes from there.
pub struct StateMachine {
    id: Ern,
    engine: DispatchEngine,
    inner: Mutex<MachineInner>,
    hooks: DashMap<State, Vec<HookTask>>,
    self_ref: Weak<StateMachine>,
}

#[derive(Default)]
struct MachineInner {
    current: Option<State>,
    target: Option<State>,
    transitions: Vec<Arc<StateTransition>>,
    /// Cached derivation; `None` means invalidated.
    trajectories: Option<Vec<Trajectory>>,
    /// Bumped on every invalidation so an in-flight run re-derives.
    epoch: u64,
    started: bool,
    next_run: u64,
    run: Option<ActiveRun>,
    last_passed: Vec<State>,
}

struct ActiveRun {
    id: u64,
    request: Request,
    /// Transitions that failed during this run; never re-chosen for it.
    blocked: HashSet<String>,
}

#[derive(Clone, Debug)]
struct StartRun {
    request: Request,
}

#[derive(Clone, Debug)]
struct SetTarget {
    state: State,
}

#[derive(Clone, Debug)]
struct MergeTransitions {
    transitions: Vec<Arc<StateTransition>>,
}

#[derive(Clone, Debug)]
struct ExecuteStep {
    step: Arc<StateTransition>,
    request: Request,
}

impl StateMachine {
    /// Creates a machine bound to the given engine.
    pub fn new(engine: DispatchEngine, name: &str) -> Arc<Self> {
        let id = Ern::with_root(name).expect("Failed to create state machine identity");
        Arc::new_cyclic(|weak| Self {
            id,
            engine,
            inner: Mutex::new(MachineInner::default()),
            hooks: DashMap::new(),
            self_ref: weak.clone(),
        })
    }

    /// This machine's recipient handle.
    pub fn handle(self: &Arc<Self>) -> RecipientRef {
        RecipientRef::new(self.clone() as Arc<dyn Recipient>)
    }

    /// This machine's sender handle.
    pub fn sender_ref(self: &Arc<Self>) -> SenderRef {
        SenderRef::new(self.clone() as Arc<dyn Sender>)
    }

    /// Sets both the current and the target state. Callable only before
    /// the first [`StateMachine::start`].
    pub fn initialize(&self, state: State) -> Result<(), QueueError> {
        let mut inner = self.lock_inner();
        if inner.started {
            return Err(QueueError::InvalidState(
                "initialize called after start".into(),
            ));
        }
        inner.current = Some(state.clone());
        inner.target = Some(state);
        Ok(())
    }

    /// Merges transitions into the known set, stopping any in-flight run
    /// (unless called from one of that run's own hooks) and invalidating
    /// cached trajectories.
    pub fn add_transitions(
        self: &Arc<Self>,
        transitions: impl IntoIterator<Item = StateTransition>,
    ) -> Result<(), QueueError> {
        let batch: Vec<Arc<StateTransition>> = transitions.into_iter().map(Arc::new).collect();
        if in_hook() {
            self.apply_merge(batch, true);
            Ok(())
        } else {
            self.control(MergeTransitions { transitions: batch })
                .map(|_| ())
        }
    }

    /// Sets the target state, stopping any in-flight run (unless called
    /// from one of that run's own hooks, which retargets it in place) and
    /// invalidating cached trajectories.
    pub fn set_target_state(self: &Arc<Self>, state: State) -> Result<(), QueueError> {
        if in_hook() {
            self.apply_target(state, true);
            Ok(())
        } else {
            self.control(SetTarget { state }).map(|_| ())
        }
    }

    /// Begins a run toward the target state, superseding any active run.
    ///
    /// Returns the run's [`Request`] immediately; precondition failures
    /// (no transitions, uninitialized states) fail the request rather than
    /// surfacing synchronously.
    pub fn start(self: &Arc<Self>) -> Request {
        let request = Request::new();
        {
            let mut inner = self.lock_inner();
            inner.started = true;
        }
        if let Err(problem) = self.control(StartRun {
            request: request.clone(),
        }) {
            request.fail(problem.into());
        }
        request
    }

    /// Registers a task to run immediately after the machine's current
    /// state becomes `state`. Tasks may legally call
    /// [`StateMachine::set_target_state`], [`StateMachine::add_transitions`],
    /// and [`StateMachine::start`].
    pub fn on_state(&self, state: State, task: impl Fn() -> FutureBox + Send + Sync + 'static) {
        self.hooks.entry(state).or_default().push(Arc::new(task));
    }

    /// The machine's current state.
    pub fn current_state(&self) -> Option<State> {
        self.lock_inner().current.clone()
    }

    /// The machine's target state.
    pub fn target_state(&self) -> Option<State> {
        self.lock_inner().target.clone()
    }

    /// The states passed during the most recent run, starting state first.
    pub fn passed_states(&self) -> Vec<State> {
        self.lock_inner().last_passed.clone()
    }

    /// The accepted trajectories from the current state to the target,
    /// deriving and caching them when invalidated.
    pub fn trajectories(&self) -> Vec<Trajectory> {
        let (transitions, current, target, epoch, cached) = {
            let inner = self.lock_inner();
            (
                inner.transitions.clone(),
                inner.current.clone(),
                inner.target.clone(),
                inner.epoch,
                inner.trajectories.clone(),
            )
        };
        if let Some(cached) = cached {
            return cached;
        }
        let (Some(current), Some(target)) = (current, target) else {
            return Vec::new();
        };
        let derived = derive_trajectories(&transitions, &current, &target);
        let mut inner = self.lock_inner();
        if inner.epoch == epoch {
            inner.trajectories = Some(derived.clone());
        }
        derived
    }

    fn control(
        self: &Arc<Self>,
        payload: impl MessagePayload + 'static,
    ) -> Result<Message, QueueError> {
        let message = Message::compose(payload)
            .from(self.sender_ref())
            .to(self.handle())
            .build();
        self.engine.inject(message)
    }

    fn apply_merge(&self, batch: Vec<Arc<StateTransition>>, from_hook: bool) {
        let superseded = {
            let mut inner = self.lock_inner();
            let superseded = if from_hook { None } else { inner.run.take() };
            inner.transitions.extend(batch);
            inner.trajectories = None;
            inner.epoch += 1;
            superseded
        };
        if let Some(run) = superseded {
            run.request.cancel();
        }
    }

    fn apply_target(&self, state: State, from_hook: bool) {
        trace!(machine = %self.id, target = %state, from_hook, "retargeting");
        let superseded = {
            let mut inner = self.lock_inner();
            let superseded = if from_hook { None } else { inner.run.take() };
            inner.target = Some(state);
            inner.trajectories = None;
            inner.epoch += 1;
            superseded
        };
        if let Some(run) = superseded {
            run.request.cancel();
        }
    }

    fn begin_run(&self, request: Request) {
        let superseded = {
            let mut inner = self.lock_inner();
            inner.run.take()
        };
        if let Some(run) = superseded {
            run.request.cancel();
        }

        let run_id = {
            let mut inner = self.lock_inner();
            if inner.transitions.is_empty() {
                drop(inner);
                request.fail(QueueError::InvalidState("no transitions known".into()).into());
                return;
            }
            let (Some(current), Some(_)) = (inner.current.clone(), inner.target.clone()) else {
                drop(inner);
                request.fail(
                    QueueError::InvalidState("state machine not initialized".into()).into(),
                );
                return;
            };
            inner.next_run += 1;
            let run_id = inner.next_run;
            inner.run = Some(ActiveRun {
                id: run_id,
                request: request.clone(),
                blocked: HashSet::new(),
            });
            inner.last_passed = vec![current];
            run_id
        };

        let Some(machine) = self.self_ref.upgrade() else {
            return;
        };
        tokio::spawn(drive(machine, run_id, request));
    }

    async fn run_hooks(&self, state: &State) {
        let tasks: Vec<HookTask> = self
            .hooks
            .get(state)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        if tasks.is_empty() {
            return;
        }
        IN_HOOK
            .scope((), async {
                for task in tasks {
                    task().await;
                }
            })
            .await;
    }

    /// Clears the run when it is still the one identified by `run_id`.
    /// Returns false when a newer run or a stop superseded it.
    fn finish_run(&self, run_id: u64) -> bool {
        let mut inner = self.lock_inner();
        match &inner.run {
            Some(run) if run.id == run_id => {
                inner.run = None;
                true
            }
            _ => false,
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, MachineInner> {
        match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// The execution loop of one run: select, execute, advance, until the
/// target is reached or the machine stalls.
#[instrument(skip(machine, request), fields(machine = %machine.id))]
async fn drive(machine: Arc<StateMachine>, run_id: u64, request: Request) {
    loop {
        let snapshot = {
            let inner = machine.lock_inner();
            match &inner.run {
                Some(run) if run.id == run_id => Some((
                    inner.current.clone(),
                    inner.target.clone(),
                    inner.transitions.clone(),
                    inner.epoch,
                    inner.trajectories.clone(),
                    run.blocked.clone(),
                )),
                _ => None,
            }
        };
        // Superseded or stopped; the replacement owns the machine now.
        let Some((current, target, transitions, epoch, cached, blocked)) = snapshot else {
            return;
        };
        let (Some(current), Some(target)) = (current, target) else {
            return;
        };

        if current == target {
            if machine.finish_run(run_id) {
                trace!(machine = %machine.id, state = %current, "target reached");
                request.succeed();
            }
            return;
        }

        let trajectories = match cached {
            Some(cached) => cached,
            None => {
                let derived = derive_trajectories(&transitions, &current, &target);
                let mut inner = machine.lock_inner();
                if inner.epoch != epoch {
                    // Retargeted while deriving; start over.
                    continue;
                }
                inner.trajectories = Some(derived.clone());
                derived
            }
        };

        let Some(step) = select_step(&trajectories, &current, &blocked) else {
            if machine.finish_run(run_id) {
                request.fail(QueueError::Stalled(current.name().to_string()).into());
            }
            return;
        };

        // Execution is delegated through the engine: the machine receives
        // its own ExecuteStep message and reports on the step request.
        let step_request = Request::new();
        if let Err(problem) = machine.control(ExecuteStep {
            step: step.clone(),
            request: step_request.clone(),
        }) {
            if machine.finish_run(run_id) {
                request.fail(problem.into());
            }
            return;
        }

        match step_request.wait().await {
            Ok(()) => {
                let reached = step.terminal().clone();
                {
                    let mut inner = machine.lock_inner();
                    match &inner.run {
                        Some(run) if run.id == run_id => {}
                        _ => return,
                    }
                    inner.current = Some(reached.clone());
                    inner.last_passed.push(reached.clone());
                }
                trace!(machine = %machine.id, state = %reached, "state advanced");
                machine.run_hooks(&reached).await;
            }
            Err(_) => {
                warn!(
                    machine = %machine.id,
                    transition = step.name(),
                    "transition failed; blocked for this run"
                );
                let mut inner = machine.lock_inner();
                match &mut inner.run {
                    Some(run) if run.id == run_id => {
                        run.blocked.insert(step.name().to_string());
                    }
                    _ => return,
                }
            }
        }
    }
}

/// Among all trajectories passing through `current`, picks the unblocked,
/// viable next hop with the lowest order value; ties fall to the fewest
/// remaining hops, then to discovery order.
fn select_step(
    trajectories: &[Trajectory],
    current: &State,
    blocked: &HashSet<String>,
) -> Option<Arc<StateTransition>> {
    let mut best: Option<(i32, usize, usize, Arc<StateTransition>)> = None;
    for (seq, trajectory) in trajectories.iter().enumerate() {
        let Some((step, remaining)) = trajectory.step_from(current) else {
            continue;
        };
        if blocked.contains(step.name()) || !step.is_viable() {
            continue;
        }
        let key = (step.order(), remaining, seq);
        let better = match &best {
            Some((order, hops, rank, _)) => key < (*order, *hops, *rank),
            None => true,
        };
        if better {
            best = Some((key.0, key.1, key.2, step));
        }
    }
    best.map(|(_, _, _, step)| step)
}

#[async_trait]
impl Recipient for StateMachine {
    fn id(&self) -> Ern {
        self.id.clone()
    }

    async fn on_message(&self, message: Message) -> anyhow::Result<()> {
        if let Some(start) = message.payload_as::<StartRun>() {
            self.begin_run(start.request.clone());
            return Ok(());
        }
        if let Some(retarget) = message.payload_as::<SetTarget>() {
            self.apply_target(retarget.state.clone(), false);
            return Ok(());
        }
        if let Some(merge) = message.payload_as::<MergeTransitions>() {
            self.apply_merge(merge.transitions.clone(), false);
            return Ok(());
        }
        if let Some(execute) = message.payload_as::<ExecuteStep>() {
            match execute.step.execute().await {
                Ok(()) => execute.request.succeed(),
                Err(problem) => execute.request.fail(problem),
            }
            return Ok(());
        }
        trace!(machine = %self.id, payload = ?message.payload(), "message unprocessed");
        Ok(())
    }
}

#[async_trait]
impl Sender for StateMachine {
    fn id(&self) -> Ern {
        self.id.clone()
    }

    async fn bounce(&self, message: Message) {
        warn!(machine = %self.id, ?message, "message bounced");
    }

    fn as_recipient(&self) -> Option<RecipientRef> {
        self.self_ref
            .upgrade()
            .map(|machine| RecipientRef::new(machine as Arc<dyn Recipient>))
    }
}

impl Debug for StateMachine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine").field("id", &self.id).finish()
    }
}
