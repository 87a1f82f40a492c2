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
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{timeout, Instant};
use tracing::trace;

use crate::message::QueueError;

type SuccessAction = Box<dyn FnOnce() + Send + 'static>;
type FailureAction = Box<dyn FnOnce(Arc<anyhow::Error>) + Send + 'static>;

/// A one-shot completion signal for a pending operation.
///
/// A `Request` is created per pending operation (for instance "execute this
/// state transition" or "deliver this message to every recipient") and fires
/// exactly once into one of three terminal states: succeeded, failed with a
/// problem, or cancelled.
///
/// Waiters block on [`Request::standby`] with a deadline; the deadline
/// elapsing surfaces [`QueueError::OperationTimedOut`] without touching the
/// underlying completion state, so a late completion is still observable by
/// a later wait or by the registered [`Request::and_then`] /
/// [`Request::or_else`] actions. Actions are always scheduled as independent
/// tasks, never run synchronously inside the completing call.
///
/// Because actions are scheduled as tasks, completing a request or
/// registering an action after the fact must happen within a tokio runtime
/// context; a thread outside the runtime enters it first (for instance via
/// `Handle::enter`). Constructing and cloning requests carry no such
/// requirement.
#[derive(Clone, Default)]
pub struct Request {
    inner: Arc<RequestInner>,
}

#[derive(Default)]
struct RequestInner {
    state: Mutex<RequestState>,
    notify: Notify,
}

enum RequestState {
    Pending {
        on_success: Vec<SuccessAction>,
        on_failure: Vec<FailureAction>,
    },
    Succeeded,
    Failed(Arc<anyhow::Error>),
    Cancelled,
}

impl Default for RequestState {
    fn default() -> Self {
        RequestState::Pending {
            on_success: Vec::new(),
            on_failure: Vec::new(),
        }
    }
}

impl Debug for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock().map(|guard| match &*guard {
            RequestState::Pending { .. } => "Pending",
            RequestState::Succeeded => "Succeeded",
            RequestState::Failed(_) => "Failed",
            RequestState::Cancelled => "Cancelled",
        });
        f.debug_struct("Request")
            .field("state", &state.unwrap_or("Poisoned"))
            .finish()
    }
}

impl Request {
    /// Creates a new pending request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Completes the request successfully. Later completion attempts are
    /// ignored; the terminal state fires exactly once.
    pub fn succeed(&self) {
        let actions = {
            let mut state = match self.inner.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            match std::mem::take(&mut *state) {
                RequestState::Pending { on_success, .. } => {
                    *state = RequestState::Succeeded;
                    on_success
                }
                terminal => {
                    *state = terminal;
                    trace!("succeed after terminal state, ignoring");
                    return;
                }
            }
        };
        self.inner.notify.notify_waiters();
        for action in actions {
            tokio::spawn(async move { action() });
        }
    }

    /// Fails the request with the given problem.
    pub fn fail(&self, problem: anyhow::Error) {
        let problem = Arc::new(problem);
        let actions = {
            let mut state = match self.inner.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            match std::mem::take(&mut *state) {
                RequestState::Pending { on_failure, .. } => {
                    *state = RequestState::Failed(problem.clone());
                    on_failure
                }
                terminal => {
                    *state = terminal;
                    trace!("fail after terminal state, ignoring");
                    return;
                }
            }
        };
        self.inner.notify.notify_waiters();
        for action in actions {
            let problem = problem.clone();
            tokio::spawn(async move { action(problem) });
        }
    }

    /// Cancels the request. Failure actions run with a cancellation problem.
    pub fn cancel(&self) {
        let actions = {
            let mut state = match self.inner.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            match std::mem::take(&mut *state) {
                RequestState::Pending { on_failure, .. } => {
                    *state = RequestState::Cancelled;
                    on_failure
                }
                terminal => {
                    *state = terminal;
                    return;
                }
            }
        };
        self.inner.notify.notify_waiters();
        for action in actions {
            let problem = Arc::new(anyhow::Error::from(QueueError::RequestCancelled));
            tokio::spawn(async move { action(problem) });
        }
    }

    /// Registers an action to run asynchronously once the request succeeds.
    /// Registering after success still fires the action.
    pub fn and_then(&self, action: impl FnOnce() + Send + 'static) -> &Self {
        let run_now = {
            let mut state = match self.inner.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            match &mut *state {
                RequestState::Pending { on_success, .. } => {
                    on_success.push(Box::new(action));
                    None
                }
                RequestState::Succeeded => Some(Box::new(action) as SuccessAction),
                _ => None,
            }
        };
        if let Some(action) = run_now {
            tokio::spawn(async move { action() });
        }
        self
    }

    /// Registers an action to run asynchronously once the request fails or
    /// is cancelled. Registering after the fact still fires the action.
    pub fn or_else(&self, action: impl FnOnce(Arc<anyhow::Error>) + Send + 'static) -> &Self {
        let run_now = {
            let mut state = match self.inner.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            match &mut *state {
                RequestState::Pending { on_failure, .. } => {
                    on_failure.push(Box::new(action));
                    None
                }
                RequestState::Failed(problem) => {
                    Some((Box::new(action) as FailureAction, problem.clone()))
                }
                RequestState::Cancelled => Some((
                    Box::new(action) as FailureAction,
                    Arc::new(anyhow::Error::from(QueueError::RequestCancelled)),
                )),
                RequestState::Succeeded => None,
            }
        };
        if let Some((action, problem)) = run_now {
            tokio::spawn(async move { action(problem) });
        }
        self
    }

    /// Waits until the request reaches a terminal state or the deadline
    /// elapses. A timeout leaves the request untouched.
    pub async fn standby(&self, patience: Duration) -> Result<(), QueueError> {
        let deadline = Instant::now() + patience;
        loop {
            let notified = self.inner.notify.notified();
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(QueueError::OperationTimedOut);
            }
            timeout(remaining, notified).await?;
        }
    }

    /// Waits without a deadline until the request reaches a terminal state.
    pub async fn wait(&self) -> Result<(), QueueError> {
        loop {
            let notified = self.inner.notify.notified();
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            notified.await;
        }
    }

    /// The problem attached to a failed request, if any.
    pub fn problem(&self) -> Option<Arc<anyhow::Error>> {
        let state = match self.inner.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        match &*state {
            RequestState::Failed(problem) => Some(problem.clone()),
            _ => None,
        }
    }

    /// Whether the request reached any terminal state.
    pub fn is_complete(&self) -> bool {
        self.outcome().is_some()
    }

    /// Whether the request reached the succeeded terminal state.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome(), Some(Ok(())))
    }

    fn outcome(&self) -> Option<Result<(), QueueError>> {
        let state = match self.inner.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        match &*state {
            RequestState::Pending { .. } => None,
            RequestState::Succeeded => Some(Ok(())),
            RequestState::Failed(problem) => {
                Some(Err(QueueError::RequestFailed(problem.to_string())))
            }
            RequestState::Cancelled => Some(Err(QueueError::RequestCancelled)),
        }
    }
}
