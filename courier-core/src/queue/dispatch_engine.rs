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
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use acton_ern::Ern;
use static_assertions::assert_impl_all;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{instrument, trace, warn};

use crate::common::EngineConfig;
use crate::message::{Message, QueueError};
use crate::queue::RecipientQueue;
use crate::traits::RecipientRef;

/// The central message queue and recipient-dispatch engine.
///
/// Senders inject messages; the engine fans each message out into one
/// per-recipient queue per recipient and drains those queues with an
/// elastic pool of workers bounded by the configured water marks. Messages
/// destined for one recipient are delivered in injection order (urgent lane
/// first) and never concurrently; distinct recipients are drained in
/// parallel.
///
/// The handle is cheap to clone and is the engine's entire lifecycle
/// surface: construct with [`DispatchEngine::launch`], feed with
/// [`DispatchEngine::inject`], retire with [`DispatchEngine::shutdown`].
#[derive(Clone)]
pub struct DispatchEngine {
    pub(crate) inner: Arc<EngineInner>,
}

assert_impl_all!(DispatchEngine: Send, Sync);

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    /// The sole engine-wide serialization point: recipient map + ready list.
    /// Held only for brief mutate windows.
    pub(crate) guard: Mutex<EngineState>,
    /// Counted work list: one permit per entry in the ready list.
    pub(crate) work: Semaphore,
    pub(crate) running: AtomicBool,
    pub(crate) live_workers: AtomicUsize,
    pub(crate) max_used: AtomicUsize,
    pub(crate) worker_seq: AtomicUsize,
    pub(crate) tracker: TaskTracker,
    /// Root token; cancelling it interrupts every worker generation.
    pub(crate) shutdown: CancellationToken,
    /// Current worker generation; replaced wholesale by `reset_usage`.
    pub(crate) generation: Mutex<CancellationToken>,
    pub(crate) runtime: Handle,
}

#[derive(Default)]
pub(crate) struct EngineState {
    pub(crate) queues: HashMap<Ern, Arc<RecipientQueue>>,
    pub(crate) ready: VecDeque<Arc<RecipientQueue>>,
}

impl Debug for DispatchEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("live_workers", &self.live_workers())
            .field("max_used", &self.max_used())
            .finish()
    }
}

impl DispatchEngine {
    /// Constructs an engine and spawns its low-water-mark worker floor.
    ///
    /// Must be called within a tokio runtime; the engine captures the
    /// runtime handle so later boosts can spawn workers from any thread.
    pub fn launch(config: EngineConfig) -> Self {
        let shutdown = CancellationToken::new();
        let generation = shutdown.child_token();
        let engine = Self {
            inner: Arc::new(EngineInner {
                config,
                guard: Mutex::new(EngineState::default()),
                work: Semaphore::new(0),
                running: AtomicBool::new(true),
                live_workers: AtomicUsize::new(0),
                max_used: AtomicUsize::new(0),
                worker_seq: AtomicUsize::new(0),
                tracker: TaskTracker::new(),
                shutdown,
                generation: Mutex::new(generation),
                runtime: Handle::current(),
            }),
        };
        for _ in 0..engine.inner.config.low_water_mark {
            engine.spawn_worker();
        }
        trace!(
            low = engine.inner.config.low_water_mark,
            high = engine.inner.config.high_water_mark,
            "dispatch engine launched"
        );
        engine
    }

    /// Injects a message for delivery, returning the same message for
    /// chaining.
    ///
    /// Fails fast with [`QueueError::QueueDisabled`] once shutdown has
    /// begun, [`QueueError::MissingSender`] for an anonymous message, and
    /// [`QueueError::Undeliverable`] when the declared recipient set is
    /// empty and the sender cannot receive its own traffic (the message is
    /// bounced back to the sender in that case). Never blocks beyond the
    /// engine guard's brief mutate window.
    #[instrument(skip(self, message), level = "trace")]
    pub fn inject(&self, message: Message) -> Result<Message, QueueError> {
        if !self.inner.running.load(Ordering::Acquire) {
            return Err(QueueError::QueueDisabled);
        }
        let Some(sender) = message.sender() else {
            return Err(QueueError::MissingSender);
        };
        let recipients: Vec<RecipientRef> = if message.recipients().is_empty() {
            match sender.as_recipient() {
                Some(own) => vec![own],
                None => {
                    let origin = sender.origin();
                    let bounced = message.clone();
                    self.inner.runtime.spawn(async move {
                        origin.bounce(bounced).await;
                    });
                    return Err(QueueError::Undeliverable(format!(
                        "no recipients and sender {} cannot receive",
                        sender.id()
                    )));
                }
            }
        } else {
            message.recipients().to_vec()
        };

        message.set_deliveries(recipients.len());
        let mut created_any = false;
        let ready_len;
        {
            let mut state = self.lock_state();
            for recipient in recipients {
                message.mark_enqueued();
                let (queue, created) = match state.queues.entry(recipient.id()) {
                    Entry::Occupied(entry) => (entry.get().clone(), false),
                    Entry::Vacant(entry) => (
                        entry
                            .insert(Arc::new(RecipientQueue::new(recipient.clone())))
                            .clone(),
                        true,
                    ),
                };
                queue.add(message.clone());
                if created {
                    // A fresh queue joins the ready list and wakes one worker.
                    state.ready.push_back(queue);
                    self.inner.work.add_permits(1);
                    created_any = true;
                }
            }
            ready_len = state.ready.len();
        }
        if created_any {
            self.boost(ready_len);
        }
        Ok(message)
    }

    /// Configured floor on concurrently live workers.
    pub fn low_water_mark(&self) -> usize {
        self.inner.config.low_water_mark
    }

    /// Configured ceiling on concurrently live workers.
    pub fn high_water_mark(&self) -> usize {
        self.inner.config.high_water_mark
    }

    /// Number of currently live workers.
    pub fn live_workers(&self) -> usize {
        self.inner.live_workers.load(Ordering::Acquire)
    }

    /// High-water mark of concurrently live workers observed since launch
    /// or the last [`DispatchEngine::reset_usage`].
    pub fn max_used(&self) -> usize {
        self.inner.max_used.load(Ordering::Acquire)
    }

    /// Interrupts the current worker generation, respawns the floor, and
    /// resets the observed usage high-water mark.
    #[instrument(skip(self))]
    pub fn reset_usage(&self) {
        let fresh = self.inner.shutdown.child_token();
        let retired = {
            let mut generation = match self.inner.generation.lock() {
                Ok(generation) => generation,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::replace(&mut *generation, fresh)
        };
        retired.cancel();
        for _ in 0..self.inner.config.low_water_mark {
            self.spawn_worker();
        }
        // The interrupted generation drains down in the background; the
        // fresh mark starts from the floor, not from the transient overlap.
        self.inner
            .max_used
            .store(self.inner.config.low_water_mark, Ordering::Release);
    }

    /// Begins graceful shutdown: refuses new injections, waits (bounded)
    /// for queued work to drain, then interrupts the remaining workers and
    /// waits for them to finish. Deliveries already on a worker complete.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.inner.running.store(false, Ordering::Release);
        let deadline = Instant::now() + self.inner.config.shutdown_drain;
        loop {
            let drained = {
                let state = self.lock_state();
                state.ready.is_empty() && state.queues.is_empty()
            };
            if drained {
                break;
            }
            if Instant::now() >= deadline {
                warn!("shutdown drain bound elapsed with work still queued");
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        trace!("dispatch engine stopped");
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        match self.inner.guard.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
