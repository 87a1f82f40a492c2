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

//! The thread-pool governor: worker spawn/boost/retirement policy and the
//! worker drain loop.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;

use futures::FutureExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, trace};

use crate::queue::DispatchEngine;

impl DispatchEngine {
    /// Spawns one worker in the current generation, unconditionally.
    pub(crate) fn spawn_worker(&self) {
        let live = self.inner.live_workers.fetch_add(1, Ordering::AcqRel) + 1;
        self.spawn_counted_worker(live);
    }

    /// Boost policy: when the ready backlog exceeds the live worker count
    /// and the pool is below the high-water mark, spawn one additional
    /// worker. Evaluated after every inject that created a recipient queue.
    pub(crate) fn boost(&self, ready_len: usize) {
        loop {
            let live = self.inner.live_workers.load(Ordering::Acquire);
            if ready_len <= live || live >= self.inner.config.high_water_mark {
                return;
            }
            if self
                .inner
                .live_workers
                .compare_exchange(live, live + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.spawn_counted_worker(live + 1);
                return;
            }
        }
    }

    // The live counter has already been raised by the caller.
    fn spawn_counted_worker(&self, live: usize) {
        self.inner.max_used.fetch_max(live, Ordering::AcqRel);
        let ordinal = self.inner.worker_seq.fetch_add(1, Ordering::AcqRel);
        let generation = {
            let generation = match self.inner.generation.lock() {
                Ok(generation) => generation,
                Err(poisoned) => poisoned.into_inner(),
            };
            generation.clone()
        };
        let engine = self.clone();
        let tracked = self
            .inner
            .tracker
            .track_future(worker_loop(engine, generation, ordinal));
        self.inner.runtime.spawn(tracked);
    }

    /// Pops one ready queue and drains exactly one message from it.
    ///
    /// The evict check and the inject path's get-or-create share the engine
    /// guard, so a queue refilled while a worker holds it is re-appended to
    /// the ready list rather than lost, and an evicted queue is recreated
    /// lazily by the next inject.
    async fn drain_one(&self) {
        let queue = {
            let mut state = self.lock_state();
            state.ready.pop_front()
        };
        let Some(queue) = queue else {
            return;
        };

        let Some(message) = queue.poll() else {
            // Popped a drained queue: evict it unless an inject refilled it
            // since it left the ready list.
            let mut state = self.lock_state();
            if queue.is_empty() {
                state.queues.remove(&queue.target().id());
            } else {
                state.ready.push_back(queue.clone());
                self.inner.work.add_permits(1);
            }
            return;
        };

        message.mark_dispatched();
        let recipient = queue.target().target();
        let delivery = AssertUnwindSafe(recipient.on_message(message.clone()))
            .catch_unwind()
            .await;
        match delivery {
            Ok(Ok(())) => trace!(recipient = %queue.target().id(), "message delivered"),
            Ok(Err(problem)) => error!(
                recipient = %queue.target().id(),
                %problem,
                "recipient failed to process message"
            ),
            Err(_) => error!(
                recipient = %queue.target().id(),
                "recipient panicked while processing message"
            ),
        }
        // A failed or panicked delivery still counts for bookkeeping:
        // at-least-once attempt, no automatic retry.
        message.complete_delivery();

        let mut state = self.lock_state();
        if queue.is_empty() {
            state.queues.remove(&queue.target().id());
        } else {
            state.ready.push_back(queue.clone());
            self.inner.work.add_permits(1);
        }
    }
}

#[instrument(skip(engine, generation))]
async fn worker_loop(engine: DispatchEngine, generation: CancellationToken, ordinal: usize) {
    trace!(worker = ordinal, "worker started");
    let patience = engine.inner.config.patience;
    loop {
        tokio::select! {
            _ = generation.cancelled() => {
                engine.inner.live_workers.fetch_sub(1, Ordering::AcqRel);
                trace!(worker = ordinal, "worker interrupted");
                return;
            }
            outcome = timeout(patience, engine.inner.work.acquire()) => {
                match outcome {
                    Err(_elapsed) => {
                        // Patience spent with no work: an odd worker (one
                        // beyond the floor) retires itself.
                        if retire_if_above_floor(&engine) {
                            trace!(worker = ordinal, "worker retired after idle timeout");
                            return;
                        }
                    }
                    Ok(Err(_closed)) => {
                        engine.inner.live_workers.fetch_sub(1, Ordering::AcqRel);
                        return;
                    }
                    Ok(Ok(permit)) => {
                        permit.forget();
                        engine.drain_one().await;
                    }
                }
            }
        }
    }
}

// Compare-and-swap so two idle workers cannot both retire past the floor.
fn retire_if_above_floor(engine: &DispatchEngine) -> bool {
    let floor = engine.inner.config.low_water_mark;
    loop {
        let live = engine.inner.live_workers.load(Ordering::Acquire);
        if live <= floor {
            return false;
        }
        if engine
            .inner
            .live_workers
            .compare_exchange(live, live - 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return true;
        }
    }
}
