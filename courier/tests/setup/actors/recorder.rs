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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier::prelude::*;
use tokio::sync::Semaphore;

use crate::setup::messages::Tagged;

/// A recipient that logs the tag of every [`Tagged`] payload in delivery
/// order and detects overlapping deliveries.
///
/// When gated, each delivery first releases one permit on `entered` (so a
/// test knows the delivery is in flight) and then consumes one permit from
/// `hold` (so the test controls when it finishes).
pub struct Recorder {
    id: Ern,
    log: Mutex<Vec<u32>>,
    busy: AtomicBool,
    overlapped: AtomicBool,
    gate: Option<Gate>,
}

#[derive(Clone)]
pub struct Gate {
    pub entered: Arc<Semaphore>,
    pub hold: Arc<Semaphore>,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Semaphore::new(0)),
            hold: Arc::new(Semaphore::new(0)),
        }
    }
}

impl Recorder {
    pub fn new(name: &str) -> Arc<Self> {
        Self::build(name, None)
    }

    pub fn gated(name: &str, gate: Gate) -> Arc<Self> {
        Self::build(name, Some(gate))
    }

    fn build(name: &str, gate: Option<Gate>) -> Arc<Self> {
        let id = Ern::with_root(name).expect("invalid recorder name");
        Arc::new(Self {
            id,
            log: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
            overlapped: AtomicBool::new(false),
            gate,
        })
    }

    pub fn handle(self: &Arc<Self>) -> RecipientRef {
        RecipientRef::new(self.clone() as Arc<dyn Recipient>)
    }

    pub fn log(&self) -> Vec<u32> {
        self.log.lock().expect("log poisoned").clone()
    }

    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Recipient for Recorder {
    fn id(&self) -> Ern {
        self.id.clone()
    }

    async fn on_message(&self, message: Message) -> anyhow::Result<()> {
        if self.busy.swap(true, Ordering::AcqRel) {
            self.overlapped.store(true, Ordering::Release);
        }
        if let Some(gate) = &self.gate {
            gate.entered.add_permits(1);
            gate.hold
                .acquire()
                .await
                .expect("gate semaphore closed")
                .forget();
        }
        // Yield once so an overlapping delivery would be observable.
        tokio::task::yield_now().await;
        if let Some(tagged) = message.payload_as::<Tagged>() {
            self.log.lock().expect("log poisoned").push(tagged.tag);
        }
        self.busy.store(false, Ordering::Release);
        Ok(())
    }
}

impl Debug for Recorder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder").field("id", &self.id).finish()
    }
}
