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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use courier::prelude::*;
use tokio::time::sleep;

/// A recipient that counts every delivery, optionally sleeping per message
/// to keep a worker occupied. It is also a [`Sender`] able to receive its
/// own traffic, so tests can exercise the empty-recipient fallback path.
pub struct Counter {
    id: Ern,
    hits: AtomicUsize,
    delay: Duration,
    self_ref: Weak<Counter>,
}

impl Counter {
    pub fn new(name: &str) -> Arc<Self> {
        Self::with_delay(name, Duration::ZERO)
    }

    pub fn with_delay(name: &str, delay: Duration) -> Arc<Self> {
        let id = Ern::with_root(name).expect("invalid counter name");
        Arc::new_cyclic(|weak| Self {
            id,
            hits: AtomicUsize::new(0),
            delay,
            self_ref: weak.clone(),
        })
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Acquire)
    }

    pub fn handle(self: &Arc<Self>) -> RecipientRef {
        RecipientRef::new(self.clone() as Arc<dyn Recipient>)
    }

    pub fn sender_ref(self: &Arc<Self>) -> SenderRef {
        SenderRef::new(self.clone() as Arc<dyn Sender>)
    }
}

#[async_trait]
impl Recipient for Counter {
    fn id(&self) -> Ern {
        self.id.clone()
    }

    async fn on_message(&self, _message: Message) -> anyhow::Result<()> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.hits.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

#[async_trait]
impl Sender for Counter {
    fn id(&self) -> Ern {
        self.id.clone()
    }

    async fn bounce(&self, _message: Message) {}

    fn as_recipient(&self) -> Option<RecipientRef> {
        self.self_ref
            .upgrade()
            .map(|counter| RecipientRef::new(counter as Arc<dyn Recipient>))
    }
}

impl Debug for Counter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counter").field("id", &self.id).finish()
    }
}
