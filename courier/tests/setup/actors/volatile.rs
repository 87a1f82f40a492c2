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
use std::sync::Arc;

use async_trait::async_trait;
use courier::prelude::*;

use crate::setup::messages::{Explode, Sting};

/// A recipient that panics on [`Explode`], errors on [`Sting`], and counts
/// everything else as handled.
pub struct Volatile {
    id: Ern,
    handled: AtomicUsize,
}

impl Volatile {
    pub fn new(name: &str) -> Arc<Self> {
        let id = Ern::with_root(name).expect("invalid recipient name");
        Arc::new(Self {
            id,
            handled: AtomicUsize::new(0),
        })
    }

    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::Acquire)
    }

    pub fn handle(self: &Arc<Self>) -> RecipientRef {
        RecipientRef::new(self.clone() as Arc<dyn Recipient>)
    }
}

#[async_trait]
impl Recipient for Volatile {
    fn id(&self) -> Ern {
        self.id.clone()
    }

    async fn on_message(&self, message: Message) -> anyhow::Result<()> {
        if message.payload_as::<Explode>().is_some() {
            panic!("volatile recipient exploded");
        }
        if message.payload_as::<Sting>().is_some() {
            anyhow::bail!("volatile recipient stung");
        }
        self.handled.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

impl Debug for Volatile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volatile").field("id", &self.id).finish()
    }
}
