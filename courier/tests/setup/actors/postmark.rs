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

/// A pure sender: it cannot receive messages, so undeliverable traffic
/// bounces back to it. Tests read the bounce count.
pub struct Postmark {
    id: Ern,
    bounced: AtomicUsize,
}

impl Postmark {
    pub fn new(name: &str) -> Arc<Self> {
        let id = Ern::with_root(name).expect("invalid sender name");
        Arc::new(Self {
            id,
            bounced: AtomicUsize::new(0),
        })
    }

    pub fn bounced(&self) -> usize {
        self.bounced.load(Ordering::Acquire)
    }

    pub fn sender_ref(self: &Arc<Self>) -> SenderRef {
        SenderRef::new(self.clone() as Arc<dyn Sender>)
    }
}

#[async_trait]
impl Sender for Postmark {
    fn id(&self) -> Ern {
        self.id.clone()
    }

    async fn bounce(&self, _message: Message) {
        self.bounced.fetch_add(1, Ordering::AcqRel);
    }
}

impl Debug for Postmark {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Postmark").field("id", &self.id).finish()
    }
}
