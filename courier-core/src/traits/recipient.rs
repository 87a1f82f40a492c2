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
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use acton_ern::Ern;
use async_trait::async_trait;

use crate::message::Message;

/// A component exposing a single inbound message-handling entry point.
///
/// The dispatch engine guarantees that `on_message` is never invoked
/// concurrently with itself for the same recipient, and that messages
/// destined for one recipient are delivered in injection order (urgent
/// lane first). Errors returned here are caught and logged by the engine;
/// they never affect other recipients or the worker pool.
#[async_trait]
pub trait Recipient: Send + Sync + Debug {
    /// The unique identity of this recipient.
    fn id(&self) -> Ern;

    /// Handles one delivered message.
    async fn on_message(&self, message: Message) -> anyhow::Result<()>;
}

/// A cheap-clone handle addressing one [`Recipient`].
///
/// Equality and hashing follow the recipient's identity, so a handle can
/// key the engine's recipient map regardless of how many clones exist.
#[derive(Clone)]
pub struct RecipientRef {
    pub(crate) id: Ern,
    pub(crate) target: Arc<dyn Recipient>,
}

impl RecipientRef {
    /// Wraps a recipient behind a shared handle.
    pub fn new(target: Arc<dyn Recipient>) -> Self {
        Self {
            id: target.id(),
            target,
        }
    }

    /// The identity of the addressed recipient.
    pub fn id(&self) -> Ern {
        self.id.clone()
    }

    /// The addressed recipient itself.
    pub(crate) fn target(&self) -> Arc<dyn Recipient> {
        self.target.clone()
    }
}

impl Debug for RecipientRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipientRef").field("id", &self.id).finish()
    }
}

impl PartialEq for RecipientRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RecipientRef {}

impl Hash for RecipientRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
