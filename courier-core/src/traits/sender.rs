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
use std::sync::Arc;

use acton_ern::Ern;
use async_trait::async_trait;

use crate::message::Message;
use crate::traits::RecipientRef;

/// The originator of a [`Message`].
///
/// A sender that is itself a recipient may return its own handle from
/// [`Sender::as_recipient`]; the engine then delivers a message with an
/// empty declared recipient set back to its sender instead of failing it.
#[async_trait]
pub trait Sender: Send + Sync + Debug {
    /// The unique identity of this sender.
    fn id(&self) -> Ern;

    /// Invoked when a message cannot be delivered through the
    /// sender-as-recipient fallback path.
    async fn bounce(&self, message: Message);

    /// The sender's own recipient handle, when it can receive messages.
    fn as_recipient(&self) -> Option<RecipientRef> {
        None
    }
}

/// A cheap-clone handle naming the originator of a message.
#[derive(Clone)]
pub struct SenderRef {
    pub(crate) id: Ern,
    pub(crate) origin: Arc<dyn Sender>,
}

impl SenderRef {
    /// Wraps a sender behind a shared handle.
    pub fn new(origin: Arc<dyn Sender>) -> Self {
        Self {
            id: origin.id(),
            origin,
        }
    }

    /// The identity of the originating sender.
    pub fn id(&self) -> Ern {
        self.id.clone()
    }

    /// The sender's own recipient handle, when it can receive messages.
    pub(crate) fn as_recipient(&self) -> Option<RecipientRef> {
        self.origin.as_recipient()
    }

    /// The originating sender itself.
    pub(crate) fn origin(&self) -> Arc<dyn Sender> {
        self.origin.clone()
    }
}

impl Debug for SenderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderRef").field("id", &self.id).finish()
    }
}

impl PartialEq for SenderRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SenderRef {}
