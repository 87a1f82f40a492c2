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
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::message::Request;
use crate::traits::{MessagePayload, RecipientRef, SenderRef};

/// The one-shot delivery lifecycle of a [`Message`].
///
/// Transitions are monotonic and may not regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DeliveryState {
    /// Constructed but not yet handed to the engine.
    New = 0,
    /// Appended to at least one recipient queue.
    Enqueued = 1,
    /// Picked up by a worker for delivery.
    Dispatched = 2,
    /// Delivered to (or attempted for) every expected recipient.
    Delivered = 3,
}

impl DeliveryState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => DeliveryState::New,
            1 => DeliveryState::Enqueued,
            2 => DeliveryState::Dispatched,
            _ => DeliveryState::Delivered,
        }
    }
}

/// An addressed, possibly urgent unit of work handed to the dispatch engine.
///
/// Cloning is cheap; all clones observe the same delivery state and the same
/// completion [`Request`], which fires exactly once after every expected
/// recipient delivery has completed or been attempted.
#[derive(Clone, Debug)]
pub struct Message {
    inner: Arc<MessageInner>,
}

#[derive(Debug)]
struct MessageInner {
    sender: Option<SenderRef>,
    recipients: Vec<RecipientRef>,
    urgent: bool,
    payload: Arc<dyn MessagePayload>,
    state: AtomicU8,
    pending: AtomicUsize,
    request: Request,
}

impl Message {
    /// Begins composing a message around the given payload.
    pub fn compose(payload: impl MessagePayload + 'static) -> MessageBuilder {
        MessageBuilder {
            sender: None,
            recipients: Vec::new(),
            urgent: false,
            payload: Arc::new(payload),
        }
    }

    /// The originating sender, when one was named.
    pub fn sender(&self) -> Option<SenderRef> {
        self.inner.sender.clone()
    }

    /// The declared recipient set. An empty set means broadcast-to-sender.
    pub fn recipients(&self) -> &[RecipientRef] {
        &self.inner.recipients
    }

    /// Whether this message jumps the standard delivery lane.
    pub fn is_urgent(&self) -> bool {
        self.inner.urgent
    }

    /// The type-erased payload.
    pub fn payload(&self) -> Arc<dyn MessagePayload> {
        self.inner.payload.clone()
    }

    /// Downcasts the payload to a concrete type.
    pub fn payload_as<T: 'static>(&self) -> Option<&T> {
        // Deref first: the Arc wrapper satisfies the payload trait itself,
        // and its `as_any` would erase the Arc rather than the payload.
        self.inner.payload.as_ref().as_any().downcast_ref::<T>()
    }

    /// The completion signal fired once all expected deliveries finish.
    pub fn request(&self) -> Request {
        self.inner.request.clone()
    }

    /// The current point in the delivery lifecycle.
    pub fn state(&self) -> DeliveryState {
        DeliveryState::from_raw(self.inner.state.load(Ordering::Acquire))
    }

    /// Records how many recipient deliveries must complete before the
    /// message counts as delivered.
    pub(crate) fn set_deliveries(&self, count: usize) {
        self.inner.pending.store(count, Ordering::Release);
    }

    pub(crate) fn mark_enqueued(&self) {
        self.advance(DeliveryState::Enqueued);
    }

    pub(crate) fn mark_dispatched(&self) {
        self.advance(DeliveryState::Dispatched);
    }

    /// Records one finished recipient delivery; the final one advances the
    /// message to delivered and fires the completion request exactly once.
    pub(crate) fn complete_delivery(&self) {
        if self.inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.advance(DeliveryState::Delivered);
            trace!("message fully delivered");
            self.inner.request.succeed();
        }
    }

    // fetch_max keeps the lifecycle monotonic under concurrent marking.
    fn advance(&self, to: DeliveryState) {
        self.inner.state.fetch_max(to as u8, Ordering::AcqRel);
    }
}

/// Builder for a [`Message`].
pub struct MessageBuilder {
    sender: Option<SenderRef>,
    recipients: Vec<RecipientRef>,
    urgent: bool,
    payload: Arc<dyn MessagePayload>,
}

impl MessageBuilder {
    /// Names the originating sender.
    pub fn from(mut self, sender: SenderRef) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Adds one recipient to the declared set.
    pub fn to(mut self, recipient: RecipientRef) -> Self {
        self.recipients.push(recipient);
        self
    }

    /// Adds every recipient in the iterator to the declared set.
    pub fn to_each(mut self, recipients: impl IntoIterator<Item = RecipientRef>) -> Self {
        self.recipients.extend(recipients);
        self
    }

    /// Flags the message for the urgent delivery lane.
    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }

    /// Finishes composition.
    pub fn build(self) -> Message {
        Message {
            inner: Arc::new(MessageInner {
                sender: self.sender,
                recipients: self.recipients,
                urgent: self.urgent,
                payload: self.payload,
                state: AtomicU8::new(DeliveryState::New as u8),
                pending: AtomicUsize::new(0),
                request: Request::new(),
            }),
        }
    }
}
