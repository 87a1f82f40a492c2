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
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::sync::{Mutex, MutexGuard};

use crate::message::Message;
use crate::traits::RecipientRef;

/// An ordered queue of messages awaiting delivery to one recipient.
///
/// Two FIFO lanes: urgent and standard. [`RecipientQueue::poll`] drains the
/// entire urgent lane strictly before any standard item. All operations are
/// O(1) and never block beyond the short internal lock; at most one worker
/// drains a given queue instance at a time, which is what upholds the
/// at-most-one-concurrent-delivery guarantee per recipient.
pub(crate) struct RecipientQueue {
    target: RecipientRef,
    lanes: Mutex<Lanes>,
}

#[derive(Default)]
struct Lanes {
    urgent: VecDeque<Message>,
    standard: VecDeque<Message>,
}

impl RecipientQueue {
    pub(crate) fn new(target: RecipientRef) -> Self {
        Self {
            target,
            lanes: Mutex::new(Lanes::default()),
        }
    }

    /// The recipient this queue feeds.
    pub(crate) fn target(&self) -> &RecipientRef {
        &self.target
    }

    /// Appends a message to the lane matching its urgency.
    pub(crate) fn add(&self, message: Message) {
        let mut lanes = self.lock_lanes();
        if message.is_urgent() {
            lanes.urgent.push_back(message);
        } else {
            lanes.standard.push_back(message);
        }
    }

    /// Removes and returns the next deliverable message, urgent lane first.
    pub(crate) fn poll(&self) -> Option<Message> {
        let mut lanes = self.lock_lanes();
        lanes.urgent.pop_front().or_else(|| lanes.standard.pop_front())
    }

    pub(crate) fn is_empty(&self) -> bool {
        let lanes = self.lock_lanes();
        lanes.urgent.is_empty() && lanes.standard.is_empty()
    }

    fn lock_lanes(&self) -> MutexGuard<'_, Lanes> {
        match self.lanes.lock() {
            Ok(lanes) => lanes,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Debug for RecipientQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipientQueue")
            .field("target", &self.target.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acton_ern::Ern;
    use async_trait::async_trait;
    use std::sync::Arc;

    use crate::traits::Recipient;

    #[derive(Debug)]
    struct Sink(Ern);

    #[async_trait]
    impl Recipient for Sink {
        fn id(&self) -> Ern {
            self.0.clone()
        }

        async fn on_message(&self, _message: Message) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn queue() -> RecipientQueue {
        let target = Arc::new(Sink(Ern::with_root("sink").unwrap()));
        RecipientQueue::new(RecipientRef::new(target))
    }

    fn tagged(tag: u32, urgent: bool) -> Message {
        let builder = Message::compose(tag);
        if urgent {
            builder.urgent().build()
        } else {
            builder.build()
        }
    }

    #[test]
    fn standard_lane_is_fifo() {
        let queue = queue();
        queue.add(tagged(1, false));
        queue.add(tagged(2, false));
        assert_eq!(queue.poll().unwrap().payload_as::<u32>(), Some(&1));
        assert_eq!(queue.poll().unwrap().payload_as::<u32>(), Some(&2));
        assert!(queue.poll().is_none());
    }

    #[test]
    fn urgent_lane_drains_first() {
        let queue = queue();
        queue.add(tagged(1, false));
        queue.add(tagged(2, true));
        queue.add(tagged(3, false));
        queue.add(tagged(4, true));
        // The whole urgent lane, in insertion order, before any standard item.
        let order: Vec<u32> = std::iter::from_fn(|| queue.poll())
            .map(|m| *m.payload_as::<u32>().unwrap())
            .collect();
        assert_eq!(order, vec![2, 4, 1, 3]);
        assert!(queue.is_empty());
    }
}
