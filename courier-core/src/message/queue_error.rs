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

/// Represents errors surfaced by the dispatch engine and its collaborators.
#[derive(Debug, Clone)]
pub enum QueueError {
    /// Injection was attempted after engine shutdown began.
    QueueDisabled,
    /// The message names no sender.
    MissingSender,
    /// The message has no deliverable recipient, even after the
    /// sender-as-recipient fallback.
    Undeliverable(String),
    /// A state-machine run found no viable transition from the named state.
    Stalled(String),
    /// A state machine was started without the preconditions it needs.
    InvalidState(String),
    /// A bounded wait elapsed before the awaited operation completed. The
    /// underlying operation may still complete later.
    OperationTimedOut,
    /// A wait on internal synchronization was interrupted.
    OperationInterrupted,
    /// The awaited request reached its failed terminal state.
    RequestFailed(String),
    /// The awaited request was cancelled.
    RequestCancelled,
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            QueueError::QueueDisabled => write!(f, "Queue disabled: engine is shutting down"),
            QueueError::MissingSender => write!(f, "Message without sender"),
            QueueError::Undeliverable(msg) => write!(f, "Undeliverable message: {}", msg),
            QueueError::Stalled(state) => write!(f, "State machine stalled at state: {}", state),
            QueueError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            QueueError::OperationTimedOut => write!(f, "Operation timed out"),
            QueueError::OperationInterrupted => write!(f, "Operation interrupted"),
            QueueError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            QueueError::RequestCancelled => write!(f, "Request cancelled"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Converts an elapsed bounded wait into the distinct timeout condition.
impl From<tokio::time::error::Elapsed> for QueueError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        QueueError::OperationTimedOut
    }
}

/// Converts a closed-semaphore wakeup into the interruption condition.
impl From<tokio::sync::AcquireError> for QueueError {
    fn from(_: tokio::sync::AcquireError) -> Self {
        QueueError::OperationInterrupted
    }
}
