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

#![forbid(unsafe_code)]

//! Courier Core Library
//!
//! This library provides the core functionality of the Courier messaging
//! substrate: the central dispatch engine with its elastic worker pool,
//! the message and request contracts, the routing agent, and the
//! trajectory-driven state machine built on top of the engine.

/// Common utilities, configuration, and type aliases.
pub(crate) mod common;

pub(crate) mod agent;
pub(crate) mod machine;
pub(crate) mod message;
pub(crate) mod queue;
/// Trait definitions used throughout Courier.
pub(crate) mod traits;

/// Prelude module for convenient imports.
///
/// Re-exports the public surface of the crate: the dispatch engine, the
/// message/request contracts, the routing agent, and the state machine.
pub mod prelude {
    pub use acton_ern::*;
    pub use async_trait;

    pub use crate::agent::{Command, CommandEnvelope, RoutingAgent};
    pub use crate::common::{
        CourierConfig, DispatchConfig, EngineConfig, FutureBox, RouteFuture, TimeoutConfig, CONFIG,
    };
    pub use crate::machine::{State, StateMachine, StateTransition, Trajectory};
    pub use crate::message::{DeliveryState, Message, MessageBuilder, QueueError, Request};
    pub use crate::queue::DispatchEngine;
    pub use crate::traits::{MessagePayload, Recipient, RecipientRef, Sender, SenderRef};
}
