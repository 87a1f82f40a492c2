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
#![forbid(missing_docs)] // Keep this to enforce coverage

//! # Courier
//!
//! This crate is the public face of the Courier messaging substrate, built
//! on top of Tokio. It provides an in-process, actor-style dispatch engine
//! with clear delivery guarantees and two higher layers built on it.
//!
//! ## Key Concepts
//!
//! - **Dispatch Engine (`DispatchEngine`)**: The central message queue.
//!   Messages fan out into one FIFO queue per recipient (with an urgent
//!   priority lane), drained by an elastic pool of workers bounded by the
//!   configured water marks. A recipient never handles two messages
//!   concurrently; distinct recipients are drained in parallel.
//! - **Messages (`Message`)**: Addressed, possibly urgent units of work
//!   carrying a type-erased payload and a completion [`prelude::Request`]
//!   that fires once every recipient delivery has been attempted.
//! - **Requests (`Request`)**: One-shot completion signals with `and_then`
//!   / `or_else` actions and deadline-bounded `standby` waiting.
//! - **Routing Agent (`RoutingAgent`)**: A generic recipient routing
//!   payloads to handlers by concrete payload type, with an approved set
//!   of executable commands.
//! - **State Machine (`StateMachine`)**: A trajectory-deriving state
//!   machine that drives its transitions through the engine one hop at a
//!   time.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! let engine = DispatchEngine::launch(EngineConfig::default());
//! let message = Message::compose(MyPayload)
//!     .from(sender)
//!     .to(recipient)
//!     .build();
//! engine.inject(message)?.request().standby(timeout).await?;
//! ```

/// Prelude module for convenient imports.
///
/// Re-exports the full public surface of `courier-core`: the dispatch
/// engine and its configuration, the message and request contracts, the
/// routing agent, and the state machine.
pub mod prelude {
    pub use courier_core::prelude::*;
}
