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

//! Defines the core traits that establish the fundamental contracts of Courier.
//!
//! # Key Traits
//!
//! *   [`MessagePayload`]: A marker trait required for all types carried as
//!     message payloads. Ensures payloads are `Send`, `Sync`, `Debug`,
//!     `Clone`, and support downcasting via `Any`.
//! *   [`Recipient`]: The single inbound entry point the dispatch engine
//!     invokes; never invoked concurrently with itself for one recipient.
//! *   [`Sender`]: The originator contract, including the bounce path for
//!     undeliverable messages.

// --- Public Re-exports ---
pub use payload::MessagePayload;
pub use recipient::{Recipient, RecipientRef};
pub use sender::{Sender, SenderRef};

/// Defines the [`MessagePayload`] marker trait.
mod payload;
/// Defines the [`Recipient`] trait and its cheap-clone handle.
mod recipient;
/// Defines the [`Sender`] trait and its cheap-clone handle.
mod sender;
